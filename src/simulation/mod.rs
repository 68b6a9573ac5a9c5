//! Discrete-event simulation core.
//!
//! A fleet of drones reports telemetry to one ground control station over a
//! single shared broadcast channel. Everything runs on virtual time driven by
//! an event queue; there are no threads and no wall-clock waits.
//!
//! ## Module Organization
//!
//! - `types`: Identifiers, addresses, frames and run counters
//! - `event_queue`: Virtual clock and time-ordered dispatch
//! - `channel`: Shared medium with airtime windows and collision detection
//! - `node`: Drone and ground station state machines
//! - `event_log`: Timestamped record of observable events
//! - `network`: The world tying the above together
//!
//! ## Public API
//!
//! Build a [`Network`] (usually through `common::fleet`), then either call
//! [`Network::simulate`] or drive it with your own `event_queue::EventQueue`.

pub mod channel;
pub mod event_log;
pub mod event_queue;
pub mod network;
pub mod node;
pub mod types;

pub use channel::{ChannelError, ChannelParameters};
pub use event_log::{LogEntry, LogEvent};
pub use network::{DroneSettings, Network, SimulationReport};
pub use node::NodeAgent;
pub use types::{FrameKind, GCS_NODE_ID, NodeAddress, NodeId, SimStats};
