//! Setup shared by every run: configuration and fleet construction.

pub mod config;
pub mod fleet;

pub use config::{ConfigError, SimConfig};
pub use fleet::{build_network, choose_fleet_size};
