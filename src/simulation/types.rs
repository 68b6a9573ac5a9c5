//! Type definitions for the simulation.
//!
//! Contains the data structures shared across the simulation:
//! - Node identifiers and their derived network addresses
//! - Frames exchanged over the shared channel
//! - Run-wide counters

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Virtual time, measured from the start of the simulation.
pub type SimTime = Duration;

/// Integer node identifier. Node 0 is always the ground control station.
pub type NodeId = u32;

/// Identifier reserved for the ground control station.
pub const GCS_NODE_ID: NodeId = 0;

/// Human readable node name used in the event log (`GCS`, `Drone7`).
pub fn node_name(id: NodeId) -> String {
    if id == GCS_NODE_ID { "GCS".to_string() } else { format!("Drone{}", id) }
}

/// Notional network address of a node.
///
/// Addresses are derived from the node id (`base + id + 1`), so the GCS is
/// always `base + 1` and the mapping can be reversed from the address alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeAddress(Ipv4Addr);

impl NodeAddress {
    /// Derive the address of `id` relative to `base`.
    ///
    /// Returns `None` when the result would not fit into the IPv4 space.
    pub fn derive(base: Ipv4Addr, id: NodeId) -> Option<Self> {
        let offset = id.checked_add(1)?;
        u32::from(base).checked_add(offset).map(|raw| NodeAddress(Ipv4Addr::from(raw)))
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }
}

impl From<Ipv4Addr> for NodeAddress {
    fn from(ip: Ipv4Addr) -> Self {
        NodeAddress(ip)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame kinds carried by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameKind {
    Data,
    Ack,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Data => write!(f, "DATA"),
            FrameKind::Ack => write!(f, "ACK"),
        }
    }
}

/// A unit of data on the shared medium.
///
/// Frames are immutable once built; every receiver of a broadcast observes the
/// same value. An ACK carries the sequence of the DATA frame it acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub sender: NodeId,
    pub destination: NodeAddress,
    pub kind: FrameKind,
    /// Payload size in bytes; drives the transmission time on the channel.
    pub payload_size: u32,
    pub sequence: u32,
}

impl Frame {
    pub fn data(sender: NodeId, destination: NodeAddress, payload_size: u32, sequence: u32) -> Self {
        Self {
            sender,
            destination,
            kind: FrameKind::Data,
            payload_size,
            sequence,
        }
    }

    /// Build the acknowledgment for `data`, addressed back to its sender.
    pub fn ack_for(data: &Frame, sender: NodeId, destination: NodeAddress, payload_size: u32) -> Self {
        Self {
            sender,
            destination,
            kind: FrameKind::Ack,
            payload_size,
            sequence: data.sequence,
        }
    }
}

/// Run-wide counters reported at the end of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    /// Frames pushed onto the channel (DATA and ACK, retransmissions included).
    pub frames_transmitted: u64,
    pub data_sent: u64,
    pub data_retransmitted: u64,
    pub acks_sent: u64,
    /// Frames delivered to the endpoint they were addressed to.
    pub frames_delivered: u64,
    pub acks_accepted: u64,
    pub stale_acks: u64,
    /// Addressed frames lost to overlapping receptions.
    pub collisions: u64,
    pub unknown_destinations: u64,
    pub duplicate_sends: u64,
    pub ack_timeouts: u64,
    pub frames_abandoned: u64,
}
