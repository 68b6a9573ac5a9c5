//! Ordered record of observable simulation events.
//!
//! Each entry renders as one text line, for example:
//! `t=1.002s GCS sent ACK to Drone1`. The analyzer parses the same lines back,
//! so the rendering below is the log format.

use std::fmt;

use serde::Serialize;

use super::types::{FrameKind, NodeAddress, NodeId, SimTime, node_name};

/// Something a node did or observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A drone put a DATA frame on the channel (first attempt or retransmission).
    SentData,
    /// The GCS answered `to` with an ACK.
    SentAck { to: NodeId },
    ReceivedData { from: NodeId },
    ReceivedAck,
    /// A frame addressed to this node was lost to overlapping receptions.
    CollisionDrop { kind: FrameKind, from: NodeId },
    /// A frame could not be sent because its destination is not attached.
    UnknownDestination { kind: FrameKind, address: NodeAddress },
    /// The ack wait expired; `retransmit` tells whether the frame will be re-sent.
    AckTimeout { retransmit: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub time: SimTime,
    pub node: NodeId,
    pub event: LogEvent,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}.{:03}s {} ", self.time.as_secs(), self.time.subsec_millis(), node_name(self.node))?;
        match self.event {
            LogEvent::SentData => write!(f, "sent DATA"),
            LogEvent::SentAck { to } => write!(f, "sent ACK to {}", node_name(to)),
            LogEvent::ReceivedData { from } => write!(f, "received DATA from {}", node_name(from)),
            LogEvent::ReceivedAck => write!(f, "received ACK"),
            LogEvent::CollisionDrop { kind, from } => write!(f, "dropped {} from {} (collision)", kind, node_name(from)),
            LogEvent::UnknownDestination { kind, address } => write!(f, "dropped {} to {} (unknown destination)", kind, address),
            LogEvent::AckTimeout { retransmit: true } => write!(f, "ack timeout, retransmitting DATA"),
            LogEvent::AckTimeout { retransmit: false } => write!(f, "ack timeout, abandoning DATA"),
        }
    }
}

/// Append-only event log. Entries are kept in dispatch order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(into = "Vec<String>")]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl From<EventLog> for Vec<String> {
    fn from(log: EventLog) -> Self {
        log.lines()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and mirror it to the `log` facade.
    pub fn record(&mut self, time: SimTime, node: NodeId, event: LogEvent) {
        let entry = LogEntry { time, node, event };
        match event {
            LogEvent::UnknownDestination { .. } => log::warn!("{}", entry),
            _ => log::debug!("{}", entry),
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries concerning one node, in order.
    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.node == node)
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.to_string()).collect()
    }
}
