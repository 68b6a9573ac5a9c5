//! Parse individual event log lines back into structured entries.
//!
//! Supports the following log line formats:
//! - `t=1.000s Drone1 sent DATA`
//! - `t=1.002s GCS sent ACK to Drone1`
//! - `t=1.002s GCS received DATA from Drone1`
//! - `t=1.004s Drone1 received ACK`
//! - `t=1.002s GCS dropped DATA from Drone1 (collision)`
//! - `t=1.000s Drone1 dropped DATA to 10.1.1.77 (unknown destination)`
//! - `t=1.050s Drone1 ack timeout, retransmitting DATA` (or `abandoning DATA`)
//!
//! Lines may carry a prefix (for example an `env_logger` header) before the
//! `t=` timestamp.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::simulation::{FrameKind, GCS_NODE_ID, LogEntry, LogEvent, NodeAddress, NodeId};

/// Parse a log line into a [`LogEntry`].
///
/// # Parameters
///
/// * `line` - A single log line to parse
///
/// # Returns
///
/// `Some(entry)` if parsing succeeds, `None` for unparseable lines. The
/// timestamp has millisecond precision.
pub fn parse_log_line(line: &str) -> Option<LogEntry> {
    let line = line.trim();
    let start = if line.starts_with("t=") { 0 } else { line.find(" t=")? + 1 };
    let mut parts = line[start..].splitn(3, ' ');

    let time = parse_timestamp(parts.next()?)?;
    let node = parse_node_name(parts.next()?)?;
    let event = parse_event(parts.next()?)?;

    Some(LogEntry { time, node, event })
}

/// Parse `t=12.345s`.
fn parse_timestamp(token: &str) -> Option<Duration> {
    let value = token.strip_prefix("t=")?.strip_suffix('s')?;
    let (secs, millis) = value.split_once('.')?;
    if millis.len() != 3 {
        return None;
    }
    let secs: u64 = secs.parse().ok()?;
    let millis: u64 = millis.parse().ok()?;
    Some(Duration::from_secs(secs) + Duration::from_millis(millis))
}

/// Parse `GCS` or `DroneN`.
fn parse_node_name(token: &str) -> Option<NodeId> {
    if token == "GCS" {
        return Some(GCS_NODE_ID);
    }
    let id: NodeId = token.strip_prefix("Drone")?.parse().ok()?;
    (id != GCS_NODE_ID).then_some(id)
}

fn parse_frame_kind(token: &str) -> Option<FrameKind> {
    match token {
        "DATA" => Some(FrameKind::Data),
        "ACK" => Some(FrameKind::Ack),
        _ => None,
    }
}

fn parse_event(message: &str) -> Option<LogEvent> {
    match message {
        "sent DATA" => return Some(LogEvent::SentData),
        "received ACK" => return Some(LogEvent::ReceivedAck),
        "ack timeout, retransmitting DATA" => return Some(LogEvent::AckTimeout { retransmit: true }),
        "ack timeout, abandoning DATA" => return Some(LogEvent::AckTimeout { retransmit: false }),
        _ => {}
    }

    if let Some(peer) = message.strip_prefix("sent ACK to ") {
        return parse_node_name(peer).map(|to| LogEvent::SentAck { to });
    }
    if let Some(peer) = message.strip_prefix("received DATA from ") {
        return parse_node_name(peer).map(|from| LogEvent::ReceivedData { from });
    }

    let dropped = message.strip_prefix("dropped ")?;
    let (kind, rest) = dropped.split_once(' ')?;
    let kind = parse_frame_kind(kind)?;

    if let Some(peer) = rest.strip_prefix("from ").and_then(|r| r.strip_suffix(" (collision)")) {
        return parse_node_name(peer).map(|from| LogEvent::CollisionDrop { kind, from });
    }
    if let Some(address) = rest.strip_prefix("to ").and_then(|r| r.strip_suffix(" (unknown destination)")) {
        let ip: Ipv4Addr = address.parse().ok()?;
        return Some(LogEvent::UnknownDestination {
            kind,
            address: NodeAddress::from(ip),
        });
    }
    None
}
