//! Type definitions specific to the analyzer module.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::simulation::{LogEntry, NodeId};

/// Result of reading a saved event log.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub entries: Vec<LogEntry>,
    /// Non-empty lines read from the source.
    pub total_lines: usize,
    /// Lines that did not match any known event format.
    pub skipped_lines: usize,
}

/// Per-drone counts reconstructed from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DroneSummary {
    /// `sent DATA` lines, retransmissions included.
    pub data_sent: u64,
    /// ACKs the GCS sent to this drone.
    pub acked: u64,
    pub acks_received: u64,
    /// DATA from this drone lost at the GCS plus ACKs lost at this drone.
    pub collisions: u64,
    pub timeouts: u64,
    pub abandoned: u64,
    pub unknown_destinations: u64,
}

/// Distribution of the delay between an ACK and the next DATA of the same drone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadenceStats {
    pub samples: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
}

/// A protocol rule broken somewhere in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Violation {
    /// The drone sent DATA again before an ACK or timeout cleared the previous one.
    MultipleOutstanding { drone: NodeId, at_ms: u64 },
    /// The GCS sent an ACK that no DATA reception provoked.
    UnsolicitedAck { drone: NodeId, at_ms: u64 },
    /// A drone received an ACK that was never sent to it.
    MisaddressedAck { drone: NodeId, at_ms: u64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MultipleOutstanding { drone, at_ms } => {
                write!(f, "Drone{} sent DATA at {} ms while a frame was outstanding", drone, at_ms)
            }
            Violation::UnsolicitedAck { drone, at_ms } => write!(f, "GCS sent ACK to Drone{} at {} ms without receiving DATA", drone, at_ms),
            Violation::MisaddressedAck { drone, at_ms } => write!(f, "Drone{} received an ACK at {} ms that was never sent to it", drone, at_ms),
        }
    }
}

/// Run-level analysis of an event log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub entries: usize,
    pub end_time_ms: u64,
    pub gcs_received: u64,
    pub gcs_acks_sent: u64,
    pub collisions: u64,
    pub unknown_destinations: u64,
    pub drones: BTreeMap<NodeId, DroneSummary>,
    pub cadence: Option<CadenceStats>,
    pub violations: Vec<Violation>,
}

impl AnalysisReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Sum of the per-drone counts.
    pub fn totals(&self) -> DroneSummary {
        self.drones.values().fold(DroneSummary::default(), |mut acc, d| {
            acc.data_sent += d.data_sent;
            acc.acked += d.acked;
            acc.acks_received += d.acks_received;
            acc.collisions += d.collisions;
            acc.timeouts += d.timeouts;
            acc.abandoned += d.abandoned;
            acc.unknown_destinations += d.unknown_destinations;
            acc
        })
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entries: {} (last at {} ms)", self.entries, self.end_time_ms)?;
        let totals = self.totals();
        writeln!(
            f,
            "Drones seen: {} (DATA sent {}, ACKs received {}, timeouts {}, abandoned {})",
            self.drones.len(),
            totals.data_sent,
            totals.acks_received,
            totals.timeouts,
            totals.abandoned
        )?;
        writeln!(
            f,
            "GCS: {} DATA received, {} ACKs sent, {} collisions, {} unknown destinations",
            self.gcs_received, self.gcs_acks_sent, self.collisions, self.unknown_destinations
        )?;
        match &self.cadence {
            Some(c) => writeln!(
                f,
                "Cadence (ACK to next DATA): {} samples, min {} ms, max {} ms, mean {:.1} ms",
                c.samples, c.min_ms, c.max_ms, c.mean_ms
            )?,
            None => writeln!(f, "Cadence (ACK to next DATA): no samples")?,
        }
        for (id, drone) in &self.drones {
            writeln!(
                f,
                "  Drone{}: sent {}, acked {}, received {}, collisions {}, timeouts {}, abandoned {}",
                id, drone.data_sent, drone.acked, drone.acks_received, drone.collisions, drone.timeouts, drone.abandoned
            )?;
        }
        if self.violations.is_empty() {
            write!(f, "No protocol violations")
        } else {
            writeln!(f, "{} protocol violations:", self.violations.len())?;
            for violation in &self.violations {
                writeln!(f, "  {}", violation)?;
            }
            Ok(())
        }
    }
}
