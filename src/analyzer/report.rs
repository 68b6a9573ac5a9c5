//! Run-level checks over a parsed event log.
//!
//! Rebuilds per-drone counts and verifies the protocol rules that must hold
//! in every run: one outstanding DATA frame per drone, every ACK provoked by a
//! DATA reception, and ACKs only received by the drone they were sent to.

use std::collections::BTreeMap;
use std::time::Duration;

use super::types::{AnalysisReport, CadenceStats, Violation};
use crate::simulation::{GCS_NODE_ID, LogEntry, LogEvent, NodeId};

fn millis(time: Duration) -> u64 {
    u64::try_from(time.as_millis()).unwrap_or(u64::MAX)
}

/// Analyze `entries` in log order.
pub fn analyze(entries: &[LogEntry]) -> AnalysisReport {
    let mut report = AnalysisReport {
        entries: entries.len(),
        ..AnalysisReport::default()
    };
    let mut outstanding: BTreeMap<NodeId, bool> = BTreeMap::new();
    let mut last_ack: BTreeMap<NodeId, u64> = BTreeMap::new();
    let mut last_gcs_reception: Option<(Duration, NodeId)> = None;
    let mut gaps: Vec<u64> = Vec::new();

    for entry in entries {
        let at_ms = millis(entry.time);
        report.end_time_ms = report.end_time_ms.max(at_ms);

        match entry.event {
            LogEvent::SentData => {
                report.drones.entry(entry.node).or_default().data_sent += 1;
                if outstanding.insert(entry.node, true) == Some(true) {
                    report.violations.push(Violation::MultipleOutstanding { drone: entry.node, at_ms });
                }
                if let Some(ack_ms) = last_ack.remove(&entry.node) {
                    gaps.push(at_ms.saturating_sub(ack_ms));
                }
            }
            LogEvent::ReceivedData { from } => {
                report.gcs_received += 1;
                report.drones.entry(from).or_default();
                last_gcs_reception = Some((entry.time, from));
            }
            LogEvent::SentAck { to } => {
                report.gcs_acks_sent += 1;
                report.drones.entry(to).or_default().acked += 1;
                match last_gcs_reception.take() {
                    Some((time, from)) if from == to && time == entry.time => {}
                    _ => report.violations.push(Violation::UnsolicitedAck { drone: to, at_ms }),
                }
            }
            LogEvent::ReceivedAck => {
                let drone = report.drones.entry(entry.node).or_default();
                drone.acks_received += 1;
                if drone.acks_received > drone.acked {
                    report.violations.push(Violation::MisaddressedAck { drone: entry.node, at_ms });
                }
                outstanding.insert(entry.node, false);
                last_ack.insert(entry.node, at_ms);
            }
            LogEvent::CollisionDrop { from, .. } => {
                report.collisions += 1;
                let drone = if entry.node == GCS_NODE_ID { from } else { entry.node };
                report.drones.entry(drone).or_default().collisions += 1;
            }
            LogEvent::UnknownDestination { .. } => {
                report.unknown_destinations += 1;
                if entry.node != GCS_NODE_ID {
                    report.drones.entry(entry.node).or_default().unknown_destinations += 1;
                }
            }
            LogEvent::AckTimeout { retransmit } => {
                let drone = report.drones.entry(entry.node).or_default();
                drone.timeouts += 1;
                if !retransmit {
                    drone.abandoned += 1;
                }
                outstanding.insert(entry.node, false);
                last_ack.remove(&entry.node);
            }
        }
    }

    report.cadence = cadence(&gaps);
    report
}

fn cadence(gaps: &[u64]) -> Option<CadenceStats> {
    let min_ms = *gaps.iter().min()?;
    let max_ms = *gaps.iter().max()?;
    let mean_ms = gaps.iter().sum::<u64>() as f64 / gaps.len() as f64;
    Some(CadenceStats {
        samples: gaps.len() as u64,
        min_ms,
        max_ms,
        mean_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::log_parser::parse_log_line;
    use crate::common::{SimConfig, build_network};

    fn parse(lines: &[&str]) -> Vec<LogEntry> {
        lines.iter().map(|l| parse_log_line(l).unwrap()).collect()
    }

    #[test]
    fn clean_round_trip_log() {
        let entries = parse(&[
            "t=1.000s Drone1 sent DATA",
            "t=1.002s GCS received DATA from Drone1",
            "t=1.002s GCS sent ACK to Drone1",
            "t=1.004s Drone1 received ACK",
            "t=2.004s Drone1 sent DATA",
        ]);
        let report = analyze(&entries);

        assert!(report.is_clean(), "{:?}", report.violations);
        assert_eq!(report.end_time_ms, 2004);
        assert_eq!(report.gcs_received, 1);
        assert_eq!(report.gcs_acks_sent, 1);
        let drone = &report.drones[&1];
        assert_eq!(drone.data_sent, 2);
        assert_eq!(drone.acked, 1);
        assert_eq!(drone.acks_received, 1);
        let cadence = report.cadence.unwrap();
        assert_eq!(cadence.samples, 1);
        assert_eq!((cadence.min_ms, cadence.max_ms), (1000, 1000));
    }

    #[test]
    fn detects_second_outstanding_frame() {
        let entries = parse(&["t=1.000s Drone2 sent DATA", "t=1.500s Drone2 sent DATA"]);
        let report = analyze(&entries);
        assert_eq!(report.violations, vec![Violation::MultipleOutstanding { drone: 2, at_ms: 1500 }]);
    }

    #[test]
    fn timeouts_clear_the_outstanding_frame() {
        let entries = parse(&[
            "t=1.000s Drone2 sent DATA",
            "t=1.002s GCS dropped DATA from Drone2 (collision)",
            "t=1.050s Drone2 ack timeout, retransmitting DATA",
            "t=1.061s Drone2 sent DATA",
            "t=1.111s Drone2 ack timeout, abandoning DATA",
        ]);
        let report = analyze(&entries);
        assert!(report.is_clean());
        let drone = &report.drones[&2];
        assert_eq!(drone.data_sent, 2);
        assert_eq!(drone.timeouts, 2);
        assert_eq!(drone.abandoned, 1);
        assert_eq!(drone.collisions, 1);
        assert!(report.cadence.is_none());
    }

    #[test]
    fn detects_ack_addressing_errors() {
        let entries = parse(&[
            "t=1.000s Drone1 sent DATA",
            "t=1.002s GCS received DATA from Drone1",
            "t=1.002s GCS sent ACK to Drone2",
            "t=1.004s Drone1 received ACK",
        ]);
        let report = analyze(&entries);
        assert_eq!(
            report.violations,
            vec![
                Violation::UnsolicitedAck { drone: 2, at_ms: 1002 },
                Violation::MisaddressedAck { drone: 1, at_ms: 1004 },
            ]
        );
        assert!(report.to_string().contains("2 protocol violations"));
    }

    #[test]
    fn rendered_simulation_log_reproduces_counters() {
        let config = SimConfig::from_toml_str(
            r#"
            [drone]
            start-jitter-ms = 200
            ack-timeout-ms = 15
            retry-jitter-ms = 25
            max-retries = 2
            "#,
        )
        .unwrap();
        let network = build_network(&config, 12, 2024).unwrap();
        let sim = network.simulate(std::time::Duration::from_secs(15)).unwrap();

        let entries: Vec<LogEntry> = sim.log.lines().iter().map(|l| parse_log_line(l).unwrap()).collect();
        let report = analyze(&entries);
        let sum = report.totals();

        assert!(report.is_clean(), "{}", report);
        assert_eq!(report.entries, sim.log.len());
        assert_eq!(sum.data_sent, sim.stats.data_sent + sim.stats.data_retransmitted);
        assert_eq!(report.gcs_acks_sent, sim.stats.acks_sent);
        assert_eq!(sum.acks_received, sim.stats.acks_accepted);
        assert_eq!(report.collisions, sim.stats.collisions);
        assert_eq!(sum.timeouts, sim.stats.ack_timeouts);
        assert_eq!(sum.abandoned, sim.stats.frames_abandoned);

        let cadence = report.cadence.unwrap();
        assert_eq!((cadence.min_ms, cadence.max_ms), (1000, 1000));
    }
}
