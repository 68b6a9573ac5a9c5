//! The simulation world: channel, agents, randomness and bookkeeping.
//!
//! High-level flow of one telemetry round:
//! 1) A drone's slot timer fires; the drone state machine decides whether to send.
//! 2) The DATA frame goes on the channel, which schedules one reception per endpoint.
//! 3) Reception events come back through [`ChannelHost::on_reception`]; collided
//!    frames are dropped, frames meant for someone else are ignored.
//! 4) The GCS answers DATA with an ACK right away; the drone accepting the ACK
//!    re-arms its slot timer `slot_interval` after receipt.
//!
//! With an ack timeout configured, an unanswered frame is retransmitted after a
//! random backoff drawn from the run's seeded RNG, and abandoned once its
//! retries are used up.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::channel::{Channel, ChannelError, ChannelHost, ChannelParameters, ReceptionOutcome};
use super::event_log::{EventLog, LogEvent};
use super::event_queue::{EventQueue, SimError};
use super::node::{AckOutcome, DroneState, LinkState, NodeAgent, Role, SlotDecision, TimeoutOutcome};
use super::types::{Frame, FrameKind, GCS_NODE_ID, NodeAddress, NodeId, SimStats, SimTime, node_name};

/// Timing and sizing shared by every drone of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroneSettings {
    pub slot_interval: Duration,
    pub data_payload_bytes: u32,
    pub ack_payload_bytes: u32,
    /// Delay before the first slot interval starts.
    pub start_offset: Duration,
    /// Upper bound of the random per-drone delay added to the first slot.
    pub start_jitter: Duration,
    /// Ack wait before retransmitting. `None` waits forever.
    pub ack_timeout: Option<Duration>,
    pub max_retries: u32,
    /// Upper bound of the random backoff before a retransmission.
    pub retry_jitter: Duration,
}

impl Default for DroneSettings {
    fn default() -> Self {
        Self {
            slot_interval: Duration::from_secs(1),
            data_payload_bytes: 4,
            ack_payload_bytes: 4,
            start_offset: Duration::ZERO,
            start_jitter: Duration::ZERO,
            ack_timeout: None,
            max_retries: 3,
            retry_jitter: Duration::ZERO,
        }
    }
}

/// A DATA frame still unacknowledged when the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingFrame {
    pub drone: NodeId,
    pub sequence: u32,
    /// Transmissions of the frame so far.
    pub attempts: u32,
    /// `false` when the ack timeout fired and a retransmission is queued.
    pub awaiting_ack: bool,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub nodes: usize,
    pub drones: usize,
    pub horizon_ms: u128,
    pub events_dispatched: u64,
    pub stats: SimStats,
    pub pending: Vec<PendingFrame>,
    pub log: EventLog,
}

pub struct Network {
    channel: Channel,
    agents: BTreeMap<NodeId, NodeAgent>,
    settings: DroneSettings,
    seed: u64,
    rng: StdRng,
    log: EventLog,
    stats: SimStats,
}

impl Network {
    pub fn new(parameters: ChannelParameters, settings: DroneSettings, seed: u64) -> Self {
        Self {
            channel: Channel::new(parameters),
            agents: BTreeMap::new(),
            settings,
            seed,
            rng: StdRng::seed_from_u64(seed),
            log: EventLog::new(),
            stats: SimStats::default(),
        }
    }

    /// Attach `agent` to the channel. Only possible before [`Network::seal`].
    pub fn add_node(&mut self, agent: NodeAgent) -> Result<(), ChannelError> {
        self.channel.attach(agent.id, agent.address)?;
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    pub fn seal(&mut self) {
        self.channel.seal();
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeAgent> {
        self.agents.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeAgent> {
        self.agents.values()
    }

    pub fn node_count(&self) -> usize {
        self.agents.len()
    }

    pub fn drone_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_drone()).count()
    }

    pub fn gcs_address(&self) -> Option<NodeAddress> {
        self.channel.address_of(GCS_NODE_ID)
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Outstanding DATA frames, in drone order.
    pub fn pending_frames(&self) -> Vec<PendingFrame> {
        self.agents
            .values()
            .filter_map(|agent| {
                let state = agent.drone_state()?;
                let frame = state.outstanding()?;
                Some(PendingFrame {
                    drone: agent.id,
                    sequence: frame.sequence,
                    attempts: state.attempts(),
                    awaiting_ack: state.link() == LinkState::AwaitingAck,
                })
            })
            .collect()
    }

    /// Arm the first slot timer of every drone.
    ///
    /// The first slot fires at `start_offset + slot_interval`, plus a random
    /// jitter in `[0, start_jitter]` per drone.
    pub fn start(&mut self, queue: &mut EventQueue<Self>) {
        let drones: Vec<NodeId> = self.agents.values().filter(|a| a.is_drone()).map(|a| a.id).collect();
        let base_delay = self.settings.start_offset + self.settings.slot_interval;
        let max_jitter = self.settings.start_jitter;
        for &id in &drones {
            let jitter = self.draw_jitter(max_jitter);
            self.arm_slot_timer(queue, id, base_delay + jitter);
        }
        log::info!("Started {} drones, first slot at {:.3}s (+{:?} jitter)", drones.len(), base_delay.as_secs_f64(), max_jitter);
    }

    /// Run from a fresh queue until `horizon` and report.
    pub fn simulate(mut self, horizon: SimTime) -> Result<SimulationReport, SimError> {
        let mut queue = EventQueue::new();
        self.start(&mut queue);
        queue.run_until(&mut self, horizon)?;

        log::info!(
            "Run finished at {:.3}s: {} events, {} DATA sent, {} ACKs accepted, {} collisions",
            queue.now().as_secs_f64(),
            queue.dispatched(),
            self.stats.data_sent,
            self.stats.acks_accepted,
            self.stats.collisions
        );

        Ok(SimulationReport {
            seed: self.seed,
            nodes: self.node_count(),
            drones: self.drone_count(),
            horizon_ms: horizon.as_millis(),
            events_dispatched: queue.dispatched(),
            pending: self.pending_frames(),
            stats: self.stats,
            log: self.log,
        })
    }

    /// Slot timer of drone `id` fired.
    pub fn on_slot_timer(&mut self, queue: &mut EventQueue<Self>, id: NodeId) -> Result<(), SimError> {
        let Some(gcs) = self.gcs_address() else {
            log::error!("{} has no ground station to report to", node_name(id));
            return Ok(());
        };
        let payload = self.settings.data_payload_bytes;
        let Some(state) = self.drone_mut(id) else {
            return Ok(());
        };
        state.slot_timer = None;

        let (frame, retransmission) = match state.on_slot(id, gcs, payload) {
            SlotDecision::Send { frame, retransmission } => (frame, retransmission),
            SlotDecision::Ignored => {
                self.stats.duplicate_sends += 1;
                log::debug!("{} slot fired while awaiting ACK, send skipped", node_name(id));
                return Ok(());
            }
        };

        if !self.transmit_frame(queue, frame)? {
            if let Some(state) = self.drone_mut(id) {
                state.on_send_failed();
            }
            let interval = self.settings.slot_interval;
            self.arm_slot_timer(queue, id, interval);
            return Ok(());
        }

        if retransmission {
            self.stats.data_retransmitted += 1;
        } else {
            self.stats.data_sent += 1;
        }

        if let Some(timeout) = self.settings.ack_timeout {
            let sequence = frame.sequence;
            let timer = queue.schedule(timeout, move |network: &mut Network, queue: &mut EventQueue<Network>| {
                network.on_ack_timeout(queue, id, sequence)
            });
            if let Some(previous) = self.drone_mut(id).and_then(|state| state.ack_timer.replace(timer)) {
                queue.cancel(previous);
            }
        }
        Ok(())
    }

    /// Put `frame` on the channel at the current time and record the send.
    ///
    /// Returns `Ok(false)` when the channel refused the frame. An unknown
    /// destination is logged and counted; only scheduling failures are fatal.
    pub fn transmit_frame(&mut self, queue: &mut EventQueue<Self>, frame: Frame) -> Result<bool, SimError> {
        let now = queue.now();
        let destination = self.channel.resolve(frame.destination);

        match self.channel.transmit(queue, frame, now) {
            Ok(report) => {
                self.stats.frames_transmitted += 1;
                let event = match (frame.kind, destination) {
                    (FrameKind::Ack, Some(to)) => {
                        self.stats.acks_sent += 1;
                        LogEvent::SentAck { to }
                    }
                    _ => LogEvent::SentData,
                };
                log::trace!(
                    "{} {} #{} reaches {} endpoints at {:.6}s ({} overlaps)",
                    node_name(frame.sender),
                    frame.kind,
                    frame.sequence,
                    report.receivers,
                    report.arrival.as_secs_f64(),
                    report.collisions
                );
                self.log.record(now, frame.sender, event);
                Ok(true)
            }
            Err(ChannelError::UnknownDestination(address)) => {
                self.stats.unknown_destinations += 1;
                self.log.record(now, frame.sender, LogEvent::UnknownDestination { kind: frame.kind, address });
                Ok(false)
            }
            Err(ChannelError::Schedule(err)) => Err(err),
            Err(err) => {
                log::error!("{} could not transmit {}: {}", node_name(frame.sender), frame.kind, err);
                Ok(false)
            }
        }
    }

    fn on_ack_timeout(&mut self, queue: &mut EventQueue<Self>, id: NodeId, sequence: u32) -> Result<(), SimError> {
        let max_retries = self.settings.max_retries;
        let Some(state) = self.drone_mut(id) else {
            return Ok(());
        };
        state.ack_timer = None;
        let now = queue.now();

        match state.on_timeout(sequence, max_retries) {
            TimeoutOutcome::Obsolete => {}
            TimeoutOutcome::Retransmit(_) => {
                self.stats.ack_timeouts += 1;
                self.log.record(now, id, LogEvent::AckTimeout { retransmit: true });
                let max_backoff = self.settings.retry_jitter;
                let backoff = self.draw_jitter(max_backoff);
                self.arm_slot_timer(queue, id, backoff);
            }
            TimeoutOutcome::Abandon(frame) => {
                self.stats.ack_timeouts += 1;
                self.stats.frames_abandoned += 1;
                log::info!("{} abandoned DATA #{} after {} retries", node_name(id), frame.sequence, max_retries);
                self.log.record(now, id, LogEvent::AckTimeout { retransmit: false });
                let interval = self.settings.slot_interval;
                self.arm_slot_timer(queue, id, interval);
            }
        }
        Ok(())
    }

    fn deliver_data(&mut self, queue: &mut EventQueue<Self>, data: Frame) -> Result<(), SimError> {
        self.log.record(queue.now(), GCS_NODE_ID, LogEvent::ReceivedData { from: data.sender });

        let Some(reply_to) = self.channel.address_of(data.sender) else {
            log::warn!("GCS cannot answer {}: no address on the channel", node_name(data.sender));
            return Ok(());
        };
        let ack_payload = self.settings.ack_payload_bytes;
        let ack = match self.agents.get_mut(&GCS_NODE_ID).map(|agent| &mut agent.role) {
            Some(Role::GroundStation(gcs)) => gcs.on_data(&data, reply_to, ack_payload),
            _ => return Ok(()),
        };
        self.transmit_frame(queue, ack)?;
        Ok(())
    }

    fn deliver_ack(&mut self, queue: &mut EventQueue<Self>, id: NodeId, ack: Frame) -> Result<(), SimError> {
        let Some(state) = self.drone_mut(id) else {
            return Ok(());
        };
        match state.on_ack(&ack) {
            AckOutcome::Accepted => {
                if let Some(timer) = state.ack_timer.take() {
                    queue.cancel(timer);
                }
                self.stats.acks_accepted += 1;
                self.log.record(queue.now(), id, LogEvent::ReceivedAck);
                let interval = self.settings.slot_interval;
                self.arm_slot_timer(queue, id, interval);
            }
            AckOutcome::Stale => {
                self.stats.stale_acks += 1;
                log::debug!("{} ignored stale ACK #{}", node_name(id), ack.sequence);
            }
        }
        Ok(())
    }

    /// Schedule the next slot of drone `id`, replacing any pending one.
    fn arm_slot_timer(&mut self, queue: &mut EventQueue<Self>, id: NodeId, delay: Duration) {
        let Some(state) = self.drone_mut(id) else {
            return;
        };
        if let Some(previous) = state.slot_timer.take() {
            queue.cancel(previous);
        }
        let timer = queue.schedule(delay, move |network: &mut Network, queue: &mut EventQueue<Network>| network.on_slot_timer(queue, id));
        state.slot_timer = Some(timer);
    }

    fn draw_jitter(&mut self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let bound = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(self.rng.gen_range(0..=bound))
    }

    fn drone_mut(&mut self, id: NodeId) -> Option<&mut DroneState> {
        match self.agents.get_mut(&id).map(|agent| &mut agent.role) {
            Some(Role::Drone(state)) => Some(state),
            _ => None,
        }
    }
}

impl ChannelHost for Network {
    fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    fn on_reception(&mut self, queue: &mut EventQueue<Self>, endpoint: NodeId, outcome: ReceptionOutcome) -> Result<(), SimError> {
        let now = queue.now();
        let Some(agent) = self.agents.get(&endpoint) else {
            return Ok(());
        };
        let (frame, collided) = match outcome {
            ReceptionOutcome::Delivered(frame) => (frame, false),
            ReceptionOutcome::Collided(frame) => (frame, true),
        };

        // Overheard traffic occupies the medium but is none of this node's business.
        if !agent.accepts(&frame) {
            return Ok(());
        }

        if collided {
            self.stats.collisions += 1;
            self.log.record(now, endpoint, LogEvent::CollisionDrop { kind: frame.kind, from: frame.sender });
            return Ok(());
        }

        self.stats.frames_delivered += 1;
        match frame.kind {
            FrameKind::Data => self.deliver_data(queue, frame),
            FrameKind::Ack => self.deliver_ack(queue, endpoint, frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::event_log::LogEntry;
    use std::net::Ipv4Addr;

    fn addr(id: NodeId) -> NodeAddress {
        NodeAddress::derive(Ipv4Addr::new(10, 1, 1, 0), id).unwrap()
    }

    fn build(nodes: u32, settings: DroneSettings, seed: u64) -> Network {
        let parameters = ChannelParameters {
            bandwidth_bps: 100_000,
            propagation_delay: Duration::from_millis(2),
        };
        let mut network = Network::new(parameters, settings, seed);
        network.add_node(NodeAgent::ground_station(addr(GCS_NODE_ID))).unwrap();
        for id in 1..nodes {
            network.add_node(NodeAgent::drone(id, addr(id))).unwrap();
        }
        network.seal();
        network
    }

    fn run(network: &mut Network, horizon: Duration) -> EventQueue<Network> {
        let mut queue = EventQueue::new();
        network.start(&mut queue);
        queue.run_until(network, horizon).unwrap();
        queue
    }

    fn contended() -> DroneSettings {
        DroneSettings {
            start_jitter: Duration::from_millis(300),
            ack_timeout: Some(Duration::from_millis(15)),
            retry_jitter: Duration::from_millis(20),
            ..DroneSettings::default()
        }
    }

    fn drone_entries(network: &Network, id: NodeId) -> Vec<LogEntry> {
        network.log().for_node(id).copied().collect()
    }

    #[test]
    fn single_drone_round_trip() {
        let mut network = build(2, DroneSettings::default(), 1);
        run(&mut network, Duration::from_millis(2005));

        assert_eq!(
            network.log().lines(),
            vec![
                "t=1.000s Drone1 sent DATA",
                "t=1.002s GCS received DATA from Drone1",
                "t=1.002s GCS sent ACK to Drone1",
                "t=1.004s Drone1 received ACK",
                "t=2.004s Drone1 sent DATA",
            ]
        );
        let times: Vec<SimTime> = network.log().entries().iter().map(|e| e.time).collect();
        assert_eq!(times[3], Duration::from_micros(1_004_640));
        assert_eq!(times[4], Duration::from_micros(2_004_640));
    }

    #[test]
    fn simulate_reports_counts() {
        let network = build(2, DroneSettings::default(), 5);
        let report = network.simulate(Duration::from_millis(3500)).unwrap();

        assert_eq!(report.seed, 5);
        assert_eq!(report.nodes, 2);
        assert_eq!(report.drones, 1);
        assert_eq!(report.stats.data_sent, 3);
        assert_eq!(report.stats.acks_sent, 3);
        assert_eq!(report.stats.acks_accepted, 3);
        assert_eq!(report.stats.frames_transmitted, 6);
        assert_eq!(report.stats.frames_delivered, 6);
        assert_eq!(report.stats.collisions, 0);
        assert!(report.pending.is_empty());
        assert!(report.events_dispatched > 0);
    }

    #[test]
    fn simultaneous_data_frames_collide_at_gcs() {
        let mut network = build(3, DroneSettings::default(), 1);
        run(&mut network, Duration::from_millis(1500));

        assert_eq!(
            network.log().lines(),
            vec![
                "t=1.000s Drone1 sent DATA",
                "t=1.000s Drone2 sent DATA",
                "t=1.002s GCS dropped DATA from Drone1 (collision)",
                "t=1.002s GCS dropped DATA from Drone2 (collision)",
            ]
        );
        assert_eq!(network.stats().collisions, 2);
        assert_eq!(network.stats().frames_delivered, 0);
        // Without an ack timeout both drones wait on their first frame forever.
        let waiting = |drone| PendingFrame {
            drone,
            sequence: 1,
            attempts: 1,
            awaiting_ack: true,
        };
        assert_eq!(network.pending_frames(), vec![waiting(1), waiting(2)]);
    }

    #[test]
    fn next_send_is_measured_from_ack_receipt() {
        let mut network = build(6, contended(), 11);
        run(&mut network, Duration::from_secs(20));

        let mut checked = 0;
        for id in 1..6 {
            let mut last_ack: Option<SimTime> = None;
            for entry in drone_entries(&network, id) {
                match entry.event {
                    LogEvent::ReceivedAck => last_ack = Some(entry.time),
                    LogEvent::SentData => {
                        if let Some(ack_time) = last_ack.take() {
                            assert_eq!(entry.time, ack_time + Duration::from_secs(1), "Drone{} cadence", id);
                            checked += 1;
                        }
                    }
                    LogEvent::AckTimeout { .. } => last_ack = None,
                    _ => {}
                }
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn at_most_one_outstanding_frame_per_drone() {
        let settings = DroneSettings {
            ack_timeout: Some(Duration::from_millis(10)),
            max_retries: 2,
            retry_jitter: Duration::from_millis(30),
            ..DroneSettings::default()
        };
        let mut network = build(10, settings, 3);
        run(&mut network, Duration::from_secs(30));

        assert!(network.stats().collisions > 0);
        for id in 1..10 {
            let mut outstanding = false;
            for entry in drone_entries(&network, id) {
                match entry.event {
                    LogEvent::SentData => {
                        assert!(!outstanding, "Drone{} sent twice without ACK or timeout at {:?}", id, entry.time);
                        outstanding = true;
                    }
                    LogEvent::ReceivedAck | LogEvent::AckTimeout { .. } => outstanding = false,
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn acks_go_back_to_the_data_sender() {
        let mut network = build(8, contended(), 9);
        run(&mut network, Duration::from_secs(10));

        let entries = network.log().entries();
        let gcs: Vec<&LogEntry> = entries.iter().filter(|e| e.node == GCS_NODE_ID).collect();
        for pair in gcs.windows(2) {
            if let LogEvent::SentAck { to } = pair[1].event {
                assert_eq!(pair[0].event, LogEvent::ReceivedData { from: to });
                assert_eq!(pair[0].time, pair[1].time);
            }
        }

        let mut acks_to: BTreeMap<NodeId, usize> = BTreeMap::new();
        for entry in entries {
            match entry.event {
                LogEvent::SentAck { to } => *acks_to.entry(to).or_default() += 1,
                LogEvent::ReceivedAck => assert!(acks_to.get(&entry.node).copied().unwrap_or(0) > 0),
                _ => {}
            }
        }
        assert!(network.stats().acks_accepted > 0);
    }

    #[test]
    fn same_seed_gives_identical_logs() {
        let mut first = build(8, contended(), 42);
        let mut second = build(8, contended(), 42);
        let mut other = build(8, contended(), 43);
        run(&mut first, Duration::from_secs(10));
        run(&mut second, Duration::from_secs(10));
        run(&mut other, Duration::from_secs(10));

        assert_eq!(first.log().lines(), second.log().lines());
        assert_eq!(first.stats(), second.stats());
        assert_ne!(first.log().lines(), other.log().lines());
    }

    #[test]
    fn unknown_destination_is_logged_once_without_delivery() {
        let mut network = build(3, DroneSettings::default(), 1);
        let mut queue = EventQueue::new();
        let stray = Frame::data(1, addr(76), 4, 1);
        queue.schedule(Duration::from_secs(1), move |network: &mut Network, queue: &mut EventQueue<Network>| {
            assert!(!network.transmit_frame(queue, stray)?);
            Ok(())
        });

        queue.run(&mut network).unwrap();

        assert_eq!(network.log().lines(), vec!["t=1.000s Drone1 dropped DATA to 10.1.1.77 (unknown destination)"]);
        assert!(queue.is_empty());
        assert_eq!(network.stats().unknown_destinations, 1);
        assert_eq!(network.stats().collisions, 0);
        assert_eq!(network.stats().frames_transmitted, 0);
    }

    #[test]
    fn slot_while_awaiting_ack_is_counted_not_sent() {
        let mut network = build(2, DroneSettings::default(), 1);
        let mut queue = run(&mut network, Duration::from_micros(1_000_100));
        assert_eq!(network.stats().data_sent, 1);

        queue.schedule(Duration::ZERO, |network: &mut Network, queue: &mut EventQueue<Network>| network.on_slot_timer(queue, 1));
        queue.run_until(&mut network, Duration::from_micros(1_000_200)).unwrap();

        assert_eq!(network.stats().duplicate_sends, 1);
        assert_eq!(network.stats().data_sent, 1);
        assert_eq!(network.stats().frames_transmitted, 1);
    }

    #[test]
    fn late_ack_accepts_retransmitted_frame() {
        let settings = DroneSettings {
            ack_timeout: Some(Duration::from_millis(3)),
            max_retries: 1,
            ..DroneSettings::default()
        };
        let mut network = build(2, settings, 1);
        run(&mut network, Duration::from_secs(2));

        assert_eq!(
            network.log().lines(),
            vec![
                "t=1.000s Drone1 sent DATA",
                "t=1.002s GCS received DATA from Drone1",
                "t=1.002s GCS sent ACK to Drone1",
                "t=1.003s Drone1 ack timeout, retransmitting DATA",
                "t=1.003s Drone1 sent DATA",
                "t=1.004s Drone1 received ACK",
                "t=1.005s GCS received DATA from Drone1",
                "t=1.005s GCS sent ACK to Drone1",
            ]
        );
        let stats = network.stats();
        assert_eq!(stats.data_retransmitted, 1);
        assert_eq!(stats.acks_accepted, 1);
        assert_eq!(stats.stale_acks, 1);
        assert_eq!(stats.ack_timeouts, 1);
    }

    #[test]
    fn exhausted_retries_abandon_the_frame() {
        let settings = DroneSettings {
            ack_timeout: Some(Duration::from_millis(1)),
            max_retries: 1,
            ..DroneSettings::default()
        };
        let mut network = build(2, settings, 1);
        // Stops right after the next fresh frame goes out.
        run(&mut network, Duration::from_micros(2_002_500));

        let lines = network.log().lines();
        assert_eq!(lines.len(), 9);
        assert_eq!(
            lines[..8],
            [
                "t=1.000s Drone1 sent DATA",
                "t=1.001s Drone1 ack timeout, retransmitting DATA",
                "t=1.001s Drone1 sent DATA",
                "t=1.002s Drone1 ack timeout, abandoning DATA",
                "t=1.002s GCS received DATA from Drone1",
                "t=1.002s GCS sent ACK to Drone1",
                "t=1.003s GCS received DATA from Drone1",
                "t=1.003s GCS sent ACK to Drone1",
            ]
        );
        // The next slot starts a fresh frame one interval after abandoning.
        assert_eq!(lines[8], "t=2.002s Drone1 sent DATA");

        let stats = network.stats();
        assert_eq!(stats.frames_abandoned, 1);
        assert_eq!(stats.stale_acks, 2);
        assert_eq!(stats.acks_accepted, 0);
        assert_eq!(
            network.pending_frames(),
            vec![PendingFrame {
                drone: 1,
                sequence: 2,
                attempts: 1,
                awaiting_ack: true,
            }]
        );
    }

    #[test]
    fn every_frame_is_abandoned_when_acks_cannot_arrive_in_time() {
        let settings = DroneSettings {
            ack_timeout: Some(Duration::from_millis(1)),
            max_retries: 1,
            ..DroneSettings::default()
        };
        let report = build(2, settings, 1).simulate(Duration::from_millis(2500)).unwrap();

        // Frames 1 and 2 each go out twice and are dropped; all four ACKs are stale.
        assert_eq!(report.stats.data_sent, 2);
        assert_eq!(report.stats.data_retransmitted, 2);
        assert_eq!(report.stats.ack_timeouts, 4);
        assert_eq!(report.stats.frames_abandoned, 2);
        assert_eq!(report.stats.stale_acks, 4);
        assert_eq!(report.stats.acks_accepted, 0);
        assert!(report.pending.is_empty());
    }
}
