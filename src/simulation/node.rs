//! Per-node state machines.
//!
//! Agents never touch the channel or the event queue themselves. Each handler
//! updates the agent state and returns a decision; the network turns decisions
//! into transmissions and timers. This keeps the transition rules testable on
//! their own.
//!
//! Drone transitions:
//! - `Idle --slot--> AwaitingAck` (sends DATA, or re-sends the outstanding frame)
//! - `AwaitingAck --ACK(seq)--> Idle`
//! - `AwaitingAck --timeout--> Idle` (retransmit at next slot, or abandon)
//!
//! The ground station is a stateless relay answering each DATA with an ACK.

use super::event_queue::EventId;
use super::types::{Frame, FrameKind, GCS_NODE_ID, NodeAddress, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// May start a new transmission at the next slot.
    Idle,
    /// A DATA frame is outstanding; new sends are refused.
    AwaitingAck,
}

/// Result of a drone's slot timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    Send { frame: Frame, retransmission: bool },
    /// The drone is still waiting for an ACK; the attempt is dropped, not queued.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Accepted,
    /// ACK for a sequence that is no longer outstanding.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// Send the frame again at the next slot.
    Retransmit(Frame),
    /// Retries exhausted; the frame is dropped.
    Abandon(Frame),
    /// The frame was acknowledged or replaced in the meantime.
    Obsolete,
}

/// Transmission state owned by each drone.
#[derive(Debug, Clone)]
pub struct DroneState {
    link: LinkState,
    outstanding: Option<Frame>,
    retransmit_pending: bool,
    /// Transmissions of the outstanding frame so far.
    attempts: u32,
    next_sequence: u32,
    pub(crate) slot_timer: Option<EventId>,
    pub(crate) ack_timer: Option<EventId>,
}

impl Default for DroneState {
    fn default() -> Self {
        Self::new()
    }
}

impl DroneState {
    pub fn new() -> Self {
        Self {
            link: LinkState::Idle,
            outstanding: None,
            retransmit_pending: false,
            attempts: 0,
            next_sequence: 1,
            slot_timer: None,
            ack_timer: None,
        }
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn outstanding(&self) -> Option<&Frame> {
        self.outstanding.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Slot timer fired.
    pub fn on_slot(&mut self, id: NodeId, gcs: NodeAddress, payload_size: u32) -> SlotDecision {
        if self.link == LinkState::AwaitingAck {
            return SlotDecision::Ignored;
        }

        let (frame, retransmission) = match self.outstanding {
            Some(frame) if self.retransmit_pending => {
                self.attempts += 1;
                (frame, true)
            }
            _ => {
                let frame = Frame::data(id, gcs, payload_size, self.next_sequence);
                self.next_sequence = self.next_sequence.wrapping_add(1);
                self.attempts = 1;
                (frame, false)
            }
        };

        self.outstanding = Some(frame);
        self.retransmit_pending = false;
        self.link = LinkState::AwaitingAck;
        SlotDecision::Send { frame, retransmission }
    }

    /// The frame returned by the last [`DroneState::on_slot`] never reached the
    /// medium. Drop it and go back to idle.
    pub fn on_send_failed(&mut self) {
        self.outstanding = None;
        self.retransmit_pending = false;
        self.attempts = 0;
        self.link = LinkState::Idle;
    }

    /// An ACK addressed to this drone arrived.
    ///
    /// A late ACK for a frame that timed out but is still waiting for its
    /// retransmission is accepted too; the retransmission becomes unnecessary.
    pub fn on_ack(&mut self, ack: &Frame) -> AckOutcome {
        match self.outstanding {
            Some(frame) if frame.sequence == ack.sequence => {
                self.outstanding = None;
                self.retransmit_pending = false;
                self.attempts = 0;
                self.link = LinkState::Idle;
                AckOutcome::Accepted
            }
            _ => AckOutcome::Stale,
        }
    }

    /// The ack-wait timer for `sequence` expired.
    pub fn on_timeout(&mut self, sequence: u32, max_retries: u32) -> TimeoutOutcome {
        let frame = match self.outstanding {
            Some(frame) if self.link == LinkState::AwaitingAck && frame.sequence == sequence => frame,
            _ => return TimeoutOutcome::Obsolete,
        };

        self.link = LinkState::Idle;
        if self.attempts <= max_retries {
            self.retransmit_pending = true;
            TimeoutOutcome::Retransmit(frame)
        } else {
            self.outstanding = None;
            self.retransmit_pending = false;
            self.attempts = 0;
            TimeoutOutcome::Abandon(frame)
        }
    }
}

/// Ground station bookkeeping. It keeps no per-drone state between receptions.
#[derive(Debug, Clone, Default)]
pub struct GcsState {
    acks_sent: u64,
}

impl GcsState {
    pub fn acks_sent(&self) -> u64 {
        self.acks_sent
    }

    /// Build the ACK answering `data`, addressed to `reply_to`.
    pub fn on_data(&mut self, data: &Frame, reply_to: NodeAddress, payload_size: u32) -> Frame {
        self.acks_sent += 1;
        Frame::ack_for(data, GCS_NODE_ID, reply_to, payload_size)
    }
}

#[derive(Debug, Clone)]
pub enum Role {
    Drone(DroneState),
    GroundStation(GcsState),
}

/// A simulated node: identity and role-specific state.
#[derive(Debug, Clone)]
pub struct NodeAgent {
    pub id: NodeId,
    pub address: NodeAddress,
    pub role: Role,
}

impl NodeAgent {
    pub fn ground_station(address: NodeAddress) -> Self {
        Self {
            id: GCS_NODE_ID,
            address,
            role: Role::GroundStation(GcsState::default()),
        }
    }

    pub fn drone(id: NodeId, address: NodeAddress) -> Self {
        Self {
            id,
            address,
            role: Role::Drone(DroneState::new()),
        }
    }

    pub fn is_drone(&self) -> bool {
        matches!(self.role, Role::Drone(_))
    }

    pub fn drone_state(&self) -> Option<&DroneState> {
        match &self.role {
            Role::Drone(state) => Some(state),
            Role::GroundStation(_) => None,
        }
    }

    /// Whether a frame on the medium is meant for this node.
    pub fn accepts(&self, frame: &Frame) -> bool {
        frame.destination == self.address
            && match self.role {
                Role::Drone(_) => frame.kind == FrameKind::Ack,
                Role::GroundStation(_) => frame.kind == FrameKind::Data,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(id: NodeId) -> NodeAddress {
        NodeAddress::derive(Ipv4Addr::new(10, 1, 1, 0), id).unwrap()
    }

    fn sent_frame(decision: SlotDecision) -> Frame {
        match decision {
            SlotDecision::Send { frame, .. } => frame,
            SlotDecision::Ignored => panic!("expected a send"),
        }
    }

    #[test]
    fn drone_send_then_ack_cycle() {
        let mut drone = DroneState::new();
        assert_eq!(drone.link(), LinkState::Idle);

        let frame = sent_frame(drone.on_slot(3, addr(0), 4));
        assert_eq!(frame.sender, 3);
        assert_eq!(frame.destination, addr(0));
        assert_eq!(frame.kind, FrameKind::Data);
        assert_eq!(frame.sequence, 1);
        assert_eq!(drone.link(), LinkState::AwaitingAck);
        assert_eq!(drone.outstanding(), Some(&frame));

        let ack = GcsState::default().on_data(&frame, addr(3), 4);
        assert_eq!(drone.on_ack(&ack), AckOutcome::Accepted);
        assert_eq!(drone.link(), LinkState::Idle);
        assert!(drone.outstanding().is_none());

        let next = sent_frame(drone.on_slot(3, addr(0), 4));
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn slot_while_awaiting_ack_is_dropped() {
        let mut drone = DroneState::new();
        let frame = sent_frame(drone.on_slot(1, addr(0), 4));

        assert_eq!(drone.on_slot(1, addr(0), 4), SlotDecision::Ignored);
        assert_eq!(drone.on_slot(1, addr(0), 4), SlotDecision::Ignored);

        // Still exactly the one original frame outstanding.
        assert_eq!(drone.outstanding(), Some(&frame));
        assert_eq!(drone.attempts(), 1);
    }

    #[test]
    fn stale_acks_are_ignored() {
        let mut drone = DroneState::new();
        let idle_ack = Frame::ack_for(&Frame::data(1, addr(0), 4, 1), GCS_NODE_ID, addr(1), 4);
        assert_eq!(drone.on_ack(&idle_ack), AckOutcome::Stale);

        let frame = sent_frame(drone.on_slot(1, addr(0), 4));
        let wrong = Frame::ack_for(&Frame::data(1, addr(0), 4, frame.sequence + 5), GCS_NODE_ID, addr(1), 4);
        assert_eq!(drone.on_ack(&wrong), AckOutcome::Stale);
        assert_eq!(drone.link(), LinkState::AwaitingAck);
    }

    #[test]
    fn timeout_retransmits_same_sequence_then_abandons() {
        let mut drone = DroneState::new();
        let frame = sent_frame(drone.on_slot(2, addr(0), 4));

        assert_eq!(drone.on_timeout(frame.sequence, 1), TimeoutOutcome::Retransmit(frame));
        assert_eq!(drone.link(), LinkState::Idle);

        match drone.on_slot(2, addr(0), 4) {
            SlotDecision::Send { frame: again, retransmission } => {
                assert!(retransmission);
                assert_eq!(again, frame);
            }
            SlotDecision::Ignored => panic!("expected retransmission"),
        }
        assert_eq!(drone.attempts(), 2);

        assert_eq!(drone.on_timeout(frame.sequence, 1), TimeoutOutcome::Abandon(frame));
        assert!(drone.outstanding().is_none());

        // A fresh sequence after abandoning.
        let next = sent_frame(drone.on_slot(2, addr(0), 4));
        assert_eq!(next.sequence, frame.sequence + 1);
    }

    #[test]
    fn timeout_after_ack_is_obsolete() {
        let mut drone = DroneState::new();
        let frame = sent_frame(drone.on_slot(2, addr(0), 4));
        let ack = Frame::ack_for(&frame, GCS_NODE_ID, addr(2), 4);
        drone.on_ack(&ack);

        assert_eq!(drone.on_timeout(frame.sequence, 3), TimeoutOutcome::Obsolete);
        assert_eq!(drone.link(), LinkState::Idle);
    }

    #[test]
    fn late_ack_cancels_pending_retransmission() {
        let mut drone = DroneState::new();
        let frame = sent_frame(drone.on_slot(2, addr(0), 4));
        drone.on_timeout(frame.sequence, 3);

        let ack = Frame::ack_for(&frame, GCS_NODE_ID, addr(2), 4);
        assert_eq!(drone.on_ack(&ack), AckOutcome::Accepted);

        let next = sent_frame(drone.on_slot(2, addr(0), 4));
        assert_eq!(next.sequence, frame.sequence + 1);
    }

    #[test]
    fn failed_send_returns_to_idle() {
        let mut drone = DroneState::new();
        let frame = sent_frame(drone.on_slot(2, addr(0), 4));
        drone.on_send_failed();

        assert_eq!(drone.link(), LinkState::Idle);
        assert!(drone.outstanding().is_none());
        assert_eq!(drone.on_timeout(frame.sequence, 3), TimeoutOutcome::Obsolete);
    }

    #[test]
    fn gcs_answers_each_data_frame() {
        let mut gcs = GcsState::default();
        let data = Frame::data(4, addr(0), 4, 9);
        let ack = gcs.on_data(&data, addr(4), 8);
        assert_eq!(ack.sender, GCS_NODE_ID);
        assert_eq!(ack.destination, addr(4));
        assert_eq!(ack.sequence, 9);
        assert_eq!(ack.payload_size, 8);

        gcs.on_data(&data, addr(4), 8);
        assert_eq!(gcs.acks_sent(), 2);
    }

    #[test]
    fn agents_filter_frames_by_address_and_kind() {
        let gcs = NodeAgent::ground_station(addr(0));
        let drone = NodeAgent::drone(1, addr(1));
        let data = Frame::data(2, addr(0), 4, 1);
        let ack = Frame::ack_for(&data, GCS_NODE_ID, addr(1), 4);
        let ack_other = Frame::ack_for(&data, GCS_NODE_ID, addr(2), 4);

        assert!(gcs.accepts(&data));
        assert!(!gcs.accepts(&ack));
        assert!(drone.accepts(&ack));
        assert!(!drone.accepts(&ack_other));
        assert!(!drone.accepts(&data));
        assert!(drone.is_drone());
        assert!(!gcs.is_drone());
    }
}
