//! Shared broadcast medium.
//!
//! Every frame put on the channel reaches all other attached endpoints after
//! `propagation_delay + transmission_time`. Each endpoint keeps a list of
//! in-flight receptions with their airtime windows; two receptions whose
//! windows overlap at the same endpoint destroy each other there.
//!
//! The channel never calls into node logic. It schedules reception events on
//! the event queue, and each reception event hands its outcome to the
//! [`ChannelHost`] that owns the channel.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::event_queue::{EventQueue, SimError};
use super::types::{Frame, NodeAddress, NodeId, SimTime};

/// Physical parameters of the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelParameters {
    pub bandwidth_bps: u64,
    pub propagation_delay: Duration,
}

/// Errors raised by channel setup and transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The destination address does not belong to any attached endpoint.
    UnknownDestination(NodeAddress),
    /// The sender is not attached to this channel.
    DetachedSender(NodeId),
    /// Endpoint id or address already attached.
    DuplicateEndpoint(NodeId, NodeAddress),
    /// Attachment attempted after the endpoint set was sealed.
    Sealed,
    /// Scheduling the reception failed.
    Schedule(SimError),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::UnknownDestination(address) => write!(f, "Unknown destination {}", address),
            ChannelError::DetachedSender(id) => write!(f, "Node {} is not attached to the channel", id),
            ChannelError::DuplicateEndpoint(id, address) => write!(f, "Endpoint {} ({}) is already attached", id, address),
            ChannelError::Sealed => write!(f, "Channel endpoints are sealed"),
            ChannelError::Schedule(err) => write!(f, "Failed to schedule reception: {}", err),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<SimError> for ChannelError {
    fn from(err: SimError) -> Self {
        ChannelError::Schedule(err)
    }
}

/// What a reception event found when it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceptionOutcome {
    Delivered(Frame),
    Collided(Frame),
}

/// Owner of a channel that wants to be told about completed receptions.
pub trait ChannelHost: Sized + 'static {
    fn channel_mut(&mut self) -> &mut Channel;

    /// Called once per reception, at its arrival time.
    fn on_reception(&mut self, queue: &mut EventQueue<Self>, endpoint: NodeId, outcome: ReceptionOutcome) -> Result<(), SimError>;
}

/// Summary of a successful `transmit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitReport {
    /// Number of endpoints a reception was scheduled for.
    pub receivers: usize,
    /// Arrival time at every receiver.
    pub arrival: SimTime,
    /// Number of receptions (new and in-flight) that this frame collided with.
    pub collisions: usize,
}

/// A frame on its way to one endpoint.
#[derive(Debug, Clone)]
struct InFlightReception {
    id: u64,
    frame: Frame,
    /// Transmission window at the sender, `[start, end)`.
    start_time: SimTime,
    end_time: SimTime,
    collided: bool,
}

impl InFlightReception {
    fn overlaps(&self, start: SimTime, end: SimTime) -> bool {
        self.start_time < end && start < self.end_time
    }
}

/// Single broadcast medium shared by the whole fleet.
#[derive(Debug)]
pub struct Channel {
    parameters: ChannelParameters,
    endpoints: BTreeMap<NodeId, NodeAddress>,
    addresses: BTreeMap<NodeAddress, NodeId>,
    sealed: bool,
    in_flight: BTreeMap<NodeId, Vec<InFlightReception>>,
    next_reception_id: u64,
}

/// On-air time of `payload_size` bytes at `bandwidth_bps`, rounded down to the nanosecond.
pub fn calculate_transmission_time(payload_size: u32, bandwidth_bps: u64) -> Duration {
    if bandwidth_bps == 0 {
        return Duration::MAX;
    }
    let bits = payload_size as u128 * 8;
    let nanos = bits * 1_000_000_000 / bandwidth_bps as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

impl Channel {
    pub fn new(parameters: ChannelParameters) -> Self {
        Self {
            parameters,
            endpoints: BTreeMap::new(),
            addresses: BTreeMap::new(),
            sealed: false,
            in_flight: BTreeMap::new(),
            next_reception_id: 0,
        }
    }

    pub fn parameters(&self) -> ChannelParameters {
        self.parameters
    }

    /// Register an endpoint. Only allowed before [`Channel::seal`].
    pub fn attach(&mut self, id: NodeId, address: NodeAddress) -> Result<(), ChannelError> {
        if self.sealed {
            return Err(ChannelError::Sealed);
        }
        if self.endpoints.contains_key(&id) || self.addresses.contains_key(&address) {
            return Err(ChannelError::DuplicateEndpoint(id, address));
        }
        self.endpoints.insert(id, address);
        self.addresses.insert(address, id);
        Ok(())
    }

    /// Freeze the endpoint set for the rest of the run.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn address_of(&self, id: NodeId) -> Option<NodeAddress> {
        self.endpoints.get(&id).copied()
    }

    pub fn resolve(&self, address: NodeAddress) -> Option<NodeId> {
        self.addresses.get(&address).copied()
    }

    pub fn transmission_time(&self, payload_size: u32) -> Duration {
        calculate_transmission_time(payload_size, self.parameters.bandwidth_bps)
    }

    /// Number of receptions currently travelling towards `endpoint`.
    pub fn in_flight_count(&self, endpoint: NodeId) -> usize {
        self.in_flight.get(&endpoint).map_or(0, |list| list.len())
    }

    /// Put `frame` on the medium at `at_time`.
    ///
    /// Schedules one reception event per attached endpoint other than the
    /// sender. Nothing is scheduled when the destination is unknown.
    pub fn transmit<H: ChannelHost>(&mut self, queue: &mut EventQueue<H>, frame: Frame, at_time: SimTime) -> Result<TransmitReport, ChannelError> {
        if at_time < queue.now() {
            return Err(SimError::InvalidDelay {
                requested: at_time,
                now: queue.now(),
            }
            .into());
        }
        if !self.endpoints.contains_key(&frame.sender) {
            return Err(ChannelError::DetachedSender(frame.sender));
        }
        if !self.addresses.contains_key(&frame.destination) {
            return Err(ChannelError::UnknownDestination(frame.destination));
        }

        let airtime = self.transmission_time(frame.payload_size);
        let start_time = at_time;
        let end_time = at_time + airtime;
        let arrival = end_time + self.parameters.propagation_delay;

        let receivers: Vec<NodeId> = self.endpoints.keys().copied().filter(|&id| id != frame.sender).collect();
        let mut collisions = 0;

        for &endpoint in &receivers {
            let reception_id = self.next_reception_id;
            self.next_reception_id += 1;

            let pending = self.in_flight.entry(endpoint).or_default();
            let mut collided = false;
            for other in pending.iter_mut() {
                if other.overlaps(start_time, end_time) {
                    other.collided = true;
                    collided = true;
                    collisions += 1;
                }
            }
            pending.push(InFlightReception {
                id: reception_id,
                frame,
                start_time,
                end_time,
                collided,
            });

            queue.schedule_at(arrival, move |host: &mut H, queue: &mut EventQueue<H>| {
                match host.channel_mut().complete_reception(endpoint, reception_id) {
                    Some(outcome) => host.on_reception(queue, endpoint, outcome),
                    None => Ok(()),
                }
            })?;
        }

        Ok(TransmitReport {
            receivers: receivers.len(),
            arrival,
            collisions,
        })
    }

    /// Remove a finished reception and report whether it survived.
    fn complete_reception(&mut self, endpoint: NodeId, reception_id: u64) -> Option<ReceptionOutcome> {
        let pending = self.in_flight.get_mut(&endpoint)?;
        let index = pending.iter().position(|r| r.id == reception_id)?;
        let reception = pending.remove(index);
        if reception.collided {
            Some(ReceptionOutcome::Collided(reception.frame))
        } else {
            Some(ReceptionOutcome::Delivered(reception.frame))
        }
    }
}
