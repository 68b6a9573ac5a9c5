//! Fleet construction: sizing, addressing and network setup.
//!
//! Node 0 is always the ground control station; nodes `1..N` are drones.
//! Everything here happens before the first event is scheduled, so any
//! failure is a setup error.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;

use super::config::SimConfig;
use crate::simulation::{ChannelError, GCS_NODE_ID, Network, NodeAddress, NodeAgent, NodeId};

/// Error type for fleet setup failures.
#[derive(Debug)]
pub enum FleetError {
    InvalidSize(String),
    AddressOverflow { base: Ipv4Addr, id: NodeId },
    Channel(ChannelError),
}

impl std::fmt::Display for FleetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FleetError::InvalidSize(msg) => write!(f, "Invalid fleet size: {}", msg),
            FleetError::AddressOverflow { base, id } => write!(f, "Address of node {} overflows base {}", id, base),
            FleetError::Channel(err) => write!(f, "Channel setup failed: {}", err),
        }
    }
}

impl std::error::Error for FleetError {}

impl From<ChannelError> for FleetError {
    fn from(err: ChannelError) -> Self {
        FleetError::Channel(err)
    }
}

/// Draw the number of nodes (GCS included) uniformly from `[min, max]`.
pub fn choose_fleet_size(min: u32, max: u32, seed: u64) -> Result<u32, FleetError> {
    if min < 1 {
        return Err(FleetError::InvalidSize("a fleet needs at least the ground station".to_string()));
    }
    if min > max {
        return Err(FleetError::InvalidSize(format!("range {}..={} is empty", min, max)));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(rng.gen_range(min..=max))
}

/// Build a sealed network of `nodes` nodes from `config`.
///
/// # Parameters
///
/// * `config` - Validated simulator configuration
/// * `nodes` - Fleet size including the ground station
/// * `seed` - Seed for the run's random number generator
pub fn build_network(config: &SimConfig, nodes: u32, seed: u64) -> Result<Network, FleetError> {
    if nodes < 1 {
        return Err(FleetError::InvalidSize("a fleet needs at least the ground station".to_string()));
    }

    let base = config.fleet.address_base;
    let address = |id: NodeId| NodeAddress::derive(base, id).ok_or(FleetError::AddressOverflow { base, id });

    let gcs = address(GCS_NODE_ID)?;
    let mut network = Network::new(config.channel_parameters(), config.drone_settings(), seed);
    network.add_node(NodeAgent::ground_station(gcs))?;
    for id in 1..nodes {
        network.add_node(NodeAgent::drone(id, address(id)?))?;
    }
    network.seal();

    log::info!(
        "Fleet ready: {} nodes ({} drones), GCS at {}",
        network.node_count(),
        network.drone_count(),
        gcs
    );
    Ok(network)
}
