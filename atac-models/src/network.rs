// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The network of all cores.
//!
//! [`Network`] owns one [`AtacClusterModel`] per core and is the
//! [`NetworkContext`] the models route with. A model reaches the hub of
//! another cluster by asking the context for the [`HubEndpoint`] of the core
//! hosting it.

use std::io::Write;
use std::sync::Arc;

use atac_track::entity::Entity;
use atac_track::info;

use crate::atac_cluster::AtacClusterModel;
use crate::config::SystemConfig;
use crate::hub::HubEndpoint;
use crate::packet::{Hop, NetPacket, PacketType};
use crate::sim_error;
use crate::topology::Topology;
use crate::types::{CoreId, SimError, SimResult};

/// What a model needs from the rest of the simulator.
pub trait NetworkContext {
    /// Length of the packet in bytes as seen by the network, including any
    /// header.
    fn modeled_length(&self, packet: &NetPacket) -> usize;

    /// Resolve the core that requested a shared-memory packet.
    fn shmem_requester(&self, packet: &NetPacket) -> Result<CoreId, SimError>;

    /// The hub endpoint hosted on a core for packets of the given type.
    fn hub_endpoint(
        &self,
        core_id: CoreId,
        packet_type: PacketType,
    ) -> Result<&dyn HubEndpoint, SimError>;
}

/// Resolves the requester from a shared-memory payload.
pub trait RequesterLookup: Send + Sync {
    fn requester(&self, data: &[u8]) -> Result<CoreId, SimError>;
}

/// Size of the requester field at the start of a shared-memory payload.
pub const SHMEM_REQUESTER_BYTES: usize = 4;

/// Reads the requester as a little-endian `u32` from the start of the
/// payload.
pub struct ShmemHeaderLookup;

impl ShmemHeaderLookup {
    /// Build a payload that starts with the given requester.
    #[must_use]
    pub fn payload(requester: CoreId, body: &[u8]) -> Vec<u8> {
        let mut data = (requester as u32).to_le_bytes().to_vec();
        data.extend_from_slice(body);
        data
    }
}

impl RequesterLookup for ShmemHeaderLookup {
    fn requester(&self, data: &[u8]) -> Result<CoreId, SimError> {
        match data.first_chunk::<SHMEM_REQUESTER_BYTES>() {
            Some(bytes) => Ok(u32::from_le_bytes(*bytes) as CoreId),
            None => sim_error!(format!(
                "Shared memory payload of {} bytes has no requester",
                data.len()
            )),
        }
    }
}

pub struct Network {
    pub entity: Arc<Entity>,
    topology: Arc<Topology>,
    packet_header_bytes: usize,
    models: Vec<AtacClusterModel>,
    requester_lookup: Box<dyn RequesterLookup>,
}

impl Network {
    /// Build the models of all cores in `config`.
    pub fn new(parent: &Arc<Entity>, config: &SystemConfig) -> Result<Self, SimError> {
        Self::new_with_requester_lookup(parent, config, Box::new(ShmemHeaderLookup))
    }

    pub fn new_with_requester_lookup(
        parent: &Arc<Entity>,
        config: &SystemConfig,
        requester_lookup: Box<dyn RequesterLookup>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let topology = Arc::new(Topology::new(
            config.total_cores,
            config.atac_cluster.cluster_size,
        )?);

        let entity = Arc::new(Entity::new(parent, "network"));
        info!(entity ; "{}", topology);

        let models = (0..config.total_cores)
            .map(|core_id| {
                let core = Arc::new(Entity::new_indexed(parent, "core", core_id));
                AtacClusterModel::new(&core, core_id, config, topology.clone())
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        Ok(Self {
            entity,
            topology,
            packet_header_bytes: config.packet_header_bytes,
            models,
            requester_lookup,
        })
    }

    #[must_use]
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    #[must_use]
    pub fn num_cores(&self) -> usize {
        self.models.len()
    }

    pub fn model(&self, core_id: CoreId) -> Result<&AtacClusterModel, SimError> {
        match self.models.get(core_id) {
            Some(model) => Ok(model),
            None => sim_error!(format!("No model for core {core_id}")),
        }
    }

    /// Route a packet from its sender.
    pub fn route_packet(&self, packet: &NetPacket) -> Result<Vec<Hop>, SimError> {
        self.model(packet.sender)?.route_packet(packet, self)
    }

    /// Deliver a packet at the destination of a hop.
    pub fn deliver(&self, packet: &NetPacket, hop: &Hop) -> SimResult {
        let mut received = packet.clone();
        received.time = hop.time;
        self.model(hop.final_dest)?
            .process_received_packet(&received, self)
    }

    pub fn enable_all(&self) {
        info!(self.entity ; "enable models");
        for model in &self.models {
            model.enable();
        }
    }

    pub fn disable_all(&self) {
        info!(self.entity ; "disable models");
        for model in &self.models {
            model.disable();
        }
    }

    pub fn output_summary(&self, out: &mut dyn Write) -> SimResult {
        for model in &self.models {
            writeln!(out, "Core {}:", model.core_id()).map_err(|e| SimError(e.to_string()))?;
            model.output_summary(out)?;
        }
        Ok(())
    }

    pub fn compute_memory_controller_positions(
        &self,
        num_memory_controllers: usize,
    ) -> Result<Vec<CoreId>, SimError> {
        self.model(0)?
            .compute_memory_controller_positions(num_memory_controllers)
    }
}

impl NetworkContext for Network {
    fn modeled_length(&self, packet: &NetPacket) -> usize {
        packet.data.len() + self.packet_header_bytes
    }

    fn shmem_requester(&self, packet: &NetPacket) -> Result<CoreId, SimError> {
        self.requester_lookup.requester(&packet.data)
    }

    fn hub_endpoint(
        &self,
        core_id: CoreId,
        packet_type: PacketType,
    ) -> Result<&dyn HubEndpoint, SimError> {
        match self.models.get(core_id) {
            Some(model) => Ok(model),
            None => sim_error!(format!(
                "No hub endpoint on core {core_id} for {packet_type} packets"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use atac_track::entity::toplevel;
    use atac_track::tracker::dev_null_tracker;

    use super::*;
    use crate::packet::Destination;

    #[test]
    fn shmem_requester_from_payload() {
        let data = ShmemHeaderLookup::payload(7, &[1, 2, 3]);
        assert_eq!(data.len(), 7);
        assert_eq!(ShmemHeaderLookup.requester(&data), Ok(7));
        assert!(ShmemHeaderLookup.requester(&[1, 2]).is_err());
    }

    #[test]
    fn one_model_per_core() {
        let top = toplevel(&dev_null_tracker(), "top");
        let network = Network::new(&top, &SystemConfig::default()).unwrap();
        assert_eq!(network.num_cores(), 20);
        assert_eq!(network.model(7).unwrap().core_id(), 7);
        assert!(network.model(20).is_err());
        assert_eq!(
            network.model(3).unwrap().entity.full_name(),
            "top::core3::atac"
        );
    }

    #[test]
    fn invalid_topology_is_rejected() {
        let top = toplevel(&dev_null_tracker(), "top");
        let config = SystemConfig {
            total_cores: 16,
            ..Default::default()
        };
        assert!(Network::new(&top, &config).is_err());
    }

    #[test]
    fn modeled_length_adds_header() {
        let top = toplevel(&dev_null_tracker(), "top");
        let network = Network::new(&top, &SystemConfig::default()).unwrap();
        let packet = NetPacket::new(0, Destination::Core(1), PacketType::User1, vec![0; 8], 0);
        assert_eq!(network.modeled_length(&packet), 16);
    }
}
