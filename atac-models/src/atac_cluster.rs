// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The ATAC cluster network model of one core.
//!
//! Every core owns an [`AtacClusterModel`]. The model on the top-left core of
//! each cluster also owns the cluster's [`OpticalHub`] when queueing is
//! enabled. Routing a packet composes the fixed electrical and optical
//! latencies with the contention delays returned by the hubs involved.
//!
//! # Latency
//!
//! With `E` the intra-cluster electrical delay, `O` the optical hop latency
//! and `P` the processing time of the packet on the optical bus:
//!
//!  - same core: `0`
//!  - same cluster: `E + E + P`
//!  - other cluster: `E + sender hub delay + O + receiver hub delay + E + P`
//!
//! A broadcast charges the sender hub once and the receiver hub of every
//! cluster once, then produces one hop per core.
//!
//! Hubs are always reached through [`NetworkContext::hub_endpoint`], never
//! directly, so the model does not need to know where other hubs live.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use atac_track::entity::Entity;
use atac_track::{debug, info, trace};

use crate::config::SystemConfig;
use crate::counters::{HubSummary, ModelSummary, ReceiveCounters};
use crate::hub::{HubEndpoint, HubRequest, HubType, OpticalHub, compute_processing_time};
use crate::network::NetworkContext;
use crate::packet::{Destination, Hop, NetPacket, PacketType};
use crate::sim_error;
use crate::topology::Topology;
use crate::types::{ClusterId, CoreId, SimError, SimResult};

pub struct AtacClusterModel {
    pub entity: Arc<Entity>,
    core_id: CoreId,
    num_application_cores: usize,
    topology: Arc<Topology>,

    optical_hop_latency: u64,
    optical_bus_bandwidth: u64,
    sender_cluster_electrical_network_delay: u64,
    receiver_cluster_electrical_network_delay: u64,
    queue_model_enabled: bool,
    num_broadcast_networks: usize,

    enabled: AtomicBool,

    /// Guards routing and receiving on this core.
    counters: Mutex<ReceiveCounters>,

    hub: Option<OpticalHub>,
}

impl AtacClusterModel {
    /// Create the model for `core_id`.
    ///
    /// The model starts disabled: packets are timed but no contention is
    /// charged and nothing is counted until [`enable`](Self::enable).
    pub fn new(
        parent: &Arc<Entity>,
        core_id: CoreId,
        config: &SystemConfig,
        topology: Arc<Topology>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let cluster_config = &config.atac_cluster;
        if topology.total_cores() != config.total_cores
            || topology.cluster_size() != cluster_config.cluster_size
        {
            return sim_error!(format!(
                "Topology({topology}) does not match {} cores in clusters of {}",
                config.total_cores, cluster_config.cluster_size
            ));
        }
        if core_id >= topology.total_cores() {
            return sim_error!(format!(
                "Core id({core_id}) must be less than total cores({})",
                topology.total_cores()
            ));
        }

        let entity = Arc::new(Entity::new(parent, "atac"));
        let queue_model_enabled = cluster_config.queue_model.enabled;
        let hub = if queue_model_enabled && topology.is_hub_core(core_id) {
            let cluster_id = topology.cluster_of(core_id);
            debug!(entity ; "hub for cluster {} using {} queue model",
                cluster_id, cluster_config.queue_model.kind);
            Some(OpticalHub::new(&entity, cluster_id, cluster_config))
        } else {
            None
        };

        let electrical_delay = cluster_config.cluster_electrical_network_delay();
        Ok(Self {
            entity,
            core_id,
            num_application_cores: config.num_application_cores(),
            topology,
            optical_hop_latency: cluster_config.optical_hop_latency,
            optical_bus_bandwidth: cluster_config.optical_bus_bandwidth,
            sender_cluster_electrical_network_delay: electrical_delay,
            receiver_cluster_electrical_network_delay: electrical_delay,
            queue_model_enabled,
            num_broadcast_networks: cluster_config.num_electrical_broadcast_networks_per_cluster,
            enabled: AtomicBool::new(false),
            counters: Mutex::new(ReceiveCounters::default()),
            hub,
        })
    }

    #[must_use]
    pub fn core_id(&self) -> CoreId {
        self.core_id
    }

    #[must_use]
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    #[must_use]
    pub fn hub(&self) -> Option<&OpticalHub> {
        self.hub.as_ref()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn lock_counters(&self) -> Result<MutexGuard<'_, ReceiveCounters>, SimError> {
        self.counters
            .lock()
            .map_err(|_| SimError(format!("{}: lock poisoned", self.entity)))
    }

    /// The core responsible for a packet.
    ///
    /// Shared-memory packets name their requester in the payload, all other
    /// packets are the responsibility of their sender.
    pub fn requester(
        &self,
        packet: &NetPacket,
        ctx: &dyn NetworkContext,
    ) -> Result<CoreId, SimError> {
        let requester = if packet.packet_type.is_shared_memory() {
            ctx.shmem_requester(packet)?
        } else {
            packet.sender
        };
        if requester >= self.topology.total_cores() {
            return sim_error!(format!("{}: invalid requester({requester})", self.entity));
        }
        Ok(requester)
    }

    /// Contention delay at the hub of `cluster_id`.
    ///
    /// Nothing is charged while this model is disabled, when queueing is not
    /// modelled or when the requester is not an application core.
    pub fn get_hub_queue_delay(
        &self,
        ctx: &dyn NetworkContext,
        cluster_id: ClusterId,
        request: &HubRequest,
        packet_type: PacketType,
        requester: CoreId,
    ) -> Result<u64, SimError> {
        if !self.is_enabled()
            || !self.queue_model_enabled
            || requester >= self.num_application_cores
        {
            return Ok(0);
        }

        let hub_core = self.topology.hub_core_of(cluster_id);
        ctx.hub_endpoint(hub_core, packet_type)?
            .compute_hub_queue_delay(request)
    }

    /// Compute the hops taken by a packet sent from this core.
    pub fn route_packet(
        &self,
        packet: &NetPacket,
        ctx: &dyn NetworkContext,
    ) -> Result<Vec<Hop>, SimError> {
        let _guard = self.lock_counters()?;

        let total_cores = self.topology.total_cores();
        if packet.sender >= total_cores {
            return sim_error!(format!("{}: invalid sender({})", self.entity, packet.sender));
        }
        let requester = self.requester(packet, ctx)?;

        let packet_length = ctx.modeled_length(packet);
        let processing_time = compute_processing_time(packet_length, self.optical_bus_bandwidth);
        let sender_cluster = self.topology.cluster_of(packet.sender);

        trace!(self.entity ; "route {}, requester {}, length {}", packet, requester, packet_length);

        let hub_request = |hub_type, packet_time| HubRequest {
            hub_type,
            sender_cluster,
            packet_time,
            packet_length,
        };

        // Time from the sender core to the receiving hubs
        let sender_to_receiver_hub = || -> Result<u64, SimError> {
            let sender_hub_delay = self.get_hub_queue_delay(
                ctx,
                sender_cluster,
                &hub_request(
                    HubType::Sender,
                    packet.time + self.sender_cluster_electrical_network_delay,
                ),
                packet.packet_type,
                requester,
            )?;
            Ok(self.sender_cluster_electrical_network_delay
                + sender_hub_delay
                + self.optical_hop_latency)
        };

        let receiver_hub_delay = |cluster_id, latency_to_hub: u64| {
            self.get_hub_queue_delay(
                ctx,
                cluster_id,
                &hub_request(HubType::Receiver, packet.time + latency_to_hub),
                packet.packet_type,
                requester,
            )
        };

        match packet.receiver {
            Destination::Broadcast => {
                let latency_to_hub = sender_to_receiver_hub()?;
                let receiver_hub_delays = (0..self.topology.num_clusters())
                    .map(|cluster_id| receiver_hub_delay(cluster_id, latency_to_hub))
                    .collect::<Result<Vec<u64>, SimError>>()?;

                let hops = (0..total_cores)
                    .map(|core_id| {
                        let cluster_id = self.topology.cluster_of(core_id);
                        let total_latency = latency_to_hub
                            + receiver_hub_delays[cluster_id]
                            + self.receiver_cluster_electrical_network_delay
                            + processing_time;
                        Hop {
                            next_dest: core_id,
                            final_dest: core_id,
                            time: packet.time + total_latency,
                        }
                    })
                    .collect();
                Ok(hops)
            }
            Destination::Core(receiver) => {
                if receiver >= total_cores {
                    return sim_error!(format!("{}: invalid receiver({receiver})", self.entity));
                }

                let receiver_cluster = self.topology.cluster_of(receiver);
                let total_latency = if packet.sender == receiver {
                    0
                } else if sender_cluster == receiver_cluster {
                    self.sender_cluster_electrical_network_delay
                        + self.receiver_cluster_electrical_network_delay
                        + processing_time
                } else {
                    let latency_to_hub = sender_to_receiver_hub()?;
                    let hub_delay = receiver_hub_delay(receiver_cluster, latency_to_hub)?;
                    latency_to_hub
                        + hub_delay
                        + self.receiver_cluster_electrical_network_delay
                        + processing_time
                };

                trace!(self.entity ; "latency {} to {}", total_latency, receiver);
                Ok(vec![Hop {
                    next_dest: receiver,
                    final_dest: receiver,
                    time: packet.time + total_latency,
                }])
            }
        }
    }

    /// Account for a packet that has reached this core.
    ///
    /// `packet.time` must be the arrival time.
    pub fn process_received_packet(
        &self,
        packet: &NetPacket,
        ctx: &dyn NetworkContext,
    ) -> SimResult {
        let mut counters = self.lock_counters()?;
        let requester = self.requester(packet, ctx)?;

        if !self.is_enabled() || requester >= self.num_application_cores {
            return Ok(());
        }

        if packet.time < packet.start_time {
            return sim_error!(format!(
                "{}: {} arrived @{} before it was sent @{}",
                self.entity, packet, packet.time, packet.start_time
            ));
        }
        let latency = packet.time - packet.start_time;
        counters.record(ctx.modeled_length(packet), latency);
        Ok(())
    }

    pub fn summary(&self) -> Result<ModelSummary, SimError> {
        let received = *self.lock_counters()?;
        let hub = match &self.hub {
            Some(hub) => Some(HubSummary {
                sender: hub.sender_stats()?,
                receivers: hub.receiver_stats()?,
            }),
            None => None,
        };
        Ok(ModelSummary {
            core_id: self.core_id,
            received,
            hub,
            num_broadcast_networks: self.num_broadcast_networks,
        })
    }

    pub fn output_summary(&self, out: &mut dyn Write) -> SimResult {
        let summary = self.summary()?;
        write!(out, "{summary}").map_err(|e| SimError(e.to_string()))
    }

    /// Cores that host memory controllers, one per complete cluster.
    pub fn compute_memory_controller_positions(
        &self,
        num_memory_controllers: usize,
    ) -> Result<Vec<CoreId>, SimError> {
        let cores = self.topology.memory_controller_cores(num_memory_controllers)?;
        info!(self.entity ; "memory controllers at {:?}", cores);
        Ok(cores)
    }
}

impl HubEndpoint for AtacClusterModel {
    fn compute_hub_queue_delay(&self, request: &HubRequest) -> Result<u64, SimError> {
        match &self.hub {
            Some(hub) => hub.compute_queue_delay(request),
            None => sim_error!(format!("{}: no optical hub on this core", self.entity)),
        }
    }
}
