// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The optical hub of a cluster.
//!
//! A hub has one sender channel onto the optical bus and `B` receiver
//! channels, one per electrical broadcast network inside the cluster. Each
//! channel owns a queue model which sees every arrival over the whole run.
//!
//! Any core may ask a hub for a contention delay so the channels are guarded
//! by two locks: one for the sender and one shared by all receivers. A
//! sender request and a receiver request can therefore be served at the same
//! time.

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};

use atac_track::entity::Entity;
use atac_track::{trace, value};

use crate::config::AtacClusterConfig;
use crate::queue_model::{QueueModel, create_queue_model};
use crate::sim_error;
use crate::types::{ClusterId, SimError};

/// Smallest processing time any packet can have at a hub.
pub const MIN_PROCESSING_TIME: u64 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HubType {
    Sender,
    Receiver,
}

impl Display for HubType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubType::Sender => write!(f, "sender"),
            HubType::Receiver => write!(f, "receiver"),
        }
    }
}

/// A request for the contention delay at a hub.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HubRequest {
    pub hub_type: HubType,

    /// Cluster of the core that sent the packet.
    pub sender_cluster: ClusterId,

    /// Time at which the packet arrives at the hub.
    pub packet_time: u64,

    /// Modelled length of the packet in bytes.
    pub packet_length: usize,
}

/// Anything that can answer a [`HubRequest`].
///
/// Routing only ever talks to hubs through this trait so that the hub
/// can live on any core.
pub trait HubEndpoint: Send + Sync {
    fn compute_hub_queue_delay(&self, request: &HubRequest) -> Result<u64, SimError>;
}

/// Cycles needed to push `packet_length` bytes through a channel moving
/// `bandwidth` bits per cycle. Partial cycles are rounded up.
#[must_use]
pub fn compute_processing_time(packet_length: usize, bandwidth: u64) -> u64 {
    let bits = packet_length as u64 * 8;
    bits.div_ceil(bandwidth)
}

/// Contention seen by one hub channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelStats {
    pub total_contention_delay: u64,
    pub total_packets: u64,
}

impl ChannelStats {
    fn record(&mut self, delay: u64) {
        self.total_contention_delay += delay;
        self.total_packets += 1;
    }

    /// Mean contention delay per packet, zero when no packets were seen.
    #[must_use]
    pub fn mean_contention_delay(&self) -> f64 {
        if self.total_packets == 0 {
            0.0
        } else {
            self.total_contention_delay as f64 / self.total_packets as f64
        }
    }
}

struct HubChannel {
    model: Box<dyn QueueModel>,
    stats: ChannelStats,
}

impl HubChannel {
    fn new(config: &AtacClusterConfig) -> Self {
        Self {
            model: create_queue_model(config.queue_model.kind, MIN_PROCESSING_TIME),
            stats: ChannelStats::default(),
        }
    }

    fn compute_delay(&mut self, packet_time: u64, processing_time: u64) -> u64 {
        let delay = self.model.compute_queue_delay(packet_time, processing_time);
        self.stats.record(delay);
        delay
    }
}

pub struct OpticalHub {
    pub entity: Arc<Entity>,
    cluster_id: ClusterId,
    optical_bus_bandwidth: u64,
    sender: Mutex<HubChannel>,
    receivers: Mutex<Box<[HubChannel]>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, SimError> {
    mutex
        .lock()
        .map_err(|_| SimError(format!("{what} hub lock poisoned")))
}

impl OpticalHub {
    #[must_use]
    pub fn new(parent: &Arc<Entity>, cluster_id: ClusterId, config: &AtacClusterConfig) -> Self {
        let receivers: Box<[HubChannel]> = (0..config
            .num_electrical_broadcast_networks_per_cluster)
            .map(|_| HubChannel::new(config))
            .collect();
        Self {
            entity: Arc::new(Entity::new(parent, "hub")),
            cluster_id,
            optical_bus_bandwidth: config.optical_bus_bandwidth,
            sender: Mutex::new(HubChannel::new(config)),
            receivers: Mutex::new(receivers),
        }
    }

    #[must_use]
    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    /// Charge a packet to the hub and return its contention delay.
    ///
    /// Sender requests must come from this hub's own cluster. Receiver
    /// requests use the broadcast network `sender_cluster % B`.
    pub fn compute_queue_delay(&self, request: &HubRequest) -> Result<u64, SimError> {
        let processing_time =
            compute_processing_time(request.packet_length, self.optical_bus_bandwidth);

        let delay = match request.hub_type {
            HubType::Sender => {
                if request.sender_cluster != self.cluster_id {
                    return sim_error!(format!(
                        "{}: sender hub request from cluster {} at hub of cluster {}",
                        self.entity, request.sender_cluster, self.cluster_id
                    ));
                }
                let mut sender = lock(&self.sender, "Sender")?;
                sender.compute_delay(request.packet_time, processing_time)
            }
            HubType::Receiver => {
                let mut receivers = lock(&self.receivers, "Receiver")?;
                let channel = request.sender_cluster % receivers.len();
                receivers[channel].compute_delay(request.packet_time, processing_time)
            }
        };

        trace!(self.entity ; "{} delay {} for cluster {} @{}",
            request.hub_type, delay, request.sender_cluster, request.packet_time);
        value!(self.entity ; delay);
        Ok(delay)
    }

    pub fn sender_stats(&self) -> Result<ChannelStats, SimError> {
        Ok(lock(&self.sender, "Sender")?.stats)
    }

    pub fn receiver_stats(&self) -> Result<Vec<ChannelStats>, SimError> {
        let receivers = lock(&self.receivers, "Receiver")?;
        Ok(receivers.iter().map(|channel| channel.stats).collect())
    }
}
