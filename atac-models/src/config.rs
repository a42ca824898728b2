// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Configuration of the ATAC cluster network.
//!
//! All values are read once when the network is built. Any value that would
//! make the topology or timing unusable is reported as an error by
//! [`SystemConfig::validate`] and the simulation must not be started.

use serde::{Deserialize, Serialize};

use crate::queue_model::QueueModelType;
use crate::sim_error;
use crate::types::SimResult;

/// Default number of header bytes added to the payload of each packet.
pub const DEFAULT_PACKET_HEADER_BYTES: usize = 8;

/// Configuration of the queue models used by the optical hubs.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct QueueModelConfig {
    /// Model contention at the optical hubs.
    pub enabled: bool,

    /// The queueing discipline of each hub channel.
    #[serde(rename = "type")]
    pub kind: QueueModelType,
}

impl Default for QueueModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: QueueModelType::Basic,
        }
    }
}

/// Timing and shape of the clustered optical network.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AtacClusterConfig {
    /// Latency of the optical bus in clock cycles.
    pub optical_hop_latency: u64,

    /// Latency of one hop in the electrical mesh in clock cycles.
    pub electrical_mesh_hop_latency: u64,

    /// Number of bits the optical bus moves per cycle (number of wavelengths).
    pub optical_bus_bandwidth: u64,

    /// Number of electrical broadcast networks leaving each receiving hub.
    pub num_electrical_broadcast_networks_per_cluster: usize,

    /// Number of cores in a cluster, must be a perfect square.
    pub cluster_size: usize,

    pub queue_model: QueueModelConfig,
}

impl Default for AtacClusterConfig {
    fn default() -> Self {
        Self {
            optical_hop_latency: 3,
            electrical_mesh_hop_latency: 2,
            optical_bus_bandwidth: 64,
            num_electrical_broadcast_networks_per_cluster: 2,
            cluster_size: 4,
            queue_model: QueueModelConfig::default(),
        }
    }
}

impl AtacClusterConfig {
    /// Side length of a cluster, rounded down if the size is not square.
    #[must_use]
    pub fn sqrt_cluster_size(&self) -> usize {
        self.cluster_size.isqrt()
    }

    /// Delay from a core to its hub (and from a hub to a core) through the
    /// electrical mesh inside the cluster.
    #[must_use]
    pub fn cluster_electrical_network_delay(&self) -> u64 {
        self.electrical_mesh_hop_latency * self.sqrt_cluster_size().div_ceil(2) as u64
    }
}

/// The complete configuration consumed by the network.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SystemConfig {
    /// Total number of cores in the mesh.
    pub total_cores: usize,

    /// Number of cores running the application. Packets requested by other
    /// cores are timed but never charged contention.
    pub application_cores: Option<usize>,

    /// Bytes of header added to the payload of each packet.
    pub packet_header_bytes: usize,

    pub atac_cluster: AtacClusterConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            total_cores: 20,
            application_cores: None,
            packet_header_bytes: DEFAULT_PACKET_HEADER_BYTES,
            atac_cluster: AtacClusterConfig::default(),
        }
    }
}

impl SystemConfig {
    #[must_use]
    pub fn num_application_cores(&self) -> usize {
        self.application_cores.unwrap_or(self.total_cores)
    }

    /// Check the values that do not depend on the topology.
    ///
    /// The topology itself is checked by [`Topology::new`](crate::topology::Topology::new).
    pub fn validate(&self) -> SimResult {
        let cluster = &self.atac_cluster;
        if self.total_cores == 0 {
            return sim_error!("Total cores must be at least 1");
        }
        if self.num_application_cores() > self.total_cores {
            return sim_error!(format!(
                "Application cores({}) must not exceed total cores({})",
                self.num_application_cores(),
                self.total_cores
            ));
        }
        if cluster.optical_bus_bandwidth == 0 {
            return sim_error!("Optical bus bandwidth must be at least 1 bit/cycle");
        }
        if cluster.num_electrical_broadcast_networks_per_cluster == 0 {
            return sim_error!("At least one electrical broadcast network per cluster is required");
        }
        if cluster.cluster_size == 0 {
            return sim_error!("Cluster size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::Figment;
    use figment::providers::{Format, Serialized, Toml};

    use super::*;

    #[test]
    fn electrical_delay_rounds_half_cluster_up() {
        let mut config = AtacClusterConfig {
            electrical_mesh_hop_latency: 3,
            cluster_size: 4,
            ..Default::default()
        };
        assert_eq!(config.cluster_electrical_network_delay(), 3);

        config.cluster_size = 9;
        assert_eq!(config.cluster_electrical_network_delay(), 6);

        config.cluster_size = 16;
        assert_eq!(config.cluster_electrical_network_delay(), 6);
    }

    #[test]
    fn defaults_are_valid() {
        SystemConfig::default().validate().unwrap();
    }

    #[test]
    fn too_many_application_cores() {
        let config = SystemConfig {
            application_cores: Some(21),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_bandwidth() {
        let mut config = SystemConfig::default();
        config.atac_cluster.optical_bus_bandwidth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_toml_over_defaults() {
        let config: SystemConfig = Figment::from(Serialized::defaults(SystemConfig::default()))
            .merge(Toml::string(
                r#"
                total_cores = 72

                [atac_cluster]
                cluster_size = 16

                [atac_cluster.queue_model]
                type = "history_list"
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.total_cores, 72);
        assert_eq!(config.atac_cluster.cluster_size, 16);
        assert_eq!(
            config.atac_cluster.queue_model.kind,
            QueueModelType::HistoryList
        );
        assert!(config.atac_cluster.queue_model.enabled);
        assert_eq!(config.num_application_cores(), 72);
    }

    #[test]
    fn unknown_queue_model_is_rejected() {
        let result: Result<SystemConfig, _> =
            Figment::from(Serialized::defaults(SystemConfig::default()))
                .merge(Toml::string(
                    r#"
                    [atac_cluster.queue_model]
                    type = "fifo"
                    "#,
                ))
                .extract();
        assert!(result.is_err());
    }
}
