// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Configuration of a simulation run.
//!
//! Values are taken from the following sources, later sources overriding
//! earlier ones:
//!  1. built-in defaults
//!  2. an optional TOML file
//!  3. environment variables prefixed with `ATAC_` (use `__` to separate
//!     nested keys, e.g. `ATAC_ATAC_CLUSTER__CLUSTER_SIZE=16`)
//!  4. command-line options

use std::path::Path;

use atac_models::config::SystemConfig;
use atac_models::sim_error;
use atac_models::types::{SimError, SimResult};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "ATAC_";

/// Synthetic traffic injected by every core.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrafficConfig {
    /// Packets sent by each core once the models are enabled.
    pub packets_per_core: usize,

    /// Packets sent by each core before the models are enabled.
    pub warmup_packets_per_core: usize,

    /// Cycles between packets injected by a core.
    pub injection_interval: u64,

    /// Fraction of packets that are broadcast.
    pub broadcast_fraction: f64,

    /// Fraction of unicast packets that are shared-memory packets.
    pub shared_memory_fraction: f64,

    pub payload_bytes: usize,

    pub seed: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            packets_per_core: 1000,
            warmup_packets_per_core: 100,
            injection_interval: 20,
            broadcast_fraction: 0.01,
            shared_memory_fraction: 0.5,
            payload_bytes: 56,
            seed: 0,
        }
    }
}

impl TrafficConfig {
    pub fn validate(&self) -> SimResult {
        for (name, fraction) in [
            ("Broadcast", self.broadcast_fraction),
            ("Shared memory", self.shared_memory_fraction),
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return sim_error!(format!("{name} fraction({fraction}) must be in [0, 1]"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SimConfig {
    #[serde(flatten)]
    pub system: SystemConfig,

    pub traffic: TrafficConfig,

    /// Number of memory controllers to place.
    pub num_memory_controllers: usize,
}

impl SimConfig {
    pub fn validate(&self) -> SimResult {
        self.system.validate()?;
        self.traffic.validate()
    }
}

/// Merge the defaults, configuration file and environment.
pub fn build_figment(conf_file: Option<&Path>) -> Result<Figment, SimError> {
    let mut figment = Figment::new().merge(Serialized::defaults(SimConfig::default()));
    if let Some(conf_file) = conf_file {
        if !conf_file.is_file() {
            return sim_error!(format!("{} not found", conf_file.display()));
        }
        figment = figment.merge(Toml::file(conf_file));
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

pub fn extract_config(figment: &Figment) -> Result<SimConfig, SimError> {
    figment
        .extract()
        .map_err(|e| SimError(format!("Invalid configuration: {e}")))
}
