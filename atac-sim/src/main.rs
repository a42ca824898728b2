// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Simulate synthetic traffic on the ATAC cluster interconnect.
//!
//! See `lib.rs` for details.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use atac_models::network::Network;
use atac_models::queue_model::QueueModelType;
use atac_models::types::SimError;
use atac_sim::config::{SimConfig, build_figment, extract_config};
use atac_sim::runner::run;
use atac_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use atac_track::entity::toplevel;
use atac_track::{Tracker, error, info};
use clap::Parser;

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "ATAC cluster interconnect traffic simulation")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entities should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Write log messages to a file.
    #[arg(long)]
    log_file: Option<String>,

    /// Level of log message to write to the file.
    #[arg(long, default_value = "Trace")]
    log_file_level: log::Level,

    /// Set a regular expression for which entities should have file output
    /// level set to `--log-file-level`. Others will have level set to
    /// `Error`.
    #[arg(long, default_value = "")]
    log_file_filter_regex: String,

    /// Override the total number of cores.
    #[arg(long)]
    total_cores: Option<usize>,

    /// Override the number of application cores.
    #[arg(long)]
    application_cores: Option<usize>,

    /// Override the number of cores in a cluster.
    #[arg(long)]
    cluster_size: Option<usize>,

    /// Override the queue model type (basic, history_list or m_g_1).
    #[arg(long)]
    queue_model: Option<String>,

    /// Disable modelling of contention at the hubs.
    #[arg(long)]
    no_queue_model: bool,

    /// Override the number of packets each core sends.
    #[arg(long)]
    packets_per_core: Option<usize>,

    /// Override the number of warm-up packets each core sends.
    #[arg(long)]
    warmup_packets_per_core: Option<usize>,

    /// Override the random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of memory controllers to place.
    #[arg(long)]
    num_memory_controllers: Option<usize>,
}

fn setup_all_trackers(args: &Cli) -> Result<Tracker, SimError> {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: args.stdout,
            level: args.stdout_level,
            filter_regex: &args.stdout_filter_regex,
            file: None,
        },
        log_file: TrackerConfig {
            enable: args.log_file.is_some(),
            level: args.log_file_level,
            filter_regex: &args.log_file_filter_regex,
            file: args.log_file.as_deref(),
        },
    };
    setup_trackers(&config).map_err(|e| SimError(e.to_string()))
}

/// Apply the command-line overrides to the configuration.
fn clap_merge(mut config: SimConfig, args: &Cli) -> Result<SimConfig, SimError> {
    if let Some(total_cores) = args.total_cores {
        config.system.total_cores = total_cores;
    }
    if args.application_cores.is_some() {
        config.system.application_cores = args.application_cores;
    }
    if let Some(cluster_size) = args.cluster_size {
        config.system.atac_cluster.cluster_size = cluster_size;
    }
    if let Some(queue_model) = &args.queue_model {
        config.system.atac_cluster.queue_model.kind = queue_model.parse::<QueueModelType>()?;
    }
    if args.no_queue_model {
        config.system.atac_cluster.queue_model.enabled = false;
    }
    if let Some(packets_per_core) = args.packets_per_core {
        config.traffic.packets_per_core = packets_per_core;
    }
    if let Some(warmup_packets_per_core) = args.warmup_packets_per_core {
        config.traffic.warmup_packets_per_core = warmup_packets_per_core;
    }
    if let Some(seed) = args.seed {
        config.traffic.seed = seed;
    }
    if let Some(num_memory_controllers) = args.num_memory_controllers {
        config.num_memory_controllers = num_memory_controllers;
    }
    Ok(config)
}

fn write_results(network: &Network, memory_controllers: &[usize]) -> Result<(), SimError> {
    let mut out = BufWriter::new(io::stdout());
    network.output_summary(&mut out)?;
    writeln!(out, "Memory controllers: {memory_controllers:?}")
        .and_then(|()| out.flush())
        .map_err(|e| SimError(e.to_string()))
}

fn main() -> Result<(), SimError> {
    let args = Cli::parse();

    let figment = build_figment(args.config.as_deref())?;
    let config = clap_merge(extract_config(&figment)?, &args)?;
    config.validate()?;

    let tracker = setup_all_trackers(&args)?;
    let top = toplevel(&tracker, "top");

    let network = match Network::new(&top, &config.system) {
        Ok(network) => network,
        Err(e) => {
            error!(top ; "{}", e);
            tracker.shutdown();
            return Err(e);
        }
    };
    info!(top ; "{} cores, {} queue model{}",
        network.num_cores(),
        config.system.atac_cluster.queue_model.kind,
        if config.system.atac_cluster.queue_model.enabled { "" } else { " (disabled)" });

    let result = run(&network, &config.traffic).and_then(|stats| {
        info!(top ; "sent {} packets, last arrival @{}",
            stats.measured.packets_sent, stats.measured.last_arrival_time);
        let memory_controllers =
            network.compute_memory_controller_positions(config.num_memory_controllers)?;
        write_results(&network, &memory_controllers)
    });

    if let Err(e) = &result {
        error!(top ; "{}", e);
    }
    tracker.shutdown();
    result
}
