// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Models of the ATAC cluster interconnect.
//!
//! The interconnect is an electrical mesh of cores overlaid with an optical
//! bus. Cores are grouped into square clusters and each cluster reaches the
//! optical bus through a single [hub](hub::OpticalHub). Packets between
//! clusters travel core -> hub over the mesh, hub -> hub over the optical
//! bus and hub -> core over an electrical broadcast network.
//!
//! The models compute the time at which each packet reaches its
//! destination(s), including the contention at the hubs given by a
//! [queue model](queue_model).
//!
//! # Example
//!
//! ```
//! use atac_models::config::SystemConfig;
//! use atac_models::network::Network;
//! use atac_models::packet::{Destination, NetPacket, PacketType};
//! use atac_track::entity::toplevel;
//! use atac_track::tracker::dev_null_tracker;
//!
//! let top = toplevel(&dev_null_tracker(), "top");
//! let network = Network::new(&top, &SystemConfig::default()).unwrap();
//! network.enable_all();
//!
//! let packet = NetPacket::new(5, Destination::Core(1), PacketType::User1, vec![0; 8], 100);
//! let hops = network.route_packet(&packet).unwrap();
//! assert_eq!(hops.len(), 1);
//! assert_eq!(hops[0].final_dest, 1);
//! ```

pub mod atac_cluster;
pub mod config;
pub mod counters;
pub mod hub;
pub mod network;
pub mod packet;
pub mod queue_model;
pub mod test_helpers;
pub mod topology;
pub mod types;
