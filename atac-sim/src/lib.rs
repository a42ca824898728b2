// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Simulate synthetic traffic on the ATAC cluster interconnect.
//!
//! Every core of the [`Network`](atac_models::network::Network) runs on its
//! own thread and injects a mix of unicast, shared-memory and broadcast
//! packets. A warm-up phase is run with the models disabled so that only the
//! measured phase contributes to the contention and latency figures. At the
//! end the summary of every core is printed along with the cores chosen to
//! host memory controllers.
//!
//! # Usage
//!
//! ```text
//! atac-sim --config system.toml --total-cores 72 --cluster-size 16 --stdout
//! ```

pub mod config;
pub mod runner;
