// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Queueing-delay models of a single shared resource.
//!
//! A queue model is fed every arrival seen by one physical channel over the
//! whole run and returns the extra wait each arrival incurs because of the
//! arrivals that came before it. Models are never reset.
//!
//! The discipline is chosen by configuration using [`QueueModelType`]:
//!  - [`basic`](basic::BasicQueueModel): work-conserving single server.
//!  - [`history_list`](history_list::HistoryListQueueModel): keeps a list of
//!    free intervals so that slightly out-of-order arrivals can use earlier
//!    gaps.
//!  - [`m_g_1`](m_g_1::MG1QueueModel): analytic M/G/1 waiting time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::SimError;

pub mod basic;
pub mod history_list;
pub mod m_g_1;

pub use basic::BasicQueueModel;
pub use history_list::HistoryListQueueModel;
pub use m_g_1::MG1QueueModel;

/// Contract of a queueing-delay model.
pub trait QueueModel: Send {
    /// Return the time an arrival at `arrival_time` needing `processing_time`
    /// ticks of service waits beyond its own service time.
    fn compute_queue_delay(&mut self, arrival_time: u64, processing_time: u64) -> u64;

    /// Name of the queueing discipline.
    fn kind(&self) -> QueueModelType;
}

/// The queueing disciplines that can be selected.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueueModelType {
    #[default]
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "history_list")]
    HistoryList,
    #[serde(rename = "m_g_1")]
    MG1,
}

impl fmt::Display for QueueModelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueModelType::Basic => write!(f, "basic"),
            QueueModelType::HistoryList => write!(f, "history_list"),
            QueueModelType::MG1 => write!(f, "m_g_1"),
        }
    }
}

impl FromStr for QueueModelType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(QueueModelType::Basic),
            "history_list" => Ok(QueueModelType::HistoryList),
            "m_g_1" => Ok(QueueModelType::MG1),
            _ => Err(SimError(format!("Unrecognized queue model type '{s}'"))),
        }
    }
}

/// Create a boxed queue model of the given type.
///
/// `min_processing_time` is the smallest service time the resource is
/// expected to see; models that track free time use it to discard gaps that
/// could never be used.
#[must_use]
pub fn create_queue_model(kind: QueueModelType, min_processing_time: u64) -> Box<dyn QueueModel> {
    match kind {
        QueueModelType::Basic => Box::new(BasicQueueModel::new()),
        QueueModelType::HistoryList => Box::new(HistoryListQueueModel::new(min_processing_time)),
        QueueModelType::MG1 => Box::new(MG1QueueModel::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        for kind in [
            QueueModelType::Basic,
            QueueModelType::HistoryList,
            QueueModelType::MG1,
        ] {
            assert_eq!(kind.to_string().parse::<QueueModelType>(), Ok(kind));
            assert_eq!(create_queue_model(kind, 1).kind(), kind);
        }
        assert!("fifo".parse::<QueueModelType>().is_err());
    }
}
