// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::cmp::max;

use crate::queue_model::{QueueModel, QueueModelType};

/// A single server that is busy until `queue_time`.
///
/// Each arrival waits until the server becomes free and then occupies it for
/// its processing time. Arrivals earlier than the last one seen are treated
/// as arriving at the time the server was last freed.
#[derive(Default)]
pub struct BasicQueueModel {
    queue_time: u64,
}

impl BasicQueueModel {
    #[must_use]
    pub fn new() -> Self {
        Self { queue_time: 0 }
    }
}

impl QueueModel for BasicQueueModel {
    fn compute_queue_delay(&mut self, arrival_time: u64, processing_time: u64) -> u64 {
        let queue_delay = self.queue_time.saturating_sub(arrival_time);
        self.queue_time = max(self.queue_time, arrival_time) + processing_time;
        queue_delay
    }

    fn kind(&self) -> QueueModelType {
        QueueModelType::Basic
    }
}
