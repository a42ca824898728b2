// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A queue model that remembers when the resource was free.
//!
//! The model keeps an ordered list of free intervals `[start, end)`. The last
//! interval is always open-ended. An arrival is placed in the first free
//! interval that can hold its whole processing time from the later of the
//! interval start and the arrival time.
//!
//! Gaps shorter than the minimum processing time are dropped because no
//! arrival could ever use them, and the list is bounded so that old history
//! is eventually forgotten. Arrivals older than the remembered history are
//! not charged any delay.

use std::cmp::max;
use std::collections::VecDeque;

use crate::queue_model::{QueueModel, QueueModelType};

pub const DEFAULT_MAX_LIST_SIZE: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq)]
struct FreeInterval {
    start: u64,
    end: u64,
}

pub struct HistoryListQueueModel {
    min_processing_time: u64,
    max_list_size: usize,
    free_intervals: VecDeque<FreeInterval>,
    history_start: u64,
    num_requests: u64,
    num_untracked_requests: u64,
}

impl HistoryListQueueModel {
    #[must_use]
    pub fn new(min_processing_time: u64) -> Self {
        Self::new_with_max_list_size(min_processing_time, DEFAULT_MAX_LIST_SIZE)
    }

    #[must_use]
    pub fn new_with_max_list_size(min_processing_time: u64, max_list_size: usize) -> Self {
        let mut free_intervals = VecDeque::new();
        free_intervals.push_back(FreeInterval {
            start: 0,
            end: u64::MAX,
        });
        Self {
            min_processing_time,
            // The open-ended interval must never be dropped
            max_list_size: max(max_list_size, 1),
            free_intervals,
            history_start: 0,
            num_requests: 0,
            num_untracked_requests: 0,
        }
    }

    /// Number of arrivals that were older than the remembered history.
    #[must_use]
    pub fn num_untracked_requests(&self) -> u64 {
        self.num_untracked_requests
    }

    #[must_use]
    pub fn num_requests(&self) -> u64 {
        self.num_requests
    }

    fn is_usable(&self, start: u64, end: u64) -> bool {
        end == u64::MAX || end - start >= max(self.min_processing_time, 1)
    }

    fn trim(&mut self) {
        while self.free_intervals.len() > self.max_list_size {
            if let Some(forgotten) = self.free_intervals.pop_front() {
                self.history_start = max(self.history_start, forgotten.end);
            }
        }
    }
}

impl QueueModel for HistoryListQueueModel {
    fn compute_queue_delay(&mut self, arrival_time: u64, processing_time: u64) -> u64 {
        self.num_requests += 1;

        if arrival_time < self.history_start {
            self.num_untracked_requests += 1;
            return 0;
        }

        let position = self.free_intervals.iter().position(|interval| {
            let start = max(interval.start, arrival_time);
            interval.end > arrival_time
                && (interval.end == u64::MAX || start.saturating_add(processing_time) <= interval.end)
        });

        // The last interval is open-ended so a position is always found
        let Some(index) = position else {
            self.num_untracked_requests += 1;
            return 0;
        };

        let interval = self.free_intervals[index];
        let service_start = max(interval.start, arrival_time);
        let service_end = service_start.saturating_add(processing_time);

        let mut replacement = Vec::with_capacity(2);
        if service_start > interval.start && self.is_usable(interval.start, service_start) {
            replacement.push(FreeInterval {
                start: interval.start,
                end: service_start,
            });
        }
        if self.is_usable(service_end, interval.end) {
            replacement.push(FreeInterval {
                start: service_end,
                end: interval.end,
            });
        }

        self.free_intervals.remove(index);
        for (offset, free) in replacement.into_iter().enumerate() {
            self.free_intervals.insert(index + offset, free);
        }
        self.trim();

        service_start - arrival_time
    }

    fn kind(&self) -> QueueModelType {
        QueueModelType::HistoryList
    }
}
