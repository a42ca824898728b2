// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Analytic M/G/1 queue model.
//!
//! The mean waiting time is given by the Pollaczek-Khinchine formula
//!
//! ```text
//!   W = lambda * E[S^2] / (2 * (1 - rho))
//! ```
//!
//! where `lambda` is the observed arrival rate, `S` the service time and
//! `rho = lambda * E[S]` the utilisation. The statistics include the arrival
//! being charged.

use crate::queue_model::{QueueModel, QueueModelType};

/// Utilisation is clamped below one so that the delay stays finite.
pub const MAX_UTILISATION: f64 = 0.99;

#[derive(Default)]
pub struct MG1QueueModel {
    num_arrivals: u64,
    first_arrival_time: Option<u64>,
    newest_arrival_time: u64,
    service_time_sum: f64,
    service_time_squared_sum: f64,
}

impl MG1QueueModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of time the resource is busy based on arrivals seen so far.
    #[must_use]
    pub fn utilisation(&self) -> f64 {
        match self.arrival_rate() {
            Some(rate) => (rate * self.mean_service_time()).min(MAX_UTILISATION),
            None => 0.0,
        }
    }

    fn arrival_rate(&self) -> Option<f64> {
        let first = self.first_arrival_time?;
        let elapsed = self.newest_arrival_time.saturating_sub(first);
        if self.num_arrivals < 2 || elapsed == 0 {
            return None;
        }
        Some(self.num_arrivals as f64 / elapsed as f64)
    }

    fn mean_service_time(&self) -> f64 {
        if self.num_arrivals == 0 {
            return 0.0;
        }
        self.service_time_sum / self.num_arrivals as f64
    }
}

impl QueueModel for MG1QueueModel {
    fn compute_queue_delay(&mut self, arrival_time: u64, processing_time: u64) -> u64 {
        let service = processing_time as f64;
        self.num_arrivals += 1;
        self.service_time_sum += service;
        self.service_time_squared_sum += service * service;
        let first = *self.first_arrival_time.get_or_insert(arrival_time);
        self.first_arrival_time = Some(first.min(arrival_time));
        self.newest_arrival_time = self.newest_arrival_time.max(arrival_time);

        let Some(rate) = self.arrival_rate() else {
            return 0;
        };
        let rho = self.utilisation();
        let second_moment = self.service_time_squared_sum / self.num_arrivals as f64;
        let wait = rate * second_moment / (2.0 * (1.0 - rho));
        wait.round() as u64
    }

    fn kind(&self) -> QueueModelType {
        QueueModelType::MG1
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn first_arrival_has_no_delay() {
        let mut model = MG1QueueModel::new();
        assert_eq!(model.compute_queue_delay(100, 10), 0);
        assert_relative_eq!(model.utilisation(), 0.0);
    }

    #[test]
    fn delay_matches_formula() {
        let mut model = MG1QueueModel::new();
        // Arrivals every 10 ticks, each needing 5 ticks of service
        for i in 0..10 {
            model.compute_queue_delay(i * 10, 5);
        }
        // 11 arrivals over 100 ticks
        let delay = model.compute_queue_delay(100, 5);
        let rate = 11.0 / 100.0;
        let rho = rate * 5.0;
        let expected = rate * 25.0 / (2.0 * (1.0 - rho));
        assert_relative_eq!(model.utilisation(), rho);
        assert_eq!(delay, expected.round() as u64);
    }

    #[test]
    fn saturated_resource_is_clamped() {
        let mut model = MG1QueueModel::new();
        for i in 0..20 {
            model.compute_queue_delay(i, 10);
        }
        assert_relative_eq!(model.utilisation(), MAX_UTILISATION);
        let delay = model.compute_queue_delay(20, 10);
        assert!(delay > 100);
    }
}
