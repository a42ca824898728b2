// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Performance counters and the per-core summary.

use std::fmt::Display;

use crate::hub::ChannelStats;
use crate::types::CoreId;

/// Totals over all packets delivered to a core while its model was enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReceiveCounters {
    pub total_bytes_received: u64,
    pub total_packets_received: u64,
    pub total_packet_latency: u64,
}

impl ReceiveCounters {
    pub fn record(&mut self, packet_length: usize, latency: u64) {
        self.total_packets_received += 1;
        self.total_bytes_received += packet_length as u64;
        self.total_packet_latency += latency;
    }

    #[must_use]
    pub fn mean_packet_latency(&self) -> f64 {
        if self.total_packets_received == 0 {
            0.0
        } else {
            self.total_packet_latency as f64 / self.total_packets_received as f64
        }
    }
}

/// Contention at a hub, per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct HubSummary {
    pub sender: ChannelStats,
    pub receivers: Vec<ChannelStats>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelSummary {
    pub core_id: CoreId,
    pub received: ReceiveCounters,

    /// Only present on cores hosting a hub with queueing enabled.
    pub hub: Option<HubSummary>,

    /// Number of receiver channels reported when there is no hub.
    pub num_broadcast_networks: usize,
}

impl ModelSummary {
    #[must_use]
    pub fn average_packet_latency(&self) -> f64 {
        self.received.mean_packet_latency()
    }
}

impl Display for ModelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "    bytes received: {}", self.received.total_bytes_received)?;
        writeln!(f, "    packets received: {}", self.received.total_packets_received)?;
        writeln!(f, "    average packet latency: {}", self.average_packet_latency())?;
        writeln!(f, " ATAC Cluster:")?;
        match &self.hub {
            Some(hub) => {
                writeln!(
                    f,
                    "    Sender Hub Contention Delay: {}",
                    hub.sender.mean_contention_delay()
                )?;
                for (i, receiver) in hub.receivers.iter().enumerate() {
                    writeln!(
                        f,
                        "    Receiver Hub ({i}) Contention Delay: {}",
                        receiver.mean_contention_delay()
                    )?;
                }
            }
            None => {
                writeln!(f, "    Sender Hub Contention Delay: NA")?;
                for i in 0..self.num_broadcast_networks {
                    writeln!(f, "    Receiver Hub ({i}) Contention Delay: NA")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_prints_zero() {
        let summary = ModelSummary {
            core_id: 0,
            received: ReceiveCounters::default(),
            hub: Some(HubSummary {
                sender: ChannelStats::default(),
                receivers: vec![ChannelStats::default(); 2],
            }),
            num_broadcast_networks: 2,
        };
        assert_eq!(
            summary.to_string(),
            "    bytes received: 0\n\
             \x20   packets received: 0\n\
             \x20   average packet latency: 0\n\
             \x20ATAC Cluster:\n\
             \x20   Sender Hub Contention Delay: 0\n\
             \x20   Receiver Hub (0) Contention Delay: 0\n\
             \x20   Receiver Hub (1) Contention Delay: 0\n"
        );
    }

    #[test]
    fn non_hub_core_prints_na() {
        let mut received = ReceiveCounters::default();
        received.record(16, 10);
        received.record(24, 5);
        let summary = ModelSummary {
            core_id: 1,
            received,
            hub: None,
            num_broadcast_networks: 1,
        };
        let text = summary.to_string();
        assert!(text.contains("    bytes received: 40\n"));
        assert!(text.contains("    packets received: 2\n"));
        assert!(text.contains("    average packet latency: 7.5\n"));
        assert!(text.contains("    Sender Hub Contention Delay: NA\n"));
        assert!(text.contains("    Receiver Hub (0) Contention Delay: NA\n"));
        assert!(!text.contains("Receiver Hub (1)"));
    }
}
