// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::collections::HashMap;

use atac_models::config::SystemConfig;
use atac_models::hub::ChannelStats;
use atac_models::network::Network;
use atac_models::packet::Hop;
use atac_models::test_helpers::{
    create_broadcast, create_network, create_shmem, create_unicast, start_test,
};

// 20 cores in clusters of 4 with an electrical delay of 3 cycles, an optical
// hop of 3 cycles and 16 byte packets taking 2 cycles on the optical bus.
const PAYLOAD_BYTES: usize = 8;

fn config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.total_cores = 20;
    config.packet_header_bytes = 8;
    config.atac_cluster.cluster_size = 4;
    config.atac_cluster.electrical_mesh_hop_latency = 3;
    config.atac_cluster.optical_hop_latency = 3;
    config.atac_cluster.optical_bus_bandwidth = 64;
    config.atac_cluster.num_electrical_broadcast_networks_per_cluster = 2;
    config
}

fn single_hop(network: &Network, sender: usize, receiver: usize, time: u64) -> Hop {
    let hops = network
        .route_packet(&create_unicast(sender, receiver, PAYLOAD_BYTES, time))
        .unwrap();
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].next_dest, receiver);
    assert_eq!(hops[0].final_dest, receiver);
    hops[0]
}

fn sender_stats(network: &Network, hub_core: usize) -> ChannelStats {
    network
        .model(hub_core)
        .unwrap()
        .hub()
        .unwrap()
        .sender_stats()
        .unwrap()
}

fn receiver_stats(network: &Network, hub_core: usize) -> Vec<ChannelStats> {
    network
        .model(hub_core)
        .unwrap()
        .hub()
        .unwrap()
        .receiver_stats()
        .unwrap()
}

#[test]
fn same_core_is_immediate() {
    let top = start_test(file!());
    let network = create_network(&top, &config());
    assert_eq!(single_hop(&network, 6, 6, 77).time, 77);
}

#[test]
fn same_cluster_stays_electrical() {
    let top = start_test(file!());
    let network = create_network(&top, &config());

    // 3 + 3 + 2
    assert_eq!(single_hop(&network, 5, 1, 100).time, 108);

    // Repeating does not see any contention
    assert_eq!(single_hop(&network, 4, 1, 100).time, 108);
    assert_eq!(sender_stats(&network, 0).total_packets, 0);
}

#[test]
fn cross_cluster_adds_hub_delays() {
    let top = start_test(file!());
    let network = create_network(&top, &config());

    // 3 + 0 + 3 + 0 + 3 + 2
    assert_eq!(single_hop(&network, 0, 2, 100).time, 111);

    // Waits 2 cycles at the sender hub of cluster 0. It reaches the receiver
    // hub of cluster 1 just as the first packet leaves.
    assert_eq!(single_hop(&network, 1, 3, 100).time, 113);

    // From cluster 2 which also uses receiver channel 0 of cluster 1. The
    // channel is busy until 110 and this packet arrives at 106.
    assert_eq!(single_hop(&network, 8, 3, 100).time, 115);

    let stats = sender_stats(&network, 0);
    assert_eq!(stats.total_packets, 2);
    assert_eq!(stats.total_contention_delay, 2);
    assert_eq!(sender_stats(&network, 8).total_packets, 1);

    let receivers = receiver_stats(&network, 2);
    assert_eq!(receivers[0].total_packets, 3);
    assert_eq!(receivers[0].total_contention_delay, 4);
    assert_eq!(receivers[1].total_packets, 0);
}

#[test]
fn receiver_channel_chosen_by_sender_cluster() {
    let top = start_test(file!());
    let network = create_network(&top, &config());

    // Clusters 0 and 3 use different receiver channels at cluster 1
    assert_eq!(single_hop(&network, 0, 2, 100).time, 111);
    assert_eq!(single_hop(&network, 10, 2, 100).time, 111);

    let receivers = receiver_stats(&network, 2);
    assert_eq!(receivers[0].total_packets, 1);
    assert_eq!(receivers[1].total_packets, 1);
}

#[test]
fn queue_model_disabled() {
    let mut config = config();
    config.atac_cluster.queue_model.enabled = false;
    let top = start_test(file!());
    let network = create_network(&top, &config);

    for sender in [0, 1, 4, 5] {
        assert_eq!(single_hop(&network, sender, 2, 100).time, 111);
    }
    assert!(network.model(0).unwrap().hub().is_none());
}

#[test]
fn broadcast_reaches_every_core() {
    let top = start_test(file!());
    let network = create_network(&top, &config());

    // Occupy receiver channel 0 of cluster 1 until 108
    assert_eq!(single_hop(&network, 0, 2, 100).time, 111);

    let hops = network
        .route_packet(&create_broadcast(8, PAYLOAD_BYTES, 100))
        .unwrap();
    assert_eq!(hops.len(), 20);

    let topology = network.topology();
    let mut cluster_times = HashMap::new();
    for (core, hop) in hops.iter().enumerate() {
        assert_eq!(hop.next_dest, core);
        assert_eq!(hop.final_dest, core);

        let cluster = topology.cluster_of(core);
        let time = *cluster_times.entry(cluster).or_insert(hop.time);
        assert_eq!(hop.time, time);
    }

    // Arrives at the receiving hubs at 106, cluster 1 is busy until 108
    assert_eq!(cluster_times[&1], 113);
    for cluster in [0, 2, 3, 4, 5] {
        assert_eq!(cluster_times[&cluster], 111);
    }

    // One sender request, one receiver request per cluster
    assert_eq!(sender_stats(&network, 8).total_packets, 1);
    for cluster in 0..topology.num_clusters() {
        let hub_core = topology.hub_core_of(cluster);
        let expected = if cluster == 1 { 2 } else { 1 };
        assert_eq!(receiver_stats(&network, hub_core)[0].total_packets, expected);
    }
}

#[test]
fn disabled_network_is_timed_but_not_counted() {
    let top = start_test(file!());
    let network = Network::new(&top, &config()).unwrap();

    // Contention is not charged while disabled
    for sender in [0, 1, 4, 5] {
        assert_eq!(single_hop(&network, sender, 2, 100).time, 111);
    }
    assert_eq!(sender_stats(&network, 0).total_packets, 0);

    let packet = create_unicast(0, 2, PAYLOAD_BYTES, 100);
    let hops = network.route_packet(&packet).unwrap();
    network.deliver(&packet, &hops[0]).unwrap();
    let summary = network.model(2).unwrap().summary().unwrap();
    assert_eq!(summary.received.total_packets_received, 0);

    network.enable_all();
    network.deliver(&packet, &hops[0]).unwrap();
    let summary = network.model(2).unwrap().summary().unwrap();
    assert_eq!(summary.received.total_packets_received, 1);
    assert_eq!(summary.received.total_bytes_received, 16);
    assert_eq!(summary.received.total_packet_latency, 11);

    network.disable_all();
    network.deliver(&packet, &hops[0]).unwrap();
    let summary = network.model(2).unwrap().summary().unwrap();
    assert_eq!(summary.received.total_packets_received, 1);
}

#[test]
fn non_application_requesters_are_not_charged() {
    let mut config = config();
    config.application_cores = Some(4);
    let top = start_test(file!());
    let network = create_network(&top, &config);

    // Core 0 sends on behalf of core 10 which is not an application core
    for _ in 0..3 {
        let packet = create_shmem(0, 2, 10, PAYLOAD_BYTES - 4, 100);
        let hops = network.route_packet(&packet).unwrap();
        assert_eq!(hops[0].time, 111);
        network.deliver(&packet, &hops[0]).unwrap();
    }
    assert_eq!(sender_stats(&network, 0).total_packets, 0);
    let summary = network.model(2).unwrap().summary().unwrap();
    assert_eq!(summary.received.total_packets_received, 0);

    // Core 12 is not an application core either
    assert_eq!(single_hop(&network, 12, 0, 100).time, 111);
    assert_eq!(single_hop(&network, 12, 0, 100).time, 111);

    // The same packet requested by an application core is charged
    let packet = create_shmem(0, 2, 3, PAYLOAD_BYTES - 4, 100);
    assert_eq!(network.route_packet(&packet).unwrap()[0].time, 111);
    assert_eq!(network.route_packet(&packet).unwrap()[0].time, 113);
    assert_eq!(sender_stats(&network, 0).total_packets, 2);
}

#[test]
fn invalid_packets_are_errors() {
    let top = start_test(file!());
    let network = create_network(&top, &config());

    assert!(
        network
            .route_packet(&create_unicast(0, 20, PAYLOAD_BYTES, 0))
            .is_err()
    );
    assert!(
        network
            .route_packet(&create_unicast(20, 0, PAYLOAD_BYTES, 0))
            .is_err()
    );
    assert!(
        network
            .route_packet(&create_shmem(0, 2, 25, PAYLOAD_BYTES, 0))
            .is_err()
    );
}

#[test]
fn network_summary() {
    let top = start_test(file!());
    let network = create_network(&top, &config());

    let packet = create_unicast(0, 2, PAYLOAD_BYTES, 100);
    for _ in 0..2 {
        let hops = network.route_packet(&packet).unwrap();
        network.deliver(&packet, &hops[0]).unwrap();
    }

    let mut out = Vec::new();
    network.output_summary(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let core_0 = text.find("Core 0:\n").unwrap();
    let core_1 = text.find("Core 1:\n").unwrap();
    let core_2 = text.find("Core 2:\n").unwrap();
    let core_3 = text.find("Core 3:\n").unwrap();
    assert!(core_0 < core_1 && core_1 < core_2 && core_2 < core_3);

    // Hub of cluster 0 saw a sender delay of 0 then 2
    let hub_0 = &text[core_0..core_1];
    assert!(hub_0.contains("    Sender Hub Contention Delay: 1\n"));
    assert!(hub_0.contains("    Receiver Hub (0) Contention Delay: 0\n"));

    let non_hub = &text[core_1..core_2];
    assert!(non_hub.contains("    Sender Hub Contention Delay: NA\n"));
    assert!(non_hub.contains("    Receiver Hub (1) Contention Delay: NA\n"));

    // Latencies 11 and 13
    let receiver = &text[core_2..core_3];
    assert!(receiver.contains("    bytes received: 32\n"));
    assert!(receiver.contains("    packets received: 2\n"));
    assert!(receiver.contains("    average packet latency: 12\n"));
}

#[test]
fn memory_controllers_on_complete_clusters() {
    let top = start_test(file!());
    let network = create_network(&top, &config());
    assert_eq!(
        network.compute_memory_controller_positions(4).unwrap(),
        vec![0, 2, 8, 10]
    );
    assert!(network.compute_memory_controller_positions(5).is_err());
}
