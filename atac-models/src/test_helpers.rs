// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::sync::Arc;

use atac_track::entity::{Entity, toplevel};
use atac_track::test_helpers::create_tracker;

use crate::config::SystemConfig;
use crate::network::{Network, ShmemHeaderLookup};
use crate::packet::{Destination, NetPacket, PacketType};
use crate::types::CoreId;

/// Create the top-level entity of a test.
#[must_use]
pub fn start_test(full_filepath: &str) -> Arc<Entity> {
    toplevel(&create_tracker(full_filepath), "top")
}

/// Build an enabled network for a test.
#[must_use]
pub fn create_network(top: &Arc<Entity>, config: &SystemConfig) -> Network {
    let network = Network::new(top, config).unwrap();
    network.enable_all();
    network
}

#[must_use]
pub fn create_unicast(
    sender: CoreId,
    receiver: CoreId,
    payload_bytes: usize,
    time: u64,
) -> NetPacket {
    NetPacket::new(
        sender,
        Destination::Core(receiver),
        PacketType::User1,
        vec![0; payload_bytes],
        time,
    )
}

#[must_use]
pub fn create_broadcast(sender: CoreId, payload_bytes: usize, time: u64) -> NetPacket {
    NetPacket::new(
        sender,
        Destination::Broadcast,
        PacketType::User2,
        vec![0; payload_bytes],
        time,
    )
}

/// A shared-memory packet sent by `sender` on behalf of `requester`.
#[must_use]
pub fn create_shmem(
    sender: CoreId,
    receiver: CoreId,
    requester: CoreId,
    payload_bytes: usize,
    time: u64,
) -> NetPacket {
    NetPacket::new(
        sender,
        Destination::Core(receiver),
        PacketType::SharedMem1,
        ShmemHeaderLookup::payload(requester, &vec![0; payload_bytes]),
        time,
    )
}
