// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Packets and the timed hops produced when routing them.

use std::fmt::Display;

use crate::types::CoreId;

/// Classification of packets carried by the network.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PacketType {
    User1,
    User2,
    SharedMem1,
    SharedMem2,
    System,
}

impl PacketType {
    /// Shared-memory packets carry the core that requested them in their
    /// payload.
    #[must_use]
    pub fn is_shared_memory(&self) -> bool {
        matches!(self, PacketType::SharedMem1 | PacketType::SharedMem2)
    }
}

impl Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PacketType::User1 => "user_1",
            PacketType::User2 => "user_2",
            PacketType::SharedMem1 => "shared_mem_1",
            PacketType::SharedMem2 => "shared_mem_2",
            PacketType::System => "system",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Destination {
    Core(CoreId),
    Broadcast,
}

impl Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Core(core_id) => write!(f, "{core_id}"),
            Destination::Broadcast => write!(f, "all"),
        }
    }
}

/// A packet as seen by the network models.
#[derive(Clone, Debug, PartialEq)]
pub struct NetPacket {
    pub sender: CoreId,
    pub receiver: Destination,
    pub packet_type: PacketType,

    /// Payload, only inspected to find the requester of shared-memory
    /// packets.
    pub data: Vec<u8>,

    /// Time at which the packet was injected into the network.
    pub start_time: u64,

    /// Time at which the packet is at its current position in the network.
    pub time: u64,
}

impl NetPacket {
    #[must_use]
    pub fn new(
        sender: CoreId,
        receiver: Destination,
        packet_type: PacketType,
        data: Vec<u8>,
        time: u64,
    ) -> Self {
        Self {
            sender,
            receiver,
            packet_type,
            data,
            start_time: time,
            time,
        }
    }
}

impl Display for NetPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packet {} -> {} @{}",
            self.packet_type, self.sender, self.receiver, self.time
        )
    }
}

/// The next step of a packet through the network.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hop {
    pub next_dest: CoreId,
    pub final_dest: CoreId,

    /// Absolute time at which the packet arrives at `next_dest`.
    pub time: u64,
}
