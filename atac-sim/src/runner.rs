// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Run synthetic traffic through a [`Network`] with one thread per core.
//!
//! Each core injects one packet per injection step. Routing is done in turns:
//! within a step the cores route in core-id order and no core starts the next
//! step before every core has routed in the current one. The hubs therefore
//! see requests in the same order on every run with the same seed. The hops
//! returned by routing are delivered by the sending thread outside its turn.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use atac_models::network::{Network, ShmemHeaderLookup};
use atac_models::packet::{Destination, NetPacket, PacketType};
use atac_models::types::{CoreId, SimError};
use atac_track::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrafficConfig;

/// Totals for one phase of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseStats {
    pub packets_sent: u64,
    pub hops_delivered: u64,

    /// Time of the last injection.
    pub last_injection_time: u64,

    /// Latest arrival time of any hop.
    pub last_arrival_time: u64,
}

impl PhaseStats {
    fn merge(&mut self, other: &PhaseStats) {
        self.packets_sent += other.packets_sent;
        self.hops_delivered += other.hops_delivered;
        self.last_injection_time = self.last_injection_time.max(other.last_injection_time);
        self.last_arrival_time = self.last_arrival_time.max(other.last_arrival_time);
    }
}

/// Result of a complete run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunStats {
    pub warmup: PhaseStats,
    pub measured: PhaseStats,
}

struct TurnState {
    next: CoreId,
    aborted: bool,
}

/// Hands out routing turns to the cores in core-id order.
struct Turns {
    num_cores: usize,
    state: Mutex<TurnState>,
    cv: Condvar,
}

impl Turns {
    fn new(num_cores: usize) -> Self {
        Self {
            num_cores,
            state: Mutex::new(TurnState {
                next: 0,
                aborted: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until it is the turn of `core_id`.
    ///
    /// Returns `None` once the phase has been aborted.
    fn wait(&self, core_id: CoreId) -> Option<Turn<'_>> {
        let mut state = self.lock();
        while !state.aborted && state.next != core_id {
            state = self.cv.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.aborted {
            None
        } else {
            Some(Turn { turns: self })
        }
    }

    /// Release every core waiting for a turn.
    fn abort(&self) {
        self.lock().aborted = true;
        self.cv.notify_all();
    }
}

/// The right to route. Passes the turn to the next core when dropped.
struct Turn<'a> {
    turns: &'a Turns,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.turns.lock();
            state.next = (state.next + 1) % self.turns.num_cores;
        }
        self.turns.cv.notify_all();
    }
}

/// Aborts the phase if the owning thread unwinds.
struct AbortOnPanic<'a>(&'a Turns);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

struct TrafficGenerator<'a> {
    core_id: CoreId,
    num_cores: usize,
    config: &'a TrafficConfig,
    rng: StdRng,
}

impl<'a> TrafficGenerator<'a> {
    fn new(core_id: CoreId, num_cores: usize, config: &'a TrafficConfig, phase: u64) -> Self {
        let seed = config
            .seed
            .wrapping_add(phase << 32)
            .wrapping_add(core_id as u64);
        Self {
            core_id,
            num_cores,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn packet(&mut self, time: u64) -> NetPacket {
        let body = vec![0; self.config.payload_bytes];
        if self.rng.gen_bool(self.config.broadcast_fraction) {
            return NetPacket::new(
                self.core_id,
                Destination::Broadcast,
                PacketType::User2,
                body,
                time,
            );
        }

        let receiver = self.rng.gen_range(0..self.num_cores);
        if self.rng.gen_bool(self.config.shared_memory_fraction) {
            NetPacket::new(
                self.core_id,
                Destination::Core(receiver),
                PacketType::SharedMem1,
                ShmemHeaderLookup::payload(self.core_id, &body),
                time,
            )
        } else {
            NetPacket::new(
                self.core_id,
                Destination::Core(receiver),
                PacketType::User1,
                body,
                time,
            )
        }
    }
}

fn run_core(
    network: &Network,
    turns: &Turns,
    generator: &mut TrafficGenerator,
    num_packets: usize,
    start_time: u64,
) -> Result<PhaseStats, SimError> {
    let _abort_on_panic = AbortOnPanic(turns);
    let injection_interval = generator.config.injection_interval;
    let mut stats = PhaseStats::default();

    for step in 0..num_packets {
        let time = start_time + step as u64 * injection_interval;
        let packet = generator.packet(time);

        let routed = {
            let Some(_turn) = turns.wait(generator.core_id) else {
                // Another core failed, it reports the error
                break;
            };
            network.route_packet(&packet)
        };

        let delivered = routed.and_then(|hops| {
            for hop in &hops {
                network.deliver(&packet, hop)?;
                stats.last_arrival_time = stats.last_arrival_time.max(hop.time);
            }
            Ok(hops.len() as u64)
        });
        match delivered {
            Ok(num_hops) => stats.hops_delivered += num_hops,
            Err(e) => {
                turns.abort();
                return Err(e);
            }
        }
        stats.packets_sent += 1;
        stats.last_injection_time = time;
    }

    Ok(stats)
}

fn run_phase(
    network: &Network,
    config: &TrafficConfig,
    phase: u64,
    num_packets: usize,
    start_time: u64,
) -> Result<PhaseStats, SimError> {
    let num_cores = network.num_cores();
    let turns = Turns::new(num_cores);

    let results: Vec<Result<PhaseStats, SimError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_cores)
            .map(|core_id| {
                let turns = &turns;
                s.spawn(move || {
                    let mut generator = TrafficGenerator::new(core_id, num_cores, config, phase);
                    run_core(network, turns, &mut generator, num_packets, start_time)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| SimError("Core thread panicked".to_string()))?
            })
            .collect()
    });

    let mut stats = PhaseStats::default();
    for result in results {
        stats.merge(&result?);
    }
    Ok(stats)
}

/// Run the warm-up phase with all models disabled and then the measured
/// phase with all models enabled.
pub fn run(network: &Network, config: &TrafficConfig) -> Result<RunStats, SimError> {
    config.validate()?;

    info!(network.entity ; "warm-up: {} packets per core", config.warmup_packets_per_core);
    network.disable_all();
    let warmup = run_phase(network, config, 0, config.warmup_packets_per_core, 0)?;
    debug!(network.entity ; "warm-up done: {:?}", warmup);

    let start_time = config.warmup_packets_per_core as u64 * config.injection_interval;
    info!(network.entity ; "measure: {} packets per core from {}",
        config.packets_per_core, start_time);
    network.enable_all();
    let measured = run_phase(network, config, 1, config.packets_per_core, start_time)?;
    debug!(network.entity ; "measure done: {:?}", measured);

    Ok(RunStats { warmup, measured })
}
