use super::metrics::StepTimings;
use super::{TickError, World};
use crate::agent::Agent;
use crate::boundary::{wrap_position, BoundsProvider};
use crate::neighbors::{find_neighbors, QueryStats, VisionCone};
use crate::spatial::SpatialIndex;
use crate::steering::{advance_agent, TickContext};
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Where a tick currently is. Outside of `tick` the world is always `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TickPhase {
    #[default]
    Idle,
    SnapshotBuilt,
    IndexRebuilt,
    ForcesComputed,
    Committed,
}

/// Read-only inputs of the force phase, shared by every worker.
struct ForcePass<'a> {
    snapshot: &'a [Agent],
    positions: &'a [[f64; 2]],
    index: &'a SpatialIndex,
    cone: VisionCone,
    ctx: TickContext<'a>,
}

impl ForcePass<'_> {
    /// Neighbor query plus steering for every agent in `out`, which starts at `base`.
    fn run_chunk(&self, base: usize, out: &mut [Agent], scratch: &mut Vec<usize>) -> QueryStats {
        let mut stats = QueryStats::default();
        for (offset, slot) in out.iter_mut().enumerate() {
            let i = base + offset;
            let forward = self.snapshot[i].forward();
            stats.merge(find_neighbors(
                self.index,
                i,
                self.positions,
                forward,
                &self.cone,
                scratch,
            ));
            *slot = advance_agent(i, self.snapshot, scratch, &self.ctx);
        }
        stats
    }
}

impl World {
    /// Advance one tick with the configured `dt`.
    pub fn step(&mut self) -> StepTimings {
        self.tick(self.config.dt)
    }

    pub fn tick(&mut self, dt: f64) -> StepTimings {
        self.try_tick(dt).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Re-query the arena from `bounds`, then tick.
    pub fn tick_with_bounds(
        &mut self,
        dt: f64,
        bounds: &impl BoundsProvider,
    ) -> Result<StepTimings, TickError> {
        let arena = bounds.arena_bounds();
        if !arena.is_valid() {
            return Err(TickError::InvalidArena);
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TickError::InvalidDt);
        }
        self.arena = arena;
        self.try_tick(dt)
    }

    pub fn try_tick(&mut self, dt: f64) -> Result<StepTimings, TickError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TickError::InvalidDt);
        }
        if !self.arena.is_valid() {
            return Err(TickError::InvalidArena);
        }
        let total_start = Instant::now();

        let t0 = Instant::now();
        self.build_snapshot();
        self.rebuild_index();
        let spatial_build_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        self.compute_forces(dt);
        let force_compute_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.commit();
        self.time += dt;
        self.step_index += 1;
        self.phase = TickPhase::Idle;
        let commit_us = t2.elapsed().as_micros() as u64;

        let timings = StepTimings {
            spatial_build_us,
            force_compute_us,
            commit_us,
            total_us: total_start.elapsed().as_micros() as u64,
        };
        debug!(
            step = self.step_index,
            agents = self.agents.len(),
            candidates = self.last_query_stats.candidates,
            neighbors = self.last_query_stats.neighbors,
            wraps = self.wraps_last_tick,
            spatial_build_us,
            force_compute_us,
            commit_us,
            "tick"
        );
        Ok(timings)
    }

    fn build_snapshot(&mut self) {
        self.positions.clear();
        self.positions.extend(self.agents.iter().map(|a| a.position));
        if self.next.len() != self.agents.len() {
            self.next.clone_from(&self.agents);
        }
        self.phase = TickPhase::SnapshotBuilt;
    }

    fn rebuild_index(&mut self) {
        self.index.rebuild(
            &self.positions,
            &self.arena,
            self.config.perception_radius,
        );
        self.phase = TickPhase::IndexRebuilt;
    }

    fn compute_forces(&mut self, dt: f64) {
        let pass = ForcePass {
            snapshot: &self.agents,
            positions: &self.positions,
            index: &self.index,
            cone: VisionCone::from_config(&self.config),
            ctx: TickContext {
                config: &self.config,
                dt,
                now: self.time,
                step_index: self.step_index,
            },
        };

        let stats = if self.config.parallel {
            let chunk = self.config.parallel_chunk_size;
            self.chunk_stats.clear();
            self.chunk_stats
                .resize(pass.snapshot.len().div_ceil(chunk), QueryStats::default());
            self.next
                .par_chunks_mut(chunk)
                .zip(self.chunk_stats.par_iter_mut())
                .enumerate()
                .for_each_init(Vec::new, |scratch, (c, (out, stats))| {
                    *stats = pass.run_chunk(c * chunk, out, scratch);
                });
            self.chunk_stats
                .iter()
                .fold(QueryStats::default(), |mut acc, s| {
                    acc.merge(*s);
                    acc
                })
        } else {
            pass.run_chunk(0, &mut self.next, &mut Vec::new())
        };
        self.last_query_stats = stats;
        self.phase = TickPhase::ForcesComputed;
    }

    fn commit(&mut self) {
        std::mem::swap(&mut self.agents, &mut self.next);
        let arena = self.arena;
        let epsilon = self.config.wrap_epsilon;
        let mut wraps = 0;
        for agent in &mut self.agents {
            if wrap_position(&mut agent.position, &arena, epsilon) {
                wraps += 1;
            }
        }
        self.wraps_last_tick = wraps;
        self.refresh_derived();
        self.phase = TickPhase::Committed;
    }
}
