pub mod metrics;
pub mod pipeline;

pub use metrics::*;
pub use pipeline::TickPhase;

use crate::agent::Agent;
use crate::boundary::ArenaBounds;
use crate::config::{SimConfig, SimConfigError};
use crate::neighbors::QueryStats;
use crate::spatial::SpatialIndex;
use crate::spawn::spawn_agents;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::{error::Error, fmt};
use tracing::info;

pub struct World {
    /// Canonical agent state; read-only snapshot while forces are computed.
    pub(crate) agents: Vec<Agent>,
    /// Write buffer, one slot per agent, swapped with `agents` at commit.
    pub(crate) next: Vec<Agent>,
    pub(crate) positions: Vec<[f64; 2]>,
    pub(crate) transforms: Vec<[f32; 6]>,
    /// Query totals per parallel chunk; summed at the end of the force phase.
    pub(crate) chunk_stats: Vec<QueryStats>,
    pub(crate) index: SpatialIndex,
    pub(crate) config: SimConfig,
    pub(crate) arena: ArenaBounds,
    pub(crate) phase: TickPhase,
    pub(crate) step_index: u64,
    pub(crate) time: f64,
    pub(crate) last_query_stats: QueryStats,
    pub(crate) wraps_last_tick: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldInitError {
    Config(SimConfigError),
    InvalidArena,
    TooManyAgents { max: usize, actual: usize },
    NonFiniteAgent { index: usize },
}

impl fmt::Display for WorldInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldInitError::Config(e) => write!(f, "{}", e),
            WorldInitError::InvalidArena => {
                write!(f, "arena half extents must be positive and finite")
            }
            WorldInitError::TooManyAgents { max, actual } => {
                write!(f, "total agents ({actual}) exceeds supported maximum ({max})")
            }
            WorldInitError::NonFiniteAgent { index } => {
                write!(f, "agent {index} has a non-finite position, velocity or heading")
            }
        }
    }
}

impl From<SimConfigError> for WorldInitError {
    fn from(err: SimConfigError) -> Self {
        WorldInitError::Config(err)
    }
}

impl Error for WorldInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldInitError::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejected before any agent state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickError {
    InvalidDt,
    InvalidArena,
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickError::InvalidDt => write!(f, "dt must be positive and finite"),
            TickError::InvalidArena => {
                write!(f, "arena half extents must be positive and finite")
            }
        }
    }
}

impl Error for TickError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManySteps { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

fn check_agents(agents: &[Agent]) -> Result<(), WorldInitError> {
    if agents.len() > SimConfig::MAX_TOTAL_AGENTS {
        return Err(WorldInitError::TooManyAgents {
            max: SimConfig::MAX_TOTAL_AGENTS,
            actual: agents.len(),
        });
    }
    if let Some(index) = agents.iter().position(|a| !a.is_finite()) {
        return Err(WorldInitError::NonFiniteAgent { index });
    }
    Ok(())
}

impl World {
    pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

    pub fn new(agents: Vec<Agent>, config: SimConfig, arena: ArenaBounds) -> Self {
        Self::try_new(agents, config, arena).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(
        agents: Vec<Agent>,
        config: SimConfig,
        arena: ArenaBounds,
    ) -> Result<Self, WorldInitError> {
        config.validate()?;
        if !arena.is_valid() {
            return Err(WorldInitError::InvalidArena);
        }
        check_agents(&agents)?;

        let positions = agents.iter().map(|a| a.position).collect();
        let transforms = agents.iter().map(Agent::transform).collect();
        Ok(Self {
            next: agents.clone(),
            agents,
            positions,
            transforms,
            chunk_stats: Vec::new(),
            index: SpatialIndex::for_strategy(&config.neighbor_strategy),
            config,
            arena,
            phase: TickPhase::Idle,
            step_index: 0,
            time: 0.0,
            last_query_stats: QueryStats::default(),
            wraps_last_tick: 0,
        })
    }

    /// Build a world of `count` agents placed by the spawner, seeded from `config.seed`.
    pub fn spawn(
        count: usize,
        config: SimConfig,
        arena: ArenaBounds,
    ) -> Result<Self, WorldInitError> {
        config.validate()?;
        if !arena.is_valid() {
            return Err(WorldInitError::InvalidArena);
        }
        if count > SimConfig::MAX_TOTAL_AGENTS {
            return Err(WorldInitError::TooManyAgents {
                max: SimConfig::MAX_TOTAL_AGENTS,
                actual: count,
            });
        }
        let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
        let agents = spawn_agents(count, &arena, &config, &mut rng);
        Self::try_new(agents, config, arena)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Hot-reload parameters between ticks. A changed neighbor strategy
    /// replaces the spatial index.
    pub fn set_config(&mut self, config: SimConfig) -> Result<(), WorldInitError> {
        config.validate()?;
        if config.neighbor_strategy != self.config.neighbor_strategy {
            info!(
                from = self.config.neighbor_strategy.name(),
                to = config.neighbor_strategy.name(),
                "switching neighbor strategy"
            );
            self.index = SpatialIndex::for_strategy(&config.neighbor_strategy);
        }
        self.config = config;
        Ok(())
    }

    pub fn arena(&self) -> ArenaBounds {
        self.arena
    }

    pub fn set_arena(&mut self, arena: ArenaBounds) -> Result<(), WorldInitError> {
        if !arena.is_valid() {
            return Err(WorldInitError::InvalidArena);
        }
        self.arena = arena;
        Ok(())
    }

    /// Swap in a new agent set; buffers are resized to match.
    pub fn replace_agents(&mut self, agents: Vec<Agent>) -> Result<(), WorldInitError> {
        check_agents(&agents)?;
        self.agents = agents;
        self.next.clone_from(&self.agents);
        self.refresh_derived();
        Ok(())
    }

    pub(crate) fn refresh_derived(&mut self) {
        self.positions.clear();
        self.positions.extend(self.agents.iter().map(|a| a.position));
        self.transforms.clear();
        self.transforms
            .extend(self.agents.iter().map(Agent::transform));
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn position(&self, index: usize) -> Option<[f64; 2]> {
        self.agents.get(index).map(|a| a.position)
    }

    pub fn heading(&self, index: usize) -> Option<f64> {
        self.agents.get(index).map(|a| a.heading)
    }

    pub fn velocity(&self, index: usize) -> Option<[f64; 2]> {
        self.agents.get(index).map(|a| a.velocity)
    }

    pub fn positions(&self) -> &[[f64; 2]] {
        &self.positions
    }

    /// Row-major 2x3 affine transform per agent, refreshed at commit.
    pub fn transforms(&self) -> &[[f32; 6]] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Simulated seconds elapsed.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn last_query_stats(&self) -> QueryStats {
        self.last_query_stats
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn run_experiment(&mut self, steps: usize, sample_every: usize) -> RunSummary {
        self.try_run_experiment(steps, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        info!(
            steps,
            sample_every,
            agents = self.len(),
            strategy = self.config.neighbor_strategy.name(),
            "experiment started"
        );
        let mut samples = Vec::with_capacity(estimated_samples);
        let mut total_us = 0u64;
        for step in 1..=steps {
            total_us += self.step().total_us;
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics());
            }
        }
        info!(steps, total_us, "experiment finished");
        Ok(RunSummary {
            schema_version: 1,
            steps,
            sample_every,
            agent_count: self.len(),
            strategy: self.config.neighbor_strategy.name().to_string(),
            final_time: self.time,
            mean_step_us: if steps == 0 {
                0.0
            } else {
                total_us as f64 / steps as f64
            },
            samples,
        })
    }
}
