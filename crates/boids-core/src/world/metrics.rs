use super::World;
use crate::spatial::SpatialIndex;
use crate::vec2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTimings {
    /// Snapshot copy plus spatial index rebuild.
    pub spatial_build_us: u64,
    pub force_compute_us: u64,
    /// Buffer swap, boundary wrap and transform refresh.
    pub commit_us: u64,
    pub total_us: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepMetrics {
    pub step: u64,
    pub time: f64,
    pub agent_count: usize,
    pub mean_speed: f64,
    /// Length of the mean heading vector: 1 when everyone faces the same way.
    pub polarization: f64,
    pub mean_neighbors: f64,
    /// Candidate comparisons made by the neighbor queries of the last tick.
    pub candidate_checks: usize,
    pub wraps: usize,
    /// Largest uniform-grid cell; zero for other strategies.
    pub max_cell_occupancy: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub steps: usize,
    pub sample_every: usize,
    pub agent_count: usize,
    pub strategy: String,
    pub final_time: f64,
    #[serde(default)]
    pub mean_step_us: f64,
    pub samples: Vec<StepMetrics>,
}

impl World {
    pub fn collect_step_metrics(&self) -> StepMetrics {
        let n = self.agents.len();
        let denom = n.max(1) as f64;

        let mut speed_sum = 0.0;
        let mut heading_sum = vec2::ZERO;
        for agent in &self.agents {
            speed_sum += vec2::length(agent.velocity);
            heading_sum = vec2::add(heading_sum, agent.forward());
        }

        let max_cell_occupancy = match &self.index {
            SpatialIndex::UniformGrid(grid) => grid.max_occupancy(),
            _ => 0,
        };

        StepMetrics {
            step: self.step_index,
            time: self.time,
            agent_count: n,
            mean_speed: speed_sum / denom,
            polarization: if n == 0 {
                0.0
            } else {
                vec2::length(heading_sum) / denom
            },
            mean_neighbors: self.last_query_stats.neighbors as f64 / denom,
            candidate_checks: self.last_query_stats.candidates,
            wraps: self.wraps_last_tick,
            max_cell_occupancy,
        }
    }
}
