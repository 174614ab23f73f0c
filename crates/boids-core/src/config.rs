use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// How desired velocity is assembled from the three flocking terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringModel {
    /// `forward + ws*sep + wa*ali + wc*coh`, normalized and scaled by speed.
    #[default]
    WeightedSum,
    /// Blend the agent's own heading with the group terms by `independence`.
    IndependenceBlend,
}

/// Distance below which separation starts pushing two agents apart.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeparationFalloff {
    PerceptionRadius,
    /// `self.personal_space * other.personal_space * scale`.
    PersonalSpace { scale: f64 },
}

impl Default for SeparationFalloff {
    fn default() -> Self {
        Self::PerceptionRadius
    }
}

/// Which per-neighbor direction alignment averages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentSource {
    #[default]
    Velocity,
    Heading,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VelocitySmoothing {
    /// Linear interpolation at rate `turn_speed / 2 * dt`.
    Lerp,
    /// Critically damped approach with bounded change per step.
    SmoothDamp {
        smooth_time: f64,
        max_acceleration: f64,
    },
}

impl Default for VelocitySmoothing {
    fn default() -> Self {
        Self::Lerp
    }
}

/// Neighbor discovery strategy. All variants return a superset of the agents
/// inside the query radius; they differ only in cost.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NeighborStrategy {
    /// Every agent is a candidate. O(n^2), useful as a reference.
    Naive,
    /// Grid rebuilt every tick by counting sort; cell edge = radius * `cell_scale`.
    UniformGrid { cell_scale: f64 },
    /// Persistent grid with fixed cells; agents move only when crossing a cell edge.
    IncrementalGrid { cell_size: f64 },
    /// Quad-tree over the arena rectangle.
    QuadTree { max_objects: usize, max_depth: usize },
    /// R*-tree bulk-loaded from the snapshot every tick.
    RTree,
}

impl NeighborStrategy {
    pub const DEFAULT_CELL_SCALE: f64 = 1.2;

    pub fn name(&self) -> &'static str {
        match self {
            NeighborStrategy::Naive => "naive",
            NeighborStrategy::UniformGrid { .. } => "uniform_grid",
            NeighborStrategy::IncrementalGrid { .. } => "incremental_grid",
            NeighborStrategy::QuadTree { .. } => "quad_tree",
            NeighborStrategy::RTree => "r_tree",
        }
    }

    /// Parse a strategy name, filling parameters with their defaults.
    pub fn from_name(name: &str) -> Option<Self> {
        let strategy = match name.replace('-', "_").as_str() {
            "naive" => NeighborStrategy::Naive,
            "uniform_grid" | "grid" => NeighborStrategy::UniformGrid {
                cell_scale: Self::DEFAULT_CELL_SCALE,
            },
            "incremental_grid" => NeighborStrategy::IncrementalGrid { cell_size: 5.0 },
            "quad_tree" | "quadtree" => NeighborStrategy::QuadTree {
                max_objects: 8,
                max_depth: 8,
            },
            "r_tree" | "rtree" => NeighborStrategy::RTree,
            _ => return None,
        };
        Some(strategy)
    }
}

impl Default for NeighborStrategy {
    fn default() -> Self {
        Self::UniformGrid {
            cell_scale: Self::DEFAULT_CELL_SCALE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for spawning and perturbation sampling.
    pub seed: u64,
    /// Fixed timestep used by `World::step`.
    pub dt: f64,
    /// Cruise speed every desired velocity is scaled to.
    pub speed: f64,
    /// Radius inside which other agents are perceived.
    pub perception_radius: f64,
    /// Full vision cone in degrees; 360 sees all around.
    pub vision_angle_deg: f64,
    /// Heading rotation rate; the lerp smoothing also derives from it.
    pub turn_speed: f64,
    pub separation_weight: f64,
    pub alignment_weight: f64,
    pub cohesion_weight: f64,
    /// Share of the group terms in the independence blend, in `[0, 1]`.
    pub independence: f64,
    /// Groups larger than this stop aligning and cohering. `None` disables the cutoff.
    pub max_group_size: Option<usize>,
    /// Upper bound of the perturbation offset magnitude. Zero disables perturbation.
    pub perturbation_intensity: f64,
    /// Probability per tick of sampling a new perturbation once eligible.
    pub perturbation_frequency: f64,
    /// Seconds for a perturbation to fade to zero.
    pub perturbation_duration: f64,
    /// Range of seconds to wait before the next perturbation may start.
    pub perturbation_cooldown: [f64; 2],
    pub steering: SteeringModel,
    pub separation: SeparationFalloff,
    pub alignment_source: AlignmentSource,
    pub smoothing: VelocitySmoothing,
    pub neighbor_strategy: NeighborStrategy,
    /// Run the force pass on the rayon pool.
    pub parallel: bool,
    /// Agents per parallel work item.
    pub parallel_chunk_size: usize,
    /// Inset applied when an agent is wrapped to the opposite edge.
    pub wrap_epsilon: f64,
    /// Spawned agents start at `speed * initial_speed_fraction`.
    pub initial_speed_fraction: f64,
    /// Range personal-space scalars are drawn from at spawn.
    pub personal_space_range: [f64; 2],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dt: 0.02,
            speed: 3.0,
            perception_radius: 2.0,
            vision_angle_deg: 270.0,
            turn_speed: 10.0,
            separation_weight: 0.8,
            alignment_weight: 1.2,
            cohesion_weight: 0.8,
            independence: 1.0,
            max_group_size: None,
            perturbation_intensity: 0.0,
            perturbation_frequency: 0.0,
            perturbation_duration: 1.0,
            perturbation_cooldown: [1.0, 3.0],
            steering: SteeringModel::WeightedSum,
            separation: SeparationFalloff::PerceptionRadius,
            alignment_source: AlignmentSource::Velocity,
            smoothing: VelocitySmoothing::Lerp,
            neighbor_strategy: NeighborStrategy::default(),
            parallel: true,
            parallel_chunk_size: 32,
            wrap_epsilon: 0.1,
            initial_speed_fraction: 1.0,
            personal_space_range: [1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    InvalidDt,
    InvalidSpeed,
    InvalidPerceptionRadius,
    InvalidVisionAngle,
    InvalidTurnSpeed,
    InvalidWeight { name: &'static str },
    InvalidIndependence,
    InvalidMaxGroupSize,
    InvalidPerturbation { name: &'static str },
    InvalidSmoothing,
    InvalidCellScale,
    InvalidCellSize,
    InvalidQuadTree,
    InvalidChunkSize,
    InvalidWrapEpsilon,
    InvalidSpawnRange { name: &'static str },
    Json(String),
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::InvalidDt => write!(f, "dt must be positive and finite"),
            SimConfigError::InvalidSpeed => write!(f, "speed must be positive and finite"),
            SimConfigError::InvalidPerceptionRadius => {
                write!(f, "perception_radius must be positive and finite")
            }
            SimConfigError::InvalidVisionAngle => {
                write!(f, "vision_angle_deg must be in (0, 360]")
            }
            SimConfigError::InvalidTurnSpeed => {
                write!(f, "turn_speed must be non-negative and finite")
            }
            SimConfigError::InvalidWeight { name } => {
                write!(f, "{name} must be non-negative and finite")
            }
            SimConfigError::InvalidIndependence => write!(f, "independence must be in [0, 1]"),
            SimConfigError::InvalidMaxGroupSize => {
                write!(f, "max_group_size must be at least 1 when set")
            }
            SimConfigError::InvalidPerturbation { name } => {
                write!(f, "perturbation parameter {name} is out of range")
            }
            SimConfigError::InvalidSmoothing => write!(
                f,
                "smooth_damp requires positive finite smooth_time and max_acceleration"
            ),
            SimConfigError::InvalidCellScale => write!(
                f,
                "uniform grid cell_scale must be finite and >= 1 so the 3x3 block covers the radius"
            ),
            SimConfigError::InvalidCellSize => {
                write!(
                    f,
                    "incremental grid cell_size must be positive, finite and at least 1/{} of the perception radius",
                    SimConfig::MAX_INCREMENTAL_REACH
                )
            }
            SimConfigError::InvalidQuadTree => {
                write!(f, "quad tree needs max_objects >= 1 and max_depth <= 32")
            }
            SimConfigError::InvalidChunkSize => write!(f, "parallel_chunk_size must be positive"),
            SimConfigError::InvalidWrapEpsilon => {
                write!(f, "wrap_epsilon must be non-negative and finite")
            }
            SimConfigError::InvalidSpawnRange { name } => {
                write!(f, "{name} must be a finite non-negative [min, max] range")
            }
            SimConfigError::Json(msg) => write!(f, "invalid config json: {msg}"),
        }
    }
}

impl Error for SimConfigError {}

fn finite_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn finite_non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn valid_range(r: [f64; 2]) -> bool {
    finite_non_negative(r[0]) && finite_non_negative(r[1]) && r[0] <= r[1]
}

impl SimConfig {
    pub const MAX_TOTAL_AGENTS: usize = 1_000_000;
    /// Largest ring of incremental-grid cells a query may scan on each side.
    pub const MAX_INCREMENTAL_REACH: usize = 8;

    /// Preset modelled on schooling fish: smooth-damped motion, independence
    /// blending, personal-space separation, group-size cutoff and perturbation.
    pub fn schooling() -> Self {
        Self {
            speed: 5.0,
            separation_weight: 0.8,
            alignment_weight: 0.3,
            cohesion_weight: 0.2,
            independence: 0.4,
            max_group_size: Some(5),
            perturbation_intensity: 0.5,
            perturbation_frequency: 0.3,
            perturbation_duration: 1.0,
            steering: SteeringModel::IndependenceBlend,
            separation: SeparationFalloff::PersonalSpace { scale: 0.5 },
            alignment_source: AlignmentSource::Heading,
            smoothing: VelocitySmoothing::SmoothDamp {
                smooth_time: 0.1,
                max_acceleration: 10.0,
            },
            neighbor_strategy: NeighborStrategy::IncrementalGrid { cell_size: 5.0 },
            initial_speed_fraction: 0.5,
            personal_space_range: [0.7, 1.3],
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SimConfigError> {
        let config: SimConfig =
            serde_json::from_str(json).map_err(|e| SimConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, SimConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| SimConfigError::Json(e.to_string()))
    }

    /// Cosine of half the vision cone, used by the neighbor filter.
    pub fn cos_half_vision(&self) -> f64 {
        (self.vision_angle_deg.to_radians() * 0.5).cos()
    }

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if !finite_positive(self.dt) {
            return Err(SimConfigError::InvalidDt);
        }
        if !finite_positive(self.speed) {
            return Err(SimConfigError::InvalidSpeed);
        }
        if !finite_positive(self.perception_radius) {
            return Err(SimConfigError::InvalidPerceptionRadius);
        }
        if !(self.vision_angle_deg.is_finite()
            && self.vision_angle_deg > 0.0
            && self.vision_angle_deg <= 360.0)
        {
            return Err(SimConfigError::InvalidVisionAngle);
        }
        if !finite_non_negative(self.turn_speed) {
            return Err(SimConfigError::InvalidTurnSpeed);
        }
        for (name, weight) in [
            ("separation_weight", self.separation_weight),
            ("alignment_weight", self.alignment_weight),
            ("cohesion_weight", self.cohesion_weight),
        ] {
            if !finite_non_negative(weight) {
                return Err(SimConfigError::InvalidWeight { name });
            }
        }
        if !(self.independence.is_finite() && (0.0..=1.0).contains(&self.independence)) {
            return Err(SimConfigError::InvalidIndependence);
        }
        if self.max_group_size == Some(0) {
            return Err(SimConfigError::InvalidMaxGroupSize);
        }
        if !finite_non_negative(self.perturbation_intensity) {
            return Err(SimConfigError::InvalidPerturbation {
                name: "perturbation_intensity",
            });
        }
        if !(self.perturbation_frequency.is_finite()
            && (0.0..=1.0).contains(&self.perturbation_frequency))
        {
            return Err(SimConfigError::InvalidPerturbation {
                name: "perturbation_frequency",
            });
        }
        if !finite_positive(self.perturbation_duration) {
            return Err(SimConfigError::InvalidPerturbation {
                name: "perturbation_duration",
            });
        }
        if !valid_range(self.perturbation_cooldown) {
            return Err(SimConfigError::InvalidPerturbation {
                name: "perturbation_cooldown",
            });
        }
        if let SeparationFalloff::PersonalSpace { scale } = self.separation {
            if !finite_positive(scale) {
                return Err(SimConfigError::InvalidWeight {
                    name: "separation.scale",
                });
            }
        }
        if let VelocitySmoothing::SmoothDamp {
            smooth_time,
            max_acceleration,
        } = self.smoothing
        {
            if !(finite_positive(smooth_time) && finite_positive(max_acceleration)) {
                return Err(SimConfigError::InvalidSmoothing);
            }
        }
        match self.neighbor_strategy {
            NeighborStrategy::UniformGrid { cell_scale } => {
                if !(cell_scale.is_finite() && cell_scale >= 1.0) {
                    return Err(SimConfigError::InvalidCellScale);
                }
            }
            NeighborStrategy::IncrementalGrid { cell_size } => {
                let reach = (self.perception_radius / cell_size).ceil();
                if !finite_positive(cell_size) || reach > Self::MAX_INCREMENTAL_REACH as f64 {
                    return Err(SimConfigError::InvalidCellSize);
                }
            }
            NeighborStrategy::QuadTree {
                max_objects,
                max_depth,
            } => {
                if max_objects == 0 || max_depth > 32 {
                    return Err(SimConfigError::InvalidQuadTree);
                }
            }
            NeighborStrategy::Naive | NeighborStrategy::RTree => {}
        }
        if self.parallel_chunk_size == 0 {
            return Err(SimConfigError::InvalidChunkSize);
        }
        if !finite_non_negative(self.wrap_epsilon) {
            return Err(SimConfigError::InvalidWrapEpsilon);
        }
        if !finite_non_negative(self.initial_speed_fraction) {
            return Err(SimConfigError::InvalidSpawnRange {
                name: "initial_speed_fraction",
            });
        }
        if !valid_range(self.personal_space_range) {
            return Err(SimConfigError::InvalidSpawnRange {
                name: "personal_space_range",
            });
        }
        Ok(())
    }
}
