use crate::vec2;
use rstar::{RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Per-agent random-walk offset that decays linearly after it is sampled.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    /// Offset at the moment it was sampled.
    pub initial: [f64; 2],
    pub started_at: f64,
    pub ends_at: f64,
    /// Simulation time after which a new offset may be sampled.
    pub next_eligible_at: f64,
}

impl Perturbation {
    /// Offset at simulation time `now`, fading from `initial` to zero.
    pub fn offset_at(&self, now: f64) -> [f64; 2] {
        let span = self.ends_at - self.started_at;
        if now >= self.ends_at || span <= 0.0 {
            return vec2::ZERO;
        }
        let remaining = ((self.ends_at - now) / span).clamp(0.0, 1.0);
        vec2::scale(self.initial, remaining)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    /// Heading in radians about the plane normal; forward is `(cos, sin)`.
    pub heading: f64,
    /// Personal-space scalar used by the personal-space separation falloff.
    pub personal_space: f64,
    /// Spring state for smooth-damp velocity smoothing.
    pub damp_velocity: [f64; 2],
    pub perturbation: Perturbation,
}

impl Agent {
    /// Agent facing `heading` and moving along it at `speed`.
    pub fn new(position: [f64; 2], heading: f64, speed: f64) -> Self {
        Self {
            position,
            velocity: vec2::scale(vec2::from_heading(heading), speed),
            heading,
            personal_space: 1.0,
            damp_velocity: vec2::ZERO,
            perturbation: Perturbation::default(),
        }
    }

    #[inline]
    pub fn forward(&self) -> [f64; 2] {
        vec2::from_heading(self.heading)
    }

    pub fn is_finite(&self) -> bool {
        vec2::is_finite(self.position)
            && vec2::is_finite(self.velocity)
            && self.heading.is_finite()
            && self.personal_space.is_finite()
    }

    /// Row-major 2x3 affine transform (rotation then translation) for renderers.
    pub fn transform(&self) -> [f32; 6] {
        let (sin, cos) = self.heading.sin_cos();
        [
            cos as f32,
            -sin as f32,
            self.position[0] as f32,
            sin as f32,
            cos as f32,
            self.position[1] as f32,
        ]
    }
}

/// Position record stored in the R*-tree; `index` points back into the agent slice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentLocation {
    pub index: usize,
    pub position: [f64; 2],
}

impl RTreeObject for AgentLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}
