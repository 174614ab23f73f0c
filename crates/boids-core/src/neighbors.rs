use crate::config::SimConfig;
use crate::spatial::SpatialIndex;
use crate::vec2;
use serde::{Deserialize, Serialize};

/// Perception radius plus vision cone, precomputed once per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisionCone {
    pub radius: f64,
    radius_sq: f64,
    cos_half_angle: f64,
    full_circle: bool,
}

impl VisionCone {
    pub fn from_degrees(radius: f64, vision_angle_deg: f64) -> Self {
        Self {
            radius,
            radius_sq: radius * radius,
            cos_half_angle: (vision_angle_deg.to_radians() * 0.5).cos(),
            full_circle: vision_angle_deg >= 360.0,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::from_degrees(config.perception_radius, config.vision_angle_deg)
    }

    pub fn cos_half_angle(&self) -> f64 {
        self.cos_half_angle
    }

    /// Whether an agent at `origin` facing `forward` perceives `other`.
    ///
    /// A coincident `other` is inside the radius but has no direction; it is
    /// perceived regardless of the cone.
    #[inline]
    pub fn perceives(&self, origin: [f64; 2], forward: [f64; 2], other: [f64; 2]) -> bool {
        let offset = vec2::sub(other, origin);
        let dist_sq = vec2::length_sq(offset);
        if dist_sq.is_nan() || dist_sq > self.radius_sq {
            return false;
        }
        if self.full_circle {
            return true;
        }
        let dir = vec2::normalize_or_zero(offset);
        if dir == vec2::ZERO {
            return true;
        }
        vec2::dot(forward, dir) >= self.cos_half_angle
    }
}

/// Work done by neighbor queries, summed over a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Candidates returned by the index and compared against the cone.
    pub candidates: usize,
    /// Candidates accepted as neighbors.
    pub neighbors: usize,
}

impl QueryStats {
    pub fn merge(&mut self, other: QueryStats) {
        self.candidates += other.candidates;
        self.neighbors += other.neighbors;
    }
}

/// Collect into `out` the indices perceived by agent `agent`.
///
/// `out` is cleared first. Order is unspecified.
pub fn find_neighbors(
    index: &SpatialIndex,
    agent: usize,
    positions: &[[f64; 2]],
    forward: [f64; 2],
    cone: &VisionCone,
    out: &mut Vec<usize>,
) -> QueryStats {
    out.clear();
    let origin = positions[agent];
    let mut stats = QueryStats::default();
    index.visit_candidates(origin, cone.radius, &mut |other| {
        if other == agent {
            return;
        }
        stats.candidates += 1;
        if cone.perceives(origin, forward, positions[other]) {
            out.push(other);
        }
    });
    stats.neighbors = out.len();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ArenaBounds;
    use crate::config::NeighborStrategy;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha12Rng;

    fn brute_force(
        agent: usize,
        positions: &[[f64; 2]],
        forward: [f64; 2],
        cone: &VisionCone,
    ) -> Vec<usize> {
        (0..positions.len())
            .filter(|&j| j != agent && cone.perceives(positions[agent], forward, positions[j]))
            .collect()
    }

    fn random_cloud(n: usize, half: f64, seed: u64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let positions = (0..n)
            .map(|_| [rng.random_range(-half..half), rng.random_range(-half..half)])
            .collect();
        let forwards = (0..n)
            .map(|_| vec2::from_heading(rng.random_range(0.0..std::f64::consts::TAU)))
            .collect();
        (positions, forwards)
    }

    #[test]
    fn every_strategy_matches_brute_force() {
        let (positions, forwards) = random_cloud(400, 12.0, 7);
        let arena = ArenaBounds::new(12.0, 12.0);
        let cone = VisionCone::from_degrees(2.0, 270.0);
        for name in ["naive", "uniform_grid", "incremental_grid", "quad_tree", "r_tree"] {
            let strategy = NeighborStrategy::from_name(name).unwrap();
            let mut index = SpatialIndex::for_strategy(&strategy);
            index.rebuild(&positions, &arena, cone.radius);
            let mut out = Vec::new();
            for i in 0..positions.len() {
                find_neighbors(&index, i, &positions, forwards[i], &cone, &mut out);
                out.sort();
                assert_eq!(out, brute_force(i, &positions, forwards[i], &cone), "{name}");
            }
        }
    }

    #[test]
    fn never_returns_self() {
        let positions = vec![[0.0, 0.0], [0.5, 0.0]];
        let mut index = SpatialIndex::for_strategy(&NeighborStrategy::default());
        index.rebuild(&positions, &ArenaBounds::square(10.0), 2.0);
        let cone = VisionCone::from_degrees(2.0, 360.0);
        let mut out = Vec::new();
        find_neighbors(&index, 0, &positions, [1.0, 0.0], &cone, &mut out);
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn vision_cone_excludes_agents_behind() {
        let cone = VisionCone::from_degrees(5.0, 90.0);
        assert!(cone.perceives([0.0, 0.0], [1.0, 0.0], [1.0, 0.5]));
        assert!(!cone.perceives([0.0, 0.0], [1.0, 0.0], [-1.0, 0.0]));
        assert!(!cone.perceives([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]));
    }

    #[test]
    fn full_circle_sees_directly_behind() {
        let cone = VisionCone::from_degrees(2.0, 360.0);
        assert!(cone.perceives([0.0, 0.0], [1.0, 0.0], [-1.0, 0.0]));
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let cone = VisionCone::from_degrees(2.0, 360.0);
        assert!(cone.perceives([0.0, 0.0], [1.0, 0.0], [2.0, 0.0]));
        assert!(!cone.perceives([0.0, 0.0], [1.0, 0.0], [2.0 + 1e-9, 0.0]));
    }

    #[test]
    fn coincident_agent_is_a_neighbor() {
        let cone = VisionCone::from_degrees(2.0, 90.0);
        assert!(cone.perceives([1.0, 1.0], [1.0, 0.0], [1.0, 1.0]));
    }

    #[test]
    fn stats_count_candidates_and_neighbors() {
        let positions = vec![[0.0, 0.0], [1.0, 0.0], [-1.0, 0.0], [30.0, 30.0]];
        let mut index = SpatialIndex::for_strategy(&NeighborStrategy::Naive);
        index.rebuild(&positions, &ArenaBounds::square(100.0), 2.0);
        let cone = VisionCone::from_degrees(2.0, 180.0);
        let mut out = Vec::new();
        let stats = find_neighbors(&index, 0, &positions, [1.0, 0.0], &cone, &mut out);
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.neighbors, 1);
    }
}
