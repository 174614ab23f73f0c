//! Neighbor-discovery indices.
//!
//! Every strategy answers the same question: given a point and a radius, which
//! agents might be inside? Answers are supersets; the exact radius and vision
//! filter lives in [`crate::neighbors`].

pub mod grid;
pub mod incremental;
pub mod quadtree;
pub mod rtree;

pub use grid::UniformGrid;
pub use incremental::IncrementalGrid;
pub use quadtree::{QuadTree, Rect};

use crate::agent::AgentLocation;
use crate::boundary::ArenaBounds;
use crate::config::NeighborStrategy;
use rstar::RTree;

pub enum SpatialIndex {
    Naive { len: usize },
    UniformGrid(UniformGrid),
    IncrementalGrid(IncrementalGrid),
    QuadTree(QuadTree),
    RTree(RTree<AgentLocation>),
}

impl SpatialIndex {
    pub fn for_strategy(strategy: &NeighborStrategy) -> Self {
        match *strategy {
            NeighborStrategy::Naive => SpatialIndex::Naive { len: 0 },
            NeighborStrategy::UniformGrid { cell_scale } => {
                SpatialIndex::UniformGrid(UniformGrid::new(cell_scale))
            }
            NeighborStrategy::IncrementalGrid { cell_size } => {
                SpatialIndex::IncrementalGrid(IncrementalGrid::new(cell_size))
            }
            NeighborStrategy::QuadTree {
                max_objects,
                max_depth,
            } => SpatialIndex::QuadTree(QuadTree::new(max_objects, max_depth)),
            NeighborStrategy::RTree => SpatialIndex::RTree(RTree::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpatialIndex::Naive { .. } => "naive",
            SpatialIndex::UniformGrid(_) => "uniform_grid",
            SpatialIndex::IncrementalGrid(_) => "incremental_grid",
            SpatialIndex::QuadTree(_) => "quad_tree",
            SpatialIndex::RTree(_) => "r_tree",
        }
    }

    /// Bring the index in line with the snapshot positions.
    ///
    /// `radius` sizes the uniform grid cells; `arena` roots the quad-tree.
    pub fn rebuild(&mut self, positions: &[[f64; 2]], arena: &ArenaBounds, radius: f64) {
        match self {
            SpatialIndex::Naive { len } => *len = positions.len(),
            SpatialIndex::UniformGrid(grid) => grid.rebuild(positions, radius),
            SpatialIndex::IncrementalGrid(grid) => grid.sync(positions),
            SpatialIndex::QuadTree(tree) => {
                tree.rebuild(positions, Rect::new(arena.min(), arena.max()))
            }
            SpatialIndex::RTree(tree) => *tree = rtree::build_index(positions),
        }
    }

    /// Visit every candidate that may lie within `radius` of `center`.
    /// May include agents outside the radius and the querying agent itself.
    pub fn visit_candidates(&self, center: [f64; 2], radius: f64, visit: &mut impl FnMut(usize)) {
        match self {
            SpatialIndex::Naive { len } => (0..*len).for_each(visit),
            SpatialIndex::UniformGrid(grid) => grid.visit_candidates(center, visit),
            SpatialIndex::IncrementalGrid(grid) => grid.visit_candidates(center, radius, visit),
            SpatialIndex::QuadTree(tree) => tree.query(&Rect::around(center, radius), visit),
            SpatialIndex::RTree(tree) => rtree::visit_candidates(tree, center, radius, visit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_strategies() -> Vec<NeighborStrategy> {
        ["naive", "uniform_grid", "incremental_grid", "quad_tree", "r_tree"]
            .iter()
            .filter_map(|name| NeighborStrategy::from_name(name))
            .collect()
    }

    #[test]
    fn every_strategy_returns_a_superset_of_the_radius() {
        let arena = ArenaBounds::new(10.0, 10.0);
        let positions: Vec<[f64; 2]> = (0..300)
            .map(|i| {
                let t = i as f64;
                [(t * 0.731).sin() * 9.5, (t * 1.37).cos() * 9.5]
            })
            .collect();
        let radius = 1.5;
        for strategy in all_strategies() {
            let mut index = SpatialIndex::for_strategy(&strategy);
            index.rebuild(&positions, &arena, radius);
            for (i, &center) in positions.iter().enumerate().step_by(7) {
                let mut candidates = vec![false; positions.len()];
                index.visit_candidates(center, radius, &mut |j| candidates[j] = true);
                for (j, &p) in positions.iter().enumerate() {
                    let dx = p[0] - center[0];
                    let dy = p[1] - center[1];
                    if dx * dx + dy * dy <= radius * radius {
                        assert!(
                            candidates[j],
                            "{} missed agent {j} near agent {i}",
                            index.name()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn naive_visits_everyone() {
        let mut index = SpatialIndex::for_strategy(&NeighborStrategy::Naive);
        index.rebuild(&[[0.0, 0.0], [100.0, 0.0]], &ArenaBounds::square(10.0), 1.0);
        let mut count = 0;
        index.visit_candidates([0.0, 0.0], 1.0, &mut |_| count += 1);
        assert_eq!(count, 2);
    }
}
