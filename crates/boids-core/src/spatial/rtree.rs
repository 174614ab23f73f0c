use crate::agent::AgentLocation;
use rstar::{RTree, AABB};

/// Build an R*-tree from snapshot positions via bulk_load (O(n log n)).
pub fn build_index(positions: &[[f64; 2]]) -> RTree<AgentLocation> {
    RTree::bulk_load(
        positions
            .iter()
            .enumerate()
            .map(|(index, &position)| AgentLocation { index, position })
            .collect(),
    )
}

/// Visit agents inside the bounding square of the circle around `center`.
/// Distance filtering is left to the neighbor query.
pub fn visit_candidates(
    tree: &RTree<AgentLocation>,
    center: [f64; 2],
    radius: f64,
    visit: &mut impl FnMut(usize),
) {
    let envelope = AABB::from_corners(
        [center[0] - radius, center[1] - radius],
        [center[0] + radius, center[1] + radius],
    );
    for location in tree.locate_in_envelope(&envelope) {
        visit(location.index);
    }
}
