use std::ops::Range;
use tracing::warn;

/// Smallest cell edge the grid will use, guarding coincident-agent clouds.
pub const MIN_CELL_SIZE: f64 = 1e-3;
/// Upper bound on cells per rebuild; sparse outliers enlarge the cell instead.
pub const MAX_GRID_CELLS: usize = 1 << 22;

/// Uniform grid rebuilt from scratch every tick with a counting sort.
///
/// Bounds follow the current min/max of all positions, so the grid never has to
/// know the arena. After [`UniformGrid::rebuild`] the agents of each cell are
/// contiguous in `indices[cell_start[c]..cell_end[c]]`.
#[derive(Clone, Debug)]
pub struct UniformGrid {
    cell_scale: f64,
    cell_size: f64,
    min: [f64; 2],
    dims: [usize; 2],
    cell_start: Vec<usize>,
    cell_end: Vec<usize>,
    indices: Vec<usize>,
    // Per-cell counters, reused as write cursors during the scatter pass.
    cursor: Vec<usize>,
    agent_cells: Vec<usize>,
}

impl UniformGrid {
    pub fn new(cell_scale: f64) -> Self {
        Self {
            cell_scale,
            cell_size: MIN_CELL_SIZE,
            min: [0.0, 0.0],
            dims: [1, 1],
            cell_start: vec![0],
            cell_end: vec![0],
            indices: Vec::new(),
            cursor: Vec::new(),
            agent_cells: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    pub fn cell_count(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Bucket every position into its cell. O(n + cells).
    pub fn rebuild(&mut self, positions: &[[f64; 2]], radius: f64) {
        let (min, max) = bounding_box(positions);
        let extent = [max[0] - min[0], max[1] - min[1]];

        let mut cell_size = (radius * self.cell_scale).max(MIN_CELL_SIZE);
        let mut dims = grid_dims(extent, cell_size);
        if dims.0 * dims.1 > MAX_GRID_CELLS as f64 {
            let requested = cell_size;
            while dims.0 * dims.1 > MAX_GRID_CELLS as f64 {
                cell_size *= 2.0;
                dims = grid_dims(extent, cell_size);
            }
            warn!(
                requested,
                cell_size, "agent spread too wide for grid; enlarging cells"
            );
        }

        self.cell_size = cell_size;
        self.min = min;
        self.dims = [dims.0 as usize, dims.1 as usize];
        let cells = self.cell_count();

        // Pass 1: count agents per cell.
        self.cursor.clear();
        self.cursor.resize(cells, 0);
        self.agent_cells.clear();
        for &p in positions {
            let cell = self.cell_of(p);
            self.agent_cells.push(cell);
            self.cursor[cell] += 1;
        }

        // Prefix sum into [start, end) ranges.
        self.cell_start.resize(cells, 0);
        self.cell_end.resize(cells, 0);
        let mut offset = 0;
        for cell in 0..cells {
            self.cell_start[cell] = offset;
            offset += self.cursor[cell];
            self.cell_end[cell] = offset;
        }

        // Pass 2: scatter agent indices.
        self.cursor.copy_from_slice(&self.cell_start);
        self.indices.resize(positions.len(), 0);
        for (agent, &cell) in self.agent_cells.iter().enumerate() {
            self.indices[self.cursor[cell]] = agent;
            self.cursor[cell] += 1;
        }
    }

    /// Cell coordinates of `p`, clamped onto the grid.
    pub fn cell_coords(&self, p: [f64; 2]) -> [usize; 2] {
        let clamp_axis = |value: f64, min: f64, dim: usize| -> usize {
            let raw = ((value - min) / self.cell_size).floor();
            if raw.is_nan() || raw <= 0.0 {
                0
            } else {
                (raw as usize).min(dim - 1)
            }
        };
        [
            clamp_axis(p[0], self.min[0], self.dims[0]),
            clamp_axis(p[1], self.min[1], self.dims[1]),
        ]
    }

    /// Linear cell id of `p`; coordinates outside the grid map to the nearest edge cell.
    pub fn cell_of(&self, p: [f64; 2]) -> usize {
        let [x, y] = self.cell_coords(p);
        y * self.dims[0] + x
    }

    pub fn cell_agents(&self, cell: usize) -> &[usize] {
        &self.indices[self.cell_start[cell]..self.cell_end[cell]]
    }

    /// Ranges into the index buffer for the 3x3 block around `cell`, clipped at the edges.
    pub fn neighbor_cells(&self, cell: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        let [nx, ny] = self.dims;
        let cx = cell % nx;
        let cy = cell / nx;
        let xs = cx.saturating_sub(1)..=(cx + 1).min(nx - 1);
        let ys = cy.saturating_sub(1)..=(cy + 1).min(ny - 1);
        ys.flat_map(move |y| {
            xs.clone().map(move |x| {
                let c = y * nx + x;
                self.cell_start[c]..self.cell_end[c]
            })
        })
    }

    /// Visit every agent in the 3x3 block around the cell containing `center`.
    pub fn visit_candidates(&self, center: [f64; 2], visit: &mut impl FnMut(usize)) {
        if self.indices.is_empty() {
            return;
        }
        for range in self.neighbor_cells(self.cell_of(center)) {
            for &agent in &self.indices[range] {
                visit(agent);
            }
        }
    }

    pub fn max_occupancy(&self) -> usize {
        self.cell_start
            .iter()
            .zip(&self.cell_end)
            .map(|(s, e)| e - s)
            .max()
            .unwrap_or(0)
    }
}

fn bounding_box(positions: &[[f64; 2]]) -> ([f64; 2], [f64; 2]) {
    if positions.is_empty() {
        return ([0.0, 0.0], [0.0, 0.0]);
    }
    let mut min = [f64::MAX, f64::MAX];
    let mut max = [f64::MIN, f64::MIN];
    for p in positions {
        min[0] = min[0].min(p[0]);
        min[1] = min[1].min(p[1]);
        max[0] = max[0].max(p[0]);
        max[1] = max[1].max(p[1]);
    }
    (min, max)
}

fn grid_dims(extent: [f64; 2], cell_size: f64) -> (f64, f64) {
    (
        (extent[0] / cell_size).ceil() + 1.0,
        (extent[1] / cell_size).ceil() + 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(positions: &[[f64; 2]], radius: f64) -> UniformGrid {
        let mut grid = UniformGrid::new(1.2);
        grid.rebuild(positions, radius);
        grid
    }

    #[test]
    fn empty_grid_visits_nothing() {
        let grid = grid_with(&[], 2.0);
        assert!(grid.is_empty());
        let mut visited = 0;
        grid.visit_candidates([0.0, 0.0], &mut |_| visited += 1);
        assert_eq!(visited, 0);
    }

    #[test]
    fn coincident_agents_collapse_to_single_cell() {
        let positions = vec![[3.0, 3.0]; 5];
        let grid = grid_with(&positions, 2.0);
        assert_eq!(grid.dims(), [1, 1]);
        assert_eq!(grid.cell_agents(0).len(), 5);
    }

    #[test]
    fn zero_radius_guards_cell_size() {
        let positions = vec![[0.0, 0.0], [1.0, 1.0]];
        let grid = grid_with(&positions, 0.0);
        assert!(grid.cell_size() >= MIN_CELL_SIZE);
        assert!(grid.cell_size().is_finite());
    }

    #[test]
    fn dimensions_follow_extent() {
        let positions = vec![[0.0, 0.0], [25.0, 13.0]];
        let grid = grid_with(&positions, 2.0);
        // cell = 2.4; ceil(25 / 2.4) + 1 = 12, ceil(13 / 2.4) + 1 = 7
        assert_eq!(grid.dims(), [12, 7]);
    }

    #[test]
    fn every_agent_lands_in_exactly_one_cell() {
        let positions: Vec<[f64; 2]> = (0..200)
            .map(|i| [(i % 17) as f64 * 0.9, (i / 17) as f64 * 1.3])
            .collect();
        let grid = grid_with(&positions, 1.0);
        let mut seen = vec![0usize; positions.len()];
        for cell in 0..grid.cell_count() {
            for &agent in grid.cell_agents(cell) {
                seen[agent] += 1;
                assert_eq!(grid.cell_of(positions[agent]), cell);
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn outside_points_clamp_to_edge_cells() {
        let positions = vec![[0.0, 0.0], [10.0, 10.0]];
        let grid = grid_with(&positions, 2.0);
        let [nx, ny] = grid.dims();
        assert_eq!(grid.cell_of([-100.0, -100.0]), 0);
        assert_eq!(grid.cell_of([100.0, 100.0]), nx * ny - 1);
        assert_eq!(grid.cell_of([f64::NAN, 0.0]), 0);
    }

    #[test]
    fn corner_cell_block_is_clipped() {
        let positions = vec![[0.0, 0.0], [10.0, 10.0]];
        let grid = grid_with(&positions, 2.0);
        assert_eq!(grid.neighbor_cells(0).count(), 4);
        let [nx, _] = grid.dims();
        assert_eq!(grid.neighbor_cells(nx + 1).count(), 9);
    }

    #[test]
    fn sparse_outlier_enlarges_cells_instead_of_exploding() {
        let positions = vec![[0.0, 0.0], [1.0e7, 1.0e7]];
        let grid = grid_with(&positions, 0.01);
        assert!(grid.cell_count() <= MAX_GRID_CELLS);
        assert!(grid.cell_size() > 0.012);
    }
}
