use std::collections::HashMap;

type CellKey = (i64, i64);

/// Persistent grid where agents register once and only change buckets when
/// they cross a cell edge.
///
/// Cells are keyed by integer coordinates relative to the origin, so the grid is
/// unbounded and never needs clamping.
#[derive(Clone, Debug)]
pub struct IncrementalGrid {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    agent_cells: Vec<Option<CellKey>>,
    moves_last_sync: usize,
}

impl IncrementalGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            agent_cells: Vec::new(),
            moves_last_sync: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agent_cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of non-empty buckets.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Agents that changed cell during the last [`IncrementalGrid::sync`].
    pub fn moves_last_sync(&self) -> usize {
        self.moves_last_sync
    }

    pub fn cell_key(&self, p: [f64; 2]) -> CellKey {
        let axis = |v: f64| {
            let cell = (v / self.cell_size).floor();
            if cell.is_nan() {
                0
            } else {
                cell as i64
            }
        };
        (axis(p[0]), axis(p[1]))
    }

    pub fn register(&mut self, index: usize, p: [f64; 2]) {
        if index >= self.agent_cells.len() {
            self.agent_cells.resize(index + 1, None);
        }
        if self.agent_cells[index].is_some() {
            self.unregister(index);
        }
        let key = self.cell_key(p);
        self.cells.entry(key).or_default().push(index);
        self.agent_cells[index] = Some(key);
    }

    pub fn unregister(&mut self, index: usize) {
        let Some(key) = self.agent_cells.get_mut(index).and_then(Option::take) else {
            return;
        };
        if let Some(bucket) = self.cells.get_mut(&key) {
            if let Some(pos) = bucket.iter().position(|&i| i == index) {
                bucket.swap_remove(pos);
            }
            if bucket.is_empty() {
                self.cells.remove(&key);
            }
        }
    }

    /// Move `index` to the cell of `p` if it crossed a cell edge. Returns `true` on a move.
    pub fn update(&mut self, index: usize, p: [f64; 2]) -> bool {
        let key = self.cell_key(p);
        match self.agent_cells.get(index).copied().flatten() {
            Some(current) if current == key => false,
            Some(_) => {
                self.unregister(index);
                self.register(index, p);
                true
            }
            None => {
                self.register(index, p);
                true
            }
        }
    }

    /// Bring the grid in line with `positions`. A changed agent count re-registers everyone.
    pub fn sync(&mut self, positions: &[[f64; 2]]) {
        if self.agent_cells.len() != positions.len() {
            self.cells.clear();
            self.agent_cells.clear();
            self.agent_cells.resize(positions.len(), None);
            for (index, &p) in positions.iter().enumerate() {
                self.register(index, p);
            }
            self.moves_last_sync = positions.len();
            return;
        }
        let mut moves = 0;
        for (index, &p) in positions.iter().enumerate() {
            if self.update(index, p) {
                moves += 1;
            }
        }
        self.moves_last_sync = moves;
    }

    /// Visit every agent in the ring of cells covering a circle of `radius` around `center`.
    pub fn visit_candidates(&self, center: [f64; 2], radius: f64, visit: &mut impl FnMut(usize)) {
        let (cx, cy) = self.cell_key(center);
        let reach = (radius / self.cell_size).ceil().max(0.0) as i64;
        for y in cy.saturating_sub(reach)..=cy.saturating_add(reach) {
            for x in cx.saturating_sub(reach)..=cx.saturating_add(reach) {
                if let Some(bucket) = self.cells.get(&(x, y)) {
                    for &index in bucket {
                        visit(index);
                    }
                }
            }
        }
    }
}
