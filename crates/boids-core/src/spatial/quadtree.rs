/// Axis-aligned rectangle with inclusive edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Rect {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Bounding square of a circle.
    pub fn around(center: [f64; 2], radius: f64) -> Self {
        Self {
            min: [center[0] - radius, center[1] - radius],
            max: [center[0] + radius, center[1] + radius],
        }
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min[0] <= other.max[0]
            && other.min[0] <= self.max[0]
            && self.min[1] <= other.max[1]
            && other.min[1] <= self.max[1]
    }

    fn mid(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    /// Child slot for `p`: 0 bottom-left, 1 bottom-right, 2 top-left, 3 top-right.
    /// Points on a split line go to the upper/right child so each point has one home.
    fn quadrant_of(&self, p: [f64; 2]) -> usize {
        let mid = self.mid();
        (p[0] >= mid[0]) as usize | (((p[1] >= mid[1]) as usize) << 1)
    }

    fn quadrants(&self) -> [Rect; 4] {
        let mid = self.mid();
        [
            Rect::new(self.min, mid),
            Rect::new([mid[0], self.min[1]], [self.max[0], mid[1]]),
            Rect::new([self.min[0], mid[1]], [mid[0], self.max[1]]),
            Rect::new(mid, self.max),
        ]
    }
}

#[derive(Clone, Debug)]
struct Node {
    bounds: Rect,
    depth: usize,
    /// Index of the first of four consecutive children.
    children: Option<usize>,
    entries: Vec<(usize, [f64; 2])>,
}

/// Region quad-tree over the arena. Leaves split once they hold `max_objects`
/// entries, down to `max_depth`.
///
/// Node storage is kept between rebuilds; [`QuadTree::clear`] only resets the
/// live node count.
#[derive(Clone, Debug)]
pub struct QuadTree {
    max_objects: usize,
    max_depth: usize,
    nodes: Vec<Node>,
    live_nodes: usize,
    /// Agents outside the root bounds; returned by every query.
    overflow: Vec<usize>,
    len: usize,
}

impl QuadTree {
    pub fn new(max_objects: usize, max_depth: usize) -> Self {
        Self {
            max_objects: max_objects.max(1),
            max_depth,
            nodes: Vec::new(),
            live_nodes: 0,
            overflow: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    pub fn overflow(&self) -> &[usize] {
        &self.overflow
    }

    pub fn clear(&mut self, root: Rect) {
        self.live_nodes = 0;
        self.overflow.clear();
        self.len = 0;
        self.alloc_node(root, 0);
    }

    pub fn rebuild(&mut self, positions: &[[f64; 2]], root: Rect) {
        self.clear(root);
        for (index, &p) in positions.iter().enumerate() {
            self.insert(index, p);
        }
    }

    fn alloc_node(&mut self, bounds: Rect, depth: usize) -> usize {
        let id = self.live_nodes;
        if let Some(node) = self.nodes.get_mut(id) {
            node.bounds = bounds;
            node.depth = depth;
            node.children = None;
            node.entries.clear();
        } else {
            self.nodes.push(Node {
                bounds,
                depth,
                children: None,
                entries: Vec::new(),
            });
        }
        self.live_nodes += 1;
        id
    }

    pub fn insert(&mut self, index: usize, p: [f64; 2]) {
        self.len += 1;
        if self.live_nodes == 0 || !self.nodes[0].bounds.contains(p) {
            self.overflow.push(index);
            return;
        }
        let mut node = 0;
        loop {
            if let Some(first) = self.nodes[node].children {
                node = first + self.nodes[node].bounds.quadrant_of(p);
                continue;
            }
            let leaf = &self.nodes[node];
            if leaf.entries.len() < self.max_objects || leaf.depth >= self.max_depth {
                self.nodes[node].entries.push((index, p));
                return;
            }
            self.subdivide(node);
        }
    }

    fn subdivide(&mut self, node: usize) {
        let bounds = self.nodes[node].bounds;
        let depth = self.nodes[node].depth + 1;
        let first = self.live_nodes;
        for quadrant in bounds.quadrants() {
            self.alloc_node(quadrant, depth);
        }
        self.nodes[node].children = Some(first);
        let mut moved = std::mem::take(&mut self.nodes[node].entries);
        for &(index, p) in &moved {
            self.nodes[first + bounds.quadrant_of(p)]
                .entries
                .push((index, p));
        }
        moved.clear();
        self.nodes[node].entries = moved;
    }

    /// Visit every stored agent whose position lies inside `area`, plus the overflow list.
    pub fn query(&self, area: &Rect, visit: &mut impl FnMut(usize)) {
        for &index in &self.overflow {
            visit(index);
        }
        if self.live_nodes > 0 {
            self.query_node(0, area, visit);
        }
    }

    fn query_node(&self, node: usize, area: &Rect, visit: &mut impl FnMut(usize)) {
        let n = &self.nodes[node];
        if !n.bounds.overlaps(area) {
            return;
        }
        match n.children {
            Some(first) => {
                for child in first..first + 4 {
                    self.query_node(child, area, visit);
                }
            }
            None => {
                for &(index, p) in &n.entries {
                    if area.contains(p) {
                        visit(index);
                    }
                }
            }
        }
    }

    /// Leaf holding each agent, for invariant checks.
    pub fn leaf_entries(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes[..self.live_nodes]
            .iter()
            .filter(|n| n.children.is_none())
            .flat_map(|n| n.entries.iter().map(|&(index, _)| index))
    }
}
