//! # Barnes–Hut Quadtree (2D)
//!
//! This module implements the **2D Barnes–Hut quadtree** used to approximate
//! gravitational acceleration in an `N`-body system, replacing the naive
//! `O(N²)` all-pairs force calculation with an approximate `O(N log N)`
//! method that stays accurate for distant interactions.
//!
//! ## Core Concepts
//!
//! The key idea of Barnes–Hut is to treat a group of distant bodies as a
//! single pseudo-body located at their center of mass.
//!
//! - The simulation square is recursively subdivided into 4 equal quadrants.
//! - Each region becomes a node of the quadtree.
//! - Leaf nodes hold at most one body, or they are subdivided further.
//! - Each node stores:
//!   - total mass of its subtree
//!   - center of mass (COM)
//!   - its region extent (for the opening criterion and for overlay rendering)
//!
//! Nodes live in an arena (`Vec<QuadNode>`) and reference each other by
//! index; the root is always index 0. The tree is rebuilt from scratch each
//! step, reusing the arena's allocation, so there is no incremental update
//! or rebalancing to get wrong.
//!
//! The build is two-phase: structural insertion first, then a separate
//! bottom-up aggregation pass over the finished shape.

use crate::simulation::states::{NVec2, ParticleStore};

/// Subdivision stops at this depth; bodies that still collide here are
/// treated as coincident and share the leaf. Two bodies at the exact same
/// position would otherwise subdivide forever.
pub const MAX_DEPTH: usize = 32;

const ROOT: usize = 0;

/// Axis-aligned square region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: NVec2,
    pub max: NVec2,
}

impl Extent {
    /// The square of half-width `bounds` centered on the origin.
    pub fn centered(bounds: f64) -> Self {
        Self {
            min: NVec2::new(-bounds, -bounds),
            max: NVec2::new(bounds, bounds),
        }
    }

    pub fn center(&self) -> NVec2 {
        (self.min + self.max) * 0.5
    }

    /// Side length; width and height are equal for every node region.
    pub fn side(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Closed-interval containment, matching the quadrant tie-break below.
    pub fn contains(&self, p: &NVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Nearest in-region point. Bodies that drift outside the root are
    /// indexed as if they sat on its edge; their true position is untouched.
    pub fn clamp(&self, p: &NVec2) -> NVec2 {
        NVec2::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
        )
    }

    /// Quadrant index for a point, encoded in 2 bits:
    /// - Bit 0 (value 1): X axis, 0 for left (x < center.x), 1 for right
    /// - Bit 1 (value 2): Y axis, 0 for bottom (y < center.y), 1 for top
    ///
    /// The encoding matches the layout of `children[0..4]` in the nodes.
    fn quadrant_index(&self, p: &NVec2) -> usize {
        let center = self.center();
        let mut idx = 0;
        if p.x >= center.x {
            idx |= 1;
        }
        if p.y >= center.y {
            idx |= 2;
        }
        idx
    }

    /// Extent of the child quadrant `quadrant`, using the same 2-bit
    /// encoding as [`Extent::quadrant_index`].
    fn quadrant(&self, quadrant: usize) -> Extent {
        let center = self.center();
        let mut min = self.min;
        let mut max = self.max;
        if (quadrant & 1) == 0 {
            max.x = center.x;
        } else {
            min.x = center.x;
        }
        if (quadrant & 2) == 0 {
            max.y = center.y;
        } else {
            min.y = center.y;
        }
        Extent { min, max }
    }
}

/// A single quadtree node.
///
/// Each node covers a square region that may contain:
/// - zero bodies (empty leaf)
/// - one body (occupied leaf)
/// - several coincident bodies (leaf at the depth cap)
/// - children (internal node; `bodies` is empty)
pub struct QuadNode {
    pub extent: Extent,
    pub mass: f64, // total mass of the subtree
    pub com: NVec2, // mass-weighted center of the subtree
    pub children: [Option<usize>; 4], // indices into QuadTree::nodes
    pub bodies: Vec<usize>, // body indices held directly; > 1 only at MAX_DEPTH
}

impl QuadNode {
    fn empty(extent: Extent) -> Self {
        Self {
            extent,
            mass: 0.0,
            com: NVec2::zeros(),
            children: [None; 4],
            bodies: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

/// A complete Barnes–Hut quadtree built over the particle store.
///
/// Owns the node arena and the fixed root extent. `build` repopulates the
/// arena in place each step.
pub struct QuadTree {
    pub nodes: Vec<QuadNode>,
    root_extent: Extent,
}

impl QuadTree {
    /// An empty tree over the given root region. No nodes exist until the
    /// first [`QuadTree::build`].
    pub fn new(root_extent: Extent) -> Self {
        Self {
            nodes: Vec::new(),
            root_extent,
        }
    }

    pub fn root_extent(&self) -> Extent {
        self.root_extent
    }

    /// Number of node regions in the most recent build.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Aggregate mass of the whole tree, zero before the first build.
    pub fn total_mass(&self) -> f64 {
        self.nodes.first().map(|root| root.mass).unwrap_or(0.0)
    }

    /// Every node region, in arena order (root first), for overlay rendering.
    pub fn extents(&self) -> impl Iterator<Item = Extent> + '_ {
        self.nodes.iter().map(|node| node.extent)
    }

    /// Rebuild the tree over the current particle positions.
    ///
    /// This:
    /// 1. Resets the arena to a single empty root leaf (keeping capacity).
    /// 2. Inserts each body, subdividing occupied leaves as needed.
    /// 3. Computes total mass and center-of-mass for every node, bottom-up.
    ///
    /// After this returns the tree is immutable until the next build, so it
    /// can be read from any number of threads without locking.
    pub fn build(&mut self, store: &ParticleStore) {
        self.nodes.clear();
        self.nodes.push(QuadNode::empty(self.root_extent));
        for body in 0..store.len() {
            self.insert(ROOT, body, store, 0);
        }
        self.aggregate(ROOT, store);
    }

    /// Insert one body into the subtree rooted at `node_idx`.
    ///
    /// - An internal node forwards the body to the matching quadrant.
    /// - An empty leaf (or any leaf at the depth cap) stores the body.
    /// - An occupied leaf subdivides, then both the resident body and the
    ///   new one are pushed down into their quadrants.
    ///
    /// Quadrant selection always uses the position clamped into the root
    /// extent, so insertion terminates for any (even far out-of-bounds)
    /// position.
    fn insert(&mut self, node_idx: usize, body: usize, store: &ParticleStore, depth: usize) {
        let p = self.root_extent.clamp(&store.particles()[body].x);

        if !self.nodes[node_idx].is_leaf() {
            let quadrant = self.nodes[node_idx].extent.quadrant_index(&p);
            let child = self.nodes[node_idx].children[quadrant]
                .expect("internal node with missing child");
            self.insert(child, body, store, depth + 1);
            return;
        }

        if self.nodes[node_idx].bodies.is_empty() || depth >= MAX_DEPTH {
            self.nodes[node_idx].bodies.push(body);
            return;
        }

        // Occupied leaf: split it and re-insert the resident body along with
        // the new one. They separate at some level unless coincident, in
        // which case the depth cap ends the recursion.
        let resident = std::mem::take(&mut self.nodes[node_idx].bodies);
        self.subdivide(node_idx);
        for b in resident {
            self.insert(node_idx, b, store, depth);
        }
        self.insert(node_idx, body, store, depth);
    }

    /// Turn a leaf into an internal node with four empty child quadrants.
    fn subdivide(&mut self, node_idx: usize) {
        let extent = self.nodes[node_idx].extent;
        for quadrant in 0..4 {
            let child_idx = self.nodes.len();
            self.nodes.push(QuadNode::empty(extent.quadrant(quadrant)));
            self.nodes[node_idx].children[quadrant] = Some(child_idx);
        }
    }

    /// Recursively compute total mass and center-of-mass for a subtree.
    ///
    /// Leaf contribution comes from the bodies held directly (true positions,
    /// not the clamped ones used for indexing); internal contribution is the
    /// mass-weighted combination of the children, computed after recursing
    /// into them.
    fn aggregate(&mut self, node_idx: usize, store: &ParticleStore) {
        let mut mass = 0.0;
        let mut com = NVec2::zeros();

        for k in 0..self.nodes[node_idx].bodies.len() {
            let body = self.nodes[node_idx].bodies[k];
            let p = &store.particles()[body];
            mass += p.m;
            com += p.x * p.m;
        }

        let children = self.nodes[node_idx].children;
        for child_idx in children.iter().flatten() {
            let child_idx = *child_idx;
            self.aggregate(child_idx, store);
            let child = &self.nodes[child_idx];
            if child.mass > 0.0 {
                mass += child.mass;
                com += child.com * child.mass;
            }
        }

        if mass > 0.0 {
            com /= mass;
        }

        let node = &mut self.nodes[node_idx];
        node.mass = mass;
        node.com = com;
    }

    /// Net gravitational acceleration on `body` from the whole tree.
    ///
    /// Traverses from the root applying the opening criterion at each
    /// internal node; leaves interact exactly (self-interaction excluded).
    /// Returns zero before the first build.
    pub fn acceleration(
        &self,
        body: usize,
        store: &ParticleStore,
        g: f64,
        eps2: f64,
        theta: f64,
    ) -> NVec2 {
        let mut acc = NVec2::zeros();
        if self.nodes.is_empty() {
            return acc;
        }
        let pos = store.particles()[body].x;
        self.traverse(ROOT, body, pos, store, g, eps2, theta, &mut acc);
        acc
    }

    /// Recursively accumulate the Barnes–Hut acceleration from one subtree.
    ///
    /// - Empty nodes contribute nothing.
    /// - Leaves interact body-by-body with the softened point-mass kernel,
    ///   skipping the queried body itself.
    /// - An internal node of side `s` at distance `d` from the queried body
    ///   is taken whole (aggregate mass at its COM) when `s < theta * d`;
    ///   otherwise all four children are visited. Written in multiplication
    ///   form so both `theta = 0` and `d = 0` fall through to recursion.
    fn traverse(
        &self,
        node_idx: usize,
        body: usize,
        pos: NVec2,
        store: &ParticleStore,
        g: f64,
        eps2: f64,
        theta: f64,
        acc: &mut NVec2,
    ) {
        let node = &self.nodes[node_idx];

        if node.mass == 0.0 {
            return;
        }

        if node.is_leaf() {
            for &other in &node.bodies {
                if other == body {
                    continue;
                }
                let o = &store.particles()[other];
                let r = o.x - pos;
                let d2 = r.norm_squared() + eps2;
                let inv_r = d2.sqrt().recip();
                let inv_r3 = inv_r * inv_r * inv_r;
                *acc += g * o.m * inv_r3 * r;
            }
            return;
        }

        let r = node.com - pos;
        let d = r.norm();

        if node.extent.side() < theta * d {
            // Far enough away: the whole subtree acts as one point mass at
            // its center of mass.
            let d2 = r.norm_squared() + eps2;
            let inv_r = d2.sqrt().recip();
            let inv_r3 = inv_r * inv_r * inv_r;
            *acc += g * node.mass * inv_r3 * r;
        } else {
            for child_idx in node.children.iter().flatten() {
                self.traverse(*child_idx, body, pos, store, g, eps2, theta, acc);
            }
        }
    }
}
