//! An adaptive quadtree spatial index, rebuilt from scratch every frame.

use super::{broadphase, hull_aabb, refresh_aabbs, CollisionError, CollisionId, HullSource, Pair, AABB};
use crate::math as m;

/// Subdivision never goes deeper than this many levels,
/// whatever the ratio of world size to leaf size.
const MAX_DEPTH: i32 = 20;

type NodeIdx = u32;

/// A quadtree that subdivides space down to a minimum leaf size.
///
/// Objects are stored in every leaf their bounding box touches,
/// so an object straddling a subdivision line ends up in several leaves.
/// Objects whose bounding box isn't entirely inside the tree's bounds
/// are silently left out of the index and never paired with anything.
/// Make the bounds large enough to cover the whole world if that's a problem.
#[derive(Clone, Debug)]
pub struct QuadTree {
    bounds: AABB,
    min_leaf_size: f64,
    // node arena, the root is always at index 0.
    // nodes past `live_nodes` are left over from earlier frames
    // and get reused to keep their allocations
    nodes: Vec<Node>,
    live_nodes: usize,
    aabbs: Vec<AABB>,
}

#[derive(Clone, Debug)]
struct Node {
    bounds: AABB,
    center: m::Vec2,
    // only leaf-sized nodes store objects
    objects: Vec<CollisionId>,
    // ordered low-x low-y, high-x low-y, low-x high-y, high-x high-y.
    // in screen coordinates (y pointing down) that's
    // top left, top right, bottom left, bottom right
    children: [Option<NodeIdx>; 4],
}

/// Parameters for the creation of a [`QuadTree`].
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-types", serde(default))]
pub struct QuadTreeParams {
    /// Area covered by the tree. Objects not entirely inside it are ignored.
    pub bounds: AABB,
    /// Nodes no larger than this in both dimensions aren't subdivided further
    /// and store objects directly.
    ///
    /// Smaller leaves mean fewer unnecessary bounding box checks
    /// but more nodes and more duplicated entries for large objects.
    /// Something around the size of a typical object is a good start.
    pub min_leaf_size: f64,
}

impl Default for QuadTreeParams {
    fn default() -> Self {
        Self {
            bounds: AABB {
                min: m::Vec2::new(-1000.0, -1000.0),
                max: m::Vec2::new(1000.0, 1000.0),
            },
            min_leaf_size: 50.0,
        }
    }
}

impl QuadTree {
    /// Create a new quadtree. See [`QuadTreeParams`] for explanation.
    pub fn new(params: QuadTreeParams) -> Self {
        let bounds = AABB {
            min: params.bounds.min.min_by_component(params.bounds.max),
            max: params.bounds.min.max_by_component(params.bounds.max),
        };
        let largest_extent = bounds.width().max(bounds.height());
        let smallest_allowed = largest_extent / 2.0_f64.powi(MAX_DEPTH);
        let min_leaf_size = if !params.min_leaf_size.is_finite() || params.min_leaf_size <= 0.0 {
            log::debug!(
                "Quadtree leaf size {} is not positive, using {}",
                params.min_leaf_size,
                largest_extent / 64.0
            );
            largest_extent / 64.0
        } else if params.min_leaf_size < smallest_allowed {
            log::debug!(
                "Quadtree leaf size {} would subdivide too deep, using {}",
                params.min_leaf_size,
                smallest_allowed
            );
            smallest_allowed
        } else {
            params.min_leaf_size
        };

        let mut tree = QuadTree {
            bounds,
            min_leaf_size,
            nodes: Vec::new(),
            live_nodes: 0,
            aabbs: Vec::new(),
        };
        tree.reset();
        tree
    }

    /// Register a collider with the tree, returning its id.
    ///
    /// The hull is only read here to validate it and seed its bounding box,
    /// current positions are read again on every [`generate_pairs`][Self::generate_pairs].
    pub fn add_collider(&mut self, hull: &[m::Vec2]) -> Result<CollisionId, CollisionError> {
        let aabb = hull_aabb(self.aabbs.len(), hull)?;
        Ok(self.register(aabb))
    }

    pub(crate) fn register(&mut self, aabb: AABB) -> CollisionId {
        self.aabbs.push(aabb);
        self.aabbs.len() - 1
    }

    pub(crate) fn clear_colliders(&mut self) {
        self.aabbs.clear();
        self.reset();
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        self.aabbs.len()
    }

    /// Bounding boxes of every registered collider as of the latest rebuild.
    #[inline]
    pub fn aabbs(&self) -> &[AABB] {
        &self.aabbs
    }

    #[inline]
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    #[inline]
    pub fn min_leaf_size(&self) -> f64 {
        self.min_leaf_size
    }

    /// Number of nodes in the tree as of the latest rebuild.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    /// Every node holding objects, with its area and the ids stored in it.
    pub fn leaves(&self) -> impl '_ + Iterator<Item = (AABB, &[CollisionId])> {
        self.nodes[..self.live_nodes]
            .iter()
            .filter(|node| !node.objects.is_empty())
            .map(|node| (node.bounds, node.objects.as_slice()))
    }

    /// True if the object is entirely inside the tree and can be indexed.
    #[inline]
    pub fn in_bounds(&self, aabb: &AABB) -> bool {
        self.bounds.contains(aabb)
    }

    /// Rebuild the tree from the current hull positions
    /// and return every pair of indexed objects whose bounding boxes intersect.
    ///
    /// Pairs come out sorted and without duplicates.
    pub fn generate_pairs(
        &mut self,
        hulls: &(impl HullSource + ?Sized),
    ) -> Result<Vec<Pair>, CollisionError> {
        refresh_aabbs(hulls, &mut self.aabbs)?;
        self.rebuild();

        let _span = tracy_span!("quadtree pair query");
        let this = &*self;
        let pairs = broadphase::collect_pairs(self.aabbs.len(), |id, out| {
            this.query_into(id, out);
        });
        log::debug!(
            "Quadtree found {} pairs among {} colliders using {} nodes",
            pairs.len(),
            self.aabbs.len(),
            self.live_nodes
        );
        Ok(pairs)
    }

    /// Throw away every node except an empty root.
    fn reset(&mut self) {
        self.live_nodes = 0;
        self.alloc_node(self.bounds);
    }

    fn rebuild(&mut self) {
        let _span = tracy_span!("quadtree rebuild");
        self.reset();
        let mut dropped = 0;
        for id in 0..self.aabbs.len() {
            let aabb = self.aabbs[id];
            if !self.in_bounds(&aabb) {
                log::trace!("Collider {id} at {aabb:?} is outside the quadtree, skipping");
                dropped += 1;
                continue;
            }
            self.insert(0, id, &aabb);
        }
        if dropped > 0 {
            log::debug!("{dropped} colliders were outside the quadtree bounds");
        }
    }

    fn alloc_node(&mut self, bounds: AABB) -> NodeIdx {
        let idx = self.live_nodes;
        let center = bounds.center();
        if let Some(node) = self.nodes.get_mut(idx) {
            node.bounds = bounds;
            node.center = center;
            node.objects.clear();
            node.children = [None; 4];
        } else {
            self.nodes.push(Node {
                bounds,
                center,
                objects: Vec::new(),
                children: [None; 4],
            });
        }
        self.live_nodes += 1;
        idx as NodeIdx
    }

    #[inline]
    fn is_leaf_sized(&self, bounds: &AABB) -> bool {
        bounds.width() <= self.min_leaf_size && bounds.height() <= self.min_leaf_size
    }

    fn insert(&mut self, node_idx: NodeIdx, id: CollisionId, aabb: &AABB) {
        let node = &self.nodes[node_idx as usize];
        let (bounds, center) = (node.bounds, node.center);
        if self.is_leaf_sized(&bounds) {
            self.nodes[node_idx as usize].objects.push(id);
            return;
        }

        for (quadrant, touches) in touched_quadrants(center, aabb).into_iter().enumerate() {
            if !touches {
                continue;
            }
            let child = match self.nodes[node_idx as usize].children[quadrant] {
                Some(child) => child,
                None => {
                    let child = self.alloc_node(quadrant_bounds(&bounds, center, quadrant));
                    self.nodes[node_idx as usize].children[quadrant] = Some(child);
                    child
                }
            };
            self.insert(child, id, aabb);
        }
    }

    /// Find indexed objects with a greater id than `id` sharing a leaf with it,
    /// and emit a pair for each one whose bounding box actually intersects.
    fn query_into(&self, id: CollisionId, out: &mut Vec<Pair>) {
        let aabb = &self.aabbs[id];
        if !self.in_bounds(aabb) {
            return;
        }
        let mut candidates: Vec<CollisionId> = Vec::new();
        self.collect_candidates(0, id, aabb, &mut candidates);
        candidates.sort_unstable();
        candidates.dedup();

        // sharing a leaf doesn't mean the boxes touch
        out.extend(
            candidates
                .into_iter()
                .filter(|&other| aabb.intersects(&self.aabbs[other]))
                .map(|other| Pair::new(id, other)),
        );
    }

    fn collect_candidates(
        &self,
        node_idx: NodeIdx,
        id: CollisionId,
        aabb: &AABB,
        out: &mut Vec<CollisionId>,
    ) {
        let node = &self.nodes[node_idx as usize];
        if !node.objects.is_empty() {
            // only looking at greater ids makes every pair show up exactly once,
            // from the query of its smaller member
            out.extend(node.objects.iter().copied().filter(|&other| other > id));
            return;
        }

        for (quadrant, touches) in touched_quadrants(node.center, aabb).into_iter().enumerate() {
            if let (true, Some(child)) = (touches, node.children[quadrant]) {
                self.collect_candidates(child, id, aabb, out);
            }
        }
    }
}

/// Which quadrants around `center` a bounding box touches, boundaries included.
#[inline]
fn touched_quadrants(center: m::Vec2, aabb: &AABB) -> [bool; 4] {
    let low_x = aabb.min.x <= center.x;
    let high_x = aabb.max.x >= center.x;
    let low_y = aabb.min.y <= center.y;
    let high_y = aabb.max.y >= center.y;
    [
        low_x && low_y,
        high_x && low_y,
        low_x && high_y,
        high_x && high_y,
    ]
}

fn quadrant_bounds(bounds: &AABB, center: m::Vec2, quadrant: usize) -> AABB {
    let (min_x, max_x) = if quadrant & 1 == 0 {
        (bounds.min.x, center.x)
    } else {
        (center.x, bounds.max.x)
    };
    let (min_y, max_y) = if quadrant & 2 == 0 {
        (bounds.min.y, center.y)
    } else {
        (center.y, bounds.max.y)
    };
    AABB {
        min: m::Vec2::new(min_x, min_y),
        max: m::Vec2::new(max_x, max_y),
    }
}
