//! Broad phase collision detection algorithms
//! are responsible for detecting pairs of possibly intersecting objects
//! for further, more accurate narrow phase inspection.

use super::{
    CollisionError, CollisionId, GridParams, HullSource, Pair, QuadTree, QuadTreeParams,
    SpatialGrid, AABB,
};
use crate::math as m;

/// A broad phase algorithm.
///
/// Both variants keep their own table of registered colliders.
/// Ids are handed out densely in registration order.
#[derive(Clone, Debug)]
pub enum BroadPhase {
    /// Uniform grid, for evenly spread objects in a bounded area.
    Grid(SpatialGrid),
    /// Adaptive quadtree, for clustered objects.
    QuadTree(QuadTree),
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::grid(GridParams::default())
    }
}

impl From<SpatialGrid> for BroadPhase {
    fn from(grid: SpatialGrid) -> Self {
        BroadPhase::Grid(grid)
    }
}

impl From<QuadTree> for BroadPhase {
    fn from(tree: QuadTree) -> Self {
        BroadPhase::QuadTree(tree)
    }
}

impl BroadPhase {
    pub fn grid(params: GridParams) -> Self {
        BroadPhase::Grid(SpatialGrid::new(params))
    }

    pub fn quadtree(params: QuadTreeParams) -> Self {
        BroadPhase::QuadTree(QuadTree::new(params))
    }

    /// Register a collider, returning its id (the number of colliders registered before it).
    pub fn add_collider(&mut self, hull: &[m::Vec2]) -> Result<CollisionId, CollisionError> {
        match self {
            BroadPhase::Grid(grid) => grid.add_collider(hull),
            BroadPhase::QuadTree(tree) => tree.add_collider(hull),
        }
    }

    /// Rebuild the spatial index from the current positions of every registered hull
    /// and return the pairs whose bounding boxes intersect.
    ///
    /// Pairs are sorted and unique, and calling this again without moving anything
    /// gives the same result.
    pub fn generate_pairs(
        &mut self,
        hulls: &(impl HullSource + ?Sized),
    ) -> Result<Vec<Pair>, CollisionError> {
        match self {
            BroadPhase::Grid(grid) => grid.generate_pairs(hulls),
            BroadPhase::QuadTree(tree) => tree.generate_pairs(hulls),
        }
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        match self {
            BroadPhase::Grid(grid) => grid.collider_count(),
            BroadPhase::QuadTree(tree) => tree.collider_count(),
        }
    }

    /// Bounding boxes of every registered collider as of the latest rebuild
    /// (or registration, if there hasn't been one since).
    #[inline]
    pub fn aabbs(&self) -> &[AABB] {
        match self {
            BroadPhase::Grid(grid) => grid.aabbs(),
            BroadPhase::QuadTree(tree) => tree.aabbs(),
        }
    }

    pub(crate) fn register(&mut self, aabb: AABB) -> CollisionId {
        match self {
            BroadPhase::Grid(grid) => grid.register(aabb),
            BroadPhase::QuadTree(tree) => tree.register(aabb),
        }
    }

    pub(crate) fn clear_colliders(&mut self) {
        match self {
            BroadPhase::Grid(grid) => grid.clear_colliders(),
            BroadPhase::QuadTree(tree) => tree.clear_colliders(),
        }
    }
}

/// Run a per-object query for every id and gather the resulting pairs in id order.
///
/// The spatial index must be fully built before this is called;
/// queries only read it. With the `parallel` feature each object is queried
/// in its own task with a local buffer, and the buffers are concatenated afterwards,
/// so the output is identical to the serial version.
pub(crate) fn collect_pairs<F>(object_count: usize, query: F) -> Vec<Pair>
where
    F: Fn(CollisionId, &mut Vec<Pair>) + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let per_object: Vec<Vec<Pair>> = (0..object_count)
            .into_par_iter()
            .map(|id| {
                let mut out = Vec::new();
                query(id, &mut out);
                out
            })
            .collect();
        per_object.concat()
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut pairs = Vec::new();
        for id in 0..object_count {
            query(id, &mut pairs);
        }
        pairs
    }
}
