//! Collision detection for convex polygons.
//!
//! The broad phase ([`BroadPhase`][self::broadphase::BroadPhase]) proposes pairs of
//! polygons whose bounding boxes might overlap. The narrow phase
//! ([`NarrowPhase`][self::narrowphase::NarrowPhase]) proves or disproves overlap for a pair.
//! [`CollisionDetector`][self::detector::CollisionDetector] ties the two together
//! and answers per-object queries.

use crate::math as m;

pub mod broadphase;
pub use broadphase::BroadPhase;

pub mod grid;
pub use grid::{GridParams, SpatialGrid};

pub mod quadtree;
pub use quadtree::{QuadTree, QuadTreeParams};

pub mod narrowphase;
pub use narrowphase::NarrowPhase;

pub mod detector;
pub use detector::{CollisionDetector, Refinement};

/// Stable index of a collider, assigned in registration order.
pub type CollisionId = usize;

/// Errors produced by the collision subsystem.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    #[error("Hull of collider {id} needs at least 3 points, got {points}")]
    DegenerateHull { id: CollisionId, points: usize },
    #[error("Hull of collider {id} contains a non-finite point")]
    NonFiniteHull { id: CollisionId },
    #[error("No collider with id {id} (there are {count} colliders)")]
    UnknownCollider { id: CollisionId, count: usize },
    #[error("Hull source has no hull for registered collider {id}")]
    MissingHull { id: CollisionId },
}

//
// AABB
//

/// An axis-aligned bounding box.
///
/// `min` is componentwise less than or equal to `max` for every box built from points.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    #[inline]
    pub fn zero() -> Self {
        Self {
            min: m::Vec2::zero(),
            max: m::Vec2::zero(),
        }
    }

    /// The smallest box containing every point, or `None` if there are no points.
    pub fn from_points(points: &[m::Vec2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut aabb = AABB {
            min: *first,
            max: *first,
        };
        for p in rest {
            aabb.min = aabb.min.min_by_component(*p);
            aabb.max = aabb.max.max_by_component(*p);
        }
        Some(aabb)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Inclusive overlap test, boxes that share only an edge or a corner intersect.
    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// The overlapping area of two boxes, if any.
    pub fn intersection(&self, other: &AABB) -> Option<AABB> {
        if !self.intersects(other) {
            return None;
        }
        Some(AABB {
            min: self.min.max_by_component(other.min),
            max: self.max.min_by_component(other.max),
        })
    }

    /// True if `other` lies entirely inside this box (boundaries included).
    #[inline]
    pub fn contains(&self, other: &AABB) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// Compute the bounding box of a registered hull, validating it along the way.
pub(crate) fn hull_aabb(id: CollisionId, hull: &[m::Vec2]) -> Result<AABB, CollisionError> {
    if hull.len() < 3 {
        return Err(CollisionError::DegenerateHull {
            id,
            points: hull.len(),
        });
    }
    if hull.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
        return Err(CollisionError::NonFiniteHull { id });
    }
    // length was checked above
    AABB::from_points(hull).ok_or(CollisionError::DegenerateHull { id, points: 0 })
}

//
// Pairs
//

/// A pair of colliders that may be overlapping. Always ordered so that `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    pub a: CollisionId,
    pub b: CollisionId,
}

impl Pair {
    /// Create a pair from two distinct ids in either order.
    #[inline]
    pub fn new(i: CollisionId, j: CollisionId) -> Self {
        debug_assert_ne!(i, j, "A collider can't pair with itself");
        Pair {
            a: i.min(j),
            b: i.max(j),
        }
    }

    #[inline]
    pub fn contains(&self, id: CollisionId) -> bool {
        self.a == id || self.b == id
    }

    /// The member of the pair that isn't `id`, or `None` if `id` isn't in the pair.
    #[inline]
    pub fn other(&self, id: CollisionId) -> Option<CollisionId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

impl From<Pair> for [CollisionId; 2] {
    fn from(p: Pair) -> Self {
        [p.a, p.b]
    }
}

//
// Hull access
//

/// Read access to the current vertex positions of every registered collider.
///
/// The collision subsystem doesn't hold on to caller-owned point storage between frames.
/// Instead, hulls are looked up through this trait whenever current positions are needed,
/// i.e. once per [`update`][self::detector::CollisionDetector::update]
/// and on explicit narrow phase requests.
pub trait HullSource {
    /// Number of hulls available.
    fn hull_count(&self) -> usize;
    /// The hull registered as `id`.
    fn hull(&self, id: CollisionId) -> Option<&[m::Vec2]>;
}

impl<H: AsRef<[m::Vec2]>> HullSource for [H] {
    #[inline]
    fn hull_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn hull(&self, id: CollisionId) -> Option<&[m::Vec2]> {
        self.get(id).map(AsRef::as_ref)
    }
}

impl<H: AsRef<[m::Vec2]>> HullSource for Vec<H> {
    #[inline]
    fn hull_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn hull(&self, id: CollisionId) -> Option<&[m::Vec2]> {
        self.get(id).map(AsRef::as_ref)
    }
}

/// Resolve every registered hull and compute fresh bounding boxes into `aabbs`.
///
/// `aabbs` is only written if every hull resolves and is valid,
/// otherwise it keeps the boxes from before the call.
/// With the `parallel` feature, bounding boxes are computed concurrently.
pub(crate) fn refresh_aabbs(
    hulls: &(impl HullSource + ?Sized),
    aabbs: &mut [AABB],
) -> Result<(), CollisionError> {
    if hulls.hull_count() < aabbs.len() {
        return Err(CollisionError::MissingHull {
            id: hulls.hull_count(),
        });
    }
    let views: Vec<&[m::Vec2]> = (0..aabbs.len())
        .map(|id| hulls.hull(id).ok_or(CollisionError::MissingHull { id }))
        .collect::<Result<_, _>>()?;

    #[cfg(feature = "parallel")]
    let fresh: Vec<AABB> = {
        use rayon::prelude::*;
        views
            .par_iter()
            .enumerate()
            .map(|(id, hull)| hull_aabb(id, hull))
            .collect::<Result<_, _>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let fresh: Vec<AABB> = views
        .iter()
        .enumerate()
        .map(|(id, hull)| hull_aabb(id, hull))
        .collect::<Result<_, _>>()?;

    aabbs.copy_from_slice(&fresh);
    Ok(())
}
