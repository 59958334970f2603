//! Exact overlap tests between two convex hulls.
//!
//! Both tests take hulls as point slices in a consistent winding order
//! (clockwise or counterclockwise, either works) and keep no state between calls.
//!
//! The two disagree on one deliberate detail: hulls that only touch along
//! an edge or at a corner overlap according to [`sat`] but not according to [`gjk`].

use crate::math as m;

pub mod gjk;
pub mod sat;

/// Choice of exact overlap test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum NarrowPhase {
    /// Gilbert-Johnson-Keerthi. Touching hulls don't overlap.
    #[default]
    Gjk,
    /// Separating axis theorem. Touching hulls overlap.
    Sat,
}

impl NarrowPhase {
    /// Check whether two convex hulls overlap.
    #[inline]
    pub fn overlaps(self, hull_a: &[m::Vec2], hull_b: &[m::Vec2]) -> bool {
        match self {
            NarrowPhase::Gjk => gjk::intersects(hull_a, hull_b),
            NarrowPhase::Sat => sat::intersects(hull_a, hull_b),
        }
    }
}
