//! Boolean Gilbert-Johnson-Keerthi intersection test.
//!
//! Works on the Minkowski difference `A - B` through its support function
//! and searches for a triangle of support points enclosing the origin.
//! A support point that doesn't get strictly past the origin ends the search,
//! so hulls that only touch are reported as not overlapping.

use crate::math as m;

/// Triangle refinements before giving up.
/// Convex polygons converge in a handful, this only guards against
/// floating point cycling on near-touching shapes.
const MAX_ITERATIONS: usize = 64;

/// Check whether two convex hulls overlap.
///
/// Either hull being empty means no overlap.
pub fn intersects(hull_a: &[m::Vec2], hull_b: &[m::Vec2]) -> bool {
    if hull_a.is_empty() || hull_b.is_empty() {
        return false;
    }
    let support = |dir: m::Vec2| furthest_point(hull_a, dir) - furthest_point(hull_b, -dir);

    // simplex points, newest last: c is the oldest, b the middle one,
    // a the one being added in the current iteration
    let mut dir = m::Vec2::unit_x();
    let mut c = support(dir);
    if c.dot(dir) <= 0.0 {
        return false;
    }
    dir = -c;

    let mut b = support(dir);
    if b.dot(dir) <= 0.0 {
        return false;
    }
    let bc = c - b;
    dir = m::triple_product(bc, -b, bc);
    if dir.mag_sq() == 0.0 {
        // origin is on the line through the segment, either side will do
        dir = m::right_normal(bc);
    }

    for _ in 0..MAX_ITERATIONS {
        let a = support(dir);
        if a.dot(dir) <= 0.0 {
            return false;
        }

        let ao = -a;
        let ab = b - a;
        let ac = c - a;
        let ac_normal = m::triple_product(ab, ac, ac);
        if ac_normal.dot(ao) >= 0.0 {
            // origin is beyond edge ac, b is dropped
            dir = ac_normal;
        } else {
            let ab_normal = m::triple_product(ac, ab, ab);
            if ab_normal.dot(ao) < 0.0 {
                return true;
            }
            // origin is beyond edge ab, c is dropped
            c = b;
            dir = ab_normal;
        }
        b = a;
    }

    log::trace!("GJK gave up after {MAX_ITERATIONS} iterations");
    false
}

/// The vertex of `hull` furthest along `dir`. The first one wins ties.
#[inline]
fn furthest_point(hull: &[m::Vec2], dir: m::Vec2) -> m::Vec2 {
    let mut best = hull[0];
    let mut best_dot = best.dot(dir);
    for &p in &hull[1..] {
        let d = p.dot(dir);
        if d > best_dot {
            best = p;
            best_dot = d;
        }
    }
    best
}
