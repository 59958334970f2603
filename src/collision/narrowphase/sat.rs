//! Separating axis test for convex polygons.
//!
//! Every edge normal of both hulls is tried as a candidate separating axis.
//! Intervals that only touch are not separated, so touching hulls overlap.

use crate::math as m;
use itertools::Itertools;

/// Check whether two convex hulls overlap.
///
/// Either hull being empty means no overlap.
pub fn intersects(hull_a: &[m::Vec2], hull_b: &[m::Vec2]) -> bool {
    if hull_a.is_empty() || hull_b.is_empty() {
        return false;
    }
    !edge_normals(hull_a)
        .chain(edge_normals(hull_b))
        .any(|axis| Projection::new(hull_a, axis).separated(&Projection::new(hull_b, axis)))
}

/// Unit normals of every edge of a hull, including the one closing the loop.
/// Zero-length edges have no normal and are skipped.
fn edge_normals(hull: &[m::Vec2]) -> impl '_ + Iterator<Item = m::Unit<m::Vec2>> {
    hull.iter()
        .copied()
        .circular_tuple_windows()
        .filter_map(|(p0, p1)| m::Unit::try_new_normalize(m::left_normal(p1 - p0)))
}

/// The interval a hull covers when projected onto an axis.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Projection {
    min: f64,
    max: f64,
}

impl Projection {
    fn new(hull: &[m::Vec2], axis: m::Unit<m::Vec2>) -> Self {
        hull.iter().map(|p| p.dot(*axis)).fold(
            Projection {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |proj, d| Projection {
                min: proj.min.min(d),
                max: proj.max.max(d),
            },
        )
    }

    #[inline]
    fn separated(&self, other: &Projection) -> bool {
        self.max < other.min || other.max < self.min
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::test_util::*;
    use super::*;

    #[test]
    fn projection_covers_hull() {
        let proj = Projection::new(&square(1.0, 2.0, 3.0), m::Unit::unit_x());
        assert_eq!(proj, Projection { min: 1.0, max: 4.0 });

        let touching = Projection { min: 4.0, max: 5.0 };
        assert!(!proj.separated(&touching));
        assert!(proj.separated(&Projection { min: 4.5, max: 5.0 }));
        assert!(Projection { min: 4.5, max: 5.0 }.separated(&proj));
    }

    #[test]
    fn normals_skip_repeated_vertices() {
        let hull = poly(&[[0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        let normals: Vec<m::Vec2> = edge_normals(&hull).map(|n| *n).collect();
        assert_eq!(normals.len(), 3);
        for n in normals {
            assert!((n.mag() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn overlapping_triangles() {
        let a = poly(&[[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let b = poly(&[[1.0, 1.0], [5.0, 1.0], [1.0, 5.0]]);
        assert!(intersects(&a, &b));
    }

    #[test]
    fn diagonal_axis_separates() {
        // no axis-aligned axis separates these, only the hypotenuse normal does
        let a = poly(&[[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let b = poly(&[[3.0, 3.0], [5.0, 3.0], [3.0, 5.0]]);
        assert!(!intersects(&a, &b));
        assert!(!intersects(&b, &a));
    }

    #[test]
    fn touching_is_overlapping() {
        let a = square(0.0, 0.0, 1.0);
        assert!(intersects(&a, &square(1.0, 0.0, 1.0)));
        assert!(intersects(&a, &square(1.0, 1.0, 1.0)));
        assert!(!intersects(&a, &square(1.01, 0.0, 1.0)));
    }

    #[test]
    fn empty_hulls_never_overlap() {
        assert!(!intersects(&square(0.0, 0.0, 1.0), &[]));
    }
}
