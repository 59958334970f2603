//! Types, aliases and helper operations for doing math with `ultraviolet`.
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug)]
pub struct Unit<T>(T);

impl Unit<Vec2> {
    pub fn new_normalize(v: Vec2) -> Self {
        Unit(v.normalized())
    }

    /// Normalize a vector, or return `None` if it's too short to have a meaningful direction.
    pub fn try_new_normalize(v: Vec2) -> Option<Self> {
        let mag = v.mag();
        if mag > f64::EPSILON && mag.is_finite() {
            Some(Unit(v / mag))
        } else {
            None
        }
    }

    pub fn unit_x() -> Self {
        Unit(Vec2::unit_x())
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// The 2D vector triple product `(a × b) × c`, expanded as `b(a·c) - a(b·c)`.
///
/// `triple_product(ab, ao, ab)` is the component of `ao` perpendicular to `ab`,
/// i.e. a normal of the line through `ab` pointing towards `ao`.
#[inline]
pub fn triple_product(a: Vec2, b: Vec2, c: Vec2) -> Vec2 {
    b * a.dot(c) - a * b.dot(c)
}
