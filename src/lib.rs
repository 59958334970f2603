/// Open a tracy profiling zone that lasts until the end of the enclosing scope.
/// Does nothing unless the `tracy` feature is on and a client is running.
macro_rules! tracy_span {
    ($name:expr) => {
        tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!($name), 0))
    };
}

pub mod math;
pub use math::{uv, Unit, Vec2};

pub mod collision;
pub use collision::{
    broadphase::{self, BroadPhase},
    detector::{CollisionDetector, Refinement},
    grid::{GridParams, SpatialGrid},
    narrowphase::{self, gjk, sat, NarrowPhase},
    quadtree::{QuadTree, QuadTreeParams},
    CollisionError, CollisionId, HullSource, Pair, AABB,
};
