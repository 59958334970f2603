//! A uniform grid spatial index.

use super::{broadphase, hull_aabb, refresh_aabbs, CollisionError, CollisionId, HullSource, Pair, AABB};
use crate::math as m;

/// A uniform grid of square cells.
///
/// Works best when objects are roughly evenly distributed over a bounded area
/// and not much larger than a cell. Heavily clustered scenes put many objects
/// in the same cells and degrade towards brute force; consider a
/// [`QuadTree`][super::QuadTree] for those.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    bounds: AABB,
    spacing: f64,
    column_count: usize,
    row_count: usize,
    // ids of objects overlapping each cell, row-major.
    // vectors are cleared every frame but keep their allocations
    cells: Vec<Vec<CollisionId>>,
    // bounding boxes from the latest rebuild, indexed by collision id
    aabbs: Vec<AABB>,
}

/// Parameters for the creation of a [`SpatialGrid`].
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-types", serde(default))]
pub struct GridParams {
    /// Area covered by the grid.
    ///
    /// Objects outside of it are still handled correctly because the grid
    /// wraps around toroidally to cover all of space, but far-apart objects
    /// may then share cells and cost unnecessary bounding box checks.
    pub bounds: AABB,
    /// Number of cells along the longer axis of `bounds`.
    /// Cells are square, so the shorter axis gets proportionally fewer cells.
    ///
    /// A good cell size is a little larger than the typical object.
    pub cell_count: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            bounds: AABB {
                min: m::Vec2::new(-1000.0, -1000.0),
                max: m::Vec2::new(1000.0, 1000.0),
            },
            cell_count: 16,
        }
    }
}

impl SpatialGrid {
    /// Create a new grid. See [`GridParams`] for explanation.
    pub fn new(params: GridParams) -> Self {
        let bounds = AABB {
            min: params.bounds.min.min_by_component(params.bounds.max),
            max: params.bounds.min.max_by_component(params.bounds.max),
        };
        let cell_count = if params.cell_count == 0 {
            log::debug!("Grid cell count must be at least 1, using 1");
            1
        } else {
            params.cell_count
        };

        let dominant_extent = bounds.width().max(bounds.height());
        let spacing = if dominant_extent > 0.0 && dominant_extent.is_finite() {
            dominant_extent / cell_count as f64
        } else {
            log::debug!("Grid bounds {bounds:?} have no area, using unit cells");
            1.0
        };
        let column_count = ((bounds.width() / spacing).ceil() as usize).max(1);
        let row_count = ((bounds.height() / spacing).ceil() as usize).max(1);

        SpatialGrid {
            bounds,
            spacing,
            column_count,
            row_count,
            cells: vec![Vec::new(); column_count * row_count],
            aabbs: Vec::new(),
        }
    }

    /// Register a collider with the grid, returning its id.
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

    /// Width and height of a single cell.
    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.spacing
    }

    /// Number of columns and rows in the grid.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.column_count, self.row_count)
    }

    /// Ids of the objects overlapping a cell as of the latest rebuild,
    /// or `None` if the cell is outside the grid.
    pub fn cell(&self, column: usize, row: usize) -> Option<&[CollisionId]> {
        if column >= self.column_count || row >= self.row_count {
            return None;
        }
        self.cells
            .get(row * self.column_count + column)
            .map(Vec::as_slice)
    }

    /// Rebuild the grid from the current hull positions
    /// and return every pair of objects whose bounding boxes intersect.
    ///
    /// Pairs come out sorted and without duplicates.
    pub fn generate_pairs(
        &mut self,
        hulls: &(impl HullSource + ?Sized),
    ) -> Result<Vec<Pair>, CollisionError> {
        refresh_aabbs(hulls, &mut self.aabbs)?;
        self.rebuild();

        let _span = tracy_span!("grid pair query");
        let this = &*self;
        let pairs = broadphase::collect_pairs(self.aabbs.len(), |id, out| {
            this.query_into(id, out);
        });
        log::debug!(
            "Grid found {} pairs among {} colliders",
            pairs.len(),
            self.aabbs.len()
        );
        Ok(pairs)
    }

    fn rebuild(&mut self) {
        let _span = tracy_span!("grid rebuild");
        for cell in &mut self.cells {
            cell.clear();
        }
        for (id, aabb) in self.aabbs.iter().enumerate() {
            let rows = self.cell_rows(aabb);
            for col in self.cell_columns(aabb) {
                for row in rows.clone() {
                    self.cells[row * self.column_count + col].push(id);
                }
            }
        }
    }

    /// Find objects with a greater id than `id` sharing a cell with it,
    /// and emit a pair for each one whose bounding box actually intersects.
    fn query_into(&self, id: CollisionId, out: &mut Vec<Pair>) {
        let aabb = &self.aabbs[id];
        let mut candidates: Vec<CollisionId> = Vec::new();
        let rows = self.cell_rows(aabb);
        for col in self.cell_columns(aabb) {
            for row in rows.clone() {
                candidates.extend(
                    self.cells[row * self.column_count + col]
                        .iter()
                        .copied()
                        .filter(|&other| other > id),
                );
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        // objects in the same cell may still be far enough apart,
        // or only share the cell because of wrapping
        out.extend(
            candidates
                .into_iter()
                .filter(|&other| aabb.intersects(&self.aabbs[other]))
                .map(|other| Pair::new(id, other)),
        );
    }

    fn cell_columns(&self, aabb: &AABB) -> impl Iterator<Item = usize> + Clone {
        wrapped_cell_range(
            aabb.min.x - self.bounds.min.x,
            aabb.max.x - self.bounds.min.x,
            self.spacing,
            self.column_count,
        )
    }

    fn cell_rows(&self, aabb: &AABB) -> impl Iterator<Item = usize> + Clone {
        wrapped_cell_range(
            aabb.min.y - self.bounds.min.y,
            aabb.max.y - self.bounds.min.y,
            self.spacing,
            self.row_count,
        )
    }
}

/// Cell indices covered by the interval `min..=max` along one axis (in grid space),
/// wrapping toroidally for things outside the grid.
///
/// An interval longer than the whole axis covers every cell exactly once.
fn wrapped_cell_range(
    min: f64,
    max: f64,
    spacing: f64,
    count: usize,
) -> impl Iterator<Item = usize> + Clone {
    let count = count as isize;
    let first = (min / spacing).floor() as isize;
    let last = ((max / spacing).floor() as isize).min(first.saturating_add(count - 1));
    (first..=last).map(move |cell| cell.rem_euclid(count) as usize)
}
