//! The top-level collision detector that runs a broad phase every frame
//! and answers per-object queries against the result.

use super::{
    hull_aabb, BroadPhase, CollisionError, CollisionId, HullSource, NarrowPhase, Pair, AABB,
};
use crate::math as m;

/// How candidate pairs from the broad phase are turned into collisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum Refinement {
    /// Bounding box overlap counts as a collision.
    #[default]
    BroadPhaseOnly,
    /// Candidate pairs are checked with an exact test and dropped if they don't overlap.
    Exact(NarrowPhase),
}

/// Keeps track of registered colliders and the pairs colliding in the latest frame.
///
/// Colliders are registered once with [`add_collider`][Self::add_collider]
/// and identified by the returned [`CollisionId`] from then on.
/// Every frame, after the hulls have moved, call [`update`][Self::update]
/// with the current hulls and then query away.
#[derive(Clone, Debug, Default)]
pub struct CollisionDetector {
    broad_phase: BroadPhase,
    refinement: Refinement,
    // last known bounding box of every collider, used to replay colliders into a new broad phase
    aabbs: Vec<AABB>,
    pairs: Vec<Pair>,
}

impl CollisionDetector {
    pub fn new(broad_phase: BroadPhase) -> Self {
        Self {
            broad_phase,
            ..Default::default()
        }
    }

    pub fn with_refinement(mut self, refinement: Refinement) -> Self {
        self.refinement = refinement;
        self
    }

    /// Register a collider and return its id, which is the number of colliders
    /// registered before it.
    pub fn add_collider(&mut self, hull: &[m::Vec2]) -> Result<CollisionId, CollisionError> {
        let id = self.aabbs.len();
        let aabb = hull_aabb(id, hull)?;
        let strategy_id = self.broad_phase.register(aabb);
        if strategy_id != id {
            log::warn!(
                "Collider {id} was registered as {strategy_id} in the broad phase, \
                 it was probably swapped without replaying colliders"
            );
        }
        self.aabbs.push(aabb);
        Ok(id)
    }

    /// Replace the broad phase, returning the old one.
    ///
    /// Colliders are NOT carried over. The new broad phase must already contain
    /// every collider registered so far, in the same order, or pairs involving
    /// the missing ones will silently disappear after the next update.
    /// Use [`set_broad_phase_replaying`][Self::set_broad_phase_replaying]
    /// to carry them over automatically.
    pub fn set_broad_phase(&mut self, broad_phase: BroadPhase) -> BroadPhase {
        if broad_phase.collider_count() != self.aabbs.len() {
            log::warn!(
                "New broad phase has {} colliders but the detector has {}",
                broad_phase.collider_count(),
                self.aabbs.len()
            );
        }
        std::mem::replace(&mut self.broad_phase, broad_phase)
    }

    /// Replace the broad phase, registering every known collider into it first.
    /// Anything previously registered in the new broad phase is discarded.
    pub fn set_broad_phase_replaying(&mut self, mut broad_phase: BroadPhase) -> BroadPhase {
        broad_phase.clear_colliders();
        for aabb in &self.aabbs {
            broad_phase.register(*aabb);
        }
        log::debug!("Replayed {} colliders into new broad phase", self.aabbs.len());
        std::mem::replace(&mut self.broad_phase, broad_phase)
    }

    #[inline]
    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    #[inline]
    pub fn refinement(&self) -> Refinement {
        self.refinement
    }

    /// Change how pairs are refined. Takes effect on the next update.
    #[inline]
    pub fn set_refinement(&mut self, refinement: Refinement) {
        self.refinement = refinement;
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        self.aabbs.len()
    }

    /// Pairs found in the latest update, sorted.
    #[inline]
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Find the colliding pairs for this frame, replacing the ones from the previous frame.
    ///
    /// `hulls` must be able to resolve every registered id.
    /// On error the pairs from the previous frame are kept.
    pub fn update(&mut self, hulls: &(impl HullSource + ?Sized)) -> Result<(), CollisionError> {
        let _span = tracy_span!("collision update");

        let mut pairs = self.broad_phase.generate_pairs(hulls)?;
        let fresh = self.broad_phase.aabbs();
        let known = fresh.len().min(self.aabbs.len());
        self.aabbs[..known].copy_from_slice(&fresh[..known]);

        if let Refinement::Exact(narrow_phase) = self.refinement {
            let candidate_count = pairs.len();
            pairs = refine_pairs(hulls, self.broad_phase.collider_count(), pairs, narrow_phase)?;
            log::debug!(
                "{narrow_phase:?} kept {} of {candidate_count} candidate pairs",
                pairs.len()
            );
        }

        self.pairs = pairs;
        Ok(())
    }

    /// Ids of every collider colliding with `id` in the latest update, in ascending order.
    pub fn query_collision(&self, id: CollisionId) -> Result<Vec<CollisionId>, CollisionError> {
        self.check_id(id)?;
        Ok(self.pairs.iter().filter_map(|p| p.other(id)).collect())
    }

    /// Whether `id` collided with anything in the latest update.
    pub fn query_is_colliding(&self, id: CollisionId) -> Result<bool, CollisionError> {
        self.check_id(id)?;
        Ok(self.pairs.iter().any(|p| p.contains(id)))
    }

    /// Run an exact test between two registered colliders right now,
    /// independent of the latest update.
    pub fn collides_exact(
        &self,
        hulls: &(impl HullSource + ?Sized),
        a: CollisionId,
        b: CollisionId,
        narrow_phase: NarrowPhase,
    ) -> Result<bool, CollisionError> {
        self.check_id(a)?;
        self.check_id(b)?;
        let hull_a = hulls.hull(a).ok_or(CollisionError::MissingHull { id: a })?;
        let hull_b = hulls.hull(b).ok_or(CollisionError::MissingHull { id: b })?;
        Ok(narrow_phase.overlaps(hull_a, hull_b))
    }

    fn check_id(&self, id: CollisionId) -> Result<(), CollisionError> {
        if id < self.aabbs.len() {
            Ok(())
        } else {
            Err(CollisionError::UnknownCollider {
                id,
                count: self.aabbs.len(),
            })
        }
    }
}

/// Drop the pairs whose hulls don't actually overlap.
fn refine_pairs(
    hulls: &(impl HullSource + ?Sized),
    collider_count: usize,
    pairs: Vec<Pair>,
    narrow_phase: NarrowPhase,
) -> Result<Vec<Pair>, CollisionError> {
    let _span = tracy_span!("narrow phase");
    let views: Vec<&[m::Vec2]> = (0..collider_count)
        .map(|id| hulls.hull(id).ok_or(CollisionError::MissingHull { id }))
        .collect::<Result<_, _>>()?;

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        Ok(pairs
            .into_par_iter()
            .filter(|p| narrow_phase.overlaps(views[p.a], views[p.b]))
            .collect())
    }
    #[cfg(not(feature = "parallel"))]
    {
        Ok(pairs
            .into_iter()
            .filter(|p| narrow_phase.overlaps(views[p.a], views[p.b]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::{GridParams, QuadTreeParams};
    use super::*;

    fn detector_with(hulls: &[Vec<m::Vec2>]) -> CollisionDetector {
        let mut detector = CollisionDetector::default();
        for h in hulls {
            detector.add_collider(h).unwrap();
        }
        detector
    }

    #[test]
    fn disjoint_squares() {
        let hulls = vec![square(0.0, 0.0, 1.0), square(10.0, 10.0, 1.0)];
        let mut detector = detector_with(&hulls);
        detector.update(&hulls).unwrap();
        assert!(detector.pairs().is_empty());
        assert!(!detector.query_is_colliding(0).unwrap());
        assert!(detector.query_collision(1).unwrap().is_empty());
    }

    #[test]
    fn overlapping_triangles() {
        let hulls = vec![
            poly(&[[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]),
            poly(&[[1.0, 1.0], [5.0, 1.0], [1.0, 5.0]]),
        ];
        for refinement in [
            Refinement::BroadPhaseOnly,
            Refinement::Exact(NarrowPhase::Gjk),
            Refinement::Exact(NarrowPhase::Sat),
        ] {
            let mut detector = detector_with(&hulls).with_refinement(refinement);
            detector.update(&hulls).unwrap();
            assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);
            assert_eq!(detector.query_collision(0).unwrap(), vec![1]);
            assert!(detector.query_is_colliding(1).unwrap());
        }
    }

    #[test]
    fn exact_refinement_drops_box_only_overlaps() {
        let hulls = vec![
            poly(&[[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]),
            poly(&[[3.0, 3.0], [5.0, 3.0], [3.0, 5.0]]),
        ];
        let mut detector = detector_with(&hulls);
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);

        for narrow_phase in [NarrowPhase::Gjk, NarrowPhase::Sat] {
            detector.set_refinement(Refinement::Exact(narrow_phase));
            detector.update(&hulls).unwrap();
            assert!(detector.pairs().is_empty());
            assert!(!detector.query_is_colliding(0).unwrap());
            assert!(!detector.collides_exact(&hulls, 0, 1, narrow_phase).unwrap());
        }
    }

    #[test]
    fn queries_return_every_partner() {
        let hulls = vec![
            square(0.0, 0.0, 2.0),
            square(1.5, 0.0, 2.0),
            square(3.0, 0.0, 2.0),
        ];
        let mut detector = detector_with(&hulls);
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &[Pair::new(0, 1), Pair::new(1, 2)]);
        assert_eq!(detector.query_collision(1).unwrap(), vec![0, 2]);
        assert_eq!(detector.query_collision(2).unwrap(), vec![1]);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let hulls = vec![square(0.0, 0.0, 1.0), square(0.5, 0.5, 1.0)];
        let mut detector = detector_with(&hulls);
        detector.update(&hulls).unwrap();
        let unknown = Err(CollisionError::UnknownCollider { id: 2, count: 2 });
        assert_eq!(detector.query_collision(2), unknown);
        assert_eq!(
            detector.query_is_colliding(2),
            Err(CollisionError::UnknownCollider { id: 2, count: 2 })
        );
        assert_eq!(
            detector.collides_exact(&hulls, 0, 2, NarrowPhase::Sat),
            Err(CollisionError::UnknownCollider { id: 2, count: 2 })
        );
    }

    #[test]
    fn invalid_input_leaves_state_alone() {
        let hulls = vec![square(0.0, 0.0, 1.0), square(0.5, 0.5, 1.0)];
        let mut detector = detector_with(&hulls);
        assert_eq!(
            detector.add_collider(&poly(&[[0.0, 0.0], [1.0, 1.0]])),
            Err(CollisionError::DegenerateHull { id: 2, points: 2 })
        );
        assert_eq!(detector.collider_count(), 2);

        detector.update(&hulls).unwrap();
        assert_eq!(
            detector.update(&hulls[..1]),
            Err(CollisionError::MissingHull { id: 1 })
        );
        // previous frame's pairs survive a failed update
        assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);
    }

    #[test]
    fn hulls_are_validated_on_update() {
        let mut hulls = vec![square(0.0, 0.0, 1.0), square(0.5, 0.5, 1.0)];
        let mut detector = detector_with(&hulls);
        detector.update(&hulls).unwrap();
        let boxes_before = detector.broad_phase().aabbs().to_vec();

        // the first hull moves validly, the second goes bad
        for p in &mut hulls[0] {
            *p += m::Vec2::new(100.0, 100.0);
        }
        hulls[1][1].x = f64::NAN;
        assert_eq!(
            detector.update(&hulls),
            Err(CollisionError::NonFiniteHull { id: 1 })
        );
        assert_eq!(detector.broad_phase().aabbs(), &boxes_before[..]);
        assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);

        hulls[1] = poly(&[[0.0, 0.0], [1.0, 1.0]]);
        assert_eq!(
            detector.update(&hulls),
            Err(CollisionError::DegenerateHull { id: 1, points: 2 })
        );
        assert_eq!(detector.broad_phase().aabbs(), &boxes_before[..]);

        // replaying after a failure carries the last good boxes
        detector.set_broad_phase_replaying(BroadPhase::quadtree(QuadTreeParams::default()));
        assert_eq!(detector.broad_phase().aabbs(), &boxes_before[..]);

        hulls[1] = square(100.5, 100.5, 1.0);
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);
        assert_eq!(detector.broad_phase().aabbs()[0].min, m::Vec2::new(100.0, 100.0));
    }

    #[test]
    fn swapping_broad_phase_needs_replay() {
        let hulls = vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)];
        let mut detector = detector_with(&hulls);
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);

        let old = detector.set_broad_phase(BroadPhase::quadtree(QuadTreeParams::default()));
        assert_eq!(old.collider_count(), 2);
        // pairs stay until the next update
        assert_eq!(detector.pairs().len(), 1);
        detector.update(&hulls).unwrap();
        assert!(detector.pairs().is_empty());
        assert_eq!(detector.collider_count(), 2);

        detector.set_broad_phase_replaying(BroadPhase::quadtree(QuadTreeParams::default()));
        assert_eq!(detector.broad_phase().collider_count(), 2);
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &[Pair::new(0, 1)]);

        // colliders added after the swap still line up
        let mut hulls = hulls;
        hulls.push(square(2.5, 2.5, 1.0));
        assert_eq!(detector.add_collider(&hulls[2]).unwrap(), 2);
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &[Pair::new(0, 1), Pair::new(1, 2)]);
    }

    #[test]
    fn replay_uses_latest_positions() {
        let mut hulls = vec![square(0.0, 0.0, 1.0), square(50.0, 50.0, 1.0)];
        let mut detector = detector_with(&hulls);
        for p in &mut hulls[1] {
            *p -= m::Vec2::new(49.5, 49.5);
        }
        detector.update(&hulls).unwrap();
        detector.set_broad_phase_replaying(BroadPhase::grid(GridParams::default()));
        let replayed = detector.broad_phase().aabbs()[1];
        assert_eq!(replayed.min, m::Vec2::new(0.5, 0.5));
    }

    #[test]
    fn refined_pairs_are_a_subset() {
        let area = AABB {
            min: m::Vec2::new(-300.0, -300.0),
            max: m::Vec2::new(300.0, 300.0),
        };
        let hulls = random_scene(42, 250, area, 25.0);
        let mut detector = CollisionDetector::new(BroadPhase::quadtree(QuadTreeParams {
            bounds: area,
            min_leaf_size: 40.0,
        }));
        for h in &hulls {
            detector.add_collider(h).unwrap();
        }
        detector.update(&hulls).unwrap();
        let candidates = detector.pairs().to_vec();
        assert_eq!(candidates, brute_force_pairs(&hulls));

        // same scene, same answer
        detector.update(&hulls).unwrap();
        assert_eq!(detector.pairs(), &candidates[..]);

        detector.set_refinement(Refinement::Exact(NarrowPhase::Gjk));
        detector.update(&hulls).unwrap();
        let exact = detector.pairs().to_vec();
        assert_valid_pairs(&exact, hulls.len());
        assert!(exact.len() < candidates.len());
        for p in &exact {
            assert!(candidates.binary_search(p).is_ok());
            assert!(detector.collides_exact(&hulls, p.a, p.b, NarrowPhase::Sat).unwrap());
        }
    }

    #[cfg(feature = "serde-types")]
    #[test]
    fn params_from_ron() {
        let grid: GridParams = ron::from_str("(cell_count: 32)").unwrap();
        assert_eq!(grid.cell_count, 32);
        assert_eq!(grid.bounds, GridParams::default().bounds);

        let tree: QuadTreeParams = ron::from_str("(min_leaf_size: 12.5)").unwrap();
        assert_eq!(tree.min_leaf_size, 12.5);

        let refinement: Refinement = ron::from_str("Exact(Sat)").unwrap();
        assert_eq!(refinement, Refinement::Exact(NarrowPhase::Sat));
    }
}
