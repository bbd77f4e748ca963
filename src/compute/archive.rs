//! The layered archive: insertion, eviction and queries.

use std::iter::FusedIterator;

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::schema::{ArchiveConfig, Bounds, ConfigError, HullPolicy, Solution};

use super::hull::HullAccelerator;
use super::index::{LayerIndex, LayerSlot};
use super::layer::{Crowding, LayerForest};
use super::treap::NodeId;

/// Errors returned by archive queries and removals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive holds {available} solutions, {requested} requested")]
    EmptyArchive { requested: usize, available: usize },
    #[error("Layer {rank} requested, archive has {layers} layers")]
    InvalidRank { rank: usize, layers: usize },
    #[error("Objectives must be finite, got ({x}; {y})")]
    NonFiniteObjective { x: f64, y: f64 },
    #[error("Solution index {index} out of range for {len} solutions")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A solution looked up by global index, with its layer statistics.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a, D> {
    pub solution: &'a Solution<D>,
    /// Crowding distance normalized by the layer span; `+inf` at layer ends.
    pub crowding_distance: f64,
    /// Pareto rank, 0 for the non-dominated front.
    pub rank: usize,
}

/// Population of two-objective solutions kept in non-dominated layers.
///
/// Layers are treaps over the first objective; a second treap indexes the
/// layers by rank. Insertion cascades dominated ranges down the ranks,
/// eviction removes the least crowded solution of the last layer.
pub struct Archive<D = ()> {
    layers: LayerForest<D>,
    index: LayerIndex,
    root: Option<NodeId>,
    hull: Option<HullAccelerator>,
    rng: SmallRng,
    len: usize,
    config: ArchiveConfig,
}

impl<D> Default for Archive<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Archive<D> {
    /// Empty archive without hull acceleration, seeded from the OS.
    pub fn new() -> Self {
        Self::build(ArchiveConfig::default())
    }

    /// Empty archive with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(ArchiveConfig {
            hull_policy: HullPolicy::Disabled,
            random_seed: Some(seed),
        })
    }

    /// Empty archive built from a validated configuration.
    pub fn with_config(config: ArchiveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ArchiveConfig) -> Self {
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut seeder = SmallRng::seed_from_u64(seed);
        let layers = LayerForest::new(seeder.r#gen());
        let (layers, hull) = if config.hull_policy.is_enabled() {
            (layers.with_journal(), Some(HullAccelerator::new(config.hull_policy)))
        } else {
            (layers, None)
        };
        Self {
            layers,
            index: LayerIndex::new(seeder.r#gen()),
            root: None,
            hull,
            rng: SmallRng::seed_from_u64(seeder.r#gen()),
            len: 0,
            config,
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Number of stored solutions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty layers.
    pub fn layer_count(&self) -> usize {
        self.index.count(self.root)
    }

    /// Drop every solution.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.index.clear();
        self.root = None;
        self.len = 0;
        self.reset_hull();
    }

    /// Insert a solution, moving every solution it dominates one rank down.
    pub fn add(&mut self, solution: Solution<D>) {
        let node = self.layers.alloc(solution);
        self.len += 1;
        let found = self
            .index
            .smallest_non_dominating_layer(self.root, &self.layers, self.layers.item(node));
        match found {
            None => self.append_layer(node),
            Some((layer, rank)) => self.cascade(layer, rank, node),
        }
        self.sync_hull();
    }

    fn append_layer(&mut self, root: NodeId) {
        let len = self.layers.count(Some(root));
        self.root = self.index.append_layer(self.root, LayerSlot { root, len });
        self.reset_hull();
        debug!("archive: layer {} created with {len} solutions", self.layer_count() - 1);
    }

    /// Push `pushed` into `layer` (at `start`) and the displaced ranges into
    /// the following layers until nothing is displaced.
    fn cascade(&mut self, mut layer: NodeId, start: usize, mut pushed: NodeId) {
        let mut rank = start;
        let mut overflow = None;
        loop {
            let slot = *self.index.item(layer);
            let pushed_len = self.layers.count(Some(pushed));
            let step = self.layers.insert_and_split_dominated(slot.root, pushed);
            let displaced_len = self.layers.count(step.displaced);
            self.index.set_item(
                layer,
                LayerSlot {
                    root: step.root,
                    len: slot.len + pushed_len - displaced_len,
                },
            );
            let Some(displaced) = step.displaced else {
                break;
            };
            trace!("archive: {displaced_len} solutions displaced from layer {rank}");
            // The whole old layer was displaced: it shifts down as a unit.
            if step.replaced {
                overflow = Some(displaced);
                break;
            }
            match self.index.next(layer) {
                Some(next) => {
                    layer = next;
                    rank += 1;
                    pushed = displaced;
                }
                None => {
                    overflow = Some(displaced);
                    break;
                }
            }
        }
        self.index.repair_range(self.root, start, rank + 1);

        if let Some(displaced) = overflow {
            let layers = self.layer_count();
            let len = self.layers.count(Some(displaced));
            let slot = LayerSlot { root: displaced, len };
            self.root = self.index.insert_layer_at(self.root, rank + 1, slot);
            if rank + 1 == layers {
                self.reset_hull();
            }
            debug!("archive: layer {} inserted with {len} solutions", rank + 1);
        }
    }

    /// Remove and return the least crowded solution of the last layer.
    pub fn remove_worst(&mut self) -> Result<Solution<D>, ArchiveError> {
        match self.root {
            Some(root) => Ok(self.evict_one(root)),
            None => Err(ArchiveError::EmptyArchive {
                requested: 1,
                available: 0,
            }),
        }
    }

    /// Remove `count` solutions as repeated [`Archive::remove_worst`] would,
    /// dropping whole last layers at once where they fit.
    ///
    /// Nothing is removed if the archive holds fewer than `count`.
    pub fn remove_worst_many(&mut self, count: usize) -> Result<(), ArchiveError> {
        self.check_available(count)?;
        let mut remaining = count;
        while remaining > 0 {
            let Some(root) = self.root else {
                break;
            };
            let last = *self.index.item(self.index.rightmost(root));
            if last.len <= remaining {
                remaining -= last.len;
                self.drop_last_layer(root);
            } else {
                self.evict_one(root);
                remaining -= 1;
            }
        }
        self.sync_hull();
        Ok(())
    }

    /// Remove `count` solutions the way batch NSGA-II truncation does: whole
    /// last layers while they fit, then the least crowded solutions of the
    /// new last layer, ranked once before any of them is removed. Ties keep
    /// the x order.
    pub fn truncate_by_crowding(&mut self, count: usize) -> Result<(), ArchiveError> {
        self.check_available(count)?;
        let mut remaining = count;
        while remaining > 0 {
            let Some(root) = self.root else {
                break;
            };
            let last = self.index.rightmost(root);
            let slot = *self.index.item(last);
            if slot.len <= remaining {
                remaining -= slot.len;
                self.drop_last_layer(root);
                continue;
            }

            let mut ranked: Vec<(Crowding, NodeId)> = self
                .layers
                .walk(Some(self.layers.leftmost(slot.root)))
                .map(|id| (self.layers.summary(id).crowding(), id))
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut layer_root = slot.root;
            for &(_, id) in &ranked[..remaining] {
                layer_root = match self.layers.detach(layer_root, id) {
                    Some(rest) => rest,
                    None => panic!("truncation emptied a layer it should only thin out"),
                };
                self.layers.release(id);
            }
            let rank = self.layer_count() - 1;
            let len = slot.len - remaining;
            self.index.set_layer(root, last, rank, LayerSlot { root: layer_root, len });
            self.len -= remaining;
            debug!("archive: truncated {remaining} solutions from layer {rank}");
            remaining = 0;
        }
        self.reset_hull();
        self.sync_hull();
        Ok(())
    }

    fn check_available(&self, requested: usize) -> Result<(), ArchiveError> {
        if requested > self.len {
            return Err(ArchiveError::EmptyArchive {
                requested,
                available: self.len,
            });
        }
        Ok(())
    }

    fn evict_one(&mut self, root: NodeId) -> Solution<D> {
        let last = self.index.rightmost(root);
        let slot = *self.index.item(last);
        if let Some(hull) = self.hull.as_mut() {
            hull.note_removal();
        }
        let solution = if slot.len == 1 {
            match self.drop_last_layer(root).pop() {
                Some(solution) => solution,
                None => panic!("single-solution layer released no solution"),
            }
        } else {
            let victim = self.pick_victim(slot);
            let rest = match self.layers.detach(slot.root, victim) {
                Some(rest) => rest,
                None => panic!("eviction emptied a layer of {} solutions", slot.len),
            };
            let rank = self.layer_count() - 1;
            self.index.set_layer(root, last, rank, LayerSlot { root: rest, len: slot.len - 1 });
            self.len -= 1;
            self.layers.release(victim)
        };
        self.sync_hull();
        solution
    }

    /// Least crowded node of the last layer. Layers of one or two solutions
    /// have no interior point; one of the ends is drawn at random.
    fn pick_victim(&mut self, last: LayerSlot) -> NodeId {
        if last.len <= 2 {
            let first = self.layers.leftmost(last.root);
            if last.len == 1 || self.rng.gen_bool(0.5) {
                first
            } else {
                self.layers.rightmost(last.root)
            }
        } else if let Some(hull) = self.hull.as_mut() {
            hull.least_crowded(&self.layers, last.root)
        } else {
            self.layers.worst(last.root)
        }
    }

    fn drop_last_layer(&mut self, root: NodeId) -> Vec<Solution<D>> {
        let (rest, slot) = self.index.drop_last_layer(root);
        self.root = rest;
        self.len -= slot.len;
        self.reset_hull();
        debug!("archive: last layer dropped with {} solutions", slot.len);
        self.layers.release_tree(slot.root)
    }

    fn last_layer_root(&self) -> Option<NodeId> {
        self.root.map(|root| self.index.item(self.index.rightmost(root)).root)
    }

    fn reset_hull(&mut self) {
        if let Some(hull) = self.hull.as_mut() {
            hull.reset();
        }
    }

    fn sync_hull(&mut self) {
        debug_assert_eq!(self.layers.live(), self.len, "archive size out of sync with its layers");
        let last = self.last_layer_root();
        if let Some(hull) = self.hull.as_mut() {
            let relinked = self.layers.drain_relinked();
            hull.after_mutation(&self.layers, last, &relinked);
        }
    }

    /// The `index`-th solution in rank order, then ascending x.
    pub fn kth(&self, index: usize) -> Result<Sample<'_, D>, ArchiveError> {
        let root = match self.root {
            Some(root) if index < self.len => root,
            _ => {
                return Err(ArchiveError::IndexOutOfRange { index, len: self.len });
            }
        };
        let found = self.index.kth_solution(root, index, &self.layers);
        let layer_root = self.index.item(found.layer).root;
        Ok(Sample {
            solution: self.layers.item(found.node),
            crowding_distance: self.layers.crowding_distance(layer_root, found.node),
            rank: found.rank,
        })
    }

    /// A uniformly random solution with its crowding distance and rank.
    pub fn random(&mut self) -> Result<Sample<'_, D>, ArchiveError> {
        if self.len == 0 {
            return Err(ArchiveError::EmptyArchive {
                requested: 1,
                available: 0,
            });
        }
        let index = self.rng.gen_range(0..self.len);
        self.kth(index)
    }

    /// Solutions of layer `rank` in ascending x.
    pub fn layer(&self, rank: usize) -> Result<LayerIter<'_, D>, ArchiveError> {
        let slot = self.slot(rank)?;
        Ok(LayerIter {
            layers: &self.layers,
            next: Some(self.layers.leftmost(slot.root)),
            remaining: slot.len,
        })
    }

    /// Number of solutions in layer `rank`.
    pub fn layer_len(&self, rank: usize) -> Result<usize, ArchiveError> {
        Ok(self.slot(rank)?.len)
    }

    /// The first front; empty when the archive is.
    pub fn non_dominated(&self) -> LayerIter<'_, D> {
        self.layer(0).unwrap_or(LayerIter {
            layers: &self.layers,
            next: None,
            remaining: 0,
        })
    }

    fn slot(&self, rank: usize) -> Result<LayerSlot, ArchiveError> {
        let layers = self.layer_count();
        match self.root {
            Some(root) if rank < layers => Ok(*self.index.item(self.index.nth(root, rank))),
            _ => Err(ArchiveError::InvalidRank { rank, layers }),
        }
    }

    /// Share of the reference box dominated by the first front.
    ///
    /// Points outside `bounds` are ignored.
    pub fn hypervolume(&self, bounds: &Bounds) -> f64 {
        let mut volume = 0.0;
        let mut ceiling = 1.0;
        for solution in self.non_dominated() {
            let (x, y) = solution.normalized(bounds);
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                continue;
            }
            // Ascending x means descending y along the front.
            if y < ceiling {
                volume += (1.0 - x) * (ceiling - y);
                ceiling = y;
            }
        }
        volume
    }
}

impl<D> Extend<Solution<D>> for Archive<D> {
    fn extend<I: IntoIterator<Item = Solution<D>>>(&mut self, iter: I) {
        for solution in iter {
            self.add(solution);
        }
    }
}

impl<D> FromIterator<Solution<D>> for Archive<D> {
    fn from_iter<I: IntoIterator<Item = Solution<D>>>(iter: I) -> Self {
        let mut archive = Self::new();
        archive.extend(iter);
        archive
    }
}

/// Iterator over one layer in ascending x.
pub struct LayerIter<'a, D> {
    layers: &'a LayerForest<D>,
    next: Option<NodeId>,
    remaining: usize,
}

impl<'a, D> Iterator for LayerIter<'a, D> {
    type Item = &'a Solution<D>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.layers.next(id);
        self.remaining -= 1;
        Some(self.layers.item(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<D> ExactSizeIterator for LayerIter<'_, D> {}

impl<D> FusedIterator for LayerIter<'_, D> {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const POLICIES: [HullPolicy; 4] = [
        HullPolicy::Disabled,
        HullPolicy::RebuildImmediately,
        HullPolicy::RebuildEveryNRemovals { interval: 3 },
        HullPolicy::RebuildWhenRangeInvalid,
    ];

    fn archive(policy: HullPolicy) -> Archive {
        Archive::with_config(ArchiveConfig {
            hull_policy: policy,
            random_seed: Some(17),
        })
        .unwrap()
    }

    fn filled(policy: HullPolicy, points: &[(f64, f64)]) -> Archive {
        let mut archive = archive(policy);
        archive.extend(points.iter().map(|&(x, y)| Solution::new(x, y)));
        archive
    }

    fn pop(archive: &mut Archive) -> (f64, f64) {
        let s = archive.remove_worst().unwrap();
        (s.x(), s.y())
    }

    fn sorted(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        points
    }

    fn dominates(a: (f64, f64), b: (f64, f64)) -> bool {
        a.0 <= b.0 && a.1 <= b.1 && (a.0 < b.0 || a.1 < b.1)
    }

    /// Quadratic non-dominated sorting.
    fn reference_layers(points: &[(f64, f64)]) -> Vec<Vec<(f64, f64)>> {
        let mut rest = points.to_vec();
        let mut layers = Vec::new();
        while !rest.is_empty() {
            let (front, later): (Vec<_>, Vec<_>) = rest
                .iter()
                .copied()
                .partition(|&p| !rest.iter().any(|&q| dominates(q, p)));
            layers.push(sorted(front));
            rest = later;
        }
        layers
    }

    fn layers_of(archive: &Archive) -> Vec<Vec<(f64, f64)>> {
        (0..archive.layer_count())
            .map(|rank| {
                let layer: Vec<_> = archive.layer(rank).unwrap().map(|s| (s.x(), s.y())).collect();
                for pair in layer.windows(2) {
                    assert!(pair[0].0 <= pair[1].0 && pair[0].1 >= pair[1].1, "layer {rank} out of order");
                }
                assert_eq!(layer.len(), archive.layer_len(rank).unwrap());
                sorted(layer)
            })
            .collect()
    }

    /// Raw crowding of every solution in the last layer, in x order.
    fn last_layer_areas(archive: &Archive) -> Vec<((f64, f64), f64)> {
        let layer: Vec<_> = archive
            .layer(archive.layer_count() - 1)
            .unwrap()
            .map(|s| (s.x(), s.y()))
            .collect();
        (0..layer.len())
            .map(|i| {
                let area = if i == 0 || i + 1 == layer.len() {
                    f64::INFINITY
                } else {
                    (layer[i + 1].0 - layer[i - 1].0).abs() * (layer[i + 1].1 - layer[i - 1].1).abs()
                };
                (layer[i], area)
            })
            .collect()
    }

    #[test]
    fn test_diagonal_insertion_order() {
        for policy in POLICIES {
            let mut archive = filled(policy, &[(4.0, 4.0), (1.0, 1.0), (6.0, 6.0), (4.0, 4.0)]);
            assert_eq!(archive.len(), 4);
            assert_eq!(archive.layer_count(), 3);
            assert_eq!(archive.layer_len(1).unwrap(), 2);

            assert_eq!(pop(&mut archive), (6.0, 6.0));
            assert_eq!(pop(&mut archive), (4.0, 4.0));
            assert_eq!(pop(&mut archive), (4.0, 4.0));
            assert_eq!(pop(&mut archive), (1.0, 1.0));
            assert!(archive.is_empty());
        }
    }

    #[test]
    fn test_single_front_eviction_order() {
        let points = [(0.0, 7.0), (1.0, 5.0), (2.0, 4.0), (5.0, 3.0), (7.0, 1.0), (8.0, 0.0)];
        for policy in POLICIES {
            let mut archive = filled(policy, &points);
            assert_eq!(archive.layer_count(), 1);

            assert_eq!(pop(&mut archive), (1.0, 5.0), "{policy:?}");
            assert_eq!(pop(&mut archive), (7.0, 1.0), "{policy:?}");
            assert_eq!(pop(&mut archive), (2.0, 4.0), "{policy:?}");
            assert_eq!(pop(&mut archive), (5.0, 3.0), "{policy:?}");
            let ends = sorted(vec![pop(&mut archive), pop(&mut archive)]);
            assert_eq!(ends, vec![(0.0, 7.0), (8.0, 0.0)]);
        }
    }

    #[test]
    fn test_single_element() {
        let mut archive = filled(HullPolicy::Disabled, &[(1.0, 1.0)]);
        assert_eq!(archive.len(), 1);
        assert_eq!(pop(&mut archive), (1.0, 1.0));
        assert_eq!(archive.len(), 0);
        assert_eq!(archive.layer_count(), 0);
    }

    #[test]
    fn test_empty_archive_errors() {
        let mut archive = archive(HullPolicy::Disabled);
        assert_eq!(
            archive.remove_worst().unwrap_err(),
            ArchiveError::EmptyArchive {
                requested: 1,
                available: 0
            }
        );
        assert!(matches!(archive.random(), Err(ArchiveError::EmptyArchive { .. })));
        assert_eq!(
            archive.kth(0).unwrap_err(),
            ArchiveError::IndexOutOfRange { index: 0, len: 0 }
        );
        assert!(matches!(archive.layer(0), Err(ArchiveError::InvalidRank { rank: 0, layers: 0 })));
        assert_eq!(archive.non_dominated().count(), 0);
    }

    #[test]
    fn test_batch_removal_validates_first() {
        let mut archive = filled(HullPolicy::Disabled, &[(1.0, 2.0), (2.0, 1.0)]);
        assert_eq!(
            archive.remove_worst_many(3).unwrap_err(),
            ArchiveError::EmptyArchive {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(archive.len(), 2);
        assert!(matches!(archive.layer(1), Err(ArchiveError::InvalidRank { rank: 1, layers: 1 })));
    }

    #[test]
    fn test_remove_worst_many_drops_whole_layers() {
        for policy in POLICIES {
            let mut archive = filled(policy, &[(4.0, 4.0), (1.0, 1.0), (6.0, 6.0), (4.0, 4.0)]);
            archive.remove_worst_many(2).unwrap();
            assert_eq!(archive.len(), 2);
            assert_eq!(layers_of(&archive), vec![vec![(1.0, 1.0)], vec![(4.0, 4.0)]]);

            archive.remove_worst_many(2).unwrap();
            assert!(archive.is_empty());
            assert_eq!(archive.layer_count(), 0);
        }
    }

    #[test]
    fn test_duplicates_coexist() {
        let mut archive = filled(HullPolicy::Disabled, &[(1.0, 1.0), (1.0, 1.0), (1.0, 1.0), (0.0, 2.0)]);
        assert_eq!(archive.len(), 4);
        assert_eq!(archive.layer_count(), 1);
        assert_eq!(archive.layer_len(0).unwrap(), 4);

        archive.add(Solution::new(0.5, 0.5));
        assert_eq!(layers_of(&archive), vec![
            vec![(0.0, 2.0), (0.5, 0.5)],
            vec![(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)],
        ]);
    }

    #[test]
    fn test_cascade_moves_ranges_down() {
        // Three staircases; the new point dominates parts of the first two.
        let mut archive = filled(HullPolicy::Disabled, &[
            (0.0, 6.0),
            (2.0, 4.0),
            (4.0, 2.0),
            (6.0, 0.0),
            (3.0, 5.0),
            (5.0, 3.0),
            (7.0, 7.0),
        ]);
        assert_eq!(archive.layer_count(), 3);

        archive.add(Solution::new(1.5, 1.5));
        assert_eq!(layers_of(&archive), vec![
            vec![(0.0, 6.0), (1.5, 1.5), (6.0, 0.0)],
            vec![(2.0, 4.0), (4.0, 2.0)],
            vec![(3.0, 5.0), (5.0, 3.0)],
            vec![(7.0, 7.0)],
        ]);
        assert_eq!(archive.len(), 8);
    }

    #[test]
    fn test_kth_and_random_report_layer_statistics() {
        let points = [(0.0, 7.0), (1.0, 5.0), (2.0, 4.0), (5.0, 3.0), (7.0, 1.0), (8.0, 0.0), (9.0, 9.0)];
        let mut archive = filled(HullPolicy::Disabled, &points);

        let sample = archive.kth(1).unwrap();
        assert_eq!(*sample.solution, Solution::new(1.0, 5.0));
        assert_eq!(sample.rank, 0);
        assert_eq!(sample.crowding_distance, 6.0 / 56.0);

        let first = archive.kth(0).unwrap();
        assert!(first.crowding_distance.is_infinite());

        let last = archive.kth(6).unwrap();
        assert_eq!(*last.solution, Solution::new(9.0, 9.0));
        assert_eq!(last.rank, 1);
        assert!(last.crowding_distance.is_infinite());

        assert_eq!(
            archive.kth(7).unwrap_err(),
            ArchiveError::IndexOutOfRange { index: 7, len: 7 }
        );

        for _ in 0..50 {
            let sample = archive.random().unwrap();
            let expected_rank = usize::from(sample.solution.x() == 9.0);
            assert_eq!(sample.rank, expected_rank);
        }
    }

    #[test]
    fn test_payload_travels_with_solution() {
        let mut archive: Archive<&str> = Archive::with_seed(3);
        archive.add(Solution::with_decision(2.0, 2.0, "dominated"));
        archive.add(Solution::with_decision(1.0, 1.0, "best"));
        assert_eq!(archive.remove_worst().unwrap().into_decision(), "dominated");
        assert_eq!(*archive.non_dominated().next().unwrap().decision(), "best");
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut archive = filled(HullPolicy::RebuildImmediately, &[(1.0, 3.0), (2.0, 2.0), (3.0, 1.0), (4.0, 4.0)]);
        archive.clear();
        assert!(archive.is_empty());
        assert_eq!(archive.layer_count(), 0);
        archive.add(Solution::new(5.0, 5.0));
        assert_eq!(layers_of(&archive), vec![vec![(5.0, 5.0)]]);
    }

    #[test]
    fn test_from_iterator() {
        let archive: Archive = [(3.0, 1.0), (1.0, 3.0), (3.0, 3.0)]
            .into_iter()
            .map(|(x, y)| Solution::new(x, y))
            .collect();
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.non_dominated().len(), 2);
    }

    #[test]
    fn test_hypervolume() {
        let bounds = Bounds::new(0.0, 1.0, 0.0, 1.0);
        assert_eq!(archive(HullPolicy::Disabled).hypervolume(&bounds), 0.0);

        let archive = filled(HullPolicy::Disabled, &[(0.25, 0.75), (0.5, 0.5), (0.75, 0.25), (2.0, 0.0), (0.9, 0.9)]);
        assert!((archive.hypervolume(&bounds) - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_truncate_by_crowding() {
        let points = [(0.0, 7.0), (1.0, 5.0), (2.0, 4.0), (5.0, 3.0), (7.0, 1.0), (8.0, 0.0), (9.0, 9.0)];
        let mut archive = filled(HullPolicy::RebuildWhenRangeInvalid, &points);

        archive.truncate_by_crowding(3).unwrap();
        assert_eq!(archive.len(), 4);
        // Ranked once: (2, 4) goes although removing (1, 5) first would
        // have widened its box past that of (7, 1).
        assert_eq!(layers_of(&archive), vec![vec![(0.0, 7.0), (5.0, 3.0), (7.0, 1.0), (8.0, 0.0)]]);

        assert!(archive.truncate_by_crowding(5).is_err());
        assert_eq!(pop(&mut archive), (7.0, 1.0));
    }

    #[test]
    fn test_huge_coordinates_keep_layer_ends() {
        let points = [(0.0, 4e200), (1e200, 3e200), (1.1e200, 2e200), (3e200, 1e200), (4e200, 0.0)];
        for policy in POLICIES {
            for seed in 0..20 {
                let mut archive = Archive::with_config(ArchiveConfig {
                    hull_policy: policy,
                    random_seed: Some(seed),
                })
                .unwrap();
                archive.extend(points.iter().map(|&(x, y)| Solution::new(x, y)));

                for i in 0..archive.len() {
                    let crowding = archive.kth(i).unwrap().crowding_distance;
                    assert!(!crowding.is_nan(), "{policy:?}: NaN crowding at {i}");
                    assert_eq!(crowding.is_infinite(), i == 0 || i == 4, "{policy:?}: crowding {crowding} at {i}");
                }

                assert_eq!(pop(&mut archive), (1e200, 3e200), "{policy:?} seed {seed}");
                assert_eq!(pop(&mut archive), (3e200, 1e200), "{policy:?} seed {seed}");
                assert_eq!(pop(&mut archive), (1.1e200, 2e200), "{policy:?} seed {seed}");
                assert_eq!(layers_of(&archive), vec![vec![(0.0, 4e200), (4e200, 0.0)]]);
            }
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = ArchiveConfig {
            hull_policy: HullPolicy::RebuildEveryNRemovals { interval: 0 },
            random_seed: None,
        };
        assert!(Archive::<()>::with_config(config).is_err());
    }

    fn grid_points() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((0u8..16, 0u8..16), 0..60)
            .prop_map(|v| v.into_iter().map(|(x, y)| (x as f64, y as f64)).collect())
    }

    fn distinct_points() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((0.0f64..1.0, 0.0f64..1.0), 1..50)
    }

    proptest! {
        #[test]
        fn prop_layers_match_reference_sort(points in grid_points(), policy in 0usize..4) {
            let archive = filled(POLICIES[policy], &points);
            prop_assert_eq!(archive.len(), points.len());
            prop_assert_eq!(layers_of(&archive), reference_layers(&points));

            let mut offset = 0;
            for rank in 0..archive.layer_count() {
                let len = archive.layer_len(rank).unwrap();
                prop_assert!(archive.kth(offset).unwrap().crowding_distance.is_infinite());
                prop_assert!(archive.kth(offset + len - 1).unwrap().crowding_distance.is_infinite());
                if len <= 2 {
                    for i in offset..offset + len {
                        prop_assert!(archive.kth(i).unwrap().crowding_distance.is_infinite());
                    }
                }
                for i in offset..offset + len {
                    prop_assert_eq!(archive.kth(i).unwrap().rank, rank);
                }
                offset += len;
            }
        }

        #[test]
        fn prop_round_trip_keeps_layering(points in grid_points(), policy in 0usize..4) {
            let mut archive = filled(POLICIES[policy], &points);
            let mut remaining = points.clone();
            let mut removed = Vec::new();
            while !archive.is_empty() {
                let worst = pop(&mut archive);
                let at = remaining.iter().position(|&p| p == worst);
                prop_assert!(at.is_some());
                remaining.swap_remove(at.unwrap_or_default());
                removed.push(worst);
                prop_assert_eq!(layers_of(&archive), reference_layers(&remaining));
            }
            prop_assert_eq!(sorted(removed), sorted(points));
        }

        #[test]
        fn prop_eviction_takes_least_crowded(
            points in distinct_points(),
            extra in distinct_points(),
            policy in 0usize..4,
        ) {
            let mut archive = filled(POLICIES[policy], &points);
            for (x, y) in extra {
                archive.add(Solution::new(x, y));
                let areas = last_layer_areas(&archive);
                let least = areas.iter().map(|&(_, a)| a).fold(f64::INFINITY, f64::min);
                let worst = pop(&mut archive);
                let area = areas.iter().find(|&&(p, _)| p == worst).map(|&(_, a)| a);
                prop_assert_eq!(area, Some(least));
            }
        }

        #[test]
        fn prop_later_layers_never_dominate_earlier(points in grid_points()) {
            let archive = filled(HullPolicy::Disabled, &points);
            let layers = layers_of(&archive);
            for (i, upper) in layers.iter().enumerate() {
                for lower in &layers[i + 1..] {
                    for &q in lower {
                        prop_assert!(upper.iter().all(|&p| !dominates(q, p)));
                    }
                }
            }
        }
    }
}
