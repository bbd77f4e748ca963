//! Convex-hull acceleration of the eviction query.
//!
//! The last layer is covered by ranges of consecutive nodes. Each range
//! lazily builds the lower-left convex chain of its members' gap boxes
//! `(dx, dy)`. The area `dx * dy` is quasi-concave on the positive quadrant,
//! so its minimum over a range is attained at a vertex of that chain and a
//! query only has to look at a handful of points per range.
//!
//! Chains depend on nothing but the members' gaps, and a gap only changes
//! when one of the member's order links changes. The layer forest journals
//! every relinked node; any relinked member kills its whole range, and the
//! [`HullPolicy`] decides when uncovered nodes are grouped again.
//!
//! Ranges are only ever opened over the current last layer. Since solutions
//! never move to a lower rank, the archive resets the accelerator whenever
//! a different layer becomes the last one.

use log::{debug, trace};

use crate::schema::HullPolicy;

use super::layer::{Crowding, LayerForest};
use super::treap::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RangeId {
    slot: u32,
    generation: u32,
}

#[derive(Debug)]
struct Range {
    members: Vec<NodeId>,
    /// Member indices on the lower-left chain, built on first query.
    chain: Option<Vec<usize>>,
}

#[derive(Debug, Default)]
struct RangeSlot {
    generation: u32,
    range: Option<Range>,
}

/// Range-partitioned hull index over the last layer.
pub struct HullAccelerator {
    policy: HullPolicy,
    slots: Vec<RangeSlot>,
    free: Vec<u32>,
    /// Owning range of each layer node, by arena index.
    owner: Vec<Option<RangeId>>,
    removals: usize,
    repartition: bool,
}

impl HullAccelerator {
    pub fn new(policy: HullPolicy) -> Self {
        Self {
            policy,
            slots: Vec::new(),
            free: Vec::new(),
            owner: Vec::new(),
            removals: 0,
            repartition: true,
        }
    }

    /// Number of ranges currently alive.
    pub fn live_ranges(&self) -> usize {
        self.slots.iter().filter(|slot| slot.range.is_some()).count()
    }

    /// Forget every range. Called when the last layer is replaced.
    pub fn reset(&mut self) {
        self.clear_ranges();
        self.repartition = true;
    }

    fn clear_ranges(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.owner.clear();
    }

    /// Kill the ranges of every node whose order links changed.
    pub fn invalidate(&mut self, relinked: &[NodeId]) {
        let mut killed = 0;
        for &id in relinked {
            if let Some(range) = self.owner_of(id) {
                self.kill(range);
                killed += 1;
            }
        }
        if killed > 0 {
            trace!("hull: {killed} ranges invalidated by {} relinks", relinked.len());
        }
    }

    /// Count a removal from the archive.
    pub fn note_removal(&mut self) {
        if let HullPolicy::RebuildEveryNRemovals { interval } = self.policy {
            self.removals += 1;
            if self.removals >= interval {
                self.removals = 0;
                self.repartition = true;
            }
        }
    }

    /// Hook run after every public mutation of the archive.
    pub fn after_mutation<D>(&mut self, layers: &LayerForest<D>, last: Option<NodeId>, relinked: &[NodeId]) {
        self.invalidate(relinked);
        if let (HullPolicy::RebuildImmediately, Some(root)) = (self.policy, last) {
            self.cover(layers, root);
        }
    }

    /// The least crowded node of the layer rooted at `root`, which must be
    /// the last layer. Ties resolve to the first minimum in x order within
    /// a range and to the earlier range across ranges.
    pub fn least_crowded<D>(&mut self, layers: &LayerForest<D>, root: NodeId) -> NodeId {
        match self.policy {
            HullPolicy::RebuildEveryNRemovals { .. } if self.repartition => {
                self.clear_ranges();
                self.repartition = false;
                self.cover(layers, root);
            }
            HullPolicy::RebuildWhenRangeInvalid | HullPolicy::RebuildImmediately => {
                self.cover(layers, root);
            }
            _ => {}
        }

        let mut best: Option<(NodeId, Crowding)> = None;
        let mut node = Some(layers.leftmost(root));
        while let Some(id) = node {
            let (candidate, crowding, last) = match self.owner_of(id) {
                Some(range) => {
                    let (candidate, crowding) = self.range_minimum(range, layers);
                    (candidate, crowding, self.last_member(range))
                }
                None => (id, layers.summary(id).crowding(), id),
            };
            if best.is_none_or(|(_, least)| crowding < least) {
                best = Some((candidate, crowding));
            }
            node = layers.next(last);
        }
        match best {
            Some((id, _)) => id,
            None => unreachable!("a layer root always has a leftmost node"),
        }
    }

    /// Group every uncovered node of the layer into new ranges.
    fn cover<D>(&mut self, layers: &LayerForest<D>, root: NodeId) {
        let len = layers.count(Some(root));
        let threshold = ((len as f64).sqrt().ceil() as usize).max(2);
        let mut pending = Vec::new();
        let mut opened = 0;
        let mut node = Some(layers.leftmost(root));
        while let Some(id) = node {
            match self.owner_of(id) {
                Some(range) => {
                    if !pending.is_empty() {
                        self.open(std::mem::take(&mut pending));
                        opened += 1;
                    }
                    node = layers.next(self.last_member(range));
                }
                None => {
                    pending.push(id);
                    if pending.len() == threshold {
                        self.open(std::mem::take(&mut pending));
                        opened += 1;
                    }
                    node = layers.next(id);
                }
            }
        }
        if !pending.is_empty() {
            self.open(pending);
            opened += 1;
        }
        if opened > 0 {
            debug!("hull: opened {opened} ranges over a last layer of {len} (threshold {threshold})");
        }
    }

    fn owner_of(&self, id: NodeId) -> Option<RangeId> {
        let range = self.owner.get(id.index()).copied().flatten()?;
        let slot = &self.slots[range.slot as usize];
        (slot.generation == range.generation && slot.range.is_some()).then_some(range)
    }

    fn live_range(&self, id: RangeId) -> &Range {
        match &self.slots[id.slot as usize].range {
            Some(range) => range,
            None => panic!("hull range {id:?} is dead"),
        }
    }

    fn last_member(&self, id: RangeId) -> NodeId {
        match self.live_range(id).members.last() {
            Some(&last) => last,
            None => panic!("hull range {id:?} has no members"),
        }
    }

    fn open(&mut self, members: Vec<NodeId>) -> RangeId {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(RangeSlot::default());
                u32::try_from(self.slots.len() - 1).expect("hull range slots overflow")
            }
        };
        let id = RangeId {
            slot,
            generation: self.slots[slot as usize].generation,
        };
        for member in &members {
            let index = member.index();
            if index >= self.owner.len() {
                self.owner.resize(index + 1, None);
            }
            self.owner[index] = Some(id);
        }
        self.slots[slot as usize].range = Some(Range { members, chain: None });
        id
    }

    fn kill(&mut self, id: RangeId) {
        let slot = &mut self.slots[id.slot as usize];
        let Some(range) = slot.range.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        for member in range.members {
            if self.owner[member.index()] == Some(id) {
                self.owner[member.index()] = None;
            }
        }
    }

    /// Least crowded member of a range and its crowding.
    fn range_minimum<D>(&mut self, id: RangeId, layers: &LayerForest<D>) -> (NodeId, Crowding) {
        let range = match self.slots[id.slot as usize].range.as_mut() {
            Some(range) => range,
            None => panic!("hull range {id:?} is dead"),
        };
        if range.chain.is_none() {
            let points = range
                .members
                .iter()
                .enumerate()
                .filter_map(|(index, &id)| layers.summary(id).gap.map(|gap| (gap.dx, gap.dy, index)))
                .collect();
            range.chain = Some(lower_left_chain(points));
        }
        let chain = range.chain.as_deref().unwrap_or_default();

        // The area is not unimodal along the chain, so every vertex is checked.
        let mut best: Option<(usize, Crowding)> = None;
        for &index in chain {
            let crowding = layers.summary(range.members[index]).crowding();
            let better = match best {
                None => true,
                Some((best_index, least)) => crowding < least || (crowding == least && index < best_index),
            };
            if better {
                best = Some((index, crowding));
            }
        }
        match best {
            Some((index, crowding)) => (range.members[index], crowding),
            // Every member is a layer end.
            None => (range.members[0], Crowding::Boundary),
        }
    }
}

/// Tags of the gap points `(dx, dy, tag)` on their lower-left convex chain,
/// from the smallest `dx` to the smallest `dy`.
fn lower_left_chain(mut points: Vec<(f64, f64, usize)>) -> Vec<usize> {
    // Exact power-of-two rescaling keeps the cross products finite.
    let (max_dx, max_dy) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(mx, my), &(dx, dy, _)| (mx.max(dx), my.max(dy)));
    let (sx, sy) = (unit_scale(max_dx), unit_scale(max_dy));
    for point in &mut points {
        point.0 *= sx;
        point.1 *= sy;
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut chain: Vec<(f64, f64, usize)> = Vec::with_capacity(points.len());
    for point in points {
        while let [.., o, a] = chain.as_slice()
            && cross(*o, *a, point) <= 0.0
        {
            chain.pop();
        }
        chain.push(point);
    }

    // The lower hull descends to its lowest vertex, then rises again.
    let lowest = chain
        .iter()
        .enumerate()
        .min_by(|(i, a), (j, b)| a.1.total_cmp(&b.1).then(i.cmp(j)))
        .map_or(0, |(i, _)| i);
    chain.truncate(lowest + 1);
    chain.into_iter().map(|(_, _, index)| index).collect()
}

/// Power of two bringing `max` near 1.
fn unit_scale(max: f64) -> f64 {
    if max > 0.0 {
        (-max.log2().floor().clamp(-1000.0, 1000.0)).exp2()
    } else {
        1.0
    }
}

fn cross(o: (f64, f64, usize), a: (f64, f64, usize), b: (f64, f64, usize)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}
