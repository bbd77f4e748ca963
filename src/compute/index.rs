//! The tree of layers, ordered by rank.
//!
//! Each node wraps the root of one layer tree and caches the number of
//! layers and solutions in its subtree, which makes rank lookups and
//! global-index lookups logarithmic.

use crate::schema::Solution;

use super::layer::LayerForest;
use super::treap::{Augment, NodeId, Treap};

/// Payload of an index node: one layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerSlot {
    /// Root of the layer tree in the layer forest.
    pub root: NodeId,
    /// Number of solutions in the layer.
    pub len: usize,
}

/// Cached statistics of an index subtree.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub layers: usize,
    pub solutions: usize,
}

pub struct IndexAug;

impl Augment for IndexAug {
    type Item = LayerSlot;
    type Summary = IndexStats;

    fn summarize(
        _id: NodeId,
        item: &LayerSlot,
        left: Option<&IndexStats>,
        right: Option<&IndexStats>,
        _prev: Option<&LayerSlot>,
        _next: Option<&LayerSlot>,
    ) -> IndexStats {
        let mut stats = IndexStats {
            layers: 1,
            solutions: item.len,
        };
        for child in [left, right].into_iter().flatten() {
            stats.layers += child.layers;
            stats.solutions += child.solutions;
        }
        stats
    }

    fn count(summary: &IndexStats) -> usize {
        summary.layers
    }
}

pub type LayerIndex = Treap<IndexAug>;

/// Location of a solution found by global index.
#[derive(Debug, Clone, Copy)]
pub struct Located {
    /// Index node of the layer.
    pub layer: NodeId,
    /// Rank of the layer.
    pub rank: usize,
    /// Layer node holding the solution.
    pub node: NodeId,
}

impl Treap<IndexAug> {
    /// Solutions stored under `root`.
    #[cfg(test)]
    pub(crate) fn total_solutions(&self, root: Option<NodeId>) -> usize {
        root.map_or(0, |id| self.summary(id).solutions)
    }

    /// The lowest-rank layer that does not dominate `candidate`, with its
    /// rank. `None` if every layer dominates it.
    pub fn smallest_non_dominating_layer<D, E>(
        &self,
        root: Option<NodeId>,
        layers: &LayerForest<D>,
        candidate: &Solution<E>,
    ) -> Option<(NodeId, usize)> {
        let mut best = None;
        let mut rank = 0;
        let mut curr = root;
        while let Some(id) = curr {
            let left = self.left(id);
            if layers.dominated_by_any_of(self.item(id).root, candidate) {
                rank += 1 + self.count(left);
                curr = self.right(id);
            } else {
                best = Some((id, rank + self.count(left)));
                curr = left;
            }
        }
        best
    }

    /// Find the `index`-th solution in rank-then-x order.
    pub fn kth_solution<D>(&self, root: NodeId, mut index: usize, layers: &LayerForest<D>) -> Located {
        let mut curr = root;
        let mut rank = 0;
        loop {
            let left = self.left(curr);
            if let Some(left) = left {
                let below = self.summary(left).solutions;
                if index < below {
                    curr = left;
                    continue;
                }
                index -= below;
                rank += self.summary(left).layers;
            }
            let slot = self.item(curr);
            if index < slot.len {
                return Located {
                    layer: curr,
                    rank,
                    node: layers.nth(slot.root, index),
                };
            }
            index -= slot.len;
            rank += 1;
            curr = match self.right(curr) {
                Some(right) => right,
                None => panic!("solution index beyond the cumulative count"),
            };
        }
    }

    /// Insert `slot` so that it gets rank `rank`, shifting later layers.
    pub fn insert_layer_at(&mut self, root: Option<NodeId>, rank: usize, slot: LayerSlot) -> Option<NodeId> {
        let node = self.alloc(slot);
        let (before, after) = self.split_at(root, rank);
        let tail = self.merge(Some(node), after);
        self.merge(before, tail)
    }

    /// Add `slot` as the new last layer.
    pub fn append_layer(&mut self, root: Option<NodeId>, slot: LayerSlot) -> Option<NodeId> {
        let node = self.alloc(slot);
        self.merge(root, Some(node))
    }

    /// Remove the last layer, returning the remaining index and its slot.
    pub fn drop_last_layer(&mut self, root: NodeId) -> (Option<NodeId>, LayerSlot) {
        let (rest, last) = self.cut_rightmost(root);
        (rest, self.release(last))
    }

    /// Point index node `layer` (at `rank`) to a new layer tree and repair
    /// the cached counts on its path.
    pub fn set_layer(&mut self, root: NodeId, layer: NodeId, rank: usize, slot: LayerSlot) {
        self.set_item(layer, slot);
        self.repair_range(Some(root), rank, rank + 1);
    }
}
