//! A single Pareto layer: solutions ordered by the first objective.
//!
//! Every node caches the gap box spanned by its order neighbours and the
//! subtree's least crowded node, so the eviction candidate of a layer is
//! available at its root in O(1).

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::schema::Solution;

use super::treap::{Augment, NodeId, Treap};

/// Half extents of the box spanned by a node's predecessor and successor.
///
/// Coordinates are halved before subtracting, so the extents stay finite
/// for any pair of finite solutions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub dx: f64,
    pub dy: f64,
}

impl Gap {
    pub fn between<D>(prev: &Solution<D>, next: &Solution<D>) -> Self {
        Self {
            dx: (next.x() * 0.5 - prev.x() * 0.5).abs(),
            dy: (next.y() * 0.5 - prev.y() * 0.5).abs(),
        }
    }

    /// Crowding of an interior node with this gap.
    pub fn crowding(&self) -> Crowding {
        let area = self.dx * self.dy;
        if area.is_infinite() {
            Crowding::Huge(self.dx.ln() + self.dy.ln())
        } else if area < f64::MIN_POSITIVE {
            Crowding::Tiny(self.dx.ln() + self.dy.ln())
        } else {
            Crowding::Area(area)
        }
    }
}

/// Raw crowding of a layer node: the area of its neighbour box.
///
/// Areas outside the normal `f64` range are compared by their logarithm,
/// and layer ends rank above every interior node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crowding {
    /// Area below `f64::MIN_POSITIVE` (zero included), as `ln(dx) + ln(dy)`.
    Tiny(f64),
    Area(f64),
    /// Area past `f64::MAX`, as `ln(dx) + ln(dy)`.
    Huge(f64),
    Boundary,
}

impl Crowding {
    fn key(&self) -> (u8, f64) {
        match *self {
            Crowding::Tiny(log) => (0, log),
            Crowding::Area(area) => (1, area),
            Crowding::Huge(log) => (2, log),
            Crowding::Boundary => (3, 0.0),
        }
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let (a, x) = self.key();
        let (b, y) = other.key();
        a.cmp(&b).then(x.total_cmp(&y))
    }
}

impl PartialOrd for Crowding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.total_cmp(other))
    }
}

/// Cached statistics of a layer subtree.
#[derive(Debug, Clone, Copy)]
pub struct LayerStats {
    /// Nodes in the subtree.
    pub len: usize,
    /// This node's own neighbour gap; `None` at the layer ends.
    pub gap: Option<Gap>,
    /// Least crowded node of the subtree.
    pub worst: NodeId,
    /// Raw crowding of `worst`.
    pub worst_crowding: Crowding,
}

impl LayerStats {
    /// Raw crowding of this node.
    #[inline]
    pub fn crowding(&self) -> Crowding {
        self.gap.map_or(Crowding::Boundary, |gap| gap.crowding())
    }
}

/// Augmentation for layer trees over solutions with payload `D`.
pub struct LayerAug<D>(PhantomData<fn() -> D>);

impl<D> Augment for LayerAug<D> {
    type Item = Solution<D>;
    type Summary = LayerStats;

    fn summarize(
        id: NodeId,
        _item: &Solution<D>,
        left: Option<&LayerStats>,
        right: Option<&LayerStats>,
        prev: Option<&Solution<D>>,
        next: Option<&Solution<D>>,
    ) -> LayerStats {
        let gap = match (prev, next) {
            (Some(prev), Some(next)) => Some(Gap::between(prev, next)),
            _ => None,
        };
        let mut stats = LayerStats {
            len: 1,
            gap,
            worst: id,
            worst_crowding: Crowding::Boundary,
        };
        stats.worst_crowding = stats.crowding();
        // Ties keep the earlier candidate: self, then left, then right.
        for child in [left, right].into_iter().flatten() {
            stats.len += child.len;
            if child.worst_crowding < stats.worst_crowding {
                stats.worst = child.worst;
                stats.worst_crowding = child.worst_crowding;
            }
        }
        stats
    }

    fn count(summary: &LayerStats) -> usize {
        summary.len
    }
}

/// Arena holding the node trees of every layer.
pub type LayerForest<D> = Treap<LayerAug<D>>;

/// Result of pushing a range of solutions into a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerInsert {
    /// Root of the updated layer.
    pub root: NodeId,
    /// Solutions now dominated by the pushed range, in x order.
    pub displaced: Option<NodeId>,
    /// The layer consists of the pushed range alone: nothing of the old
    /// layer survived on either side.
    pub replaced: bool,
}

impl<D> Treap<LayerAug<D>> {
    /// Whether any solution of the layer dominates `candidate`.
    ///
    /// Finds the solution with the largest `x <= candidate.x`; since the
    /// layer is a staircase, it is the only one that can dominate.
    pub fn dominated_by_any_of<E>(&self, root: NodeId, candidate: &Solution<E>) -> bool {
        let mut best: Option<NodeId> = None;
        let mut curr = Some(root);
        while let Some(id) = curr {
            if self.item(id).x() <= candidate.x() {
                best = Some(id);
                curr = self.right(id);
            } else {
                curr = self.left(id);
            }
        }
        match best {
            None => false,
            Some(id) => {
                let s = self.item(id);
                if s.x() == candidate.x() {
                    s.y() < candidate.y()
                } else {
                    s.y() <= candidate.y()
                }
            }
        }
    }

    /// Merge the range `pushed` into the layer at `root`, splitting out the
    /// layer's solutions that the range dominates.
    ///
    /// The range must be non-dominated by the layer. Solutions equal to the
    /// range's first point stay in the layer next to it.
    pub fn insert_and_split_dominated(&mut self, root: NodeId, pushed: NodeId) -> LayerInsert {
        let (first_x, first_y) = {
            let first = self.item(self.leftmost(pushed));
            (first.x(), first.y())
        };
        let last_y = self.item(self.rightmost(pushed)).y();

        let (left, rest) = self.split(Some(root), |s| {
            s.x() > first_x || (s.x() == first_x && s.y() > first_y)
        });
        let (middle, right) = self.split(rest, |s| s.y() < last_y);
        let replaced = left.is_none() && right.is_none();

        let tail = self.merge(Some(pushed), right);
        let root = match self.merge(left, tail) {
            Some(root) => root,
            None => unreachable!("merge with a non-empty range yields a tree"),
        };
        LayerInsert {
            root,
            displaced: middle,
            replaced,
        }
    }

    /// Least crowded node of the layer.
    #[inline]
    pub fn worst(&self, root: NodeId) -> NodeId {
        self.summary(root).worst
    }

    /// Half extents of the box spanned by the layer's extreme points.
    pub fn span(&self, root: NodeId) -> Gap {
        let first = self.item(self.leftmost(root));
        let last = self.item(self.rightmost(root));
        Gap::between(first, last)
    }

    /// Crowding distance of `id` normalized by the layer span: `+inf` at
    /// the layer ends, zero inside a layer whose points all coincide.
    pub fn crowding_distance(&self, root: NodeId, id: NodeId) -> f64 {
        let Some(gap) = self.summary(id).gap else {
            return f64::INFINITY;
        };
        let span = self.span(root);
        if span.dx > 0.0 && span.dy > 0.0 {
            (gap.dx / span.dx) * (gap.dy / span.dy)
        } else {
            0.0
        }
    }

    /// Detach node `id` from the layer rooted at `root`.
    ///
    /// Returns the remaining layer. `id` ends up as a detached single node.
    pub fn detach(&mut self, root: NodeId, id: NodeId) -> Option<NodeId> {
        let (x, y) = {
            let s = self.item(id);
            (s.x(), s.y())
        };
        // Equal points share x; locate `id` among its duplicates by walking
        // the order links from the first of them.
        let (left, rest) = self.split(Some(root), |s| s.x() > x || (s.x() == x && s.y() >= y));
        let start = rest.map(|r| self.leftmost(r));
        let offset = match self.walk(start).position(|n| n == id) {
            Some(offset) => offset,
            None => panic!("layer node {id:?} not found at ({x}; {y})"),
        };
        let (before, rest) = self.split_at(rest, offset);
        let (found, after) = self.split_at(rest, 1);
        assert_eq!(found, Some(id), "layer split separated the wrong node");
        let left = self.merge(left, before);
        self.merge(left, after)
    }

    /// Solutions of the layer in x order.
    pub fn solutions(&self, root: Option<NodeId>) -> impl Iterator<Item = &Solution<D>> + '_ {
        let start = root.map(|r| self.leftmost(r));
        self.walk(start).map(move |id| self.item(id))
    }
}
