//! Arena-backed mergeable treap with intrusive order links.
//!
//! Nodes live in a slab addressed by [`NodeId`]. Besides the usual
//! left/right children every node carries `prev`/`next` links to its
//! in-order neighbours, so neighbour access is O(1). Balance comes from a
//! random heap key drawn once per node; there are no rotations, only
//! [`Treap::merge`] and [`Treap::split`].
//!
//! Per-node statistics are maintained through the [`Augment`] hook, which
//! is re-run bottom-up on every node whose children or order links change.

use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Index of a node inside a [`Treap`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Arena slot of this node.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Recomputation hook for cached per-node statistics.
///
/// `summarize` must be a pure function of the node's own item, the
/// summaries of its children and the items of its order neighbours.
pub trait Augment {
    /// Payload stored in every node.
    type Item;
    /// Cached statistics of the subtree rooted at a node.
    type Summary: Clone;

    /// Rebuild the summary of node `id`.
    fn summarize(
        id: NodeId,
        item: &Self::Item,
        left: Option<&Self::Summary>,
        right: Option<&Self::Summary>,
        prev: Option<&Self::Item>,
        next: Option<&Self::Item>,
    ) -> Self::Summary;

    /// Number of nodes described by a summary.
    fn count(summary: &Self::Summary) -> usize;
}

struct Node<A: Augment> {
    item: A::Item,
    summary: A::Summary,
    priority: u32,
    left: Option<NodeId>,
    right: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// A forest of treaps sharing one node arena.
///
/// Every tree is identified by its root; `None` is the empty tree.
pub struct Treap<A: Augment> {
    slots: Vec<Option<Node<A>>>,
    free: Vec<NodeId>,
    rng: SmallRng,
    live: usize,
    /// Nodes whose order links changed since the last drain.
    journal: Option<Vec<NodeId>>,
}

impl<A: Augment> Treap<A> {
    /// Create an empty arena with heap keys drawn from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
            live: 0,
            journal: None,
        }
    }

    /// Start recording relinked nodes (see [`Treap::drain_relinked`]).
    pub fn with_journal(mut self) -> Self {
        self.journal = Some(Vec::new());
        self
    }

    /// Number of live nodes across all trees.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Upper bound (exclusive) of node indices handed out so far.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drop every node. Outstanding ids become invalid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        if let Some(journal) = self.journal.as_mut() {
            journal.clear();
        }
    }

    /// Allocate a detached single-node tree.
    pub fn alloc(&mut self, item: A::Item) -> NodeId {
        let priority = self.rng.r#gen::<u32>();
        let id = match self.free.last() {
            Some(&id) => id,
            None => NodeId(u32::try_from(self.slots.len()).expect("treap arena overflow")),
        };
        let node = Node {
            summary: A::summarize(id, &item, None, None, None, None),
            item,
            priority,
            left: None,
            right: None,
            prev: None,
            next: None,
        };
        if self.free.pop().is_some() {
            self.slots[id.index()] = Some(node);
        } else {
            self.slots.push(Some(node));
        }
        self.live += 1;
        id
    }

    /// Free a fully detached node and hand its item back.
    pub fn release(&mut self, id: NodeId) -> A::Item {
        let node = self.slots[id.index()]
            .take()
            .unwrap_or_else(|| panic!("release of dead treap node {id:?}"));
        assert!(
            node.left.is_none() && node.right.is_none() && node.prev.is_none() && node.next.is_none(),
            "release of attached treap node {id:?}"
        );
        self.free.push(id);
        self.live -= 1;
        node.item
    }

    /// Free every node of the standalone tree at `root`, handing the items
    /// back in order.
    pub fn release_tree(&mut self, root: NodeId) -> Vec<A::Item> {
        let first = self.leftmost(root);
        let last = self.rightmost(root);
        assert!(
            self.node(first).prev.is_none() && self.node(last).next.is_none(),
            "release of a tree still linked to its neighbours"
        );
        let ids: Vec<NodeId> = self.walk(Some(first)).collect();
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.slots[id.index()].take() {
                items.push(node.item);
                self.free.push(id);
                self.live -= 1;
            }
        }
        items
    }

    /// Whether `id` refers to a live node.
    #[cfg(test)]
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<A> {
        match self.slots.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("access to dead treap node {id:?}"),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<A> {
        match self.slots.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("access to dead treap node {id:?}"),
        }
    }

    pub fn item(&self, id: NodeId) -> &A::Item {
        &self.node(id).item
    }

    pub fn summary(&self, id: NodeId) -> &A::Summary {
        &self.node(id).summary
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    #[cfg(test)]
    fn heap_key(&self, id: NodeId) -> u32 {
        self.node(id).priority
    }

    /// Number of nodes in the tree rooted at `root`.
    pub fn count(&self, root: Option<NodeId>) -> usize {
        root.map_or(0, |id| A::count(&self.node(id).summary))
    }

    pub fn leftmost(&self, root: NodeId) -> NodeId {
        let mut curr = root;
        while let Some(left) = self.node(curr).left {
            curr = left;
        }
        curr
    }

    pub fn rightmost(&self, root: NodeId) -> NodeId {
        let mut curr = root;
        while let Some(right) = self.node(curr).right {
            curr = right;
        }
        curr
    }

    /// The `k`-th node (0-based) of the tree in in-order.
    pub fn nth(&self, root: NodeId, mut k: usize) -> NodeId {
        let mut curr = root;
        loop {
            let left = self.count(self.node(curr).left);
            if k < left {
                curr = match self.node(curr).left {
                    Some(left) => left,
                    None => panic!("treap position out of range"),
                };
            } else if k == left {
                return curr;
            } else {
                k -= left + 1;
                curr = match self.node(curr).right {
                    Some(right) => right,
                    None => panic!("treap position out of range"),
                };
            }
        }
    }

    /// Iterate node ids in order, starting at `first` and following `next`.
    pub fn walk(&self, first: Option<NodeId>) -> Walk<'_, A> {
        Walk { treap: self, curr: first }
    }

    /// Replace the item of `id`. The caller repairs the ancestors.
    pub fn set_item(&mut self, id: NodeId, item: A::Item) {
        self.node_mut(id).item = item;
        self.recompute(id);
    }

    /// Take the relink journal recorded since the last call.
    pub fn drain_relinked(&mut self) -> Vec<NodeId> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn recompute(&mut self, id: NodeId) {
        let summary = {
            let node = self.node(id);
            A::summarize(
                id,
                &node.item,
                node.left.map(|l| &self.node(l).summary),
                node.right.map(|r| &self.node(r).summary),
                node.prev.map(|p| &self.node(p).item),
                node.next.map(|n| &self.node(n).item),
            )
        };
        self.node_mut(id).summary = summary;
    }

    fn recompute_spine(&mut self, root: NodeId, rightward: bool) {
        let mut spine = Vec::new();
        let mut curr = Some(root);
        while let Some(id) = curr {
            spine.push(id);
            curr = if rightward { self.node(id).right } else { self.node(id).left };
        }
        for id in spine.into_iter().rev() {
            self.recompute(id);
        }
    }

    fn link(&mut self, left: NodeId, right: NodeId) {
        assert!(
            self.node(left).next.is_none() && self.node(right).prev.is_none(),
            "order link {left:?} -> {right:?} collides with an existing link"
        );
        self.node_mut(left).next = Some(right);
        self.node_mut(right).prev = Some(left);
        self.record(left, right);
    }

    fn unlink(&mut self, left: NodeId, right: NodeId) {
        assert!(
            self.node(left).next == Some(right) && self.node(right).prev == Some(left),
            "order link {left:?} -> {right:?} missing at split seam"
        );
        self.node_mut(left).next = None;
        self.node_mut(right).prev = None;
        self.record(left, right);
    }

    fn record(&mut self, left: NodeId, right: NodeId) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(left);
            journal.push(right);
        }
    }

    /// Concatenate two trees. Every element of `left` must precede every
    /// element of `right`; this is not checked.
    pub fn merge(&mut self, left: Option<NodeId>, right: Option<NodeId>) -> Option<NodeId> {
        let (left, right) = match (left, right) {
            (None, tree) | (tree, None) => return tree,
            (Some(l), Some(r)) => (l, r),
        };
        let seam_left = self.rightmost(left);
        let seam_right = self.leftmost(right);
        self.link(seam_left, seam_right);
        self.recompute_spine(left, true);
        self.recompute_spine(right, false);
        Some(self.merge_nodes(left, right))
    }

    fn merge_nodes(&mut self, left: NodeId, right: NodeId) -> NodeId {
        if self.node(left).priority < self.node(right).priority {
            let merged = match self.node(left).right {
                Some(inner) => self.merge_nodes(inner, right),
                None => right,
            };
            self.node_mut(left).right = Some(merged);
            self.recompute(left);
            left
        } else {
            let merged = match self.node(right).left {
                Some(inner) => self.merge_nodes(left, inner),
                None => left,
            };
            self.node_mut(right).left = Some(merged);
            self.recompute(right);
            right
        }
    }

    /// Split a tree in two. `goes_right` must be monotone over the in-order
    /// sequence: false for a prefix, true for the rest.
    pub fn split<F>(&mut self, root: Option<NodeId>, mut goes_right: F) -> (Option<NodeId>, Option<NodeId>)
    where
        F: FnMut(&A::Item) -> bool,
    {
        let (left, right) = self.split_nodes(root, &mut goes_right);
        self.cut_seam(left, right);
        (left, right)
    }

    fn split_nodes<F>(&mut self, node: Option<NodeId>, goes_right: &mut F) -> (Option<NodeId>, Option<NodeId>)
    where
        F: FnMut(&A::Item) -> bool,
    {
        let Some(id) = node else {
            return (None, None);
        };
        if goes_right(&self.node(id).item) {
            let (left, right) = self.split_nodes(self.node(id).left, goes_right);
            self.node_mut(id).left = right;
            self.recompute(id);
            (left, Some(id))
        } else {
            let (left, right) = self.split_nodes(self.node(id).right, goes_right);
            self.node_mut(id).right = left;
            self.recompute(id);
            (Some(id), right)
        }
    }

    /// Split off the first `k` nodes.
    pub fn split_at(&mut self, root: Option<NodeId>, k: usize) -> (Option<NodeId>, Option<NodeId>) {
        let (left, right) = self.split_at_nodes(root, k);
        self.cut_seam(left, right);
        (left, right)
    }

    fn split_at_nodes(&mut self, node: Option<NodeId>, k: usize) -> (Option<NodeId>, Option<NodeId>) {
        let Some(id) = node else {
            return (None, None);
        };
        let left_count = self.count(self.node(id).left);
        if k <= left_count {
            let (left, right) = self.split_at_nodes(self.node(id).left, k);
            self.node_mut(id).left = right;
            self.recompute(id);
            (left, Some(id))
        } else {
            let (left, right) = self.split_at_nodes(self.node(id).right, k - left_count - 1);
            self.node_mut(id).right = left;
            self.recompute(id);
            (Some(id), right)
        }
    }

    fn cut_seam(&mut self, left: Option<NodeId>, right: Option<NodeId>) {
        if let (Some(left), Some(right)) = (left, right) {
            let seam_left = self.rightmost(left);
            let seam_right = self.leftmost(right);
            self.unlink(seam_left, seam_right);
            self.recompute_spine(left, true);
            self.recompute_spine(right, false);
        }
    }

    /// Detach the in-order last node. Returns the remaining tree and the node.
    pub fn cut_rightmost(&mut self, root: NodeId) -> (Option<NodeId>, NodeId) {
        let count = self.count(Some(root));
        match self.split_at(Some(root), count - 1) {
            (rest, Some(last)) => (rest, last),
            (_, None) => panic!("cut_rightmost on a tree without nodes"),
        }
    }

    /// Recompute the nodes at in-order positions `[from, until)` and all of
    /// their ancestors, leaving every other subtree untouched.
    pub fn repair_range(&mut self, root: Option<NodeId>, from: usize, until: usize) {
        if let Some(id) = root
            && from < until
        {
            self.repair_range_nodes(id, from, until);
        }
    }

    fn repair_range_nodes(&mut self, id: NodeId, from: usize, until: usize) {
        let left = self.node(id).left;
        let left_count = self.count(left);
        if let Some(left) = left
            && from < left_count
        {
            self.repair_range_nodes(left, from, until.min(left_count));
        }
        let right = self.node(id).right;
        if let Some(right) = right
            && until > left_count + 1
        {
            let from = from.saturating_sub(left_count + 1);
            self.repair_range_nodes(right, from, until - left_count - 1);
        }
        self.recompute(id);
    }
}

/// In-order walk along `next` links.
pub struct Walk<'a, A: Augment> {
    treap: &'a Treap<A>,
    curr: Option<NodeId>,
}

impl<A: Augment> Iterator for Walk<'_, A> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.curr?;
        self.curr = self.treap.next(id);
        Some(id)
    }
}
