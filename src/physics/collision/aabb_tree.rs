//! A dynamic AABB tree for broadphase collision detection and spatial queries.
//!
//! Leaves hold a fattened bounding box of one body each and branches the union
//! of their children. Nodes live in an arena and refer to each other by index.

use super::{Ray, AABB};
use crate::{
    math as m,
    physics::{params::TreeParams, BodyKey},
};

use std::collections::HashMap;
use thunderdome as td;

#[derive(Clone, Copy, Debug)]
struct Node {
    /// Fattened box for leaves, union of children for branches.
    aabb: AABB,
    parent: Option<td::Index>,
    kind: NodeKind,
    /// Set during pair collection once the children's subtrees
    /// have been tested against each other.
    children_crossed: bool,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Branch { left: td::Index, right: td::Index },
    Leaf(Leaf),
}

#[derive(Clone, Copy, Debug)]
struct Leaf {
    body: BodyKey,
    /// The actual bounds of the body, used to avoid reporting false positives.
    tight: AABB,
    margin: f64,
}

/// A dynamic, incrementally built binary tree of bounding boxes.
#[derive(Clone, Debug)]
pub struct AabbTree {
    nodes: td::Arena<Node>,
    root: Option<td::Index>,
    leaves: HashMap<BodyKey, td::Index>,
    /// Kept around so that traversals don't need to allocate.
    stack: Vec<td::Index>,
    /// Scratch space for updates.
    update_buf: Vec<(BodyKey, td::Index)>,
    total_insertions: usize,
}

impl Default for AabbTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AabbTree {
    pub fn new() -> Self {
        Self {
            nodes: td::Arena::new(),
            root: None,
            leaves: HashMap::new(),
            stack: Vec::new(),
            update_buf: Vec::new(),
            total_insertions: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn contains(&self, body: BodyKey) -> bool {
        self.leaves.contains_key(&body)
    }

    /// Total number of leaf insertions done over the lifetime of the tree,
    /// including reinsertions caused by bodies leaving their boxes.
    #[inline]
    pub fn total_insertions(&self) -> usize {
        self.total_insertions
    }

    /// Number of levels in the tree. Zero if empty, one if only a single leaf.
    pub fn height(&self) -> usize {
        fn node_height(nodes: &td::Arena<Node>, idx: td::Index) -> usize {
            match nodes[idx].kind {
                NodeKind::Leaf(_) => 1,
                NodeKind::Branch { left, right } => {
                    1 + node_height(nodes, left).max(node_height(nodes, right))
                }
            }
        }
        self.root.map_or(0, |root| node_height(&self.nodes, root))
    }

    /// Insert a body with its current bounds and velocity.
    /// If the body is already in the tree, it's moved to the new bounds.
    pub fn insert(&mut self, body: BodyKey, tight: AABB, velocity: m::Vec2, params: &TreeParams) {
        self.remove(body);
        let margin = params.margin_for(velocity);
        let leaf = self.nodes.insert(Node {
            aabb: tight.padded(margin),
            parent: None,
            kind: NodeKind::Leaf(Leaf {
                body,
                tight,
                margin,
            }),
            children_crossed: false,
        });
        self.leaves.insert(body, leaf);
        self.insert_leaf(leaf);
    }

    /// Remove a body from the tree. Returns `false` if it wasn't there.
    pub fn remove(&mut self, body: BodyKey) -> bool {
        match self.leaves.remove(&body) {
            Some(leaf) => {
                self.remove_leaf(leaf);
                self.nodes.remove(leaf);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.root = None;
    }

    /// Refresh every leaf with new bounds and velocities from the given function.
    ///
    /// Leaves whose fattened box no longer contains the body, or whose margin
    /// changed by more than the configured slop, are reinserted.
    /// Leaves the function returns `None` for are left as they are.
    /// Returns the number of reinsertions.
    pub fn update(
        &mut self,
        params: &TreeParams,
        mut bounds: impl FnMut(BodyKey) -> Option<(AABB, m::Vec2)>,
    ) -> usize {
        let mut reinsertions = 0;
        let mut leaves = std::mem::take(&mut self.update_buf);
        leaves.clear();
        leaves.extend(self.leaves.iter().map(|(body, idx)| (*body, *idx)));

        for &(body, idx) in &leaves {
            let (tight, velocity) = match bounds(body) {
                Some(b) => b,
                None => continue,
            };
            let node = &mut self.nodes[idx];
            let leaf = match &mut node.kind {
                NodeKind::Leaf(leaf) => leaf,
                NodeKind::Branch { .. } => continue,
            };
            leaf.tight = tight;

            let wanted_margin = params.margin_for(velocity);
            let margin_changed = (wanted_margin - leaf.margin).abs() > params.margin_slop;
            if margin_changed {
                leaf.margin = wanted_margin;
            }
            if margin_changed || !node.aabb.contains(&tight) {
                node.aabb = tight.padded(leaf.margin);
                self.remove_leaf(idx);
                self.insert_leaf(idx);
                reinsertions += 1;
            }
        }

        self.update_buf = leaves;
        reinsertions
    }

    fn insert_leaf(&mut self, leaf: td::Index) {
        self.total_insertions += 1;
        let leaf_aabb = self.nodes[leaf].aabb;

        let mut curr = match self.root {
            Some(root) => root,
            None => {
                self.nodes[leaf].parent = None;
                self.root = Some(leaf);
                return;
            }
        };

        // go down whichever path grows in area the least
        while let NodeKind::Branch { left, right } = self.nodes[curr].kind {
            let growth = |idx: td::Index| {
                let aabb = self.nodes[idx].aabb;
                aabb.union(&leaf_aabb).area() - aabb.area()
            };
            curr = if growth(left) <= growth(right) {
                left
            } else {
                right
            };
        }

        // replace the sibling leaf we found with a branch holding it and the new leaf
        let sibling = curr;
        let old_parent = self.nodes[sibling].parent;
        let branch = self.nodes.insert(Node {
            aabb: self.nodes[sibling].aabb.union(&leaf_aabb),
            parent: old_parent,
            kind: NodeKind::Branch {
                left: sibling,
                right: leaf,
            },
            children_crossed: false,
        });
        self.nodes[sibling].parent = Some(branch);
        self.nodes[leaf].parent = Some(branch);

        match old_parent {
            Some(parent) => {
                self.replace_child(parent, sibling, branch);
                self.refit_upwards(parent);
            }
            None => self.root = Some(branch),
        }
    }

    /// Unlink a leaf from the tree without deleting the node itself.
    fn remove_leaf(&mut self, leaf: td::Index) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let parent = match self.nodes[leaf].parent {
            Some(p) => p,
            None => return,
        };
        let sibling = match self.nodes[parent].kind {
            NodeKind::Branch { left, right } => {
                if left == leaf {
                    right
                } else {
                    left
                }
            }
            NodeKind::Leaf(_) => return,
        };
        let grandparent = self.nodes[parent].parent;

        self.nodes.remove(parent);
        self.nodes[leaf].parent = None;
        self.nodes[sibling].parent = grandparent;
        match grandparent {
            Some(gp) => {
                self.replace_child(gp, parent, sibling);
                self.refit_upwards(gp);
            }
            None => self.root = Some(sibling),
        }
    }

    fn replace_child(&mut self, parent: td::Index, old: td::Index, new: td::Index) {
        if let NodeKind::Branch { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    /// Recompute branch boxes from the given node up to the root.
    fn refit_upwards(&mut self, start: td::Index) {
        let mut curr = Some(start);
        while let Some(idx) = curr {
            if let NodeKind::Branch { left, right } = self.nodes[idx].kind {
                self.nodes[idx].aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
            }
            curr = self.nodes[idx].parent;
        }
    }

    /// Find all pairs of bodies whose bounds intersect.
    ///
    /// Subtrees are only descended into when their boxes overlap,
    /// and leaves are checked against their tight bounds, so every reported
    /// pair really does intersect.
    pub fn collect_pairs(&mut self, out: &mut Vec<[BodyKey; 2]>) {
        out.clear();
        for (_, node) in self.nodes.iter_mut() {
            node.children_crossed = false;
        }
        if let Some(root) = self.root {
            self.cross_children(root, out);
        }
    }

    fn cross_children(&mut self, idx: td::Index, out: &mut Vec<[BodyKey; 2]>) {
        let node = &mut self.nodes[idx];
        if node.children_crossed {
            return;
        }
        node.children_crossed = true;
        if let NodeKind::Branch { left, right } = node.kind {
            self.pairs_between(left, right, out);
        }
    }

    fn pairs_between(&mut self, a: td::Index, b: td::Index, out: &mut Vec<[BodyKey; 2]>) {
        // pairs within each subtree are needed regardless of whether the two overlap
        self.cross_children(a, out);
        self.cross_children(b, out);

        let (node_a, node_b) = (self.nodes[a], self.nodes[b]);
        if !node_a.aabb.intersects(&node_b.aabb) {
            return;
        }
        match (node_a.kind, node_b.kind) {
            (NodeKind::Leaf(leaf_a), NodeKind::Leaf(leaf_b)) => {
                if leaf_a.tight.intersects(&leaf_b.tight) {
                    out.push([leaf_a.body, leaf_b.body]);
                }
            }
            (NodeKind::Leaf(_), NodeKind::Branch { left, right }) => {
                self.pairs_between(a, left, out);
                self.pairs_between(a, right, out);
            }
            (NodeKind::Branch { left, right }, NodeKind::Leaf(_)) => {
                self.pairs_between(left, b, out);
                self.pairs_between(right, b, out);
            }
            (
                NodeKind::Branch {
                    left: a_left,
                    right: a_right,
                },
                NodeKind::Branch {
                    left: b_left,
                    right: b_right,
                },
            ) => {
                self.pairs_between(a_left, b_left, out);
                self.pairs_between(a_left, b_right, out);
                self.pairs_between(a_right, b_left, out);
                self.pairs_between(a_right, b_right, out);
            }
        }
    }

    /// Visit every leaf whose fattened box passes the given test,
    /// pruning subtrees whose box fails it.
    fn traverse(&mut self, mut test: impl FnMut(&AABB) -> bool, mut visit: impl FnMut(&Leaf)) {
        self.stack.clear();
        if let Some(root) = self.root {
            self.stack.push(root);
        }
        while let Some(idx) = self.stack.pop() {
            let node = &self.nodes[idx];
            if !test(&node.aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(ref leaf) => visit(leaf),
                NodeKind::Branch { left, right } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
    }

    /// Collect bodies whose tight bounds intersect the given box.
    pub fn query_aabb(&mut self, aabb: &AABB, out: &mut Vec<BodyKey>) {
        self.traverse(
            |node_aabb| node_aabb.intersects(aabb),
            |leaf| {
                if leaf.tight.intersects(aabb) {
                    out.push(leaf.body);
                }
            },
        );
    }

    /// Collect bodies whose tight bounds, padded by `pad`, contain the given point.
    pub fn query_point(&mut self, point: m::Vec2, pad: f64, out: &mut Vec<BodyKey>) {
        self.traverse(
            |node_aabb| node_aabb.padded(pad).contains_point(point),
            |leaf| {
                if leaf.tight.padded(pad).contains_point(point) {
                    out.push(leaf.body);
                }
            },
        );
    }

    /// Collect bodies whose tight bounds, padded by `pad`, are crossed by the ray.
    pub fn query_ray(&mut self, ray: &Ray, pad: f64, out: &mut Vec<BodyKey>) {
        self.traverse(
            |node_aabb| node_aabb.padded(pad).clip_line(ray).is_some(),
            |leaf| {
                if leaf.tight.padded(pad).clip_line(ray).is_some() {
                    out.push(leaf.body);
                }
            },
        );
    }

    /// Check the structural invariants of the tree, panicking if one doesn't hold.
    #[cfg(test)]
    fn validate(&self) {
        fn validate_node(tree: &AabbTree, idx: td::Index, parent: Option<td::Index>) -> usize {
            let node = &tree.nodes[idx];
            assert_eq!(node.parent, parent, "broken parent link");
            match node.kind {
                NodeKind::Leaf(leaf) => {
                    assert!(node.aabb.contains(&leaf.tight), "leaf box doesn't contain body");
                    assert_eq!(tree.leaves.get(&leaf.body), Some(&idx));
                    1
                }
                NodeKind::Branch { left, right } => {
                    assert!(node.aabb.contains(&tree.nodes[left].aabb));
                    assert!(node.aabb.contains(&tree.nodes[right].aabb));
                    validate_node(tree, left, Some(idx)) + validate_node(tree, right, Some(idx))
                }
            }
        }
        let leaf_count = self.root.map_or(0, |root| validate_node(self, root, None));
        assert_eq!(leaf_count, self.leaves.len());
        // every node is reachable: n leaves need n - 1 branches
        assert_eq!(self.nodes.len(), (2 * leaf_count).saturating_sub(1));
    }
}
