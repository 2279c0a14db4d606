//! Progenitor tree reconstruction.
//!
//! A tree starts at the node carrying a root group identity and grows one
//! generation at a time towards earlier snapshots. Each expanded node lists
//! its progenitors by decreasing weight, so the first progenitor of every
//! node is its main progenitor and following first progenitors from the root
//! traces the main branch ("trunk").

use std::cmp::Reverse;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::index::{GroupIdentity, HaloCatalogIndex, NodeId};

/// One node of a reconstructed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    id: NodeId,
    /// The node this one was reached from; `None` for the root
    descendant: Option<NodeId>,
    /// `None` until expanded; expanded leaves hold an empty list
    progenitors: Option<Vec<NodeId>>,
}

impl TreeNode {
    fn new(id: NodeId, descendant: Option<NodeId>) -> Self {
        Self {
            id,
            descendant,
            progenitors: None,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn descendant(&self) -> Option<NodeId> {
        self.descendant
    }

    /// Progenitors by decreasing weight; empty if none or not yet expanded.
    #[inline]
    pub fn progenitors(&self) -> &[NodeId] {
        self.progenitors.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.progenitors.is_some()
    }

    /// The heaviest progenitor.
    #[inline]
    pub fn main_progenitor(&self) -> Option<NodeId> {
        self.progenitors().first().copied()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.progenitors().is_empty()
    }
}

/// A fully expanded progenitor tree.
#[derive(Debug, Clone)]
pub struct Tree {
    group: GroupIdentity,
    root: NodeId,
    nodes: FxHashMap<NodeId, TreeNode>,
    /// Node ids in breadth-first order, root first
    order: Vec<NodeId>,
    trunk: Vec<NodeId>,
    depth: usize,
}

impl Tree {
    /// The group identity the tree was built for.
    pub fn group(&self) -> GroupIdentity {
        self.group
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Nodes in breadth-first order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes without progenitors, in breadth-first order.
    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes().filter(|node| node.is_leaf())
    }

    /// Main branch, root first.
    pub fn trunk(&self) -> &[NodeId] {
        &self.trunk
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of generations below the root (0 for a lone root).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Walk first progenitors from the root.
    pub fn build_trunk(&self) -> Vec<NodeId> {
        let mut trunk = vec![self.root];
        let mut current = self.root;
        while let Some(next) = self.node(current).and_then(TreeNode::main_progenitor) {
            trunk.push(next);
            current = next;
        }
        trunk
    }
}

/// Expands nodes and builds trees against a shared index.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder<'a> {
    index: &'a HaloCatalogIndex,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(index: &'a HaloCatalogIndex) -> Self {
        Self { index }
    }

    /// Progenitors of `id` ordered by decreasing weight; equal weights keep
    /// table order.
    pub fn expand(&self, id: NodeId) -> Vec<NodeId> {
        let mut progenitors = self.index.progenitors(id).to_vec();
        progenitors.sort_by_key(|p| Reverse(self.index.weight(*p).unwrap_or(i64::MIN)));
        progenitors
    }

    /// Build the full tree rooted at the node carrying `group`.
    ///
    /// Returns [`Error::NotFound`] when no cataloged node carries `group`
    /// (including after a mass filter removed it), and [`Error::Integrity`]
    /// if descendant links loop back onto a node already in the tree.
    pub fn build_tree(&self, group: &GroupIdentity) -> Result<Tree> {
        let root = self.index.lookup(group).ok_or_else(|| {
            Error::not_found(format!("No cataloged halo for group {}", group))
        })?;
        tracing::debug!(group = %group, root, "Building progenitor tree");

        let mut nodes = FxHashMap::default();
        nodes.insert(root, TreeNode::new(root, None));
        let mut order = vec![root];
        let mut frontier = vec![root];
        let mut depth = 0;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in frontier {
                let progenitors = self.expand(id);
                for &p in &progenitors {
                    if nodes.contains_key(&p) {
                        return Err(Error::integrity(format!(
                            "Node {} reached twice while building tree of {}; descendant links form a cycle",
                            p, group
                        )));
                    }
                    nodes.insert(p, TreeNode::new(p, Some(id)));
                    order.push(p);
                    next.push(p);
                }
                if let Some(node) = nodes.get_mut(&id) {
                    node.progenitors = Some(progenitors);
                }
            }
            if !next.is_empty() {
                depth += 1;
            }
            frontier = next;
        }

        let mut tree = Tree {
            group: *group,
            root,
            nodes,
            order,
            trunk: Vec::new(),
            depth,
        };
        tree.trunk = tree.build_trunk();
        tracing::debug!(
            group = %group,
            nodes = tree.len(),
            depth = tree.depth,
            trunk = tree.trunk.len(),
            "Built progenitor tree"
        );
        Ok(tree)
    }

    /// Main branch of the tree rooted at `group`, root first.
    pub fn build_trunk(&self, group: &GroupIdentity) -> Result<Vec<NodeId>> {
        Ok(self.build_tree(group)?.trunk)
    }
}

/// Build the tree rooted at `group` against `index`.
pub fn build_tree(index: &HaloCatalogIndex, group: &GroupIdentity) -> Result<Tree> {
    TreeBuilder::new(index).build_tree(group)
}
