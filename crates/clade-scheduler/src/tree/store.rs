//! Arena-backed search tree
//!
//! Nodes live in a `Vec` indexed by `AgentId`; children are tracked in a
//! side table and parents by id, so there are no owning back-pointers.
//! Nodes are never removed.

use std::collections::HashMap;

use clade_common::{AgentId, AgentNode, ProtocolError};

/// Owns every agent node and the lineage edges between them
#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<AgentNode>,
    children: HashMap<AgentId, Vec<AgentId>>,
}

impl SearchTree {
    /// Create a tree holding only the root
    pub fn new(root_quality: f64) -> Self {
        Self {
            nodes: vec![AgentNode::root(root_quality)],
            children: HashMap::new(),
        }
    }

    /// Number of nodes, pruned ones included
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn root(&self) -> &AgentNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: AgentId) -> Result<&AgentNode, ProtocolError> {
        self.nodes
            .get(id.index())
            .ok_or(ProtocolError::UnknownAgent(id))
    }

    pub fn get_mut(&mut self, id: AgentId) -> Result<&mut AgentNode, ProtocolError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(ProtocolError::UnknownAgent(id))
    }

    pub fn contains(&self, id: AgentId) -> bool {
        id.index() < self.nodes.len()
    }

    /// All nodes in id order
    pub fn iter(&self) -> std::slice::Iter<'_, AgentNode> {
        self.nodes.iter()
    }

    pub fn nodes(&self) -> &[AgentNode] {
        &self.nodes
    }

    /// Direct children of `id`, in creation order
    pub fn children(&self, id: AgentId) -> &[AgentId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attach a new child under `parent_id` and return its id
    pub fn insert_child(&mut self, parent_id: AgentId, quality: f64) -> Result<AgentId, ProtocolError> {
        let depth = self.get(parent_id)?.depth + 1;
        let id = AgentId(self.nodes.len() as u64);
        self.nodes
            .push(AgentNode::new(id, Some(parent_id), depth, quality));
        self.children.entry(parent_id).or_default().push(id);
        Ok(id)
    }

    /// Ids from `id` up to and including the root
    pub fn lineage(&self, id: AgentId) -> Lineage<'_> {
        Lineage {
            tree: self,
            next: self.contains(id).then_some(id),
        }
    }

    /// Record an evaluation outcome: the node's direct counters, then the
    /// clade counters of the node and every ancestor.
    pub fn record_outcome(&mut self, id: AgentId, success: bool) -> Result<(), ProtocolError> {
        self.get_mut(id)?.record_direct(success);

        let lineage: Vec<AgentId> = self.lineage(id).collect();
        for ancestor in lineage {
            self.nodes[ancestor.index()].record_clade(success);
        }
        Ok(())
    }

    /// Every id in the subtree rooted at `id`, `id` first
    pub fn clade(&self, id: AgentId) -> Vec<AgentId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }
}

/// Iterator over a node and its ancestors
pub struct Lineage<'a> {
    tree: &'a SearchTree,
    next: Option<AgentId>,
}

impl Iterator for Lineage<'_> {
    type Item = AgentId;

    fn next(&mut self) -> Option<AgentId> {
        let current = self.next?;
        self.next = self.tree.nodes[current.index()].parent_id;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chain_tree() -> SearchTree {
        // 0 -> 1 -> 2, 0 -> 3
        let mut tree = SearchTree::new(0.5);
        let a = tree.insert_child(AgentId::ROOT, 0.6).unwrap();
        tree.insert_child(a, 0.7).unwrap();
        tree.insert_child(AgentId::ROOT, 0.4).unwrap();
        tree
    }

    #[test]
    fn test_insert_child_depth_and_edges() {
        let tree = chain_tree();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get(AgentId(2)).unwrap().depth, 2);
        assert_eq!(tree.get(AgentId(2)).unwrap().parent_id, Some(AgentId(1)));
        assert_eq!(tree.children(AgentId::ROOT), &[AgentId(1), AgentId(3)]);
        assert!(tree.children(AgentId(2)).is_empty());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut tree = SearchTree::new(0.5);
        assert_eq!(
            tree.insert_child(AgentId(5), 0.5),
            Err(ProtocolError::UnknownAgent(AgentId(5)))
        );
    }

    #[test]
    fn test_lineage_walks_to_root() {
        let tree = chain_tree();
        let lineage: Vec<_> = tree.lineage(AgentId(2)).collect();
        assert_eq!(lineage, vec![AgentId(2), AgentId(1), AgentId::ROOT]);
        assert_eq!(tree.lineage(AgentId(99)).count(), 0);
    }

    #[test]
    fn test_record_outcome_propagates_to_ancestors() {
        let mut tree = chain_tree();
        tree.record_outcome(AgentId(2), true).unwrap();
        tree.record_outcome(AgentId(3), false).unwrap();

        let leaf = tree.get(AgentId(2)).unwrap();
        assert_eq!((leaf.direct_success, leaf.clade_success), (1, 1));

        let mid = tree.get(AgentId(1)).unwrap();
        assert_eq!((mid.direct_success, mid.clade_success), (0, 1));

        let root = tree.root();
        assert_eq!((root.clade_success, root.clade_failure), (1, 1));
        assert_eq!(root.direct_attempts(), 0);
    }

    #[test]
    fn test_clade_listing() {
        let tree = chain_tree();
        assert_eq!(tree.clade(AgentId::ROOT), vec![AgentId(0), AgentId(1), AgentId(2), AgentId(3)]);
        assert_eq!(tree.clade(AgentId(1)), vec![AgentId(1), AgentId(2)]);
    }

    proptest! {
        #[test]
        fn test_clade_counters_dominate_direct(
            parents in proptest::collection::vec(0usize..64, 0..32),
            outcomes in proptest::collection::vec((0usize..64, any::<bool>()), 0..128),
        ) {
            let mut tree = SearchTree::new(0.5);
            for p in parents {
                let parent = AgentId((p % tree.len()) as u64);
                tree.insert_child(parent, 0.5).unwrap();
            }
            for (target, success) in outcomes {
                let id = AgentId((target % tree.len()) as u64);
                tree.record_outcome(id, success).unwrap();
            }

            let (mut total_s, mut total_f) = (0, 0);
            for node in tree.iter() {
                prop_assert!(node.clade_success >= node.direct_success);
                prop_assert!(node.clade_failure >= node.direct_failure);
                total_s += node.direct_success;
                total_f += node.direct_failure;

                let (sub_s, sub_f) = tree.clade(node.id).iter().fold((0, 0), |(s, f), id| {
                    let n = tree.get(*id).unwrap();
                    (s + n.direct_success, f + n.direct_failure)
                });
                prop_assert_eq!(node.clade_success, sub_s);
                prop_assert_eq!(node.clade_failure, sub_f);
            }
            prop_assert_eq!(tree.root().clade_success, total_s);
            prop_assert_eq!(tree.root().clade_failure, total_f);
        }
    }
}
