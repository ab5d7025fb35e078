//! Named nodes in the ancestor graph
//!
//! A [`Node`] wraps a [`Scope`] under an id and remembers its direct
//! parents. Value lookup falls back from the node's own scope to a
//! breadth-first walk over its ancestors.

use crate::error::{Cause, ScopeError};
use crate::scope::{Scope, Value};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Direct parents of a node
#[derive(Default)]
struct Lineage {
    /// Insertion order, walked by value lookup
    ordered: Vec<Node>,
    /// Id lookup; keys are exactly the ids in `ordered`
    by_id: HashMap<String, Node>,
}

struct NodeInner {
    id: String,
    scope: Box<dyn Scope>,
    lineage: RwLock<Lineage>,
}

/// Named scope with a fixed set of parents
///
/// Cloning is cheap and yields a handle to the same node. Holding a parent
/// keeps it alive but never cancels it: propagation runs parent → child
/// only, and only through [`join`](crate::join).
///
/// Parents are set once, during construction, so a node can never become
/// its own ancestor.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Wrap `scope` as a leaf node
    #[must_use]
    pub fn new(id: impl Into<String>, scope: impl Scope + 'static) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id: id.into(),
                scope: Box::new(scope),
                lineage: RwLock::new(Lineage::default()),
            }),
        }
    }

    /// Node identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Snapshot of the direct parents in registration order
    #[must_use]
    pub fn parents(&self) -> Vec<Node> {
        self.inner.lineage.read().ordered.clone()
    }

    /// Direct parent with the given id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Node> {
        self.inner.lineage.read().by_id.get(id).cloned()
    }

    /// Direct parent ids, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lineage.read().by_id.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether the node has no parents
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.inner.lineage.read().ordered.is_empty()
    }

    /// Every ancestor in breadth-first order, each visited once
    #[must_use]
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            queue: self.parents().into(),
            seen: HashSet::new(),
        }
    }

    /// Value set on this node's own scope, without consulting ancestors
    #[inline]
    #[must_use]
    pub fn local_value(&self, key: &str) -> Option<Value> {
        self.inner.scope.value(key)
    }

    /// Check whether two handles refer to the same node
    #[inline]
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Record `parents` in order
    ///
    /// A repeated id replaces the earlier entry in the id map; both stay in
    /// the ordered list. Called once, before the node is shared.
    pub(crate) fn register_parents(&self, parents: &[Node]) {
        let mut lineage = self.inner.lineage.write();
        for parent in parents {
            if let Some(previous) = lineage.by_id.insert(parent.id().to_string(), parent.clone()) {
                if !Self::ptr_eq(&previous, parent) {
                    tracing::warn!(
                        node = %self.id(),
                        parent = %parent.id(),
                        "duplicate parent id; later parent replaces earlier in lookup"
                    );
                }
            }
            lineage.ordered.push(parent.clone());
        }
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

#[async_trait]
impl Scope for Node {
    async fn done(&self) {
        self.inner.scope.done().await;
    }

    fn is_done(&self) -> bool {
        self.inner.scope.is_done()
    }

    fn err(&self) -> Option<ScopeError> {
        self.inner.scope.err()
    }

    fn cause(&self) -> Option<Cause> {
        self.inner.scope.cause()
    }

    /// Own scope first, then the nearest ancestor along the
    /// earliest-registered path
    fn value(&self, key: &str) -> Option<Value> {
        self.local_value(key)
            .or_else(|| self.ancestors().find_map(|ancestor| ancestor.local_value(key)))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("parents", &self.keys())
            .field("done", &self.is_done())
            .finish()
    }
}

/// Breadth-first iterator over a node's ancestors
///
/// Each node's parents are snapshotted under its own lock, which is
/// released before the next node is visited.
#[derive(Debug)]
pub struct Ancestors {
    queue: VecDeque<Node>,
    seen: HashSet<usize>,
}

impl Iterator for Ancestors {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        while let Some(node) = self.queue.pop_front() {
            if !self.seen.insert(node.key()) {
                continue;
            }
            self.queue.extend(node.parents());
            return Some(node);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::CancelScope;

    fn leaf(id: &str) -> Node {
        Node::new(id, CancelScope::new())
    }

    fn leaf_with(id: &str, key: &str, value: &str) -> Node {
        Node::new(id, CancelScope::builder().with_value(key, value).build())
    }

    fn composite(id: &str, parents: &[Node]) -> Node {
        let node = leaf(id);
        node.register_parents(parents);
        node
    }

    fn ids(nodes: impl IntoIterator<Item = Node>) -> Vec<String> {
        nodes.into_iter().map(|n| n.id().to_string()).collect()
    }

    #[test]
    fn leaf_has_no_parents() {
        let node = leaf("solo");
        assert_eq!(node.id(), "solo");
        assert!(node.is_leaf());
        assert!(node.parents().is_empty());
        assert!(node.keys().is_empty());
        assert!(node.get("anything").is_none());
    }

    #[test]
    fn keys_are_sorted() {
        let node = composite("c", &[leaf("zeta"), leaf("alpha"), leaf("mid")]);
        assert_eq!(node.keys(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(ids(node.parents()), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn parents_is_a_snapshot() {
        let node = composite("c", &[leaf("a"), leaf("b")]);
        let mut snapshot = node.parents();
        snapshot.clear();
        assert_eq!(node.parents().len(), 2);
    }

    #[test]
    fn get_returns_direct_parent_only() {
        let grandparent = leaf("gp");
        let parent = composite("p", &[grandparent, leaf("other")]);
        let child = composite("c", &[parent.clone(), leaf("q")]);

        let got = child.get("p").unwrap();
        assert!(Node::ptr_eq(&got, &parent));
        assert!(child.get("gp").is_none());
    }

    #[test]
    fn duplicate_id_overwrites_lookup_but_keeps_order() {
        let first = leaf("dup");
        let second = leaf("dup");
        let node = composite("c", &[first, second.clone()]);

        assert_eq!(node.keys(), vec!["dup"]);
        assert!(Node::ptr_eq(&node.get("dup").unwrap(), &second));
        assert_eq!(node.parents().len(), 2);
    }

    #[test]
    fn own_value_wins_over_parents() {
        let parent = leaf_with("p", "say", "parent");
        let node = Node::new("c", CancelScope::builder().with_value("say", "own").build());
        node.register_parents(&[parent]);
        assert_eq!(node.value("say"), Some(Value::from("own")));
    }

    #[test]
    fn shallow_ancestor_wins_over_deep() {
        // c -> [a, b]; a -> [deep]; deep and b both set the key
        let deep = leaf_with("deep", "k", "deep");
        let a = composite("a", &[deep, leaf("a2")]);
        let b = leaf_with("b", "k", "shallow");
        let c = composite("c", &[a, b]);

        assert_eq!(c.value("k"), Some(Value::from("shallow")));
    }

    #[test]
    fn earliest_registered_parent_wins_at_same_depth() {
        let c = composite("c", &[leaf_with("p1", "say", "hello"), leaf_with("p2", "say", "goodbye")]);
        assert_eq!(c.value("say"), Some(Value::from("hello")));
    }

    #[test]
    fn missing_value_is_none() {
        let c = composite("c", &[leaf("a"), leaf("b")]);
        assert!(c.value("nope").is_none());
    }

    #[test]
    fn ancestors_visit_diamond_once() {
        let root = leaf("root");
        let left = composite("left", &[root.clone(), leaf("l2")]);
        let right = composite("right", &[root, leaf("r2")]);
        let bottom = composite("bottom", &[left, right]);

        assert_eq!(
            ids(bottom.ancestors()),
            vec!["left", "right", "root", "l2", "r2"]
        );
    }

    #[test]
    fn debug_lists_parent_keys() {
        let c = composite("c", &[leaf("b"), leaf("a")]);
        let text = format!("{c:?}");
        assert!(text.contains("\"c\""));
        assert!(text.contains("[\"a\", \"b\"]"));
    }
}
