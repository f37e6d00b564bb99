use super::node::{ExpectationId, ExpectationNode};
use crate::error::ExpectError;
use crate::predicate::StringMatcher;
use tracing::debug;

const ROOT: ExpectationId = ExpectationId(0);

/// Arena of expectation nodes with a single "current scope" cursor.
///
/// Nodes are only ever appended and each is parented exactly once, at
/// creation, so the tree is acyclic. The live scope chain is `current` and
/// its ancestors, excluding the root.
#[derive(Debug)]
pub struct ExpectationTree {
    nodes: Vec<ExpectationNode>,
    current: ExpectationId,
}

impl Default for ExpectationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpectationTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ExpectationNode::root()],
            current: ROOT,
        }
    }

    pub fn root(&self) -> ExpectationId {
        ROOT
    }

    pub fn current(&self) -> ExpectationId {
        self.current
    }

    pub fn get(&self, id: ExpectationId) -> Option<&ExpectationNode> {
        self.nodes.get(id.0)
    }

    /// Number of declared expectations, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn node(&self, id: ExpectationId) -> &ExpectationNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: ExpectationId) -> &mut ExpectationNode {
        &mut self.nodes[id.0]
    }

    /// Attach a new node under `parent` without moving the cursor.
    pub fn declare_child(
        &mut self,
        parent: ExpectationId,
        method: StringMatcher,
        path: StringMatcher,
    ) -> Result<ExpectationId, ExpectError> {
        if self.get(parent).is_none() {
            return Err(ExpectError::ScopeNotOpen(parent.to_string()));
        }
        Ok(self.attach(parent, method, path))
    }

    /// Attach a new node under the current scope and make it current.
    pub fn declare(&mut self, method: StringMatcher, path: StringMatcher) -> ExpectationId {
        let id = self.attach(self.current, method, path);
        self.current = id;
        id
    }

    fn attach(
        &mut self,
        parent: ExpectationId,
        method: StringMatcher,
        path: StringMatcher,
    ) -> ExpectationId {
        let id = ExpectationId(self.nodes.len());
        self.nodes
            .push(ExpectationNode::new(id, Some(parent), method, path));
        self.node_mut(parent).push_child(id);

        debug!(id = %id, parent = %parent, expectation = %self.node(id).describe(), "Declared expectation");
        id
    }

    /// Whether `id` is on the live scope chain.
    pub fn is_live(&self, id: ExpectationId) -> bool {
        self.live_chain().any(|live| live == id)
    }

    /// Whether `id` may become the current scope: it is not the root, has not
    /// been closed, and its parent is on the live chain (or is the root).
    pub fn can_enter(&self, id: ExpectationId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        match node.parent() {
            Some(parent) => !node.is_closed() && (parent == ROOT || self.is_live(parent)),
            None => false,
        }
    }

    /// Make `id` the current scope.
    pub fn enter(&mut self, id: ExpectationId) -> Result<(), ExpectError> {
        if !self.can_enter(id) {
            return Err(ExpectError::ScopeNotOpen(id.to_string()));
        }
        debug!(id = %id, "Entering expectation scope");
        self.current = id;
        Ok(())
    }

    /// Close the scope opened by `id`; its parent becomes current. Nothing
    /// declared under `id` can match later requests.
    pub fn exit(&mut self, id: ExpectationId) {
        let Some(parent) = self.get(id).and_then(ExpectationNode::parent) else {
            return;
        };
        debug!(id = %id, "Leaving expectation scope");
        self.node_mut(id).close();
        self.current = parent;
    }

    /// Walk from the current scope up to, but excluding, the root.
    pub fn live_chain(&self) -> LiveChain<'_> {
        LiveChain {
            tree: self,
            next: Some(self.current),
        }
    }

    /// All non-root nodes in pre-order (parents before children, declaration order).
    pub fn preorder(&self) -> Vec<ExpectationId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<ExpectationId> = self.node(ROOT).children().iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children().iter().rev().copied());
        }
        order
    }
}

/// Iterator over the live scope chain, innermost first.
pub struct LiveChain<'a> {
    tree: &'a ExpectationTree,
    next: Option<ExpectationId>,
}

impl Iterator for LiveChain<'_> {
    type Item = ExpectationId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.filter(|id| *id != ROOT)?;
        self.next = self.tree.node(id).parent();
        Some(id)
    }
}
