//! DOM Node Operations
//!
//! Structural mutation (append, insert, remove, replace, clone) plus the
//! attribute and character-data accessors. Every change is applied in
//! full before the mutation notifier is called.

use crate::dom_events::EventError;
use crate::node::{Node, NodeData, NodeKind};
use crate::observer::MutationRecord;
use crate::query::QueryError;
use crate::{DomTree, NamedNodeMap, NodeId};

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    /// The node lacks the relationship the operation needs
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("cannot insert {node} under {parent}: it would become its own descendant")]
    CyclicInsertion { node: NodeId, parent: NodeId },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Event(#[from] EventError),
}

/// What a clone carries over besides structure
#[derive(Debug, Clone, Copy, Default)]
pub struct ClonePolicy {
    /// Copy registered event listeners onto the clone
    pub copy_event_listeners: bool,
}

impl DomTree {
    // ========================================================================
    // Structural mutation
    // ========================================================================

    /// Append `node` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<NodeId> {
        self.check_insertable(parent, node)?;
        self.detach(node);
        self.link_last(parent, node);
        tracing::trace!(%node, %parent, "append_child");
        self.notify(MutationRecord::NodeAdded { node, parent });
        Ok(node)
    }

    /// Create an element as the last child of `parent`. The caller
    /// guarantees `parent` exists and accepts element children.
    pub(crate) fn create_child_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let node = self.create_element(name);
        self.link_last(parent, node);
        tracing::trace!(%node, %parent, "append_child");
        self.notify(MutationRecord::NodeAdded { node, parent });
        node
    }

    /// Insert `node` immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> DomResult<NodeId> {
        if reference == node {
            self.node(node)?;
            return Ok(node);
        }
        let parent = self.node(reference)?.parent.ok_or_else(|| {
            DomError::InvalidState(format!("reference node {reference} has no parent"))
        })?;
        self.check_insertable(parent, node)?;
        self.detach(node);
        self.link_before(reference, node);
        tracing::trace!(%node, %reference, "insert_before");
        self.notify(MutationRecord::NodeAdded { node, parent });
        Ok(node)
    }

    /// `insertBefore` as scripts call it: `None` appends.
    pub fn insert_before_child(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<NodeId> {
        match reference {
            None => self.append_child(parent, node),
            Some(reference) => {
                self.expect_child(parent, reference)?;
                self.insert_before(reference, node)
            }
        }
    }

    /// Detach `node` from its parent.
    pub fn remove(&mut self, node: NodeId) -> DomResult<()> {
        if self.node(node)?.parent.is_none() {
            return Err(DomError::InvalidState(format!("node {node} has no parent")));
        }
        self.detach(node);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.expect_child(parent, child)?;
        self.remove(child)?;
        Ok(child)
    }

    /// Put `new` where `old` is, then detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> DomResult<()> {
        if old == new {
            self.node(old)?;
            return Ok(());
        }
        self.insert_before(old, new)?;
        self.remove(old)
    }

    /// Returns the replaced child.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> DomResult<NodeId> {
        self.expect_child(parent, old)?;
        self.replace(old, new)?;
        Ok(old)
    }

    pub fn remove_all_children(&mut self, node: NodeId) -> DomResult<()> {
        while let Some(child) = self.node(node)?.first_child {
            self.remove(child)?;
        }
        Ok(())
    }

    /// Copy `node` (and with `deep`, everything below it) into new
    /// detached nodes. Host objects are never copied; listeners only when
    /// the policy asks for them. No notifications fire.
    pub fn clone_subtree(&mut self, node: NodeId, deep: bool, policy: &ClonePolicy) -> DomResult<NodeId> {
        let copy = self.copy_node(node, policy)?;
        if deep {
            let mut stack = vec![(node, copy)];
            while let Some((original, copied)) = stack.pop() {
                let children: Vec<NodeId> = self.children(original).collect();
                for child in children {
                    let child_copy = self.copy_node(child, policy)?;
                    self.link_last(copied, child_copy);
                    stack.push((child, child_copy));
                }
            }
        }
        tracing::trace!(%node, %copy, deep, "clone_subtree");
        Ok(copy)
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// DOM `textContent`: `None` for documents and doctypes, the
    /// concatenated descendant text for elements.
    pub fn text_content(&self, node: NodeId) -> DomResult<Option<String>> {
        let n = self.node(node)?;
        Ok(match &n.data {
            NodeData::Document | NodeData::Doctype { .. } => None,
            NodeData::Element(_) => {
                let mut text = String::new();
                for id in self.descendants(node) {
                    if let Some(t) = self.get(id).and_then(Node::as_text) {
                        text.push_str(t);
                    }
                }
                Some(text)
            }
            other => other.character_data().map(str::to_string),
        })
    }

    /// Replace an element's children with a single text node, or set the
    /// data of a character-data node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> DomResult<()> {
        match self.node(node)?.kind() {
            NodeKind::Document | NodeKind::DocumentType => Ok(()),
            NodeKind::Element => {
                self.remove_all_children(node)?;
                if !text.is_empty() {
                    let child = self.create_text(text);
                    self.append_child(node, child)?;
                }
                Ok(())
            }
            _ => self.set_character_data(node, text),
        }
    }

    pub fn character_data(&self, node: NodeId) -> DomResult<Option<&str>> {
        Ok(self.node(node)?.data.character_data())
    }

    pub fn set_character_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let n = self.node_mut(node)?;
        match &mut n.data {
            NodeData::Text(s) | NodeData::Comment(s) => *s = data.to_string(),
            NodeData::ProcessingInstruction { data: d, .. } => *d = data.to_string(),
            NodeData::Attribute { value, .. } => *value = data.to_string(),
            _ => {
                return Err(DomError::InvalidState(format!(
                    "node {node} does not hold character data"
                )));
            }
        }
        self.bump_generation();
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attributes(&self, element: NodeId) -> DomResult<&NamedNodeMap> {
        self.node(element)?
            .as_element()
            .map(|e| &e.attrs)
            .ok_or(DomError::NotAnElement(element))
    }

    pub fn get_attribute(&self, element: NodeId, name: &str) -> DomResult<Option<&str>> {
        Ok(self.attributes(element)?.get_attribute(name))
    }

    pub fn has_attribute(&self, element: NodeId, name: &str) -> DomResult<bool> {
        Ok(self.attributes(element)?.has_attribute(name))
    }

    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> DomResult<()> {
        let data = self
            .node_mut(element)?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(element))?;
        let old_value = data.attrs.set_attribute(name, value);
        self.notify(MutationRecord::AttributeChanged {
            element,
            name: name.to_string(),
            old_value,
            new_value: Some(value.to_string()),
        });
        Ok(())
    }

    /// Returns the removed value. Removing an absent attribute is silent.
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> DomResult<Option<String>> {
        let data = self
            .node_mut(element)?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(element))?;
        let Some(removed) = data.attrs.remove_named_item(name) else {
            return Ok(None);
        };
        self.notify(MutationRecord::AttributeChanged {
            element,
            name: name.to_string(),
            old_value: Some(removed.value.clone()),
            new_value: None,
        });
        Ok(Some(removed.value))
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Position-qualified path from the top of the tree, e.g.
    /// `/html/body/div[2]/span`. The index appears only when siblings
    /// share the same step name.
    pub fn canonical_path(&self, node: NodeId) -> DomResult<String> {
        self.node(node)?;
        let mut segments = Vec::new();
        let mut at = node;
        while let Some(parent) = self.parent(at) {
            segments.push(self.path_segment(parent, at));
            at = parent;
        }
        if segments.is_empty() {
            return Ok("/".to_string());
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    fn path_segment(&self, parent: NodeId, node: NodeId) -> String {
        let token = |id: NodeId| -> String {
            match self.get(id).map(Node::data) {
                Some(NodeData::Element(e)) => e.name.clone(),
                Some(NodeData::Text(_)) => "text()".to_string(),
                Some(NodeData::Comment(_)) => "comment()".to_string(),
                _ => "node()".to_string(),
            }
        };
        let own = token(node);
        let mut index = 0;
        let mut total = 0;
        for sibling in self.children(parent) {
            if token(sibling) == own {
                total += 1;
                if sibling == node {
                    index = total;
                }
            }
        }
        if total > 1 {
            format!("{own}[{index}]")
        } else {
            own
        }
    }

    // ========================================================================
    // Linking
    // ========================================================================

    fn check_insertable(&self, parent: NodeId, node: NodeId) -> DomResult<()> {
        let p = self.node(parent)?;
        let n = self.node(node)?;
        if !matches!(p.data, NodeData::Document | NodeData::Element(_)) {
            return Err(DomError::InvalidState(format!(
                "{:?} node {parent} cannot have children",
                p.kind()
            )));
        }
        if matches!(n.data, NodeData::Document) {
            return Err(DomError::InvalidState("a document node cannot be inserted".into()));
        }
        if node == parent || self.is_ancestor_of(node, parent) {
            return Err(DomError::CyclicInsertion { node, parent });
        }
        Ok(())
    }

    fn expect_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(DomError::InvalidState(format!("{child} is not a child of {parent}")));
        }
        Ok(())
    }

    /// Unlink `node` if attached and fire `NodeRemoved`.
    fn detach(&mut self, node: NodeId) {
        if let Some(old_parent) = self.unlink(node) {
            tracing::trace!(%node, %old_parent, "node removed");
            self.notify(MutationRecord::NodeRemoved { node, old_parent });
        }
    }

    /// Clear all three links of `node` and repair its neighbours.
    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let (parent, prev, next) = {
            let n = &mut self.nodes_mut()[node.index()];
            let parent = n.parent.take()?;
            (parent, n.prev_sibling.take(), n.next_sibling.take())
        };
        let nodes = self.nodes_mut();
        match prev {
            Some(p) => nodes[p.index()].next_sibling = next,
            None => nodes[parent.index()].first_child = next,
        }
        match next {
            Some(n) => nodes[n.index()].prev_sibling = prev,
            None => nodes[parent.index()].last_child = prev,
        }
        Some(parent)
    }

    fn link_last(&mut self, parent: NodeId, node: NodeId) {
        let nodes = self.nodes_mut();
        let last = nodes[parent.index()].last_child;
        {
            let n = &mut nodes[node.index()];
            n.parent = Some(parent);
            n.prev_sibling = last;
            n.next_sibling = None;
        }
        match last {
            Some(l) => nodes[l.index()].next_sibling = Some(node),
            None => nodes[parent.index()].first_child = Some(node),
        }
        nodes[parent.index()].last_child = Some(node);
    }

    fn link_before(&mut self, reference: NodeId, node: NodeId) {
        let nodes = self.nodes_mut();
        let Some(parent) = nodes[reference.index()].parent else {
            return;
        };
        let prev = nodes[reference.index()].prev_sibling;
        {
            let n = &mut nodes[node.index()];
            n.parent = Some(parent);
            n.prev_sibling = prev;
            n.next_sibling = Some(reference);
        }
        nodes[reference.index()].prev_sibling = Some(node);
        match prev {
            Some(p) => nodes[p.index()].next_sibling = Some(node),
            None => nodes[parent.index()].first_child = Some(node),
        }
    }

    fn copy_node(&mut self, node: NodeId, policy: &ClonePolicy) -> DomResult<NodeId> {
        let original = self.node(node)?;
        let data = original.data.clone();
        let position = original.position;
        let listeners = if policy.copy_event_listeners {
            original.listeners.clone()
        } else {
            None
        };
        let copy = self.create_node(data, position);
        self.node_mut(copy)?.listeners = listeners;
        Ok(copy)
    }
}
