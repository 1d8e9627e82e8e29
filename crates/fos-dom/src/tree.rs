//! DOM Tree (arena-based allocation)
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Nodes are
//! never freed individually; a detached node simply has no parent.

use std::any::Any;
use std::rc::Rc;

use crate::node::{ElementData, Node, NodeData, SourcePosition};
use crate::observer::{ListenerScope, MutationNotifier, MutationRecord};
use crate::operations::{DomError, DomResult};
use crate::NodeId;

/// Parsing mode of the document a tree belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentMode {
    /// Tag names compare case-insensitively
    #[default]
    Html,
    Xml,
}

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
    notifier: MutationNotifier,
    generation: u64,
    mode: DocumentMode,
    next_listener_id: u64,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only its document node at [`NodeId::ROOT`]
    pub fn new() -> Self {
        Self::with_mode(DocumentMode::Html)
    }

    pub fn with_mode(mode: DocumentMode) -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document, None)],
            notifier: MutationNotifier::new(),
            generation: 0,
            mode,
            next_listener_id: 0,
        }
    }

    /// Get a node by ID
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node by ID, failing with `UnknownNode`
    pub fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.nodes.get(id.index()).ok_or(DomError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.nodes.get_mut(id.index()).ok_or(DomError::UnknownNode(id))
    }

    /// Number of nodes ever created, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the document node exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn mode(&self) -> DocumentMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DocumentMode) {
        self.mode = mode;
    }

    /// Mutation counter, bumped on every structural or data change
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn notifier(&self) -> &MutationNotifier {
        &self.notifier
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Allocate a detached node
    pub fn create_node(&mut self, data: NodeData, position: Option<SourcePosition>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        tracing::trace!(%id, kind = ?data.kind(), "node created");
        self.nodes.push(Node::new(data, position));
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeData::Element(ElementData::new(name)), None)
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create_node(NodeData::Text(text.to_string()), None)
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.create_node(NodeData::Comment(text.to_string()), None)
    }

    pub fn create_attribute(&mut self, name: &str, value: &str) -> NodeId {
        self.create_node(
            NodeData::Attribute {
                name: name.to_string(),
                value: value.to_string(),
            },
            None,
        )
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        self.create_node(
            NodeData::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            },
            None,
        )
    }

    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeId {
        self.create_node(
            NodeData::Doctype {
                name: name.to_string(),
                public_id: public_id.to_string(),
                system_id: system_id.to_string(),
            },
            None,
        )
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Forward iterator over the direct children of `id`
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).and_then(|n| n.first_child),
        }
    }

    /// Pre-order iterator over every node below `id`, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root: id,
            next: self.get(id).and_then(|n| n.first_child),
        }
    }

    /// Iterator from the parent of `id` up to the top of its tree
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// Strict ancestry: a node is not its own ancestor
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Topmost ancestor of `id` (the document node for attached nodes)
    pub fn top_ancestor(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// Whether `id` is reachable from the document node
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == NodeId::ROOT || self.top_ancestor(id) == NodeId::ROOT
    }

    /// First element child of the document
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT)
            .find(|&c| self.get(c).is_some_and(Node::is_element))
    }

    // ========================================================================
    // Script-host binding slot
    // ========================================================================

    pub fn host_object(&self, id: NodeId) -> Option<Rc<dyn Any>> {
        self.get(id).and_then(|n| n.host.clone())
    }

    /// Bind a host object to `id` unless one is already bound.
    ///
    /// Returns whichever object ends up bound.
    pub fn bind_host_object(&mut self, id: NodeId, object: Rc<dyn Any>) -> DomResult<Rc<dyn Any>> {
        let node = self.node_mut(id)?;
        Ok(node.host.get_or_insert(object).clone())
    }

    // ========================================================================
    // Internals shared by operations and events
    // ========================================================================

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub(crate) fn next_listener_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Deliver a record to every interested listener, in subscription order.
    pub(crate) fn notify(&mut self, record: MutationRecord) {
        self.bump_generation();
        let listeners = self.notifier.snapshot();
        if listeners.is_empty() {
            return;
        }
        let tree: &DomTree = self;
        let target = record.target();
        for (scope, listener) in listeners {
            let interested = match scope {
                ListenerScope::Tree => true,
                ListenerScope::Subtree(root) => root == target || tree.is_ancestor_of(root, target),
            };
            if interested {
                listener.on_mutation(tree, &record);
            }
        }
    }
}

/// Iterator over a node's children. A clone continues independently from
/// the same position.
#[derive(Clone)]
pub struct Children<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Pre-order walk following child and sibling links, climbing back up at
/// subtree boundaries. No stack is kept.
#[derive(Clone)]
pub struct Descendants<'a> {
    tree: &'a DomTree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Descendants<'_> {
    fn successor(&self, current: NodeId) -> Option<NodeId> {
        let node = self.tree.get(current)?;
        if let Some(child) = node.first_child {
            return Some(child);
        }
        let mut at = current;
        loop {
            if at == self.root {
                return None;
            }
            let node = self.tree.get(at)?;
            if let Some(sibling) = node.next_sibling {
                return Some(sibling);
            }
            at = node.parent?;
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.successor(current);
        Some(current)
    }
}

#[derive(Clone)]
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, [NodeId; 5]) {
        // <html><body><p>text</p><div/></body></html>
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let body = tree.create_element("body");
        let p = tree.create_element("p");
        let text = tree.create_text("text");
        let div = tree.create_element("div");
        tree.append_child(NodeId::ROOT, html).unwrap();
        tree.append_child(html, body).unwrap();
        tree.append_child(body, p).unwrap();
        tree.append_child(p, text).unwrap();
        tree.append_child(body, div).unwrap();
        (tree, [html, body, p, text, div])
    }

    #[test]
    fn test_new_tree_has_document() {
        let tree = DomTree::new();
        assert_eq!(tree.len(), 1);
        assert!(tree.is_empty());
        assert_eq!(tree.get(NodeId::ROOT).map(|n| n.kind()), Some(crate::NodeKind::Document));
    }

    #[test]
    fn test_descendants_preorder() {
        let (tree, [html, body, p, text, div]) = sample();
        let all: Vec<_> = tree.descendants(NodeId::ROOT).collect();
        assert_eq!(all, vec![html, body, p, text, div]);

        let under_p: Vec<_> = tree.descendants(p).collect();
        assert_eq!(under_p, vec![text]);
        assert_eq!(tree.descendants(div).count(), 0);
    }

    #[test]
    fn test_children_restartable() {
        let (tree, [_, body, p, _, div]) = sample();
        let children = tree.children(body);
        let first: Vec<_> = children.clone().collect();
        let second: Vec<_> = children.collect();
        assert_eq!(first, vec![p, div]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_ancestors() {
        let (tree, [html, body, p, text, _]) = sample();
        let chain: Vec<_> = tree.ancestors(text).collect();
        assert_eq!(chain, vec![p, body, html, NodeId::ROOT]);
        assert!(tree.is_ancestor_of(html, text));
        assert!(!tree.is_ancestor_of(text, text));
        assert_eq!(tree.top_ancestor(text), NodeId::ROOT);
        assert_eq!(tree.document_element(), Some(html));
    }

    #[test]
    fn test_host_object_bound_once() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let first: Rc<dyn Any> = Rc::new(1u32);
        let second: Rc<dyn Any> = Rc::new(2u32);
        let bound = tree.bind_host_object(div, first.clone()).unwrap();
        assert!(Rc::ptr_eq(&bound, &first));
        let bound = tree.bind_host_object(div, second).unwrap();
        assert!(Rc::ptr_eq(&bound, &first));
    }
}
