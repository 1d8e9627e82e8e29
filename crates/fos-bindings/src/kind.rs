//! Host object kinds
//!
//! Descriptors are registered per kind. Lookups walk from the dynamic
//! kind of an instance up through its ancestors.

use std::fmt;

use fos_dom::{DocumentMode, DomTree, NodeData, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostKind {
    EventTarget,
    Node,
    CharacterData,
    Text,
    Comment,
    ProcessingInstruction,
    Attr,
    Element,
    HtmlElement,
    Document,
    DocumentType,
    HtmlCollection,
}

impl HostKind {
    pub const ALL: [HostKind; 12] = [
        HostKind::EventTarget,
        HostKind::Node,
        HostKind::CharacterData,
        HostKind::Text,
        HostKind::Comment,
        HostKind::ProcessingInstruction,
        HostKind::Attr,
        HostKind::Element,
        HostKind::HtmlElement,
        HostKind::Document,
        HostKind::DocumentType,
        HostKind::HtmlCollection,
    ];

    /// Script-visible interface name
    pub fn name(self) -> &'static str {
        match self {
            HostKind::EventTarget => "EventTarget",
            HostKind::Node => "Node",
            HostKind::CharacterData => "CharacterData",
            HostKind::Text => "Text",
            HostKind::Comment => "Comment",
            HostKind::ProcessingInstruction => "ProcessingInstruction",
            HostKind::Attr => "Attr",
            HostKind::Element => "Element",
            HostKind::HtmlElement => "HTMLElement",
            HostKind::Document => "Document",
            HostKind::DocumentType => "DocumentType",
            HostKind::HtmlCollection => "HTMLCollection",
        }
    }

    pub fn parent(self) -> Option<HostKind> {
        match self {
            HostKind::EventTarget | HostKind::HtmlCollection => None,
            HostKind::Node => Some(HostKind::EventTarget),
            HostKind::CharacterData
            | HostKind::Attr
            | HostKind::Element
            | HostKind::Document
            | HostKind::DocumentType => Some(HostKind::Node),
            HostKind::Text | HostKind::Comment | HostKind::ProcessingInstruction => {
                Some(HostKind::CharacterData)
            }
            HostKind::HtmlElement => Some(HostKind::Element),
        }
    }

    /// This kind followed by its ancestors, most specific first
    pub fn chain(self) -> impl Iterator<Item = HostKind> {
        std::iter::successors(Some(self), |k| k.parent())
    }

    pub fn is_a(self, other: HostKind) -> bool {
        self.chain().any(|k| k == other)
    }

    /// Dynamic kind of a node. Elements of HTML documents are
    /// `HtmlElement`.
    pub fn for_node(tree: &DomTree, node: NodeId) -> Option<HostKind> {
        let kind = match tree.get(node)?.data() {
            NodeData::Document => HostKind::Document,
            NodeData::Doctype { .. } => HostKind::DocumentType,
            NodeData::Element(_) => match tree.mode() {
                DocumentMode::Html => HostKind::HtmlElement,
                DocumentMode::Xml => HostKind::Element,
            },
            NodeData::Text(_) => HostKind::Text,
            NodeData::Comment(_) => HostKind::Comment,
            NodeData::Attribute { .. } => HostKind::Attr,
            NodeData::ProcessingInstruction { .. } => HostKind::ProcessingInstruction,
        };
        Some(kind)
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
