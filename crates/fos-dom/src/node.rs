//! DOM Node - Arena record
//!
//! Each node is a plain record in the tree arena. Relationships are
//! `NodeId` links rather than pointers, and first/last child are kept
//! as separate fields so appending never needs to walk the sibling list.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::NodeId;
use crate::attributes::NamedNodeMap;
use crate::dom_events::ListenerTable;

/// Node type codes, numbered as the DOM exposes them through `nodeType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    Element = 1,
    Attribute = 2,
    Text = 3,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
}

impl NodeKind {
    /// Numeric `nodeType` value
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Where the parser found a node in its source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourcePosition {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// DOM Node - Core structure
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) data: NodeData,
    pub(crate) position: Option<SourcePosition>,
    /// Script-host wrapper, created on first access
    pub(crate) host: Option<Rc<dyn Any>>,
    /// `None` stands in for the shared empty table
    pub(crate) listeners: Option<Box<ListenerTable>>,
}

impl Node {
    pub(crate) fn new(data: NodeData, position: Option<SourcePosition>) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            data,
            position,
            host: None,
            listeners: None,
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[inline]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[inline]
    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    #[inline]
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    #[inline]
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Source position recorded by the parser, if any
    #[inline]
    pub fn position(&self) -> Option<SourcePosition> {
        self.position
    }

    /// Whether a script-host object has been bound to this node
    #[inline]
    pub fn has_host_object(&self) -> bool {
        self.host.is_some()
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Local tag name for elements
    pub fn tag_name(&self) -> Option<&str> {
        self.as_element().map(|e| e.name.as_str())
    }

    /// Shortcut for an element attribute lookup
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.as_element().and_then(|e| e.attrs.get_attribute(name))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("parent", &self.parent)
            .field("first_child", &self.first_child)
            .field("last_child", &self.last_child)
            .field("prev_sibling", &self.prev_sibling)
            .field("next_sibling", &self.next_sibling)
            .field("data", &self.data)
            .field("position", &self.position)
            .field("has_host", &self.host.is_some())
            .finish()
    }
}

/// Node-specific data
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// Document root
    Document,
    /// DOCTYPE
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
    /// Detached attribute node
    Attribute { name: String, value: String },
    /// Processing instruction
    ProcessingInstruction { target: String, data: String },
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Doctype { .. } => NodeKind::DocumentType,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Attribute { .. } => NodeKind::Attribute,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
        }
    }

    /// DOM `nodeName`
    pub fn node_name(&self) -> String {
        match self {
            NodeData::Document => "#document".to_string(),
            NodeData::Doctype { name, .. } => name.clone(),
            NodeData::Element(e) => e.name.clone(),
            NodeData::Text(_) => "#text".to_string(),
            NodeData::Comment(_) => "#comment".to_string(),
            NodeData::Attribute { name, .. } => name.clone(),
            NodeData::ProcessingInstruction { target, .. } => target.clone(),
        }
    }

    /// Character data carried by text-like nodes
    pub fn character_data(&self) -> Option<&str> {
        match self {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            NodeData::Attribute { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Element-specific data
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Tag name as created
    pub name: String,
    /// Namespace URI, if any
    pub namespace: Option<String>,
    pub attrs: NamedNodeMap,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attrs: NamedNodeMap::new(),
        }
    }

    /// Builder-style attribute setter for parser callers
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attrs.set_attribute(name, value);
        self
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get_attribute(name)
    }

    /// Get the id attribute
    pub fn id(&self) -> Option<&str> {
        self.attrs.get_attribute("id")
    }
}
