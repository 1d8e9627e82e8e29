//! fOS DOM - Document Object Model
//!
//! Arena-backed document tree for the headless engine: structural
//! mutation, mutation notification, live query collections and
//! three-phase event dispatch.

mod attributes;
mod document;
mod dom_events;
mod node;
mod observer;
mod operations;
mod query;
mod query_cache;
mod tree;

pub use attributes::{Attr, NamedNodeMap};
pub use document::Document;
pub use dom_events::{
    Completion, DispatchState, Event, EventDispatcher, EventError, EventHandler, EventInit,
    EventPhase, HandlerError, HandlerResult, ListenerId, ListenerOptions, RegisteredListener,
};
pub use node::{ElementData, Node, NodeData, NodeKind, SourcePosition};
pub use observer::{
    ListenerScope, MutationListener, MutationNotifier, MutationObserver, MutationObserverInit,
    MutationRecord, MutationType, SubscriptionId,
};
pub use operations::{ClonePolicy, DomError, DomResult};
pub use query::{PathQuery, QueryError};
pub use query_cache::{
    CollectionFilter, CollectionOptions, ElementTransform, FilterError, LiveCollection, NamedItem,
    SkipNoscriptContent, SkipWhitespaceText,
};
pub use tree::{Ancestors, Children, Descendants, DocumentMode, DomTree};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID (the document node of every tree)
    pub const ROOT: NodeId = NodeId(0);

    /// Arena slot of this node
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
