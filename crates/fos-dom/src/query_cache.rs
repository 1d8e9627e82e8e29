//! Live Collections
//!
//! A live collection pairs a root node with a [`PathQuery`] and memoizes
//! the matching nodes. It subscribes to the tree's mutation notifier for
//! the whole tree, so any change anywhere marks it dirty; the next read
//! recomputes. The tree generation is checked as well, which also covers
//! character-data edits that post-filters may depend on.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::node::NodeData;
use crate::observer::{ListenerScope, MutationListener, MutationRecord};
use crate::query::{PathQuery, QueryError, names_equal};
use crate::tree::DocumentMode;
use crate::{DomTree, NodeId};

/// Failure inside a post-filter; the candidate is dropped
#[derive(Debug, Clone, thiserror::Error)]
#[error("collection filter failed: {0}")]
pub struct FilterError(pub String);

/// Post-filter applied to every query match on recompute
pub trait CollectionFilter {
    fn accept(&self, tree: &DomTree, node: NodeId) -> Result<bool, FilterError>;
}

impl<F> CollectionFilter for F
where
    F: Fn(&DomTree, NodeId) -> Result<bool, FilterError>,
{
    fn accept(&self, tree: &DomTree, node: NodeId) -> Result<bool, FilterError> {
        self(tree, node)
    }
}

/// Maps each surviving match to the node the collection exposes
pub type ElementTransform = Rc<dyn Fn(&DomTree, NodeId) -> NodeId>;

/// Per-collection post-processing
#[derive(Clone, Default)]
pub struct CollectionOptions {
    pub filters: Vec<Rc<dyn CollectionFilter>>,
    /// Identity when `None`
    pub transform: Option<ElementTransform>,
    /// Tests on the exposed node, run after the transform
    pub refinements: Vec<Rc<dyn CollectionFilter>>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl CollectionFilter + 'static) -> Self {
        self.filters.push(Rc::new(filter));
        self
    }

    pub fn with_transform(mut self, transform: impl Fn(&DomTree, NodeId) -> NodeId + 'static) -> Self {
        self.transform = Some(Rc::new(transform));
        self
    }

    pub fn with_refinement(mut self, refinement: impl CollectionFilter + 'static) -> Self {
        self.refinements.push(Rc::new(refinement));
        self
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("filters", &self.filters.len())
            .field("transform", &self.transform.is_some())
            .field("refinements", &self.refinements.len())
            .finish()
    }
}

/// Result of a by-name lookup on a collection
#[derive(Debug, Clone)]
pub enum NamedItem {
    Element(NodeId),
    /// Several elements share the name
    Collection(LiveCollection),
    NotFound,
}

enum CacheState {
    Empty,
    Ready { generation: u64, nodes: Rc<[NodeId]> },
    Poisoned(QueryError),
}

struct CollectionState {
    root: NodeId,
    query: PathQuery,
    options: CollectionOptions,
    cache: RefCell<CacheState>,
    dirty: Cell<bool>,
}

impl MutationListener for CollectionState {
    fn on_mutation(&self, _tree: &DomTree, _record: &MutationRecord) {
        self.dirty.set(true);
    }
}

/// Cached, auto-invalidating view over a query's matches.
///
/// Cloning shares the cache. The collection must only be read with the
/// tree it was created against.
#[derive(Clone)]
pub struct LiveCollection {
    inner: Rc<CollectionState>,
}

impl LiveCollection {
    /// Parse `expression` and build a collection rooted at `root`.
    pub fn new(tree: &DomTree, root: NodeId, expression: &str) -> Result<Self, QueryError> {
        Ok(Self::from_query(tree, root, PathQuery::parse(expression)?, CollectionOptions::default()))
    }

    pub fn with_options(
        tree: &DomTree,
        root: NodeId,
        expression: &str,
        options: CollectionOptions,
    ) -> Result<Self, QueryError> {
        Ok(Self::from_query(tree, root, PathQuery::parse(expression)?, options))
    }

    pub fn from_query(tree: &DomTree, root: NodeId, query: PathQuery, options: CollectionOptions) -> Self {
        let inner = Rc::new(CollectionState {
            root,
            query,
            options,
            cache: RefCell::new(CacheState::Empty),
            dirty: Cell::new(true),
        });
        tree.notifier().subscribe(ListenerScope::Tree, &inner);
        Self { inner }
    }

    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn query(&self) -> &PathQuery {
        &self.inner.query
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.inner.options
    }

    /// True when the next read will recompute
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get() || !matches!(*self.inner.cache.borrow(), CacheState::Ready { .. })
    }

    pub fn invalidate(&self) {
        self.inner.dirty.set(true);
    }

    /// Whether both handles share one cache
    pub fn ptr_eq(&self, other: &LiveCollection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current matches. Returns the memoized sequence itself when nothing
    /// changed since the last read.
    pub fn get(&self, tree: &DomTree) -> Result<Rc<[NodeId]>, QueryError> {
        let state = &self.inner;
        match &*state.cache.borrow() {
            CacheState::Poisoned(err) => return Err(QueryError::Poisoned(Box::new(err.clone()))),
            CacheState::Ready { generation, nodes }
                if !state.dirty.get() && *generation == tree.generation() =>
            {
                return Ok(nodes.clone());
            }
            _ => {}
        }

        let matches = match state.query.evaluate(tree, state.root) {
            Ok(matches) => matches,
            Err(err) => {
                tracing::warn!(query = %state.query, error = %err, "collection poisoned");
                *state.cache.borrow_mut() = CacheState::Poisoned(err.clone());
                return Err(err);
            }
        };

        let options = &state.options;
        let mut nodes = Vec::with_capacity(matches.len());
        for id in matches {
            if !accepts(&options.filters, tree, id) {
                continue;
            }
            let id = match &options.transform {
                Some(transform) => transform(tree, id),
                None => id,
            };
            if accepts(&options.refinements, tree, id) {
                nodes.push(id);
            }
        }

        let nodes: Rc<[NodeId]> = nodes.into();
        tracing::debug!(query = %state.query, root = %state.root, len = nodes.len(), "collection recomputed");
        *state.cache.borrow_mut() = CacheState::Ready {
            generation: tree.generation(),
            nodes: nodes.clone(),
        };
        state.dirty.set(false);
        Ok(nodes)
    }

    pub fn len(&self, tree: &DomTree) -> Result<usize, QueryError> {
        Ok(self.get(tree)?.len())
    }

    pub fn is_empty(&self, tree: &DomTree) -> Result<bool, QueryError> {
        Ok(self.get(tree)?.is_empty())
    }

    pub fn item(&self, tree: &DomTree, index: usize) -> Result<Option<NodeId>, QueryError> {
        Ok(self.get(tree)?.get(index).copied())
    }

    /// Resolve `name`: an element whose `id` matches wins; otherwise the
    /// elements whose `name` attribute matches, as a single element or,
    /// when there are several, as a sub-collection.
    pub fn named_item(&self, tree: &DomTree, name: &str) -> Result<NamedItem, QueryError> {
        if name.is_empty() {
            return Ok(NamedItem::NotFound);
        }
        let nodes = self.get(tree)?;
        let has = |id: NodeId, attr: &str| tree.get(id).and_then(|n| n.attribute(attr)) == Some(name);

        if let Some(&id) = nodes.iter().find(|&&id| has(id, "id")) {
            return Ok(NamedItem::Element(id));
        }
        let named: Vec<NodeId> = nodes.iter().copied().filter(|&id| has(id, "name")).collect();
        Ok(match named.as_slice() {
            [] => NamedItem::NotFound,
            [single] => NamedItem::Element(*single),
            _ => {
                let name = name.to_string();
                NamedItem::Collection(self.refined(tree, move |tree: &DomTree, id: NodeId| {
                    Ok(tree.get(id).and_then(|n| n.attribute("name")) == Some(name.as_str()))
                }))
            }
        })
    }

    /// Sub-collection of the members named `tag` (`*` for every element)
    pub fn tags(&self, tree: &DomTree, tag: &str) -> LiveCollection {
        let tag = tag.to_string();
        self.refined(tree, move |tree: &DomTree, id: NodeId| {
            let name = tree.get(id).and_then(|n| n.tag_name());
            Ok(name.is_some_and(|name| tag == "*" || names_equal(tree, name, &tag)))
        })
    }

    /// Same query and options, narrowed by a test on the exposed nodes
    fn refined(&self, tree: &DomTree, refinement: impl CollectionFilter + 'static) -> LiveCollection {
        let options = self.inner.options.clone().with_refinement(refinement);
        Self::from_query(tree, self.inner.root, self.inner.query.clone(), options)
    }
}

fn accepts(filters: &[Rc<dyn CollectionFilter>], tree: &DomTree, id: NodeId) -> bool {
    filters.iter().all(|filter| match filter.accept(tree, id) {
        Ok(accepted) => accepted,
        Err(err) => {
            tracing::warn!(node = %id, error = %err, "dropping collection candidate");
            false
        }
    })
}

impl fmt::Debug for LiveCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCollection")
            .field("root", &self.inner.root)
            .field("query", &self.inner.query.source())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

// ============================================================================
// Ready-made post-filters
// ============================================================================

/// Drops whitespace-only text nodes unless an enclosing `xml:space`
/// says `preserve`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipWhitespaceText {
    /// Only apply to XML documents
    pub xml_only: bool,
}

impl CollectionFilter for SkipWhitespaceText {
    fn accept(&self, tree: &DomTree, node: NodeId) -> Result<bool, FilterError> {
        let Some(NodeData::Text(text)) = tree.get(node).map(|n| n.data()) else {
            return Ok(true);
        };
        if !text.trim().is_empty() {
            return Ok(true);
        }
        if self.xml_only && tree.mode() != DocumentMode::Xml {
            return Ok(true);
        }
        let space = tree
            .ancestors(node)
            .find_map(|a| tree.get(a).and_then(|n| n.attribute("xml:space")));
        Ok(space == Some("preserve"))
    }
}

/// Drops anything inside a `noscript` element
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipNoscriptContent;

impl CollectionFilter for SkipNoscriptContent {
    fn accept(&self, tree: &DomTree, node: NodeId) -> Result<bool, FilterError> {
        let inside = tree.ancestors(node).any(|a| {
            tree.get(a)
                .and_then(|n| n.tag_name())
                .is_some_and(|t| t.eq_ignore_ascii_case("noscript"))
        });
        Ok(!inside)
    }
}
