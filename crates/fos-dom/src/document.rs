//! Document - High-level document API

use crate::query::QueryError;
use crate::query_cache::{CollectionOptions, LiveCollection};
use crate::{DomTree, Node, NodeId};

/// A loaded document: its tree plus the URL it came from
#[derive(Debug)]
pub struct Document {
    tree: DomTree,
    url: String,
}

impl Document {
    /// Create a document with an empty `html`/`head`/`body` skeleton
    pub fn new(url: &str) -> Self {
        let mut tree = DomTree::new();
        let html = tree.create_child_element(NodeId::ROOT, "html");
        tree.create_child_element(html, "head");
        tree.create_child_element(html, "body");
        Self {
            tree,
            url: url.to_string(),
        }
    }

    /// Create an empty document (no structure)
    pub fn empty(url: &str) -> Self {
        Self::from_tree(DomTree::new(), url)
    }

    /// Wrap a tree built elsewhere, typically by a parser
    pub fn from_tree(tree: DomTree, url: &str) -> Self {
        Self {
            tree,
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> DomTree {
        self.tree
    }

    /// Get the root element
    pub fn document_element(&self) -> Option<NodeId> {
        self.tree.document_element()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_of_root_element("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_of_root_element("body")
    }

    fn child_of_root_element(&self, tag: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.tree.children(html).find(|&c| {
            self.tree
                .get(c)
                .and_then(Node::tag_name)
                .is_some_and(|t| t.eq_ignore_ascii_case(tag))
        })
    }

    /// Text of the first `title` element
    pub fn title(&self) -> String {
        let title = self.tree.descendants(NodeId::ROOT).find(|&id| {
            self.tree
                .get(id)
                .and_then(Node::tag_name)
                .is_some_and(|t| t.eq_ignore_ascii_case("title"))
        });
        title
            .and_then(|id| self.tree.text_content(id).ok().flatten())
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    /// First element in document order whose `id` attribute matches
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .descendants(NodeId::ROOT)
            .find(|&n| self.tree.get(n).and_then(|node| node.attribute("id")) == Some(id))
    }

    /// Live collection of every element named `tag` (`*` for all)
    pub fn elements_by_tag_name(&self, tag: &str, options: CollectionOptions) -> Result<LiveCollection, QueryError> {
        let query = crate::PathQuery::elements_named(tag, true)?;
        Ok(LiveCollection::from_query(&self.tree, NodeId::ROOT, query, options))
    }

    /// Live collection of elements whose `name` attribute matches
    pub fn elements_by_name(&self, name: &str, options: CollectionOptions) -> Result<LiveCollection, QueryError> {
        let query = crate::PathQuery::parse("//*")?.with_attribute_equals("name", name);
        Ok(LiveCollection::from_query(&self.tree, NodeId::ROOT, query, options))
    }

    /// `document.all`: every element in document order
    pub fn all(&self, options: CollectionOptions) -> Result<LiveCollection, QueryError> {
        LiveCollection::with_options(&self.tree, NodeId::ROOT, "//*", options)
    }
}
