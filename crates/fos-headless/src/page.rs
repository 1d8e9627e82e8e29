//! Page - A document open in the engine

use std::rc::Rc;

use fos_bindings::{HostContext, HostEnvironment, HostObject, HostValue, PropertyValue, SetOutcome};
use fos_dom::{Document, LiveCollection, NodeId};

use crate::HeadlessResult;

/// A loaded document together with its binding environment.
///
/// Host objects handed out by a page stay tied to its document; event
/// listeners registered through them stop running once the page is
/// dropped.
pub struct Page {
    document: Document,
    env: Rc<HostEnvironment>,
}

impl Page {
    pub(crate) fn new(document: Document, env: Rc<HostEnvironment>) -> Self {
        Self { document, env }
    }

    pub fn url(&self) -> &str {
        self.document.url()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Close the page, keeping its document. Script listeners registered
    /// through this page no longer run.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Get the page title
    pub fn title(&self) -> String {
        self.document.title()
    }

    pub fn env(&self) -> &Rc<HostEnvironment> {
        &self.env
    }

    /// Bridge context over this page's tree
    pub fn context(&mut self) -> HostContext<'_> {
        HostContext::new(self.document.tree_mut(), self.env.clone())
    }

    /// Script wrapper for `node`
    pub fn host_object(&mut self, node: NodeId) -> HeadlessResult<Rc<HostObject>> {
        Ok(self.context().wrap_node(node)?)
    }

    /// Script wrapper for the document node
    pub fn document_object(&mut self) -> HeadlessResult<Rc<HostObject>> {
        self.host_object(NodeId::ROOT)
    }

    /// Read `name` from `object`
    pub fn get(&mut self, object: &Rc<HostObject>, name: &str) -> HeadlessResult<PropertyValue> {
        Ok(self.context().get_property(object, name)?)
    }

    /// Assign `name` on `object`
    pub fn set(&mut self, object: &Rc<HostObject>, name: &str, value: HostValue) -> HeadlessResult<SetOutcome> {
        Ok(self.context().set_property(object, name, value)?)
    }

    /// Call method `name` on `object`
    pub fn call(&mut self, object: &Rc<HostObject>, name: &str, args: &[HostValue]) -> HeadlessResult<HostValue> {
        Ok(self.context().call_method(object, name, args)?)
    }

    /// Live collection rooted at the document, with the configured post-filters
    pub fn collection(&self, expression: &str) -> HeadlessResult<LiveCollection> {
        let options = self.env.collection_options().clone();
        Ok(LiveCollection::with_options(self.document.tree(), NodeId::ROOT, expression, options)?)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url())
            .field("nodes", &self.document.tree().len())
            .finish()
    }
}
