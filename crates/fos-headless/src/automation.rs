//! Automation - Drive a page the way a user would
//!
//! Lookups resolve to the first match in document order. Input helpers
//! fire the same event sequence a browser fires, so page listeners can
//! observe and cancel them.

use fos_dom::{Event, EventDispatcher, NodeId, PathQuery};
use tracing::debug;

use crate::{HeadlessError, HeadlessResult, Page};

impl Page {
    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn find_by_id(&self, id: &str) -> HeadlessResult<NodeId> {
        self.document()
            .get_element_by_id(id)
            .ok_or_else(|| HeadlessError::ElementNotFound(format!("id '{id}'")))
    }

    /// First element whose `name` attribute is `name`
    pub fn find_by_name(&self, name: &str) -> HeadlessResult<NodeId> {
        let collection = self
            .document()
            .elements_by_name(name, self.env().collection_options().clone())?;
        collection
            .item(self.document().tree(), 0)?
            .ok_or_else(|| HeadlessError::ElementNotFound(format!("name '{name}'")))
    }

    pub fn find_by_tag(&self, tag: &str) -> HeadlessResult<NodeId> {
        self.find_all_by_tag(tag)?
            .first()
            .copied()
            .ok_or_else(|| HeadlessError::ElementNotFound(format!("tag '{tag}'")))
    }

    pub fn find_all_by_tag(&self, tag: &str) -> HeadlessResult<Vec<NodeId>> {
        let collection = self
            .document()
            .elements_by_tag_name(tag, self.env().collection_options().clone())?;
        Ok(collection.get(self.document().tree())?.to_vec())
    }

    /// First node matched by a path query evaluated from the document
    pub fn find_by_path(&self, expression: &str) -> HeadlessResult<NodeId> {
        let matches = PathQuery::parse(expression)?.evaluate(self.document().tree(), NodeId::ROOT)?;
        matches
            .first()
            .copied()
            .ok_or_else(|| HeadlessError::ElementNotFound(format!("path '{expression}'")))
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Fire one event at `target` with the default flags for its type.
    /// Returns whether the default action should run.
    pub fn fire(&mut self, target: NodeId, event_type: &str) -> HeadlessResult<bool> {
        self.dispatch(target, Event::for_type(event_type))
    }

    fn dispatch(&mut self, target: NodeId, mut event: Event) -> HeadlessResult<bool> {
        Ok(self.document_mut().tree_mut().dispatch_event(target, &mut event)?)
    }

    /// Press and release the primary button over `target`.
    ///
    /// Fires `mousedown`, `mouseup` and `click`; the result is the `click`
    /// outcome.
    pub fn click(&mut self, target: NodeId) -> HeadlessResult<bool> {
        debug!(%target, "click");
        self.fire(target, "mousedown")?;
        self.fire(target, "mouseup")?;
        self.fire(target, "click")
    }

    pub fn focus(&mut self, target: NodeId) -> HeadlessResult<()> {
        self.fire(target, "focus")?;
        Ok(())
    }

    pub fn blur(&mut self, target: NodeId) -> HeadlessResult<()> {
        self.fire(target, "blur")?;
        Ok(())
    }

    /// Type `text` into `target` one character at a time.
    ///
    /// Each character fires `keydown`, then `keypress` unless `keydown` was
    /// cancelled. When `keypress` goes through, the character is appended
    /// to the `value` attribute and `input` fires. `keyup` always fires.
    /// Returns the resulting value.
    pub fn type_text(&mut self, target: NodeId, text: &str) -> HeadlessResult<String> {
        debug!(%target, chars = text.chars().count(), "typing");
        for c in text.chars() {
            let key = c.to_string();
            let mut accepted = self.dispatch(target, Event::for_type("keydown").with_key(key.clone()))?;
            if accepted {
                accepted = self.dispatch(target, Event::for_type("keypress").with_key(key.clone()))?;
            }
            if accepted {
                let tree = self.document_mut().tree_mut();
                let mut value = tree.get_attribute(target, "value")?.unwrap_or("").to_string();
                value.push(c);
                tree.set_attribute(target, "value", &value)?;
                self.fire(target, "input")?;
            }
            self.dispatch(target, Event::for_type("keyup").with_key(key))?;
        }
        Ok(self
            .document()
            .tree()
            .get_attribute(target, "value")?
            .unwrap_or("")
            .to_string())
    }
}
