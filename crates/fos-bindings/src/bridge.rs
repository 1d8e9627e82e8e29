//! Property dispatch bridge
//!
//! The script host calls into [`HostContext`] on every property access
//! against a DOM-backed object. Resolution goes through the shared
//! [`PropertyRegistry`] for the object's dynamic kind; collections fall
//! back to index and name lookups; anything else is reported as
//! `NotFound` so the embedding object system can apply its own rules.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use fos_dom::{
    CollectionOptions, Completion, DomError, DomTree, Event, EventHandler, HandlerError,
    HandlerResult, LiveCollection, NamedItem, NodeId, PathQuery,
};
use tracing::{debug, trace};

use crate::error::{BindingResult, ScriptError};
use crate::kind::HostKind;
use crate::profile::Profile;
use crate::registry::{GetResolution, HostFunction, PropertyRegistry, SetResolution};
use crate::value::{HostObject, HostTarget, HostValue};

/// Result of a property read
#[derive(Clone)]
pub enum PropertyValue {
    Value(HostValue),
    Function(HostFunction),
    /// Nothing matched; the embedding applies its own fallback
    NotFound,
}

impl PropertyValue {
    /// Flatten into a script value; `NotFound` reads as `undefined`.
    pub fn into_value(self) -> HostValue {
        match self {
            PropertyValue::Value(v) => v,
            PropertyValue::Function(f) => HostValue::Function(f),
            PropertyValue::NotFound => HostValue::Undefined,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, PropertyValue::NotFound)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            PropertyValue::Function(_) => f.write_str("Function(..)"),
            PropertyValue::NotFound => f.write_str("NotFound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    NotFound,
}

// ============================================================================
// Environment
// ============================================================================

/// Per-document binding state: the shared registry, the post-processing
/// applied to collections handed to scripts, and the event handlers
/// created for script functions.
pub struct HostEnvironment {
    registry: Rc<PropertyRegistry>,
    collection_options: CollectionOptions,
    /// Keyed by function address; a listener table keeps each handler
    /// (and so its function) alive while it is registered
    handlers: RefCell<HashMap<*const (), Weak<dyn EventHandler>>>,
}

impl HostEnvironment {
    pub fn new(registry: Rc<PropertyRegistry>) -> Self {
        Self {
            registry,
            collection_options: CollectionOptions::default(),
            handlers: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_collection_options(mut self, options: CollectionOptions) -> Self {
        self.collection_options = options;
        self
    }

    pub fn registry(&self) -> &Rc<PropertyRegistry> {
        &self.registry
    }

    pub fn profile(&self) -> &Profile {
        self.registry.profile()
    }

    pub fn collection_options(&self) -> &CollectionOptions {
        &self.collection_options
    }

    /// Event handler standing for `function`. The same function maps to
    /// the same handler while that handler is registered somewhere, so
    /// registering it twice is a no-op.
    pub fn script_handler(self: &Rc<Self>, function: &HostFunction) -> Rc<dyn EventHandler> {
        if let Some(handler) = self.find_script_handler(function) {
            return handler;
        }
        let handler: Rc<dyn EventHandler> = Rc::new(ScriptListener {
            env: Rc::downgrade(self),
            function: function.clone(),
        });
        let mut handlers = self.handlers.borrow_mut();
        handlers.retain(|_, h| h.strong_count() > 0);
        handlers.insert(function_key(function), Rc::downgrade(&handler));
        handler
    }

    /// Handler already standing for `function`, if it is still registered
    pub fn find_script_handler(&self, function: &HostFunction) -> Option<Rc<dyn EventHandler>> {
        self.handlers.borrow().get(&function_key(function)).and_then(Weak::upgrade)
    }

    /// Script handlers still referenced by some listener table
    pub fn live_handlers(&self) -> usize {
        self.handlers.borrow().values().filter(|h| h.strong_count() > 0).count()
    }
}

fn function_key(function: &HostFunction) -> *const () {
    Rc::as_ptr(function).cast::<()>()
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEnvironment")
            .field("registry", &self.registry)
            .field("collection_options", &self.collection_options)
            .field("handlers", &self.live_handlers())
            .finish()
    }
}

/// Runs a script function as an event listener. `this` is the current
/// target and the only argument is the event type; returning `false`
/// cancels the event.
struct ScriptListener {
    env: Weak<HostEnvironment>,
    function: HostFunction,
}

impl EventHandler for ScriptListener {
    fn handle_event(&self, tree: &mut DomTree, event: &mut Event) -> HandlerResult {
        let Some(env) = self.env.upgrade() else {
            trace!(event = event.event_type(), "script environment gone; listener skipped");
            return Ok(Completion::Normal);
        };
        let Some(current) = event.current_target() else {
            return Ok(Completion::Normal);
        };
        let mut cx = HostContext::new(tree, env);
        let this = cx.wrap_node(current).map_err(|e| HandlerError::new(e.to_string()))?;
        let args = [HostValue::from(event.event_type())];
        let result = (self.function)(&mut cx, &HostValue::Object(this), &args)
            .map_err(|e| HandlerError::new(e.to_string()))?;
        Ok(if result == HostValue::Bool(false) {
            Completion::Falsy
        } else {
            Completion::Normal
        })
    }
}

// ============================================================================
// Context
// ============================================================================

/// Borrowed view the script host works through for one call
pub struct HostContext<'a> {
    tree: &'a mut DomTree,
    env: Rc<HostEnvironment>,
}

impl<'a> HostContext<'a> {
    pub fn new(tree: &'a mut DomTree, env: Rc<HostEnvironment>) -> Self {
        Self { tree, env }
    }

    pub fn tree(&self) -> &DomTree {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut *self.tree
    }

    pub fn env(&self) -> &Rc<HostEnvironment> {
        &self.env
    }

    pub fn profile(&self) -> &Profile {
        self.env.profile()
    }

    /// Script object for `node`, created on first access and cached in
    /// the node's binding slot.
    pub fn wrap_node(&mut self, node: NodeId) -> BindingResult<Rc<HostObject>> {
        let bound = match self.tree.host_object(node) {
            Some(existing) => existing,
            None => {
                let kind = HostKind::for_node(&*self.tree, node).ok_or(DomError::UnknownNode(node))?;
                trace!(%node, %kind, "materializing host object");
                let object: Rc<dyn Any> = Rc::new(HostObject::new(kind, HostTarget::Node(node)));
                self.tree.bind_host_object(node, object)?
            }
        };
        bound
            .downcast::<HostObject>()
            .map_err(|_| ScriptError::TypeError(format!("node {node} is bound to a foreign object")))
    }

    /// `null` for `None`, the wrapped node otherwise
    pub fn node_value(&mut self, node: Option<NodeId>) -> BindingResult<HostValue> {
        match node {
            Some(id) => Ok(HostValue::Object(self.wrap_node(id)?)),
            None => Ok(HostValue::Null),
        }
    }

    pub fn wrap_collection(&self, collection: LiveCollection) -> Rc<HostObject> {
        Rc::new(HostObject::new(
            HostKind::HtmlCollection,
            HostTarget::Collection(collection),
        ))
    }

    /// Live collection for `expression` under `root`, post-processed the
    /// way this environment is configured.
    pub fn collection(&self, root: NodeId, expression: &str) -> BindingResult<LiveCollection> {
        let query = PathQuery::parse(expression)?;
        Ok(self.collection_for(root, query))
    }

    pub fn collection_for(&self, root: NodeId, query: PathQuery) -> LiveCollection {
        LiveCollection::from_query(&*self.tree, root, query, self.env.collection_options.clone())
    }

    pub fn collection_value(&self, root: NodeId, expression: &str) -> BindingResult<HostValue> {
        let collection = self.collection(root, expression)?;
        Ok(HostValue::Object(self.wrap_collection(collection)))
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub fn get_property(&mut self, object: &Rc<HostObject>, name: &str) -> BindingResult<PropertyValue> {
        match self.env.registry.resolve_get(object.kind(), name) {
            GetResolution::Data(getter) => Ok(PropertyValue::Value(getter(self, object)?)),
            GetResolution::Function(function) => Ok(PropertyValue::Function(function)),
            GetResolution::NotFound => match object.collection() {
                Some(collection) => self.collection_fallback(collection, name),
                None => {
                    debug!(kind = %object.kind(), name, "property not found");
                    Ok(PropertyValue::NotFound)
                }
            },
        }
    }

    /// Index lookup, then name lookup
    fn collection_fallback(&mut self, collection: &LiveCollection, name: &str) -> BindingResult<PropertyValue> {
        if let Ok(index) = name.parse::<usize>() {
            return match collection.item(&*self.tree, index)? {
                Some(node) => Ok(PropertyValue::Value(HostValue::Object(self.wrap_node(node)?))),
                None => Ok(PropertyValue::NotFound),
            };
        }
        match collection.named_item(&*self.tree, name)? {
            NamedItem::Element(node) => Ok(PropertyValue::Value(HostValue::Object(self.wrap_node(node)?))),
            NamedItem::Collection(sub) => Ok(PropertyValue::Value(HostValue::Object(self.wrap_collection(sub)))),
            NamedItem::NotFound => {
                debug!(name, "collection member not found");
                Ok(PropertyValue::NotFound)
            }
        }
    }

    pub fn set_property(&mut self, object: &Rc<HostObject>, name: &str, value: HostValue) -> BindingResult<SetOutcome> {
        match self.env.registry.resolve_set(object.kind(), name) {
            SetResolution::Setter(setter) => {
                setter(self, object, value)?;
                Ok(SetOutcome::Applied)
            }
            SetResolution::NotFound => Ok(SetOutcome::NotFound),
        }
    }

    /// Look `name` up and call it with `object` as `this`
    pub fn call_method(&mut self, object: &Rc<HostObject>, name: &str, args: &[HostValue]) -> BindingResult<HostValue> {
        let function = match self.get_property(object, name)? {
            PropertyValue::Function(f) => f,
            PropertyValue::Value(HostValue::Function(f)) => f,
            _ => {
                return Err(ScriptError::TypeError(format!(
                    "{}.{name} is not a function",
                    object.kind()
                )));
            }
        };
        self.call_function(&function, &HostValue::Object(object.clone()), args)
    }

    pub fn call_function(&mut self, function: &HostFunction, this: &HostValue, args: &[HostValue]) -> BindingResult<HostValue> {
        function(self, this, args)
    }
}

impl fmt::Debug for HostContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("nodes", &self.tree.len())
            .field("env", &self.env)
            .finish()
    }
}
