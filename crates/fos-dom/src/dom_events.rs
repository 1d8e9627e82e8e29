//! DOM Events
//!
//! Per-node listener tables and three-phase (capture, target, bubble)
//! dispatch. The propagation path is snapshotted before the first
//! listener runs, so handlers may mutate the tree freely.

use std::collections::HashMap;
use std::rc::Rc;

use crate::operations::DomResult;
use crate::{DomError, DomTree, NodeId};

/// Phase an event is currently in, numbered as `Event.eventPhase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None = 0,
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

/// Lifecycle of an event object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    NotStarted,
    Capturing,
    AtTarget,
    Bubbling,
    Done,
}

/// Construction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
}

impl EventInit {
    /// Defaults browsers use for well-known event types
    pub fn for_type(event_type: &str) -> Self {
        let bubbles = !matches!(
            event_type,
            "load" | "unload" | "focus" | "blur" | "mouseenter" | "mouseleave"
        );
        let cancelable = !matches!(event_type, "change" | "load" | "unload" | "focus" | "blur");
        Self { bubbles, cancelable }
    }
}

/// A single-use event
#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
    phase: EventPhase,
    state: DispatchState,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_stopped: bool,
    in_passive_listener: bool,
    key: Option<String>,
}

impl Event {
    pub fn new(event_type: &str, init: EventInit) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            target: None,
            current_target: None,
            phase: EventPhase::None,
            state: DispatchState::NotStarted,
            default_prevented: false,
            propagation_stopped: false,
            immediate_stopped: false,
            in_passive_listener: false,
            key: None,
        }
    }

    /// Event with the default flags for its type
    pub fn for_type(event_type: &str) -> Self {
        Self::new(event_type, EventInit::for_type(event_type))
    }

    /// Attach the key value carried by keyboard events
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Cancel the default action. No-op for non-cancelable events and
    /// inside passive listeners.
    pub fn prevent_default(&mut self) {
        if self.cancelable && !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    /// Finish the current node, then stop
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stop without running the remaining listeners on the current node
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

// ============================================================================
// Handlers and listener tables
// ============================================================================

/// How a handler finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Normal,
    /// Handler returned a falsy value; cancels cancelable events
    Falsy,
}

/// A handler raised instead of completing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DomError> for HandlerError {
    fn from(err: DomError) -> Self {
        Self::new(err.to_string())
    }
}

pub type HandlerResult = Result<Completion, HandlerError>;

/// Callable stored in a listener table
pub trait EventHandler {
    fn handle_event(&self, tree: &mut DomTree, event: &mut Event) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&mut DomTree, &mut Event) -> HandlerResult,
{
    fn handle_event(&self, tree: &mut DomTree, event: &mut Event) -> HandlerResult {
        self(tree, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerOptions {
    pub capture: bool,
    /// Remove after the first invocation
    pub once: bool,
    /// `prevent_default` is ignored
    pub passive: bool,
}

impl ListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
pub struct RegisteredListener {
    id: ListenerId,
    handler: Rc<dyn EventHandler>,
    options: ListenerOptions,
}

impl RegisteredListener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn options(&self) -> ListenerOptions {
        self.options
    }

    pub fn handler(&self) -> &Rc<dyn EventHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for RegisteredListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish()
    }
}

/// Listeners of one node, keyed by event type
#[derive(Debug, Clone, Default)]
pub struct ListenerTable {
    by_type: HashMap<String, Vec<RegisteredListener>>,
}

impl ListenerTable {
    fn for_type(&self, event_type: &str) -> &[RegisteredListener] {
        self.by_type.get(event_type).map(Vec::as_slice).unwrap_or(&[])
    }

    fn contains(&self, event_type: &str, id: ListenerId) -> bool {
        self.for_type(event_type).iter().any(|l| l.id == id)
    }

    fn remove_id(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        for list in self.by_type.values_mut() {
            let before = list.len();
            list.retain(|l| l.id != id);
            removed |= list.len() != before;
        }
        self.by_type.retain(|_, list| !list.is_empty());
        removed
    }
}

fn same_handler(a: &Rc<dyn EventHandler>, b: &Rc<dyn EventHandler>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Dispatch failures
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event '{event_type}' has already been dispatched")]
    AlreadyDispatched { event_type: String },

    #[error("event '{event_type}' is being dispatched")]
    DispatchInProgress { event_type: String },

    /// Every listener still ran; these are the ones that raised
    #[error("{} handler(s) failed while dispatching '{event_type}'", .failures.len())]
    HandlerFailed {
        event_type: String,
        failures: Vec<HandlerError>,
    },
}

// ============================================================================
// Registration
// ============================================================================

impl DomTree {
    /// Register `handler` for `event_type` on `node`. Registering the
    /// same handler again with the same capture flag returns the existing
    /// id.
    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        handler: Rc<dyn EventHandler>,
        options: ListenerOptions,
    ) -> DomResult<ListenerId> {
        self.node(node)?;
        let existing = self
            .event_listeners(node, event_type)
            .iter()
            .find(|l| l.options.capture == options.capture && same_handler(&l.handler, &handler))
            .map(|l| l.id);
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = ListenerId(self.next_listener_id());
        let table = self.node_mut(node)?.listeners.get_or_insert_with(Default::default);
        table
            .by_type
            .entry(event_type.to_string())
            .or_default()
            .push(RegisteredListener { id, handler, options });
        tracing::trace!(%node, event_type, ?options, "listener added");
        Ok(id)
    }

    /// Remove a registration by handler identity and capture flag
    pub fn remove_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        handler: &Rc<dyn EventHandler>,
        capture: bool,
    ) -> DomResult<bool> {
        let id = self
            .event_listeners(node, event_type)
            .iter()
            .find(|l| l.options.capture == capture && same_handler(&l.handler, handler))
            .map(|l| l.id);
        match id {
            Some(id) => self.remove_listener(node, id),
            None => Ok(false),
        }
    }

    pub fn remove_listener(&mut self, node: NodeId, id: ListenerId) -> DomResult<bool> {
        self.node(node)?;
        Ok(self.take_listener(node, id))
    }

    /// Drop registration `id` from `node`; false when either is gone
    fn take_listener(&mut self, node: NodeId, id: ListenerId) -> bool {
        let Some(n) = self.get_mut(node) else {
            return false;
        };
        let Some(table) = n.listeners.as_mut() else {
            return false;
        };
        let removed = table.remove_id(id);
        if table.by_type.is_empty() {
            n.listeners = None;
        }
        removed
    }

    /// Listeners for one type, in registration order
    pub fn event_listeners(&self, node: NodeId, event_type: &str) -> &[RegisteredListener] {
        self.get(node)
            .and_then(|n| n.listeners.as_deref())
            .map(|t| t.for_type(event_type))
            .unwrap_or(&[])
    }

    pub fn has_event_listeners(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(|n| n.listeners.is_some())
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Event dispatcher trait
pub trait EventDispatcher {
    /// Run `event` through capture, target and bubble phases at `target`.
    ///
    /// Returns `Ok(true)` when the default action should proceed.
    fn dispatch_event(&mut self, target: NodeId, event: &mut Event) -> DomResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerFilter {
    CaptureOnly,
    All,
    BubbleOnly,
}

impl EventDispatcher for DomTree {
    fn dispatch_event(&mut self, target: NodeId, event: &mut Event) -> DomResult<bool> {
        self.node(target)?;
        match event.state {
            DispatchState::NotStarted => {}
            DispatchState::Done => {
                return Err(EventError::AlreadyDispatched {
                    event_type: event.event_type.clone(),
                }
                .into());
            }
            _ => {
                return Err(EventError::DispatchInProgress {
                    event_type: event.event_type.clone(),
                }
                .into());
            }
        }

        // Root first
        let mut path: Vec<NodeId> = self.ancestors(target).collect();
        path.reverse();
        tracing::debug!(event = %event.event_type, %target, depth = path.len(), "dispatching event");

        event.target = Some(target);
        let mut failures = Vec::new();

        event.state = DispatchState::Capturing;
        event.phase = EventPhase::Capturing;
        for &node in &path {
            if event.propagation_stopped {
                break;
            }
            self.invoke_listeners(node, event, ListenerFilter::CaptureOnly, &mut failures);
        }

        if !event.propagation_stopped {
            event.state = DispatchState::AtTarget;
            event.phase = EventPhase::AtTarget;
            self.invoke_listeners(target, event, ListenerFilter::All, &mut failures);
        }

        if event.bubbles {
            event.state = DispatchState::Bubbling;
            event.phase = EventPhase::Bubbling;
            for &node in path.iter().rev() {
                if event.propagation_stopped {
                    break;
                }
                self.invoke_listeners(node, event, ListenerFilter::BubbleOnly, &mut failures);
            }
        }

        event.state = DispatchState::Done;
        event.phase = EventPhase::None;
        event.current_target = None;

        if !failures.is_empty() {
            return Err(EventError::HandlerFailed {
                event_type: event.event_type.clone(),
                failures,
            }
            .into());
        }
        Ok(!event.default_prevented)
    }
}

impl DomTree {
    fn invoke_listeners(
        &mut self,
        node: NodeId,
        event: &mut Event,
        filter: ListenerFilter,
        failures: &mut Vec<HandlerError>,
    ) {
        // Listeners added during this node's turn do not run
        let listeners: Vec<RegisteredListener> = self.event_listeners(node, &event.event_type).to_vec();
        if listeners.is_empty() {
            return;
        }
        event.current_target = Some(node);
        for listener in listeners {
            let wanted = match filter {
                ListenerFilter::CaptureOnly => listener.options.capture,
                ListenerFilter::BubbleOnly => !listener.options.capture,
                ListenerFilter::All => true,
            };
            if !wanted {
                continue;
            }
            // Removed by an earlier handler
            let still_registered = self
                .get(node)
                .and_then(|n| n.listeners.as_deref())
                .is_some_and(|t| t.contains(&event.event_type, listener.id));
            if !still_registered {
                continue;
            }
            if listener.options.once {
                self.take_listener(node, listener.id);
            }

            event.in_passive_listener = listener.options.passive;
            let result = listener.handler.handle_event(self, event);
            match result {
                Ok(Completion::Normal) => {}
                Ok(Completion::Falsy) => event.prevent_default(),
                Err(err) => {
                    tracing::warn!(event = %event.event_type, %node, error = %err, "event handler failed");
                    failures.push(err);
                }
            }
            event.in_passive_listener = false;
            event.current_target = Some(node);

            if event.immediate_stopped {
                break;
            }
        }
    }
}
