//! Mutation Notification
//!
//! Synchronous publish/subscribe for structural and attribute changes.
//! The tree owns the subscriber list and only holds weak references, so
//! an abandoned subscriber simply stops receiving notifications and is
//! pruned on the next delivery.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::{DomTree, NodeId};

/// A single change applied to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// `node` was attached under `parent`
    NodeAdded { node: NodeId, parent: NodeId },
    /// `node` was detached from `old_parent`
    NodeRemoved { node: NodeId, old_parent: NodeId },
    /// An attribute on `element` was set or removed
    AttributeChanged {
        element: NodeId,
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    ChildList,
    Attributes,
}

impl MutationRecord {
    /// The node whose contents changed: the parent for structural
    /// changes, the element for attribute changes.
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::NodeAdded { parent, .. } => *parent,
            MutationRecord::NodeRemoved { old_parent, .. } => *old_parent,
            MutationRecord::AttributeChanged { element, .. } => *element,
        }
    }

    pub fn mutation_type(&self) -> MutationType {
        match self {
            MutationRecord::AttributeChanged { .. } => MutationType::Attributes,
            _ => MutationType::ChildList,
        }
    }
}

/// Receives mutation notifications.
///
/// Called after the tree has fully applied the change, with the tree
/// borrowed immutably for the duration of the call.
pub trait MutationListener {
    fn on_mutation(&self, tree: &DomTree, record: &MutationRecord);
}

/// Which changes a subscription cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScope {
    /// Every change anywhere in the tree
    Tree,
    /// Changes whose target is this node or one of its descendants
    Subtree(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    scope: ListenerScope,
    listener: Weak<dyn MutationListener>,
}

/// Subscriber list owned by a tree
#[derive(Default)]
pub struct MutationNotifier {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
}

impl MutationNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Only a weak reference is kept.
    pub fn subscribe<L>(&self, scope: ListenerScope, listener: &Rc<L>) -> SubscriptionId
    where
        L: MutationListener + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let weak: Weak<L> = Rc::downgrade(listener);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            scope,
            listener: weak,
        });
        tracing::trace!(?scope, id = id.0, "mutation listener subscribed");
        id
    }

    /// Drop a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Number of subscriptions whose listener is still alive
    pub fn live_count(&self) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.listener.strong_count() > 0)
            .count()
    }

    /// Upgrade live listeners in registration order, pruning dead ones.
    pub(crate) fn snapshot(&self) -> Vec<(ListenerScope, Rc<dyn MutationListener>)> {
        let mut subs = self.subscriptions.borrow_mut();
        let mut live = Vec::with_capacity(subs.len());
        subs.retain(|s| match s.listener.upgrade() {
            Some(listener) => {
                live.push((s.scope, listener));
                true
            }
            None => false,
        });
        live
    }
}

impl std::fmt::Debug for MutationNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationNotifier")
            .field("subscriptions", &self.subscriptions.borrow().len())
            .finish()
    }
}

/// Mutation observer options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

/// Record-queue observer in the style of the DOM `MutationObserver`.
///
/// Matching records are queued and handed out by [`take_records`].
///
/// [`take_records`]: MutationObserver::take_records
#[derive(Debug, Default)]
pub struct MutationObserver {
    observed: RefCell<Vec<(NodeId, MutationObserverInit)>>,
    subscription: Cell<Option<SubscriptionId>>,
    records: RefCell<Vec<MutationRecord>>,
}

impl MutationObserver {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Start observing `target`. Observing the same node again replaces
    /// its options.
    pub fn observe(self: &Rc<Self>, tree: &DomTree, target: NodeId, options: MutationObserverInit) {
        {
            let mut observed = self.observed.borrow_mut();
            match observed.iter_mut().find(|(id, _)| *id == target) {
                Some(entry) => entry.1 = options,
                None => observed.push((target, options)),
            }
        }
        if self.subscription.get().is_none() {
            let id = tree.notifier().subscribe(ListenerScope::Tree, self);
            self.subscription.set(Some(id));
        }
    }

    pub fn disconnect(&self, tree: &DomTree) {
        if let Some(id) = self.subscription.take() {
            tree.notifier().unsubscribe(id);
        }
        self.observed.borrow_mut().clear();
        self.records.borrow_mut().clear();
    }

    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    fn wants(&self, tree: &DomTree, record: &MutationRecord) -> Option<bool> {
        let target = record.target();
        let observed = self.observed.borrow();
        for (node, init) in observed.iter() {
            let in_scope = *node == target || (init.subtree && tree.is_ancestor_of(*node, target));
            if !in_scope {
                continue;
            }
            match record {
                MutationRecord::AttributeChanged { name, .. } => {
                    if !init.attributes {
                        continue;
                    }
                    if let Some(filter) = &init.attribute_filter {
                        if !filter.iter().any(|f| f == name) {
                            continue;
                        }
                    }
                    return Some(init.attribute_old_value);
                }
                _ => {
                    if init.child_list {
                        return Some(false);
                    }
                }
            }
        }
        None
    }
}

impl MutationListener for MutationObserver {
    fn on_mutation(&self, tree: &DomTree, record: &MutationRecord) {
        let Some(keep_old_value) = self.wants(tree, record) else {
            return;
        };
        let mut record = record.clone();
        if let MutationRecord::AttributeChanged { old_value, .. } = &mut record {
            if !keep_old_value {
                *old_value = None;
            }
        }
        self.records.borrow_mut().push(record);
    }
}
