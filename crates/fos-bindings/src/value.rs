//! Script host values
//!
//! The value vocabulary exchanged with the embedded script host. Objects
//! are shared handles onto DOM state, so equality on them is identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use fos_dom::{LiveCollection, NodeId};

use crate::HostKind;
use crate::registry::HostFunction;

#[derive(Clone, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Rc<HostObject>),
    Function(HostFunction),
}

impl HostValue {
    /// Wrap a native function
    pub fn function(
        f: impl Fn(&mut crate::HostContext<'_>, &HostValue, &[HostValue]) -> crate::BindingResult<HostValue> + 'static,
    ) -> Self {
        HostValue::Function(crate::registry::host_function(f))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null | HostValue::Object(_) => "object",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Null => false,
            HostValue::Bool(b) => *b,
            HostValue::Number(n) => *n != 0.0 && !n.is_nan(),
            HostValue::String(s) => !s.is_empty(),
            HostValue::Object(_) | HostValue::Function(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// String conversion the way the script host performs it
    pub fn to_display_string(&self) -> String {
        match self {
            HostValue::Undefined => "undefined".into(),
            HostValue::Null => "null".into(),
            HostValue::Bool(b) => b.to_string(),
            HostValue::Number(n) => format_number(*n),
            HostValue::String(s) => s.clone(),
            HostValue::Object(obj) => format!("[object {}]", obj.kind().name()),
            HostValue::Function(_) => "function () { [native code] }".into(),
        }
    }

    /// Numeric conversion the way the script host performs it
    pub fn to_number(&self) -> f64 {
        match self {
            HostValue::Undefined | HostValue::Object(_) | HostValue::Function(_) => f64::NAN,
            HostValue::Null => 0.0,
            HostValue::Bool(b) => f64::from(u8::from(*b)),
            HostValue::Number(n) => *n,
            HostValue::String(s) => {
                let s = s.trim();
                if s.is_empty() { 0.0 } else { s.parse().unwrap_or(f64::NAN) }
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<HostObject>> {
        match self {
            HostValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Node behind an object value
    pub fn as_node(&self) -> Option<NodeId> {
        self.as_object().and_then(|obj| obj.node())
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => Rc::ptr_eq(a, b),
            (HostValue::Function(a), HostValue::Function(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("Undefined"),
            HostValue::Null => f.write_str("Null"),
            HostValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            HostValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            HostValue::String(s) => f.debug_tuple("String").field(s).finish(),
            HostValue::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
            HostValue::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .finish()
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<usize> for HostValue {
    fn from(n: usize) -> Self {
        HostValue::Number(n as f64)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<Option<String>> for HostValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(HostValue::Null, HostValue::String)
    }
}

/// What a host object stands for
#[derive(Debug, Clone)]
pub enum HostTarget {
    Node(NodeId),
    Collection(LiveCollection),
}

/// Script-visible wrapper around a node or a live collection.
///
/// Node wrappers are created once per node and cached in the node's
/// binding slot, so wrapping the same node twice yields the same object.
pub struct HostObject {
    kind: HostKind,
    target: HostTarget,
    /// Child-list collections handed out for this node, by query text
    child_lists: RefCell<Vec<(&'static str, Weak<HostObject>)>>,
}

impl HostObject {
    pub(crate) fn new(kind: HostKind, target: HostTarget) -> Self {
        Self {
            kind,
            target,
            child_lists: RefCell::new(Vec::new()),
        }
    }

    /// Child-list object previously handed out for `expression`, while
    /// the script still holds it
    pub(crate) fn cached_child_list(&self, expression: &str) -> Option<Rc<HostObject>> {
        self.child_lists
            .borrow()
            .iter()
            .find(|(e, _)| *e == expression)
            .and_then(|(_, list)| list.upgrade())
    }

    pub(crate) fn cache_child_list(&self, expression: &'static str, list: &Rc<HostObject>) {
        let mut lists = self.child_lists.borrow_mut();
        lists.retain(|(e, list)| *e != expression && list.strong_count() > 0);
        lists.push((expression, Rc::downgrade(list)));
    }

    pub fn kind(&self) -> HostKind {
        self.kind
    }

    pub fn target(&self) -> &HostTarget {
        &self.target
    }

    pub fn node(&self) -> Option<NodeId> {
        match &self.target {
            HostTarget::Node(id) => Some(*id),
            HostTarget::Collection(_) => None,
        }
    }

    pub fn collection(&self) -> Option<&LiveCollection> {
        match &self.target {
            HostTarget::Collection(c) => Some(c),
            HostTarget::Node(_) => None,
        }
    }
}
