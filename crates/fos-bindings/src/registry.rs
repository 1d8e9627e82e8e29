//! Property descriptor registry
//!
//! Descriptors are declared per [`HostKind`] on a [`RegistryBuilder`] and
//! frozen into a [`PropertyRegistry`] for one [`Profile`]. The registry
//! is immutable after `build`; the only interior state is the lazily
//! flattened per-kind view, which is never invalidated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bridge::HostContext;
use crate::error::{BindingResult, ConfigurationError};
use crate::kind::HostKind;
use crate::profile::{Enablement, Profile};
use crate::value::{HostObject, HostValue};

/// Reads a data property
pub type Getter = Rc<dyn Fn(&mut HostContext<'_>, &HostObject) -> BindingResult<HostValue>>;

/// Writes a data property
pub type Setter = Rc<dyn Fn(&mut HostContext<'_>, &HostObject, HostValue) -> BindingResult<()>>;

/// Callable exposed to scripts, invoked with `this` and arguments
pub type HostFunction = Rc<dyn Fn(&mut HostContext<'_>, &HostValue, &[HostValue]) -> BindingResult<HostValue>>;

pub fn host_function(
    f: impl Fn(&mut HostContext<'_>, &HostValue, &[HostValue]) -> BindingResult<HostValue> + 'static,
) -> HostFunction {
    Rc::new(f)
}

#[derive(Clone)]
enum Part {
    Getter(Getter),
    Setter(Setter),
    Function(HostFunction),
}

impl Part {
    fn label(&self) -> &'static str {
        match self {
            Part::Getter(_) => "getter",
            Part::Setter(_) => "setter",
            Part::Function(_) => "function",
        }
    }
}

#[derive(Clone)]
struct Declaration {
    kind: HostKind,
    name: String,
    part: Part,
    enablement: Enablement,
}

/// One resolved name on one kind
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    getter: Option<Getter>,
    setter: Option<Setter>,
    function: Option<HostFunction>,
}

impl PropertyDescriptor {
    pub fn is_function(&self) -> bool {
        self.function.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    /// Readable data property without a setter
    pub fn is_readonly(&self) -> bool {
        self.getter.is_some() && self.setter.is_none()
    }

    fn has_data(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("function", &self.function.is_some())
            .finish()
    }
}

/// Outcome of a read lookup
#[derive(Clone)]
pub enum GetResolution {
    Data(Getter),
    Function(HostFunction),
    NotFound,
}

impl GetResolution {
    pub fn is_found(&self) -> bool {
        !matches!(self, GetResolution::NotFound)
    }
}

impl fmt::Debug for GetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GetResolution::Data(_) => "Data",
            GetResolution::Function(_) => "Function",
            GetResolution::NotFound => "NotFound",
        })
    }
}

/// Outcome of a write lookup
#[derive(Clone)]
pub enum SetResolution {
    Setter(Setter),
    NotFound,
}

impl fmt::Debug for SetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SetResolution::Setter(_) => "Setter",
            SetResolution::NotFound => "NotFound",
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects descriptor declarations. One builder can produce registries
/// for several profiles.
#[derive(Clone, Default)]
pub struct RegistryBuilder {
    declarations: Vec<Declaration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn getter(
        &mut self,
        kind: HostKind,
        name: &str,
        f: impl Fn(&mut HostContext<'_>, &HostObject) -> BindingResult<HostValue> + 'static,
    ) -> &mut Self {
        self.getter_when(kind, name, Enablement::Always, f)
    }

    pub fn getter_when(
        &mut self,
        kind: HostKind,
        name: &str,
        enablement: Enablement,
        f: impl Fn(&mut HostContext<'_>, &HostObject) -> BindingResult<HostValue> + 'static,
    ) -> &mut Self {
        self.declare(kind, name, Part::Getter(Rc::new(f)), enablement)
    }

    pub fn setter(
        &mut self,
        kind: HostKind,
        name: &str,
        f: impl Fn(&mut HostContext<'_>, &HostObject, HostValue) -> BindingResult<()> + 'static,
    ) -> &mut Self {
        self.setter_when(kind, name, Enablement::Always, f)
    }

    pub fn setter_when(
        &mut self,
        kind: HostKind,
        name: &str,
        enablement: Enablement,
        f: impl Fn(&mut HostContext<'_>, &HostObject, HostValue) -> BindingResult<()> + 'static,
    ) -> &mut Self {
        self.declare(kind, name, Part::Setter(Rc::new(f)), enablement)
    }

    /// Getter and setter under one enablement
    pub fn accessor(
        &mut self,
        kind: HostKind,
        name: &str,
        get: impl Fn(&mut HostContext<'_>, &HostObject) -> BindingResult<HostValue> + 'static,
        set: impl Fn(&mut HostContext<'_>, &HostObject, HostValue) -> BindingResult<()> + 'static,
    ) -> &mut Self {
        self.accessor_when(kind, name, Enablement::Always, get, set)
    }

    pub fn accessor_when(
        &mut self,
        kind: HostKind,
        name: &str,
        enablement: Enablement,
        get: impl Fn(&mut HostContext<'_>, &HostObject) -> BindingResult<HostValue> + 'static,
        set: impl Fn(&mut HostContext<'_>, &HostObject, HostValue) -> BindingResult<()> + 'static,
    ) -> &mut Self {
        self.declare(kind, name, Part::Getter(Rc::new(get)), enablement.clone());
        self.declare(kind, name, Part::Setter(Rc::new(set)), enablement)
    }

    pub fn function(
        &mut self,
        kind: HostKind,
        name: &str,
        f: impl Fn(&mut HostContext<'_>, &HostValue, &[HostValue]) -> BindingResult<HostValue> + 'static,
    ) -> &mut Self {
        self.function_when(kind, name, Enablement::Always, f)
    }

    pub fn function_when(
        &mut self,
        kind: HostKind,
        name: &str,
        enablement: Enablement,
        f: impl Fn(&mut HostContext<'_>, &HostValue, &[HostValue]) -> BindingResult<HostValue> + 'static,
    ) -> &mut Self {
        self.declare(kind, name, Part::Function(Rc::new(f)), enablement)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    fn declare(&mut self, kind: HostKind, name: &str, part: Part, enablement: Enablement) -> &mut Self {
        self.declarations.push(Declaration {
            kind,
            name: name.to_string(),
            part,
            enablement,
        });
        self
    }

    /// Freeze the declarations enabled for `profile`.
    ///
    /// Fails when a name ends up as both a data property and a function
    /// on one kind, or when the same part is declared twice.
    pub fn build(&self, profile: &Profile) -> Result<PropertyRegistry, ConfigurationError> {
        let mut own: HashMap<HostKind, HashMap<String, PropertyDescriptor>> = HashMap::new();
        let mut enabled = 0usize;

        for decl in &self.declarations {
            if !decl.enablement.is_enabled(profile) {
                trace!(kind = %decl.kind, name = %decl.name, "descriptor disabled for profile");
                continue;
            }
            enabled += 1;
            let entry = own
                .entry(decl.kind)
                .or_default()
                .entry(decl.name.clone())
                .or_default();

            let conflict = match &decl.part {
                Part::Function(_) => entry.has_data(),
                Part::Getter(_) | Part::Setter(_) => entry.is_function(),
            };
            if conflict {
                return Err(ConfigurationError::Conflict {
                    kind: decl.kind,
                    name: decl.name.clone(),
                    profile: profile.name().to_string(),
                });
            }

            let slot_taken = match &decl.part {
                Part::Getter(g) => entry.getter.replace(g.clone()).is_some(),
                Part::Setter(s) => entry.setter.replace(s.clone()).is_some(),
                Part::Function(f) => entry.function.replace(f.clone()).is_some(),
            };
            if slot_taken {
                return Err(ConfigurationError::DuplicateDeclaration {
                    kind: decl.kind,
                    name: decl.name.clone(),
                    part: decl.part.label(),
                });
            }
        }

        debug!(profile = profile.name(), descriptors = enabled, "built property registry");
        Ok(PropertyRegistry {
            profile: profile.clone(),
            own,
            flattened: RefCell::new(HashMap::new()),
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

type DescriptorMap = HashMap<String, PropertyDescriptor>;

/// Immutable descriptor table for one profile
pub struct PropertyRegistry {
    profile: Profile,
    own: HashMap<HostKind, DescriptorMap>,
    /// Own descriptors merged with inherited ones, per kind
    flattened: RefCell<HashMap<HostKind, Rc<DescriptorMap>>>,
}

impl PropertyRegistry {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Descriptor for `name` as seen from `kind`; the most specific kind
    /// declaring the name wins as a whole.
    pub fn descriptor(&self, kind: HostKind, name: &str) -> Option<PropertyDescriptor> {
        self.table(kind).get(name).cloned()
    }

    /// Names visible on `kind`, sorted
    pub fn names(&self, kind: HostKind) -> Vec<String> {
        let mut names: Vec<String> = self.table(kind).keys().cloned().collect();
        names.sort();
        names
    }

    /// Names declared directly on `kind`
    pub fn own_names(&self, kind: HostKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .own
            .get(&kind)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn resolve_get(&self, kind: HostKind, name: &str) -> GetResolution {
        let table = self.table(kind);
        match table.get(name) {
            Some(PropertyDescriptor {
                function: Some(f), ..
            }) => GetResolution::Function(f.clone()),
            Some(PropertyDescriptor { getter: Some(g), .. }) => GetResolution::Data(g.clone()),
            _ => {
                debug!(%kind, name, "no readable descriptor");
                GetResolution::NotFound
            }
        }
    }

    /// Read-only properties and functions resolve to `NotFound`.
    pub fn resolve_set(&self, kind: HostKind, name: &str) -> SetResolution {
        match self.table(kind).get(name).and_then(|d| d.setter.clone()) {
            Some(s) => SetResolution::Setter(s),
            None => {
                debug!(%kind, name, "no writable descriptor");
                SetResolution::NotFound
            }
        }
    }

    fn table(&self, kind: HostKind) -> Rc<DescriptorMap> {
        if let Some(table) = self.flattened.borrow().get(&kind) {
            return table.clone();
        }
        let chain: Vec<HostKind> = kind.chain().collect();
        let mut merged = DescriptorMap::new();
        for k in chain.iter().rev() {
            if let Some(own) = self.own.get(k) {
                merged.extend(own.iter().map(|(n, d)| (n.clone(), d.clone())));
            }
        }
        trace!(%kind, names = merged.len(), "flattened descriptor table");
        let table = Rc::new(merged);
        self.flattened.borrow_mut().insert(kind, table.clone());
        table
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("profile", &self.profile.name())
            .field("kinds", &self.own.len())
            .finish()
    }
}
