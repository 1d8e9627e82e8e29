//! fOS Bindings - Property Dispatch Bridge
//!
//! Connects an embedded script host to the fOS DOM without per-node
//! static bindings. Properties and functions are declared once per
//! [`HostKind`], frozen into a [`PropertyRegistry`] for a capability
//! [`Profile`], and resolved against the dynamic kind of each object.

mod bridge;
mod error;
mod kind;
mod profile;
mod registry;
pub mod standard;
mod value;

pub use bridge::{HostContext, HostEnvironment, PropertyValue, SetOutcome};
pub use error::{BindingResult, ConfigurationError, ScriptError};
pub use kind::HostKind;
pub use profile::{Enablement, Profile};
pub use registry::{
    GetResolution, Getter, HostFunction, PropertyDescriptor, PropertyRegistry, RegistryBuilder,
    SetResolution, Setter, host_function,
};
pub use value::{HostObject, HostTarget, HostValue};
