//! Binding errors

use fos_dom::{DomError, QueryError};

use crate::HostKind;

/// Result type for script-facing operations
pub type BindingResult<T> = Result<T, ScriptError>;

/// Errors raised back into the script host
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("TypeError: {0}")]
    TypeError(String),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{0}")]
    Custom(String),
}

/// Descriptor registry problems, detected while building a registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The name is both a data property and a function
    #[error("'{name}' on {kind} is declared as both a property and a function for profile '{profile}'")]
    Conflict {
        kind: HostKind,
        name: String,
        profile: String,
    },

    #[error("'{name}' on {kind} declares the same {part} twice")]
    DuplicateDeclaration {
        kind: HostKind,
        name: String,
        part: &'static str,
    },
}
