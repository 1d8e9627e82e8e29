//! Headless engine errors

use fos_bindings::{ConfigurationError, ScriptError};
use fos_dom::{DomError, QueryError};

pub type HeadlessResult<T> = Result<T, HeadlessError>;

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("No element matches {0}")]
    ElementNotFound(String),
}
