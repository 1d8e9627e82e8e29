//! fOS Headless - Scriptable document engine
//!
//! Ties the document tree and the property dispatch bridge together
//! behind an [`Engine`] that opens [`Page`]s, plus helpers to drive a
//! page the way a user would.
//!
//! # Example
//!
//! ```rust,ignore
//! use fos_headless::{Config, Engine};
//!
//! let engine = Engine::new(Config::default())?;
//! let mut page = engine.new_page("about:blank");
//! let body = page.find_by_tag("body")?;
//! page.click(body)?;
//! ```

mod automation;
mod config;
mod engine;
mod error;
pub mod logging;
mod page;

pub use config::{CollectionFilterConfig, Config, ProfileConfig};
pub use engine::Engine;
pub use error::{HeadlessError, HeadlessResult};
pub use page::Page;

// Re-export sub-crates for advanced usage
pub use fos_bindings as bindings;
pub use fos_dom as dom;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
