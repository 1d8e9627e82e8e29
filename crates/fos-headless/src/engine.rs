//! Engine - Main entry point

use std::rc::Rc;

use fos_bindings::{HostEnvironment, PropertyRegistry, RegistryBuilder, standard};
use fos_dom::Document;

use crate::{Config, HeadlessResult, Page};

/// The fOS headless engine.
///
/// Builds the property registry once for the configured profile; every
/// page shares it.
pub struct Engine {
    config: Config,
    registry: Rc<PropertyRegistry>,
}

impl Engine {
    /// Create a new engine with the standard descriptor set
    pub fn new(config: Config) -> HeadlessResult<Self> {
        Self::with_registry(config, &standard::builder())
    }

    /// Create an engine from a custom descriptor set
    pub fn with_registry(config: Config, builder: &RegistryBuilder) -> HeadlessResult<Self> {
        let registry = builder.build(&config.profile())?;
        tracing::info!(
            profile = %config.profile.name,
            descriptors = builder.len(),
            "fOS Headless {} initialized",
            crate::VERSION
        );
        Ok(Self {
            config,
            registry: Rc::new(registry),
        })
    }

    /// Open a page holding an empty `html`/`head`/`body` document
    pub fn new_page(&self, url: &str) -> Page {
        self.load(Document::new(url))
    }

    /// Open a page over an already built document
    pub fn load(&self, document: Document) -> Page {
        tracing::info!("Loading: {}", document.url());
        let env = HostEnvironment::new(self.registry.clone())
            .with_collection_options(self.config.collection_options());
        Page::new(document, Rc::new(env))
    }

    /// Get engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Rc<PropertyRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("profile", self.registry.profile())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_share_registry() {
        let engine = Engine::new(Config::default()).unwrap();
        let a = engine.new_page("about:a");
        let b = engine.new_page("about:b");
        assert!(Rc::ptr_eq(a.env().registry(), b.env().registry()));
        assert!(Rc::ptr_eq(a.env().registry(), engine.registry()));
        assert_eq!(b.url(), "about:b");
    }
}
