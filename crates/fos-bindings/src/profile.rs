//! Capability profiles
//!
//! A profile names the browser flavour a registry is built for and the
//! feature flags it enables. Descriptors consult it through
//! [`Enablement`].

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    name: String,
    features: BTreeSet<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: BTreeSet::new(),
        }
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }
}

/// When a descriptor is part of a registry
#[derive(Clone, Default)]
pub enum Enablement {
    #[default]
    Always,
    /// Only when the profile has this feature
    Feature(String),
    /// Only when the profile lacks this feature
    Unless(String),
    Predicate(Rc<dyn Fn(&Profile) -> bool>),
}

impl Enablement {
    pub fn feature(name: &str) -> Self {
        Enablement::Feature(name.to_string())
    }

    pub fn unless(name: &str) -> Self {
        Enablement::Unless(name.to_string())
    }

    pub fn predicate(f: impl Fn(&Profile) -> bool + 'static) -> Self {
        Enablement::Predicate(Rc::new(f))
    }

    pub fn is_enabled(&self, profile: &Profile) -> bool {
        match self {
            Enablement::Always => true,
            Enablement::Feature(f) => profile.has_feature(f),
            Enablement::Unless(f) => !profile.has_feature(f),
            Enablement::Predicate(p) => p(profile),
        }
    }
}

impl fmt::Debug for Enablement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Enablement::Always => f.write_str("Always"),
            Enablement::Feature(name) => f.debug_tuple("Feature").field(name).finish(),
            Enablement::Unless(name) => f.debug_tuple("Unless").field(name).finish(),
            Enablement::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
