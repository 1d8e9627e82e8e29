//! Engine configuration

use fos_bindings::{Profile, standard};
use fos_dom::{CollectionOptions, SkipNoscriptContent, SkipWhitespaceText};
use serde::{Deserialize, Serialize};

use crate::HeadlessResult;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capability profile the property registry is built for
    pub profile: ProfileConfig,
    /// Directive used when `FOS_LOG` is not set
    pub log_filter: String,
    /// `cloneNode` carries event listeners over to the copy
    pub clone_copies_listeners: bool,
    /// Post-filters applied to every collection handed to scripts
    pub collection_filters: CollectionFilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: ProfileConfig::default(),
            log_filter: "warn".into(),
            clone_copies_listeners: false,
            collection_filters: CollectionFilterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub name: String,
    pub features: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionFilterConfig {
    /// Drop whitespace-only text nodes
    pub skip_whitespace_text: bool,
    /// Restrict the whitespace filter to XML documents
    pub whitespace_xml_only: bool,
    /// Drop anything inside `noscript`
    pub skip_noscript_content: bool,
}

impl Config {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> HeadlessResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> HeadlessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The capability profile described by this configuration
    pub fn profile(&self) -> Profile {
        let mut profile = Profile::new(&self.profile.name)
            .with_features(self.profile.features.iter().map(String::as_str));
        if self.clone_copies_listeners {
            profile = profile.with_feature(standard::CLONE_NODE_COPIES_LISTENERS);
        }
        profile
    }

    /// Collection options carrying the configured post-filters
    pub fn collection_options(&self) -> CollectionOptions {
        let filters = &self.collection_filters;
        let mut options = CollectionOptions::new();
        if filters.skip_whitespace_text {
            options = options.with_filter(SkipWhitespaceText {
                xml_only: filters.whitespace_xml_only,
            });
        }
        if filters.skip_noscript_content {
            options = options.with_filter(SkipNoscriptContent);
        }
        options
    }
}
