//! Project configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use smol_str::SmolStr;

use crate::syntax::{Manifests, DEFAULT_BUNDLE_BASE};

/// Settings of one project. Replacing them cleans the project.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "interchange", serde(default))]
pub struct ProjectConfig {
    /// Source roots, highest precedence first.
    pub source_path: Vec<PathBuf>,
    /// Library roots, highest precedence first.
    pub library_path: Vec<PathBuf>,
    pub parallel_code_generation: bool,
    /// Accept covariant overrides instead of requiring exact signatures.
    pub subclass_overrides: bool,
    /// Drop `\r` when decoding source text.
    pub strip_cr: bool,
    /// Locale of resource bundles without a locale directory.
    pub locale: String,
    /// MXML component manifests: namespace URI to tag name to class.
    pub manifests: BTreeMap<String, BTreeMap<String, String>>,
    /// Base class of generated resource bundle classes.
    pub bundle_base: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_path: Vec::new(),
            library_path: Vec::new(),
            parallel_code_generation: false,
            subclass_overrides: false,
            strip_cr: false,
            locale: "en_US".to_string(),
            manifests: BTreeMap::new(),
            bundle_base: DEFAULT_BUNDLE_BASE.to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_path.push(root.into());
        self
    }

    pub fn with_library_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.library_path.push(root.into());
        self
    }

    pub fn with_parallel_code_generation(mut self, enabled: bool) -> Self {
        self.parallel_code_generation = enabled;
        self
    }

    pub fn with_subclass_overrides(mut self, enabled: bool) -> Self {
        self.subclass_overrides = enabled;
        self
    }

    pub fn with_strip_cr(mut self, enabled: bool) -> Self {
        self.strip_cr = enabled;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_manifest<K, V>(mut self, uri: impl Into<String>, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let manifest = self.manifests.entry(uri.into()).or_default();
        manifest.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_bundle_base(mut self, base: impl Into<String>) -> Self {
        self.bundle_base = base.into();
        self
    }

    /// Manifests in the form the MXML outline parser takes.
    pub fn syntax_manifests(&self) -> Manifests {
        self.manifests
            .iter()
            .map(|(uri, entries)| {
                let entries = entries
                    .iter()
                    .map(|(tag, class)| (SmolStr::new(tag), SmolStr::new(class)))
                    .collect();
                (SmolStr::new(uri), entries)
            })
            .collect()
    }

    #[cfg(feature = "interchange")]
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[cfg(feature = "interchange")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_root_order() {
        let config = ProjectConfig::new()
            .with_source_path("src")
            .with_source_path("generated")
            .with_library_path("libs")
            .with_locale("fr_FR");
        assert_eq!(config.source_path, vec![PathBuf::from("src"), PathBuf::from("generated")]);
        assert_eq!(config.library_path, vec![PathBuf::from("libs")]);
        assert_eq!(config.locale, "fr_FR");
        assert!(!config.parallel_code_generation);
    }

    #[test]
    fn test_syntax_manifests() {
        let config = ProjectConfig::new().with_manifest("urn:c", [("Button", "c.Button")]);
        let manifests = config.syntax_manifests();
        assert_eq!(
            manifests.get("urn:c").and_then(|m| m.get("Button")).map(|c| c.as_str()),
            Some("c.Button")
        );
    }

    #[cfg(feature = "interchange")]
    #[test]
    fn test_json_round_trip() {
        let config = ProjectConfig::new().with_source_path("src").with_strip_cr(true);
        let json = config.to_json().unwrap();
        assert_eq!(ProjectConfig::from_json(&json).unwrap(), config);
        let partial = ProjectConfig::from_json(r#"{"locale":"de_DE"}"#).unwrap();
        assert_eq!(partial.locale, "de_DE");
        assert_eq!(partial.bundle_base, DEFAULT_BUNDLE_BASE);
    }
}
