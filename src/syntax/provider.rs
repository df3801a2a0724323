//! The syntax collaborator seam.
//!
//! The semantic core never parses text itself: compilation units hand their
//! source to a [`SyntaxProvider`] and consume the outline tree it returns.

use std::path::Path;

use smol_str::SmolStr;

use super::mxml::{parse_mxml, Manifests};
use super::parser::{parse_actionscript, Parse};
use super::properties::parse_properties;
use crate::base::QName;

/// Default base class of generated resource bundle classes.
pub const DEFAULT_BUNDLE_BASE: &str = "mx.resources.ResourceBundle";

/// Source language of a file, chosen by extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    ActionScript,
    Mxml,
    Properties,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "as" => Some(Self::ActionScript),
            "mxml" => Some(Self::Mxml),
            "properties" => Some(Self::Properties),
            _ => None,
        }
    }
}

/// Everything a provider needs to parse one file.
#[derive(Clone, Copy, Debug)]
pub struct ParseInput<'a> {
    pub language: SourceLanguage,
    pub path: &'a Path,
    pub text: &'a str,
    /// Name the file is expected to declare, derived from its source root.
    pub expected_name: Option<&'a QName>,
    pub locale: &'a str,
}

impl ParseInput<'_> {
    fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

/// Turns source text into an outline tree.
pub trait SyntaxProvider: Send + Sync {
    fn parse(&self, input: &ParseInput<'_>) -> Parse;
}

/// The built-in outline parser for ActionScript, MXML and resource bundles.
#[derive(Clone, Debug)]
pub struct OutlineSyntaxProvider {
    manifests: Manifests,
    bundle_base: SmolStr,
}

impl Default for OutlineSyntaxProvider {
    fn default() -> Self {
        Self {
            manifests: Manifests::new(),
            bundle_base: DEFAULT_BUNDLE_BASE.into(),
        }
    }
}

impl OutlineSyntaxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the component manifest for an MXML namespace URI.
    pub fn with_manifest<K, V>(
        mut self,
        uri: impl Into<SmolStr>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<SmolStr>,
        V: Into<SmolStr>,
    {
        let manifest = self.manifests.entry(uri.into()).or_default();
        manifest.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_manifests(mut self, manifests: Manifests) -> Self {
        self.manifests = manifests;
        self
    }

    pub fn with_bundle_base(mut self, base: impl Into<SmolStr>) -> Self {
        self.bundle_base = base.into();
        self
    }
}

impl SyntaxProvider for OutlineSyntaxProvider {
    fn parse(&self, input: &ParseInput<'_>) -> Parse {
        match input.language {
            SourceLanguage::ActionScript => parse_actionscript(input.text),
            SourceLanguage::Mxml => {
                let class = input
                    .expected_name
                    .cloned()
                    .unwrap_or_else(|| QName::top_level(input.stem()));
                parse_mxml(input.text, &class, &self.manifests)
            }
            SourceLanguage::Properties => {
                parse_properties(input.text, input.locale, input.stem(), &self.bundle_base)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::Item;
    use rstest::rstest;

    #[rstest]
    #[case("src/pkg/A.as", Some(SourceLanguage::ActionScript))]
    #[case("src/Main.mxml", Some(SourceLanguage::Mxml))]
    #[case("locale/en_US/core.properties", Some(SourceLanguage::Properties))]
    #[case("README.md", None)]
    fn test_language_from_path(#[case] path: &str, #[case] expected: Option<SourceLanguage>) {
        assert_eq!(SourceLanguage::from_path(Path::new(path)), expected);
    }

    #[test]
    fn test_properties_bundle_named_from_stem_and_locale() {
        let provider = OutlineSyntaxProvider::new().with_bundle_base("custom.Bundle");
        let parse = provider.parse(&ParseInput {
            language: SourceLanguage::Properties,
            path: Path::new("locale/fr_FR/errors.properties"),
            text: "a=b\n",
            expected_name: None,
            locale: "fr_FR",
        });
        let package = parse.file.packages().next().unwrap();
        let Item::Class(class) = &package.items[0] else {
            panic!("expected class");
        };
        assert_eq!(class.name, "fr_FR$errors_properties");
        assert_eq!(class.extends.as_ref().unwrap().name, "custom.Bundle");
    }

    #[test]
    fn test_mxml_uses_expected_name() {
        let provider = OutlineSyntaxProvider::new()
            .with_manifest("urn:comps", [("Panel", "comps.Panel")]);
        let expected = QName::new("views", "Home");
        let parse = provider.parse(&ParseInput {
            language: SourceLanguage::Mxml,
            path: Path::new("src/views/Home.mxml"),
            text: r#"<c:Panel xmlns:c="urn:comps"/>"#,
            expected_name: Some(&expected),
            locale: "en_US",
        });
        let package = parse.file.packages().next().unwrap();
        assert_eq!(package.name, "views");
        let Item::Class(class) = &package.items[0] else {
            panic!("expected class");
        };
        assert_eq!(class.name, "Home");
        assert_eq!(class.extends.as_ref().unwrap().name, "comps.Panel");
    }
}
