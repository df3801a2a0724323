//! Source and library roots.
//!
//! A file under a root is expected to define the class its location names:
//! `src/flash/events/Event.as` under root `src` promises `flash.events.Event`.
//! The root also fixes the file's [`DefinitionPriority`].

use std::path::{Component, Path, PathBuf};

use smol_str::SmolStr;

use crate::base::{is_identifier, QName};
use crate::hir::{DefinitionPriority, PathOrigin};
use crate::syntax::properties::bundle_class_name;
use crate::syntax::SourceLanguage;

use super::config::ProjectConfig;

/// Where a file sits on the paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocationInfo {
    pub origin: PathOrigin,
    pub root_index: u32,
    /// Empty when the location does not form a valid qualified name.
    pub expected: Vec<QName>,
    /// Locale of a resource bundle.
    pub locale: Option<SmolStr>,
}

#[derive(Clone, Debug, Default)]
pub struct SourcePathManager {
    source_roots: Vec<PathBuf>,
    library_roots: Vec<PathBuf>,
    default_locale: SmolStr,
}

impl SourcePathManager {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            source_roots: config.source_path.clone(),
            library_roots: config.library_path.clone(),
            default_locale: config.locale.as_str().into(),
        }
    }

    pub fn source_roots(&self) -> &[PathBuf] {
        &self.source_roots
    }

    pub fn library_roots(&self) -> &[PathBuf] {
        &self.library_roots
    }

    /// Locate `path` on the roots. Files outside every root rank after all
    /// source roots and promise nothing.
    pub fn locate(&self, path: &Path) -> SourceLocationInfo {
        let roots = self
            .source_roots
            .iter()
            .map(|root| (PathOrigin::SourcePath, root))
            .enumerate()
            .chain(
                self.library_roots
                    .iter()
                    .map(|root| (PathOrigin::LibraryPath, root))
                    .enumerate(),
            );
        for (index, (origin, root)) in roots {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let (expected, locale) = self.expected_names(relative);
            return SourceLocationInfo {
                origin,
                root_index: index as u32,
                expected,
                locale,
            };
        }

        let locale = self.bundle_locale(path);
        SourceLocationInfo {
            origin: PathOrigin::SourcePath,
            root_index: self.source_roots.len() as u32,
            expected: Vec::new(),
            locale,
        }
    }

    /// Priority of a unit at `info`, added as the `sequence`-th unit.
    pub fn priority(&self, info: &SourceLocationInfo, sequence: u64) -> DefinitionPriority {
        DefinitionPriority::new(info.origin, info.root_index, sequence)
    }

    fn expected_names(&self, relative: &Path) -> (Vec<QName>, Option<SmolStr>) {
        let Some(stem) = relative.file_stem().and_then(|s| s.to_str()) else {
            return (Vec::new(), None);
        };

        if SourceLanguage::from_path(relative) == Some(SourceLanguage::Properties) {
            let locale = self.bundle_locale(relative).unwrap_or_else(|| self.default_locale.clone());
            let class = bundle_class_name(&locale, stem);
            return (vec![QName::top_level(class)], Some(locale));
        }

        let mut package: Vec<&str> = Vec::new();
        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                match component {
                    Component::Normal(part) => match part.to_str() {
                        Some(part) if is_identifier(part) => package.push(part),
                        _ => return (Vec::new(), None),
                    },
                    _ => return (Vec::new(), None),
                }
            }
        }
        if !is_identifier(stem) {
            return (Vec::new(), None);
        }
        (vec![QName::new(package.join("."), stem)], None)
    }

    /// Locale of a bundle from its directory, such as `locale/fr_FR/x.properties`.
    fn bundle_locale(&self, path: &Path) -> Option<SmolStr> {
        if SourceLanguage::from_path(path) != Some(SourceLanguage::Properties) {
            return None;
        }
        let dir = path.parent()?.file_name()?.to_str()?;
        is_locale(dir).then(|| SmolStr::new(dir))
    }
}

/// `en`, `en_US` and the like.
fn is_locale(name: &str) -> bool {
    let mut parts = name.split('_');
    let language = parts.next().unwrap_or_default();
    let language_ok = (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = parts.all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
    language_ok && region_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn manager() -> SourcePathManager {
        SourcePathManager::new(
            &ProjectConfig::new()
                .with_source_path("/proj/src")
                .with_source_path("/proj/gen")
                .with_library_path("/libs"),
        )
    }

    #[rstest]
    #[case("/proj/src/flash/events/Event.as", PathOrigin::SourcePath, 0, Some("flash.events.Event"))]
    #[case("/proj/gen/Main.mxml", PathOrigin::SourcePath, 1, Some("Main"))]
    #[case("/libs/core/pkg/C.as", PathOrigin::LibraryPath, 0, Some("core.pkg.C"))]
    #[case("/proj/src/bad-dir/A.as", PathOrigin::SourcePath, 0, None)]
    #[case("/elsewhere/A.as", PathOrigin::SourcePath, 2, None)]
    fn test_locate(
        #[case] path: &str,
        #[case] origin: PathOrigin,
        #[case] root_index: u32,
        #[case] expected: Option<&str>,
    ) {
        let info = manager().locate(Path::new(path));
        assert_eq!(info.origin, origin);
        assert_eq!(info.root_index, root_index);
        let names: Vec<String> = info.expected.iter().map(|q| q.to_string()).collect();
        assert_eq!(names, expected.map(|e| vec![e.to_string()]).unwrap_or_default());
    }

    #[test]
    fn test_bundle_locale_from_directory() {
        let info = manager().locate(Path::new("/proj/src/fr_FR/core.properties"));
        assert_eq!(info.locale.as_deref(), Some("fr_FR"));
        assert_eq!(info.expected[0].name(), "fr_FR$core_properties");

        let info = manager().locate(Path::new("/proj/src/bundles/core.properties"));
        assert_eq!(info.locale.as_deref(), Some("en_US"));
    }

    #[test]
    fn test_source_beats_library_priority() {
        let m = manager();
        let src = m.priority(&m.locate(Path::new("/proj/gen/pkg/C.as")), 9);
        let lib = m.priority(&m.locate(Path::new("/libs/pkg/C.as")), 1);
        assert!(src < lib);
    }
}
