//! Namespaces qualify every definition name.
//!
//! A [`NamespaceReference`] is what a declaration says; a [`NamespaceValue`]
//! is what it means once custom namespaces are resolved to their URIs. Name
//! lookup filters candidates by the [`NamespaceSet`] open at the lookup site.

use std::fmt;

use indexmap::IndexSet;
use smol_str::SmolStr;

use super::ids::UnitId;

/// The namespace a definition is declared in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NamespaceReference {
    /// Public namespace of a package. Public class members use the empty package.
    Public(SmolStr),
    /// Internal namespace of a package.
    Internal(SmolStr),
    /// Protected namespace of a class, by dotted class name.
    Protected(SmolStr),
    /// Private namespace of a class, by dotted class name.
    Private(SmolStr),
    /// Definitions outside any package block are private to their file.
    FilePrivate(UnitId),
    /// A user-defined namespace, named as written.
    Custom(SmolStr),
}

impl NamespaceReference {
    /// The resolved value of every non-custom namespace.
    pub fn builtin_value(&self) -> Option<NamespaceValue> {
        Some(match self {
            NamespaceReference::Public(pkg) => NamespaceValue::Public(pkg.clone()),
            NamespaceReference::Internal(pkg) => NamespaceValue::Internal(pkg.clone()),
            NamespaceReference::Protected(class) => NamespaceValue::Protected(class.clone()),
            NamespaceReference::Private(class) => NamespaceValue::Private(class.clone()),
            NamespaceReference::FilePrivate(unit) => NamespaceValue::FilePrivate(*unit),
            NamespaceReference::Custom(_) => return None,
        })
    }

    pub fn is_public(&self) -> bool {
        matches!(self, NamespaceReference::Public(_))
    }

    pub fn is_private(&self) -> bool {
        matches!(
            self,
            NamespaceReference::Private(_) | NamespaceReference::FilePrivate(_)
        )
    }
}

impl fmt::Display for NamespaceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceReference::Public(_) => f.write_str("public"),
            NamespaceReference::Internal(_) => f.write_str("internal"),
            NamespaceReference::Protected(_) => f.write_str("protected"),
            NamespaceReference::Private(_) | NamespaceReference::FilePrivate(_) => {
                f.write_str("private")
            }
            NamespaceReference::Custom(name) => f.write_str(name),
        }
    }
}

/// A resolved namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NamespaceValue {
    Public(SmolStr),
    Internal(SmolStr),
    Protected(SmolStr),
    Private(SmolStr),
    FilePrivate(UnitId),
    Uri(SmolStr),
}

impl fmt::Display for NamespaceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceValue::Public(pkg) => write!(f, "public:{pkg}"),
            NamespaceValue::Internal(pkg) => write!(f, "internal:{pkg}"),
            NamespaceValue::Protected(class) => write!(f, "protected:{class}"),
            NamespaceValue::Private(class) => write!(f, "private:{class}"),
            NamespaceValue::FilePrivate(unit) => write!(f, "private:{unit}"),
            NamespaceValue::Uri(uri) => f.write_str(uri),
        }
    }
}

/// The namespaces open at a lookup site.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceSet {
    values: IndexSet<NamespaceValue>,
}

impl NamespaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: NamespaceValue) -> bool {
        self.values.insert(value)
    }

    pub fn contains(&self, value: &NamespaceValue) -> bool {
        self.values.contains(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceValue> {
        self.values.iter()
    }

    /// Packages whose public namespace is open.
    pub fn open_packages(&self) -> impl Iterator<Item = &SmolStr> {
        self.values.iter().filter_map(|value| match value {
            NamespaceValue::Public(pkg) => Some(pkg),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<NamespaceValue> for NamespaceSet {
    fn from_iter<I: IntoIterator<Item = NamespaceValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_values() {
        assert_eq!(
            NamespaceReference::Public("pkg".into()).builtin_value(),
            Some(NamespaceValue::Public("pkg".into()))
        );
        assert_eq!(NamespaceReference::Custom("mx_internal".into()).builtin_value(), None);
    }

    #[test]
    fn test_set_open_packages_keep_insertion_order() {
        let set: NamespaceSet = [
            NamespaceValue::Public("b".into()),
            NamespaceValue::Internal("b".into()),
            NamespaceValue::Public("".into()),
            NamespaceValue::Public("b".into()),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 3);
        let open: Vec<&str> = set.open_packages().map(|p| p.as_str()).collect();
        assert_eq!(open, vec!["b", ""]);
    }

    #[test]
    fn test_display_uses_keywords() {
        assert_eq!(NamespaceReference::Private("pkg.A".into()).to_string(), "private");
        assert_eq!(NamespaceReference::Custom("mx_internal".into()).to_string(), "mx_internal");
        assert_eq!(NamespaceValue::Internal("pkg".into()).to_string(), "internal:pkg");
    }
}
