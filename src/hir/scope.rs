//! Per-unit scope trees.
//!
//! Every unit owns an arena of nested scopes:
//!
//! ```text
//! file scope            file-private definitions, imports outside packages
//!   └─ package scope    package-level definitions, package imports
//!        └─ type scope  members of one class or interface
//!             └─ function scope   parameters and locals
//! ```
//!
//! A lookup walks from the innermost scope outwards; type scopes additionally
//! see inherited members, and the outermost scope defers to the project scope.

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use super::ids::{LocalDefId, ScopeId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Package(SmolStr),
    /// Members of the class or interface definition.
    Type(LocalDefId),
    /// Body of the function definition.
    Function(LocalDefId),
}

/// An import directive as written.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Import {
    pub target: SmolStr,
    pub wildcard: bool,
}

#[derive(Clone, Debug)]
pub struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    definitions: IndexMap<SmolStr, Vec<LocalDefId>>,
    imports: Vec<Import>,
    used_namespaces: Vec<SmolStr>,
    locals: IndexSet<SmolStr>,
}

impl Scope {
    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Namespaces opened with `use namespace`, as written.
    pub fn used_namespaces(&self) -> &[SmolStr] {
        &self.used_namespaces
    }

    /// All local definitions with the given base name, in declaration order.
    pub fn local_definitions(&self, name: &str) -> &[LocalDefId] {
        self.definitions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every local definition, grouped by name.
    pub fn definitions(&self) -> impl Iterator<Item = (&SmolStr, &[LocalDefId])> {
        self.definitions.iter().map(|(name, ids)| (name, ids.as_slice()))
    }

    /// Whether `name` is a parameter or local variable of this function scope.
    pub fn has_local(&self, name: &str) -> bool {
        self.locals.contains(name)
    }
}

/// Arena of the scopes of one unit. `ScopeId(0)` is the file scope.
#[derive(Clone, Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub const FILE: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::File,
                parent: None,
                definitions: IndexMap::new(),
                imports: Vec::new(),
                used_namespaces: Vec::new(),
                locals: IndexSet::new(),
            }],
        }
    }

    pub fn add_scope(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent: Some(parent),
            definitions: IndexMap::new(),
            imports: Vec::new(),
            used_namespaces: Vec::new(),
            locals: IndexSet::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index())
    }

    fn get_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.index())
    }

    /// Insert a definition into the local set of `scope`, keyed by base name.
    /// Several definitions may share a name (accessor pairs, redeclarations).
    pub fn add_definition(&mut self, scope: ScopeId, name: SmolStr, def: LocalDefId) {
        if let Some(scope) = self.get_mut(scope) {
            scope.definitions.entry(name).or_default().push(def);
        }
    }

    pub fn add_import(&mut self, scope: ScopeId, import: Import) {
        if let Some(scope) = self.get_mut(scope) {
            if !scope.imports.contains(&import) {
                scope.imports.push(import);
            }
        }
    }

    pub fn add_used_namespace(&mut self, scope: ScopeId, namespace: SmolStr) {
        if let Some(scope) = self.get_mut(scope) {
            if !scope.used_namespaces.contains(&namespace) {
                scope.used_namespaces.push(namespace);
            }
        }
    }

    pub fn add_local(&mut self, scope: ScopeId, name: SmolStr) {
        if let Some(scope) = self.get_mut(scope) {
            scope.locals.insert(name);
        }
    }

    /// All local candidates for `name` in `scope`, or empty.
    pub fn local_definitions(&self, scope: ScopeId, name: &str) -> &[LocalDefId] {
        self.get(scope)
            .map(|s| s.local_definitions(name))
            .unwrap_or(&[])
    }

    /// `scope` and its enclosing scopes, innermost first.
    pub fn chain(&self, scope: ScopeId) -> impl Iterator<Item = (ScopeId, &Scope)> {
        let mut next = Some(scope);
        std::iter::from_fn(move || {
            let id = next?;
            let scope = self.get(id)?;
            next = scope.parent;
            Some((id, scope))
        })
    }

    /// The package enclosing `scope`, or the unnamed package.
    pub fn package_of(&self, scope: ScopeId) -> SmolStr {
        self.chain(scope)
            .find_map(|(_, s)| match &s.kind {
                ScopeKind::Package(name) => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Whether `scope` is nested inside a package block.
    pub fn in_package(&self, scope: ScopeId) -> bool {
        self.chain(scope)
            .any(|(_, s)| matches!(s.kind, ScopeKind::Package(_)))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_walks_outwards() {
        let mut tree = ScopeTree::new();
        let package = tree.add_scope(ScopeKind::Package("pkg".into()), ScopeTree::FILE);
        let class = tree.add_scope(ScopeKind::Type(LocalDefId::new(1)), package);
        let function = tree.add_scope(ScopeKind::Function(LocalDefId::new(2)), class);

        let ids: Vec<ScopeId> = tree.chain(function).map(|(id, _)| id).collect();
        assert_eq!(ids, vec![function, class, package, ScopeTree::FILE]);
        assert_eq!(tree.package_of(function), "pkg");
        assert!(tree.in_package(class));
        assert!(!tree.in_package(ScopeTree::FILE));
    }

    #[test]
    fn test_local_definition_sets() {
        let mut tree = ScopeTree::new();
        tree.add_definition(ScopeTree::FILE, "x".into(), LocalDefId::new(0));
        tree.add_definition(ScopeTree::FILE, "x".into(), LocalDefId::new(1));

        assert_eq!(
            tree.local_definitions(ScopeTree::FILE, "x"),
            &[LocalDefId::new(0), LocalDefId::new(1)]
        );
        assert!(tree.local_definitions(ScopeTree::FILE, "y").is_empty());
    }

    #[test]
    fn test_imports_and_namespaces_are_deduplicated() {
        let mut tree = ScopeTree::new();
        let import = Import {
            target: "flash.events".into(),
            wildcard: true,
        };
        tree.add_import(ScopeTree::FILE, import.clone());
        tree.add_import(ScopeTree::FILE, import);
        tree.add_used_namespace(ScopeTree::FILE, "mx_internal".into());
        tree.add_used_namespace(ScopeTree::FILE, "mx_internal".into());

        let scope = tree.get(ScopeTree::FILE).unwrap();
        assert_eq!(scope.imports().len(), 1);
        assert_eq!(scope.used_namespaces().len(), 1);
    }
}
