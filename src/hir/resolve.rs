//! Name resolution.
//!
//! A lookup walks the scope chain of the referencing unit from the innermost
//! scope outwards and falls back to the project scope:
//!
//! ```text
//! function scope   parameters and locals
//! type scope       own members, then inherited members
//! package scope    package-level definitions of this unit
//! file scope       file-private definitions
//! project scope    open packages and explicit imports
//! ```
//!
//! At every step candidates are filtered by the [`NamespaceSet`] open at the
//! lookup site. The first step with visible candidates wins, so inner
//! definitions shadow outer ones. More than one candidate at that step goes
//! through the built-in tie-breaks, then the injected [`AmbiguityResolver`],
//! and is otherwise reported as ambiguous with a deterministic pick.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::QName;
use crate::error::Result;
use crate::project::Project;

use super::definitions::{Definition, DefinitionData, DefinitionKind, ResolvedType, TypeName};
use super::diagnostics::{Problem, ProblemKind, RelatedInfo};
use super::graph::DependencyType;
use super::ids::{DefId, ScopeId, UnitId};
use super::lower::FileScopeResult;
use super::namespace::{NamespaceReference, NamespaceSet, NamespaceValue};
use super::scope::ScopeKind;

/// Runtime types that are always available, even when no library on the
/// path defines them.
pub const INTRINSIC_TYPES: &[&str] = &[
    "Array", "Boolean", "Class", "Date", "Error", "Function", "Namespace", "Number", "Object",
    "QName", "RegExp", "String", "Vector", "XML", "XMLList", "int", "uint",
];

/// Package of `Vector`, open everywhere.
const VECTOR_PACKAGE: &str = "__AS3__.vec";

// ============================================================================
// RESULTS AND POLICIES
// ============================================================================

/// Result of resolving a name.
#[derive(Clone, Debug)]
pub enum ResolveResult {
    Found(Arc<Definition>),
    /// Several candidates remained; `picked` is the deterministic choice.
    Ambiguous {
        picked: Arc<Definition>,
        candidates: Vec<Arc<Definition>>,
    },
    /// A parameter or local variable.
    Local,
    NotFound,
}

impl ResolveResult {
    /// The found or picked definition.
    pub fn definition(&self) -> Option<&Arc<Definition>> {
        match self {
            ResolveResult::Found(def) => Some(def),
            ResolveResult::Ambiguous { picked, .. } => Some(picked),
            ResolveResult::Local | ResolveResult::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveResult::NotFound)
    }
}

/// Where an ambiguous name was looked up.
#[derive(Clone, Copy, Debug)]
pub struct AmbiguitySite<'a> {
    pub name: &'a str,
    pub package: &'a str,
    pub unit: UnitId,
}

/// Tie-break hook for ambiguous names.
pub trait AmbiguityResolver: Send + Sync {
    /// Pick one of `candidates`, or `None` to report the ambiguity.
    fn resolve(&self, site: &AmbiguitySite<'_>, candidates: &[Arc<Definition>]) -> Option<Arc<Definition>>;
}

/// Never breaks ties.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAmbiguityResolver;

impl AmbiguityResolver for NoAmbiguityResolver {
    fn resolve(&self, _: &AmbiguitySite<'_>, _: &[Arc<Definition>]) -> Option<Arc<Definition>> {
        None
    }
}

/// Prefers the single candidate declared in the referencing package.
#[derive(Clone, Copy, Debug, Default)]
pub struct PackageLocalResolver;

impl AmbiguityResolver for PackageLocalResolver {
    fn resolve(&self, site: &AmbiguitySite<'_>, candidates: &[Arc<Definition>]) -> Option<Arc<Definition>> {
        let mut local = candidates
            .iter()
            .filter(|def| def.qname().package() == site.package);
        match (local.next(), local.next()) {
            (Some(def), None) => Some(def.clone()),
            _ => None,
        }
    }
}

/// Lookup flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct LookupOptions {
    /// Edge to record from the referencing unit to the result's unit.
    pub dependency: Option<DependencyType>,
    /// Only classes and interfaces are candidates.
    pub types_only: bool,
}

impl LookupOptions {
    pub fn value(dependency: DependencyType) -> Self {
        Self {
            dependency: Some(dependency),
            types_only: false,
        }
    }

    pub fn types(dependency: DependencyType) -> Self {
        Self {
            dependency: Some(dependency),
            types_only: true,
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves names on behalf of one project.
pub struct Resolver<'p> {
    project: &'p Project,
}

impl<'p> Resolver<'p> {
    pub fn new(project: &'p Project) -> Self {
        Self { project }
    }

    /// The current definition with `id`. Fails when its unit was invalidated.
    pub fn definition(&self, id: DefId) -> Result<Arc<Definition>> {
        self.project.definition(id)
    }

    /// Namespaces open in `scope`.
    pub fn namespace_set(&self, file: &FileScopeResult, scope: ScopeId) -> Result<NamespaceSet> {
        let package = file.scopes.package_of(scope);
        let mut set = NamespaceSet::new();
        set.insert(NamespaceValue::Public(package.clone()));
        set.insert(NamespaceValue::Internal(package));
        set.insert(NamespaceValue::Public(SmolStr::default()));
        set.insert(NamespaceValue::Public(VECTOR_PACKAGE.into()));
        set.insert(NamespaceValue::FilePrivate(file.unit));

        let mut used: Vec<SmolStr> = Vec::new();
        for (_, s) in file.scopes.chain(scope) {
            for import in s.imports() {
                if import.wildcard {
                    set.insert(NamespaceValue::Public(import.target.clone()));
                }
            }
            used.extend(s.used_namespaces().iter().cloned());

            let ScopeKind::Type(owner) = s.kind() else {
                continue;
            };
            let Some(owner) = file.definition(*owner) else {
                continue;
            };
            let path = owner.qname().to_dotted();
            set.insert(NamespaceValue::Private(path.clone()));
            set.insert(NamespaceValue::Protected(path));
            if owner.kind() == DefinitionKind::Class {
                for ancestor in owner.ancestors(self.project)? {
                    set.insert(NamespaceValue::Protected(ancestor.qname().to_dotted()));
                }
            }
        }

        for name in used {
            let found = self.lookup(file, scope, &name, &set, LookupOptions::value(DependencyType::Namespace))?;
            if let Some(DefinitionData::Namespace { uri }) = found.definition().map(|d| d.data()) {
                set.insert(NamespaceValue::Uri(uri.clone()));
            }
        }
        Ok(set)
    }

    /// Resolve a simple name from `scope`.
    pub fn find_property(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        name: &str,
        options: LookupOptions,
    ) -> Result<ResolveResult> {
        let namespaces = self.namespace_set(file, scope)?;
        self.lookup(file, scope, name, &namespaces, options)
    }

    fn lookup(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        name: &str,
        namespaces: &NamespaceSet,
        options: LookupOptions,
    ) -> Result<ResolveResult> {
        for (id, s) in file.scopes.chain(scope) {
            let own = self.visible(file.local_definitions(id, name), namespaces, options)?;
            if !own.is_empty() {
                return self.choose(file, scope, name, own, options);
            }
            match s.kind() {
                ScopeKind::Function(_) if !options.types_only && s.has_local(name) => {
                    return Ok(ResolveResult::Local);
                }
                ScopeKind::Type(owner) if !options.types_only => {
                    let Some(owner) = file.definition(*owner) else {
                        continue;
                    };
                    let inherited = self.inherited_members(owner, name)?;
                    let inherited = self.visible(inherited, namespaces, options)?;
                    if !inherited.is_empty() {
                        return self.choose(file, scope, name, inherited, options);
                    }
                }
                _ => {}
            }
        }

        let candidates = self.project_candidates(file, scope, name, namespaces, options)?;
        if candidates.is_empty() {
            self.not_found(file, name);
            return Ok(ResolveResult::NotFound);
        }
        self.choose(file, scope, name, candidates, options)
    }

    /// Resolve an identifier chain such as `Factory.create` or
    /// `flash.events.Event.CHANGE`.
    ///
    /// The first segment is looked up in scope; when it does not resolve, the
    /// longest prefix that names a qualified definition is used instead.
    pub fn resolve_chain(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        chain: &str,
        is_call: bool,
    ) -> Result<ResolveResult> {
        let segments: Vec<&str> = chain.split('.').collect();
        let Some(first) = segments.first().copied() else {
            return Ok(ResolveResult::NotFound);
        };
        if first == "this" || first == "super" {
            return Ok(ResolveResult::Local);
        }

        let result = self.find_property(file, scope, first, LookupOptions::default())?;
        if !result.is_not_found() {
            if let Some(def) = result.definition() {
                let invoked = is_call && segments.len() == 1;
                self.record(file, def, edge_for(def, invoked));
            }
            return Ok(result);
        }

        let namespaces = self.namespace_set(file, scope)?;
        for split in (1..segments.len()).rev() {
            let qname = QName::new(segments[..split].join("."), segments[split]);
            let defs = self.project.lookup_qname(&qname)?;
            let mut candidates = Vec::new();
            for def in defs {
                if self.is_visible(&def, &namespaces)? || def.namespace().is_public() {
                    candidates.push(def);
                }
            }
            if candidates.is_empty() {
                self.not_found(file, qname.name());
                continue;
            }
            let result = self.choose(file, scope, qname.name(), candidates, LookupOptions::default())?;
            if let Some(def) = result.definition() {
                let invoked = is_call && split == segments.len() - 1;
                self.record(file, def, edge_for(def, invoked));
            }
            return Ok(result);
        }
        Ok(ResolveResult::NotFound)
    }

    /// Resolve a type annotation written on `def`.
    pub fn resolve_type_name(&self, def: &Definition, name: &TypeName, dependency: DependencyType) -> Result<ResolvedType> {
        let file = self.project.file_scope_for(def.id())?;
        self.type_name_in(&file, def.scope(), name, dependency, &mut Vec::new())
    }

    /// Like [`Resolver::resolve_type_name`], also returning a problem for
    /// every ambiguous name in the annotation.
    pub fn resolve_type_name_checked(
        &self,
        def: &Definition,
        name: &TypeName,
        dependency: DependencyType,
    ) -> Result<(ResolvedType, Vec<Problem>)> {
        let file = self.project.file_scope_for(def.id())?;
        let mut problems = Vec::new();
        let resolved = self.type_name_in(&file, def.scope(), name, dependency, &mut problems)?;
        Ok((resolved, problems))
    }

    /// Resolve a type annotation written in `scope`.
    pub fn resolve_type_name_in(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        name: &TypeName,
        dependency: DependencyType,
        problems: &mut Vec<Problem>,
    ) -> Result<ResolvedType> {
        self.type_name_in(file, scope, name, dependency, problems)
    }

    fn type_name_in(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        name: &TypeName,
        dependency: DependencyType,
        problems: &mut Vec<Problem>,
    ) -> Result<ResolvedType> {
        if name.is_any() {
            return Ok(ResolvedType::Any);
        }
        if name.is_void() {
            return Ok(ResolvedType::Void);
        }

        let resolved = if name.name.contains('.') {
            self.resolve_qualified_type(file, scope, &name.name, dependency)?
        } else {
            let result = self.find_property(file, scope, &name.name, LookupOptions::types(dependency))?;
            if let ResolveResult::Ambiguous { picked, candidates } = &result {
                problems.push(ambiguity_problem(
                    file.unit,
                    &name.name,
                    file.location(name.range),
                    picked,
                    candidates,
                ));
            }
            result.definition().cloned()
        };

        let base = match resolved {
            Some(def) => ResolvedType::Definition(def),
            None if INTRINSIC_TYPES.contains(&name.name.as_str()) => ResolvedType::Builtin(name.name.clone()),
            None => return Ok(ResolvedType::Unresolved(name.name.clone())),
        };

        if let Some(argument) = &name.argument {
            if let ResolvedType::Unresolved(missing) = self.type_name_in(file, scope, argument, dependency, problems)? {
                return Ok(ResolvedType::Unresolved(missing));
            }
        }
        Ok(base)
    }

    fn resolve_qualified_type(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        dotted: &str,
        dependency: DependencyType,
    ) -> Result<Option<Arc<Definition>>> {
        let Ok(qname) = QName::parse(dotted) else {
            return Ok(None);
        };
        let package = file.scopes.package_of(scope);
        let found = self
            .project
            .lookup_qname(&qname)?
            .into_iter()
            .filter(|def| def.kind().is_type())
            .find(|def| match def.namespace() {
                NamespaceReference::Internal(pkg) => *pkg == package,
                _ => true,
            });
        match &found {
            Some(def) => self.record(file, def, dependency),
            None => self.not_found(file, qname.name()),
        }
        Ok(found)
    }

    /// The implicit base class of classes without `extends`.
    pub fn resolve_implicit_object(&self, def: &Definition) -> Result<ResolvedType> {
        let object = QName::top_level("Object");
        let found = self
            .project
            .lookup_qname(&object)?
            .into_iter()
            .find(|candidate| candidate.kind() == DefinitionKind::Class && candidate.id() != def.id());
        match found {
            Some(target) => {
                self.project.add_dependency(
                    def.unit(),
                    def.id().generation,
                    target.unit(),
                    DependencyType::Inheritance,
                    "Object",
                );
                Ok(ResolvedType::Definition(target))
            }
            None => {
                self.project.record_unfound(def.unit(), def.id().generation, "Object");
                Ok(ResolvedType::Builtin("Object".into()))
            }
        }
    }

    /// Resolve the custom namespace a definition is declared in.
    pub fn resolve_namespace_reference(&self, def: &Definition) -> Result<Option<NamespaceValue>> {
        let NamespaceReference::Custom(name) = def.namespace() else {
            return Ok(def.namespace().builtin_value());
        };
        let file = self.project.file_scope_for(def.id())?;
        let result = self.find_property(&file, def.scope(), name, LookupOptions::value(DependencyType::Namespace))?;
        Ok(match result.definition().map(|d| d.data()) {
            Some(DefinitionData::Namespace { uri }) => Some(NamespaceValue::Uri(uri.clone())),
            _ => None,
        })
    }

    /// The getter of a setter, or the setter of a getter: same base name,
    /// same static-ness, same resolved namespace. Searches the declaring
    /// scope, then the class or interface hierarchy, then the package.
    pub fn find_accessor_counterpart(&self, def: &Definition) -> Result<Option<Arc<Definition>>> {
        let opposite = match def.kind() {
            DefinitionKind::Getter => DefinitionKind::Setter,
            DefinitionKind::Setter => DefinitionKind::Getter,
            _ => return Ok(None),
        };
        let namespace = def.resolve_namespace(self.project)?;
        let matches = |candidate: &Arc<Definition>| -> Result<bool> {
            Ok(candidate.kind() == opposite
                && candidate.name() == def.name()
                && candidate.is_static() == def.is_static()
                && candidate.resolve_namespace(self.project)? == namespace)
        };

        let file = self.project.file_scope_for(def.id())?;
        for candidate in file.local_definitions(def.scope(), def.name()) {
            if matches(&candidate)? {
                return Ok(Some(candidate));
            }
        }

        match def.parent().and_then(|parent| file.definition(parent)) {
            Some(owner) => {
                for ancestor in self.supertypes(owner)? {
                    let ancestor_file = self.project.file_scope_for(ancestor.id())?;
                    for candidate in ancestor_file.members(&ancestor, def.name()) {
                        if matches(&candidate)? {
                            return Ok(Some(candidate));
                        }
                    }
                }
            }
            None => {
                for candidate in self.project.lookup_qname(def.qname())? {
                    if matches(&candidate)? {
                        return Ok(Some(candidate));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Members named `name` inherited by a class or interface, from the
    /// nearest supertype that declares any.
    pub fn inherited_members(&self, owner: &Definition, name: &str) -> Result<Vec<Arc<Definition>>> {
        for ancestor in self.supertypes(owner)? {
            let file = self.project.file_scope_for(ancestor.id())?;
            let members = file.members(&ancestor, name);
            if !members.is_empty() {
                return Ok(members);
            }
        }
        Ok(Vec::new())
    }

    /// Base classes of a class, nearest first, or every interface an
    /// interface extends, breadth first.
    pub fn supertypes(&self, owner: &Definition) -> Result<Vec<Arc<Definition>>> {
        match owner.kind() {
            DefinitionKind::Class => owner.ancestors(self.project),
            DefinitionKind::Interface => {
                let mut seen: FxHashSet<DefId> = FxHashSet::default();
                seen.insert(owner.id());
                let mut out: Vec<Arc<Definition>> = Vec::new();
                let mut queue = owner.resolve_interfaces(self.project)?;
                let mut next = 0;
                while next < queue.len() {
                    let interface = queue[next].clone();
                    next += 1;
                    if !seen.insert(interface.id()) {
                        continue;
                    }
                    queue.extend(interface.resolve_interfaces(self.project)?);
                    out.push(interface);
                }
                Ok(out)
            }
            _ => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Candidates
    // ------------------------------------------------------------------

    fn project_candidates(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        name: &str,
        namespaces: &NamespaceSet,
        options: LookupOptions,
    ) -> Result<Vec<Arc<Definition>>> {
        let mut lookups: Vec<(QName, bool)> = namespaces
            .open_packages()
            .map(|package| (QName::new(package.clone(), name), false))
            .collect();
        for (_, s) in file.scopes.chain(scope) {
            for import in s.imports().iter().filter(|import| !import.wildcard) {
                let Ok(qname) = QName::parse(&import.target) else {
                    continue;
                };
                if qname.name() == name && !lookups.iter().any(|(q, _)| *q == qname) {
                    lookups.push((qname, true));
                }
            }
        }

        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        let mut out = Vec::new();
        for (qname, explicit) in lookups {
            for def in self.project.lookup_qname(&qname)? {
                if options.types_only && !def.kind().is_type() {
                    continue;
                }
                let imported = explicit
                    && *def.namespace() == NamespaceReference::Public(qname.package().into());
                if (imported || self.is_visible(&def, namespaces)?) && seen.insert(def.id()) {
                    out.push(def);
                }
            }
        }
        Ok(out)
    }

    fn visible(
        &self,
        defs: Vec<Arc<Definition>>,
        namespaces: &NamespaceSet,
        options: LookupOptions,
    ) -> Result<Vec<Arc<Definition>>> {
        let mut out = Vec::with_capacity(defs.len());
        for def in defs {
            if options.types_only && !def.kind().is_type() {
                continue;
            }
            if self.is_visible(&def, namespaces)? {
                out.push(def);
            }
        }
        Ok(out)
    }

    fn is_visible(&self, def: &Definition, namespaces: &NamespaceSet) -> Result<bool> {
        let value = match def.namespace().builtin_value() {
            Some(value) => Some(value),
            None => def.resolve_namespace(self.project)?,
        };
        Ok(value.is_some_and(|value| namespaces.contains(&value)))
    }

    // ------------------------------------------------------------------
    // Ambiguity
    // ------------------------------------------------------------------

    fn choose(
        &self,
        file: &FileScopeResult,
        scope: ScopeId,
        name: &str,
        candidates: Vec<Arc<Definition>>,
        options: LookupOptions,
    ) -> Result<ResolveResult> {
        let mut candidates = builtin_tie_break(candidates);
        let result = if candidates.len() == 1 {
            ResolveResult::Found(candidates.remove(0))
        } else {
            let package = file.scopes.package_of(scope);
            let site = AmbiguitySite {
                name,
                package: &package,
                unit: file.unit,
            };
            match self.project.ambiguity_resolver().resolve(&site, &candidates) {
                Some(def) => ResolveResult::Found(def),
                None => {
                    let picked = self.deterministic_pick(&candidates);
                    tracing::warn!(
                        unit = %file.unit,
                        name,
                        candidates = candidates.len(),
                        picked = %picked.qname(),
                        "ambiguous definition"
                    );
                    ResolveResult::Ambiguous { picked, candidates }
                }
            }
        };
        if let (Some(dependency), Some(def)) = (options.dependency, result.definition()) {
            self.record(file, def, dependency);
        }
        Ok(result)
    }

    /// Lowest unit priority, then qualified name, then declaration order.
    fn deterministic_pick(&self, candidates: &[Arc<Definition>]) -> Arc<Definition> {
        let scope = self.project.scope();
        candidates
            .iter()
            .min_by(|a, b| {
                let key_a = (scope.priority(a.unit()), a.qname(), a.unit(), a.id().local);
                let key_b = (scope.priority(b.unit()), b.qname(), b.unit(), b.id().local);
                key_a.cmp(&key_b)
            })
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }

    fn record(&self, file: &FileScopeResult, target: &Definition, dependency: DependencyType) {
        if target.unit() == file.unit {
            return;
        }
        self.project.add_dependency(
            file.unit,
            file.generation,
            target.unit(),
            dependency,
            &target.qname().to_dotted(),
        );
    }

    /// A provider of `name` added later invalidates the referencing unit.
    fn not_found(&self, file: &FileScopeResult, name: &str) {
        self.project.record_unfound(file.unit, file.generation, name);
    }
}

fn edge_for(def: &Definition, invoked: bool) -> DependencyType {
    if invoked && def.kind().is_function_like() {
        DependencyType::Call
    } else {
        DependencyType::Expression
    }
}

/// Built-in tie-breaks: a getter/setter pair resolves to its first member,
/// types win over functions, and redeclared package functions resolve to the
/// last declaration.
fn builtin_tie_break(mut candidates: Vec<Arc<Definition>>) -> Vec<Arc<Definition>> {
    if candidates.len() < 2 {
        return candidates;
    }
    let same_qname = candidates.iter().all(|c| c.qname() == candidates[0].qname());

    if same_qname && candidates.iter().all(|c| c.kind().is_accessor()) {
        candidates.truncate(1);
        return candidates;
    }

    if candidates.iter().any(|c| c.kind().is_type())
        && candidates.iter().any(|c| c.kind().is_function_like())
    {
        candidates.retain(|c| c.kind().is_type());
        if candidates.len() < 2 {
            return candidates;
        }
    }

    let same_unit = candidates.iter().all(|c| c.unit() == candidates[0].unit());
    if same_qname
        && same_unit
        && candidates.iter().all(|c| c.kind() == DefinitionKind::Function && c.parent().is_none())
    {
        if let Some(last) = candidates.iter().max_by_key(|c| c.id().local).cloned() {
            return vec![last];
        }
    }
    candidates
}

/// Problem for an ambiguous reference, listing every candidate.
pub(crate) fn ambiguity_problem(
    unit: UnitId,
    name: &str,
    location: Option<super::diagnostics::SourceLocation>,
    picked: &Arc<Definition>,
    candidates: &[Arc<Definition>],
) -> Problem {
    let mut problem = Problem::error(
        ProblemKind::AmbiguousDefinition,
        format!(
            "ambiguous reference to '{name}': {} candidates, using '{}'",
            candidates.len(),
            picked.qname()
        ),
    )
    .with_unit(unit)
    .with_location(location);
    for candidate in candidates {
        problem = problem.with_related(RelatedInfo {
            location: candidate.location().copied(),
            message: Arc::from(format!("candidate '{}'", candidate.qname())),
        });
    }
    problem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::definitions::{DefinitionInit, Modifiers};
    use crate::hir::ids::LocalDefId;
    use crate::syntax::ast::AccessorKind;

    fn def(unit: u32, local: u32, qname: QName, data: DefinitionData) -> Arc<Definition> {
        Arc::new(Definition::new(DefinitionInit {
            id: DefId::new(UnitId::new(unit), 0, LocalDefId::new(local)),
            name: qname.name().into(),
            qname,
            data,
            namespace: NamespaceReference::Public("".into()),
            modifiers: Modifiers::default(),
            location: None,
            scope: ScopeId(0),
            contained_scope: None,
            parent: None,
        }))
    }

    fn function(unit: u32, local: u32, qname: QName, accessor: Option<AccessorKind>) -> Arc<Definition> {
        def(
            unit,
            local,
            qname,
            DefinitionData::Function {
                accessor,
                params: Vec::new(),
                return_type: None,
            },
        )
    }

    fn class(unit: u32, qname: QName) -> Arc<Definition> {
        def(
            unit,
            0,
            qname,
            DefinitionData::Class {
                base: None,
                interfaces: Vec::new(),
            },
        )
    }

    #[test]
    fn test_accessor_pair_picks_first() {
        let getter = function(1, 0, QName::new("pkg", "x"), Some(AccessorKind::Getter));
        let setter = function(1, 1, QName::new("pkg", "x"), Some(AccessorKind::Setter));
        let kept = builtin_tie_break(vec![getter.clone(), setter]);
        assert_eq!(kept.len(), 1);
        assert!(Arc::ptr_eq(&kept[0], &getter));
    }

    #[test]
    fn test_types_win_over_functions() {
        let f = function(1, 0, QName::new("a", "Thing"), None);
        let c = class(2, QName::new("b", "Thing"));
        let kept = builtin_tie_break(vec![f, c.clone()]);
        assert_eq!(kept.len(), 1);
        assert!(Arc::ptr_eq(&kept[0], &c));
    }

    #[test]
    fn test_redeclared_functions_resolve_to_last() {
        let first = function(1, 0, QName::new("pkg", "f"), None);
        let last = function(1, 3, QName::new("pkg", "f"), None);
        let kept = builtin_tie_break(vec![first, last.clone()]);
        assert_eq!(kept.len(), 1);
        assert!(Arc::ptr_eq(&kept[0], &last));
    }

    #[test]
    fn test_distinct_classes_stay_ambiguous() {
        let a = class(1, QName::new("a", "Thing"));
        let b = class(2, QName::new("b", "Thing"));
        assert_eq!(builtin_tie_break(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_package_local_resolver() {
        let a = class(1, QName::new("a", "Thing"));
        let b = class(2, QName::new("b", "Thing"));
        let site = AmbiguitySite {
            name: "Thing",
            package: "b",
            unit: UnitId::new(9),
        };
        let picked = PackageLocalResolver.resolve(&site, &[a.clone(), b.clone()]);
        assert!(picked.is_some_and(|p| Arc::ptr_eq(&p, &b)));
        assert!(NoAmbiguityResolver.resolve(&site, &[a, b]).is_none());
    }
}
