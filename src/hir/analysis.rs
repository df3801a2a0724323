//! Semantic analysis of one unit: the outgoing dependencies request.
//!
//! Resolving every name a unit uses records its dependency edges as a side
//! effect. Along the way the checks that need other units run here:
//! unresolved annotations and imports, circular inheritance and overrides.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use crate::base::QName;
use crate::error::{CompileError, Result};
use crate::project::Project;

use super::definitions::{Definition, DefinitionData, DefinitionKind, Parameter, ResolvedType, TypeName};
use super::diagnostics::{Problem, ProblemKind, RelatedInfo};
use super::graph::DependencyType;
use super::ids::DefId;
use super::lower::{FileScopeResult, Reference, ReferenceKind};
use super::namespace::{NamespaceReference, NamespaceValue};
use super::resolve::{ambiguity_problem, ResolveResult, Resolver};
use super::unit::CompilationUnit;

/// Result of the outgoing dependencies request.
#[derive(Debug, Default)]
pub struct OutgoingDependenciesResult {
    pub problems: Vec<Problem>,
}

// ============================================================================
// OVERRIDE POLICY
// ============================================================================

/// Decides whether an overriding method's signature is compatible with the
/// method it overrides.
pub trait OverridePolicy: Send + Sync {
    fn is_compatible_return_type(&self, project: &Project, base: &ResolvedType, over: &ResolvedType) -> Result<bool>;

    fn is_compatible_parameter_type(&self, project: &Project, base: &ResolvedType, over: &ResolvedType) -> Result<bool>;

    fn is_compatible_parameter_count(&self, base: &[Parameter], over: &[Parameter]) -> bool;
}

/// Signatures must match exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactOverridePolicy;

impl OverridePolicy for ExactOverridePolicy {
    fn is_compatible_return_type(&self, _: &Project, base: &ResolvedType, over: &ResolvedType) -> Result<bool> {
        Ok(base.same_as(over))
    }

    fn is_compatible_parameter_type(&self, _: &Project, base: &ResolvedType, over: &ResolvedType) -> Result<bool> {
        Ok(base.same_as(over))
    }

    fn is_compatible_parameter_count(&self, base: &[Parameter], over: &[Parameter]) -> bool {
        base.len() == over.len()
            && base
                .iter()
                .zip(over)
                .all(|(b, o)| b.has_default == o.has_default && b.is_rest == o.is_rest)
    }
}

/// Covariant return types, contravariant parameter types, and extra
/// trailing parameters when they are optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubclassOverridePolicy;

impl OverridePolicy for SubclassOverridePolicy {
    fn is_compatible_return_type(&self, project: &Project, base: &ResolvedType, over: &ResolvedType) -> Result<bool> {
        if base.same_as(over) {
            return Ok(true);
        }
        match (base.definition(), over.definition()) {
            (Some(base), Some(over)) => over.is_instance_of(base, project),
            _ => Ok(false),
        }
    }

    fn is_compatible_parameter_type(&self, project: &Project, base: &ResolvedType, over: &ResolvedType) -> Result<bool> {
        if base.same_as(over) || matches!(over, ResolvedType::Any) {
            return Ok(true);
        }
        match (base.definition(), over.definition()) {
            (Some(base), Some(over)) => base.is_instance_of(over, project),
            _ => Ok(false),
        }
    }

    fn is_compatible_parameter_count(&self, base: &[Parameter], over: &[Parameter]) -> bool {
        if over.len() < base.len() {
            return false;
        }
        let shared_match = base
            .iter()
            .zip(over)
            .all(|(b, o)| b.is_rest == o.is_rest && (o.has_default || !b.has_default));
        shared_match && over[base.len()..].iter().all(|p| p.has_default || p.is_rest)
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Resolve every name of `unit` and run the cross-unit checks.
pub(crate) fn analyze(
    project: &Project,
    unit: &CompilationUnit,
    file: &FileScopeResult,
    cancel: &CancellationToken,
) -> Result<OutgoingDependenciesResult> {
    let mut analyzer = Analyzer {
        project,
        resolver: Resolver::new(project),
        file,
        problems: Vec::new(),
    };

    for def in &file.definitions {
        if cancel.is_cancelled() {
            return Err(CompileError::Interrupted);
        }
        analyzer.definition(def)?;
    }
    for reference in &file.references {
        if cancel.is_cancelled() {
            return Err(CompileError::Interrupted);
        }
        analyzer.reference(reference)?;
    }

    tracing::debug!(
        unit = %unit.id(),
        problems = analyzer.problems.len(),
        dependencies = project.direct_dependencies(unit.id()).len(),
        "unit analyzed"
    );
    Ok(OutgoingDependenciesResult {
        problems: analyzer.problems,
    })
}

struct Analyzer<'a> {
    project: &'a Project,
    resolver: Resolver<'a>,
    file: &'a FileScopeResult,
    problems: Vec<Problem>,
}

impl Analyzer<'_> {
    fn definition(&mut self, def: &Arc<Definition>) -> Result<()> {
        match def.data() {
            DefinitionData::Class { base, interfaces } => {
                if let Some(base) = base {
                    self.expect_type(def, base, DependencyType::Inheritance, Some(DefinitionKind::Class))?;
                } else {
                    def.resolve_base_class(self.project)?;
                }
                for interface in interfaces {
                    self.expect_type(def, interface, DependencyType::Inheritance, Some(DefinitionKind::Interface))?;
                }
                self.check_class_cycle(def)?;
            }
            DefinitionData::Interface { extends } => {
                for interface in extends {
                    self.expect_type(def, interface, DependencyType::Inheritance, Some(DefinitionKind::Interface))?;
                }
                self.check_interface_cycle(def)?;
            }
            DefinitionData::Function { params, return_type, .. } => {
                if let Some(return_type) = return_type {
                    self.expect_type(def, return_type, DependencyType::Signature, None)?;
                }
                for param in params {
                    if let Some(name) = &param.type_name {
                        self.expect_type(def, name, DependencyType::Signature, None)?;
                    }
                }
                self.check_override(def)?;
            }
            DefinitionData::Variable { type_name, .. } => {
                if let Some(name) = type_name {
                    self.expect_type(def, name, DependencyType::Signature, None)?;
                }
            }
            DefinitionData::Namespace { .. } | DefinitionData::Package => {}
        }

        if let NamespaceReference::Custom(name) = def.namespace() {
            if def.resolve_namespace(self.project)?.is_none() {
                self.project.record_unfound(self.file.unit, self.file.generation, name);
                self.problems.push(
                    Problem::error(
                        ProblemKind::UnresolvedNamespace,
                        format!("namespace '{name}' of '{}' cannot be resolved", def.name()),
                    )
                    .with_unit(self.file.unit)
                    .with_location(def.location().copied()),
                );
            }
        }
        Ok(())
    }

    /// Resolve an annotation and report it when it is missing or names the
    /// wrong kind of type.
    fn expect_type(
        &mut self,
        def: &Definition,
        name: &TypeName,
        dependency: DependencyType,
        kind: Option<DefinitionKind>,
    ) -> Result<()> {
        let (resolved, ambiguities) = self.resolver.resolve_type_name_checked(def, name, dependency)?;
        self.problems.extend(ambiguities);
        self.check_resolved_type(&resolved, name, kind);
        Ok(())
    }

    fn check_resolved_type(&mut self, resolved: &ResolvedType, name: &TypeName, kind: Option<DefinitionKind>) {
        match resolved {
            ResolvedType::Unresolved(missing) => {
                self.not_found(missing);
                self.problems.push(
                    Problem::error(
                        ProblemKind::UnresolvedReference,
                        format!("type '{name}' cannot be resolved"),
                    )
                    .with_unit(self.file.unit)
                    .with_location(self.file.location(name.range)),
                );
            }
            ResolvedType::Definition(target) => {
                if let Some(kind) = kind {
                    if target.kind() != kind {
                        self.problems.push(
                            Problem::error(
                                ProblemKind::UnresolvedReference,
                                format!(
                                    "'{}' is a {}, expected a {}",
                                    target.qname(),
                                    target.kind().display(),
                                    kind.display()
                                ),
                            )
                            .with_unit(self.file.unit)
                            .with_location(self.file.location(name.range)),
                        );
                    }
                }
            }
            ResolvedType::Any | ResolvedType::Void | ResolvedType::Builtin(_) => {}
        }
    }

    fn check_class_cycle(&mut self, def: &Arc<Definition>) -> Result<()> {
        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        let mut next = def.resolve_base_class(self.project)?;
        while let Some(current) = next {
            if current.id() == def.id() {
                self.circular(def);
                break;
            }
            if !seen.insert(current.id()) {
                break;
            }
            next = current.resolve_base_class(self.project)?;
        }
        Ok(())
    }

    fn check_interface_cycle(&mut self, def: &Arc<Definition>) -> Result<()> {
        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        let mut stack = def.resolve_interfaces(self.project)?;
        while let Some(current) = stack.pop() {
            if current.id() == def.id() {
                self.circular(def);
                break;
            }
            if seen.insert(current.id()) {
                stack.extend(current.resolve_interfaces(self.project)?);
            }
        }
        Ok(())
    }

    fn circular(&mut self, def: &Definition) {
        self.problems.push(
            Problem::error(
                ProblemKind::CircularInheritance,
                format!("'{}' inherits from itself", def.qname()),
            )
            .with_unit(self.file.unit)
            .with_location(def.location().copied()),
        );
    }

    // ------------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------------

    fn check_override(&mut self, def: &Arc<Definition>) -> Result<()> {
        let Some(owner) = def.parent().and_then(|parent| self.file.definition(parent)).cloned() else {
            return Ok(());
        };
        if owner.kind() != DefinitionKind::Class || def.is_static() || def.name() == owner.name() {
            return Ok(());
        }

        let base = self.overridden(&owner, def)?;
        let declared = def.modifiers().is_override;
        match (declared, base) {
            (true, None) => self.problems.push(
                Problem::error(
                    ProblemKind::OverrideNotFound,
                    format!("'{}' is marked override but overrides nothing", def.qname()),
                )
                .with_unit(self.file.unit)
                .with_location(def.location().copied()),
            ),
            (false, Some(base)) => self.problems.push(
                Problem::error(
                    ProblemKind::MissingOverride,
                    format!("'{}' overrides '{}' without override", def.qname(), base.qname()),
                )
                .with_unit(self.file.unit)
                .with_location(def.location().copied())
                .with_related(related(&base, "overridden definition")),
            ),
            (true, Some(base)) => self.check_signature(def, &base)?,
            (false, None) => {}
        }
        Ok(())
    }

    /// The nearest inherited member that `def` overrides.
    fn overridden(&self, owner: &Definition, def: &Definition) -> Result<Option<Arc<Definition>>> {
        let own = def.resolve_namespace(self.project)?;
        for ancestor in owner.ancestors(self.project)? {
            let file = self.project.file_scope_for(ancestor.id())?;
            for member in file.members(&ancestor, def.name()) {
                if member.kind() != def.kind() || member.is_static() {
                    continue;
                }
                let theirs = member.resolve_namespace(self.project)?;
                if overridable_from(theirs.as_ref(), own.as_ref()) {
                    return Ok(Some(member));
                }
            }
        }
        Ok(None)
    }

    fn check_signature(&mut self, def: &Definition, base: &Arc<Definition>) -> Result<()> {
        let policy = self.project.override_policy();
        let mut reasons: Vec<String> = Vec::new();

        if base.modifiers().is_final {
            reasons.push("the overridden definition is final".into());
        }
        if !policy.is_compatible_parameter_count(base.parameters(), def.parameters()) {
            reasons.push(format!(
                "expected {} parameters, found {}",
                base.parameters().len(),
                def.parameters().len()
            ));
        } else {
            let base_types = base.resolve_parameter_types(self.project)?;
            let own_types = def.resolve_parameter_types(self.project)?;
            for (index, (b, o)) in base_types.iter().zip(&own_types).enumerate() {
                if is_unresolved(b) || is_unresolved(o) {
                    continue;
                }
                if !policy.is_compatible_parameter_type(self.project, b, o)? {
                    reasons.push(format!(
                        "parameter {} is {}, expected {}",
                        index + 1,
                        o.display_name(),
                        b.display_name()
                    ));
                }
            }
        }
        if def.kind() != DefinitionKind::Setter {
            let b = base.resolve_return_type(self.project)?;
            let o = def.resolve_return_type(self.project)?;
            if !is_unresolved(&b) && !is_unresolved(&o) && !policy.is_compatible_return_type(self.project, &b, &o)? {
                reasons.push(format!(
                    "return type is {}, expected {}",
                    o.display_name(),
                    b.display_name()
                ));
            }
        }

        if !reasons.is_empty() {
            self.problems.push(
                Problem::error(
                    ProblemKind::IncompatibleOverride,
                    format!(
                        "'{}' is incompatible with '{}': {}",
                        def.qname(),
                        base.qname(),
                        reasons.join("; ")
                    ),
                )
                .with_unit(self.file.unit)
                .with_location(def.location().copied())
                .with_related(related(base, "overridden definition")),
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    fn reference(&mut self, reference: &Reference) -> Result<()> {
        match reference.kind {
            ReferenceKind::Import => {
                let found = match QName::parse(&reference.name) {
                    Ok(qname) => !self.project.lookup_qname(&qname)?.is_empty(),
                    Err(_) => false,
                };
                if !found {
                    self.not_found(&reference.name);
                    self.unresolved(reference, format!("import '{}' cannot be resolved", reference.name));
                }
            }
            ReferenceKind::UseNamespace => {
                let result = self.resolver.find_property(
                    self.file,
                    reference.scope,
                    &reference.name,
                    super::resolve::LookupOptions::value(DependencyType::Namespace),
                )?;
                let is_namespace = result
                    .definition()
                    .is_some_and(|def| def.kind() == DefinitionKind::Namespace);
                if !is_namespace {
                    self.not_found(&reference.name);
                    self.problems.push(
                        Problem::error(
                            ProblemKind::UnresolvedNamespace,
                            format!("namespace '{}' cannot be resolved", reference.name),
                        )
                        .with_unit(self.file.unit)
                        .with_location(self.file.location(reference.range)),
                    );
                }
            }
            ReferenceKind::LocalType => {
                let name = TypeName::new(reference.name.clone(), reference.range);
                let resolved = self.resolver.resolve_type_name_in(
                    self.file,
                    reference.scope,
                    &name,
                    DependencyType::Expression,
                    &mut self.problems,
                )?;
                self.check_resolved_type(&resolved, &name, None);
            }
            ReferenceKind::Expression { is_call } => {
                let result = self
                    .resolver
                    .resolve_chain(self.file, reference.scope, &reference.name, is_call)?;
                match result {
                    ResolveResult::Ambiguous { picked, candidates } => {
                        self.problems.push(ambiguity_problem(
                            self.file.unit,
                            &reference.name,
                            self.file.location(reference.range),
                            &picked,
                            &candidates,
                        ));
                    }
                    ResolveResult::NotFound => {
                        // Dynamic property access is legal, so a miss is only
                        // remembered for invalidation.
                        let head = reference.name.split('.').next().unwrap_or_default();
                        self.not_found(head);
                    }
                    ResolveResult::Found(_) | ResolveResult::Local => {}
                }
            }
        }
        Ok(())
    }

    fn unresolved(&mut self, reference: &Reference, message: String) {
        self.problems.push(
            Problem::error(ProblemKind::UnresolvedReference, message)
                .with_unit(self.file.unit)
                .with_location(self.file.location(reference.range)),
        );
    }

    /// Remember a name this unit failed to find, by its base name.
    fn not_found(&self, name: &str) {
        let base: SmolStr = name.rsplit('.').next().unwrap_or(name).into();
        self.project.record_unfound(self.file.unit, self.file.generation, &base);
    }
}

fn related(def: &Definition, message: &str) -> RelatedInfo {
    RelatedInfo {
        location: def.location().copied(),
        message: Arc::from(format!("{message} '{}'", def.qname())),
    }
}

fn is_unresolved(ty: &ResolvedType) -> bool {
    matches!(ty, ResolvedType::Unresolved(_))
}

/// Whether a member in namespace `base` can be overridden by one declared in
/// namespace `over`. Private members are never inherited.
fn overridable_from(base: Option<&NamespaceValue>, over: Option<&NamespaceValue>) -> bool {
    match (base, over) {
        (Some(NamespaceValue::Private(_)) | Some(NamespaceValue::FilePrivate(_)), _) => false,
        (Some(NamespaceValue::Protected(_)), Some(NamespaceValue::Protected(_))) => true,
        (Some(b), Some(o)) => b == o,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn param(has_default: bool, is_rest: bool) -> Parameter {
        Parameter {
            name: "p".into(),
            type_name: None,
            has_default,
            is_rest,
        }
    }

    #[rstest]
    #[case(vec![param(false, false)], vec![param(false, false)], true)]
    #[case(vec![param(false, false)], vec![], false)]
    #[case(vec![param(false, false)], vec![param(false, false), param(true, false)], false)]
    #[case(vec![param(true, false)], vec![param(false, false)], false)]
    fn test_exact_parameter_count(#[case] base: Vec<Parameter>, #[case] over: Vec<Parameter>, #[case] ok: bool) {
        assert_eq!(ExactOverridePolicy.is_compatible_parameter_count(&base, &over), ok);
    }

    #[rstest]
    #[case(vec![param(false, false)], vec![param(false, false), param(true, false)], true)]
    #[case(vec![param(false, false)], vec![param(false, false), param(false, true)], true)]
    #[case(vec![param(false, false)], vec![param(false, false), param(false, false)], false)]
    #[case(vec![param(false, false)], vec![param(true, false)], true)]
    #[case(vec![param(true, false)], vec![param(false, false)], false)]
    #[case(vec![param(false, false), param(false, false)], vec![param(false, false)], false)]
    fn test_subclass_parameter_count(#[case] base: Vec<Parameter>, #[case] over: Vec<Parameter>, #[case] ok: bool) {
        assert_eq!(SubclassOverridePolicy.is_compatible_parameter_count(&base, &over), ok);
    }

    #[test]
    fn test_private_members_are_not_overridable() {
        let private = NamespaceValue::Private("pkg.A".into());
        let public = NamespaceValue::Public("".into());
        assert!(!overridable_from(Some(&private), Some(&private)));
        assert!(overridable_from(Some(&public), Some(&public)));
        assert!(overridable_from(
            Some(&NamespaceValue::Protected("pkg.A".into())),
            Some(&NamespaceValue::Protected("pkg.B".into()))
        ));
        assert!(!overridable_from(
            Some(&NamespaceValue::Internal("a".into())),
            Some(&NamespaceValue::Internal("b".into()))
        ));
    }
}
