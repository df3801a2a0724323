//! Definitions: named program entities.
//!
//! A [`Definition`] is created while a unit's file scope is built and is
//! immutable once published, except for the memoized results of its
//! `resolve_*` methods. Those resolve through the [`Project`] (never by
//! following pointers into another unit) and are computed at most once.
//!
//! ## Re-entrancy
//!
//! Memo cells track which thread is resolving them. A thread that asks for a
//! value it is already computing gets a "cycle" answer instead of blocking on
//! itself; a second thread computes independently and the first stored result
//! wins. Mutually dependent classes therefore never deadlock.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::{QName, TextRange};
use crate::error::Result;
use crate::project::Project;
use crate::syntax::ast::{AccessorKind, TypeRefNode};

use super::diagnostics::SourceLocation;
use super::graph::DependencyType;
use super::ids::{DefId, LocalDefId, ScopeId, UnitId};
use super::namespace::{NamespaceReference, NamespaceValue};
use super::resolve::Resolver;

// ============================================================================
// DEFINITION DATA
// ============================================================================

/// The kind of a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Class,
    Interface,
    Function,
    Getter,
    Setter,
    Variable,
    Namespace,
    Package,
}

impl DefinitionKind {
    pub fn is_type(self) -> bool {
        matches!(self, DefinitionKind::Class | DefinitionKind::Interface)
    }

    pub fn is_accessor(self) -> bool {
        matches!(self, DefinitionKind::Getter | DefinitionKind::Setter)
    }

    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            DefinitionKind::Function | DefinitionKind::Getter | DefinitionKind::Setter
        )
    }

    pub fn display(self) -> &'static str {
        match self {
            DefinitionKind::Class => "class",
            DefinitionKind::Interface => "interface",
            DefinitionKind::Function => "function",
            DefinitionKind::Getter => "getter",
            DefinitionKind::Setter => "setter",
            DefinitionKind::Variable => "variable",
            DefinitionKind::Namespace => "namespace",
            DefinitionKind::Package => "package",
        }
    }
}

/// A type name as written in source, resolved lazily.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeName {
    pub name: SmolStr,
    pub argument: Option<Box<TypeName>>,
    pub range: TextRange,
}

impl TypeName {
    pub fn new(name: impl Into<SmolStr>, range: TextRange) -> Self {
        Self {
            name: name.into(),
            argument: None,
            range,
        }
    }

    /// `*`
    pub fn is_any(&self) -> bool {
        self.name == "*"
    }

    pub fn is_void(&self) -> bool {
        self.name == "void"
    }
}

impl From<&TypeRefNode> for TypeName {
    fn from(node: &TypeRefNode) -> Self {
        Self {
            name: node.name.clone(),
            argument: node.argument.as_deref().map(|arg| Box::new(TypeName::from(arg))),
            range: node.range,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(argument) = &self.argument {
            write!(f, ".<{argument}>")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: SmolStr,
    pub type_name: Option<TypeName>,
    pub has_default: bool,
    pub is_rest: bool,
}

/// Kind-specific data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefinitionData {
    Class {
        base: Option<TypeName>,
        interfaces: Vec<TypeName>,
    },
    Interface {
        extends: Vec<TypeName>,
    },
    Function {
        accessor: Option<AccessorKind>,
        params: Vec<Parameter>,
        return_type: Option<TypeName>,
    },
    Variable {
        type_name: Option<TypeName>,
        is_const: bool,
    },
    Namespace {
        uri: SmolStr,
    },
    Package,
}

/// Declaration modifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_override: bool,
    pub is_final: bool,
    pub is_dynamic: bool,
    pub is_native: bool,
}

/// A metadata tag such as `[Bindable]` or `[Event(name="change")]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaTag {
    pub name: SmolStr,
    pub attributes: Vec<MetaAttribute>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaAttribute {
    pub key: Option<SmolStr>,
    pub value: SmolStr,
}

impl MetaTag {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Value of the first attribute with `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key.as_deref() == Some(key))
            .map(|attr| attr.value.as_str())
    }
}

/// The resolved type of an annotation.
#[derive(Clone, Debug)]
pub enum ResolvedType {
    /// `*` or no annotation.
    Any,
    Void,
    Definition(Arc<Definition>),
    /// A runtime type such as `int` or `String` that no library on the path
    /// defines.
    Builtin(SmolStr),
    /// The name did not resolve; already reported where it was written.
    Unresolved(SmolStr),
}

impl ResolvedType {
    pub fn definition(&self) -> Option<&Arc<Definition>> {
        match self {
            ResolvedType::Definition(def) => Some(def),
            _ => None,
        }
    }

    /// Identity comparison: two definitions are the same type only if they are
    /// the same published definition.
    pub fn same_as(&self, other: &ResolvedType) -> bool {
        match (self, other) {
            (ResolvedType::Any, ResolvedType::Any) => true,
            (ResolvedType::Void, ResolvedType::Void) => true,
            (ResolvedType::Definition(a), ResolvedType::Definition(b)) => {
                Arc::ptr_eq(a, b) || a.qname() == b.qname() && a.kind() == b.kind()
            }
            (ResolvedType::Builtin(a), ResolvedType::Builtin(b)) => a == b,
            (ResolvedType::Unresolved(a), ResolvedType::Unresolved(b)) => a == b,
            _ => false,
        }
    }

    pub fn display_name(&self) -> SmolStr {
        match self {
            ResolvedType::Any => "*".into(),
            ResolvedType::Void => "void".into(),
            ResolvedType::Definition(def) => def.qname().to_dotted(),
            ResolvedType::Builtin(name) | ResolvedType::Unresolved(name) => name.clone(),
        }
    }
}

// ============================================================================
// MEMO CELLS
// ============================================================================

#[derive(Debug)]
enum CellState<T> {
    Unresolved,
    Resolving(ThreadId),
    Resolved(T),
}

/// A thread-aware memo for one resolution result.
#[derive(Debug)]
pub(crate) struct ResolveCell<T> {
    state: Mutex<CellState<T>>,
}

impl<T> Default for ResolveCell<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CellState::Unresolved),
        }
    }
}

impl<T: Clone> ResolveCell<T> {
    /// Return the memoized value, computing it if needed.
    ///
    /// `Ok(None)` means the calling thread is already computing this value.
    pub(crate) fn get_or_resolve(&self, compute: impl FnOnce() -> Result<T>) -> Result<Option<T>> {
        let me = thread::current().id();
        let claimed = {
            let mut state = self.state.lock();
            match &*state {
                CellState::Resolved(value) => return Ok(Some(value.clone())),
                CellState::Resolving(owner) if *owner == me => return Ok(None),
                CellState::Resolving(_) => false,
                CellState::Unresolved => {
                    *state = CellState::Resolving(me);
                    true
                }
            }
        };

        let result = compute();

        let mut state = self.state.lock();
        match result {
            Ok(value) => {
                if let CellState::Resolved(existing) = &*state {
                    return Ok(Some(existing.clone()));
                }
                *state = CellState::Resolved(value.clone());
                Ok(Some(value))
            }
            Err(err) => {
                if claimed && matches!(&*state, CellState::Resolving(owner) if *owner == me) {
                    *state = CellState::Unresolved;
                }
                Err(err)
            }
        }
    }

    pub(crate) fn peek(&self) -> Option<T> {
        match &*self.state.lock() {
            CellState::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Memo {
    base_class: ResolveCell<Option<Arc<Definition>>>,
    interfaces: ResolveCell<Vec<Arc<Definition>>>,
    declared_type: ResolveCell<ResolvedType>,
    parameter_types: ResolveCell<Vec<ResolvedType>>,
    namespace: ResolveCell<Option<NamespaceValue>>,
    counterpart: ResolveCell<Option<Arc<Definition>>>,
}

// ============================================================================
// DEFINITION
// ============================================================================

/// A named program entity.
pub struct Definition {
    id: DefId,
    name: SmolStr,
    qname: QName,
    data: DefinitionData,
    namespace: NamespaceReference,
    modifiers: Modifiers,
    meta: Vec<MetaTag>,
    location: Option<SourceLocation>,
    scope: ScopeId,
    contained_scope: Option<ScopeId>,
    parent: Option<LocalDefId>,
    memo: Memo,
}

/// Construction parameters for a [`Definition`].
pub(crate) struct DefinitionInit {
    pub id: DefId,
    pub name: SmolStr,
    pub qname: QName,
    pub data: DefinitionData,
    pub namespace: NamespaceReference,
    pub modifiers: Modifiers,
    pub location: Option<SourceLocation>,
    pub scope: ScopeId,
    pub contained_scope: Option<ScopeId>,
    pub parent: Option<LocalDefId>,
}

impl Definition {
    pub(crate) fn new(init: DefinitionInit) -> Self {
        Self {
            id: init.id,
            name: init.name,
            qname: init.qname,
            data: init.data,
            namespace: init.namespace,
            modifiers: init.modifiers,
            meta: Vec::new(),
            location: init.location,
            scope: init.scope,
            contained_scope: init.contained_scope,
            parent: init.parent,
            memo: Memo::default(),
        }
    }

    /// Attach a metadata tag. Only possible before the definition is shared.
    pub fn add_meta_tag(&mut self, tag: MetaTag) {
        self.meta.push(tag);
    }

    pub fn id(&self) -> DefId {
        self.id
    }

    pub fn unit(&self) -> UnitId {
        self.id.unit
    }

    /// The base name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The qualified name. For members, the package part is the dotted name of
    /// the enclosing type.
    pub fn qname(&self) -> &QName {
        &self.qname
    }

    pub fn kind(&self) -> DefinitionKind {
        match &self.data {
            DefinitionData::Class { .. } => DefinitionKind::Class,
            DefinitionData::Interface { .. } => DefinitionKind::Interface,
            DefinitionData::Function { accessor, .. } => match accessor {
                Some(AccessorKind::Getter) => DefinitionKind::Getter,
                Some(AccessorKind::Setter) => DefinitionKind::Setter,
                None => DefinitionKind::Function,
            },
            DefinitionData::Variable { .. } => DefinitionKind::Variable,
            DefinitionData::Namespace { .. } => DefinitionKind::Namespace,
            DefinitionData::Package => DefinitionKind::Package,
        }
    }

    pub fn data(&self) -> &DefinitionData {
        &self.data
    }

    pub fn namespace(&self) -> &NamespaceReference {
        &self.namespace
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    pub fn meta_tags(&self) -> &[MetaTag] {
        &self.meta
    }

    pub fn meta_tag(&self, name: &str) -> Option<&MetaTag> {
        self.meta.iter().find(|tag| tag.name == name)
    }

    pub fn has_meta_tag(&self, name: &str) -> bool {
        self.meta_tag(name).is_some()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// The scope this definition is declared in.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The scope this definition opens (types, functions and packages).
    pub fn contained_scope(&self) -> Option<ScopeId> {
        self.contained_scope
    }

    /// The enclosing class or interface.
    pub fn parent(&self) -> Option<LocalDefId> {
        self.parent
    }

    /// Parameters of a function, empty for every other kind.
    pub fn parameters(&self) -> &[Parameter] {
        match &self.data {
            DefinitionData::Function { params, .. } => params,
            _ => &[],
        }
    }

    /// Whether this is the implicit root of every class hierarchy.
    pub fn is_object_root(&self) -> bool {
        self.kind() == DefinitionKind::Class && self.qname.is_top_level() && self.name == "Object"
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// The base class of a class. Classes without `extends` derive from
    /// `Object`. Records an inheritance dependency.
    pub fn resolve_base_class(&self, project: &Project) -> Result<Option<Arc<Definition>>> {
        project.check_definition(self.id())?;
        let DefinitionData::Class { base, .. } = &self.data else {
            return Ok(None);
        };
        if base.is_none() && self.is_object_root() {
            return Ok(None);
        }
        let resolved = self.memo.base_class.get_or_resolve(|| {
            let resolver = Resolver::new(project);
            let target = match base {
                Some(name) => resolver.resolve_type_name(self, name, DependencyType::Inheritance)?,
                None => resolver.resolve_implicit_object(self)?,
            };
            Ok(target
                .definition()
                .filter(|def| def.kind() == DefinitionKind::Class)
                .cloned())
        })?;
        Ok(resolved.flatten())
    }

    /// Implemented interfaces of a class, or extended interfaces of an interface.
    pub fn resolve_interfaces(&self, project: &Project) -> Result<Vec<Arc<Definition>>> {
        project.check_definition(self.id())?;
        let names = match &self.data {
            DefinitionData::Class { interfaces, .. } => interfaces,
            DefinitionData::Interface { extends } => extends,
            _ => return Ok(Vec::new()),
        };
        let resolved = self.memo.interfaces.get_or_resolve(|| {
            let resolver = Resolver::new(project);
            let mut out = Vec::new();
            for name in names {
                let target = resolver.resolve_type_name(self, name, DependencyType::Inheritance)?;
                if let Some(def) = target.definition() {
                    if def.kind() == DefinitionKind::Interface {
                        out.push(def.clone());
                    }
                }
            }
            Ok(out)
        })?;
        Ok(resolved.unwrap_or_default())
    }

    /// The declared return type of a function or getter.
    pub fn resolve_return_type(&self, project: &Project) -> Result<ResolvedType> {
        project.check_definition(self.id())?;
        match &self.data {
            DefinitionData::Function { return_type, .. } => {
                self.resolve_declared(project, return_type.as_ref())
            }
            _ => Ok(ResolvedType::Any),
        }
    }

    /// The type of a variable, the value type of an accessor, or the
    /// definition itself for classes and interfaces.
    pub fn resolve_type(&self, project: &Project) -> Result<ResolvedType> {
        project.check_definition(self.id())?;
        match &self.data {
            DefinitionData::Variable { type_name, .. } => {
                self.resolve_declared(project, type_name.as_ref())
            }
            DefinitionData::Function {
                accessor: Some(AccessorKind::Getter),
                return_type,
                ..
            } => self.resolve_declared(project, return_type.as_ref()),
            DefinitionData::Function {
                accessor: Some(AccessorKind::Setter),
                ..
            } => Ok(self
                .resolve_parameter_types(project)?
                .into_iter()
                .next()
                .unwrap_or(ResolvedType::Any)),
            DefinitionData::Class { .. } | DefinitionData::Interface { .. } => {
                let this = Resolver::new(project).definition(self.id)?;
                Ok(ResolvedType::Definition(this))
            }
            _ => Ok(ResolvedType::Any),
        }
    }

    fn resolve_declared(&self, project: &Project, name: Option<&TypeName>) -> Result<ResolvedType> {
        let Some(name) = name else {
            return Ok(ResolvedType::Any);
        };
        let resolved = self.memo.declared_type.get_or_resolve(|| {
            Resolver::new(project).resolve_type_name(self, name, DependencyType::Signature)
        })?;
        Ok(resolved.unwrap_or(ResolvedType::Any))
    }

    /// Resolved parameter types of a function, in declaration order.
    pub fn resolve_parameter_types(&self, project: &Project) -> Result<Vec<ResolvedType>> {
        project.check_definition(self.id())?;
        let params = self.parameters();
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let resolved = self.memo.parameter_types.get_or_resolve(|| {
            let resolver = Resolver::new(project);
            params
                .iter()
                .map(|param| match &param.type_name {
                    Some(name) => resolver.resolve_type_name(self, name, DependencyType::Signature),
                    None => Ok(ResolvedType::Any),
                })
                .collect()
        })?;
        Ok(resolved.unwrap_or_default())
    }

    /// The value of this definition's namespace, resolving custom namespaces
    /// to their URIs. `None` when a custom namespace cannot be resolved.
    pub fn resolve_namespace(&self, project: &Project) -> Result<Option<NamespaceValue>> {
        project.check_definition(self.id())?;
        if let Some(value) = self.namespace.builtin_value() {
            return Ok(Some(value));
        }
        let resolved = self
            .memo
            .namespace
            .get_or_resolve(|| Resolver::new(project).resolve_namespace_reference(self))?;
        Ok(resolved.flatten())
    }

    /// The setter paired with this getter.
    pub fn resolve_setter(&self, project: &Project) -> Result<Option<Arc<Definition>>> {
        if self.kind() != DefinitionKind::Getter {
            return Ok(None);
        }
        self.resolve_counterpart(project)
    }

    /// The getter paired with this setter.
    pub fn resolve_getter(&self, project: &Project) -> Result<Option<Arc<Definition>>> {
        if self.kind() != DefinitionKind::Setter {
            return Ok(None);
        }
        self.resolve_counterpart(project)
    }

    fn resolve_counterpart(&self, project: &Project) -> Result<Option<Arc<Definition>>> {
        project.check_definition(self.id())?;
        let resolved = self
            .memo
            .counterpart
            .get_or_resolve(|| Resolver::new(project).find_accessor_counterpart(self))?;
        Ok(resolved.flatten())
    }

    /// Base classes from the direct base up to the root. Stops at the first
    /// repeated class, so cyclic hierarchies terminate.
    pub fn ancestors(&self, project: &Project) -> Result<Vec<Arc<Definition>>> {
        let mut out: Vec<Arc<Definition>> = Vec::new();
        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        seen.insert(self.id);
        let mut next = self.resolve_base_class(project)?;
        while let Some(def) = next {
            if !seen.insert(def.id) {
                break;
            }
            next = def.resolve_base_class(project)?;
            out.push(def);
        }
        Ok(out)
    }

    /// Whether this class or interface is `other` or derives from it.
    pub fn is_instance_of(&self, other: &Definition, project: &Project) -> Result<bool> {
        if self.id == other.id || (self.qname == other.qname && self.kind() == other.kind()) {
            return Ok(true);
        }
        let mut stack = vec![];
        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        seen.insert(self.id);
        stack.extend(self.resolve_base_class(project)?);
        stack.extend(self.resolve_interfaces(project)?);
        while let Some(def) = stack.pop() {
            if !seen.insert(def.id) {
                continue;
            }
            if def.id == other.id || (def.qname == other.qname && def.kind() == other.kind()) {
                return Ok(true);
            }
            stack.extend(def.resolve_base_class(project)?);
            stack.extend(def.resolve_interfaces(project)?);
        }
        Ok(false)
    }

    /// Memoized base class, if it has been resolved already.
    pub fn cached_base_class(&self) -> Option<Option<Arc<Definition>>> {
        self.memo.base_class.peek()
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("qname", &self.qname)
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make(name: &str, data: DefinitionData) -> Definition {
        Definition::new(DefinitionInit {
            id: DefId::new(UnitId::new(0), 0, LocalDefId::new(0)),
            name: name.into(),
            qname: QName::new("pkg", name),
            data,
            namespace: NamespaceReference::Public("pkg".into()),
            modifiers: Modifiers::default(),
            location: None,
            scope: ScopeId(0),
            contained_scope: None,
            parent: None,
        })
    }

    #[test]
    fn test_kind_from_data() {
        let getter = make(
            "x",
            DefinitionData::Function {
                accessor: Some(AccessorKind::Getter),
                params: Vec::new(),
                return_type: None,
            },
        );
        assert_eq!(getter.kind(), DefinitionKind::Getter);
        assert!(getter.kind().is_accessor());

        let class = make(
            "A",
            DefinitionData::Class {
                base: None,
                interfaces: Vec::new(),
            },
        );
        assert!(class.kind().is_type());
        assert!(!class.is_object_root());
    }

    #[test]
    fn test_meta_tags_attached_before_sharing() {
        let mut def = make("A", DefinitionData::Package);
        let mut tag = MetaTag::new("Event");
        tag.attributes.push(MetaAttribute {
            key: Some("name".into()),
            value: "change".into(),
        });
        def.add_meta_tag(tag);
        def.add_meta_tag(MetaTag::new("Bindable"));

        let def = Arc::new(def);
        assert!(def.has_meta_tag("Bindable"));
        assert_eq!(def.meta_tag("Event").and_then(|t| t.attribute("name")), Some("change"));
        assert_eq!(def.meta_tags().len(), 2);
    }

    #[test]
    fn test_resolve_cell_memoizes() {
        let cell: ResolveCell<u32> = ResolveCell::default();
        let calls = AtomicUsize::new(0);
        let first = cell.get_or_resolve(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        });
        let second = cell.get_or_resolve(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(8)
        });
        assert_eq!(first.unwrap(), Some(7));
        assert_eq!(second.unwrap(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_cell_reentry_reports_cycle() {
        let cell: ResolveCell<u32> = ResolveCell::default();
        let outer = cell.get_or_resolve(|| {
            let inner = cell.get_or_resolve(|| Ok(1))?;
            assert_eq!(inner, None);
            Ok(2)
        });
        assert_eq!(outer.unwrap(), Some(2));
    }

    #[test]
    fn test_resolve_cell_error_is_not_memoized() {
        let cell: ResolveCell<u32> = ResolveCell::default();
        let failed = cell.get_or_resolve(|| Err(crate::error::CompileError::Interrupted));
        assert!(failed.is_err());
        assert_eq!(cell.get_or_resolve(|| Ok(3)).unwrap(), Some(3));
    }

    #[test]
    fn test_type_name_display() {
        let mut name = TypeName::new("Vector", TextRange::default());
        name.argument = Some(Box::new(TypeName::new("pkg.Item", TextRange::default())));
        assert_eq!(name.to_string(), "Vector.<pkg.Item>");
        assert!(TypeName::new("*", TextRange::default()).is_any());
    }
}
