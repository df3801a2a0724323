//! Building a unit's file scope from its outline tree.
//!
//! Lowering creates every [`Definition`] of a unit, assigns namespaces,
//! builds the [`ScopeTree`], and collects the references that semantic
//! analysis resolves later. It never looks outside the unit.

use std::sync::Arc;

use smol_str::{format_smolstr, SmolStr};

use crate::base::{LineIndex, QName, TextRange};
use crate::syntax::ast::*;

use super::definitions::{
    Definition, DefinitionData, DefinitionInit, DefinitionKind, MetaAttribute, MetaTag, Modifiers,
    Parameter, TypeName,
};
use super::diagnostics::{Problem, ProblemKind, RelatedInfo, SourceLocation};
use super::ids::{DefId, FileId, LocalDefId, ScopeId, UnitId};
use super::namespace::NamespaceReference;
use super::scope::{Import, ScopeKind, ScopeTree};

// ============================================================================
// RESULT
// ============================================================================

/// What a reference is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `import a.b.C`
    Import,
    /// `use namespace ns`
    UseNamespace,
    /// Type annotation of a local variable or nested function parameter.
    LocalType,
    /// Identifier chain in a body or initializer.
    Expression { is_call: bool },
}

/// A name used somewhere in a unit, resolved during semantic analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub name: SmolStr,
    /// Scope the name is looked up from.
    pub scope: ScopeId,
    pub range: TextRange,
}

/// Definitions and scopes of one unit generation.
#[derive(Debug)]
pub struct FileScopeResult {
    pub unit: UnitId,
    pub generation: u32,
    pub file: Option<FileId>,
    pub scopes: ScopeTree,
    /// Indexed by [`LocalDefId`].
    pub definitions: Vec<Arc<Definition>>,
    /// Package-level definitions published to the project scope.
    pub externally_visible: Vec<LocalDefId>,
    pub references: Vec<Reference>,
    pub problems: Vec<Problem>,
    pub(crate) line_index: Option<Arc<LineIndex>>,
}

impl FileScopeResult {
    pub fn definition(&self, local: LocalDefId) -> Option<&Arc<Definition>> {
        self.definitions.get(local.index())
    }

    pub fn externally_visible(&self) -> impl Iterator<Item = &Arc<Definition>> {
        self.externally_visible
            .iter()
            .filter_map(|local| self.definition(*local))
    }

    /// Qualified names of the externally visible definitions, deduplicated.
    pub fn qualified_names(&self) -> Vec<QName> {
        let mut names: Vec<QName> = Vec::new();
        for def in self.externally_visible() {
            if !names.contains(def.qname()) {
                names.push(def.qname().clone());
            }
        }
        names
    }

    /// Definitions named `name` declared directly in `scope`.
    pub fn local_definitions(&self, scope: ScopeId, name: &str) -> Vec<Arc<Definition>> {
        self.scopes
            .local_definitions(scope, name)
            .iter()
            .filter_map(|local| self.definition(*local).cloned())
            .collect()
    }

    /// Members of a class or interface named `name`.
    pub fn members(&self, owner: &Definition, name: &str) -> Vec<Arc<Definition>> {
        match owner.contained_scope() {
            Some(scope) if owner.kind().is_type() => self.local_definitions(scope, name),
            _ => Vec::new(),
        }
    }

    /// Every member of a class or interface, in declaration order.
    pub fn all_members(&self, owner: &Definition) -> Vec<Arc<Definition>> {
        let Some(scope) = owner.contained_scope().and_then(|id| self.scopes.get(id)) else {
            return Vec::new();
        };
        scope
            .definitions()
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|local| self.definition(*local).cloned())
            .collect()
    }

    pub(crate) fn location(&self, range: TextRange) -> Option<SourceLocation> {
        locate(self.file, self.line_index.as_deref(), range)
    }
}

fn locate(file: Option<FileId>, index: Option<&LineIndex>, range: TextRange) -> Option<SourceLocation> {
    let file = file?;
    let (start, end) = match index {
        Some(index) => index.range(range),
        None => Default::default(),
    };
    Some(SourceLocation {
        file,
        range,
        start,
        end,
    })
}

// ============================================================================
// LOWERING
// ============================================================================

/// Inputs of [`lower_file`].
pub(crate) struct LowerContext {
    pub unit: UnitId,
    pub generation: u32,
    pub file: Option<FileId>,
    pub line_index: Option<Arc<LineIndex>>,
}

/// Build the file scope of a unit.
pub(crate) fn lower_file(ctx: LowerContext, file: &FileNode) -> FileScopeResult {
    let mut lowerer = Lowerer {
        ctx,
        scopes: ScopeTree::new(),
        definitions: Vec::new(),
        externally_visible: Vec::new(),
        references: Vec::new(),
        problems: Vec::new(),
    };
    lowerer.items(&file.items, ScopeTree::FILE, &Container::File);

    let Lowerer {
        ctx,
        scopes,
        definitions,
        externally_visible,
        references,
        problems,
    } = lowerer;

    tracing::trace!(
        unit = %ctx.unit,
        definitions = definitions.len(),
        references = references.len(),
        "lowered file scope"
    );

    FileScopeResult {
        unit: ctx.unit,
        generation: ctx.generation,
        file: ctx.file,
        scopes,
        definitions: definitions.into_iter().map(Arc::new).collect(),
        externally_visible,
        references,
        problems,
        line_index: ctx.line_index,
    }
}

/// Where a declaration appears.
#[derive(Clone, Debug)]
enum Container {
    /// Outside any package block.
    File,
    Package(SmolStr),
    Type {
        def: LocalDefId,
        /// Dotted name of the type.
        path: SmolStr,
        package: SmolStr,
        is_interface: bool,
    },
}

impl Container {
    fn package(&self) -> SmolStr {
        match self {
            Container::File => SmolStr::default(),
            Container::Package(pkg) => pkg.clone(),
            Container::Type { package, .. } => package.clone(),
        }
    }

    /// Prefix of qualified names declared here.
    fn path(&self) -> SmolStr {
        match self {
            Container::Type { path, .. } => path.clone(),
            other => other.package(),
        }
    }

    fn parent(&self) -> Option<LocalDefId> {
        match self {
            Container::Type { def, .. } => Some(*def),
            _ => None,
        }
    }
}

struct Lowerer {
    ctx: LowerContext,
    scopes: ScopeTree,
    definitions: Vec<Definition>,
    externally_visible: Vec<LocalDefId>,
    references: Vec<Reference>,
    problems: Vec<Problem>,
}

struct Declared {
    name: SmolStr,
    name_range: TextRange,
    data: DefinitionData,
    attributes: Attributes,
    meta: Vec<MetaTagNode>,
    contained: Option<ScopeKindSeed>,
}

/// Scope opened by a declaration, created once its definition ID is known.
#[derive(Clone, Copy)]
enum ScopeKindSeed {
    Type,
    Function,
}

impl Lowerer {
    fn items(&mut self, items: &[Item], scope: ScopeId, container: &Container) {
        for item in items {
            self.item(item, scope, container);
        }
    }

    fn item(&mut self, item: &Item, scope: ScopeId, container: &Container) {
        match item {
            Item::Package(package) => self.package(package, scope, container),
            Item::Import(import) => {
                self.scopes.add_import(
                    scope,
                    Import {
                        target: import.target.clone(),
                        wildcard: import.wildcard,
                    },
                );
                if !import.wildcard {
                    self.reference(ReferenceKind::Import, import.target.clone(), scope, import.range);
                }
            }
            Item::UseNamespace(node) => {
                self.scopes.add_used_namespace(scope, node.namespace.clone());
                self.reference(
                    ReferenceKind::UseNamespace,
                    node.namespace.clone(),
                    scope,
                    node.range,
                );
            }
            Item::Class(class) => {
                if matches!(container, Container::Type { .. }) {
                    self.syntax_problem("classes cannot be nested", class.name_range);
                }
                let declared = Declared {
                    name: class.name.clone(),
                    name_range: class.name_range,
                    data: DefinitionData::Class {
                        base: class.extends.as_ref().map(TypeName::from),
                        interfaces: class.implements.iter().map(TypeName::from).collect(),
                    },
                    attributes: class.attributes.clone(),
                    meta: class.meta.clone(),
                    contained: Some(ScopeKindSeed::Type),
                };
                let (local, inner) = self.declare(declared, scope, container);
                if let Some(inner) = inner {
                    let nested = self.type_container(local, &class.name, container, false);
                    self.items(&class.members, inner, &nested);
                }
            }
            Item::Interface(interface) => {
                if matches!(container, Container::Type { .. }) {
                    self.syntax_problem("interfaces cannot be nested", interface.name_range);
                }
                let declared = Declared {
                    name: interface.name.clone(),
                    name_range: interface.name_range,
                    data: DefinitionData::Interface {
                        extends: interface.extends.iter().map(TypeName::from).collect(),
                    },
                    attributes: interface.attributes.clone(),
                    meta: interface.meta.clone(),
                    contained: Some(ScopeKindSeed::Type),
                };
                let (local, inner) = self.declare(declared, scope, container);
                if let Some(inner) = inner {
                    let nested = self.type_container(local, &interface.name, container, true);
                    self.items(&interface.members, inner, &nested);
                }
            }
            Item::Function(function) => self.function(function, scope, container),
            Item::Variable(variable) => {
                let declared = Declared {
                    name: variable.name.clone(),
                    name_range: variable.name_range,
                    data: DefinitionData::Variable {
                        type_name: variable.type_ref.as_ref().map(TypeName::from),
                        is_const: variable.is_const,
                    },
                    attributes: variable.attributes.clone(),
                    meta: variable.meta.clone(),
                    contained: None,
                };
                self.declare(declared, scope, container);
                if let Some(initializer) = &variable.initializer {
                    self.body(initializer, scope);
                }
            }
            Item::Namespace(namespace) => {
                let uri = namespace.uri.clone().unwrap_or_else(|| {
                    let path = container.path();
                    if path.is_empty() {
                        namespace.name.clone()
                    } else {
                        format_smolstr!("{path}:{}", namespace.name)
                    }
                });
                let declared = Declared {
                    name: namespace.name.clone(),
                    name_range: namespace.name_range,
                    data: DefinitionData::Namespace { uri },
                    attributes: namespace.attributes.clone(),
                    meta: Vec::new(),
                    contained: None,
                };
                self.declare(declared, scope, container);
            }
            Item::Statements(body) => self.body(body, scope),
        }
    }

    fn package(&mut self, package: &PackageNode, scope: ScopeId, container: &Container) {
        if !matches!(container, Container::File) {
            self.syntax_problem("packages cannot be nested", package.range);
        }
        let local = LocalDefId::new(self.definitions.len() as u32);
        let inner = self
            .scopes
            .add_scope(ScopeKind::Package(package.name.clone()), scope);
        let location = self.location(package.range);
        self.definitions.push(Definition::new(DefinitionInit {
            id: self.def_id(local),
            name: package.name.clone(),
            qname: QName::top_level(package.name.clone()),
            data: DefinitionData::Package,
            namespace: NamespaceReference::Public(package.name.clone()),
            modifiers: Modifiers::default(),
            location,
            scope,
            contained_scope: Some(inner),
            parent: None,
        }));
        self.items(&package.items, inner, &Container::Package(package.name.clone()));
    }

    fn function(&mut self, function: &FunctionNode, scope: ScopeId, container: &Container) {
        let params: Vec<Parameter> = function
            .parameters
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                type_name: p.type_ref.as_ref().map(TypeName::from),
                has_default: p.has_default,
                is_rest: p.is_rest,
            })
            .collect();
        let declared = Declared {
            name: function.name.clone(),
            name_range: function.name_range,
            data: DefinitionData::Function {
                accessor: function.accessor,
                params,
                return_type: function.return_type.as_ref().map(TypeName::from),
            },
            attributes: function.attributes.clone(),
            meta: function.meta.clone(),
            contained: Some(ScopeKindSeed::Function),
        };
        let (_, inner) = self.declare(declared, scope, container);
        let Some(inner) = inner else {
            return;
        };
        for parameter in &function.parameters {
            self.scopes.add_local(inner, parameter.name.clone());
        }
        if let Some(body) = &function.body {
            self.body(body, inner);
        }
    }

    fn body(&mut self, body: &BodyNode, scope: ScopeId) {
        for local in &body.locals {
            self.scopes.add_local(scope, local.name.clone());
            if let Some(type_ref) = &local.type_ref {
                self.type_reference(type_ref, scope);
            }
        }
        for reference in &body.references {
            self.reference(
                ReferenceKind::Expression {
                    is_call: reference.is_call,
                },
                reference.chain.clone(),
                scope,
                reference.range,
            );
        }
    }

    fn type_reference(&mut self, type_ref: &TypeRefNode, scope: ScopeId) {
        if type_ref.name != "*" && type_ref.name != "void" {
            self.reference(ReferenceKind::LocalType, type_ref.name.clone(), scope, type_ref.range);
        }
        if let Some(argument) = &type_ref.argument {
            self.type_reference(argument, scope);
        }
    }

    fn type_container(
        &self,
        def: LocalDefId,
        name: &SmolStr,
        outer: &Container,
        is_interface: bool,
    ) -> Container {
        let package = outer.package();
        let path = if package.is_empty() {
            name.clone()
        } else {
            format_smolstr!("{package}.{name}")
        };
        Container::Type {
            def,
            path,
            package,
            is_interface,
        }
    }

    /// Create a definition, register it in `scope`, and open its inner scope.
    fn declare(
        &mut self,
        declared: Declared,
        scope: ScopeId,
        container: &Container,
    ) -> (LocalDefId, Option<ScopeId>) {
        let local = LocalDefId::new(self.definitions.len() as u32);
        let namespace = self.namespace_for(&declared.attributes.namespace, container);

        self.check_duplicate(&declared, &namespace, scope, container);

        let contained_scope = declared.contained.map(|seed| {
            let kind = match seed {
                ScopeKindSeed::Type => ScopeKind::Type(local),
                ScopeKindSeed::Function => ScopeKind::Function(local),
            };
            self.scopes.add_scope(kind, scope)
        });

        let path = container.path();
        let mut definition = Definition::new(DefinitionInit {
            id: self.def_id(local),
            name: declared.name.clone(),
            qname: QName::new(path, declared.name.clone()),
            data: declared.data,
            namespace,
            modifiers: Modifiers {
                is_static: declared.attributes.is_static,
                is_override: declared.attributes.is_override,
                is_final: declared.attributes.is_final,
                is_dynamic: declared.attributes.is_dynamic,
                is_native: declared.attributes.is_native,
            },
            location: self.location(declared.name_range),
            scope,
            contained_scope,
            parent: container.parent(),
        });
        for tag in &declared.meta {
            definition.add_meta_tag(MetaTag {
                name: tag.name.clone(),
                attributes: tag
                    .attributes
                    .iter()
                    .map(|attr| MetaAttribute {
                        key: attr.key.clone(),
                        value: attr.value.clone(),
                    })
                    .collect(),
            });
        }

        self.definitions.push(definition);
        self.scopes.add_definition(scope, declared.name, local);
        if matches!(container, Container::Package(_)) {
            self.externally_visible.push(local);
        }
        (local, contained_scope)
    }

    fn namespace_for(&self, attr: &NamespaceAttr, container: &Container) -> NamespaceReference {
        match container {
            Container::File => match attr {
                NamespaceAttr::Custom(name) => NamespaceReference::Custom(name.clone()),
                _ => NamespaceReference::FilePrivate(self.ctx.unit),
            },
            Container::Package(pkg) => match attr {
                NamespaceAttr::Public => NamespaceReference::Public(pkg.clone()),
                NamespaceAttr::Custom(name) => NamespaceReference::Custom(name.clone()),
                _ => NamespaceReference::Internal(pkg.clone()),
            },
            Container::Type {
                path,
                package,
                is_interface,
                ..
            } => match attr {
                NamespaceAttr::Public => NamespaceReference::Public(SmolStr::default()),
                NamespaceAttr::Private => NamespaceReference::Private(path.clone()),
                NamespaceAttr::Protected => NamespaceReference::Protected(path.clone()),
                NamespaceAttr::Custom(name) => NamespaceReference::Custom(name.clone()),
                NamespaceAttr::Internal => NamespaceReference::Internal(package.clone()),
                NamespaceAttr::Default if *is_interface => {
                    NamespaceReference::Public(SmolStr::default())
                }
                NamespaceAttr::Default => NamespaceReference::Internal(package.clone()),
            },
        }
    }

    /// Two definitions in one namespace may not share a name within a scope.
    /// Getter/setter pairs and redeclared package functions are fine.
    fn check_duplicate(
        &mut self,
        declared: &Declared,
        namespace: &NamespaceReference,
        scope: ScopeId,
        container: &Container,
    ) {
        let existing = self.scopes.local_definitions(scope, &declared.name).to_vec();
        let new_kind = kind_of(&declared.data);
        for local in existing {
            let Some(previous) = self.definitions.get(local.index()) else {
                continue;
            };
            if previous.namespace() != namespace {
                continue;
            }
            let old_kind = previous.kind();
            let conflict = match container {
                Container::Type { .. } => {
                    previous.is_static() == declared.attributes.is_static
                        && !(old_kind.is_accessor() && new_kind.is_accessor() && old_kind != new_kind)
                }
                _ => {
                    !(old_kind == DefinitionKind::Function && new_kind == DefinitionKind::Function)
                        && !(old_kind.is_accessor() && new_kind.is_accessor() && old_kind != new_kind)
                }
            };
            if conflict {
                let related = RelatedInfo {
                    location: previous.location().copied(),
                    message: Arc::from(format!("previous definition of '{}'", declared.name)),
                };
                let problem = Problem::error(
                    ProblemKind::DuplicateDefinition,
                    format!("duplicate definition: '{}' is already defined", declared.name),
                )
                .with_unit(self.ctx.unit)
                .with_location(self.location(declared.name_range))
                .with_related(related);
                self.problems.push(problem);
                return;
            }
        }
    }

    fn reference(&mut self, kind: ReferenceKind, name: SmolStr, scope: ScopeId, range: TextRange) {
        self.references.push(Reference {
            kind,
            name,
            scope,
            range,
        });
    }

    fn syntax_problem(&mut self, message: &str, range: TextRange) {
        let problem = Problem::error(ProblemKind::SyntaxError, message)
            .with_unit(self.ctx.unit)
            .with_location(self.location(range));
        self.problems.push(problem);
    }

    fn def_id(&self, local: LocalDefId) -> DefId {
        DefId::new(self.ctx.unit, self.ctx.generation, local)
    }

    fn location(&self, range: TextRange) -> Option<SourceLocation> {
        locate(self.ctx.file, self.ctx.line_index.as_deref(), range)
    }
}

fn kind_of(data: &DefinitionData) -> DefinitionKind {
    match data {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_actionscript;

    fn lower(text: &str) -> FileScopeResult {
        let parse = parse_actionscript(text);
        assert!(parse.errors.is_empty(), "{:?}", parse.errors);
        let index = Arc::new(LineIndex::new(text));
        lower_file(
            LowerContext {
                unit: UnitId::new(7),
                generation: 2,
                file: Some(FileId::new(1)),
                line_index: Some(index),
            },
            &parse.file,
        )
    }

    fn find<'a>(result: &'a FileScopeResult, dotted: &str) -> &'a Arc<Definition> {
        result
            .definitions
            .iter()
            .find(|d| d.qname().to_dotted() == dotted && d.kind() != DefinitionKind::Package)
            .unwrap_or_else(|| panic!("no definition {dotted}"))
    }

    #[test]
    fn test_package_definitions_are_externally_visible() {
        let result = lower(
            "package pkg { public class A { public function run():void {} private var x:int; } }
             class Helper {}",
        );
        assert_eq!(result.qualified_names(), vec![QName::new("pkg", "A")]);

        let a = find(&result, "pkg.A");
        assert_eq!(a.namespace(), &NamespaceReference::Public("pkg".into()));
        assert_eq!(a.id(), DefId::new(UnitId::new(7), 2, a.id().local));

        let run = find(&result, "pkg.A.run");
        assert_eq!(run.namespace(), &NamespaceReference::Public("".into()));
        assert_eq!(run.parent(), Some(a.id().local));

        let x = find(&result, "pkg.A.x");
        assert_eq!(x.namespace(), &NamespaceReference::Private("pkg.A".into()));

        let helper = find(&result, "Helper");
        assert_eq!(helper.namespace(), &NamespaceReference::FilePrivate(UnitId::new(7)));
    }

    #[test]
    fn test_locations_use_line_index() {
        let result = lower("package pkg {\n  public class A {}\n}");
        let a = find(&result, "pkg.A");
        let location = a.location().unwrap();
        assert_eq!(location.file, FileId::new(1));
        assert_eq!(location.start.line, 1);
        assert_eq!(location.start.col, 15);
    }

    #[test]
    fn test_members_and_accessor_pairs() {
        let result = lower(
            "package pkg { public class A {
                public function get x():int { return 0; }
                public function set x(v:int):void {}
            } }",
        );
        let a = find(&result, "pkg.A");
        let xs = result.members(a, "x");
        assert_eq!(xs.len(), 2);
        assert!(result.problems.is_empty());
    }

    #[test]
    fn test_duplicate_members_are_reported() {
        let result = lower("package pkg { public class A { var x:int; var x:String; } }");
        assert_eq!(result.problems.len(), 1);
        assert_eq!(result.problems[0].kind, ProblemKind::DuplicateDefinition);
        assert_eq!(result.problems[0].related.len(), 1);
    }

    #[test]
    fn test_redeclared_package_functions_are_allowed() {
        let result = lower("package pkg { public function f():void {} public function f():void {} }");
        assert!(result.problems.is_empty());
        assert_eq!(result.qualified_names(), vec![QName::new("pkg", "f")]);
    }

    #[test]
    fn test_references_and_scopes() {
        let result = lower(
            "package pkg {
                import other.Thing;
                import flash.events.*;
                public class A {
                    use namespace mx_internal;
                    public function run(arg:Object):void {
                        var local:Helper = Factory.make(arg);
                    }
                }
            }",
        );
        let kinds: Vec<(ReferenceKind, &str)> = result
            .references
            .iter()
            .map(|r| (r.kind, r.name.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ReferenceKind::Import, "other.Thing"),
                (ReferenceKind::UseNamespace, "mx_internal"),
                (ReferenceKind::LocalType, "Helper"),
                (ReferenceKind::Expression { is_call: true }, "Factory.make"),
                (ReferenceKind::Expression { is_call: false }, "arg"),
            ]
        );

        let run = find(&result, "pkg.A.run");
        let body = run.contained_scope().unwrap();
        let scope = result.scopes.get(body).unwrap();
        assert!(scope.has_local("arg"));
        assert!(scope.has_local("local"));
        assert_eq!(result.scopes.package_of(body), "pkg");
    }

    #[test]
    fn test_meta_tags_and_default_namespace_uri() {
        let result = lower(
            "package pkg { [Bindable] public class A { public namespace ns; } }",
        );
        let a = find(&result, "pkg.A");
        assert!(a.has_meta_tag("Bindable"));
        let ns = find(&result, "pkg.A.ns");
        assert_eq!(
            ns.data(),
            &DefinitionData::Namespace {
                uri: "pkg.A:ns".into()
            }
        );
    }
}
