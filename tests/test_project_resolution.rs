//! End-to-end resolution scenarios over in-memory projects.

use std::sync::Arc;

use asc::hir::{DependencyType, PackageLocalResolver, ProblemKind, ResolvedType};
use asc::project::{StringFile, ZipEntryFile};
use asc::{CompileError, Project, ProjectConfig, QName, Workspace};
use rstest::rstest;

fn project(workspace: &Workspace, files: &[(&str, &str)]) -> Arc<Project> {
    let project = workspace
        .create_project(
            ProjectConfig::new()
                .with_source_path("/src")
                .with_library_path("/libs"),
        )
        .unwrap();
    for (path, text) in files {
        project
            .add_file_specification(Arc::new(StringFile::new(*path, *text)))
            .unwrap();
    }
    project
}

fn qname(dotted: &str) -> QName {
    QName::parse(dotted).unwrap()
}

#[test]
fn test_base_class_and_swf_order() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[
            ("/src/pkg/A.as", "package pkg { public class A extends B {} }"),
            ("/src/pkg/B.as", "package pkg { public class B {} }"),
        ],
    );

    let a = project.resolve_qname_to_definition(&qname("pkg.A")).unwrap().unwrap();
    let base = a.resolve_base_class(&project).unwrap().unwrap();
    assert_eq!(base.qname(), &qname("pkg.B"));

    let order: Vec<String> = project
        .reachable_compilation_units_in_swf_order(&[a.unit()])
        .iter()
        .map(|unit| unit.name().to_string())
        .collect();
    assert_eq!(order, vec!["/src/pkg/B.as", "/src/pkg/A.as"]);
    assert_eq!(
        project.graph().dependency_type(a.unit(), base.unit()),
        Some(DependencyType::Inheritance)
    );
}

#[test]
fn test_source_path_beats_library() {
    let workspace = Workspace::new();
    let project = project(&workspace, &[]);
    project
        .add_library_entry(ZipEntryFile::new(
            "/libs/core.swc",
            "pkg/C.as",
            b"package pkg { public class C {} }".to_vec(),
        ))
        .unwrap();
    let source = project
        .add_file_specification(Arc::new(StringFile::new(
            "/src/pkg/C.as",
            "package pkg { public class C {} }",
        )))
        .unwrap();

    let unit = project
        .resolve_qname_to_compilation_unit(&qname("pkg.C"))
        .unwrap()
        .unwrap();
    assert_eq!(unit.id(), source.id());
}

#[test]
fn test_removing_winner_unshadows_library() {
    let workspace = Workspace::new();
    let project = project(&workspace, &[("/src/pkg/C.as", "package pkg { public class C {} }")]);
    let library = project
        .add_library_entry(ZipEntryFile::new(
            "/libs/core.swc",
            "pkg/C.as",
            b"package pkg { public class C {} }".to_vec(),
        ))
        .unwrap();
    let winner = project
        .resolve_qname_to_compilation_unit(&qname("pkg.C"))
        .unwrap()
        .unwrap();
    assert_ne!(winner.id(), library.id());

    project.remove_compilation_units(&[winner.id()]);
    let now = project
        .resolve_qname_to_compilation_unit(&qname("pkg.C"))
        .unwrap()
        .unwrap();
    assert_eq!(now.id(), library.id());
}

#[test]
fn test_accessor_pair() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[(
            "/src/pkg/P.as",
            "package pkg { public class P {
                public function get x():int { return 0; }
                public function set x(v:int):void {}
            } }",
        )],
    );
    let unit = project.units()[0].clone();
    let scope = unit.file_scope().unwrap();
    let getter = scope
        .definitions
        .iter()
        .find(|def| def.kind() == asc::DefinitionKind::Getter)
        .unwrap();
    let setter = getter.resolve_setter(&project).unwrap().unwrap();
    assert_eq!(setter.kind(), asc::DefinitionKind::Setter);
    let back = setter.resolve_getter(&project).unwrap().unwrap();
    assert!(Arc::ptr_eq(&back, getter));
    assert!(matches!(getter.resolve_type(&project).unwrap(), ResolvedType::Builtin(name) if name == "int"));
}

#[test]
fn test_mutual_dependency_terminates() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[
            ("/src/X.as", "package { public class X extends Y {} }"),
            (
                "/src/Y.as",
                "package { public class Y { public function make():void { new X(); } } }",
            ),
        ],
    );
    let x = project.units()[0].clone();
    let y = project.units()[1].clone();
    x.outgoing_dependencies().unwrap();
    y.outgoing_dependencies().unwrap();

    assert_eq!(project.graph().dependency_type(x.id(), y.id()), Some(DependencyType::Inheritance));
    let weak = project.graph().dependency_type(y.id(), x.id()).unwrap();
    assert!(weak > DependencyType::Inheritance);

    for root in [x.id(), y.id()] {
        let order: Vec<_> = project
            .reachable_compilation_units_in_swf_order(&[root])
            .iter()
            .map(|unit| unit.id())
            .collect();
        assert_eq!(order, vec![y.id(), x.id()]);
    }
}

#[test]
fn test_deleted_project_invalidates_units() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[
            ("/src/pkg/A.as", "package pkg { public class A extends B {} }"),
            ("/src/pkg/B.as", "package pkg { public class B {} }"),
        ],
    );
    let a = project.resolve_qname_to_definition(&qname("pkg.A")).unwrap().unwrap();
    a.resolve_base_class(&project).unwrap();
    let unit = project.unit(a.unit()).unwrap();

    workspace.delete_project(project.id()).unwrap();
    assert!(matches!(a.resolve_base_class(&project), Err(CompileError::InvalidUnit(_))));
    assert!(matches!(unit.file_scope(), Err(CompileError::InvalidUnit(_))));
    assert!(matches!(unit.outgoing_dependencies(), Err(CompileError::InvalidUnit(_))));
}

#[test]
fn test_resolution_is_reference_stable() {
    let workspace = Workspace::new();
    let project = project(&workspace, &[("/src/pkg/A.as", "package pkg { public class A {} }")]);
    let first = project.resolve_qname_to_definition(&qname("pkg.A")).unwrap().unwrap();
    let second = project.resolve_qname_to_definition(&qname("pkg.A")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_ambiguous_import_is_reported_with_stable_pick() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[
            ("/src/a/C.as", "package a { public class C {} }"),
            ("/src/b/C.as", "package b { public class C {} }"),
            (
                "/src/Main.as",
                "package { import a.*; import b.*; public class Main { public var c:C; } }",
            ),
        ],
    );
    let main = project.units()[2].clone();

    let mut picks = Vec::new();
    for _ in 0..2 {
        main.outgoing_dependencies().unwrap();
        let ambiguous: Vec<_> = project
            .problems()
            .into_iter()
            .filter(|p| p.kind == ProblemKind::AmbiguousDefinition)
            .collect();
        assert_eq!(ambiguous.len(), 1, "{ambiguous:?}");
        let field = main
            .file_scope()
            .unwrap()
            .definitions
            .iter()
            .find(|def| def.name() == "c")
            .cloned()
            .unwrap();
        let picked = field.resolve_type(&project).unwrap();
        picks.push(picked.definition().unwrap().qname().clone());
        project.clean();
    }
    assert_eq!(picks[0], qname("a.C"));
    assert_eq!(picks[0], picks[1]);
}

#[test]
fn test_package_local_resolver_breaks_tie() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[
            ("/src/a/C.as", "package a { public class C {} }"),
            ("/src/b/C.as", "package b { public class C {} }"),
            (
                "/src/b/Main.as",
                "package b { import a.*; public class Main { public var c:C; } }",
            ),
        ],
    );
    project.set_ambiguity_resolver(Arc::new(PackageLocalResolver));
    let main = project.units()[2].clone();
    main.outgoing_dependencies().unwrap();
    assert!(
        project
            .problems()
            .iter()
            .all(|p| p.kind != ProblemKind::AmbiguousDefinition)
    );
    let field = main
        .file_scope()
        .unwrap()
        .definitions
        .iter()
        .find(|def| def.name() == "c")
        .cloned()
        .unwrap();
    let resolved = field.resolve_type(&project).unwrap();
    assert_eq!(resolved.definition().unwrap().qname(), &qname("b.C"));
}

#[rstest]
#[case::exact(false, true)]
#[case::subclass(true, false)]
fn test_covariant_return_override(#[case] subclass_overrides: bool, #[case] reported: bool) {
    let workspace = Workspace::new();
    let project = workspace
        .create_project(
            ProjectConfig::new()
                .with_source_path("/src")
                .with_subclass_overrides(subclass_overrides),
        )
        .unwrap();
    for (path, text) in [
        ("/src/Animal.as", "package { public class Animal {} }"),
        ("/src/Dog.as", "package { public class Dog extends Animal {} }"),
        (
            "/src/Shelter.as",
            "package { public class Shelter { public function adopt():Animal { return null; } } }",
        ),
        (
            "/src/Kennel.as",
            "package { public class Kennel extends Shelter { override public function adopt():Dog { return null; } } }",
        ),
    ] {
        project.add_file_specification(Arc::new(StringFile::new(path, text))).unwrap();
    }
    let kennel = project.units()[3].clone();
    kennel.outgoing_dependencies().unwrap();
    let incompatible = project
        .problems()
        .iter()
        .any(|p| p.kind == ProblemKind::IncompatibleOverride);
    assert_eq!(incompatible, reported);
}

#[test]
fn test_missing_override_and_unresolved_base() {
    let workspace = Workspace::new();
    let project = project(
        &workspace,
        &[
            ("/src/Base.as", "package { public class Base { public function run():void {} } }"),
            ("/src/Sub.as", "package { public class Sub extends Base { public function run():void {} } }"),
            ("/src/Orphan.as", "package { public class Orphan extends Nowhere {} }"),
        ],
    );
    for unit in project.units() {
        unit.outgoing_dependencies().unwrap();
    }
    let kinds: Vec<ProblemKind> = project.problems().iter().map(|p| p.kind).collect();
    assert!(kinds.contains(&ProblemKind::MissingOverride), "{kinds:?}");
    assert!(kinds.contains(&ProblemKind::UnresolvedReference), "{kinds:?}");
}
