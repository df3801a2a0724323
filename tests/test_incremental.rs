//! Invalidation after edits, file notifications and late providers.

use std::fs;
use std::sync::Arc;

use asc::hir::{ProblemKind, ResolvedType, UnitState};
use asc::project::{StringFile, WorkspaceLoader};
use asc::{Project, ProjectConfig, QName, Workspace};

fn project(workspace: &Workspace) -> Arc<Project> {
    workspace
        .create_project(ProjectConfig::new().with_source_path("/src"))
        .unwrap()
}

fn add(workspace: &Workspace, project: &Project, path: &str, text: &str) -> Arc<asc::CompilationUnit> {
    workspace.add_string_file(path, text).unwrap();
    project.add_source_file(path).unwrap()
}

#[test]
fn test_edit_replaces_definitions() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    add(&workspace, &project, "/src/pkg/A.as", "package pkg { public class A {} }");

    let old = project
        .resolve_qname_to_definition(&QName::new("pkg", "A"))
        .unwrap()
        .unwrap();

    workspace
        .add_string_file("/src/pkg/A.as", "package pkg { public class A {} public function helper():void {} }")
        .unwrap();

    let new = project
        .resolve_qname_to_definition(&QName::new("pkg", "A"))
        .unwrap()
        .unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert_ne!(old.id(), new.id());
    assert_eq!(project.lookup_qname(&QName::new("pkg", "A")).unwrap().len(), 1);
    assert!(!project.lookup_qname(&QName::new("pkg", "helper")).unwrap().is_empty());
}

#[test]
fn test_base_edit_invalidates_subclass() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let base = add(&workspace, &project, "/src/Base.as", "package { public class Base {} }");
    let sub = add(&workspace, &project, "/src/Sub.as", "package { public class Sub extends Base {} }");
    sub.outgoing_dependencies().unwrap();
    let generation = sub.generation();

    workspace
        .add_string_file("/src/Base.as", "package { public class Base { public function f():void {} } }")
        .unwrap();
    assert!(base.generation() > 0);
    assert!(sub.generation() > generation);
    assert_eq!(sub.state(), UnitState::Unparsed);
}

#[test]
fn test_late_provider_clears_unresolved_base() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let sub = add(&workspace, &project, "/src/Sub.as", "package { public class Sub extends Later {} }");
    sub.outgoing_dependencies().unwrap();
    assert!(
        project
            .problems()
            .iter()
            .any(|p| p.kind == ProblemKind::UnresolvedReference)
    );

    add(&workspace, &project, "/src/Later.as", "package { public class Later {} }");
    sub.outgoing_dependencies().unwrap();
    assert!(
        project
            .problems()
            .iter()
            .all(|p| p.kind != ProblemKind::UnresolvedReference),
        "{:?}",
        project.problems()
    );
    let def = project
        .resolve_qname_to_definition(&QName::top_level("Sub"))
        .unwrap()
        .unwrap();
    assert_eq!(def.resolve_base_class(&project).unwrap().unwrap().qname().name(), "Later");
}

#[test]
fn test_late_provider_invalidates_resolved_definition() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let unit = add(&workspace, &project, "/src/pkg/A.as", "package pkg { public class A extends B {} }");

    let old = project
        .resolve_qname_to_definition(&QName::new("pkg", "A"))
        .unwrap()
        .unwrap();
    assert!(old.resolve_base_class(&project).unwrap().is_none());
    let generation = unit.generation();

    add(&workspace, &project, "/src/pkg/B.as", "package pkg { public class B {} }");
    assert!(unit.generation() > generation);
    assert!(old.resolve_base_class(&project).unwrap_err().is_interrupted());

    let new = project
        .resolve_qname_to_definition(&QName::new("pkg", "A"))
        .unwrap()
        .unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    let base = new.resolve_base_class(&project).unwrap().unwrap();
    assert_eq!(base.qname(), &QName::new("pkg", "B"));
    assert_eq!(project.direct_dependencies(unit.id()).len(), 1);
}

#[test]
fn test_late_provider_of_qualified_type() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let unit = add(
        &workspace,
        &project,
        "/src/A.as",
        "package { public class A { public var item:model.Item; } }",
    );
    let class = project
        .resolve_qname_to_definition(&QName::top_level("A"))
        .unwrap()
        .unwrap();
    let file = project.file_scope_for(class.id()).unwrap();
    let item = file.members(&class, "item")[0].clone();
    assert!(matches!(item.resolve_type(&project).unwrap(), ResolvedType::Unresolved(_)));
    let generation = unit.generation();

    add(&workspace, &project, "/src/model/Item.as", "package model { public class Item {} }");
    assert!(unit.generation() > generation);

    let class = project
        .resolve_qname_to_definition(&QName::top_level("A"))
        .unwrap()
        .unwrap();
    let file = project.file_scope_for(class.id()).unwrap();
    let item = file.members(&class, "item")[0].clone();
    match item.resolve_type(&project).unwrap() {
        ResolvedType::Definition(def) => assert_eq!(def.qname(), &QName::new("model", "Item")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_open_document_overlay_and_close() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let unit = add(&workspace, &project, "/src/A.as", "package { public class A {} }");
    assert_eq!(unit.qualified_names().unwrap(), vec![QName::top_level("A")]);

    workspace
        .open_document("/src/A.as", "package { public class A {} public class Extra {} }")
        .unwrap();
    assert_eq!(unit.qualified_names().unwrap().len(), 2);

    workspace
        .update_document("/src/A.as", "package { public class A {} }")
        .unwrap();
    assert_eq!(unit.qualified_names().unwrap().len(), 1);
    assert!(project.lookup_qname(&QName::top_level("Extra")).unwrap().is_empty());

    workspace.close_document("/src/A.as").unwrap();
    assert_eq!(unit.qualified_names().unwrap(), vec![QName::top_level("A")]);
}

#[test]
fn test_disk_change_notification() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("A.as"), "package { public class A {} }").unwrap();

    let workspace = Workspace::new();
    let project = workspace
        .create_project(ProjectConfig::new().with_source_path(&src))
        .unwrap();
    let units = WorkspaceLoader::new().load_source_roots(&project).unwrap();
    assert_eq!(units.len(), 1);
    let unit = units[0].clone();
    assert_eq!(unit.qualified_names().unwrap(), vec![QName::top_level("A")]);

    fs::write(src.join("A.as"), "package { public class Renamed {} }").unwrap();
    assert!(workspace.file_changed(src.join("A.as")).unwrap() >= 1);
    assert_eq!(unit.qualified_names().unwrap(), vec![QName::top_level("Renamed")]);

    fs::write(src.join("B.as"), "package { public class B extends Renamed {} }").unwrap();
    workspace.file_added(src.join("B.as")).unwrap();
    let b = project
        .resolve_qname_to_compilation_unit(&QName::top_level("B"))
        .unwrap()
        .unwrap();
    b.outgoing_dependencies().unwrap();
    assert_eq!(project.direct_dependencies(b.id()), vec![unit.id()]);

    fs::remove_file(src.join("A.as")).unwrap();
    workspace.file_removed(src.join("A.as")).unwrap();
    assert_eq!(project.units().len(), 1);
    b.outgoing_dependencies().unwrap();
    assert!(
        project
            .problems()
            .iter()
            .any(|p| p.kind == ProblemKind::UnresolvedReference)
    );
}

#[test]
fn test_missing_file_is_unit_local() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let good = add(&workspace, &project, "/src/Good.as", "package { public class Good {} }");
    let missing = project.add_source_file("/src/Missing.as").unwrap();

    assert!(missing.file_scope().unwrap_err().is_unit_local());
    assert!(good.file_scope().is_ok());
    assert!(
        project
            .problems()
            .iter()
            .any(|p| p.kind == ProblemKind::FileNotFound && p.unit == Some(missing.id()))
    );
    assert!(project.lookup_qname(&QName::top_level("Missing")).unwrap().is_empty());
}

#[test]
fn test_clean_reproduces_graph() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let a = add(&workspace, &project, "/src/A.as", "package { public class A extends B { public var c:C; } }");
    add(&workspace, &project, "/src/B.as", "package { public class B {} }");
    add(&workspace, &project, "/src/C.as", "package { public class C {} }");

    a.outgoing_dependencies().unwrap();
    let before = project.direct_dependencies(a.id());
    project.clean();
    assert!(project.direct_dependencies(a.id()).is_empty());
    a.outgoing_dependencies().unwrap();
    assert_eq!(project.direct_dependencies(a.id()), before);
    assert_eq!(before.len(), 2);
}

#[test]
fn test_overlay_string_file_replacement() {
    let workspace = Workspace::new();
    let project = project(&workspace);
    let unit = project
        .add_file_specification(Arc::new(StringFile::new("/src/S.as", "package { public class S {} }")))
        .unwrap();
    assert_eq!(unit.qualified_names().unwrap(), vec![QName::top_level("S")]);
    workspace
        .register_file(Arc::new(StringFile::new("/src/S.as", "package { public class T {} }")))
        .unwrap();
    assert_eq!(unit.qualified_names().unwrap(), vec![QName::top_level("T")]);
}
