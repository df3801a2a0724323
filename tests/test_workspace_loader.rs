//! Loading source trees and libraries from disk, then building them.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use asc::hir::{PathOrigin, UnitKind};
use asc::project::{LinkReport, SwfTarget, WorkspaceLoader, load_library_path};
use asc::{ProjectConfig, QName, Workspace};
use zip::write::SimpleFileOptions;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn write_swc(path: &Path, entries: &[(&str, &str)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, text) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_load_source_tree_and_build() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src, "app/Main.as", "package app { import model.Item; public class Main { public var item:Item; } }");
    write(&src, "model/Item.as", "package model { public class Item extends Base {} }");
    write(&src, "model/Base.as", "package model { public class Base {} }");
    write(&src, "README.txt", "not source");

    let workspace = Workspace::new();
    let project = workspace
        .create_project(ProjectConfig::new().with_source_path(&src))
        .unwrap();
    let units = WorkspaceLoader::new()
        .with_preparse(true)
        .load_source_roots(&project)
        .unwrap();
    assert_eq!(units.len(), 3);

    let main = project
        .resolve_qname_to_compilation_unit(&QName::new("app", "Main"))
        .unwrap()
        .unwrap();
    let output = SwfTarget::new(project.clone()).build(&[main.id()]).unwrap();
    assert!(!output.has_errors(), "{:?}", output.problems);

    let order: Vec<String> = output
        .units
        .iter()
        .map(|unit| {
            Path::new(unit.name())
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(order, vec!["Base", "Item", "Main"]);
    assert_eq!(output.bytecode.len(), 3);
    assert!(output.bytecode.iter().all(|(_, bytes)| !bytes.is_empty()));

    let report = LinkReport::new(&project, &output).unwrap();
    assert_eq!(report.units.len(), 3);
    let linked_main = report.units.last().unwrap();
    assert_eq!(linked_main.definitions, vec!["app.Main".to_string()]);
    assert_eq!(linked_main.dependencies.len(), 1);
    assert!(report.problems.is_empty());
}

#[test]
fn test_load_directory_rejects_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new();
    let project = workspace.create_project(ProjectConfig::new()).unwrap();
    let err = WorkspaceLoader::new()
        .load_directory(&project, dir.path().join("absent"))
        .unwrap_err();
    assert!(err.is_unit_local());
}

#[test]
fn test_library_archive_is_shadowed_by_source() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let libs = dir.path().join("libs");
    write(&src, "util/Strings.as", "package util { public class Strings {} }");
    write_swc(
        &libs.join("util.swc"),
        &[
            ("util/Strings.as", "package util { public class Strings {} }"),
            ("util/Numbers.as", "package util { public class Numbers {} }"),
            ("catalog.xml", "<swc/>"),
        ],
    );

    let workspace = Workspace::new();
    let project = workspace
        .create_project(
            ProjectConfig::new()
                .with_source_path(&src)
                .with_library_path(&libs),
        )
        .unwrap();
    let library = load_library_path(&project).unwrap();
    assert_eq!(library.len(), 2);
    assert!(library.iter().all(|unit| unit.kind() == UnitKind::SwcEmbedded));
    assert!(
        library
            .iter()
            .all(|unit| unit.priority().origin == PathOrigin::LibraryPath)
    );
    let sources = WorkspaceLoader::new().load_source_roots(&project).unwrap();
    assert_eq!(sources.len(), 1);

    let strings = project
        .resolve_qname_to_compilation_unit(&QName::new("util", "Strings"))
        .unwrap()
        .unwrap();
    assert_eq!(strings.id(), sources[0].id());

    let numbers = project
        .resolve_qname_to_compilation_unit(&QName::new("util", "Numbers"))
        .unwrap()
        .unwrap();
    assert_eq!(numbers.kind(), UnitKind::SwcEmbedded);

    // Embedded units carry their archive entry as bytecode.
    let output = SwfTarget::new(project.clone()).build(&[numbers.id()]).unwrap();
    assert_eq!(output.units.len(), 1);
    assert_eq!(
        &*output.bytecode[0].1,
        b"package util { public class Numbers {} }".as_slice()
    );
}

#[test]
fn test_missing_library_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new();
    let project = workspace
        .create_project(ProjectConfig::new().with_library_path(dir.path().join("nothing.swc")))
        .unwrap();
    assert!(load_library_path(&project).unwrap().is_empty());
}

#[cfg(feature = "interchange")]
#[test]
fn test_link_report_json() {
    let workspace = Workspace::new();
    let project = workspace
        .create_project(ProjectConfig::new().with_source_path("/src"))
        .unwrap();
    workspace
        .add_string_file("/src/A.as", "package { public class A extends B {} }")
        .unwrap();
    workspace
        .add_string_file("/src/B.as", "package { public class B {} }")
        .unwrap();
    let a = project.add_source_file("/src/A.as").unwrap();
    project.add_source_file("/src/B.as").unwrap();

    let output = SwfTarget::new(project.clone()).build(&[a.id()]).unwrap();
    let report = LinkReport::new(&project, &output).unwrap();
    let json = report.to_json().unwrap();
    assert!(json.contains("\"/src/A.as\""));
    let back = LinkReport::from_json(&json).unwrap();
    assert_eq!(back.units.len(), 2);
    assert_eq!(back.units[1].dependencies[0].unit, back.units[0].id);
}
