//! Single-flight requests, parallel builds and project deletion under load.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use asc::project::{StringFile, SwfTarget};
use asc::syntax::{OutlineSyntaxProvider, Parse, ParseInput, SyntaxProvider};
use asc::{CompileError, Project, ProjectConfig, QName, Workspace};

/// Counts parses and hands them to the outline parser.
#[derive(Default)]
struct CountingProvider {
    parses: AtomicUsize,
    inner: OutlineSyntaxProvider,
}

impl SyntaxProvider for CountingProvider {
    fn parse(&self, input: &ParseInput<'_>) -> Parse {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(input)
    }
}

fn chain_project(workspace: &Workspace, parallel: bool, length: usize) -> Arc<Project> {
    let project = workspace
        .create_project(
            ProjectConfig::new()
                .with_source_path("/src")
                .with_parallel_code_generation(parallel),
        )
        .unwrap();
    for index in 0..length {
        let text = if index + 1 < length {
            format!(
                "package chain {{ public class C{index} extends C{next} {{ public function f():C{next} {{ return null; }} }} }}",
                next = index + 1
            )
        } else {
            format!("package chain {{ public class C{index} {{}} }}")
        };
        project
            .add_file_specification(Arc::new(StringFile::new(format!("/src/chain/C{index}.as"), text)))
            .unwrap();
    }
    project
}

#[test]
fn test_concurrent_requesters_share_one_parse() {
    let workspace = Workspace::new();
    let project = chain_project(&workspace, false, 1);
    let provider = Arc::new(CountingProvider::default());
    project.set_syntax_provider(provider.clone());
    let unit = project.units()[0].clone();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let unit = unit.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                unit.file_scope().unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(provider.parses.load(Ordering::SeqCst), 1);
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
}

#[test]
fn test_parallel_build_matches_sequential() {
    let sequential = {
        let workspace = Workspace::new();
        let project = chain_project(&workspace, false, 12);
        let root = project.units()[0].id();
        SwfTarget::new(project).build(&[root]).unwrap()
    };
    let parallel = {
        let workspace = Workspace::new();
        let project = chain_project(&workspace, true, 12);
        let root = project.units()[0].id();
        SwfTarget::new(project).build(&[root]).unwrap()
    };

    assert_eq!(sequential.units.len(), 12);
    let names = |output: &asc::project::BuildOutput| -> Vec<String> {
        output.units.iter().map(|u| u.name().to_string()).collect()
    };
    assert_eq!(names(&sequential), names(&parallel));
    assert_eq!(sequential.concatenated(), parallel.concatenated());
    assert_eq!(names(&sequential).first().map(String::as_str), Some("/src/chain/C11.as"));
    assert!(!sequential.has_errors(), "{:?}", sequential.problems);
}

#[test]
fn test_concurrent_lookups_agree() {
    let workspace = Workspace::new();
    let project = chain_project(&workspace, true, 6);
    let handles: Vec<_> = (0..6)
        .map(|index| {
            let project = project.clone();
            thread::spawn(move || {
                let qname = QName::new("chain", format!("C{index}"));
                let def = project.resolve_qname_to_definition(&qname).unwrap().unwrap();
                def.ancestors(&project).unwrap().len()
            })
        })
        .collect();
    let depths: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(depths, vec![5, 4, 3, 2, 1, 0]);
}

#[test]
fn test_delete_waits_for_running_builds() {
    let workspace = Workspace::new();
    let project = chain_project(&workspace, true, 20);
    let root = project.units()[0].id();
    let target = SwfTarget::new(project.clone());
    let build = thread::spawn(move || target.build(&[root]));

    workspace.delete_project(project.id()).unwrap();
    match build.join().unwrap() {
        Ok(output) => assert_eq!(output.units.len(), 20),
        Err(err) => assert!(
            matches!(
                err,
                CompileError::Interrupted | CompileError::InvalidUnit(_) | CompileError::ProjectDeleted
            ),
            "{err}"
        ),
    }
    assert!(project.units().is_empty());
    assert!(matches!(
        SwfTarget::new(project).build(&[root]),
        Err(CompileError::ProjectDeleted)
    ));
}
