//! The workspace: the file set shared by a group of projects.
//!
//! File notifications and editor buffers arrive here and fan out to every
//! project whose units read the affected file.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{CompileError, Result};
use crate::hir::{FileId, ProjectId};
use crate::syntax::SourceLanguage;

use super::config::ProjectConfig;
use super::file_set::FileSet;
use super::file_spec::{FileSpecification, StringFile};
use super::project::Project;

pub(crate) struct WorkspaceInner {
    files: Arc<FileSet>,
    projects: RwLock<IndexMap<ProjectId, Arc<Project>>>,
    closed: AtomicBool,
}

impl WorkspaceInner {
    pub(crate) fn unregister(&self, project: ProjectId) {
        self.projects.write().shift_remove(&project);
    }
}

/// Cheap to clone; clones share the same workspace.
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WorkspaceInner {
                files: Arc::new(FileSet::new()),
                projects: RwLock::new(IndexMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn files(&self) -> &FileSet {
        &self.inner.files
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CompileError::WorkspaceClosed);
        }
        Ok(())
    }

    // ========================================================================
    // PROJECTS
    // ========================================================================

    pub fn create_project(&self, config: ProjectConfig) -> Result<Arc<Project>> {
        self.check_open()?;
        let project = Project::new(Arc::downgrade(&self.inner), self.inner.files.clone(), config);
        self.inner.projects.write().insert(project.id(), project.clone());
        info!(project = %project.id(), "project created");
        Ok(project)
    }

    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.inner.projects.read().values().cloned().collect()
    }

    pub fn project(&self, id: ProjectId) -> Option<Arc<Project>> {
        self.inner.projects.read().get(&id).cloned()
    }

    /// Delete a project once its running requests have finished.
    pub fn delete_project(&self, id: ProjectId) -> Result<()> {
        let project = self.project(id).ok_or(CompileError::ProjectDeleted)?;
        project.delete()
    }

    /// Delete every project. Later operations fail with
    /// [`CompileError::WorkspaceClosed`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let projects = self.projects();
        for project in &projects {
            // Already deleted projects are fine here.
            let _ = project.delete();
        }
        self.inner.projects.write().clear();
        info!(projects = projects.len(), "workspace closed");
    }

    // ========================================================================
    // FILES
    // ========================================================================

    /// Register or replace the contents of `spec.path()`.
    pub fn register_file(&self, spec: Arc<dyn FileSpecification>) -> Result<FileId> {
        self.check_open()?;
        let file = self.inner.files.register(spec);
        self.invalidate_everywhere(file);
        Ok(file)
    }

    pub fn add_string_file(&self, path: impl AsRef<Path>, text: &str) -> Result<FileId> {
        self.register_file(Arc::new(StringFile::new(path.as_ref(), text)))
    }

    /// Shadow `path` with an editor buffer.
    pub fn open_document(&self, path: impl AsRef<Path>, text: &str) -> Result<FileId> {
        self.check_open()?;
        let file = self.inner.files.open(path.as_ref(), text);
        self.invalidate_everywhere(file);
        Ok(file)
    }

    /// Replace the text of an open buffer. `None` when it is not open.
    pub fn update_document(&self, path: impl AsRef<Path>, text: &str) -> Result<Option<FileId>> {
        self.check_open()?;
        let file = self.inner.files.update(path.as_ref(), text);
        if let Some(file) = file {
            self.invalidate_everywhere(file);
        }
        Ok(file)
    }

    /// Drop the buffer of `path`; units read the file itself again.
    pub fn close_document(&self, path: impl AsRef<Path>) -> Result<Option<FileId>> {
        self.check_open()?;
        let file = self.inner.files.close(path.as_ref());
        if let Some(file) = file {
            self.invalidate_everywhere(file);
        }
        Ok(file)
    }

    /// The file at `path` changed outside the workspace. Returns the number
    /// of invalidated units across all projects.
    pub fn file_changed(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.check_open()?;
        let Some(file) = self.inner.files.touch(path.as_ref()) else {
            return Ok(0);
        };
        Ok(self.invalidate_everywhere(file))
    }

    /// A file appeared at `path`. Projects with the file under one of their
    /// source roots gain a unit for it.
    pub fn file_added(&self, path: impl AsRef<Path>) -> Result<()> {
        self.check_open()?;
        let path = path.as_ref();
        let file = match self.inner.files.touch(path) {
            Some(file) => file,
            None => self.inner.files.file_id(path),
        };
        self.invalidate_everywhere(file);
        if SourceLanguage::from_path(path).is_none() {
            return Ok(());
        }
        for project in self.projects() {
            let under_root = project
                .source_paths()
                .source_roots()
                .iter()
                .any(|root| path.starts_with(root));
            if under_root && project.units_for_file(file).is_empty() {
                project.add_source_file(path)?;
            }
        }
        Ok(())
    }

    /// The file at `path` was deleted. Its units leave every project.
    pub fn file_removed(&self, path: impl AsRef<Path>) -> Result<()> {
        self.check_open()?;
        let Some(file) = self.inner.files.remove(path.as_ref()) else {
            return Ok(());
        };
        for project in self.projects() {
            let ids: Vec<_> = project.units_for_file(file).iter().map(|unit| unit.id()).collect();
            if !ids.is_empty() {
                project.remove_compilation_units(&ids);
            }
        }
        Ok(())
    }

    fn invalidate_everywhere(&self, file: FileId) -> usize {
        let count: usize = self
            .projects()
            .iter()
            .map(|project| project.invalidate_file(file).len())
            .sum();
        debug!(file = ?file, invalidated = count, "file invalidated");
        count
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("projects", &self.inner.projects.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
