use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{CompileError, Result};
use crate::hir::CompilationUnit;
use crate::syntax::SourceLanguage;

use super::project::Project;

/// Adds source trees on disk to a project.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkspaceLoader {
    preparse: bool,
}

impl WorkspaceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the loaded units in parallel right away instead of on first use.
    pub fn with_preparse(mut self, enabled: bool) -> Self {
        self.preparse = enabled;
        self
    }

    /// Adds every `.as`, `.mxml` and `.properties` file under `dir`, in
    /// sorted path order.
    pub fn load_directory(&self, project: &Project, dir: impl AsRef<Path>) -> Result<Vec<Arc<CompilationUnit>>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CompileError::io(
                dir,
                io::Error::new(io::ErrorKind::NotFound, "directory not found"),
            ));
        }
        let paths = collect_source_files(dir)?;
        let units = project.add_compilation_units(&paths)?;
        tracing::info!(dir = %dir.display(), units = units.len(), "directory loaded");
        if self.preparse {
            self.preparse(&units);
        }
        Ok(units)
    }

    /// Loads every source root of the project that exists on disk.
    pub fn load_source_roots(&self, project: &Project) -> Result<Vec<Arc<CompilationUnit>>> {
        let mut units = Vec::new();
        for root in project.source_paths().source_roots() {
            if root.is_dir() {
                units.extend(self.load_directory(project, root)?);
            }
        }
        Ok(units)
    }

    pub fn load_file(&self, project: &Project, path: impl AsRef<Path>) -> Result<Arc<CompilationUnit>> {
        project.add_source_file(path)
    }

    fn preparse(&self, units: &[Arc<CompilationUnit>]) {
        let failed = units
            .par_iter()
            .filter(|unit| unit.syntax_tree().is_err())
            .count();
        if failed > 0 {
            tracing::warn!(failed, "some units could not be parsed");
        }
    }
}

/// Source files under `dir`, sorted.
pub(crate) fn collect_source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            CompileError::io(path, io::Error::from(err))
        })?;
        if entry.file_type().is_file() && SourceLanguage::from_path(entry.path()).is_some() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_source_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/Z.as"), "").unwrap();
        fs::write(dir.path().join("A.mxml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("b/x.properties"), "").unwrap();

        let paths = collect_source_files(dir.path()).unwrap();
        let relative: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["A.mxml", "b/c/Z.as", "b/x.properties"]);
    }
}
