//! Loads library roots as SWC-embedded units.
//!
//! A library root is a `.swc` archive or a directory. Directories contribute
//! their own `.as` files and the `.as` entries of every archive inside them.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{CompileError, Result};
use crate::hir::CompilationUnit;

use super::file_spec::ZipEntryFile;
use super::project::Project;

/// Adds the entries of every library root of `project`. Roots are read in
/// parallel; units are added in root order.
pub fn load_library_path(project: &Project) -> Result<Vec<Arc<CompilationUnit>>> {
    let paths = project.source_paths();
    let roots = paths.library_roots();
    let per_root: Vec<Result<Vec<ZipEntryFile>>> = roots.par_iter().map(|root| read_library_root(root)).collect();

    let mut units = Vec::new();
    for (root, entries) in roots.iter().zip(per_root) {
        let entries = entries?;
        tracing::debug!(root = %root.display(), entries = entries.len(), "library root read");
        for entry in entries {
            units.push(project.add_library_entry(entry)?);
        }
    }
    tracing::info!(roots = roots.len(), units = units.len(), "library path loaded");
    Ok(units)
}

/// Source entries of one library root. A missing root has none.
pub fn read_library_root(root: &Path) -> Result<Vec<ZipEntryFile>> {
    if is_swc(root) && root.is_file() {
        return read_swc(root);
    }
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            CompileError::io(path, io::Error::from(err))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_swc(path) {
            out.extend(read_swc(path)?);
        } else if path.extension().is_some_and(|ext| ext == "as") {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let contents = fs::read(path).map_err(|err| CompileError::io(path, err))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            out.push(ZipEntryFile::new(root, name, contents));
        }
    }
    Ok(out)
}

/// The `.as` entries of an archive, sorted by entry name.
pub fn read_swc(path: &Path) -> Result<Vec<ZipEntryFile>> {
    let file = File::open(path).map_err(|err| CompileError::io(path, err))?;
    let mut archive = ZipArchive::new(file).map_err(|err| invalid_archive(path, err))?;

    let mut out = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| invalid_archive(path, err))?;
        if entry.is_dir() || !entry.name().ends_with(".as") {
            continue;
        }
        let name = entry.name().to_string();
        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut contents)
            .map_err(|err| CompileError::io(path, err))?;
        out.push(ZipEntryFile::new(path, name, contents));
    }
    out.sort_by(|a, b| a.entry().cmp(b.entry()));
    Ok(out)
}

fn is_swc(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "swc")
}

fn invalid_archive(path: &Path, err: zip::result::ZipError) -> CompileError {
    CompileError::io(path, io::Error::new(io::ErrorKind::InvalidData, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_swc(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, text) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(text.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_read_swc_keeps_source_entries() {
        let dir = tempfile::tempdir().unwrap();
        let swc = dir.path().join("core.swc");
        write_swc(
            &swc,
            &[
                ("pkg/B.as", "package pkg { public class B {} }"),
                ("catalog.xml", "<swc/>"),
                ("pkg/A.as", "package pkg { public class A {} }"),
            ],
        );
        let entries = read_swc(&swc).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.entry()).collect();
        assert_eq!(names, vec!["pkg/A.as", "pkg/B.as"]);
    }

    #[test]
    fn test_read_swc_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let swc = dir.path().join("broken.swc");
        fs::write(&swc, b"not a zip").unwrap();
        assert!(read_swc(&swc).unwrap_err().is_unit_local());
    }

    #[test]
    fn test_read_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib/pkg")).unwrap();
        fs::write(dir.path().join("lib/pkg/C.as"), "package pkg { public class C {} }").unwrap();
        write_swc(&dir.path().join("lib/extra.swc"), &[("D.as", "package { public class D {} }")]);

        let entries = read_library_root(&dir.path().join("lib")).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.entry()).collect();
        assert_eq!(names, vec!["D.as", "pkg/C.as"]);
        assert!(read_library_root(&dir.path().join("missing")).unwrap().is_empty());
    }
}
