//! File set management for tracking source files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::hir::FileId;

use super::file_spec::{DiskFile, FileSpecification, StringFile};

/// What a unit remembers about its file when it parses it. Any difference
/// on a later access means the unit is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStamp {
    /// Bumped on every registration, edit or change notification.
    pub revision: u64,
    pub last_modified: Option<SystemTime>,
    pub open_document: bool,
}

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    /// `None` once the file was removed.
    spec: Option<Arc<dyn FileSpecification>>,
    /// Open editor buffer shadowing `spec`.
    overlay: Option<Arc<StringFile>>,
    revision: u64,
}

impl FileEntry {
    fn current(&self) -> Option<Arc<dyn FileSpecification>> {
        match &self.overlay {
            Some(overlay) => Some(overlay.clone() as Arc<dyn FileSpecification>),
            None => self.spec.clone(),
        }
    }
}

/// Manages the mapping between file paths and FileIds.
///
/// File IDs are stable for the lifetime of the set; removing a file keeps
/// its ID so a later re-add maps to the same units.
#[derive(Debug, Default)]
pub struct FileSet {
    inner: RwLock<FileSetInner>,
}

#[derive(Debug, Default)]
struct FileSetInner {
    path_to_id: IndexMap<PathBuf, FileId>,
    entries: IndexMap<FileId, FileEntry>,
    next_id: u32,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a FileId for a path. New paths are read from disk.
    pub fn file_id(&self, path: &Path) -> FileId {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.path_to_id.get(path) {
                return id;
            }
        }

        let mut inner = self.inner.write();

        // Double-check
        if let Some(&id) = inner.path_to_id.get(path) {
            return id;
        }
        inner.insert(path, Some(Arc::new(DiskFile::new(path))))
    }

    /// The FileId of `path`, if it was ever registered.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.inner.read().path_to_id.get(path).copied()
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.inner.read().entries.get(&file).map(|entry| entry.path.clone())
    }

    /// Register or replace the specification of `spec.path()`.
    pub fn register(&self, spec: Arc<dyn FileSpecification>) -> FileId {
        let path = spec.path().to_path_buf();
        let mut inner = self.inner.write();
        match inner.path_to_id.get(&path).copied() {
            Some(id) => {
                if let Some(entry) = inner.entries.get_mut(&id) {
                    entry.spec = Some(spec);
                    entry.revision += 1;
                }
                id
            }
            None => inner.insert(&path, Some(spec)),
        }
    }

    /// The specification units read, with an open overlay taking precedence.
    pub fn spec(&self, file: FileId) -> Option<Arc<dyn FileSpecification>> {
        self.inner.read().entries.get(&file).and_then(FileEntry::current)
    }

    /// Open an editor buffer over `path`.
    pub fn open(&self, path: &Path, text: &str) -> FileId {
        let mut inner = self.inner.write();
        let id = match inner.path_to_id.get(path).copied() {
            Some(id) => id,
            None => inner.insert(path, None),
        };
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.overlay = Some(Arc::new(StringFile::open_document(path, text)));
            entry.revision += 1;
        }
        id
    }

    /// Replace the text of an open buffer. `None` when `path` is not open.
    pub fn update(&self, path: &Path, text: &str) -> Option<FileId> {
        let mut inner = self.inner.write();
        let id = inner.path_to_id.get(path).copied()?;
        let entry = inner.entries.get_mut(&id)?;
        entry.overlay.as_ref()?;
        entry.overlay = Some(Arc::new(StringFile::open_document(path, text)));
        entry.revision += 1;
        Some(id)
    }

    /// Drop the buffer of `path`; units read the underlying file again.
    pub fn close(&self, path: &Path) -> Option<FileId> {
        let mut inner = self.inner.write();
        let id = inner.path_to_id.get(path).copied()?;
        let entry = inner.entries.get_mut(&id)?;
        entry.overlay.take()?;
        entry.revision += 1;
        Some(id)
    }

    /// Record an outside change to `path`.
    pub fn touch(&self, path: &Path) -> Option<FileId> {
        let mut inner = self.inner.write();
        let id = inner.path_to_id.get(path).copied()?;
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.revision += 1;
        }
        Some(id)
    }

    /// Forget the contents of `path`. Reads fail until it is registered again.
    pub fn remove(&self, path: &Path) -> Option<FileId> {
        let mut inner = self.inner.write();
        let id = inner.path_to_id.get(path).copied()?;
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.spec = None;
            entry.overlay = None;
            entry.revision += 1;
        }
        Some(id)
    }

    /// Current stamp of a file; `None` when it has no contents.
    pub fn stamp(&self, file: FileId) -> Option<FileStamp> {
        let (revision, spec) = {
            let inner = self.inner.read();
            let entry = inner.entries.get(&file)?;
            (entry.revision, entry.current()?)
        };
        Some(FileStamp {
            revision,
            last_modified: spec.last_modified(),
            open_document: spec.is_open_document(),
        })
    }

    pub fn is_open(&self, file: FileId) -> bool {
        self.inner
            .read()
            .entries
            .get(&file)
            .is_some_and(|entry| entry.overlay.is_some())
    }

    /// Files that currently have contents, in registration order.
    pub fn files(&self) -> Vec<FileId> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| entry.spec.is_some() || entry.overlay.is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileSetInner {
    fn insert(&mut self, path: &Path, spec: Option<Arc<dyn FileSpecification>>) -> FileId {
        let id = FileId::new(self.next_id);
        self.next_id += 1;
        self.path_to_id.insert(path.to_owned(), id);
        self.entries.insert(
            id,
            FileEntry {
                path: path.to_owned(),
                spec,
                overlay: None,
                revision: 0,
            },
        );
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::file_spec::ReadOptions;

    #[test]
    fn test_file_set_id_assignment() {
        let files = FileSet::new();

        let id1 = files.file_id(Path::new("/a.as"));
        let id2 = files.file_id(Path::new("/b.as"));
        let id3 = files.file_id(Path::new("/a.as"));

        assert_ne!(id1, id2);
        assert_eq!(id1, id3);
    }

    #[test]
    fn test_file_set_path_lookup() {
        let files = FileSet::new();
        let path = Path::new("/test.as");
        let id = files.file_id(path);

        assert_eq!(files.path(id).as_deref(), Some(path));
        assert_eq!(files.lookup(path), Some(id));
    }

    #[test]
    fn test_overlay_shadows_and_restamps() {
        let files = FileSet::new();
        let path = Path::new("/A.as");
        let id = files.register(Arc::new(StringFile::new(path, "disk")));
        let before = files.stamp(id).unwrap();
        assert!(!before.open_document);

        files.open(path, "buffer");
        let open = files.stamp(id).unwrap();
        assert_ne!(before, open);
        assert!(open.open_document);
        let text = files.spec(id).unwrap().read_text(ReadOptions::default()).unwrap();
        assert_eq!(text, "buffer");

        assert_eq!(files.update(path, "edited"), Some(id));
        assert_ne!(files.stamp(id).unwrap(), open);

        files.close(path);
        let text = files.spec(id).unwrap().read_text(ReadOptions::default()).unwrap();
        assert_eq!(text, "disk");
    }

    #[test]
    fn test_update_requires_open_buffer() {
        let files = FileSet::new();
        files.register(Arc::new(StringFile::new("/A.as", "x")));
        assert_eq!(files.update(Path::new("/A.as"), "y"), None);
    }

    #[test]
    fn test_remove_keeps_id() {
        let files = FileSet::new();
        let path = Path::new("/A.as");
        let id = files.register(Arc::new(StringFile::new(path, "x")));
        assert_eq!(files.remove(path), Some(id));
        assert!(files.spec(id).is_none());
        assert!(files.stamp(id).is_none());
        assert!(files.files().is_empty());

        assert_eq!(files.register(Arc::new(StringFile::new(path, "y"))), id);
        assert_eq!(files.files(), vec![id]);
    }
}
