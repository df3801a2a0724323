//! File specifications: where a unit's source text comes from.
//!
//! Units never touch the filesystem directly. They read through a
//! [`FileSpecification`], which may be a file on disk, an in-memory buffer,
//! an entry of a library archive, or several files read as one.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Text decoding options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Remove every `\r`.
    pub strip_cr: bool,
}

pub trait FileSpecification: Send + Sync + fmt::Debug {
    fn path(&self) -> &Path;

    fn read_bytes(&self) -> io::Result<Arc<[u8]>>;

    /// Decoded text, honouring a UTF-8 or UTF-16 byte order mark.
    fn read_text(&self, options: ReadOptions) -> io::Result<String> {
        let bytes = self.read_bytes()?;
        decode_text(&bytes, options)
    }

    fn last_modified(&self) -> Option<SystemTime>;

    /// Whether the contents come from an editor buffer.
    fn is_open_document(&self) -> bool {
        false
    }
}

/// Decode bytes using their byte order mark; UTF-8 without one.
pub fn decode_text(bytes: &[u8], options: ReadOptions) -> io::Result<String> {
    let text = match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => utf8(rest)?,
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes)?,
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes)?,
        _ => utf8(bytes)?,
    };
    if options.strip_cr && text.contains('\r') {
        return Ok(text.replace('\r', ""));
    }
    Ok(text)
}

fn utf8(bytes: &[u8]) -> io::Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> io::Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "odd length UTF-16 text"));
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

// ============================================================================
// IMPLEMENTATIONS
// ============================================================================

/// A file on disk, read on every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskFile {
    path: PathBuf,
}

impl DiskFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileSpecification for DiskFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> io::Result<Arc<[u8]>> {
        Ok(fs::read(&self.path)?.into())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|meta| meta.modified()).ok()
    }
}

/// In-memory text, such as an editor buffer.
#[derive(Clone, Debug)]
pub struct StringFile {
    path: PathBuf,
    text: Arc<str>,
    open_document: bool,
    last_modified: SystemTime,
}

impl StringFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            open_document: false,
            last_modified: SystemTime::now(),
        }
    }

    /// An editor buffer shadowing the file on disk.
    pub fn open_document(path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        Self {
            open_document: true,
            ..Self::new(path, text)
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl FileSpecification for StringFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> io::Result<Arc<[u8]>> {
        Ok(Arc::from(self.text.as_bytes()))
    }

    fn read_text(&self, options: ReadOptions) -> io::Result<String> {
        if options.strip_cr {
            return Ok(self.text.replace('\r', ""));
        }
        Ok(self.text.to_string())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        Some(self.last_modified)
    }

    fn is_open_document(&self) -> bool {
        self.open_document
    }
}

/// One entry of a library archive. The caller supplies the entry contents.
#[derive(Clone)]
pub struct ZipEntryFile {
    path: PathBuf,
    archive: PathBuf,
    entry: String,
    contents: Arc<[u8]>,
    last_modified: Option<SystemTime>,
}

impl ZipEntryFile {
    pub fn new(archive: impl Into<PathBuf>, entry: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Self {
        let archive = archive.into();
        let entry = entry.into();
        let path = archive.join(&entry);
        let last_modified = fs::metadata(&archive).and_then(|meta| meta.modified()).ok();
        Self {
            path,
            archive,
            entry,
            contents: contents.into(),
            last_modified,
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl fmt::Debug for ZipEntryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipEntryFile")
            .field("archive", &self.archive)
            .field("entry", &self.entry)
            .field("len", &self.contents.len())
            .finish()
    }
}

impl FileSpecification for ZipEntryFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> io::Result<Arc<[u8]>> {
        Ok(self.contents.clone())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }
}

/// Prologue files read in front of a main file, as if concatenated. Each
/// part is decoded with its own byte order mark.
#[derive(Debug)]
pub struct CombinedFile {
    main: Arc<dyn FileSpecification>,
    prologue: Vec<Arc<dyn FileSpecification>>,
}

impl CombinedFile {
    pub fn new(main: Arc<dyn FileSpecification>, prologue: Vec<Arc<dyn FileSpecification>>) -> Self {
        Self { main, prologue }
    }

    fn parts(&self) -> impl Iterator<Item = &Arc<dyn FileSpecification>> {
        self.prologue.iter().chain(std::iter::once(&self.main))
    }
}

impl FileSpecification for CombinedFile {
    fn path(&self) -> &Path {
        self.main.path()
    }

    fn read_bytes(&self) -> io::Result<Arc<[u8]>> {
        Ok(Arc::from(self.read_text(ReadOptions::default())?.into_bytes()))
    }

    fn read_text(&self, options: ReadOptions) -> io::Result<String> {
        let mut out = String::new();
        for part in self.parts() {
            let text = part.read_text(options)?;
            out.push_str(&text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.parts().filter_map(|part| part.last_modified()).max()
    }

    fn is_open_document(&self) -> bool {
        self.parts().any(|part| part.is_open_document())
    }
}
