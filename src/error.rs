//! Errors of fallible core operations.
//!
//! User-code problems (unresolved names, bad overrides, ...) are never errors;
//! they are recorded as [`Problem`](crate::hir::Problem)s. A `CompileError`
//! means a request could not produce a result at all.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use smol_str::SmolStr;

/// Failure of a request or project operation.
///
/// Cloneable so one failed request result can be handed to every waiter.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CompileError {
    /// The unit was removed from its project, or the project is gone.
    #[error("compilation unit '{0}' is no longer valid")]
    InvalidUnit(SmolStr),
    #[error("project has been deleted")]
    ProjectDeleted,
    #[error("workspace has been closed")]
    WorkspaceClosed,
    /// The request was cancelled through the project's interruption signal.
    #[error("request was interrupted")]
    Interrupted,
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    /// A file that is neither ActionScript, MXML nor a resource bundle.
    #[error("'{}' is not a compilable source file", .0.display())]
    UnsupportedFile(PathBuf),
    /// A broken invariant inside the core or one of its collaborators.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, CompileError::Interrupted)
    }

    /// Whether the failure only affects the unit it came from.
    pub fn is_unit_local(&self) -> bool {
        matches!(self, CompileError::Io { .. })
    }
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_and_clone() {
        let err = CompileError::io(
            "/src/A.as",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        let copy = err.clone();
        assert_eq!(copy.to_string(), "cannot read '/src/A.as': missing");
        assert!(err.is_unit_local());
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_io_error_exposes_source() {
        use std::error::Error as _;
        let err = CompileError::io("/x", io::Error::other("boom"));
        assert!(err.source().is_some());
    }
}
