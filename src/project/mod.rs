//! Workspace and project management.
//!
//! A [`Workspace`] owns the file set and its projects. A [`Project`] owns
//! compilation units, the project scope, the dependency graph and problems.

pub mod config;
pub mod file_set;
pub mod file_spec;
pub mod library_loader;
#[allow(clippy::module_inception)]
pub mod project;
pub mod report;
pub mod source_path;
pub mod target;
pub mod workspace;
pub mod workspace_loader;

pub use config::ProjectConfig;
pub use file_set::{FileSet, FileStamp};
pub use file_spec::{CombinedFile, DiskFile, FileSpecification, ReadOptions, StringFile, ZipEntryFile};
pub use library_loader::load_library_path;
pub use project::{ActiveGuard, Project};
pub use report::{LinkReport, LinkedDependency, LinkedUnit, ReportedProblem};
pub use source_path::{SourceLocationInfo, SourcePathManager};
pub use target::{BuildOutput, SwfTarget};
pub use workspace::Workspace;
pub use workspace_loader::WorkspaceLoader;
