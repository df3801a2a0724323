//! # asc-base
//!
//! Compiler core for ActionScript 3 and MXML: compilation units, name
//! resolution, the inter-unit dependency graph and incremental projects.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project → Workspace, projects, loaders, build targets
//!   ↓
//! hir     → Definitions, scopes, units and their requests, dependency graph
//!   ↓
//! syntax  → Outline parsers behind the SyntaxProvider seam
//!   ↓
//! base    → Primitives (QName, TextRange, LineIndex)
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Foundation types: QName, spans, line indexes
pub mod base;

/// Errors of fallible operations
pub mod error;

/// Outline syntax: AS3, MXML and resource bundle parsers
pub mod syntax;

/// Semantic model: definitions, scopes, units, dependency graph
pub mod hir;

/// Workspace, projects, loaders and targets
pub mod project;

// Re-export commonly needed items
pub use base::{LineCol, LineIndex, QName, TextRange, TextSize};
pub use error::{CompileError, Result};
pub use hir::{
    CompilationUnit, Definition, DefinitionKind, DependencyType, Problem, ProblemKind, UnitId,
    UnitKind,
};
pub use project::{Project, ProjectConfig, SwfTarget, Workspace};
