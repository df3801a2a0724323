//! Problems: compiler diagnostics for user code.
//!
//! Resolution failures, ambiguous definitions and override mismatches are
//! recorded as [`Problem`]s and never abort a build.

use std::sync::Arc;

use crate::base::{LineCol, TextRange};

use super::ids::{FileId, UnitId};

// ============================================================================
// PROBLEM TYPES
// ============================================================================

/// Severity level of a problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Error,
    Warning,
}

/// What went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub enum ProblemKind {
    SyntaxError,
    FileNotFound,
    UnresolvedReference,
    UnresolvedNamespace,
    AmbiguousDefinition,
    DuplicateDefinition,
    IncompatibleOverride,
    OverrideNotFound,
    MissingOverride,
    CircularInheritance,
}

impl ProblemKind {
    /// Stable code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ProblemKind::SyntaxError => codes::SYNTAX_ERROR,
            ProblemKind::FileNotFound => codes::FILE_NOT_FOUND,
            ProblemKind::UnresolvedReference => codes::UNRESOLVED_REFERENCE,
            ProblemKind::UnresolvedNamespace => codes::UNRESOLVED_NAMESPACE,
            ProblemKind::AmbiguousDefinition => codes::AMBIGUOUS_DEFINITION,
            ProblemKind::DuplicateDefinition => codes::DUPLICATE_DEFINITION,
            ProblemKind::IncompatibleOverride => codes::INCOMPATIBLE_OVERRIDE,
            ProblemKind::OverrideNotFound => codes::OVERRIDE_NOT_FOUND,
            ProblemKind::MissingOverride => codes::MISSING_OVERRIDE,
            ProblemKind::CircularInheritance => codes::CIRCULAR_INHERITANCE,
        }
    }
}

/// A location in a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: FileId,
    /// Absolute offsets.
    pub range: TextRange,
    pub start: LineCol,
    pub end: LineCol,
}

/// A problem with its location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub severity: Severity,
    pub code: &'static str,
    pub message: Arc<str>,
    /// The unit whose request reported the problem.
    pub unit: Option<UnitId>,
    pub location: Option<SourceLocation>,
    pub related: Vec<RelatedInfo>,
}

/// Related information for a problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedInfo {
    pub location: Option<SourceLocation>,
    pub message: Arc<str>,
}

impl Problem {
    /// Create a new error problem.
    pub fn error(kind: ProblemKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            code: kind.code(),
            message: message.into(),
            unit: None,
            location: None,
            related: Vec::new(),
        }
    }

    /// Create a new warning problem.
    pub fn warning(kind: ProblemKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// Add related information.
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

// ============================================================================
// PROBLEM CODES
// ============================================================================

/// Stable problem codes.
pub mod codes {
    pub const SYNTAX_ERROR: &str = "E0001";
    pub const FILE_NOT_FOUND: &str = "E0002";
    pub const UNRESOLVED_REFERENCE: &str = "E0003";
    pub const UNRESOLVED_NAMESPACE: &str = "E0004";
    pub const AMBIGUOUS_DEFINITION: &str = "E0005";
    pub const DUPLICATE_DEFINITION: &str = "E0006";
    pub const INCOMPATIBLE_OVERRIDE: &str = "E0007";
    pub const OVERRIDE_NOT_FOUND: &str = "E0008";
    pub const MISSING_OVERRIDE: &str = "E0009";
    pub const CIRCULAR_INHERITANCE: &str = "E0010";
}

// ============================================================================
// PROBLEM COLLECTION
// ============================================================================

/// An append-only, ordered collection of problems.
#[derive(Clone, Debug, Default)]
pub struct ProblemCollection {
    problems: Vec<Problem>,
}

impl ProblemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn extend(&mut self, problems: impl IntoIterator<Item = Problem>) {
        self.problems.extend(problems);
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Problems reported by one unit.
    pub fn for_unit(&self, unit: UnitId) -> Vec<&Problem> {
        self.problems
            .iter()
            .filter(|p| p.unit == Some(unit))
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.problems.iter().filter(|p| p.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|p| p.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(Problem::is_error)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Take all problems, leaving the collection empty.
    pub fn take(&mut self) -> Vec<Problem> {
        std::mem::take(&mut self.problems)
    }

    pub fn clear(&mut self) {
        self.problems.clear();
    }

    /// Drop the problems reported by `unit`, keeping the order of the rest.
    pub fn remove_unit(&mut self, unit: UnitId) -> usize {
        let before = self.problems.len();
        self.problems.retain(|p| p.unit != Some(unit));
        before - self.problems.len()
    }
}

impl From<Vec<Problem>> for ProblemCollection {
    fn from(problems: Vec<Problem>) -> Self {
        Self { problems }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_error() {
        let problem = Problem::error(ProblemKind::UnresolvedReference, "cannot find 'Foo'");
        assert_eq!(problem.severity, Severity::Error);
        assert_eq!(problem.code, codes::UNRESOLVED_REFERENCE);
        assert!(problem.location.is_none());
    }

    #[test]
    fn test_problem_builders() {
        let problem = Problem::warning(ProblemKind::DuplicateDefinition, "dup")
            .with_unit(UnitId::new(4))
            .with_related(RelatedInfo {
                location: None,
                message: Arc::from("previous definition"),
            });
        assert_eq!(problem.severity, Severity::Warning);
        assert_eq!(problem.unit, Some(UnitId::new(4)));
        assert_eq!(problem.related.len(), 1);
    }

    #[test]
    fn test_collection_counts() {
        let mut problems = ProblemCollection::new();
        problems.add(Problem::error(ProblemKind::SyntaxError, "error 1"));
        problems.add(Problem::error(ProblemKind::SyntaxError, "error 2").with_unit(UnitId::new(1)));
        problems.add(Problem::warning(ProblemKind::DuplicateDefinition, "warning 1"));

        assert_eq!(problems.error_count(), 2);
        assert_eq!(problems.warning_count(), 1);
        assert!(problems.has_errors());
        assert_eq!(problems.for_unit(UnitId::new(1)).len(), 1);

        assert_eq!(problems.remove_unit(UnitId::new(1)), 1);
        assert_eq!(problems.len(), 2);

        let taken = problems.take();
        assert_eq!(taken.len(), 2);
        assert!(problems.is_empty());
    }
}
