//! Semantic model of a project.
//!
//! Compilation units own four single-flight requests (syntax tree, file
//! scope, outgoing dependencies, bytecode). Definitions are published into
//! the project scope, names resolve through scope chains, and every
//! cross-unit resolution records an edge in the dependency graph.
//!
//! - [`CompilationUnit`] - Units and their requests
//! - [`Definition`] - Named program entities with memoized resolution
//! - [`ProjectScope`] - Qualified-name index with promises and shadowing
//! - [`DependencyGraph`] - Typed edges between units
//! - [`Resolver`] - Scope chain lookup and ambiguity handling

pub mod analysis;
pub mod codegen;
pub mod definitions;
pub mod diagnostics;
pub mod graph;
pub mod ids;
pub mod lower;
pub mod namespace;
pub mod project_scope;
pub mod request;
pub mod resolve;
pub mod scope;
pub mod unit;

pub use analysis::{
    ExactOverridePolicy, OutgoingDependenciesResult, OverridePolicy, SubclassOverridePolicy,
};
pub use codegen::{CodeGenerator, CodegenInput, ListingGenerator};
pub use definitions::{
    Definition, DefinitionData, DefinitionKind, MetaAttribute, MetaTag, Modifiers, Parameter,
    ResolvedType, TypeName,
};
pub use diagnostics::{
    Problem, ProblemCollection, ProblemKind, RelatedInfo, Severity, SourceLocation,
};
pub use graph::{DependencyGraph, DependencyType, DependencyTypeSet};
pub use ids::{DefId, FileId, LocalDefId, ProjectId, ScopeId, UnitId};
pub use lower::{FileScopeResult, Reference, ReferenceKind};
pub use namespace::{NamespaceReference, NamespaceSet, NamespaceValue};
pub use project_scope::{DefinitionPriority, PathOrigin, ProjectScope, ScopeLookup};
pub use request::RequestState;
pub use resolve::{
    AmbiguityResolver, AmbiguitySite, LookupOptions, NoAmbiguityResolver, PackageLocalResolver,
    ResolveResult, Resolver, INTRINSIC_TYPES,
};
pub use scope::{Import, Scope, ScopeKind, ScopeTree};
pub use unit::{
    AbcBytesResult, CompilationUnit, Request, SyntaxTreeResult, UnitKind, UnitState,
};
