//! Compilation units and their requests.
//!
//! A [`CompilationUnit`] wraps one source file, one library entry, one
//! resource bundle or one supplied syntax tree. Its derived data is produced
//! by four single-flight requests:
//!
//! ```text
//! syntax tree ──▶ file scope ──▶ outgoing dependencies ──▶ ABC bytes
//!                (publishes)     (resolution, edges,
//!                                 problems)
//! ```
//!
//! Invalidating a unit bumps its generation and replaces all four cells, so
//! the next access recomputes from the source.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use crate::base::{LineIndex, QName};
use crate::error::{CompileError, Result};
use crate::project::file_set::FileStamp;
use crate::project::file_spec::ReadOptions;
use crate::project::{ActiveGuard, Project};
use crate::syntax::ast::FileNode;
use crate::syntax::{ParseInput, SourceLanguage};

use super::analysis::{self, OutgoingDependenciesResult};
use super::codegen::CodegenInput;
use super::diagnostics::{Problem, ProblemKind, SourceLocation};
use super::ids::{FileId, UnitId};
use super::lower::{lower_file, FileScopeResult, LowerContext};
use super::project_scope::DefinitionPriority;
use super::request::{RequestCell, RequestState};

// ============================================================================
// UNIT TYPES
// ============================================================================

/// What a unit is built from. Fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitKind {
    AsSource,
    MxmlSource,
    /// An entry of a library archive; its bytecode is the entry itself.
    SwcEmbedded,
    ResourceBundle,
    /// Built from a supplied syntax tree, without source text.
    AbcOnly,
}

impl UnitKind {
    fn language(self) -> SourceLanguage {
        match self {
            UnitKind::MxmlSource => SourceLanguage::Mxml,
            UnitKind::ResourceBundle => SourceLanguage::Properties,
            UnitKind::AsSource | UnitKind::SwcEmbedded | UnitKind::AbcOnly => {
                SourceLanguage::ActionScript
            }
        }
    }
}

/// Progress of a unit's derived data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    Unparsed,
    Parsing,
    Parsed,
    DefinitionsPublished,
    BytecodeReady,
    /// Removed from its project.
    Invalid,
}

#[derive(Clone, Debug)]
pub(crate) enum UnitSource {
    File(FileId),
    Synthetic(Arc<FileNode>),
}

/// Everything needed to create a unit.
#[derive(Clone, Debug)]
pub(crate) struct UnitDescriptor {
    pub kind: UnitKind,
    pub source: UnitSource,
    pub name: SmolStr,
    pub expected: Vec<QName>,
    pub priority: DefinitionPriority,
    pub locale: Option<SmolStr>,
}

// ============================================================================
// REQUEST RESULTS
// ============================================================================

#[derive(Debug)]
pub struct SyntaxTreeResult {
    pub ast: Arc<FileNode>,
    /// Source stamp read before parsing; `None` for synthetic units.
    pub stamp: Option<FileStamp>,
    pub line_index: Option<Arc<LineIndex>>,
    pub problems: Vec<Problem>,
}

#[derive(Debug)]
pub struct AbcBytesResult {
    pub bytes: Arc<[u8]>,
}

#[derive(Debug)]
struct UnitRequests {
    generation: u32,
    syntax_tree: RequestCell<SyntaxTreeResult>,
    file_scope: RequestCell<FileScopeResult>,
    outgoing: RequestCell<OutgoingDependenciesResult>,
    abc: RequestCell<AbcBytesResult>,
}

impl UnitRequests {
    fn new(generation: u32) -> Self {
        Self {
            generation,
            syntax_tree: RequestCell::default(),
            file_scope: RequestCell::default(),
            outgoing: RequestCell::default(),
            abc: RequestCell::default(),
        }
    }
}

/// A handle on one request of a unit. [`Request::get`] blocks until the
/// result is available.
pub struct Request<T> {
    unit: Arc<CompilationUnit>,
    fetch: fn(&CompilationUnit) -> Result<Arc<T>>,
}

impl<T> Request<T> {
    pub fn get(&self) -> Result<Arc<T>> {
        (self.fetch)(&self.unit)
    }

    pub fn unit(&self) -> &Arc<CompilationUnit> {
        &self.unit
    }
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            unit: self.unit.clone(),
            fetch: self.fetch,
        }
    }
}

/// A live access to a unit: the project kept active, the current request
/// cells and the cancellation token of this access.
struct Access {
    project: ActiveGuard,
    requests: Arc<UnitRequests>,
    token: CancellationToken,
}

// ============================================================================
// COMPILATION UNIT
// ============================================================================

pub struct CompilationUnit {
    id: UnitId,
    kind: UnitKind,
    name: SmolStr,
    source: UnitSource,
    locale: Option<SmolStr>,
    expected: Vec<QName>,
    priority: DefinitionPriority,
    project: Weak<Project>,
    valid: AtomicBool,
    generation: AtomicU32,
    requests: Mutex<Arc<UnitRequests>>,
}

impl CompilationUnit {
    pub(crate) fn new(id: UnitId, descriptor: UnitDescriptor, project: Weak<Project>) -> Self {
        Self {
            id,
            kind: descriptor.kind,
            name: descriptor.name,
            source: descriptor.source,
            locale: descriptor.locale,
            expected: descriptor.expected,
            priority: descriptor.priority,
            project,
            valid: AtomicBool::new(true),
            generation: AtomicU32::new(0),
            requests: Mutex::new(Arc::new(UnitRequests::new(0))),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Source path or synthetic key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_file(&self) -> Option<FileId> {
        match self.source {
            UnitSource::File(file) => Some(file),
            UnitSource::Synthetic(_) => None,
        }
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Names this unit is expected to define, from its location on the path.
    pub fn expected_qualified_names(&self) -> &[QName] {
        &self.expected
    }

    pub fn priority(&self) -> DefinitionPriority {
        self.priority
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn state(&self) -> UnitState {
        if !self.is_valid() {
            return UnitState::Invalid;
        }
        let requests = self.requests.lock().clone();
        if requests.abc.state() == RequestState::Ready {
            return UnitState::BytecodeReady;
        }
        let published = self
            .project
            .upgrade()
            .is_some_and(|project| project.scope().is_published(self.id));
        if requests.file_scope.state() == RequestState::Ready && published {
            return UnitState::DefinitionsPublished;
        }
        match requests.syntax_tree.state() {
            RequestState::Ready => UnitState::Parsed,
            RequestState::Running => UnitState::Parsing,
            RequestState::Pending | RequestState::Failed => UnitState::Unparsed,
        }
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub fn syntax_tree_request(self: &Arc<Self>) -> Request<SyntaxTreeResult> {
        Request {
            unit: self.clone(),
            fetch: CompilationUnit::syntax_tree,
        }
    }

    pub fn file_scope_request(self: &Arc<Self>) -> Request<FileScopeResult> {
        Request {
            unit: self.clone(),
            fetch: CompilationUnit::file_scope,
        }
    }

    pub fn outgoing_dependencies_request(self: &Arc<Self>) -> Request<OutgoingDependenciesResult> {
        Request {
            unit: self.clone(),
            fetch: CompilationUnit::outgoing_dependencies,
        }
    }

    pub fn abc_bytes_request(self: &Arc<Self>) -> Request<AbcBytesResult> {
        Request {
            unit: self.clone(),
            fetch: CompilationUnit::abc_bytes,
        }
    }

    pub fn syntax_tree(&self) -> Result<Arc<SyntaxTreeResult>> {
        let access = self.begin()?;
        self.syntax_tree_in(&access)
    }

    /// Definitions of this unit. Publishes them into the project scope.
    pub fn file_scope(&self) -> Result<Arc<FileScopeResult>> {
        let access = self.begin()?;
        self.file_scope_in(&access)
    }

    /// Resolves every reference of the unit, recording dependency edges and
    /// problems.
    pub fn outgoing_dependencies(&self) -> Result<Arc<OutgoingDependenciesResult>> {
        let access = self.begin()?;
        self.outgoing_in(&access)
    }

    pub fn abc_bytes(&self) -> Result<Arc<AbcBytesResult>> {
        let access = self.begin()?;
        access.requests.abc.get_or_compute(&access.token, || {
            let scope = self.file_scope_in(&access)?;
            self.outgoing_in(&access)?;
            let bytes: Arc<[u8]> = match (self.kind, &self.source) {
                (UnitKind::SwcEmbedded, UnitSource::File(file)) => self.read_bytes(&access, *file)?,
                _ => {
                    let input = CodegenInput {
                        project: &access.project,
                        unit: self,
                        file_scope: &scope,
                        parallel: access.project.use_parallel_code_generation(),
                        cancel: &access.token,
                    };
                    access.project.code_generator().generate(&input)?.into()
                }
            };
            tracing::debug!(unit = %self.id, bytes = bytes.len(), "bytecode ready");
            Ok(AbcBytesResult { bytes })
        })
    }

    /// Qualified names of the definitions this unit actually declares.
    pub fn qualified_names(&self) -> Result<Vec<QName>> {
        Ok(self.file_scope()?.qualified_names())
    }

    /// Problems of the requests computed so far.
    pub fn problems(&self) -> Vec<Problem> {
        let requests = self.requests.lock().clone();
        let mut out = Vec::new();
        if let Some(tree) = requests.syntax_tree.peek() {
            out.extend(tree.problems.iter().cloned());
        }
        if let Some(scope) = requests.file_scope.peek() {
            out.extend(scope.problems.iter().cloned());
        }
        if let Some(outgoing) = requests.outgoing.peek() {
            out.extend(outgoing.problems.iter().cloned());
        }
        out
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Discard all derived data. Returns the new generation.
    pub(crate) fn reset(&self) -> u32 {
        let mut requests = self.requests.lock();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *requests = Arc::new(UnitRequests::new(generation));
        generation
    }

    /// Mark the unit as removed from its project.
    pub(crate) fn invalidate_permanently(&self) {
        self.valid.store(false, Ordering::Release);
        self.reset();
    }

    fn invalid(&self) -> CompileError {
        CompileError::InvalidUnit(self.name.clone())
    }

    fn begin(&self) -> Result<Access> {
        if !self.is_valid() {
            return Err(self.invalid());
        }
        let project = self.project.upgrade().ok_or_else(|| self.invalid())?;
        let project = Project::enter(&project).map_err(|_| self.invalid())?;
        if !self.is_valid() {
            return Err(self.invalid());
        }
        self.check_freshness(&project);
        let requests = self.requests.lock().clone();
        let token = project.cancellation_token();
        Ok(Access {
            project,
            requests,
            token,
        })
    }

    /// Invalidate the unit when its source changed since it was parsed.
    fn check_freshness(&self, project: &Project) {
        let UnitSource::File(file) = self.source else {
            return;
        };
        let Some(tree) = self.requests.lock().syntax_tree.peek() else {
            return;
        };
        let current = project.files().stamp(file);
        if tree.stamp != current {
            tracing::debug!(unit = %self.id, "source changed since parse");
            project.invalidate_units(&[self.id]);
        }
    }

    fn syntax_tree_in(&self, access: &Access) -> Result<Arc<SyntaxTreeResult>> {
        access
            .requests
            .syntax_tree
            .get_or_compute(&access.token, || self.parse(access))
    }

    fn file_scope_in(&self, access: &Access) -> Result<Arc<FileScopeResult>> {
        let generation = access.requests.generation;
        let result = access.requests.file_scope.get_or_compute(&access.token, || {
            let tree = self.syntax_tree_in(access)?;
            let result = lower_file(
                LowerContext {
                    unit: self.id,
                    generation,
                    file: self.source_file(),
                    line_index: tree.line_index.clone(),
                },
                &tree.ast,
            );
            access.project.report_problems(result.problems.iter().cloned());
            Ok(result)
        });
        match result {
            Ok(result) => {
                access.project.publish_file_scope(self, &result);
                Ok(result)
            }
            Err(err) => {
                if err.is_unit_local() {
                    access.project.publish_failure(self, generation, &err);
                }
                Err(err)
            }
        }
    }

    fn outgoing_in(&self, access: &Access) -> Result<Arc<OutgoingDependenciesResult>> {
        access.requests.outgoing.get_or_compute(&access.token, || {
            let scope = self.file_scope_in(access)?;
            let result = analysis::analyze(&access.project, self, &scope, &access.token)?;
            access.project.report_problems(result.problems.iter().cloned());
            Ok(result)
        })
    }

    fn source_path(&self, access: &Access, file: FileId) -> PathBuf {
        access
            .project
            .files()
            .path(file)
            .unwrap_or_else(|| PathBuf::from(self.name.as_str()))
    }

    fn read_bytes(&self, access: &Access, file: FileId) -> Result<Arc<[u8]>> {
        let path = self.source_path(access, file);
        let spec = access.project.files().spec(file).ok_or_else(|| not_registered(&path))?;
        spec.read_bytes().map_err(|err| CompileError::io(&path, err))
    }

    fn parse(&self, access: &Access) -> Result<SyntaxTreeResult> {
        let file = match &self.source {
            UnitSource::Synthetic(ast) => {
                return Ok(SyntaxTreeResult {
                    ast: ast.clone(),
                    stamp: None,
                    line_index: None,
                    problems: Vec::new(),
                });
            }
            UnitSource::File(file) => *file,
        };

        let project = &access.project;
        let path = self.source_path(access, file);
        let stamp = project.files().stamp(file);
        let spec = project.files().spec(file).ok_or_else(|| not_registered(&path))?;
        let config = project.config();
        let text = spec
            .read_text(ReadOptions {
                strip_cr: config.strip_cr,
            })
            .map_err(|err| {
                tracing::warn!(unit = %self.id, path = %path.display(), error = %err, "cannot read source");
                CompileError::io(&path, err)
            })?;

        let locale = self.locale.as_deref().unwrap_or(config.locale.as_str());
        let parse = project.syntax_provider().parse(&ParseInput {
            language: self.kind.language(),
            path: &path,
            text: &text,
            expected_name: self.expected.first(),
            locale,
        });

        let line_index = Arc::new(LineIndex::new(&text));
        let problems: Vec<Problem> = parse
            .errors
            .iter()
            .map(|error| {
                let (start, end) = line_index.range(error.range);
                Problem::error(ProblemKind::SyntaxError, error.message.as_str())
                    .with_unit(self.id)
                    .with_location(Some(SourceLocation {
                        file,
                        range: error.range,
                        start,
                        end,
                    }))
            })
            .collect();
        project.report_problems(problems.iter().cloned());

        tracing::debug!(unit = %self.id, path = %path.display(), errors = problems.len(), "unit parsed");
        Ok(SyntaxTreeResult {
            ast: Arc::new(parse.file),
            stamp,
            line_index: Some(line_index),
            problems,
        })
    }
}

fn not_registered(path: &std::path::Path) -> CompileError {
    CompileError::io(
        path,
        io::Error::new(io::ErrorKind::NotFound, "file is not registered with the workspace"),
    )
}

impl std::fmt::Debug for CompilationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationUnit")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("generation", &self.generation())
            .finish()
    }
}
