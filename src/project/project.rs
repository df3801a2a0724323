//! A project: compilation units, the project scope, the dependency graph and
//! the problems found so far.
//!
//! Projects are created by a [`Workspace`](super::Workspace) and share its
//! file set. Every request of a unit holds an [`ActiveGuard`] on the project,
//! so deletion waits until in-flight work has drained.

use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::{SmolStr, format_smolstr};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::base::QName;
use crate::error::{CompileError, Result};
use crate::hir::unit::{UnitDescriptor, UnitSource};
use crate::hir::{
    AmbiguityResolver, CodeGenerator, CompilationUnit, DefId, Definition, DefinitionKind,
    DefinitionPriority, DependencyGraph, DependencyType, DependencyTypeSet, ExactOverridePolicy,
    FileId, FileScopeResult, ListingGenerator, NoAmbiguityResolver, OverridePolicy, PathOrigin,
    Problem, ProblemCollection, ProblemKind, ProjectId, ProjectScope, ScopeLookup,
    SubclassOverridePolicy, UnitId, UnitKind,
};
use crate::syntax::{FileNode, OutlineSyntaxProvider, SourceLanguage, SyntaxProvider};

use super::config::ProjectConfig;
use super::file_set::FileSet;
use super::file_spec::{FileSpecification, ZipEntryFile};
use super::source_path::SourcePathManager;
use super::workspace::WorkspaceInner;

/// Upper bound on promise rounds of one lookup. Each round builds one file
/// scope, so this only trips when units keep being invalidated underneath.
const MAX_PROMISE_ROUNDS: usize = 256;

struct Services {
    syntax: Arc<dyn SyntaxProvider>,
    /// Whether `syntax` was supplied by the caller rather than derived from
    /// the configuration.
    custom_syntax: bool,
    ambiguity: Arc<dyn AmbiguityResolver>,
    overrides: Option<Arc<dyn OverridePolicy>>,
    codegen: Arc<dyn CodeGenerator>,
}

impl Services {
    fn new(config: &ProjectConfig) -> Self {
        Self {
            syntax: Arc::new(default_syntax_provider(config)),
            custom_syntax: false,
            ambiguity: Arc::new(NoAmbiguityResolver),
            overrides: None,
            codegen: Arc::new(ListingGenerator),
        }
    }
}

fn default_syntax_provider(config: &ProjectConfig) -> OutlineSyntaxProvider {
    OutlineSyntaxProvider::new()
        .with_manifests(config.syntax_manifests())
        .with_bundle_base(config.bundle_base.as_str())
}

#[derive(Default)]
struct UnitTable {
    units: IndexMap<UnitId, Arc<CompilationUnit>>,
    by_file: FxHashMap<FileId, Vec<UnitId>>,
}

#[derive(Default)]
struct Lifecycle {
    active: usize,
    deleted: bool,
}

/// Keeps a project active. Deletion waits for every guard to drop.
pub struct ActiveGuard {
    project: Arc<Project>,
}

impl Deref for ActiveGuard {
    type Target = Project;

    fn deref(&self) -> &Project {
        &self.project
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut lifecycle = self.project.lifecycle.lock();
        lifecycle.active -= 1;
        if lifecycle.active == 0 {
            self.project.idle.notify_all();
        }
    }
}

pub struct Project {
    id: ProjectId,
    this: Weak<Project>,
    workspace: Weak<WorkspaceInner>,
    files: Arc<FileSet>,
    config: RwLock<Arc<ProjectConfig>>,
    paths: RwLock<Arc<SourcePathManager>>,
    services: RwLock<Services>,
    units: RwLock<UnitTable>,
    next_unit: AtomicU32,
    scope: ProjectScope,
    graph: DependencyGraph,
    /// Names that failed to resolve, with the unit generations that asked.
    unfound: Mutex<FxHashMap<SmolStr, Vec<(UnitId, u32)>>>,
    problems: Mutex<ProblemCollection>,
    lifecycle: Mutex<Lifecycle>,
    idle: Condvar,
    cancel: Mutex<CancellationToken>,
    parallel_codegen: AtomicBool,
}

impl Project {
    pub(crate) fn new(
        workspace: Weak<WorkspaceInner>,
        files: Arc<FileSet>,
        config: ProjectConfig,
    ) -> Arc<Project> {
        Arc::new_cyclic(|this| Project {
            id: ProjectId::new(),
            this: this.clone(),
            workspace,
            files,
            paths: RwLock::new(Arc::new(SourcePathManager::new(&config))),
            services: RwLock::new(Services::new(&config)),
            parallel_codegen: AtomicBool::new(config.parallel_code_generation),
            config: RwLock::new(Arc::new(config)),
            units: RwLock::new(UnitTable::default()),
            next_unit: AtomicU32::new(0),
            scope: ProjectScope::new(),
            graph: DependencyGraph::new(),
            unfound: Mutex::new(FxHashMap::default()),
            problems: Mutex::new(ProblemCollection::new()),
            lifecycle: Mutex::new(Lifecycle::default()),
            idle: Condvar::new(),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// Mark the project active for the lifetime of the returned guard.
    pub fn enter(project: &Arc<Project>) -> Result<ActiveGuard> {
        let mut lifecycle = project.lifecycle.lock();
        if lifecycle.deleted {
            return Err(CompileError::ProjectDeleted);
        }
        lifecycle.active += 1;
        Ok(ActiveGuard {
            project: project.clone(),
        })
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle.lock().deleted
    }

    fn check_live(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(CompileError::ProjectDeleted);
        }
        Ok(())
    }

    // ========================================================================
    // CONFIGURATION AND SERVICES
    // ========================================================================

    pub fn config(&self) -> Arc<ProjectConfig> {
        self.config.read().clone()
    }

    /// Replace the configuration and clean the project. Existing units keep
    /// the priority they were added with.
    pub fn set_config(&self, config: ProjectConfig) {
        {
            let mut services = self.services.write();
            if !services.custom_syntax {
                services.syntax = Arc::new(default_syntax_provider(&config));
            }
        }
        *self.paths.write() = Arc::new(SourcePathManager::new(&config));
        self.parallel_codegen
            .store(config.parallel_code_generation, Ordering::Release);
        *self.config.write() = Arc::new(config);
        self.clean();
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn source_paths(&self) -> Arc<SourcePathManager> {
        self.paths.read().clone()
    }

    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn syntax_provider(&self) -> Arc<dyn SyntaxProvider> {
        self.services.read().syntax.clone()
    }

    pub fn set_syntax_provider(&self, provider: Arc<dyn SyntaxProvider>) {
        {
            let mut services = self.services.write();
            services.syntax = provider;
            services.custom_syntax = true;
        }
        self.clean();
    }

    pub fn ambiguity_resolver(&self) -> Arc<dyn AmbiguityResolver> {
        self.services.read().ambiguity.clone()
    }

    pub fn set_ambiguity_resolver(&self, resolver: Arc<dyn AmbiguityResolver>) {
        self.services.write().ambiguity = resolver;
        self.clean();
    }

    /// The override policy in effect: a custom one, or the one the
    /// configuration selects.
    pub fn override_policy(&self) -> Arc<dyn OverridePolicy> {
        if let Some(policy) = &self.services.read().overrides {
            return policy.clone();
        }
        if self.config.read().subclass_overrides {
            Arc::new(SubclassOverridePolicy)
        } else {
            Arc::new(ExactOverridePolicy)
        }
    }

    pub fn set_override_policy(&self, policy: Arc<dyn OverridePolicy>) {
        self.services.write().overrides = Some(policy);
        self.clean();
    }

    pub fn code_generator(&self) -> Arc<dyn CodeGenerator> {
        self.services.read().codegen.clone()
    }

    pub fn set_code_generator(&self, generator: Arc<dyn CodeGenerator>) {
        self.services.write().codegen = generator;
        self.clean();
    }

    pub fn use_parallel_code_generation(&self) -> bool {
        self.parallel_codegen.load(Ordering::Acquire)
    }

    pub fn set_use_parallel_code_generation(&self, enabled: bool) {
        self.parallel_codegen.store(enabled, Ordering::Release);
    }

    // ========================================================================
    // INTERRUPTION
    // ========================================================================

    /// Token observed by requests started from now on.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Cancel every running request. Later requests get a fresh token.
    pub fn interrupt(&self) {
        let mut cancel = self.cancel.lock();
        cancel.cancel();
        *cancel = CancellationToken::new();
        debug!(project = %self.id, "project interrupted");
    }

    // ========================================================================
    // UNITS
    // ========================================================================

    /// Add a source file. Adding a file twice returns the existing unit.
    pub fn add_source_file(&self, path: impl AsRef<Path>) -> Result<Arc<CompilationUnit>> {
        let path = path.as_ref();
        let kind = source_kind(path)?;
        let file = self.files.file_id(path);
        self.add_file_unit(kind, file, path)
    }

    pub fn add_compilation_units<I, P>(&self, paths: I) -> Result<Vec<Arc<CompilationUnit>>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|path| self.add_source_file(path))
            .collect()
    }

    /// Register `spec` with the workspace and add it as a source unit.
    pub fn add_file_specification(&self, spec: Arc<dyn FileSpecification>) -> Result<Arc<CompilationUnit>> {
        let path = spec.path().to_path_buf();
        let kind = source_kind(&path)?;
        let file = self.files.register(spec);
        self.add_file_unit(kind, file, &path)
    }

    /// Add one source entry of a library archive.
    pub fn add_library_entry(&self, entry: ZipEntryFile) -> Result<Arc<CompilationUnit>> {
        self.check_live()?;
        let paths = self.source_paths();
        let root_index = paths
            .library_roots()
            .iter()
            .position(|root| entry.archive().starts_with(root))
            .unwrap_or(paths.library_roots().len());
        let expected = expected_from_entry(entry.entry());
        let name = SmolStr::new(entry.path().to_string_lossy());
        let file = self.files.register(Arc::new(entry));
        if let Some(existing) = self.existing_unit(file, UnitKind::SwcEmbedded) {
            return Ok(existing);
        }
        Ok(self.insert_unit(
            UnitKind::SwcEmbedded,
            UnitSource::File(file),
            name,
            expected,
            (PathOrigin::LibraryPath, root_index as u32),
            None,
        ))
    }

    /// Add a unit built from an already parsed tree, such as one decoded
    /// from bytecode. It promises every name the tree declares.
    pub fn add_abc_unit(&self, name: impl Into<SmolStr>, ast: FileNode) -> Result<Arc<CompilationUnit>> {
        self.check_live()?;
        let expected = ast.declared_qnames();
        let root_index = self.source_paths().library_roots().len() as u32;
        Ok(self.insert_unit(
            UnitKind::AbcOnly,
            UnitSource::Synthetic(Arc::new(ast)),
            name.into(),
            expected,
            (PathOrigin::LibraryPath, root_index),
            None,
        ))
    }

    fn add_file_unit(&self, kind: UnitKind, file: FileId, path: &Path) -> Result<Arc<CompilationUnit>> {
        self.check_live()?;
        if let Some(existing) = self.existing_unit(file, kind) {
            return Ok(existing);
        }
        let info = self.source_paths().locate(path);
        Ok(self.insert_unit(
            kind,
            UnitSource::File(file),
            SmolStr::new(path.to_string_lossy()),
            info.expected,
            (info.origin, info.root_index),
            info.locale,
        ))
    }

    fn existing_unit(&self, file: FileId, kind: UnitKind) -> Option<Arc<CompilationUnit>> {
        let table = self.units.read();
        table
            .by_file
            .get(&file)?
            .iter()
            .filter_map(|id| table.units.get(id))
            .find(|unit| unit.kind() == kind)
            .cloned()
    }

    fn insert_unit(
        &self,
        kind: UnitKind,
        source: UnitSource,
        name: SmolStr,
        expected: Vec<QName>,
        (origin, root_index): (PathOrigin, u32),
        locale: Option<SmolStr>,
    ) -> Arc<CompilationUnit> {
        let id = UnitId::new(self.next_unit.fetch_add(1, Ordering::Relaxed));
        let priority = DefinitionPriority::new(origin, root_index, u64::from(id.index()));
        let file = match &source {
            UnitSource::File(file) => Some(*file),
            UnitSource::Synthetic(_) => None,
        };
        let unit = Arc::new(CompilationUnit::new(
            id,
            UnitDescriptor {
                kind,
                source,
                name,
                expected: expected.clone(),
                priority,
                locale,
            },
            self.this.clone(),
        ));

        {
            let mut table = self.units.write();
            table.units.insert(id, unit.clone());
            if let Some(file) = file {
                table.by_file.entry(file).or_default().push(id);
            }
        }
        self.graph.add_unit(id);
        self.scope.add_unit(id, priority, unit.generation(), &expected);
        debug!(project = %self.id, unit = %id, ?kind, name = unit.name(), "unit added");

        // A new provider may satisfy names that failed before.
        self.invalidate_unfound(&expected, id);
        unit
    }

    /// Remove units from the project. Their dependents are invalidated and
    /// names they shadowed become visible again.
    #[tracing::instrument(skip(self, ids), fields(project = %self.id, count = ids.len()))]
    pub fn remove_compilation_units(&self, ids: &[UnitId]) {
        let removed: Vec<Arc<CompilationUnit>> = {
            let table = self.units.read();
            ids.iter().filter_map(|id| table.units.get(id).cloned()).collect()
        };
        if removed.is_empty() {
            return;
        }
        let removed_ids: FxHashSet<UnitId> = removed.iter().map(|unit| unit.id()).collect();
        let dependents: Vec<UnitId> = self
            .graph
            .invalidation_set(ids)
            .into_iter()
            .filter(|id| !removed_ids.contains(id))
            .collect();

        for unit in &removed {
            let id = unit.id();
            unit.invalidate_permanently();
            self.scope.remove_unit(id);
            self.graph.remove_unit(id);
            self.forget_unit_records(id);
            let mut table = self.units.write();
            table.units.shift_remove(&id);
            if let Some(file) = unit.source_file() {
                if let Some(list) = table.by_file.get_mut(&file) {
                    list.retain(|other| *other != id);
                    if list.is_empty() {
                        table.by_file.remove(&file);
                    }
                }
            }
        }
        info!(removed = removed.len(), dependents = dependents.len(), "units removed");
        self.invalidate_units(&dependents);
    }

    /// Units in the order they were added.
    pub fn units(&self) -> Vec<Arc<CompilationUnit>> {
        self.units.read().units.values().cloned().collect()
    }

    pub fn unit(&self, id: UnitId) -> Option<Arc<CompilationUnit>> {
        self.units.read().units.get(&id).cloned()
    }

    pub fn units_for_file(&self, file: FileId) -> Vec<Arc<CompilationUnit>> {
        let table = self.units.read();
        table
            .by_file
            .get(&file)
            .into_iter()
            .flatten()
            .filter_map(|id| table.units.get(id).cloned())
            .collect()
    }

    pub fn units_for_path(&self, path: &Path) -> Vec<Arc<CompilationUnit>> {
        match self.files.lookup(path) {
            Some(file) => self.units_for_file(file),
            None => Vec::new(),
        }
    }

    /// Fails with [`CompileError::InvalidUnit`] unless `id` is a live unit
    /// of this project.
    pub fn check_unit(&self, id: UnitId) -> Result<()> {
        match self.unit(id) {
            Some(unit) if unit.is_valid() => Ok(()),
            _ => Err(CompileError::InvalidUnit(format_smolstr!("{id}"))),
        }
    }

    /// Like [`Project::check_unit`], also failing with
    /// [`CompileError::Interrupted`] when `id` belongs to an older
    /// generation of its unit.
    pub fn check_definition(&self, id: DefId) -> Result<()> {
        let unit = self
            .unit(id.unit)
            .filter(|unit| unit.is_valid())
            .ok_or_else(|| CompileError::InvalidUnit(format_smolstr!("{}", id.unit)))?;
        if unit.generation() != id.generation {
            return Err(CompileError::Interrupted);
        }
        Ok(())
    }

    // ========================================================================
    // QUALIFIED NAMES
    // ========================================================================

    /// Definitions visible under `qname`, building file scopes of units that
    /// promised the name until one publishes it.
    pub fn lookup_qname(&self, qname: &QName) -> Result<Vec<Arc<Definition>>> {
        self.check_live()?;
        let mut drained = false;
        for _ in 0..MAX_PROMISE_ROUNDS {
            match self.scope.lookup(qname) {
                ScopeLookup::Found { definitions, .. } => return Ok(definitions),
                ScopeLookup::Promised(unit) => self.force_file_scope(unit)?,
                ScopeLookup::Missing if !drained => {
                    // Units whose location promised nothing may still define it.
                    drained = true;
                    if !self.drain_unpublished()? {
                        return Ok(Vec::new());
                    }
                }
                ScopeLookup::Missing => return Ok(Vec::new()),
            }
        }
        warn!(project = %self.id, %qname, "lookup did not settle");
        Err(CompileError::Internal(format!("definitions of '{qname}' did not settle")))
    }

    /// The definition `qname` resolves to, skipping package definitions.
    pub fn resolve_qname_to_definition(&self, qname: &QName) -> Result<Option<Arc<Definition>>> {
        Ok(self
            .lookup_qname(qname)?
            .into_iter()
            .find(|def| def.kind() != DefinitionKind::Package))
    }

    /// The unit whose definition of `qname` is visible.
    pub fn resolve_qname_to_compilation_unit(&self, qname: &QName) -> Result<Option<Arc<CompilationUnit>>> {
        let Some(def) = self.resolve_qname_to_definition(qname)? else {
            return Ok(None);
        };
        Ok(self.unit(def.unit()))
    }

    /// Build the file scope of every unit that has not published. Returns
    /// whether there was any.
    pub fn drain_unpublished(&self) -> Result<bool> {
        let pending = self.scope.unpublished();
        if pending.is_empty() {
            return Ok(false);
        }
        debug!(project = %self.id, count = pending.len(), "building unpublished file scopes");
        for unit in pending {
            self.force_file_scope(unit)?;
        }
        Ok(true)
    }

    fn force_file_scope(&self, id: UnitId) -> Result<()> {
        let Some(unit) = self.unit(id) else {
            self.scope.remove_unit(id);
            return Ok(());
        };
        match unit.file_scope() {
            Ok(_) => Ok(()),
            // Withdrawn from the scope when it failed.
            Err(err) if err.is_unit_local() => Ok(()),
            Err(CompileError::InvalidUnit(_)) if !unit.is_valid() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// The definition with `id`. Fails with [`CompileError::Interrupted`]
    /// when the owning unit moved to another generation, so the asking
    /// request is retried.
    pub fn definition(&self, id: DefId) -> Result<Arc<Definition>> {
        let scope = self.file_scope_for(id)?;
        scope.definition(id.local).cloned().ok_or_else(|| {
            CompileError::Internal(format!("{id:?} is not a definition of its unit"))
        })
    }

    /// The file scope `id` was built in.
    pub fn file_scope_for(&self, id: DefId) -> Result<Arc<FileScopeResult>> {
        let unit = self
            .unit(id.unit)
            .ok_or_else(|| CompileError::InvalidUnit(format_smolstr!("{}", id.unit)))?;
        if unit.generation() != id.generation {
            return Err(CompileError::Interrupted);
        }
        let scope = unit.file_scope()?;
        if scope.generation != id.generation {
            return Err(CompileError::Interrupted);
        }
        Ok(scope)
    }

    // ========================================================================
    // DEPENDENCIES
    // ========================================================================

    /// Record an edge on behalf of a request of `from` at `generation`.
    /// Edges from stale generations are dropped.
    pub fn add_dependency(&self, from: UnitId, generation: u32, to: UnitId, ty: DependencyType, qname: &str) {
        let current = self.units.read().units.get(&from).map(|unit| unit.generation());
        if current != Some(generation) {
            return;
        }
        self.graph.add_dependency(from, to, ty, Some(qname));
    }

    pub fn direct_dependencies(&self, unit: UnitId) -> Vec<UnitId> {
        self.graph.direct_dependencies(unit)
    }

    pub fn direct_reverse_dependencies(&self, unit: UnitId, types: DependencyTypeSet) -> Vec<UnitId> {
        self.graph.direct_reverse_dependencies(unit, types)
    }

    /// Units reachable from `roots` over the edges recorded so far, bases
    /// before subclasses.
    pub fn reachable_compilation_units_in_swf_order(&self, roots: &[UnitId]) -> Vec<Arc<CompilationUnit>> {
        self.graph
            .reachable_in_swf_order(roots)
            .into_iter()
            .filter_map(|id| self.unit(id))
            .collect()
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Discard the derived data of `roots` and of the units that depend on
    /// them. Returns the invalidated units.
    pub fn invalidate_units(&self, roots: &[UnitId]) -> Vec<UnitId> {
        if roots.is_empty() {
            return Vec::new();
        }
        let set = self.graph.invalidation_set(roots);
        for id in &set {
            let Some(unit) = self.unit(*id) else {
                continue;
            };
            let generation = unit.reset();
            self.graph.remove_dependencies(*id);
            self.forget_unit_records(*id);
            self.scope.retract(*id, generation, unit.expected_qualified_names());
        }
        debug!(project = %self.id, roots = roots.len(), invalidated = set.len(), "units invalidated");
        set
    }

    /// Invalidate every unit built from `file`.
    pub fn invalidate_file(&self, file: FileId) -> Vec<UnitId> {
        let ids: Vec<UnitId> = self
            .units
            .read()
            .by_file
            .get(&file)
            .cloned()
            .unwrap_or_default();
        self.invalidate_units(&ids)
    }

    fn forget_unit_records(&self, unit: UnitId) {
        self.problems.lock().remove_unit(unit);
        let mut unfound = self.unfound.lock();
        unfound.retain(|_, waiters| {
            waiters.retain(|(waiter, _)| *waiter != unit);
            !waiters.is_empty()
        });
    }

    /// Remember that `unit` at `generation` failed to resolve `name`, a
    /// simple or dotted name.
    pub fn record_unfound(&self, unit: UnitId, generation: u32, name: &str) {
        let key = SmolStr::new(name.rsplit('.').next().unwrap_or(name));
        let mut unfound = self.unfound.lock();
        let waiters = unfound.entry(key).or_default();
        if !waiters.contains(&(unit, generation)) {
            waiters.push((unit, generation));
        }
    }

    /// Invalidate the units that failed to resolve one of `names` before
    /// `provider` made them available.
    fn invalidate_unfound(&self, names: &[QName], provider: UnitId) {
        if names.is_empty() {
            return;
        }
        let waiting: Vec<(UnitId, u32)> = {
            let mut unfound = self.unfound.lock();
            names
                .iter()
                .filter_map(|qname| unfound.remove(qname.name()))
                .flatten()
                .collect()
        };
        let mut stale: Vec<UnitId> = waiting
            .into_iter()
            .filter(|(unit, generation)| {
                *unit != provider && self.unit(*unit).is_some_and(|u| u.generation() == *generation)
            })
            .map(|(unit, _)| unit)
            .collect();
        stale.sort_unstable();
        stale.dedup();
        if !stale.is_empty() {
            debug!(project = %self.id, provider = %provider, count = stale.len(), "previously unresolved names now provided");
            self.invalidate_units(&stale);
        }
    }

    /// Publish the externally visible definitions of a freshly built file
    /// scope.
    pub(crate) fn publish_file_scope(&self, unit: &CompilationUnit, result: &FileScopeResult) {
        let definitions: Vec<Arc<Definition>> = result.externally_visible().cloned().collect();
        if !self.scope.publish(unit.id(), result.generation, &definitions) {
            return;
        }
        debug!(project = %self.id, unit = %unit.id(), definitions = definitions.len(), "definitions published");
        self.invalidate_unfound(&result.qualified_names(), unit.id());
    }

    /// Withdraw what a unit promised after its source could not be read.
    pub(crate) fn publish_failure(&self, unit: &CompilationUnit, generation: u32, err: &CompileError) {
        if !self.scope.withdraw(unit.id(), generation) {
            return;
        }
        warn!(project = %self.id, unit = %unit.id(), error = %err, "unit withdrawn");
        self.report_problem(
            Problem::error(ProblemKind::FileNotFound, err.to_string()).with_unit(unit.id()),
        );
    }

    // ========================================================================
    // PROBLEMS
    // ========================================================================

    /// Problems found so far, in the order they were reported.
    pub fn problems(&self) -> Vec<Problem> {
        self.problems.lock().problems().to_vec()
    }

    pub fn problems_for_unit(&self, unit: UnitId) -> Vec<Problem> {
        self.problems.lock().for_unit(unit).into_iter().cloned().collect()
    }

    /// Replace the collected problems.
    pub fn set_problems(&self, problems: Vec<Problem>) {
        let mut collection = self.problems.lock();
        collection.clear();
        collection.extend(problems);
    }

    pub fn report_problem(&self, problem: Problem) {
        self.problems.lock().add(problem);
    }

    pub fn report_problems(&self, problems: impl IntoIterator<Item = Problem>) {
        self.problems.lock().extend(problems);
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Discard every derived result. Units stay; everything is recomputed on
    /// the next request.
    #[tracing::instrument(skip(self), fields(project = %self.id))]
    pub fn clean(&self) {
        self.interrupt();
        let units = self.units();
        self.graph.clear_dependencies();
        self.unfound.lock().clear();
        self.problems.lock().clear();
        for unit in &units {
            let generation = unit.reset();
            self.scope.retract(unit.id(), generation, unit.expected_qualified_names());
        }
        info!(units = units.len(), "project cleaned");
    }

    /// Delete the project: interrupt running requests, wait until none is
    /// active, then invalidate every unit.
    ///
    /// Must not be called from inside a request of this project.
    pub fn delete(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.deleted {
                return Err(CompileError::ProjectDeleted);
            }
            lifecycle.deleted = true;
        }
        self.interrupt();
        {
            let mut lifecycle = self.lifecycle.lock();
            while lifecycle.active > 0 {
                self.idle.wait(&mut lifecycle);
            }
        }

        let units: Vec<Arc<CompilationUnit>> = {
            let mut table = self.units.write();
            table.by_file.clear();
            table.units.drain(..).map(|(_, unit)| unit).collect()
        };
        for unit in &units {
            unit.invalidate_permanently();
            self.scope.remove_unit(unit.id());
            self.graph.remove_unit(unit.id());
        }
        self.unfound.lock().clear();
        if let Some(workspace) = self.workspace.upgrade() {
            workspace.unregister(self.id);
        }
        info!(project = %self.id, units = units.len(), "project deleted");
        Ok(())
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("units", &self.units.read().units.len())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

fn source_kind(path: &Path) -> Result<UnitKind> {
    match SourceLanguage::from_path(path) {
        Some(SourceLanguage::ActionScript) => Ok(UnitKind::AsSource),
        Some(SourceLanguage::Mxml) => Ok(UnitKind::MxmlSource),
        Some(SourceLanguage::Properties) => Ok(UnitKind::ResourceBundle),
        None => Err(CompileError::UnsupportedFile(path.to_path_buf())),
    }
}

/// `flash/events/Event.as` inside an archive promises `flash.events.Event`.
fn expected_from_entry(entry: &str) -> Vec<QName> {
    let Some(stripped) = entry.strip_suffix(".as") else {
        return Vec::new();
    };
    let dotted = stripped.trim_start_matches('/').replace('/', ".");
    QName::parse(&dotted).map(|qname| vec![qname]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::file_spec::StringFile;
    use crate::project::Workspace;

    fn project_with(files: &[(&str, &str)]) -> (Workspace, Arc<Project>) {
        let workspace = Workspace::new();
        let project = workspace
            .create_project(ProjectConfig::new().with_source_path("/src"))
            .unwrap();
        for (path, text) in files {
            project
                .add_file_specification(Arc::new(StringFile::new(*path, *text)))
                .unwrap();
        }
        (workspace, project)
    }

    #[test]
    fn test_add_source_file_is_idempotent() {
        let (_ws, project) = project_with(&[("/src/A.as", "package { public class A {} }")]);
        let again = project.add_source_file("/src/A.as").unwrap();
        assert_eq!(project.units().len(), 1);
        assert_eq!(again.id(), project.units()[0].id());
    }

    #[test]
    fn test_unsupported_extension() {
        let (_ws, project) = project_with(&[]);
        let err = project.add_source_file("/src/notes.txt").unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedFile(_)));
    }

    #[test]
    fn test_lookup_follows_promise() {
        let (_ws, project) = project_with(&[("/src/pkg/A.as", "package pkg { public class A {} }")]);
        let unit = &project.units()[0];
        assert!(!project.scope().is_published(unit.id()));
        let defs = project.lookup_qname(&QName::new("pkg", "A")).unwrap();
        assert_eq!(defs.len(), 1);
        assert!(project.scope().is_published(unit.id()));
    }

    #[test]
    fn test_lookup_drains_unpromised_units() {
        // The location promises `Misplaced`, the file defines `Other`.
        let (_ws, project) = project_with(&[("/src/Misplaced.as", "package { public class Other {} }")]);
        let def = project
            .resolve_qname_to_definition(&QName::top_level("Other"))
            .unwrap()
            .unwrap();
        assert_eq!(def.qname().name(), "Other");
        assert!(project.lookup_qname(&QName::top_level("Misplaced")).unwrap().is_empty());
    }

    #[test]
    fn test_stale_definition_is_interrupted() {
        let (_ws, project) = project_with(&[("/src/A.as", "package { public class A {} }")]);
        let def = project
            .resolve_qname_to_definition(&QName::top_level("A"))
            .unwrap()
            .unwrap();
        project.invalidate_units(&[def.unit()]);
        assert!(project.definition(def.id()).unwrap_err().is_interrupted());
    }

    #[test]
    fn test_expected_from_entry() {
        assert_eq!(expected_from_entry("flash/events/Event.as"), vec![QName::new("flash.events", "Event")]);
        assert!(expected_from_entry("catalog.xml").is_empty());
        assert!(expected_from_entry("bad-dir/A.as").is_empty());
    }

    #[test]
    fn test_delete_rejects_later_work() {
        let (_ws, project) = project_with(&[("/src/A.as", "package { public class A {} }")]);
        let unit = project.units()[0].clone();
        project.delete().unwrap();
        assert!(project.is_deleted());
        assert!(matches!(unit.file_scope(), Err(CompileError::InvalidUnit(_))));
        assert!(matches!(project.add_source_file("/src/B.as"), Err(CompileError::ProjectDeleted)));
        assert!(matches!(project.delete(), Err(CompileError::ProjectDeleted)));
    }

    #[test]
    fn test_deleted_project_rejects_lookups() {
        let (_ws, project) = project_with(&[("/src/A.as", "package { public class A {} }")]);
        project.delete().unwrap();
        let qname = QName::top_level("A");
        assert!(matches!(project.lookup_qname(&qname), Err(CompileError::ProjectDeleted)));
        assert!(matches!(
            project.resolve_qname_to_definition(&qname),
            Err(CompileError::ProjectDeleted)
        ));
        assert!(matches!(
            project.resolve_qname_to_compilation_unit(&qname),
            Err(CompileError::ProjectDeleted)
        ));
    }
}
