//! Building a set of root units into ordered bytecode.

use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};

use crate::error::{CompileError, Result};
use crate::hir::{CompilationUnit, Problem, UnitId};

use super::project::Project;

/// A request failing with a stale generation is retried this many times
/// before the failure is returned.
const MAX_RETRIES: u32 = 3;

/// Result of [`SwfTarget::build`].
#[derive(Debug)]
pub struct BuildOutput {
    /// Units in SWF order, bases before subclasses.
    pub units: Vec<Arc<CompilationUnit>>,
    /// Bytecode per unit, in the same order.
    pub bytecode: Vec<(UnitId, Arc<[u8]>)>,
    pub problems: Vec<Problem>,
}

impl BuildOutput {
    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(Problem::is_error)
    }

    /// All bytecode concatenated in order.
    pub fn concatenated(&self) -> Vec<u8> {
        self.bytecode.iter().flat_map(|(_, bytes)| bytes.iter().copied()).collect()
    }
}

/// Builds the units reachable from a set of roots.
#[derive(Clone, Debug)]
pub struct SwfTarget {
    project: Arc<Project>,
}

impl SwfTarget {
    pub fn new(project: Arc<Project>) -> Self {
        Self { project }
    }

    /// Analyze every unit reachable from `roots`, then generate bytecode
    /// in SWF order. Units whose source cannot be read are skipped.
    #[tracing::instrument(skip(self, roots), fields(project = %self.project.id(), roots = roots.len()))]
    pub fn build(&self, roots: &[UnitId]) -> Result<BuildOutput> {
        let project = Project::enter(&self.project)?;
        let parallel = project.use_parallel_code_generation();
        let token = project.cancellation_token();

        let mut seen: FxHashSet<UnitId> = FxHashSet::default();
        let mut skipped: FxHashSet<UnitId> = FxHashSet::default();
        let mut retries: FxHashMap<UnitId, u32> = FxHashMap::default();
        let mut wave: Vec<Arc<CompilationUnit>> = Vec::new();
        for root in roots {
            let unit = project
                .unit(*root)
                .ok_or_else(|| CompileError::InvalidUnit(root.to_string().into()))?;
            if seen.insert(*root) {
                wave.push(unit);
            }
        }

        let mut waves = 0usize;
        while !wave.is_empty() {
            if token.is_cancelled() {
                return Err(CompileError::Interrupted);
            }
            waves += 1;
            let results: Vec<(Arc<CompilationUnit>, Result<()>)> = if parallel {
                wave.par_iter()
                    .map(|unit| (unit.clone(), unit.outgoing_dependencies().map(|_| ())))
                    .collect()
            } else {
                wave.iter()
                    .map(|unit| (unit.clone(), unit.outgoing_dependencies().map(|_| ())))
                    .collect()
            };

            let mut next = Vec::new();
            for (unit, result) in results {
                match result {
                    Ok(()) => {}
                    Err(err) if err.is_unit_local() => {
                        warn!(unit = %unit.id(), error = %err, "skipping unit");
                        skipped.insert(unit.id());
                        continue;
                    }
                    Err(err) if err.is_interrupted() && !token.is_cancelled() => {
                        let count = retries.entry(unit.id()).or_default();
                        *count += 1;
                        if *count > MAX_RETRIES {
                            return Err(err);
                        }
                        next.push(unit);
                        continue;
                    }
                    Err(err) => return Err(err),
                }
                for dependency in project.direct_dependencies(unit.id()) {
                    if seen.insert(dependency) {
                        if let Some(unit) = project.unit(dependency) {
                            next.push(unit);
                        }
                    }
                }
            }
            wave = next;
        }

        let units: Vec<Arc<CompilationUnit>> = project
            .reachable_compilation_units_in_swf_order(roots)
            .into_iter()
            .filter(|unit| !skipped.contains(&unit.id()))
            .collect();

        let generated: Vec<(UnitId, Result<Arc<[u8]>>)> = if parallel {
            units
                .par_iter()
                .map(|unit| (unit.id(), bytes_of(unit)))
                .collect()
        } else {
            units.iter().map(|unit| (unit.id(), bytes_of(unit))).collect()
        };

        let mut bytecode = Vec::with_capacity(generated.len());
        for (unit, result) in generated {
            match result {
                Ok(bytes) => bytecode.push((unit, bytes)),
                Err(err) if err.is_unit_local() => {
                    warn!(unit = %unit, error = %err, "no bytecode for unit");
                    skipped.insert(unit);
                }
                Err(err) => return Err(err),
            }
        }
        let units: Vec<_> = units.into_iter().filter(|unit| !skipped.contains(&unit.id())).collect();

        let problems = project.problems();
        info!(
            waves,
            units = units.len(),
            skipped = skipped.len(),
            problems = problems.len(),
            "build finished"
        );
        Ok(BuildOutput {
            units,
            bytecode,
            problems,
        })
    }
}

fn bytes_of(unit: &CompilationUnit) -> Result<Arc<[u8]>> {
    Ok(unit.abc_bytes()?.bytes.clone())
}
