//! The dependency graph between compilation units.
//!
//! An edge `from -> to` means `from` depends on `to`. Every edge carries the
//! set of dependency types recorded for it, per qualified name. Types are only
//! ever added to an edge, never replaced, so an inheritance dependency
//! survives any number of weaker uses of the same name.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use super::ids::UnitId;

// ============================================================================
// DEPENDENCY TYPES
// ============================================================================

/// Why one unit depends on another. Declared strongest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub enum DependencyType {
    /// `extends` / `implements`.
    Inheritance,
    /// Parameter, return and variable types.
    Signature,
    /// Custom namespace attributes and `use namespace`.
    Namespace,
    /// A function invoked from a body.
    Call,
    /// Any other name used in a body or initializer.
    Expression,
}

impl DependencyType {
    pub const ALL: [DependencyType; 5] = [
        DependencyType::Inheritance,
        DependencyType::Signature,
        DependencyType::Namespace,
        DependencyType::Call,
        DependencyType::Expression,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Whether a change to the target forces the dependent to be rebuilt.
    pub fn invalidates_dependents(self) -> bool {
        matches!(
            self,
            DependencyType::Inheritance | DependencyType::Signature | DependencyType::Namespace
        )
    }
}

/// A set of [`DependencyType`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DependencyTypeSet(u8);

impl DependencyTypeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    pub const fn of(ty: DependencyType) -> Self {
        Self(ty.bit())
    }

    /// Inheritance, signature and namespace.
    pub const fn invalidating() -> Self {
        Self(
            DependencyType::Inheritance.bit()
                | DependencyType::Signature.bit()
                | DependencyType::Namespace.bit(),
        )
    }

    pub fn insert(&mut self, ty: DependencyType) -> bool {
        let before = self.0;
        self.0 |= ty.bit();
        before != self.0
    }

    pub fn contains(self, ty: DependencyType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The strongest type in the set.
    pub fn strongest(self) -> Option<DependencyType> {
        self.iter().next()
    }

    /// Members, strongest first.
    pub fn iter(self) -> impl Iterator<Item = DependencyType> {
        DependencyType::ALL.into_iter().filter(move |ty| self.contains(*ty))
    }
}

impl FromIterator<DependencyType> for DependencyTypeSet {
    fn from_iter<I: IntoIterator<Item = DependencyType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for ty in iter {
            set.insert(ty);
        }
        set
    }
}

impl From<DependencyType> for DependencyTypeSet {
    fn from(ty: DependencyType) -> Self {
        Self::of(ty)
    }
}

impl fmt::Debug for DependencyTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ============================================================================
// GRAPH
// ============================================================================

#[derive(Clone, Debug, Default)]
struct Edge {
    /// Types recorded per qualified name. Unnamed uses are keyed by "".
    named: IndexMap<SmolStr, DependencyTypeSet>,
    types: DependencyTypeSet,
}

#[derive(Debug, Default)]
struct GraphInner {
    vertices: IndexSet<UnitId>,
    outgoing: FxHashMap<UnitId, IndexMap<UnitId, Edge>>,
    incoming: FxHashMap<UnitId, IndexSet<UnitId>>,
}

/// Directed graph over the compilation units of a project.
///
/// All queries return fresh copies sorted by unit ID, never live views.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: RwLock<GraphInner>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&self, unit: UnitId) {
        self.inner.write().vertices.insert(unit);
    }

    /// Remove a unit and every edge touching it.
    pub fn remove_unit(&self, unit: UnitId) {
        let mut inner = self.inner.write();
        if !inner.vertices.shift_remove(&unit) {
            return;
        }
        if let Some(targets) = inner.outgoing.remove(&unit) {
            for target in targets.keys() {
                if let Some(sources) = inner.incoming.get_mut(target) {
                    sources.shift_remove(&unit);
                }
            }
        }
        if let Some(sources) = inner.incoming.remove(&unit) {
            for source in sources {
                if let Some(targets) = inner.outgoing.get_mut(&source) {
                    targets.shift_remove(&unit);
                }
            }
        }
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.inner.read().vertices.contains(&unit)
    }

    pub fn units(&self) -> Vec<UnitId> {
        self.inner.read().vertices.iter().copied().collect()
    }

    /// Record that `from` depends on `to`.
    ///
    /// Self-edges and edges touching unknown units are dropped. Returns whether
    /// the graph changed.
    pub fn add_dependency(
        &self,
        from: UnitId,
        to: UnitId,
        ty: DependencyType,
        qname: Option<&str>,
    ) -> bool {
        if from == to {
            return false;
        }
        let mut inner = self.inner.write();
        if !inner.vertices.contains(&from) || !inner.vertices.contains(&to) {
            return false;
        }
        let edge = inner
            .outgoing
            .entry(from)
            .or_default()
            .entry(to)
            .or_default();
        let mut changed = edge.types.insert(ty);
        changed |= edge
            .named
            .entry(SmolStr::new(qname.unwrap_or_default()))
            .or_default()
            .insert(ty);
        inner.incoming.entry(to).or_default().insert(from);
        if changed {
            tracing::trace!(%from, %to, ?ty, qname, "dependency added");
        }
        changed
    }

    /// Drop every outgoing edge of `from`.
    pub fn remove_dependencies(&self, from: UnitId) {
        let mut inner = self.inner.write();
        let Some(targets) = inner.outgoing.remove(&from) else {
            return;
        };
        for target in targets.keys() {
            if let Some(sources) = inner.incoming.get_mut(target) {
                sources.shift_remove(&from);
            }
        }
    }

    /// Drop every edge, keeping the units.
    pub fn clear_dependencies(&self) {
        let mut inner = self.inner.write();
        inner.outgoing.clear();
        inner.incoming.clear();
    }

    /// Units `unit` depends on.
    pub fn direct_dependencies(&self, unit: UnitId) -> Vec<UnitId> {
        let inner = self.inner.read();
        let mut out: Vec<UnitId> = inner
            .outgoing
            .get(&unit)
            .map(|targets| targets.keys().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Units depending on `unit` through at least one of `types`.
    pub fn direct_reverse_dependencies(&self, unit: UnitId, types: DependencyTypeSet) -> Vec<UnitId> {
        let inner = self.inner.read();
        let mut out: Vec<UnitId> = inner
            .incoming
            .get(&unit)
            .into_iter()
            .flatten()
            .copied()
            .filter(|source| inner.edge(*source, unit).is_some_and(|e| e.types.intersects(types)))
            .collect();
        out.sort_unstable();
        out
    }

    pub fn dependency_types(&self, from: UnitId, to: UnitId) -> DependencyTypeSet {
        self.inner
            .read()
            .edge(from, to)
            .map(|edge| edge.types)
            .unwrap_or_default()
    }

    /// The strongest recorded type of `from -> to`.
    pub fn dependency_type(&self, from: UnitId, to: UnitId) -> Option<DependencyType> {
        self.dependency_types(from, to).strongest()
    }

    /// Qualified names behind `from -> to`, in recording order.
    pub fn named_dependencies(&self, from: UnitId, to: UnitId) -> Vec<(SmolStr, DependencyTypeSet)> {
        self.inner
            .read()
            .edge(from, to)
            .map(|edge| {
                edge.named
                    .iter()
                    .map(|(name, types)| (name.clone(), *types))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Units to invalidate when `roots` change: the roots, every direct
    /// dependent, and transitively the dependents reached through
    /// inheritance, signature or namespace edges.
    ///
    /// A unit first reached through a weak edge is still propagated from when
    /// a strong edge reaches it later, so the result does not depend on the
    /// order edges were recorded in.
    pub fn invalidation_set(&self, roots: &[UnitId]) -> Vec<UnitId> {
        let inner = self.inner.read();
        let mut included: FxHashSet<UnitId> = FxHashSet::default();
        let mut propagated: FxHashSet<UnitId> = FxHashSet::default();
        let mut worklist: Vec<UnitId> = Vec::new();
        for root in roots {
            included.insert(*root);
            if propagated.insert(*root) {
                worklist.push(*root);
            }
        }
        while let Some(unit) = worklist.pop() {
            let Some(sources) = inner.incoming.get(&unit) else {
                continue;
            };
            for source in sources {
                let Some(edge) = inner.edge(*source, unit) else {
                    continue;
                };
                included.insert(*source);
                if edge.types.intersects(DependencyTypeSet::invalidating())
                    && propagated.insert(*source)
                {
                    worklist.push(*source);
                }
            }
        }
        let mut out: Vec<UnitId> = included.into_iter().collect();
        out.sort_unstable();
        tracing::debug!(roots = roots.len(), invalidated = out.len(), "invalidation set");
        out
    }

    /// Every unit reachable from `roots`, dependencies first.
    ///
    /// A depth-first post-order over dependencies sorted by unit ID, with units
    /// marked visited before their dependencies are explored, so cycles close
    /// without duplicates. Inheritance edges are then enforced strictly: a
    /// base unit always precedes its subclasses, even inside a cycle of weaker
    /// edges.
    pub fn reachable_in_swf_order(&self, roots: &[UnitId]) -> Vec<UnitId> {
        let inner = self.inner.read();
        let post_order = inner.post_order(roots);

        let position: FxHashMap<UnitId, usize> = post_order
            .iter()
            .enumerate()
            .map(|(index, unit)| (*unit, index))
            .collect();

        // Kahn over inheritance edges, ties broken by post-order position.
        let mut blocking: FxHashMap<UnitId, usize> = FxHashMap::default();
        let mut dependents: FxHashMap<UnitId, Vec<UnitId>> = FxHashMap::default();
        for unit in &post_order {
            for (target, edge) in inner.outgoing.get(unit).into_iter().flatten() {
                if edge.types.contains(DependencyType::Inheritance) && position.contains_key(target) {
                    *blocking.entry(*unit).or_default() += 1;
                    dependents.entry(*target).or_default().push(*unit);
                }
            }
        }

        let mut ready: BTreeSet<usize> = post_order
            .iter()
            .enumerate()
            .filter(|(_, unit)| !blocking.contains_key(unit))
            .map(|(index, _)| index)
            .collect();
        let mut emitted: FxHashSet<UnitId> = FxHashSet::default();
        let mut out = Vec::with_capacity(post_order.len());

        while let Some(index) = ready.pop_first() {
            let unit = post_order[index];
            emitted.insert(unit);
            out.push(unit);
            for dependent in dependents.get(&unit).into_iter().flatten() {
                if let Some(count) = blocking.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(position[dependent]);
                    }
                }
            }
        }

        // Inheritance cycles, already reported as problems.
        for unit in &post_order {
            if !emitted.contains(unit) {
                out.push(*unit);
            }
        }
        out
    }
}

impl GraphInner {
    fn edge(&self, from: UnitId, to: UnitId) -> Option<&Edge> {
        self.outgoing.get(&from)?.get(&to)
    }

    fn sorted_targets(&self, unit: UnitId) -> Vec<UnitId> {
        let mut targets: Vec<UnitId> = self
            .outgoing
            .get(&unit)
            .map(|targets| targets.keys().copied().collect())
            .unwrap_or_default();
        targets.sort_unstable();
        targets
    }

    fn post_order(&self, roots: &[UnitId]) -> Vec<UnitId> {
        let mut visited: FxHashSet<UnitId> = FxHashSet::default();
        let mut out = Vec::new();
        // (unit, its sorted dependencies, next dependency to explore)
        let mut stack: Vec<(UnitId, Vec<UnitId>, usize)> = Vec::new();

        for root in roots {
            if !self.vertices.contains(root) || !visited.insert(*root) {
                continue;
            }
            stack.push((*root, self.sorted_targets(*root), 0));
            while let Some((unit, targets, next)) = stack.last_mut() {
                if let Some(target) = targets.get(*next).copied() {
                    *next += 1;
                    if visited.insert(target) {
                        let targets = self.sorted_targets(target);
                        stack.push((target, targets, 0));
                    }
                } else {
                    out.push(*unit);
                    stack.pop();
                }
            }
        }
        out
    }
}
