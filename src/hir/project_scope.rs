//! The project scope: every externally visible definition of a project,
//! keyed by qualified name.
//!
//! Units register the names they are expected to define as *promises* when
//! they are added. A lookup that hits a promise tells the caller which unit to
//! build; the unit's definitions replace its promises atomically once its file
//! scope is published.
//!
//! When several units provide the same qualified name, all of them are kept
//! in priority order. The first is visible; the others are shadowed until it
//! goes away.

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::base::QName;

use super::definitions::Definition;
use super::ids::UnitId;

/// Where a unit comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "interchange", derive(serde::Serialize, serde::Deserialize))]
pub enum PathOrigin {
    SourcePath,
    LibraryPath,
}

/// Precedence among units providing the same qualified name. Lower wins:
/// source path before library path, earlier roots first, then the unit added
/// first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefinitionPriority {
    pub origin: PathOrigin,
    pub root_index: u32,
    pub sequence: u64,
}

impl DefinitionPriority {
    pub fn new(origin: PathOrigin, root_index: u32, sequence: u64) -> Self {
        Self {
            origin,
            root_index,
            sequence,
        }
    }
}

#[derive(Clone, Debug)]
enum EntryState {
    Promised,
    Published(Vec<Arc<Definition>>),
}

#[derive(Clone, Debug)]
struct Entry {
    unit: UnitId,
    priority: DefinitionPriority,
    state: EntryState,
}

#[derive(Debug)]
struct UnitRecord {
    priority: DefinitionPriority,
    generation: u32,
    published: bool,
    qnames: Vec<QName>,
}

#[derive(Debug, Default)]
struct ScopeInner {
    by_qname: FxHashMap<QName, Vec<Entry>>,
    units: FxHashMap<UnitId, UnitRecord>,
    unpublished: IndexSet<UnitId>,
}

/// Result of a qualified-name lookup.
#[derive(Clone, Debug)]
pub enum ScopeLookup {
    /// The visible unit has published these definitions for the name.
    Found {
        unit: UnitId,
        definitions: Vec<Arc<Definition>>,
    },
    /// The visible unit has not published yet. Build its file scope and retry.
    Promised(UnitId),
    Missing,
}

#[derive(Debug, Default)]
pub struct ProjectScope {
    inner: RwLock<ScopeInner>,
}

impl ProjectScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit and the names it promises to define.
    pub fn add_unit(&self, unit: UnitId, priority: DefinitionPriority, generation: u32, promised: &[QName]) {
        let mut inner = self.inner.write();
        inner.remove_entries(unit);
        inner.units.insert(
            unit,
            UnitRecord {
                priority,
                generation,
                published: false,
                qnames: Vec::new(),
            },
        );
        inner.insert_promises(unit, priority, promised);
        inner.unpublished.insert(unit);
    }

    /// Publish the externally visible definitions of `unit` at `generation`.
    ///
    /// Replaces the unit's promises in one step. Returns `false` when the
    /// generation is stale or the unit already published this generation.
    pub fn publish(&self, unit: UnitId, generation: u32, definitions: &[Arc<Definition>]) -> bool {
        let mut inner = self.inner.write();
        let Some(record) = inner.units.get(&unit) else {
            return false;
        };
        if record.generation != generation || record.published {
            return false;
        }
        let priority = record.priority;
        inner.remove_entries(unit);

        let mut grouped: Vec<(QName, Vec<Arc<Definition>>)> = Vec::new();
        for def in definitions {
            match grouped.iter_mut().find(|(qname, _)| qname == def.qname()) {
                Some((_, defs)) => defs.push(def.clone()),
                None => grouped.push((def.qname().clone(), vec![def.clone()])),
            }
        }
        let qnames: Vec<QName> = grouped.iter().map(|(qname, _)| qname.clone()).collect();
        for (qname, defs) in grouped {
            inner.insert_entry(
                qname,
                Entry {
                    unit,
                    priority,
                    state: EntryState::Published(defs),
                },
            );
        }
        if let Some(record) = inner.units.get_mut(&unit) {
            record.published = true;
            record.qnames = qnames;
        }
        inner.unpublished.shift_remove(&unit);
        true
    }

    /// Drop everything `unit` published or promised and register fresh
    /// promises for its next generation.
    pub fn retract(&self, unit: UnitId, generation: u32, promised: &[QName]) {
        let mut inner = self.inner.write();
        let Some(priority) = inner.units.get(&unit).map(|r| r.priority) else {
            return;
        };
        inner.remove_entries(unit);
        if let Some(record) = inner.units.get_mut(&unit) {
            record.generation = generation;
            record.published = false;
            record.qnames.clear();
        }
        inner.insert_promises(unit, priority, promised);
        inner.unpublished.insert(unit);
    }

    /// Drop everything `unit` published or promised at `generation` without
    /// promising anything new. Returns whether the scope changed.
    pub fn withdraw(&self, unit: UnitId, generation: u32) -> bool {
        let mut inner = self.inner.write();
        match inner.units.get_mut(&unit) {
            Some(record) if record.generation == generation => {
                record.published = false;
                record.qnames.clear();
            }
            _ => return false,
        }
        let was_pending = inner.unpublished.shift_remove(&unit);
        let had_entries = inner
            .by_qname
            .values()
            .any(|entries| entries.iter().any(|e| e.unit == unit));
        inner.remove_entries(unit);
        was_pending || had_entries
    }

    pub fn remove_unit(&self, unit: UnitId) {
        let mut inner = self.inner.write();
        inner.remove_entries(unit);
        inner.units.remove(&unit);
        inner.unpublished.shift_remove(&unit);
    }

    /// The visible entry for `qname`.
    pub fn lookup(&self, qname: &QName) -> ScopeLookup {
        let inner = self.inner.read();
        match inner.by_qname.get(qname).and_then(|entries| entries.first()) {
            Some(Entry {
                unit,
                state: EntryState::Published(definitions),
                ..
            }) => ScopeLookup::Found {
                unit: *unit,
                definitions: definitions.clone(),
            },
            Some(Entry {
                unit,
                state: EntryState::Promised,
                ..
            }) => ScopeLookup::Promised(*unit),
            None => ScopeLookup::Missing,
        }
    }

    /// Every unit providing or promising `qname`, visible one first.
    pub fn providers(&self, qname: &QName) -> Vec<UnitId> {
        self.inner
            .read()
            .by_qname
            .get(qname)
            .map(|entries| entries.iter().map(|e| e.unit).collect())
            .unwrap_or_default()
    }

    /// Units that have not published their current generation.
    pub fn unpublished(&self) -> Vec<UnitId> {
        self.inner.read().unpublished.iter().copied().collect()
    }

    pub fn is_published(&self, unit: UnitId) -> bool {
        self.inner
            .read()
            .units
            .get(&unit)
            .is_some_and(|record| record.published)
    }

    pub fn priority(&self, unit: UnitId) -> Option<DefinitionPriority> {
        self.inner.read().units.get(&unit).map(|r| r.priority)
    }

    /// Qualified names the unit published.
    pub fn published_names(&self, unit: UnitId) -> Vec<QName> {
        self.inner
            .read()
            .units
            .get(&unit)
            .map(|r| r.qnames.clone())
            .unwrap_or_default()
    }
}

impl ScopeInner {
    fn insert_promises(&mut self, unit: UnitId, priority: DefinitionPriority, promised: &[QName]) {
        for qname in promised {
            self.insert_entry(
                qname.clone(),
                Entry {
                    unit,
                    priority,
                    state: EntryState::Promised,
                },
            );
        }
    }

    fn insert_entry(&mut self, qname: QName, entry: Entry) {
        let entries = self.by_qname.entry(qname).or_default();
        if entries.iter().any(|e| e.unit == entry.unit) {
            return;
        }
        let key = (entry.priority, entry.unit);
        let at = entries.partition_point(|e| (e.priority, e.unit) < key);
        entries.insert(at, entry);
    }

    fn remove_entries(&mut self, unit: UnitId) {
        self.by_qname.retain(|_, entries| {
            entries.retain(|e| e.unit != unit);
            !entries.is_empty()
        });
    }
}
