//! Semantic identifiers.
//!
//! Definitions, scopes and units refer to each other through these IDs and
//! side tables instead of owning pointers, so invalidating a unit is a matter
//! of dropping its entries rather than unlinking object graphs.

use std::fmt;

/// A file registered with the workspace.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FileId(pub u32);

impl FileId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

/// A compilation unit.
///
/// Assigned sequentially by the workspace, so ordering by `UnitId` is creation
/// order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct UnitId(pub u32);

impl UnitId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// A unit-local definition identifier.
///
/// Assigned in declaration order while a unit's file scope is built.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LocalDefId(pub u32);

impl LocalDefId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for LocalDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalDefId({})", self.0)
    }
}

impl From<u32> for LocalDefId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A scope inside one unit's scope tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
pub struct ScopeId(pub u32);

impl ScopeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A globally unique identifier for a definition.
///
/// The generation is the owning unit's generation when the definition was
/// built; a definition from an older generation is stale.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DefId {
    pub unit: UnitId,
    pub generation: u32,
    pub local: LocalDefId,
}

impl DefId {
    #[inline]
    pub const fn new(unit: UnitId, generation: u32, local: LocalDefId) -> Self {
        Self {
            unit,
            generation,
            local,
        }
    }
}

impl fmt::Debug for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DefId({}@{}:{})",
            self.unit.0, self.generation, self.local.0
        )
    }
}

/// Identity of a project within its workspace.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProjectId(uuid::Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_def_id_equality() {
        let a = DefId::new(UnitId::new(1), 0, LocalDefId::new(0));
        let b = DefId::new(UnitId::new(1), 0, LocalDefId::new(0));
        let c = DefId::new(UnitId::new(1), 0, LocalDefId::new(1));
        let d = DefId::new(UnitId::new(2), 0, LocalDefId::new(0));
        let e = DefId::new(UnitId::new(1), 1, LocalDefId::new(0));

        assert_eq!(a, b);
        assert_ne!(a, c); // different local
        assert_ne!(a, d); // different unit
        assert_ne!(a, e); // different generation
    }

    #[test]
    fn test_def_id_size() {
        assert_eq!(std::mem::size_of::<DefId>(), 12);
    }

    #[test]
    fn test_unit_ids_order_by_creation() {
        let mut ids = vec![UnitId::new(3), UnitId::new(1), UnitId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![UnitId::new(1), UnitId::new(2), UnitId::new(3)]);
        assert_eq!(UnitId::new(3).to_string(), "unit#3");
    }

    #[test]
    fn test_project_ids_are_unique() {
        assert_ne!(ProjectId::new(), ProjectId::new());
    }
}
