//! Arena-backed chain of stateful entities.
//!
//! Chain entities are linked parent -> child into a singly-directed list.
//! Instead of a web of mutual references, all entities live in a
//! [`ChainArena`] and link to each other through stable [`ChainHandle`]
//! indices: ownership is unambiguous and a reset simply replaces the arena.
//!
//! Handles are only ever minted by the arena that owns the entity, so a
//! lookup through a handle held alongside its arena always succeeds; the
//! accessors still return `Option` rather than indexing unchecked.

/// Stable index of one entity inside a [`ChainArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainHandle(usize);

/// A node under demand pressure.
///
/// `state` is the current value, `demand` the target, and `tolerance` the
/// acceptable mismatch band around the target. State is mutated only by
/// the stepper's backfeed phase and by the configured pressure override.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEntity {
    /// Human-readable identifier, unique within the arena.
    pub id: String,
    /// Current value.
    pub state: f64,
    /// Target value.
    pub demand: f64,
    /// Acceptable |state - demand| band (>= 0).
    pub tolerance: f64,
    /// Upstream neighbor, if any.
    pub parent: Option<ChainHandle>,
    /// Downstream neighbor, if any.
    pub child: Option<ChainHandle>,
}

impl ChainEntity {
    /// Create an unlinked entity with all numeric fields at zero.
    pub const fn new(id: String) -> Self {
        Self {
            id,
            state: 0.0,
            demand: 0.0,
            tolerance: 0.0,
            parent: None,
            child: None,
        }
    }

    /// Whether the entity's state violates its tolerance band.
    pub fn violates_tolerance(&self) -> bool {
        (self.state - self.demand).abs() > self.tolerance
    }
}

/// Owner of all chain entities for one simulation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainArena {
    /// All entities, addressed by [`ChainHandle`] index.
    entities: Vec<ChainEntity>,
}

impl ChainArena {
    /// Create an empty arena.
    pub const fn new() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    /// Build a parent -> child chain from the given identifiers.
    ///
    /// All numeric fields default to zero; the caller sets them afterwards.
    /// Returns the arena and the head handle, or `None` for an empty id list.
    pub fn build<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> (Self, Option<ChainHandle>) {
        let mut arena = Self::new();
        let mut head = None;
        let mut prev: Option<ChainHandle> = None;
        for id in ids {
            let handle = arena.insert(ChainEntity::new(id.into()));
            if let Some(prev_handle) = prev {
                arena.link(prev_handle, handle);
            } else {
                head = Some(handle);
            }
            prev = Some(handle);
        }
        (arena, head)
    }

    /// Add an unlinked entity to the arena and return its handle.
    pub fn insert(&mut self, entity: ChainEntity) -> ChainHandle {
        let handle = ChainHandle(self.entities.len());
        self.entities.push(entity);
        handle
    }

    /// Link `parent` and `child` both ways.
    pub fn link(&mut self, parent: ChainHandle, child: ChainHandle) {
        if let Some(entity) = self.get_mut(parent) {
            entity.child = Some(child);
        }
        if let Some(entity) = self.get_mut(child) {
            entity.parent = Some(parent);
        }
    }

    /// Look up an entity by handle.
    pub fn get(&self, handle: ChainHandle) -> Option<&ChainEntity> {
        self.entities.get(handle.0)
    }

    /// Look up an entity mutably by handle.
    pub fn get_mut(&mut self, handle: ChainHandle) -> Option<&mut ChainEntity> {
        self.entities.get_mut(handle.0)
    }

    /// Find an entity handle by its identifier.
    pub fn find(&self, id: &str) -> Option<ChainHandle> {
        self.entities
            .iter()
            .position(|entity| entity.id == id)
            .map(ChainHandle)
    }

    /// Walk the chain downstream starting from `from` (inclusive).
    pub fn walk_downstream(&self, from: ChainHandle) -> impl Iterator<Item = ChainHandle> + '_ {
        std::iter::successors(Some(from), move |handle| {
            self.get(*handle).and_then(|entity| entity.child)
        })
    }

    /// Number of entities in the arena (meta entity included once born).
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the arena holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
