//! The error mirror: a doubly-linked chain of error snapshots.
//!
//! When a link in the chain fails, [`MirrorArena::spawn`] creates one
//! [`ErrorEntity`] per chain entity from that link downstream to the tail.
//! Each error entity references its origin chain entity by handle and its
//! mirror neighbors through `upstream`/`downstream` links. Spawning happens
//! exactly once per simulation lifetime, at construction or reset.
//!
//! `error_value` is a snapshot, not a running total: injection overwrites
//! it with the latest unmet demand every tick. `resolved` is monotonic --
//! once an entity is reconciled it never becomes a culprit candidate again.

use crate::chain::{ChainArena, ChainHandle};

/// Stable index of one entity inside a [`MirrorArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorHandle(usize);

/// One error snapshot, mirroring a single chain entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntity {
    /// Identifier, derived from the origin id (`<origin>.err`).
    pub id: String,
    /// The mirrored chain entity.
    pub origin: ChainHandle,
    /// Mirror neighbor toward the failing link.
    pub upstream: Option<ErrorHandle>,
    /// Mirror neighbor toward the chain tail.
    pub downstream: Option<ErrorHandle>,
    /// Last injected unmet-demand snapshot (>= 0).
    pub error_value: f64,
    /// Whether this entity was ever selected as the correction target.
    pub is_culprit: bool,
    /// Whether the origin came back within tolerance. Never reset.
    pub resolved: bool,
}

/// Owner of the error mirror for one simulation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorArena {
    /// All error entities, addressed by [`ErrorHandle`] index.
    entities: Vec<ErrorEntity>,
    /// The mirror head, at the designated failing link.
    root: Option<ErrorHandle>,
}

impl MirrorArena {
    /// Create an empty mirror with no root.
    pub const fn new() -> Self {
        Self {
            entities: Vec::new(),
            root: None,
        }
    }

    /// Spawn the full error mirror for a failing link.
    ///
    /// Creates one error entity per chain entity from `start` to the tail
    /// inclusive, doubly linked in chain order, rooted at `start`.
    pub fn spawn(chain: &ChainArena, start: ChainHandle) -> Self {
        let mut mirror = Self::new();
        let mut prev: Option<ErrorHandle> = None;
        for origin in chain.walk_downstream(start) {
            let Some(origin_entity) = chain.get(origin) else {
                continue;
            };
            let handle = ErrorHandle(mirror.entities.len());
            mirror.entities.push(ErrorEntity {
                id: format!("{}.err", origin_entity.id),
                origin,
                upstream: prev,
                downstream: None,
                error_value: 0.0,
                is_culprit: false,
                resolved: false,
            });
            match prev {
                Some(prev_handle) => {
                    if let Some(prev_entity) = mirror.get_mut(prev_handle) {
                        prev_entity.downstream = Some(handle);
                    }
                }
                None => mirror.root = Some(handle),
            }
            prev = Some(handle);
        }
        mirror
    }

    /// The mirror head, at the failing link (`None` for an empty mirror).
    pub const fn root(&self) -> Option<ErrorHandle> {
        self.root
    }

    /// Look up an error entity by handle.
    pub fn get(&self, handle: ErrorHandle) -> Option<&ErrorEntity> {
        self.entities.get(handle.0)
    }

    /// Look up an error entity mutably by handle.
    pub fn get_mut(&mut self, handle: ErrorHandle) -> Option<&mut ErrorEntity> {
        self.entities.get_mut(handle.0)
    }

    /// Walk the mirror from the root toward the tail.
    pub fn walk_downstream(&self) -> impl Iterator<Item = ErrorHandle> + '_ {
        std::iter::successors(self.root, move |handle| {
            self.get(*handle).and_then(|entity| entity.downstream)
        })
    }

    /// The most downstream entity (`None` for an empty mirror).
    pub fn tail(&self) -> Option<ErrorHandle> {
        self.walk_downstream().last()
    }

    /// Number of error entities in the mirror.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the mirror holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn four_chain() -> (ChainArena, ChainHandle) {
        let (arena, head) = ChainArena::build(["A", "B", "C", "D"]);
        (arena, head.unwrap())
    }

    #[test]
    fn spawn_mirrors_from_start_to_tail() {
        let (chain, head) = four_chain();
        let b = chain.get(head).unwrap().child.unwrap();
        let mirror = MirrorArena::spawn(&chain, b);

        let ids: Vec<&str> = mirror
            .walk_downstream()
            .filter_map(|handle| mirror.get(handle).map(|entity| entity.id.as_str()))
            .collect();
        assert_eq!(ids, ["B.err", "C.err", "D.err"]);
    }

    #[test]
    fn spawn_links_both_directions() {
        let (chain, head) = four_chain();
        let mirror = MirrorArena::spawn(&chain, head);

        let root = mirror.root().unwrap();
        let root_entity = mirror.get(root).unwrap();
        assert!(root_entity.upstream.is_none());

        let second = root_entity.downstream.unwrap();
        assert_eq!(mirror.get(second).unwrap().upstream, Some(root));
    }

    #[test]
    fn spawn_from_tail_yields_single_entity() {
        let (chain, head) = four_chain();
        let tail = chain.walk_downstream(head).last().unwrap();
        let mirror = MirrorArena::spawn(&chain, tail);
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.root(), mirror.tail());
    }

    #[test]
    fn fresh_entities_start_clean() {
        let (chain, head) = four_chain();
        let mirror = MirrorArena::spawn(&chain, head);
        for handle in mirror.walk_downstream() {
            let entity = mirror.get(handle).unwrap();
            assert_eq!(entity.error_value, 0.0);
            assert!(!entity.is_culprit);
            assert!(!entity.resolved);
        }
    }
}
