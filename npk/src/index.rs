//! The entity directory: an arena of entities in on-disk order plus a
//! fixed-bucket hash index over their names.
//!
//! Iteration always walks the arena in directory order; the hash index
//! only accelerates name lookup and can be disabled at open time, in
//! which case lookup degrades to a linear scan with identical results.

use crate::entity::{Entity, EntityId};
use crate::format::HASH_BUCKETS;

/// Name equality under the directory's comparison mode.
#[cfg(feature = "case-sensitive")]
fn names_equal(a: &str, b: &str) -> bool {
    a == b
}

#[cfg(not(feature = "case-sensitive"))]
fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Bucket index for a name. Always folds case so that both comparison
/// modes agree between insert and lookup.
pub(crate) fn bucket_of(name: &str) -> usize {
    let mut hash: u32 = 5381;
    for byte in name.bytes() {
        hash = hash
            .wrapping_mul(33)
            .wrapping_add(u32::from(byte.to_ascii_lowercase()));
    }
    hash as usize % HASH_BUCKETS
}

pub(crate) struct Directory {
    entities: Vec<Entity>,
    /// `None` when hashing is disabled at open time.
    buckets: Option<Vec<Vec<u32>>>,
}

impl Directory {
    pub(crate) fn new(use_hash_index: bool) -> Self {
        Self {
            entities: Vec::new(),
            buckets: use_hash_index.then(|| vec![Vec::new(); HASH_BUCKETS]),
        }
    }

    /// Append an entity in directory order and link it into its bucket.
    pub(crate) fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        if let Some(buckets) = &mut self.buckets {
            buckets[bucket_of(entity.name())].push(id.0);
        }
        self.entities.push(entity);
        id
    }

    /// First match in insertion order, via the bucket chain when hashing
    /// is enabled, via a full scan otherwise.
    pub(crate) fn lookup(&self, name: &str) -> Option<EntityId> {
        match &self.buckets {
            Some(buckets) => buckets[bucket_of(name)]
                .iter()
                .copied()
                .find(|&i| names_equal(self.entities[i as usize].name(), name))
                .map(EntityId),
            None => self
                .entities
                .iter()
                .position(|e| names_equal(e.name(), name))
                .map(|i| EntityId(i as u32)),
        }
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0 as usize)
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }

    /// Entities in on-disk directory order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId(i as u32), e))
    }
}
