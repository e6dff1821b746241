//! Identity cache implementation
//!
//! A keyed store of entity instances enforcing that a more complete
//! representation of an entity always wins over a less complete one, with
//! strong, soft-weak (renewable deadline), and hard-weak (reclaimable)
//! storage tiers.

use super::types::{Entity, EntityCtor, PolicyTable, Shared, StoragePolicy, WeakShared};
use crate::types::{EntityKey, JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default interval between weak sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Renewable deadline state of a soft-weak slot
#[derive(Debug, Clone, Copy)]
struct SoftState {
    ttl: Duration,
    deadline: Instant,
}

impl SoftState {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            deadline: Instant::now() + ttl,
        }
    }

    fn refresh(&mut self) {
        self.deadline = Instant::now() + self.ttl;
    }

    fn expired(&self) -> bool {
        self.deadline <= Instant::now()
    }
}

/// One cache slot. Strong and soft-weak values live in the held tier;
/// hard-weak values are only reachable while a caller still holds a
/// handle.
enum Slot<T> {
    Held {
        value: Shared<T>,
        soft: Option<SoftState>,
    },
    Reclaimable(WeakShared<T>),
}

struct Inner<T> {
    slots: RwLock<HashMap<EntityKey, Slot<T>>>,
    priority: Vec<&'static str>,
    global_policy: Option<StoragePolicy>,
    defaults: PolicyTable,
}

/// Identity cache mapping a key to at most one logical entity instance.
///
/// Cheap to clone; clones share the same backing store, so a sweeper task
/// and the accessors that feed the cache can hold their own handles.
pub struct IdentityCache<T: Entity> {
    inner: Arc<Inner<T>>,
}

impl<T: Entity> Clone for IdentityCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn read_value<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_value<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Entity> IdentityCache<T> {
    /// Create a cache with the given type-rank order.
    ///
    /// Later position means higher priority, so a partial representation
    /// goes before its full counterpart.
    pub fn new(priority: Vec<&'static str>) -> Self {
        Self::with_policies(priority, None, PolicyTable::new())
    }

    /// Create a cache with a global policy override and category defaults.
    ///
    /// The global policy, when set, applies to every entry regardless of
    /// the default table.
    pub fn with_policies(
        priority: Vec<&'static str>,
        global_policy: Option<StoragePolicy>,
        defaults: PolicyTable,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: RwLock::new(HashMap::new()),
                priority,
                global_policy,
                defaults,
            }),
        }
    }

    fn slots(&self) -> RwLockWriteGuard<'_, HashMap<EntityKey, Slot<T>>> {
        self.inner
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn slots_read(&self) -> RwLockReadGuard<'_, HashMap<EntityKey, Slot<T>>> {
        self.inner
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the storage policy for a tag: per-call override, then the
    /// cache-wide policy, then the category default table, then strong.
    fn resolve_policy(&self, tag: &str, override_policy: Option<StoragePolicy>) -> StoragePolicy {
        override_policy
            .or(self.inner.global_policy)
            .or_else(|| self.inner.defaults.resolve(tag))
            .unwrap_or(StoragePolicy::Strong)
    }

    fn rank(&self, tag: &str) -> i64 {
        self.inner
            .priority
            .iter()
            .position(|candidate| *candidate == tag)
            .map_or(-1, |index| index as i64)
    }

    /// Returns true if `tag_a` outranks `tag_b` in this cache's type-rank
    /// order. A tag absent from the order is always lower priority than a
    /// present one; two absent tags never outrank each other.
    pub fn is_priority(&self, tag_a: &str, tag_b: &str) -> bool {
        self.rank(tag_a) > self.rank(tag_b)
    }

    /// Non-creating lookup.
    ///
    /// A reclaimed hard-weak slot is treated as absent and pruned on the
    /// spot; a soft-weak hit has its deadline renewed.
    pub fn rawget(&self, key: &EntityKey) -> Option<Shared<T>> {
        let mut slots = self.slots();
        let upgraded = match slots.get_mut(key) {
            None => return None,
            Some(Slot::Held { value, soft }) => {
                if let Some(soft) = soft {
                    soft.refresh();
                }
                return Some(Arc::clone(value));
            }
            Some(Slot::Reclaimable(weak)) => weak.upgrade(),
        };
        if upgraded.is_none() {
            slots.remove(key);
        }
        upgraded
    }

    /// Get a member of the cache, creating it if it does not exist.
    ///
    /// When an entry exists and the requested representation does not
    /// outrank it, the seed is merged into the existing value and its
    /// handle returned; otherwise a fresh instance replaces the cached
    /// value.
    pub fn get(
        &self,
        key: EntityKey,
        seed: &JsonValue,
        ctor: &EntityCtor<T>,
        policy: Option<StoragePolicy>,
    ) -> Shared<T> {
        if let Some(existing) = self.rawget(&key) {
            let existing_tag = read_value(&existing).type_tag();
            if !self.is_priority(ctor.tag, existing_tag) {
                write_value(&existing).patch(seed);
                // Merging never demotes: only a soft-weak policy re-marks
                // the slot, renewing its deadline with the resolved ttl.
                if let StoragePolicy::SoftWeak(ttl) = self.resolve_policy(ctor.tag, policy) {
                    self.mark_weak(&key, StoragePolicy::SoftWeak(ttl));
                }
                return existing;
            }
        }
        let value = (ctor.build)(seed);
        self.insert(key, value, policy)
    }

    /// Insert or overwrite unconditionally, returning the shared handle
    pub fn insert(
        &self,
        key: EntityKey,
        value: T,
        policy: Option<StoragePolicy>,
    ) -> Shared<T> {
        let resolved = self.resolve_policy(value.type_tag(), policy);
        let shared = Arc::new(RwLock::new(value));
        self.store(key, Arc::clone(&shared), resolved);
        shared
    }

    /// Insert only if the value's representation outranks the cached one
    /// (or no live entry exists). Returns whether the insert happened.
    pub fn insert_if_priority(
        &self,
        key: EntityKey,
        value: T,
        policy: Option<StoragePolicy>,
    ) -> bool {
        let outranked = match self.rawget(&key) {
            None => true,
            Some(existing) => {
                let existing_tag = read_value(&existing).type_tag();
                self.is_priority(value.type_tag(), existing_tag)
            }
        };
        if outranked {
            self.insert(key, value, policy);
        }
        outranked
    }

    /// Returns true if a live entry exists for the key
    pub fn contains(&self, key: &EntityKey) -> bool {
        match self.slots_read().get(key) {
            None => false,
            Some(Slot::Held { .. }) => true,
            Some(Slot::Reclaimable(weak)) => weak.strong_count() > 0,
        }
    }

    /// Remove an entry, returning its handle if the value was still live
    pub fn remove(&self, key: &EntityKey) -> Option<Shared<T>> {
        match self.slots().remove(key)? {
            Slot::Held { value, .. } => Some(value),
            Slot::Reclaimable(weak) => weak.upgrade(),
        }
    }

    /// Re-tag an existing entry's storage mode without replacing its value
    pub fn mark_weak(&self, key: &EntityKey, policy: StoragePolicy) -> Option<Shared<T>> {
        let value = self.rawget(key)?;
        self.store(key.clone(), Arc::clone(&value), policy);
        Some(value)
    }

    /// Weak sweep: prune reclaimed hard-weak slots and demote soft-weak
    /// slots whose deadline has elapsed into the reclaimable tier.
    ///
    /// The sweeper task is the only caller that transitions storage
    /// modes; readers merely renew deadlines.
    pub fn clear_weak(&self) {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Reclaimable(weak) => weak.strong_count() > 0,
            Slot::Held { .. } => true,
        });
        let pruned = before - slots.len();

        let mut demoted = 0usize;
        for slot in slots.values_mut() {
            let weak = match &*slot {
                Slot::Held {
                    value,
                    soft: Some(soft),
                } if soft.expired() => Arc::downgrade(value),
                _ => continue,
            };
            *slot = Slot::Reclaimable(weak);
            demoted += 1;
        }

        if pruned > 0 || demoted > 0 {
            debug!(pruned, demoted, "weak sweep");
        }
    }

    /// Drop all entries and metadata
    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots_read()
            .values()
            .filter(|slot| match slot {
                Slot::Held { .. } => true,
                Slot::Reclaimable(weak) => weak.strong_count() > 0,
            })
            .count()
    }

    /// Returns true if no live entries exist
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the periodic sweep task at the default 60s interval
    pub fn start_sweeper(&self) -> Sweeper {
        self.start_sweeper_every(SWEEP_INTERVAL)
    }

    /// Spawn the periodic sweep task at a custom interval.
    ///
    /// The task stops when the returned handle is dropped.
    pub fn start_sweeper_every(&self, interval: Duration) -> Sweeper {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.clear_weak();
            }
        });
        Sweeper { handle }
    }

    fn store(&self, key: EntityKey, shared: Shared<T>, policy: StoragePolicy) {
        let slot = match policy {
            StoragePolicy::Strong => Slot::Held {
                value: shared,
                soft: None,
            },
            StoragePolicy::SoftWeak(ttl) => Slot::Held {
                value: shared,
                soft: Some(SoftState::new(ttl)),
            },
            StoragePolicy::HardWeak => Slot::Reclaimable(Arc::downgrade(&shared)),
        };
        self.slots().insert(key, slot);
    }
}

impl<T: Entity> std::fmt::Debug for IdentityCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("entries", &self.len())
            .field("priority", &self.inner.priority)
            .finish_non_exhaustive()
    }
}

/// Handle to a running sweep task; aborts the task on drop
#[derive(Debug)]
pub struct Sweeper {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
