//! Identity cache types and traits
//!
//! Defines the entity contract, storage policies, and the default policy
//! table used when neither a per-call nor a per-cache policy is given.

use crate::types::JsonValue;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

/// Shared handle to a cached entity.
///
/// Every `get` for the same key hands out a handle to the same instance,
/// so a merge through one handle is visible through all of them.
pub type Shared<T> = Arc<RwLock<T>>;

/// Downgraded handle used by the reclaimable tier.
pub type WeakShared<T> = Weak<RwLock<T>>;

/// Contract for cacheable entity values.
///
/// Concrete representations of one logical entity (partial vs. full) are
/// variants of one entity type; the tag names the variant and drives
/// priority ranking.
pub trait Entity: Send + Sync + 'static {
    /// Stable tag naming this value's concrete representation.
    fn type_tag(&self) -> &'static str;

    /// Merge freshly fetched fields into this instance.
    fn patch(&mut self, seed: &JsonValue);
}

/// Factory for one concrete representation of an entity.
///
/// Plays the role of a "desired class" parameter: the tag is ranked
/// against the cached value's tag, and `build` constructs a fresh
/// instance when the cache decides to create or replace.
pub struct EntityCtor<T> {
    /// Representation tag, ranked by the cache's priority order
    pub tag: &'static str,
    /// Constructor from raw seed data
    pub build: fn(&JsonValue) -> T,
}

impl<T> EntityCtor<T> {
    /// Create a new entity constructor
    pub const fn new(tag: &'static str, build: fn(&JsonValue) -> T) -> Self {
        Self { tag, build }
    }
}

impl<T> Clone for EntityCtor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntityCtor<T> {}

impl<T> std::fmt::Debug for EntityCtor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCtor").field("tag", &self.tag).finish()
    }
}

// ============================================================================
// Storage Policies
// ============================================================================

/// How a cache slot holds its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePolicy {
    /// Held indefinitely until removed or cleared
    Strong,
    /// Held strongly, but demoted to `HardWeak` once the renewable
    /// deadline elapses
    SoftWeak(Duration),
    /// Held via a reclaimable reference; the value survives only while
    /// some caller still holds a handle to it
    HardWeak,
}

impl StoragePolicy {
    /// Soft-weak policy with a deadline given in seconds
    pub const fn soft_secs(secs: u64) -> Self {
        Self::SoftWeak(Duration::from_secs(secs))
    }

    /// Check whether this policy carries a renewable deadline
    pub fn soft_ttl(&self) -> Option<Duration> {
        match self {
            Self::SoftWeak(ttl) => Some(*ttl),
            _ => None,
        }
    }
}

// ============================================================================
// Policy Table
// ============================================================================

/// Category and representation of one entity tag, used to look up a
/// default storage policy when nothing more specific applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassInfo {
    /// Entity category ("users", "assets", ...)
    pub category: &'static str,
    /// Representation within the category ("partial", "full", ...)
    pub representation: &'static str,
}

/// Fallback policies per representation, applied when a category has no
/// explicit entry. Partial representations are cheap to refetch and are
/// held reclaimably; full representations get a ten-minute deadline.
static REPRESENTATION_DEFAULTS: Lazy<HashMap<&'static str, StoragePolicy>> = Lazy::new(|| {
    HashMap::from([
        ("partial", StoragePolicy::HardWeak),
        ("full", StoragePolicy::soft_secs(600)),
    ])
});

/// Category-keyed default storage policies.
///
/// Resolution for a tag goes tag -> (category, representation) ->
/// policy, falling back to the representation-wide defaults and finally
/// to `Strong`.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    classes: HashMap<&'static str, ClassInfo>,
    policies: HashMap<&'static str, HashMap<&'static str, StoragePolicy>>,
}

impl PolicyTable {
    /// Create an empty policy table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity tag under a category and representation
    #[must_use]
    pub fn class(
        mut self,
        tag: &'static str,
        category: &'static str,
        representation: &'static str,
    ) -> Self {
        self.classes
            .insert(tag, ClassInfo { category, representation });
        self
    }

    /// Set the policy for one (category, representation) pair
    #[must_use]
    pub fn policy(
        mut self,
        category: &'static str,
        representation: &'static str,
        policy: StoragePolicy,
    ) -> Self {
        self.policies
            .entry(category)
            .or_default()
            .insert(representation, policy);
        self
    }

    /// Apply one policy to every representation already registered under
    /// a category
    #[must_use]
    pub fn category_policy(mut self, category: &'static str, policy: StoragePolicy) -> Self {
        let representations: Vec<&'static str> = self
            .classes
            .values()
            .filter(|info| info.category == category)
            .map(|info| info.representation)
            .collect();
        let entry = self.policies.entry(category).or_default();
        for representation in representations {
            entry.insert(representation, policy);
        }
        self
    }

    /// Look up the class info registered for a tag
    pub fn class_info(&self, tag: &str) -> Option<ClassInfo> {
        self.classes.get(tag).copied()
    }

    /// Resolve the default storage policy for a tag.
    ///
    /// Returns `None` for unregistered tags; the cache then falls back
    /// to strong storage.
    pub fn resolve(&self, tag: &str) -> Option<StoragePolicy> {
        let info = self.classes.get(tag)?;
        if let Some(policy) = self
            .policies
            .get(info.category)
            .and_then(|by_repr| by_repr.get(info.representation))
        {
            return Some(*policy);
        }
        REPRESENTATION_DEFAULTS.get(info.representation).copied()
    }
}
