//! Identity cache module
//!
//! Single source of truth mapping an entity key to at most one logical
//! entity instance.
//!
//! # Overview
//!
//! The cache module provides:
//! - `IdentityCache` - keyed store with priority-based identity upgrades
//! - `Entity` / `EntityCtor` - the entity contract and per-representation
//!   factories
//! - `StoragePolicy` / `PolicyTable` - strong, soft-weak, and hard-weak
//!   storage with category-keyed defaults
//!
//! A representation that outranks the cached one replaces it; anything
//! else merges into the existing instance, so every accessor observing a
//! key sees the same value.

mod store;
mod types;

pub use store::{IdentityCache, Sweeper, SWEEP_INTERVAL};
pub use types::{ClassInfo, Entity, EntityCtor, PolicyTable, Shared, StoragePolicy, WeakShared};
