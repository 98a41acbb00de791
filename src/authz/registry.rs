//! Mapping registry: the ordered set of path-to-role rules.
//!
//! The registry is an explicitly owned component shared through `Arc`. It is
//! never a process-wide singleton, and callers only see the [`MappingStore`]
//! interface so it can be swapped for a test double.
//!
//! # Concurrency
//!
//! Copy-on-write: the current rules live in an `Arc<Vec<CompiledMapping>>`. Readers
//! clone the `Arc` under a short read lock and then scan without holding any
//! lock. Writers hold the write lock for the whole read-modify-publish cycle,
//! so writers are mutually exclusive and a reader always sees a sequence that
//! was complete at some instant.
//!
//! # Ordering
//!
//! Mappings are kept sorted ascending by `priority`. Equal priorities keep
//! insertion order (stable sort). Re-adding an existing pattern removes the old
//! entry first, so the replacement counts as a fresh insertion.

use std::{collections::BTreeSet, ops::Deref, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::pattern::{PathPattern, PatternError};

/// One authorization rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Lower values are evaluated first.
    pub priority: i64,
    /// Ant-style path pattern, unique within the registry.
    pub pattern: String,
    /// Roles that grant access. Empty means any authenticated caller.
    pub required_roles: BTreeSet<String>,
}

impl Mapping {
    pub fn new(
        priority: i64,
        pattern: impl Into<String>,
        required_roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            priority,
            pattern: pattern.into(),
            required_roles: required_roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// A mapping together with its pattern, compiled when it entered the registry.
///
/// A pattern that fails to compile is kept alongside its error; the engine
/// denies any request that reaches it.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    mapping: Mapping,
    compiled: Result<PathPattern, PatternError>,
}

impl CompiledMapping {
    pub fn new(mapping: Mapping) -> Self {
        let compiled = PathPattern::compile(&mapping.pattern);
        Self { mapping, compiled }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn compiled(&self) -> Result<&PathPattern, &PatternError> {
        self.compiled.as_ref()
    }
}

impl Deref for CompiledMapping {
    type Target = Mapping;

    fn deref(&self) -> &Mapping {
        &self.mapping
    }
}

impl PartialEq for CompiledMapping {
    fn eq(&self, other: &Self) -> bool {
        self.mapping == other.mapping
    }
}

impl Eq for CompiledMapping {}

impl PartialEq<Mapping> for CompiledMapping {
    fn eq(&self, other: &Mapping) -> bool {
        &self.mapping == other
    }
}

/// Point-in-time view of the registry, in evaluation order.
pub type MappingSnapshot = Arc<Vec<CompiledMapping>>;

/// Narrow interface over the mapping registry.
///
/// The `on_resource_*` hooks are how the administration layer mirrors
/// resource lifecycle changes into the registry.
pub trait MappingStore: Send + Sync {
    /// Insert a mapping, replacing any mapping with the same pattern.
    fn add(&self, priority: i64, pattern: &str, required_roles: BTreeSet<String>);

    /// Remove the mapping with this exact pattern. Absent patterns are a no-op.
    /// Returns whether a mapping was removed.
    fn remove(&self, pattern: &str) -> bool;

    /// Same as `remove(pattern)` followed by `add(priority, pattern, roles)`.
    fn update(&self, priority: i64, pattern: &str, required_roles: BTreeSet<String>) {
        self.add(priority, pattern, required_roles);
    }

    /// Consistent, priority-ordered view of all mappings.
    fn snapshot(&self) -> MappingSnapshot;

    /// Atomically replace every mapping.
    fn replace_all(&self, mappings: Vec<Mapping>);

    fn on_resource_created(&self, pattern: &str, priority: i64, required_roles: BTreeSet<String>) {
        self.add(priority, pattern, required_roles);
    }

    fn on_resource_updated(
        &self,
        old_pattern: &str,
        new_pattern: &str,
        priority: i64,
        required_roles: BTreeSet<String>,
    ) {
        if old_pattern != new_pattern {
            self.remove(old_pattern);
        }
        self.update(priority, new_pattern, required_roles);
    }

    fn on_resource_deleted(&self, pattern: &str) {
        self.remove(pattern);
    }
}

/// In-memory, copy-on-write [`MappingStore`].
#[derive(Debug, Default)]
pub struct MappingRegistry {
    mappings: RwLock<MappingSnapshot>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an initial set of mappings.
    ///
    /// Later duplicates of a pattern replace earlier ones.
    pub fn with_mappings(mappings: impl IntoIterator<Item = Mapping>) -> Self {
        let registry = Self::new();
        registry.replace_all(mappings.into_iter().collect());
        registry
    }

    pub fn len(&self) -> usize {
        self.mappings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `mutate` against a private copy and publish the result.
    fn publish(&self, mutate: impl FnOnce(&mut Vec<CompiledMapping>)) {
        let mut guard = self.mappings.write();
        let mut next: Vec<CompiledMapping> = guard.as_ref().clone();
        mutate(&mut next);
        next.sort_by_key(|m| m.priority);
        *guard = Arc::new(next);
    }
}

impl MappingStore for MappingRegistry {
    fn add(&self, priority: i64, pattern: &str, required_roles: BTreeSet<String>) {
        let entry = CompiledMapping::new(Mapping {
            priority,
            pattern: pattern.to_string(),
            required_roles,
        });
        self.publish(|mappings| {
            mappings.retain(|m| m.pattern != pattern);
            mappings.push(entry);
        });
        tracing::debug!(pattern, priority, "Mapping registered");
    }

    fn remove(&self, pattern: &str) -> bool {
        // Skip the copy when the pattern is absent.
        if !self.mappings.read().iter().any(|m| m.pattern == pattern) {
            return false;
        }

        let mut removed = false;
        self.publish(|mappings| {
            let before = mappings.len();
            mappings.retain(|m| m.pattern != pattern);
            removed = mappings.len() != before;
        });
        if removed {
            tracing::debug!(pattern, "Mapping removed");
        }
        removed
    }

    fn snapshot(&self) -> MappingSnapshot {
        Arc::clone(&self.mappings.read())
    }

    fn replace_all(&self, mappings: Vec<Mapping>) {
        let mut deduped: Vec<CompiledMapping> = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            deduped.retain(|m| m.pattern != mapping.pattern);
            deduped.push(CompiledMapping::new(mapping));
        }
        deduped.sort_by_key(|m| m.priority);

        let count = deduped.len();
        *self.mappings.write() = Arc::new(deduped);
        tracing::info!(count, "Mapping registry replaced");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::authz::roles::role_set;

    fn priorities(registry: &MappingRegistry) -> Vec<i64> {
        registry.snapshot().iter().map(|m| m.priority).collect()
    }

    fn patterns(registry: &MappingRegistry) -> Vec<String> {
        registry
            .snapshot()
            .iter()
            .map(|m| m.pattern.clone())
            .collect()
    }

    #[test]
    fn test_snapshot_sorted_regardless_of_insertion_order() {
        let orders: [&[i64]; 4] = [&[1, 2, 3, 4], &[4, 3, 2, 1], &[3, 1, 4, 2], &[2, 4, 1, 3]];

        for order in orders {
            let registry = MappingRegistry::new();
            for p in order {
                registry.add(*p, &format!("/p{p}/**"), BTreeSet::new());
            }
            assert_eq!(priorities(&registry), vec![1, 2, 3, 4], "order {order:?}");
        }
    }

    #[test]
    fn test_equal_priorities_keep_insertion_order() {
        let registry = MappingRegistry::new();
        registry.add(5, "/b/**", BTreeSet::new());
        registry.add(5, "/a/**", BTreeSet::new());
        registry.add(1, "/c/**", BTreeSet::new());
        registry.add(5, "/d/**", BTreeSet::new());

        assert_eq!(patterns(&registry), vec!["/c/**", "/b/**", "/a/**", "/d/**"]);
    }

    #[test]
    fn test_add_same_pattern_replaces() {
        let registry = MappingRegistry::new();
        registry.add(10, "/admin/**", role_set(["ROLE_ADMIN"]));
        registry.add(2, "/admin/**", role_set(["ROLE_SUPERVISOR"]));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].priority, 2);
        assert_eq!(snapshot[0].required_roles, role_set(["ROLE_SUPERVISOR"]));
    }

    #[test]
    fn test_remove_absent_pattern_is_noop() {
        let registry = MappingRegistry::new();
        registry.add(1, "/user/**", role_set(["ROLE_USER"]));
        let before = registry.snapshot();

        assert!(!registry.remove("/missing/**"));

        let after = registry.snapshot();
        assert_eq!(*before, *after);
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_remove_existing_pattern() {
        let registry = MappingRegistry::new();
        registry.add(1, "/user/**", BTreeSet::new());
        registry.add(2, "/admin/**", BTreeSet::new());

        assert!(registry.remove("/user/**"));
        assert_eq!(patterns(&registry), vec!["/admin/**"]);
    }

    #[test]
    fn test_update_moves_mapping_to_new_priority() {
        let registry = MappingRegistry::new();
        registry.add(1, "/a/**", BTreeSet::new());
        registry.add(2, "/b/**", BTreeSet::new());

        registry.update(3, "/a/**", role_set(["ROLE_ADMIN"]));

        assert_eq!(patterns(&registry), vec!["/b/**", "/a/**"]);
        assert_eq!(registry.snapshot()[1].required_roles, role_set(["ROLE_ADMIN"]));
    }

    #[test]
    fn test_resource_updated_with_new_pattern_drops_old_one() {
        let registry = MappingRegistry::new();
        registry.on_resource_created("/old/**", 1, role_set(["ROLE_A"]));

        registry.on_resource_updated("/old/**", "/new/**", 1, role_set(["ROLE_A"]));

        assert_eq!(patterns(&registry), vec!["/new/**"]);

        registry.on_resource_deleted("/new/**");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_all_sorts_and_dedupes() {
        let registry = MappingRegistry::with_mappings(vec![
            Mapping::new(3, "/c/**", ["ROLE_C"]),
            Mapping::new(1, "/a/**", ["ROLE_A"]),
            Mapping::new(2, "/c/**", ["ROLE_C2"]),
        ]);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].pattern, "/a/**");
        assert_eq!(snapshot[1].priority, 2);
    }

    #[test]
    fn test_patterns_are_compiled_on_insert() {
        let registry = MappingRegistry::new();
        registry.add(1, "/users/{id:[0-9]+}", BTreeSet::new());
        registry.add(2, "/broken/{id", BTreeSet::new());

        let snapshot = registry.snapshot();
        let compiled = snapshot[0].compiled().unwrap();
        assert!(compiled.matches("/users/7").is_match);
        assert!(snapshot[1].compiled().is_err());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let registry = MappingRegistry::new();
        registry.add(1, "/a/**", BTreeSet::new());

        let snapshot = registry.snapshot();
        registry.add(0, "/b/**", BTreeSet::new());
        registry.remove("/a/**");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].pattern, "/a/**");
    }

    #[test]
    fn test_concurrent_readers_always_see_sorted_snapshots() {
        let registry = Arc::new(MappingRegistry::new());

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..500i64 {
                    let pattern = format!("/r{}/**", i % 37);
                    registry.add((i * 7919) % 101, &pattern, BTreeSet::new());
                    if i % 3 == 0 {
                        registry.remove(&format!("/r{}/**", (i + 5) % 37));
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = registry.snapshot();
                        assert!(snapshot.windows(2).all(|w| w[0].priority <= w[1].priority));
                        let unique: BTreeSet<_> = snapshot.iter().map(|m| &m.pattern).collect();
                        assert_eq!(unique.len(), snapshot.len());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
