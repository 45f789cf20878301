//! Reference-counted cache of resident bundles
//!
//! The registry is the single source of truth for "is this bundle already
//! resident". It owns every loaded archive handle exclusively; operations
//! reference bundles by name and re-look them up here on every poll. It also
//! keeps the per-name error records and the dependency edge sets recorded at
//! load time, because readiness is a property of a bundle *and* its recorded
//! dependencies together.
//!
//! The registry is only ever mutated from the session's scheduling thread, so
//! it needs no interior locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::archive::BundleArchive;
use crate::error::LoadstoneError;

/// One resident bundle archive.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    name: String,
    archive: Arc<BundleArchive>,
    ref_count: u32,
}

impl LoadedBundle {
    /// Concrete bundle name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The in-memory archive handle.
    pub fn archive(&self) -> Arc<BundleArchive> {
        Arc::clone(&self.archive)
    }

    /// Outstanding reference count; always >= 1 while resident.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Readiness of one concrete bundle name.
#[derive(Debug)]
pub enum Residency<'a> {
    /// The bundle and all of its recorded dependencies are resident and
    /// error-free.
    Ready(&'a LoadedBundle),
    /// The bundle or at least one recorded dependency is still outstanding.
    Pending,
    /// The bundle, or one of its recorded dependencies, carries a recorded
    /// error.
    Failed(LoadstoneError),
}

impl Residency<'_> {
    /// True for the `Ready` state.
    pub fn is_ready(&self) -> bool {
        matches!(self, Residency::Ready(_))
    }
}

/// Result of releasing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Count reached zero; the bundle was evicted and its archive dropped.
    Evicted,
    /// Count decremented, bundle still resident.
    Retained(u32),
    /// Nothing resident under that name.
    NotResident,
}

/// The reference-counted bundle cache.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    loaded: HashMap<String, LoadedBundle>,
    errors: HashMap<String, LoadstoneError>,
    edges: HashMap<String, Vec<String>>,
    verbose: bool,
}

impl BundleRegistry {
    /// Create an empty registry. `verbose` gates non-error log lines.
    pub fn new(verbose: bool) -> Self {
        BundleRegistry {
            verbose,
            ..BundleRegistry::default()
        }
    }

    /// Readiness of a bundle together with its recorded dependencies.
    ///
    /// An error recorded against the bundle itself or any recorded dependency
    /// dominates; partial-dependency visibility is never reported as ready.
    pub fn status(&self, name: &str) -> Residency<'_> {
        if let Some(err) = self.errors.get(name) {
            return Residency::Failed(err.clone());
        }

        let Some(bundle) = self.loaded.get(name) else {
            return Residency::Pending;
        };

        if let Some(dependencies) = self.edges.get(name) {
            for dependency in dependencies {
                if let Some(err) = self.errors.get(dependency) {
                    return Residency::Failed(LoadstoneError::DependencyFailed {
                        name: name.to_string(),
                        dependency: dependency.clone(),
                        reason: err.to_string(),
                    });
                }
                if !self.loaded.contains_key(dependency) {
                    return Residency::Pending;
                }
            }
        }

        Residency::Ready(bundle)
    }

    /// Raw residency lookup, ignoring dependencies and errors.
    pub fn resident(&self, name: &str) -> Option<&LoadedBundle> {
        self.loaded.get(name)
    }

    /// Insert a freshly fetched bundle with its merged in-flight demand as
    /// the initial count. Clears any stale error for the name.
    pub fn insert(&mut self, name: &str, archive: Arc<BundleArchive>, initial_count: u32) {
        debug_assert!(
            !self.loaded.contains_key(name),
            "bundle inserted while already resident"
        );
        self.errors.remove(name);
        self.loaded.insert(
            name.to_string(),
            LoadedBundle {
                name: name.to_string(),
                archive,
                ref_count: initial_count.max(1),
            },
        );
        if self.verbose {
            log::info!("[loadstone] loaded bundle '{name}' with ref count {initial_count}");
        }
    }

    /// Add demand to an already-resident bundle. Returns false when the name
    /// is not resident.
    pub fn retain(&mut self, name: &str, delta: u32) -> bool {
        match self.loaded.get_mut(name) {
            Some(bundle) => {
                bundle.ref_count += delta;
                true
            }
            None => false,
        }
    }

    /// Release one reference; evicts and drops the archive handle on the
    /// 1 → 0 transition, in the same step.
    pub fn release(&mut self, name: &str) -> Release {
        let Some(bundle) = self.loaded.get_mut(name) else {
            return Release::NotResident;
        };

        bundle.ref_count -= 1;
        let remaining = bundle.ref_count;
        if self.verbose {
            log::info!("[loadstone] unloading bundle reference '{name}', now ref count {remaining}");
        }

        if remaining == 0 {
            self.loaded.remove(name);
            Release::Evicted
        } else {
            Release::Retained(remaining)
        }
    }

    /// Record the dependency edge set established at load time. The same
    /// edges are consulted at unload time even if the manifest changes in
    /// between.
    pub fn record_edges(&mut self, name: &str, dependencies: Vec<String>) {
        self.edges.insert(name.to_string(), dependencies);
    }

    /// Recorded edges for one bundle; empty when none were recorded.
    pub fn edges_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove and return the recorded edges, for the eviction walk.
    pub fn take_edges(&mut self, name: &str) -> Option<Vec<String>> {
        self.edges.remove(name)
    }

    /// Record a terminal fetch error. The first recorded error wins; it is
    /// surfaced to every caller until an explicit unload clears it.
    pub fn record_error(&mut self, name: &str, err: LoadstoneError) {
        log::error!("[loadstone] {err}");
        self.errors.entry(name.to_string()).or_insert(err);
    }

    /// Clear a recorded error, returning it if one was present.
    pub fn clear_error(&mut self, name: &str) -> Option<LoadstoneError> {
        self.errors.remove(name)
    }

    /// The recorded error for one name, if any.
    pub fn error_of(&self, name: &str) -> Option<&LoadstoneError> {
        self.errors.get(name)
    }

    /// Number of resident bundles.
    pub fn resident_count(&self) -> usize {
        self.loaded.len()
    }

    /// True when nothing is resident and no errors are recorded.
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.errors.is_empty()
    }

    /// Diagnostics: (name, ref count) pairs, descending count then name.
    pub fn loaded_snapshot(&self) -> Vec<(String, u32)> {
        let mut snapshot: Vec<(String, u32)> = self
            .loaded
            .values()
            .map(|bundle| (bundle.name.clone(), bundle.ref_count))
            .collect();
        snapshot.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(name: &str) -> Arc<BundleArchive> {
        Arc::new(BundleArchive {
            name: name.to_string(),
            assets: Vec::new(),
        })
    }

    #[test]
    fn test_insert_retain_release_lifecycle() {
        let mut registry = BundleRegistry::new(false);
        registry.insert("ui.sd", archive("ui.sd"), 1);
        assert!(registry.retain("ui.sd", 2));
        assert_eq!(registry.release("ui.sd"), Release::Retained(2));
        assert_eq!(registry.release("ui.sd"), Release::Retained(1));
        assert_eq!(registry.release("ui.sd"), Release::Evicted);
        assert_eq!(registry.release("ui.sd"), Release::NotResident);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_status_requires_all_dependencies() {
        let mut registry = BundleRegistry::new(false);
        registry.record_edges("level1.sd", vec!["ui.sd".to_string(), "fx.sd".to_string()]);
        registry.insert("level1.sd", archive("level1.sd"), 1);
        assert!(!registry.status("level1.sd").is_ready());

        registry.insert("ui.sd", archive("ui.sd"), 1);
        assert!(!registry.status("level1.sd").is_ready());

        registry.insert("fx.sd", archive("fx.sd"), 1);
        assert!(registry.status("level1.sd").is_ready());
    }

    #[test]
    fn test_dependency_error_propagates_to_parent() {
        let mut registry = BundleRegistry::new(false);
        registry.record_edges("level1.sd", vec!["ui.sd".to_string()]);
        registry.insert("level1.sd", archive("level1.sd"), 1);
        registry.record_error("ui.sd", LoadstoneError::not_found("ui.sd", "missing"));

        match registry.status("level1.sd") {
            Residency::Failed(LoadstoneError::DependencyFailed {
                name, dependency, ..
            }) => {
                assert_eq!(name, "level1.sd");
                assert_eq!(dependency, "ui.sd");
            }
            other => panic!("expected dependency failure, got {other:?}"),
        }
    }

    #[test]
    fn test_error_persists_until_cleared() {
        let mut registry = BundleRegistry::new(false);
        registry.record_error("ui.sd", LoadstoneError::not_found("ui.sd", "missing"));
        registry.record_error(
            "ui.sd",
            LoadstoneError::not_found("ui.sd", "a later, different failure"),
        );

        // First error wins and keeps being surfaced.
        match registry.status("ui.sd") {
            Residency::Failed(LoadstoneError::NotFound { reason, .. }) => {
                assert_eq!(reason, "missing");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        assert!(registry.clear_error("ui.sd").is_some());
        assert!(matches!(registry.status("ui.sd"), Residency::Pending));
    }

    #[test]
    fn test_insert_clears_stale_error() {
        let mut registry = BundleRegistry::new(false);
        registry.record_error("ui.sd", LoadstoneError::not_found("ui.sd", "missing"));
        registry.insert("ui.sd", archive("ui.sd"), 2);
        assert!(registry.status("ui.sd").is_ready());
    }

    #[test]
    fn test_snapshot_sorts_by_count_then_name() {
        let mut registry = BundleRegistry::new(false);
        registry.insert("b.sd", archive("b.sd"), 1);
        registry.insert("a.sd", archive("a.sd"), 1);
        registry.insert("c.sd", archive("c.sd"), 5);
        assert_eq!(
            registry.loaded_snapshot(),
            vec![
                ("c.sd".to_string(), 5),
                ("a.sd".to_string(), 1),
                ("b.sd".to_string(), 1),
            ]
        );
    }
}
