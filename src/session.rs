//! Bundle session: the tick-driven orchestrator
//!
//! A [`BundleSession`] owns the whole pipeline: variant resolution, the
//! fallback loader with its two source slots, the reference-counted registry
//! and the in-progress operation list. Everything is driven from `tick()`,
//! which first drains fetch completions (up to the configured budget) and
//! then polls every in-progress operation once.
//!
//! The session is deliberately not `Send`: all scheduling state lives on one
//! thread, and worker threads reach it only through the completion channel.
//!
//! Unloads mirror loads. Releasing a bundle to zero walks the dependency
//! edges recorded when it was loaded, releasing one reference per edge;
//! unloading a name whose fetch is still outstanding queues the release and
//! consumes it when the completion lands, so the fetch can never strand a
//! reference.

use std::collections::HashMap;
use std::sync::Arc;

use crate::activation::{ImmediateActivator, LevelActivation, SceneActivator};
use crate::archive::BundleArchive;
use crate::config::{LoadMode, SessionConfig, platform_name};
use crate::error::LoadstoneError;
use crate::loader::{DrainedCompletion, SourceFallbackLoader, SubmitOutcome};
use crate::manifest::ManifestIndex;
use crate::operation::{
    AssetLoadHandle, AssetLoadOperation, LevelLoadHandle, LevelLoadOperation, LoadOperation,
    ManifestLoadHandle, ManifestLoadOperation,
};
use crate::registry::{BundleRegistry, Release, Residency};
use crate::source::{ArtifactSource, DirectSource, FetchCompletion, FetchOrigin, LocalSource, RemoteSource};
use crate::variant;

use std::cell::RefCell;
use std::rc::Rc;

/// Shared scheduling state handed to operations on every poll.
///
/// Operations never hold references into the core between ticks; they look
/// their bundle up again each time.
pub struct SessionCore {
    config: SessionConfig,
    index: Option<ManifestIndex>,
    manifest_artifact: Option<String>,
    registry: BundleRegistry,
    loader: SourceFallbackLoader,
    pending_releases: HashMap<String, u32>,
    activator: Box<dyn SceneActivator>,
}

impl SessionCore {
    /// Readiness of one concrete bundle, dependencies included.
    pub(crate) fn status(&self, concrete_name: &str) -> Residency<'_> {
        self.registry.status(concrete_name)
    }

    /// Fraction of {bundle, recorded dependencies} already resident.
    ///
    /// Strictly below 1.0 while pending: if everything were resident the
    /// status would be `Ready` instead.
    pub(crate) fn pending_fraction(&self, concrete_name: &str) -> f32 {
        let edges = self.registry.edges_of(concrete_name);
        let total = edges.len() + 1;
        let resident = edges
            .iter()
            .filter(|dependency| self.registry.resident(dependency).is_some())
            .count()
            + usize::from(self.registry.resident(concrete_name).is_some());
        resident as f32 / total as f32
    }

    /// Hand a resident level bundle to the scene activator.
    pub(crate) fn activate(
        &mut self,
        archive: &BundleArchive,
        level: &str,
        additive: bool,
        allow_activation: bool,
    ) -> Box<dyn LevelActivation> {
        self.activator
            .activate(archive, level, additive, allow_activation)
    }

    /// Record a terminal error against a name that is already resident, so
    /// later lookups see the failure instead of the unusable bundle.
    pub(crate) fn poison_bundle(&mut self, concrete_name: &str, err: LoadstoneError) {
        self.registry.record_error(concrete_name, err);
    }

    /// Swap in a freshly parsed manifest snapshot.
    ///
    /// The previously installed manifest bundle, if any, is released first;
    /// in-flight work holding the old `Arc` snapshot finishes against it.
    pub(crate) fn install_manifest(&mut self, index: ManifestIndex, artifact_name: &str) {
        if let Some(previous) = self.manifest_artifact.take() {
            self.unload_internal(&previous);
        }
        self.index = Some(index);
        self.manifest_artifact = Some(artifact_name.to_string());
        if self.config.verbose() {
            log::info!("[loadstone] manifest '{artifact_name}' installed");
        }
    }

    /// Resolve a logical name to its concrete artifact name, logging any
    /// resolution diagnostic when verbose.
    pub(crate) fn remap(&self, logical_name: &str) -> String {
        let (concrete, diagnostic) = variant::resolve(
            logical_name,
            self.index.as_ref(),
            &self.config.active_variants,
        );
        if let Some(diagnostic) = diagnostic {
            if self.config.verbose() {
                log::warn!("[loadstone] {diagnostic}");
            }
        }
        concrete
    }

    /// Request one concrete bundle with a demand of one reference, then its
    /// dependency closure if the request actually dispatched a fetch.
    pub(crate) fn load_bundle(&mut self, concrete_name: &str, is_manifest: bool) {
        if self.config.verbose() {
            log::info!(
                "[loadstone] requesting bundle '{concrete_name}'{}",
                if is_manifest { " (manifest)" } else { "" }
            );
        }

        let expected_token = if is_manifest {
            None
        } else {
            self.index
                .as_ref()
                .and_then(|index| index.content_token(concrete_name))
                .map(str::to_string)
        };

        let outcome = self.loader.submit(
            &mut self.registry,
            concrete_name,
            1,
            is_manifest,
            self.config.load_mode,
            expected_token,
        );

        if outcome == SubmitOutcome::Dispatched && !is_manifest {
            self.load_dependencies(concrete_name);
        }
    }

    /// Resolve, record and request the direct dependencies of one bundle.
    ///
    /// Recursion terminates on cycles because a name already in flight never
    /// dispatches again.
    fn load_dependencies(&mut self, parent: &str) {
        let declared: Vec<String> = match &self.index {
            Some(index) => index.dependencies_of(parent).to_vec(),
            None => return,
        };
        if declared.is_empty() {
            return;
        }

        let resolved: Vec<String> = declared
            .iter()
            .map(|dependency| self.remap(dependency))
            .collect();
        if self.config.verbose() {
            log::info!(
                "[loadstone] '{parent}' depends on {} bundle(s)",
                resolved.len()
            );
        }

        self.registry.record_edges(parent, resolved.clone());
        for dependency in resolved {
            self.load_bundle(&dependency, false);
        }
    }

    /// Release one reference, accepting either a concrete or a logical name.
    pub(crate) fn unload(&mut self, name: &str) {
        let known = self.registry.resident(name).is_some()
            || self.registry.error_of(name).is_some()
            || self.loader.is_inflight(name);
        let target = if known {
            name.to_string()
        } else {
            self.remap(name)
        };
        self.unload_internal(&target);
    }

    fn unload_internal(&mut self, concrete_name: &str) {
        if self.registry.resident(concrete_name).is_some() {
            if self.registry.release(concrete_name) == Release::Evicted {
                if let Some(dependencies) = self.registry.take_edges(concrete_name) {
                    for dependency in dependencies {
                        self.unload_internal(&dependency);
                    }
                }
            }
            return;
        }

        if self.loader.is_inflight(concrete_name) {
            // The fetch is still outstanding; consume this release when the
            // completion lands instead of stranding the reference.
            *self
                .pending_releases
                .entry(concrete_name.to_string())
                .or_insert(0) += 1;
            return;
        }

        if self.registry.clear_error(concrete_name).is_some() {
            if let Some(dependencies) = self.registry.take_edges(concrete_name) {
                for dependency in dependencies {
                    self.unload_internal(&dependency);
                }
            }
            return;
        }

        log::warn!("[loadstone] unload of '{concrete_name}': nothing loaded under that name");
    }

    /// Apply one drained fetch completion to the registry, resubmitting the
    /// opposite source leg on a failed first leg of a fallback mode.
    pub(crate) fn handle_completion(&mut self, drained: DrainedCompletion) {
        let DrainedCompletion { completion, record } = drained;
        let FetchCompletion {
            name,
            origin,
            is_manifest,
            payload,
        } = completion;

        match payload {
            Ok(bytes) => {
                let parsed = if is_manifest {
                    Ok(BundleArchive::wrap_manifest(&name, bytes))
                } else {
                    BundleArchive::from_payload(&name, &bytes)
                };
                match parsed {
                    Ok(archive) => {
                        self.registry.insert(&name, Arc::new(archive), record.demand);
                        self.drain_pending_releases(&name);
                    }
                    Err(err) => {
                        self.registry.record_error(&name, err);
                        self.discard_pending_releases(&name);
                    }
                }
            }
            Err(err) => {
                let fallback = match (origin, self.config.load_mode) {
                    (FetchOrigin::Local, LoadMode::LocalFirst) => Some(LoadMode::Remote),
                    (FetchOrigin::Remote, LoadMode::RemoteFirst) => Some(LoadMode::Local),
                    _ => None,
                };
                if let Some(forced) = fallback {
                    if self.config.verbose() {
                        log::info!(
                            "[loadstone] '{name}' unavailable via {origin:?} ({err}), retrying via {forced:?}"
                        );
                    }
                    let expected_token = self
                        .index
                        .as_ref()
                        .and_then(|index| index.content_token(&name))
                        .map(str::to_string);
                    // The drained record carries the merged demand into the
                    // second leg: moved, never duplicated. Queued releases
                    // stay queued until that leg completes.
                    self.loader.submit(
                        &mut self.registry,
                        &name,
                        record.demand,
                        record.is_manifest,
                        forced,
                        expected_token,
                    );
                    return;
                }
                self.registry.record_error(&name, err);
                self.discard_pending_releases(&name);
            }
        }
    }

    fn drain_pending_releases(&mut self, concrete_name: &str) {
        if let Some(count) = self.pending_releases.remove(concrete_name) {
            for _ in 0..count {
                self.unload_internal(concrete_name);
            }
        }
    }

    /// A failed fetch leaves nothing resident, so queued releases have
    /// nothing to release. They must not run through `unload_internal`
    /// either: that would clear the fresh error record before any waiting
    /// operation polls it. Remaining waiters clear the record with their
    /// own unloads.
    fn discard_pending_releases(&mut self, concrete_name: &str) {
        if self.pending_releases.remove(concrete_name).is_some() && self.config.verbose() {
            log::info!(
                "[loadstone] dropping queued release(s) for failed bundle '{concrete_name}'"
            );
        }
    }
}

/// The caller-facing session.
pub struct BundleSession {
    core: SessionCore,
    operations: Vec<Rc<RefCell<dyn LoadOperation>>>,
}

impl BundleSession {
    /// Create a session with sources derived from the configuration:
    /// simulation installs the direct development source into both slots,
    /// otherwise the local filesystem and remote endpoint sources are used.
    pub fn new(config: SessionConfig) -> Self {
        let config = config.normalized();
        let (local, remote): (Box<dyn ArtifactSource>, Box<dyn ArtifactSource>) =
            match &config.simulate_root {
                Some(root) => (
                    Box::new(DirectSource::new(root.clone())),
                    Box::new(DirectSource::new(root.clone())),
                ),
                None => (
                    Box::new(LocalSource::new(
                        config.local_root.clone(),
                        config.internal_root.clone(),
                    )),
                    Box::new(RemoteSource::new(config.remote_url.clone())),
                ),
            };
        Self::from_parts(config, local, remote)
    }

    /// Create a session with caller-supplied source slots.
    pub fn with_sources(
        config: SessionConfig,
        local: Box<dyn ArtifactSource>,
        remote: Box<dyn ArtifactSource>,
    ) -> Self {
        Self::from_parts(config.normalized(), local, remote)
    }

    fn from_parts(
        config: SessionConfig,
        local: Box<dyn ArtifactSource>,
        remote: Box<dyn ArtifactSource>,
    ) -> Self {
        let verbose = config.verbose();
        BundleSession {
            core: SessionCore {
                config,
                index: None,
                manifest_artifact: None,
                registry: BundleRegistry::new(verbose),
                loader: SourceFallbackLoader::new(local, remote),
                pending_releases: HashMap::new(),
                activator: Box::new(ImmediateActivator),
            },
            operations: Vec::new(),
        }
    }

    /// Replace the scene activator.
    #[must_use]
    pub fn with_activator(mut self, activator: Box<dyn SceneActivator>) -> Self {
        self.core.activator = activator;
        self
    }

    /// Fetch and install the platform-named manifest.
    pub fn initialize(&mut self) -> ManifestLoadHandle {
        self.initialize_with(platform_name())
    }

    /// Fetch and install an explicitly named manifest artifact.
    pub fn initialize_with(&mut self, artifact_name: &str) -> ManifestLoadHandle {
        self.core.load_bundle(artifact_name, true);
        let (handle, op) = ManifestLoadHandle::new(ManifestLoadOperation::new(artifact_name));
        self.operations.push(op);
        handle
    }

    /// Release the installed manifest bundle and fetch it again.
    ///
    /// The old index stays queryable until the new manifest lands.
    pub fn reload_manifest(&mut self) -> ManifestLoadHandle {
        let artifact_name = self
            .core
            .manifest_artifact
            .take()
            .unwrap_or_else(|| platform_name().to_string());
        self.core.unload_internal(&artifact_name);
        self.initialize_with(&artifact_name)
    }

    /// Load one named asset from a bundle, or the bundle's whole asset set
    /// when `asset` is `None`. `type_tag` further narrows the match.
    pub fn load_asset(
        &mut self,
        bundle: &str,
        asset: Option<&str>,
        type_tag: Option<&str>,
    ) -> AssetLoadHandle {
        let op = match self.require_manifest(bundle) {
            Ok(concrete) => {
                self.core.load_bundle(&concrete, false);
                AssetLoadOperation::new(bundle, &concrete, asset, type_tag)
            }
            Err(err) => AssetLoadOperation::failed(bundle, err),
        };
        let (handle, op) = AssetLoadHandle::new(op);
        self.operations.push(op);
        handle
    }

    /// Load a level's bundle and hand it to the scene activator.
    pub fn load_level(
        &mut self,
        bundle: &str,
        level: &str,
        additive: bool,
        allow_activation: bool,
    ) -> LevelLoadHandle {
        let op = match self.require_manifest(bundle) {
            Ok(concrete) => {
                self.core.load_bundle(&concrete, false);
                LevelLoadOperation::new(&concrete, level, additive, allow_activation)
            }
            Err(err) => LevelLoadOperation::failed(bundle, level, err),
        };
        let (handle, op) = LevelLoadHandle::new(op);
        self.operations.push(op);
        handle
    }

    fn require_manifest(&self, logical_name: &str) -> crate::error::Result<String> {
        if self.core.index.is_none() {
            return Err(LoadstoneError::ManifestUninitialized {
                name: logical_name.to_string(),
            });
        }
        Ok(self.core.remap(logical_name))
    }

    /// Release one reference to a bundle, by logical or concrete name.
    ///
    /// Reaching zero evicts the bundle and releases one reference per
    /// dependency edge recorded when it was loaded. Unloading an errored
    /// name clears the error record, permitting a retry.
    pub fn unload(&mut self, name: &str) {
        self.core.unload(name);
    }

    /// Advance the session one step: drain fetch completions up to the
    /// configured budget, then poll every in-progress operation once.
    /// Returns the number of operations still in progress.
    pub fn tick(&mut self) -> usize {
        for _ in 0..self.core.config.completion_budget_per_tick {
            match self.core.loader.poll_completion() {
                Some(drained) => self.core.handle_completion(drained),
                None => break,
            }
        }

        let core = &mut self.core;
        self.operations
            .retain(|operation| operation.borrow_mut().advance(core));
        self.operations.len()
    }

    /// True once a manifest is installed.
    pub fn is_initialized(&self) -> bool {
        self.core.index.is_some()
    }

    /// The concrete artifact name a logical name currently resolves to.
    pub fn resolve_variant(&self, logical_name: &str) -> String {
        self.core.remap(logical_name)
    }

    /// True when the installed manifest knows the logical name.
    pub fn has_bundle(&self, logical_name: &str) -> bool {
        self.core
            .index
            .as_ref()
            .is_some_and(|index| index.contains_logical(logical_name))
    }

    /// True when the resolved artifact exists under the local or internal
    /// root.
    pub fn has_bundle_in_local(&self, name: &str) -> bool {
        let concrete = self.core.remap(name);
        if self.core.config.local_root.join(&concrete).is_file() {
            return true;
        }
        self.core
            .config
            .internal_root
            .as_ref()
            .is_some_and(|root| root.join(&concrete).is_file())
    }

    /// Every concrete artifact name in the installed manifest.
    pub fn all_bundle_names(&self) -> Vec<String> {
        self.core
            .index
            .as_ref()
            .map(|index| index.all_bundle_names().to_vec())
            .unwrap_or_default()
    }

    /// Every logical bundle name in the installed manifest, sorted.
    pub fn logical_bundle_names(&self) -> Vec<String> {
        self.core
            .index
            .as_ref()
            .map(ManifestIndex::logical_names)
            .unwrap_or_default()
    }

    /// Diagnostics: resident bundles with their reference counts.
    pub fn loaded_snapshot(&self) -> Vec<(String, u32)> {
        self.core.registry.loaded_snapshot()
    }

    /// The recorded error for a name, by logical or concrete spelling.
    pub fn bundle_error(&self, name: &str) -> Option<LoadstoneError> {
        if let Some(err) = self.core.registry.error_of(name) {
            return Some(err.clone());
        }
        let concrete = self.core.remap(name);
        self.core.registry.error_of(&concrete).cloned()
    }

    /// Replace the variant preference order for subsequent resolutions.
    pub fn set_active_variants(&mut self, variants: Vec<String>) {
        self.core.config.active_variants = variants;
    }

    pub fn active_variants(&self) -> &[String] {
        &self.core.config.active_variants
    }

    /// Number of operations still in progress.
    pub fn operations_in_progress(&self) -> usize {
        self.operations.len()
    }

    /// True when no operations and no fetches are outstanding.
    pub fn is_idle(&self) -> bool {
        self.operations.is_empty() && self.core.loader.inflight_count() == 0
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::AssetBlob;
    use crate::manifest::Manifest;
    use crate::source::FetchRequest;
    use crossbeam_channel::Sender;

    /// Serves canned payloads synchronously, like the development source.
    struct MapSource {
        responses: HashMap<String, Result<Vec<u8>, LoadstoneError>>,
    }

    impl ArtifactSource for MapSource {
        fn submit(&mut self, request: FetchRequest, completions: &Sender<FetchCompletion>) {
            let payload = self
                .responses
                .get(&request.name)
                .cloned()
                .unwrap_or_else(|| {
                    Err(LoadstoneError::not_found(&request.name, "no canned payload"))
                });
            let _ = completions.send(FetchCompletion::of(&request, payload));
        }
    }

    fn archive_payload(name: &str, assets: &[(&str, &str, &[u8])]) -> Vec<u8> {
        BundleArchive {
            name: name.to_string(),
            assets: assets
                .iter()
                .map(|(asset, tag, data)| AssetBlob {
                    name: asset.to_string(),
                    type_tag: tag.to_string(),
                    data: data.to_vec(),
                })
                .collect(),
        }
        .to_payload()
        .expect("serializable archive")
    }

    fn manifest_payload(bundles: &[&str], dependencies: &[(&str, &[&str])]) -> Vec<u8> {
        Manifest {
            bundles: bundles.iter().map(|s| s.to_string()).collect(),
            dependencies: dependencies
                .iter()
                .map(|(name, deps)| {
                    (
                        name.to_string(),
                        deps.iter().map(|d| d.to_string()).collect(),
                    )
                })
                .collect(),
            hashes: HashMap::new(),
        }
        .to_payload()
        .expect("serializable manifest")
    }

    fn session_with(responses: Vec<(&str, Result<Vec<u8>, LoadstoneError>)>) -> BundleSession {
        let responses: HashMap<String, Result<Vec<u8>, LoadstoneError>> = responses
            .into_iter()
            .map(|(name, payload)| (name.to_string(), payload))
            .collect();
        let local = MapSource {
            responses: responses.clone(),
        };
        let remote = MapSource { responses };
        BundleSession::with_sources(
            SessionConfig {
                active_variants: vec!["sd".to_string()],
                ..SessionConfig::default()
            },
            Box::new(local),
            Box::new(remote),
        )
    }

    fn initialized_session(
        mut responses: Vec<(&'static str, Result<Vec<u8>, LoadstoneError>)>,
        manifest: Vec<u8>,
    ) -> BundleSession {
        responses.push(("TestPlatform", Ok(manifest)));
        let mut session = session_with(responses);
        let handle = session.initialize_with("TestPlatform");
        session.tick();
        assert!(handle.is_done(), "manifest install should finish in one tick");
        assert!(handle.error().is_none());
        session
    }

    #[test]
    fn test_load_before_initialize_fails_immediately() {
        let mut session = session_with(vec![]);
        let handle = session.load_asset("ui", Some("button"), None);
        assert!(handle.is_done());
        assert!(matches!(
            handle.error(),
            Some(LoadstoneError::ManifestUninitialized { .. })
        ));
        // The dead-on-arrival operation is dropped on the next tick.
        assert_eq!(session.tick(), 0);
    }

    #[test]
    fn test_asset_load_with_dependency_closure() {
        let manifest = manifest_payload(&["levels.sd", "ui.sd"], &[("levels.sd", &["ui"])]);
        let mut session = initialized_session(
            vec![
                (
                    "levels.sd",
                    Ok(archive_payload("levels.sd", &[("arena", "level", b"geo")])),
                ),
                (
                    "ui.sd",
                    Ok(archive_payload("ui.sd", &[("button", "texture", b"px")])),
                ),
            ],
            manifest,
        );

        let handle = session.load_asset("levels", Some("arena"), Some("level"));
        assert!(!handle.is_done());
        session.tick();

        assert!(handle.is_done());
        assert!(handle.error().is_none());
        let asset = handle.asset().expect("materialized asset");
        assert_eq!(asset.data, b"geo");

        // Both the bundle and its dependency are resident with one
        // reference each.
        let snapshot = session.loaded_snapshot();
        assert!(snapshot.contains(&("levels.sd".to_string(), 1)));
        assert!(snapshot.contains(&("ui.sd".to_string(), 1)));
    }

    #[test]
    fn test_unload_cascades_over_recorded_edges() {
        let manifest = manifest_payload(&["levels.sd", "ui.sd"], &[("levels.sd", &["ui"])]);
        let mut session = initialized_session(
            vec![
                ("levels.sd", Ok(archive_payload("levels.sd", &[]))),
                ("ui.sd", Ok(archive_payload("ui.sd", &[]))),
            ],
            manifest,
        );

        let handle = session.load_asset("levels", None, None);
        session.tick();
        assert!(handle.is_done());

        session.unload("levels");
        let resident: Vec<String> = session
            .loaded_snapshot()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(resident, vec!["TestPlatform".to_string()]);
    }

    #[test]
    fn test_missing_asset_surfaces_not_found() {
        let manifest = manifest_payload(&["ui.sd"], &[]);
        let mut session = initialized_session(
            vec![("ui.sd", Ok(archive_payload("ui.sd", &[])))],
            manifest,
        );

        let handle = session.load_asset("ui", Some("absent"), None);
        session.tick();
        assert!(matches!(
            handle.error(),
            Some(LoadstoneError::AssetNotFound { .. })
        ));
    }

    #[test]
    fn test_fetch_error_persists_until_unload() {
        let manifest = manifest_payload(&["ui.sd"], &[]);
        let mut session = initialized_session(
            vec![(
                "ui.sd",
                Err(LoadstoneError::not_found("ui.sd", "file missing")),
            )],
            manifest,
        );

        let first = session.load_asset("ui", None, None);
        session.tick();
        assert!(matches!(first.error(), Some(LoadstoneError::NotFound { .. })));

        // A second request observes the recorded error without refetching.
        let second = session.load_asset("ui", None, None);
        session.tick();
        assert!(second.is_done());
        assert!(second.error().is_some());

        session.unload("ui");
        assert!(session.bundle_error("ui").is_none());
    }

    #[test]
    fn test_manifest_queries() {
        let manifest = manifest_payload(&["ui.sd", "ui.hd", "levels.sd"], &[]);
        let session = initialized_session(vec![], manifest);

        assert!(session.is_initialized());
        assert!(session.has_bundle("ui"));
        assert!(!session.has_bundle("absent"));
        assert_eq!(session.resolve_variant("ui"), "ui.sd");
        assert_eq!(
            session.logical_bundle_names(),
            vec!["levels".to_string(), "ui".to_string()]
        );
    }

    #[test]
    fn test_level_load_respects_activation_gate() {
        let manifest = manifest_payload(&["levels.sd"], &[]);
        let mut session = initialized_session(
            vec![(
                "levels.sd",
                Ok(archive_payload("levels.sd", &[("arena", "level", b"geo")])),
            )],
            manifest,
        );

        let handle = session.load_level("levels", "arena", false, false);
        session.tick(); // bundle lands, activation starts gated
        session.tick();
        assert!(!handle.is_done());
        assert!(handle.progress() < 1.0);

        handle.allow_activation(true);
        session.tick();
        assert!(handle.is_done());
        assert!(handle.error().is_none());
    }

    #[test]
    fn test_reload_manifest_replaces_index() {
        let manifest = manifest_payload(&["ui.sd"], &[]);
        let mut session = initialized_session(vec![], manifest);
        assert!(session.has_bundle("ui"));

        let handle = session.reload_manifest();
        session.tick();
        assert!(handle.is_done());
        assert!(session.is_initialized());
        // Exactly one manifest bundle reference remains after the swap.
        assert_eq!(
            session.loaded_snapshot(),
            vec![("TestPlatform".to_string(), 1)]
        );
    }
}
