//! Load operation state machines
//!
//! Every caller-facing load returns a pollable operation handle. Operations
//! never block: they re-look their target bundle up through the registry on
//! each poll and move through pending → in-progress → done. An operation
//! that ends in error is finished, not still running: `is_done()` turns true
//! and `error()` turns non-empty in the same step.
//!
//! The session keeps one clone of each operation in its in-progress list and
//! polls the whole list once per tick; the caller keeps the other clone and
//! reads results from it. `Rc<RefCell<_>>` is enough because scheduling is
//! single-threaded by design.

use std::cell::RefCell;
use std::rc::Rc;

use crate::activation::LevelActivation;
use crate::archive::{AssetBlob, BundleArchive, MANIFEST_ASSET};
use crate::error::LoadstoneError;
use crate::manifest::{Manifest, ManifestIndex};
use crate::registry::Residency;
use crate::session::SessionCore;

/// Poll contract shared by all load operations.
pub trait LoadOperation {
    /// Advance one tick. Returns true while more polling is required.
    fn advance(&mut self, core: &mut SessionCore) -> bool;

    /// True once the operation finished, successfully or in error.
    fn is_done(&self) -> bool;

    /// Progress in `[0, 1]`; exactly 1.0 once done.
    fn progress(&self) -> f32;

    /// Terminal error, if the operation finished in error.
    fn error(&self) -> Option<&LoadstoneError>;
}

/// Shared completion bookkeeping for the three operation variants.
#[derive(Debug, Default)]
struct Outcome {
    done: bool,
    error: Option<LoadstoneError>,
}

impl Outcome {
    fn failed(err: LoadstoneError) -> Self {
        Outcome {
            done: true,
            error: Some(err),
        }
    }

    fn finish(&mut self) {
        self.done = true;
    }

    fn fail(&mut self, err: LoadstoneError) {
        self.done = true;
        self.error = Some(err);
    }
}

// ---------------------------------------------------------------------------
// Asset load
// ---------------------------------------------------------------------------

/// Loads one named asset, or a bundle's full asset set, out of a bundle.
pub struct AssetLoadOperation {
    logical_name: String,
    concrete_name: String,
    asset_name: Option<String>,
    type_tag: Option<String>,
    assets: Vec<AssetBlob>,
    pending_progress: f32,
    outcome: Outcome,
}

impl AssetLoadOperation {
    pub(crate) fn new(
        logical_name: &str,
        concrete_name: &str,
        asset_name: Option<&str>,
        type_tag: Option<&str>,
    ) -> Self {
        AssetLoadOperation {
            logical_name: logical_name.to_string(),
            concrete_name: concrete_name.to_string(),
            asset_name: asset_name.map(str::to_string),
            type_tag: type_tag.map(str::to_string),
            assets: Vec::new(),
            pending_progress: 0.0,
            outcome: Outcome::default(),
        }
    }

    /// An operation that was dead on arrival (e.g. manifest uninitialized).
    pub(crate) fn failed(logical_name: &str, err: LoadstoneError) -> Self {
        AssetLoadOperation {
            outcome: Outcome::failed(err),
            ..AssetLoadOperation::new(logical_name, logical_name, None, None)
        }
    }

    fn materialize(&mut self, archive: &BundleArchive) {
        match &self.asset_name {
            Some(wanted) => match archive.find(wanted, self.type_tag.as_deref()) {
                Some(blob) => {
                    self.assets.push(blob.clone());
                    self.outcome.finish();
                }
                None => self.outcome.fail(LoadstoneError::AssetNotFound {
                    bundle: self.concrete_name.clone(),
                    asset: wanted.clone(),
                    type_tag: self.type_tag.clone().unwrap_or_else(|| "any".to_string()),
                }),
            },
            None => {
                self.assets.extend(
                    archive
                        .all(self.type_tag.as_deref())
                        .into_iter()
                        .cloned(),
                );
                self.outcome.finish();
            }
        }
    }
}

impl LoadOperation for AssetLoadOperation {
    fn advance(&mut self, core: &mut SessionCore) -> bool {
        if self.outcome.done {
            return false;
        }

        let archive = match core.status(&self.concrete_name) {
            Residency::Ready(bundle) => bundle.archive(),
            Residency::Failed(err) => {
                self.outcome.fail(err);
                return false;
            }
            Residency::Pending => {
                self.pending_progress = core.pending_fraction(&self.concrete_name);
                return true;
            }
        };

        self.materialize(&archive);
        false
    }

    fn is_done(&self) -> bool {
        self.outcome.done
    }

    fn progress(&self) -> f32 {
        if self.outcome.done {
            1.0
        } else {
            self.pending_progress
        }
    }

    fn error(&self) -> Option<&LoadstoneError> {
        self.outcome.error.as_ref()
    }
}

/// Caller-owned handle to an asset load.
#[derive(Clone)]
pub struct AssetLoadHandle {
    inner: Rc<RefCell<AssetLoadOperation>>,
}

impl AssetLoadHandle {
    pub(crate) fn new(op: AssetLoadOperation) -> (Self, Rc<RefCell<AssetLoadOperation>>) {
        let inner = Rc::new(RefCell::new(op));
        (
            AssetLoadHandle {
                inner: Rc::clone(&inner),
            },
            inner,
        )
    }

    pub fn is_done(&self) -> bool {
        self.inner.borrow().is_done()
    }

    pub fn progress(&self) -> f32 {
        self.inner.borrow().progress()
    }

    pub fn error(&self) -> Option<LoadstoneError> {
        self.inner.borrow().outcome.error.clone()
    }

    /// The single requested asset, once done.
    pub fn asset(&self) -> Option<AssetBlob> {
        self.inner.borrow().assets.first().cloned()
    }

    /// The materialized asset set, once done.
    pub fn all_assets(&self) -> Vec<AssetBlob> {
        self.inner.borrow().assets.clone()
    }

    /// Logical name the caller asked for.
    pub fn bundle_name(&self) -> String {
        self.inner.borrow().logical_name.clone()
    }

    /// Concrete artifact name after variant resolution.
    pub fn concrete_name(&self) -> String {
        self.inner.borrow().concrete_name.clone()
    }
}

// ---------------------------------------------------------------------------
// Level load
// ---------------------------------------------------------------------------

/// Loads a level's bundle, then hands off to the scene activator.
pub struct LevelLoadOperation {
    concrete_name: String,
    level_name: String,
    additive: bool,
    allow_activation: bool,
    activation: Option<Box<dyn LevelActivation>>,
    pending_progress: f32,
    outcome: Outcome,
}

impl LevelLoadOperation {
    pub(crate) fn new(
        concrete_name: &str,
        level_name: &str,
        additive: bool,
        allow_activation: bool,
    ) -> Self {
        LevelLoadOperation {
            concrete_name: concrete_name.to_string(),
            level_name: level_name.to_string(),
            additive,
            allow_activation,
            activation: None,
            pending_progress: 0.0,
            outcome: Outcome::default(),
        }
    }

    pub(crate) fn failed(concrete_name: &str, level_name: &str, err: LoadstoneError) -> Self {
        LevelLoadOperation {
            outcome: Outcome::failed(err),
            ..LevelLoadOperation::new(concrete_name, level_name, false, false)
        }
    }

    fn set_allow_activation(&mut self, allow: bool) {
        self.allow_activation = allow;
        if let Some(activation) = &mut self.activation {
            activation.allow_activation(allow);
        }
    }
}

impl LoadOperation for LevelLoadOperation {
    fn advance(&mut self, core: &mut SessionCore) -> bool {
        if self.outcome.done {
            return false;
        }

        if let Some(activation) = &mut self.activation {
            let running = activation.poll();
            if !running {
                match activation.error().cloned() {
                    Some(err) => self.outcome.fail(err),
                    None => self.outcome.finish(),
                }
            }
            return running;
        }

        let archive = match core.status(&self.concrete_name) {
            Residency::Ready(bundle) => bundle.archive(),
            Residency::Failed(err) => {
                self.outcome.fail(err);
                return false;
            }
            Residency::Pending => {
                self.pending_progress = core.pending_fraction(&self.concrete_name);
                return true;
            }
        };

        self.activation = Some(core.activate(
            &archive,
            &self.level_name,
            self.additive,
            self.allow_activation,
        ));
        true
    }

    fn is_done(&self) -> bool {
        self.outcome.done
    }

    fn progress(&self) -> f32 {
        if self.outcome.done {
            1.0
        } else if let Some(activation) = &self.activation {
            activation.progress()
        } else {
            // Scale the fetch phase below the activation plateau so progress
            // stays monotonic across the handoff.
            self.pending_progress * 0.9
        }
    }

    fn error(&self) -> Option<&LoadstoneError> {
        self.outcome.error.as_ref()
    }
}

/// Caller-owned handle to a level load.
#[derive(Clone)]
pub struct LevelLoadHandle {
    inner: Rc<RefCell<LevelLoadOperation>>,
}

impl LevelLoadHandle {
    pub(crate) fn new(op: LevelLoadOperation) -> (Self, Rc<RefCell<LevelLoadOperation>>) {
        let inner = Rc::new(RefCell::new(op));
        (
            LevelLoadHandle {
                inner: Rc::clone(&inner),
            },
            inner,
        )
    }

    pub fn is_done(&self) -> bool {
        self.inner.borrow().is_done()
    }

    pub fn progress(&self) -> f32 {
        self.inner.borrow().progress()
    }

    pub fn error(&self) -> Option<LoadstoneError> {
        self.inner.borrow().outcome.error.clone()
    }

    pub fn level_name(&self) -> String {
        self.inner.borrow().level_name.clone()
    }

    pub fn concrete_name(&self) -> String {
        self.inner.borrow().concrete_name.clone()
    }

    /// Open or close the activation gate controlling scene visibility.
    pub fn allow_activation(&self, allow: bool) {
        self.inner.borrow_mut().set_allow_activation(allow);
    }
}

// ---------------------------------------------------------------------------
// Manifest load
// ---------------------------------------------------------------------------

/// A specialization of asset load that installs the manifest snapshot on
/// completion.
pub struct ManifestLoadOperation {
    artifact_name: String,
    outcome: Outcome,
}

impl ManifestLoadOperation {
    pub(crate) fn new(artifact_name: &str) -> Self {
        ManifestLoadOperation {
            artifact_name: artifact_name.to_string(),
            outcome: Outcome::default(),
        }
    }
}

impl LoadOperation for ManifestLoadOperation {
    fn advance(&mut self, core: &mut SessionCore) -> bool {
        if self.outcome.done {
            return false;
        }

        let archive = match core.status(&self.artifact_name) {
            Residency::Ready(bundle) => bundle.archive(),
            Residency::Failed(err) => {
                self.outcome.fail(err);
                return false;
            }
            Residency::Pending => return true,
        };

        let Some(blob) = archive.find(MANIFEST_ASSET, None) else {
            let err = LoadstoneError::MalformedManifest {
                name: self.artifact_name.clone(),
                reason: format!("artifact carries no '{MANIFEST_ASSET}' asset"),
            };
            core.poison_bundle(&self.artifact_name, err.clone());
            self.outcome.fail(err);
            return false;
        };

        match Manifest::from_payload(&self.artifact_name, &blob.data) {
            Ok(manifest) => {
                core.install_manifest(ManifestIndex::new(manifest), &self.artifact_name);
                self.outcome.finish();
            }
            Err(err) => {
                // Keep the failure on the registry too, so later load
                // attempts against this artifact see it instead of the
                // resident-but-useless bundle.
                core.poison_bundle(&self.artifact_name, err.clone());
                self.outcome.fail(err);
            }
        }
        false
    }

    fn is_done(&self) -> bool {
        self.outcome.done
    }

    fn progress(&self) -> f32 {
        if self.outcome.done { 1.0 } else { 0.0 }
    }

    fn error(&self) -> Option<&LoadstoneError> {
        self.outcome.error.as_ref()
    }
}

/// Caller-owned handle to a manifest load.
#[derive(Clone)]
pub struct ManifestLoadHandle {
    inner: Rc<RefCell<ManifestLoadOperation>>,
}

impl ManifestLoadHandle {
    pub(crate) fn new(op: ManifestLoadOperation) -> (Self, Rc<RefCell<ManifestLoadOperation>>) {
        let inner = Rc::new(RefCell::new(op));
        (
            ManifestLoadHandle {
                inner: Rc::clone(&inner),
            },
            inner,
        )
    }

    pub fn is_done(&self) -> bool {
        self.inner.borrow().is_done()
    }

    pub fn progress(&self) -> f32 {
        self.inner.borrow().progress()
    }

    pub fn error(&self) -> Option<LoadstoneError> {
        self.inner.borrow().outcome.error.clone()
    }

    pub fn artifact_name(&self) -> String {
        self.inner.borrow().artifact_name.clone()
    }
}
