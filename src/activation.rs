//! Scene activation seam
//!
//! Instantiating a loaded level is the consuming environment's job, not
//! this crate's. The session only needs two things from it: a way to start
//! activation once the level's bundle is resident, and a pollable handle
//! with an activation gate so the caller controls the exact moment the
//! scene becomes visible.
//!
//! [`ImmediateActivator`] is the bundled default: it validates that the
//! level exists in the archive and completes as soon as the gate is open,
//! parking at progress 0.9 while gated.

use crate::archive::BundleArchive;
use crate::error::LoadstoneError;

/// An in-progress scene activation, polled once per tick by its owning
/// level-load operation.
pub trait LevelActivation {
    /// Advance one tick. Returns true while still running.
    fn poll(&mut self) -> bool;

    /// True once the scene finished activating, or activation failed.
    fn is_done(&self) -> bool;

    /// Activation progress in `[0, 1]`.
    fn progress(&self) -> f32;

    /// Open or close the visibility gate.
    fn allow_activation(&mut self, allow: bool);

    /// Terminal activation error, if any.
    fn error(&self) -> Option<&LoadstoneError>;
}

/// The consuming environment's scene-activation primitive.
pub trait SceneActivator {
    /// Begin activating `level` out of a resident bundle archive.
    fn activate(
        &mut self,
        archive: &BundleArchive,
        level: &str,
        additive: bool,
        allow_activation: bool,
    ) -> Box<dyn LevelActivation>;
}

/// Default activator: completes on the first polled tick once the gate is
/// open. Reports `LevelNotFound` when the bundle has no asset by that name.
#[derive(Debug, Default)]
pub struct ImmediateActivator;

impl SceneActivator for ImmediateActivator {
    fn activate(
        &mut self,
        archive: &BundleArchive,
        level: &str,
        _additive: bool,
        allow_activation: bool,
    ) -> Box<dyn LevelActivation> {
        let error = (!archive.contains(level)).then(|| LoadstoneError::LevelNotFound {
            bundle: archive.name.clone(),
            level: level.to_string(),
        });
        Box::new(ImmediateActivation {
            allowed: allow_activation,
            done: error.is_some(),
            error,
        })
    }
}

struct ImmediateActivation {
    allowed: bool,
    done: bool,
    error: Option<LoadstoneError>,
}

impl LevelActivation for ImmediateActivation {
    fn poll(&mut self) -> bool {
        if !self.done && self.allowed {
            self.done = true;
        }
        !self.done
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn progress(&self) -> f32 {
        if self.done {
            1.0
        } else {
            // Gated activations hold at 0.9, the conventional "loaded but
            // not yet activated" plateau.
            0.9
        }
    }

    fn allow_activation(&mut self, allow: bool) {
        self.allowed = allow;
    }

    fn error(&self) -> Option<&LoadstoneError> {
        self.error.as_ref()
    }
}
