//! Artifact sources
//!
//! A source turns one fetch request into one completion record, delivered
//! over the session's completion channel. The actual read or download runs
//! wherever the source wants (worker threads for real I/O); only the
//! completion record crosses back to the scheduling thread, which is the
//! only place shared state is mutated.
//!
//! The session drives two source slots, local and remote. Simulation mode
//! swaps [`DirectSource`] into both slots instead of branching inside the
//! loader.

mod direct;
mod local;
mod remote;

pub use direct::{DEV_VARIANT, DirectSource};
pub use local::LocalSource;
pub use remote::RemoteSource;

use crossbeam_channel::Sender;

use crate::error::LoadstoneError;

/// Which source slot a fetch was dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchOrigin {
    Local,
    Remote,
}

/// One artifact fetch, keyed by concrete bundle name.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Concrete bundle name; also the file name / URL suffix to fetch.
    pub name: String,

    /// Slot this request was dispatched to; echoed back in the completion.
    pub origin: FetchOrigin,

    /// Manifest fetches skip content validation and are always fetched
    /// fresh, since no prior manifest exists to supply a token.
    pub is_manifest: bool,

    /// Content token to validate remote payloads against.
    pub expected_token: Option<String>,

    /// Restrict local reads to the packaged internal root.
    pub internal_only: bool,
}

/// Completion record handed back to the scheduling thread.
#[derive(Debug)]
pub struct FetchCompletion {
    pub name: String,
    pub origin: FetchOrigin,
    pub is_manifest: bool,
    pub payload: Result<Vec<u8>, LoadstoneError>,
}

impl FetchCompletion {
    /// Build the completion for a finished request.
    pub fn of(request: &FetchRequest, payload: Result<Vec<u8>, LoadstoneError>) -> Self {
        FetchCompletion {
            name: request.name.clone(),
            origin: request.origin,
            is_manifest: request.is_manifest,
            payload,
        }
    }
}

/// A fetch collaborator: local filesystem, remote endpoint, or a test/dev
/// stand-in.
///
/// Implementations must eventually send exactly one completion per submitted
/// request (success or terminal error) and must not touch any session state
/// directly. Send failures mean the session is gone and are ignored.
pub trait ArtifactSource {
    fn submit(&mut self, request: FetchRequest, completions: &Sender<FetchCompletion>);
}
