//! Source fallback loader
//!
//! Drives the two source slots and owns the in-flight bookkeeping: one
//! record per concrete name currently being fetched, carrying the merged
//! reference-count demand. Requests for a name that is already errored,
//! resident or in flight never start a second fetch; the demand is folded
//! into the existing record instead.
//!
//! A concrete name lives in at most one of {registry, local in-flight,
//! remote in-flight} at any time. All maps are mutated exclusively from the
//! scheduling thread; worker threads only ever touch the completion channel.

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::config::LoadMode;
use crate::registry::BundleRegistry;
use crate::source::{ArtifactSource, FetchCompletion, FetchOrigin, FetchRequest};

/// Bookkeeping for one outstanding fetch.
#[derive(Debug, Clone, Copy)]
pub struct InflightFetch {
    /// Reference count to apply when the fetch succeeds.
    pub demand: u32,
    /// Manifest fetches skip validation and bypass dependency handling.
    pub is_manifest: bool,
}

/// What `submit` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The name was already errored, resident or in flight; demand merged
    /// (or intentionally dropped on the error path), no new fetch started.
    AlreadyProcessed,
    /// A new fetch was dispatched to a source slot.
    Dispatched,
}

/// One drained completion, paired with its in-flight record.
#[derive(Debug)]
pub struct DrainedCompletion {
    pub completion: FetchCompletion,
    pub record: InflightFetch,
}

/// Dispatches fetches with de-duplication, demand merging and mode-driven
/// source selection.
pub struct SourceFallbackLoader {
    local: Box<dyn ArtifactSource>,
    remote: Box<dyn ArtifactSource>,
    completions_tx: Sender<FetchCompletion>,
    completions_rx: Receiver<FetchCompletion>,
    local_inflight: HashMap<String, InflightFetch>,
    remote_inflight: HashMap<String, InflightFetch>,
}

impl SourceFallbackLoader {
    pub fn new(local: Box<dyn ArtifactSource>, remote: Box<dyn ArtifactSource>) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        SourceFallbackLoader {
            local,
            remote,
            completions_tx,
            completions_rx,
            local_inflight: HashMap::new(),
            remote_inflight: HashMap::new(),
        }
    }

    /// Sender end of the completion channel, for custom sources.
    pub fn completion_sender(&self) -> Sender<FetchCompletion> {
        self.completions_tx.clone()
    }

    /// Request one artifact with the given demand.
    ///
    /// `mode` decides the first source leg; fallback resubmission passes the
    /// forced opposite mode. `expected_token` only matters for remote legs
    /// of non-manifest fetches.
    pub fn submit(
        &mut self,
        registry: &mut BundleRegistry,
        name: &str,
        demand: u32,
        is_manifest: bool,
        mode: LoadMode,
        expected_token: Option<String>,
    ) -> SubmitOutcome {
        // A recorded error is surfaced through the registry until unload
        // clears it; no retry, the demand is intentionally dropped.
        if registry.error_of(name).is_some() {
            return SubmitOutcome::AlreadyProcessed;
        }

        if registry.retain(name, demand) {
            return SubmitOutcome::AlreadyProcessed;
        }

        if let Some(record) = self.local_inflight.get_mut(name) {
            record.demand += demand;
            return SubmitOutcome::AlreadyProcessed;
        }

        if let Some(record) = self.remote_inflight.get_mut(name) {
            record.demand += demand;
            return SubmitOutcome::AlreadyProcessed;
        }

        let record = InflightFetch {
            demand,
            is_manifest,
        };

        if mode.starts_local() {
            self.local_inflight.insert(name.to_string(), record);
            let request = FetchRequest {
                name: name.to_string(),
                origin: FetchOrigin::Local,
                is_manifest,
                expected_token: None,
                internal_only: mode == LoadMode::InternalOnly,
            };
            self.local.submit(request, &self.completions_tx);
        } else {
            self.remote_inflight.insert(name.to_string(), record);
            let request = FetchRequest {
                name: name.to_string(),
                origin: FetchOrigin::Remote,
                is_manifest,
                // Manifest artifacts are always fetched fresh.
                expected_token: if is_manifest { None } else { expected_token },
                internal_only: false,
            };
            self.remote.submit(request, &self.completions_tx);
        }

        SubmitOutcome::Dispatched
    }

    /// Drain one completion record, removing its in-flight entry.
    pub fn poll_completion(&mut self) -> Option<DrainedCompletion> {
        let completion = self.completions_rx.try_recv().ok()?;
        let map = match completion.origin {
            FetchOrigin::Local => &mut self.local_inflight,
            FetchOrigin::Remote => &mut self.remote_inflight,
        };
        let record = match map.remove(&completion.name) {
            Some(record) => record,
            None => {
                // A completion with no record means a source double-sent;
                // fold it in with the smallest possible demand.
                log::warn!(
                    "[loadstone] completion for '{}' without an in-flight record",
                    completion.name
                );
                InflightFetch {
                    demand: 1,
                    is_manifest: completion.is_manifest,
                }
            }
        };
        Some(DrainedCompletion { completion, record })
    }

    /// True while any fetch for the name is outstanding.
    pub fn is_inflight(&self, name: &str) -> bool {
        self.local_inflight.contains_key(name) || self.remote_inflight.contains_key(name)
    }

    /// Number of outstanding fetches across both slots.
    pub fn inflight_count(&self) -> usize {
        self.local_inflight.len() + self.remote_inflight.len()
    }
}
