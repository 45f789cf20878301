//! Local filesystem source
//!
//! Reads bundle archives from the session's local root, falling back to the
//! packaged internal root when the file is absent locally. Reads happen on a
//! detached worker thread per request; multiple local reads may be in flight
//! at once.

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::Sender;

use crate::error::LoadstoneError;

use super::{ArtifactSource, FetchCompletion, FetchRequest};

/// Fetches bundle artifacts from disk.
#[derive(Debug, Clone)]
pub struct LocalSource {
    local_root: PathBuf,
    internal_root: Option<PathBuf>,
}

impl LocalSource {
    pub fn new(local_root: PathBuf, internal_root: Option<PathBuf>) -> Self {
        LocalSource {
            local_root,
            internal_root,
        }
    }

    /// Pick the path a request resolves to.
    ///
    /// `internal_only` pins the packaged root. Otherwise the local root is
    /// preferred, with the internal root as the fallback for files that were
    /// never synced locally.
    fn resolve_path(&self, request: &FetchRequest) -> Option<PathBuf> {
        if request.internal_only {
            return self
                .internal_root
                .as_ref()
                .map(|root| root.join(&request.name));
        }

        let local = self.local_root.join(&request.name);
        if local.is_file() {
            return Some(local);
        }

        match &self.internal_root {
            Some(root) => Some(root.join(&request.name)),
            // Keep the missing local path so the error names it.
            None => Some(local),
        }
    }
}

impl ArtifactSource for LocalSource {
    fn submit(&mut self, request: FetchRequest, completions: &Sender<FetchCompletion>) {
        let Some(path) = self.resolve_path(&request) else {
            let err = LoadstoneError::not_found(
                &request.name,
                "internal-only load with no internal root configured",
            );
            let _ = completions.send(FetchCompletion::of(&request, Err(err)));
            return;
        };

        let completions = completions.clone();
        thread::spawn(move || {
            let payload = read_artifact(&request.name, &path);
            let _ = completions.send(FetchCompletion::of(&request, payload));
        });
    }
}

fn read_artifact(name: &str, path: &Path) -> Result<Vec<u8>, LoadstoneError> {
    std::fs::read(path).map_err(|e| {
        LoadstoneError::not_found(name, format!("{} is not readable: {e}", path.display()))
    })
}
