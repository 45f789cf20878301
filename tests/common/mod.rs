//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crossbeam_channel::Sender;

use loadstone::{
    ArtifactSource, AssetBlob, BundleArchive, BundleSession, FetchCompletion, FetchRequest,
    LoadstoneError, Manifest,
};

/// A source whose completions are released explicitly by the test, so
/// multi-tick orderings are deterministic.
#[derive(Clone, Default)]
pub struct ManualSource {
    inner: Rc<RefCell<Vec<(FetchRequest, Sender<FetchCompletion>)>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        ManualSource::default()
    }

    /// Names currently waiting on this source, in submission order.
    pub fn pending(&self) -> Vec<String> {
        self.inner
            .borrow()
            .iter()
            .map(|(request, _)| request.name.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Complete one pending request. Panics when the name is not pending.
    pub fn complete(&self, name: &str, payload: Result<Vec<u8>, LoadstoneError>) {
        let mut pending = self.inner.borrow_mut();
        let position = pending
            .iter()
            .position(|(request, _)| request.name == name)
            .unwrap_or_else(|| panic!("no pending fetch for '{name}'"));
        let (request, completions) = pending.remove(position);
        completions
            .send(FetchCompletion::of(&request, payload))
            .expect("completion channel open");
    }

    pub fn succeed(&self, name: &str, payload: Vec<u8>) {
        self.complete(name, Ok(payload));
    }

    pub fn fail(&self, name: &str, err: LoadstoneError) {
        self.complete(name, Err(err));
    }
}

impl ArtifactSource for ManualSource {
    fn submit(&mut self, request: FetchRequest, completions: &Sender<FetchCompletion>) {
        self.inner.borrow_mut().push((request, completions.clone()));
    }
}

/// Serialized archive payload with the given (name, type_tag, data) assets.
pub fn archive_payload(name: &str, assets: &[(&str, &str, &[u8])]) -> Vec<u8> {
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

/// Serialized manifest payload.
pub fn manifest_payload(
    bundles: &[&str],
    dependencies: &[(&str, &[&str])],
    hashes: &[(&str, String)],
) -> Vec<u8> {
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
        hashes: hashes
            .iter()
            .map(|(name, token)| (name.to_string(), token.clone()))
            .collect::<HashMap<_, _>>(),
    }
    .to_payload()
    .expect("serializable manifest")
}

/// Tick the session until the condition holds, with a hard iteration cap
/// for suites whose sources run on real worker threads.
pub fn tick_until(session: &mut BundleSession, mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        session.tick();
        if done() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not reached within the polling budget");
}
