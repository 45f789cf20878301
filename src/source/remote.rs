//! Remote endpoint source
//!
//! Downloads bundle artifacts from the configured base URL on a detached
//! worker thread per request. Non-manifest payloads are validated against
//! the manifest's content token before the completion is reported; manifest
//! artifacts are always fetched fresh and never validated, since no prior
//! manifest exists to supply a token.
//!
//! No timeout is applied: a hung fetch surfaces as an operation whose
//! progress never advances, which is the collaborating transport's concern.

use std::thread;

use crossbeam_channel::Sender;

use crate::error::LoadstoneError;
use crate::hash;

use super::{ArtifactSource, FetchCompletion, FetchRequest};

/// Fetches bundle artifacts over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    base_url: Option<String>,
}

impl RemoteSource {
    /// `base_url` is the endpoint root without a trailing slash; `None`
    /// makes every fetch fail terminally, which pure local modes rely on.
    pub fn new(base_url: Option<String>) -> Self {
        RemoteSource { base_url }
    }
}

impl ArtifactSource for RemoteSource {
    fn submit(&mut self, request: FetchRequest, completions: &Sender<FetchCompletion>) {
        let Some(base) = &self.base_url else {
            let err = LoadstoneError::RemoteFetchFailed {
                name: request.name.clone(),
                url: "<unset>".to_string(),
                reason: "no remote URL configured".to_string(),
            };
            let _ = completions.send(FetchCompletion::of(&request, Err(err)));
            return;
        };

        let url = format!("{base}/{}", request.name);
        let completions = completions.clone();
        thread::spawn(move || {
            let payload = download(&request, &url);
            let _ = completions.send(FetchCompletion::of(&request, payload));
        });
    }
}

fn download(request: &FetchRequest, url: &str) -> Result<Vec<u8>, LoadstoneError> {
    let remote_error = |reason: String| LoadstoneError::RemoteFetchFailed {
        name: request.name.clone(),
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .build()
        .map_err(|e| remote_error(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| remote_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(remote_error(format!("server returned {status}")));
    }

    let bytes = response
        .bytes()
        .map_err(|e| remote_error(e.to_string()))?
        .to_vec();

    if !request.is_manifest {
        if let Some(expected) = &request.expected_token {
            if !hash::matches_token(&bytes, expected) {
                return Err(LoadstoneError::ValidationFailed {
                    name: request.name.clone(),
                    expected: expected.clone(),
                    actual: hash::content_token(&bytes),
                });
            }
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FetchOrigin;
    use crossbeam_channel::unbounded;

    fn request(name: &str, expected_token: Option<String>, is_manifest: bool) -> FetchRequest {
        FetchRequest {
            name: name.to_string(),
            origin: FetchOrigin::Remote,
            is_manifest,
            expected_token,
            internal_only: false,
        }
    }

    #[test]
    fn test_downloads_artifact() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/ui.sd")
            .with_status(200)
            .with_body(b"payload")
            .create();

        let mut source = RemoteSource::new(Some(server.url()));
        let (tx, rx) = unbounded();
        source.submit(request("ui.sd", None, false), &tx);

        let completion = rx.recv().expect("completion");
        assert_eq!(completion.payload.expect("payload"), b"payload");
        mock.assert();
    }

    #[test]
    fn test_validates_content_token() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/ui.sd")
            .with_status(200)
            .with_body(b"tampered")
            .create();

        let expected = hash::content_token(b"original");
        let mut source = RemoteSource::new(Some(server.url()));
        let (tx, rx) = unbounded();
        source.submit(request("ui.sd", Some(expected), false), &tx);

        let completion = rx.recv().expect("completion");
        assert!(matches!(
            completion.payload,
            Err(LoadstoneError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_manifest_fetch_skips_validation() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/StandaloneLinux")
            .with_status(200)
            .with_body(b"{}")
            .create();

        // A token is supplied but must be ignored for manifest artifacts.
        let stale = hash::content_token(b"something else");
        let mut source = RemoteSource::new(Some(server.url()));
        let (tx, rx) = unbounded();
        source.submit(request("StandaloneLinux", Some(stale), true), &tx);

        let completion = rx.recv().expect("completion");
        assert!(completion.payload.is_ok());
    }

    #[test]
    fn test_http_error_is_terminal() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/ui.sd").with_status(404).create();

        let mut source = RemoteSource::new(Some(server.url()));
        let (tx, rx) = unbounded();
        source.submit(request("ui.sd", None, false), &tx);

        let completion = rx.recv().expect("completion");
        assert!(matches!(
            completion.payload,
            Err(LoadstoneError::RemoteFetchFailed { .. })
        ));
    }

    #[test]
    fn test_unconfigured_url_fails_without_spawning() {
        let mut source = RemoteSource::new(None);
        let (tx, rx) = unbounded();
        source.submit(request("ui.sd", None, false), &tx);

        let completion = rx.recv().expect("completion");
        assert!(matches!(
            completion.payload,
            Err(LoadstoneError::RemoteFetchFailed { .. })
        ));
    }
}
