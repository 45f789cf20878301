//! Session configuration
//!
//! Everything the session needs to decide where bundles come from: the load
//! mode, the local/internal roots, the remote base URL, the active variant
//! preference order and the log verbosity. A config is plain data; it is
//! normalized once when the session is created.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable consulted when no remote URL is configured.
pub const SERVER_URL_ENV: &str = "LOADSTONE_SERVER_URL";

/// Directory name used for the default local bundle root.
pub const BUNDLES_DIR: &str = "AssetBundles";

/// Where bundle artifacts are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LoadMode {
    /// Packaged data only (the internal root shipped with the application).
    InternalOnly,
    /// Local filesystem root only.
    #[default]
    Local,
    /// Remote endpoint only.
    Remote,
    /// Local first; a failed local read is resubmitted as a remote fetch.
    LocalFirst,
    /// Remote first; a failed remote fetch is resubmitted as a local read.
    RemoteFirst,
}

impl LoadMode {
    /// True when this mode may issue remote fetches.
    pub fn uses_remote(self) -> bool {
        matches!(
            self,
            LoadMode::Remote | LoadMode::LocalFirst | LoadMode::RemoteFirst
        )
    }

    /// True when this mode starts with a local read.
    pub fn starts_local(self) -> bool {
        matches!(
            self,
            LoadMode::InternalOnly | LoadMode::Local | LoadMode::LocalFirst
        )
    }
}

/// Log verbosity for non-error session diagnostics.
///
/// Errors are always logged; everything else is gated on `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogMode {
    #[default]
    All,
    ErrorsOnly,
}

/// Configuration for one [`BundleSession`](crate::session::BundleSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Source selection and fallback behavior.
    pub load_mode: LoadMode,

    /// Verbosity of session diagnostics.
    pub log_mode: LogMode,

    /// Filesystem root for locally synced bundles.
    pub local_root: PathBuf,

    /// Root of the bundle data packaged with the application, used by
    /// `InternalOnly` and as the fallback when a file is absent under
    /// `local_root`.
    pub internal_root: Option<PathBuf>,

    /// Base URL for remote bundle fetches.
    pub remote_url: Option<String>,

    /// Ordered variant preference list, most preferred first.
    pub active_variants: Vec<String>,

    /// When set, both fetch slots read loose assets straight out of this
    /// development directory instead of fetching archives.
    pub simulate_root: Option<PathBuf>,

    /// Upper bound on fetch-completion records drained in a single tick.
    pub completion_budget_per_tick: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            load_mode: LoadMode::default(),
            log_mode: LogMode::default(),
            local_root: default_local_root(),
            internal_root: None,
            remote_url: None,
            active_variants: Vec::new(),
            simulate_root: None,
            completion_budget_per_tick: 16,
        }
    }
}

impl SessionConfig {
    /// Resolve gaps and contradictions before the session starts.
    ///
    /// A remote-capable mode without a remote URL first consults the
    /// `LOADSTONE_SERVER_URL` environment variable; if that is empty too, the
    /// mode is downgraded to `Local` (or `InternalOnly` when only packaged
    /// data exists) and an error is logged. A downgrade never happens
    /// silently.
    pub fn normalized(mut self) -> Self {
        if self.completion_budget_per_tick == 0 {
            self.completion_budget_per_tick = 1;
        }

        if self.load_mode.uses_remote() && self.remote_url.is_none() {
            match env::var(SERVER_URL_ENV) {
                Ok(url) if !url.trim().is_empty() => {
                    self.remote_url = Some(url.trim().to_string());
                }
                _ => {
                    let downgraded = if self.local_root.as_os_str().is_empty() {
                        LoadMode::InternalOnly
                    } else {
                        LoadMode::Local
                    };
                    log::error!(
                        "[loadstone] no remote URL configured for {:?}; downgrading to {:?}",
                        self.load_mode,
                        downgraded
                    );
                    self.load_mode = downgraded;
                }
            }
        }

        if let Some(url) = &mut self.remote_url {
            while url.ends_with('/') {
                url.pop();
            }
        }

        self
    }

    /// Full URL for one concrete artifact on the remote endpoint.
    pub fn remote_artifact_url(&self, concrete_name: &str) -> Option<String> {
        self.remote_url
            .as_ref()
            .map(|base| format!("{base}/{concrete_name}"))
    }

    /// True when non-error diagnostics should be emitted.
    pub fn verbose(&self) -> bool {
        self.log_mode == LogMode::All
    }
}

/// Default local bundle root: the per-user data directory, or a relative
/// `AssetBundles` directory when the platform offers none.
pub fn default_local_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("loadstone").join(BUNDLES_DIR))
        .unwrap_or_else(|| PathBuf::from(BUNDLES_DIR))
}

/// Platform token used to name the manifest artifact, mirroring the
/// platform-named manifest bundle of engine content pipelines.
pub fn platform_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "StandaloneWindows"
    } else if cfg!(target_os = "macos") {
        "StandaloneOSX"
    } else if cfg!(target_os = "android") {
        "Android"
    } else if cfg!(target_os = "ios") {
        "iOS"
    } else if cfg!(target_family = "wasm") {
        "WebGL"
    } else {
        "StandaloneLinux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_local() {
        let config = SessionConfig::default();
        assert_eq!(config.load_mode, LoadMode::Local);
        assert_eq!(config.log_mode, LogMode::All);
        assert!(config.remote_url.is_none());
        assert!(config.completion_budget_per_tick > 0);
    }

    #[test]
    fn test_normalized_downgrades_remote_without_url() {
        // The env var is not set in the test environment.
        let config = SessionConfig {
            load_mode: LoadMode::RemoteFirst,
            remote_url: None,
            ..SessionConfig::default()
        }
        .normalized();
        assert_eq!(config.load_mode, LoadMode::Local);
    }

    #[test]
    fn test_normalized_strips_trailing_slash() {
        let config = SessionConfig {
            load_mode: LoadMode::Remote,
            remote_url: Some("http://cdn.example.com/bundles/".to_string()),
            ..SessionConfig::default()
        }
        .normalized();
        assert_eq!(
            config.remote_artifact_url("ui.sd").as_deref(),
            Some("http://cdn.example.com/bundles/ui.sd")
        );
    }

    #[test]
    fn test_mode_predicates() {
        assert!(LoadMode::LocalFirst.starts_local());
        assert!(LoadMode::LocalFirst.uses_remote());
        assert!(LoadMode::InternalOnly.starts_local());
        assert!(!LoadMode::InternalOnly.uses_remote());
        assert!(!LoadMode::Remote.starts_local());
    }

    #[test]
    fn test_platform_name_is_nonempty() {
        assert!(!platform_name().is_empty());
    }
}
