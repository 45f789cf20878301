//! Runtime asset-bundle loading for tick-driven applications.
//!
//! `loadstone` orchestrates the full lifecycle of content bundles: a
//! manifest describes the available artifacts, logical names resolve to
//! concrete variants, dependencies are fetched alongside their parents, and
//! everything resident is reference counted so balanced load/unload pairs
//! always return the cache to empty.
//!
//! The entry point is [`BundleSession`]: configure it, `initialize()` to
//! install the manifest, request assets or levels, and call `tick()` once
//! per frame to drain fetch completions and poll the in-progress
//! operations.
//!
//! ```no_run
//! use loadstone::{BundleSession, SessionConfig};
//!
//! let mut session = BundleSession::new(SessionConfig::default());
//! let init = session.initialize();
//! while !init.is_done() {
//!     session.tick();
//! }
//!
//! let handle = session.load_asset("characters", Some("hero"), None);
//! while session.tick() > 0 {}
//! if let Some(asset) = handle.asset() {
//!     println!("{} bytes of {}", asset.data.len(), asset.type_tag);
//! }
//! session.unload("characters");
//! ```
//!
//! Fetching happens on worker threads, but all scheduling state lives on
//! the thread that owns the session; completions cross back over a channel
//! and are observed on the next tick.

pub mod activation;
pub mod archive;
pub mod config;
pub mod error;
pub mod hash;
pub mod loader;
pub mod manifest;
pub mod operation;
pub mod registry;
pub mod session;
pub mod source;
pub mod variant;

pub use activation::{ImmediateActivator, LevelActivation, SceneActivator};
pub use archive::{AssetBlob, BundleArchive};
pub use config::{LoadMode, LogMode, SessionConfig, platform_name};
pub use error::{LoadstoneError, Result};
pub use manifest::{Manifest, ManifestIndex};
pub use operation::{AssetLoadHandle, LevelLoadHandle, ManifestLoadHandle};
pub use registry::{LoadedBundle, Release, Residency};
pub use session::BundleSession;
pub use source::{ArtifactSource, DirectSource, FetchCompletion, FetchOrigin, FetchRequest};
pub use variant::{VariantDiagnostic, resolve as resolve_variant};
