//! Error types and handling for loadstone
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Fetch-level errors are recorded per concrete bundle name in the registry
//! and surfaced to every current and future caller until an explicit unload
//! clears the record, so the enum is `Clone`: one recorded error may be
//! observed by any number of load operations.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for loadstone operations
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum LoadstoneError {
    /// Artifact absent at the chosen source, with no fallback configured or
    /// the fallback failed as well.
    #[error("Bundle '{name}' not found: {reason}")]
    #[diagnostic(
        code(loadstone::fetch::not_found),
        help("Check the local root, remote URL and the configured load mode")
    )]
    NotFound { name: String, reason: String },

    /// Remote content did not match the manifest's content token.
    #[error("Bundle '{name}' failed content validation: expected {expected}, got {actual}")]
    #[diagnostic(
        code(loadstone::fetch::validation_failed),
        help("The remote artifact is stale or corrupt; rebuild or republish the bundle")
    )]
    ValidationFailed {
        name: String,
        expected: String,
        actual: String,
    },

    /// Remote fetch failed at the transport level.
    #[error("Failed downloading bundle '{name}' from {url}: {reason}")]
    #[diagnostic(code(loadstone::fetch::remote_failed))]
    RemoteFetchFailed {
        name: String,
        url: String,
        reason: String,
    },

    /// A bundle's own fetch succeeded but one of its recorded dependencies is
    /// in error; the bundle is reported not-ready, never silently usable.
    #[error("Bundle '{name}' is unusable: dependency '{dependency}' failed: {reason}")]
    #[diagnostic(code(loadstone::registry::dependency_failed))]
    DependencyFailed {
        name: String,
        dependency: String,
        reason: String,
    },

    /// A load was requested before any manifest was established.
    #[error("No manifest loaded; bundle '{name}' cannot be resolved")]
    #[diagnostic(
        code(loadstone::manifest::uninitialized),
        help("Call BundleSession::initialize() and poll the returned operation to completion first")
    )]
    ManifestUninitialized { name: String },

    /// The fetched payload could not be parsed as a bundle archive.
    #[error("'{name}' is not a valid bundle archive: {reason}")]
    #[diagnostic(code(loadstone::archive::malformed))]
    MalformedArchive { name: String, reason: String },

    /// The fetched manifest payload could not be parsed.
    #[error("Manifest '{name}' could not be parsed: {reason}")]
    #[diagnostic(code(loadstone::manifest::malformed))]
    MalformedManifest { name: String, reason: String },

    /// Asset materialization found nothing matching the request.
    #[error("There is no asset named '{asset}' in '{bundle}' with type {type_tag}")]
    #[diagnostic(code(loadstone::asset::not_found))]
    AssetNotFound {
        bundle: String,
        asset: String,
        type_tag: String,
    },

    /// Level activation could not find the requested level in the bundle.
    #[error("There is no level named '{level}' in '{bundle}'")]
    #[diagnostic(code(loadstone::level::not_found))]
    LevelNotFound { bundle: String, level: String },
}

impl LoadstoneError {
    /// Short constructor for the common not-found case.
    pub fn not_found(name: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadstoneError::NotFound {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for loadstone operations
pub type Result<T> = std::result::Result<T, LoadstoneError>;
