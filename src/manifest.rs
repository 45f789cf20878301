//! Manifest artifact and its queryable index
//!
//! The manifest is fetched once per session (replacing it unloads the prior
//! one) and describes every concrete bundle artifact: the full name list,
//! direct dependency edges and content-validation tokens. [`ManifestIndex`]
//! wraps a parsed manifest in an `Arc` snapshot and derives the logical-name
//! to variant-tag index used by variant resolution.
//!
//! Replacing the manifest is an atomic swap of the session's `Arc`; anything
//! still holding the old snapshot finishes against consistent data.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LoadstoneError, Result};

/// The manifest artifact as produced by the build pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Every concrete bundle artifact name (`<logical>.<variant>`).
    pub bundles: Vec<String>,

    /// Direct dependency lists, keyed by concrete name.
    #[serde(default)]
    pub dependencies: HashMap<String, Vec<String>>,

    /// Content-validation tokens (`blake3:<hex>`), keyed by concrete name.
    #[serde(default)]
    pub hashes: HashMap<String, String>,
}

impl Manifest {
    /// Parse a manifest out of a fetched payload.
    pub fn from_payload(artifact_name: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| LoadstoneError::MalformedManifest {
            name: artifact_name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialize the manifest into its wire payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LoadstoneError::MalformedManifest {
            name: "manifest".to_string(),
            reason: e.to_string(),
        })
    }
}

/// An immutable manifest snapshot plus derived lookup tables.
#[derive(Debug, Clone)]
pub struct ManifestIndex {
    manifest: Arc<Manifest>,
    /// Logical name → declared variant tags, first-seen order, deduplicated.
    variants: HashMap<String, Vec<String>>,
}

impl ManifestIndex {
    /// Index a parsed manifest.
    ///
    /// Concrete names without a `.variant` suffix cannot participate in
    /// variant resolution; they are skipped with an error log.
    pub fn new(manifest: Manifest) -> Self {
        let mut variants: HashMap<String, Vec<String>> = HashMap::new();

        for concrete in &manifest.bundles {
            match concrete.split_once('.') {
                Some((logical, variant)) if !variant.is_empty() => {
                    let tags = variants.entry(logical.to_string()).or_default();
                    if !tags.iter().any(|tag| tag == variant) {
                        tags.push(variant.to_string());
                    }
                }
                _ => {
                    log::error!("[loadstone] {concrete} has no variant name");
                }
            }
        }

        ManifestIndex {
            manifest: Arc::new(manifest),
            variants,
        }
    }

    /// Direct dependencies of one concrete bundle; empty when unknown.
    pub fn dependencies_of(&self, concrete_name: &str) -> &[String] {
        self.manifest
            .dependencies
            .get(concrete_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Declared variant tags for one logical name; empty when unknown.
    pub fn variants_of(&self, logical_name: &str) -> &[String] {
        self.variants
            .get(logical_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Content-validation token for one concrete bundle, if recorded.
    pub fn content_token(&self, concrete_name: &str) -> Option<&str> {
        self.manifest.hashes.get(concrete_name).map(String::as_str)
    }

    /// Every concrete bundle name known to the manifest.
    pub fn all_bundle_names(&self) -> &[String] {
        &self.manifest.bundles
    }

    /// Every logical name with at least one indexed variant, sorted.
    pub fn logical_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variants.keys().cloned().collect();
        names.sort();
        names
    }

    /// True when the logical name has at least one indexed variant.
    pub fn contains_logical(&self, logical_name: &str) -> bool {
        self.variants.contains_key(logical_name)
    }

    /// The underlying snapshot, shareable with in-flight work.
    pub fn manifest(&self) -> Arc<Manifest> {
        Arc::clone(&self.manifest)
    }
}
