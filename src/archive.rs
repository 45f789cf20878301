//! Bundle archive format
//!
//! A bundle archive is the opaque payload a fetch produces: a set of named
//! assets, each with a type tag and raw bytes. Archives are serialized as
//! JSON so pipeline output stays inspectable with standard tooling.
//!
//! The manifest artifact is not an archive on the wire; the session wraps the
//! raw manifest payload into a synthetic single-asset archive so that manifest
//! loading is a true specialization of asset loading.

use serde::{Deserialize, Serialize};

use crate::error::{LoadstoneError, Result};

/// Asset name under which a wrapped manifest payload is stored.
pub const MANIFEST_ASSET: &str = "AssetBundleManifest";

/// Type tag of a wrapped manifest payload.
pub const MANIFEST_TYPE_TAG: &str = "manifest";

/// One named asset inside a bundle archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBlob {
    /// Asset name, unique within the archive.
    pub name: String,

    /// Producer-assigned type tag ("texture", "audio", "level", ...).
    pub type_tag: String,

    /// Raw asset bytes. Deserialization is a consumer concern.
    pub data: Vec<u8>,
}

impl AssetBlob {
    /// True when this blob satisfies an optional type filter.
    fn matches_type(&self, type_tag: Option<&str>) -> bool {
        type_tag.is_none_or(|tag| self.type_tag == tag)
    }
}

/// A materialized bundle archive: the in-memory bundle handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleArchive {
    /// Concrete bundle name the producer baked in.
    pub name: String,

    /// Assets in producer order.
    pub assets: Vec<AssetBlob>,
}

impl BundleArchive {
    /// Parse an archive out of a fetched payload.
    pub fn from_payload(concrete_name: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| LoadstoneError::MalformedArchive {
            name: concrete_name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialize the archive into its wire payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LoadstoneError::MalformedArchive {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Wrap a raw manifest payload into a synthetic one-asset archive.
    pub fn wrap_manifest(concrete_name: &str, payload: Vec<u8>) -> Self {
        BundleArchive {
            name: concrete_name.to_string(),
            assets: vec![AssetBlob {
                name: MANIFEST_ASSET.to_string(),
                type_tag: MANIFEST_TYPE_TAG.to_string(),
                data: payload,
            }],
        }
    }

    /// Look up a single asset by name, optionally filtered by type tag.
    pub fn find(&self, asset_name: &str, type_tag: Option<&str>) -> Option<&AssetBlob> {
        self.assets
            .iter()
            .find(|blob| blob.name == asset_name && blob.matches_type(type_tag))
    }

    /// All assets matching an optional type filter, in producer order.
    pub fn all(&self, type_tag: Option<&str>) -> Vec<&AssetBlob> {
        self.assets
            .iter()
            .filter(|blob| blob.matches_type(type_tag))
            .collect()
    }

    /// True when the archive contains an asset with the given name.
    pub fn contains(&self, asset_name: &str) -> bool {
        self.find(asset_name, None).is_some()
    }
}
