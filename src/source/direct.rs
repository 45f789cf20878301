//! Direct development source (simulation)
//!
//! Bypasses real archive fetching and reads loose assets straight out of a
//! development asset directory: one subdirectory per logical bundle, one
//! file per asset. Installed into *both* source slots when simulation is
//! configured, so the loader, registry and operations behave exactly as in
//! production while the content comes from the working tree.
//!
//! Synthesized artifacts use the `dev` variant tag; the synthesized manifest
//! declares `<dir>.dev` for every bundle directory, records no dependencies
//! and no content tokens.

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use walkdir::WalkDir;

use crate::archive::{AssetBlob, BundleArchive};
use crate::error::{LoadstoneError, Result};
use crate::manifest::Manifest;

use super::{ArtifactSource, FetchCompletion, FetchRequest};

/// Variant tag of every synthesized development artifact.
pub const DEV_VARIANT: &str = "dev";

/// Type tag assigned to asset files with no extension.
const UNTYPED_TAG: &str = "binary";

/// Reads loose assets from a development directory.
#[derive(Debug, Clone)]
pub struct DirectSource {
    root: PathBuf,
}

impl DirectSource {
    pub fn new(root: PathBuf) -> Self {
        DirectSource { root }
    }

    fn synthesize_manifest(&self) -> Result<Vec<u8>> {
        let mut bundles = Vec::new();
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            LoadstoneError::not_found(
                "manifest",
                format!("simulation root {} is not readable: {e}", self.root.display()),
            )
        })?;

        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    bundles.push(format!("{name}.{DEV_VARIANT}"));
                }
            }
        }
        bundles.sort();

        Manifest {
            bundles,
            ..Manifest::default()
        }
        .to_payload()
    }

    fn synthesize_archive(&self, concrete_name: &str) -> Result<Vec<u8>> {
        // "ui.dev" reads from "<root>/ui"; simulation ignores variants.
        let stem = concrete_name
            .split_once('.')
            .map_or(concrete_name, |(stem, _)| stem);
        let dir = self.root.join(stem);
        if !dir.is_dir() {
            return Err(LoadstoneError::not_found(
                concrete_name,
                format!("no development bundle directory at {}", dir.display()),
            ));
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Some(blob) = read_blob(concrete_name, entry.path())? {
                assets.push(blob);
            }
        }

        BundleArchive {
            name: concrete_name.to_string(),
            assets,
        }
        .to_payload()
    }
}

fn read_blob(concrete_name: &str, path: &Path) -> Result<Option<AssetBlob>> {
    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let type_tag = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or(UNTYPED_TAG);
    let data = std::fs::read(path).map_err(|e| {
        LoadstoneError::not_found(
            concrete_name,
            format!("{} is not readable: {e}", path.display()),
        )
    })?;
    Ok(Some(AssetBlob {
        name: name.to_string(),
        type_tag: type_tag.to_string(),
        data,
    }))
}

impl ArtifactSource for DirectSource {
    fn submit(&mut self, request: FetchRequest, completions: &Sender<FetchCompletion>) {
        // Synchronous by design: the completion is still observed on the
        // next tick, so operation pacing matches the real sources.
        let payload = if request.is_manifest {
            self.synthesize_manifest()
        } else {
            self.synthesize_archive(&request.name)
        };
        let _ = completions.send(FetchCompletion::of(&request, payload));
    }
}
