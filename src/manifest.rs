//! Load/save the assertion manifest.
//!
//! The manifest is a single pretty-printed JSON document meant to be checked
//! into version control between extraction runs, so writes are atomic: a
//! concurrent reader sees either the old manifest or the new one, never a
//! partial file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::model::{AssertionManifest, MANIFEST_VERSION};

/// Deserialize a manifest. Returns `Ok(None)` when nothing has been persisted
/// yet - a normal first-run state; the CLI decides whether that is fatal.
pub fn load(path: &Path) -> Result<Option<AssertionManifest>> {
    if !path.exists() {
        return Ok(None);
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest at {}", path.display()))?;
    let manifest: AssertionManifest = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse manifest at {}", path.display()))?;

    if manifest.version != MANIFEST_VERSION {
        anyhow::bail!(
            "Manifest at {} has version {} but this build expects {}",
            path.display(),
            manifest.version,
            MANIFEST_VERSION
        );
    }

    Ok(Some(manifest))
}

/// Serialize the full manifest, replacing any prior content atomically via a
/// sibling temp file and rename.
pub fn save(manifest: &AssertionManifest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let text = serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, text)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move manifest into place at {}", path.display()))?;

    Ok(())
}
