use anyhow::Result;
use std::path::Path;

use doccheck::config::Settings;
use doccheck::extract::{self, discovery, service::ExtractionClient};
use doccheck::manifest;

/// Refresh the manifest from the documentation scope. Per-page extraction
/// failures are warnings; only environmental problems (unreadable docs root,
/// unwritable manifest) are fatal.
pub fn execute(
    incremental: bool,
    page_filter: Option<&str>,
    docs_dir: &Path,
    manifest_path: &Path,
) -> Result<()> {
    let settings = Settings::from_env();

    let pages = discovery::list_pages(docs_dir, discovery::DEFAULT_SCOPES)?;
    println!(
        "Found {} documentation pages under {}",
        pages.len(),
        docs_dir.display()
    );

    let prior = manifest::load(manifest_path)?;
    let client = ExtractionClient::new(&settings.extractor_url, &settings.extractor_model)?;

    let fresh = extract::extract(&pages, prior.as_ref(), incremental, page_filter, &client)?;
    manifest::save(&fresh, manifest_path)?;
    println!("Manifest saved to {}", manifest_path.display());

    Ok(())
}
