//! Extraction coordinator: walks the documentation scope, content-hashes each
//! page, and re-derives assertions only for pages whose bytes changed.
//!
//! Content hashing (not mtimes) is the whole incrementality mechanism: it
//! keeps repeated runs cheap and claim ids stable. The accepted limitation is
//! that a claim whose meaning changed without changing bytes is not
//! re-extracted.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fs;

pub mod discovery;
pub mod service;

use crate::model::{AssertionManifest, PageAssertions};
use discovery::DocPage;
use service::ClaimExtractor;

/// Digest of a page's raw text, prefixed with the algorithm name.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Build a fresh manifest over `pages`.
///
/// In incremental mode a page whose hash matches the prior manifest is reused
/// verbatim without invoking the extraction service. A page whose extraction
/// fails is logged and recorded with an empty assertion list; an unreadable
/// page is logged and left out entirely, since there is no hash to compare
/// next run. Neither aborts the batch. Pages not matching `page_filter` carry
/// their prior entry forward unchanged so a filtered extract never drops the
/// rest of the manifest.
pub fn extract(
    pages: &[DocPage],
    prior: Option<&AssertionManifest>,
    incremental: bool,
    page_filter: Option<&str>,
    extractor: &dyn ClaimExtractor,
) -> Result<AssertionManifest> {
    let mut manifest = AssertionManifest::new();
    let mut reused = 0usize;
    let mut extracted = 0usize;
    let mut failed = 0usize;

    for page in pages {
        if let Some(filter) = page_filter {
            if !page.source.contains(filter) {
                if let Some(prev) = prior.and_then(|m| m.page(&page.source)) {
                    manifest.pages.push(prev.clone());
                }
                continue;
            }
        }

        let text = match fs::read_to_string(&page.path) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("[warn] {}: unreadable ({})", page.source, err);
                failed += 1;
                continue;
            }
        };

        let hash = content_hash(&text);

        if incremental {
            if let Some(prev) = prior.and_then(|m| m.page(&page.source)) {
                if prev.content_hash == hash {
                    println!("[skip] {} (unchanged)", page.source);
                    manifest.pages.push(prev.clone());
                    reused += 1;
                    continue;
                }
            }
        }

        match extractor.extract_assertions(&page.source, &text) {
            Ok(assertions) => {
                println!("[extract] {} ({} assertions)", page.source, assertions.len());
                manifest.pages.push(PageAssertions {
                    source: page.source.clone(),
                    content_hash: hash,
                    assertions,
                });
                extracted += 1;
            }
            Err(err) => {
                eprintln!("[warn] {}: extraction failed ({:#})", page.source, err);
                manifest.pages.push(PageAssertions {
                    source: page.source.clone(),
                    content_hash: hash,
                    assertions: Vec::new(),
                });
                failed += 1;
            }
        }
    }

    println!(
        "Extraction complete: {} extracted, {} unchanged, {} failed, {} assertions total",
        extracted,
        reused,
        failed,
        manifest.assertion_count()
    );

    Ok(manifest)
}
