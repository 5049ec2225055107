use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Documentation scope directories under the docs root. Pages outside these
/// are not extracted.
pub const DEFAULT_SCOPES: &[&str] = &["agents", "guides", "reference"];

/// One documentation source page: a stable identifier and where it lives.
#[derive(Debug, Clone)]
pub struct DocPage {
    /// Root-relative path with `/` separators; the manifest key.
    pub source: String,
    pub path: PathBuf,
}

/// Enumerate documentation pages under the scope directories, in
/// directory-then-filename order. Recomputed each call; stable for an
/// unchanged filesystem so content-hash comparisons line up across runs.
pub fn list_pages(docs_root: &Path, scopes: &[&str]) -> Result<Vec<DocPage>> {
    if !docs_root.is_dir() {
        anyhow::bail!("Docs directory not found at {}", docs_root.display());
    }

    let mut pages = Vec::new();

    for scope in scopes {
        let scope_dir = docs_root.join(scope);
        if !scope_dir.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&scope_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                if e.file_type().is_dir() {
                    if let Some(name) = e.file_name().to_str() {
                        return !name.starts_with('.') && name != "node_modules";
                    }
                }
                true
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_doc_file(entry.path()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(docs_root)
                .unwrap_or(entry.path());
            let source = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            pages.push(DocPage {
                source,
                path: entry.path().to_owned(),
            });
        }
    }

    // Sort by source so ordering never depends on walk order
    pages.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(pages)
}

fn is_doc_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("mdx")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_pages_finds_docs_in_scope_order() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path();

        fs::create_dir_all(root.join("guides"))?;
        fs::create_dir_all(root.join("agents"))?;
        fs::write(root.join("guides/alerts.md"), "# Alerts")?;
        fs::write(root.join("agents/intro.mdx"), "# Agents")?;
        fs::write(root.join("agents/enroll.md"), "# Enrollment")?;

        let pages = list_pages(root, DEFAULT_SCOPES)?;

        let sources: Vec<&str> = pages.iter().map(|p| p.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["agents/enroll.md", "agents/intro.mdx", "guides/alerts.md"]
        );
        Ok(())
    }

    #[test]
    fn test_list_pages_ignores_out_of_scope_and_non_docs() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path();

        fs::create_dir_all(root.join("agents"))?;
        fs::create_dir_all(root.join("internal"))?;
        fs::write(root.join("agents/intro.md"), "# Agents")?;
        fs::write(root.join("agents/diagram.png"), [0u8; 4])?;
        fs::write(root.join("internal/notes.md"), "# Not in scope")?;
        fs::write(root.join("README.md"), "# Root readme")?;

        let pages = list_pages(root, DEFAULT_SCOPES)?;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source, "agents/intro.md");
        Ok(())
    }

    #[test]
    fn test_list_pages_skips_hidden_directories() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path();

        fs::create_dir_all(root.join("guides/.drafts"))?;
        fs::write(root.join("guides/.drafts/wip.md"), "# Draft")?;
        fs::write(root.join("guides/done.md"), "# Done")?;

        let pages = list_pages(root, &["guides"])?;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source, "guides/done.md");
        Ok(())
    }

    #[test]
    fn test_list_pages_stable_across_calls() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path();
        fs::create_dir_all(root.join("reference"))?;
        for name in ["zeta.md", "alpha.md", "midway.mdx"] {
            fs::write(root.join("reference").join(name), "content")?;
        }

        let first: Vec<String> = list_pages(root, DEFAULT_SCOPES)?
            .into_iter()
            .map(|p| p.source)
            .collect();
        let second: Vec<String> = list_pages(root, DEFAULT_SCOPES)?
            .into_iter()
            .map(|p| p.source)
            .collect();
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_missing_docs_root_is_an_error() {
        let result = list_pages(Path::new("/nonexistent/docs"), DEFAULT_SCOPES);
        assert!(result.is_err());
    }
}
