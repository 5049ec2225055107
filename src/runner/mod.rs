//! Assertion runner: filters the manifest, threads the environment context
//! through every claim, dispatches each by kind, and aggregates results.
//!
//! Execution is single-threaded and sequential on purpose. The target is a
//! shared staging deployment with seeded fixtures; two assertions racing
//! (say, both logging in as the seeded admin) would make results depend on
//! interleaving, so the runner avoids concurrency rather than managing it.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Instant;

pub mod browser;
pub mod executors;

use crate::extract::service::ClaimExtractor;
use crate::fixtures::EnvContext;
use crate::model::{Assertion, AssertionManifest, AssertionResult, Kind, RunReport, Status, TestSpec};
use browser::BrowserSession;
use executors::api::ApiExecutor;

pub struct RunOptions {
    pub api_url: String,
    pub ui_url: String,
    pub db_path: PathBuf,
    pub webdriver_url: String,
    pub page_filter: Option<String>,
    pub kind_filter: Option<Kind>,
    pub ctx: EnvContext,
}

/// Flatten the manifest into the ordered assertion sequence a run executes:
/// manifest page order, then within-page order, with the page-substring and
/// kind filters applied. Pure, so selection is reproducible run-over-run.
pub fn select_assertions<'a>(
    manifest: &'a AssertionManifest,
    page_filter: Option<&str>,
    kind_filter: Option<Kind>,
) -> Vec<&'a Assertion> {
    manifest
        .pages
        .iter()
        .filter(|page| page_filter.map_or(true, |f| page.source.contains(f)))
        .flat_map(|page| page.assertions.iter())
        .filter(|assertion| kind_filter.map_or(true, |k| assertion.kind() == k))
        .collect()
}

/// Execute every selected assertion in order and aggregate the outcomes.
///
/// A browser session is acquired only when at least one UI assertion is
/// selected, and its release is guaranteed by RAII around the whole dispatch
/// loop. An executor returning `Err` becomes an `error` result; the loop
/// never short-circuits.
pub fn run(
    manifest: &AssertionManifest,
    options: &RunOptions,
    extractor: &dyn ClaimExtractor,
) -> Result<RunReport> {
    let started_at = Utc::now();

    let selected = select_assertions(
        manifest,
        options.page_filter.as_deref(),
        options.kind_filter,
    );
    println!(
        "Running {} of {} assertions",
        selected.len(),
        manifest.assertion_count()
    );

    let api = ApiExecutor::new(&options.api_url)?;

    let mut session = if selected.iter().any(|a| a.kind() == Kind::Ui) {
        Some(BrowserSession::start(&options.webdriver_url)?)
    } else {
        None
    };

    let mut results = Vec::with_capacity(selected.len());
    for assertion in selected {
        let clock = Instant::now();
        let mut result = dispatch(assertion, &api, options, session.as_mut(), extractor)
            .unwrap_or_else(|err| {
                executors::outcome(assertion, Status::Error, format!("{:#}", err))
            });
        result.duration_ms = clock.elapsed().as_millis() as u64;

        print_progress(&result);
        results.push(result);
    }

    if let Some(session) = session.as_mut() {
        if let Err(err) = session.close() {
            eprintln!("[warn] browser session close failed: {:#}", err);
        }
    }

    Ok(RunReport::from_results(started_at, Utc::now(), results))
}

fn dispatch(
    assertion: &Assertion,
    api: &ApiExecutor,
    options: &RunOptions,
    session: Option<&mut BrowserSession>,
    extractor: &dyn ClaimExtractor,
) -> Result<AssertionResult> {
    match &assertion.spec {
        TestSpec::Api(test) => api.execute(assertion, test, &options.ctx),
        TestSpec::Sql(test) => executors::sql::execute(assertion, test, &options.db_path, extractor),
        TestSpec::Ui(test) => {
            let session = session.context("No browser session for a ui assertion")?;
            executors::ui::execute(assertion, test, &options.ui_url, &options.ctx, session, extractor)
        }
    }
}

fn print_progress(result: &AssertionResult) {
    let status = match result.status {
        Status::Pass => "pass".green(),
        Status::Fail => "fail".red(),
        Status::Skip => "skip".yellow(),
        Status::Error => "error".red().bold(),
    };
    println!(
        "[{}] {} {} ({} ms)",
        status,
        result.id,
        truncate(&result.claim, 60),
        result.duration_ms
    );
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::service::Verdict;
    use crate::model::{
        ApiExpect, ApiTest, AssertionManifest, PageAssertions, Severity, SqlTest,
    };

    struct FailingExtractor;

    impl ClaimExtractor for FailingExtractor {
        fn extract_assertions(&self, _s: &str, _t: &str) -> Result<Vec<Assertion>> {
            anyhow::bail!("not used")
        }

        fn resolve_query(&self, _description: &str) -> Result<String> {
            anyhow::bail!("resolver exploded")
        }

        fn verdict(&self, _i: &str, _e: &str) -> Result<Verdict> {
            anyhow::bail!("not used")
        }
    }

    fn api_assertion(id: &str) -> Assertion {
        Assertion {
            id: id.to_string(),
            claim: format!("claim {}", id),
            severity: Severity::Info,
            spec: TestSpec::Api(ApiTest {
                method: "GET".to_string(),
                path: "/health".to_string(),
                body: None,
                headers: None,
                auth: false,
                expect: ApiExpect {
                    status: Some(200),
                    ..Default::default()
                },
            }),
        }
    }

    fn sql_assertion(id: &str) -> Assertion {
        Assertion {
            id: id.to_string(),
            claim: format!("claim {}", id),
            severity: Severity::Info,
            spec: TestSpec::Sql(SqlTest {
                query: "anything".to_string(),
                expect: "anything".to_string(),
            }),
        }
    }

    fn two_page_manifest() -> AssertionManifest {
        let mut manifest = AssertionManifest::new();
        manifest.pages.push(PageAssertions {
            source: "agents/intro.mdx".to_string(),
            content_hash: "sha256:a".to_string(),
            assertions: vec![api_assertion("a-1"), sql_assertion("a-2")],
        });
        manifest.pages.push(PageAssertions {
            source: "guides/alerts.md".to_string(),
            content_hash: "sha256:b".to_string(),
            assertions: vec![sql_assertion("b-1")],
        });
        manifest
    }

    fn options() -> RunOptions {
        RunOptions {
            api_url: "http://127.0.0.1:1/api/v1".to_string(),
            ui_url: "http://127.0.0.1:1".to_string(),
            db_path: PathBuf::from("/nonexistent/breeze.db"),
            // Unroutable on purpose: acquiring a browser here would fail the
            // run, which is how the no-ui-no-browser tests detect acquisition.
            webdriver_url: "http://127.0.0.1:1".to_string(),
            page_filter: None,
            kind_filter: None,
            ctx: EnvContext::default(),
        }
    }

    #[test]
    fn test_selection_preserves_manifest_order() {
        let manifest = two_page_manifest();
        let selected = select_assertions(&manifest, None, None);
        let ids: Vec<&str> = selected.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a-1", "a-2", "b-1"]);

        // Same inputs, same selection.
        let again: Vec<&str> = select_assertions(&manifest, None, None)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn test_selection_filters_by_page_and_kind() {
        let manifest = two_page_manifest();

        let by_page = select_assertions(&manifest, Some("agents"), None);
        assert_eq!(by_page.len(), 2);

        let by_kind = select_assertions(&manifest, None, Some(Kind::Sql));
        let ids: Vec<&str> = by_kind.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a-2", "b-1"]);

        let both = select_assertions(&manifest, Some("guides"), Some(Kind::Api));
        assert!(both.is_empty());
    }

    #[test]
    fn test_executor_failure_does_not_short_circuit() -> Result<()> {
        let mut manifest = AssertionManifest::new();
        manifest.pages.push(PageAssertions {
            source: "agents/intro.mdx".to_string(),
            content_hash: "sha256:a".to_string(),
            assertions: vec![sql_assertion("s-1"), sql_assertion("s-2"), sql_assertion("s-3")],
        });

        let report = run(&manifest, &options(), &FailingExtractor)?;

        assert_eq!(report.total, 3);
        assert_eq!(report.errors, 3);
        assert!(report
            .results
            .iter()
            .all(|r| r.status == Status::Error && r.reason.contains("resolver exploded")));
        assert!(!report.is_success());
        Ok(())
    }

    #[test]
    fn test_no_ui_assertions_means_no_browser() -> Result<()> {
        let mut manifest = AssertionManifest::new();
        manifest.pages.push(PageAssertions {
            source: "agents/intro.mdx".to_string(),
            content_hash: "sha256:a".to_string(),
            assertions: vec![sql_assertion("s-1")],
        });

        // webdriver_url is unroutable, so this returning Ok proves no
        // session acquisition was attempted.
        let report = run(&manifest, &options(), &FailingExtractor)?;
        assert_eq!(report.total, 1);
        Ok(())
    }

    #[test]
    fn test_kind_filter_excludes_ui_so_no_browser_needed() -> Result<()> {
        let mut manifest = two_page_manifest();
        manifest.pages[0].assertions.push(Assertion {
            id: "ui-1".to_string(),
            claim: "dashboard renders".to_string(),
            severity: Severity::Info,
            spec: TestSpec::Ui(crate::model::UiTest {
                navigate: "/".to_string(),
                setup: vec![],
                verify: "a device count is visible".to_string(),
            }),
        });

        let mut opts = options();
        opts.kind_filter = Some(Kind::Sql);
        let report = run(&manifest, &opts, &FailingExtractor)?;
        assert_eq!(report.total, 2);
        assert!(report.results.iter().all(|r| r.kind == Kind::Sql));
        Ok(())
    }

    #[test]
    fn test_aggregate_invariant_holds() -> Result<()> {
        let report = run(&two_page_manifest(), &options(), &FailingExtractor)?;
        assert_eq!(
            report.total,
            report.passed + report.failed + report.skipped + report.errors
        );
        assert_eq!(report.total, report.results.len());
        Ok(())
    }
}
