//! Shared assertion vocabulary: claims extracted from documentation, their
//! kind-specific test definitions, and the outcomes a run produces.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current manifest format version. Bump when the serialized shape changes.
pub const MANIFEST_VERSION: u32 = 1;

/// How much a documented claim matters. Reported, never affects execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Execution strategy selector, also the CLI `--type` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Api,
    Sql,
    Ui,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Api => write!(f, "api"),
            Kind::Sql => write!(f, "sql"),
            Kind::Ui => write!(f, "ui"),
        }
    }
}

/// Kind-specific test definition. Adjacently tagged so the manifest carries
/// `"kind": "api", "test": {...}` and a sql assertion can never smuggle an
/// api-shaped payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "test", rename_all = "lowercase")]
pub enum TestSpec {
    Api(ApiTest),
    Sql(SqlTest),
    Ui(UiTest),
}

impl TestSpec {
    pub fn kind(&self) -> Kind {
        match self {
            TestSpec::Api(_) => Kind::Api,
            TestSpec::Sql(_) => Kind::Sql,
            TestSpec::Ui(_) => Kind::Ui,
        }
    }
}

/// An HTTP call against the product API plus expectations on the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTest {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Send the seeded bearer token. Defaults to true; claims about
    /// unauthenticated behavior set this to false.
    #[serde(default = "default_auth")]
    pub auth: bool,
    pub expect: ApiExpect,
}

fn default_auth() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiExpect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_not_contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// An informal query description and expected-result description. The
/// extraction service resolves the description to a concrete SELECT; the
/// executor only carries the claim through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTest {
    pub query: String,
    pub expect: String,
}

/// A navigation target, structured setup steps, and a natural-language
/// verification instruction evaluated over the rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTest {
    pub navigate: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<String>,
    pub verify: String,
}

/// One testable claim extracted from a documentation page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    pub id: String,
    pub claim: String,
    pub severity: Severity,
    #[serde(flatten)]
    pub spec: TestSpec,
}

impl Assertion {
    pub fn kind(&self) -> Kind {
        self.spec.kind()
    }
}

/// One documentation page's extraction result. If two extraction runs observe
/// the same `content_hash` for the same `source`, the prior assertion list is
/// reused unchanged - that contract keeps assertion ids stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAssertions {
    pub source: String,
    pub content_hash: String,
    pub assertions: Vec<Assertion>,
}

/// The durable root persisted between extraction runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionManifest {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub pages: Vec<PageAssertions>,
}

impl AssertionManifest {
    pub fn new() -> Self {
        AssertionManifest {
            version: MANIFEST_VERSION,
            generated_at: Utc::now(),
            pages: Vec::new(),
        }
    }

    /// Look up a page's prior extraction result by source path.
    pub fn page(&self, source: &str) -> Option<&PageAssertions> {
        self.pages.iter().find(|p| p.source == source)
    }

    pub fn assertion_count(&self) -> usize {
        self.pages.iter().map(|p| p.assertions.len()).sum()
    }
}

impl Default for AssertionManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome status for one executed assertion.
///
/// `Error` means the executor itself broke (network failure, parse failure) -
/// a harness problem, not a product regression, so it is kept distinct from
/// `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Skip,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "pass"),
            Status::Fail => write!(f, "fail"),
            Status::Skip => write!(f, "skip"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// One executed outcome. Carries the claim text so reports are
/// self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub id: String,
    pub kind: Kind,
    pub claim: String,
    pub status: Status,
    /// Free text, empty on pass.
    pub reason: String,
    pub duration_ms: u64,
}

/// Aggregate of a single run. `total` always equals the sum of the per-status
/// counts and the length of `results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub results: Vec<AssertionResult>,
}

impl RunReport {
    /// Build a report by counting statuses, so the aggregate invariant holds
    /// by construction.
    pub fn from_results(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        results: Vec<AssertionResult>,
    ) -> Self {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut errors = 0;
        for result in &results {
            match result.status {
                Status::Pass => passed += 1,
                Status::Fail => failed += 1,
                Status::Skip => skipped += 1,
                Status::Error => errors += 1,
            }
        }
        RunReport {
            started_at,
            completed_at,
            total: results.len(),
            passed,
            failed,
            skipped,
            errors,
            results,
        }
    }

    /// Percentage of assertions that passed, over the whole run.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total as f64 * 100.0
    }

    /// Exit-code contract: failures and errors make the run unsuccessful,
    /// skips never do.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}
