//! SQL executor: resolves an informal query description to a concrete SELECT
//! through the extraction service, runs it read-only against the
//! deployment's database file, and delegates the expectation check to the
//! service verdict.

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::extract::service::ClaimExtractor;
use crate::model::{Assertion, AssertionResult, SqlTest, Status};

use super::outcome;

/// Rows beyond this are elided from the verdict evidence.
const MAX_EVIDENCE_ROWS: usize = 50;

pub fn execute(
    assertion: &Assertion,
    test: &SqlTest,
    db_path: &Path,
    extractor: &dyn ClaimExtractor,
) -> Result<AssertionResult> {
    let sql = extractor
        .resolve_query(&test.query)
        .with_context(|| format!("Could not resolve query '{}'", test.query))?;
    let sql = sql.trim().trim_end_matches(';').trim().to_string();

    // The resolver is an untrusted model; accept exactly one read-only
    // statement or refuse to touch the database.
    if !is_single_select(&sql) {
        anyhow::bail!("Query resolver produced something other than a single SELECT: {}", sql);
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let rows = run_select(&conn, &sql)?;

    let shown = rows.len().min(MAX_EVIDENCE_ROWS);
    let mut evidence = format!("query: {}\nrows returned: {}\n", sql, rows.len());
    evidence.push_str(&rows[..shown].join("\n"));
    if rows.len() > shown {
        evidence.push_str(&format!("\n({} more rows elided)", rows.len() - shown));
    }

    let verdict = extractor
        .verdict(&test.expect, &evidence)
        .context("Expectation check failed")?;

    Ok(if verdict.pass {
        outcome(assertion, Status::Pass, "")
    } else {
        outcome(assertion, Status::Fail, verdict.reason)
    })
}

fn is_single_select(sql: &str) -> bool {
    let lowered = sql.to_lowercase();
    let starts_ok = lowered.starts_with("select") || lowered.starts_with("with");
    starts_ok && !sql.contains(';')
}

/// Run a SELECT and render each row as `column=value` pairs.
fn run_select(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("Failed to prepare query: {}", sql))?;
    let column_names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rendered = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let fields: Vec<String> = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = row
                    .get::<_, SqlValue>(i)
                    .map(render_value)
                    .unwrap_or_else(|_| "?".to_string());
                format!("{}={}", name, value)
            })
            .collect();
        rendered.push(fields.join(", "));
    }

    Ok(rendered)
}

fn render_value(value: SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s,
        SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::service::Verdict;
    use crate::model::{Severity, TestSpec};
    use tempfile::TempDir;

    struct StubResolver {
        sql: String,
        pass: bool,
    }

    impl ClaimExtractor for StubResolver {
        fn extract_assertions(
            &self,
            _source: &str,
            _text: &str,
        ) -> Result<Vec<Assertion>> {
            unreachable!("sql executor never extracts")
        }

        fn resolve_query(&self, _description: &str) -> Result<String> {
            Ok(self.sql.clone())
        }

        fn verdict(&self, _instruction: &str, evidence: &str) -> Result<Verdict> {
            Ok(Verdict {
                pass: self.pass,
                reason: format!("judged over: {}", evidence.lines().next().unwrap_or("")),
            })
        }
    }

    fn sql_assertion() -> Assertion {
        Assertion {
            id: "db-1".to_string(),
            claim: "Devices are persisted".to_string(),
            severity: Severity::Warning,
            spec: TestSpec::Sql(SqlTest {
                query: "number of devices".to_string(),
                expect: "at least one device".to_string(),
            }),
        }
    }

    fn seeded_db(temp: &TempDir) -> std::path::PathBuf {
        let path = temp.path().join("breeze.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE devices (id INTEGER PRIMARY KEY, hostname TEXT);
             INSERT INTO devices (hostname) VALUES ('alpha'), ('beta');",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_passing_verdict_yields_pass() -> Result<()> {
        let temp = TempDir::new()?;
        let db = seeded_db(&temp);
        let assertion = sql_assertion();
        let stub = StubResolver {
            sql: "SELECT count(*) AS n FROM devices".to_string(),
            pass: true,
        };

        let result = execute(
            &assertion,
            match &assertion.spec {
                TestSpec::Sql(test) => test,
                _ => unreachable!(),
            },
            &db,
            &stub,
        )?;
        assert_eq!(result.status, Status::Pass);
        assert!(result.reason.is_empty());
        Ok(())
    }

    #[test]
    fn test_failing_verdict_yields_fail_with_reason() -> Result<()> {
        let temp = TempDir::new()?;
        let db = seeded_db(&temp);
        let assertion = sql_assertion();
        let stub = StubResolver {
            sql: "SELECT hostname FROM devices ORDER BY hostname".to_string(),
            pass: false,
        };

        let result = execute(
            &assertion,
            match &assertion.spec {
                TestSpec::Sql(test) => test,
                _ => unreachable!(),
            },
            &db,
            &stub,
        )?;
        assert_eq!(result.status, Status::Fail);
        assert!(result.reason.contains("judged over"));
        Ok(())
    }

    #[test]
    fn test_non_select_resolution_is_refused() -> Result<()> {
        let temp = TempDir::new()?;
        let db = seeded_db(&temp);
        let assertion = sql_assertion();
        let stub = StubResolver {
            sql: "DROP TABLE devices".to_string(),
            pass: true,
        };

        let err = execute(
            &assertion,
            match &assertion.spec {
                TestSpec::Sql(test) => test,
                _ => unreachable!(),
            },
            &db,
            &stub,
        )
        .unwrap_err();
        assert!(err.to_string().contains("single SELECT"));

        // The table must still exist.
        let conn = Connection::open(&db)?;
        let count: i64 = conn.query_row("SELECT count(*) FROM devices", [], |r| r.get(0))?;
        assert_eq!(count, 2);
        Ok(())
    }

    #[test]
    fn test_statement_stacking_is_refused() {
        assert!(!is_single_select("SELECT 1; DROP TABLE devices"));
        assert!(is_single_select("SELECT count(*) FROM devices"));
        assert!(is_single_select(
            "WITH recent AS (SELECT * FROM devices) SELECT count(*) FROM recent"
        ));
        assert!(!is_single_select("DELETE FROM devices"));
    }
}
