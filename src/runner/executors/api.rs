//! API executor: issues the HTTP call an assertion describes and checks the
//! response against its expectations.

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::time::Duration;

use crate::fixtures::EnvContext;
use crate::model::{ApiExpect, ApiTest, Assertion, AssertionResult, Status};

use super::outcome;

pub struct ApiExecutor {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ApiExecutor {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client for API assertions")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn execute(
        &self,
        assertion: &Assertion,
        test: &ApiTest,
        ctx: &EnvContext,
    ) -> Result<AssertionResult> {
        let method = Method::from_bytes(test.method.to_uppercase().as_bytes())
            .with_context(|| format!("Invalid HTTP method '{}'", test.method))?;
        let url = format!("{}{}", self.base_url, test.path);

        let mut request = self.client.request(method, &url);
        if test.auth {
            if let Some(token) = ctx.get("auth_token") {
                request = request.bearer_auth(token);
            }
        }
        if let Some(headers) = &test.headers {
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }
        if let Some(body) = &test.body {
            request = request.json(body);
        }

        // Transport failures propagate as Err and surface as `error`, not
        // `fail` - the product was never actually exercised.
        let response = request
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().unwrap_or_default();

        Ok(match check_expectations(&test.expect, status, &content_type, &body) {
            Some(reason) => outcome(assertion, Status::Fail, reason),
            None => outcome(assertion, Status::Pass, ""),
        })
    }
}

/// First unmet expectation, checked in a fixed order: status, content type,
/// required substrings, forbidden substrings.
fn check_expectations(
    expect: &ApiExpect,
    status: u16,
    content_type: &str,
    body: &str,
) -> Option<String> {
    if let Some(expected) = expect.status {
        if status != expected {
            return Some(format!("expected status {}, got {}", expected, status));
        }
    }

    if let Some(expected) = &expect.content_type {
        if !content_type.starts_with(expected.as_str()) {
            return Some(format!(
                "expected content-type '{}', got '{}'",
                expected, content_type
            ));
        }
    }

    for needle in &expect.body_contains {
        if !body.contains(needle) {
            return Some(format!("response body missing '{}'", needle));
        }
    }

    for needle in &expect.body_not_contains {
        if body.contains(needle) {
            return Some(format!("response body contains forbidden '{}'", needle));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect() -> ApiExpect {
        ApiExpect {
            status: Some(200),
            body_contains: vec!["devices".to_string()],
            body_not_contains: vec!["error".to_string()],
            content_type: Some("application/json".to_string()),
        }
    }

    #[test]
    fn test_all_expectations_met() {
        let result = check_expectations(
            &expect(),
            200,
            "application/json; charset=utf-8",
            r#"{"devices": []}"#,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_status_mismatch_reported_first() {
        let result = check_expectations(&expect(), 500, "text/html", "error");
        assert_eq!(result.unwrap(), "expected status 200, got 500");
    }

    #[test]
    fn test_content_type_prefix_match() {
        let result = check_expectations(&expect(), 200, "text/html", r#"{"devices": []}"#);
        assert!(result.unwrap().contains("content-type"));
    }

    #[test]
    fn test_missing_required_substring() {
        let result = check_expectations(&expect(), 200, "application/json", "{}");
        assert_eq!(result.unwrap(), "response body missing 'devices'");
    }

    #[test]
    fn test_forbidden_substring_present() {
        let result = check_expectations(
            &expect(),
            200,
            "application/json",
            r#"{"devices": [], "error": null}"#,
        );
        assert_eq!(result.unwrap(), "response body contains forbidden 'error'");
    }

    #[test]
    fn test_empty_expectations_always_pass() {
        let result = check_expectations(&ApiExpect::default(), 500, "", "anything");
        assert_eq!(result, None);
    }
}
