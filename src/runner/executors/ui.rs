//! UI executor: drives the shared browser session to the assertion's
//! navigation target, applies its setup steps, and delegates the
//! verification instruction to the service verdict over the rendered page
//! text.

use anyhow::Result;
use serde_json::json;
use std::time::Duration;

use crate::extract::service::ClaimExtractor;
use crate::fixtures::EnvContext;
use crate::model::{Assertion, AssertionResult, Status, UiTest};
use crate::runner::browser::BrowserSession;

use super::outcome;

/// Structured setup steps the executor knows how to perform. Anything else
/// is reported as a skip rather than guessed at.
#[derive(Debug, PartialEq)]
enum SetupStep {
    Click(String),
    Fill(String, String),
    Wait(u64),
}

pub fn execute(
    assertion: &Assertion,
    test: &UiTest,
    ui_url: &str,
    ctx: &EnvContext,
    browser: &mut BrowserSession,
    extractor: &dyn ClaimExtractor,
) -> Result<AssertionResult> {
    let url = format!("{}{}", ui_url.trim_end_matches('/'), test.navigate);
    browser.navigate(&url)?;

    // The Breeze UI reads its auth tokens from localStorage on load, so set
    // them and navigate again (original flow: register via API, inject
    // tokens, then crawl authenticated pages).
    if let Some(token) = ctx.get("auth_token") {
        browser.execute(
            "window.localStorage.setItem('auth-token', arguments[0]);",
            vec![json!(token)],
        )?;
        browser.navigate(&url)?;
    }

    for step in &test.setup {
        match parse_step(step) {
            Some(SetupStep::Click(css)) => browser.click(&css)?,
            Some(SetupStep::Fill(css, value)) => browser.fill(&css, &value)?,
            Some(SetupStep::Wait(ms)) => std::thread::sleep(Duration::from_millis(ms)),
            None => {
                return Ok(outcome(
                    assertion,
                    Status::Skip,
                    format!("unsupported setup step: {}", step),
                ))
            }
        }
    }

    let page_text = browser.page_text()?;
    let verdict = extractor.verdict(&test.verify, &page_text)?;

    Ok(if verdict.pass {
        outcome(assertion, Status::Pass, "")
    } else {
        outcome(assertion, Status::Fail, verdict.reason)
    })
}

fn parse_step(step: &str) -> Option<SetupStep> {
    let step = step.trim();
    if let Some(css) = step.strip_prefix("click ") {
        let css = css.trim();
        if css.is_empty() {
            return None;
        }
        return Some(SetupStep::Click(css.to_string()));
    }
    if let Some(rest) = step.strip_prefix("fill ") {
        let (css, value) = rest.trim().split_once(' ')?;
        return Some(SetupStep::Fill(css.to_string(), value.trim().to_string()));
    }
    if let Some(ms) = step.strip_prefix("wait ") {
        return ms.trim().parse().ok().map(SetupStep::Wait);
    }
    None
}
