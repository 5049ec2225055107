//! Minimal W3C WebDriver client for the one stateful executor resource.
//!
//! One session is shared by every UI assertion in a run: each assertion gets
//! a fresh navigation but the underlying browser persists, because starting a
//! browser per assertion would dominate the run time. `Drop` deletes the
//! session best-effort so it dies on every control-flow exit, including a
//! defect in the dispatch loop.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

pub struct BrowserSession {
    base_url: String,
    session_id: Option<String>,
    client: reqwest::blocking::Client,
}

impl BrowserSession {
    /// Start a headless Chrome session against a WebDriver endpoint
    /// (chromedriver).
    pub fn start(webdriver_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client for WebDriver")?;

        let base_url = webdriver_url.trim_end_matches('/').to_string();
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--headless=new", "--window-size=1280,900"]
                    }
                }
            }
        });

        let response = client
            .post(format!("{}/session", base_url))
            .json(&capabilities)
            .send()
            .with_context(|| format!("WebDriver unreachable at {}", base_url))?;
        let value = unwrap_value(response).context("Failed to create browser session")?;

        let session_id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .context("WebDriver session response carried no sessionId")?
            .to_string();

        Ok(Self {
            base_url,
            session_id: Some(session_id),
            client,
        })
    }

    fn session_url(&self, suffix: &str) -> Result<String> {
        let id = self
            .session_id
            .as_deref()
            .context("Browser session already closed")?;
        Ok(format!("{}/session/{}{}", self.base_url, id, suffix))
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.session_url("/url")?)
            .json(&json!({ "url": url }))
            .send()
            .with_context(|| format!("Navigation to {} failed", url))?;
        unwrap_value(response)?;
        Ok(())
    }

    /// Run a synchronous script in the page and return its value.
    pub fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        let response = self
            .client
            .post(self.session_url("/execute/sync")?)
            .json(&json!({ "script": script, "args": args }))
            .send()
            .context("Script execution failed")?;
        unwrap_value(response)
    }

    pub fn click(&self, css: &str) -> Result<()> {
        let element_id = self.find_element(css)?;
        let response = self
            .client
            .post(self.session_url(&format!("/element/{}/click", element_id))?)
            .json(&json!({}))
            .send()
            .with_context(|| format!("Click on '{}' failed", css))?;
        unwrap_value(response)?;
        Ok(())
    }

    pub fn fill(&self, css: &str, text: &str) -> Result<()> {
        let element_id = self.find_element(css)?;
        let response = self
            .client
            .post(self.session_url(&format!("/element/{}/value", element_id))?)
            .json(&json!({ "text": text }))
            .send()
            .with_context(|| format!("Typing into '{}' failed", css))?;
        unwrap_value(response)?;
        Ok(())
    }

    /// Visible text of the current page.
    pub fn page_text(&self) -> Result<String> {
        let value = self.execute("return document.body.innerText;", vec![])?;
        value
            .as_str()
            .map(str::to_string)
            .context("Page text script returned a non-string")
    }

    fn find_element(&self, css: &str) -> Result<String> {
        let response = self
            .client
            .post(self.session_url("/element")?)
            .json(&json!({ "using": "css selector", "value": css }))
            .send()
            .with_context(|| format!("Element lookup '{}' failed", css))?;
        let value = unwrap_value(response).with_context(|| format!("No element matches '{}'", css))?;

        // The element id sits under a W3C-reserved key; take the first value
        // rather than hardcoding it.
        value
            .as_object()
            .and_then(|o| o.values().next())
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .context("WebDriver element response carried no id")
    }

    /// Delete the session. Safe to call twice; `Drop` is the backstop.
    pub fn close(&mut self) -> Result<()> {
        if let Some(id) = self.session_id.take() {
            let response = self
                .client
                .delete(format!("{}/session/{}", self.base_url, id))
                .send()
                .context("Failed to delete browser session")?;
            unwrap_value(response)?;
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(id) = self.session_id.take() {
            let _ = self
                .client
                .delete(format!("{}/session/{}", self.base_url, id))
                .send();
        }
    }
}

/// Every WebDriver response is `{"value": ...}`; errors carry
/// `{"value": {"error", "message"}}` with a non-2xx status.
fn unwrap_value(response: reqwest::blocking::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .context("WebDriver returned a non-JSON response")?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown WebDriver error");
        anyhow::bail!("WebDriver error ({}): {}", status, message);
    }

    Ok(value)
}
