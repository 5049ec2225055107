//! Fixture seeding through the product's own API.
//!
//! Before a run, the deployment must hold a known admin account, an
//! organization, a site, and an enrollment key. Everything here is idempotent:
//! registration falls back to login, and existing resources are reused rather
//! than duplicated. The seeded identifiers become the environment context
//! every assertion reads.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Settings;

/// Flat string-keyed map threaded into every assertion's execution. Built
/// once per run; executors get a read-only view, so no assertion can leak
/// state into a later one.
#[derive(Debug, Clone, Default)]
pub struct EnvContext {
    values: BTreeMap<String, String>,
}

impl EnvContext {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .with_context(|| format!("Environment context is missing '{}'", key))
    }

    /// Build a context from known pairs; used by `seed` and by tests.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        EnvContext {
            values: pairs.into_iter().collect(),
        }
    }
}

/// Client for the product API used during seeding.
pub struct FixtureClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    tokens: Option<AuthTokens>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthTokens {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Site {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollmentKey {
    key: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl FixtureClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client for fixture seeding")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Register the admin account, falling back to login when it already
    /// exists. Returns the bearer token.
    pub fn register_or_login(&self, email: &str, password: &str) -> Result<String> {
        let url = format!("{}/auth/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RegisterRequest {
                email,
                password,
                name: "Docs Conformance Admin",
            })
            .send()
            .with_context(|| format!("Product API unreachable at {}", url))?;

        if response.status().is_success() {
            if let Ok(auth) = response.json::<AuthResponse>() {
                if let Some(tokens) = auth.tokens {
                    return Ok(tokens.access_token);
                }
            }
        }

        // Account already exists (or registration is closed) - log in.
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .with_context(|| format!("Product API unreachable at {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Login failed for {}: {}", email, error_text(response));
        }
        let auth: AuthResponse = response.json().context("Login returned unexpected JSON")?;
        auth.tokens
            .map(|t| t.access_token)
            .context("Login response carried no tokens")
    }

    /// Return the first organization, creating one when none exist.
    pub fn ensure_organization(&self, token: &str) -> Result<String> {
        let url = format!("{}/organizations", self.base_url);
        let response = self.client.get(&url).bearer_auth(token).send()?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to list organizations: {}", error_text(response));
        }

        let existing: Vec<Organization> =
            parse_collection(&response.text()?, "organizations")?;
        if let Some(org) = existing.into_iter().next() {
            return Ok(org.id);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({"name": "Docs Conformance"}))
            .send()?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to create organization: {}", error_text(response));
        }
        let org: Organization = response
            .json()
            .context("Create-organization returned unexpected JSON")?;
        Ok(org.id)
    }

    /// Return the first site in the organization, creating one when absent.
    pub fn ensure_site(&self, token: &str, org_id: &str) -> Result<String> {
        let url = format!("{}/sites?organizationId={}", self.base_url, org_id);
        let response = self.client.get(&url).bearer_auth(token).send()?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to list sites: {}", error_text(response));
        }

        let existing: Vec<Site> = parse_collection(&response.text()?, "sites")?;
        if let Some(site) = existing.into_iter().next() {
            return Ok(site.id);
        }

        let url = format!("{}/sites", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "name": "Docs Conformance Site",
                "organizationId": org_id,
            }))
            .send()?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to create site: {}", error_text(response));
        }
        let site: Site = response.json().context("Create-site returned unexpected JSON")?;
        Ok(site.id)
    }

    /// Mint an enrollment key for the site using the bootstrap secret.
    pub fn mint_enrollment_key(&self, token: &str, site_id: &str, secret: &str) -> Result<String> {
        let url = format!("{}/enrollment/keys", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "siteId": site_id,
                "secret": secret,
            }))
            .send()?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to mint enrollment key: {}", error_text(response));
        }
        let key: EnrollmentKey = response
            .json()
            .context("Enrollment-key response carried no key")?;
        Ok(key.key)
    }
}

/// Seed the deployment and build the run's environment context.
pub fn seed(settings: &Settings) -> Result<EnvContext> {
    let client = FixtureClient::new(&settings.api_url)?;

    let token = client
        .register_or_login(&settings.admin_email, &settings.admin_password)
        .context("Fixture seeding could not authenticate")?;
    let org_id = client.ensure_organization(&token)?;
    let site_id = client.ensure_site(&token, &org_id)?;
    let enrollment_key =
        client.mint_enrollment_key(&token, &site_id, &settings.enrollment_secret)?;

    println!("Seeded fixtures: org {} site {}", org_id, site_id);

    Ok(EnvContext::from_pairs([
        ("org_id".to_string(), org_id),
        ("site_id".to_string(), site_id),
        ("enrollment_key".to_string(), enrollment_key),
        ("admin_email".to_string(), settings.admin_email.clone()),
        ("admin_password".to_string(), settings.admin_password.clone()),
        ("auth_token".to_string(), token),
    ]))
}

/// The API returns collections either as a bare array or wrapped in an
/// object keyed by resource name; accept both.
fn parse_collection<T: DeserializeOwned>(body: &str, key: &str) -> Result<Vec<T>> {
    if body.is_empty() || body == "null" {
        return Ok(Vec::new());
    }
    if let Ok(items) = serde_json::from_str::<Vec<T>>(body) {
        return Ok(items);
    }
    let value: serde_json::Value =
        serde_json::from_str(body).context("Collection response is not JSON")?;
    match value.get(key) {
        Some(inner) => serde_json::from_value(inner.clone())
            .with_context(|| format!("Unexpected shape for '{}' collection", key)),
        None => anyhow::bail!("Response carries neither an array nor a '{}' field", key),
    }
}

fn error_text(response: reqwest::blocking::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>() {
        Ok(err) => format!("{} ({})", err.error, status),
        Err(_) => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_lookup() {
        let ctx = EnvContext::from_pairs([
            ("org_id".to_string(), "org-1".to_string()),
            ("auth_token".to_string(), "tok".to_string()),
        ]);
        assert_eq!(ctx.get("org_id"), Some("org-1"));
        assert_eq!(ctx.get("missing"), None);
        assert_eq!(ctx.require("auth_token").unwrap(), "tok");
        assert!(ctx.require("site_id").is_err());
    }

    #[test]
    fn test_parse_collection_accepts_bare_array() {
        let orgs: Vec<Organization> =
            parse_collection(r#"[{"id": "org-1"}, {"id": "org-2"}]"#, "organizations").unwrap();
        assert_eq!(orgs.len(), 2);
        assert_eq!(orgs[0].id, "org-1");
    }

    #[test]
    fn test_parse_collection_accepts_wrapped_object() {
        let orgs: Vec<Organization> =
            parse_collection(r#"{"organizations": [{"id": "org-9"}]}"#, "organizations").unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].id, "org-9");
    }

    #[test]
    fn test_parse_collection_handles_null_body() {
        let orgs: Vec<Organization> = parse_collection("null", "organizations").unwrap();
        assert!(orgs.is_empty());
    }

    #[test]
    fn test_parse_collection_rejects_foreign_shape() {
        let result: Result<Vec<Organization>> = parse_collection(r#"{"data": []}"#, "organizations");
        assert!(result.is_err());
    }
}
