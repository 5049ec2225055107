//! Runtime settings, collected from environment variables with defaults that
//! match a local development deployment of Breeze.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Product REST API, e.g. `http://localhost:3001/api/v1`.
    pub api_url: String,
    /// Admin UI served by the web frontend.
    pub ui_url: String,
    /// SQLite database file backing the dev deployment.
    pub db_path: PathBuf,
    /// Admin credentials used for fixture login/registration.
    pub admin_email: String,
    pub admin_password: String,
    /// Bootstrap secret allowed to mint enrollment keys.
    pub enrollment_secret: String,
    /// OpenAI-compatible endpoint of the extraction service.
    pub extractor_url: String,
    pub extractor_model: String,
    /// WebDriver endpoint (chromedriver) for UI assertions.
    pub webdriver_url: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            api_url: env_or("BREEZE_API_URL", "http://localhost:3001/api/v1"),
            ui_url: env_or("BREEZE_UI_URL", "http://localhost:4321"),
            db_path: PathBuf::from(env_or("BREEZE_DB", "data/breeze.db")),
            admin_email: env_or("BREEZE_ADMIN_EMAIL", "docs-admin@example.com"),
            admin_password: env_or("BREEZE_ADMIN_PASSWORD", "TestPassword123!"),
            enrollment_secret: env_or("BREEZE_ENROLLMENT_SECRET", "dev-enrollment-secret"),
            extractor_url: env_or("DOCCHECK_EXTRACTOR_URL", "http://localhost:11434"),
            extractor_model: env_or("DOCCHECK_EXTRACTOR_MODEL", "qwen2.5-coder:14b"),
            webdriver_url: env_or("DOCCHECK_WEBDRIVER_URL", "http://localhost:9515"),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}
