use anyhow::Result;
use std::fs;
use std::path::Path;

use doccheck::config::Settings;
use doccheck::extract::service::ExtractionClient;
use doccheck::model::Kind;
use doccheck::runner::{self, RunOptions};
use doccheck::{fixtures, manifest, report};

/// Load the manifest, seed fixtures, execute the selected assertions, and
/// write both report artifacts. Returns the process exit code: nonzero when
/// any assertion failed or errored, zero otherwise (skips never count).
pub fn execute(
    page_filter: Option<&str>,
    kind_filter: Option<Kind>,
    manifest_path: &Path,
    report_dir: &Path,
) -> Result<i32> {
    // Fatal before any seeding or browser work: nothing to run.
    let Some(manifest) = manifest::load(manifest_path)? else {
        anyhow::bail!(
            "No manifest at {} - run 'doccheck extract' first",
            manifest_path.display()
        );
    };

    let settings = Settings::from_env();
    let ctx = fixtures::seed(&settings)?;
    let extractor = ExtractionClient::new(&settings.extractor_url, &settings.extractor_model)?;

    let options = RunOptions {
        api_url: settings.api_url.clone(),
        ui_url: settings.ui_url.clone(),
        db_path: settings.db_path.clone(),
        webdriver_url: settings.webdriver_url.clone(),
        page_filter: page_filter.map(str::to_string),
        kind_filter,
        ctx,
    };

    let run_report = runner::run(&manifest, &options, &extractor)?;
    report::print_summary(&run_report);

    fs::create_dir_all(report_dir)?;
    let json_path = report_dir.join("report.json");
    let html_path = report_dir.join("report.html");
    report::save_json(&run_report, &json_path)?;
    report::save_html(&run_report, &html_path)?;
    println!(
        "Reports written to {} and {}",
        json_path.display(),
        html_path.display()
    );

    Ok(if run_report.is_success() { 0 } else { 1 })
}
