use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use doccheck::model::Kind;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Documentation conformance testing for Breeze", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract assertions from documentation into the manifest
    Extract {
        /// Only re-extract pages whose content hash changed
        #[arg(long)]
        incremental: bool,

        /// Only process pages whose source path contains this substring
        #[arg(long)]
        page: Option<String>,

        /// Documentation root directory
        #[arg(long, default_value = "docs")]
        docs_dir: PathBuf,

        /// Manifest location
        #[arg(long, default_value = "assertions.json")]
        manifest: PathBuf,
    },

    /// Run the manifest's assertions against a live deployment
    Run {
        /// Only run assertions from pages whose source contains this substring
        #[arg(long)]
        page: Option<String>,

        /// Only run assertions of this kind
        #[arg(long = "type", value_enum)]
        kind: Option<Kind>,

        /// Manifest location
        #[arg(long, default_value = "assertions.json")]
        manifest: PathBuf,

        /// Directory for report.json and report.html
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,
    },

    /// Extract then run
    All {
        /// Only re-extract pages whose content hash changed
        #[arg(long)]
        incremental: bool,

        /// Page-substring filter applied to both extraction and the run
        #[arg(long)]
        page: Option<String>,

        /// Only run assertions of this kind
        #[arg(long = "type", value_enum)]
        kind: Option<Kind>,

        /// Documentation root directory
        #[arg(long, default_value = "docs")]
        docs_dir: PathBuf,

        /// Manifest location
        #[arg(long, default_value = "assertions.json")]
        manifest: PathBuf,

        /// Directory for report.json and report.html
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            incremental,
            page,
            docs_dir,
            manifest,
        } => {
            commands::extract::execute(incremental, page.as_deref(), &docs_dir, &manifest)?;
        }
        Commands::Run {
            page,
            kind,
            manifest,
            report_dir,
        } => {
            let exit_code = commands::run::execute(page.as_deref(), kind, &manifest, &report_dir)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Commands::All {
            incremental,
            page,
            kind,
            docs_dir,
            manifest,
            report_dir,
        } => {
            commands::extract::execute(incremental, page.as_deref(), &docs_dir, &manifest)?;
            let exit_code = commands::run::execute(page.as_deref(), kind, &manifest, &report_dir)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
