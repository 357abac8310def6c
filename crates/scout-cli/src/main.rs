//! # scout
//!
//! Command-line access to the libraries.io package-metadata API.
//!
//! Every query prints the response envelope as JSON on stdout; logs and
//! human-readable errors go to stderr.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use scout_core::error::{ScoutError, ScoutResult};
use scout_registry::api::RepositoryHost;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Query package metadata from the libraries.io registry
#[derive(Parser, Debug)]
#[command(name = "scout", version, about = "Query package metadata from libraries.io")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Read configuration from this file instead of the nearest scout.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Registry API key
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Override a configuration key
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,

    /// Give up on the query after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Print single-line JSON
    #[arg(long, global = true)]
    pub compact: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Query(QueryCommand),
    /// Show the resolved configuration
    Config,
}

/// Page selection for list endpoints
#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Results per page (at most 100)
    #[arg(long, default_value_t = 30)]
    pub per_page: u32,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// List supported package managers
    Platforms,
    /// Show a package and its versions
    Project { platform: String, name: String },
    /// Show dependencies of a package version
    Deps {
        platform: String,
        name: String,
        /// Version to inspect (latest when omitted)
        version: Option<String>,
    },
    /// List packages depending on a package
    Dependents {
        platform: String,
        name: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List repositories depending on a package
    DependentRepos {
        platform: String,
        name: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List contributors to a package
    Contributors {
        platform: String,
        name: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show the SourceRank breakdown of a package
    Sourcerank { platform: String, name: String },
    /// Search packages
    Search {
        /// Search term
        #[arg(default_value = "")]
        query: String,
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        licenses: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        /// Sort order, e.g. stars or dependents_count
        #[arg(long)]
        sort: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a repository
    Repo { host: RepositoryHost, url: String },
    /// List packages published from a repository
    RepoProjects {
        host: RepositoryHost,
        url: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a user or organisation
    User { host: RepositoryHost, login: String },
    /// List repositories of a user or organisation
    UserRepos {
        host: RepositoryHost,
        login: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List packages of a user or organisation
    UserProjects {
        host: RepositoryHost,
        login: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.global.verbose, cli.global.log_json);
    setup_panic_handler();

    debug!("Starting scout v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{}", ErrorFormatter::new().format_error(&err));
            ExitCode::from(2)
        }
    }
}

/// Returns whether the command succeeded; `Err` is reserved for setup failures
fn run_cli(cli: Cli) -> ScoutResult<bool> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| ScoutError::io("Failed to create async runtime".to_string(), e))?;

    rt.block_on(async {
        let ctx = CommandContext::load(&cli.global).await?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SCOUT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "scout={level},scout_registry={level},scout_config={level},scout_core={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("scout encountered an unexpected error: {}", panic_info);
        eprintln!("scout crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/scout-rs/scout/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
