use crate::identity::DEFAULT_IDENTITY_PAGES;
use crate::remote::github::DEFAULT_API_URL;
use crate::sources::DEFAULT_MAX_PAGES;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gtally")]
#[command(about = "Lifetime contribution ledger (lines and images) across git repositories")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, env = "GH_USER", help = "Username whose contributions are tallied")]
    pub user: Option<String>,

    #[arg(long, env = "GH_TOKEN", hide_env_values = true, help = "API token (optional, raises rate limits)")]
    pub token: Option<String>,

    #[arg(long, default_value = DEFAULT_API_URL, help = "Hosting API base URL")]
    pub api_url: String,

    #[arg(long, default_value = "stats_cache", help = "Directory holding one cache document per repository")]
    pub cache_dir: PathBuf,

    #[arg(long, default_value = "identities.json", help = "File holding learned author identities")]
    pub identity_file: PathBuf,

    #[arg(long, default_value = "info", help = "Log level: error, warn, info, debug or trace")]
    pub log_level: String,
}

impl CommonArgs {
    pub fn require_user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No user given: pass --user or set GH_USER"))
    }
}

#[derive(Args, Clone)]
pub struct RunArgs {
    #[arg(required = true, help = "Repositories as OWNER/REPO[@BRANCH]")]
    pub targets: Vec<String>,

    #[arg(long, help = "Directory with local clones at <OWNER>/<REPO>")]
    pub checkouts: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MAX_PAGES, help = "Maximum commit-listing pages per repository")]
    pub max_pages: u32,

    #[arg(long, default_value_t = DEFAULT_IDENTITY_PAGES, help = "Commit-listing pages used to learn identities")]
    pub identity_pages: u32,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze repositories and print the contribution totals
    Run(RunArgs),
    /// List learned identities
    Identities {
        #[arg(long, help = "Learn from OWNER/REPO before listing")]
        learn: Option<String>,
    },
    /// Delete the cache directory
    ClearCache,
}

fn init_logging(level: &str) {
    let level = match level {
        "error" | "warn" | "info" | "debug" | "trace" => level,
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        init_logging(&self.common.log_level);
        match self.command {
            Commands::Run(args) => crate::run::exec(self.common, args),
            Commands::Identities { learn } => crate::commands::exec_identities(self.common, learn),
            Commands::ClearCache => crate::commands::exec_clear_cache(self.common),
        }
    }
}
