//! # Repo Readiness CLI (`readiness`)
//!
//! Audits repositories against migration size limits and prints a summary.
//!
//! ## Usage
//!
//! ```bash
//! readiness --config ./config/readiness.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `readiness analyze --team <slug>` | Audit every repository a team can access |
//! | `readiness analyze --repos <name>...` | Audit specific repositories |
//! | `readiness render <file>` | Print the summary of a saved report |
//! | `readiness rules` | List the migration limits |
//! | `readiness org-stats` | Run `gh repo-stats` for the whole org |
//! | `readiness org-summary` | Org and repository inventory via GraphQL |
//! | `readiness completions <shell>` | Generate shell completions |

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use repo_readiness::config::{self, Config};
use repo_readiness::models::Scope;
use repo_readiness::progress::ProgressMode;
use repo_readiness::{audit, org_stats, org_summary, report, rules};

const DEFAULT_CONFIG: &str = "./config/readiness.toml";

/// Repo Readiness: audit git repositories against migration size limits.
#[derive(Parser)]
#[command(
    name = "readiness",
    about = "Audit git repositories against migration-readiness size limits",
    version,
    long_about = "Clones (or reuses) each repository in a team or list, runs git-sizer against it, \
    and checks the results against the hard and advisory limits of the migration target. \
    Results are saved as JSON and summarized on stdout."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/readiness.toml`; built-in defaults apply when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// GitHub connection flags shared by commands that talk to the org.
#[derive(Args)]
struct GithubArgs {
    /// GitHub personal access token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub organization name.
    #[arg(long, env = "GITHUB_ORG")]
    org: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit repositories against the migration limits.
    ///
    /// Repositories already cloned under the base path are reused; missing
    /// ones are cloned first. A repository that cannot be cloned or analyzed
    /// is reported and skipped without stopping the run.
    Analyze {
        /// Team slug whose repositories to analyze.
        #[arg(long, conflicts_with = "repos", required_unless_present = "repos")]
        team: Option<String>,

        /// Repository names to analyze.
        #[arg(long, num_args = 1.., conflicts_with = "team")]
        repos: Vec<String>,

        /// Directory that holds local clones.
        #[arg(long)]
        base_path: Option<PathBuf>,

        /// Output JSON file path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Number of repositories to process at once.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        #[command(flatten)]
        github: GithubArgs,
    },

    /// Print the summary of a previously saved report.
    Render {
        /// Report JSON written by `analyze`.
        path: PathBuf,
    },

    /// List the migration limits that `analyze` checks.
    Rules,

    /// Collect org-wide repository statistics with `gh repo-stats`.
    OrgStats {
        /// Output JSON file path.
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        github: GithubArgs,
    },

    /// Inventory the organization through the GitHub GraphQL API.
    ///
    /// Records org-level counts and, per repository, disk usage, branch
    /// protection, rulesets, pull requests, issues and releases.
    OrgSummary {
        /// Output JSON file path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Leave forked repositories out.
        #[arg(long)]
        skip_forks: bool,

        /// Leave archived repositories out.
        #[arg(long)]
        skip_archived: bool,

        #[command(flatten)]
        github: GithubArgs,
    },

    /// Generate shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(cli_config: &Option<PathBuf>) -> Result<Config> {
    let (path, explicit) = match cli_config {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    config::load_or_default(&path, explicit)
}

fn apply_github(cfg: &mut Config, github: GithubArgs) {
    if github.token.is_some() {
        cfg.github.token = github.token;
    }
    if github.org.is_some() {
        cfg.github.org = github.org;
    }
}

fn print_rules() {
    println!("{:<24} {:<9} {:>12}  DESCRIPTION", "RULE", "SEVERITY", "LIMIT");
    for rule in &rules::MIGRATION_RULES {
        println!(
            "{:<24} {:<9} {:>12}  {}",
            rule.id,
            rule.severity,
            rule.limit_display(),
            rule.description
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "readiness", &mut std::io::stdout());
        }
        Commands::Rules => print_rules(),
        Commands::Render { path } => {
            let saved = report::load(&path)?;
            print!("{}", report::render(&saved));
        }
        Commands::Analyze {
            team,
            repos,
            base_path,
            output,
            concurrency,
            progress,
            github,
        } => {
            let mut cfg = load(&cli.config)?;
            apply_github(&mut cfg, github);
            if let Some(p) = base_path {
                cfg.workspace.base_path = p;
            }
            if let Some(o) = output {
                cfg.report.output = o;
            }
            if let Some(c) = concurrency {
                cfg.analysis.concurrency = c;
            }
            cfg.expand_paths();
            cfg.validate()?;

            let scope = match team {
                Some(team) => Scope::Team(team),
                None => Scope::Repos(repos),
            };
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            audit::run_analyze(&cfg, &scope, Arc::from(mode.reporter())).await?;
        }
        Commands::OrgStats { output, github } => {
            let mut cfg = load(&cli.config)?;
            apply_github(&mut cfg, github);
            if let Some(o) = output {
                cfg.org_stats.output = o;
            }
            cfg.expand_paths();
            cfg.validate()?;
            org_stats::run_org_stats(&cfg).await?;
        }
        Commands::OrgSummary {
            output,
            skip_forks,
            skip_archived,
            github,
        } => {
            let mut cfg = load(&cli.config)?;
            apply_github(&mut cfg, github);
            if let Some(o) = output {
                cfg.org_summary.output = o;
            }
            cfg.org_summary.skip_forks |= skip_forks;
            cfg.org_summary.skip_archived |= skip_archived;
            cfg.expand_paths();
            cfg.validate()?;
            org_summary::run_org_summary(&cfg).await?;
        }
    }

    Ok(())
}
