//! Reelhouse command-line entry point.

mod commands;
mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commands::search::Lookup;
use reelhouse_core::{AppConfig, ExternalId};
use reelhouse_pipeline::SweepKind;
use reelhouse_sources::FeedKind;
use state::AppContext;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "reelhouse")]
#[command(about = "Media catalog ingestion and enrichment pipeline")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a discovery feed through the pipeline
    Fetch {
        /// Feed to run
        #[arg(value_enum)]
        feed: FeedArg,
        /// Pages to fetch (defaults to the configured count)
        #[arg(long)]
        pages: Option<u32>,
    },
    /// Enrich one item by title or id
    Search {
        /// Title to resolve through the master index
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        title: Option<String>,
        /// External id
        #[arg(long)]
        id: Option<ExternalId>,
    },
    /// Refresh one field group across the catalog
    Sweep {
        /// availability, recommendations, rating or secondary-rating
        kind: SweepKind,
        /// Only process the first N records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Add an id to the ban list
    Ban {
        /// External id to ban
        #[arg(conflicts_with = "title", required_unless_present = "title")]
        id: Option<ExternalId>,
        /// Title to resolve through the master index
        #[arg(long)]
        title: Option<String>,
    },
    /// Run every scheduled job that is due
    RunDue,
    /// Show the job schedule
    Jobs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FeedArg {
    Popular,
    NowPlaying,
    Discover,
}

impl From<FeedArg> for FeedKind {
    fn from(arg: FeedArg) -> Self {
        match arg {
            FeedArg::Popular => FeedKind::Popular,
            FeedArg::NowPlaying => FeedKind::NowPlaying,
            FeedArg::Discover => FeedKind::Discover,
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reelhouse=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!("Starting Reelhouse v{}", env!("CARGO_PKG_VERSION"));

    let config =
        AppConfig::load_with_env(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Ban { id, title } => {
            let lookup = match (title, id) {
                (Some(title), _) => Lookup::Title(title),
                (None, Some(id)) => Lookup::Id(id),
                (None, None) => anyhow::bail!("either an id or --title is required"),
            };
            commands::ban::run(&config, lookup)?;
        }
        Commands::Jobs => commands::schedule::list(&config)?,
        Commands::Fetch { feed, pages } => {
            let ctx = AppContext::init(config).await?;
            commands::fetch::run(&ctx, feed.into(), pages).await?;
        }
        Commands::Search { title, id } => {
            let lookup = match (title, id) {
                (Some(title), _) => Lookup::Title(title),
                (None, Some(id)) => Lookup::Id(id),
                (None, None) => anyhow::bail!("either --title or --id is required"),
            };
            let ctx = AppContext::init(config).await?;
            commands::search::run(&ctx, lookup).await?;
        }
        Commands::Sweep { kind, limit } => {
            let ctx = AppContext::init(config).await?;
            commands::sweep::run(&ctx, kind, limit).await?;
        }
        Commands::RunDue => {
            let ctx = AppContext::init(config).await?;
            commands::schedule::run_due(&ctx).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["reelhouse", "fetch", "now-playing", "--pages", "3"])
            .expect("parse fetch");
        match cli.command {
            Commands::Fetch { feed, pages } => {
                assert_eq!(FeedKind::from(feed), FeedKind::NowPlaying);
                assert_eq!(pages, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sweep_and_ban() {
        let cli = Cli::try_parse_from(["reelhouse", "sweep", "secondary-rating", "--limit", "10"])
            .expect("parse sweep");
        assert!(matches!(
            cli.command,
            Commands::Sweep {
                kind: SweepKind::SecondaryRating,
                limit: Some(10)
            }
        ));

        assert!(Cli::try_parse_from(["reelhouse", "ban", "0"]).is_err());
        assert!(Cli::try_parse_from(["reelhouse", "sweep", "everything"]).is_err());
    }

    #[test]
    fn test_parse_ban_by_id_or_title() {
        let cli = Cli::try_parse_from(["reelhouse", "ban", "42"]).expect("parse ban by id");
        assert!(matches!(cli.command, Commands::Ban { id: Some(_), title: None }));

        let cli = Cli::try_parse_from(["reelhouse", "ban", "--title", "Dune"])
            .expect("parse ban by title");
        match cli.command {
            Commands::Ban { id, title } => {
                assert_eq!(id, None);
                assert_eq!(title.as_deref(), Some("Dune"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["reelhouse", "ban"]).is_err());
        assert!(Cli::try_parse_from(["reelhouse", "ban", "42", "--title", "Dune"]).is_err());
    }

    #[test]
    fn test_search_requires_title_or_id() {
        assert!(Cli::try_parse_from(["reelhouse", "search"]).is_err());
        assert!(Cli::try_parse_from(["reelhouse", "search", "--title", "Dune", "--id", "42"]).is_err());

        let cli = Cli::try_parse_from(["reelhouse", "search", "--id", "42"]).expect("parse search");
        assert!(matches!(cli.command, Commands::Search { title: None, id: Some(_) }));
    }
}
