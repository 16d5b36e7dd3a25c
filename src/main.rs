//! # plexbadge CLI
//!
//! The `plexbadge` binary runs the resolution pipeline outside a browser
//! and manages its caches.
//!
//! ## Usage
//!
//! ```bash
//! plexbadge --config ./config/plexbadge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plexbadge init` | Create the SQLite cache database |
//! | `plexbadge resolve` | Resolve a page once against the live services |
//! | `plexbadge url` | Build a provider link from known ids |
//! | `plexbadge cache stats` | Entry counts and ages per cache |
//! | `plexbadge cache cleanup` | Drop expired entries |
//! | `plexbadge cache clear` | Empty one or both caches |
//!
//! Logs go to stderr, filtered by `PLEXBADGE_LOG` (default
//! `plexbadge=info`), so stdout stays clean for scripting.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plexbadge::cache_cmd;
use plexbadge::config::{self, Config};
use plexbadge::models::ResolvedIdentity;
use plexbadge::resolve_cmd::{self, ResolveArgs};
use plexbadge::sqlite_store::SqliteStore;

/// plexbadge — Serializd rating badges for Plex Web.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file is fine for commands that work with defaults.
#[derive(Parser)]
#[command(
    name = "plexbadge",
    about = "plexbadge — Serializd rating badges for Plex Web",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/plexbadge.toml`.
    #[arg(long, global = true, default_value = "./config/plexbadge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the cache database.
    ///
    /// Creates the SQLite file named by `[store].path` and its table.
    /// Running it again is safe.
    Init,

    /// Resolve a page once and print the badge it would get.
    ///
    /// Talks to the Plex server and Serializd directly. Give a title (and
    /// year) for a lookup through the show cache, or a metadata key with
    /// the server it lives on.
    Resolve {
        /// Plex Web URL of the page.
        #[arg(long)]
        href: Option<String>,

        /// Title as shown on the page.
        #[arg(long)]
        title: Option<String>,

        /// Release year as shown on the page.
        #[arg(long)]
        year: Option<u32>,

        /// Metadata key, e.g. `/library/metadata/123`.
        #[arg(long)]
        key: Option<String>,

        /// Server base URL, e.g. `https://10-0-0-2.abc.plex.direct:32400`.
        #[arg(long)]
        server_url: Option<String>,

        /// Plex token.
        #[arg(long)]
        token: Option<String>,
    },

    /// Print the Serializd link for known ids.
    ///
    /// The season segment is only added when both `--season` and
    /// `--season-id` are given; `--episode` needs the season segment.
    Url {
        /// TMDB show id.
        #[arg(long)]
        show: u64,

        /// Season number.
        #[arg(long)]
        season: Option<u32>,

        /// Provider season id.
        #[arg(long)]
        season_id: Option<u64>,

        /// Episode number.
        #[arg(long)]
        episode: Option<u32>,
    },

    /// Inspect and maintain the caches.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Entry counts, expired counts and the newest keys.
    Stats,
    /// Drop expired entries and trim the server cache to capacity.
    Cleanup,
    /// Delete cached entries.
    Clear {
        /// Only this cache: `shows` or `servers`.
        #[arg(long)]
        only: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PLEXBADGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("plexbadge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read the config file, falling back to defaults when it does not exist.
fn load(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let path = cfg
                .store
                .path
                .as_ref()
                .context("No [store].path configured; nothing to initialize")?;
            SqliteStore::open(path).await?;
            println!("Cache database initialized at {}.", path.display());
        }
        Commands::Resolve {
            href,
            title,
            year,
            key,
            server_url,
            token,
        } => {
            resolve_cmd::run_resolve(
                &cfg,
                ResolveArgs {
                    href,
                    title,
                    year,
                    key,
                    server_url,
                    token,
                },
            )
            .await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => cache_cmd::run_cache_stats(&cfg).await?,
            CacheAction::Cleanup => cache_cmd::run_cache_cleanup(&cfg).await?,
            CacheAction::Clear { only } => {
                cache_cmd::run_cache_clear(&cfg, only.as_deref()).await?
            }
        },
        Commands::Url {
            show,
            season,
            season_id,
            episode,
        } => {
            resolve_cmd::run_url(
                &cfg,
                ResolvedIdentity {
                    show_id: Some(show),
                    season_id,
                    season_number: season,
                    episode_number: episode,
                },
            )?;
        }
    }

    Ok(())
}
