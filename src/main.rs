mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::espn::SeasonType;

#[derive(Parser)]
#[command(name = "gridiron")]
#[command(about = "NFL schedule, score and standings tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Initialize the database
    InitDb,
    /// Load or refresh the 32-team directory
    SeedTeams,
    /// Import a season from the ESPN scoreboard
    Load {
        #[arg(short, long)]
        season: Option<i32>,
        /// Season types to import: pre, regular, post
        #[arg(short = 't', long = "type", value_delimiter = ',', default_value = "regular")]
        season_types: Vec<SeasonType>,
        /// Recompute rankings afterwards
        #[arg(long)]
        rank: bool,
    },
    /// Poll live scores for the current (or given) week
    Poll {
        #[arg(short, long)]
        season: Option<i32>,
        /// ESPN week for the season type (playoff round 1-5 for post)
        #[arg(short, long)]
        week: Option<i32>,
        #[arg(short = 't', long = "type", default_value = "regular")]
        season_type: SeasonType,
        /// Run a single refresh and exit
        #[arg(long)]
        once: bool,
        #[arg(long)]
        max_cycles: Option<u32>,
        /// Stop once no games are live
        #[arg(long)]
        until_idle: bool,
    },
    /// Recompute and print season rankings
    Rankings {
        #[arg(short, long)]
        season: Option<i32>,
    },
    /// Show a team's season summary
    Team {
        /// Code, alias or name, e.g. GB, WSH, "packers"
        name: String,
        #[arg(short, long)]
        season: Option<i32>,
    },
    /// List a week's games and bye teams
    Week {
        #[arg(short, long)]
        season: Option<i32>,
        /// Defaults to the current week
        #[arg(short, long)]
        week: Option<i32>,
    },
    /// Print the current week
    CurrentWeek {
        #[arg(short, long)]
        season: Option<i32>,
    },
    /// Check a season's data completeness
    Check {
        #[arg(short, long)]
        season: Option<i32>,
    },
    /// Export season standings to CSV
    Export {
        #[arg(short, long)]
        season: Option<i32>,
        #[arg(short, long, default_value = "../data/exports/standings.csv")]
        output: PathBuf,
    },
    /// Delete every game of a season
    ClearSeason {
        #[arg(short, long)]
        season: i32,
        #[arg(long)]
        yes: bool,
    },
    /// Delete a team together with its games and cached rankings
    DeleteTeam {
        /// Team code or alias
        code: String,
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    match cli.command {
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                config.port = port;
            }
            tracing::info!("Starting Gridiron API server on port {}", config.port);
            api::serve(config).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            cli::init_db(&config).await?;
        }
        Some(Commands::SeedTeams) => cli::seed_teams(&config).await?,
        Some(Commands::Load {
            season,
            season_types,
            rank,
        }) => {
            let season = config.season_or_default(season);
            cli::load(&config, season, &season_types, rank).await?;
        }
        Some(Commands::Poll {
            season,
            week,
            season_type,
            once,
            max_cycles,
            until_idle,
        }) => {
            let season = config.season_or_default(season);
            cli::poll(&config, season, season_type, week, once, max_cycles, until_idle).await?;
        }
        Some(Commands::Rankings { season }) => {
            let season = config.season_or_default(season);
            cli::rankings(&config, season).await?;
        }
        Some(Commands::Team { name, season }) => {
            let season = config.season_or_default(season);
            cli::team(&config, &name, season).await?;
        }
        Some(Commands::Week { season, week }) => {
            let season = config.season_or_default(season);
            cli::week(&config, season, week).await?;
        }
        Some(Commands::CurrentWeek { season }) => {
            let season = config.season_or_default(season);
            cli::current_week(&config, season).await?;
        }
        Some(Commands::Check { season }) => {
            let season = config.season_or_default(season);
            cli::check(&config, season).await?;
        }
        Some(Commands::Export { season, output }) => {
            let season = config.season_or_default(season);
            cli::export(&config, season, &output).await?;
        }
        Some(Commands::ClearSeason { season, yes }) => cli::clear_season(&config, season, yes).await?,
        Some(Commands::DeleteTeam { code, yes }) => cli::delete_team(&config, &code, yes).await?,
        None => {
            // Default to serving
            tracing::info!("Starting Gridiron API server on port {}", config.port);
            api::serve(config).await?;
        }
    }

    Ok(())
}
