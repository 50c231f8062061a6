//! rosterscan CLI
//!
//! Reads player names off a match roster screenshot, keeps a friend
//! registry, and pulls leaderboard stats for everyone in the match.
//!
//! Copyright (c) 2025 Michael A Wright

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use core_pipeline::Team;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nhost: ",
    env!("BUILT_HOST"),
    "\ncommit: ",
    env!("BUILT_GIT_COMMIT_HASH"),
    "\nbuilt: ",
    env!("BUILT_TIME_UTC"),
);

#[derive(Parser)]
#[command(name = "rosterscan", version, long_version = LONG_VERSION)]
#[command(
    about = "Read match rosters from screenshots and look up pilot stats",
    long_about = None
)]
struct Cli {
    /// Config file (default: <config dir>/rosterscan/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize team rosters in a screenshot
    Scan {
        /// Screenshot to read
        image: PathBuf,

        /// Treat the whole image as one team's roster instead of cropping regions
        #[arg(long, value_enum)]
        team: Option<TeamArg>,

        /// Also write the normalized crops (team.png / enemy.png)
        #[arg(long)]
        save_crops: bool,

        /// Fetch leaderboard stats for the recognized names
        #[arg(long)]
        enrich: bool,

        /// Override the configured output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Skip image normalization
        #[arg(long)]
        raw: bool,
    },

    /// Fetch leaderboard stats for the current match
    Enrich {
        /// Refresh every friend in the registry, not just the match
        #[arg(long)]
        all: bool,
    },

    /// Add a player the scan missed to the current match
    Add {
        #[arg(value_enum)]
        team: TeamArg,
        name: String,
    },

    /// Show the current match
    Show,

    /// Start a new match (removes team.txt / enemy.txt)
    Clear,

    /// Manage the friend registry
    Friends {
        #[command(subcommand)]
        action: FriendsCommand,
    },

    /// Show or change the screen regions holding each roster
    Regions {
        #[command(subcommand)]
        action: RegionsCommand,
    },

    /// Inspect or edit the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Verify the recognition engine can be found and launched
    CheckEngine,
}

#[derive(Subcommand)]
enum FriendsCommand {
    /// List friends, optionally filtered by a case-insensitive search
    List { query: Option<String> },

    /// Add a friend
    Add {
        name: String,

        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Change a friend's notes or name
    Edit {
        name: String,

        #[arg(short, long)]
        notes: Option<String>,

        #[arg(long)]
        rename: Option<String>,
    },

    /// Delete a friend
    Remove { name: String },
}

#[derive(Subcommand)]
enum RegionsCommand {
    /// Print both regions
    Show,

    /// Set one team's rectangle (right/bottom exclusive)
    Set {
        #[arg(value_enum)]
        team: TeamArg,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Point at the tesseract executable or its install directory
    SetEngine { path: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TeamArg {
    Own,
    Opposing,
}

impl From<TeamArg> for Team {
    fn from(arg: TeamArg) -> Self {
        match arg {
            TeamArg::Own => Team::Own,
            TeamArg::Opposing => Team::Opposing,
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,rosterscan={level},core_pipeline={level},stats_bridge={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(
        version = built_info::PKG_VERSION,
        target = built_info::TARGET,
        rustc = built_info::RUSTC_VERSION,
        "starting"
    );

    let result = run(cli).await;
    if let Err(err) = &result {
        if commands::is_engine_unavailable(err) {
            eprintln!("hint: install Tesseract-OCR or run `rosterscan config set-engine <path>`");
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = commands::Context::load(cli.config)?;

    match cli.command {
        Commands::Scan {
            image,
            team,
            save_crops,
            enrich,
            output_dir,
            raw,
        } => {
            let options = commands::ScanOptions {
                image,
                team: team.map(Team::from),
                save_crops,
                enrich,
                output_dir,
                raw,
            };
            commands::scan(&ctx, options).await
        }
        Commands::Enrich { all } => commands::enrich(&ctx, all).await,
        Commands::Add { team, name } => commands::add_player(&ctx, team.into(), &name),
        Commands::Show => commands::show(&ctx),
        Commands::Clear => commands::clear(&ctx),
        Commands::Friends { action } => match action {
            FriendsCommand::List { query } => commands::friends_list(&ctx, query.as_deref()),
            FriendsCommand::Add { name, notes } => commands::friends_add(&ctx, &name, &notes),
            FriendsCommand::Edit {
                name,
                notes,
                rename,
            } => commands::friends_edit(&ctx, &name, notes.as_deref(), rename.as_deref()),
            FriendsCommand::Remove { name } => commands::friends_remove(&ctx, &name),
        },
        Commands::Regions { action } => match action {
            RegionsCommand::Show => commands::regions_show(&ctx),
            RegionsCommand::Set {
                team,
                left,
                top,
                right,
                bottom,
            } => commands::regions_set(ctx, team.into(), [left, top, right, bottom]),
        },
        Commands::Config { action } => match action {
            ConfigCommand::Show => commands::config_show(&ctx),
            ConfigCommand::Init { force } => commands::config_init(&ctx, force),
            ConfigCommand::SetEngine { path } => commands::config_set_engine(ctx, path),
        },
        Commands::CheckEngine => commands::check_engine(&ctx),
    }
}
