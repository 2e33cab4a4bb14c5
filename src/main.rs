use clap::{Parser, Subcommand};
use glor_core::{AboutBlock, Game, HeroContent, News};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod session;

use commands::{ConfigCommand, Context, OutputFormat, RecordCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "glor")]
#[command(version)]
#[command(about = "Content admin for the GlorGames website", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage featured games
    Game(RecordCommand),

    /// Manage the hero section
    Hero(RecordCommand),

    /// Manage about page blocks
    About(RecordCommand),

    /// Manage news articles
    News(RecordCommand),

    /// Show a summary of games and news
    Dashboard {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Sign in with an API key
    Login {
        /// API key issued by glor-admin (prompted if not given or configured)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Sign out and forget the stored key
    Logout,

    /// Show who is signed in
    Whoami,

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        // Needs no session, so it works even when the session file is broken.
        Some(Commands::Config(cmd)) => cmd.run(&config)?,
        Some(command) => run_command(command, &Context::load(config)?).await?,
        None => println!("Use --help to see available commands"),
    }

    Ok(())
}

async fn run_command(command: Commands, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Game(cmd) => cmd.run::<Game>(ctx).await,
        Commands::Hero(cmd) => cmd.run::<HeroContent>(ctx).await,
        Commands::About(cmd) => cmd.run::<AboutBlock>(ctx).await,
        Commands::News(cmd) => cmd.run::<News>(ctx).await,
        Commands::Dashboard { format } => commands::show_dashboard(ctx, &format).await,
        Commands::Login { api_key } => commands::login(ctx, api_key).await,
        Commands::Logout => commands::logout(ctx),
        Commands::Whoami => commands::whoami(ctx),
        Commands::Config(cmd) => cmd.run(&ctx.config),
    }
}
