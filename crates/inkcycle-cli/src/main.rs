mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, playlist::PlaylistSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "inkcycle",
    about = "E-ink frame daemon: rotate time-windowed playlists and serve on-demand refreshes",
    version,
    propagate_version = true
)]
struct Cli {
    /// Frame root (default: auto-detect from .inkcycle/)
    #[arg(long, global = true, env = "INKCYCLE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config under .inkcycle/
    Init {
        /// Frame name (default: root directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Run the refresh scheduler and the HTTP API
    Serve {
        #[arg(long, default_value_t = 8080, env = "INKCYCLE_PORT")]
        port: u16,

        /// Use an in-memory device instead of writing frames to disk
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect the device config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Inspect and edit playlists (edit while the daemon is stopped)
    Playlist {
        #[command(subcommand)]
        subcommand: PlaylistSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref()),
        Commands::Serve { port, dry_run } => cmd::serve::run(&root, port, dry_run),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Playlist { subcommand } => cmd::playlist::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
