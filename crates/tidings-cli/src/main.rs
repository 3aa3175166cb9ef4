use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tidings",
    about = "Tidings — inspect and maintain a notification schedule store",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to tidings.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Database file (overrides [storage].path)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every stored schedule
    List,
    /// List schedules due at or before a point in time
    Pending {
        /// Unix seconds (default: now)
        #[arg(long)]
        at: Option<u64>,
    },
    /// Show one schedule
    Show { id: i64 },
    /// Store a schedule and index its fire time
    Save {
        id: i64,
        /// Fire time in Unix seconds
        #[arg(long)]
        at: u64,
        /// Extra payload field as key=value (value parsed as JSON when possible)
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },
    /// Remove a schedule and its index entries
    Remove { id: i64 },
    /// Remove every schedule
    Clear,
    /// Reconcile against a list of ids the dispatcher still considers live.
    ///
    /// An empty list is treated as a dispatcher reset and clears the store.
    Sync {
        #[arg(long, required = true, value_delimiter = ',', num_args = 0..)]
        live: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tidings=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::load(cli.config.as_deref(), cli.data)?;

    match cli.command {
        Commands::List => commands::schedule::list(&ctx),
        Commands::Pending { at } => commands::schedule::pending(&ctx, at),
        Commands::Show { id } => commands::schedule::show(&ctx, id),
        Commands::Save { id, at, fields } => commands::schedule::save(&ctx, id, at, &fields),
        Commands::Remove { id } => commands::schedule::remove(&ctx, id),
        Commands::Clear => commands::schedule::clear(&ctx),
        Commands::Sync { live } => commands::sync::sync(&ctx, live),
    }
}
