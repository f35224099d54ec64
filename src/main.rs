mod client;
mod commands;
mod config;
mod domain;
mod scoring;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fleetscope",
    version,
    about = "Fleet health collector for proxy-managed network devices"
)]
struct Cli {
    /// Path to config file (default: ~/.config/fleetscope/config.yaml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one fleet collection and print the result
    Collect {
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,

        /// Write this run's records to the status store
        #[arg(long)]
        persist: bool,
    },

    /// List managed devices known to the management plane
    Devices {
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show the persisted status store with experience scores
    Status {
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so table output stays pipeable.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fleetscope=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect { format, persist } => {
            commands::collect::run(cli.config.as_deref(), &format, persist)
        }
        Commands::Devices { format } => commands::devices::run(cli.config.as_deref(), &format),
        Commands::Status { format } => commands::status::run(cli.config.as_deref(), &format),
    }
}
