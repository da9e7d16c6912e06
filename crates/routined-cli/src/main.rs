use std::path::PathBuf;

use clap::{Parser, Subcommand};

use routined_daemon::DaemonOptions;

const DEFAULT_SERVER: &str = "http://localhost:4096";

#[derive(Parser)]
#[command(
    name = "routined",
    about = "Schedule declarative routines that start AI-agent sessions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the routines daemon
    Start {
        /// Path to the routines directory
        #[arg(short, long)]
        routines: PathBuf,

        /// Session server URL
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Watch the routines directory and reload on changes
        #[arg(short, long)]
        watch: bool,
    },
    /// List all routines and their schedules
    List {
        /// Path to the routines directory
        #[arg(short, long)]
        routines: PathBuf,
    },
    /// Validate all routine files
    Validate {
        /// Path to the routines directory
        #[arg(short, long)]
        routines: PathBuf,
    },
    /// Run a routine immediately
    Run {
        /// Routine id or display name
        name: String,

        /// Path to the routines directory
        #[arg(short, long)]
        routines: PathBuf,

        /// Session server URL
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Show what would be sent without executing
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            routines,
            server,
            watch,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(routined_daemon::start_daemon(DaemonOptions {
                routines_dir: routines,
                server_url: server,
                watch,
            }))?;
        }
        Commands::List { routines } => {
            routined_daemon::list_routines(&routines)?;
        }
        Commands::Validate { routines } => {
            let valid = routined_daemon::validate_routines(&routines)?;
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Run {
            name,
            routines,
            server,
            dry_run,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(routined_daemon::run_routine(
                &routines, &server, &name, dry_run,
            ))?;
        }
    }

    Ok(())
}
