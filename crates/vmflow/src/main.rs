mod commands;
mod progress;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vmflow_ansible::{Role, VarBag};
use vmflow_pipeline::{Entry, exit_code};

#[derive(Parser)]
#[command(name = "vmflow")]
#[command(about = "Provision, network and configure a single VM in one command", long_about = None)]
struct Cli {
    /// Project directory holding vmflow.env, terraform/ and ansible/
    #[arg(
        short = 'C',
        long,
        global = true,
        env = "VMFLOW_PROJECT_DIR",
        default_value = "."
    )]
    project_dir: PathBuf,

    /// Config file, relative to the project directory
    #[arg(long, global = true, env = "VMFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Run wg-quick and ip through sudo
    #[arg(long, global = true)]
    sudo: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline: infra, network, services, verification
    Up {
        /// Extra configuration variable (KEY=VALUE), may be repeated
        #[arg(short = 'e', long = "extra-var", value_name = "KEY=VALUE")]
        extra_vars: Vec<String>,
        /// Accept self-signed certificates when probing
        #[arg(long)]
        insecure: bool,
    },
    /// Provision or update the VM and regenerate the inventory
    Infra,
    /// Bring up the WireGuard tunnel to the VM
    Network,
    /// Configure services on an existing VM
    Services {
        /// Deploy a single role (gateway, database, storage, app, monitoring)
        #[arg(short, long)]
        role: Option<Role>,
        /// Skip tunnel checks; only the inventory must exist
        #[arg(long)]
        assume_ready: bool,
        /// Extra configuration variable (KEY=VALUE), may be repeated
        #[arg(short = 'e', long = "extra-var", value_name = "KEY=VALUE")]
        extra_vars: Vec<String>,
    },
    /// Probe endpoints; only required endpoints decide the result
    Verify {
        #[arg(long)]
        insecure: bool,
    },
    /// Probe endpoints; every endpoint must be healthy
    Health {
        #[arg(long)]
        insecure: bool,
    },
    /// Check that every inventory host answers
    Connectivity,
    /// Destroy the VM and remove generated artifacts
    Destroy {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show addresses and DNS records of the deployment
    Addresses {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let ctx = Context::new(cli.project_dir, cli.config, cli.sudo);
    let plain = |entry: Entry| (entry, VarBag::new(), false);

    let (entry, overrides, insecure) = match cli.command {
        Commands::Version => {
            println!("vmflow {}", env!("CARGO_PKG_VERSION"));
            return Ok(exit_code::OK);
        }
        Commands::Addresses { json } => return commands::addresses::handle(&ctx, json).await,
        Commands::Up {
            extra_vars,
            insecure,
        } => (Entry::Full, utils::parse_extra_vars(&extra_vars)?, insecure),
        Commands::Infra => plain(Entry::Infra),
        Commands::Network => plain(Entry::Network),
        Commands::Services {
            role,
            assume_ready,
            extra_vars,
        } => (
            Entry::Services { role, assume_ready },
            utils::parse_extra_vars(&extra_vars)?,
            false,
        ),
        Commands::Verify { insecure } => (Entry::Verify, VarBag::new(), insecure),
        Commands::Health { insecure } => (Entry::Health, VarBag::new(), insecure),
        Commands::Connectivity => plain(Entry::Connectivity),
        Commands::Destroy { yes } => plain(Entry::Destroy { auto_confirm: yes }),
    };

    commands::pipeline::handle(&ctx, entry, overrides, insecure).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code::INTERNAL
        }
    };
    std::process::exit(code);
}
