// ============================================
// File: crates/otafleet-client/src/main.rs
// ============================================
//! # otafleet Entry Point
//!
//! ## Creation Reason
//! Command-line front end for fleet update passes.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Fleet pass / single node update execution
//!
//! ## Usage
//! ```bash
//! # Update nodes a0..a99
//! otafleet run --config /etc/otafleet/client.toml
//!
//! # Update f10..f19 only
//! otafleet run --prefix f --from 10 --to 20
//!
//! # One node
//! otafleet update --node a42
//!
//! # Check a config file
//! otafleet validate --config ./client.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Exit code is 0 when the pass ran, even if nodes failed; failures are
//!   in the outcome log and the summary
//! - `RUST_LOG` overrides both `--log-level` and `[logging].level`
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use otafleet_client::{ClientConfig, FleetDriver, FleetReport, OutcomeResult, UpdateOutcome};
use otafleet_common::{NodeId, NodeRange};

const DEFAULT_CONFIG: &str = "/etc/otafleet/client.toml";

// ============================================
// CLI Definition
// ============================================

/// Fleet-wide OTA firmware update client
#[derive(Parser, Debug)]
#[command(name = "otafleet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one update pass over a node range
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// First node index
        #[arg(long, default_value_t = 0)]
        from: u32,

        /// One past the last node index
        #[arg(long, default_value_t = 100)]
        to: u32,

        /// Node id prefix (defaults to `[fleet].node_prefix`)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Update a single node
    Update {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Node id, e.g. a42
        #[arg(short, long)]
        node: String,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

impl Commands {
    fn config_path(&self) -> &Path {
        match self {
            Self::Run { config, .. } | Self::Update { config, .. } | Self::Validate { config } => {
                config
            }
        }
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = cli.command.config_path().to_path_buf();
    let config = match ClientConfig::load(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"));
            error!("{}", e);
            std::process::exit(1);
        }
    };

    init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));
    if !config_path.exists() {
        warn!(
            "Config file {} not found, using defaults",
            config_path.display()
        );
    }

    let result = match cli.command {
        Commands::Run {
            from, to, prefix, ..
        } => cmd_run(config, from, to, prefix).await,
        Commands::Update { node, .. } => cmd_update(config, node).await,
        Commands::Validate { .. } => cmd_validate(&config, &config_path),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Runs one fleet pass.
async fn cmd_run(
    config: ClientConfig,
    from: u32,
    to: u32,
    prefix: Option<String>,
) -> anyhow::Result<()> {
    let range = match prefix {
        Some(prefix) => NodeRange::new(prefix, from, to)?,
        None => config.node_range(from, to)?,
    };

    let (driver, recorder) = FleetDriver::from_config(&config).await?;
    let report = driver.run(&range).await;
    drop(driver);
    recorder.await?;

    print_report(&report);
    info!(
        "Outcomes appended to {}",
        config.storage.outcome_csv.display()
    );
    Ok(())
}

/// Updates one node.
async fn cmd_update(config: ClientConfig, node: String) -> anyhow::Result<()> {
    let node_id = NodeId::new(node)?;

    let (driver, recorder) = FleetDriver::from_config(&config).await?;
    let outcome = driver.run_node(node_id).await?;
    drop(driver);
    recorder.await?;

    print_outcome(&outcome);
    Ok(())
}

/// Validates configuration file.
fn cmd_validate(config: &ClientConfig, path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        println!("✅ Configuration is valid: {}", path.display());
    } else {
        println!("⚠️  Config file not found: {}", path.display());
        println!("   Defaults below will be used.");
    }
    println!();
    println!("Control server:");
    println!("   Base URL:        {}", config.transport().base_url());
    println!("   Timeout:         {}s", config.server.request_timeout_secs);
    println!("   Invalid certs:   {}", config.server.accept_invalid_certs);
    println!();
    println!("Fleet:");
    println!("   Device type:     {}", config.fleet.device_type);
    println!("   Node prefix:     {}", config.fleet.node_prefix);
    println!("   Concurrency:     {}", config.fleet.max_concurrent_sessions);
    println!("   Attempts:        {}", config.fleet.max_session_attempts);
    println!();
    println!("Storage:");
    println!("   Firmware:        {}", config.storage.firmware_dir.display());
    println!("   Installed:       {}", config.storage.install_dir.display());
    println!("   Outcome log:     {}", config.storage.outcome_csv.display());
    println!();
    println!("Install:");
    println!("   Simulated time:  {}ms", config.install.simulated_duration_ms);
    println!("   Post-verify:     {}", config.install.post_verify);
    println!();
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

fn print_report(report: &FleetReport) {
    println!();
    println!("Fleet pass");
    println!("════════════════════════════════════════");
    for outcome in &report.outcomes {
        print_outcome(outcome);
    }
    println!("════════════════════════════════════════");
    println!("{report}");
    println!();
}

fn print_outcome(outcome: &UpdateOutcome) {
    let mark = match outcome.result {
        OutcomeResult::Success => "✅",
        OutcomeResult::UpToDate => "➖",
        OutcomeResult::Failed(_) => "❌",
    };
    println!(
        "{} {:<8} {:<10} {:>9.3}s  {}",
        mark,
        outcome.node_id.as_str(),
        outcome.version.as_deref().unwrap_or("-"),
        outcome.duration_secs(),
        outcome.result
    );
}
