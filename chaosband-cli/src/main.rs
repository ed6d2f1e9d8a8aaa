//! Chaosband CLI — configuration and the live trading loop.
//!
//! Commands:
//! - `run` — connect, select instruments and trade on every candle close
//!   until Ctrl-C
//! - `config init` — write a default TOML config file
//! - `config show` — print the effective configuration and its fingerprint

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use chaosband_core::clock::Clock;
use chaosband_runner::broker::Broker;
use chaosband_runner::telemetry::TelemetrySink;
use chaosband_runner::{BotConfig, PaperBroker, Scheduler, TokioClock, TradingEngine};

const DEFAULT_LOG_FILTER: &str = "chaosband=info,chaosband_core=info,chaosband_runner=info";

#[derive(Parser)]
#[command(
    name = "chaosband",
    about = "Chaosband — candle-close signal bot for short-expiry binary options"
)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trade against the paper broker until interrupted.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration as TOML.
    Init {
        /// Destination file.
        #[arg(default_value = "chaosband.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the effective configuration.
    Show {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run { config } => run_bot(config.as_deref()).await,
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => run_config_init(&path, force),
            ConfigAction::Show { config } => run_config_show(config.as_deref()),
        },
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<BotConfig> {
    match path {
        Some(path) => {
            BotConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(BotConfig::default()),
    }
}

// ─── run ─────────────────────────────────────────────────────────────

async fn run_bot(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    info!(fingerprint = %config.fingerprint()?, "configuration loaded");
    for line in config.summary().lines() {
        info!("{line}");
    }

    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let broker: Arc<dyn Broker> =
        Arc::new(PaperBroker::new(config.paper.clone(), Arc::clone(&clock)));
    let telemetry: Arc<dyn TelemetrySink> =
        Arc::new(config.telemetry.build(config.strategy.id()));
    let mut scheduler = Scheduler::from_config(&config, Arc::clone(&clock))?;
    let mut engine = TradingEngine::new(config, broker, clock, telemetry)?;

    engine
        .prepare()
        .await
        .context("preparing the trading engine")?;
    info!(instruments = ?engine.instruments(), "trading started; press Ctrl-C to stop");

    let stats = scheduler.run(&mut engine, shutdown_signal()).await;

    let abandoned = engine.shutdown();
    for (instrument, state) in engine.risk().snapshot_all() {
        info!(
            %instrument,
            trades = state.total_trades,
            active = state.active_trade_count,
            losses_in_row = state.consecutive_losses,
            stake = state.current_stake,
            "final risk state"
        );
    }
    info!(
        cycles = stats.cycles,
        failed = stats.failed_cycles,
        refreshes = stats.refreshes,
        open_trades = engine.risk().total_active_trades(),
        abandoned,
        "stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// ─── config ──────────────────────────────────────────────────────────

fn run_config_init(path: &Path, force: bool) -> Result<()> {
    let existed = path.exists();
    if existed && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let text = BotConfig::default().to_toml()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    if existed {
        warn!(path = %path.display(), "existing config overwritten");
    }
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", config.summary());
    println!();
    println!("fingerprint         {}", config.fingerprint()?);
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}
