//! Actuator toolkit command line.
//!
//! Opens a session from a TOML configuration, optionally loads a saved
//! configuration document into its devices, then drives the simulated
//! network: step it, watch it through the poller, or export its settings.

mod report;

use actuator_common::address::SlaveAddress;
use actuator_common::config::SessionConfig;
use actuator_fieldbus::Session;
use actuator_protocol::document::ConfigurationDocument;
use actuator_protocol::register_map::CommandKind;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::report::{product_table, status_line, PollSummary, STATUS_HEADER};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "actuator-cli",
    about = "Actuator toolkit - simulate, monitor and configure register-mapped actuators",
    version,
    long_about = None
)]
struct Args {
    /// Path to a session configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Configuration document (JSON) written to the devices before the command runs.
    #[arg(long, short = 'd', value_name = "FILE", global = true)]
    document: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Step the simulation by hand and print every slave after each tick.
    Simulate {
        /// Number of ticks to run.
        #[arg(long, default_value = "20")]
        cycles: u32,

        /// Motion command issued before the first tick.
        #[arg(long, value_enum)]
        command: Option<MotionArg>,

        /// Limit the command and output to one slave.
        #[arg(long, value_parser = parse_slave)]
        slave: Option<SlaveAddress>,
    },

    /// Run the simulation and poller in the background for a while.
    Monitor {
        /// How long to watch (e.g. "5s", "1m").
        #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
        duration: Duration,

        /// Poll interval override (e.g. "250ms").
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,

        /// Motion command issued to every slave at start.
        #[arg(long, value_enum)]
        command: Option<MotionArg>,
    },

    /// Print device configurations as JSON.
    ShowConfig {
        /// Only this slave.
        #[arg(long, value_parser = parse_slave)]
        slave: Option<SlaveAddress>,
    },

    /// Save every device's configuration to a document.
    Export {
        /// Output file.
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,
    },

    /// Print the built-in session configuration as TOML.
    DefaultConfig,

    /// List known products.
    Products,
}

/// Motion command accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum MotionArg {
    Open,
    Close,
    Stop,
}

impl From<MotionArg> for CommandKind {
    fn from(arg: MotionArg) -> Self {
        match arg {
            MotionArg::Open => Self::Open,
            MotionArg::Close => Self::Close,
            MotionArg::Stop => Self::Stop,
        }
    }
}

fn parse_slave(s: &str) -> Result<SlaveAddress, String> {
    let raw: u8 = s.parse().map_err(|e| format!("{s}: {e}"))?;
    SlaveAddress::new(raw).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting actuator CLI");

    match &args.command {
        Command::DefaultConfig => {
            print!("{}", SessionConfig::default().to_toml()?);
            return Ok(());
        }
        Command::Products => {
            print!("{}", product_table());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(args.config.as_deref())?;
    info!(mode = %config.mode, slaves = config.simulation.slaves.len(), "Configuration loaded");
    let mut session = open_session(&config)?;
    if let Some(path) = &args.document {
        let devices = apply_document_file(&session, path)?;
        info!(devices, path = %path.display(), "Configuration document applied");
    }

    let outcome = match args.command {
        Command::Simulate {
            cycles,
            command,
            slave,
        } => run_simulate(&mut session, cycles, command, slave, &mut std::io::stdout().lock()),
        Command::Monitor {
            duration,
            interval,
            command,
        } => run_monitor(&mut session, duration, interval, command),
        Command::ShowConfig { slave } => run_show_config(&session, slave),
        Command::Export { output } => run_export(&session, &output),
        Command::DefaultConfig | Command::Products => Ok(()),
    };

    session.close();
    outcome
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "actuator_cli={level},actuator_fieldbus={level},actuator_protocol={level},actuator_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `ACTUATOR_CONFIG_PATH` environment variable
/// 3. `config/actuator.toml` (local development)
/// 4. Built-in defaults
fn load_config(explicit: Option<&Path>) -> Result<SessionConfig> {
    if let Some(config_path) = explicit {
        info!(?config_path, "Loading config from command-line argument");
        return SessionConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var("ACTUATOR_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from ACTUATOR_CONFIG_PATH");
            return SessionConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from ACTUATOR_CONFIG_PATH={env_path}")
            });
        }
        warn!(
            path = %env_path,
            "ACTUATOR_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    let local_path = PathBuf::from("config/actuator.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return SessionConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {}", local_path.display()));
    }

    info!("No config file found, using built-in defaults");
    Ok(SessionConfig::default())
}

/// Open a session for the configured mode.
///
/// This binary carries no serial driver, so hardware mode is refused here.
fn open_session(config: &SessionConfig) -> Result<Session> {
    Session::from_config(config, None)
        .with_context(|| format!("Failed to open {} session", config.mode))
}

fn selected(session: &Session, slave: Option<SlaveAddress>) -> Result<Vec<SlaveAddress>> {
    match slave {
        Some(address) => {
            session.device(address)?;
            Ok(vec![address])
        }
        None => Ok(session.addresses()),
    }
}

fn issue(session: &Session, targets: &[SlaveAddress], command: CommandKind) -> Result<()> {
    for &address in targets {
        let device = session.device(address)?;
        let mut device = device
            .lock()
            .map_err(|_| anyhow::anyhow!("device {address} lock poisoned"))?;
        device
            .issue_command(command)
            .with_context(|| format!("Failed to send {command} to slave {address}"))?;
        info!(slave = %address, %command, "Command issued");
    }
    Ok(())
}

fn run_simulate<W: Write>(
    session: &mut Session,
    cycles: u32,
    command: Option<MotionArg>,
    slave: Option<SlaveAddress>,
    out: &mut W,
) -> Result<()> {
    let targets = selected(session, slave)?;
    if let Some(command) = command {
        issue(session, &targets, command.into())?;
    }

    writeln!(out, "{STATUS_HEADER}")?;
    for tick in 1..=u64::from(cycles) {
        session.step_simulation(1)?;
        for &address in &targets {
            let device = session.device(address)?;
            let status = device
                .lock()
                .map_err(|_| anyhow::anyhow!("device {address} lock poisoned"))?
                .poll_status()
                .with_context(|| format!("Failed to poll slave {address}"))?;
            writeln!(out, "{}", status_line(tick, address, &status))?;
        }
    }
    Ok(())
}

fn run_monitor(
    session: &mut Session,
    duration: Duration,
    interval: Option<Duration>,
    command: Option<MotionArg>,
) -> Result<()> {
    session.start_simulation()?;
    let reports = match interval {
        Some(interval) => session.start_polling_every(interval)?,
        None => session.start_polling()?,
    };
    if let Some(command) = command {
        issue(session, &session.addresses(), command.into())?;
    }

    let mut summary = PollSummary::default();
    let deadline = Instant::now() + duration;
    println!("{STATUS_HEADER}");
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match reports.recv_timeout(remaining) {
            Ok(report) => {
                summary.record(&report);
                match &report.result {
                    Ok(status) => println!("{}", status_line(report.round, report.slave, status)),
                    Err(e) => warn!(slave = %report.slave, error = %e, "Poll failed"),
                }
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => bail!("poller stopped unexpectedly"),
        }
    }

    session.stop_polling();
    session.stop_simulation();
    println!();
    print!("{}", summary.render());
    Ok(())
}

fn run_show_config(session: &Session, slave: Option<SlaveAddress>) -> Result<()> {
    let document = session.export_document()?;
    let json = match slave {
        Some(address) => {
            let record = document
                .device(address)
                .with_context(|| format!("No device at slave {address}"))?;
            serde_json::to_string_pretty(record)?
        }
        None => document.to_json()?,
    };
    println!("{json}");
    Ok(())
}

fn run_export(session: &Session, output: &Path) -> Result<()> {
    let document = session.export_document()?;
    document
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Saved {} device(s) to {}",
        document.devices.len(),
        output.display()
    );
    Ok(())
}

/// Write a saved document to the session's devices, returning how many.
fn apply_document_file(session: &Session, path: &Path) -> Result<usize> {
    let document = ConfigurationDocument::load(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    session
        .apply_document(&document)
        .with_context(|| format!("Failed to apply configuration document {}", path.display()))?;
    Ok(document.devices.len())
}
