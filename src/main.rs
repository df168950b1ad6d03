//! Corsair Link Control CLI
//!
//! Command-line interface for monitoring and controlling Corsair Link coolers.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use open_corsair_link::config::{SessionConfig, Strategy};
use open_corsair_link::device::{FanSettings, HidTransport, InterfaceFamily, Session};
use open_corsair_link::protocol::FanMode;
use open_corsair_link::utils::parsing::{parse_fan_mode, parse_fan_number};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Corsair Link Control Tool
///
/// Without --fan, prints every temperature sensor and fan.
#[derive(Parser, Debug)]
#[command(name = "corsair-link-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to open: h80i or cooling-node
    #[arg(short, long, default_value = "h80i", value_parser = parse_interface)]
    interface: InterfaceFamily,

    /// Fan to configure (1-based; the pump follows the last fan)
    #[arg(short, long, value_parser = parse_fan)]
    fan: Option<u8>,

    /// Fan mode: fixedpwm, fixedrpm, default, quiet, balanced, performance, custom or a value
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<u8>,

    /// Fixed RPM target
    #[arg(short, long)]
    rpm: Option<u16>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Repeat the report every SECS seconds until Ctrl+C
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,

    /// Session configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reply timeout in milliseconds (overrides the config file)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Correlation strategy: poll or event (overrides the config file)
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<Strategy>,

    /// Enable debug logging of every frame
    #[arg(short, long)]
    verbose: bool,
}

fn parse_interface(s: &str) -> std::result::Result<InterfaceFamily, String> {
    s.parse().map_err(|e: open_corsair_link::CorsairError| e.to_string())
}

fn parse_fan(s: &str) -> std::result::Result<u8, String> {
    parse_fan_number(s).map_err(|e| e.to_string())
}

fn parse_mode(s: &str) -> std::result::Result<u8, String> {
    parse_fan_mode(s).map_err(|e| e.to_string())
}

fn parse_strategy(s: &str) -> std::result::Result<Strategy, String> {
    s.parse().map_err(|e: open_corsair_link::CorsairError| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = session_config(&args)?;

    match (args.fan, args.mode.is_some() || args.rpm.is_some()) {
        (Some(fan), true) => cmd_configure(
            &args,
            &config,
            fan,
            FanSettings {
                mode: args.mode,
                rpm: args.rpm.unwrap_or(0),
            },
        ),
        (Some(_), false) => bail!("--fan needs --mode and/or --rpm"),
        (None, true) => bail!("--mode and --rpm need --fan"),
        (None, false) => match args.watch {
            Some(secs) => cmd_watch(&args, &config, secs),
            None => cmd_status(&args, &config),
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn session_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    config.validate()?;
    Ok(config)
}

fn open_session(args: &Args, config: &SessionConfig) -> Result<Session> {
    let transport = HidTransport::open(args.interface)
        .with_context(|| format!("Failed to open {} interface", args.interface))?;
    Session::open(transport, args.interface, config).context("Failed to identify device")
}

// =============================================================================
// Command Implementations
// =============================================================================

fn print_report(session: &mut Session, json: bool) -> Result<()> {
    let report = session.query().context("Failed to read device")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn cmd_status(args: &Args, config: &SessionConfig) -> Result<()> {
    let mut session = open_session(args, config)?;
    print_report(&mut session, args.json)?;
    session.close();
    Ok(())
}

fn cmd_watch(args: &Args, config: &SessionConfig, interval_secs: u64) -> Result<()> {
    let mut session = open_session(args, config)?;

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let interval = Duration::from_secs(interval_secs.max(1));
    while running.load(Ordering::SeqCst) {
        if !args.json {
            // Clear screen and move cursor to top
            print!("\x1B[2J\x1B[1;1H");
            println!("🌡️  Watching {} (Ctrl+C to stop)\n", session.identity().name);
        }
        print_report(&mut session, args.json)?;

        // Sleep in short steps so Ctrl+C is handled promptly
        let mut slept = Duration::ZERO;
        while slept < interval && running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
            slept += Duration::from_millis(100);
        }
    }

    session.close();
    println!("\n👋 Stopped.");
    Ok(())
}

fn cmd_configure(
    args: &Args,
    config: &SessionConfig,
    fan: u8,
    settings: FanSettings,
) -> Result<()> {
    let mut session = open_session(args, config)?;
    let name = session.identity().fan_name(fan);

    session
        .configure(fan, settings)
        .with_context(|| format!("Failed to configure {}", name))?;

    if let Some(mode) = settings.mode.and_then(|m| FanMode::try_from(m).ok()) {
        println!("✅ {} mode set to {}", name, mode);
    }
    if settings.rpm > 0 {
        println!("✅ {} fixed speed set to {} RPM", name, settings.rpm);
    }

    session.close();
    Ok(())
}
