//! # CNC HAL Binary
//!
//! Attaches the boards listed in a machine configuration and scans them
//! once per period until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run against real hardware
//! cnc_hal --config /etc/cnc/machine.toml
//!
//! # Run every board against its simulated model
//! cnc_hal --config config/machine.toml --simulate
//!
//! # Run 1000 scans, then print every pin
//! cnc_hal -c config/machine.toml -s --cycles 1000 --list-pins
//!
//! # Verbose logging
//! cnc_hal -c config/machine.toml -s -v
//! ```

#![deny(warnings)]

use clap::Parser;
use cnc_common::config::LogLevel;
use cnc_common::consts::DEFAULT_CONFIG_PATH;
use cnc_hal::core::HalCore;
use cnc_hal::driver_registry::DriverRegistry;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// CNC HAL - real-time board drivers for encoders, ADC/DAC, digital I/O and watchdogs
#[derive(Parser, Debug)]
#[command(name = "cnc_hal")]
#[command(version)]
#[command(about = "Real-time board drivers for CNC motion control")]
#[command(long_about = None)]
struct Args {
    /// Path to machine configuration file (machine.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Attach every board to its simulated model instead of real hardware
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Stop after this many scans
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Print every exported pin and function before shutting down
    #[arg(long)]
    list_pins: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("HAL failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = HalCore::load_config(&args.config);
    let log_level = config.as_ref().map(|c| c.shared.log_level).unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("CNC HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = config?;
    let mut hal_core = HalCore::new(config, DriverRegistry::with_builtin())?;

    let running = hal_core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if args.simulate {
        info!("Simulation mode enabled");
        hal_core.attach_simulated()?;
    } else {
        hal_core.attach()?;
    }

    let result = match args.cycles {
        Some(n) => hal_core.run_cycles(n),
        None => hal_core.run(),
    };
    if let Err(e) = &result {
        error!("Scan loop error: {}", e);
    }

    if args.list_pins {
        for pin in hal_core.pins().list() {
            println!("{:<48} {:<5} {:?} {}", pin.name, pin.pin_type, pin.dir, pin.value);
        }
        for f in hal_core.functions() {
            println!("{:<48} {:?} fp={}", f.name, f.kind, f.uses_fp);
        }
    }

    hal_core.shutdown()?;
    info!("CNC HAL shutdown complete");
    result.map_err(Into::into)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose { LogLevel::Debug } else { configured };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
