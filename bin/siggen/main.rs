use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{LevelFilter, info, warn};
use rf_siggen::{
    AppConfig, OutputState, SignalGenerator, SweepConfig, SweepMode, SweepType, Unit, load_config,
    load_config_with_fallback,
};
use serde::Serialize;
use std::path::PathBuf;

/// RF signal generator control over SCPI
#[derive(Parser, Debug)]
#[command(name = "siggen")]
#[command(about = "Control an SCPI RF signal generator", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the instrument resource name
    #[arg(short, long, value_name = "RESOURCE")]
    resource: Option<String>,

    /// Use a simulated instrument described by this profile
    #[arg(long, value_name = "PROFILE")]
    sim: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query *IDN?
    Identify,
    /// Reset the instrument (*RST)
    Reset,
    /// Drain and print the error queue
    Errors,
    /// Clear status and error queue (*CLS)
    Clear,
    /// Read or set the RF output state
    Output { state: Option<OutputState> },
    /// Read or set the CW frequency
    Freq {
        value: Option<f64>,
        #[arg(short, long, default_value = "MHz")]
        unit: Unit,
    },
    /// Read or set the output level in dBm
    Power {
        #[arg(allow_negative_numbers = true)]
        value: Option<f64>,
    },
    /// Read or set the frequency mode (CW, SWEEP)
    Mode { mode: Option<SweepMode> },
    /// Configure a linear frequency sweep
    Sweep {
        start: f64,
        stop: f64,
        #[arg(short, long, default_value = "MHz")]
        unit: Unit,
        #[arg(long, default_value_t = 0.1)]
        step: f64,
        /// Dwell time per step in ms
        #[arg(long, default_value_t = 5)]
        dwell: u32,
        #[arg(short = 't', long = "type", default_value = "AUTO")]
        sweep_type: SweepType,
        /// Leave the current frequency mode alone before configuring
        #[arg(long)]
        no_force: bool,
        /// Start the sweep once configured
        #[arg(long)]
        run: bool,
    },
    /// Start the configured sweep
    StartSweep,
    /// Stop sweeping (back to CW)
    StopSweep,
}

#[derive(Serialize)]
struct Reading<'a, T: Serialize> {
    quantity: &'a str,
    value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // an explicit --config must load; otherwise fall back to defaults, which
    // is reported once logging is up
    let (mut config, fallback) = match &args.config {
        Some(path) => (load_config(Some(path.as_path()))?, None),
        None => load_config_with_fallback(None),
    };
    if let Some(resource) = &args.resource {
        config.instrument.resource = resource.clone();
    }
    if let Some(sim) = &args.sim {
        config.instrument.simulation = Some(sim.display().to_string());
    }

    let log_level = args
        .log_level
        .clone()
        .unwrap_or(config.logging.log_level.clone());
    initialize_logging(&log_level)?;
    match fallback {
        Some(e) => warn!("Failed to load config ({e}), using defaults"),
        None => info!("Configuration loaded successfully"),
    }
    log_startup_info(&config, args.config.as_ref());

    let mut generator = SignalGenerator::builder()
        .resource(&config.instrument.resource)
        .session_config(config.session_config())
        .driver_config(config.driver.clone())
        .build()?;

    run_command(&mut generator, &args)?;

    for error in generator.take_device_errors() {
        eprintln!("Device error: {error}");
    }
    generator.close()?;
    Ok(())
}

fn run_command(
    generator: &mut SignalGenerator,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = args.json;
    match &args.command {
        Command::Identify => {
            let identity = generator.identify()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&identity)?);
            } else {
                println!("{identity}");
            }
        }
        Command::Reset => generator.reset()?,
        Command::Clear => generator.clear_state()?,
        Command::Errors => {
            let errors = generator.get_errors()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&errors)?);
            } else if errors.is_empty() {
                println!("No error");
            } else {
                for error in errors {
                    println!("{error}");
                }
            }
        }
        Command::Output { state } => match state {
            Some(state) => generator.set_output_state(*state)?,
            None => {
                let on = generator.get_output_state()?;
                print_reading(json, "output", OutputState::from(on), None)?;
            }
        },
        Command::Freq { value, unit } => match value {
            Some(value) => generator.set_center_frequency(*value, *unit)?,
            None => {
                let frequency = generator.get_center_frequency(*unit)?;
                print_reading(json, "frequency", frequency, Some(&unit.to_string()))?;
            }
        },
        Command::Power { value } => match value {
            Some(value) => generator.set_output_power(*value)?,
            None => {
                let power = generator.get_output_power()?;
                print_reading(json, "power", power, Some("dBm"))?;
            }
        },
        Command::Mode { mode } => match mode {
            Some(mode) => generator.set_mode(*mode)?,
            None => {
                let mode = generator.get_mode()?;
                print_reading(json, "mode", mode, None)?;
            }
        },
        Command::Sweep {
            start,
            stop,
            unit,
            step,
            dwell,
            sweep_type,
            no_force,
            run,
        } => {
            let sweep = SweepConfig::new(*start, *stop)
                .unit(*unit)
                .step(*step)
                .dwell_ms(*dwell)
                .sweep_type(*sweep_type)
                .force_sweep_mode(!*no_force)
                .execute(*run);
            info!(
                "Sweep {start} to {stop} {unit}, step {step} {unit}, dwell {dwell} ms, {sweep_type}"
            );
            generator.setup_sweep(&sweep)?;
        }
        Command::StartSweep => generator.start_sweep()?,
        Command::StopSweep => generator.stop_sweep()?,
    }
    Ok(())
}

fn print_reading<T: Serialize + std::fmt::Display>(
    json: bool,
    quantity: &str,
    value: T,
    unit: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let reading = Reading {
            quantity,
            value,
            unit,
        };
        println!("{}", serde_json::to_string(&reading)?);
    } else {
        match unit {
            Some(unit) => println!("{value} {unit}"),
            None => println!("{value}"),
        }
    }
    Ok(())
}

fn log_startup_info(config: &AppConfig, config_path: Option<&PathBuf>) {
    info!("=== siggen ===");
    if let Some(path) = config_path {
        info!("Configuration: {}", path.display());
    }
    match &config.instrument.simulation {
        Some(profile) => info!("Simulated instrument: {profile}"),
        None => info!("Instrument: {}", config.instrument.resource),
    }
    info!(
        "Command confirmation: {}",
        if config.driver.confirm_commands { "on" } else { "off" }
    );
}

fn initialize_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    Ok(())
}
