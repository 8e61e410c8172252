/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::{error, info};

use autopinger::config::{Config, Tuning};
use autopinger::daemon;
use autopinger::error::DaemonError;
use autopinger::gpio::ButtonEdge;
use autopinger::pwm::PwmDuty;
use autopinger::supervisor::{Multiplexer, Supervisor};
use autopinger::sysfs::Sysfs;
use autopinger::timer::IntervalTimer;
use autopinger::worker::{ProbeCommand, ProcessLauncher};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Ping a host when a button is pressed and/or on a fixed interval.
///
/// The GPIO pin for the button must support interrupts (edge notification
/// through sysfs).  --use-pwm-indicator assumes pwmchip0 has been enabled in
/// the device tree.
///
/// Example:
///   autopinger --ping-IP 192.168.1.1 --button-gpio 1013 --use-pwm-indicator -d
#[derive(Debug, Parser)]
#[command(name = "autopinger", long_about = None)]
struct Cli {
    /// The IP address to ping on every activation.
    #[arg(long = "ping-IP", value_name = "IP")]
    ping_ip: String,

    /// The GPIO pin to monitor (required unless --auto is given).
    #[arg(long = "button-gpio", value_name = "INT", required_unless_present = "auto")]
    button_gpio: Option<u32>,

    /// Pulse an LED connected to PWM0 while pinging.
    #[arg(long = "use-pwm-indicator", default_value_t = false)]
    use_pwm_indicator: bool,

    /// Also ping every SECONDS seconds (first run one second after start).
    #[arg(long = "auto", value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    auto: Option<u64>,

    /// Detach into the background.
    #[arg(short = 'd', default_value_t = false)]
    detach: bool,

    /// Path to an optional YAML tuning file.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Print `message` and the usage banner to stdout, then exit 1.
fn exit_usage(message: &str) -> ! {
    println!();
    println!("{}", message.trim_end());
    println!();
    println!("{}", Cli::command().render_help());
    process::exit(1);
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // Help goes to stdout; nothing useful to do if that fails.
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => exit_usage(&e.to_string()),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = parse_cli();

    // ── Load tuning ───────────────────────────────────────────────────────────
    let tuning = match &cli.config {
        Some(path) => match Tuning::load_from_file(path) {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to load configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => Tuning::default(),
    };

    let config = match Config::new(
        cli.ping_ip.clone(),
        cli.button_gpio,
        cli.use_pwm_indicator,
        cli.auto,
        tuning,
    ) {
        Ok(c) => c,
        Err(e) => exit_usage(&e.to_string()),
    };

    info!(
        target_host  = %config.target_host,
        button_gpio  = ?config.button_gpio,
        pwm          = config.pwm_enabled,
        auto_secs    = config.auto_interval_seconds,
        window_secs  = config.active_window_seconds,
        detach       = cli.detach,
        "Configuration"
    );

    if let Err(e) = start(config, cli.detach) {
        error!("{e}");
        process::exit(e.exit_code());
    }
}

/// Bring up peripherals, then hand everything to the supervisor.
fn start(config: Config, detach: bool) -> Result<(), DaemonError> {
    if detach {
        daemon::detach()?;
    }

    info!("*** Initializing System ***");
    let sysfs = Sysfs::new(config.tuning.sysfs_root.clone(), config.settle_timeout());

    let button_value = match config.button_gpio {
        Some(gpio) => Some((sysfs.prepare_button(gpio)?, gpio)),
        None => None,
    };
    let duty: Option<PwmDuty> = if config.pwm_enabled {
        Some(sysfs.prepare_pwm(config.tuning.pwm_chip, config.tuning.pwm_channel)?)
    } else {
        None
    };

    // One thread of control: the pulse task and the supervisor share it.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)?;

    runtime.block_on(async move {
        let button = match button_value {
            Some((file, gpio)) => Some(ButtonEdge::register(file, gpio)?),
            None => None,
        };
        let timer = match config.auto_interval() {
            Some(interval) => Some(IntervalTimer::arm(config.initial_delay(), interval)?),
            None => None,
        };
        let mut mux = Multiplexer::new(button, timer);

        let shutdown = daemon::shutdown_signal().map_err(DaemonError::Runtime)?;

        let command = ProbeCommand::ping(
            config.tuning.ping_program.clone(),
            config.tuning.ping_count,
            config.target_host.clone(),
        );
        let mut supervisor =
            Supervisor::new(ProcessLauncher, duty, command, config.active_window());

        supervisor.run(&mut mux, shutdown).await?;
        info!(
            activations = supervisor.activations(),
            "autopinger stopped"
        );
        Ok::<(), DaemonError>(())
    })
}
