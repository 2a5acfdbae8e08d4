// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! streamlib-clock CLI
//!
//! Runs a small demo clock graph against the scheduler, or prints how it
//! would be scheduled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use streamlib_clock::{
    from_secs, install_signal_handlers, shared_source, Clock, ClockOptions, ClockRegistry,
    ClockSettings, ClockSync, SchedulerSignals, SyncMode,
};
use tracing_subscriber::EnvFilter;

mod demo_sources;

use demo_sources::{Meter, Tone};

/// How often the main thread checks whether every clock has stopped.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "streamlib-clock")]
#[command(author, version, about = "Run and inspect streamlib clock graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo graph until interrupted or the duration elapses
    Run {
        #[command(flatten)]
        graph: GraphArgs,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECONDS")]
        duration: Option<f64>,
    },

    /// Print the demo graph without starting it
    Dump {
        #[command(flatten)]
        graph: GraphArgs,
    },

    /// Print the effective settings as YAML
    Config {
        /// Directory containing streamlib-clock.yaml
        #[arg(long, value_name = "DIR")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct GraphArgs {
    /// Directory containing streamlib-clock.yaml
    #[arg(long, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Sync mode of the main clock (auto, cpu, none, passive)
    #[arg(long, default_value = "auto")]
    sync: SyncMode,

    /// Override the frame duration, in seconds
    #[arg(long, value_name = "SECONDS")]
    frame_duration: Option<f64>,

    /// Detach failing sources instead of exiting
    #[arg(long)]
    allow_streaming_errors: bool,

    /// Add a passive sub-clock driving a meter output
    #[arg(long)]
    sub_clock: bool,

    /// Make the demo output fail on this frame
    #[arg(long, value_name = "FRAME")]
    fail_at: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { graph, duration } => {
            let exit_code = run(&graph, duration.map(from_secs))?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Commands::Dump { graph } => {
            let settings = graph_settings(&graph)?;
            let registry = ClockRegistry::new(settings, SchedulerSignals::new());
            let _clock = build_graph(&registry, &graph)?;
            print!("{}", registry.dump());
        }
        Commands::Config { config } => {
            let settings = read_settings(config.as_deref())?;
            let yaml = serde_yaml::to_string(&settings).context("Failed to serialize settings")?;
            print!("{}", yaml);
        }
    }

    Ok(())
}

fn run(graph: &GraphArgs, duration: Option<Duration>) -> Result<i32> {
    let settings = graph_settings(graph)?;
    let signals = SchedulerSignals::new();
    install_signal_handlers(&signals).context("Failed to install signal handlers")?;

    let registry = ClockRegistry::new(settings, Arc::clone(&signals));
    let clock = build_graph(&registry, graph)?;

    registry.start_pending().context("Failed to start clocks")?;
    if graph.sync == SyncMode::Passive {
        tracing::warn!("Main clock is passive: nothing will tick it");
    }
    tracing::info!("Running {}", clock.descr());

    wait_for_shutdown(&registry, duration);

    registry.stop_all();
    registry.join_all();

    let exit_code = signals.exit_code();
    tracing::info!("Exiting with code {}", exit_code);
    Ok(exit_code)
}

/// Block until shutdown is requested, the duration elapses, or every clock
/// has stopped on its own.
fn wait_for_shutdown(registry: &Arc<ClockRegistry>, duration: Option<Duration>) {
    let signals = registry.signals();
    let shutdown = signals.subscribe();
    let deadline = duration.map(|duration| Instant::now() + duration);

    loop {
        let wait = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::info!("Run duration elapsed");
                    signals.request_shutdown(0);
                    return;
                }
                remaining.min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };

        if let Ok(code) = shutdown.recv_timeout(wait) {
            tracing::debug!("Shutdown received (exit code {})", code);
            return;
        }

        if registry
            .clocks()
            .iter()
            .all(|clock| clock.sync() == ClockSync::Stopped)
        {
            tracing::info!("All clocks stopped");
            return;
        }
    }
}

fn build_graph(registry: &Arc<ClockRegistry>, graph: &GraphArgs) -> Result<Clock> {
    let clock = registry.create_clock(
        ClockOptions::new(graph.sync)
            .with_id("main")
            .with_position("command line"),
    );
    clock.attach(&shared_source(Tone::new("tone", graph.fail_at)));

    if graph.sub_clock {
        let meter_clock = clock
            .create_sub_clock("meter")
            .context("Failed to create meter sub-clock")?;
        meter_clock.attach(&shared_source(Meter::new("meter", 25)));
    }

    Ok(clock)
}

fn graph_settings(graph: &GraphArgs) -> Result<ClockSettings> {
    let mut settings = read_settings(graph.config.as_deref())?;
    if let Some(frame_duration) = graph.frame_duration {
        settings.frame_duration = frame_duration;
    }
    if graph.allow_streaming_errors {
        settings.allow_streaming_errors = true;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn read_settings(config: Option<&Path>) -> Result<ClockSettings> {
    match config {
        Some(dir) => ClockSettings::load(dir)
            .with_context(|| format!("Failed to load settings from {}", dir.display())),
        None => Ok(ClockSettings::load_or_default(Path::new("."))),
    }
}
