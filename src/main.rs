//! Surface Remap - drive a large set of named targets from a small MIDI surface

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surface_remap::catalog::Catalog;
use surface_remap::cli;
use surface_remap::config::{AppConfig, ConfigWatcher};
use surface_remap::engine::{build_settings, Engine, EngineActor, EngineHandle};
use surface_remap::host::console::LogSink;
use surface_remap::host::{ConsoleHost, Host, RawSink};
use surface_remap::paths::AppPaths;
use surface_remap::surface::{self, MidiOutSink, SurfaceInput};

/// Surface Remap - modifier buttons swap which target each knob and fader drives
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: detected, see docs)
    #[arg(short, long, env = "SURFACE_REMAP_CONFIG")]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write a daily rolling log file into the logs directory
    #[arg(long)]
    log_file: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print the catalog (controls, mapping-sets and target names)
    #[arg(long)]
    list_targets: bool,

    /// Interactive mode without hardware
    #[arg(long)]
    repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = match &args.config {
        Some(path) => AppPaths::for_config(path),
        None => AppPaths::detect(),
    };
    if args.log_file {
        paths.ensure_directories()?;
    }

    let _log_guard = init_logging(&args.log_level, args.log_file.then(|| paths.logs_dir.clone()))?;

    if args.list_ports {
        surface::list_ports_formatted();
        return Ok(());
    }

    let config_path = paths.config.to_string_lossy().to_string();
    info!("Starting Surface Remap v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path);

    if args.list_targets {
        let config = AppConfig::load(&config_path).await?;
        print_targets(&Catalog::from_config(&config)?);
        return Ok(());
    }

    let (config_watcher, initial_config) = ConfigWatcher::new(config_path).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let catalog = Catalog::from_config(&initial_config)?;

    let sink: Box<dyn RawSink> = match (&initial_config.midi.output_port, args.repl) {
        (Some(pattern), false) => Box::new(MidiOutSink::connect(pattern)?),
        _ => Box::new(LogSink),
    };
    let host = Arc::new(ConsoleHost::from_config(&initial_config.host, &catalog, sink));

    let engine = Engine::from_config(&initial_config, catalog.clone(), host.clone())?;
    let engine = EngineActor::spawn(engine);

    if args.repl {
        cli::run_repl(engine.clone(), catalog).await?;
        engine.shutdown();
        return Ok(());
    }

    run_app(engine, host, &initial_config, catalog, config_watcher, shutdown_signal()).await?;

    info!("Surface Remap shutdown complete");
    Ok(())
}

async fn run_app(
    engine: EngineHandle,
    host: Arc<ConsoleHost>,
    config: &AppConfig,
    catalog: Catalog,
    mut config_watcher: ConfigWatcher,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let pattern = config
        .midi
        .input_port
        .as_deref()
        .ok_or_else(|| anyhow!("midi.input_port is not configured (use --repl to run without hardware)"))?;

    let passthrough: Arc<dyn Host> = host.clone();
    let input = SurfaceInput::connect(pattern, engine.clone(), passthrough)?;
    info!("✅ Listening on '{}'", input.port_name());
    info!("Ready to process MIDI events!");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(update) = config_watcher.next_update() => {
                info!("📝 Configuration file changed, applying live settings...");
                if update.settings.is_some() {
                    engine.apply_settings(build_settings(config_watcher.current(), &catalog));
                }
                if let Some(enabled) = update.also_forward_raw {
                    engine.set_also_forward_raw(enabled);
                }
                if !update.restart_required.is_empty() {
                    warn!(
                        "⚠️  Changes to {} take effect after a restart",
                        update.restart_required.join(", ")
                    );
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    drop(input);
    engine.shutdown();
    info!("{} values dispatched this session", host.dispatch_count());

    Ok(())
}

fn init_logging(level: &str, log_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "surface-remap.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_targets(catalog: &Catalog) {
    use colored::*;

    println!("\n{}", "=== Catalog ===".bold().cyan());
    println!(
        "  {} controls, {} mapping-sets, {} targets",
        catalog.len().to_string().green(),
        catalog.mapping_sets().to_string().green(),
        catalog.target_names().len().to_string().green()
    );

    for (id, entry) in catalog.controls() {
        println!(
            "\n  {} {}",
            entry.label.bright_white().bold(),
            format!("{:?} {}", entry.kind, id).dimmed()
        );
        for (set, target) in entry.targets.iter().enumerate() {
            match target {
                Some(name) => println!("    [{}] {}", set.to_string().yellow(), name),
                None => println!("    [{}] {}", set.to_string().yellow(), "-".dimmed()),
            }
        }
    }
    println!();
}
