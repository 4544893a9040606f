mod activators;
mod cli;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use strata_core::kernel::bootstrap::Application;
use strata_core::kernel::error::{Error, Result};
use strata_core::plugin_system::{LifecycleCoordinator, PluginState, ResolutionReport};
use strata_core::storage::{ConfigFormat, RuntimeConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match execute(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Route `log` records from strata-core through a tracing fmt subscriber on stderr
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}

async fn execute(args: CliArgs) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load(path).await?,
        None => RuntimeConfig::default(),
    };
    if let Some(dir) = args.plugins_dir {
        config.plugins_dir = dir;
    }

    match args.command {
        Commands::Config { format } => {
            let format = ConfigFormat::from_extension(format.extension())
                .ok_or_else(|| Error::from(format!("{} output is not supported by this build", format.extension())))?;
            println!("{}", config.serialize(format)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve => {
            let app = Application::new(config, activators::registry())?;
            load(&app).await?;
            let resolution = app.resolve().await?;
            print_plan(&app.coordinator(), resolution.plan.ids()).await;
            print_report(&resolution.report);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run => {
            let app = Application::new(config, activators::registry())?;
            load(&app).await?;
            run(&app).await
        }
    }
}

async fn load(app: &Application) -> Result<()> {
    let loaded = app.load_plugins().await?;
    println!(
        "Loaded {} plugin(s) from {}",
        loaded.installed.len(),
        app.config().plugins_dir.display()
    );
    for (path, e) in &loaded.failures {
        warn!("Skipped manifest {}", path.display());
        println!("Skipped {}: {}", path.display(), e);
    }
    Ok(())
}

async fn run(app: &Application) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling activation");
                cancel.cancel();
            }
        })
    };

    let started = app.start(cancel).await;
    watcher.abort();

    let code = match started {
        Ok((resolution, summary)) => {
            print_plan(&app.coordinator(), resolution.plan.ids()).await;
            print_report(&resolution.report);
            println!("Activated: {}", summary.started.join(", "));
            if !summary.dormant.is_empty() {
                println!("Dormant: {}", summary.dormant.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(Error::PluginSystem(e)) => {
            println!("Activation failed: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => return Err(e),
    };

    print_states(&app.coordinator()).await;

    let stopped = app.shutdown().await?;
    println!("Stopped: {}", stopped.stopped.join(", "));
    if !stopped.refused.is_empty() {
        println!("Still active (not stoppable): {}", stopped.refused.join(", "));
    }
    if !stopped.held.is_empty() {
        println!("Still active (needed by active plugins): {}", stopped.held.join(", "));
    }
    Ok(code)
}

async fn print_plan(coordinator: &LifecycleCoordinator, ids: &[String]) {
    println!("Activation plan:");
    if ids.is_empty() {
        println!("  (empty)");
    }
    for (position, id) in ids.iter().enumerate() {
        match coordinator.descriptor(id).await {
            Some(d) => println!(
                "  {}. {} {} (start level {})",
                position + 1,
                id,
                d.version(),
                d.start_level()
            ),
            None => println!("  {}. {}", position + 1, id),
        }
    }
}

fn print_report(report: &ResolutionReport) {
    if report.is_clean() {
        return;
    }
    println!("Unresolved plugins:");
    for line in report.to_string().lines() {
        println!("  {}", line);
    }
}

async fn print_states(coordinator: &LifecycleCoordinator) {
    println!("Plugin states:");
    for (id, state) in coordinator.states().await {
        let marker = if state == PluginState::Active { "*" } else { " " };
        println!("  {} {}: {}", marker, id, state);
    }
}
