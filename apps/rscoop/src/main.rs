//! rscoop - run Scoop package operations concurrently
//!
//! Every package operation is tracked by the ops crate; this binary starts
//! them, streams their output and reports how each one ended.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{AutoUpdateCommands, Cli, Commands, GlobalArgs, WarningCommands};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use rscoop_config::{AutoUpdateStore, Config, WarningPatch, WarningStore};
use rscoop_events::{backend_channel, EventReceiver, EventSender};
use rscoop_ops::{
    OperationStatus, OperationsService, OperationsServiceBuilder, ProcessBackend,
    WarningCoordinator,
};
use rscoop_types::StartRequest;
use std::process;
use std::sync::Arc;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting rscoop v{}", env!("CARGO_PKG_VERSION"));

    // File config (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);

    let warning = WarningCoordinator::load(WarningStore::at_default_path()?, config.warning).await?;
    let renderer = OutputRenderer::new(cli.global.json);

    match cli.command.start_requests() {
        Some(requests) => run_operations(config, warning, renderer, &requests).await,
        None => match cli.command {
            Commands::Warning(command) => run_warning_command(&warning, &renderer, command).await,
            Commands::AutoUpdate(command) => {
                run_auto_update_command(config, warning, renderer, command).await
            }
            _ => Ok(()),
        },
    }
}

fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(program) = &global.scoop {
        config.backend.program.clone_from(program);
    }
}

/// Service builder wired to a process backend
fn service_builder(config: Config, warning: WarningCoordinator, events: EventSender) -> OperationsServiceBuilder {
    let (backend_tx, backend_rx) = backend_channel();
    let backend = ProcessBackend::new(config.backend.program.clone(), backend_tx);

    OperationsService::builder()
        .with_config(config)
        .with_warning(warning)
        .with_event_sender(events)
        .with_backend(Arc::new(backend))
        .with_backend_events(backend_rx)
}

/// Start every request concurrently and wait until all have finished
async fn run_operations(
    config: Config,
    warning: WarningCoordinator,
    renderer: OutputRenderer,
    requests: &[StartRequest],
) -> Result<(), CliError> {
    let (event_sender, event_receiver) = rscoop_events::channel();
    let service = service_builder(config, warning, event_sender).build()?;

    let mut handler = EventHandler::new(renderer.clone());
    for request in requests {
        let id = service.start_operation(request)?;
        handler.track(id);
    }

    let interrupted = wait_for_operations(event_receiver, &mut handler).await;

    renderer.render_operations(&service.manager().operations())?;
    service.shutdown().await;

    if interrupted {
        Err(CliError::Interrupted(handler.pending()))
    } else if handler.failed() > 0 {
        Err(CliError::OperationsFailed(handler.failed()))
    } else {
        info!("All operations completed successfully");
        Ok(())
    }
}

/// Drain events until every tracked operation is terminal; true on Ctrl-C
async fn wait_for_operations(mut event_receiver: EventReceiver, handler: &mut EventHandler) -> bool {
    while !handler.is_done() {
        select! {
            event = event_receiver.recv() => match event {
                Some(event) => handler.handle_event(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => return true,
        }
    }
    false
}

async fn run_auto_update_command(
    mut config: Config,
    warning: WarningCoordinator,
    renderer: OutputRenderer,
    command: AutoUpdateCommands,
) -> Result<(), CliError> {
    let store = AutoUpdateStore::at_default_path()?;

    let update_all = match command {
        AutoUpdateCommands::Status => {
            let last_run_ms = store.load().await?.last_run_ms;
            renderer.render_auto_update_status(&config.auto_update, last_run_ms)?;
            return Ok(());
        }
        AutoUpdateCommands::Watch => {
            return watch_auto_update(config, warning, renderer, store).await;
        }
        AutoUpdateCommands::Run { update_all } => update_all,
    };

    config.auto_update.update_all |= update_all;
    let (event_sender, mut event_receiver) = rscoop_events::channel();
    let service = service_builder(config, warning, event_sender)
        .with_auto_update_store(store)
        .build()?;
    let updater = service.auto_updater();
    let mut handler = EventHandler::new(renderer.clone());

    let run = {
        let pending = updater.run_once();
        tokio::pin!(pending);
        loop {
            select! {
                run = &mut pending => break Some(run),
                Some(event) = event_receiver.recv() => handler.handle_event(event),
                _ = tokio::signal::ctrl_c() => break None,
            }
        }
    };
    while let Ok(event) = event_receiver.try_recv() {
        handler.handle_event(event);
    }

    let operations = service.manager().operations();
    renderer.render_operations(&operations)?;
    service.shutdown().await;

    match run {
        None => Err(CliError::Interrupted(
            operations
                .iter()
                .filter(|op| op.status() == OperationStatus::InProgress)
                .count(),
        )),
        Some(run) if run.succeeded() => Ok(()),
        Some(_) => Err(CliError::OperationsFailed(handler.failed().max(1))),
    }
}

/// Run the update schedule in the foreground until Ctrl-C
async fn watch_auto_update(
    config: Config,
    warning: WarningCoordinator,
    renderer: OutputRenderer,
    store: AutoUpdateStore,
) -> Result<(), CliError> {
    let auto_update = config.auto_update;
    let (event_sender, mut event_receiver) = rscoop_events::channel();
    let service = service_builder(config, warning, event_sender)
        .with_auto_update_store(store)
        .with_scheduled_updates(true)
        .build()?;

    if !service.is_scheduling_updates() {
        renderer.render_auto_update_status(&auto_update, None)?;
        service.shutdown().await;
        return Ok(());
    }

    info!(interval = %auto_update.interval, "watching for scheduled updates");
    let mut handler = EventHandler::new(renderer);
    loop {
        select! {
            event = event_receiver.recv() => match event {
                Some(event) => handler.handle_event(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    service.shutdown().await;
    Ok(())
}

async fn run_warning_command(
    warning: &WarningCoordinator,
    renderer: &OutputRenderer,
    command: WarningCommands,
) -> Result<(), CliError> {
    let patch = match command {
        WarningCommands::Show => {
            renderer.render_warning_config(&warning.current())?;
            return Ok(());
        }
        WarningCommands::Dismiss => {
            let config = warning.dismiss().await?;
            renderer.render_warning_config(&config)?;
            return Ok(());
        }
        WarningCommands::Enable => WarningPatch {
            enabled: Some(true),
            ..WarningPatch::default()
        },
        WarningCommands::Disable => WarningPatch {
            enabled: Some(false),
            ..WarningPatch::default()
        },
        WarningCommands::Threshold { count } => WarningPatch {
            threshold: Some(count),
            ..WarningPatch::default()
        },
    };

    let config = warning.apply(&patch).await?;
    renderer.render_warning_config(&config)?;
    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. JSON mode keeps stdout clean for
/// the result document, so logs go to stderr as JSON.
fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,rscoop=debug,rscoop_ops=debug"
    } else {
        "warn,rscoop=warn,rscoop_ops=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
