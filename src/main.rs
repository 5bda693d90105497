//! popup
//!
//! Shows one timed dialog in the terminal and prints the report as JSON.
//!
//! # Architecture
//!
//! - Main thread: runs the UI loop and owns the terminal
//! - Caller thread: blocks on the dialog like any library user would
//! - Timer worker: dismisses the dialog when its timeout fires
//!
//! # Usage
//!
//! ```bash
//! popup confirm --message "Deploy now?" --timeout 10000
//! popup input --message "Password" --hidden
//! popup --options ./popups.txt options --set Settings.HoldMode=on
//! ```

mod cli;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command, DialogArgs};
use timed_popups::{DialogController, DialogKind, PopupContext, SettingsRegistry, TerminalToolkit, UiThread};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean JSON
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting popup v{}", env!("CARGO_PKG_VERSION"));

    let context = Arc::new(PopupContext::load(args.options.as_deref()));

    match args.command {
        Command::Options { set } => show_options(&context, set),
        command => match command.dialog() {
            Some((kind, dialog)) => run_dialog(context, kind, dialog),
            None => Ok(()),
        },
    }
}

fn run_dialog(context: Arc<PopupContext>, kind: DialogKind, dialog: DialogArgs) -> anyhow::Result<()> {
    let (ui_thread, ui) = UiThread::new(context.settings.poll_interval());

    // The caller thread owns the only UiHandle; the UI loop ends with it
    let caller = thread::Builder::new()
        .name("popup-caller".to_string())
        .spawn(move || {
            let controller = DialogController::new(ui, context);
            let request = dialog.into_request(kind, controller.request_defaults());
            controller.show(request)
        })
        .context("Failed to spawn caller thread")?;

    ui_thread.run(TerminalToolkit::new());

    let report = caller
        .join()
        .map_err(|_| anyhow::anyhow!("caller thread panicked"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.outcome.is_positive() {
        std::process::exit(1);
    }
    Ok(())
}

fn show_options(context: &PopupContext, set: Vec<(String, String)>) -> anyhow::Result<()> {
    let config = &context.config;
    if !set.is_empty() {
        for (key, value) in set {
            config.set(&key, value);
        }
        config.save().context("Failed to save options")?;
    }

    config.dump();
    let mut settings = context.settings.clone();
    SettingsRegistry::standard().apply(&mut settings, config);
    let output = json!({
        "file": config.file(),
        "options": config.options(),
        "settings": {
            "app_name": settings.app_name,
            "input_title": settings.input_title,
            "hold_mode": settings.hold_mode,
            "poll_interval_ms": settings.poll_interval_ms,
        },
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
