//! Timed Popups
//!
//! Blocking notice, confirm, error and input dialogs that any thread can
//! request. Dialogs run on one UI thread; each may carry a timeout after
//! which it closes itself and the caller gets the negative outcome.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use timed_popups::{popup_args, DialogController, PopupContext, TerminalToolkit, UiThread};
//!
//! let context = Arc::new(PopupContext::load(None));
//! let (ui_thread, ui) = UiThread::new(Duration::from_millis(16));
//! let worker = std::thread::spawn(move || {
//!     let popups = DialogController::new(ui, context);
//!     popups.confirm(&popup_args!["Deploy now?", "Release", "", false, 10_000])
//! });
//! ui_thread.run(TerminalToolkit::new());
//! let confirmed = worker.join().unwrap();
//! ```

pub mod config;
pub mod controller;
pub mod dialog;
pub mod error;
pub mod params;
pub mod timeout;
pub mod toolkit;
pub mod ui;

pub use config::{ConfigStore, PopupContext, Settings, SettingsRegistry};
pub use controller::DialogController;
pub use dialog::{
    ClosedBy, DialogKind, DialogOutcome, DialogReport, DialogRequest, RequestDefaults, Timeout, UserAction, FOREVER,
};
pub use error::{PopupError, Result};
pub use params::{bind_args, Bindings, Kind, Location, ParamSpec, Value};
pub use timeout::{TimeoutScheduler, TimerHandle};
pub use toolkit::{DialogToolkit, Reaction, ScriptProbe, ScriptedToolkit, TerminalToolkit};
pub use ui::{UiHandle, UiThread};
