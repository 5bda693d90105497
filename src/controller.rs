//! Timed dialog controller
//!
//! Turns a call into a [`DialogRequest`], arms its timeout, hands it to the
//! UI thread and blocks the caller until the dialog closes one way or the
//! other. Nothing here returns an error: every failure is logged and becomes
//! the negative outcome for the dialog kind.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PopupContext;
use crate::dialog::{
    ClosedBy, DialogClose, DialogKind, DialogOutcome, DialogReport, DialogRequest, RequestDefaults, Timeout,
    CALL_KINDS, CALL_NAMES,
};
use crate::error::PopupError;
use crate::params::{bind_args, Value};
use crate::timeout::{TimeoutScheduler, TimerHandle};
use crate::ui::{self, DialogCloser, ShowJob, UiHandle};

/// Option key of the default dialog anchor
pub const ANCHOR_KEY: &str = "Dialog.Anchor";

pub struct DialogController {
    ui: UiHandle,
    timers: TimeoutScheduler,
    context: Arc<PopupContext>,
}

impl DialogController {
    /// Controller on the process-wide timeout scheduler
    pub fn new(ui: UiHandle, context: Arc<PopupContext>) -> Self {
        Self::with_scheduler(ui, context, TimeoutScheduler::shared().clone())
    }

    pub fn with_scheduler(ui: UiHandle, context: Arc<PopupContext>, timers: TimeoutScheduler) -> Self {
        Self { ui, timers, context }
    }

    pub fn context(&self) -> &PopupContext {
        &self.context
    }

    pub fn ui(&self) -> &UiHandle {
        &self.ui
    }

    /// Defaults for positional calls: title from settings, anchor from the
    /// options or the primary display center.
    pub fn request_defaults(&self) -> RequestDefaults {
        let center = self.ui.display_center().unwrap_or_default();
        RequestDefaults {
            title: self.context.settings.app_name.clone(),
            anchor: self.context.config.location(ANCHOR_KEY, center),
            ..RequestDefaults::default()
        }
    }

    /// Build a request from positional arguments
    /// (`message, title, preset, hidden, timeout, anchor`)
    pub fn request_from_args(&self, kind: DialogKind, args: &[Value]) -> DialogRequest {
        let defaults = self.request_defaults();
        let bound = bind_args(CALL_NAMES, CALL_KINDS, defaults.values(), args);
        DialogRequest::from_bindings(kind, &bound, &defaults)
    }

    /// Informational message. `true` once the user closed it.
    pub fn notice(&self, args: &[Value]) -> bool {
        let request = self.request_from_args(DialogKind::Notice, args);
        self.show(request).outcome.is_positive()
    }

    /// Yes/no question. `true` only for an explicit yes.
    pub fn confirm(&self, args: &[Value]) -> bool {
        let request = self.request_from_args(DialogKind::Confirm, args);
        self.show(request).outcome.is_positive()
    }

    /// Error message. `true` once the user closed it.
    pub fn error(&self, args: &[Value]) -> bool {
        let request = self.request_from_args(DialogKind::Error, args);
        self.show(request).outcome.is_positive()
    }

    /// Text entry. `None` when cancelled, timed out or unavailable.
    pub fn input(&self, args: &[Value]) -> Option<String> {
        let request = self.request_from_args(DialogKind::Input, args);
        self.show(request).outcome.into_text()
    }

    /// Show `request` and block until it closes.
    ///
    /// Must not be called from async code; use [`show_async`](Self::show_async).
    pub fn show(&self, request: DialogRequest) -> DialogReport {
        let id = Uuid::new_v4();
        let request = self.prepare(request);
        let started = Instant::now();

        if !self.ui.is_interactive() {
            return self.unavailable(id, &request, started);
        }

        let closer = DialogCloser::new();
        let timer = self.arm(id, &request, &closer);

        let close = if self.ui.is_ui_thread() {
            ui::show_in_place(id, &request, &closer)
        } else {
            match self.submit(id, &request, closer) {
                Some(done) => done.blocking_recv().unwrap_or_else(|_| {
                    error!(%id, "UI thread dropped the dialog");
                    DialogClose::Failed
                }),
                None => DialogClose::Failed,
            }
        };

        self.finish(id, &request, close, started, timer)
    }

    /// Show `request` without blocking the calling task
    pub async fn show_async(&self, request: DialogRequest) -> DialogReport {
        let id = Uuid::new_v4();
        let request = self.prepare(request);
        let started = Instant::now();

        if !self.ui.is_interactive() {
            return self.unavailable(id, &request, started);
        }

        let closer = DialogCloser::new();
        let timer = self.arm(id, &request, &closer);

        let close = if self.ui.is_ui_thread() {
            ui::show_in_place(id, &request, &closer)
        } else {
            match self.submit(id, &request, closer) {
                Some(done) => done.await.unwrap_or_else(|_| {
                    error!(%id, "UI thread dropped the dialog");
                    DialogClose::Failed
                }),
                None => DialogClose::Failed,
            }
        };

        self.finish(id, &request, close, started, timer)
    }

    fn prepare(&self, mut request: DialogRequest) -> DialogRequest {
        if request.kind == DialogKind::Input && request.title.is_empty() {
            request.title = self.context.settings.input_title.clone();
        }
        request
    }

    fn unavailable(&self, id: Uuid, request: &DialogRequest, started: Instant) -> DialogReport {
        error!(%id, kind = %request.kind, "{}, dialog not shown", PopupError::Headless);
        DialogReport::new(
            id,
            request.kind,
            DialogOutcome::negative(request.kind),
            ClosedBy::Unavailable,
            started.elapsed(),
        )
    }

    fn arm(&self, id: Uuid, request: &DialogRequest, closer: &DialogCloser) -> Option<TimerHandle> {
        info!(
            %id,
            kind = %request.kind,
            timeout_ms = request.timeout.as_millis(),
            "showing dialog"
        );

        let Timeout::After(after) = request.timeout else {
            return None;
        };
        if self.context.settings.hold_mode {
            debug!(%id, "hold mode: timeout not armed");
            return None;
        }

        let closer = closer.clone();
        Some(self.timers.arm(after, move || {
            if closer.dismiss() {
                debug!(%id, "timeout fired");
            }
        }))
    }

    fn submit(&self, id: Uuid, request: &DialogRequest, closer: DialogCloser) -> Option<oneshot::Receiver<DialogClose>> {
        let (done, done_rx) = oneshot::channel();
        let job = ShowJob {
            id,
            request: request.clone(),
            closer,
            done,
        };
        match self.ui.submit(job) {
            Ok(()) => Some(done_rx),
            Err(e) => {
                error!(%id, "Cannot show dialog: {}", e);
                None
            }
        }
    }

    fn finish(
        &self,
        id: Uuid,
        request: &DialogRequest,
        close: DialogClose,
        started: Instant,
        timer: Option<TimerHandle>,
    ) -> DialogReport {
        // No-op when the timer already fired
        if let Some(timer) = timer {
            timer.cancel();
        }

        let outcome = DialogOutcome::resolve(request, &close);
        let closed_by = ClosedBy::from(&close);
        if closed_by == ClosedBy::Failed {
            warn!(%id, "{} dialog failed, reporting {:?}", request.kind, outcome);
        }
        debug!(%id, ?closed_by, ?outcome, "dialog finished");

        DialogReport::new(id, request.kind, outcome, closed_by, started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, Settings};
    use crate::dialog::UserAction;
    use crate::params::Location;
    use crate::popup_args;
    use crate::toolkit::{Reaction, ScriptedToolkit};
    use crate::ui::UiThread;
    use std::thread::JoinHandle;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(5);

    fn start(toolkit: ScriptedToolkit, context: PopupContext) -> (DialogController, JoinHandle<()>) {
        let (ui, join) = UiThread::spawn(FRAME, move || toolkit).unwrap();
        let timers = TimeoutScheduler::new().unwrap();
        (
            DialogController::with_scheduler(ui, Arc::new(context), timers),
            join,
        )
    }

    #[test]
    fn test_defaults_follow_settings_and_host() {
        let (toolkit, _probe) = ScriptedToolkit::silent();
        let toolkit = toolkit.with_center(Location::new(400, 300));
        let (controller, join) = start(toolkit, PopupContext::default());

        let defaults = controller.request_defaults();
        assert_eq!(defaults.title, "Timed Popups");
        assert_eq!(defaults.anchor, Location::new(400, 300));
        assert_eq!(defaults.timeout, Timeout::Forever);

        drop(controller);
        join.join().unwrap();
    }

    #[test]
    fn test_anchor_option_overrides_center() {
        let (toolkit, _probe) = ScriptedToolkit::silent();
        let context = PopupContext::from_store(ConfigStore::from_text("Dialog.Anchor = 5,6"));
        let (controller, join) = start(toolkit, context);

        let request = controller.request_from_args(DialogKind::Notice, &popup_args!["hi"]);
        assert_eq!(request.anchor, Location::new(5, 6));
        assert_eq!(request.message, "hi");

        drop(controller);
        join.join().unwrap();
    }

    #[test]
    fn test_input_title_falls_back() {
        let (toolkit, probe) = ScriptedToolkit::new(|_| Reaction::respond(UserAction::Submit("x".into())));
        let (controller, join) = start(toolkit, PopupContext::default());

        let answer = controller.input(&popup_args!["Name?", ""]);
        assert_eq!(answer.as_deref(), Some("x"));
        assert_eq!(probe.built()[0].request.title, "Input request");

        drop(controller);
        join.join().unwrap();
    }

    #[test]
    fn test_hold_mode_never_times_out() {
        let (toolkit, probe) =
            ScriptedToolkit::new(|_| Reaction::respond_after(150, UserAction::Acknowledge));
        let context = PopupContext {
            settings: Settings {
                hold_mode: true,
                ..Settings::default()
            },
            ..PopupContext::default()
        };
        let (controller, join) = start(toolkit, context);

        let request = DialogRequest::builder(DialogKind::Notice).timeout_ms(0).build();
        let report = controller.show(request);
        assert_eq!(report.closed_by, ClosedBy::User);
        assert!(report.outcome.is_positive());
        assert_eq!(probe.forced_count(), 0);

        drop(controller);
        join.join().unwrap();
    }

    #[test]
    fn test_headless_returns_negative_without_building() {
        let (toolkit, probe) = ScriptedToolkit::new(|_| Reaction::respond(UserAction::Yes));
        let (controller, join) = start(toolkit.headless(), PopupContext::default());

        assert!(!controller.confirm(&popup_args!["Proceed?"]));
        assert_eq!(controller.input(&popup_args!["Name?"]), None);

        let report = controller.show(DialogRequest::builder(DialogKind::Notice).build());
        assert_eq!(report.closed_by, ClosedBy::Unavailable);
        assert!(probe.built().is_empty());

        drop(controller);
        join.join().unwrap();
    }

    #[test]
    fn test_show_async_reports_user_answer() {
        let (toolkit, _probe) = ScriptedToolkit::new(|_| Reaction::respond_after(20, UserAction::No));
        let (controller, join) = start(toolkit, PopupContext::default());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let report = runtime.block_on(controller.show_async(
            DialogRequest::builder(DialogKind::Confirm).message("Ship it?").build(),
        ));
        assert_eq!(report.outcome, DialogOutcome::Answered(false));
        assert_eq!(report.closed_by, ClosedBy::User);

        drop(controller);
        join.join().unwrap();
    }
}
