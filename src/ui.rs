//! UI Scheduling Thread
//!
//! One designated thread owns the host toolkit. Other threads hand it work
//! through a task queue; a caller that wants a dialog blocks on a one-shot
//! channel until the UI thread reports how the dialog closed.
//!
//! While a dialog is showing, the UI thread keeps pumping posted closures.
//! Dialog jobs that arrive meanwhile wait in a FIFO queue and are shown one
//! at a time.

use parking_lot::{Condvar, Mutex};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::dialog::{DialogClose, DialogRequest};
use crate::error::{PopupError, Result};
use crate::params::Location;
use crate::toolkit::{ArtifactId, CloseReason, DialogToolkit};

/// How long callers wait for the UI thread to report its capabilities
const STARTUP_WAIT: Duration = Duration::from_secs(5);

type Task = Box<dyn FnOnce() + Send>;

enum UiTask {
    Run(Task),
    Show(ShowJob),
}

/// A dialog waiting for the UI thread, plus the channel that releases its caller
pub(crate) struct ShowJob {
    pub id: Uuid,
    pub request: DialogRequest,
    pub closer: DialogCloser,
    pub done: oneshot::Sender<DialogClose>,
}

/// Asks the UI thread to close one dialog programmatically
#[derive(Debug, Clone, Default)]
pub struct DialogCloser {
    dismissed: Arc<AtomicBool>,
}

impl DialogCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the close. Returns `true` for the first request only.
    pub fn dismiss(&self) -> bool {
        !self.dismissed.swap(true, Ordering::AcqRel)
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy)]
struct Capabilities {
    interactive: bool,
    display_center: Option<Location>,
}

struct Shared {
    thread: OnceLock<ThreadId>,
    caps: Mutex<Option<Capabilities>>,
    ready: Condvar,
}

/// Cloneable entry point to the UI thread
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::Sender<UiTask>,
    shared: Arc<Shared>,
}

impl UiHandle {
    /// Whether the calling thread is the UI thread
    pub fn is_ui_thread(&self) -> bool {
        self.shared.thread.get() == Some(&thread::current().id())
    }

    /// Whether the host can show dialogs. Waits briefly for a UI thread that
    /// is still starting.
    pub fn is_interactive(&self) -> bool {
        self.capabilities().map(|c| c.interactive).unwrap_or(false)
    }

    /// Primary display center as reported by the host
    pub fn display_center(&self) -> Option<Location> {
        self.capabilities().and_then(|c| c.display_center)
    }

    fn capabilities(&self) -> Option<Capabilities> {
        let deadline = Instant::now() + STARTUP_WAIT;
        let mut caps = self.shared.caps.lock();
        while caps.is_none() {
            if self.shared.ready.wait_until(&mut caps, deadline).timed_out() {
                break;
            }
        }
        *caps
    }

    /// Queue a closure for the UI thread
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(UiTask::Run(Box::new(f)))
            .map_err(|_| PopupError::UiClosed)
    }

    /// Run a closure on the UI thread and wait for its result. Runs inline
    /// when called on the UI thread. Must not be called from inside an async
    /// runtime.
    pub fn invoke<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_ui_thread() {
            return Ok(f());
        }
        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(f());
        })?;
        rx.blocking_recv().map_err(|_| PopupError::UiClosed)
    }

    /// Queue a dialog job. On failure the job is dropped, which closes its
    /// completion channel.
    pub(crate) fn submit(&self, job: ShowJob) -> Result<()> {
        self.tx
            .send(UiTask::Show(job))
            .map_err(|_| PopupError::UiClosed)
    }
}

/// The UI loop, before it runs
pub struct UiThread {
    rx: mpsc::Receiver<UiTask>,
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl UiThread {
    /// `poll_interval` is the frame time of the modal loop
    pub fn new(poll_interval: Duration) -> (Self, UiHandle) {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            thread: OnceLock::new(),
            caps: Mutex::new(None),
            ready: Condvar::new(),
        });
        let handle = UiHandle {
            tx,
            shared: shared.clone(),
        };
        let ui = Self {
            rx,
            shared,
            poll_interval,
        };
        (ui, handle)
    }

    /// Run the loop on the current thread until every [`UiHandle`] is dropped
    pub fn run<T>(self, toolkit: T)
    where
        T: DialogToolkit + 'static,
    {
        let _ = self.shared.thread.set(thread::current().id());
        let caps = Capabilities {
            interactive: toolkit.is_interactive(),
            display_center: toolkit.primary_display_center(),
        };
        info!(
            interactive = caps.interactive,
            center = ?caps.display_center,
            "UI thread running"
        );
        *self.shared.caps.lock() = Some(caps);
        self.shared.ready.notify_all();

        let runtime = Rc::new(Runtime {
            toolkit: RefCell::new(Box::new(toolkit)),
            tasks: self.rx,
            queued: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
            poll_interval: self.poll_interval,
        });

        RUNTIME.with(|slot| *slot.borrow_mut() = Some(runtime.clone()));
        runtime.run_loop();
        RUNTIME.with(|slot| slot.borrow_mut().take());

        info!("UI thread stopped");
    }

    /// Run the loop on a dedicated `popup-ui` thread. The toolkit is built on
    /// that thread.
    pub fn spawn<T, F>(poll_interval: Duration, make_toolkit: F) -> std::io::Result<(UiHandle, JoinHandle<()>)>
    where
        T: DialogToolkit + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (ui, handle) = Self::new(poll_interval);
        let join = thread::Builder::new()
            .name("popup-ui".to_string())
            .spawn(move || ui.run(make_toolkit()))?;
        Ok((handle, join))
    }
}

thread_local! {
    static RUNTIME: RefCell<Option<Rc<Runtime>>> = const { RefCell::new(None) };
}

fn current_runtime() -> Option<Rc<Runtime>> {
    RUNTIME.with(|slot| slot.borrow().clone())
}

/// Show a dialog on the calling thread, which must be the UI thread
pub(crate) fn show_in_place(id: Uuid, request: &DialogRequest, closer: &DialogCloser) -> DialogClose {
    match current_runtime() {
        Some(runtime) => runtime.show_guarded(id, request, closer),
        None => {
            error!(%id, "show_in_place called off the UI thread");
            DialogClose::Failed
        }
    }
}

/// UI-thread state. Borrows of the toolkit are held for one call at a time
/// so nested tasks can reach it again.
struct Runtime {
    toolkit: RefCell<Box<dyn DialogToolkit>>,
    tasks: mpsc::Receiver<UiTask>,
    /// Dialog jobs waiting for the current dialog to close
    queued: RefCell<VecDeque<ShowJob>>,
    /// Number of modal loops on the stack
    depth: Cell<usize>,
    poll_interval: Duration,
}

impl Runtime {
    fn run_loop(&self) {
        loop {
            while let Some(job) = self.next_queued() {
                self.show(job);
            }
            match self.tasks.recv() {
                Ok(task) => self.dispatch(task),
                Err(_) => break,
            }
        }
    }

    fn next_queued(&self) -> Option<ShowJob> {
        self.queued.borrow_mut().pop_front()
    }

    fn dispatch(&self, task: UiTask) {
        match task {
            UiTask::Run(f) => run_guarded(f),
            UiTask::Show(job) if self.depth.get() > 0 => self.queued.borrow_mut().push_back(job),
            UiTask::Show(job) => self.show(job),
        }
    }

    fn show(&self, job: ShowJob) {
        let ShowJob {
            id,
            request,
            closer,
            done,
        } = job;
        let close = self.show_guarded(id, &request, &closer);
        if done.send(close).is_err() {
            debug!(%id, "caller stopped waiting");
        }
    }

    fn show_guarded(&self, id: Uuid, request: &DialogRequest, closer: &DialogCloser) -> DialogClose {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_modal(id, request, closer))) {
            Ok(close) => close,
            Err(_) => {
                error!(%id, "Toolkit panicked while showing {} dialog", request.kind);
                DialogClose::Failed
            }
        }
    }

    /// Build, show and pump one dialog until the user or the timer closes it.
    /// The artifact is disposed before this returns.
    fn run_modal(&self, id: Uuid, request: &DialogRequest, closer: &DialogCloser) -> DialogClose {
        if closer.is_dismissed() {
            debug!(%id, "dismissed before it was shown");
            return DialogClose::Dismissed;
        }

        let built = self.toolkit.borrow_mut().build(request);
        let artifact = match built {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(%id, "Failed to build {} dialog: {}", request.kind, e);
                return DialogClose::Failed;
            }
        };
        debug!(%id, ?artifact, kind = %request.kind, "dialog shown");

        let _depth = DepthGuard::enter(&self.depth);
        loop {
            let polled = panic::catch_unwind(AssertUnwindSafe(|| {
                self.toolkit.borrow_mut().poll(artifact, self.poll_interval)
            }))
            .unwrap_or_else(|_| Err(PopupError::Toolkit("panicked while showing".to_string())));
            match polled {
                Ok(Some(action)) => {
                    self.dispose(id, artifact, CloseReason::User);
                    debug!(%id, ?action, "closed by user");
                    return DialogClose::User(action);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(%id, "Dialog failed while showing: {}", e);
                    self.dispose(id, artifact, CloseReason::Error);
                    return DialogClose::Failed;
                }
            }

            if closer.is_dismissed() {
                self.dispose(id, artifact, CloseReason::Forced);
                debug!(%id, "closed by timeout");
                return DialogClose::Dismissed;
            }

            self.pump();
        }
    }

    /// Close a built artifact. A panicking close is retried once as an
    /// error close so the artifact never outlives its request.
    fn dispose(&self, id: Uuid, artifact: ArtifactId, reason: CloseReason) {
        let closed = panic::catch_unwind(AssertUnwindSafe(|| self.toolkit.borrow_mut().close(artifact, reason)));
        if closed.is_ok() {
            return;
        }
        error!(%id, ?artifact, "Toolkit panicked while closing dialog");
        if reason != CloseReason::Error {
            let retried =
                panic::catch_unwind(AssertUnwindSafe(|| self.toolkit.borrow_mut().close(artifact, CloseReason::Error)));
            if retried.is_err() {
                error!(%id, ?artifact, "Dialog could not be disposed");
            }
        }
    }

    /// Run posted closures, park dialog jobs, and release parked jobs whose
    /// timer already fired.
    fn pump(&self) {
        while let Ok(task) = self.tasks.try_recv() {
            match task {
                UiTask::Run(f) => run_guarded(f),
                UiTask::Show(job) => self.queued.borrow_mut().push_back(job),
            }
        }
        self.release_dismissed();
    }

    fn release_dismissed(&self) {
        let expired: Vec<ShowJob> = {
            let mut queued = self.queued.borrow_mut();
            let (expired, waiting): (Vec<_>, Vec<_>) =
                queued.drain(..).partition(|job| job.closer.is_dismissed());
            *queued = waiting.into();
            expired
        };

        for job in expired {
            debug!(id = %job.id, "timed out while queued");
            let _ = job.done.send(DialogClose::Dismissed);
        }
    }
}

fn run_guarded(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("UI task panicked");
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}
