//! Scripted host toolkit
//!
//! Stands in for a user: each request is answered according to a
//! [`Reaction`] chosen by a responder closure. A [`ScriptProbe`] keeps a
//! record of what the toolkit saw after it has moved to the UI thread.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use super::{ArtifactId, CloseReason, DialogToolkit};
use crate::dialog::{DialogRequest, UserAction};
use crate::error::{PopupError, Result};
use crate::params::Location;

/// What the scripted "user" does with a dialog
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Close the dialog with `action` once `after` has passed
    Respond { after: Duration, action: UserAction },
    /// Never answer
    Ignore,
    /// Fail to construct the dialog
    FailBuild,
    /// Fail while the dialog is showing
    FailPoll,
    /// Panic while constructing the dialog
    Panic,
    /// Panic while the dialog is showing
    PanicPoll,
}

impl Reaction {
    pub fn respond(action: UserAction) -> Self {
        Reaction::Respond {
            after: Duration::ZERO,
            action,
        }
    }

    pub fn respond_after(millis: u64, action: UserAction) -> Self {
        Reaction::Respond {
            after: Duration::from_millis(millis),
            action,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltDialog {
    pub artifact: ArtifactId,
    pub request: DialogRequest,
    /// Thread the dialog was constructed on
    pub thread: ThreadId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedDialog {
    pub artifact: ArtifactId,
    pub reason: CloseReason,
}

#[derive(Default)]
struct ProbeState {
    built: Vec<BuiltDialog>,
    closed: Vec<ClosedDialog>,
    open: usize,
    max_open: usize,
}

/// Read side of a [`ScriptedToolkit`]
#[derive(Clone, Default)]
pub struct ScriptProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ScriptProbe {
    pub fn built(&self) -> Vec<BuiltDialog> {
        self.state.lock().built.clone()
    }

    pub fn closed(&self) -> Vec<ClosedDialog> {
        self.state.lock().closed.clone()
    }

    /// How many times `artifact` was actually closed (at most once)
    pub fn closes_of(&self, artifact: ArtifactId) -> usize {
        self.state
            .lock()
            .closed
            .iter()
            .filter(|c| c.artifact == artifact)
            .count()
    }

    pub fn forced_count(&self) -> usize {
        self.state
            .lock()
            .closed
            .iter()
            .filter(|c| c.reason == CloseReason::Forced)
            .count()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open
    }

    /// Largest number of dialogs that were open at the same time
    pub fn max_open(&self) -> usize {
        self.state.lock().max_open
    }
}

type Responder = Box<dyn FnMut(&DialogRequest) -> Reaction + Send>;

struct OpenDialog {
    shown_at: Instant,
    reaction: Reaction,
}

pub struct ScriptedToolkit {
    responder: Responder,
    interactive: bool,
    center: Location,
    open: HashMap<ArtifactId, OpenDialog>,
    next_id: u64,
    probe: ScriptProbe,
}

impl ScriptedToolkit {
    pub fn new<F>(responder: F) -> (Self, ScriptProbe)
    where
        F: FnMut(&DialogRequest) -> Reaction + Send + 'static,
    {
        let probe = ScriptProbe::default();
        let toolkit = Self {
            responder: Box::new(responder),
            interactive: true,
            center: Location::new(960, 540),
            open: HashMap::new(),
            next_id: 1,
            probe: probe.clone(),
        };
        (toolkit, probe)
    }

    /// A user who never answers anything
    pub fn silent() -> (Self, ScriptProbe) {
        Self::new(|_| Reaction::Ignore)
    }

    /// Report no interactive display
    pub fn headless(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn with_center(mut self, center: Location) -> Self {
        self.center = center;
        self
    }
}

impl DialogToolkit for ScriptedToolkit {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn primary_display_center(&self) -> Option<Location> {
        Some(self.center)
    }

    fn build(&mut self, request: &DialogRequest) -> Result<ArtifactId> {
        let reaction = (self.responder)(request);
        match reaction {
            Reaction::FailBuild => {
                return Err(PopupError::Toolkit("scripted build failure".to_string()))
            }
            Reaction::Panic => panic!("scripted toolkit panic"),
            _ => {}
        }

        let artifact = ArtifactId(self.next_id);
        self.next_id += 1;
        self.open.insert(
            artifact,
            OpenDialog {
                shown_at: Instant::now(),
                reaction,
            },
        );

        let mut state = self.probe.state.lock();
        state.built.push(BuiltDialog {
            artifact,
            request: request.clone(),
            thread: thread::current().id(),
        });
        state.open += 1;
        state.max_open = state.max_open.max(state.open);
        Ok(artifact)
    }

    fn poll(&mut self, artifact: ArtifactId, wait: Duration) -> Result<Option<UserAction>> {
        let Some(dialog) = self.open.get(&artifact) else {
            return Ok(None);
        };

        match &dialog.reaction {
            Reaction::Respond { after, action } => {
                let elapsed = dialog.shown_at.elapsed();
                if elapsed < *after {
                    thread::sleep(wait.min(*after - elapsed));
                }
                if dialog.shown_at.elapsed() >= *after {
                    Ok(Some(action.clone()))
                } else {
                    Ok(None)
                }
            }
            Reaction::FailPoll => Err(PopupError::Toolkit("scripted poll failure".to_string())),
            Reaction::PanicPoll => panic!("scripted poll panic"),
            _ => {
                thread::sleep(wait);
                Ok(None)
            }
        }
    }

    fn close(&mut self, artifact: ArtifactId, reason: CloseReason) {
        if self.open.remove(&artifact).is_none() {
            return;
        }
        let mut state = self.probe.state.lock();
        state.closed.push(ClosedDialog { artifact, reason });
        state.open -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogKind;

    #[test]
    fn test_respond_after_delay() {
        let (mut toolkit, probe) =
            ScriptedToolkit::new(|_| Reaction::respond_after(30, UserAction::Yes));
        let request = DialogRequest::builder(DialogKind::Confirm).build();
        let artifact = toolkit.build(&request).unwrap();

        let first = toolkit.poll(artifact, Duration::from_millis(1)).unwrap();
        assert_eq!(first, None);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut answer = None;
        while answer.is_none() && Instant::now() < deadline {
            answer = toolkit.poll(artifact, Duration::from_millis(10)).unwrap();
        }
        assert_eq!(answer, Some(UserAction::Yes));
        assert_eq!(probe.open_count(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut toolkit, probe) = ScriptedToolkit::silent();
        let request = DialogRequest::builder(DialogKind::Notice).build();
        let artifact = toolkit.build(&request).unwrap();

        toolkit.close(artifact, CloseReason::Forced);
        toolkit.close(artifact, CloseReason::User);

        assert_eq!(probe.closes_of(artifact), 1);
        assert_eq!(probe.forced_count(), 1);
        assert_eq!(probe.open_count(), 0);
    }

    #[test]
    fn test_build_failure() {
        let (mut toolkit, probe) = ScriptedToolkit::new(|_| Reaction::FailBuild);
        let request = DialogRequest::builder(DialogKind::Error).build();
        assert!(toolkit.build(&request).is_err());
        assert!(probe.built().is_empty());
    }
}
