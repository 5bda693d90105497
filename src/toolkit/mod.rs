//! Host Toolkits
//!
//! The UI thread drives dialogs through [`DialogToolkit`]. Every method is
//! called on the UI thread only.

pub mod scripted;
pub mod terminal;

use std::time::Duration;

use crate::dialog::{DialogRequest, UserAction};
use crate::error::Result;
use crate::params::Location;

pub use scripted::{Reaction, ScriptProbe, ScriptedToolkit};
pub use terminal::TerminalToolkit;

/// Toolkit-side identity of one constructed dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(pub u64);

/// Why the UI thread closes an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The user already answered; dispose it
    User,
    /// Timeout fired: close it programmatically
    Forced,
    /// A toolkit error ended the dialog
    Error,
}

pub trait DialogToolkit {
    /// Whether dialogs can be shown at all (false when headless)
    fn is_interactive(&self) -> bool;

    /// Center of the primary display, used as the default anchor
    fn primary_display_center(&self) -> Option<Location>;

    /// Construct a dialog for `request` and show it
    fn build(&mut self, request: &DialogRequest) -> Result<ArtifactId>;

    /// Process events for up to `wait`. Returns the user's action once the
    /// user has closed the dialog.
    fn poll(&mut self, artifact: ArtifactId, wait: Duration) -> Result<Option<UserAction>>;

    /// Close and dispose the dialog. Closing an already closed artifact is a
    /// no-op.
    fn close(&mut self, artifact: ArtifactId, reason: CloseReason);
}
