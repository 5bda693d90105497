//! Dialog Types
//!
//! Request, close and outcome types shared by the controller, the UI thread
//! and the host toolkits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::params::{Bindings, Location, Value};

/// Millisecond value that means "never time out"
pub const FOREVER: i64 = i64::MAX;

/// Declared parameter names of the four call shapes
pub const CALL_NAMES: &str = "message,title,preset,hidden,timeout,anchor";

/// Declared parameter kinds of the four call shapes
pub const CALL_KINDS: &str = "s,s,s,b,i,e";

/// Dialog kind: decides presentation and outcome shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    Notice,
    Confirm,
    Error,
    Input,
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DialogKind::Notice => "notice",
            DialogKind::Confirm => "confirm",
            DialogKind::Error => "error",
            DialogKind::Input => "input",
        };
        f.write_str(label)
    }
}

/// When a dialog dismisses itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    After(Duration),
    Forever,
}

impl Timeout {
    /// `FOREVER` and negative values never expire; `0` expires immediately.
    pub fn from_millis(millis: i64) -> Self {
        if millis == FOREVER || millis < 0 {
            Timeout::Forever
        } else {
            Timeout::After(Duration::from_millis(millis as u64))
        }
    }

    pub fn as_millis(&self) -> i64 {
        match self {
            Timeout::After(d) => d.as_millis().min(i64::MAX as u128 - 1) as i64,
            Timeout::Forever => FOREVER,
        }
    }
}

/// Fallbacks for every request field, resolved from settings and the host
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDefaults {
    pub message: String,
    pub title: String,
    pub preset: String,
    pub hidden: bool,
    pub timeout: Timeout,
    pub anchor: Location,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            message: "not set".to_string(),
            title: String::new(),
            preset: String::new(),
            hidden: false,
            timeout: Timeout::Forever,
            anchor: Location::default(),
        }
    }
}

impl RequestDefaults {
    /// Defaults in declaration order of `CALL_NAMES`
    pub fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.message.as_str()),
            Value::from(self.title.as_str()),
            Value::from(self.preset.as_str()),
            Value::from(self.hidden),
            Value::from(self.timeout.as_millis()),
            Value::from(self.anchor),
        ]
    }
}

/// One interaction. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogRequest {
    pub kind: DialogKind,
    pub message: String,
    pub title: String,
    /// Pre-filled text of an input dialog
    pub preset: String,
    /// Mask the input (password entry)
    pub hidden: bool,
    pub timeout: Timeout,
    pub anchor: Location,
}

impl DialogRequest {
    pub fn builder(kind: DialogKind) -> DialogRequestBuilder {
        DialogRequestBuilder {
            kind,
            defaults: RequestDefaults::default(),
        }
    }

    /// Build from bound call parameters. Missing entries (a failed binding
    /// produces none) fall back to `defaults`.
    pub fn from_bindings(kind: DialogKind, bound: &Bindings, defaults: &RequestDefaults) -> Self {
        Self {
            kind,
            message: bound.text("message").unwrap_or(defaults.message.as_str()).to_string(),
            title: bound.text("title").unwrap_or(defaults.title.as_str()).to_string(),
            preset: bound.text("preset").unwrap_or(defaults.preset.as_str()).to_string(),
            hidden: bound.boolean("hidden").unwrap_or(defaults.hidden),
            timeout: bound
                .integer("timeout")
                .map(Timeout::from_millis)
                .unwrap_or(defaults.timeout),
            anchor: bound.location("anchor").unwrap_or(defaults.anchor),
        }
    }
}

pub struct DialogRequestBuilder {
    kind: DialogKind,
    defaults: RequestDefaults,
}

impl DialogRequestBuilder {
    /// Start from resolved defaults instead of the bare ones
    pub fn defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.defaults.message = message.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.defaults.title = title.into();
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.defaults.preset = preset.into();
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.defaults.hidden = hidden;
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.defaults.timeout = timeout;
        self
    }

    pub fn timeout_ms(self, millis: i64) -> Self {
        self.timeout(Timeout::from_millis(millis))
    }

    pub fn anchor(mut self, anchor: Location) -> Self {
        self.defaults.anchor = anchor;
        self
    }

    pub fn build(self) -> DialogRequest {
        let d = self.defaults;
        DialogRequest {
            kind: self.kind,
            message: d.message,
            title: d.title,
            preset: d.preset,
            hidden: d.hidden,
            timeout: d.timeout,
            anchor: d.anchor,
        }
    }
}

/// What the user did to close a dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// OK / Enter on a message
    Acknowledge,
    Yes,
    No,
    /// Escape or window close
    Cancel,
    /// Text entered in an input dialog
    Submit(String),
}

/// How a dialog ended, as seen by the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogClose {
    User(UserAction),
    /// Dismissed programmatically after the timeout fired
    Dismissed,
    /// Toolkit failure, panic, or the UI thread went away
    Failed,
}

/// Result handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DialogOutcome {
    /// Notice and error dialogs
    Acknowledged(bool),
    /// Confirm dialogs
    Answered(bool),
    /// Input dialogs; `None` when cancelled or timed out
    Text(Option<String>),
}

impl DialogOutcome {
    /// The negative/absent outcome for a kind
    pub fn negative(kind: DialogKind) -> Self {
        match kind {
            DialogKind::Notice | DialogKind::Error => DialogOutcome::Acknowledged(false),
            DialogKind::Confirm => DialogOutcome::Answered(false),
            DialogKind::Input => DialogOutcome::Text(None),
        }
    }

    pub fn resolve(request: &DialogRequest, close: &DialogClose) -> Self {
        let action = match close {
            DialogClose::User(action) => action,
            DialogClose::Dismissed | DialogClose::Failed => return Self::negative(request.kind),
        };

        match request.kind {
            DialogKind::Notice | DialogKind::Error => DialogOutcome::Acknowledged(true),
            DialogKind::Confirm => DialogOutcome::Answered(matches!(
                action,
                UserAction::Yes | UserAction::Acknowledge | UserAction::Submit(_)
            )),
            DialogKind::Input => DialogOutcome::Text(match action {
                UserAction::Submit(text) => Some(text.clone()),
                UserAction::Acknowledge | UserAction::Yes => Some(request.preset.clone()),
                UserAction::No | UserAction::Cancel => None,
            }),
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            DialogOutcome::Acknowledged(b) | DialogOutcome::Answered(b) => *b,
            DialogOutcome::Text(text) => text.is_some(),
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            DialogOutcome::Text(text) => text,
            _ => None,
        }
    }
}

/// How the request ended, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedBy {
    User,
    Timeout,
    Failed,
    /// No interactive display; nothing was shown
    Unavailable,
}

impl From<&DialogClose> for ClosedBy {
    fn from(close: &DialogClose) -> Self {
        match close {
            DialogClose::User(_) => ClosedBy::User,
            DialogClose::Dismissed => ClosedBy::Timeout,
            DialogClose::Failed => ClosedBy::Failed,
        }
    }
}

/// Full record of one finished request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogReport {
    pub id: Uuid,
    pub kind: DialogKind,
    pub outcome: DialogOutcome,
    pub closed_by: ClosedBy,
    pub elapsed_ms: u64,
    /// Unix timestamp of completion
    pub timestamp: u64,
}

impl DialogReport {
    pub fn new(id: Uuid, kind: DialogKind, outcome: DialogOutcome, closed_by: ClosedBy, elapsed: Duration) -> Self {
        Self {
            id,
            kind,
            outcome,
            closed_by,
            elapsed_ms: elapsed.as_millis() as u64,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }
}
