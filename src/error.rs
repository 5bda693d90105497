//! Error types for timed-popups

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PopupError {
    #[error("parameter lists differ in length: {names} names, {kinds} kinds")]
    ParameterMismatch { names: usize, kinds: usize },

    #[error("parameter defaults incomplete: {expected} expected, {found} given")]
    MissingDefaults { expected: usize, found: usize },

    #[error("running headless: no interactive display")]
    Headless,

    #[error("UI thread is not running")]
    UiClosed,

    #[error("Toolkit error: {0}")]
    Toolkit(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidSetting { key: String, value: String },

    #[error("Options file location unknown")]
    NoOptionsFile,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PopupError>;
