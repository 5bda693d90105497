//! Command line arguments for `popup`

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use timed_popups::{DialogKind, DialogRequest, Location, RequestDefaults};

#[derive(Parser, Debug)]
#[command(name = "popup")]
#[command(about = "Show a timed dialog in the terminal and print how it ended")]
#[command(version)]
pub struct Args {
    /// Options file (searched in home, working dir, then the config dir)
    #[arg(long, global = true)]
    pub options: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show an informational message
    Notice(DialogArgs),

    /// Ask a yes/no question
    Confirm(DialogArgs),

    /// Show an error message
    Error(DialogArgs),

    /// Ask for a line of text
    Input(DialogArgs),

    /// Print the loaded options, optionally setting some first
    Options {
        /// `key=value` to set and save (repeatable)
        #[arg(long, value_parser = parse_pair)]
        set: Vec<(String, String)>,
    },
}

impl Command {
    pub fn dialog(self) -> Option<(DialogKind, DialogArgs)> {
        match self {
            Command::Notice(args) => Some((DialogKind::Notice, args)),
            Command::Confirm(args) => Some((DialogKind::Confirm, args)),
            Command::Error(args) => Some((DialogKind::Error, args)),
            Command::Input(args) => Some((DialogKind::Input, args)),
            Command::Options { .. } => None,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DialogArgs {
    #[arg(long, short)]
    pub message: Option<String>,

    #[arg(long, short)]
    pub title: Option<String>,

    /// Milliseconds until the dialog closes itself (negative: never)
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Pre-filled input text
    #[arg(long)]
    pub preset: Option<String>,

    /// Mask typed input
    #[arg(long)]
    pub hidden: bool,

    /// Dialog center as `x,y` (terminal cells)
    #[arg(long, value_parser = parse_anchor)]
    pub anchor: Option<Location>,
}

impl DialogArgs {
    pub fn into_request(self, kind: DialogKind, defaults: RequestDefaults) -> DialogRequest {
        let mut builder = DialogRequest::builder(kind).defaults(defaults).hidden(self.hidden);
        if let Some(message) = self.message {
            builder = builder.message(message);
        }
        if let Some(title) = self.title {
            builder = builder.title(title);
        }
        if let Some(preset) = self.preset {
            builder = builder.preset(preset);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout_ms(timeout);
        }
        if let Some(anchor) = self.anchor {
            builder = builder.anchor(anchor);
        }
        builder.build()
    }
}

fn parse_anchor(raw: &str) -> Result<Location, String> {
    Location::parse(raw).ok_or_else(|| format!("expected x,y but got {:?}", raw))
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value but got {:?}", raw))
}
