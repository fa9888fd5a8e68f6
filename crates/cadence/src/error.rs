//! Error types for command construction and execution.
//!
//! Errors follow the lifecycle:
//!
//! | Error | Raised by | When |
//! |-------|-----------|------|
//! | [`SchemaError`] | `OptionSource::init` | construction, malformed option schema |
//! | [`ParseError`] | `OptionSource::load` | construction, bad command line |
//! | [`ActionError`] | `Controller::exec` | action, hook callback or output failure |
//! | [`ConfigError`] | `Settings::from_context`, `logging::init` | process setup |
//!
//! [`Error`] wraps all of them for entry points that just want `?`.

use std::io;

use cadence_signal::HookError;
use thiserror::Error;

/// The option schema declared by a command is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Option names start with an ASCII letter or digit, then letters,
    /// digits, `-` or `_`.
    #[error("invalid option name '{0}'")]
    InvalidName(String),

    /// The option has neither a long nor a short switch.
    #[error("option '{0}' needs a long or short switch")]
    MissingSwitch(String),

    /// The long switch is not a valid option name.
    #[error("option '{name}' has an invalid long switch '--{long}'")]
    InvalidLong { name: String, long: String },

    /// Short switches are a single ASCII letter or digit.
    #[error("option '{name}' has an invalid short switch '-{short}'")]
    InvalidShort { name: String, short: char },

    /// Two options claim the same switch.
    #[error("switch '{switch}' is declared by both '{first}' and '{second}'")]
    Duplicate {
        switch: String,
        first: String,
        second: String,
    },

    /// The name collides with an internal identifier.
    #[error("option name '{0}' is reserved")]
    Reserved(String),

    /// Flags carry no value, so they cannot have a default.
    #[error("flag option '{0}' cannot have a default value")]
    DefaultOnFlag(String),
}

/// The command line does not match the option schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Strict mode met an option the schema does not declare.
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    /// A value-taking option was the last token.
    #[error("option '{0}' requires a value")]
    MissingValue(String),

    /// A flag was given an inline `=value`.
    #[error("option '{0}' does not take a value")]
    UnexpectedValue(String),

    /// Any other rejection from the underlying parser.
    #[error("invalid command line: {0}")]
    Invalid(String),

    /// `load` was called before `init`.
    #[error("option source used before init")]
    NotInitialized,
}

impl ParseError {
    /// Maps a clap parse failure, keeping only the first line of its message.
    pub(crate) fn from_clap(err: clap::Error) -> Self {
        use clap::error::{ContextKind, ContextValue, ErrorKind};

        if err.kind() == ErrorKind::UnknownArgument {
            if let Some(ContextValue::String(arg)) = err.get(ContextKind::InvalidArg) {
                return ParseError::UnknownOption(arg.clone());
            }
        }

        let rendered = err.render().to_string();
        let first = rendered.lines().next().unwrap_or_default();
        ParseError::Invalid(first.trim_start_matches("error: ").to_string())
    }
}

/// Something failed while a command was executing.
#[derive(Debug, Error)]
pub enum ActionError {
    /// One of the command's steps returned an error.
    #[error(transparent)]
    Action(#[from] anyhow::Error),

    /// A hook registered by another subscriber failed, or the command's own
    /// hook could not run.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Writing to an output channel failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    /// `exec` was re-entered from inside the running command.
    #[error("command is already executing")]
    Reentrant,
}

/// Process configuration could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: expected auto, always or never")]
    InvalidColor { var: String, value: String },

    #[error("invalid log filter '{value}': {reason}")]
    InvalidLogFilter { value: String, reason: String },
}

/// Any error a cadence entry point can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
