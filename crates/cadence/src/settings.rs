//! Process-level configuration resolved from the environment.
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `CADENCE_COLOR` | `auto`, `always`, `never` | `auto` (`never` if `NO_COLOR` is set) |
//! | `CADENCE_LOG` | tracing filter directive | `warn` |

use std::fmt;
use std::str::FromStr;

use crate::context::Context;
use crate::error::ConfigError;
use crate::stdio::Stream;

/// Whether output channels emit escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Detect per stream: escape codes only on capable terminals
    #[default]
    Auto,
    /// Always emit escape codes
    Always,
    /// Never emit escape codes
    Never,
}

impl ColorMode {
    /// Resolves the POSIX capability flag for one output stream.
    pub fn resolve(self, stream: Stream) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => match stream {
                Stream::Out => console::colors_enabled(),
                Stream::Err => console::colors_enabled_stderr(),
            },
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Auto => write!(f, "auto"),
            ColorMode::Always => write!(f, "always"),
            ColorMode::Never => write!(f, "never"),
        }
    }
}

impl FromStr for ColorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorMode::Auto),
            "always" => Ok(ColorMode::Always),
            "never" => Ok(ColorMode::Never),
            _ => Err(ConfigError::InvalidColor {
                var: Settings::COLOR_VAR.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub color: ColorMode,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: ColorMode::Auto,
            log_filter: Settings::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    pub const COLOR_VAR: &'static str = "CADENCE_COLOR";
    pub const LOG_VAR: &'static str = "CADENCE_LOG";
    pub const DEFAULT_LOG_FILTER: &'static str = "warn";

    /// Reads settings from a context's environment.
    pub fn from_context(context: &Context) -> Result<Self, ConfigError> {
        let color = match context.env(Self::COLOR_VAR) {
            Some(value) => value.parse()?,
            None if context.env("NO_COLOR").is_some_and(|v| !v.is_empty()) => ColorMode::Never,
            None => ColorMode::Auto,
        };

        let log_filter = context
            .env(Self::LOG_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(Self::DEFAULT_LOG_FILTER)
            .to_string();

        Ok(Self { color, log_filter })
    }
}
