//! Snapshot of the process arguments and environment.
//!
//! Business logic never reads `std::env` directly: the entry point takes one
//! [`Context`] snapshot and hands it to the controller. Tests build contexts
//! by hand.

use std::collections::HashMap;

/// Raw command-line tokens and environment variables for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    argv: Vec<String>,
    env: HashMap<String, String>,
}

impl Context {
    /// Creates a context from argument tokens (program name excluded) and an
    /// empty environment.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
        }
    }

    /// Snapshots the running process. Non-UTF-8 arguments and variables are
    /// converted lossily.
    pub fn from_process() -> Self {
        let argv = std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let env = std::env::vars_os()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect();
        Self { argv, env }
    }

    /// Adds or replaces an environment variable.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// The raw argument tokens, excluding the program name.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Looks up an environment variable.
    pub fn env(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }
}
