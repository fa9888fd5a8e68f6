//! Command lifecycle for CLI programs.
//!
//! `cadence` runs a command through a fixed sequence: a `pre_action` signal,
//! the command's action, a `post_action` signal, then a style reset on both
//! output channels. Anything that wants to run around a command subscribes to
//! the signals on a shared [`HookBus`]; the command's own pre and post steps
//! are subscribers like any other.
//!
//! # Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use cadence::{Command, Context, Controller, Getopt, HookBus, Invocation, Stdio};
//!
//! struct Hello;
//!
//! impl Command for Hello {
//!     fn action(&mut self, inv: &mut Invocation<'_>) -> anyhow::Result<()> {
//!         inv.outln("<<green>>hello<<reset>>")?;
//!         Ok(())
//!     }
//! }
//!
//! let (stdio, out, _err) = Stdio::captured(true);
//! let controller = Controller::new(
//!     Hello,
//!     Context::default(),
//!     stdio,
//!     Getopt::new(),
//!     Rc::new(HookBus::new()),
//! )?;
//! controller.exec()?;
//!
//! assert_eq!(out.contents(), "\x1b[32mhello\x1b[0m\n\x1b[0m");
//! # Ok::<(), cadence::Error>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! Context ──argv──► OptionSource (Getopt) ──params/values──┐
//!                                                          ▼
//! HookBus ◄──register pre/post── Controller ──exec──► Command
//!                                    │
//!                                    └──► Stdio ──markup──► out / err
//! ```
//!
//! - [`markup`]: `<<keyword>>` spans to escape sequences or plain text
//! - [`Stdio`]: out and err [`Channel`]s, each deciding its own rendering
//! - [`Getopt`]: the default [`OptionSource`], backed by clap
//! - [`Settings`] and [`logging`]: process setup from the environment

mod context;
mod controller;
mod error;
mod getopt;
pub mod logging;
mod settings;
mod stdio;

pub use cadence_markup as markup;
pub use cadence_signal::{
    HookBus, HookError, Reply, Responses, Signal, SubscriberId, POST_ACTION, PRE_ACTION,
};

pub use context::Context;
pub use controller::{Command, Controller, FnCommand, Invocation, Stage};
pub use error::{ActionError, ConfigError, Error, ParseError, SchemaError};
pub use getopt::{Getopt, OptionSchema, OptionSource, OptionSpec, OptionValue, ParamMode};
pub use settings::{ColorMode, Settings};
pub use stdio::{Capture, Channel, Stdio, Stream};
