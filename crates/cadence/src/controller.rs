//! The command lifecycle.
//!
//! A [`Command`] supplies the business logic. A [`Controller`] owns one
//! command for one invocation and drives it through a fixed sequence:
//!
//! | Stage | What happens |
//! |-------|--------------|
//! | `Created` | state built, nothing registered yet |
//! | `Ready` | hooks registered, options parsed, params stored |
//! | `PreSent` | the `pre_action` signal was sent |
//! | `ActionRun` | `action` returned |
//! | `PostSent` | the `post_action` signal was sent |
//! | `ResetOutput` | `<<reset>>` written to out, then err |
//! | `Done` | `exec` returned |
//!
//! The command's own hooks are ordinary bus handlers keyed to the
//! controller's [`SubscriberId`], so other subscribers can add handlers for
//! the same events and they run in registration order. Both signals carry
//! one argument: the positional parameters as a JSON array.
//!
//! The output reset always runs. If an earlier step fails, later steps are
//! skipped, the reset is written anyway and the first error is returned.
//! Errors from the command's own steps come back unchanged as
//! [`ActionError::Action`]; only other subscribers' failures are
//! [`ActionError::Hook`].

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::io;
use std::rc::{Rc, Weak};

use cadence_signal::{HookBus, HookError, Reply, Signal, SubscriberId, POST_ACTION, PRE_ACTION};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::context::Context;
use crate::error::{ActionError, Error};
use crate::getopt::{OptionSchema, OptionSource, OptionValue};
use crate::stdio::{Stdio, Stream};

/// Business logic driven by a [`Controller`].
///
/// Only `action` is required. The hooks default to doing nothing, the
/// schema defaults to no options and parsing defaults to strict.
///
/// An error from any of the three steps is returned by
/// [`Controller::exec`] as [`ActionError::Action`] holding the same
/// `anyhow::Error`.
pub trait Command {
    /// Options this command accepts.
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
    }

    /// Whether unknown options are an error.
    fn strict(&self) -> bool {
        true
    }

    fn pre_action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn action(&mut self, inv: &mut Invocation<'_>) -> anyhow::Result<()>;

    fn post_action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What a command sees while one of its steps runs.
pub struct Invocation<'a> {
    stdio: &'a mut Stdio,
    params: &'a [String],
    options: &'a dyn OptionSource,
    context: &'a Context,
}

impl Invocation<'_> {
    /// Positional parameters in order.
    pub fn params(&self) -> &[String] {
        self.params
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn value(&self, name: &str) -> Option<&OptionValue> {
        self.options.value(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.options.is_set(name)
    }

    pub fn context(&self) -> &Context {
        self.context
    }

    pub fn stdio(&mut self) -> &mut Stdio {
        self.stdio
    }

    pub fn out(&mut self, text: &str) -> io::Result<()> {
        self.stdio.out(text)
    }

    pub fn outln(&mut self, text: &str) -> io::Result<()> {
        self.stdio.outln(text)
    }

    pub fn err(&mut self, text: &str) -> io::Result<()> {
        self.stdio.err(text)
    }

    pub fn errln(&mut self, text: &str) -> io::Result<()> {
        self.stdio.errln(text)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A [`Command`] made from an action closure.
///
/// ```rust
/// use cadence::{Command, FnCommand, Invocation};
///
/// let command = FnCommand::new(|inv: &mut Invocation<'_>| {
///     inv.outln("hello")?;
///     Ok(())
/// });
/// assert!(command.strict());
/// ```
pub struct FnCommand<F> {
    action: F,
    options: OptionSchema,
    strict: bool,
}

impl<F> FnCommand<F>
where
    F: FnMut(&mut Invocation<'_>) -> anyhow::Result<()>,
{
    pub fn new(action: F) -> Self {
        Self {
            action,
            options: OptionSchema::new(),
            strict: true,
        }
    }

    pub fn with_options(mut self, options: OptionSchema) -> Self {
        self.options = options;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl<F> Command for FnCommand<F>
where
    F: FnMut(&mut Invocation<'_>) -> anyhow::Result<()>,
{
    fn options(&self) -> OptionSchema {
        self.options.clone()
    }

    fn strict(&self) -> bool {
        self.strict
    }

    fn action(&mut self, inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        (self.action)(inv)
    }
}

/// How far the controller got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    Ready,
    PreSent,
    ActionRun,
    PostSent,
    ResetOutput,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Created => "created",
            Stage::Ready => "ready",
            Stage::PreSent => "pre_sent",
            Stage::ActionRun => "action_run",
            Stage::PostSent => "post_sent",
            Stage::ResetOutput => "reset_output",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Pre,
    Action,
    Post,
}

struct State<C> {
    command: C,
    stdio: Stdio,
    options: Box<dyn OptionSource>,
    params: Vec<String>,
    context: Context,
    // Error from the last failing pre/post step, returned by `exec` in place
    // of the bus error
    failure: Option<anyhow::Error>,
}

impl<C: Command> State<C> {
    fn run(&mut self, step: Step) -> anyhow::Result<()> {
        let State {
            command,
            stdio,
            options,
            params,
            context,
            ..
        } = self;
        let mut inv = Invocation {
            stdio,
            params,
            options: &**options,
            context,
        };
        match step {
            Step::Pre => command.pre_action(&mut inv),
            Step::Action => command.action(&mut inv),
            Step::Post => command.post_action(&mut inv),
        }
    }

    fn reset(&mut self) -> io::Result<()> {
        for stream in [Stream::Out, Stream::Err] {
            self.stdio.channel(stream).write(cadence_markup::RESET)?;
        }
        Ok(())
    }
}

/// Runs one command through the lifecycle.
///
/// ```rust
/// use std::rc::Rc;
/// use cadence::{Context, Controller, FnCommand, Getopt, HookBus, Invocation, Stdio};
///
/// let (stdio, out, _err) = Stdio::captured(false);
/// let command = FnCommand::new(|inv: &mut Invocation<'_>| {
///     let who = inv.param(0).unwrap_or("world").to_string();
///     inv.outln(&format!("<<bold>>hello {who}<<reset>>"))?;
///     Ok(())
/// });
///
/// let controller = Controller::new(
///     command,
///     Context::new(["cadence"]),
///     stdio,
///     Getopt::new(),
///     Rc::new(HookBus::new()),
/// )
/// .unwrap();
/// controller.exec().unwrap();
///
/// assert_eq!(out.contents(), "hello cadence\n");
/// ```
pub struct Controller<C> {
    id: SubscriberId,
    state: Rc<RefCell<State<C>>>,
    bus: Rc<HookBus>,
    stage: Cell<Stage>,
}

impl<C: Command + 'static> Controller<C> {
    /// Registers the command's hooks on the bus, then parses the context's
    /// arguments against the command's options.
    pub fn new(
        command: C,
        context: Context,
        stdio: Stdio,
        options: impl OptionSource + 'static,
        bus: Rc<HookBus>,
    ) -> Result<Self, Error> {
        let id = SubscriberId::next();
        let controller = Self {
            id,
            state: Rc::new(RefCell::new(State {
                command,
                stdio,
                options: Box::new(options),
                params: Vec::new(),
                context,
                failure: None,
            })),
            bus,
            stage: Cell::new(Stage::Created),
        };

        let Self { state, bus, .. } = &controller;
        bus.handler(id, PRE_ACTION, step_handler(state, Step::Pre));
        bus.handler(id, POST_ACTION, step_handler(state, Step::Post));
        debug!(controller = %id, "hooks registered");

        {
            let mut guard = state.borrow_mut();
            let State {
                command,
                options,
                params,
                context,
                ..
            } = &mut *guard;
            options.init(&command.options(), command.strict())?;
            options.load(context.argv())?;
            *params = options.params().to_vec();
            debug!(controller = %id, params = params.len(), "controller ready");
        }

        controller.advance(Stage::Ready);
        Ok(controller)
    }

    /// Runs pre hooks, the action, post hooks, then resets both channels.
    ///
    /// Each call runs the whole sequence again.
    pub fn exec(&self) -> Result<(), ActionError> {
        debug!(controller = %self.id, "exec");
        let outcome = self.run_steps();

        let reset = self
            .state
            .try_borrow_mut()
            .map_err(|_| ActionError::Reentrant)
            .and_then(|mut state| state.reset().map_err(ActionError::from));

        match (outcome, reset) {
            (Ok(()), Ok(())) => {
                self.advance(Stage::ResetOutput);
                self.advance(Stage::Done);
                Ok(())
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(reset_err)) => {
                warn!(controller = %self.id, error = %reset_err, "output reset failed after error");
                Err(e)
            }
        }
    }

    fn run_steps(&self) -> Result<(), ActionError> {
        let params = {
            let mut state = self
                .state
                .try_borrow_mut()
                .map_err(|_| ActionError::Reentrant)?;
            state.failure = None;
            state.params.clone()
        };
        let args = [Value::from(params)];

        self.bus
            .send(self.id, PRE_ACTION, &args)
            .map_err(|e| self.hook_failure(e))?;
        self.advance(Stage::PreSent);

        self.state
            .try_borrow_mut()
            .map_err(|_| ActionError::Reentrant)?
            .run(Step::Action)?;
        self.advance(Stage::ActionRun);

        self.bus
            .send(self.id, POST_ACTION, &args)
            .map_err(|e| self.hook_failure(e))?;
        self.advance(Stage::PostSent);
        Ok(())
    }

    /// Unwraps a failure of this controller's own hook back into the
    /// command's error.
    fn hook_failure(&self, err: HookError) -> ActionError {
        if err.subscriber == Some(self.id) {
            let failure = self
                .state
                .try_borrow_mut()
                .ok()
                .and_then(|mut state| state.failure.take());
            if let Some(failure) = failure {
                return ActionError::Action(failure);
            }
        }
        ActionError::Hook(err)
    }

    fn advance(&self, stage: Stage) {
        trace!(controller = %self.id, from = %self.stage.get(), to = %stage, "stage");
        self.stage.set(stage);
    }

    /// The identity the command's hooks are registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The last stage completed. After a failed `exec` this is the stage
    /// before the failing step.
    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    pub fn bus(&self) -> &Rc<HookBus> {
        &self.bus
    }

    /// Positional parameters parsed at construction.
    ///
    /// # Panics
    ///
    /// If called from inside the running command.
    pub fn params(&self) -> Ref<'_, [String]> {
        Ref::map(self.state.borrow(), |s| s.params.as_slice())
    }

    pub fn value(&self, name: &str) -> Option<OptionValue> {
        self.state.borrow().options.value(name).cloned()
    }

    /// Borrows the command.
    ///
    /// # Panics
    ///
    /// If called from inside the running command.
    pub fn command(&self) -> Ref<'_, C> {
        Ref::map(self.state.borrow(), |s| &s.command)
    }

    /// Consumes the controller and returns the command.
    pub fn into_command(self) -> Option<C> {
        Rc::try_unwrap(self.state)
            .ok()
            .map(|state| state.into_inner().command)
    }
}

impl<C> fmt::Debug for Controller<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.id)
            .field("stage", &self.stage.get())
            .finish_non_exhaustive()
    }
}

/// Bus handler that runs one command step. Holds the state weakly: once the
/// controller is dropped the handler does nothing.
fn step_handler<C: Command + 'static>(
    state: &Rc<RefCell<State<C>>>,
    step: Step,
) -> impl Fn(&Signal<'_>) -> Result<Reply, HookError> + 'static {
    let state: Weak<RefCell<State<C>>> = Rc::downgrade(state);
    move |signal: &Signal<'_>| {
        let Some(state) = state.upgrade() else {
            return Ok(Reply::done());
        };
        let mut state = state
            .try_borrow_mut()
            .map_err(|_| HookError::new(signal.event, "command is already running"))?;
        trace!(sender = %signal.sender, ?step, "running command hook");
        match state.run(step) {
            Ok(()) => Ok(Reply::done()),
            Err(e) => {
                let err = HookError::new(signal.event, format!("{e:#}"));
                state.failure = Some(e);
                Err(err)
            }
        }
    }
}
