use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::rc::Rc;

use anyhow::{bail, Context as _};
use cadence::{
    ActionError, Channel, Command, Context, Controller, Error, Getopt, HookBus, HookError,
    Invocation, OptionSchema, OptionSpec, ParseError, Reply, SchemaError, Stage, Stdio,
    SubscriberId, POST_ACTION, PRE_ACTION,
};

type Log = Rc<RefCell<Vec<String>>>;

/// Writer that records each write, tagged with the stream it came from.
struct Recorder {
    label: &'static str,
    log: Log,
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.log
            .borrow_mut()
            .push(format!("{}:{}", self.label, text.escape_debug()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn recorded_stdio(log: &Log) -> Stdio {
    Stdio::new(
        Channel::new(
            Recorder {
                label: "out",
                log: Rc::clone(log),
            },
            true,
        ),
        Channel::new(
            Recorder {
                label: "err",
                log: Rc::clone(log),
            },
            true,
        ),
    )
}

#[derive(Default)]
struct MockCommand {
    pre: usize,
    post: usize,
    fail: bool,
    log: Option<Log>,
}

impl MockCommand {
    fn note(&self, what: &str) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(what.to_string());
        }
    }
}

impl Command for MockCommand {
    fn pre_action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        self.pre += 1;
        self.note("pre");
        Ok(())
    }

    fn action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        self.note("action");
        if self.fail {
            bail!("action failed");
        }
        Ok(())
    }

    fn post_action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        self.post += 1;
        self.note("post");
        Ok(())
    }
}

fn controller(command: MockCommand, argv: &[&str]) -> Controller<MockCommand> {
    let (stdio, _, _) = Stdio::captured(false);
    Controller::new(
        command,
        Context::new(argv.iter().copied()),
        stdio,
        Getopt::new(),
        Rc::new(HookBus::new()),
    )
    .unwrap()
}

#[test]
fn test_params_and_hooks_fire_once() {
    let controller = controller(MockCommand::default(), &["foo", "bar", "baz", "dib"]);
    controller.exec().unwrap();

    assert_eq!(&*controller.params(), ["foo", "bar", "baz", "dib"]);
    assert_eq!(controller.command().pre, 1);
    assert_eq!(controller.command().post, 1);
}

#[test]
fn test_empty_argv_completes() {
    let controller = controller(MockCommand::default(), &[]);
    controller.exec().unwrap();

    assert!(controller.params().is_empty());
    assert_eq!(controller.command().pre, 1);
    assert_eq!(controller.command().post, 1);
    assert_eq!(controller.stage(), Stage::Done);
}

#[test]
fn test_lifecycle_order() {
    let log: Log = Rc::default();
    let command = MockCommand {
        log: Some(Rc::clone(&log)),
        ..Default::default()
    };
    let controller = Controller::new(
        command,
        Context::default(),
        recorded_stdio(&log),
        Getopt::new(),
        Rc::new(HookBus::new()),
    )
    .unwrap();

    controller.exec().unwrap();

    assert_eq!(
        *log.borrow(),
        ["pre", "action", "post", "out:\\u{1b}[0m", "err:\\u{1b}[0m"]
    );
}

#[test]
fn test_exec_twice_runs_everything_twice() {
    let controller = controller(MockCommand::default(), &["x"]);
    controller.exec().unwrap();
    controller.exec().unwrap();

    assert_eq!(controller.command().pre, 2);
    assert_eq!(controller.command().post, 2);
}

#[test]
fn test_failed_action_skips_post_but_resets() {
    let log: Log = Rc::default();
    let command = MockCommand {
        fail: true,
        log: Some(Rc::clone(&log)),
        ..Default::default()
    };
    let controller = Controller::new(
        command,
        Context::default(),
        recorded_stdio(&log),
        Getopt::new(),
        Rc::new(HookBus::new()),
    )
    .unwrap();

    let err = controller.exec().unwrap_err();
    assert!(matches!(err, ActionError::Action(_)));
    assert_eq!(err.to_string(), "action failed");

    assert_eq!(
        *log.borrow(),
        ["pre", "action", "out:\\u{1b}[0m", "err:\\u{1b}[0m"]
    );
    assert_eq!(controller.command().post, 0);
    assert_eq!(controller.stage(), Stage::PreSent);
}

#[test]
fn test_external_hooks_run_in_registration_order() {
    let bus = Rc::new(HookBus::new());
    let log: Log = Rc::default();
    let command = MockCommand {
        log: Some(Rc::clone(&log)),
        ..Default::default()
    };
    let controller = Controller::new(
        command,
        Context::default(),
        recorded_stdio(&log),
        Getopt::new(),
        Rc::clone(&bus),
    )
    .unwrap();

    let a = SubscriberId::next();
    let b = SubscriberId::next();
    for (who, label) in [(a, "a"), (b, "b")] {
        for event in [PRE_ACTION, POST_ACTION] {
            let log = Rc::clone(&log);
            bus.handler(who, event, move |signal| {
                log.borrow_mut().push(format!("{label}:{}", signal.event));
                Ok(Reply::done())
            });
        }
    }

    controller.exec().unwrap();

    assert_eq!(
        *log.borrow(),
        [
            "pre",
            "a:pre_action",
            "b:pre_action",
            "action",
            "post",
            "a:post_action",
            "b:post_action",
            "out:\\u{1b}[0m",
            "err:\\u{1b}[0m",
        ]
    );
}

#[test]
fn test_hooks_see_controller_as_sender() {
    let bus = Rc::new(HookBus::new());
    let controller = Controller::new(
        MockCommand::default(),
        Context::default(),
        Stdio::captured(false).0,
        Getopt::new(),
        Rc::clone(&bus),
    )
    .unwrap();

    let seen = Rc::new(Cell::new(None));
    let sink = Rc::clone(&seen);
    bus.handler(SubscriberId::next(), PRE_ACTION, move |signal| {
        sink.set(Some(signal.sender));
        Ok(Reply::done())
    });

    controller.exec().unwrap();
    assert_eq!(seen.get(), Some(controller.id()));
}

#[test]
fn test_signals_carry_params() {
    let bus = Rc::new(HookBus::new());
    let controller = Controller::new(
        MockCommand::default(),
        Context::new(["a", "b"]),
        Stdio::captured(false).0,
        Getopt::new(),
        Rc::clone(&bus),
    )
    .unwrap();

    let seen: Rc<RefCell<Vec<serde_json::Value>>> = Rc::default();
    let sink = Rc::clone(&seen);
    bus.handler(SubscriberId::next(), POST_ACTION, move |signal| {
        sink.borrow_mut().extend(signal.args.iter().cloned());
        Ok(Reply::done())
    });

    controller.exec().unwrap();
    assert_eq!(*seen.borrow(), [serde_json::json!(["a", "b"])]);
}

#[test]
fn test_failing_hook_aborts_before_action() {
    let bus = Rc::new(HookBus::new());
    let log: Log = Rc::default();
    let command = MockCommand {
        log: Some(Rc::clone(&log)),
        ..Default::default()
    };
    let controller = Controller::new(
        command,
        Context::default(),
        recorded_stdio(&log),
        Getopt::new(),
        Rc::clone(&bus),
    )
    .unwrap();
    let guard = SubscriberId::next();
    bus.handler(guard, PRE_ACTION, |signal| Err(HookError::new(signal.event, "not allowed")));

    let err = controller.exec().unwrap_err();
    match err {
        ActionError::Hook(hook) => {
            assert_eq!(hook.event, PRE_ACTION);
            assert_eq!(hook.subscriber, Some(guard));
        }
        other => panic!("expected hook error, got {other:?}"),
    }
    assert_eq!(*log.borrow(), ["pre", "out:\\u{1b}[0m", "err:\\u{1b}[0m"]);
}

#[test]
fn test_failing_pre_action_is_returned_unchanged() {
    struct Refuse;

    impl Command for Refuse {
        fn pre_action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
            bail!("refused")
        }

        fn action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
            panic!("action must not run");
        }
    }

    let (stdio, _, _) = Stdio::captured(false);
    let controller = Controller::new(
        Refuse,
        Context::default(),
        stdio,
        Getopt::new(),
        Rc::new(HookBus::new()),
    )
    .unwrap();

    let err = controller.exec().unwrap_err();
    assert_eq!(err.to_string(), "refused");
    let ActionError::Action(cause) = err else {
        panic!("expected the command's own error");
    };
    assert_eq!(cause.to_string(), "refused");
    assert_eq!(controller.stage(), Stage::Ready);
}

#[test]
fn test_failing_post_action_keeps_its_context() {
    struct Audit;

    impl Command for Audit {
        fn action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
            Ok(())
        }

        fn post_action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk full")).context("audit log")
        }
    }

    let (stdio, out, _) = Stdio::captured(true);
    let controller = Controller::new(
        Audit,
        Context::default(),
        stdio,
        Getopt::new(),
        Rc::new(HookBus::new()),
    )
    .unwrap();

    let err = controller.exec().unwrap_err();
    assert_eq!(format!("{err:#}"), "audit log: disk full");
    assert!(matches!(err, ActionError::Action(_)));
    assert_eq!(controller.stage(), Stage::ActionRun);
    assert_eq!(out.contents(), "\x1b[0m");
}

struct Strict;

impl Command for Strict {
    fn options(&self) -> OptionSchema {
        OptionSchema::new().option("verbose", OptionSpec::flag("verbose").short('v'))
    }

    fn action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn test_unknown_option_fails_construction() {
    let (stdio, _, _) = Stdio::captured(false);
    let result = Controller::new(
        Strict,
        Context::new(["--verbose", "--bogus"]),
        stdio,
        Getopt::new(),
        Rc::new(HookBus::new()),
    );

    match result {
        Err(Error::Parse(ParseError::UnknownOption(option))) => assert_eq!(option, "--bogus"),
        other => panic!("expected unknown option, got {other:?}"),
    }
}

#[test]
fn test_malformed_schema_fails_construction() {
    struct Broken;

    impl Command for Broken {
        fn options(&self) -> OptionSchema {
            OptionSchema::new()
                .option("one", OptionSpec::flag("same"))
                .option("two", OptionSpec::flag("same"))
        }

        fn action(&mut self, _inv: &mut Invocation<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let bus = Rc::new(HookBus::new());
    let (stdio, _, _) = Stdio::captured(false);
    let result = Controller::new(
        Broken,
        Context::default(),
        stdio,
        Getopt::new(),
        Rc::clone(&bus),
    );

    assert!(matches!(
        result,
        Err(Error::Schema(SchemaError::Duplicate { .. }))
    ));
    // Hooks were registered before parsing and stay on the bus, inert
    assert_eq!(bus.handler_count(PRE_ACTION), 1);
    assert!(bus.send(SubscriberId::next(), PRE_ACTION, &[]).is_ok());
}

#[test]
fn test_commands_read_options_and_write_output() {
    struct Echo;

    impl Command for Echo {
        fn options(&self) -> OptionSchema {
            OptionSchema::new().option("upper", OptionSpec::flag("upper").short('u'))
        }

        fn strict(&self) -> bool {
            false
        }

        fn action(&mut self, inv: &mut Invocation<'_>) -> anyhow::Result<()> {
            let text = inv.params().join(" ");
            let text = if inv.is_set("upper") {
                text.to_uppercase()
            } else {
                text
            };
            inv.outln(&format!("<<bold>>{text}<<reset>>"))?;
            inv.errln("<<yellow>>done")?;
            Ok(())
        }
    }

    let (stdio, out, err) = Stdio::captured(false);
    let controller = Controller::new(
        Echo,
        Context::new(["-u", "hello", "--unknown", "world"]),
        stdio,
        Getopt::new(),
        Rc::new(HookBus::new()),
    )
    .unwrap();
    controller.exec().unwrap();

    assert_eq!(out.contents(), "HELLO WORLD\n");
    assert_eq!(err.contents(), "done\n");
}

#[test]
fn test_controllers_sharing_a_bus() {
    let bus = Rc::new(HookBus::new());
    let first = Controller::new(
        MockCommand::default(),
        Context::default(),
        Stdio::captured(false).0,
        Getopt::new(),
        Rc::clone(&bus),
    )
    .unwrap();
    let second = Controller::new(
        MockCommand::default(),
        Context::default(),
        Stdio::captured(false).0,
        Getopt::new(),
        Rc::clone(&bus),
    )
    .unwrap();

    assert_eq!(bus.handler_count(PRE_ACTION), 2);
    assert_ne!(first.id(), second.id());

    // Signals reach every subscriber of the event
    first.exec().unwrap();
    assert_eq!(first.command().pre, 1);
    assert_eq!(second.command().pre, 1);
}
