use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context as _;
use cadence::{
    logging, ColorMode, Command, Context, Controller, Getopt, HookBus, Invocation, OptionSchema,
    OptionSpec, OptionValue, ParamMode, Reply, Settings, Stdio, Stream, SubscriberId, POST_ACTION,
    PRE_ACTION,
};
use tracing::info;

/// Greets someone, optionally loudly.
struct Hello;

impl Command for Hello {
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
            .option(
                "name",
                OptionSpec::value("name")
                    .short('n')
                    .default_value("world")
                    .help("Who to greet"),
            )
            .option(
                "shout",
                OptionSpec::flag("shout").short('s').help("Greet loudly"),
            )
            .option(
                "color",
                OptionSpec::flag("color")
                    .short('c')
                    .param(ParamMode::Optional)
                    .help("auto, always or never; bare --color means always"),
            )
    }

    fn pre_action(&mut self, inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        let mode = match inv.value("color") {
            None => return Ok(()),
            Some(OptionValue::Flag) => ColorMode::Always,
            Some(value) => value
                .as_str()
                .unwrap_or_default()
                .parse::<ColorMode>()
                .context("bad --color")?,
        };
        for stream in [Stream::Out, Stream::Err] {
            inv.stdio().channel(stream).set_posix(mode.resolve(stream));
        }
        Ok(())
    }

    fn action(&mut self, inv: &mut Invocation<'_>) -> anyhow::Result<()> {
        let name = inv
            .value("name")
            .and_then(OptionValue::as_str)
            .unwrap_or("world")
            .to_string();

        let greeting = if inv.is_set("shout") {
            format!("<<bold red>>HELLO, {}!<<reset>>", name.to_uppercase())
        } else {
            format!("Hello, <<bold>>{name}<<reset>>.")
        };
        inv.outln(&greeting)?;

        for extra in inv.params().to_vec() {
            inv.outln(&format!("  <<dim>>and {extra}<<reset>>"))?;
        }
        Ok(())
    }
}

/// Logs how long the command took, from `pre_action` to `post_action`.
fn install_timer(bus: &HookBus) {
    let timer = SubscriberId::next();
    let started = Rc::new(Cell::new(None::<Instant>));

    let start = Rc::clone(&started);
    bus.handler(timer, PRE_ACTION, move |_| {
        start.set(Some(Instant::now()));
        Ok(Reply::done())
    });

    bus.handler(timer, POST_ACTION, move |signal| {
        if let Some(at) = started.take() {
            info!(sender = %signal.sender, elapsed = ?at.elapsed(), "command finished");
        }
        Ok(Reply::done())
    });
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let context = Context::from_process();
    let settings = Settings::from_context(&context)?;
    logging::init(&settings)?;

    let bus = Rc::new(HookBus::new());
    let stdio = Stdio::from_settings(&settings);
    let getopt = Getopt::new().with_name("cadence-hello");

    let controller = Controller::new(Hello, context, stdio, getopt, Rc::clone(&bus))?;
    install_timer(&bus);
    controller.exec()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(argv: &[&str]) -> (String, anyhow::Result<()>) {
        let bus = Rc::new(HookBus::new());
        let (stdio, out, _) = Stdio::captured(false);
        let result = Controller::new(
            Hello,
            Context::new(argv.iter().copied()),
            stdio,
            Getopt::new(),
            Rc::clone(&bus),
        )
        .map_err(anyhow::Error::from)
        .and_then(|controller| {
            install_timer(&bus);
            controller.exec().map_err(anyhow::Error::from)
        });
        (out.contents(), result)
    }

    #[test]
    fn test_default_greeting() {
        let (out, result) = run_with(&[]);
        result.unwrap();
        assert_eq!(out, "Hello, world.\n");
    }

    #[test]
    fn test_shout_with_name_and_extras() {
        let (out, result) = run_with(&["-s", "--name", "ada", "bob"]);
        result.unwrap();
        assert_eq!(out, "HELLO, ADA!\n  and bob\n");
    }

    #[test]
    fn test_color_always_turns_on_escapes() {
        let (out, result) = run_with(&["--color=always", "-n", "x"]);
        result.unwrap();
        assert_eq!(out, "Hello, \x1b[1mx\x1b[0m.\n\x1b[0m");
    }

    #[test]
    fn test_bad_color_value() {
        let (_, result) = run_with(&["--color=purple"]);
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("bad --color"));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let (out, result) = run_with(&["--loud"]);
        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
