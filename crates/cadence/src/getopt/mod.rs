//! Option parsing.
//!
//! Commands declare their options as an [`OptionSchema`]. The controller hands
//! that schema and the raw arguments to an [`OptionSource`], then reads back
//! positional parameters and option values. [`Getopt`] is the default source,
//! built on a `clap::Command` assembled from the schema at `init` time.
//!
//! ```rust
//! use cadence::{Getopt, OptionSchema, OptionSource, OptionSpec, OptionValue};
//!
//! let schema = OptionSchema::new()
//!     .option("verbose", OptionSpec::flag("verbose").short('v'))
//!     .option("name", OptionSpec::value("name").short('n'));
//!
//! let mut getopt = Getopt::new();
//! getopt.init(&schema, true).unwrap();
//! getopt
//!     .load(&["-v".into(), "build".into(), "--name=app".into()])
//!     .unwrap();
//!
//! assert_eq!(getopt.params(), ["build"]);
//! assert_eq!(getopt.value("verbose"), Some(&OptionValue::Flag));
//! assert_eq!(getopt.value("name").and_then(OptionValue::as_str), Some("app"));
//! ```

mod scan;
mod schema;

pub use schema::{OptionSchema, OptionSpec, ParamMode};

use std::collections::HashMap;

use clap::{Arg, ArgAction, ArgMatches};
use tracing::{debug, trace};

use crate::error::{ParseError, SchemaError};
use schema::PARAMS_ID;

/// A parsed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// A flag was given, or an optional-value option was given without one.
    Flag,
    /// A repeatable flag was given this many times.
    Count(u8),
    Value(String),
    Values(Vec<String>),
}

impl OptionValue {
    /// The single value, if there is exactly one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Value(v) => Some(v),
            OptionValue::Values(vs) if vs.len() == 1 => Some(&vs[0]),
            _ => None,
        }
    }

    /// All values. Flags and counts have none.
    pub fn as_list(&self) -> &[String] {
        match self {
            OptionValue::Value(v) => std::slice::from_ref(v),
            OptionValue::Values(vs) => vs,
            OptionValue::Flag | OptionValue::Count(_) => &[],
        }
    }

    /// How many times the option was given, as far as can be told.
    pub fn count(&self) -> usize {
        match self {
            OptionValue::Flag | OptionValue::Value(_) => 1,
            OptionValue::Count(n) => usize::from(*n),
            OptionValue::Values(vs) => vs.len(),
        }
    }
}

/// Parses a command line against an option schema.
///
/// The controller calls `init` once, then `load` once, then reads `params`
/// and values for the rest of the command's life.
pub trait OptionSource {
    /// Accepts the schema and the strict flag. Validates the schema.
    fn init(&mut self, schema: &OptionSchema, strict: bool) -> Result<(), SchemaError>;

    /// Parses the raw tokens. In strict mode an unknown option fails.
    fn load(&mut self, argv: &[String]) -> Result<(), ParseError>;

    /// Positional arguments in order, excluding options and their values.
    fn params(&self) -> &[String];

    /// The value of a declared option, if it was given or has a default.
    fn value(&self, name: &str) -> Option<&OptionValue>;

    fn is_set(&self, name: &str) -> bool {
        self.value(name).is_some()
    }
}

/// The default [`OptionSource`], backed by clap.
#[derive(Debug, Default)]
pub struct Getopt {
    name: Option<String>,
    schema: Option<OptionSchema>,
    command: Option<clap::Command>,
    strict: bool,
    values: HashMap<String, OptionValue>,
    params: Vec<String>,
    ignored: Vec<String>,
}

impl Getopt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the program name shown in usage text.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The schema given to `init`, if any.
    pub fn schema(&self) -> Option<&OptionSchema> {
        self.schema.as_ref()
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Unknown option tokens dropped by a non-strict `load`.
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Renders usage text listing the declared options and their help.
    pub fn usage(&self) -> Option<String> {
        let mut command = self.command.clone()?;
        Some(command.render_help().to_string())
    }

    fn build(&self, schema: &OptionSchema) -> clap::Command {
        let name = self.name.clone().unwrap_or_else(|| "command".to_string());
        let mut command = clap::Command::new(name)
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .arg(
                Arg::new(PARAMS_ID)
                    .action(ArgAction::Append)
                    .num_args(1..)
                    .allow_negative_numbers(true),
            );

        for (name, spec) in schema.iter() {
            command = command.arg(build_arg(name, spec));
        }
        command
    }

    fn collect(&mut self, schema: &OptionSchema, matches: &ArgMatches) {
        for (name, spec) in schema.iter() {
            if let Some(value) = read_value(matches, name, spec) {
                trace!(option = name, value = ?value, "option value");
                self.values.insert(name.to_string(), value);
            }
        }

        self.params = matches
            .get_many::<String>(PARAMS_ID)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default();
    }
}

impl OptionSource for Getopt {
    fn init(&mut self, schema: &OptionSchema, strict: bool) -> Result<(), SchemaError> {
        schema.validate()?;
        self.command = Some(self.build(schema));
        self.schema = Some(schema.clone());
        self.strict = strict;
        debug!(options = schema.len(), strict, "option schema accepted");
        Ok(())
    }

    fn load(&mut self, argv: &[String]) -> Result<(), ParseError> {
        let (Some(schema), Some(command)) = (self.schema.take(), self.command.clone()) else {
            return Err(ParseError::NotInitialized);
        };

        self.values.clear();
        self.params.clear();

        let result = scan::scan(&schema, argv, self.strict).and_then(|scanned| {
            let matches = command
                .try_get_matches_from(&scanned.kept)
                .map_err(ParseError::from_clap)?;
            Ok((scanned.ignored, matches))
        });

        let outcome = match result {
            Ok((ignored, matches)) => {
                self.ignored = ignored;
                self.collect(&schema, &matches);
                debug!(
                    params = self.params.len(),
                    options = self.values.len(),
                    ignored = self.ignored.len(),
                    "command line parsed"
                );
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.schema = Some(schema);
        outcome
    }

    fn params(&self) -> &[String] {
        &self.params
    }

    fn value(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }
}

fn build_arg(name: &str, spec: &OptionSpec) -> Arg {
    let mut arg = Arg::new(name.to_string());
    if let Some(long) = &spec.long {
        arg = arg.long(long.clone());
    }
    if let Some(short) = spec.short {
        arg = arg.short(short);
    }
    if let Some(help) = &spec.help {
        arg = arg.help(help.clone());
    }

    arg = match spec.param {
        ParamMode::None => arg,
        ParamMode::Required => arg.num_args(1).allow_hyphen_values(true),
        ParamMode::Optional => arg.num_args(0..=1).default_missing_value(""),
    };
    if let Some(default) = &spec.default {
        arg = arg.default_value(default.clone());
    }

    let action = match (spec.takes_value(), spec.multi) {
        (false, false) => ArgAction::SetTrue,
        (false, true) => ArgAction::Count,
        (true, false) => ArgAction::Set,
        (true, true) => ArgAction::Append,
    };
    arg.action(action)
}

fn read_value(matches: &ArgMatches, name: &str, spec: &OptionSpec) -> Option<OptionValue> {
    let optional = spec.param == ParamMode::Optional;
    match (spec.takes_value(), spec.multi) {
        (false, false) => matches.get_flag(name).then_some(OptionValue::Flag),
        (false, true) => match matches.get_count(name) {
            0 => None,
            n => Some(OptionValue::Count(n)),
        },
        (true, false) => matches.get_one::<String>(name).map(|v| {
            if optional && v.is_empty() {
                OptionValue::Flag
            } else {
                OptionValue::Value(v.clone())
            }
        }),
        (true, true) => matches.get_many::<String>(name).map(|vals| {
            let vals: Vec<String> = vals.filter(|v| !v.is_empty()).cloned().collect();
            if optional && vals.is_empty() {
                OptionValue::Flag
            } else {
                OptionValue::Values(vals)
            }
        }),
    }
}
