//! Option schema declarations.

use std::collections::HashMap;

use crate::error::SchemaError;

/// Identifier used internally for positional parameters.
pub(crate) const PARAMS_ID: &str = "params";

/// Whether an option takes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamMode {
    /// A flag: `--verbose`
    #[default]
    None,
    /// Always takes a value: `--name value`, `--name=value`, `-nvalue`
    Required,
    /// Takes a value only when attached or not followed by another option:
    /// `--color`, `--color=auto`, `--color auto`
    Optional,
}

/// Declaration of a single named option.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionSpec {
    pub long: Option<String>,
    pub short: Option<char>,
    pub param: ParamMode,
    /// Flags count occurrences; valued options collect every value.
    pub multi: bool,
    pub default: Option<String>,
    pub help: Option<String>,
}

impl OptionSpec {
    /// An empty spec; set at least one switch before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A `--long` flag.
    pub fn flag(long: impl Into<String>) -> Self {
        Self::new().long(long)
    }

    /// A `--long value` option.
    pub fn value(long: impl Into<String>) -> Self {
        Self::new().long(long).param(ParamMode::Required)
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn param(mut self, param: ParamMode) -> Self {
        self.param = param;
        self
    }

    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Returns true if the option accepts a value.
    pub fn takes_value(&self) -> bool {
        self.param != ParamMode::None
    }
}

/// The named options a command accepts, in declaration order.
///
/// # Example
///
/// ```rust
/// use cadence::{OptionSchema, OptionSpec};
///
/// let schema = OptionSchema::new()
///     .option("verbose", OptionSpec::flag("verbose").short('v').multi(true))
///     .option("name", OptionSpec::value("name").short('n').default_value("world"));
///
/// assert!(schema.validate().is_ok());
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionSchema {
    options: Vec<(String, OptionSpec)>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option, replacing any earlier option with the same name.
    pub fn option(mut self, name: impl Into<String>, spec: OptionSpec) -> Self {
        self.insert(name, spec);
        self
    }

    /// Adds an option in place, replacing any earlier option with the same name.
    pub fn insert(&mut self, name: impl Into<String>, spec: OptionSpec) {
        let name = name.into();
        match self.options.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = spec,
            None => self.options.push((name, spec)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionSpec)> {
        self.options.iter().map(|(n, spec)| (n.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Finds the option owning a `--long` switch.
    pub fn find_long(&self, long: &str) -> Option<(&str, &OptionSpec)> {
        self.iter().find(|(_, spec)| spec.long.as_deref() == Some(long))
    }

    /// Finds the option owning a `-s` switch.
    pub fn find_short(&self, short: char) -> Option<(&str, &OptionSpec)> {
        self.iter().find(|(_, spec)| spec.short == Some(short))
    }

    /// Checks names, switches and defaults.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut switches: HashMap<String, &str> = HashMap::new();

        for (name, spec) in self.iter() {
            if name == PARAMS_ID {
                return Err(SchemaError::Reserved(name.to_string()));
            }
            if !is_valid_name(name) {
                return Err(SchemaError::InvalidName(name.to_string()));
            }
            if spec.long.is_none() && spec.short.is_none() {
                return Err(SchemaError::MissingSwitch(name.to_string()));
            }
            if spec.param == ParamMode::None && spec.default.is_some() {
                return Err(SchemaError::DefaultOnFlag(name.to_string()));
            }

            let mut claimed = Vec::with_capacity(2);
            if let Some(long) = &spec.long {
                if !is_valid_name(long) {
                    return Err(SchemaError::InvalidLong {
                        name: name.to_string(),
                        long: long.clone(),
                    });
                }
                claimed.push(format!("--{long}"));
            }
            if let Some(short) = spec.short {
                if !short.is_ascii_alphanumeric() {
                    return Err(SchemaError::InvalidShort {
                        name: name.to_string(),
                        short,
                    });
                }
                claimed.push(format!("-{short}"));
            }

            for switch in claimed {
                if let Some(first) = switches.get(&switch) {
                    return Err(SchemaError::Duplicate {
                        switch,
                        first: first.to_string(),
                        second: name.to_string(),
                    });
                }
                switches.insert(switch, name);
            }
        }

        Ok(())
    }
}

impl<N: Into<String>> FromIterator<(N, OptionSpec)> for OptionSchema {
    fn from_iter<T: IntoIterator<Item = (N, OptionSpec)>>(iter: T) -> Self {
        let mut schema = OptionSchema::new();
        for (name, spec) in iter {
            schema.insert(name, spec);
        }
        schema
    }
}

/// `[A-Za-z0-9][A-Za-z0-9_-]*`
fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
