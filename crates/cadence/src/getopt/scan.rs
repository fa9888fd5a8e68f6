//! Pre-parse pass over raw tokens.
//!
//! Clap rejects anything it does not know, and its errors are hard to map
//! back to a token. This pass walks the tokens first with the same switch
//! rules, so that unknown options are reported (strict) or dropped
//! (non-strict) by name, and missing or unexpected values are caught before
//! clap sees them.

use tracing::debug;

use super::schema::{OptionSchema, ParamMode};
use crate::error::ParseError;

/// Tokens to hand to clap, plus unknown options that were dropped.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Scanned {
    pub kept: Vec<String>,
    pub ignored: Vec<String>,
}

/// What a single token turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum Kind {
    Positional,
    /// A known option; `Some(mode)` if its value is the next token.
    Known(Option<ParamMode>),
    Unknown(String),
    /// A flag written with `=value`.
    Unexpected(String),
}

pub(crate) fn scan(
    schema: &OptionSchema,
    argv: &[String],
    strict: bool,
) -> Result<Scanned, ParseError> {
    let mut scanned = Scanned::default();
    let mut tokens = argv.iter().peekable();

    while let Some(token) = tokens.next() {
        if token == "--" {
            scanned.kept.push(token.clone());
            scanned.kept.extend(tokens.cloned());
            break;
        }

        match classify(schema, token) {
            Kind::Positional | Kind::Known(None) => scanned.kept.push(token.clone()),
            Kind::Known(Some(ParamMode::Required)) => {
                scanned.kept.push(token.clone());
                match tokens.next() {
                    Some(value) => scanned.kept.push(value.clone()),
                    None => return Err(ParseError::MissingValue(token.clone())),
                }
            }
            Kind::Known(Some(_)) => {
                scanned.kept.push(token.clone());
                if let Some(value) = tokens.next_if(|next| !next.starts_with('-')) {
                    scanned.kept.push(value.clone());
                }
            }
            Kind::Unexpected(option) => return Err(ParseError::UnexpectedValue(option)),
            Kind::Unknown(option) => {
                if strict {
                    return Err(ParseError::UnknownOption(option));
                }
                debug!(option = %option, token = %token, "ignoring unknown option");
                scanned.ignored.push(token.clone());
            }
        }
    }

    Ok(scanned)
}

fn classify(schema: &OptionSchema, token: &str) -> Kind {
    if token == "-" || !token.starts_with('-') {
        return Kind::Positional;
    }

    if let Some(body) = token.strip_prefix("--") {
        let (long, inline) = match body.split_once('=') {
            Some((long, value)) => (long, Some(value)),
            None => (body, None),
        };
        return match schema.find_long(long) {
            None => Kind::Unknown(format!("--{long}")),
            Some((_, spec)) => match (spec.param, inline) {
                (ParamMode::None, Some(_)) => Kind::Unexpected(format!("--{long}")),
                (ParamMode::None, None) | (_, Some(_)) => Kind::Known(None),
                (mode, None) => Kind::Known(Some(mode)),
            },
        };
    }

    let body = &token[1..];
    // Negative number, unless its first digit is a short option
    if body.starts_with(|c: char| c.is_ascii_digit())
        && token.parse::<f64>().is_ok()
        && body
            .chars()
            .next()
            .and_then(|c| schema.find_short(c))
            .is_none()
    {
        return Kind::Positional;
    }

    // Short cluster: flags until the first value-taking option, whose value is
    // the rest of the token or the next token
    for (i, c) in body.char_indices() {
        let Some((_, spec)) = schema.find_short(c) else {
            return Kind::Unknown(format!("-{c}"));
        };
        if spec.takes_value() {
            let rest = &body[i + c.len_utf8()..];
            return if rest.is_empty() {
                Kind::Known(Some(spec.param))
            } else {
                Kind::Known(None)
            };
        }
    }
    Kind::Known(None)
}
