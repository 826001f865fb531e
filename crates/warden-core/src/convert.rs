//! Argument value conversion.
//!
//! The host framework declares a converter per parameter; this module models
//! that as a closed set of converter kinds over a typed value enum. A failed
//! conversion surfaces to the user as bad input, never as an internal error.

use crate::types::Snowflake;
use serde::{Deserialize, Serialize};

/// A converted argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    /// Free text
    Str(String),
    /// Whole number
    Int(i64),
    /// Decimal number
    Float(f64),
    /// Boolean switch
    Bool(bool),
    /// Principal/channel mention
    Id(Snowflake),
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Converter identity declared by a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConverterKind {
    /// Pass text through unchanged
    Text,
    /// Parse a whole number
    Integer,
    /// Parse a decimal number
    Decimal,
    /// Parse yes/no style input
    Switch,
    /// Parse a raw id or `<@id>` / `<@!id>` / `<#id>` mention
    Mention,
}

/// Conversion failure, carrying the parameter and the offending input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not interpret `{input}` as a value for `{param}`")]
pub struct ConvertError {
    /// Parameter the input was supplied for
    pub param: String,
    /// The rejected input text
    pub input: String,
}

/// Run a converter over raw text input.
///
/// # Errors
/// Returns [`ConvertError`] when the input does not parse under `kind`.
pub fn convert(kind: ConverterKind, param: &str, input: &str) -> Result<ArgValue, ConvertError> {
    let reject = || ConvertError {
        param: param.to_string(),
        input: input.to_string(),
    };
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(reject());
    }

    match kind {
        ConverterKind::Text => Ok(ArgValue::Str(trimmed.to_string())),
        ConverterKind::Integer => trimmed
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| reject()),
        ConverterKind::Decimal => trimmed
            .parse::<f64>()
            .map(ArgValue::Float)
            .map_err(|_| reject()),
        ConverterKind::Switch => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(ArgValue::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(ArgValue::Bool(false)),
            _ => Err(reject()),
        },
        ConverterKind::Mention => parse_mention(trimmed).ok_or_else(reject),
    }
}

fn parse_mention(input: &str) -> Option<ArgValue> {
    let raw = input
        .strip_prefix("<@!")
        .or_else(|| input.strip_prefix("<@"))
        .or_else(|| input.strip_prefix("<#"))
        .map_or(input, |rest| rest.strip_suffix('>').unwrap_or(""));
    raw.parse::<u64>().ok().map(|id| ArgValue::Id(Snowflake(id)))
}
