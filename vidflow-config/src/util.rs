use std::fmt;
use std::str::FromStr;

use crate::loader::error::ConfigLoadError;

/// Split a comma separated list, dropping blank items.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Parse a boolean value from a raw string, accepting common env-style forms.
///
/// Accepted truthy values (case-insensitive): `"1"`, `"true"`, `"yes"`, `"on"`.
/// Accepted falsy values: `"0"`, `"false"`, `"no"`, `"off"`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Like [`parse_bool`], but an unrecognised value is an error for `key`.
pub fn parse_flag(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<bool>, ConfigLoadError> {
    raw.map(|value| {
        parse_bool(&value).ok_or_else(|| ConfigLoadError::InvalidValue {
            key,
            value,
            reason: "expected true/false, yes/no, on/off or 1/0".to_string(),
        })
    })
    .transpose()
}

pub fn parse_number<T>(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigLoadError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigLoadError::InvalidValue {
                key,
                reason: err.to_string(),
                value,
            })
    })
    .transpose()
}
