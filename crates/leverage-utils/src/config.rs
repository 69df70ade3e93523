//! Environment configuration helpers
//!
//! Config structs in this workspace load themselves through an [`EnvLookup`]
//! function instead of calling `std::env::var` directly, so tests can feed
//! them a plain map.

use std::str::FromStr;
use thiserror::Error;

/// Function resolving an environment key to its value
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Errors raised while reading configuration variables
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvVarError {
    /// A required variable is not set (or is blank)
    #[error("{0} not set")]
    Missing(String),

    /// A variable is set but does not parse
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Look up a variable, treating blank values as unset
pub fn optional_var(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Look up a variable that must be present
pub fn required_var(lookup: EnvLookup<'_>, key: &str) -> Result<String, EnvVarError> {
    optional_var(lookup, key).ok_or_else(|| EnvVarError::Missing(key.to_string()))
}

/// Look up and parse a variable; `Ok(None)` when unset
pub fn parse_var<T>(lookup: EnvLookup<'_>, key: &str) -> Result<Option<T>, EnvVarError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(lookup, key)
        .map(|value| {
            value.parse::<T>().map_err(|e| EnvVarError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_blank_is_unset() {
        let vars = env(&[("TOKEN", "   ")]);
        let lookup = |key: &str| vars.get(key).cloned();
        assert_eq!(optional_var(&lookup, "TOKEN"), None);
        assert_eq!(
            required_var(&lookup, "TOKEN"),
            Err(EnvVarError::Missing("TOKEN".to_string()))
        );
    }

    #[test]
    fn test_parse_var() {
        let vars = env(&[("PORT", "8080"), ("BAD", "eighty")]);
        let lookup = |key: &str| vars.get(key).cloned();

        assert_eq!(parse_var::<u16>(&lookup, "PORT").unwrap(), Some(8080));
        assert_eq!(parse_var::<u16>(&lookup, "MISSING").unwrap(), None);

        let err = parse_var::<u16>(&lookup, "BAD").unwrap_err();
        assert!(err.to_string().contains("BAD"));
    }
}
