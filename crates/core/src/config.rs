//! Helpers for reading typed settings from the environment.
//!
//! Each config struct exposes `from_env()` plus a `from_lookup()` variant
//! taking any key lookup, so parsing can be tested without touching the
//! process environment.

use std::str::FromStr;

/// A setting was present but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Read `key` and parse it, falling back to `default` when unset or blank.
pub fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            key: key.to_string(),
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Read a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`).
pub fn flag_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key: key.to_string(),
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Read a non-blank string setting.
pub fn string(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn parse_uses_default_when_unset_or_blank() {
        assert_eq!(parse_or(&env(&[]), "PORT", 3000u16).unwrap(), 3000);
        assert_eq!(parse_or(&env(&[("PORT", " ")]), "PORT", 3000u16).unwrap(), 3000);
        assert_eq!(parse_or(&env(&[("PORT", "8080")]), "PORT", 3000u16).unwrap(), 8080);
    }

    #[test]
    fn parse_reports_key_and_value() {
        let err = parse_or(&env(&[("PORT", "eighty")]), "PORT", 3000u16).unwrap_err();
        assert_eq!(err.key, "PORT");
        assert_eq!(err.value, "eighty");
    }

    #[test]
    fn flags() {
        assert!(flag_or(&env(&[("X", "yes")]), "X", false).unwrap());
        assert!(!flag_or(&env(&[("X", "0")]), "X", true).unwrap());
        assert!(flag_or(&env(&[]), "X", true).unwrap());
        assert!(flag_or(&env(&[("X", "maybe")]), "X", true).is_err());
    }

    #[test]
    fn strings_are_trimmed() {
        assert_eq!(string(&env(&[("K", "  v ")]), "K").as_deref(), Some("v"));
        assert_eq!(string(&env(&[("K", "")]), "K"), None);
    }
}
