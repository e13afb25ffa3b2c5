//! Configuration access port trait.
//!
//! Adapters supply raw strings; the typed getters parse them and report a
//! malformed value as [`StratbenchError::ConfigInvalid`] instead of falling
//! back to the default.

use crate::domain::error::StratbenchError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys of `section`, unordered; empty if the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, StratbenchError> {
        parse_or(self.get_string(section, key), section, key, default, |v| {
            v.parse::<i64>().ok()
        })
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, StratbenchError> {
        parse_or(self.get_string(section, key), section, key, default, |v| {
            v.parse::<f64>().ok()
        })
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, StratbenchError> {
        parse_or(self.get_string(section, key), section, key, default, parse_bool)
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn parse_or<T>(
    raw: Option<String>,
    section: &str,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, StratbenchError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => parse(value).ok_or_else(|| StratbenchError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("cannot parse '{}'", value),
        }),
    }
}
