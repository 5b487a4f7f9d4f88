//! Lenient deserializers for query strings and multipart text fields.
//!
//! Browsers send every form value as a string, and empty inputs arrive as
//! `""`. These helpers treat empty strings as absent and accept numbers
//! written either as JSON numbers or as strings.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrI64 {
    Int(i64),
    Str(String),
}

pub fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrI64>::deserialize(deserializer)? {
        Some(StringOrI64::Int(v)) => Ok(Some(v)),
        Some(StringOrI64::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(StringOrI64::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrBool {
    Bool(bool),
    Str(String),
}

/// Accepts `true`/`false` as booleans or as the strings `true`, `false`,
/// `1`, `0`, `on`, `off`.
pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrBool>::deserialize(deserializer)? {
        Some(StringOrBool::Bool(v)) => Ok(Some(v)),
        Some(StringOrBool::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "on" => Ok(Some(true)),
            "false" | "0" | "off" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got '{other}'"
            ))),
        },
        None => Ok(None),
    }
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.trim().is_empty()))
}
