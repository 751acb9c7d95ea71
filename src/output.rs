//! Rendering of expanded documents as YAML or JSON text.
//!
//! Key order is preserved in both formats, so the rendered document lists
//! keys exactly as the tree holds them.
//!
//! # Examples
//!
//! ```
//! use cfgweave::{convert, output::{render, Format}};
//!
//! let tree = convert::from_yaml_str("b: 1\na: two").unwrap();
//! assert_eq!(render(&tree.into(), Format::Yaml).unwrap(), "b: 1\na: two\n");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::{
    convert::{value_to_json, value_to_yaml},
    error::Result,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown output format '{}' (expected yaml or json)", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => f.write_str("yaml"),
            Format::Json => f.write_str("json"),
        }
    }
}

pub fn to_yaml(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(&value_to_yaml(value.clone()))?)
}

/// Pretty-printed JSON with 2-space indentation.
pub fn to_json_pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(&value_to_json(value.clone()))?)
}

pub fn to_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&value_to_json(value.clone()))?)
}

pub fn render(value: &Value, format: Format) -> Result<String> {
    match format {
        Format::Yaml => to_yaml(value),
        Format::Json => to_json_pretty(value).map(|mut s| {
            s.push('\n');
            s
        }),
    }
}
