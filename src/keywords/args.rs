//! Binding call arguments to a keyword's declared arguments.
//!
//! Positional arguments fill declared arguments in order, named arguments
//! fill them by name, and named arguments that match nothing go to the
//! keyword's `**kwargs` catch-all (or are rejected when it has none).
//!
//! Runners often pass every value as a string, so the typed accessors accept
//! both JSON values and their string spellings (`"5432"`, `"True"`, `"None"`).

use crate::error::{DbError, DbResult};
use crate::keywords::catalog::KeywordSpec;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

#[derive(Debug)]
pub struct BoundArgs {
    keyword: &'static str,
    values: HashMap<&'static str, JsonValue>,
    /// Named arguments not declared by the keyword.
    pub extra: Map<String, JsonValue>,
}

impl BoundArgs {
    pub fn bind(
        spec: &'static KeywordSpec,
        args: Vec<JsonValue>,
        kwargs: Map<String, JsonValue>,
    ) -> DbResult<Self> {
        if args.len() > spec.args.len() {
            return Err(DbError::invalid_input(format!(
                "Keyword '{}' expected at most {} arguments, got {}",
                spec.name,
                spec.args.len(),
                args.len()
            )));
        }

        let mut values: HashMap<&'static str, JsonValue> = spec
            .args
            .iter()
            .zip(args)
            .map(|(decl, value)| (decl.name, value))
            .collect();

        let mut extra = Map::new();
        for (name, value) in kwargs {
            match spec.args.iter().find(|a| a.name == name) {
                Some(decl) => {
                    if values.insert(decl.name, value).is_some() {
                        return Err(DbError::invalid_input(format!(
                            "Keyword '{}' got multiple values for argument '{}'",
                            spec.name, decl.name
                        )));
                    }
                }
                None if spec.kwargs.is_some() => {
                    extra.insert(name, value);
                }
                None => {
                    return Err(DbError::invalid_input(format!(
                        "Keyword '{}' got unexpected named argument '{}'",
                        spec.name, name
                    )));
                }
            }
        }

        if let Some(missing) = spec
            .args
            .iter()
            .find(|a| a.default.is_none() && !values.contains_key(a.name))
        {
            return Err(DbError::invalid_input(format!(
                "Keyword '{}' missing value for argument '{}'",
                spec.name, missing.name
            )));
        }

        Ok(Self {
            keyword: spec.name,
            values,
            extra,
        })
    }

    /// Value of a declared argument, with `null`/`"None"` read as absent.
    fn get(&self, name: &str) -> Option<&JsonValue> {
        match self.values.get(name) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) if s == "None" => None,
            Some(v) => Some(v),
        }
    }

    pub fn required_str(&self, name: &str) -> DbResult<String> {
        self.optional_str(name)?
            .ok_or_else(|| self.invalid(name, "a value is required"))
    }

    pub fn optional_str(&self, name: &str) -> DbResult<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => Ok(Some(value_to_string(v))),
        }
    }

    pub fn optional_port(&self, name: &str) -> DbResult<Option<u16>> {
        match self.get(name) {
            None => Ok(None),
            Some(JsonValue::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(name, "expected a port number")),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse::<u16>()
                .map(Some)
                .map_err(|_| self.invalid(name, "expected a port number")),
            Some(_) => Err(self.invalid(name, "expected a port number")),
        }
    }

    pub fn optional_bool(&self, name: &str) -> DbResult<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => parse_bool(v)
                .map(Some)
                .ok_or_else(|| self.invalid(name, "expected true or false")),
        }
    }

    pub fn required_bool(&self, name: &str) -> DbResult<bool> {
        self.optional_bool(name)?
            .ok_or_else(|| self.invalid(name, "a value is required"))
    }

    /// Split the catch-all into the reserved `alias` and everything else.
    pub fn take_alias_from_extra(&mut self) -> Option<String> {
        match self.extra.remove("alias") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) if s == "None" => None,
            Some(v) => Some(value_to_string(&v)),
        }
    }

    fn invalid(&self, name: &str, reason: &str) -> DbError {
        DbError::invalid_input(format!(
            "Keyword '{}' argument '{}': {}",
            self.keyword, name, reason
        ))
    }
}

/// String form of a value as a runner would pass it.
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_i64().map(|i| i != 0),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
