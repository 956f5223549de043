//! JSON codec adapter: structured marshal and lenient unmarshal.
//!
//! Both directions ride on `serde_json` and share an options vocabulary.
//! Marshal renders a value tree to UTF-8 JSON text with configurable
//! pretty-printing and null handling; unmarshal parses arbitrary JSON text
//! into a generic `Value` tree without any fixed schema. The report path
//! uses the same marshal entry point with pretty printing turned on.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key wrapped around a bare array before marshaling.
const LIST_WRAPPER_KEY: &str = "list";

/// JSON-number shape; leading-zero strings are not numeric-looking.
const NUMERIC_PATTERN: &str = r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$";

/// Options for the marshal direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalOptions {
    /// Indent the output. Whitespace only; field order and values are
    /// unaffected.
    pub pretty: bool,
    /// Keep explicit nulls instead of dropping absent fields.
    pub explicit_nulls: bool,
    /// Permit a bare scalar at the top level.
    pub allow_raw: bool,
    /// Keep the `{"list": [...]}` wrapper root around array input.
    pub force_root: bool,
}

impl MarshalOptions {
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }
}

/// Options for the unmarshal direction.
#[derive(Debug, Clone, Copy)]
pub struct UnmarshalOptions {
    /// Permit a bare scalar at the top level.
    pub allow_raw: bool,
    /// Fold hyphenated keys to a camel-case equivalent.
    pub camel_case_dashes: bool,
    /// Coerce every scalar to a string instead of inferring its type.
    pub strings_only: bool,
    /// Coerce numeric-looking strings to numbers. Ignored under
    /// `strings_only`.
    pub parse_numbers: bool,
}

impl Default for UnmarshalOptions {
    fn default() -> Self {
        Self {
            allow_raw: false,
            camel_case_dashes: true,
            strings_only: false,
            parse_numbers: true,
        }
    }
}

/// Serialize any value through the codec.
pub fn marshal<T: Serialize>(value: &T, options: &MarshalOptions) -> Result<String> {
    let tree = serde_json::to_value(value).context("convert input to a json tree")?;
    stringify(&tree, options)
}

/// Render a JSON value tree to text.
///
/// A bare array is wrapped as `{"list": [...]}` before marshaling; unless
/// `force_root` is set, the wrapper root is dropped again on output, so
/// array input and `{"list": array}` input produce the same document.
pub fn stringify(value: &Value, options: &MarshalOptions) -> Result<String> {
    let mut tree = value.clone();
    if tree.is_array() {
        let mut wrapper = Map::new();
        wrapper.insert(LIST_WRAPPER_KEY.to_string(), tree);
        tree = Value::Object(wrapper);
    }
    if !options.explicit_nulls {
        tree = strip_nulls(tree);
    }
    if !options.force_root {
        tree = unwrap_list_root(tree);
    }
    if !matches!(tree, Value::Object(_) | Value::Array(_)) && !options.allow_raw {
        bail!(
            "cannot marshal a bare {} without raw mode",
            kind_name(&tree)
        );
    }
    let text = if options.pretty {
        serde_json::to_string_pretty(&tree)
    } else {
        serde_json::to_string(&tree)
    };
    text.context("render json text")
}

/// Lenient parse of arbitrary JSON text into a generic value tree.
pub fn objectify(text: &str, options: &UnmarshalOptions) -> Result<Value> {
    let mut tree: Value = serde_json::from_str(text).context("parse json text")?;
    if !options.allow_raw && !matches!(tree, Value::Object(_) | Value::Array(_)) {
        bail!(
            "bare {} at the top level requires raw mode",
            kind_name(&tree)
        );
    }
    if options.camel_case_dashes {
        tree = fold_dashed_keys(tree);
    }
    if options.strings_only {
        tree = scalars_to_strings(tree);
    } else if options.parse_numbers {
        let numeric = Regex::new(NUMERIC_PATTERN).context("compile numeric pattern")?;
        tree = parse_numeric_strings(tree, &numeric);
    }
    Ok(tree)
}

/// Drop null entries from objects, recursively. Array elements keep their
/// positions, so nulls inside arrays survive.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, nested)| !nested.is_null())
                .map(|(key, nested)| (key, strip_nulls(nested)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn unwrap_list_root(tree: Value) -> Value {
    match tree {
        Value::Object(map)
            if map.len() == 1 && map.get(LIST_WRAPPER_KEY).is_some_and(Value::is_array) =>
        {
            match map.into_iter().next() {
                Some((_, list)) => list,
                None => Value::Object(Map::new()),
            }
        }
        other => other,
    }
}

fn fold_dashed_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, nested)| (camel_case(&key), fold_dashed_keys(nested)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_dashed_keys).collect()),
        other => other,
    }
}

fn camel_case(key: &str) -> String {
    if !key.contains('-') {
        return key.to_string();
    }
    let mut folded = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            folded.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            folded.push(ch);
        }
    }
    folded
}

fn scalars_to_strings(value: Value) -> Value {
    match value {
        Value::Bool(flag) => Value::String(flag.to_string()),
        Value::Number(number) => Value::String(number.to_string()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, nested)| (key, scalars_to_strings(nested)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(scalars_to_strings).collect()),
        other => other,
    }
}

fn parse_numeric_strings(value: Value, numeric: &Regex) -> Value {
    match value {
        Value::String(text) if numeric.is_match(&text) => coerce_number(text),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, nested)| (key, parse_numeric_strings(nested, numeric)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| parse_numeric_strings(item, numeric))
                .collect(),
        ),
        other => other,
    }
}

fn coerce_number(text: String) -> Value {
    if let Ok(integer) = text.parse::<i64>() {
        return Value::Number(integer.into());
    }
    match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(number) => Value::Number(number),
        None => Value::String(text),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Object(_) => "object",
        Value::Array(_) => "array",
    }
}
