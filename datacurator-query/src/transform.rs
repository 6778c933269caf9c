// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Field mapping interpreter
//!
//! Turns one raw source item into a [`Row`]: each mapping walks a dot path
//! into the item and optionally runs a named transform over the value.
//! Transform names come from a closed set; anything unknown is identity.
//!
//! Coercions follow JavaScript semantics so results match what GraphQL
//! clients already display:
//!
//! | name          | behaviour                                              |
//! |---------------|--------------------------------------------------------|
//! | `parseFloat`  | longest leading float prefix of a string               |
//! | `parseInt`    | leading integer prefix; numbers are truncated          |
//! | `toString`    | string rendering, integral numbers without `.0`        |
//! | `toFixed2`    | whole-value numeric coercion, rounded to 2 decimals    |
//! | `multiply100` | whole-value numeric coercion, times 100                |
//!
//! A coercion that yields NaN (or a non-finite number) becomes `null`.

use datacurator_core::{FieldMapping, Row};
use serde_json::Value;
use std::collections::HashMap;

/// Built-in transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    ParseFloat,
    ParseInt,
    ToString,
    ToFixed2,
    Multiply100,
    Identity,
}

impl Transform {
    pub fn apply(self, value: &Value) -> Value {
        match self {
            Transform::Identity => value.clone(),
            Transform::ParseFloat => number_or_null(parse_float(value)),
            Transform::ParseInt => number_or_null(parse_int(value)),
            Transform::ToString => Value::String(js_string(value)),
            Transform::ToFixed2 => {
                number_or_null(to_number(value).map(|n| (n * 100.0).round() / 100.0))
            }
            Transform::Multiply100 => number_or_null(to_number(value).map(|n| n * 100.0)),
        }
    }
}

/// Name → transform lookup, built once and shared
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<&'static str, Transform>,
}

impl TransformRegistry {
    pub fn builtin() -> Self {
        let transforms = [
            ("parseFloat", Transform::ParseFloat),
            ("parseInt", Transform::ParseInt),
            ("toString", Transform::ToString),
            ("toFixed2", Transform::ToFixed2),
            ("multiply100", Transform::Multiply100),
        ]
        .into_iter()
        .collect();

        Self { transforms }
    }

    pub fn resolve(&self, name: &str) -> Transform {
        match self.transforms.get(name) {
            Some(t) => *t,
            None => {
                tracing::debug!(transform = name, "Unknown transform, using identity");
                Transform::Identity
            }
        }
    }

    /// Resolve every mapping of one source query ahead of execution
    pub fn compile(&self, mappings: &[FieldMapping]) -> CompiledMappings {
        let entries = mappings
            .iter()
            .map(|m| CompiledMapping {
                path: m.field.split('.').map(str::to_string).collect(),
                alias: m.alias.clone(),
                transform: m
                    .transformation
                    .as_deref()
                    .map(|name| self.resolve(name))
                    .unwrap_or(Transform::Identity),
            })
            .collect();

        CompiledMappings { entries }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CompiledMapping {
    path: Vec<String>,
    alias: String,
    transform: Transform,
}

/// Mappings with transform names already resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledMappings {
    entries: Vec<CompiledMapping>,
}

impl CompiledMappings {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map one source item to a row
    ///
    /// Missing paths and explicit nulls produce `null` without running the
    /// transform. Duplicate aliases keep the value of the last mapping.
    pub fn apply(&self, item: &Value) -> Row {
        let mut row = Row::with_capacity(self.entries.len());
        for entry in &self.entries {
            let value = match resolve_path(item, &entry.path) {
                Some(v) if !v.is_null() => entry.transform.apply(v),
                _ => Value::Null,
            };
            row.insert(entry.alias.clone(), value);
        }
        row
    }
}

/// Map one source item with compiled mappings
pub fn apply(item: &Value, mappings: &CompiledMappings) -> Row {
    mappings.apply(item)
}

/// Walk path segments; array segments must be numeric indices
pub fn resolve_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    let Some((head, rest)) = path.split_first() else {
        return Some(value);
    };

    let next = match value {
        Value::Object(map) => map.get(head.as_ref())?,
        Value::Array(items) => items.get(head.as_ref().parse::<usize>().ok()?)?,
        _ => return None,
    };

    resolve_path(next, rest)
}

/// Numeric JSON value; integral results render without a fraction
pub(crate) fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn number_or_null(n: Option<f64>) -> Value {
    match n {
        Some(n) if n.is_finite() => json_number(n),
        _ => Value::Null,
    }
}

/// `Number(value)`: whole-value coercion
pub(crate) fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(0.0);
            }
            if !is_decimal_literal(s) {
                return None;
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim_start();
            let len = float_prefix_len(s);
            if len == 0 {
                return None;
            }
            s[..len].parse::<f64>().ok()
        }
        _ => None,
    }
}

fn parse_int(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().map(f64::trunc),
        Value::String(s) => {
            let s = s.trim_start();
            let bytes = s.as_bytes();
            let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
            let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 {
                return None;
            }
            s[..sign + digits].parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Length of the longest prefix of `s` that is a decimal float literal
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let int_digits = count_digits(&bytes[i..]);
    i += int_digits;

    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        frac_digits = count_digits(&bytes[i + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            i += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_digits = count_digits(&bytes[j..]);
        if exp_digits > 0 {
            i = j + exp_digits;
        }
    }

    i
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn is_decimal_literal(s: &str) -> bool {
    float_prefix_len(s) == s.len()
}

fn js_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{}", f as i128)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
