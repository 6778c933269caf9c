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

//! Merge, sort and filter of per-source rows
//!
//! Rows are concatenated in source order, then optionally sorted descending
//! by one numeric column, then filtered by `field:op:value` thresholds.

use crate::executor::ExecutionResult;
use crate::transform::to_number;
use datacurator_core::{Requirements, Row};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `row[field] >= value`
    Min,
    /// `row[field] <= value`
    Max,
    /// Always passes
    NoOp,
}

/// One compiled `field:op:value` filter
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub field: String,
    pub op: FilterOp,
    pub threshold: f64,
}

impl RowFilter {
    /// Parse a filter; anything unrecognised becomes a no-op
    pub fn parse(expr: &str) -> Self {
        let mut parts = expr.splitn(3, ':');
        let (Some(field), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            tracing::debug!(filter = expr, "Incomplete filter ignored");
            return Self::noop(expr);
        };

        let op = match op.trim() {
            "min" => FilterOp::Min,
            "max" => FilterOp::Max,
            other => {
                tracing::debug!(filter = expr, op = other, "Unsupported filter operation ignored");
                return Self::noop(field);
            }
        };

        match value.trim().parse::<f64>() {
            Ok(threshold) if !threshold.is_nan() => Self {
                field: field.trim().to_string(),
                op,
                threshold,
            },
            _ => {
                tracing::debug!(filter = expr, "Non-numeric filter threshold ignored");
                Self::noop(field)
            }
        }
    }

    fn noop(field: &str) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::NoOp,
            threshold: 0.0,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        if self.op == FilterOp::NoOp {
            return true;
        }

        let value = numeric_value(row, &self.field);
        if value.is_nan() {
            return false;
        }

        match self.op {
            FilterOp::Min => value >= self.threshold,
            FilterOp::Max => value <= self.threshold,
            FilterOp::NoOp => true,
        }
    }
}

/// Numeric view of a column: missing or null is 0, non-numeric is NaN
pub fn numeric_value(row: &Row, field: &str) -> f64 {
    match row.get(field) {
        None | Some(Value::Null) => 0.0,
        Some(value) => to_number(value).unwrap_or(f64::NAN),
    }
}

/// Descending by value with NaN last; equal keys compare equal
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Concatenate succeeded results in source order, then sort and filter
pub fn merge(results: &[ExecutionResult], requirements: &Requirements) -> Vec<Row> {
    let total: usize = results.iter().map(|r| r.rows().len()).sum();
    let mut rows = Vec::with_capacity(total);
    for result in results {
        rows.extend(result.rows().iter().cloned());
    }
    merge_rows(rows, requirements)
}

/// Sort and filter already concatenated rows
pub fn merge_rows(rows: Vec<Row>, requirements: &Requirements) -> Vec<Row> {
    let rows = match requirements.sort_key() {
        Some(key) => sort_descending(rows, key),
        None => rows,
    };

    let filters: Vec<RowFilter> = requirements
        .filters()
        .iter()
        .map(|f| RowFilter::parse(f))
        .filter(|f| f.op != FilterOp::NoOp)
        .collect();

    if filters.is_empty() {
        return rows;
    }

    let before = rows.len();
    let kept: Vec<Row> = rows
        .into_iter()
        .filter(|row| filters.iter().all(|f| f.matches(row)))
        .collect();

    tracing::debug!(before, after = kept.len(), filters = filters.len(), "Rows filtered");
    kept
}

/// Stable descending sort on one numeric column
pub fn sort_descending(rows: Vec<Row>, key: &str) -> Vec<Row> {
    let mut keyed: Vec<(f64, Row)> = rows
        .into_iter()
        .map(|row| (numeric_value(&row, key), row))
        .collect();
    keyed.sort_by(|a, b| descending(a.0, b.0));
    keyed.into_iter().map(|(_, row)| row).collect()
}
