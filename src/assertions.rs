//! Assertion primitives the comparator composes: reshaping a result (column
//! projection, exclusion, ordering) and judging it (record equality, CSV
//! equality, full-scan negation over a plan).

use crate::error::AssertionFailure;
use crate::t_args;
use crate::types::{PlanResult, Record};
use serde_json::Value;
use std::cmp::Ordering;

/// Row/cell differences listed in one failure before the rest is summarized.
const MAX_DIFFS: usize = 20;

/// Keep only `columns`, in that order. Every row must carry every column.
pub fn project(rows: &[Record], columns: &[String]) -> Result<Vec<Record>, AssertionFailure> {
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| match row.get(c) {
                    Some(v) => Ok((c.clone(), v.clone())),
                    None => Err(AssertionFailure::new(t_args!("failure-unknown-column",
                        "column" => c,
                        "available" => row.keys().cloned().collect::<Vec<_>>().join(", ")
                    ))),
                })
                .collect::<Result<Record, _>>()
        })
        .collect()
}

/// Drop `without` from every row. Absent columns are ignored.
pub fn exclude(rows: Vec<Record>, without: &[String]) -> Vec<Record> {
    rows.into_iter()
        .map(|mut row| {
            row.retain(|k, _| !without.contains(k));
            row
        })
        .collect()
}

/// Sort rows by `keys`, breaking ties on the remaining columns so that two
/// permutations of the same multiset end up identical. A key no row carries
/// is rejected like an unknown projection column.
pub fn sort_rows(rows: &mut [Record], keys: &[String]) -> Result<(), AssertionFailure> {
    if let Some(first) = rows.first() {
        if let Some(k) = keys.iter().find(|k| !rows.iter().any(|r| r.contains_key(*k))) {
            return Err(AssertionFailure::new(t_args!("failure-unknown-column",
                "column" => k,
                "available" => first.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
    }
    rows.sort_by(|a, b| cmp_rows(a, b, keys));
    Ok(())
}

fn cmp_rows(a: &Record, b: &Record, keys: &[String]) -> Ordering {
    let by_keys = keys
        .iter()
        .map(|k| cmp_opt(a.get(k), b.get(k)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal);
    by_keys.then_with(|| {
        let mut ea: Vec<_> = a.iter().collect();
        let mut eb: Vec<_> = b.iter().collect();
        ea.sort_by(|x, y| x.0.cmp(y.0));
        eb.sort_by(|x, y| x.0.cmp(y.0));
        ea.iter()
            .zip(eb.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| cmp_values(va, vb)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| ea.len().cmp(&eb.len()))
    })
}

fn cmp_opt(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp_values(a, b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Numeric reading of a value: numbers, and strings that parse as one.
fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) if numeric(v).is_some() => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn text(v: &Value) -> std::borrow::Cow<'_, str> {
    match v {
        Value::String(s) => s.as_str().into(),
        other => other.to_string().into(),
    }
}

/// Total order over values. Each value is keyed by (rank, numeric value,
/// string-ness, text) and keys compare lexicographically, so numbers and
/// numeric strings interleave by value and sort before any other string.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    rank(a)
        .cmp(&rank(b))
        .then_with(|| match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        })
        .then_with(|| a.is_string().cmp(&b.is_string()))
        .then_with(|| text(a).cmp(&text(b)))
}

/// Value equality with numbers compared by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Text a value takes in a CSV cell.
pub fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cells_equal(a: &str, b: &str) -> bool {
    a == b
        || matches!(
            (a.trim().parse::<f64>(), b.trim().parse::<f64>()),
            (Ok(x), Ok(y)) if x == y
        )
}

pub(crate) fn render(rows: &[Record]) -> String {
    serde_json::to_string(rows).unwrap_or_else(|_| format!("{rows:?}"))
}

fn finish(diffs: Vec<String>, actual: &[Record], expected: &[Record]) -> Result<(), AssertionFailure> {
    if diffs.is_empty() {
        return Ok(());
    }
    let total = diffs.len();
    let mut lines: Vec<String> = diffs.into_iter().take(MAX_DIFFS).collect();
    if total > MAX_DIFFS {
        lines.push(t_args!("failure-more-diffs", "count" => total - MAX_DIFFS));
    }
    Err(AssertionFailure::new(lines.join("\n")).with_sides(render(expected), render(actual)))
}

fn row_count(actual: &[Record], expected_len: usize) -> Option<String> {
    (actual.len() != expected_len).then(|| {
        t_args!("failure-row-count",
            "expected" => expected_len,
            "actual" => actual.len()
        )
    })
}

/// Same rows in the same order; within a row column order is irrelevant.
pub fn record_equal(actual: &[Record], expected: &[Record]) -> Result<(), AssertionFailure> {
    if let Some(msg) = row_count(actual, expected.len()) {
        return finish(vec![msg], actual, expected);
    }
    let mut diffs = Vec::new();
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let row = i + 1;
        for (col, ev) in e {
            match a.get(col) {
                None => diffs.push(t_args!("failure-missing-column", "row" => row, "column" => col)),
                Some(av) if !values_equal(av, ev) => diffs.push(t_args!("failure-cell",
                    "row" => row,
                    "column" => col,
                    "expected" => ev,
                    "actual" => av
                )),
                Some(_) => {}
            }
        }
        for col in a.keys().filter(|c| !e.contains_key(*c)) {
            diffs.push(t_args!("failure-extra-column", "row" => row, "column" => col));
        }
    }
    finish(diffs, actual, expected)
}

/// Parsed CSV expectation: header row plus text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn parse(bytes: &[u8]) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = reader
            .records()
            .map(|r| r.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
            .collect::<Result<_, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|cells| {
                self.headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().map(|c| Value::String(c.clone())))
                    .collect::<Record>()
            })
            .collect()
    }
}

/// Records rendered as CSV cell text, column order kept.
pub fn as_text(rows: &[Record]) -> Vec<Record> {
    rows.iter()
        .map(|r| {
            r.iter()
                .map(|(k, v)| (k.clone(), Value::String(cell_text(v))))
                .collect::<Record>()
        })
        .collect()
}

/// Rows must match the CSV exactly: same columns in the same order, same
/// row count and order, same cell text (numeric cells compare by value).
/// Both sides are expected in textual form (see [`as_text`]).
pub fn csv_equal(actual: &[Record], expected: &[Record], headers: &[String]) -> Result<(), AssertionFailure> {
    if let Some(msg) = row_count(actual, expected.len()) {
        return finish(vec![msg], actual, expected);
    }
    let mut diffs = Vec::new();
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let row = i + 1;
        let columns: Vec<&String> = a.keys().collect();
        if !columns.iter().copied().eq(headers.iter()) {
            diffs.push(t_args!("failure-column-order",
                "row" => row,
                "expected" => headers.join(", "),
                "actual" => columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
            ));
            continue;
        }
        for (col, ev) in e {
            let av = a.get(col).map(cell_text).unwrap_or_default();
            let ev = cell_text(ev);
            if !cells_equal(&av, &ev) {
                diffs.push(t_args!("failure-cell",
                    "row" => row,
                    "column" => col,
                    "expected" => format!("{ev:?}"),
                    "actual" => format!("{av:?}")
                ));
            }
        }
    }
    finish(diffs, actual, expected)
}

/// Fail if any plan node reads the whole of `hint`.
pub fn no_full_scan(plan: &PlanResult, hint: &str) -> Result<(), AssertionFailure> {
    let scans: Vec<&str> = plan.full_scans_of(hint).map(|n| n.detail.as_str()).collect();
    if scans.is_empty() {
        return Ok(());
    }
    Err(
        AssertionFailure::new(t_args!("failure-full-scan",
            "table" => hint,
            "detail" => scans.join("; ")
        ))
        .with_sides(
            t_args!("expected-no-full-scan", "table" => hint),
            plan.nodes
                .iter()
                .map(|n| n.detail.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        ),
    )
}
