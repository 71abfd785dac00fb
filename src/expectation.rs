use crate::directive::{extension, resolve_path};
use crate::error::SpecError;
use crate::types::Record;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Records(Vec<Record>),
    Csv(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMatch {
    pub equal_to: Expected,
    pub columns: Option<Vec<String>>,
    pub without: Option<Vec<String>>,
    pub order_by: Option<Vec<String>>,
}

/// One assertion against one actual result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    CsvRef(PathBuf),
    NoFullScan(String),
    Match(StructuredMatch),
    /// `null` or `{}`: the step is expected to produce no rows.
    Nothing,
}

impl Expectation {
    pub fn parse(raw: &Value, base: Option<&Path>) -> Result<Self, SpecError> {
        match raw {
            Value::Null => Ok(Expectation::Nothing),
            Value::String(s) => {
                let path = s.strip_prefix('@').unwrap_or(s).trim();
                if extension(path) != "csv" {
                    return Err(SpecError::InvalidTestcase(format!(
                        "expected a .csv reference, got {raw}"
                    )));
                }
                Ok(Expectation::CsvRef(resolve_path(path, base)))
            }
            Value::Object(map) if map.is_empty() => Ok(Expectation::Nothing),
            Value::Object(map) => {
                if let Some(hint) = map.get("noFullscan") {
                    return match hint {
                        Value::String(h) if !h.trim().is_empty() => {
                            Ok(Expectation::NoFullScan(h.trim().to_string()))
                        }
                        _ => Err(SpecError::InvalidTestcase(format!(
                            "noFullscan needs a table name, got {hint}"
                        ))),
                    };
                }
                let equal_to = match map.get("equalTo") {
                    Some(v) => parse_equal_to(v, base)?,
                    None => {
                        return Err(SpecError::InvalidTestcase(format!(
                            "missing equalTo in {raw}"
                        )));
                    }
                };
                Ok(Expectation::Match(StructuredMatch {
                    equal_to,
                    columns: column_list(map.get("columns"), "columns")?,
                    without: column_list(map.get("without"), "without")?,
                    order_by: column_list(map.get("orderBy"), "orderBy")?,
                }))
            }
            _ => Err(SpecError::InvalidTestcase(format!(
                "unsupported expectation {raw}"
            ))),
        }
    }

    /// Whether the expectation can only hold for a step that yields rows.
    pub fn demands_rows(&self) -> bool {
        match self {
            Expectation::CsvRef(_) | Expectation::NoFullScan(_) => true,
            Expectation::Match(m) => match &m.equal_to {
                Expected::Records(rows) => !rows.is_empty(),
                Expected::Csv(_) => true,
            },
            Expectation::Nothing => false,
        }
    }
}

fn parse_equal_to(v: &Value, base: Option<&Path>) -> Result<Expected, SpecError> {
    match v {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Record>()),
                other => Err(SpecError::InvalidTestcase(format!(
                    "equalTo rows must be objects, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Expected::Records),
        Value::String(s) => {
            let path = s.strip_prefix('@').unwrap_or(s).trim();
            if extension(path) == "csv" {
                Ok(Expected::Csv(resolve_path(path, base)))
            } else {
                Err(SpecError::InvalidTestcase(format!(
                    "equalTo must be a record list or a .csv file, got {v}"
                )))
            }
        }
        _ => Err(SpecError::InvalidTestcase(format!(
            "equalTo must be a record list or a .csv file, got {v}"
        ))),
    }
}

fn column_list(v: Option<&Value>, key: &str) -> Result<Option<Vec<String>>, SpecError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.trim().to_string()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| match i {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(SpecError::InvalidTestcase(format!(
                    "{key} entries must be column names, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(SpecError::InvalidTestcase(format!(
            "{key} must be a list of column names, got {other}"
        ))),
    }
}
