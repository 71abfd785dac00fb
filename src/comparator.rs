use crate::assertions::{
    CsvTable, as_text, csv_equal, exclude, no_full_scan, project, record_equal, render, sort_rows,
};
use crate::error::{AssertionFailure, Error, Result, SpecError};
use crate::expectation::{Expectation, Expected, StructuredMatch};
use crate::types::{Record, ResultSet};
use crate::{t, t_args};
use std::path::Path;

/// Judge one actual result set against one expectation. `actual` is only
/// read; reshaping happens on a copy of its rows.
pub async fn verify(actual: &ResultSet, expected: &Expectation) -> Result<()> {
    if matches!(actual, ResultSet::Empty) && expected.demands_rows() {
        return Err(SpecError::InvalidTestcase(t!("invalid-expectation-for-empty")).into());
    }
    match expected {
        Expectation::Nothing => {
            if actual.is_empty() {
                Ok(())
            } else {
                Err(AssertionFailure::new(t!("failure-expected-nothing"))
                    .with_sides("[]", render(&actual.records()))
                    .into())
            }
        }
        Expectation::NoFullScan(hint) => match actual {
            ResultSet::Plan(plan) => Ok(no_full_scan(plan, hint)?),
            _ => Err(SpecError::InvalidTestcase(t_args!("invalid-fullscan-target", "table" => hint)).into()),
        },
        Expectation::CsvRef(path) => {
            let table = load_csv(path).await?;
            compare_csv(&actual.records(), &table, None)
        }
        Expectation::Match(m) => verify_match(actual, m).await,
    }
}

async fn verify_match(actual: &ResultSet, m: &StructuredMatch) -> Result<()> {
    let rows = reshape(actual.records(), m)?;
    match &m.equal_to {
        Expected::Records(expected) => {
            let mut rows = rows;
            let mut expected = expected.clone();
            if let Some(keys) = &m.order_by {
                sort_rows(&mut rows, keys)?;
                sort_rows(&mut expected, keys)?;
            }
            Ok(record_equal(&rows, &expected)?)
        }
        Expected::Csv(path) => {
            let table = load_csv(path).await?;
            compare_csv(&rows, &table, m.order_by.as_deref())
        }
    }
}

/// Apply `columns` then `without` to the actual rows.
pub fn reshape(rows: Vec<Record>, m: &StructuredMatch) -> Result<Vec<Record>, AssertionFailure> {
    let rows = match &m.columns {
        Some(columns) => project(&rows, columns)?,
        None => rows,
    };
    Ok(match &m.without {
        Some(without) => exclude(rows, without),
        None => rows,
    })
}

fn compare_csv(rows: &[Record], table: &CsvTable, order_by: Option<&[String]>) -> Result<()> {
    let mut actual = as_text(rows);
    let mut expected = table.to_records();
    if let Some(keys) = order_by {
        sort_rows(&mut actual, keys)?;
        sort_rows(&mut expected, keys)?;
    }
    Ok(csv_equal(&actual, &expected, &table.headers)?)
}

async fn load_csv(path: &Path) -> Result<CsvTable> {
    let bytes = tokio::fs::read(path).await.map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CsvTable::parse(&bytes).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
