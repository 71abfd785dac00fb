use crate::backend::Backend;
use crate::directive::Directive;
use crate::error::{Error, Result};
use crate::t_args;
use crate::types::ResultSet;
use tracing::debug;

/// Execute one directive against `backend`.
///
/// | directive        | result sets                         |
/// |------------------|-------------------------------------|
/// | inline query     | exactly one                         |
/// | `@file.sql`      | one per statement of the file       |
/// | `@f.csv into t`  | none                                |
/// | inline plan      | exactly one ([`ResultSet::Plan`])   |
/// | `plan: @file`    | one plan per statement of the file  |
pub async fn interpret<B: Backend>(directive: &Directive, backend: &B) -> Result<Vec<ResultSet>> {
    debug!("{}", t_args!("debug-directive", "directive" => directive));
    let wrap = |e: anyhow::Error| Error::execution(directive, e);
    let sets = match directive {
        Directive::InlineQuery(text) => {
            vec![ResultSet::Records(backend.query(text).await.map_err(wrap)?)]
        }
        Directive::FileQuery(path) => backend
            .query_from_file(path)
            .await
            .map_err(wrap)?
            .into_iter()
            .map(|b| ResultSet::Records(b.records))
            .collect(),
        Directive::FileLoad { path, table } => {
            backend.load_from_csv(path, table).await.map_err(wrap)?;
            Vec::new()
        }
        Directive::InlinePlan(text) => {
            vec![ResultSet::Plan(backend.query_plan(text).await.map_err(wrap)?)]
        }
        Directive::FilePlan(path) => backend
            .query_plan_from_file(path)
            .await
            .map_err(wrap)?
            .into_iter()
            .map(|b| ResultSet::Plan(b.records))
            .collect(),
    };
    debug!("{}", t_args!("debug-directive-done", "count" => sets.len()));
    Ok(sets)
}
