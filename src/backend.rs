use crate::types::{Batch, PlanResult, Record};
use anyhow::Result;
use std::future::Future;
use std::path::Path;

/// Data backend a suite runs against: one live connection, shared by every
/// test case of the suite.
///
/// All mutation (schema changes, inserts, bulk loads) goes through this
/// trait. The engine never touches the data itself.
pub trait Backend: Send + Sync {
    /// Run inline query text and return its rows.
    fn query(&self, text: &str) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Run every statement of a query file, one batch per statement.
    fn query_from_file(&self, path: &Path)
    -> impl Future<Output = Result<Vec<Batch<Vec<Record>>>>> + Send;

    /// Bulk-load a CSV file (with header row) into `table`.
    fn load_from_csv(&self, path: &Path, table: &str) -> impl Future<Output = Result<()>> + Send;

    /// Execution plan of inline query text.
    fn query_plan(&self, text: &str) -> impl Future<Output = Result<PlanResult>> + Send;

    /// Execution plans of every statement of a file, one batch per statement.
    fn query_plan_from_file(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Vec<Batch<PlanResult>>>> + Send;
}

/// Hands out a fresh backend connection per suite.
pub trait Connector: Send + Sync {
    type Backend: Backend;

    fn connect(&self) -> impl Future<Output = Result<Self::Backend>> + Send;

    /// Give the connection back once the suite is done.
    fn release(&self, backend: Self::Backend) -> impl Future<Output = Result<()>> + Send {
        async move {
            drop(backend);
            Ok(())
        }
    }
}
