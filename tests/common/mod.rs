#![allow(dead_code)]

use anyhow::{Result, bail};
use query_test::backend::{Backend, Connector};
use query_test::types::{Batch, PlanResult, Record};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted backend: answers from canned tables and records every call.
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    pub rows: HashMap<String, Vec<Record>>,
    pub files: HashMap<PathBuf, Vec<Vec<Record>>>,
    pub plans: HashMap<String, PlanResult>,
    pub plan_files: HashMap<PathBuf, Vec<PlanResult>>,
    pub failing: HashSet<String>,
}

pub fn rows(v: Value) -> Vec<Record> {
    serde_json::from_value(v).expect("rows must be a list of objects")
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, query: &str, v: Value) -> Self {
        self.rows.insert(query.to_string(), rows(v));
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, batches: Vec<Value>) -> Self {
        self.files
            .insert(path.into(), batches.into_iter().map(rows).collect());
        self
    }

    pub fn with_plan(mut self, query: &str, plan: PlanResult) -> Self {
        self.plans.insert(query.to_string(), plan);
        self
    }

    pub fn with_plan_file(mut self, path: impl Into<PathBuf>, plans: Vec<PlanResult>) -> Self {
        self.plan_files.insert(path.into(), plans);
        self
    }

    pub fn failing_on(mut self, call: &str) -> Self {
        self.failing.insert(call.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.contains(&call) {
            bail!("backend refused: {call}");
        }
        Ok(())
    }
}

impl Backend for MockBackend {
    async fn query(&self, text: &str) -> Result<Vec<Record>> {
        self.log(format!("query {text}"))?;
        Ok(self.rows.get(text).cloned().unwrap_or_default())
    }

    async fn query_from_file(&self, path: &Path) -> Result<Vec<Batch<Vec<Record>>>> {
        self.log(format!("query_from_file {}", path.display()))?;
        Ok(self
            .files
            .get(path)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(Batch::new)
            .collect())
    }

    async fn load_from_csv(&self, path: &Path, table: &str) -> Result<()> {
        self.log(format!("load_from_csv {} {table}", path.display()))
    }

    async fn query_plan(&self, text: &str) -> Result<PlanResult> {
        self.log(format!("query_plan {text}"))?;
        Ok(self.plans.get(text).cloned().unwrap_or_default())
    }

    async fn query_plan_from_file(&self, path: &Path) -> Result<Vec<Batch<PlanResult>>> {
        self.log(format!("query_plan_from_file {}", path.display()))?;
        Ok(self
            .plan_files
            .get(path)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(Batch::new)
            .collect())
    }
}

/// Connector handing out a fresh mock per suite, built by `make`.
pub struct MockConnector<F> {
    pub make: F,
    pub connects: AtomicUsize,
    pub releases: AtomicUsize,
}

impl<F: Fn() -> MockBackend + Send + Sync> MockConnector<F> {
    pub fn new(make: F) -> Self {
        Self {
            make,
            connects: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }
}

impl<F: Fn() -> MockBackend + Send + Sync> Connector for MockConnector<F> {
    type Backend = MockBackend;

    async fn connect(&self) -> Result<MockBackend> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok((self.make)())
    }

    async fn release(&self, _backend: MockBackend) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
