use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row as returned by a backend: column name -> value, in column order.
pub type Record = IndexMap<String, Value>;

/// Wrapper the backend uses for file-sourced executions; the interpreter only
/// ever looks at `records`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub records: T,
}

impl<T> Batch<T> {
    pub fn new(records: T) -> Self {
        Self { records }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    Records(Vec<Record>),
    Plan(PlanResult),
    /// Slot of an act directive that produced nothing (CSV load).
    Empty,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        match self {
            ResultSet::Records(rows) => rows.is_empty(),
            ResultSet::Plan(plan) => plan.nodes.is_empty(),
            ResultSet::Empty => true,
        }
    }

    /// Row view used by record comparisons. Plans are exposed through
    /// [`PlanResult::records`].
    pub fn records(&self) -> Vec<Record> {
        match self {
            ResultSet::Records(rows) => rows.clone(),
            ResultSet::Plan(plan) => plan.records(),
            ResultSet::Empty => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Reads every row of a table or every entry of an index.
    FullScan,
    /// Targeted lookup or range over an index / rowid.
    Search,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: i64,
    pub parent: i64,
    pub detail: String,
    pub access: Access,
    pub table: Option<String>,
    pub index: Option<String>,
}

impl PlanNode {
    /// Classify a SQLite-style `EXPLAIN QUERY PLAN` detail line, e.g.
    /// `SCAN hotels`, `SCAN t USING COVERING INDEX t_v` or
    /// `SEARCH t USING INDEX t_id (id=?)`.
    pub fn from_detail(id: i64, parent: i64, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let words: Vec<&str> = detail.split_whitespace().collect();
        let access = match words.first().map(|w| w.to_ascii_uppercase()) {
            Some(w) if w == "SCAN" => Access::FullScan,
            Some(w) if w == "SEARCH" => Access::Search,
            _ => Access::Other,
        };
        let table = match access {
            Access::Other => None,
            _ => words
                .iter()
                .skip(1)
                .find(|w| !w.eq_ignore_ascii_case("TABLE"))
                .map(|w| w.to_string()),
        };
        let index = words
            .iter()
            .position(|w| w.eq_ignore_ascii_case("INDEX"))
            .and_then(|i| words.get(i + 1))
            .map(|w| w.to_string());
        Self {
            id,
            parent,
            detail,
            access,
            table,
            index,
        }
    }

    /// True when this node reads the whole of `hint`, where `hint` names
    /// either the table or the index being scanned.
    pub fn is_full_scan_of(&self, hint: &str) -> bool {
        if self.access != Access::FullScan {
            return false;
        }
        let matches = |name: &Option<String>| {
            name.as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(hint.trim()))
        };
        matches(&self.table) || matches(&self.index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanResult {
    pub nodes: Vec<PlanNode>,
}

impl PlanResult {
    pub fn new(nodes: Vec<PlanNode>) -> Self {
        Self { nodes }
    }

    pub fn full_scans_of<'a>(&'a self, hint: &'a str) -> impl Iterator<Item = &'a PlanNode> {
        self.nodes.iter().filter(move |n| n.is_full_scan_of(hint))
    }

    pub fn records(&self) -> Vec<Record> {
        self.nodes
            .iter()
            .map(|n| {
                let mut r = Record::new();
                r.insert("id".into(), Value::from(n.id));
                r.insert("parent".into(), Value::from(n.parent));
                r.insert("detail".into(), Value::from(n.detail.clone()));
                r
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Index into the test case's `assert` list, `None` for case-level failures.
    pub index: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CaseResult {
    pub title: String,
    pub failures: Vec<Failure>,
    /// Specification or execution error that aborted the case.
    pub error: Option<String>,
    pub expectations: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub name: String,
    pub total: usize,  // Total number of test cases
    pub passed: usize, // Number of passed test cases
    pub failed: usize, // Number of failed test cases
    pub cases: Vec<CaseResult>,

    // Expectation-level counts for more granular reporting
    pub total_expectations: usize,
    pub passed_expectations: usize,
    pub failed_expectations: usize,
}

impl Summary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, case: CaseResult) {
        self.total += 1;
        if case.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        // A case aborted before its comparisons fails every expectation.
        let aborted = case.error.is_some() || case.failures.iter().any(|f| f.index.is_none());
        let failed = if aborted {
            case.expectations
        } else {
            case.failures.len()
        };
        self.total_expectations += case.expectations;
        self.failed_expectations += failed.min(case.expectations);
        self.passed_expectations += case.expectations.saturating_sub(failed);
        self.cases.push(case);
    }

    pub fn absorb(&mut self, other: Summary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.total_expectations += other.total_expectations;
        self.passed_expectations += other.passed_expectations;
        self.failed_expectations += other.failed_expectations;
        self.cases.extend(other.cases);
    }
}
