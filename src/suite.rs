use crate::directive::{Directive, extension};
use crate::error::{Error, Result, SpecError};
use crate::expectation::Expectation;
use crate::i18n::{DEFAULT_LOCALE, Localizer};
use crate::t_args;
use crate::types::{CaseResult, Failure, Summary};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

impl From<OneOrMany> for Vec<Value> {
    fn from(v: OneOrMany) -> Self {
        match v {
            OneOrMany::Many(v) => v,
            OneOrMany::One(v) => vec![v],
        }
    }
}

fn values(v: Option<OneOrMany>) -> Vec<Value> {
    v.map(Vec::from).unwrap_or_default()
}

/// Display title of a test case: plain text (also tried as a message key)
/// or one string per locale.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Title {
    Text(String),
    Localized(IndexMap<String, String>),
}

impl Default for Title {
    fn default() -> Self {
        Title::Text(String::new())
    }
}

impl Title {
    pub fn resolve(&self, localizer: &Localizer) -> String {
        match self {
            Title::Text(text) => localizer.lookup(text).unwrap_or(text).to_string(),
            Title::Localized(by_locale) => by_locale
                .get(localizer.language())
                .or_else(|| by_locale.get(DEFAULT_LOCALE))
                .or_else(|| by_locale.values().next())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawSuite {
    installations: Option<OneOrMany>,
    cleanups: Option<OneOrMany>,
    #[serde(default)]
    tests: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTest {
    #[serde(default)]
    title: Title,
    arrange: Option<OneOrMany>,
    act: Option<OneOrMany>,
    assert: Option<OneOrMany>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Steps {
    pub arrange: Vec<Directive>,
    pub act: Vec<Directive>,
    pub assert: Vec<Expectation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub title: Title,
    /// A malformed case keeps its error so it is reported when reached
    /// instead of rejecting the whole suite.
    pub steps: std::result::Result<Steps, SpecError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suite {
    pub name: String,
    pub installations: Vec<Directive>,
    pub cleanups: Vec<Directive>,
    pub tests: Vec<TestCase>,
}

impl Suite {
    /// Normalize an in-memory suite: a bare array of test cases or a full
    /// `{installations, cleanups, tests}` mapping. The input is copied, so
    /// the suite never aliases the caller's value.
    pub fn from_value(name: impl Into<String>, value: &Value, base: Option<&Path>) -> Result<Self> {
        let raw = match value {
            Value::Array(tests) => RawSuite {
                tests: tests.clone(),
                ..RawSuite::default()
            },
            Value::Null => RawSuite::default(),
            Value::Object(_) => RawSuite::deserialize(value.clone())
                .map_err(|e| SpecError::InvalidSuite(e.to_string()))?,
            other => {
                return Err(SpecError::InvalidSuite(format!(
                    "expected a list of tests or a suite mapping, got {other}"
                ))
                .into());
            }
        };

        let directives = |v: Option<OneOrMany>| -> std::result::Result<Vec<Directive>, SpecError> {
            values(v).iter().map(|d| Directive::parse(d, base)).collect()
        };

        Ok(Suite {
            name: name.into(),
            installations: directives(raw.installations)?,
            cleanups: directives(raw.cleanups)?,
            tests: raw
                .tests
                .iter()
                .enumerate()
                .map(|(i, t)| TestCase::from_value(i, t, base))
                .collect(),
        })
    }

    pub fn from_yaml_str(name: impl Into<String>, text: &str, base: Option<&Path>) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| Error::Parse {
            path: PathBuf::from("<yaml>"),
            message: e.to_string(),
        })?;
        Self::from_value(name, &value, base)
    }

    /// Load a `.yaml`/`.yml`/`.json` suite file. Relative paths inside it are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let value = load_document(path)?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "suite".to_string());
        let suite = Self::from_value(name, &value, path.parent())?;
        debug!(
            "{}",
            t_args!("debug-suite-loaded",
                "file" => path.display(),
                "count" => suite.tests.len()
            )
        );
        Ok(suite)
    }

    /// Dry run: report every test case as well-formed or not, without a
    /// backend. Slot counts are only checked when every act directive is
    /// known to fill exactly one slot.
    pub fn check(&self, localizer: &Localizer) -> Summary {
        let mut summary = Summary::new(&self.name);
        for case in &self.tests {
            let title = case.title.resolve(localizer);
            let result = match &case.steps {
                Err(e) => CaseResult {
                    title,
                    failures: Vec::new(),
                    error: Some(e.to_string()),
                    expectations: 0,
                    passed: false,
                },
                Ok(steps) => {
                    let failures = steps.static_failures();
                    CaseResult {
                        title,
                        passed: failures.is_empty(),
                        failures,
                        error: None,
                        expectations: steps.assert.len(),
                    }
                }
            };
            summary.push(result);
        }
        summary
    }
}

impl TestCase {
    fn from_value(index: usize, value: &Value, base: Option<&Path>) -> Self {
        let raw = match RawTest::deserialize(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                let title = value
                    .get("title")
                    .and_then(|t| Title::deserialize(t.clone()).ok())
                    .unwrap_or_else(|| Title::Text(format!("#{}", index + 1)));
                return TestCase {
                    title,
                    steps: Err(SpecError::InvalidTestcase(e.to_string())),
                };
            }
        };
        let title = match raw.title {
            Title::Text(t) if t.is_empty() => Title::Text(format!("#{}", index + 1)),
            t => t,
        };
        let steps = Steps::parse(raw.arrange, raw.act, raw.assert, base);
        TestCase { title, steps }
    }
}

impl Steps {
    /// Every act directive fills exactly one slot, so slot counts are known
    /// before anything runs.
    fn single_slot(&self) -> bool {
        !self
            .act
            .iter()
            .any(|d| matches!(d, Directive::FileQuery(_) | Directive::FilePlan(_)))
    }

    /// Indexes of expectations demanding rows from a CSV load slot. Only
    /// known up front for single-slot steps with matching counts.
    pub(crate) fn rows_expected_from_loads(&self) -> Vec<usize> {
        if !self.single_slot() || self.act.len() != self.assert.len() {
            return Vec::new();
        }
        self.act
            .iter()
            .zip(&self.assert)
            .enumerate()
            .filter(|(_, (d, e))| matches!(d, Directive::FileLoad { .. }) && e.demands_rows())
            .map(|(index, _)| index)
            .collect()
    }

    fn static_failures(&self) -> Vec<Failure> {
        if self.single_slot() && self.act.len() != self.assert.len() {
            return vec![Failure {
                index: None,
                message: t_args!("failure-count-mismatch",
                    "expected" => self.assert.len(),
                    "actual" => self.act.len()
                ),
            }];
        }
        self.rows_expected_from_loads()
            .into_iter()
            .map(|index| Failure {
                index: Some(index),
                message: SpecError::InvalidTestcase(crate::t!("invalid-expectation-for-empty"))
                    .to_string(),
            })
            .collect()
    }

    fn parse(
        arrange: Option<OneOrMany>,
        act: Option<OneOrMany>,
        assert: Option<OneOrMany>,
        base: Option<&Path>,
    ) -> std::result::Result<Self, SpecError> {
        let act = values(act);
        if act.is_empty() {
            return Err(SpecError::InvalidTestcase("act is required".into()));
        }
        Ok(Steps {
            arrange: values(arrange)
                .iter()
                .map(|d| Directive::parse(d, base))
                .collect::<std::result::Result<_, _>>()?,
            act: act
                .iter()
                .map(|d| Directive::parse(d, base))
                .collect::<std::result::Result<_, _>>()?,
            assert: values(assert)
                .iter()
                .map(|e| Expectation::parse(e, base))
                .collect::<std::result::Result<_, _>>()?,
        })
    }
}

/// Read and parse a suite document, choosing the parser by extension.
pub fn load_document(path: &Path) -> Result<Value> {
    let name = path.to_string_lossy();
    let yaml = match extension(&name) {
        "yaml" | "yml" => true,
        "json" => false,
        _ => return Err(SpecError::UnsupportedFormat(name.into_owned()).into()),
    };
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = if yaml {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| Error::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn is_suite_file(path: &Path) -> bool {
    matches!(
        extension(&path.to_string_lossy()),
        "yaml" | "yml" | "json"
    )
}

/// Expand directories into the suite files below them, sorted per directory.
/// Plain file arguments are kept as given.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for p in paths {
        if p.is_dir() {
            for entry in WalkDir::new(p).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::Io {
                    path: p.clone(),
                    source: e.into(),
                })?;
                if entry.file_type().is_file() && is_suite_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(p.clone());
        }
    }
    Ok(files)
}

/// Load many suite files in parallel, keeping input order.
pub fn load_suites(files: &[PathBuf]) -> Vec<(PathBuf, Result<Suite>)> {
    files
        .par_iter()
        .map(|f| (f.clone(), Suite::load(f)))
        .collect()
}
