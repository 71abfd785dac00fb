use crate::backend::{Backend, Connector};
use crate::comparator::verify;
use crate::error::{Error, Result, SpecError};
use crate::i18n::{Localizer, detect_language};
use crate::interpreter::interpret;
use crate::suite::{Steps, Suite, TestCase};
use crate::types::{CaseResult, Failure, ResultSet, Summary};
use crate::{t, t_args};
use futures::future::join_all;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Locale test titles are resolved in.
    pub locale: String,
    /// Run the suite's cleanup directives after the last test case.
    pub run_cleanups: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            locale: detect_language(),
            run_cleanups: false,
        }
    }
}

impl RunSettings {
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_cleanups(mut self, run_cleanups: bool) -> Self {
        self.run_cleanups = run_cleanups;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Installed,
    Done,
    /// Installation failed; no test case ran.
    Aborted,
}

/// Everything a suite run shares: the single backend connection, acquired
/// before installation and released after the last test case.
#[derive(Debug)]
pub struct SuiteContext<B> {
    backend: B,
}

impl<B: Backend> SuiteContext<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

/// Sequences one suite: installations once, then every test case in order
/// (arrange, act, assert), optionally cleanups.
pub struct Orchestrator<'s, B> {
    suite: &'s Suite,
    ctx: SuiteContext<B>,
    settings: RunSettings,
    titles: Vec<String>,
    phase: Phase,
}

impl<'s, B: Backend> Orchestrator<'s, B> {
    pub fn new(suite: &'s Suite, ctx: SuiteContext<B>, settings: RunSettings) -> Self {
        let localizer = Localizer::for_language(&settings.locale);
        let titles = suite.tests.iter().map(|t| t.title.resolve(&localizer)).collect();
        Self {
            suite,
            ctx,
            settings,
            titles,
            phase: Phase::Uninitialized,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Test titles in the configured locale, in suite order.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn into_context(self) -> SuiteContext<B> {
        self.ctx
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            return Ok(());
        }
        Err(SpecError::InvalidSuite(t_args!("invalid-phase",
            "expected" => format!("{expected:?}"),
            "actual" => format!("{:?}", self.phase)
        ))
        .into())
    }

    /// Run every installation directive in order. Any failure aborts the suite.
    pub async fn install(&mut self) -> Result<()> {
        self.expect_phase(Phase::Uninitialized)?;
        info!(
            "{}",
            t_args!("info-installing",
                "suite" => &self.suite.name,
                "count" => self.suite.installations.len()
            )
        );
        for directive in &self.suite.installations {
            if let Err(e) = interpret(directive, self.ctx.backend()).await {
                self.phase = Phase::Aborted;
                warn!("{}", t_args!("error-installation-failed", "error" => &e));
                return Err(e);
            }
        }
        self.phase = Phase::Installed;
        Ok(())
    }

    /// Run every test case. Each case is independent: a failing case is
    /// recorded and the next one still runs.
    pub async fn run_tests(&mut self) -> Result<Summary> {
        self.expect_phase(Phase::Installed)?;
        let mut summary = Summary::new(&self.suite.name);
        for (case, title) in self.suite.tests.iter().zip(&self.titles) {
            let result = self.run_case(case, title).await;
            if result.passed {
                debug!("{}", t_args!("debug-case-passed", "title" => title));
            } else {
                warn!("{}", t_args!("warn-case-failed", "title" => title));
            }
            summary.push(result);
        }
        self.phase = Phase::Done;
        info!(
            "{}",
            t_args!("info-suite-finished",
                "suite" => &self.suite.name,
                "passed" => summary.passed,
                "failed" => summary.failed
            )
        );
        Ok(summary)
    }

    /// Run the cleanup directives in order, stopping at the first failure.
    pub async fn teardown(&self) -> Result<()> {
        if self.phase == Phase::Uninitialized {
            return self.expect_phase(Phase::Installed);
        }
        info!(
            "{}",
            t_args!("info-cleanup",
                "suite" => &self.suite.name,
                "count" => self.suite.cleanups.len()
            )
        );
        for directive in &self.suite.cleanups {
            interpret(directive, self.ctx.backend()).await?;
        }
        Ok(())
    }

    /// Install, run every test case, then clean up if configured to.
    pub async fn run(&mut self) -> Result<Summary> {
        self.install().await?;
        let summary = self.run_tests().await?;
        if self.settings.run_cleanups {
            if let Err(e) = self.teardown().await {
                warn!("{}", t_args!("warn-cleanup-failed", "error" => &e));
                return Err(e);
            }
        }
        Ok(summary)
    }

    async fn run_case(&self, case: &TestCase, title: &str) -> CaseResult {
        let steps = match &case.steps {
            Ok(steps) => steps,
            Err(e) => return aborted(title, 0, &Error::from(e.clone())),
        };
        let expectations = steps.assert.len();
        let misplaced = steps.rows_expected_from_loads();
        if !misplaced.is_empty() {
            let indexes = misplaced
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let e = SpecError::InvalidTestcase(t_args!("invalid-expectation-after-load",
                "indexes" => indexes
            ));
            return aborted(title, expectations, &Error::from(e));
        }
        match self.act(steps).await {
            Ok(actuals) => judge(title, steps, &actuals).await,
            Err(e) => aborted(title, expectations, &e),
        }
    }

    /// Arrange, then act, collecting one slot per result set (at least one
    /// per act directive).
    async fn act(&self, steps: &Steps) -> Result<Vec<ResultSet>> {
        let backend = self.ctx.backend();
        for directive in &steps.arrange {
            interpret(directive, backend).await?;
        }
        let mut actuals = Vec::with_capacity(steps.act.len());
        for directive in &steps.act {
            let sets = interpret(directive, backend).await?;
            if sets.is_empty() {
                actuals.push(ResultSet::Empty);
            } else {
                actuals.extend(sets);
            }
        }
        Ok(actuals)
    }
}

async fn judge(title: &str, steps: &Steps, actuals: &[ResultSet]) -> CaseResult {
    let expectations = steps.assert.len();
    if actuals.len() != expectations {
        return CaseResult {
            title: title.to_string(),
            failures: vec![Failure {
                index: None,
                message: t_args!("failure-count-mismatch",
                    "expected" => expectations,
                    "actual" => actuals.len()
                ),
            }],
            error: None,
            expectations,
            passed: false,
        };
    }
    // Every pair is checked so that all mismatches are reported, not just the first.
    let mut failures = Vec::new();
    for (index, (actual, expected)) in actuals.iter().zip(&steps.assert).enumerate() {
        if let Err(e) = verify(actual, expected).await {
            failures.push(Failure {
                index: Some(index),
                message: e.to_string(),
            });
        }
    }
    CaseResult {
        title: title.to_string(),
        passed: failures.is_empty(),
        failures,
        error: None,
        expectations,
    }
}

fn aborted(title: &str, expectations: usize, e: &Error) -> CaseResult {
    CaseResult {
        title: title.to_string(),
        failures: Vec::new(),
        error: Some(e.to_string()),
        expectations,
        passed: false,
    }
}

/// Run one suite on `backend` and hand the backend back for release.
pub async fn run_suite<B: Backend>(
    suite: &Suite,
    backend: B,
    settings: &RunSettings,
) -> (Result<Summary>, B) {
    let mut orchestrator = Orchestrator::new(suite, SuiteContext::new(backend), settings.clone());
    let summary = orchestrator.run().await;
    (summary, orchestrator.into_context().into_backend())
}

/// Run several suites concurrently, each on its own connection from
/// `connector`. Results keep the order of `suites`.
pub async fn run_suites<C: Connector>(
    suites: &[Suite],
    connector: &C,
    settings: &RunSettings,
) -> Vec<Result<Summary>> {
    join_all(suites.iter().map(|suite| async move {
        let backend = connector
            .connect()
            .await
            .map_err(|e| Error::execution(t!("step-connect"), e))?;
        let (summary, backend) = run_suite(suite, backend, settings).await;
        connector
            .release(backend)
            .await
            .map_err(|e| Error::execution(t!("step-release"), e))?;
        summary
    }))
    .await
}
