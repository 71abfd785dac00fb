mod common;

use common::{MockBackend, MockConnector};
use query_test::error::ErrorKind;
use query_test::types::{PlanNode, PlanResult, Summary};
use query_test::{Orchestrator, Phase, RunSettings, Suite, SuiteContext, run_suite, run_suites};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;

fn settings() -> RunSettings {
    RunSettings::default().with_locale("en")
}

fn suite(v: Value) -> Suite {
    Suite::from_value("suite", &v, None).unwrap()
}

async fn run(suite: &Suite, backend: MockBackend) -> (Summary, MockBackend) {
    let (summary, backend) = run_suite(suite, backend, &settings()).await;
    (summary.unwrap(), backend)
}

#[tokio::test]
async fn empty_table_matches_empty_expectation() {
    let s = suite(json!({
        "installations": "create table t(id int)",
        "tests": [{ "title": "empty", "act": "select * from t", "assert": [{ "equalTo": [] }] }]
    }));
    let (summary, _) = run(&s, MockBackend::new()).await;
    assert_eq!(summary.total, 1);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.passed_expectations, 1);
}

#[tokio::test]
async fn installations_run_once_in_order_before_any_test() {
    let s = suite(json!({
        "installations": ["create table a(id int)", "create table b(id int)"],
        "tests": [
            { "title": "1", "arrange": "insert into a values (1)", "act": "select * from a", "assert": [null] },
            { "title": "2", "act": "select * from b", "assert": [null] }
        ]
    }));
    let (_, backend) = run(&s, MockBackend::new()).await;
    assert_eq!(
        backend.calls(),
        [
            "query create table a(id int)",
            "query create table b(id int)",
            "query insert into a values (1)",
            "query select * from a",
            "query select * from b",
        ]
    );
}

#[tokio::test]
async fn csv_load_yields_one_empty_slot() {
    let s = suite(json!([
        { "title": "null", "act": "@seed.csv into hotels", "assert": [null] },
        { "title": "object", "act": "@seed.csv into hotels", "assert": [{}] },
        { "title": "rows", "act": "@seed.csv into hotels", "assert": [{ "equalTo": [{ "id": 1 }] }] }
    ]));
    let (summary, backend) = run(&s, MockBackend::new()).await;

    assert!(summary.cases[0].passed);
    assert!(summary.cases[1].passed);
    let rows = &summary.cases[2];
    assert!(!rows.passed);
    assert!(rows.error.is_some());
    assert!(rows.failures.is_empty());
    assert_eq!(summary.failed_expectations, 1);
    // the misplaced expectation is caught before the load touches the backend
    let loads = backend
        .calls()
        .iter()
        .filter(|c| c.starts_with("load_from_csv"))
        .count();
    assert_eq!(loads, 2);
}

#[tokio::test]
async fn rows_demanded_from_a_load_are_rejected_before_any_step_runs() {
    let s = suite(json!([
        { "title": "seed then read",
          "arrange": "delete from hotels",
          "act": ["@seed.csv into hotels", "select * from hotels"],
          "assert": [{ "equalTo": [{ "id": 1 }] }, { "equalTo": [] }] }
    ]));
    let (summary, backend) = run(&s, MockBackend::new()).await;
    let case = &summary.cases[0];
    assert!(!case.passed);
    assert!(case.error.as_deref().is_some_and(|e| e.contains("assert[0]")));
    assert!(backend.calls().is_empty());
    assert_eq!(summary.failed_expectations, 2);
}

#[tokio::test]
async fn rows_demanded_from_a_load_next_to_a_file_query_fail_at_compare_time() {
    let s = suite(json!([
        { "title": "mixed",
          "act": ["@seed.csv into hotels", "@/q/one.sql"],
          "assert": [{ "equalTo": [{ "id": 1 }] }, { "equalTo": [] }] }
    ]));
    let backend = MockBackend::new().with_file("/q/one.sql", vec![json!([])]);
    let (summary, _) = run(&s, backend).await;
    let case = &summary.cases[0];
    assert!(!case.passed);
    assert_eq!(case.failures.len(), 1);
    assert_eq!(case.failures[0].index, Some(0));
}

#[tokio::test]
async fn csv_expectation_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("expected.csv"), "id,name\n1,Alice\n2,Bob\n").unwrap();
    let s = Suite::from_value(
        "csv",
        &json!([
            { "title": "same", "act": "select id, name from users", "assert": ["expected.csv"] },
            { "title": "sorted", "act": "select id, name from users",
              "assert": [{ "equalTo": "@expected.csv", "orderBy": "id" }] },
            { "title": "differs", "act": "select id, name from others", "assert": ["@expected.csv"] }
        ]),
        Some(dir.path()),
    )
    .unwrap();
    let backend = MockBackend::new()
        .with_rows(
            "select id, name from users",
            json!([{ "id": 1, "name": "Alice" }, { "id": 2, "name": "Bob" }]),
        )
        .with_rows(
            "select id, name from others",
            json!([{ "id": 1, "name": "Alice" }, { "id": 2, "name": "Carol" }]),
        );
    let (summary, _) = run(&s, backend).await;

    assert!(summary.cases[0].passed);
    assert!(summary.cases[1].passed);
    let differs = &summary.cases[2];
    assert!(!differs.passed);
    assert_eq!(differs.failures[0].index, Some(0));
    assert!(differs.failures[0].message.contains("Carol"));
}

#[tokio::test]
async fn missing_csv_expectation_fails_only_its_case() {
    let s = suite(json!([
        { "title": "missing", "act": "select 1", "assert": ["/nonexistent/expected.csv"] },
        { "title": "fine", "act": "select 1", "assert": [null] }
    ]));
    let (summary, _) = run(&s, MockBackend::new()).await;
    assert!(!summary.cases[0].passed);
    assert!(summary.cases[1].passed);
}

#[tokio::test]
async fn no_full_scan_checks_plan_nodes() {
    let s = suite(json!([
        { "title": "scan", "act": { "plan": "select * from hotels where city = 'x'" },
          "assert": [{ "noFullscan": "hotels" }] },
        { "title": "search", "act": { "plan": "select * from hotels where id = 1" },
          "assert": [{ "noFullscan": "hotels" }] },
        { "title": "not a plan", "act": "select * from hotels", "assert": [{ "noFullscan": "hotels" }] }
    ]));
    let backend = MockBackend::new()
        .with_plan(
            "select * from hotels where city = 'x'",
            PlanResult::new(vec![PlanNode::from_detail(2, 0, "SCAN hotels")]),
        )
        .with_plan(
            "select * from hotels where id = 1",
            PlanResult::new(vec![PlanNode::from_detail(
                2,
                0,
                "SEARCH hotels USING INTEGER PRIMARY KEY (rowid=?)",
            )]),
        );
    let (summary, _) = run(&s, backend).await;

    assert!(!summary.cases[0].passed);
    assert!(summary.cases[0].failures[0].message.contains("hotels"));
    assert!(summary.cases[1].passed);
    assert!(!summary.cases[2].passed);
}

#[tokio::test]
async fn failing_case_does_not_stop_the_suite() {
    let s = suite(json!([
        { "title": "broken", "arrange": "insert into missing values (1)", "act": "select 1", "assert": [null] },
        { "title": "fine", "act": "select * from t", "assert": [{ "equalTo": [] }] }
    ]));
    let backend = MockBackend::new().failing_on("query insert into missing values (1)");
    let (summary, backend) = run(&s, backend).await;

    let broken = &summary.cases[0];
    assert!(!broken.passed);
    assert!(broken.error.is_some());
    assert!(broken.failures.is_empty());
    assert!(summary.cases[1].passed);
    // act of the broken case never ran
    assert!(!backend.calls().contains(&"query select 1".to_string()));
    assert_eq!(summary.failed_expectations, 1);
    assert_eq!(summary.passed_expectations, 1);
}

#[tokio::test]
async fn slot_count_mismatch_fails_the_case() {
    let s = suite(json!([
        { "title": "short", "act": ["select 1", "select 2"], "assert": [null] }
    ]));
    let (summary, _) = run(&s, MockBackend::new()).await;
    let case = &summary.cases[0];
    assert!(!case.passed);
    assert_eq!(case.failures.len(), 1);
    assert_eq!(case.failures[0].index, None);
    assert_eq!(summary.failed_expectations, 1);
}

#[tokio::test]
async fn file_query_fills_one_slot_per_statement() {
    let s = suite(json!([
        { "title": "file", "act": "@/q/two.sql",
          "assert": [{ "equalTo": [{ "n": 1 }] }, { "equalTo": [{ "n": 2 }] }] }
    ]));
    let backend = MockBackend::new().with_file(
        "/q/two.sql",
        vec![json!([{ "n": 1 }]), json!([{ "n": 2 }])],
    );
    let (summary, _) = run(&s, backend).await;
    assert!(summary.cases[0].passed);
    assert_eq!(summary.passed_expectations, 2);
}

#[tokio::test]
async fn every_mismatch_is_reported() {
    let s = suite(json!([
        { "title": "three", "act": ["select a", "select b", "select c"],
          "assert": [
            { "equalTo": [{ "v": 0 }] },
            { "equalTo": [{ "v": 2 }] },
            { "equalTo": [{ "v": 0 }] }
          ] }
    ]));
    let backend = MockBackend::new()
        .with_rows("select a", json!([{ "v": 1 }]))
        .with_rows("select b", json!([{ "v": 2 }]))
        .with_rows("select c", json!([{ "v": 3 }]));
    let (summary, _) = run(&s, backend).await;

    let indexes: Vec<_> = summary.cases[0].failures.iter().map(|f| f.index).collect();
    assert_eq!(indexes, [Some(0), Some(2)]);
}

#[tokio::test]
async fn numbers_compare_by_value() {
    let s = suite(json!([
        { "title": "float", "act": "select avg(x) as a", "assert": [{ "equalTo": [{ "a": 1 }] }] }
    ]));
    let backend = MockBackend::new().with_rows("select avg(x) as a", json!([{ "a": 1.0 }]));
    let (summary, _) = run(&s, backend).await;
    assert!(summary.cases[0].passed);
}

#[tokio::test]
async fn malformed_case_is_reported_when_reached() {
    let s = suite(json!([
        { "title": "bad", "act": "@notes.txt" },
        { "title": "good", "act": "select 1", "assert": [null] }
    ]));
    let (summary, backend) = run(&s, MockBackend::new()).await;
    assert!(summary.cases[0].error.is_some());
    assert!(summary.cases[1].passed);
    assert_eq!(backend.calls(), ["query select 1"]);
}

#[tokio::test]
async fn installation_failure_aborts_the_suite() {
    let s = suite(json!({
        "installations": ["create table t(id int)", "create index broken"],
        "tests": [{ "title": "never", "act": "select * from t", "assert": [null] }]
    }));
    let backend = MockBackend::new().failing_on("query create index broken");
    let mut orchestrator = Orchestrator::new(&s, SuiteContext::new(backend), settings());

    let err = orchestrator.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(orchestrator.phase(), Phase::Aborted);
    assert!(orchestrator.run_tests().await.is_err());

    let calls = orchestrator.into_context().into_backend().calls();
    assert_eq!(calls.len(), 2);
}

#[tokio::test]
async fn phases_advance_in_order() {
    let s = suite(json!([{ "title": "t", "act": "select 1", "assert": [null] }]));
    let mut orchestrator = Orchestrator::new(&s, SuiteContext::new(MockBackend::new()), settings());
    assert_eq!(orchestrator.phase(), Phase::Uninitialized);
    assert!(orchestrator.run_tests().await.is_err());
    assert!(orchestrator.teardown().await.is_err());

    orchestrator.install().await.unwrap();
    assert_eq!(orchestrator.phase(), Phase::Installed);
    assert!(orchestrator.install().await.is_err());

    let summary = orchestrator.run_tests().await.unwrap();
    assert_eq!(orchestrator.phase(), Phase::Done);
    assert_eq!(summary.passed, 1);
}

#[tokio::test]
async fn cleanups_run_only_when_asked() {
    let s = suite(json!({
        "cleanups": "drop table t",
        "tests": [{ "title": "t", "act": "select 1", "assert": [null] }]
    }));

    let (_, backend) = run(&s, MockBackend::new()).await;
    assert!(!backend.calls().contains(&"query drop table t".to_string()));

    let (summary, backend) =
        run_suite(&s, MockBackend::new(), &settings().with_cleanups(true)).await;
    assert!(summary.is_ok());
    assert_eq!(backend.calls().last().map(String::as_str), Some("query drop table t"));
}

#[tokio::test]
async fn titles_follow_the_configured_locale() {
    let s = suite(json!([
        { "title": { "ja": "空のテーブル", "en": "empty table" }, "act": "select 1", "assert": [null] },
        { "title": { "ja": "日本語のみ" }, "act": "select 1", "assert": [null] }
    ]));
    let orchestrator = Orchestrator::new(&s, SuiteContext::new(MockBackend::new()), settings());
    assert_eq!(orchestrator.titles(), ["empty table", "日本語のみ"]);

    let ja = Orchestrator::new(
        &s,
        SuiteContext::new(MockBackend::new()),
        RunSettings::default().with_locale("ja"),
    );
    assert_eq!(ja.titles()[0], "空のテーブル");
}

#[tokio::test]
async fn suites_run_concurrently_on_their_own_connections() {
    let good = suite(json!([{ "title": "t", "act": "select 1", "assert": [null] }]));
    let bad = suite(json!({
        "installations": "create table t(id int)",
        "tests": [{ "title": "t", "act": "select 1", "assert": [null] }]
    }));
    let connector =
        MockConnector::new(|| MockBackend::new().failing_on("query create table t(id int)"));

    let results = run_suites(&[good, bad], &connector, &settings()).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().passed, 1);
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Execution);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    assert_eq!(connector.releases.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn suite_file_paths_resolve_against_its_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("hotels.csv"), "id,city\n1,Kyoto\n").unwrap();
    fs::write(
        root.join("hotels.yaml"),
        r#"
installations:
  - create table hotels(id int, city text)
tests:
  - title: loads
    arrange: "@hotels.csv into hotels"
    act: select id, city from hotels
    assert:
      - hotels.csv
"#,
    )
    .unwrap();

    let s = Suite::load(&root.join("hotels.yaml")).unwrap();
    assert_eq!(s.name, "hotels.yaml");
    let backend =
        MockBackend::new().with_rows("select id, city from hotels", json!([{ "id": 1, "city": "Kyoto" }]));
    let (summary, backend) = run(&s, backend).await;

    assert!(summary.cases[0].passed);
    let load = format!("load_from_csv {} hotels", Path::new(root).join("hotels.csv").display());
    assert!(backend.calls().contains(&load));
}
