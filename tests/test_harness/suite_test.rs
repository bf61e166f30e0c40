//! Suite driver and CLI entry point tests

#![cfg(unix)]

use super::support::{copying_importer, write_script, CaseDir, FileStore};
use mcsimport_harness::test_harness::cli::run_suite;
use mcsimport_harness::test_harness::config::{HarnessConfig, RetryPolicy};
use mcsimport_harness::test_harness::executor::{CaseStatus, Stage, TestCaseExecutor};
use mcsimport_harness::test_harness::hooks::HookRegistry;
use mcsimport_harness::test_harness::suite::TestSuite;
use mcsimport_harness::test_harness::TestHarnessError;
use std::time::Duration;

#[tokio::test]
async fn test_suite_runs_all_cases_and_counts_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("cases");
    let store_dir = tmp.path().join("store");
    std::fs::create_dir_all(&store_dir).unwrap();
    let importer = copying_importer(tmp.path(), &store_dir);

    CaseDir::new(&root, "a_import")
        .config(r#"{"name": "a_import", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int)\n")
        .file("input", "1\n2\n3\n")
        .file("expected", "1\n2\n3\n");
    CaseDir::new(&root, "b_wrong_rows")
        .config(r#"{"name": "b_wrong_rows", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int)\n")
        .file("input", "1\n2\n")
        .file("expected", "1\n3\n");
    CaseDir::new(&root, "c_broken_config").config("{not json");
    CaseDir::new(&root, "d_skipped")
        .config(r#"{"name": "d_skipped", "table": "t", "expected_exit_value": 0, "skip": true}"#);
    std::fs::create_dir_all(root.join(".hidden")).unwrap();

    let suite = TestSuite::discover(&root).unwrap();
    assert_eq!(suite.cases().len(), 4);

    let executor = TestCaseExecutor::new(&importer, "test");
    let mut store = FileStore::new(&store_dir);
    let summary = suite.run(&executor, &mut store).await;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.exit_status(), 2);

    let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["a_import", "b_wrong_rows", "c_broken_config", "d_skipped"]
    );
    assert_eq!(summary.results[1].failed_stage(), Some(Stage::Validate));
    assert_eq!(summary.results[2].failed_stage(), Some(Stage::LoadConfig));
    assert_eq!(summary.results[3].status, CaseStatus::Skipped);

    // cases are independent: the failing case did not leave its table behind
    assert!(!store.table_exists("t"));
    println!("✅ Suite aggregation test passed");
}

#[tokio::test]
async fn test_unreachable_store_aborts_before_any_case() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("cases");
    let marker = tmp.path().join("importer_ran");
    let importer = write_script(
        &tmp.path().join("mcsimport"),
        &format!("touch '{}'\nexit 0", marker.display()),
    );
    CaseDir::new(&root, "any")
        .config(r#"{"name": "any", "table": "t", "expected_exit_value": 0}"#);

    let config = HarnessConfig::from_vars(|_| None, &importer, &root)
        .with_host("127.0.0.1")
        .with_port(1)
        .with_connect_retry(RetryPolicy {
            attempts: 2,
            interval: Duration::from_millis(50),
        });

    let err = run_suite(&config, HookRegistry::new()).await.unwrap_err();
    assert!(err.is_fatal());
    match err {
        TestHarnessError::ConnectionError { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected ConnectionError, got {:?}", other),
    }
    assert!(!marker.exists(), "no case may run without a store");
    println!("✅ Connection failure test passed");
}

#[tokio::test]
async fn test_unknown_case_filter_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("cases");
    let importer = write_script(&tmp.path().join("mcsimport"), "exit 0");
    CaseDir::new(&root, "present")
        .config(r#"{"name": "present", "table": "t", "expected_exit_value": 0}"#);

    let config = HarnessConfig::from_vars(|_| None, &importer, &root).with_case_filter("absent");
    let err = run_suite(&config, HookRegistry::new()).await.unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
    assert!(err.to_string().contains("absent"));
}
