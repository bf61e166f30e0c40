//! End-to-end tests for the test case executor
//!
//! Cases run against `FileStore` with shell-script importer stubs.

#![cfg(unix)]

use super::support::{copying_importer, write_script, CaseDir, FileStore, RecordingHooks};
use mcsimport_harness::test_harness::error::TestHarnessError;
use mcsimport_harness::test_harness::executor::{CaseStatus, Stage, TestCaseExecutor};
use mcsimport_harness::test_harness::hooks::HookRegistry;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    tmp: TempDir,
    root: std::path::PathBuf,
    store: FileStore,
    store_dir: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("cases");
    let store_dir = tmp.path().join("store");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::create_dir_all(&store_dir).unwrap();
    Fixture {
        store: FileStore::new(&store_dir),
        root,
        store_dir,
        tmp,
    }
}

#[tokio::test]
async fn test_successful_import_passes_and_drops_table() {
    let mut fx = fixture();
    let importer = copying_importer(fx.tmp.path(), &fx.store_dir);
    let case = CaseDir::new(&fx.root, "int_basic")
        .config(r#"{"name": "int_basic", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int)\n")
        .file("input", "1\n2\n3\n")
        .file("expected", "1\n2\n3\n");

    let executor = TestCaseExecutor::new(&importer, "test");
    let result = executor.execute(&mut fx.store, &case.path).await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
    assert_eq!(result.exit_code, Some(0));
    assert!(result.output.contains("rows imported"));
    assert!(result.warnings.is_empty());
    assert!(!fx.store.table_exists("t"), "teardown should drop the table");

    assert_eq!(fx.store.statements[0], "DROP TABLE IF EXISTS `t`");
    assert_eq!(fx.store.statements[1], "CREATE TABLE t (id int)");
    assert_eq!(
        fx.store.statements.last().map(String::as_str),
        Some("DROP TABLE IF EXISTS `t`")
    );
    println!("✅ Successful import test passed");
}

#[tokio::test]
async fn test_expected_failure_exit_code_passes() {
    let mut fx = fixture();
    let importer = write_script(
        &fx.tmp.path().join("mcsimport"),
        "echo 'Error: delimiter must be a single character' >&2\nexit 2",
    );
    let case = CaseDir::new(&fx.root, "bad_delimiter").config(
        r#"{
            "name": "bad_delimiter",
            "table": "t",
            "expected_exit_value": 2,
            "delimiter": "ab",
            "expected_output": ["delimiter"]
        }"#,
    );

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
    assert_eq!(result.exit_code, Some(2));
    println!("✅ Expected failure exit code test passed");
}

#[tokio::test]
async fn test_unexpected_success_is_execution_mismatch() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "echo done\nexit 0");
    let case = CaseDir::new(&fx.root, "must_fail")
        .config(r#"{"name": "must_fail", "table": "t", "expected_exit_value": 2}"#);

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Failed);
    assert_eq!(result.failed_stage(), Some(Stage::Execute));
    match result.failure.as_ref().map(|f| &f.error) {
        Some(TestHarnessError::ExecutionMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(*expected, 2);
            assert_eq!(*actual, 0);
        }
        other => panic!("expected ExecutionMismatch, got {:?}", other),
    }
    let diagnostic = result.diagnostic().unwrap();
    assert!(diagnostic.contains("expected: 2"));
    assert!(diagnostic.contains("actual: 0"));
    println!("✅ Unexpected success test passed");
}

#[tokio::test]
async fn test_missing_identifier_fails_validation() {
    let mut fx = fixture();
    let importer = copying_importer(fx.tmp.path(), &fx.store_dir);
    let case = CaseDir::new(&fx.root, "missing_row")
        .config(r#"{"name": "missing_row", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int)\n")
        .file("input", "1\n2\n")
        .file("expected", "1\n5\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Failed);
    assert_eq!(result.failed_stage(), Some(Stage::Validate));
    match result.failure.as_ref().map(|f| &f.error) {
        Some(TestHarnessError::ValidationMismatch { identifier, .. }) => {
            assert_eq!(identifier.as_deref(), Some("5"));
        }
        other => panic!("expected ValidationMismatch, got {:?}", other),
    }
    assert!(!fx.store.table_exists("t"));
    println!("✅ Missing identifier test passed");
}

#[tokio::test]
async fn test_count_mismatch_still_names_missing_identifier() {
    let mut fx = fixture();
    let importer = copying_importer(fx.tmp.path(), &fx.store_dir);
    let case = CaseDir::new(&fx.root, "short_table")
        .config(r#"{"name": "short_table", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int)\n")
        .file("input", "1\n2\n3\n")
        .file("expected", "1\n2\n3\n5\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.failed_stage(), Some(Stage::Validate));
    match result.failure.as_ref().map(|f| &f.error) {
        Some(TestHarnessError::ValidationMismatch {
            identifier,
            mismatches,
            ..
        }) => {
            assert_eq!(identifier.as_deref(), Some("5"));
            assert_eq!(*mismatches, 2);
        }
        other => panic!("expected ValidationMismatch, got {:?}", other),
    }
    let diagnostic = result.diagnostic().unwrap();
    assert!(diagnostic.contains("row count mismatch"));
    assert!(diagnostic.contains("identifier '5'"));
    println!("✅ Count mismatch diagnostic test passed");
}

#[tokio::test]
async fn test_prepare_script_can_materialize_input() {
    let mut fx = fixture();
    let importer = copying_importer(fx.tmp.path(), &fx.store_dir);
    let case = CaseDir::new(&fx.root, "generated_input")
        .config(r#"{"name": "generated_input", "table": "t", "expected_exit_value": 0}"#)
        .file("prepare.sh", "printf '1\\n2\\n' > \"$1/input\"\n")
        .file("DDL", "CREATE TABLE t (id int)\n")
        .file("expected", "1\n2\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
    assert!(result.output.contains("generated_input/input"));
    println!("✅ Prepare-generated input test passed");
}

#[tokio::test]
async fn test_nulls_round_trip_through_validation() {
    let mut fx = fixture();
    let importer = copying_importer(fx.tmp.path(), &fx.store_dir);
    let case = CaseDir::new(&fx.root, "nulls")
        .config(r#"{"name": "nulls", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int, name varchar(10))\n")
        .file("input", "1,\n2,x\n")
        .file("expected", "2,x\n1,\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
}

#[tokio::test]
async fn test_importer_timeout_kills_process() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "echo started\nexec sleep 30");
    let case = CaseDir::new(&fx.root, "hangs")
        .config(r#"{"name": "hangs", "table": "t", "expected_exit_value": 0}"#);

    let start = std::time::Instant::now();
    let result = TestCaseExecutor::new(&importer, "test")
        .with_timeout(Duration::from_millis(500))
        .execute(&mut fx.store, &case.path)
        .await;

    assert!(start.elapsed() < Duration::from_secs(15));
    assert_eq!(result.failed_stage(), Some(Stage::Execute));
    assert_eq!(
        result.failure.as_ref().map(|f| f.error.kind()),
        Some("Timeout")
    );
    assert!(result.output.contains("started"));
    assert_eq!(result.exit_code, None);
    println!("✅ Timeout test passed");
}

#[tokio::test]
async fn test_timeout_keeps_output_when_importer_forks() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "echo started\nsleep 30");
    let case = CaseDir::new(&fx.root, "forks")
        .config(r#"{"name": "forks", "table": "t", "expected_exit_value": 0}"#);

    let start = std::time::Instant::now();
    let result = TestCaseExecutor::new(&importer, "test")
        .with_timeout(Duration::from_millis(500))
        .execute(&mut fx.store, &case.path)
        .await;

    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(
        result.failure.as_ref().map(|f| f.error.kind()),
        Some("Timeout")
    );
    assert!(result.output.contains("started"));
}

#[tokio::test]
async fn test_observation_window_stops_adapter() {
    let mut fx = fixture();
    let importer = write_script(
        &fx.tmp.path().join("adapter"),
        "echo \"Reading GTID 0-1-1 for $1.$2\"\nexec sleep 30",
    );
    let case = CaseDir::new(&fx.root, "cdc_stream").config(
        r#"{
            "name": "cdc_stream",
            "table": "t1",
            "expected_exit_value": 0,
            "observe_secs": 1,
            "expected_output": ["GTID", "test.t1"]
        }"#,
    );

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn test_prepare_failure_still_runs_cleanup_without_teardown() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 0");
    let case = CaseDir::new(&fx.root, "prep_fails")
        .config(r#"{"name": "prep_fails", "table": "t", "expected_exit_value": 0}"#)
        .file("DDL", "CREATE TABLE t (id int)\n");

    let hooks = RecordingHooks {
        fail_prepare: true,
        ..RecordingHooks::default()
    };
    let registry = HookRegistry::new().with_hooks("prep_fails", Arc::new(hooks.clone()));

    let result = TestCaseExecutor::new(&importer, "test")
        .with_hooks(registry)
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Failed);
    assert_eq!(result.failed_stage(), Some(Stage::Prepare));
    assert_eq!(hooks.calls(), vec!["prepare", "cleanup"]);
    assert!(
        fx.store.statements.is_empty(),
        "no store statements after a prepare failure: {:?}",
        fx.store.statements
    );
    println!("✅ Prepare failure test passed");
}

#[tokio::test]
async fn test_cleanup_failure_is_only_a_warning() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 0");
    let case = CaseDir::new(&fx.root, "cleanup_fails")
        .config(r#"{"name": "cleanup_fails", "table": "t", "expected_exit_value": 0}"#)
        .file("cleanup.sh", "echo 'cannot remove files'\nexit 1\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("[cleanup]"));
}

#[tokio::test]
async fn test_teardown_of_missing_table_never_fails() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 2");
    let case = CaseDir::new(&fx.root, "no_table")
        .config(r#"{"name": "no_table", "table": "never_created", "expected_exit_value": 2}"#);

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.diagnostic());
    assert!(result.warnings.is_empty());
    assert_eq!(
        fx.store.statements,
        vec!["DROP TABLE IF EXISTS `never_created`".to_string()]
    );
}

#[tokio::test]
async fn test_schema_failure_stops_at_failing_statement() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 0");
    let case = CaseDir::new(&fx.root, "bad_ddl")
        .config(r#"{"name": "bad_ddl", "table": "t", "expected_exit_value": 0}"#)
        .file(
            "DDL",
            "CREATE TABLE t (id int)\nCREATE TABL oops\nCREATE TABLE t2 (id int)\n",
        );

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.failed_stage(), Some(Stage::SchemaSetup));
    match result.failure.as_ref().map(|f| &f.error) {
        Some(TestHarnessError::SchemaError { statement, .. }) => {
            assert_eq!(statement, "CREATE TABL oops");
        }
        other => panic!("expected SchemaError, got {:?}", other),
    }
    assert!(!fx.store.table_exists("t2"));
    assert!(!fx.store.table_exists("t"), "teardown is owed after schema setup");
    assert_eq!(result.exit_code, None, "importer must not run");
}

#[tokio::test]
async fn test_missing_config_fails_at_load_under_directory_name() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 0");
    let case = CaseDir::new(&fx.root, "unnamed").file("DDL", "CREATE TABLE t (id int)\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.name, "unnamed");
    assert_eq!(result.failed_stage(), Some(Stage::LoadConfig));
    assert_eq!(
        result.failure.as_ref().map(|f| f.error.kind()),
        Some("ConfigError")
    );
    assert!(fx.store.statements.is_empty());
}

#[tokio::test]
async fn test_skipped_case_touches_nothing() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 0");
    let case = CaseDir::new(&fx.root, "later")
        .config(r#"{"name": "later", "table": "t", "expected_exit_value": 0, "skip": true}"#)
        .file("DDL", "CREATE TABLE t (id int)\n");

    let result = TestCaseExecutor::new(&importer, "test")
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.status, CaseStatus::Skipped);
    assert!(fx.store.statements.is_empty());
}

#[tokio::test]
async fn test_registered_cleanup_failure_keeps_failed_verdict() {
    let mut fx = fixture();
    let importer = write_script(&fx.tmp.path().join("mcsimport"), "exit 0");
    let case = CaseDir::new(&fx.root, "double_trouble")
        .config(r#"{"name": "double_trouble", "table": "t", "expected_exit_value": 2}"#);

    let hooks = RecordingHooks {
        fail_cleanup: true,
        ..RecordingHooks::default()
    };
    let registry = HookRegistry::new().with_hooks("double_trouble", Arc::new(hooks.clone()));

    let result = TestCaseExecutor::new(&importer, "test")
        .with_hooks(registry)
        .execute(&mut fx.store, &case.path)
        .await;

    assert_eq!(result.failed_stage(), Some(Stage::Execute));
    assert_eq!(hooks.calls(), vec!["prepare", "cleanup"]);
    assert_eq!(result.warnings.len(), 1);
}
