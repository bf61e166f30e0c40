//! CLI helpers for the mcsimport-test binary
//!
//! Provides the command implementations behind `run`, `list` and `validate`.

use super::config::HarnessConfig;
use super::error::{TestHarnessError, TestHarnessResult};
use super::executor::TestCaseExecutor;
use super::hooks::HookRegistry;
use super::importer::check_executable;
use super::infra::ServiceControl;
use super::spec::TestCase;
use super::store::{connect_with_retry, StoreConnection};
use super::suite::{exit_status_for, SuiteSummary, TestSuite};
use std::path::{Path, PathBuf};

/// Run the suite described by `config`
///
/// Harness-level problems (importer missing, unreadable test root, store
/// unreachable) are returned as errors before any case runs. Case failures
/// are reported through the returned summary.
pub async fn run_suite(
    config: &HarnessConfig,
    hooks: HookRegistry,
) -> TestHarnessResult<SuiteSummary> {
    check_executable(&config.importer)?;

    let mut suite = TestSuite::discover(&config.test_root)?;
    if let Some(ref name) = config.case_filter {
        suite = suite.with_filter(name);
        if suite.is_empty() {
            return Err(TestHarnessError::ConfigError {
                message: format!("No case matching filter '{}' found", name),
                path: config.test_root.display().to_string(),
            });
        }
    }

    let mut store_settings = config.store.clone();
    if !config.infra.is_empty() {
        let mut control = ServiceControl::new();
        if let Some(ref dir) = config.infra.compose_dir {
            control = control.with_compose_dir(dir);
        }
        if let Some(host) = control.apply(&config.infra).await? {
            store_settings.host = host;
        }
    }

    log::info!(
        "Connecting to {}:{} (database '{}')",
        store_settings.host,
        store_settings.port,
        store_settings.database
    );
    let mut store = connect_with_retry(&store_settings, config.connect_retry).await?;

    let executor = TestCaseExecutor::new(&config.importer, &store_settings.database)
        .with_timeout(config.import_timeout)
        .with_hooks(hooks);

    let summary = suite.run(&executor, &mut store).await;

    if let Err(e) = store.close().await {
        log::warn!("Failed to close store connection: {}", e);
    }

    Ok(summary)
}

/// Case directories under `root`, with the case name when it loads
pub fn list_cases(root: &Path) -> TestHarnessResult<Vec<(PathBuf, TestHarnessResult<TestCase>)>> {
    let suite = TestSuite::discover(root)?;
    Ok(suite
        .cases()
        .iter()
        .map(|dir| (dir.clone(), TestCase::load(dir)))
        .collect())
}

/// Outcome of validating every case configuration
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: Vec<(PathBuf, TestHarnessError)>,
}

impl ValidationReport {
    /// Exit status: number of invalid configurations, clamped
    pub fn exit_status(&self) -> i32 {
        exit_status_for(self.invalid.len())
    }
}

/// Load every case configuration without executing anything
pub fn validate_cases(root: &Path) -> TestHarnessResult<ValidationReport> {
    let mut report = ValidationReport::default();
    for (dir, loaded) in list_cases(root)? {
        match loaded {
            Ok(_) => report.valid += 1,
            Err(e) => report.invalid.push((dir, e)),
        }
    }
    Ok(report)
}

/// Print help for output formats
pub fn print_format_help() {
    println!("Available output formats:");
    println!("  text   - Human-readable console output (default)");
    println!("  json   - Machine-readable JSON format");
    println!("  junit  - JUnit XML format for CI/CD integration");
}
