//! Test case execution engine
//!
//! Runs one case directory through its stages in strict order:
//!
//! ```text
//! LoadConfig -> Prepare -> SchemaSetup -> Execute -> Validate -> Cleanup -> Teardown
//! ```
//!
//! The first failing stage decides the verdict. Cleanup runs whenever the
//! prepare hook ran, and teardown whenever schema setup was entered; their
//! own failures only add warnings.

use super::assertions::verify_table;
use super::error::{TestHarnessError, TestHarnessResult};
use super::file_io::load_expected_rows;
use super::hooks::{CaseHooks, HookRegistry};
use super::importer;
use super::process::ProcessRunner;
use super::spec::{CaseFiles, TestCase};
use super::store::{quote_identifier, StoreConnection};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lifecycle stage of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadConfig,
    Prepare,
    SchemaSetup,
    Execute,
    Validate,
    Cleanup,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadConfig => "load-config",
            Stage::Prepare => "prepare",
            Stage::SchemaSetup => "schema-setup",
            Stage::Execute => "execute",
            Stage::Validate => "validate",
            Stage::Cleanup => "cleanup",
            Stage::Teardown => "teardown",
        };
        write!(f, "{}", name)
    }
}

/// A stage-tagged failure
#[derive(Debug, Clone)]
pub struct CaseFailure {
    pub stage: Stage,
    pub error: TestHarnessError,
}

impl CaseFailure {
    pub fn new(stage: Stage, error: TestHarnessError) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

/// Verdict of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one case
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Case name (directory name when the config could not be loaded)
    pub name: String,

    /// Case directory
    pub case_dir: PathBuf,

    pub status: CaseStatus,

    /// Failing stage and error, if any
    pub failure: Option<CaseFailure>,

    /// Importer exit code, if the importer ran to an exit
    pub exit_code: Option<i32>,

    /// Captured importer output
    pub output: String,

    /// Non-fatal problems from cleanup and teardown
    pub warnings: Vec<String>,

    pub duration: Duration,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == CaseStatus::Failed
    }

    /// Failing stage, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|f| f.stage)
    }

    /// Human-readable diagnostic for a failure
    pub fn diagnostic(&self) -> Option<String> {
        self.failure.as_ref().map(|f| f.to_string())
    }
}

/// Mutable state collected while a case runs
#[derive(Default)]
struct CaseRun {
    exit_code: Option<i32>,
    output: String,
    warnings: Vec<String>,
    teardown_owed: bool,
}

/// Executes single test cases against a store
pub struct TestCaseExecutor {
    /// Importer executable
    importer: PathBuf,

    /// Database name passed as first importer argument
    database: String,

    /// Importer timeout when the case sets none
    timeout: Duration,

    /// Registered prepare/cleanup hooks
    hooks: HookRegistry,

    runner: ProcessRunner,
}

impl TestCaseExecutor {
    pub fn new(importer: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        Self {
            importer: importer.into(),
            database: database.into(),
            timeout: super::config::DEFAULT_IMPORT_TIMEOUT,
            hooks: HookRegistry::new(),
            runner: ProcessRunner::new(),
        }
    }

    /// Set the default importer timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the hook registry
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run one case directory to a verdict
    ///
    /// Never fails: every error is folded into the returned `CaseResult`.
    pub async fn execute(&self, store: &mut dyn StoreConnection, case_dir: &Path) -> CaseResult {
        let start = Instant::now();
        let dir_name = case_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| case_dir.display().to_string());

        let case = match TestCase::load(case_dir) {
            Ok(case) => case,
            Err(e) => {
                log::error!("Case '{}' has an invalid configuration: {}", dir_name, e);
                return CaseResult {
                    name: dir_name,
                    case_dir: case_dir.to_path_buf(),
                    status: CaseStatus::Failed,
                    failure: Some(CaseFailure::new(Stage::LoadConfig, e)),
                    exit_code: None,
                    output: String::new(),
                    warnings: Vec::new(),
                    duration: start.elapsed(),
                };
            }
        };

        if case.skip {
            log::info!("Skipping case: {}", case.name);
            return CaseResult {
                name: case.name,
                case_dir: case_dir.to_path_buf(),
                status: CaseStatus::Skipped,
                failure: None,
                exit_code: None,
                output: String::new(),
                warnings: Vec::new(),
                duration: start.elapsed(),
            };
        }

        log::info!("Executing case: {}", case.name);
        let hooks = self
            .hooks
            .resolve(&case.name, &CaseFiles::discover(case_dir));
        let mut run = CaseRun::default();

        let failure = self
            .run_stages(store, &case, hooks.as_deref(), case_dir, &mut run)
            .await
            .err();

        if let Some(ref hooks) = hooks {
            if let Err(e) = hooks.cleanup(case_dir).await {
                log::warn!("Cleanup hook for '{}' failed: {}", case.name, e);
                run.warnings.push(format!("[{}] {}", Stage::Cleanup, e));
            }
        }

        if run.teardown_owed {
            let statement = format!("DROP TABLE IF EXISTS {}", quote_identifier(&case.table));
            if let Err(e) = store.execute(&statement).await {
                log::warn!("Teardown of '{}' failed: {}", case.table, e);
                run.warnings.push(format!("[{}] {}", Stage::Teardown, e));
            }
        }

        let status = match failure {
            None => {
                log::info!("Case '{}' passed", case.name);
                CaseStatus::Passed
            }
            Some(ref f) => {
                log::error!("Case '{}' failed: {}", case.name, f);
                CaseStatus::Failed
            }
        };

        CaseResult {
            name: case.name,
            case_dir: case_dir.to_path_buf(),
            status,
            failure,
            exit_code: run.exit_code,
            output: run.output,
            warnings: run.warnings,
            duration: start.elapsed(),
        }
    }

    async fn run_stages(
        &self,
        store: &mut dyn StoreConnection,
        case: &TestCase,
        hooks: Option<&dyn CaseHooks>,
        case_dir: &Path,
        run: &mut CaseRun,
    ) -> Result<(), CaseFailure> {
        if let Some(hooks) = hooks {
            hooks
                .prepare(case_dir)
                .await
                .map_err(|e| CaseFailure::new(Stage::Prepare, e))?;
        }

        // prepare may have written input, DDL or expected files
        let files = CaseFiles::discover(case_dir);

        run.teardown_owed = true;
        if let Some(ref ddl) = files.ddl {
            setup_schema(store, &case.table, ddl)
                .await
                .map_err(|e| CaseFailure::new(Stage::SchemaSetup, e))?;
        }

        self.run_importer(case, &files, case_dir, run)
            .await
            .map_err(|e| CaseFailure::new(Stage::Execute, e))?;

        match files.expected {
            Some(ref expected) => {
                let rows = load_expected_rows(expected, case.expected_delimiter())
                    .map_err(|e| CaseFailure::new(Stage::Validate, e))?;
                verify_table(store, &case.table, &rows)
                    .await
                    .map_err(|e| CaseFailure::new(Stage::Validate, e))?;
            }
            None => log::info!("No expected data for '{}', skipping validation", case.name),
        }

        Ok(())
    }

    async fn run_importer(
        &self,
        case: &TestCase,
        files: &CaseFiles,
        case_dir: &Path,
        run: &mut CaseRun,
    ) -> TestHarnessResult<()> {
        let command =
            importer::build_command(&self.importer, &self.database, case, files, case_dir);
        log::debug!("Importer command: {}", command);

        let result = match case.observe_secs {
            Some(secs) => self.runner.run_for(&command, Duration::from_secs(secs)).await,
            None => {
                let timeout = case
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(self.timeout);
                self.runner.run(&command, Some(timeout)).await
            }
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if let TestHarnessError::Timeout { ref output, .. } = e {
                    run.output = output.clone();
                }
                return Err(e);
            }
        };

        log::debug!(
            "Importer exited with {} after {:?}",
            output.exit_code,
            output.duration
        );
        run.exit_code = Some(output.exit_code);
        run.output = output.output.clone();

        importer::check_exit(case.expected_exit_value, &output)?;
        importer::check_output(case, &output)
    }
}

/// Drop the target table, then apply the DDL file line by line
async fn setup_schema(
    store: &mut dyn StoreConnection,
    table: &str,
    ddl_path: &Path,
) -> TestHarnessResult<()> {
    let content = std::fs::read_to_string(ddl_path).map_err(|e| TestHarnessError::IoError {
        message: e.to_string(),
        path: ddl_path.display().to_string(),
    })?;

    let drop = format!("DROP TABLE IF EXISTS {}", quote_identifier(table));
    store
        .execute(&drop)
        .await
        .map_err(|e| schema_error(&drop, e))?;

    for statement in parse_ddl(&content) {
        store
            .execute(&statement)
            .await
            .map_err(|e| schema_error(&statement, e))?;
    }
    Ok(())
}

/// Split a DDL file into statements, one per non-blank, non-comment line
pub fn parse_ddl(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--") && !line.starts_with('#'))
        .map(|line| line.trim_end_matches(';').trim_end().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn schema_error(statement: &str, err: TestHarnessError) -> TestHarnessError {
    let message = match err {
        TestHarnessError::StoreError { message, .. } => message,
        other => other.to_string(),
    };
    TestHarnessError::SchemaError {
        statement: statement.to_string(),
        message,
    }
}
