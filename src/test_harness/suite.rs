//! Suite driver
//!
//! Discovers case directories under a test root and runs them one after
//! another against a single shared store connection.

use super::error::{TestHarnessError, TestHarnessResult};
use super::executor::{CaseResult, CaseStatus, TestCaseExecutor};
use super::store::StoreConnection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Highest exit status used for failed cases; 255 is reserved for harness errors
pub const MAX_FAILURE_STATUS: i32 = 254;

/// Exit status for failures of the harness itself
pub const HARNESS_FAILURE_STATUS: i32 = 255;

/// Aggregated results of a suite run
#[derive(Debug, Clone, Default)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<CaseResult>,
    pub duration: Duration,
}

impl SuiteSummary {
    /// Fold a case result into the tallies
    pub fn record(&mut self, result: CaseResult) {
        self.total += 1;
        match result.status {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::Skipped => self.skipped += 1,
        }
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Process exit status: number of failed cases, clamped
    pub fn exit_status(&self) -> i32 {
        exit_status_for(self.failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| r.failed())
    }
}

/// Map a failure count onto a process exit status
pub fn exit_status_for(failures: usize) -> i32 {
    failures.min(MAX_FAILURE_STATUS as usize) as i32
}

/// The set of case directories under one root
#[derive(Debug, Clone)]
pub struct TestSuite {
    root: PathBuf,
    cases: Vec<PathBuf>,
}

impl TestSuite {
    /// List every non-hidden subdirectory of `root`, sorted by name
    pub fn discover(root: impl AsRef<Path>) -> TestHarnessResult<Self> {
        let root = root.as_ref();
        let entries = std::fs::read_dir(root).map_err(|e| TestHarnessError::IoError {
            message: e.to_string(),
            path: root.display().to_string(),
        })?;

        let mut cases = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TestHarnessError::IoError {
                message: e.to_string(),
                path: root.display().to_string(),
            })?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if path.is_dir() && !hidden {
                cases.push(path);
            }
        }
        cases.sort();

        log::info!("Discovered {} cases in {}", cases.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            cases,
        })
    }

    /// Keep only the case whose directory name equals `name`
    pub fn with_filter(mut self, name: &str) -> Self {
        self.cases.retain(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy() == name)
                .unwrap_or(false)
        });
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cases(&self) -> &[PathBuf] {
        &self.cases
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every case sequentially
    pub async fn run(
        &self,
        executor: &TestCaseExecutor,
        store: &mut dyn StoreConnection,
    ) -> SuiteSummary {
        let start = Instant::now();
        let mut summary = SuiteSummary::default();

        for (idx, case_dir) in self.cases.iter().enumerate() {
            log::info!(
                "[{}/{}] {}",
                idx + 1,
                self.cases.len(),
                case_dir.display()
            );
            let result = executor.execute(store, case_dir).await;
            summary.record(result);
        }

        summary.duration = start.elapsed();
        log::info!(
            "Suite finished: {} total, {} passed, {} failed, {} skipped",
            summary.total,
            summary.passed,
            summary.failed,
            summary.skipped
        );
        summary
    }
}
