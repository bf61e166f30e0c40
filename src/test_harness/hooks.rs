//! Per-case prepare and cleanup hooks
//!
//! Resolution order for a case:
//! 1. an implementation registered under the case name
//! 2. `ScriptHooks` when the directory has `prepare.sh` or `cleanup.sh`
//! 3. none, and both stages are skipped

use super::error::{TestHarnessError, TestHarnessResult};
use super::process::{ProcessCommand, ProcessRunner};
use super::spec::CaseFiles;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default time bound for hook scripts
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(120);

/// Optional setup and teardown for one case
#[async_trait]
pub trait CaseHooks: Send + Sync {
    /// Runs before schema setup
    async fn prepare(&self, _case_dir: &Path) -> TestHarnessResult<()> {
        Ok(())
    }

    /// Runs after validation, whatever the outcome
    async fn cleanup(&self, _case_dir: &Path) -> TestHarnessResult<()> {
        Ok(())
    }
}

/// Runs `prepare.sh` / `cleanup.sh` from the case directory
#[derive(Debug, Clone)]
pub struct ScriptHooks {
    prepare: Option<PathBuf>,
    cleanup: Option<PathBuf>,
    timeout: Duration,
}

impl ScriptHooks {
    pub fn new(prepare: Option<PathBuf>, cleanup: Option<PathBuf>) -> Self {
        Self {
            prepare,
            cleanup,
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    /// Build from discovered case files; `None` if there is no script
    pub fn from_files(files: &CaseFiles) -> Option<Self> {
        if files.prepare_script.is_none() && files.cleanup_script.is_none() {
            return None;
        }
        Some(Self::new(
            files.prepare_script.clone(),
            files.cleanup_script.clone(),
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_script(&self, hook: &str, script: &Path, case_dir: &Path) -> TestHarnessResult<()> {
        let command = ProcessCommand::new("sh")
            .arg(script.display().to_string())
            .arg(case_dir.display().to_string())
            .current_dir(case_dir);

        let output = ProcessRunner::new()
            .run(&command, Some(self.timeout))
            .await
            .map_err(|e| TestHarnessError::HookError {
                hook: hook.to_string(),
                message: e.to_string(),
            })?;

        if !output.success() {
            return Err(TestHarnessError::HookError {
                hook: hook.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    script.display(),
                    output.exit_code,
                    output.output.trim_end()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CaseHooks for ScriptHooks {
    async fn prepare(&self, case_dir: &Path) -> TestHarnessResult<()> {
        match self.prepare {
            Some(ref script) => self.run_script("prepare", script, case_dir).await,
            None => Ok(()),
        }
    }

    async fn cleanup(&self, case_dir: &Path) -> TestHarnessResult<()> {
        match self.cleanup {
            Some(ref script) => self.run_script("cleanup", script, case_dir).await,
            None => Ok(()),
        }
    }
}

/// Hook implementations registered by case name
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn CaseHooks>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register hooks for a case name, replacing any previous entry
    pub fn register(&mut self, case_name: impl Into<String>, hooks: Arc<dyn CaseHooks>) {
        self.hooks.insert(case_name.into(), hooks);
    }

    pub fn with_hooks(mut self, case_name: impl Into<String>, hooks: Arc<dyn CaseHooks>) -> Self {
        self.register(case_name, hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Resolve the hooks for a case
    pub fn resolve(&self, case_name: &str, files: &CaseFiles) -> Option<Arc<dyn CaseHooks>> {
        if let Some(hooks) = self.hooks.get(case_name) {
            return Some(Arc::clone(hooks));
        }
        ScriptHooks::from_files(files).map(|hooks| Arc::new(hooks) as Arc<dyn CaseHooks>)
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("cases", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}
