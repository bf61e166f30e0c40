//! Test case configuration parsing and validation
//!
//! Each case directory carries one `config` file describing the scenario:
//! - Target table and the exit code the importer must return
//! - Optional importer flags (delimiter, date format, mapping, ...)
//! - Optional output expectations
//!
//! JSON and YAML are both accepted. `name`, `table` and
//! `expected_exit_value` are required; a missing one is a configuration
//! error and is never defaulted.

use super::error::{TestHarnessError, TestHarnessResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Candidate names for the case configuration file, in lookup order
pub const CONFIG_FILE_NAMES: [&str; 4] = ["config", "config.json", "config.yaml", "config.yml"];

/// Schema definition file
pub const DDL_FILE_NAME: &str = "DDL";

/// Default input data file
pub const INPUT_FILE_NAME: &str = "input";

/// Default column mapping file
pub const MAPPING_FILE_NAME: &str = "mapping";

/// Expected table contents
pub const EXPECTED_FILE_NAME: &str = "expected";

/// Prepare hook script
pub const PREPARE_SCRIPT_NAME: &str = "prepare.sh";

/// Cleanup hook script
pub const CLEANUP_SCRIPT_NAME: &str = "cleanup.sh";

/// Configuration of a single test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    /// Case name (unique within a run)
    pub name: String,

    /// Target table the importer writes to
    pub table: String,

    /// Exit code the importer must return
    pub expected_exit_value: i32,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Whether to skip this case
    #[serde(default)]
    pub skip: bool,

    /// Input delimiter, passed verbatim via `-d`
    #[serde(default)]
    pub delimiter: Option<String>,

    /// Input date format, passed via `-df`
    #[serde(default)]
    pub date_format: Option<String>,

    /// Pass `-default_non_mapped` to the importer
    #[serde(default)]
    pub default_non_mapped: bool,

    /// Literal input file path (overrides the `input` file in the case directory)
    #[serde(default)]
    pub input_file: Option<String>,

    /// Literal mapping file path (overrides the `mapping` file in the case directory)
    #[serde(default)]
    pub mapping_file: Option<String>,

    /// Columnstore.xml passed via `-c`
    #[serde(default)]
    pub columnstore_xml: Option<String>,

    /// Extra arguments appended after all generated flags
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Import timeout for this case in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Run the importer for this many seconds, then stop it (long-running adapters)
    #[serde(default)]
    pub observe_secs: Option<u64>,

    /// Fragments that must appear in the importer output
    #[serde(default)]
    pub expected_output: Vec<String>,

    /// Fragments that must not appear in the importer output
    #[serde(default)]
    pub unexpected_output: Vec<String>,

    /// Delimiter of the `expected` file
    #[serde(default)]
    pub expected_delimiter: Option<String>,
}

impl TestCase {
    /// Load the case configuration from a case directory
    pub fn load(case_dir: impl AsRef<Path>) -> TestHarnessResult<Self> {
        let case_dir = case_dir.as_ref();
        let path = find_config_file(case_dir).ok_or_else(|| TestHarnessError::ConfigError {
            message: format!(
                "no configuration file found (looked for {})",
                CONFIG_FILE_NAMES.join(", ")
            ),
            path: case_dir.display().to_string(),
        })?;

        Self::from_file(&path)
    }

    /// Parse a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> TestHarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TestHarnessError::ConfigError {
            message: e.to_string(),
            path: path.display().to_string(),
        })?;

        let is_json = path.extension().map(|ext| ext == "json").unwrap_or(false)
            || content.trim_start().starts_with('{');

        let case = if is_json {
            Self::from_json(&content, path.display().to_string())?
        } else {
            Self::from_yaml(&content, path.display().to_string())?
        };
        case.validate(path)?;
        Ok(case)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str, file_name: String) -> TestHarnessResult<Self> {
        serde_json::from_str(json).map_err(|e| TestHarnessError::ConfigError {
            message: e.to_string(),
            path: file_name,
        })
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str, file_name: String) -> TestHarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TestHarnessError::ConfigError {
            message: e.to_string(),
            path: file_name,
        })
    }

    /// Validate fields serde cannot check on its own
    pub fn validate(&self, path: &Path) -> TestHarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(TestHarnessError::ConfigError {
                message: "field `name` must not be empty".to_string(),
                path: path.display().to_string(),
            });
        }
        if self.table.trim().is_empty() {
            return Err(TestHarnessError::ConfigError {
                message: "field `table` must not be empty".to_string(),
                path: path.display().to_string(),
            });
        }
        if let Some(ref delimiter) = self.expected_delimiter {
            if delimiter.chars().count() != 1 {
                return Err(TestHarnessError::ConfigError {
                    message: format!(
                        "field `expected_delimiter` must be a single character, got '{}'",
                        delimiter
                    ),
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Delimiter used to parse the `expected` file
    pub fn expected_delimiter(&self) -> char {
        self.expected_delimiter
            .as_deref()
            .and_then(|d| d.chars().next())
            .unwrap_or(',')
    }
}

/// Optional files found in a case directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFiles {
    pub ddl: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub mapping: Option<PathBuf>,
    pub expected: Option<PathBuf>,
    pub prepare_script: Option<PathBuf>,
    pub cleanup_script: Option<PathBuf>,
}

impl CaseFiles {
    /// Resolve the optional files of a case directory
    pub fn discover(case_dir: &Path) -> Self {
        let existing = |name: &str| {
            let path = case_dir.join(name);
            if path.is_file() {
                Some(path)
            } else {
                None
            }
        };

        Self {
            ddl: existing(DDL_FILE_NAME),
            input: existing(INPUT_FILE_NAME),
            mapping: existing(MAPPING_FILE_NAME),
            expected: existing(EXPECTED_FILE_NAME),
            prepare_script: existing(PREPARE_SCRIPT_NAME),
            cleanup_script: existing(CLEANUP_SCRIPT_NAME),
        }
    }
}

fn find_config_file(case_dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| case_dir.join(name))
        .find(|path| path.is_file())
}
