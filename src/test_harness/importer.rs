//! Importer invocation contract
//!
//! Builds the importer command line for a case and checks the outcome:
//! the exit code must equal `expected_exit_value` exactly, and the output
//! must satisfy the case's `expected_output` / `unexpected_output` lists.

use super::error::{TestHarnessError, TestHarnessResult};
use super::process::{ProcessCommand, ProcessOutput};
use super::spec::{CaseFiles, TestCase};
use std::path::{Path, PathBuf};

/// Build the importer argument vector
///
/// `<database> <table> [input] [-m mapping] [-c xml] [-d delim] [-df fmt]
/// [-default_non_mapped] [extra_args...]`
///
/// Literal `input_file` / `mapping_file` values win over files discovered
/// in the case directory and are passed through untouched, so that missing
/// or malformed paths can be tested.
pub fn build_arguments(database: &str, case: &TestCase, files: &CaseFiles) -> Vec<String> {
    let mut args = vec![database.to_string(), case.table.clone()];

    if let Some(input) = case
        .input_file
        .clone()
        .or_else(|| files.input.as_deref().map(path_arg))
    {
        args.push(input);
    }

    if let Some(mapping) = case
        .mapping_file
        .clone()
        .or_else(|| files.mapping.as_deref().map(path_arg))
    {
        args.push("-m".to_string());
        args.push(mapping);
    }

    if let Some(ref xml) = case.columnstore_xml {
        args.push("-c".to_string());
        args.push(xml.clone());
    }

    if let Some(ref delimiter) = case.delimiter {
        args.push("-d".to_string());
        args.push(delimiter.clone());
    }

    if let Some(ref date_format) = case.date_format {
        args.push("-df".to_string());
        args.push(date_format.clone());
    }

    if case.default_non_mapped {
        args.push("-default_non_mapped".to_string());
    }

    args.extend(case.extra_args.iter().cloned());
    args
}

/// Build the full importer command for a case directory
pub fn build_command(
    importer: &Path,
    database: &str,
    case: &TestCase,
    files: &CaseFiles,
    case_dir: &Path,
) -> ProcessCommand {
    ProcessCommand::new(PathBuf::from(importer))
        .args(build_arguments(database, case, files))
        .current_dir(case_dir)
}

/// Check the importer exit code against the expected value
pub fn check_exit(expected: i32, output: &ProcessOutput) -> TestHarnessResult<()> {
    if output.exit_code != expected {
        return Err(TestHarnessError::ExecutionMismatch {
            expected,
            actual: output.exit_code,
            output: output.output.clone(),
        });
    }
    Ok(())
}

/// Check required and forbidden output fragments
pub fn check_output(case: &TestCase, output: &ProcessOutput) -> TestHarnessResult<()> {
    for pattern in &case.expected_output {
        if !output.output.contains(pattern.as_str()) {
            return Err(TestHarnessError::UnexpectedOutput {
                message: "missing expected fragment".to_string(),
                pattern: pattern.clone(),
                output: output.output.clone(),
            });
        }
    }

    for pattern in &case.unexpected_output {
        if output.output.contains(pattern.as_str()) {
            return Err(TestHarnessError::UnexpectedOutput {
                message: "found forbidden fragment".to_string(),
                pattern: pattern.clone(),
                output: output.output.clone(),
            });
        }
    }

    Ok(())
}

/// Verify that the importer exists and is executable
pub fn check_executable(importer: &Path) -> TestHarnessResult<()> {
    let metadata = std::fs::metadata(importer).map_err(|e| TestHarnessError::ProcessError {
        command: importer.display().to_string(),
        message: format!("importer not found: {}", e),
    })?;

    if !metadata.is_file() {
        return Err(TestHarnessError::ProcessError {
            command: importer.display().to_string(),
            message: "importer is not a regular file".to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(TestHarnessError::ProcessError {
                command: importer.display().to_string(),
                message: "importer is not executable".to_string(),
            });
        }
    }

    Ok(())
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
