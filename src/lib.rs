//! # mcsimport-harness
//!
//! Integration test harness for the ColumnStore bulk importer (`mcsimport`)
//! and its CDC adapters. The harness drives the importer as an external
//! process, checks its exit code and output, and compares the imported table
//! against an expected data set.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcsimport_harness::test_harness::cli::run_suite;
//! use mcsimport_harness::test_harness::config::HarnessConfig;
//! use mcsimport_harness::test_harness::hooks::HookRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarnessConfig::from_env("/usr/bin/mcsimport", "tests/cases");
//!     let summary = run_suite(&config, HookRegistry::new()).await?;
//!     std::process::exit(summary.exit_status());
//! }
//! ```

#![allow(clippy::collapsible_if)]

pub mod test_harness;
