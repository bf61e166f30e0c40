//! Importer Integration Test Harness
//!
//! Drives the bulk importer as a black-box process against a live store:
//! - Case directories discovered under a test root
//! - Per-case schema setup from a `DDL` file
//! - Exit code and output checks on the importer
//! - Identifier-keyed, null-aware comparison of the imported table
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Test Harness Flow                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  1. Build HarnessConfig (environment + CLI flags)               │
//! │  2. Optional docker actions (restart service, resolve host)     │
//! │  3. Connect to the store (bounded retry)                        │
//! │  4. For each case directory:                                    │
//! │     a. Load config                                              │
//! │     b. Prepare hook                                             │
//! │     c. Drop table, apply DDL                                    │
//! │     d. Run importer, check exit code and output                 │
//! │     e. Compare table against `expected`                         │
//! │     f. Cleanup hook, drop table                                 │
//! │  5. Generate report, exit with the failure count                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Run all cases
//! mcsimport-test run tests/cases --importer /usr/bin/mcsimport
//!
//! # Run one case with a JUnit report
//! mcsimport-test run tests/cases --importer ./mcsimport --case csv_basic \
//!     --output junit --report-file report.xml
//!
//! # Check case configurations only
//! mcsimport-test validate tests/cases
//! ```

pub mod assertions;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_io;
pub mod hooks;
pub mod importer;
pub mod infra;
pub mod process;
pub mod report;
pub mod spec;
pub mod store;
pub mod suite;

// Re-export main types for convenience
pub use config::{HarnessConfig, RetryPolicy, StoreSettings};
pub use error::{TestHarnessError, TestHarnessResult};
pub use executor::{CaseResult, CaseStatus, Stage, TestCaseExecutor};
pub use hooks::{CaseHooks, HookRegistry, ScriptHooks};
pub use spec::{CaseFiles, TestCase};
pub use store::{FieldValue, MysqlStore, StoreConnection, StoreRow};
pub use suite::{SuiteSummary, TestSuite};
