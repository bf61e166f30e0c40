//! Importer Integration Test Harness
//!
//! CLI tool that runs the bulk importer against a live store for every case
//! directory under a test root and checks exit codes and table contents.
//!
//! Usage:
//!   mcsimport-test run tests/cases --importer /usr/bin/mcsimport
//!   mcsimport-test list tests/cases
//!   mcsimport-test validate tests/cases

use clap::{Parser, Subcommand};
use mcsimport_harness::test_harness::cli::{list_cases, print_format_help, run_suite, validate_cases};
use mcsimport_harness::test_harness::config::{HarnessConfig, InfraSettings, RetryPolicy};
use mcsimport_harness::test_harness::hooks::HookRegistry;
use mcsimport_harness::test_harness::report::{
    generate_run_id, write_report, OutputFormat, ReportGenerator,
};
use mcsimport_harness::test_harness::suite::HARNESS_FAILURE_STATUS;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mcsimport-test")]
#[command(about = "Integration test harness for the ColumnStore bulk importer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every case under a test root
    Run {
        /// Directory containing one subdirectory per case
        test_root: PathBuf,

        /// Path to the importer executable
        #[arg(short, long)]
        importer: PathBuf,

        /// Run only the case with this directory name
        #[arg(short, long)]
        case: Option<String>,

        /// Output format: text, json, junit
        #[arg(short, long, default_value = "text")]
        output: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        report_file: Option<PathBuf>,

        /// Default importer timeout per case in seconds
        #[arg(long, default_value = "300")]
        timeout_secs: u64,

        /// Store host (overrides MCSAPI_CS_TEST_IP)
        #[arg(long)]
        host: Option<String>,

        /// Store port (overrides MCSAPI_CS_TEST_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Store user (overrides MCSAPI_CS_TEST_USER)
        #[arg(long)]
        user: Option<String>,

        /// Store password (overrides MCSAPI_CS_TEST_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Database (overrides MCSAPI_CS_TEST_DATABASE)
        #[arg(long)]
        database: Option<String>,

        /// Connection attempts before giving up
        #[arg(long, default_value = "30")]
        connect_attempts: u32,

        /// Pause between connection attempts in milliseconds
        #[arg(long, default_value = "1000")]
        connect_interval_ms: u64,

        /// Directory holding the docker-compose file
        #[arg(long)]
        compose_dir: Option<PathBuf>,

        /// Recreate this compose service before connecting (repeatable)
        #[arg(long)]
        restart_service: Vec<String>,

        /// Use this container's IP address as the store host
        #[arg(long)]
        host_container: Option<String>,
    },

    /// List the cases under a test root
    List {
        /// Directory containing one subdirectory per case
        test_root: PathBuf,
    },

    /// Check every case configuration without running anything
    Validate {
        /// Directory containing one subdirectory per case
        test_root: PathBuf,
    },

    /// Show the available report formats
    Formats,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            test_root,
            importer,
            case,
            output,
            report_file,
            timeout_secs,
            host,
            port,
            user,
            password,
            database,
            connect_attempts,
            connect_interval_ms,
            compose_dir,
            restart_service,
            host_container,
        } => {
            let format: OutputFormat = match output.parse() {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    print_format_help();
                    std::process::exit(HARNESS_FAILURE_STATUS);
                }
            };

            let mut config = HarnessConfig::from_env(&importer, &test_root)
                .with_import_timeout(Duration::from_secs(timeout_secs))
                .with_connect_retry(RetryPolicy {
                    attempts: connect_attempts,
                    interval: Duration::from_millis(connect_interval_ms),
                })
                .with_infra(InfraSettings {
                    compose_dir,
                    restart_services: restart_service,
                    host_container,
                });
            if let Some(name) = case {
                config = config.with_case_filter(name);
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(user) = user {
                config = config.with_user(user);
            }
            if let Some(password) = password {
                config = config.with_password(password);
            }
            if let Some(database) = database {
                config = config.with_database(database);
            }

            println!("🧪 Importer Test Harness");
            println!("════════════════════════════════════════");
            println!("Test Root: {}", config.test_root.display());
            println!("Importer: {}", config.importer.display());
            println!(
                "Store: {}@{}:{}/{}",
                config.store.user, config.store.host, config.store.port, config.store.database
            );
            if let Some(ref name) = config.case_filter {
                println!("Case Filter: {}", name);
            }
            println!();

            let mut report_gen =
                ReportGenerator::new(&config.test_root.display().to_string(), &generate_run_id());

            let summary = match run_suite(&config, HookRegistry::new()).await {
                Ok(summary) => summary,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    std::process::exit(HARNESS_FAILURE_STATUS);
                }
            };

            report_gen.add_summary(&summary);
            let report = report_gen.generate();

            let written = match report_file {
                Some(ref path) => std::fs::File::create(path)
                    .and_then(|mut file| write_report(&report, format, &mut file)),
                None => write_report(&report, format, &mut std::io::stdout()),
            };
            if let Err(e) = written {
                eprintln!("❌ Failed to write report: {}", e);
                std::process::exit(HARNESS_FAILURE_STATUS);
            }
            if let Some(ref path) = report_file {
                println!("📄 Report written to {}", path.display());
            }

            std::process::exit(summary.exit_status());
        }

        Commands::List { test_root } => match list_cases(&test_root) {
            Ok(cases) => {
                for (dir, loaded) in cases {
                    match loaded {
                        Ok(case) if case.skip => {
                            println!("⏭️  {} ({}, skipped)", case.name, dir.display())
                        }
                        Ok(case) => println!("   {} ({})", case.name, dir.display()),
                        Err(e) => println!("❌ {}: {}", dir.display(), e),
                    }
                }
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(HARNESS_FAILURE_STATUS);
            }
        },

        Commands::Validate { test_root } => match validate_cases(&test_root) {
            Ok(report) => {
                for (dir, e) in &report.invalid {
                    println!("❌ {}: {}", dir.display(), e);
                }
                println!(
                    "{} valid, {} invalid",
                    report.valid,
                    report.invalid.len()
                );
                std::process::exit(report.exit_status());
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(HARNESS_FAILURE_STATUS);
            }
        },

        Commands::Formats => print_format_help(),
    }
}
