//! Docker environment control
//!
//! The harness does not manage containers itself. It only triggers the two
//! actions a test run needs before connecting:
//! - recreate a docker-compose service (`rm -vfs` then `up -d`)
//! - resolve a container's IP address to use as the store host

use super::config::InfraSettings;
use super::error::{TestHarnessError, TestHarnessResult};
use super::process::{ProcessCommand, ProcessOutput, ProcessRunner};
use std::path::PathBuf;
use std::time::Duration;

const DOCKER_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs docker / docker-compose commands through the process runner
#[derive(Debug, Clone)]
pub struct ServiceControl {
    compose_dir: Option<PathBuf>,
    docker: PathBuf,
    compose: PathBuf,
    timeout: Duration,
}

impl Default for ServiceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceControl {
    pub fn new() -> Self {
        Self {
            compose_dir: None,
            docker: PathBuf::from("docker"),
            compose: PathBuf::from("docker-compose"),
            timeout: DOCKER_COMMAND_TIMEOUT,
        }
    }

    /// Directory holding the compose file
    pub fn with_compose_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compose_dir = Some(dir.into());
        self
    }

    /// Override the docker executables
    pub fn with_executables(mut self, docker: impl Into<PathBuf>, compose: impl Into<PathBuf>) -> Self {
        self.docker = docker.into();
        self.compose = compose.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Remove and recreate a compose service
    pub async fn restart_service(&self, service: &str) -> TestHarnessResult<()> {
        log::info!("Restarting service '{}'", service);
        self.run_checked(self.compose_command(["rm", "-vfs", service]))
            .await?;
        self.run_checked(self.compose_command(["up", "-d"])).await?;
        Ok(())
    }

    /// IP address of a running container
    pub async fn container_ip(&self, container: &str) -> TestHarnessResult<String> {
        let command = ProcessCommand::new(&self.docker).args([
            "inspect",
            "-f",
            "{{range .NetworkSettings.Networks}}{{.IPAddress}}{{end}}",
            container,
        ]);
        let output = self.run_checked(command).await?;
        let ip = parse_inspect_ip(&output.output);

        if ip.is_empty() {
            return Err(TestHarnessError::ProcessError {
                command: format!("docker inspect {}", container),
                message: "container has no IP address".to_string(),
            });
        }
        log::info!("Container '{}' has IP {}", container, ip);
        Ok(ip)
    }

    /// Perform the configured actions, returning the resolved host if any
    pub async fn apply(&self, settings: &InfraSettings) -> TestHarnessResult<Option<String>> {
        for service in &settings.restart_services {
            self.restart_service(service).await?;
        }
        match settings.host_container {
            Some(ref container) => Ok(Some(self.container_ip(container).await?)),
            None => Ok(None),
        }
    }

    fn compose_command<const N: usize>(&self, args: [&str; N]) -> ProcessCommand {
        let command = ProcessCommand::new(&self.compose).args(args);
        match self.compose_dir {
            Some(ref dir) => command.current_dir(dir),
            None => command,
        }
    }

    async fn run_checked(&self, command: ProcessCommand) -> TestHarnessResult<ProcessOutput> {
        let output = ProcessRunner::new()
            .run(&command, Some(self.timeout))
            .await?;
        if !output.success() {
            return Err(TestHarnessError::ProcessError {
                command: command.to_string(),
                message: format!(
                    "exited with {}: {}",
                    output.exit_code,
                    output.output.trim_end()
                ),
            });
        }
        Ok(output)
    }
}

/// Strip quotes and whitespace around `docker inspect` output
fn parse_inspect_ip(output: &str) -> String {
    output
        .lines()
        .map(|line| line.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}
