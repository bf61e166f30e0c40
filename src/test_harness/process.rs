//! External process execution
//!
//! Runs the importer (or a CDC adapter) as a child process:
//! - stdout and stderr are merged into one text stream in arrival order
//! - an optional timeout kills the process and reports `Timeout`
//! - an observation window runs long-lived adapters for a fixed time

use super::error::{TestHarnessError, TestHarnessResult};
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long to keep draining pipes after the process is gone
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A command line to execute
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCommand {
    /// Executable path or name
    pub program: PathBuf,

    /// Ordered arguments
    pub args: Vec<String>,

    /// Working directory
    pub current_dir: Option<PathBuf>,

    /// Extra environment variables
    pub envs: Vec<(String, String)>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout reaches grandchildren holding the pipes
        #[cfg(unix)]
        command.process_group(0);
        if let Some(ref dir) = self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code (`128 + signal` when killed by a signal on unix)
    pub exit_code: i32,

    /// Combined stdout and stderr
    pub output: String,

    /// Wall-clock run time
    pub duration: Duration,

    /// Whether the harness stopped the process at the end of an observation window
    pub stopped: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the process printed nothing at all
    pub fn is_silent(&self) -> bool {
        self.output.trim().is_empty()
    }

    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}

/// Runs external processes with output capture and time bounds
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run a command to completion, killing it if `timeout` elapses
    pub async fn run(
        &self,
        command: &ProcessCommand,
        timeout: Option<Duration>,
    ) -> TestHarnessResult<ProcessOutput> {
        log::debug!("Running: {}", command);
        let start = Instant::now();
        let (mut child, collector) = spawn_captured(command)?;

        let status = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.map_err(|e| wait_error(command, e))?,
                Err(_) => {
                    log::warn!("Process exceeded {:?}, killing: {}", limit, command);
                    if let Err(e) = terminate(&mut child).await {
                        log::warn!("Failed to kill '{}': {}", command, e);
                    }
                    let output = collector.finish().await;
                    return Err(TestHarnessError::Timeout {
                        operation: command.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                        output,
                    });
                }
            },
            None => child.wait().await.map_err(|e| wait_error(command, e))?,
        };

        let output = collector.finish().await;
        let exit_code = exit_code(status);
        log::debug!("Process exited with {}: {}", exit_code, command);

        Ok(ProcessOutput {
            exit_code,
            output,
            duration: start.elapsed(),
            stopped: false,
        })
    }

    /// Run a long-lived command for `window`, then stop it
    ///
    /// A process that exits on its own inside the window reports its real
    /// exit code. A process still running at the end is stopped by the
    /// harness and reported with exit code 0 and `stopped = true`.
    pub async fn run_for(
        &self,
        command: &ProcessCommand,
        window: Duration,
    ) -> TestHarnessResult<ProcessOutput> {
        log::debug!("Observing for {:?}: {}", window, command);
        let start = Instant::now();
        let (mut child, collector) = spawn_captured(command)?;

        let (exit_code, stopped) = match tokio::time::timeout(window, child.wait()).await {
            Ok(status) => (exit_code(status.map_err(|e| wait_error(command, e))?), false),
            Err(_) => {
                terminate(&mut child).await.map_err(|e| TestHarnessError::ProcessError {
                    command: command.to_string(),
                    message: format!("failed to stop process: {}", e),
                })?;
                (0, true)
            }
        };

        let output = collector.finish().await;
        Ok(ProcessOutput {
            exit_code,
            output,
            duration: start.elapsed(),
            stopped,
        })
    }
}

/// Merges the output of both pipes into one shared buffer
struct OutputCollector {
    buffer: Arc<Mutex<String>>,
    readers: Vec<JoinHandle<()>>,
}

impl OutputCollector {
    /// Wait for the pipes to close, then return everything read so far
    async fn finish(self) -> String {
        let OutputCollector { buffer, readers } = self;
        let drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, async move {
            for reader in readers {
                if let Err(e) = reader.await {
                    log::warn!("Output reader failed: {}", e);
                }
            }
        })
        .await;
        if drained.is_err() {
            log::warn!("Output pipes still open after process exit, keeping partial output");
        }

        let output = match buffer.lock() {
            Ok(output) => output.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        output
    }
}

/// Kill the child and, on unix, every process in its group
async fn terminate(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let script = format!("kill -KILL -- -{}", pid);
        match Command::new("sh")
            .args(["-c", script.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) if !status.success() => {
                log::debug!("kill of process group {} exited with {}", pid, status)
            }
            Ok(_) => {}
            Err(e) => log::debug!("Could not signal process group {}: {}", pid, e),
        }
    }
    child.kill().await
}

fn spawn_captured(command: &ProcessCommand) -> TestHarnessResult<(Child, OutputCollector)> {
    let mut child = command
        .to_command()
        .spawn()
        .map_err(|e| TestHarnessError::ProcessError {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    let buffer = Arc::new(Mutex::new(String::new()));
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(append_lines(stdout, Arc::clone(&buffer))));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(append_lines(stderr, Arc::clone(&buffer))));
    }

    Ok((child, OutputCollector { buffer, readers }))
}

async fn append_lines<R>(reader: R, buffer: Arc<Mutex<String>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let mut output = match buffer.lock() {
                    Ok(output) => output,
                    Err(poisoned) => poisoned.into_inner(),
                };
                output.push_str(&line);
                if !line.ends_with('\n') {
                    output.push('\n');
                }
            }
            Err(e) => {
                log::debug!("Stopped reading process output: {}", e);
                break;
            }
        }
    }
}

fn wait_error(command: &ProcessCommand, err: std::io::Error) -> TestHarnessError {
    TestHarnessError::ProcessError {
        command: command.to_string(),
        message: err.to_string(),
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
