use crate::error::AppError;
use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of one invocation of the task tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new<O: Into<String>, E: Into<String>>(code: i32, stdout: O, stderr: E) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Runs the task tool with the given arguments and blocks until it exits.
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput, AppError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, args: &[String]) -> Result<CommandOutput, AppError> {
        (**self).run(args)
    }
}

/// Spawns the real `task` binary.
///
/// `rc.<key>=<value>` overrides are appended after the command arguments;
/// the tool strips them before parsing the rest of the line.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    binary: PathBuf,
    envs: Vec<(String, OsString)>,
    rc_overrides: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
            envs: Vec::new(),
            rc_overrides: Vec::new(),
            timeout: None,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn with_env<K: Into<String>, V: Into<OsString>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn with_rc_override<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.rc_overrides.push((key.into(), value.into()));
        self
    }

    /// Kill the process and fail with `CommandExecution` once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut line = args.to_vec();
        line.extend(
            self.rc_overrides
                .iter()
                .map(|(key, value)| format!("rc.{key}={value}")),
        );
        line
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput, AppError> {
        let line = self.command_line(args);
        debug!(binary = %self.binary.display(), args = ?line, "running task command");

        let mut command = Command::new(&self.binary);
        command
            .args(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let child = command
            .spawn()
            .map_err(|err| spawn_error(&self.binary, err))?;

        let (status, stdout, stderr) = match self.timeout {
            Some(timeout) => wait_with_timeout(child, timeout)?,
            None => {
                let output = child
                    .wait_with_output()
                    .map_err(|err| AppError::io(err.to_string()))?;
                (output.status, output.stdout, output.stderr)
            }
        };

        debug!(code = ?status.code(), "task command exited");
        Ok(CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn spawn_error(binary: &Path, err: std::io::Error) -> AppError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            AppError::CommandNotFound(format!("{}: {}", binary.display(), err))
        }
        _ => AppError::io(format!("{}: {}", binary.display(), err)),
    }
}

fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), AppError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_pipe(stdout));
    let stderr_reader = thread::spawn(move || read_pipe(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|err| AppError::io(err.to_string()))?
        {
            break status;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait().ok();
            return Err(AppError::CommandExecution(format!(
                "task command timed out after {timeout:?}"
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .join()
        .map_err(|_| AppError::io("stdout reader panicked"))?;
    let stderr = stderr_reader
        .join()
        .map_err(|_| AppError::io("stderr reader panicked"))?;

    Ok((status, stdout, stderr))
}

fn read_pipe<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).ok();
    }
    buffer
}
