use crate::command::SystemRunner;
use crate::error::AppError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const TASKRC_ENV_VAR: &str = "TASKRC";
pub const TASKDATA_ENV_VAR: &str = "TASKDATA";
pub const TASK_BIN_ENV_VAR: &str = "TASKBRIDGE_TASK_BIN";

const TASKRC_FILE_NAME: &str = ".taskrc";
const DATA_DIR_NAME: &str = ".task";
const TASK_BINARY_NAME: &str = "task";
const DATA_LOCATION_KEY: &str = "data.location";

/// The environment variables discovery looks at, captured once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvVars {
    pub taskrc: Option<String>,
    pub taskdata: Option<String>,
    pub task_bin: Option<String>,
    pub home: Option<String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        Self {
            taskrc: env_value(TASKRC_ENV_VAR),
            taskdata: env_value(TASKDATA_ENV_VAR),
            task_bin: env_value(TASK_BIN_ENV_VAR),
            home: env_value("HOME"),
        }
    }

    fn home_dir(&self) -> Result<PathBuf, AppError> {
        self.home
            .as_deref()
            .map(PathBuf::from)
            .ok_or_else(|| AppError::invalid_data("HOME is not set"))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Settings read from a `.taskrc` file. Later assignments win.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Taskrc {
    settings: BTreeMap<String, String>,
}

impl Taskrc {
    pub fn parse(content: &str) -> Self {
        let mut settings = BTreeMap::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("include ") || line == "include" {
                debug!(line = index + 1, "skipping taskrc include");
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!(line = index + 1, "ignoring taskrc line without `=`");
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                warn!(line = index + 1, "ignoring taskrc line with empty key");
                continue;
            }
            settings.insert(key.to_string(), value.trim().to_string());
        }

        Self { settings }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn data_location(&self) -> Option<&str> {
        self.get(DATA_LOCATION_KEY).filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

pub fn taskrc_path(explicit: Option<&Path>, env: &EnvVars) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env.taskrc.as_deref() {
        return Ok(PathBuf::from(path));
    }
    Ok(env.home_dir()?.join(TASKRC_FILE_NAME))
}

/// Reads a `.taskrc`; a missing file reads as empty settings.
pub fn load_taskrc(path: &Path) -> Result<Taskrc, AppError> {
    if !path.exists() {
        debug!(path = %path.display(), "no taskrc found");
        return Ok(Taskrc::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    Ok(Taskrc::parse(&content))
}

pub fn expand_home(value: &str, home: Option<&str>) -> PathBuf {
    match (value.strip_prefix('~'), home) {
        (Some(""), Some(home)) => PathBuf::from(home),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            PathBuf::from(home).join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(value),
    }
}

/// Explicit directory, else `TASKDATA`, else `data.location`, else `$HOME/.task`.
pub fn resolve_data_dir(
    explicit: Option<&Path>,
    taskrc: &Taskrc,
    env: &EnvVars,
) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env.taskdata.as_deref() {
        return Ok(expand_home(path, env.home.as_deref()));
    }
    if let Some(location) = taskrc.data_location() {
        return Ok(expand_home(location, env.home.as_deref()));
    }
    Ok(env.home_dir()?.join(DATA_DIR_NAME))
}

/// Explicit path, else `TASKBRIDGE_TASK_BIN`, else `task` on `PATH`.
pub fn resolve_task_binary(explicit: Option<&Path>, env: &EnvVars) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env.task_bin.as_deref() {
        return Ok(PathBuf::from(path));
    }
    which::which(TASK_BINARY_NAME)
        .map_err(|err| AppError::CommandNotFound(format!("{TASK_BINARY_NAME}: {err}")))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub taskrc: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub rc: Vec<(String, String)>,
}

/// Resolved locations and process policy for talking to the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub taskrc_path: PathBuf,
    pub taskrc: Taskrc,
    pub data_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub rc: Vec<(String, String)>,
}

impl ClientSettings {
    pub fn resolve(overrides: &SettingsOverrides, env: &EnvVars) -> Result<Self, AppError> {
        let taskrc_path = taskrc_path(overrides.taskrc.as_deref(), env)?;
        let taskrc = load_taskrc(&taskrc_path)?;
        let data_dir = resolve_data_dir(overrides.data_dir.as_deref(), &taskrc, env)?;

        debug!(
            taskrc = %taskrc_path.display(),
            data_dir = %data_dir.display(),
            settings = taskrc.len(),
            "resolved client settings"
        );

        Ok(Self {
            taskrc_path,
            taskrc,
            data_dir,
            timeout: overrides.timeout,
            rc: overrides.rc.clone(),
        })
    }

    /// A runner for `binary` that sees the resolved `TASKRC` and `TASKDATA`.
    pub fn runner(&self, binary: PathBuf) -> SystemRunner {
        let mut runner = SystemRunner::new(binary)
            .with_env(TASKRC_ENV_VAR, self.taskrc_path.as_os_str())
            .with_env(TASKDATA_ENV_VAR, self.data_dir.as_os_str());
        for (key, value) in &self.rc {
            runner = runner.with_rc_override(key.as_str(), value.as_str());
        }
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }
        runner
    }
}
