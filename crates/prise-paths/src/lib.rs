use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathsError {
    #[error("no_home_directory: $HOME is not set and no platform home directory is available")]
    NoHomeDirectory,
}

/// Centralized path construction for prise's on-disk layout.
///
/// Single source of truth for the socket path, the session-persistence
/// directory, and the user config file. Use [`PrisePaths::resolve`] in
/// production code and [`PrisePaths::from_dirs`] in tests.
#[derive(Debug, Clone)]
pub struct PrisePaths {
    runtime_dir: PathBuf,
    state_dir: PathBuf,
    config_dir: PathBuf,
    socket_override: Option<PathBuf>,
}

impl PrisePaths {
    /// Resolve paths from the platform's runtime/state/config directories.
    ///
    /// `runtime_dir` prefers the platform runtime directory (`$XDG_RUNTIME_DIR`
    /// on Linux) and falls back to `$HOME/.cache/prise` per the wire contract
    /// in the external-interfaces section. `PRISE_SOCKET` overrides the
    /// socket path entirely when set.
    pub fn resolve() -> Result<Self, PathsError> {
        let home = dirs::home_dir().ok_or(PathsError::NoHomeDirectory)?;
        let runtime_dir = dirs::runtime_dir().unwrap_or_else(|| home.join(".cache").join("prise"));
        let state_dir = dirs::cache_dir()
            .map(|d| d.join("prise"))
            .unwrap_or_else(|| home.join(".cache").join("prise"));
        let config_dir = dirs::config_dir()
            .map(|d| d.join("prise"))
            .unwrap_or_else(|| home.join(".config").join("prise"));
        let socket_override = env::var_os("PRISE_SOCKET").map(PathBuf::from);
        Ok(Self {
            runtime_dir,
            state_dir,
            config_dir,
            socket_override,
        })
    }

    /// Build paths from explicit directories. Use in tests.
    pub fn from_dirs(runtime_dir: PathBuf, state_dir: PathBuf, config_dir: PathBuf) -> Self {
        Self {
            runtime_dir,
            state_dir,
            config_dir,
            socket_override: None,
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// `<runtime_dir>/prise.sock`, or `$PRISE_SOCKET` when set.
    pub fn socket_path(&self) -> PathBuf {
        self.socket_override
            .clone()
            .unwrap_or_else(|| self.runtime_dir.join("prise.sock"))
    }

    /// `<runtime_dir>/prise.pid`.
    pub fn pid_file(&self) -> PathBuf {
        self.runtime_dir.join("prise.pid")
    }

    /// `<state_dir>/prise/sessions`.
    pub fn sessions_dir(&self) -> PathBuf {
        self.state_dir.join("prise").join("sessions")
    }

    /// `<state_dir>/prise/sessions/<name>.json`. The basename is the session
    /// name; `.json` is mandatory.
    pub fn session_file(&self, name: &str) -> PathBuf {
        self.sessions_dir().join(format!("{name}.json"))
    }

    /// `<config_dir>/config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}
