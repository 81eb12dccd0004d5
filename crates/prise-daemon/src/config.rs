use std::path::PathBuf;

use prise_paths::PrisePaths;
use serde::{Deserialize, Serialize};

use crate::errors::DaemonError;

/// Daemon-specific configuration, read from the `[daemon]` and `[shell]`
/// tables of `<config_dir>/prise/config.toml` (§B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_scrollback_bytes")]
    pub scrollback_bytes: usize,
    #[serde(default = "default_redraw_high_water")]
    pub redraw_high_water: usize,
    #[serde(default = "default_redraw_low_water")]
    pub redraw_low_water: usize,
    #[serde(default = "default_disconnect_timeout_secs")]
    pub disconnect_timeout_secs: u64,
    #[serde(default = "default_reap_timeout_secs")]
    pub reap_timeout_secs: u64,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,
    #[serde(default)]
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell_program(),
            args: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Rejects degenerate values: zero intervals and an inverted water-mark
    /// pair are caught here rather than discovered at runtime.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.frame_interval_ms == 0 {
            return Err(DaemonError::ConfigInvalid(
                "frame_interval_ms must be > 0".to_string(),
            ));
        }
        if self.redraw_low_water >= self.redraw_high_water {
            return Err(DaemonError::ConfigInvalid(
                "redraw_low_water must be < redraw_high_water".to_string(),
            ));
        }
        if self.scrollback_bytes == 0 {
            return Err(DaemonError::ConfigInvalid(
                "scrollback_bytes must be > 0".to_string(),
            ));
        }
        if self.read_chunk_bytes == 0 {
            return Err(DaemonError::ConfigInvalid(
                "read_chunk_bytes must be > 0".to_string(),
            ));
        }
        if self.disconnect_timeout_secs == 0 {
            return Err(DaemonError::ConfigInvalid(
                "disconnect_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            scrollback_bytes: default_scrollback_bytes(),
            redraw_high_water: default_redraw_high_water(),
            redraw_low_water: default_redraw_low_water(),
            disconnect_timeout_secs: default_disconnect_timeout_secs(),
            reap_timeout_secs: default_reap_timeout_secs(),
            frame_interval_ms: default_frame_interval_ms(),
            read_chunk_bytes: default_read_chunk_bytes(),
            shell: ShellConfig::default(),
        }
    }
}

fn default_scrollback_bytes() -> usize {
    1_048_576
}

/// §4.5: "default 1 MiB" high-water mark.
fn default_redraw_high_water() -> usize {
    1_048_576
}

fn default_redraw_low_water() -> usize {
    262_144
}

/// §4.3/§7: "default 30 s" reap timeout.
fn default_reap_timeout_secs() -> u64 {
    30
}

fn default_disconnect_timeout_secs() -> u64 {
    10
}

/// §4.6: "8 ms ≈ 120 Hz cap".
fn default_frame_interval_ms() -> u64 {
    8
}

/// §4.3: "chunks up to a configured ceiling (e.g. 64 KiB)".
fn default_read_chunk_bytes() -> usize {
    64 * 1024
}

fn default_shell_program() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    daemon: DaemonConfig,
}

/// Load `<config_dir>/prise/config.toml`. Missing file or missing `[daemon]`
/// section falls back to documented defaults; a parse error is logged and
/// also falls back.
pub fn load_daemon_config(paths: &PrisePaths) -> Result<DaemonConfig, DaemonError> {
    let config_path: PathBuf = paths.config_file();
    let config = match std::fs::read_to_string(&config_path) {
        Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
            Ok(file) => file.daemon,
            Err(e) => {
                tracing::warn!(
                    event = "daemon.config.parse_failed",
                    path = %config_path.display(),
                    error = %e,
                );
                DaemonConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DaemonConfig::default(),
        Err(e) => {
            tracing::warn!(
                event = "daemon.config.read_failed",
                path = %config_path.display(),
                error = %e,
            );
            DaemonConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}
