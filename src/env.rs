//! Environment constants and path utilities.
//!
//! Centralizes file names and defaults shared by the CLI, configuration
//! discovery and the simulation driver.

use std::path::{Path, PathBuf};

/// Configuration file looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "tabwalk.toml";

/// Per-user application directory name
pub const APP_DIR_NAME: &str = ".tabwalk";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "tabwalk=info";

/// Simulation defaults
pub mod simulation {
    /// Timesteps a simulated task needs when its definition gives no duration
    pub const DEFAULT_TASK_DURATION: u64 = 10;

    /// Timesteps simulated per agent when none are requested
    pub const DEFAULT_STEPS: u64 = 1000;
}

/// Build the per-user application directory path from a home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(APP_DIR_NAME)
}

/// Build the per-user configuration file path from a home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}
