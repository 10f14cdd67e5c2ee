//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Explicit path given on the command line
//! 2. Current directory: ./tabwalk.toml
//! 3. User config: ~/.tabwalk/config.toml
//! 4. Built-in defaults

use crate::{AllocConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `config_override` if given, otherwise discover configuration using the hierarchy
    pub fn load(config_override: Option<&Path>) -> Result<AllocConfig> {
        if let Some(path) = config_override {
            info!("Loading configuration from: {:?}", path);
            return AllocConfig::from_toml_file(path)
                .with_context(|| format!("Could not load configuration {:?}", path));
        }
        Self::discover_config()
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<AllocConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return AllocConfig::from_toml_file(&config_path)
                .with_context(|| format!("Could not load configuration {:?}", config_path));
        }

        info!("No configuration file found, using defaults");
        Ok(AllocConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::candidates_in(current_dir.as_deref(), home_dir.as_deref())
    }

    fn candidates_in(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = current_dir {
            candidates.push(dir.join(env::LOCAL_CONFIG_FILE_NAME));
        }
        if let Some(home) = home_dir {
            candidates.push(env::user_config_file_path(home));
        }
        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Write the default configuration into the user's home directory
    pub fn init_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        Self::create_default_user_config(&home_dir)
    }

    /// Write the default configuration under `home_dir` unless one exists
    pub fn create_default_user_config(home_dir: &Path) -> Result<PathBuf> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create configuration directory")?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if config_path.exists() {
            warn!("Configuration file already exists: {:?}", config_path);
        } else {
            AllocConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.is_file() {
                "✓ EXISTS"
            } else if candidate.exists() {
                "✗ NOT A FILE"
            } else {
                "✗ NOT FOUND"
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}
