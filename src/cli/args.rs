//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: Simulate one or more agents allocating tasks
//! - `show-config`: Print the effective configuration as TOML
//! - `show-discovery`: Show configuration discovery information
//! - `init-config`: Write the default configuration to the user config directory

use crate::env;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    ShowConfig { config_override: Option<PathBuf> },
    ShowDiscovery,
    InitConfig,
}

#[derive(Debug)]
pub struct RunConfig {
    pub config_override: Option<PathBuf>,
    pub steps: u64,
    pub agents: usize,
    pub seed: Option<u64>,
    pub json: bool,
    pub trace: bool,
}

#[derive(Debug, Parser)]
#[command(name = "tabwalk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stochastic hierarchical task allocation over bifurcating task graphs")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Simulate agents running the allocation engine
    Run {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Timesteps to simulate per agent
        #[arg(short = 's', long = "steps", default_value_t = env::simulation::DEFAULT_STEPS)]
        steps: u64,
        /// Number of independent agents
        #[arg(short = 'a', long = "agents", default_value_t = 1)]
        agents: usize,
        /// Base RNG seed, overriding the configuration
        #[arg(long = "seed")]
        seed: Option<u64>,
        /// Print summaries as JSON lines
        #[arg(long = "json")]
        json: bool,
        /// Print every timestep report as a JSON line
        #[arg(long = "trace")]
        trace: bool,
    },
    /// Print the effective configuration as TOML
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowDiscovery,
    /// Write the default configuration to ~/.tabwalk/config.toml
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                config,
                steps,
                agents,
                seed,
                json,
                trace,
            }) => {
                if *agents == 0 {
                    return Err("At least one agent is required".to_string());
                }
                Ok(ExecutionMode::Run(RunConfig {
                    config_override: config.clone(),
                    steps: *steps,
                    agents: *agents,
                    seed: *seed,
                    json: *json,
                    trace: *trace,
                }))
            }
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            Some(Commands::ShowDiscovery) => Ok(ExecutionMode::ShowDiscovery),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'tabwalk --help' to see available commands.".to_string(),
            ),
        }
    }
}
