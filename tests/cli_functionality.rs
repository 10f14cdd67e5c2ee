//! Integration tests for CLI functionality
//!
//! These tests verify that argument parsing and configuration loading work together.
//! Unit tests for individual functions are located in the respective module files.

use clap::Parser;
use std::fs;
use tabwalk::cli::{Args, ConfigDiscovery, ExecutionMode};
use tabwalk::{AllocPolicy, Simulation};
use tempfile::TempDir;

#[test]
fn test_run_mode_loads_config_override() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("swarm.toml");
    fs::write(
        &config_path,
        "seed = 5\n\n[executive]\nalloc_policy = \"greedy_global\"\n",
    )
    .unwrap();

    let args = Args::try_parse_from([
        "tabwalk",
        "run",
        "--config",
        config_path.to_str().unwrap(),
        "--steps",
        "25",
    ])
    .unwrap();

    let ExecutionMode::Run(run) = args.mode().unwrap() else {
        panic!("Expected Run mode");
    };
    let config = ConfigDiscovery::load(run.config_override.as_deref()).unwrap();
    assert_eq!(config.seed, Some(5));
    assert_eq!(config.executive.alloc_policy, AllocPolicy::GreedyGlobal);

    let agent_run = Simulation::new(config)
        .unwrap()
        .run_agent_traced(0, run.steps)
        .unwrap();
    assert_eq!(agent_run.reports.len(), 25);
}

#[test]
fn test_show_config_mode() {
    let args = Args::try_parse_from(["tabwalk", "show-config", "-c", "custom.toml"]).unwrap();
    match args.mode().unwrap() {
        ExecutionMode::ShowConfig { config_override } => {
            assert_eq!(config_override.unwrap().to_str(), Some("custom.toml"));
        }
        other => panic!("Expected ShowConfig mode, got {:?}", other),
    }
}

#[test]
fn test_agent_run_serializes_without_reports() {
    let config = tabwalk::AllocConfig {
        seed: Some(12),
        ..Default::default()
    };
    let run = Simulation::new(config).unwrap().run_agent_traced(0, 50).unwrap();
    let json = serde_json::to_value(&run).unwrap();

    assert_eq!(json["seed"], 12);
    assert!(json.get("reports").is_none());
    assert!(json["tasks"]["collect"]["completed"].is_u64());

    let report = serde_json::to_value(&run.reports[0]).unwrap();
    assert_eq!(report["step"], 1);
    assert!(report["state"]["state"].is_string());
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Args::try_parse_from(["tabwalk", "launch"]).is_err());
}
