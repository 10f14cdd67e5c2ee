//! # tabwalk
//!
//! Stochastic hierarchical task allocation for autonomous agents.
//!
//! A task is described as a bifurcating decomposition tree: every composite
//! task splits into exactly two subtasks. Each composite task together with its
//! two children forms a task allocation block (TAB). An agent keeps one TAB
//! active and, whenever a task finishes or is aborted, walks the TAB hierarchy
//! up or down and decides stochastically whether to run the TAB root whole or
//! one of its subtasks. All decisions are driven by sigmoid probabilities over
//! ratios of exponentially smoothed execution time estimates.
//!
//! ## Modules
//!
//! - **[`math`]**: EMA time estimates and the sigmoid building block
//! - **[`task`]**: Task tree, TABs, decomposition graph, allocator and executive
//! - **[`config`]**: TOML configuration of topology, probability models and policies
//! - **[`simulation`]**: Simulated task mechanisms and a per-agent driver
//! - **[`cli`]**: Command line parsing and configuration discovery
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tabwalk::{AllocConfig, Simulation};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AllocConfig {
//!         seed: Some(42),
//!         ..Default::default()
//!     };
//!     let simulation = Simulation::new(config)?;
//!     let run = simulation.run_agent(0, 500)?;
//!     for (name, summary) in &run.tasks {
//!         println!("{}: {} completed, {} aborted", name, summary.completed, summary.aborted);
//!     }
//!
//!     // Or drive an executive directly
//!     let mut executive = simulation.build_agent(1)?;
//!     let report = executive.run_timestep();
//!     println!("step {} ran '{}'", report.step, report.task_name);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod env;
pub mod math;
pub mod simulation;
pub mod task;

pub use config::{AllocConfig, EstimationConfig, ExecutivePolicyConfig, TaskDef};
pub use math::{Sigmoid, SigmoidParams, TimeEstimate};
pub use simulation::{AgentRun, SimulatedTask, Simulation, TaskSummary};
pub use task::{
    AllocPolicy, Allocator, BiTdGraph, CycleReport, Executive, ExecutiveError, ExecutiveState,
    TabInitPolicy, Task, TaskId, TaskSpec, TaskTree, Taskable, TopologyError,
};
