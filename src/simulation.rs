//! Simulated execution mechanisms and a per-agent driver loop.
//!
//! Each agent gets its own executive, RNG and mechanisms built from the same
//! configuration, so agents can run on separate threads without sharing state.

use crate::config::AllocConfig;
use crate::env;
use crate::task::{CycleReport, Executive, ExecutiveState, Taskable};
use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Mechanism that finishes after a fixed number of timesteps
#[derive(Debug, Clone)]
pub struct SimulatedTask {
    duration: u64,
    progress: u64,
}

impl SimulatedTask {
    pub fn new(duration: u64) -> Self {
        Self {
            duration: duration.max(1),
            progress: 0,
        }
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }
}

impl Taskable for SimulatedTask {
    fn execute(&mut self) {
        self.progress += 1;
    }

    fn is_finished(&self) -> bool {
        self.progress >= self.duration
    }

    fn reset(&mut self) {
        self.progress = 0;
    }
}

/// Per-task outcome counts for one agent
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskSummary {
    pub completed: u64,
    pub aborted: u64,
    pub final_estimate: f64,
}

/// Result of running one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub agent: usize,
    pub seed: u64,
    pub steps: u64,
    pub tasks: BTreeMap<String, TaskSummary>,
    /// Per-timestep reports; empty unless the run was traced
    #[serde(skip)]
    pub reports: Vec<CycleReport>,
}

/// Builds and drives independent per-agent executives from one configuration
#[derive(Debug, Clone)]
pub struct Simulation {
    config: AllocConfig,
    base_seed: u64,
}

impl Simulation {
    pub fn new(config: AllocConfig) -> Result<Self> {
        config.validate()?;
        let base_seed = config.seed.unwrap_or_else(rand::random::<u64>);
        info!("Simulation base seed {}", base_seed);
        Ok(Self { config, base_seed })
    }

    pub fn config(&self) -> &AllocConfig {
        &self.config
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn agent_seed(&self, agent: usize) -> u64 {
        self.base_seed.wrapping_add(agent as u64)
    }

    /// Build the executive for `agent`, seeded deterministically from the base seed
    pub fn build_agent(&self, agent: usize) -> Result<Executive<StdRng>> {
        let mechanisms = self
            .config
            .tasks
            .iter()
            .map(|def| {
                let duration = def
                    .duration
                    .unwrap_or(env::simulation::DEFAULT_TASK_DURATION);
                Box::new(SimulatedTask::new(duration)) as Box<dyn Taskable + Send>
            })
            .collect();

        let rng = StdRng::seed_from_u64(self.agent_seed(agent));
        self.config.build_executive(rng, mechanisms)
    }

    /// Run `agent` for `steps` timesteps, keeping only per-task counters
    pub fn run_agent(&self, agent: usize, steps: u64) -> Result<AgentRun> {
        self.run(agent, steps, false)
    }

    /// Run `agent` for `steps` timesteps and keep every timestep report
    pub fn run_agent_traced(&self, agent: usize, steps: u64) -> Result<AgentRun> {
        self.run(agent, steps, true)
    }

    fn run(&self, agent: usize, steps: u64, keep_reports: bool) -> Result<AgentRun> {
        let mut executive = self.build_agent(agent)?;
        let mut counts = vec![TaskSummary::default(); executive.graph().tree().len()];
        let mut reports = Vec::new();

        for _ in 0..steps {
            let report = executive.run_timestep();
            match report.state {
                ExecutiveState::Completed(task) => {
                    if let Some(summary) = counts.get_mut(task) {
                        summary.completed += 1;
                    }
                }
                ExecutiveState::Aborted(task) => {
                    if let Some(summary) = counts.get_mut(task) {
                        summary.aborted += 1;
                    }
                }
                _ => {}
            }
            if keep_reports {
                reports.push(report);
            }
        }

        let tasks = executive
            .graph()
            .tree()
            .tasks()
            .iter()
            .zip(counts)
            .map(|(task, mut summary)| {
                summary.final_estimate = task.estimate_value();
                (task.name.clone(), summary)
            })
            .collect();

        debug!("Agent {} finished {} steps", agent, steps);
        Ok(AgentRun {
            agent,
            seed: self.agent_seed(agent),
            steps,
            tasks,
            reports,
        })
    }
}
