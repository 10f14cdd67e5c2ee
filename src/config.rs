//! Allocation engine configuration.
//!
//! A single TOML document describes the task topology, the parameters of every
//! probability model, and the executive policies. Every section has defaults, so
//! an empty document yields a working demo topology.

use crate::math::SigmoidParams;
use crate::task::{
    AbortParams, AllocPolicy, Allocator, BiTdGraph, Executive, ExecutiveConfig, PartitionConfig,
    TabInitPolicy, Taskable, TaskSpec, TopologyError,
};
use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Executive policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutivePolicyConfig {
    pub update_exec_ests: bool,
    pub alloc_policy: AllocPolicy,
    pub tab_init_policy: TabInitPolicy,
}

impl Default for ExecutivePolicyConfig {
    fn default() -> Self {
        Self {
            update_exec_ests: true,
            alloc_policy: AllocPolicy::StochNbhd,
            tab_init_policy: TabInitPolicy::Root,
        }
    }
}

/// Execution time estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// EMA smoothing factor for tasks that do not set their own
    pub alpha: f64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self { alpha: 0.8 }
    }
}

/// One task of the decomposition. The first definition is the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDef {
    pub name: String,
    /// Names of the two subtasks; empty for leaf tasks
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub initial_estimate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    /// Timesteps the simulated mechanism needs to finish this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl TaskDef {
    pub fn leaf(name: impl Into<String>, initial_estimate: f64) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            initial_estimate,
            alpha: None,
            duration: None,
        }
    }

    pub fn bifurcating(
        name: impl Into<String>,
        initial_estimate: f64,
        children: [&str; 2],
    ) -> Self {
        Self {
            children: children.iter().map(|c| c.to_string()).collect(),
            ..Self::leaf(name, initial_estimate)
        }
    }

    pub fn with_duration(mut self, duration: u64) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Complete allocation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocConfig {
    /// Base RNG seed; agent `n` uses `seed + n`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub executive: ExecutivePolicyConfig,
    pub estimation: EstimationConfig,
    pub abort: AbortParams,
    pub partitioning: PartitionConfig,
    pub tab_switch: SigmoidParams,
    pub tasks: Vec<TaskDef>,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            seed: None,
            executive: ExecutivePolicyConfig::default(),
            estimation: EstimationConfig::default(),
            abort: AbortParams::default(),
            partitioning: PartitionConfig::default(),
            tab_switch: SigmoidParams::default(),
            tasks: vec![
                TaskDef::bifurcating("collect", 40.0, ["harvest", "cache_drop"]).with_duration(30),
                TaskDef::bifurcating("harvest", 25.0, ["forage", "transport"]).with_duration(20),
                TaskDef::leaf("cache_drop", 15.0).with_duration(12),
                TaskDef::leaf("forage", 10.0).with_duration(8),
                TaskDef::leaf("transport", 10.0).with_duration(14),
            ],
        }
    }
}

impl AllocConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Check parameter ranges that the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            bail!("At least one task must be defined");
        }

        let alpha = self.estimation.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            bail!("estimation.alpha must be in (0, 1], got {}", alpha);
        }
        for task in &self.tasks {
            if let Some(alpha) = task.alpha {
                if !(alpha > 0.0 && alpha <= 1.0) {
                    bail!("alpha of task '{}' must be in (0, 1], got {}", task.name, alpha);
                }
            }
            if !(task.initial_estimate.is_finite() && task.initial_estimate >= 0.0) {
                bail!(
                    "initial_estimate of task '{}' must be finite and not negative, got {}",
                    task.name,
                    task.initial_estimate
                );
            }
        }

        check_curve("abort", self.abort.reactivity, self.abort.offset, self.abort.gamma)?;
        let sigmoid = &self.partitioning.sigmoid;
        check_curve("partitioning.sigmoid", sigmoid.reactivity, sigmoid.offset, sigmoid.gamma)?;
        let sigmoid = &self.tab_switch;
        check_curve("tab_switch", sigmoid.reactivity, sigmoid.offset, sigmoid.gamma)?;

        let min_prob = self.abort.min_prob;
        if !(min_prob > 0.0 && min_prob < 1.0) {
            bail!("abort.min_prob must be in (0, 1), got {}", min_prob);
        }

        let bias = self.partitioning.last_partition_bias;
        if !(0.0..0.5).contains(&bias) {
            bail!("partitioning.last_partition_bias must be in [0, 0.5), got {}", bias);
        }
        if self.partitioning.always_partition && self.partitioning.never_partition {
            bail!("always_partition and never_partition are mutually exclusive");
        }

        Ok(())
    }

    fn task_spec(&self, def: &TaskDef) -> TaskSpec {
        TaskSpec::new(def.name.clone(), def.alpha.unwrap_or(self.estimation.alpha))
            .with_initial_estimate(def.initial_estimate)
    }

    /// Build the decomposition graph described by `tasks`
    pub fn build_graph(&self) -> Result<BiTdGraph, TopologyError> {
        let (root, rest) = self.tasks.split_first().ok_or(TopologyError::EmptyTree)?;

        let mut graph = BiTdGraph::new(self.task_spec(root), self.tab_switch)?;
        for def in rest {
            graph.add_task(self.task_spec(def))?;
        }

        for def in &self.tasks {
            if def.children.is_empty() {
                continue;
            }
            let parent = graph
                .tree()
                .id_of(&def.name)
                .ok_or_else(|| TopologyError::UnknownName(def.name.clone()))?;
            let children = def
                .children
                .iter()
                .map(|name| {
                    graph
                        .tree()
                        .id_of(name)
                        .ok_or_else(|| TopologyError::UnknownName(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            graph.set_children(parent, &children)?;
        }

        graph.validate()?;
        info!(
            "Built decomposition graph with {} tasks and {} TABs",
            graph.tree().len(),
            graph.tabs().len()
        );
        Ok(graph)
    }

    /// Build a ready-to-run executive around `rng` and per-task mechanisms
    pub fn build_executive<R: Rng>(
        &self,
        mut rng: R,
        mechanisms: Vec<Box<dyn Taskable + Send>>,
    ) -> Result<Executive<R>> {
        self.validate()?;
        let mut graph = self.build_graph().context("Invalid task topology")?;
        graph.init_active_tab(self.executive.tab_init_policy, &mut rng);

        let allocator = Allocator::new(self.executive.alloc_policy, self.partitioning.clone());
        let executive_config = ExecutiveConfig {
            update_exec_ests: self.executive.update_exec_ests,
            abort: self.abort,
        };

        Ok(Executive::new(graph, allocator, executive_config, rng, mechanisms)?)
    }
}

fn check_curve(section: &str, reactivity: f64, offset: f64, gamma: f64) -> Result<()> {
    for (field, value) in [("reactivity", reactivity), ("offset", offset), ("gamma", gamma)] {
        if !value.is_finite() {
            bail!("{}.{} must be finite, got {}", section, field, value);
        }
    }
    Ok(())
}
