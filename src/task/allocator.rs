use crate::math::SigmoidParams;
use crate::task::graph::BiTdGraph;
use crate::task::probability::PartitionProbability;
use crate::task::types::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Partitioning configuration shared by the allocator and the executive
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub sigmoid: SigmoidParams,
    /// Always pick a subtask, never the TAB root
    pub always_partition: bool,
    /// Always pick the TAB root, never a subtask
    pub never_partition: bool,
    /// How much less likely the most recently aborted subtask is to be picked again
    pub last_partition_bias: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            sigmoid: SigmoidParams::default(),
            always_partition: false,
            never_partition: false,
            last_partition_bias: 0.0,
        }
    }
}

/// Decides between running a TAB root whole and running one of its subtasks
#[derive(Clone, Debug)]
pub struct Partitioner {
    prob: PartitionProbability,
    config: PartitionConfig,
}

impl Partitioner {
    pub fn new(config: PartitionConfig) -> Self {
        Self {
            prob: PartitionProbability::new(config.sigmoid),
            config,
        }
    }

    /// Probability of running the TAB root unpartitioned
    pub fn partition_prob(&self, children_estimate_sum: f64, root_estimate: f64) -> f64 {
        if self.config.always_partition {
            0.0
        } else if self.config.never_partition {
            1.0
        } else {
            self.prob.calc(children_estimate_sum, root_estimate)
        }
    }

    /// Probability of choosing the first child once partitioning was decided
    pub fn child1_selection_prob(&self, last_partition: Option<TaskId>, children: [TaskId; 2]) -> f64 {
        let bias = self.config.last_partition_bias;
        match last_partition {
            Some(task) if task == children[0] => 0.5 - bias,
            Some(task) if task == children[1] => 0.5 + bias,
            _ => 0.5,
        }
    }

    /// Pick a member of `tab_id` and make it the TAB's active task.
    ///
    /// A first draw below the partition probability keeps the root; otherwise a
    /// second draw below the child-1 probability picks child 1, else child 2.
    pub fn partition<R: Rng>(
        &self,
        graph: &mut BiTdGraph,
        tab_id: TabId,
        rng: &mut R,
    ) -> Result<TaskId, TopologyError> {
        let (root, children) = {
            let tab = graph.tab(tab_id).ok_or(TopologyError::UnknownTab(tab_id))?;
            (tab.root(), tab.children())
        };
        let root_task = graph.task(root)?;
        let last_partition = root_task.last_partition;
        let children_sum =
            graph.task(children[0])?.estimate_value() + graph.task(children[1])?.estimate_value();
        let prob = self.partition_prob(children_sum, root_task.estimate_value());

        let draw: f64 = rng.random();
        let mut selection_prob = None;
        let chosen = if draw < prob {
            root
        } else {
            let child1_prob = self.child1_selection_prob(last_partition, children);
            selection_prob = Some(child1_prob);
            if rng.random::<f64>() < child1_prob {
                children[0]
            } else {
                children[1]
            }
        };

        let tab = graph
            .tab_mut(tab_id)
            .ok_or(TopologyError::UnknownTab(tab_id))?;
        tab.record_partition_prob(prob);
        if let Some(p) = selection_prob {
            tab.record_subtask_selection_prob(p);
        }
        tab.change_active(chosen)?;

        debug!(
            "TAB {} partition prob={:.4} draw={:.4} -> task {}",
            tab_id, prob, draw, chosen
        );
        Ok(chosen)
    }
}

/// Picks the next task to run according to an [`AllocPolicy`]
#[derive(Clone, Debug)]
pub struct Allocator {
    policy: AllocPolicy,
    partitioner: Partitioner,
}

impl Allocator {
    pub fn new(policy: AllocPolicy, partitioning: PartitionConfig) -> Self {
        Self {
            policy,
            partitioner: Partitioner::new(partitioning),
        }
    }

    pub fn policy(&self) -> AllocPolicy {
        self.policy
    }

    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    /// Select the next task given the task that just finished or aborted
    pub fn allocate<R: Rng>(
        &self,
        graph: &mut BiTdGraph,
        current_task: TaskId,
        rng: &mut R,
    ) -> TaskId {
        match self.policy {
            AllocPolicy::StochNbhd => self.alloc_stoch_nbhd(graph, current_task, rng),
            AllocPolicy::GreedyGlobal => Self::alloc_greedy_global(graph),
            AllocPolicy::Random => Self::alloc_random(graph, rng),
        }
    }

    /// Walk the TAB hierarchy, then partition from the active TAB.
    ///
    /// Lookup failures fall back to the tree root instead of propagating, and
    /// the root TAB becomes active again so the next cycle starts from the top.
    pub fn alloc_stoch_nbhd<R: Rng>(
        &self,
        graph: &mut BiTdGraph,
        current_task: TaskId,
        rng: &mut R,
    ) -> TaskId {
        if graph.active_tab().is_none() {
            return graph.root();
        }

        let result = self.stoch_nbhd_step(graph, current_task, rng);

        match result {
            Ok(task) => task,
            Err(e) => {
                warn!(
                    "Stochastic allocation after task {} failed, falling back to root: {}",
                    current_task, e
                );
                graph.reset_active_tab();
                graph.root()
            }
        }
    }

    fn stoch_nbhd_step<R: Rng>(
        &self,
        graph: &mut BiTdGraph,
        current_task: TaskId,
        rng: &mut R,
    ) -> Result<TaskId, TopologyError> {
        graph.active_tab_update(current_task, rng)?;
        let tab_id = graph.active_tab().ok_or(TopologyError::EmptyTree)?;
        self.partitioner.partition(graph, tab_id, rng)
    }

    /// Task with the minimum execution time estimate; ties go to the lowest id
    pub fn alloc_greedy_global(graph: &BiTdGraph) -> TaskId {
        let mut best: Option<&Task> = None;
        for task in graph.tree().tasks() {
            if best.is_none_or(|b| task.estimate_value() < b.estimate_value()) {
                best = Some(task);
            }
        }
        best.map(|task| task.id).unwrap_or_else(|| graph.root())
    }

    /// Uniformly random task
    pub fn alloc_random<R: Rng>(graph: &BiTdGraph, rng: &mut R) -> TaskId {
        rng.random_range(0..graph.tree().len())
    }
}
