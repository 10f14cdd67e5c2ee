use crate::task::allocator::Allocator;
use crate::task::graph::{BiTdGraph, SwitchProbs};
use crate::task::probability::{AbortParams, AbortProbability};
use crate::task::types::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Capability that actually carries out a task on behalf of the executive
pub trait Taskable {
    /// Advance the task by one timestep
    fn execute(&mut self);

    /// Whether the task has finished
    fn is_finished(&self) -> bool;

    /// Prepare the task to be executed again from scratch
    fn reset(&mut self) {}
}

/// Where the executive is in its allocate/execute cycle
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state", content = "task")]
pub enum ExecutiveState {
    Idle,
    Allocating,
    Executing(TaskId),
    Completed(TaskId),
    Aborted(TaskId),
}

/// Executive configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutiveConfig {
    /// Fold measured execution times into task estimates on completion
    pub update_exec_ests: bool,
    pub abort: AbortParams,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            update_exec_ests: true,
            abort: AbortParams::default(),
        }
    }
}

/// Snapshot of one executive timestep for external metrics collection
#[derive(Serialize, Clone, Debug)]
pub struct CycleReport {
    pub step: u64,
    pub task: TaskId,
    pub task_name: String,
    pub state: ExecutiveState,
    pub elapsed: u64,
    pub active_tab_root: Option<TaskId>,
    pub abort_prob: f64,
    pub partition_prob: Option<f64>,
    pub switch_probs: Option<SwitchProbs>,
}

/// Drives allocation and execution of tasks for a single agent.
///
/// Each executive owns its graph, RNG and task mechanisms; nothing is shared
/// between instances.
pub struct Executive<R: Rng> {
    graph: BiTdGraph,
    allocator: Allocator,
    abort: AbortProbability,
    update_exec_ests: bool,
    rng: R,
    mechanisms: Vec<Box<dyn Taskable + Send>>,
    state: ExecutiveState,
    current: Option<TaskId>,
    last: Option<TaskId>,
    elapsed: u64,
    step: u64,
    last_abort_prob: f64,
}

impl<R: Rng> Executive<R> {
    /// Create an executive; `mechanisms` is indexed by task id
    pub fn new(
        graph: BiTdGraph,
        allocator: Allocator,
        config: ExecutiveConfig,
        rng: R,
        mechanisms: Vec<Box<dyn Taskable + Send>>,
    ) -> Result<Self, ExecutiveError> {
        graph.validate()?;
        if mechanisms.len() != graph.tree().len() {
            return Err(ExecutiveError::MechanismCount {
                count: mechanisms.len(),
                tasks: graph.tree().len(),
            });
        }

        info!(
            "Executive ready: {} tasks, {} TABs, policy {:?}",
            graph.tree().len(),
            graph.tabs().len(),
            allocator.policy()
        );

        Ok(Self {
            graph,
            allocator,
            abort: AbortProbability::new(config.abort),
            update_exec_ests: config.update_exec_ests,
            rng,
            mechanisms,
            state: ExecutiveState::Idle,
            current: None,
            last: None,
            elapsed: 0,
            step: 0,
            last_abort_prob: 0.0,
        })
    }

    pub fn graph(&self) -> &BiTdGraph {
        &self.graph
    }

    pub fn state(&self) -> ExecutiveState {
        self.state
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current
    }

    pub fn last_task(&self) -> Option<TaskId> {
        self.last
    }

    pub fn last_abort_prob(&self) -> f64 {
        self.last_abort_prob
    }

    /// Choose the task to run after `last_task`, or the first task if there is none
    pub fn get_next_task(&mut self, last_task: Option<TaskId>) -> TaskId {
        match last_task {
            None => self.get_first_task(),
            Some(task) => self
                .allocator
                .allocate(&mut self.graph, task, &mut self.rng),
        }
    }

    fn get_first_task(&mut self) -> TaskId {
        let root = self.graph.root();
        let Some(tab_id) = self.graph.active_tab() else {
            return root;
        };

        match self
            .allocator
            .partitioner()
            .partition(&mut self.graph, tab_id, &mut self.rng)
        {
            Ok(task) => task,
            Err(e) => {
                warn!("First allocation failed, falling back to root: {}", e);
                root
            }
        }
    }

    /// Run one timestep: allocate if nothing is running, then abort-check and
    /// execute the current task.
    pub fn run_timestep(&mut self) -> CycleReport {
        self.step += 1;

        let task = match self.state {
            ExecutiveState::Executing(task) => task,
            _ => self.allocate(),
        };

        let estimate = self
            .graph
            .task(task)
            .map(|t| t.estimate_value())
            .unwrap_or(0.0);
        self.last_abort_prob = self.abort.calc(self.elapsed as f64, estimate);

        if self.rng.random::<f64>() < self.last_abort_prob {
            self.finish(task, true);
        } else {
            let mechanism = &mut self.mechanisms[task];
            mechanism.execute();
            self.elapsed += 1;
            if mechanism.is_finished() {
                self.finish(task, false);
            }
        }

        self.report(task)
    }

    /// Abort the running task on behalf of the execution mechanism
    pub fn abort_current(&mut self) -> Option<TaskId> {
        match self.state {
            ExecutiveState::Executing(task) => {
                self.finish(task, true);
                Some(task)
            }
            _ => None,
        }
    }

    fn allocate(&mut self) -> TaskId {
        self.state = ExecutiveState::Allocating;
        let task = self.get_next_task(self.last);
        self.mechanisms[task].reset();
        self.elapsed = 0;
        self.current = Some(task);
        self.state = ExecutiveState::Executing(task);
        debug!("Allocated task {}", task);
        task
    }

    fn finish(&mut self, task: TaskId, aborted: bool) {
        let measured = self.elapsed as f64;
        let update = self.update_exec_ests && !aborted;
        if let Err(e) = self.graph.record_exec_time(task, measured, update) {
            warn!("Could not record execution time for task {}: {}", task, e);
        }

        if aborted {
            self.graph.on_abort(task);
            self.state = ExecutiveState::Aborted(task);
            debug!("Task {} aborted after {} steps", task, self.elapsed);
        } else {
            self.state = ExecutiveState::Completed(task);
            debug!("Task {} completed in {} steps", task, self.elapsed);
        }
        self.current = None;
        self.last = Some(task);
    }

    fn report(&self, task: TaskId) -> CycleReport {
        let active = self.graph.active();
        CycleReport {
            step: self.step,
            task,
            task_name: self
                .graph
                .task(task)
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            state: self.state,
            elapsed: self.elapsed,
            active_tab_root: active.map(|tab| tab.root()),
            abort_prob: self.last_abort_prob,
            partition_prob: active.and_then(|tab| tab.last_partition_prob()),
            switch_probs: self.graph.last_switch_probs(),
        }
    }
}
