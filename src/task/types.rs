use crate::math::TimeEstimate;
use serde::{Deserialize, Serialize};

/// Stable index of a task inside its [`TaskTree`](crate::task::TaskTree)
pub type TaskId = usize;

/// Index of a task allocation block inside its [`BiTdGraph`](crate::task::BiTdGraph)
pub type TabId = usize;

/// Decomposition shape of a task
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Directly executable, cannot be partitioned
    Leaf,
    /// Decomposes into exactly two subtasks
    Bifurcating { children: [TaskId; 2] },
}

/// Description of a task before it is inserted into a tree
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    /// EMA smoothing factor for the execution time estimate
    pub alpha: f64,
    /// Starting value of the execution time estimate
    pub initial_estimate: f64,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, alpha: f64) -> Self {
        Self {
            name: name.into(),
            alpha,
            initial_estimate: 0.0,
        }
    }

    pub fn with_initial_estimate(mut self, estimate: f64) -> Self {
        self.initial_estimate = estimate;
        self
    }
}

/// A node of the task decomposition tree.
///
/// The root task is its own parent. Tasks are never removed once inserted.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub parent: TaskId,
    pub kind: TaskKind,
    pub estimate: TimeEstimate,
    /// Duration of the most recent completed or aborted execution
    pub last_exec_time: f64,
    /// Child most recently aborted after being chosen through partitioning
    pub last_partition: Option<TaskId>,
}

impl Task {
    pub(crate) fn new(id: TaskId, spec: TaskSpec) -> Self {
        Self {
            id,
            name: spec.name,
            parent: id,
            kind: TaskKind::Leaf,
            estimate: TimeEstimate::with_initial(spec.alpha, spec.initial_estimate),
            last_exec_time: 0.0,
            last_partition: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TaskKind::Leaf)
    }

    pub fn is_partitionable(&self) -> bool {
        !self.is_leaf()
    }

    pub fn children(&self) -> Option<[TaskId; 2]> {
        match self.kind {
            TaskKind::Leaf => None,
            TaskKind::Bifurcating { children } => Some(children),
        }
    }

    pub fn has_parent(&self) -> bool {
        self.parent != self.id
    }

    /// Current execution time estimate
    pub fn estimate_value(&self) -> f64 {
        self.estimate.value()
    }

    /// Record a measured execution duration, folding it into the estimate when asked to
    pub fn record_exec_time(&mut self, measured: f64, update_estimate: bool) {
        self.last_exec_time = measured;
        if update_estimate {
            self.estimate.update(measured);
        }
    }
}

/// Malformed task decomposition. Fatal at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("Bifurcating task needs exactly 2 children, got {count}")]
    NotBifurcating { count: usize },

    #[error("Unknown task id {0}")]
    UnknownTask(TaskId),

    #[error("Unknown task name '{0}'")]
    UnknownName(String),

    #[error("Duplicate task name '{0}'")]
    DuplicateName(String),

    #[error("Task {child} already has parent {parent}")]
    AlreadyParented { child: TaskId, parent: TaskId },

    #[error("Task {0} cannot be its own child")]
    SelfChild(TaskId),

    #[error("Making {child} a child of {parent} would create a cycle")]
    Cycle { parent: TaskId, child: TaskId },

    #[error("Task {0} already has children")]
    AlreadyBifurcating(TaskId),

    #[error("Unknown TAB id {0}")]
    UnknownTab(TabId),

    #[error("Task {task} has no TAB below TAB {tab}")]
    NoTabChild { tab: TabId, task: TaskId },

    #[error("TAB {0} has more than one parent TAB")]
    MultipleTabParents(TabId),

    #[error("Task {0} is not reachable from the root")]
    Disconnected(TaskId),

    #[error("Task {task} is not a member of TAB {tab}")]
    NotInTab { tab: TabId, task: TaskId },

    #[error("Task tree is empty")]
    EmptyTree,

    #[error(transparent)]
    Tab(#[from] TabError),
}

/// Errors raised by a single task allocation block
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TabError {
    #[error("Task {task} is not a member of the TAB rooted at {tab_root}")]
    InvalidMember { tab_root: TaskId, task: TaskId },
}

/// Errors raised while wiring an executive to its task mechanisms
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutiveError {
    #[error("{count} mechanisms given for {tasks} tasks")]
    MechanismCount { count: usize, tasks: usize },

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Which policy the allocator uses to pick the next task
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocPolicy {
    /// Biased random walk over TAB depth plus partitioning
    #[default]
    StochNbhd,
    /// Task with the smallest execution time estimate
    GreedyGlobal,
    /// Uniform choice over all tasks
    Random,
}

/// How the graph chooses its first active TAB
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TabInitPolicy {
    #[default]
    Root,
    Random,
    MaxDepth,
}
