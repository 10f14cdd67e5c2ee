use crate::task::types::*;
use serde::Serialize;

/// Task allocation block: a composite task and its two subtasks.
///
/// Exactly one member is active once the block has been used; `last` holds the
/// previously active member.
#[derive(Serialize, Clone, Debug)]
pub struct Tab {
    root: TaskId,
    child1: TaskId,
    child2: TaskId,
    active: Option<TaskId>,
    last: Option<TaskId>,
    last_partition_prob: Option<f64>,
    last_subtask_selection_prob: Option<f64>,
}

impl Tab {
    pub(crate) fn new(root: TaskId, children: [TaskId; 2]) -> Self {
        Self {
            root,
            child1: children[0],
            child2: children[1],
            active: None,
            last: None,
            last_partition_prob: None,
            last_subtask_selection_prob: None,
        }
    }

    pub fn root(&self) -> TaskId {
        self.root
    }

    pub fn child1(&self) -> TaskId {
        self.child1
    }

    pub fn child2(&self) -> TaskId {
        self.child2
    }

    pub fn children(&self) -> [TaskId; 2] {
        [self.child1, self.child2]
    }

    pub fn active(&self) -> Option<TaskId> {
        self.active
    }

    pub fn last(&self) -> Option<TaskId> {
        self.last
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.is_root(task) || self.is_child(task)
    }

    pub fn is_root(&self, task: TaskId) -> bool {
        task == self.root
    }

    pub fn is_child(&self, task: TaskId) -> bool {
        task == self.child1 || task == self.child2
    }

    /// Make `task` the active member, remembering the previous one
    pub fn change_active(&mut self, task: TaskId) -> Result<(), TabError> {
        if !self.contains(task) {
            return Err(TabError::InvalidMember {
                tab_root: self.root,
                task,
            });
        }
        self.last = self.active;
        self.active = Some(task);
        Ok(())
    }

    pub fn root_active(&self) -> bool {
        self.active == Some(self.root)
    }

    pub fn child1_active(&self) -> bool {
        self.active == Some(self.child1)
    }

    pub fn child2_active(&self) -> bool {
        self.active == Some(self.child2)
    }

    pub fn task_changed(&self) -> bool {
        self.active != self.last
    }

    /// True iff the last change moved between the root and one of the children
    pub fn depth_changed(&self) -> bool {
        match (self.last, self.active) {
            (Some(last), Some(active)) => self.is_root(last) != self.is_root(active),
            _ => false,
        }
    }

    /// True iff the last change went from the root to a child
    pub fn employed_partitioning(&self) -> bool {
        match (self.last, self.active) {
            (Some(last), Some(active)) => self.is_root(last) && self.is_child(active),
            _ => false,
        }
    }

    pub fn last_partition_prob(&self) -> Option<f64> {
        self.last_partition_prob
    }

    pub fn last_subtask_selection_prob(&self) -> Option<f64> {
        self.last_subtask_selection_prob
    }

    pub(crate) fn record_partition_prob(&mut self, prob: f64) {
        self.last_partition_prob = Some(prob);
    }

    pub(crate) fn record_subtask_selection_prob(&mut self, prob: f64) {
        self.last_subtask_selection_prob = Some(prob);
    }
}
