use crate::task::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Append-only arena of tasks forming a bifurcating decomposition tree.
///
/// The first task inserted is the root. Tasks are linked to their parent with
/// [`TaskTree::set_children`]; until then a task is its own parent.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TaskTree {
    tasks: Vec<Task>,
    names: HashMap<String, TaskId>,
}

impl TaskTree {
    /// Create a new empty task tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new, unlinked task to the tree
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<TaskId, TopologyError> {
        if self.names.contains_key(&spec.name) {
            return Err(TopologyError::DuplicateName(spec.name));
        }

        let task_id = self.tasks.len();
        self.names.insert(spec.name.clone(), task_id);
        self.tasks.push(Task::new(task_id, spec));

        debug!("Added task {} to tree", task_id);
        Ok(task_id)
    }

    /// Register exactly two children under `parent`.
    ///
    /// Children must be existing tasks without a parent, and linking them must
    /// not introduce a cycle.
    pub fn set_children(
        &mut self,
        parent: TaskId,
        children: &[TaskId],
    ) -> Result<[TaskId; 2], TopologyError> {
        let pair: [TaskId; 2] = children
            .try_into()
            .map_err(|_| TopologyError::NotBifurcating {
                count: children.len(),
            })?;

        let parent_task = self.get_task(parent)?;
        if parent_task.is_partitionable() {
            return Err(TopologyError::AlreadyBifurcating(parent));
        }
        if pair[0] == pair[1] {
            return Err(TopologyError::NotBifurcating { count: 1 });
        }

        for &child in &pair {
            if child == parent {
                return Err(TopologyError::SelfChild(child));
            }
            let child_task = self.get_task(child)?;
            if child_task.has_parent() {
                return Err(TopologyError::AlreadyParented {
                    child,
                    parent: child_task.parent,
                });
            }
            if Some(child) == self.root() || self.is_ancestor(child, parent) {
                return Err(TopologyError::Cycle { parent, child });
            }
        }

        for &child in &pair {
            self.tasks[child].parent = parent;
        }
        self.tasks[parent].kind = TaskKind::Bifurcating { children: pair };

        debug!(
            "Task '{}' bifurcates into '{}' and '{}'",
            self.tasks[parent].name, self.tasks[pair[0]].name, self.tasks[pair[1]].name
        );
        Ok(pair)
    }

    /// Whether `ancestor` lies on the parent chain of `task` (inclusive)
    fn is_ancestor(&self, ancestor: TaskId, task: TaskId) -> bool {
        let mut current = task;
        loop {
            if current == ancestor {
                return true;
            }
            let parent = self.tasks[current].parent;
            if parent == current {
                return false;
            }
            current = parent;
        }
    }

    /// Root task id, if any task has been added
    pub fn root(&self) -> Option<TaskId> {
        if self.tasks.is_empty() { None } else { Some(0) }
    }

    /// Parent of a task; the root is its own parent
    pub fn parent_of(&self, task_id: TaskId) -> Result<TaskId, TopologyError> {
        Ok(self.get_task(task_id)?.parent)
    }

    /// Number of ancestors between a task and the root
    pub fn depth(&self, task_id: TaskId) -> Result<usize, TopologyError> {
        let mut current = self.get_task(task_id)?;
        let mut depth = 0;
        while current.has_parent() {
            depth += 1;
            current = &self.tasks[current.parent];
        }
        Ok(depth)
    }

    /// Get a task by ID
    pub fn find(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// Get a mutable reference to a task by ID
    pub fn find_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(task_id)
    }

    pub fn get_task(&self, task_id: TaskId) -> Result<&Task, TopologyError> {
        self.find(task_id)
            .ok_or(TopologyError::UnknownTask(task_id))
    }

    pub fn get_task_mut(&mut self, task_id: TaskId) -> Result<&mut Task, TopologyError> {
        self.tasks
            .get_mut(task_id)
            .ok_or(TopologyError::UnknownTask(task_id))
    }

    /// Look up a task id by name
    pub fn id_of(&self, name: &str) -> Option<TaskId> {
        self.names.get(name).copied()
    }

    /// Visit every task reachable from the root in pre-order
    pub fn walk<F: FnMut(&Task)>(&self, mut visitor: F) {
        let Some(root) = self.root() else {
            return;
        };

        let mut stack = vec![root];
        while let Some(task_id) = stack.pop() {
            let task = &self.tasks[task_id];
            visitor(task);
            if let Some([first, second]) = task.children() {
                stack.push(second);
                stack.push(first);
            }
        }
    }

    /// Task ids in pre-order
    pub fn preorder(&self) -> Vec<TaskId> {
        let mut order = Vec::with_capacity(self.tasks.len());
        self.walk(|task| order.push(task.id));
        order
    }

    /// All tasks in id order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that every task hangs off the root
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.tasks.is_empty() {
            return Err(TopologyError::EmptyTree);
        }
        match self.tasks.iter().skip(1).find(|task| !task.has_parent()) {
            Some(orphan) => Err(TopologyError::Disconnected(orphan.id)),
            None => Ok(()),
        }
    }
}
