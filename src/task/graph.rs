use crate::math::SigmoidParams;
use crate::task::probability::TabSwitchProbability;
use crate::task::tab::Tab;
use crate::task::tree::TaskTree;
use crate::task::types::*;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Probabilities computed by the most recent TAB switch evaluation
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct SwitchProbs {
    /// Probability of staying put when the active TAB root just ran
    pub up: f64,
    /// Probability of staying put when one of the active TAB children just ran
    pub down: f64,
}

/// Bifurcating task decomposition graph.
///
/// Owns the task tree and one [`Tab`] per bifurcating task. Exactly one TAB is
/// active once any TAB exists.
#[derive(Clone, Debug)]
pub struct BiTdGraph {
    tree: TaskTree,
    tabs: Vec<Tab>,
    active_tab: Option<TabId>,
    tab_switch: TabSwitchProbability,
    last_switch: Option<SwitchProbs>,
}

impl BiTdGraph {
    /// Create a graph whose tree holds only the root task
    pub fn new(root: TaskSpec, tab_switch: SigmoidParams) -> Result<Self, TopologyError> {
        let mut tree = TaskTree::new();
        tree.add_task(root)?;
        Ok(Self {
            tree,
            tabs: Vec::new(),
            active_tab: None,
            tab_switch: TabSwitchProbability::new(tab_switch),
            last_switch: None,
        })
    }

    pub fn add_task(&mut self, spec: TaskSpec) -> Result<TaskId, TopologyError> {
        self.tree.add_task(spec)
    }

    /// Bifurcate `parent` into `children` and create the matching TAB
    pub fn set_children(
        &mut self,
        parent: TaskId,
        children: &[TaskId],
    ) -> Result<TabId, TopologyError> {
        let pair = self.tree.set_children(parent, children)?;
        let tab_id = self.tabs.len();
        self.tabs.push(Tab::new(parent, pair));

        if self.active_tab.is_none() || parent == self.root() {
            self.active_tab = Some(tab_id);
        }
        Ok(tab_id)
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn root(&self) -> TaskId {
        0
    }

    pub fn task(&self, task_id: TaskId) -> Result<&Task, TopologyError> {
        self.tree.get_task(task_id)
    }

    /// Record a measured execution duration for a task
    pub fn record_exec_time(
        &mut self,
        task_id: TaskId,
        measured: f64,
        update_estimate: bool,
    ) -> Result<(), TopologyError> {
        self.tree
            .get_task_mut(task_id)?
            .record_exec_time(measured, update_estimate);
        Ok(())
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, tab_id: TabId) -> Option<&Tab> {
        self.tabs.get(tab_id)
    }

    pub(crate) fn tab_mut(&mut self, tab_id: TabId) -> Option<&mut Tab> {
        self.tabs.get_mut(tab_id)
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active_tab.and_then(|id| self.tabs.get(id))
    }

    pub fn last_switch_probs(&self) -> Option<SwitchProbs> {
        self.last_switch
    }

    /// TAB whose root is `task`
    pub fn tab_rooted_at(&self, task: TaskId) -> Option<TabId> {
        self.tabs.iter().position(|tab| tab.root() == task)
    }

    /// Check the tree is connected; every declared task must hang off the root
    pub fn validate(&self) -> Result<(), TopologyError> {
        self.tree.validate()
    }

    /// Choose the initially active TAB
    pub fn init_active_tab<R: Rng>(&mut self, policy: TabInitPolicy, rng: &mut R) {
        if self.tabs.is_empty() {
            return;
        }

        let chosen = match policy {
            TabInitPolicy::Root => self.tab_rooted_at(self.root()),
            TabInitPolicy::Random => Some(rng.random_range(0..self.tabs.len())),
            TabInitPolicy::MaxDepth => {
                let mut deepest: Option<(TabId, usize)> = None;
                for task_id in self.tree.preorder() {
                    if let Some(tab_id) = self.tab_rooted_at(task_id) {
                        let depth = self.tree.depth(task_id).unwrap_or(0);
                        if deepest.is_none_or(|(_, best)| depth > best) {
                            deepest = Some((tab_id, depth));
                        }
                    }
                }
                deepest.map(|(tab_id, _)| tab_id)
            }
        };

        if let Some(tab_id) = chosen {
            self.active_tab = Some(tab_id);
            info!(
                "Initial active TAB root='{}' ({:?})",
                self.tree.tasks()[self.tabs[tab_id].root()].name,
                policy
            );
        }
    }

    /// Number of TAB ancestors above `tab_id`
    pub fn tab_depth(&self, tab_id: TabId) -> Result<usize, TopologyError> {
        let mut depth = 0;
        let mut current = tab_id;
        while let Some(parent) = self.tab_parent(current)? {
            depth += 1;
            current = parent;
        }
        Ok(depth)
    }

    /// TAB rooted at `task`, which must be one of `tab_id`'s children
    pub fn tab_child(&self, tab_id: TabId, task: TaskId) -> Result<TabId, TopologyError> {
        let tab = self
            .tabs
            .get(tab_id)
            .ok_or(TopologyError::UnknownTab(tab_id))?;
        if !tab.is_child(task) {
            return Err(TopologyError::NotInTab { tab: tab_id, task });
        }
        self.tab_rooted_at(task)
            .ok_or(TopologyError::NoTabChild { tab: tab_id, task })
    }

    /// TAB whose children include `tab_id`'s root; `None` for the top-level TAB
    pub fn tab_parent(&self, tab_id: TabId) -> Result<Option<TabId>, TopologyError> {
        let root = self
            .tabs
            .get(tab_id)
            .ok_or(TopologyError::UnknownTab(tab_id))?
            .root();

        let mut parents = self
            .tabs
            .iter()
            .enumerate()
            .filter(|(id, tab)| *id != tab_id && tab.is_child(root))
            .map(|(id, _)| id);

        let parent = parents.next();
        if parents.next().is_some() {
            return Err(TopologyError::MultipleTabParents(tab_id));
        }
        Ok(parent)
    }

    fn tab_estimate(&self, tab_id: TabId) -> f64 {
        self.tree.tasks()[self.tabs[tab_id].root()].estimate_value()
    }

    /// Possibly move the active TAB up or down one level after `current_task`
    /// finished or aborted.
    ///
    /// A draw at or above the computed probability switches TABs; below it the
    /// active TAB stays.
    pub fn active_tab_update<R: Rng>(
        &mut self,
        current_task: TaskId,
        rng: &mut R,
    ) -> Result<(), TopologyError> {
        let Some(active_id) = self.active_tab else {
            return Ok(());
        };
        let tab = &self.tabs[active_id];
        let task = self.tree.get_task(current_task)?;

        let is_tdgraph_root = tab.is_root(current_task) && current_task == self.root();
        let is_tdgraph_leaf = tab.is_child(current_task) && !task.is_partitionable();
        if is_tdgraph_root || is_tdgraph_leaf {
            debug!(
                "Active TAB unchanged: task '{}' is tdgraph root or leaf",
                task.name
            );
            return Ok(());
        }
        if !tab.contains(current_task) {
            return Err(TopologyError::NotInTab {
                tab: active_id,
                task: current_task,
            });
        }
        let moving_up = tab.is_root(current_task);

        let parent_id = self.tab_parent(active_id)?;
        let active_estimate = self.tab_estimate(active_id);
        let parent_estimate = parent_id
            .map(|id| self.tab_estimate(id))
            .unwrap_or(active_estimate);

        let probs = SwitchProbs {
            up: self.tab_switch.calc(active_estimate, parent_estimate),
            down: self.tab_switch.calc(parent_estimate, active_estimate),
        };
        self.last_switch = Some(probs);
        debug!(
            "TAB w/root='{}' up prob={:.4}, down prob={:.4}",
            self.tree.tasks()[self.tabs[active_id].root()].name,
            probs.up,
            probs.down
        );

        let draw: f64 = rng.random();
        let new_tab = if moving_up {
            match parent_id {
                Some(parent) if draw >= probs.up => parent,
                _ => active_id,
            }
        } else if draw >= probs.down {
            self.tab_child(active_id, current_task)?
        } else {
            active_id
        };

        if new_tab != active_id {
            debug!(
                "New active TAB root='{}'",
                self.tree.tasks()[self.tabs[new_tab].root()].name
            );
        }
        self.active_tab = Some(new_tab);
        Ok(())
    }

    /// Make the TAB rooted at the tree root active again
    pub fn reset_active_tab(&mut self) {
        if let Some(tab_id) = self.tab_rooted_at(self.root()) {
            self.active_tab = Some(tab_id);
        }
    }

    /// Remember an aborted task as its parent's last partition
    pub fn on_abort(&mut self, task_id: TaskId) {
        let Ok(task) = self.tree.get_task(task_id) else {
            return;
        };
        if !task.has_parent() {
            return;
        }
        let parent = task.parent;
        if let Some(parent_task) = self.tree.find_mut(parent) {
            parent_task.last_partition = Some(task_id);
            debug!("Task {} aborted, recorded as last partition of {}", task_id, parent);
        }
    }
}
