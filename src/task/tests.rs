#[cfg(test)]
mod tests {
    use crate::math::SigmoidParams;
    use crate::simulation::SimulatedTask;
    use crate::task::allocator::*;
    use crate::task::execution::*;
    use crate::task::graph::*;
    use crate::task::probability::AbortParams;
    use crate::task::tree::*;
    use crate::task::types::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::collections::VecDeque;

    /// RNG replaying a fixed list of uniform draws; panics once exhausted
    struct ScriptedRng {
        draws: VecDeque<f64>,
    }

    impl ScriptedRng {
        fn new(draws: &[f64]) -> Self {
            Self {
                draws: draws.iter().copied().collect(),
            }
        }

        fn remaining(&self) -> usize {
            self.draws.len()
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            (self.next_u64() >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            let draw = self.draws.pop_front().expect("scripted draws exhausted");
            ((draw * (1u64 << 53) as f64) as u64) << 11
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for chunk in dst.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }
    }

    fn spec(name: &str, estimate: f64) -> TaskSpec {
        TaskSpec::new(name, 0.5).with_initial_estimate(estimate)
    }

    /// Sigmoid that evaluates to `gamma / 2` everywhere
    fn flat(gamma: f64) -> SigmoidParams {
        SigmoidParams {
            reactivity: 0.0,
            offset: 1.0,
            gamma,
        }
    }

    // collect(0) -> [harvest(1), cache_drop(2)], harvest(1) -> [forage(3), transport(4)]
    fn forage_graph(tab_switch: SigmoidParams) -> BiTdGraph {
        let mut graph = BiTdGraph::new(spec("collect", 40.0), tab_switch).unwrap();
        for (name, estimate) in [
            ("harvest", 25.0),
            ("cache_drop", 15.0),
            ("forage", 10.0),
            ("transport", 10.0),
        ] {
            graph.add_task(spec(name, estimate)).unwrap();
        }
        graph.set_children(0, &[1, 2]).unwrap();
        graph.set_children(1, &[3, 4]).unwrap();
        graph
    }

    fn partitioner(gamma: f64) -> Partitioner {
        Partitioner::new(PartitionConfig {
            sigmoid: flat(gamma),
            ..Default::default()
        })
    }

    fn mechanisms(durations: &[u64]) -> Vec<Box<dyn Taskable + Send>> {
        durations
            .iter()
            .map(|&d| Box::new(SimulatedTask::new(d)) as Box<dyn Taskable + Send>)
            .collect()
    }

    // Tree construction

    #[test]
    fn test_tree_rejects_malformed_children() {
        let mut tree = TaskTree::new();
        for name in ["a", "b", "c", "d", "e"] {
            tree.add_task(spec(name, 1.0)).unwrap();
        }

        assert_eq!(
            tree.set_children(0, &[1]).unwrap_err(),
            TopologyError::NotBifurcating { count: 1 }
        );
        assert_eq!(
            tree.set_children(0, &[1, 2, 3]).unwrap_err(),
            TopologyError::NotBifurcating { count: 3 }
        );
        assert_eq!(
            tree.set_children(0, &[1, 1]).unwrap_err(),
            TopologyError::NotBifurcating { count: 1 }
        );
        assert_eq!(
            tree.set_children(0, &[1, 99]).unwrap_err(),
            TopologyError::UnknownTask(99)
        );
        // Failed calls leave the tree untouched
        assert!(!tree.find(1).unwrap().has_parent());
        assert!(tree.find(0).unwrap().is_leaf());

        tree.set_children(0, &[1, 2]).unwrap();
        assert_eq!(
            tree.set_children(0, &[3, 4]).unwrap_err(),
            TopologyError::AlreadyBifurcating(0)
        );
        assert_eq!(
            tree.set_children(3, &[1, 4]).unwrap_err(),
            TopologyError::AlreadyParented {
                child: 1,
                parent: 0
            }
        );
        assert_eq!(
            tree.set_children(3, &[3, 4]).unwrap_err(),
            TopologyError::SelfChild(3)
        );
        assert_eq!(
            tree.set_children(1, &[0, 3]).unwrap_err(),
            TopologyError::Cycle {
                parent: 1,
                child: 0
            }
        );
    }

    #[test]
    fn test_tree_duplicate_name() {
        let mut tree = TaskTree::new();
        tree.add_task(spec("a", 1.0)).unwrap();
        assert_eq!(
            tree.add_task(spec("a", 2.0)).unwrap_err(),
            TopologyError::DuplicateName("a".to_string())
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_tree_walk_preorder_and_depth() {
        let graph = forage_graph(flat(1.0));
        let tree = graph.tree();

        assert_eq!(tree.preorder(), vec![0, 1, 3, 4, 2]);

        let mut names = Vec::new();
        tree.walk(|task| names.push(task.name.clone()));
        assert_eq!(names, ["collect", "harvest", "forage", "transport", "cache_drop"]);

        assert_eq!(tree.depth(0).unwrap(), 0);
        assert_eq!(tree.depth(2).unwrap(), 1);
        assert_eq!(tree.depth(4).unwrap(), 2);
        assert_eq!(tree.parent_of(0).unwrap(), 0);
        assert_eq!(tree.parent_of(3).unwrap(), 1);
        assert_eq!(tree.id_of("transport"), Some(4));
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_empty_tree_walk_visits_nothing() {
        let tree = TaskTree::new();
        let mut visited = 0;
        tree.walk(|_| visited += 1);
        assert_eq!(visited, 0);
        assert_eq!(tree.root(), None);
        assert_eq!(tree.validate().unwrap_err(), TopologyError::EmptyTree);
    }

    // TAB hierarchy

    #[test]
    fn test_tab_creation_and_root_is_active() {
        let graph = forage_graph(flat(1.0));
        assert_eq!(graph.tabs().len(), 2);
        assert_eq!(graph.active_tab(), Some(0));
        assert_eq!(graph.tab(0).unwrap().children(), [1, 2]);
        assert_eq!(graph.tab(1).unwrap().root(), 1);
        assert_eq!(graph.tab_rooted_at(1), Some(1));
        assert_eq!(graph.tab_rooted_at(2), None);
    }

    #[test]
    fn test_tab_parent_and_child_are_inverse() {
        let graph = forage_graph(flat(1.0));

        let child = graph.tab_child(0, 1).unwrap();
        assert_eq!(child, 1);
        assert_eq!(graph.tab_parent(child).unwrap(), Some(0));
        assert_eq!(graph.tab_parent(0).unwrap(), None);
        assert_eq!(graph.tab_depth(0).unwrap(), 0);
        assert_eq!(graph.tab_depth(1).unwrap(), 1);

        assert_eq!(
            graph.tab_child(0, 2).unwrap_err(),
            TopologyError::NoTabChild { tab: 0, task: 2 }
        );
        assert_eq!(
            graph.tab_child(0, 3).unwrap_err(),
            TopologyError::NotInTab { tab: 0, task: 3 }
        );
        assert_eq!(
            graph.tab_parent(7).unwrap_err(),
            TopologyError::UnknownTab(7)
        );
    }

    #[test]
    fn test_root_task_never_moves_active_tab() {
        let mut graph = forage_graph(flat(1.0));
        let mut rng = ScriptedRng::new(&[]);

        graph.active_tab_update(0, &mut rng).unwrap();
        assert_eq!(graph.active_tab(), Some(0));
        assert_eq!(graph.last_switch_probs(), None);
    }

    #[test]
    fn test_leaf_child_consumes_no_draw() {
        let mut graph = forage_graph(flat(1.0));
        let mut rng = ScriptedRng::new(&[0.99]);

        graph.active_tab_update(2, &mut rng).unwrap();
        assert_eq!(graph.active_tab(), Some(0));
        assert_eq!(graph.last_switch_probs(), None);
        assert_eq!(rng.remaining(), 1);
    }

    #[test]
    fn test_active_tab_moves_down_then_up() {
        let mut graph = forage_graph(flat(1.0));
        let mut rng = ScriptedRng::new(&[0.9, 0.1, 0.9]);

        // harvest ran as a child of the root TAB: draw 0.9 >= 0.5 moves down
        graph.active_tab_update(1, &mut rng).unwrap();
        assert_eq!(graph.active_tab(), Some(1));
        let probs = graph.last_switch_probs().unwrap();
        assert!((probs.up - 0.5).abs() < 1e-12);
        assert!((probs.down - 0.5).abs() < 1e-12);

        // harvest ran as root of its own TAB: draw 0.1 < 0.5 stays
        graph.active_tab_update(1, &mut rng).unwrap();
        assert_eq!(graph.active_tab(), Some(1));

        // draw 0.9 >= 0.5 moves up
        graph.active_tab_update(1, &mut rng).unwrap();
        assert_eq!(graph.active_tab(), Some(0));
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn test_task_outside_active_tab_is_rejected() {
        let mut graph = forage_graph(flat(1.0));
        let mut rng = ScriptedRng::new(&[]);
        assert_eq!(
            graph.active_tab_update(3, &mut rng).unwrap_err(),
            TopologyError::NotInTab { tab: 0, task: 3 }
        );
        assert_eq!(graph.active_tab(), Some(0));
    }

    #[test]
    fn test_init_active_tab_policies() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut graph = forage_graph(flat(1.0));
        graph.init_active_tab(TabInitPolicy::MaxDepth, &mut rng);
        assert_eq!(graph.active_tab(), Some(1));

        graph.init_active_tab(TabInitPolicy::Root, &mut rng);
        assert_eq!(graph.active_tab(), Some(0));

        for _ in 0..20 {
            graph.init_active_tab(TabInitPolicy::Random, &mut rng);
            assert!(matches!(graph.active_tab(), Some(0) | Some(1)));
        }
    }

    #[test]
    fn test_on_abort_records_last_partition() {
        let mut graph = forage_graph(flat(1.0));

        graph.on_abort(3);
        assert_eq!(graph.task(1).unwrap().last_partition, Some(3));

        graph.on_abort(0);
        assert_eq!(graph.task(0).unwrap().last_partition, None);

        // Unknown ids are ignored
        graph.on_abort(42);
    }

    // Partitioning

    #[test]
    fn test_partition_picks_child1_after_two_draws() {
        let mut graph = forage_graph(flat(1.0));
        let mut rng = ScriptedRng::new(&[0.5, 0.2]);

        let chosen = partitioner(0.6).partition(&mut graph, 0, &mut rng).unwrap();
        assert_eq!(chosen, 1);

        let tab = graph.tab(0).unwrap();
        assert_eq!(tab.active(), Some(1));
        assert!((tab.last_partition_prob().unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(tab.last_subtask_selection_prob(), Some(0.5));
        assert!(tab.child1_active());
    }

    #[test]
    fn test_partition_keeps_root_on_low_draw() {
        let mut graph = forage_graph(flat(1.0));
        let mut rng = ScriptedRng::new(&[0.1]);

        let chosen = partitioner(0.6).partition(&mut graph, 0, &mut rng).unwrap();
        assert_eq!(chosen, 0);
        assert_eq!(rng.remaining(), 0);
        assert!(graph.tab(0).unwrap().root_active());
        assert_eq!(graph.tab(0).unwrap().last_subtask_selection_prob(), None);
    }

    #[test]
    fn test_partition_overrides() {
        let always = Partitioner::new(PartitionConfig {
            always_partition: true,
            ..Default::default()
        });
        let never = Partitioner::new(PartitionConfig {
            never_partition: true,
            ..Default::default()
        });
        assert_eq!(always.partition_prob(100.0, 1.0), 0.0);
        assert_eq!(never.partition_prob(0.0, 100.0), 1.0);

        let mut graph = forage_graph(flat(1.0));
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_ne!(always.partition(&mut graph, 0, &mut rng).unwrap(), 0);
            assert_eq!(never.partition(&mut graph, 0, &mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn test_last_partition_bias() {
        let biased = Partitioner::new(PartitionConfig {
            last_partition_bias: 0.2,
            ..Default::default()
        });
        assert!((biased.child1_selection_prob(Some(3), [3, 4]) - 0.3).abs() < 1e-12);
        assert!((biased.child1_selection_prob(Some(4), [3, 4]) - 0.7).abs() < 1e-12);
        assert_eq!(biased.child1_selection_prob(None, [3, 4]), 0.5);
    }

    // Allocation policies

    #[test]
    fn test_greedy_global_picks_minimum_estimate() {
        let mut graph = BiTdGraph::new(spec("root", 5.0), flat(1.0)).unwrap();
        graph.add_task(spec("a", 5.0)).unwrap();
        graph.add_task(spec("b", 3.0)).unwrap();
        graph.set_children(0, &[1, 2]).unwrap();
        assert_eq!(Allocator::alloc_greedy_global(&graph), 2);

        let mut tied = BiTdGraph::new(spec("root", 5.0), flat(1.0)).unwrap();
        tied.add_task(spec("a", 3.0)).unwrap();
        tied.add_task(spec("b", 3.0)).unwrap();
        tied.set_children(0, &[1, 2]).unwrap();
        assert_eq!(Allocator::alloc_greedy_global(&tied), 1);
    }

    #[test]
    fn test_random_allocation_stays_in_range() {
        let graph = forage_graph(flat(1.0));
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            assert!(Allocator::alloc_random(&graph, &mut rng) < graph.tree().len());
        }
    }

    #[test]
    fn test_stoch_nbhd_switches_then_partitions() {
        let mut graph = forage_graph(flat(1.0));
        let allocator = Allocator::new(
            AllocPolicy::StochNbhd,
            PartitionConfig {
                sigmoid: flat(0.6),
                ..Default::default()
            },
        );
        // move down into harvest's TAB, then keep its root
        let mut rng = ScriptedRng::new(&[0.9, 0.1]);

        assert_eq!(allocator.allocate(&mut graph, 1, &mut rng), 1);
        assert_eq!(graph.active_tab(), Some(1));
        assert!(graph.tab(1).unwrap().root_active());
    }

    #[test]
    fn test_stoch_nbhd_falls_back_to_root() {
        let mut graph = forage_graph(flat(1.0));
        let allocator = Allocator::new(AllocPolicy::StochNbhd, PartitionConfig::default());
        let mut rng = ScriptedRng::new(&[]);

        assert_eq!(allocator.allocate(&mut graph, 3, &mut rng), 0);
    }

    #[test]
    fn test_fallback_from_deep_tab_recovers() {
        let mut graph = forage_graph(SigmoidParams::default());
        let allocator = Allocator::new(AllocPolicy::StochNbhd, PartitionConfig::default());
        let mut rng = StdRng::seed_from_u64(13);
        graph.init_active_tab(TabInitPolicy::MaxDepth, &mut rng);
        assert_eq!(graph.active_tab(), Some(1));

        // cache_drop is not a member of harvest's TAB
        let mut task = allocator.allocate(&mut graph, 2, &mut rng);
        assert_eq!(task, 0);
        assert_eq!(graph.active_tab(), Some(0));

        let mut left_root = 0;
        for _ in 0..200 {
            task = allocator.allocate(&mut graph, task, &mut rng);
            if task != 0 {
                left_root += 1;
            }
        }
        assert!(left_root > 0, "allocation stayed frozen on the root");
    }

    #[test]
    fn test_stoch_nbhd_without_tabs_returns_root() {
        let mut graph = BiTdGraph::new(spec("solo", 1.0), flat(1.0)).unwrap();
        let allocator = Allocator::new(AllocPolicy::StochNbhd, PartitionConfig::default());
        let mut rng = ScriptedRng::new(&[]);
        assert_eq!(allocator.allocate(&mut graph, 0, &mut rng), 0);
    }

    // Executive

    fn solo_executive(draws: &[f64], duration: u64) -> Executive<ScriptedRng> {
        let graph = BiTdGraph::new(spec("solo", 4.0), flat(1.0)).unwrap();
        Executive::new(
            graph,
            Allocator::new(AllocPolicy::StochNbhd, PartitionConfig::default()),
            ExecutiveConfig::default(),
            ScriptedRng::new(draws),
            mechanisms(&[duration]),
        )
        .unwrap()
    }

    #[test]
    fn test_executive_completion_updates_estimate() {
        let mut executive = solo_executive(&[0.9, 0.9], 2);
        assert_eq!(executive.state(), ExecutiveState::Idle);

        let report = executive.run_timestep();
        assert_eq!(report.state, ExecutiveState::Executing(0));
        assert_eq!(executive.current_task(), Some(0));
        assert!((executive.last_abort_prob() - AbortParams::MIN_ABORT_PROB).abs() < 1e-12);

        let report = executive.run_timestep();
        assert_eq!(report.state, ExecutiveState::Completed(0));
        assert_eq!(report.elapsed, 2);
        assert_eq!(executive.last_task(), Some(0));
        assert_eq!(executive.current_task(), None);

        // 0.5 * 2 + 0.5 * 4
        let task = executive.graph().task(0).unwrap();
        assert!((task.estimate_value() - 3.0).abs() < 1e-12);
        assert_eq!(task.last_exec_time, 2.0);
    }

    #[test]
    fn test_executive_abort_keeps_estimate() {
        let mut executive = solo_executive(&[0.00001], 5);

        let report = executive.run_timestep();
        assert_eq!(report.state, ExecutiveState::Aborted(0));
        let task = executive.graph().task(0).unwrap();
        assert_eq!(task.estimate_value(), 4.0);
        assert_eq!(task.last_exec_time, 0.0);
    }

    #[test]
    fn test_executive_external_abort() {
        let graph = forage_graph(flat(1.0));
        let mut executive = Executive::new(
            graph,
            Allocator::new(
                AllocPolicy::StochNbhd,
                PartitionConfig {
                    sigmoid: flat(0.6),
                    ..Default::default()
                },
            ),
            ExecutiveConfig::default(),
            // partition -> harvest, no abort
            ScriptedRng::new(&[0.5, 0.2, 0.9]),
            mechanisms(&[30, 20, 12, 8, 14]),
        )
        .unwrap();

        let report = executive.run_timestep();
        assert_eq!(report.task, 1);
        assert_eq!(report.task_name, "harvest");
        assert_eq!(report.active_tab_root, Some(0));
        assert!((report.partition_prob.unwrap() - 0.3).abs() < 1e-12);

        assert_eq!(executive.abort_current(), Some(1));
        assert_eq!(executive.state(), ExecutiveState::Aborted(1));
        assert_eq!(executive.graph().task(0).unwrap().last_partition, Some(1));
        assert_eq!(executive.abort_current(), None);
    }

    #[test]
    fn test_executive_rejects_mechanism_mismatch() {
        let graph = forage_graph(flat(1.0));
        let err = Executive::new(
            graph,
            Allocator::new(AllocPolicy::Random, PartitionConfig::default()),
            ExecutiveConfig::default(),
            StdRng::seed_from_u64(0),
            mechanisms(&[1]),
        )
        .err()
        .unwrap();
        assert_eq!(err, ExecutiveError::MechanismCount { count: 1, tasks: 5 });
    }

    #[test]
    fn test_executive_rejects_disconnected_graph() {
        let mut graph = BiTdGraph::new(spec("root", 1.0), flat(1.0)).unwrap();
        graph.add_task(spec("stray", 1.0)).unwrap();
        let err = Executive::new(
            graph,
            Allocator::new(AllocPolicy::Random, PartitionConfig::default()),
            ExecutiveConfig::default(),
            StdRng::seed_from_u64(0),
            mechanisms(&[1, 1]),
        )
        .err()
        .unwrap();
        assert_eq!(
            err,
            ExecutiveError::Topology(TopologyError::Disconnected(1))
        );
    }

    #[test]
    fn test_executive_is_deterministic_per_seed() {
        let trace = |seed: u64| {
            let mut executive = Executive::new(
                forage_graph(SigmoidParams::default()),
                Allocator::new(AllocPolicy::StochNbhd, PartitionConfig::default()),
                ExecutiveConfig::default(),
                StdRng::seed_from_u64(seed),
                mechanisms(&[30, 20, 12, 8, 14]),
            )
            .unwrap();
            (0..300)
                .map(|_| executive.run_timestep())
                .map(|r| (r.task, r.state))
                .collect::<Vec<_>>()
        };

        assert_eq!(trace(21), trace(21));
    }

    #[test]
    fn test_executive_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Executive<StdRng>>();
    }
}
