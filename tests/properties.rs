use proptest::prelude::*;
use rr_model::{
    Packet, SimConfig,
    core::{CpuState, Task, TaskId, TaskKind, Ticks},
    sim::Sim,
};
use std::collections::HashSet;

fn kind() -> impl Strategy<Value = TaskKind> {
    prop_oneof![Just(TaskKind::Compute), Just(TaskKind::Io)]
}

fn build(kinds: &[TaskKind], partitions: usize, quantum: Ticks, resizes: &[(Ticks, usize)]) -> Sim {
    let tasks = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| Task::new(i as TaskId + 10, kind, 64))
        .collect();
    let packet = Packet::new(tasks).unwrap();
    let config = SimConfig {
        partitions,
        memory_mb: 512,
        max_ticks: packet.total_required_ticks() + 10,
        quantum,
    };
    let mut sim = Sim::new(config, packet).unwrap();
    for &(tick, count) in resizes {
        sim.plan_resize(tick, count).unwrap();
    }
    sim
}

fn check_tick(sim: &Sim) {
    let ctx = &sim.core.ctx;
    for task in ctx.packet.tasks() {
        assert!(task.executed_ticks() <= task.required_ticks());
        assert_eq!(task.required_ticks(), match task.kind {
            TaskKind::Compute => 3,
            TaskKind::Io => 2,
        });
    }

    let mut seen = HashSet::new();
    for id in ctx.packet.ready_queue().iter() {
        assert!(seen.insert(id), "task {id} queued twice");
        assert!(!ctx.packet.task(id).unwrap().is_done());
    }

    assert!(ctx.used_partitions() <= ctx.max_partitions || ctx.cpu.state() == CpuState::Overloaded);
}

proptest! {
    #[test]
    fn every_tick_does_useful_work(
        kinds in prop::collection::vec(kind(), 1..12),
        partitions in 1usize..5,
        quantum in 1u64..4,
        resizes in prop::collection::vec((0u64..20, 1usize..5), 0..3),
    ) {
        let mut sim = build(&kinds, partitions, quantum, &resizes);
        let required = sim.core.packet().total_required_ticks();

        while sim.step().is_some() {
            check_tick(&sim);
        }

        prop_assert!(sim.is_complete());
        prop_assert_eq!(sim.ticks_run(), required);
        prop_assert_eq!(sim.core.ctx.finished.len(), kinds.len());
        prop_assert!(sim.core.ctx.pending.is_empty());
    }

    #[test]
    fn reset_reproduces_the_run(
        kinds in prop::collection::vec(kind(), 1..10),
        partitions in 1usize..4,
        quantum in 1u64..4,
        resizes in prop::collection::vec((0u64..15, 1usize..4), 0..2),
    ) {
        let mut sim = build(&kinds, partitions, quantum, &resizes);
        let first = sim.run();
        let first_snapshot = sim.snapshot();

        sim.reset();
        let second = sim.run();

        prop_assert_eq!(first, second);
        prop_assert_eq!(first_snapshot, sim.snapshot());
    }

    #[test]
    fn overload_never_arises_from_resizing(
        kinds in prop::collection::vec(kind(), 2..10),
        resizes in prop::collection::vec((0u64..12, 1usize..4), 1..4),
    ) {
        let mut sim = build(&kinds, 3, 1, &resizes);
        sim.run();

        let snapshot = sim.snapshot();
        prop_assert_eq!(snapshot.cpu_state_counts.get(CpuState::Overloaded), 0);
        prop_assert!(snapshot.history.iter().all(|s| s.partitions_used <= s.max_partitions));
    }
}
