use rr_model::{
    Packet, SimConfig,
    core::{CpuState, RecordingSink, Task, TaskId, TaskKind, Ticks},
    sim::{Sim, parse_packet},
};

fn sim(kinds: &[TaskKind], partitions: usize, quantum: Ticks) -> Sim {
    let tasks = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| Task::new(i as TaskId + 1, kind, 100))
        .collect();
    let config = SimConfig {
        partitions,
        memory_mb: 1024,
        max_ticks: 500,
        quantum,
    };
    Sim::new(config, Packet::new(tasks).unwrap()).unwrap()
}

/// Id of the task that advanced during each tick.
fn ran_per_tick(sim: &mut Sim) -> Vec<TaskId> {
    let mut before: Vec<Ticks> = sim.core.packet().tasks().iter().map(|t| t.executed_ticks()).collect();
    let mut ran = Vec::new();
    while sim.step().is_some() {
        let after: Vec<Ticks> = sim.core.packet().tasks().iter().map(|t| t.executed_ticks()).collect();
        let advanced = sim
            .core
            .packet()
            .tasks()
            .iter()
            .zip(before.iter().zip(&after))
            .filter(|(_, (b, a))| a > b)
            .map(|(t, _)| t.id)
            .collect::<Vec<_>>();
        assert_eq!(advanced.len(), 1, "exactly one task runs per tick");
        ran.push(advanced[0]);
        before = after;
    }
    ran
}

#[test]
fn single_compute_task_finishes_in_three_ticks() {
    let mut sim = sim(&[TaskKind::Compute], 1, 5);

    assert_eq!(ran_per_tick(&mut sim), vec![1, 1, 1]);
    assert!(sim.is_complete());
    assert_eq!(sim.ticks_run(), 3);
    assert_eq!(sim.snapshot().history[0].partitions_used, 1);
}

#[test]
fn unit_quantum_alternates_until_done() {
    let mut sim = sim(&[TaskKind::Compute, TaskKind::Io], 1, 1);

    assert_eq!(ran_per_tick(&mut sim), vec![1, 2, 1, 2, 1]);
    assert!(sim.is_complete());
    assert_eq!(sim.summary().round_robin.context_switches, 4);
}

#[test]
fn long_quantum_is_never_exhausted() {
    let mut sim = sim(&[TaskKind::Compute, TaskKind::Io], 1, 10);

    assert_eq!(ran_per_tick(&mut sim), vec![1, 1, 1, 2, 2]);
    let history = sim.snapshot().history;
    // Task 2 only gets the partition after task 1 leaves it.
    assert_eq!(history[2].pending, 1);
    assert_eq!(history[3].pending, 0);
    assert_eq!(sim.summary().round_robin.quantum_exhaustions, 0);
}

#[test]
fn shrink_evicts_to_front_of_pending_without_overload() {
    let mut sim = sim(&[TaskKind::Compute, TaskKind::Compute, TaskKind::Io], 2, 2);
    let sink = RecordingSink::new();
    sim.core.set_sink(Box::new(sink.clone()));

    sim.step();
    assert_eq!(sim.core.ctx.partitions, vec![Some(1), Some(2)]);

    sim.resize(1).unwrap();
    assert_eq!(sim.core.ctx.partitions, vec![Some(1)]);
    assert_eq!(sim.core.ctx.pending.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    assert!(sink.contains("1 task(s) returned to the pending queue"));

    let summary = sim.run();
    assert!(summary.completed);
    assert!(
        sim.snapshot()
            .history
            .iter()
            .all(|s| s.cpu_state != CpuState::Overloaded && s.partitions_used <= s.max_partitions)
    );
}

#[test]
fn packet_file_round_trip_through_simulation() {
    let packet = parse_packet(
        r#"{"tasks": [
            {"num": 1, "type": "MATH", "memory": 300},
            {"num": 2, "type": "INOUT", "memory": 120},
            {"num": 3, "type": "INOUT", "memory": 80}
        ]}"#,
    )
    .unwrap();
    let config = SimConfig {
        partitions: 2,
        quantum: 2,
        ..SimConfig::default()
    };
    let mut sim = Sim::new(config, packet).unwrap();
    let summary = sim.run();

    assert!(summary.completed);
    assert_eq!(summary.ticks, 7);
    assert_eq!(summary.finished, 3);

    let json = sim.snapshot().to_json().unwrap();
    assert!(json.contains("\"cpu_state\": \"Executing\""));
}

#[test]
fn failing_sink_does_not_stop_the_run() {
    use rr_model::core::{FnSink, SinkError};

    let mut sim = sim(&[TaskKind::Compute, TaskKind::Io], 1, 1)
        .with_sink(Box::new(FnSink(|_: &str| Err(SinkError("closed".into())))));
    let summary = sim.run();

    assert!(summary.completed);
    assert_eq!(summary.ticks, 5);
}
