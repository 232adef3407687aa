use anyhow::{Context, bail};
use clap::Parser;
use rr_model::{
    SimConfig,
    core::{CpuState, TracingSink, Ticks},
    sim::{Sim, load_packet},
};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rr-sim")]
#[command(about = "Simulate a single-CPU batch OS under Round-Robin scheduling", long_about = None)]
struct Args {
    /// Packet file (JSON list of tasks)
    #[arg(short, long)]
    packet: PathBuf,

    /// Number of memory partitions
    #[arg(long, default_value_t = 4)]
    partitions: usize,

    /// RAM size in MB (reported only)
    #[arg(long, default_value_t = 4096)]
    memory: u64,

    /// Tick budget
    #[arg(short, long, default_value_t = 1000)]
    ticks: Ticks,

    /// Round-Robin quantum in ticks
    #[arg(short, long, default_value_t = 1)]
    quantum: Ticks,

    /// Resize partitions mid-run, as TICK:COUNT (repeatable)
    #[arg(long, value_parser = parse_resize)]
    resize: Vec<(Ticks, usize)>,

    /// Write the statistics snapshot as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not stream lifecycle notices
    #[arg(long)]
    quiet: bool,
}

fn parse_resize(s: &str) -> Result<(Ticks, usize), String> {
    let (tick, count) = s
        .split_once(':')
        .ok_or_else(|| format!("expected TICK:COUNT, got {s:?}"))?;
    let tick = tick.trim().parse().map_err(|e| format!("bad tick: {e}"))?;
    let count = count.trim().parse().map_err(|e| format!("bad count: {e}"))?;
    Ok((tick, count))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = SimConfig {
        partitions: args.partitions,
        memory_mb: args.memory,
        max_ticks: args.ticks,
        quantum: args.quantum,
    };
    let packet = load_packet(&args.packet)
        .with_context(|| format!("loading packet {}", args.packet.display()))?;

    let mut sim = Sim::new(config, packet)?;
    if !args.quiet {
        sim = sim.with_sink(Box::new(TracingSink));
    }
    for &(tick, count) in &args.resize {
        if tick >= args.ticks {
            bail!("resize at tick {tick} is past the tick budget of {}", args.ticks);
        }
        sim.plan_resize(tick, count)?;
    }

    let summary = sim.run();
    let snapshot = sim.snapshot();

    println!();
    println!("Ticks run:            {}", summary.ticks);
    println!(
        "Tasks finished:       {}/{}{}",
        summary.finished,
        summary.total,
        if summary.completed { "" } else { " (budget exhausted)" }
    );
    println!(
        "Context switches:     {}",
        summary.round_robin.context_switches
    );
    println!(
        "Quantum exhaustions:  {}",
        summary.round_robin.quantum_exhaustions
    );
    println!(
        "Quantum efficiency:   {:.1}%",
        summary.round_robin.efficiency_pct()
    );
    println!("Mean free memory:     {:.1}%", snapshot.mean_free_memory_pct());
    println!("Mean ready queue:     {:.2}", snapshot.mean_ready_queue_len());
    println!("Peak partitions used: {}", snapshot.peak_partitions_used());
    println!("CPU ticks by state:");
    for (state, count) in snapshot.cpu_state_counts.iter() {
        let share = count as f64 / snapshot.ticks().max(1) as f64 * 100.0;
        println!("  {:<12} {:>6} ({share:.1}%)", state.to_string(), count);
    }
    if snapshot.cpu_state_counts.get(CpuState::Overloaded) > 0 {
        println!("warning: partition capacity was exceeded during the run");
    }

    if let Some(path) = args.output {
        let json = snapshot.to_json()?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Snapshot written to {}", path.display());
    }

    Ok(())
}
