pub mod cpu;
pub mod driver;
pub mod event;
pub mod observer;
pub mod state;
pub mod stats;

pub use cpu::{Cpu, CpuState};
pub use driver::OsCore;
pub use event::{EventSink, FnSink, OsEvent, RecordingSink, SinkError, TracingSink};
pub use state::{OsCtx, Task, TaskId, TaskKind, TaskState, Ticks};
pub use stats::{CpuStateCounts, RoundRobinStats, StatsSnapshot, TickSample};
