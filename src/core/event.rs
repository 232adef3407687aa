use super::{
    cpu::CpuState,
    state::{TaskId, TaskKind, Ticks},
};
use std::{cell::RefCell, fmt, rc::Rc};
use thiserror::Error;

/// Lifecycle notices produced by the orchestrator. Sinks receive the
/// `Display` rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum OsEvent {
    Admitted {
        task: TaskId,
        kind: TaskKind,
        partition: usize,
    },
    Freed {
        task: TaskId,
        partition: usize,
    },
    Dispatched {
        task: TaskId,
        kind: TaskKind,
    },
    // Same task handed a fresh quantum
    Regranted {
        task: TaskId,
    },
    NoTaskReady,
    Progress {
        task: TaskId,
        kind: TaskKind,
        executed: Ticks,
        required: Ticks,
        remaining_quantum: Ticks,
    },
    Completed {
        task: TaskId,
        kind: TaskKind,
    },
    CpuStateChange {
        from: CpuState,
        to: CpuState,
        used: usize,
        max: usize,
        compute_running: usize,
        io_running: usize,
    },
    CapacityExceeded {
        used: usize,
        max: usize,
    },
    Resized {
        from: usize,
        to: usize,
        returned: usize,
    },
    Summary {
        tick: Ticks,
        finished: usize,
        total: usize,
        used: usize,
        max: usize,
        running: Option<TaskId>,
    },
    Reset,
}

impl fmt::Display for OsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsEvent::Admitted {
                task,
                kind,
                partition,
            } => write!(f, "task {task} ({kind}) loaded into partition {}", partition + 1),
            OsEvent::Freed { task, partition } => {
                write!(f, "task {task} finished, partition {} freed", partition + 1)
            }
            OsEvent::Dispatched { task, kind } => {
                write!(f, "round-robin: switching to task {task} ({kind})")
            }
            OsEvent::Regranted { task } => {
                write!(f, "round-robin: task {task} keeps the CPU with a new quantum")
            }
            OsEvent::NoTaskReady => f.write_str("round-robin: no task available"),
            OsEvent::Progress {
                task,
                kind,
                executed,
                required,
                remaining_quantum,
            } => write!(
                f,
                "task {task} ({kind}) running: {executed}/{required} ticks, quantum {remaining_quantum}"
            ),
            OsEvent::Completed { task, kind } => write!(f, "task {task} ({kind}) completed"),
            OsEvent::CpuStateChange {
                from,
                to,
                used,
                max,
                compute_running,
                io_running,
            } => write!(
                f,
                "CPU {from} -> {to} (partitions {used}/{max}, compute {compute_running}, io {io_running})"
            ),
            OsEvent::CapacityExceeded { used, max } => {
                write!(f, "warning: partition capacity exceeded ({used} > {max})")
            }
            OsEvent::Resized { from, to, returned } => {
                write!(f, "partitions resized {from} -> {to}")?;
                if *returned > 0 {
                    write!(f, ", {returned} task(s) returned to the pending queue")?;
                }
                Ok(())
            }
            OsEvent::Summary {
                tick,
                finished,
                total,
                used,
                max,
                running,
            } => {
                write!(f, "tick {tick}: finished {finished}/{total}, memory {used}/{max}")?;
                if let Some(task) = running {
                    write!(f, ", task {task}")?;
                }
                Ok(())
            }
            OsEvent::Reset => f.write_str("system reset to initial state"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event sink failed: {0}")]
pub struct SinkError(pub String);

/// Receiver for human-readable notices.
///
/// Delivery is best-effort: an `Err` from `notify` is logged and dropped by
/// the caller and never interrupts the tick loop.
pub trait EventSink {
    fn notify(&mut self, message: &str) -> Result<(), SinkError>;
}

/// Collects every notice. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Rc<RefCell<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(needle))
    }
}

impl EventSink for RecordingSink {
    fn notify(&mut self, message: &str) -> Result<(), SinkError> {
        self.lines.borrow_mut().push(message.to_string());
        Ok(())
    }
}

/// Forwards notices to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&mut self, message: &str) -> Result<(), SinkError> {
        tracing::info!(target: "rr_model::events", "{message}");
        Ok(())
    }
}

pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: FnMut(&str) -> Result<(), SinkError>,
{
    fn notify(&mut self, message: &str) -> Result<(), SinkError> {
        (self.0)(message)
    }
}

/// Optional sink plus the swallow-and-log policy.
#[derive(Default)]
pub(crate) struct Notifier {
    sink: Option<Box<dyn EventSink>>,
}

impl Notifier {
    pub fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn EventSink>> {
        self.sink.take()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&mut self, event: &OsEvent) {
        if self.sink.is_some() {
            self.note(&event.to_string());
        }
    }

    pub fn note(&mut self, message: &str) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.notify(message) {
                tracing::warn!(%err, "dropping notice");
            }
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}
