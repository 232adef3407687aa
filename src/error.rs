use crate::core::TaskId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("partition count must be at least 1, got {0}")]
    InvalidPartitions(usize),

    #[error("quantum must be at least 1 tick, got {0}")]
    InvalidQuantum(u64),

    #[error("tick budget must be at least 1, got {0}")]
    InvalidTickBudget(u64),

    #[error("packet contains no tasks")]
    EmptyPacket,

    #[error("duplicate task id {0} in packet")]
    DuplicateTaskId(TaskId),

    #[error("task {0} is not part of the packet")]
    UnknownTask(TaskId),

    #[error("failed to parse packet: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read packet: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
