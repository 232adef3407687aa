use crate::{
    core::Ticks,
    error::{Result, SimError},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Initial number of memory partitions.
    pub partitions: usize,
    /// Total RAM in MB. Reported only; admission is gated by partitions.
    pub memory_mb: u64,
    /// Tick budget for one run.
    pub max_ticks: Ticks,
    /// Round-Robin time slice in ticks.
    pub quantum: Ticks,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            memory_mb: 4096,
            max_ticks: 1000,
            quantum: 1,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(SimError::InvalidPartitions(self.partitions));
        }
        if self.quantum == 0 {
            return Err(SimError::InvalidQuantum(self.quantum));
        }
        if self.max_ticks == 0 {
            return Err(SimError::InvalidTickBudget(self.max_ticks));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
