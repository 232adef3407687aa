pub mod config;
pub mod driver;
pub mod job;

pub use config::SimConfig;
pub use driver::{PartitionChange, RunSummary, Sim};
pub use job::{Job, PacketFile, load_packet, parse_packet};
