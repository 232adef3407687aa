pub mod core;
pub mod error;
pub mod packet;
pub mod sim;

pub use error::SimError;
pub use packet::{Packet, PacketShape};
pub use sim::{Job, Sim, SimConfig};
