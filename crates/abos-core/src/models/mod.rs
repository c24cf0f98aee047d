//! Data models for partitions and base-OS documents

mod baseos;
mod partition;

pub use baseos::*;
pub use partition::*;
