//! 记忆层：有界 FIFO 日志与周期记忆条目（仅进程内，不持久化）

pub mod bounded;
pub mod entry;

pub use bounded::BoundedLog;
pub use entry::{summarize_input, MemoryEntry, MemoryOutcome};
