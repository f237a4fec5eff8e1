//! swapsched memory statistics
//!
//! Reads system-wide and per-process memory/swap figures from the
//! `/proc` interfaces. Readers never fail: a missing counter reads as zero
//! so a rebalance pass can always proceed with a best-effort snapshot.

mod meminfo;
mod units;

pub use meminfo::{MemoryStatReader, ProcMemoryReader, SystemMemorySnapshot};
pub use units::{format_bytes, GB, KB, MB};
