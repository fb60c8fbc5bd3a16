//! Adapters implementing the domain ports.

pub mod in_memory;
pub mod in_memory_queue;
#[cfg(feature = "kafka")]
pub mod kafka;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
