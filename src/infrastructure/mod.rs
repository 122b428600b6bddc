//! Adapters for the domain ports: stores and notification transports.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod row_lock;
pub mod staged;
pub mod transport;
