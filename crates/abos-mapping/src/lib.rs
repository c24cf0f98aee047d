//! abos-mapping - Partition mapping and update coordination
//!
//! Keeps one record per boot partition saying which base-OS image it holds,
//! keeps that mapping injective, and reconciles it with the agent's base-OS
//! config/status documents when an image is installed or superseded.
//!
//! # Modules
//!
//! - [`store`] - on-disk mapping records, one JSON file per partition label
//! - [`keyed`] - UUID-keyed base-OS config/status stores
//! - [`coordinator`] - lookup, write-with-cleanup, reset and staging flows
//! - [`config`] - `[storage]` directories

pub mod config;
pub mod coordinator;
pub mod keyed;
pub mod store;

pub use config::StoreConfig;
pub use coordinator::PartitionMapper;
pub use keyed::{BaseOsRegistry, BaseOsStore, KeyedStore};
pub use store::{MappingRecord, PartitionMapStore};
