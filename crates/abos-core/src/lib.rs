//! abos-core - Core types and traits for A/B base-OS updates
//!
//! This crate provides the vocabulary shared by the partition layer
//! (`abos-zboot`) and the mapping layer (`abos-mapping`): partition labels and
//! states, the persisted partition-info record, the external base-OS
//! config/status documents, the error type, and the [`BootControl`]
//! capability that every boot-control implementation provides.

pub mod bootctl;
pub mod error;
pub mod models;

pub use bootctl::{BootControl, BootControlError, BootControlResult};
pub use error::{AbosError, AbosResult};
pub use models::*;
