//! # statechart-service
//!
//! Host-facing layer of the statechart engine.
//!
//! This crate provides:
//! - The chart store (immutable, checksum-addressed snapshots)
//! - The instance registry with per-instance exclusive locks
//! - The operations facade a transport layer maps onto its protocol
//! - Service configuration

pub mod config;
pub mod error;
pub mod registry;
pub mod service;
pub mod store;

pub use config::{ConfigError, ServiceConfig};
pub use error::ServiceError;
pub use registry::InstanceRegistry;
pub use service::{StartResult, StateChartService};
pub use store::ChartStore;
