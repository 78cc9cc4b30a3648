//! Flash translation layer simulator.
//!
//! Models NAND erase-before-write constraints under a page-mapped FTL and compares two garbage
//! collection policies: a greedy baseline and a self-tuning multi-objective policy.

pub mod config;
pub mod error;
pub mod ftl;
pub mod gc;
pub mod mapping;
pub mod metrics;
pub mod nand;
pub mod workload;

pub use config::Geometry;
pub use error::{FtlError, Result};
pub use ftl::{Ftl, WriteCounters};
pub use gc::Policy;
pub use metrics::MetricsSnapshot;
pub use nand::PhysicalLocation;
pub use workload::Workload;

/// The device handed to workload drivers.
pub type Device = Ftl;
