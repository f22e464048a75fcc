//! Index and snapshot lifecycle management for Elasticsearch clusters.
//!
//! Three engines share this crate: the filter engine narrows the cluster
//! inventory to an actionable set, the action engine executes declared
//! actions against that set, and the deepfreeze subsystem manages the
//! lifecycle of snapshot repositories on S3/Glacier.

pub mod actions;
pub mod config;
pub mod deepfreeze;
pub mod error;
pub mod filter;
pub mod runner;

pub use config::{ActionFile, CuratorConfig, LoggingConfig};
pub use deepfreeze::Deepfreeze;
pub use error::{Error, ErrorCategory, Result};
pub use runner::{RunReport, Runner};
