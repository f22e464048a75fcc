//! Typed Elasticsearch REST adapter for curator.
//!
//! One cheaply-clonable [`EsClient`] covers the API surface curator uses:
//! index inventory and operations, snapshots and repositories, ILM policies,
//! templates, cluster settings, tasks, and the document primitives backing
//! the deepfreeze status store.

pub mod client;
pub mod cluster;
pub mod config;
pub mod documents;
pub mod error;
pub mod ilm;
pub mod indices;
pub mod snapshots;
pub mod tasks;
pub mod templates;
pub mod types;

pub use client::{chunk_names, EsClient, NAME_CHUNK_LIMIT};
pub use cluster::ClusterHealth;
pub use config::{ApiKeyConfig, AuthMethod, ConnectionConfig};
pub use documents::VersionedDoc;
pub use error::{EsError, Result};
pub use ilm::IlmPolicy;
pub use tasks::TaskStatus;
pub use templates::TemplateInfo;
pub use types::{
    DataStreamInfo, IndexInfo, IndexState, NodeInfo, RepositoryInfo, SnapshotInfo, SnapshotState,
    StoreSnapshot,
};
