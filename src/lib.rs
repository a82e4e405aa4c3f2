// src/lib.rs

//! Retrofit
//!
//! Inspects a live package-managed Linux host (RHEL, CentOS Stream, Fedora
//! family) through a read-only mount and produces a reproducible image-based
//! build recipe: a Containerfile, a mirrored config tree, audit and HTML
//! reports, a kickstart fragment, and a canonical JSON snapshot.
//!
//! # Architecture
//!
//! - Snapshot-first: the inspection half writes one typed document; the
//!   rendering half is a set of pure functions over it
//! - Independent inspectors over the read-only host view, one snapshot
//!   section each
//! - A privilege bridge is the only path that crosses into the host's
//!   namespaces (baseline queries, live container enumeration, validation)
//! - A mandatory redaction gate seals the snapshot before anything renders

pub mod baseline;
mod error;
pub mod exec;
pub mod github;
pub mod inspect;
pub mod pipeline;
pub mod redact;
pub mod render;
pub mod snapshot;
pub mod validate;

pub use error::{Error, Result};
pub use exec::{
    FakeRunner, HostBridge, HostExec, ProbeStatus, RunOutput, SystemRunner, ToolRunner,
};
pub use pipeline::{run as run_pipeline, PipelineOptions, SNAPSHOT_FILENAME};
pub use snapshot::{service_action, Snapshot, SCHEMA_VERSION};
