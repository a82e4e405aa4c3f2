// src/pipeline.rs

//! Pipeline orchestration: baseline, inspectors, redaction, rendering.
//!
//! Stage order is fixed: the baseline resolver completes before the
//! inspectors that depend on it run, and the redaction gate seals the
//! snapshot before any renderer reads it. Inspectors never abort the run;
//! redaction failure is the only mid-pipeline fatal.

use crate::baseline::{self, BaselineResolver};
use crate::error::{Error, Result};
use crate::exec::{HostBridge, HostExec, ToolRunner};
use crate::inspect::{self, InspectConfig};
use crate::redact;
use crate::render;
use crate::snapshot::{Snapshot, WarningSink};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SNAPSHOT_FILENAME: &str = "inspection-snapshot.json";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub host_root: PathBuf,
    pub output_dir: PathBuf,
    pub from_snapshot: Option<PathBuf>,
    pub inspect_only: bool,
    pub target_version: Option<String>,
    pub target_image: Option<String>,
    pub baseline_packages: Option<PathBuf>,
    pub config: InspectConfig,
}

/// Run the pipeline end to end. Returns the sealed snapshot.
pub fn run(
    options: &PipelineOptions,
    runner: &dyn ToolRunner,
    bridge: Option<&HostBridge>,
) -> Result<Snapshot> {
    // Re-render mode: load, re-gate, render
    if let Some(path) = &options.from_snapshot {
        let snapshot = Snapshot::load(path)?;
        // Defense in depth: the stored snapshot is already redacted, but
        // gating again costs little and catches hand-edited files.
        let snapshot = redact::redact_snapshot(snapshot);
        if !options.inspect_only {
            render::run_all(&snapshot, &options.output_dir)?;
        }
        return Ok(snapshot);
    }

    if !options.host_root.is_dir() {
        return Err(Error::HostRootUnreadable(options.host_root.clone()));
    }

    let snapshot = inspect_host(options, runner, bridge)?;
    snapshot.save(&options.output_dir.join(SNAPSHOT_FILENAME))?;

    if !options.inspect_only {
        render::run_all(&snapshot, &options.output_dir)?;
    }
    Ok(snapshot)
}

fn inspect_host(
    options: &PipelineOptions,
    runner: &dyn ToolRunner,
    bridge: Option<&HostBridge>,
) -> Result<Snapshot> {
    let warnings = WarningSink::new();
    let mut snapshot = Snapshot::new();

    // Environment probe
    snapshot.host = inspect::read_host_info(&options.host_root);
    if snapshot.host.is_none() {
        warn!("os-release not found under the host root; target auto-mapping unavailable");
        warnings.warn(
            "host",
            "os-release could not be read; the target image cannot be auto-detected",
        );
    }

    // Target resolution and baseline, ahead of any dependent inspector
    let unknown_host = crate::snapshot::HostInfo::default();
    let host_ref = snapshot.host.as_ref().unwrap_or(&unknown_host);
    snapshot.target = if snapshot.host.is_some() || options.target_image.is_some() {
        baseline::resolve_target(
            host_ref,
            options.target_version.as_deref(),
            options.target_image.as_deref(),
        )
    } else {
        None
    };

    let resolver = BaselineResolver::new(bridge.map(|b| b as &dyn HostExec));
    let baseline = resolver.resolve(
        snapshot.target.as_ref(),
        options.baseline_packages.as_deref(),
        &warnings,
    );
    snapshot.baseline = Some(baseline.clone());

    let ctx = inspect::Context {
        host_root: &options.host_root,
        config: &options.config,
        runner,
        bridge,
        baseline: &baseline,
        warnings: &warnings,
    };
    inspect::run_all(&ctx, &mut snapshot);

    snapshot.warnings = warnings.into_warnings();

    // The gate: after this the snapshot is sealed and read-only
    let snapshot = redact::redact_snapshot(snapshot);
    info!(
        warnings = snapshot.warnings.len(),
        redactions = snapshot.secrets_review.len(),
        "snapshot sealed"
    );
    Ok(snapshot)
}

/// Paths relative to an output directory that the artifact layout defines.
pub fn artifact_paths(output_dir: &Path) -> Vec<PathBuf> {
    [
        "Containerfile",
        "audit-report.md",
        "report.html",
        "README.md",
        "kickstart-suggestion.ks",
        "secrets-review.md",
        SNAPSHOT_FILENAME,
    ]
    .iter()
    .map(|name| output_dir.join(name))
    .collect()
}
