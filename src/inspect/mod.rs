// src/inspect/mod.rs

//! The inspection pipeline: independent collectors over a read-only host
//! root.
//!
//! Eleven inspectors here each own one snapshot section and a disjoint
//! slice of the host filesystem view; the twelfth collector is the secrets
//! gate in [`crate::redact`], which owns the secrets-review section. The
//! shared warning sink is the only mutable state they touch. Inspectors
//! tolerate missing files and missing tools — fidelity loss is reported as
//! an info warning, never as an abort.

pub mod configs;
pub mod containers;
pub mod kernel;
pub mod network;
pub mod packages;
pub mod scheduled;
pub mod security;
pub mod services;
pub mod software;
pub mod storage;
pub mod users;

use crate::exec::{HostBridge, ToolRunner};
use crate::snapshot::{Baseline, HostInfo, Snapshot, WarningSink};
use chrono::{SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Opt-in inspection switches from the CLI.
#[derive(Debug, Clone, Default)]
pub struct InspectConfig {
    pub config_diffs: bool,
    pub deep_binary_scan: bool,
    pub query_podman: bool,
}

/// Everything an inspector may touch.
pub struct Context<'a> {
    pub host_root: &'a Path,
    pub config: &'a InspectConfig,
    pub runner: &'a dyn ToolRunner,
    pub bridge: Option<&'a HostBridge<'a>>,
    pub baseline: &'a Baseline,
    pub warnings: &'a WarningSink,
}

impl<'a> Context<'a> {
    /// Absolute path under the host root for a relative host path.
    pub fn host_path(&self, rel: &str) -> PathBuf {
        self.host_root.join(rel.trim_start_matches('/'))
    }
}

/// One collector. Registration is the static list in [`registry`].
pub trait Inspector {
    fn name(&self) -> &'static str;
    fn depends_on_baseline(&self) -> bool {
        false
    }
    /// Write this inspector's section into the snapshot. Must not touch
    /// any other section and must not write to the host.
    fn run(&self, ctx: &Context, snapshot: &mut Snapshot);
}

/// The static inspector registry, in execution order.
pub fn registry() -> Vec<Box<dyn Inspector>> {
    vec![
        Box::new(packages::PackageInspector),
        Box::new(services::ServiceInspector),
        Box::new(configs::ConfigInspector),
        Box::new(network::NetworkInspector),
        Box::new(storage::StorageInspector),
        Box::new(scheduled::ScheduledInspector),
        Box::new(containers::ContainerInspector),
        Box::new(software::SoftwareInspector),
        Box::new(kernel::KernelInspector),
        Box::new(security::SecurityInspector),
        Box::new(users::UserInspector),
    ]
}

/// Run every registered inspector against a prepared context.
///
/// The baseline resolver has already completed (the two inspectors that
/// depend on it read it from the context); the redaction pass runs after
/// this returns and before anything is rendered.
pub fn run_all(ctx: &Context, snapshot: &mut Snapshot) {
    for inspector in registry() {
        debug!(inspector = inspector.name(), "running");
        inspector.run(ctx, snapshot);
    }
    info!("inspection complete");
}

// =============================================================================
// Host identity
// =============================================================================

/// Read host identity from the os-release file and the hostname file.
pub fn read_host_info(host_root: &Path) -> Option<HostInfo> {
    let text = fs::read_to_string(host_root.join("etc/os-release"))
        .or_else(|_| fs::read_to_string(host_root.join("usr/lib/os-release")))
        .ok()?;

    let mut info = HostInfo::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key {
            "NAME" => info.name = value,
            "ID" => info.id = value,
            "VERSION_ID" => info.version_id = value,
            "PRETTY_NAME" => info.pretty_name = value,
            _ => {}
        }
    }
    info.major = info
        .version_id
        .split('.')
        .next()
        .unwrap_or("")
        .to_string();
    info.arch = std::env::consts::ARCH.to_string();
    info.inspected_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    if let Ok(text) = fs::read_to_string(host_root.join("etc/hostname")) {
        if let Some(line) = text.lines().next() {
            info.hostname = line.trim().to_string();
        }
    }
    Some(info)
}

// =============================================================================
// Shared filesystem helpers
// =============================================================================

/// List a directory sorted by name, returning [] on permission/OS errors.
pub fn safe_iterdir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    paths
}

/// Read a text file, returning "" on any error. Binary-safe via lossy UTF-8.
pub fn safe_read(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Relative host path for an absolute path under the host root.
pub fn rel_path(host_root: &Path, path: &Path) -> String {
    path.strip_prefix(host_root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Directory names that mark a source checkout; a directory containing one
/// is pruned entirely so build trees never surface as deployed software.
const PRUNE_MARKERS: &[&str] = &[".git", ".svn", ".hg"];

/// Directory names that are never descended into.
const SKIP_DIRS: &[&str] = &[
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "node_modules",
    ".eggs",
    ".vscode",
    ".idea",
];

pub fn is_dev_artifact(path: &Path) -> bool {
    path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        PRUNE_MARKERS.contains(&name.as_ref()) || SKIP_DIRS.contains(&name.as_ref())
    })
}

/// Recursive file search that prunes checkouts and build directories.
///
/// `matches` is applied to file names only. Results come back sorted.
pub fn filtered_find(root: &Path, matches: &dyn Fn(&str) -> bool) -> Vec<PathBuf> {
    let mut results = Vec::new();
    walk(root, matches, &mut results);
    results.sort();
    results
}

fn walk(dir: &Path, matches: &dyn Fn(&str) -> bool, results: &mut Vec<PathBuf>) {
    let entries = safe_iterdir(dir);
    let names: Vec<String> = entries
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    if names.iter().any(|n| PRUNE_MARKERS.contains(&n.as_str())) {
        return;
    }
    for entry in entries {
        let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if entry.is_file() && matches(&name) {
            results.push(entry);
        } else if entry.is_dir() && !SKIP_DIRS.contains(&name.as_str()) {
            walk(&entry, matches, results);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release_parsing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/os-release"),
            "NAME=\"CentOS Stream\"\nID=\"centos\"\nVERSION_ID=\"9\"\nPRETTY_NAME=\"CentOS Stream 9\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("etc/hostname"), "db01.example.com\n").unwrap();

        let info = read_host_info(dir.path()).unwrap();
        assert_eq!(info.id, "centos");
        assert_eq!(info.version_id, "9");
        assert_eq!(info.major, "9");
        assert_eq!(info.hostname, "db01.example.com");
        assert!(!info.inspected_at.is_empty());
    }

    #[test]
    fn filtered_find_prunes_checkouts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("app/.git")).unwrap();
        fs::write(dir.path().join("app/package-lock.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("deployed")).unwrap();
        fs::write(dir.path().join("deployed/package-lock.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("deployed/node_modules/x")).unwrap();
        fs::write(dir.path().join("deployed/node_modules/x/package-lock.json"), "{}").unwrap();

        let found = filtered_find(dir.path(), &|n| n == "package-lock.json");
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("deployed/package-lock.json"));
    }
}
