// src/render/triage.rs

//! Triage counts shared by the audit report and the HTML dashboard.

use crate::snapshot::Snapshot;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct Triage {
    /// Items the recipe handles without operator input
    pub automatic: usize,
    /// FIXME markers in the generated Containerfile
    pub fixme: usize,
    /// Items that always need a human (warnings, redactions, SSH keys)
    pub manual: usize,
}

/// Classify inspected items into automatic / fixme / manual buckets.
/// Call after the Containerfile is on disk — FIXMEs are counted from it.
pub fn compute(snapshot: &Snapshot, output_dir: &Path) -> Triage {
    let mut triage = Triage::default();

    if let Some(packages) = &snapshot.packages {
        triage.automatic += packages.added.len() + packages.removed.len();
    }
    if let Some(services) = &snapshot.services {
        triage.automatic += services
            .units
            .iter()
            .filter(|u| u.action != crate::snapshot::ServiceAction::None)
            .count();
    }
    if let Some(configs) = &snapshot.configs {
        triage.automatic += configs.files.len();
    }
    if let Some(network) = &snapshot.network {
        triage.automatic += network.firewall_zones.len();
    }
    if let Some(scheduled) = &snapshot.scheduled {
        triage.automatic += scheduled.generated.len();
    }
    if let Some(users) = &snapshot.users {
        triage.automatic += users.users.len() + users.groups.len();
    }
    if let Some(containers) = &snapshot.containers {
        triage.automatic += containers.quadlets.len();
    }

    if let Ok(text) = fs::read_to_string(output_dir.join("Containerfile")) {
        triage.fixme = text
            .lines()
            .filter(|l| l.trim_start().starts_with('#') && l.contains("FIXME"))
            .count();
    }

    triage.manual = snapshot.warnings.len() + snapshot.secrets_review.len();
    if let Some(users) = &snapshot.users {
        triage.manual += users.ssh_key_refs.len();
    }

    triage
}
