// src/render/audit.rs

//! Markdown audit report: the full human-readable findings document.

use super::triage;
use crate::error::Result;
use crate::snapshot::{
    BaselineMode, ConfigKind, ProfileMethod, ResolvProvenance, ServiceAction, Snapshot,
    TimerSource,
};
use std::fs;
use std::path::Path;

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let content = build(snapshot, output_dir);
    fs::write(output_dir.join("audit-report.md"), content)?;
    Ok(())
}

fn build(snapshot: &Snapshot, output_dir: &Path) -> String {
    let mut lines: Vec<String> = vec!["# Audit Report".into(), String::new()];

    if let Some(host) = &snapshot.host {
        let desc = if host.pretty_name.is_empty() {
            host.name.clone()
        } else {
            host.pretty_name.clone()
        };
        lines.push(format!("**Host:** `{}` — {desc}", host.hostname));
        if !host.inspected_at.is_empty() {
            lines.push(format!("**Inspected:** {}", host.inspected_at));
        }
        lines.push(String::new());
    }

    executive_summary(snapshot, output_dir, &mut lines);
    packages_section(snapshot, &mut lines);
    services_section(snapshot, &mut lines);
    configs_section(snapshot, &mut lines);
    network_section(snapshot, &mut lines);
    storage_section(snapshot, &mut lines);
    scheduled_section(snapshot, &mut lines);
    containers_section(snapshot, &mut lines);
    software_section(snapshot, &mut lines);
    kernel_section(snapshot, &mut lines);
    security_section(snapshot, &mut lines);
    users_section(snapshot, &mut lines);
    warnings_section(snapshot, &mut lines);
    redactions_section(snapshot, &mut lines);

    lines.join("\n")
}

fn executive_summary(snapshot: &Snapshot, output_dir: &Path, lines: &mut Vec<String>) {
    lines.push("## Executive Summary".into());
    lines.push(String::new());
    let triage = triage::compute(snapshot, output_dir);
    lines.push(format!(
        "**{}** items handled automatically | **{}** FIXME items (need review) | \
         **{}** items needing manual intervention",
        triage.automatic, triage.fixme, triage.manual
    ));
    lines.push(String::new());

    let no_baseline = snapshot
        .baseline
        .as_ref()
        .map(|b| b.mode == BaselineMode::AllPackages)
        .unwrap_or(true);
    if let Some(packages) = &snapshot.packages {
        if no_baseline {
            lines.push(format!(
                "- Packages (no baseline — all installed): {}",
                packages.added.len()
            ));
        } else {
            lines.push(format!(
                "- Packages added beyond the base image: {}",
                packages.added.len()
            ));
            lines.push(format!("- Packages removed: {}", packages.removed.len()));
        }
    }
    if let Some(configs) = &snapshot.configs {
        lines.push(format!("- Config files captured: {}", configs.files.len()));
    }
    if let Some(containers) = &snapshot.containers {
        lines.push(format!(
            "- Container workloads: {} quadlet, {} compose",
            containers.quadlets.len(),
            containers.compose_files.len()
        ));
    }
    lines.push(format!("- Secrets redacted: {}", snapshot.secrets_review.len()));
    lines.push(String::new());
}

fn packages_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(packages) = &snapshot.packages else { return };
    lines.push("## Packages".into());
    lines.push(String::new());

    if let Some(baseline) = &snapshot.baseline {
        match baseline.mode {
            BaselineMode::AllPackages => {
                lines.push("*No baseline — every installed package is listed as added.*".into())
            }
            _ => {
                let image = snapshot
                    .target
                    .as_ref()
                    .map(|t| t.reference.clone())
                    .unwrap_or_else(|| "target base image".into());
                lines.push(format!(
                    "Baseline: {} package(s) from `{image}`.",
                    baseline.package_names.len()
                ));
            }
        }
        lines.push(String::new());
    }

    lines.push("### Added".into());
    for record in &packages.added {
        lines.push(format!(
            "- {} {}-{}.{}",
            record.name, record.version, record.release, record.arch
        ));
    }
    lines.push(String::new());

    if !packages.removed.is_empty() {
        lines.push("### Removed (present in baseline, absent on host)".into());
        for name in &packages.removed {
            lines.push(format!("- {name}"));
        }
        lines.push(String::new());
    }
    if !packages.verify.is_empty() {
        lines.push("### Modified files (package verify pass)".into());
        for entry in &packages.verify {
            lines.push(format!("- `{}` ({})", entry.path, entry.flags));
        }
        lines.push(String::new());
    }
    if !packages.history_removed.is_empty() {
        lines.push("### Installed then removed".into());
        lines.push(String::new());
        lines.push(
            "These packages may have left configuration or state behind:".into(),
        );
        lines.push(String::new());
        for name in &packages.history_removed {
            lines.push(format!("- {name}"));
        }
        lines.push(String::new());
    }
}

fn services_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(services) = &snapshot.services else { return };
    let changed: Vec<_> = services
        .units
        .iter()
        .filter(|u| u.action != ServiceAction::None)
        .collect();
    if changed.is_empty() {
        return;
    }
    lines.push("## Services".into());
    lines.push(String::new());
    lines.push("| Unit | Current | Default | Action |".into());
    lines.push("|---|---|---|---|".into());
    for unit in changed {
        lines.push(format!(
            "| {} | {:?} | {:?} | {:?} |",
            unit.unit, unit.current, unit.default, unit.action
        ));
    }
    lines.push(String::new());
}

fn configs_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(configs) = &snapshot.configs else { return };
    if configs.files.is_empty() {
        return;
    }
    lines.push("## Configuration Files".into());
    lines.push(String::new());

    let groups: [(&str, ConfigKind); 3] = [
        ("Modified (package-owned)", ConfigKind::OwnedModified),
        ("Unowned", ConfigKind::Unowned),
        ("Orphaned (from removed packages)", ConfigKind::Orphaned),
    ];
    for (title, kind) in groups {
        let files = configs.of_kind(kind);
        if files.is_empty() {
            continue;
        }
        lines.push(format!("### {title} ({})", files.len()));
        for file in files {
            let mut annotations = Vec::new();
            if let Some(flags) = &file.verify_flags {
                annotations.push(format!("verify: {flags}"));
            }
            if let Some(package) = &file.package {
                annotations.push(format!("package: {package}"));
            }
            if let Some(note) = &file.note {
                annotations.push(note.clone());
            }
            let suffix = if annotations.is_empty() {
                String::new()
            } else {
                format!(" ({})", annotations.join(", "))
            };
            lines.push(format!("- `{}`{suffix}", file.path));
            if let Some(diff) = &file.diff {
                lines.push(String::new());
                lines.push("  ```diff".into());
                for diff_line in diff.lines() {
                    lines.push(format!("  {diff_line}"));
                }
                lines.push("  ```".into());
            }
        }
        lines.push(String::new());
    }
}

fn network_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(network) = &snapshot.network else { return };
    lines.push("## Network".into());
    lines.push(String::new());

    if !network.connections.is_empty() {
        lines.push("### Connection profiles".into());
        for profile in &network.connections {
            let class = match profile.method {
                ProfileMethod::Static => "static — baked into image",
                ProfileMethod::Dynamic => "dynamic — deploy-time (kickstart)",
            };
            lines.push(format!("- {} ({}): {class}", profile.name, profile.kind));
        }
        lines.push(String::new());
    }
    if !network.firewall_zones.is_empty() {
        lines.push("### Firewall zones".into());
        for zone in &network.firewall_zones {
            lines.push(format!(
                "- **{}**: services [{}], ports [{}], {} rich rule(s)",
                zone.name,
                zone.services.join(", "),
                zone.ports.join(", "),
                zone.rich_rules.len()
            ));
        }
        lines.push(String::new());
    }
    if let Some(resolv) = network.resolv {
        let text = match resolv {
            ResolvProvenance::NetworkManager => "managed by NetworkManager",
            ResolvProvenance::SystemdResolved => "managed by systemd-resolved",
            ResolvProvenance::HandEdited => "**hand-edited** — needs a decision",
            ResolvProvenance::Unknown => "undetermined",
        };
        lines.push(format!("DNS (resolv.conf): {text}"));
        lines.push(String::new());
    }
    if !network.hosts_additions.is_empty() {
        lines.push("### /etc/hosts additions".into());
        for entry in &network.hosts_additions {
            lines.push(format!("- `{entry}`"));
        }
        lines.push(String::new());
    }
    if !network.proxy.is_empty() {
        lines.push("### Proxy configuration".into());
        for proxy in &network.proxy {
            lines.push(format!("- `{}` ({})", proxy.line, proxy.source));
        }
        lines.push(String::new());
    }
}

fn storage_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(storage) = &snapshot.storage else { return };
    lines.push("## Storage Migration Plan".into());
    lines.push(String::new());

    if !storage.mounts.is_empty() {
        lines.push("| Mount | Source | Type | Strategy |".into());
        lines.push("|---|---|---|---|".into());
        for mount in &storage.mounts {
            lines.push(format!(
                "| {} | {} | {} | {} |",
                mount.target, mount.source, mount.fstype, mount.strategy
            ));
        }
        lines.push(String::new());
    }
    if !storage.volumes.is_empty() {
        lines.push("### Logical volumes".into());
        for volume in &storage.volumes {
            lines.push(format!(
                "- {}/{} ({})",
                volume.vg_name, volume.lv_name, volume.size
            ));
        }
        lines.push(String::new());
    }
    if !storage.state_dirs.is_empty() {
        lines.push("### Data under /var".into());
        lines.push(String::new());
        lines.push("| Directory | Size | Recommendation |".into());
        lines.push("|---|---|---|".into());
        for dir in &storage.state_dirs {
            lines.push(format!(
                "| /{} | {} | {} |",
                dir.path, dir.size_estimate, dir.recommendation
            ));
        }
        lines.push(String::new());
    }
}

fn scheduled_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(scheduled) = &snapshot.scheduled else { return };
    if scheduled.cron_entries.is_empty()
        && scheduled.timers.is_empty()
        && scheduled.at_jobs.is_empty()
    {
        return;
    }
    lines.push("## Scheduled Tasks".into());
    lines.push(String::new());

    if !scheduled.cron_entries.is_empty() {
        lines.push("### Cron entries (converted to timers)".into());
        lines.push(String::new());
        lines.push("| Source | Schedule | User | Command |".into());
        lines.push("|---|---|---|---|".into());
        for entry in &scheduled.cron_entries {
            lines.push(format!(
                "| {} | `{}` | {} | `{}` |",
                entry.path, entry.schedule, entry.user, entry.command
            ));
        }
        lines.push(String::new());
    }
    let local: Vec<_> = scheduled
        .timers
        .iter()
        .filter(|t| t.source == TimerSource::Local)
        .collect();
    if !local.is_empty() {
        lines.push("### Local timers".into());
        for timer in local {
            lines.push(format!(
                "- {} (`{}`) → `{}`",
                timer.name, timer.on_calendar, timer.exec_start
            ));
        }
        lines.push(String::new());
    }
    if !scheduled.at_jobs.is_empty() {
        lines.push("### Pending at-jobs (manual intervention)".into());
        for job in &scheduled.at_jobs {
            lines.push(format!("- `{}` ({}): `{}`", job.file, job.user, job.command));
        }
        lines.push(String::new());
    }
}

fn containers_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(containers) = &snapshot.containers else { return };
    if containers.quadlets.is_empty() && containers.compose_files.is_empty() && containers.live.is_empty()
    {
        return;
    }
    lines.push("## Container Workloads".into());
    lines.push(String::new());
    for unit in &containers.quadlets {
        lines.push(format!("- Quadlet `{}` → {}", unit.name, unit.image));
    }
    for file in &containers.compose_files {
        lines.push(format!("- Compose `{}`:", file.path));
        for service in &file.services {
            lines.push(format!("  - {}: {}", service.service, service.image));
        }
    }
    for container in &containers.live {
        lines.push(format!(
            "- Live: {} ({}) — {}",
            container.name, container.image, container.status
        ));
    }
    lines.push(String::new());
}

fn software_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(software) = &snapshot.software else { return };
    if software.items.is_empty() {
        return;
    }
    lines.push("## Non-Package Software".into());
    lines.push(String::new());
    lines.push("| Path | Provenance | Confidence | Detection |".into());
    lines.push("|---|---|---|---|".into());
    for item in &software.items {
        lines.push(format!(
            "| /{} | {:?} | {:?} | {} |",
            item.path, item.provenance, item.confidence, item.method
        ));
    }
    lines.push(String::new());
}

fn kernel_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(kernel) = &snapshot.kernel else { return };
    lines.push("## Kernel and Boot".into());
    lines.push(String::new());
    if !kernel.cmdline.is_empty() {
        lines.push(format!("Command line: `{}`", kernel.cmdline));
        lines.push(String::new());
    }
    if !kernel.sysctl_overrides.is_empty() {
        lines.push("### Sysctl divergence".into());
        lines.push(String::new());
        lines.push("| Key | Runtime | Default | Source |".into());
        lines.push("|---|---|---|---|".into());
        for entry in &kernel.sysctl_overrides {
            lines.push(format!(
                "| {} | {} | {} | {} |",
                entry.key, entry.runtime, entry.default, entry.source
            ));
        }
        lines.push(String::new());
    }
    if !kernel.non_default_modules.is_empty() {
        lines.push("### Non-default loaded modules".into());
        for module in &kernel.non_default_modules {
            lines.push(format!("- {}", module.name));
        }
        lines.push(String::new());
    }
}

fn security_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(security) = &snapshot.security else { return };
    lines.push("## Security Policy".into());
    lines.push(String::new());
    lines.push(format!(
        "Mode: **{}** (policy: {})",
        security.mode, security.policy_type
    ));
    if security.fips_mode {
        lines.push("FIPS mode: **enabled**".into());
    }
    lines.push(String::new());
    if !security.custom_modules.is_empty() {
        lines.push(format!(
            "Custom policy modules: {}",
            security.custom_modules.join(", ")
        ));
        lines.push(String::new());
    }
    if !security.booleans.is_empty() {
        lines.push("### Non-default booleans".into());
        for boolean in &security.booleans {
            lines.push(format!(
                "- {} = {} (default {})",
                boolean.name, boolean.current, boolean.default
            ));
        }
        lines.push(String::new());
    }
    if !security.audit_rules.is_empty() {
        lines.push(format!("Audit rule files: {}", security.audit_rules.len()));
        lines.push(String::new());
    }
}

fn users_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(users) = &snapshot.users else { return };
    if users.users.is_empty() && users.groups.is_empty() {
        return;
    }
    lines.push("## Users and Groups".into());
    lines.push(String::new());
    for user in &users.users {
        lines.push(format!(
            "- {} (uid {}, home {}, shell {})",
            user.name, user.uid, user.home, user.shell
        ));
    }
    for group in &users.groups {
        lines.push(format!("- group {} (gid {})", group.name, group.gid));
    }
    if !users.ssh_key_refs.is_empty() {
        lines.push(String::new());
        lines.push("SSH authorized_keys present (inject at deploy time, never baked):".into());
        for reference in &users.ssh_key_refs {
            lines.push(format!("- {} ({})", reference.path, reference.user));
        }
    }
    lines.push(String::new());
}

fn warnings_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    if snapshot.warnings.is_empty() {
        return;
    }
    lines.push("## Warnings".into());
    lines.push(String::new());
    for warning in &snapshot.warnings {
        lines.push(format!(
            "- **{:?}** [{}] {}",
            warning.severity, warning.source, warning.message
        ));
    }
    lines.push(String::new());
}

fn redactions_section(snapshot: &Snapshot, lines: &mut Vec<String>) {
    if snapshot.secrets_review.is_empty() {
        return;
    }
    lines.push("## Redactions".into());
    lines.push(String::new());
    lines.push("See `secrets-review.md` for remediation guidance.".into());
    lines.push(String::new());
    for event in &snapshot.secrets_review {
        lines.push(format!(
            "- `{}` ({}, line {})",
            event.path, event.class, event.line
        ));
    }
    lines.push(String::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PackageRecord, PackageSection};

    #[test]
    fn report_lists_added_packages() {
        let mut snapshot = Snapshot::new();
        snapshot.packages = Some(PackageSection {
            added: vec![PackageRecord {
                name: "nginx".into(),
                epoch: "0".into(),
                version: "1.24.0".into(),
                release: "4.el9".into(),
                arch: "x86_64".into(),
            }],
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let content = build(&snapshot, dir.path());
        assert!(content.contains("# Audit Report"));
        assert!(content.contains("- nginx 1.24.0-4.el9.x86_64"));
    }
}
