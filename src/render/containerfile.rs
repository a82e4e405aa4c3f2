// src/render/containerfile.rs

//! Layered Containerfile renderer.
//!
//! Layer order is fixed so that the layers that change least come first,
//! maximizing build-cache reuse: build stage, base image, repos, packages,
//! services, firewall, scheduled tasks, the consolidated config copy,
//! non-package software, quadlets, users, kernel, security policy, network
//! notes, transient state declarations. Every directive carries a comment
//! saying what was detected; anything unresolved is FIXME-marked.

use super::{config_tree, shell_safe};
use crate::error::Result;
use crate::snapshot::{
    ConfigKind, ProfileMethod, Provenance, ResolvProvenance, ServiceAction, Snapshot,
    TimerSource,
};
use std::fs;
use std::path::Path;

/// Python version shipped per distribution major, for the multi-stage copy.
fn python_version(snapshot: &Snapshot) -> Option<&'static str> {
    let host = snapshot.host.as_ref()?;
    match host.major.as_str() {
        "9" => Some("3.9"),
        "10" => Some("3.12"),
        _ if host.id == "fedora" => Some("3.12"),
        _ => None,
    }
}

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let content = build(snapshot, output_dir);
    fs::write(output_dir.join("Containerfile"), content)?;
    Ok(())
}

pub fn build(snapshot: &Snapshot, output_dir: &Path) -> String {
    let mut lines: Vec<String> = Vec::new();
    let base = snapshot.base_image();

    // Pip packages that need a compiler get built in a throwaway stage
    let mut native_pip: Vec<(String, String)> = Vec::new();
    let mut pure_pip: Vec<(String, String)> = Vec::new();
    if let Some(software) = &snapshot.software {
        for item in &software.items {
            if item.method == "pip dist-info" {
                if let Some(version) = &item.version {
                    if item.has_native_extensions {
                        native_pip.push((item.name.clone(), version.clone()));
                    } else {
                        pure_pip.push((item.name.clone(), version.clone()));
                    }
                }
            }
        }
    }
    native_pip.sort();
    pure_pip.sort();

    // --- 1. Build stage ---
    if !native_pip.is_empty() {
        lines.push("# === Build stage: pip packages with compiled extensions ===".into());
        lines.push(format!("FROM {base} AS builder"));
        lines.push("RUN dnf install -y gcc python3-devel make && dnf clean all".into());
        lines.push("RUN python3 -m venv /tmp/pip-build".into());
        let specs: Vec<String> = native_pip
            .iter()
            .map(|(n, v)| format!("{n}=={v}"))
            .collect();
        lines.push(format!("RUN /tmp/pip-build/bin/pip install {}", specs.join(" ")));
        lines.push(String::new());
    }

    // --- 2. Base image ---
    lines.push("# === Base Image ===".into());
    if let Some(host) = &snapshot.host {
        let desc = if host.pretty_name.is_empty() {
            host.name.clone()
        } else {
            host.pretty_name.clone()
        };
        lines.push(format!("# Source host: {desc} ({})", host.hostname));
    }
    lines.push(format!("FROM {base}"));
    if snapshot.target.as_ref().map(|t| t.cross_major).unwrap_or(false) {
        lines.push(String::new());
        lines.push("# !! CROSS-MAJOR-VERSION MIGRATION !!".into());
        if let Some(host) = &snapshot.host {
            lines.push(format!("# Source: {} {}", host.name, host.version_id));
        }
        lines.push(format!("# Target: {base}"));
        lines.push("# Package names, service names, and config formats may have changed.".into());
        lines.push("# Review every directive below more carefully than a same-version migration.".into());
    }
    lines.push(String::new());

    if !native_pip.is_empty() {
        lines.push("# === Pre-built pip packages from the build stage ===".into());
        match python_version(snapshot) {
            Some(py) => lines.push(format!(
                "COPY --from=builder /tmp/pip-build/lib/python{py}/site-packages/ /usr/lib/python{py}/site-packages/"
            )),
            None => {
                lines.push("# FIXME: replace python3.X with the interpreter version in the base image".into());
                lines.push(
                    "COPY --from=builder /tmp/pip-build/lib/python3.X/site-packages/ /usr/lib/python3.X/site-packages/"
                        .into(),
                );
            }
        }
        lines.push(String::new());
    }

    // --- 3. Repositories ---
    if let Some(packages) = &snapshot.packages {
        if !packages.repo_files.is_empty() {
            lines.push("# === Repository Configuration ===".into());
            lines.push(format!(
                "# Detected: {} repo file(s) — included in the COPY config/etc/ layer below",
                packages.repo_files.len()
            ));
            lines.push(String::new());
        }
    }

    // --- 4. Packages ---
    render_packages(snapshot, &mut lines);

    // --- 5. Services ---
    render_services(snapshot, &mut lines);

    // --- 6. Firewall ---
    render_firewall(snapshot, &mut lines);

    // --- 7. Scheduled tasks ---
    render_scheduled(snapshot, &mut lines);

    // --- 8. Consolidated config copy ---
    render_config_copy(snapshot, output_dir, &mut lines);

    // --- 9. Non-package software ---
    render_software(snapshot, &mut lines, &pure_pip);

    // --- 10. Quadlets ---
    if let Some(containers) = &snapshot.containers {
        if !containers.quadlets.is_empty() || !containers.compose_files.is_empty() {
            lines.push("# === Container Workloads (Quadlet) ===".into());
            if !containers.compose_files.is_empty() {
                lines.push(format!(
                    "# FIXME: {} compose file(s) detected — convert each service to a quadlet unit",
                    containers.compose_files.len()
                ));
                for file in &containers.compose_files {
                    for service in &file.services {
                        lines.push(format!("#   {}: {} ({})", file.path, service.service, service.image));
                    }
                }
            }
            if !containers.quadlets.is_empty() {
                lines.push(format!("# Detected: {} quadlet unit(s)", containers.quadlets.len()));
                lines.push("COPY quadlet/ /etc/containers/systemd/".into());
            }
            lines.push(String::new());
        }
    }

    // --- 11. Users and groups ---
    render_users(snapshot, &mut lines);

    // --- 12. Kernel ---
    render_kernel(snapshot, &mut lines);

    // --- 13. Security policy ---
    render_security(snapshot, &mut lines);

    // --- 14. Network / deploy-time ---
    render_network(snapshot, &mut lines);

    // --- 15. Transient state ---
    lines.push("# === Mutable state (/var) ===".into());
    lines.push("# Directories declared in etc/tmpfiles.d/retrofit-state.conf (COPY above)".into());
    lines.push("# are created on every boot; data migration is listed in the audit report.".into());
    lines.push(String::new());

    lines.join("\n")
}

fn render_packages(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(packages) = &snapshot.packages else { return };
    let no_baseline = snapshot
        .baseline
        .as_ref()
        .map(|b| b.is_empty())
        .unwrap_or(true);

    if !packages.added.is_empty() {
        lines.push("# === Package Installation ===".into());
        if no_baseline {
            lines.push("# No baseline available — listing every installed package".into());
        } else {
            lines.push(format!(
                "# Detected: {} package(s) added beyond the base image",
                packages.added.len()
            ));
        }
        // Multi-arch installs repeat a name; dnf wants it once
        let mut seen = std::collections::BTreeSet::new();
        let mut safe: Vec<&str> = Vec::new();
        for record in &packages.added {
            if !seen.insert(record.name.as_str()) {
                continue;
            }
            if shell_safe(&record.name) {
                safe.push(&record.name);
            } else {
                lines.push(format!(
                    "# FIXME: package name contains shell metacharacters, skipped: {:?}",
                    record.name
                ));
            }
        }
        if !safe.is_empty() {
            lines.push("RUN dnf install -y \\".into());
            for name in &safe[..safe.len() - 1] {
                lines.push(format!("    {name} \\"));
            }
            lines.push(format!("    {} \\", safe[safe.len() - 1]));
            lines.push("    && dnf clean all".into());
        }
        lines.push(String::new());
    }

    if !packages.removed.is_empty() {
        lines.push("# === Package Removal ===".into());
        lines.push(format!(
            "# Detected: {} base-image package(s) absent from the host",
            packages.removed.len()
        ));
        let safe: Vec<&str> = packages
            .removed
            .iter()
            .filter(|n| shell_safe(n))
            .map(String::as_str)
            .collect();
        if !safe.is_empty() {
            lines.push(format!("RUN dnf remove -y {} && dnf clean all", safe.join(" ")));
        }
        lines.push(String::new());
    }
}

fn render_services(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(services) = &snapshot.services else { return };
    let enable: Vec<&str> = services
        .units_with(ServiceAction::Enable)
        .iter()
        .map(|u| u.unit.as_str())
        .filter(|u| shell_safe(u))
        .collect();
    let disable: Vec<&str> = services
        .units_with(ServiceAction::Disable)
        .iter()
        .map(|u| u.unit.as_str())
        .filter(|u| shell_safe(u))
        .collect();
    let mask: Vec<&str> = services
        .units_with(ServiceAction::Mask)
        .iter()
        .map(|u| u.unit.as_str())
        .filter(|u| shell_safe(u))
        .collect();
    if enable.is_empty() && disable.is_empty() && mask.is_empty() {
        return;
    }
    lines.push("# === Service Enablement ===".into());
    lines.push(format!(
        "# Detected: {} to enable, {} to disable, {} to mask (vs base-image presets)",
        enable.len(),
        disable.len(),
        mask.len()
    ));
    if !enable.is_empty() {
        lines.push(format!("RUN systemctl enable {}", enable.join(" ")));
    }
    if !disable.is_empty() {
        lines.push(format!("RUN systemctl disable {}", disable.join(" ")));
    }
    if !mask.is_empty() {
        lines.push(format!("RUN systemctl mask {}", mask.join(" ")));
    }
    lines.push(String::new());
}

fn render_firewall(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(network) = &snapshot.network else { return };
    if network.firewall_zones.is_empty() && network.direct_rules.is_empty() {
        return;
    }
    lines.push("# === Firewall Configuration ===".into());
    if !network.firewall_zones.is_empty() {
        let rich: usize = network.firewall_zones.iter().map(|z| z.rich_rules.len()).sum();
        let mut note = format!("# Detected: {} zone(s)", network.firewall_zones.len());
        if rich > 0 {
            note.push_str(&format!(", {rich} rich rule(s)"));
        }
        note.push_str(" — zone files included in the COPY config/etc/ layer below");
        lines.push(note);
    }
    if !network.direct_rules.is_empty() {
        lines.push(format!(
            "# Detected: {} direct rule(s) — etc/firewalld/direct.xml included below",
            network.direct_rules.len()
        ));
    }
    lines.push("# Equivalent offline commands (alternative to copying zone files):".into());
    for zone in &network.firewall_zones {
        for service in &zone.services {
            lines.push(format!(
                "# RUN firewall-offline-cmd --zone={} --add-service={service}",
                zone.name
            ));
        }
        for port in &zone.ports {
            lines.push(format!(
                "# RUN firewall-offline-cmd --zone={} --add-port={port}",
                zone.name
            ));
        }
        for rule in &zone.rich_rules {
            lines.push(format!(
                "# RUN firewall-offline-cmd --zone={} --add-rich-rule='{rule}'",
                zone.name
            ));
        }
    }
    for rule in &network.direct_rules {
        lines.push(format!(
            "# RUN firewall-offline-cmd --direct --add-rule {} {} {} {} {}",
            rule.ipv, rule.table, rule.chain, rule.priority, rule.args
        ));
    }
    lines.push(String::new());
}

fn render_scheduled(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(scheduled) = &snapshot.scheduled else { return };
    if scheduled.generated.is_empty() && scheduled.timers.is_empty() && scheduled.at_jobs.is_empty()
    {
        return;
    }
    lines.push("# === Scheduled Tasks ===".into());

    let local: Vec<_> = scheduled
        .timers
        .iter()
        .filter(|t| t.source == TimerSource::Local)
        .collect();
    let vendor: Vec<_> = scheduled
        .timers
        .iter()
        .filter(|t| t.source == TimerSource::Vendor)
        .collect();

    if !local.is_empty() {
        lines.push(format!(
            "# Existing local timer(s) ({}): unit files included in the COPY config/etc/ layer below",
            local.len()
        ));
        for timer in &local {
            if shell_safe(&timer.name) {
                lines.push(format!("RUN systemctl enable {}.timer", timer.name));
            }
        }
    }
    if !vendor.is_empty() {
        lines.push(format!(
            "# Vendor timer(s) ({}): shipped by the base image, no action needed",
            vendor.len()
        ));
        for timer in &vendor {
            lines.push(format!("#   {} ({})", timer.name, timer.on_calendar));
        }
    }
    if !scheduled.generated.is_empty() {
        lines.push(format!(
            "# Converted from cron: {} timer(s) — unit files included below",
            scheduled.generated.len()
        ));
        for unit in &scheduled.generated {
            if !unit.converted {
                lines.push(format!(
                    "# FIXME: review {}.timer — schedule '{}' did not convert cleanly",
                    unit.name, unit.cron_expr
                ));
            }
            if shell_safe(&unit.name) {
                lines.push(format!("RUN systemctl enable {}.timer", unit.name));
            }
        }
    }
    if !scheduled.at_jobs.is_empty() {
        lines.push(format!(
            "# FIXME: {} pending at-job(s) found — convert to timers or re-queue after deploy",
            scheduled.at_jobs.len()
        ));
        for job in &scheduled.at_jobs {
            lines.push(format!("#   at job: {}", job.command));
        }
    }
    lines.push(String::new());
}

fn render_config_copy(snapshot: &Snapshot, output_dir: &Path, lines: &mut Vec<String>) {
    lines.push("# === Configuration Files ===".into());
    let dynamic_paths = config_tree::dynamic_profile_paths(snapshot);

    if let Some(configs) = &snapshot.configs {
        let kept: Vec<_> = configs
            .files
            .iter()
            .filter(|f| !dynamic_paths.contains(&f.path))
            .collect();
        let modified: Vec<_> = kept
            .iter()
            .filter(|f| f.kind == ConfigKind::OwnedModified)
            .collect();
        let unowned: Vec<_> = kept.iter().filter(|f| f.kind == ConfigKind::Unowned).collect();
        let orphaned: Vec<_> = kept.iter().filter(|f| f.kind == ConfigKind::Orphaned).collect();

        if !modified.is_empty() {
            lines.push(format!("# Modified package-owned configs ({}):", modified.len()));
            for file in &modified {
                let flags = file
                    .verify_flags
                    .as_ref()
                    .map(|f| format!(" (verify: {f})"))
                    .unwrap_or_default();
                lines.push(format!("#   {}{flags}", file.path));
                if file.diff.is_some() {
                    lines.push("#     full diff in audit-report.md".into());
                }
            }
        }
        if !unowned.is_empty() {
            lines.push(format!("# Unowned configs ({}):", unowned.len()));
            for file in unowned.iter().take(10) {
                lines.push(format!("#   {}", file.path));
            }
            if unowned.len() > 10 {
                lines.push(format!("#   ... and {} more", unowned.len() - 10));
            }
        }
        if !orphaned.is_empty() {
            lines.push(format!(
                "# Orphaned configs from removed packages ({}):",
                orphaned.len()
            ));
            for file in orphaned.iter().take(5) {
                lines.push(format!("#   {}", file.path));
            }
        }
    }

    let roots = config_tree::copy_roots(output_dir);
    if roots.is_empty() {
        lines.push("# (no config files captured)".into());
    }
    for root in &roots {
        lines.push(format!("COPY config/{root}/ /{root}/"));
    }
    lines.push(String::new());
}

fn render_software(snapshot: &Snapshot, lines: &mut Vec<String>, pure_pip: &[(String, String)]) {
    let Some(software) = &snapshot.software else { return };
    if software.items.is_empty() {
        return;
    }
    lines.push("# === Non-Package Software ===".into());

    for item in &software.items {
        match item.provenance {
            Provenance::GoBinary | Provenance::RustBinary => {
                let language = if item.provenance == Provenance::GoBinary {
                    "Go"
                } else {
                    "Rust"
                };
                let linking = if item.static_link {
                    "statically linked"
                } else {
                    "dynamically linked"
                };
                lines.push(format!("# FIXME: {language} binary at /{} ({linking})", item.path));
                lines.push(
                    "# Rebuild from source for the target image, or copy the binary directly:"
                        .into(),
                );
                lines.push(format!("# COPY config/{} /{}", item.path, item.path));
            }
            Provenance::CBinary => {
                if item.static_link {
                    lines.push(format!(
                        "# FIXME: static C/C++ binary at /{} — copy or rebuild from source",
                        item.path
                    ));
                } else {
                    let libs = item
                        .shared_libs
                        .iter()
                        .take(5)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ");
                    lines.push(format!(
                        "# FIXME: dynamic C/C++ binary at /{} — needs: {libs}",
                        item.path
                    ));
                }
                lines.push(format!("# COPY config/{} /{}", item.path, item.path));
            }
            Provenance::Pip if item.method == "python venv" => {
                if item.system_site_packages {
                    lines.push(format!(
                        "# FIXME: venv at /{} uses --system-site-packages — verify the rpm \
                         dependencies exist in the base image",
                        item.path
                    ));
                }
                if item.packages.is_empty() {
                    lines.push(format!(
                        "# FIXME: venv at /{} — no packages detected, verify manually",
                        item.path
                    ));
                } else {
                    lines.push(format!(
                        "# Python venv at /{}: {} package(s)",
                        item.path,
                        item.packages.len()
                    ));
                    lines.push(format!("RUN python3 -m venv /{}", item.path));
                    let specs: Vec<String> = item
                        .packages
                        .iter()
                        .filter(|p| !p.version.is_empty())
                        .filter(|p| shell_safe(&p.name) && shell_safe(&p.version))
                        .map(|p| format!("{}=={}", p.name, p.version))
                        .collect();
                    if !specs.is_empty() {
                        lines.push(format!("RUN /{}/bin/pip install {}", item.path, specs.join(" ")));
                    }
                }
            }
            Provenance::Pip if item.method == "pip requirements.txt" => {
                lines.push(format!(
                    "# FIXME: verify the pinned packages in /{} install from PyPI",
                    item.path
                ));
                lines.push(format!("COPY config/{} /{}", item.path, item.path));
                lines.push(format!("RUN pip install -r /{}", item.path));
            }
            Provenance::Pip => {} // dist-info installs are batched below
            Provenance::Npm => {
                let tool = if item.method == "yarn.lock" {
                    "yarn install --frozen-lockfile"
                } else {
                    "npm ci"
                };
                lines.push(format!(
                    "# FIXME: verify the npm packages in /{} install cleanly",
                    item.path
                ));
                lines.push(format!("COPY config/{}/ /{}/", item.path, item.path));
                lines.push(format!("RUN cd /{} && {tool}", item.path));
            }
            Provenance::Gem => {
                lines.push(format!(
                    "# FIXME: verify the Ruby gems in /{} install cleanly",
                    item.path
                ));
                lines.push(format!("COPY config/{}/ /{}/", item.path, item.path));
                lines.push(format!("RUN cd /{} && bundle install", item.path));
            }
            Provenance::Git => {
                lines.push(format!("# Git-managed: /{}", item.path));
                match item.git_remote.as_deref().filter(|r| !r.is_empty()) {
                    Some(remote) => {
                        let commit = item.git_commit.as_deref().unwrap_or("");
                        let short: String = commit.chars().take(12).collect();
                        lines.push(format!(
                            "# FIXME: clone from {remote} (branch: {}, commit: {short})",
                            item.git_branch.as_deref().unwrap_or("")
                        ));
                        lines.push(format!(
                            "# RUN git clone {remote} /{} && git -C /{} checkout {short}",
                            item.path, item.path
                        ));
                    }
                    None => {
                        lines.push(format!(
                            "# FIXME: git checkout at /{} has no remote — copy or reconstruct",
                            item.path
                        ));
                    }
                }
            }
            Provenance::Unknown => {
                lines.push(format!(
                    "# FIXME: unknown provenance (confidence: {:?}) — determine the upstream \
                     source and installation method for /{}",
                    item.confidence, item.path
                ));
                lines.push(format!("# COPY config/{} /{}", item.path, item.path));
            }
        }
    }

    if !pure_pip.is_empty() {
        lines.push(format!(
            "# Detected: {} pip package(s) via dist-info",
            pure_pip.len()
        ));
        lines.push("# FIXME: verify these versions still resolve on PyPI".into());
        lines.push("RUN pip install \\".into());
        for (name, version) in &pure_pip[..pure_pip.len() - 1] {
            lines.push(format!("    {name}=={version} \\"));
        }
        let (name, version) = &pure_pip[pure_pip.len() - 1];
        lines.push(format!("    {name}=={version}"));
    }
    lines.push(String::new());
}

fn render_users(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(users) = &snapshot.users else { return };
    if users.users.is_empty() && users.passwd_lines.is_empty() {
        return;
    }
    lines.push("# === Users and Groups ===".into());

    // Append-based provisioning: stage fragments, concatenate into the
    // account databases, clean up, then fix home ownership.
    let fragments: [(&str, bool); 6] = [
        ("group", !users.group_lines.is_empty()),
        ("passwd", !users.passwd_lines.is_empty()),
        ("shadow", !users.shadow_lines.is_empty()),
        ("gshadow", !users.gshadow_lines.is_empty()),
        ("subuid", !users.subuid_lines.is_empty()),
        ("subgid", !users.subgid_lines.is_empty()),
    ];
    let appends: Vec<String> = fragments
        .iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| format!("cat /tmp/{name}.append >> /etc/{name}"))
        .collect();
    if !appends.is_empty() {
        lines.push(format!(
            "# Detected: {} non-system user(s), {} group(s) — appended verbatim to keep uids and hashes",
            users.users.len(),
            users.groups.len()
        ));
        lines.push("COPY config/tmp/ /tmp/".into());
        let mut steps = appends;
        steps.push("rm -f /tmp/*.append".into());
        lines.push(format!("RUN {}", steps.join(" && \\\n    ")));
        for user in &users.users {
            if user.home.is_empty() || user.home == "/" || !shell_safe(&user.home) {
                continue;
            }
            lines.push(format!(
                "RUN mkdir -p {} && chown {}:{} {}",
                user.home, user.uid, user.gid, user.home
            ));
        }
    }

    if !users.sudoers_rules.is_empty() {
        lines.push(format!(
            "# FIXME: {} sudoers rule(s) detected — review and bake into /etc/sudoers.d/",
            users.sudoers_rules.len()
        ));
        for rule in users.sudoers_rules.iter().take(10) {
            lines.push(format!("#   {rule}"));
        }
        if users.sudoers_rules.len() > 10 {
            lines.push(format!("#   ... and {} more", users.sudoers_rules.len() - 10));
        }
    }
    if !users.ssh_key_refs.is_empty() {
        lines.push(format!(
            "# FIXME: {} SSH authorized_keys file(s) detected",
            users.ssh_key_refs.len()
        ));
        lines.push("# Do NOT bake SSH keys into the image — inject at deploy time via".into());
        lines.push("# cloud-init, kickstart %post, or Ignition.".into());
        for reference in users.ssh_key_refs.iter().take(5) {
            lines.push(format!("#   found: {} (user: {})", reference.path, reference.user));
        }
    }
    lines.push(String::new());
}

fn render_kernel(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(kernel) = &snapshot.kernel else { return };
    let has_content = !kernel.cmdline.is_empty()
        || !kernel.modules_load.is_empty()
        || !kernel.modprobe.is_empty()
        || !kernel.dracut.is_empty()
        || !kernel.sysctl_overrides.is_empty()
        || !kernel.non_default_modules.is_empty();
    if !has_content {
        return;
    }
    lines.push("# === Kernel Configuration ===".into());
    if !kernel.cmdline.is_empty() {
        lines.push("# FIXME: review the detected kernel args; append the ones this image needs".into());
        for arg in kernel.cmdline.split_whitespace() {
            if shell_safe(arg) {
                lines.push(format!("# RUN rpm-ostree kargs --append={arg}"));
            } else {
                lines.push(format!("# FIXME: karg contains unsafe characters, skipped: {arg:?}"));
            }
        }
    }
    if !kernel.non_default_modules.is_empty() {
        let names: Vec<&str> = kernel
            .non_default_modules
            .iter()
            .take(10)
            .map(|m| m.name.as_str())
            .collect();
        lines.push(format!(
            "# {} non-default kernel module(s) loaded at runtime: {}",
            kernel.non_default_modules.len(),
            names.join(", ")
        ));
        lines.push("# FIXME: if these are needed, declare them in /etc/modules-load.d/".into());
    }
    if !kernel.modules_load.is_empty() {
        lines.push(format!(
            "# modules-load.d: {} file(s) — included in the COPY config/etc/ layer above",
            kernel.modules_load.len()
        ));
    }
    if !kernel.modprobe.is_empty() {
        lines.push(format!(
            "# modprobe.d: {} file(s) — included above",
            kernel.modprobe.len()
        ));
    }
    if !kernel.dracut.is_empty() {
        lines.push(format!(
            "# dracut.conf.d: {} file(s) — included above",
            kernel.dracut.len()
        ));
    }
    if !kernel.sysctl_overrides.is_empty() {
        lines.push(format!(
            "# sysctl: {} non-default value(s) — etc/sysctl.d/99-retrofit.conf included above",
            kernel.sysctl_overrides.len()
        ));
    }
    lines.push(String::new());
}

fn render_security(snapshot: &Snapshot, lines: &mut Vec<String>) {
    let Some(security) = &snapshot.security else { return };
    let has_content = !security.custom_modules.is_empty()
        || !security.booleans.is_empty()
        || !security.fcontext_rules.is_empty()
        || !security.audit_rules.is_empty()
        || security.fips_mode;
    if !has_content {
        return;
    }
    lines.push("# === Security Policy ===".into());
    if !security.custom_modules.is_empty() {
        lines.push(format!(
            "# FIXME: {} custom policy module(s) detected ({}) — export the .pp files to \
             config/selinux/ and uncomment:",
            security.custom_modules.len(),
            security.custom_modules.join(", ")
        ));
        lines.push("# COPY config/selinux/ /tmp/selinux/".into());
        lines.push("# RUN semodule -i /tmp/selinux/*.pp && rm -rf /tmp/selinux/".into());
    }
    if !security.booleans.is_empty() {
        lines.push(format!(
            "# FIXME: {} non-default boolean(s) — verify each is still needed",
            security.booleans.len()
        ));
        for boolean in security.booleans.iter().take(20) {
            if shell_safe(&boolean.name) && shell_safe(&boolean.current) {
                lines.push(format!("RUN setsebool -P {} {}", boolean.name, boolean.current));
            }
        }
    }
    if !security.fcontext_rules.is_empty() {
        lines.push(format!(
            "# FIXME: {} custom fcontext rule(s) — apply and relabel:",
            security.fcontext_rules.len()
        ));
        for rule in security.fcontext_rules.iter().take(10) {
            if shell_safe(rule) {
                lines.push(format!("# RUN semanage fcontext -a {rule}"));
            }
        }
        lines.push("# RUN restorecon -Rv /   # after all COPY layers".into());
    }
    if !security.audit_rules.is_empty() {
        lines.push(format!(
            "# {} audit rule file(s) — included in the COPY config/etc/ layer above",
            security.audit_rules.len()
        ));
    }
    if security.fips_mode {
        lines.push("# FIXME: the host runs in FIPS mode — enable FIPS in the image (fips-mode-setup)".into());
    }
    lines.push(String::new());
}

fn render_network(snapshot: &Snapshot, lines: &mut Vec<String>) {
    lines.push("# === Network / Deploy-Time Configuration ===".into());
    let Some(network) = &snapshot.network else {
        lines.push("# Interface configuration is applied at deploy time — see kickstart-suggestion.ks".into());
        lines.push(String::new());
        return;
    };

    let static_profiles: Vec<&str> = network
        .connections
        .iter()
        .filter(|c| c.method == ProfileMethod::Static)
        .map(|c| c.name.as_str())
        .collect();
    let dynamic_profiles: Vec<&str> = network
        .connections
        .iter()
        .filter(|c| c.method == ProfileMethod::Dynamic)
        .map(|c| c.name.as_str())
        .collect();
    if !static_profiles.is_empty() {
        lines.push(format!(
            "# Static connections (baked into the image): {}",
            static_profiles.join(", ")
        ));
    }
    if !dynamic_profiles.is_empty() {
        lines.push(format!(
            "# Dynamic connections (deploy-time, see kickstart-suggestion.ks): {}",
            dynamic_profiles.join(", ")
        ));
    }

    match network.resolv {
        Some(ResolvProvenance::NetworkManager) => {
            lines.push("# resolv.conf: NetworkManager-managed — DNS assigned at deploy time".into())
        }
        Some(ResolvProvenance::SystemdResolved) => {
            lines.push("# resolv.conf: systemd-resolved — DNS assigned at deploy time".into())
        }
        Some(ResolvProvenance::HandEdited) => lines.push(
            "# FIXME: resolv.conf is hand-edited — decide whether DNS belongs in the image or at deploy time"
                .into(),
        ),
        _ => {}
    }

    if !network.hosts_additions.is_empty() {
        lines.push(format!(
            "# {} custom /etc/hosts entr(ies) detected",
            network.hosts_additions.len()
        ));
        lines.push("RUN cat >> /etc/hosts << 'HOSTSEOF'".into());
        for entry in &network.hosts_additions {
            lines.push(entry.clone());
        }
        lines.push("HOSTSEOF".into());
    }

    let dnf_sources = ["etc/dnf/dnf.conf", "etc/yum.conf"];
    let env_proxy: Vec<&str> = network
        .proxy
        .iter()
        .filter(|p| !dnf_sources.contains(&p.source.as_str()))
        .map(|p| p.line.as_str())
        .filter(|l| l.contains('='))
        .collect();
    if !env_proxy.is_empty() {
        lines.push("# Proxy settings detected — baked as environment defaults".into());
        lines.push("RUN mkdir -p /etc/environment.d && cat > /etc/environment.d/proxy.conf << 'PROXYEOF'".into());
        for line in env_proxy {
            lines.push(line.to_string());
        }
        lines.push("PROXYEOF".into());
    }
    let dnf_proxy: Vec<&str> = network
        .proxy
        .iter()
        .filter(|p| dnf_sources.contains(&p.source.as_str()))
        .map(|p| p.line.as_str())
        .collect();
    if !dnf_proxy.is_empty() {
        lines.push("# DNF proxy preserved in etc/dnf/dnf.conf (COPY config/etc/ above)".into());
        for line in dnf_proxy {
            lines.push(format!("#   {line}"));
        }
    }

    if !network.route_files.is_empty() {
        lines.push(format!(
            "# FIXME: {} static route file(s) — translate to NM connection (+ipv4.routes) or kickstart",
            network.route_files.len()
        ));
        for file in network.route_files.iter().take(10) {
            lines.push(format!("#   route file: {}", file.path));
        }
    }
    lines.push(String::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        Baseline, BaselineMode, Confidence, PackageRecord, PackageSection, PresetState,
        ServiceRecord, ServiceSection, SoftwareItem, SoftwareSection, TargetImage, TargetSource,
        UnitState,
    };
    use std::collections::BTreeSet;

    fn minimal_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.target = Some(TargetImage {
            reference: "quay.io/centos-bootc/centos-bootc:stream9".into(),
            source: TargetSource::Auto,
            cross_major: false,
        });
        snapshot
    }

    #[test]
    fn added_and_removed_packages_become_directives() {
        let mut snapshot = minimal_snapshot();
        snapshot.baseline = Some(Baseline {
            mode: BaselineMode::Queried,
            package_names: BTreeSet::from(["b".into(), "c".into(), "d".into()]),
            ..Baseline::empty()
        });
        snapshot.packages = Some(PackageSection {
            added: vec![PackageRecord {
                name: "a".into(),
                epoch: "0".into(),
                version: "1".into(),
                release: "1".into(),
                arch: "x86_64".into(),
            }],
            removed: vec!["d".into()],
            ..Default::default()
        });

        let dir = tempfile::tempdir().unwrap();
        let content = build(&snapshot, dir.path());
        assert!(content.contains("RUN dnf install -y \\\n    a \\\n    && dnf clean all"));
        assert!(content.contains("RUN dnf remove -y d && dnf clean all"));
        assert!(content.contains("FROM quay.io/centos-bootc/centos-bootc:stream9"));
    }

    #[test]
    fn masked_service_emits_mask_directive() {
        let mut snapshot = minimal_snapshot();
        snapshot.services = Some(ServiceSection {
            units: vec![ServiceRecord {
                unit: "cups.service".into(),
                current: UnitState::Masked,
                default: PresetState::Enabled,
                action: crate::snapshot::service_action(UnitState::Masked, PresetState::Enabled),
            }],
            partial: false,
        });
        let dir = tempfile::tempdir().unwrap();
        let content = build(&snapshot, dir.path());
        assert!(content.contains("RUN systemctl mask cups.service"));
    }

    #[test]
    fn unknown_provenance_item_gets_fixme_copy() {
        let mut snapshot = minimal_snapshot();
        let mut item = SoftwareItem::new("usr/local/bin/mytool", "mytool");
        item.provenance = Provenance::Unknown;
        item.confidence = Confidence::Unknown;
        snapshot.software = Some(SoftwareSection { items: vec![item] });

        let dir = tempfile::tempdir().unwrap();
        let content = build(&snapshot, dir.path());
        let fixme_line = content
            .lines()
            .position(|l| l.contains("FIXME: unknown provenance"))
            .unwrap();
        let copy_line = content
            .lines()
            .position(|l| l.contains("# COPY config/usr/local/bin/mytool /usr/local/bin/mytool"))
            .unwrap();
        assert_eq!(copy_line, fixme_line + 1);
    }

    #[test]
    fn unsafe_package_names_are_never_embedded() {
        let mut snapshot = minimal_snapshot();
        snapshot.packages = Some(PackageSection {
            added: vec![
                PackageRecord {
                    name: "good".into(),
                    epoch: "0".into(),
                    version: "1".into(),
                    release: "1".into(),
                    arch: "noarch".into(),
                },
                PackageRecord {
                    name: "evil;rm -rf /".into(),
                    epoch: "0".into(),
                    version: "1".into(),
                    release: "1".into(),
                    arch: "noarch".into(),
                },
            ],
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let content = build(&snapshot, dir.path());
        assert!(!content.contains("RUN dnf install -y \\\n    evil"));
        assert!(content.contains("FIXME: package name contains shell metacharacters"));
    }

    #[test]
    fn double_render_is_byte_identical() {
        let mut snapshot = minimal_snapshot();
        snapshot.packages = Some(PackageSection {
            added: vec![PackageRecord {
                name: "nginx".into(),
                epoch: "0".into(),
                version: "1".into(),
                release: "1".into(),
                arch: "x86_64".into(),
            }],
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        crate::render::config_tree::render(&snapshot, dir.path()).unwrap();
        let first = build(&snapshot, dir.path());
        let second = build(&snapshot, dir.path());
        assert_eq!(first, second);
    }
}
