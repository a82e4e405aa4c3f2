// src/render/readme.rs

//! README renderer: findings summary, build and deploy commands, the FIXME
//! list extracted from the finished Containerfile.

use crate::error::Result;
use crate::snapshot::{BaselineMode, ConfigKind, ServiceAction, Snapshot};
use std::fs;
use std::path::Path;

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let mut lines: Vec<String> = vec!["# Generated image recipe".into(), String::new()];

    if let Some(host) = &snapshot.host {
        let desc = if host.pretty_name.is_empty() {
            host.name.clone()
        } else {
            host.pretty_name.clone()
        };
        lines.push(format!("Generated from **{desc}**."));
        lines.push(String::new());
        if !host.hostname.is_empty() {
            lines.push(format!("**Host:** `{}`", host.hostname));
        }
        if !host.inspected_at.is_empty() {
            lines.push(format!("**Inspected:** {}", host.inspected_at));
        }
        lines.push(String::new());
    }

    lines.push("## Findings summary".into());
    lines.push(String::new());
    lines.push("| Category | Count |".into());
    lines.push("|---|---|".into());

    let no_baseline = snapshot
        .baseline
        .as_ref()
        .map(|b| b.mode == BaselineMode::AllPackages)
        .unwrap_or(true);
    if let Some(packages) = &snapshot.packages {
        if no_baseline {
            lines.push(format!("| Packages (all — no baseline) | {} |", packages.added.len()));
        } else {
            lines.push(format!(
                "| Packages added (beyond base image) | {} |",
                packages.added.len()
            ));
            if !packages.removed.is_empty() {
                lines.push(format!("| Packages removed | {} |", packages.removed.len()));
            }
        }
    }
    if let Some(configs) = &snapshot.configs {
        let modified = configs.of_kind(ConfigKind::OwnedModified).len();
        let unowned = configs.of_kind(ConfigKind::Unowned).len();
        lines.push(format!("| Configs modified (package-owned) | {modified} |"));
        lines.push(format!("| Configs unowned | {unowned} |"));
    }
    if let Some(services) = &snapshot.services {
        let enable = services.units_with(ServiceAction::Enable).len();
        let disable = services.units_with(ServiceAction::Disable).len();
        let mask = services.units_with(ServiceAction::Mask).len();
        lines.push(format!(
            "| Services changed | {} ({enable} enabled, {disable} disabled, {mask} masked) |",
            enable + disable + mask
        ));
    }
    if let Some(software) = &snapshot.software {
        if !software.items.is_empty() {
            lines.push(format!("| Non-package software items | {} |", software.items.len()));
        }
    }
    if let Some(containers) = &snapshot.containers {
        if !containers.quadlets.is_empty() || !containers.compose_files.is_empty() {
            lines.push(format!(
                "| Container workloads | {} quadlet, {} compose |",
                containers.quadlets.len(),
                containers.compose_files.len()
            ));
        }
    }
    if !snapshot.secrets_review.is_empty() {
        lines.push(format!("| Secrets redacted | {} |", snapshot.secrets_review.len()));
    }
    lines.push(format!("| Warnings | {} |", snapshot.warnings.len()));

    let fixmes = extract_fixmes(output_dir);
    lines.push(format!("| FIXME items | {} |", fixmes.len()));
    lines.push(String::new());

    lines.push("## Build".into());
    lines.push(String::new());
    lines.push("```bash".into());
    lines.push("podman build -t my-bootc-image:latest .".into());
    lines.push("```".into());
    lines.push(String::new());

    lines.push("## Deploy".into());
    lines.push(String::new());
    lines.push("```bash".into());
    lines.push("# Switch an existing system to the new image:".into());
    lines.push("bootc switch my-bootc-image:latest".into());
    lines.push(String::new());
    lines.push("# Or install to a new disk:".into());
    let is_centos = snapshot
        .host
        .as_ref()
        .map(|h| h.id.contains("centos"))
        .unwrap_or(false);
    if is_centos {
        lines.push("bootc install to-disk --target-no-signature-verification /dev/sdX".into());
    } else {
        lines.push("bootc install to-disk /dev/sdX".into());
    }
    lines.push("```".into());
    lines.push(String::new());
    lines.push("Review `kickstart-suggestion.ks` for deploy-time settings (hostname, DHCP, DNS).".into());
    lines.push(String::new());

    lines.push("## Artifacts".into());
    lines.push(String::new());
    lines.push("| File | Description |".into());
    lines.push("|---|---|".into());
    lines.push("| `Containerfile` | Layered image definition |".into());
    lines.push("| `config/` | Files copied into the image |".into());
    lines.push("| `quadlet/` | Container workload units |".into());
    lines.push("| `audit-report.md` | Full findings (markdown) |".into());
    lines.push("| `report.html` | Interactive dashboard (open in a browser) |".into());
    lines.push("| `secrets-review.md` | Redacted items needing manual handling |".into());
    lines.push("| `kickstart-suggestion.ks` | Deploy-time settings |".into());
    lines.push("| `inspection-snapshot.json` | Raw data for re-rendering (--from-snapshot) |".into());
    lines.push(String::new());

    if !fixmes.is_empty() {
        lines.push("## FIXME items (resolve before production)".into());
        lines.push(String::new());
        for (index, fixme) in fixmes.iter().enumerate() {
            lines.push(format!("{}. {fixme}", index + 1));
        }
        lines.push(String::new());
    }

    if !snapshot.warnings.is_empty() {
        lines.push("## Warnings".into());
        lines.push(String::new());
        for warning in &snapshot.warnings {
            lines.push(format!("- **{}:** {}", warning.source, warning.message));
        }
        lines.push(String::new());
    }

    lines.push("See [`audit-report.md`](audit-report.md) or [`report.html`](report.html) for details.".into());
    lines.push(String::new());

    fs::write(output_dir.join("README.md"), lines.join("\n"))?;
    Ok(())
}

fn extract_fixmes(output_dir: &Path) -> Vec<String> {
    let Ok(text) = fs::read_to_string(output_dir.join("Containerfile")) else {
        return Vec::new();
    };
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with('#') && l.contains("FIXME"))
        .map(|l| l.trim_start_matches(['#', ' ']).to_string())
        .collect()
}
