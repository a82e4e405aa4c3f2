// src/render/html.rs

//! Self-contained HTML dashboard: one file, styles and scripts inlined.
//!
//! Layout: status banner with triage counts, dismissible warning panel,
//! category cards, then per-category drill-down sections backed by the
//! snapshot. No external assets — the file works from a USB stick.

use super::triage;
use crate::error::Result;
use crate::snapshot::{
    BaselineMode, ConfigKind, ProfileMethod, ServiceAction, Snapshot,
};
use std::fs;
use std::path::Path;

const STYLE: &str = r#"
:root {
  --bg: #121417; --panel: #1c2026; --text: #e6e8ea; --muted: #9aa3ad;
  --accent: #4fa8e0; --ok: #4caf7d; --warn: #e0b04f; --error: #e05f4f;
  --border: #2c323a;
}
* { box-sizing: border-box; }
body { margin: 0; background: var(--bg); color: var(--text);
  font: 15px/1.5 -apple-system, "Segoe UI", Roboto, sans-serif; }
main { max-width: 1100px; margin: 0 auto; padding: 1rem 2rem 4rem; }
h1 { font-size: 1.4rem; }
h2 { font-size: 1.1rem; border-bottom: 1px solid var(--border); padding-bottom: .3rem; }
code, pre { font-family: ui-monospace, "SF Mono", Menlo, monospace; font-size: .85em; }
pre { background: var(--panel); padding: .8rem; border-radius: 6px; overflow-x: auto; }
table { border-collapse: collapse; width: 100%; margin: .5rem 0 1rem; }
th, td { text-align: left; padding: .35rem .6rem; border-bottom: 1px solid var(--border); }
th { color: var(--muted); font-weight: 600; }
.banner { display: flex; gap: 2rem; background: var(--panel); padding: 1rem 1.5rem;
  border-radius: 8px; margin: 1rem 0; }
.banner .stat { text-align: center; }
.banner .stat .n { font-size: 1.6rem; font-weight: 700; display: block; }
.banner .ok .n { color: var(--ok); }
.banner .fixme .n { color: var(--warn); }
.banner .manual .n { color: var(--error); }
.cards { display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr));
  gap: .8rem; margin: 1rem 0 2rem; }
.card { background: var(--panel); border: 1px solid var(--border); border-radius: 8px;
  padding: .8rem 1rem; cursor: pointer; }
.card:hover { border-color: var(--accent); }
.card .count { font-size: 1.4rem; font-weight: 700; color: var(--accent); }
.warning-panel { background: var(--panel); border-left: 4px solid var(--warn);
  border-radius: 6px; padding: .6rem 1rem; margin: .5rem 0; }
.warning-panel.severity-error { border-left-color: var(--error); }
.warning-panel.severity-info { border-left-color: var(--accent); }
.warning-panel .dismiss { float: right; background: none; border: none;
  color: var(--muted); cursor: pointer; font-size: 1rem; }
.muted { color: var(--muted); }
details { margin: .3rem 0; }
summary { cursor: pointer; }
"#;

const SCRIPT: &str = r#"
document.querySelectorAll('.warning-panel .dismiss').forEach(function (button) {
  button.addEventListener('click', function () {
    button.closest('.warning-panel').style.display = 'none';
  });
});
document.querySelectorAll('.card').forEach(function (card) {
  card.addEventListener('click', function () {
    var target = document.getElementById(card.dataset.target);
    if (target) { target.scrollIntoView({ behavior: 'smooth' }); }
  });
});
"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let content = build(snapshot, output_dir);
    fs::write(output_dir.join("report.html"), content)?;
    Ok(())
}

fn build(snapshot: &Snapshot, output_dir: &Path) -> String {
    let mut html = String::with_capacity(64 * 1024);
    let triage = triage::compute(snapshot, output_dir);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Host inspection report</title>\n<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<main>\n");

    // --- Header and status banner ---
    html.push_str("<h1>Host inspection report</h1>\n");
    if let Some(host) = &snapshot.host {
        let desc = if host.pretty_name.is_empty() {
            &host.name
        } else {
            &host.pretty_name
        };
        html.push_str(&format!(
            "<p class=\"muted\">{} &mdash; {} &mdash; inspected {}</p>\n",
            escape(&host.hostname),
            escape(desc),
            escape(&host.inspected_at)
        ));
    }
    if let Some(target) = &snapshot.target {
        html.push_str(&format!(
            "<p>Target base image: <code>{}</code>{}</p>\n",
            escape(&target.reference),
            if target.cross_major {
                " <strong>(cross-major migration)</strong>"
            } else {
                ""
            }
        ));
    }

    html.push_str(&format!(
        "<div class=\"banner\">\
         <div class=\"stat ok\"><span class=\"n\">{}</span>automatic</div>\
         <div class=\"stat fixme\"><span class=\"n\">{}</span>FIXME</div>\
         <div class=\"stat manual\"><span class=\"n\">{}</span>manual</div>\
         </div>\n",
        triage.automatic, triage.fixme, triage.manual
    ));

    // --- Warning panel ---
    if !snapshot.warnings.is_empty() {
        html.push_str("<h2>Warnings</h2>\n");
        for warning in &snapshot.warnings {
            let severity = format!("{:?}", warning.severity).to_lowercase();
            let dismiss = if warning.dismissible {
                "<button class=\"dismiss\" title=\"Dismiss\">&times;</button>"
            } else {
                ""
            };
            html.push_str(&format!(
                "<div class=\"warning-panel severity-{severity}\">{dismiss}\
                 <strong>{}</strong>: {}</div>\n",
                escape(&warning.source),
                escape(&warning.message)
            ));
        }
    }

    // --- Category cards ---
    let mut cards: Vec<(String, usize, &str)> = Vec::new();
    if let Some(packages) = &snapshot.packages {
        cards.push(("Packages".into(), packages.added.len() + packages.removed.len(), "sec-packages"));
    }
    if let Some(services) = &snapshot.services {
        let changed = services
            .units
            .iter()
            .filter(|u| u.action != ServiceAction::None)
            .count();
        cards.push(("Services".into(), changed, "sec-services"));
    }
    if let Some(configs) = &snapshot.configs {
        cards.push(("Configs".into(), configs.files.len(), "sec-configs"));
    }
    if let Some(network) = &snapshot.network {
        cards.push(("Network".into(), network.connections.len() + network.firewall_zones.len(), "sec-network"));
    }
    if let Some(storage) = &snapshot.storage {
        cards.push(("Storage".into(), storage.mounts.len() + storage.state_dirs.len(), "sec-storage"));
    }
    if let Some(scheduled) = &snapshot.scheduled {
        cards.push(("Scheduled".into(), scheduled.cron_entries.len() + scheduled.timers.len(), "sec-scheduled"));
    }
    if let Some(containers) = &snapshot.containers {
        cards.push(("Containers".into(), containers.quadlets.len() + containers.compose_files.len(), "sec-containers"));
    }
    if let Some(software) = &snapshot.software {
        cards.push(("Software".into(), software.items.len(), "sec-software"));
    }
    if let Some(users) = &snapshot.users {
        cards.push(("Users".into(), users.users.len() + users.groups.len(), "sec-users"));
    }
    cards.push(("Secrets".into(), snapshot.secrets_review.len(), "sec-secrets"));

    html.push_str("<div class=\"cards\">\n");
    for (title, count, target) in &cards {
        html.push_str(&format!(
            "<div class=\"card\" data-target=\"{target}\">\
             <span class=\"count\">{count}</span><br>{title}</div>\n"
        ));
    }
    html.push_str("</div>\n");

    // --- Drill-downs ---
    packages_html(snapshot, &mut html);
    services_html(snapshot, &mut html);
    configs_html(snapshot, &mut html);
    network_html(snapshot, &mut html);
    storage_html(snapshot, &mut html);
    scheduled_html(snapshot, &mut html);
    containers_html(snapshot, &mut html);
    software_html(snapshot, &mut html);
    users_html(snapshot, &mut html);
    secrets_html(snapshot, &mut html);

    html.push_str("</main>\n<script>");
    html.push_str(SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

fn packages_html(snapshot: &Snapshot, html: &mut String) {
    let Some(packages) = &snapshot.packages else { return };
    html.push_str("<h2 id=\"sec-packages\">Packages</h2>\n");
    let no_baseline = snapshot
        .baseline
        .as_ref()
        .map(|b| b.mode == BaselineMode::AllPackages)
        .unwrap_or(true);
    if no_baseline {
        html.push_str("<p class=\"muted\">No baseline — every installed package is listed.</p>\n");
    }
    html.push_str(&format!(
        "<details><summary>Added ({})</summary><pre>",
        packages.added.len()
    ));
    for record in &packages.added {
        html.push_str(&escape(&format!(
            "{} {}-{}.{}\n",
            record.name, record.version, record.release, record.arch
        )));
    }
    html.push_str("</pre></details>\n");
    if !packages.removed.is_empty() {
        html.push_str(&format!(
            "<details><summary>Removed ({})</summary><pre>",
            packages.removed.len()
        ));
        for name in &packages.removed {
            html.push_str(&escape(name));
            html.push('\n');
        }
        html.push_str("</pre></details>\n");
    }
}

fn services_html(snapshot: &Snapshot, html: &mut String) {
    let Some(services) = &snapshot.services else { return };
    let changed: Vec<_> = services
        .units
        .iter()
        .filter(|u| u.action != ServiceAction::None)
        .collect();
    if changed.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-services\">Services</h2>\n<table>\n");
    html.push_str("<tr><th>Unit</th><th>Current</th><th>Default</th><th>Action</th></tr>\n");
    for unit in changed {
        html.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{:?}</td><td>{:?}</td><td>{:?}</td></tr>\n",
            escape(&unit.unit),
            unit.current,
            unit.default,
            unit.action
        ));
    }
    html.push_str("</table>\n");
}

fn configs_html(snapshot: &Snapshot, html: &mut String) {
    let Some(configs) = &snapshot.configs else { return };
    if configs.files.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-configs\">Configuration files</h2>\n");
    let groups: [(&str, ConfigKind); 3] = [
        ("Modified (package-owned)", ConfigKind::OwnedModified),
        ("Unowned", ConfigKind::Unowned),
        ("Orphaned", ConfigKind::Orphaned),
    ];
    for (title, kind) in groups {
        let files = configs.of_kind(kind);
        if files.is_empty() {
            continue;
        }
        html.push_str(&format!(
            "<details><summary>{title} ({})</summary>\n",
            files.len()
        ));
        for file in files {
            html.push_str(&format!(
                "<details><summary><code>{}</code></summary><pre>{}</pre></details>\n",
                escape(&file.path),
                escape(&file.content)
            ));
            if let Some(diff) = &file.diff {
                html.push_str(&format!("<pre>{}</pre>\n", escape(diff)));
            }
        }
        html.push_str("</details>\n");
    }
}

fn network_html(snapshot: &Snapshot, html: &mut String) {
    let Some(network) = &snapshot.network else { return };
    html.push_str("<h2 id=\"sec-network\">Network</h2>\n");
    if !network.connections.is_empty() {
        html.push_str("<table>\n<tr><th>Profile</th><th>Type</th><th>Method</th></tr>\n");
        for profile in &network.connections {
            let method = match profile.method {
                ProfileMethod::Static => "static (in image)",
                ProfileMethod::Dynamic => "dynamic (deploy-time)",
            };
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{method}</td></tr>\n",
                escape(&profile.name),
                escape(&profile.kind)
            ));
        }
        html.push_str("</table>\n");
    }
    for zone in &network.firewall_zones {
        html.push_str(&format!(
            "<details><summary>Zone: {}</summary><pre>{}</pre></details>\n",
            escape(&zone.name),
            escape(&zone.content)
        ));
    }
}

fn storage_html(snapshot: &Snapshot, html: &mut String) {
    let Some(storage) = &snapshot.storage else { return };
    if storage.mounts.is_empty() && storage.state_dirs.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-storage\">Storage</h2>\n");
    if !storage.mounts.is_empty() {
        html.push_str("<table>\n<tr><th>Mount</th><th>Type</th><th>Strategy</th></tr>\n");
        for mount in &storage.mounts {
            html.push_str(&format!(
                "<tr><td><code>{}</code></td><td>{}</td><td>{}</td></tr>\n",
                escape(&mount.target),
                escape(&mount.fstype),
                escape(&mount.strategy)
            ));
        }
        html.push_str("</table>\n");
    }
    if !storage.state_dirs.is_empty() {
        html.push_str("<table>\n<tr><th>/var directory</th><th>Size</th><th>Recommendation</th></tr>\n");
        for dir in &storage.state_dirs {
            html.push_str(&format!(
                "<tr><td><code>/{}</code></td><td>{}</td><td>{}</td></tr>\n",
                escape(&dir.path),
                escape(&dir.size_estimate),
                escape(&dir.recommendation)
            ));
        }
        html.push_str("</table>\n");
    }
}

fn scheduled_html(snapshot: &Snapshot, html: &mut String) {
    let Some(scheduled) = &snapshot.scheduled else { return };
    if scheduled.cron_entries.is_empty() && scheduled.timers.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-scheduled\">Scheduled tasks</h2>\n");
    if !scheduled.cron_entries.is_empty() {
        html.push_str("<table>\n<tr><th>Source</th><th>Schedule</th><th>User</th><th>Command</th></tr>\n");
        for entry in &scheduled.cron_entries {
            html.push_str(&format!(
                "<tr><td>{}</td><td><code>{}</code></td><td>{}</td><td><code>{}</code></td></tr>\n",
                escape(&entry.path),
                escape(&entry.schedule),
                escape(&entry.user),
                escape(&entry.command)
            ));
        }
        html.push_str("</table>\n");
    }
    for unit in &scheduled.generated {
        html.push_str(&format!(
            "<details><summary>Generated timer: {}</summary><pre>{}</pre><pre>{}</pre></details>\n",
            escape(&unit.name),
            escape(&unit.timer_content),
            escape(&unit.service_content)
        ));
    }
}

fn containers_html(snapshot: &Snapshot, html: &mut String) {
    let Some(containers) = &snapshot.containers else { return };
    if containers.quadlets.is_empty() && containers.compose_files.is_empty() && containers.live.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-containers\">Container workloads</h2>\n");
    for unit in &containers.quadlets {
        html.push_str(&format!(
            "<details><summary>{} &rarr; <code>{}</code></summary><pre>{}</pre></details>\n",
            escape(&unit.name),
            escape(&unit.image),
            escape(&unit.content)
        ));
    }
    for file in &containers.compose_files {
        html.push_str(&format!("<p>Compose: <code>{}</code></p>\n<ul>", escape(&file.path)));
        for service in &file.services {
            html.push_str(&format!(
                "<li>{}: <code>{}</code></li>",
                escape(&service.service),
                escape(&service.image)
            ));
        }
        html.push_str("</ul>\n");
    }
    for container in &containers.live {
        html.push_str(&format!(
            "<p>Live: {} (<code>{}</code>) — {}</p>\n",
            escape(&container.name),
            escape(&container.image),
            escape(&container.status)
        ));
    }
}

fn software_html(snapshot: &Snapshot, html: &mut String) {
    let Some(software) = &snapshot.software else { return };
    if software.items.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-software\">Non-package software</h2>\n<table>\n");
    html.push_str("<tr><th>Path</th><th>Provenance</th><th>Confidence</th><th>Detection</th></tr>\n");
    for item in &software.items {
        html.push_str(&format!(
            "<tr><td><code>/{}</code></td><td>{:?}</td><td>{:?}</td><td>{}</td></tr>\n",
            escape(&item.path),
            item.provenance,
            item.confidence,
            escape(&item.method)
        ));
    }
    html.push_str("</table>\n");
}

fn users_html(snapshot: &Snapshot, html: &mut String) {
    let Some(users) = &snapshot.users else { return };
    if users.users.is_empty() && users.groups.is_empty() {
        return;
    }
    html.push_str("<h2 id=\"sec-users\">Users and groups</h2>\n<table>\n");
    html.push_str("<tr><th>Name</th><th>uid</th><th>Home</th><th>Shell</th></tr>\n");
    for user in &users.users {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td><code>{}</code></td><td><code>{}</code></td></tr>\n",
            escape(&user.name),
            user.uid,
            escape(&user.home),
            escape(&user.shell)
        ));
    }
    html.push_str("</table>\n");
}

fn secrets_html(snapshot: &Snapshot, html: &mut String) {
    html.push_str("<h2 id=\"sec-secrets\">Secrets review</h2>\n");
    if snapshot.secrets_review.is_empty() {
        html.push_str("<p class=\"muted\">No secrets detected in captured content.</p>\n");
        return;
    }
    html.push_str("<table>\n<tr><th>File</th><th>Class</th><th>Location</th></tr>\n");
    for event in &snapshot.secrets_review {
        html.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{}</td><td>{}</td></tr>\n",
            escape(&event.path),
            escape(&event.class),
            escape(&event.line)
        ));
    }
    html.push_str("</table>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Warning, Severity};

    #[test]
    fn report_is_self_contained_and_escaped() {
        let mut snapshot = Snapshot::new();
        snapshot.warnings.push(Warning {
            severity: Severity::Warn,
            source: "baseline".into(),
            resource: String::new(),
            message: "no baseline <tag> available".into(),
            suggestion: String::new(),
            dismissible: true,
        });
        let dir = tempfile::tempdir().unwrap();
        let content = build(&snapshot, dir.path());
        assert!(content.starts_with("<!DOCTYPE html>"));
        // inline style and script, no external references
        assert!(content.contains("<style>"));
        assert!(content.contains("<script>"));
        assert!(!content.contains("src=\"http"));
        assert!(!content.contains("href=\"http"));
        // warning text is escaped and the panel is dismissible
        assert!(content.contains("no baseline &lt;tag&gt; available"));
        assert!(content.contains("class=\"dismiss\""));
    }
}
