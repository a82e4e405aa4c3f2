// src/inspect/containers.rs

//! Container inspector: quadlet units, compose files, optional live query.
//!
//! Compose YAML is read with a line-oriented scraper — image references are
//! all the recipe needs, and that keeps a YAML dependency out of the tree.

use super::{filtered_find, rel_path, safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{
    ComposeFile, ComposeService, ContainerSection, LiveContainer, LiveMount, QuadletUnit,
    Snapshot,
};
use tracing::debug;

pub struct ContainerInspector;

impl Inspector for ContainerInspector {
    fn name(&self) -> &'static str {
        "containers"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = ContainerSection::default();

        collect_quadlets(ctx, &mut section);
        collect_compose(ctx, &mut section);
        if ctx.config.query_podman {
            query_live(ctx, &mut section);
        }

        snapshot.containers = Some(section);
    }
}

// =============================================================================
// Quadlets
// =============================================================================

fn extract_quadlet_image(content: &str) -> String {
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("image") {
                return value.trim().to_string();
            }
        }
    }
    String::new()
}

fn collect_quadlets(ctx: &Context, section: &mut ContainerSection) {
    let mut dirs: Vec<String> = vec![
        "etc/containers/systemd".into(),
        "usr/share/containers/systemd".into(),
        "etc/systemd/system".into(),
    ];

    // Per-user quadlets for real accounts
    let passwd = safe_read(&ctx.host_path("etc/passwd"));
    for line in passwd.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() >= 7 {
            if let Ok(uid) = fields[2].parse::<u32>() {
                if (1000..60000).contains(&uid) {
                    dirs.push(format!(
                        "{}/.config/containers/systemd",
                        fields[5].trim_start_matches('/')
                    ));
                }
            }
        }
    }

    for dir in dirs {
        for path in safe_iterdir(&ctx.host_path(&dir)) {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !path.is_file() || !name.ends_with(".container") {
                continue;
            }
            let content = safe_read(&path);
            let image = extract_quadlet_image(&content);
            debug!(quadlet = %name, image = %image, "found quadlet unit");
            section.quadlets.push(QuadletUnit {
                path: rel_path(ctx.host_root, &path),
                name,
                content,
                image,
            });
        }
    }
}

// =============================================================================
// Compose files
// =============================================================================

/// Pull service-name/image pairs out of a compose document. Indentation of
/// the first service key is detected so two-space, four-space, and
/// tab-indented files all work.
pub fn extract_compose_images(content: &str) -> Vec<ComposeService> {
    let mut results = Vec::new();
    let mut in_services = false;
    let mut service_indent: Option<usize> = None;
    let mut current_service = String::new();

    for line in content.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();

        if indent == 0 {
            if stripped == "services:" {
                in_services = true;
                service_indent = None;
                current_service.clear();
                continue;
            }
            if stripped.ends_with(':') || stripped.contains(": ") {
                in_services = false;
                current_service.clear();
                continue;
            }
        }
        if !in_services {
            continue;
        }

        if service_indent.is_none() && indent > 0 {
            service_indent = Some(indent);
        }
        if Some(indent) == service_indent && stripped.ends_with(':') && !stripped.starts_with('-')
        {
            current_service = stripped.trim_end_matches(':').to_string();
            continue;
        }
        if !current_service.is_empty() {
            if let Some(image) = stripped.strip_prefix("image:") {
                results.push(ComposeService {
                    service: current_service.clone(),
                    image: image.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
                });
            }
        }
    }
    results
}

fn collect_compose(ctx: &Context, section: &mut ContainerSection) {
    let is_compose = |name: &str| {
        (name.starts_with("docker-compose") || name.starts_with("compose"))
            && (name.ends_with(".yml") || name.ends_with(".yaml"))
    };
    for root in ["opt", "srv", "etc"] {
        let dir = ctx.host_path(root);
        if !dir.is_dir() {
            continue;
        }
        for path in filtered_find(&dir, &is_compose) {
            let content = safe_read(&path);
            section.compose_files.push(ComposeFile {
                path: rel_path(ctx.host_root, &path),
                services: extract_compose_images(&content),
            });
        }
    }
}

// =============================================================================
// Live enumeration (--query-podman)
// =============================================================================

fn query_live(ctx: &Context, section: &mut ContainerSection) {
    let Some(bridge) = ctx.bridge else {
        ctx.warnings.warn(
            "containers",
            "--query-podman requested but the privilege bridge is unavailable; \
             live container data skipped",
        );
        section.partial = true;
        return;
    };

    let ps = match bridge.run_on_host(&["podman", "ps", "-a", "--format", "json"]) {
        Ok(out) if out.success() => out,
        _ => {
            ctx.warnings.warn(
                "containers",
                "podman ps failed on the host; live container data unavailable",
            );
            section.partial = true;
            return;
        }
    };

    let Ok(ps_data) = serde_json::from_str::<serde_json::Value>(&ps.stdout) else {
        return;
    };
    let Some(list) = ps_data.as_array() else { return };

    let ids: Vec<String> = list
        .iter()
        .filter_map(|c| c.get("Id").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return;
    }

    let mut argv: Vec<&str> = vec!["podman", "inspect"];
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    argv.extend(id_refs);

    if let Ok(out) = bridge.run_on_host(&argv) {
        if out.success() {
            if let Ok(data) = serde_json::from_str::<serde_json::Value>(&out.stdout) {
                if let Some(items) = data.as_array() {
                    section.live = items.iter().map(parse_inspect_record).collect();
                    return;
                }
            }
        }
    }

    // inspect failed: degrade to the ps listing
    for c in list {
        let get = |key: &str| {
            c.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        section.live.push(LiveContainer {
            id: get("Id"),
            name: c
                .get("Names")
                .and_then(|v| v.as_array())
                .and_then(|a| a.first())
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            image: get("Image"),
            status: get("State"),
            ..Default::default()
        });
    }
}

fn parse_inspect_record(c: &serde_json::Value) -> LiveContainer {
    let get = |key: &str| {
        c.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    let mounts = c
        .get("Mounts")
        .and_then(|v| v.as_array())
        .map(|mounts| {
            mounts
                .iter()
                .map(|m| LiveMount {
                    source: m
                        .get("Source")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    destination: m
                        .get("Destination")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    rw: m.get("RW").and_then(|v| v.as_bool()).unwrap_or(true),
                })
                .collect()
        })
        .unwrap_or_default();
    let env = c
        .get("Config")
        .and_then(|cfg| cfg.get("Env"))
        .and_then(|v| v.as_array())
        .map(|env| {
            env.iter()
                .filter_map(|e| e.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    LiveContainer {
        id: get("Id"),
        name: get("Name"),
        image: c
            .get("ImageName")
            .and_then(|v| v.as_str())
            .unwrap_or(&get("Image"))
            .to_string(),
        status: c
            .get("State")
            .and_then(|s| s.get("Status"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        mounts,
        env,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, WarningSink};
    use std::fs;

    #[test]
    fn quadlet_image_is_extracted() {
        let content = "[Unit]\nDescription=Web\n\n[Container]\nImage=quay.io/acme/web:1.4\nPublishPort=8080:80\n";
        assert_eq!(extract_quadlet_image(content), "quay.io/acme/web:1.4");
    }

    #[test]
    fn compose_parser_handles_indents() {
        let content = "version: \"3\"\nservices:\n  web:\n    image: nginx:1.25\n  db:\n    image: \"postgres:16\"\nvolumes:\n  data:\n";
        let images = extract_compose_images(content);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].service, "web");
        assert_eq!(images[0].image, "nginx:1.25");
        assert_eq!(images[1].image, "postgres:16");
    }

    #[test]
    fn quadlets_are_collected_from_host_tree() {
        let dir = tempfile::tempdir().unwrap();
        let quadlet_dir = dir.path().join("etc/containers/systemd");
        fs::create_dir_all(&quadlet_dir).unwrap();
        fs::write(
            quadlet_dir.join("metrics.container"),
            "[Container]\nImage=quay.io/acme/metrics:2\n",
        )
        .unwrap();

        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = Context {
            host_root: dir.path(),
            config: &config,
            runner: &runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        ContainerInspector.run(&ctx, &mut snapshot);

        let section = snapshot.containers.unwrap();
        assert_eq!(section.quadlets.len(), 1);
        assert_eq!(section.quadlets[0].image, "quay.io/acme/metrics:2");
        assert!(section.live.is_empty());
    }
}
