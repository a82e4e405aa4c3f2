// src/inspect/network.rs

//! Network inspector: NM profiles, firewalld, routes, DNS provenance,
//! hosts additions, proxy configuration.

use super::{rel_path, safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{
    ConnectionProfile, DirectRule, FirewallZone, NetworkSection, ProfileMethod, ProxyEntry,
    ResolvProvenance, RouteFile, Snapshot,
};
use regex::Regex;
use std::fs;
use tracing::debug;

pub struct NetworkInspector;

impl Inspector for NetworkInspector {
    fn name(&self) -> &'static str {
        "network"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = NetworkSection::default();

        collect_connections(ctx, &mut section);
        collect_firewall(ctx, &mut section);
        collect_routes(ctx, &mut section);
        section.resolv = Some(resolv_provenance(ctx));
        if section.resolv == Some(ResolvProvenance::HandEdited) {
            ctx.warnings.warn(
                "network",
                "resolv.conf is hand-edited; decide whether DNS belongs in the image \
                 or at deploy time",
            );
        }
        collect_hosts_additions(ctx, &mut section);
        collect_proxy(ctx, &mut section);

        snapshot.network = Some(section);
    }
}

// =============================================================================
// Connection profiles
// =============================================================================

/// A profile is static when its ipv4 method is explicitly fixed; anything
/// dynamic or unspecified is configured at deploy time instead.
fn classify_method(profile: &str) -> ProfileMethod {
    let mut in_ipv4 = false;
    for line in profile.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_ipv4 = line.eq_ignore_ascii_case("[ipv4]");
            continue;
        }
        if in_ipv4 {
            if let Some(value) = line.strip_prefix("method=") {
                return if value.trim() == "manual" {
                    ProfileMethod::Static
                } else {
                    ProfileMethod::Dynamic
                };
            }
        }
    }
    ProfileMethod::Dynamic
}

fn profile_field(profile: &str, section: &str, key: &str) -> String {
    let mut in_section = false;
    for line in profile.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line.eq_ignore_ascii_case(section);
            continue;
        }
        if in_section {
            if let Some(value) = line.strip_prefix(&format!("{key}=")) {
                return value.trim().to_string();
            }
        }
    }
    String::new()
}

fn collect_connections(ctx: &Context, section: &mut NetworkSection) {
    let dir = ctx.host_path("etc/NetworkManager/system-connections");
    for path in safe_iterdir(&dir) {
        if !path.is_file() {
            continue;
        }
        let content = safe_read(&path);
        let name = {
            let id = profile_field(&content, "[connection]", "id");
            if id.is_empty() {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                id
            }
        };
        section.connections.push(ConnectionProfile {
            path: rel_path(ctx.host_root, &path),
            name,
            method: classify_method(&content),
            kind: profile_field(&content, "[connection]", "type"),
        });
    }
    debug!(count = section.connections.len(), "NM profiles classified");
}

// =============================================================================
// Firewall
// =============================================================================

fn collect_firewall(ctx: &Context, section: &mut NetworkSection) {
    let zones_dir = ctx.host_path("etc/firewalld/zones");
    for path in safe_iterdir(&zones_dir) {
        if !path.is_file() || path.extension().map(|e| e != "xml").unwrap_or(true) {
            continue;
        }
        let content = safe_read(&path);
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        section.firewall_zones.push(parse_zone(
            rel_path(ctx.host_root, &path),
            name,
            content,
        ));
    }

    let direct = ctx.host_path("etc/firewalld/direct.xml");
    if direct.is_file() {
        section.direct_rules = parse_direct_rules(&safe_read(&direct));
    }
}

/// Line-oriented zone XML scrape. firewalld writes one element per line,
/// which keeps a real XML dependency out of the tree.
fn parse_zone(path: String, name: String, content: String) -> FirewallZone {
    let service_re = Regex::new(r#"<service\s+name="([^"]+)""#).unwrap();
    let port_re = Regex::new(r#"<port\s+(?:protocol="([^"]+)"\s+)?port="([^"]+)""#).unwrap();
    let rich_re = Regex::new(r"<rule\b[^>]*>(?s)(.*?)</rule>").unwrap();

    let services = service_re
        .captures_iter(&content)
        .map(|c| c[1].to_string())
        .collect();
    let ports = port_re
        .captures_iter(&content)
        .map(|c| {
            let proto = c.get(1).map(|m| m.as_str()).unwrap_or("tcp");
            format!("{}/{}", &c[2], proto)
        })
        .collect();
    let rich_rules = rich_re
        .captures_iter(&content)
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();

    FirewallZone {
        path,
        name,
        content,
        services,
        ports,
        rich_rules,
    }
}

fn parse_direct_rules(content: &str) -> Vec<DirectRule> {
    let rule_re = Regex::new(
        r#"<rule\s+priority="([^"]*)"\s+table="([^"]*)"\s+ipv="([^"]*)"\s+chain="([^"]*)"\s*>([^<]*)</rule>"#,
    )
    .unwrap();
    rule_re
        .captures_iter(content)
        .map(|c| DirectRule {
            priority: c[1].to_string(),
            table: c[2].to_string(),
            ipv: c[3].to_string(),
            chain: c[4].to_string(),
            args: c[5].trim().to_string(),
        })
        .collect()
}

// =============================================================================
// Routes
// =============================================================================

fn collect_routes(ctx: &Context, section: &mut NetworkSection) {
    // Legacy route-<iface> files and NM dispatcher route configs
    let netscripts = ctx.host_path("etc/sysconfig/network-scripts");
    for path in safe_iterdir(&netscripts) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if path.is_file() && name.starts_with("route-") {
            section.route_files.push(RouteFile {
                path: rel_path(ctx.host_root, &path),
                name,
            });
        }
    }

    // Live route table, default routes filtered — those come from DHCP
    if let Ok(out) = ctx.runner.run(&["ip", "route", "show"]) {
        if out.success() {
            section.ip_routes = out
                .stdout
                .lines()
                .filter(|l| !l.trim().is_empty() && !l.starts_with("default"))
                .map(str::to_string)
                .collect();
        }
    }
    if let Ok(out) = ctx.runner.run(&["ip", "rule", "show"]) {
        if out.success() {
            section.ip_rules = out
                .stdout
                .lines()
                .filter(|l| !is_default_ip_rule(l))
                .map(str::to_string)
                .collect();
        }
    }
}

/// The three rules every kernel installs; only operator additions matter.
fn is_default_ip_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.ends_with("from all lookup local")
        || trimmed.ends_with("from all lookup main")
        || trimmed.ends_with("from all lookup default")
}

// =============================================================================
// DNS provenance
// =============================================================================

/// Decide who manages resolv.conf: follow the symlink, or match a header
/// signature in the body. A plain file with neither is hand-edited.
pub fn resolv_provenance(ctx: &Context) -> ResolvProvenance {
    let path = ctx.host_path("etc/resolv.conf");
    if let Ok(target) = fs::read_link(&path) {
        let target = target.to_string_lossy();
        if target.contains("systemd") || target.contains("resolved") {
            return ResolvProvenance::SystemdResolved;
        }
        if target.contains("NetworkManager") {
            return ResolvProvenance::NetworkManager;
        }
    }
    let text = safe_read(&path);
    if text.is_empty() {
        return ResolvProvenance::Unknown;
    }
    let head: String = text.lines().take(3).collect::<Vec<_>>().join("\n");
    if head.contains("Generated by NetworkManager") {
        ResolvProvenance::NetworkManager
    } else if head.contains("systemd-resolved") || head.contains("resolvectl") {
        ResolvProvenance::SystemdResolved
    } else {
        ResolvProvenance::HandEdited
    }
}

// =============================================================================
// Hosts and proxy
// =============================================================================

/// Entries beyond the loopback boilerplate every install ships.
fn collect_hosts_additions(ctx: &Context, section: &mut NetworkSection) {
    let text = safe_read(&ctx.host_path("etc/hosts"));
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let Some(addr) = fields.next() else { continue };
        if addr == "127.0.0.1" || addr == "::1" || addr == "127.0.1.1" {
            continue;
        }
        section.hosts_additions.push(trimmed.to_string());
    }
}

fn collect_proxy(ctx: &Context, section: &mut NetworkSection) {
    let env_text = safe_read(&ctx.host_path("etc/environment"));
    for line in env_text.lines() {
        let lower = line.to_lowercase();
        if lower.contains("_proxy") && line.contains('=') && !line.trim_start().starts_with('#') {
            section.proxy.push(ProxyEntry {
                source: "etc/environment".into(),
                line: line.trim().to_string(),
            });
        }
    }
    for rel in ["etc/dnf/dnf.conf", "etc/yum.conf"] {
        let text = safe_read(&ctx.host_path(rel));
        for line in text.lines() {
            if line.trim_start().starts_with("proxy") && line.contains('=') {
                section.proxy.push(ProxyEntry {
                    source: rel.into(),
                    line: line.trim().to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, WarningSink};
    use std::path::Path;

    fn make_ctx<'a>(
        host: &'a Path,
        runner: &'a FakeRunner,
        config: &'a crate::inspect::InspectConfig,
        baseline: &'a Baseline,
        warnings: &'a WarningSink,
    ) -> Context<'a> {
        Context {
            host_root: host,
            config,
            runner,
            bridge: None,
            baseline,
            warnings,
        }
    }

    #[test]
    fn static_and_dynamic_profiles_are_classified() {
        assert_eq!(
            classify_method("[connection]\nid=lan\n[ipv4]\nmethod=manual\naddress1=10.0.0.5/24\n"),
            ProfileMethod::Static
        );
        assert_eq!(
            classify_method("[connection]\nid=lan\n[ipv4]\nmethod=auto\n"),
            ProfileMethod::Dynamic
        );
        assert_eq!(classify_method("[connection]\nid=lan\n"), ProfileMethod::Dynamic);
    }

    #[test]
    fn hand_edited_resolv_conf_warns() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/resolv.conf"), "nameserver 10.1.1.1\n").unwrap();

        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = make_ctx(dir.path(), &runner, &config, &baseline, &warnings);
        let mut snapshot = Snapshot::new();
        NetworkInspector.run(&ctx, &mut snapshot);

        assert_eq!(
            snapshot.network.unwrap().resolv,
            Some(ResolvProvenance::HandEdited)
        );
        assert!(warnings.into_warnings().iter().any(|w| w.source == "network"));
    }

    #[test]
    fn nm_generated_resolv_conf_is_recognized() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/resolv.conf"),
            "# Generated by NetworkManager\nnameserver 192.168.1.1\n",
        )
        .unwrap();
        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = make_ctx(dir.path(), &runner, &config, &baseline, &warnings);
        assert_eq!(resolv_provenance(&ctx), ResolvProvenance::NetworkManager);
    }

    #[test]
    fn zone_xml_yields_services_and_ports() {
        let zone = parse_zone(
            "etc/firewalld/zones/public.xml".into(),
            "public".into(),
            r#"<?xml version="1.0" encoding="utf-8"?>
<zone>
  <service name="ssh"/>
  <service name="https"/>
  <port protocol="tcp" port="8443"/>
</zone>
"#
            .into(),
        );
        assert_eq!(zone.services, vec!["ssh", "https"]);
        assert_eq!(zone.ports, vec!["8443/tcp"]);
    }

    #[test]
    fn hosts_additions_skip_loopback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/hosts"),
            "127.0.0.1 localhost\n::1 localhost\n10.0.0.7 db.internal db\n",
        )
        .unwrap();
        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = make_ctx(dir.path(), &runner, &config, &baseline, &warnings);
        let mut section = NetworkSection::default();
        collect_hosts_additions(&ctx, &mut section);
        assert_eq!(section.hosts_additions, vec!["10.0.0.7 db.internal db"]);
    }
}
