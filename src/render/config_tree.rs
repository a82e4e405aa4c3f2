// src/render/config_tree.rs

//! Mirrored configuration tree under `config/`.
//!
//! Everything the Containerfile copies in its consolidated layer is staged
//! here first: captured configs, repo files, firewall zones, generated
//! timer units, kernel snippets, the sysctl override file, tmpfiles.d
//! declarations. Account fragments land in `config/tmp/` so the sweep of
//! `config/etc/` never copies them; quadlet units get their own `quadlet/`
//! subtree.

use crate::error::Result;
use crate::snapshot::{ProfileMethod, Snapshot, TimerSource};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Relative NM profile paths that must NOT be baked into the image
/// (dynamic profiles belong to the kickstart instead).
pub fn dynamic_profile_paths(snapshot: &Snapshot) -> BTreeSet<String> {
    snapshot
        .network
        .as_ref()
        .map(|n| {
            n.connections
                .iter()
                .filter(|c| c.method == ProfileMethod::Dynamic)
                .map(|c| c.path.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn write_under(base: &Path, rel: &str, content: &str) -> Result<()> {
    let dest = base.join(rel.trim_start_matches('/'));
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, content)?;
    Ok(())
}

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let config_dir = output_dir.join("config");
    fs::create_dir_all(&config_dir)?;
    let dynamic_paths = dynamic_profile_paths(snapshot);

    // Captured configs (already redacted)
    if let Some(configs) = &snapshot.configs {
        for file in &configs.files {
            if dynamic_paths.contains(&file.path) {
                continue;
            }
            write_under(&config_dir, &file.path, &file.content)?;
        }
    }

    // Repo files
    if let Some(packages) = &snapshot.packages {
        for repo in &packages.repo_files {
            write_under(&config_dir, &repo.path, &repo.content)?;
        }
    }

    if let Some(network) = &snapshot.network {
        for zone in &network.firewall_zones {
            if !zone.path.is_empty() {
                write_under(&config_dir, &zone.path, &zone.content)?;
            }
        }
        if !network.direct_rules.is_empty() {
            let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<direct>\n");
            for rule in &network.direct_rules {
                xml.push_str(&format!(
                    "  <rule priority=\"{}\" table=\"{}\" ipv=\"{}\" chain=\"{}\">{}</rule>\n",
                    rule.priority, rule.table, rule.ipv, rule.chain, rule.args
                ));
            }
            xml.push_str("</direct>\n");
            write_under(&config_dir, "etc/firewalld/direct.xml", &xml)?;
        }
    }

    // Timer units: cron conversions plus existing local timers
    if let Some(scheduled) = &snapshot.scheduled {
        for unit in &scheduled.generated {
            write_under(
                &config_dir,
                &format!("etc/systemd/system/{}.timer", unit.name),
                &unit.timer_content,
            )?;
            write_under(
                &config_dir,
                &format!("etc/systemd/system/{}.service", unit.name),
                &unit.service_content,
            )?;
        }
        for timer in &scheduled.timers {
            if timer.source == TimerSource::Local && !timer.timer_content.is_empty() {
                write_under(
                    &config_dir,
                    &format!("etc/systemd/system/{}.timer", timer.name),
                    &timer.timer_content,
                )?;
                if !timer.service_content.is_empty() {
                    write_under(
                        &config_dir,
                        &format!("etc/systemd/system/{}.service", timer.name),
                        &timer.service_content,
                    )?;
                }
            }
        }
    }

    // Quadlet units live outside config/: they get a dedicated COPY
    if let Some(containers) = &snapshot.containers {
        if !containers.quadlets.is_empty() {
            let quadlet_dir = output_dir.join("quadlet");
            fs::create_dir_all(&quadlet_dir)?;
            for unit in &containers.quadlets {
                if !unit.name.is_empty() {
                    fs::write(quadlet_dir.join(&unit.name), &unit.content)?;
                }
            }
        }
    }

    // Non-package software payloads: lockfile sets and single-file captures
    if let Some(software) = &snapshot.software {
        for item in &software.items {
            if !item.lockfiles.is_empty() {
                for (name, content) in &item.lockfiles {
                    write_under(&config_dir, &format!("{}/{}", item.path, name), content)?;
                }
            } else if let Some(content) = &item.content {
                write_under(&config_dir, &item.path, content)?;
            }
        }
    }

    // Account fragments for append-based provisioning
    if let Some(users) = &snapshot.users {
        let fragments: [(&str, &Vec<String>); 6] = [
            ("passwd.append", &users.passwd_lines),
            ("shadow.append", &users.shadow_lines),
            ("group.append", &users.group_lines),
            ("gshadow.append", &users.gshadow_lines),
            ("subuid.append", &users.subuid_lines),
            ("subgid.append", &users.subgid_lines),
        ];
        for (name, lines) in fragments {
            if !lines.is_empty() {
                write_under(&config_dir, &format!("tmp/{name}"), &(lines.join("\n") + "\n"))?;
            }
        }
    }

    // Kernel snippets and the consolidated sysctl override file
    if let Some(kernel) = &snapshot.kernel {
        for list in [&kernel.modules_load, &kernel.modprobe, &kernel.dracut] {
            for snippet in list {
                write_under(&config_dir, &snippet.path, &snippet.content)?;
            }
        }
        if !kernel.sysctl_overrides.is_empty() {
            let mut lines = vec!["# Non-default sysctl values detected on the source host".to_string()];
            for entry in &kernel.sysctl_overrides {
                lines.push(format!("{} = {}", entry.key, entry.runtime));
            }
            write_under(
                &config_dir,
                "etc/sysctl.d/99-retrofit.conf",
                &(lines.join("\n") + "\n"),
            )?;
        }
    }

    // tmpfiles.d: transient directories for the mutable state root
    let mut tmpfiles = vec![
        "# Directories created on every boot. /var is seeded at initial".to_string(),
        "# bootstrap only; the image does not update it afterwards.".to_string(),
    ];
    if let Some(users) = &snapshot.users {
        for user in users.users.iter().take(20) {
            if user.name != "root" && !user.home.is_empty() && user.home != "/" {
                tmpfiles.push(format!("d {} 0700 {} {} -", user.home, user.name, user.name));
            }
        }
    }
    if let Some(storage) = &snapshot.storage {
        for dir in storage.state_dirs.iter().take(20) {
            tmpfiles.push(format!("d /{} 0755 root root -", dir.path));
        }
    }
    write_under(
        &config_dir,
        "etc/tmpfiles.d/retrofit-state.conf",
        &(tmpfiles.join("\n") + "\n"),
    )?;

    Ok(())
}

/// Non-empty top-level directories under config/, excluding the staging
/// area. Each becomes one COPY line.
pub fn copy_roots(output_dir: &Path) -> Vec<String> {
    let config_dir = output_dir.join("config");
    let mut roots = Vec::new();
    let Ok(entries) = fs::read_dir(&config_dir) else {
        return roots;
    };
    let mut dirs: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    for dir in dirs {
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name == "tmp" {
            continue;
        }
        let has_file = walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_file());
        if has_file {
            roots.push(name);
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        ConfigFile, ConfigKind, ConfigSection, ConnectionProfile, NetworkSection, UserRecord,
        UserSection,
    };

    #[test]
    fn dynamic_profiles_stay_out_of_the_tree() {
        let mut snapshot = Snapshot::new();
        snapshot.network = Some(NetworkSection {
            connections: vec![
                ConnectionProfile {
                    path: "etc/NetworkManager/system-connections/lan.nmconnection".into(),
                    name: "lan".into(),
                    method: ProfileMethod::Static,
                    kind: "ethernet".into(),
                },
                ConnectionProfile {
                    path: "etc/NetworkManager/system-connections/dhcp.nmconnection".into(),
                    name: "dhcp".into(),
                    method: ProfileMethod::Dynamic,
                    kind: "ethernet".into(),
                },
            ],
            ..Default::default()
        });
        snapshot.configs = Some(ConfigSection {
            files: vec![
                ConfigFile {
                    path: "etc/NetworkManager/system-connections/lan.nmconnection".into(),
                    kind: ConfigKind::Unowned,
                    content: "[ipv4]\nmethod=manual\n".into(),
                    verify_flags: None,
                    package: None,
                    diff: None,
                    note: None,
                },
                ConfigFile {
                    path: "etc/NetworkManager/system-connections/dhcp.nmconnection".into(),
                    kind: ConfigKind::Unowned,
                    content: "[ipv4]\nmethod=auto\n".into(),
                    verify_flags: None,
                    package: None,
                    diff: None,
                    note: None,
                },
            ],
        });

        let dir = tempfile::tempdir().unwrap();
        render(&snapshot, dir.path()).unwrap();
        assert!(dir
            .path()
            .join("config/etc/NetworkManager/system-connections/lan.nmconnection")
            .exists());
        assert!(!dir
            .path()
            .join("config/etc/NetworkManager/system-connections/dhcp.nmconnection")
            .exists());
    }

    #[test]
    fn account_fragments_go_to_staging_not_etc() {
        let mut snapshot = Snapshot::new();
        snapshot.users = Some(UserSection {
            users: vec![UserRecord {
                name: "svc".into(),
                uid: 1001,
                gid: 1001,
                home: "/home/svc".into(),
                shell: "/bin/bash".into(),
            }],
            passwd_lines: vec!["svc:x:1001:1001::/home/svc:/bin/bash".into()],
            shadow_lines: vec!["svc:$6$x$y:19000::::::".into()],
            ..Default::default()
        });

        let dir = tempfile::tempdir().unwrap();
        render(&snapshot, dir.path()).unwrap();
        assert!(dir.path().join("config/tmp/passwd.append").exists());
        assert!(dir.path().join("config/tmp/shadow.append").exists());
        assert!(!dir.path().join("config/etc/passwd.append").exists());

        // tmp/ never appears as a COPY root
        let roots = copy_roots(dir.path());
        assert_eq!(roots, vec!["etc"]);
    }
}
