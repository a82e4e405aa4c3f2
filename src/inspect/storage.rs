// src/inspect/storage.rs

//! Storage inspector: fstab, mount table, LVM layout, automount maps,
//! block-device specials, and the /var data-migration scan.

use super::{safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{
    FstabEntry, LogicalVolume, MountEntry, Snapshot, StateDir, StorageSection,
};
use std::path::Path;
use walkdir::WalkDir;

/// Directories under /var scanned for application data, with a category
/// used when no more specific recommendation applies.
const VAR_SCAN: &[(&str, &str)] = &[
    ("var/lib", "application data"),
    ("var/log", "log retention"),
    ("var/data", "application data"),
    ("var/www", "web content"),
    ("var/opt", "add-on packages"),
];

/// OS-managed directories under /var/lib that never belong in a migration plan.
const VAR_LIB_SKIP: &[&str] = &[
    "alternatives",
    "authselect",
    "dbus",
    "dnf",
    "logrotate",
    "misc",
    "NetworkManager",
    "os-prober",
    "plymouth",
    "polkit-1",
    "portables",
    "private",
    "rpm",
    "rpm-state",
    "selinux",
    "sss",
    "systemd",
    "tuned",
    "unbound",
    "tpm2-tss",
];

/// Stop sizing a directory once it is clearly non-trivial.
const SIZE_SCAN_CAP: u64 = 10 * 1024 * 1024;

pub struct StorageInspector;

impl Inspector for StorageInspector {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = StorageSection::default();

        collect_fstab(ctx, &mut section);
        collect_mounts(ctx, &mut section);
        collect_lvm(ctx, &mut section);
        collect_specials(ctx, &mut section);
        section.state_dirs = scan_var(ctx);

        snapshot.storage = Some(section);
    }
}

fn collect_fstab(ctx: &Context, section: &mut StorageSection) {
    let text = safe_read(&ctx.host_path("etc/fstab"));
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() >= 3 {
            section.fstab.push(FstabEntry {
                device: fields[0].to_string(),
                mount_point: fields[1].to_string(),
                fstype: fields[2].to_string(),
                options: fields.get(3).unwrap_or(&"").to_string(),
            });
        }
    }
}

fn collect_mounts(ctx: &Context, section: &mut StorageSection) {
    let Ok(out) = ctx.runner.run(&["findmnt", "--json", "--real", "--list"]) else {
        ctx.warnings
            .info("storage", "findmnt unavailable; live mount table skipped");
        section.partial = true;
        return;
    };
    if !out.success() {
        section.partial = true;
        return;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&out.stdout) else {
        return;
    };
    let Some(filesystems) = value.get("filesystems").and_then(|f| f.as_array()) else {
        return;
    };
    for fs in filesystems {
        let get = |key: &str| {
            fs.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let target = get("target");
        let fstype = get("fstype");
        let strategy = mount_strategy(&target, &fstype).to_string();
        section.mounts.push(MountEntry {
            target,
            source: get("source"),
            fstype,
            options: get("options"),
            strategy,
        });
    }
}

/// Map a mount to its migration strategy in an image-based deployment.
pub fn mount_strategy(target: &str, fstype: &str) -> &'static str {
    let fs = fstype.to_lowercase();
    if target == "/" || target == "/boot" || target == "/boot/efi" {
        return "image-embedded (managed by bootc)";
    }
    if fs.contains("nfs") || fs.contains("cifs") || fs.contains("glusterfs") || fs.contains("9p") {
        return "external storage — keep as network mount";
    }
    if fs.contains("swap") || target == "swap" || target == "none" {
        return "swap — configure via kernel args or systemd";
    }
    if target == "/tmp" || target == "/dev/shm" {
        return "tmpfs — ephemeral, no action";
    }
    if target.starts_with("/var/lib/mysql")
        || target.starts_with("/var/lib/pgsql")
        || target.starts_with("/var/lib/mongodb")
        || target.starts_with("/var/lib/mariadb")
    {
        return "volume mount — database storage, must persist";
    }
    if target.starts_with("/var/lib/containers") || target.starts_with("/var/lib/docker") {
        return "volume mount — container storage";
    }
    if target.starts_with("/var/log") {
        return "volume mount — log retention";
    }
    if target.starts_with("/var") {
        return "volume mount — mutable state";
    }
    if target.starts_with("/home") {
        return "volume mount — user home directories";
    }
    if target.starts_with("/opt") {
        return "volume or image-embedded — review application needs";
    }
    if target.starts_with("/srv") {
        return "volume mount — served content";
    }
    if target.starts_with("/mnt") || target.starts_with("/media") {
        return "external storage — removable/temporary mount";
    }
    "review — determine if data is mutable or static"
}

fn collect_lvm(ctx: &Context, section: &mut StorageSection) {
    let Ok(out) = ctx
        .runner
        .run(&["lvs", "--reportformat", "json", "--units", "g"])
    else {
        return;
    };
    if !out.success() {
        return;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&out.stdout) else {
        return;
    };
    let lvs = value
        .get("report")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
        .and_then(|r| r.get("lv"))
        .and_then(|l| l.as_array());
    let Some(lvs) = lvs else { return };
    for lv in lvs {
        let get = |key: &str| {
            lv.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        section.volumes.push(LogicalVolume {
            lv_name: get("lv_name"),
            vg_name: get("vg_name"),
            size: get("lv_size"),
        });
    }
}

/// Automount maps and block-device-special configuration surface as
/// pseudo-mount entries so the migration plan lists them in one place.
fn collect_specials(ctx: &Context, section: &mut StorageSection) {
    if ctx.host_path("etc/iscsi/initiatorname.iscsi").is_file() {
        section.mounts.push(MountEntry {
            target: "iSCSI".into(),
            source: "etc/iscsi/initiatorname.iscsi".into(),
            fstype: "iscsi".into(),
            options: String::new(),
            strategy: "review — iSCSI initiator configuration".into(),
        });
    }
    if ctx.host_path("etc/multipath.conf").is_file() {
        section.mounts.push(MountEntry {
            target: "multipath".into(),
            source: "etc/multipath.conf".into(),
            fstype: "dm-multipath".into(),
            options: String::new(),
            strategy: "review — multipath device configuration".into(),
        });
    }

    let auto_master = ctx.host_path("etc/auto.master");
    if auto_master.is_file() {
        section.mounts.push(MountEntry {
            target: "automount".into(),
            source: "etc/auto.master".into(),
            fstype: "autofs".into(),
            options: safe_read(&auto_master).trim().chars().take(500).collect(),
            strategy: "review — automount map".into(),
        });
    }
    for path in safe_iterdir(&ctx.host_path("etc")) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if path.is_file() && name.starts_with("auto.") && name != "auto.master" {
            section.mounts.push(MountEntry {
                target: format!("automount ({name})"),
                source: format!("etc/{name}"),
                fstype: "autofs".into(),
                options: String::new(),
                strategy: "review — automount map".into(),
            });
        }
    }
}

fn scan_var(ctx: &Context) -> Vec<StateDir> {
    let mut results = Vec::new();
    for (subdir, category) in VAR_SCAN {
        let dir = ctx.host_path(subdir);
        if !dir.is_dir() {
            continue;
        }
        for entry in safe_iterdir(&dir) {
            let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !entry.is_dir() || name.starts_with('.') {
                continue;
            }
            if *subdir == "var/lib" && VAR_LIB_SKIP.contains(&name.as_str()) {
                continue;
            }
            let Some(size) = dir_size(&entry) else {
                continue;
            };
            let rel = super::rel_path(ctx.host_root, &entry);
            results.push(StateDir {
                recommendation: var_recommendation(&rel, category).to_string(),
                size_estimate: human_size(size),
                path: rel,
            });
        }
    }
    results
}

/// Total file bytes under a directory, capped; None when it holds no files.
fn dir_size(dir: &Path) -> Option<u64> {
    let mut total = 0u64;
    let mut has_file = false;
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            has_file = true;
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
            if total > SIZE_SCAN_CAP {
                break;
            }
        }
    }
    has_file.then_some(total)
}

fn human_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if bytes > GB {
        format!("~{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes > MB {
        format!("~{} MB", bytes / MB)
    } else if bytes > KB {
        format!("~{} KB", bytes / KB)
    } else {
        format!("{bytes} bytes")
    }
}

fn var_recommendation(path: &str, category: &str) -> String {
    let p = format!("/{path}");
    if ["mysql", "pgsql", "postgres", "mongodb", "mariadb"]
        .iter()
        .any(|db| p.contains(db))
    {
        return "volume mount — database storage, must persist independently".into();
    }
    if p.contains("containers") || p.contains("docker") {
        return "volume mount — container storage".into();
    }
    if p.contains("/var/log") {
        return "volume mount — log retention (or ship to external logging)".into();
    }
    if p.contains("/var/www") {
        return "image-embedded or volume — depends on whether content is static".into();
    }
    if p.to_lowercase().contains("cache") {
        return "ephemeral — rebuilds on next run, no migration needed".into();
    }
    if p.contains("spool") {
        return "volume mount — spool data (mail, print, at jobs)".into();
    }
    format!("volume mount — {category}, review application needs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, WarningSink};
    use std::fs;

    #[test]
    fn mount_strategies_for_known_targets() {
        assert!(mount_strategy("/", "xfs").contains("image-embedded"));
        assert!(mount_strategy("/var/lib/mysql", "xfs").contains("database"));
        assert!(mount_strategy("/mnt/backup", "nfs4").contains("network mount"));
        assert!(mount_strategy("/tmp", "tmpfs").contains("ephemeral"));
    }

    #[test]
    fn var_scan_skips_os_managed_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("var/lib/rpm")).unwrap();
        fs::write(dir.path().join("var/lib/rpm/Packages"), "x").unwrap();
        fs::create_dir_all(dir.path().join("var/lib/grafana")).unwrap();
        fs::write(dir.path().join("var/lib/grafana/grafana.db"), "data").unwrap();

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
        let dirs = scan_var(&ctx);
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].path, "var/lib/grafana");
        assert!(dirs[0].size_estimate.contains("bytes"));
    }

    #[test]
    fn fstab_lines_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/fstab"),
            "# comment\n/dev/vg0/root / xfs defaults 0 0\nnas:/export /mnt/nas nfs4 ro 0 0\n",
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
        let mut section = StorageSection::default();
        collect_fstab(&ctx, &mut section);
        assert_eq!(section.fstab.len(), 2);
        assert_eq!(section.fstab[1].fstype, "nfs4");
    }
}
