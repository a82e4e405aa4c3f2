// src/inspect/configs.rs

//! Config inspector: three passes over the system configuration directory.
//!
//! 1. Owned-and-modified: files the package verify pass flagged, captured
//!    with their verify flags and (with --config-diffs) a unified diff
//!    against the package-shipped original extracted from the cached rpm.
//! 2. Unowned: the filesystem walk of etc/ minus the bulk package-owned
//!    path set, filtered through a literal and a glob exclusion list.
//!    Exclusion is monotone — any matching rule excludes the file.
//! 3. Orphaned: files still present under the former etc/ footprint of
//!    packages that dnf history shows as installed-then-removed.
//!
//! Every captured content blob flows through the redaction gate before the
//! snapshot is sealed; nothing here writes output.

use super::{rel_path, safe_read, Context, Inspector};
use crate::snapshot::{ConfigFile, ConfigKind, ConfigSection, Snapshot, VerifyEntry};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Paths (relative, exact) that are never reported as unowned drift.
/// Machine identity, mtab-style runtime state, and caches.
const LITERAL_EXCLUSIONS: &[&str] = &[
    "etc/machine-id",
    "etc/machine-info",
    "etc/hostname",
    "etc/fstab",
    "etc/mtab",
    "etc/adjtime",
    "etc/resolv.conf",
    "etc/ld.so.cache",
    "etc/aliases.db",
    "etc/localtime",
    "etc/.updated",
    "etc/.pwd.lock",
];

/// Glob rules for generated trees and backup litter.
const GLOB_EXCLUSIONS: &[&str] = &[
    "etc/ssl/certs/**",
    "etc/pki/ca-trust/extracted/**",
    "etc/selinux/targeted/**",
    "etc/udev/hwdb.bin",
    "etc/lvm/archive/**",
    "etc/lvm/backup/**",
    "etc/lvm/cache/**",
    "etc/sysconfig/network-scripts/readme-*",
    "etc/**/*.rpmnew",
    "etc/**/*.rpmsave",
    "etc/**/*.rpmorig",
    "etc/**/*.bak",
    "etc/**/*~",
    "etc/**/*.cache",
    "etc/**/.#*",
];

/// Files larger than this are referenced, not captured.
const MAX_CAPTURE_BYTES: u64 = 512 * 1024;

pub struct ConfigInspector;

impl Inspector for ConfigInspector {
    fn name(&self) -> &'static str {
        "configs"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = ConfigSection::default();

        // The package inspector runs first and already paid for the verify
        // pass; reuse its entries rather than checksumming the host twice.
        let verify: Vec<VerifyEntry> = snapshot
            .packages
            .as_ref()
            .map(|p| p.verify.clone())
            .unwrap_or_default();
        let history_removed: Vec<String> = snapshot
            .packages
            .as_ref()
            .map(|p| p.history_removed.clone())
            .unwrap_or_default();

        collect_owned_modified(ctx, &verify, &mut section);

        let owned = owned_path_set(ctx);
        let exclusions = ExclusionList::defaults();
        collect_unowned(ctx, &owned, &exclusions, &verify, &mut section);

        collect_orphaned(ctx, &history_removed, &mut section);

        snapshot.configs = Some(section);
    }
}

// =============================================================================
// Exclusion rules
// =============================================================================

pub struct ExclusionList {
    literals: BTreeSet<&'static str>,
    globs: GlobSet,
}

impl ExclusionList {
    pub fn defaults() -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in GLOB_EXCLUSIONS {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        ExclusionList {
            literals: LITERAL_EXCLUSIONS.iter().copied().collect(),
            globs: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }

    /// Monotone: once any rule matches, the file is excluded.
    pub fn matches(&self, rel: &str) -> bool {
        self.literals.contains(rel) || self.globs.is_match(rel)
    }
}

// =============================================================================
// Pass 1: owned and modified
// =============================================================================

fn collect_owned_modified(ctx: &Context, verify: &[VerifyEntry], section: &mut ConfigSection) {
    for entry in verify {
        let rel = entry.path.trim_start_matches('/');
        if !rel.starts_with("etc/") {
            continue;
        }
        // Size/mtime-only drift on non-config files is noise
        if !entry.config && !entry.flags.contains('5') {
            continue;
        }
        let abs = ctx.host_path(rel);
        if !abs.is_file() {
            continue;
        }
        let content = capture(ctx, &abs);
        let (package, diff, note) = if ctx.config.config_diffs {
            diff_against_original(ctx, rel, &content)
        } else {
            (None, None, None)
        };
        section.files.push(ConfigFile {
            path: rel.to_string(),
            kind: ConfigKind::OwnedModified,
            content,
            verify_flags: Some(entry.flags.clone()),
            package,
            diff,
            note,
        });
    }
    debug!(
        count = section.files.len(),
        "owned-modified configs captured"
    );
}

fn capture(ctx: &Context, path: &Path) -> String {
    if let Ok(meta) = fs::metadata(path) {
        if meta.len() > MAX_CAPTURE_BYTES {
            ctx.warnings.info(
                "configs",
                format!(
                    "{} is larger than {} KiB; referenced but not captured",
                    path.display(),
                    MAX_CAPTURE_BYTES / 1024
                ),
            );
            return String::new();
        }
    }
    safe_read(path)
}

/// Find the owning package, extract the pristine file from the cached rpm,
/// and produce a unified diff. Falls back to full capture with a note.
fn diff_against_original(
    ctx: &Context,
    rel: &str,
    current: &str,
) -> (Option<String>, Option<String>, Option<String>) {
    let abs = ctx.host_path(rel);
    let abs_str = abs.to_string_lossy().into_owned();
    let dbpath = ctx.host_path("var/lib/rpm");
    let dbpath_str = dbpath.to_string_lossy().into_owned();

    let package = ctx
        .runner
        .run(&[
            "rpm",
            "--dbpath",
            &dbpath_str,
            "-qf",
            &abs_str,
            "--queryformat",
            "%{NAME}",
        ])
        .ok()
        .filter(|o| o.success())
        .map(|o| o.stdout.trim().to_string())
        .filter(|s| !s.is_empty() && !s.contains("not owned"));

    let Some(package) = package else {
        return (None, None, Some("owning package not found".into()));
    };

    let Some(cached_rpm) = find_cached_rpm(ctx, &package) else {
        return (
            Some(package),
            None,
            Some("package-shipped original unavailable (no cached rpm); full file captured".into()),
        );
    };

    let script = format!("rpm2cpio '{cached_rpm}' | cpio -i --quiet --to-stdout './{rel}'");
    let original = ctx
        .runner
        .run(&["sh", "-c", &script])
        .ok()
        .filter(|o| o.success())
        .map(|o| o.stdout);

    let Some(original) = original else {
        return (
            Some(package),
            None,
            Some("rpm2cpio extraction failed; full file captured".into()),
        );
    };

    match unified_diff(ctx, &original, current, rel) {
        Some(diff) if !diff.trim().is_empty() => (Some(package), Some(diff), None),
        Some(_) => (Some(package), None, Some("no textual difference".into())),
        None => (
            Some(package),
            None,
            Some("diff tool unavailable; full file captured".into()),
        ),
    }
}

fn find_cached_rpm(ctx: &Context, package: &str) -> Option<String> {
    let cache = ctx.host_path("var/cache/dnf");
    let prefix = format!("{package}-");
    for entry in WalkDir::new(&cache)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file() && name.starts_with(&prefix) && name.ends_with(".rpm") {
            return Some(entry.path().to_string_lossy().into_owned());
        }
    }
    None
}

/// Run `diff -u` through the adapter over two temp files.
fn unified_diff(ctx: &Context, original: &str, current: &str, label: &str) -> Option<String> {
    let dir = tempfile::tempdir().ok()?;
    let orig_path = dir.path().join("original");
    let cur_path = dir.path().join("current");
    let mut f = fs::File::create(&orig_path).ok()?;
    f.write_all(original.as_bytes()).ok()?;
    let mut f = fs::File::create(&cur_path).ok()?;
    f.write_all(current.as_bytes()).ok()?;

    let orig_str = orig_path.to_string_lossy().into_owned();
    let cur_str = cur_path.to_string_lossy().into_owned();
    let label_orig = format!("--label=a/{label}");
    let label_cur = format!("--label=b/{label}");
    let out = ctx
        .runner
        .run(&["diff", "-u", &label_orig, &label_cur, &orig_str, &cur_str])
        .ok()?;
    // diff exits 1 when files differ
    if out.status > 1 {
        return None;
    }
    Some(out.stdout)
}

// =============================================================================
// Pass 2: unowned
// =============================================================================

/// One bulk file-list query over the whole package database.
fn owned_path_set(ctx: &Context) -> BTreeSet<String> {
    let dbpath = ctx.host_path("var/lib/rpm");
    let dbpath_str = dbpath.to_string_lossy().into_owned();
    let root_str = ctx.host_root.to_string_lossy().into_owned();

    let out = ctx
        .runner
        .run(&["rpm", "--dbpath", &dbpath_str, "-qal"])
        .ok()
        .filter(|o| o.success())
        .or_else(|| {
            ctx.runner
                .run(&["rpm", "--root", &root_str, "-qal"])
                .ok()
                .filter(|o| o.success())
        });

    let Some(out) = out else {
        ctx.warnings.warn(
            "configs",
            "bulk package file list unavailable; unowned-config detection skipped",
        );
        return BTreeSet::new();
    };

    out.stdout
        .lines()
        .filter(|l| l.starts_with('/'))
        .map(|l| l.trim_start_matches('/').to_string())
        .collect()
}

fn collect_unowned(
    ctx: &Context,
    owned: &BTreeSet<String>,
    exclusions: &ExclusionList,
    verify: &[VerifyEntry],
    section: &mut ConfigSection,
) {
    if owned.is_empty() {
        return;
    }
    let already: BTreeSet<String> = verify
        .iter()
        .map(|e| e.path.trim_start_matches('/').to_string())
        .collect();

    let etc = ctx.host_path("etc");
    for entry in WalkDir::new(&etc).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = rel_path(ctx.host_root, entry.path());
        if owned.contains(&rel) || already.contains(&rel) || exclusions.matches(&rel) {
            continue;
        }
        section.files.push(ConfigFile {
            path: rel,
            kind: ConfigKind::Unowned,
            content: capture(ctx, entry.path()),
            verify_flags: None,
            package: None,
            diff: None,
            note: None,
        });
    }
}

// =============================================================================
// Pass 3: orphaned
// =============================================================================

fn collect_orphaned(ctx: &Context, history_removed: &[String], section: &mut ConfigSection) {
    let captured: BTreeSet<String> = section.files.iter().map(|f| f.path.clone()).collect();
    for package in history_removed {
        let footprint = ctx.host_path(&format!("etc/{package}"));
        if !footprint.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&footprint).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = rel_path(ctx.host_root, entry.path());
            if captured.contains(&rel) {
                // Reclassify: a file both unowned and under a removed
                // package's footprint is orphaned.
                if let Some(existing) = section.files.iter_mut().find(|f| f.path == rel) {
                    existing.kind = ConfigKind::Orphaned;
                    existing.package = Some(package.clone());
                }
                continue;
            }
            section.files.push(ConfigFile {
                path: rel,
                kind: ConfigKind::Orphaned,
                content: capture(ctx, entry.path()),
                verify_flags: None,
                package: Some(package.clone()),
                diff: None,
                note: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, PackageSection, WarningSink};

    fn run_inspector(
        host: &Path,
        runner: &FakeRunner,
        packages: Option<PackageSection>,
    ) -> ConfigSection {
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let config = crate::inspect::InspectConfig::default();
        let ctx = Context {
            host_root: host,
            config: &config,
            runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        snapshot.packages = packages;
        ConfigInspector.run(&ctx, &mut snapshot);
        snapshot.configs.unwrap()
    }

    #[test]
    fn unowned_files_exclude_listed_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/machine-id"), "abc123\n").unwrap();
        fs::write(dir.path().join("etc/corp-agent.conf"), "endpoint=x\n").unwrap();
        fs::write(dir.path().join("etc/chrony.conf.rpmsave"), "old\n").unwrap();
        fs::write(dir.path().join("etc/owned.conf"), "shipped\n").unwrap();

        let runner = FakeRunner::new().on(&["rpm", "--dbpath"], "/etc/owned.conf\n");
        let section = run_inspector(dir.path(), &runner, None);

        let unowned: Vec<&str> = section
            .of_kind(ConfigKind::Unowned)
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(unowned, vec!["etc/corp-agent.conf"]);
    }

    #[test]
    fn modified_owned_files_carry_verify_flags() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/ssh")).unwrap();
        fs::write(dir.path().join("etc/ssh/sshd_config"), "PermitRootLogin no\n").unwrap();

        let runner = FakeRunner::new().on(&["rpm", "--dbpath"], "");
        let packages = PackageSection {
            verify: vec![VerifyEntry {
                path: "/etc/ssh/sshd_config".into(),
                flags: "S.5....T.".into(),
                config: true,
            }],
            ..Default::default()
        };
        let section = run_inspector(dir.path(), &runner, Some(packages));

        let modified = section.of_kind(ConfigKind::OwnedModified);
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].verify_flags.as_deref(), Some("S.5....T."));
        assert!(modified[0].content.contains("PermitRootLogin"));
    }

    #[test]
    fn orphaned_footprints_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/httpd/conf.d")).unwrap();
        fs::write(dir.path().join("etc/httpd/conf.d/vhost.conf"), "<VirtualHost>\n").unwrap();

        let runner = FakeRunner::new().on(&["rpm", "--dbpath"], "");
        let packages = PackageSection {
            history_removed: vec!["httpd".into()],
            ..Default::default()
        };
        let section = run_inspector(dir.path(), &runner, Some(packages));

        let orphaned = section.of_kind(ConfigKind::Orphaned);
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].package.as_deref(), Some("httpd"));
    }

    #[test]
    fn exclusion_is_monotone_across_both_lists() {
        let exclusions = ExclusionList::defaults();
        // literal list
        assert!(exclusions.matches("etc/machine-id"));
        // glob list
        assert!(exclusions.matches("etc/chrony.conf.rpmsave"));
        assert!(exclusions.matches("etc/lvm/backup/vg0"));
        assert!(exclusions.matches("etc/ssl/certs/ca-bundle.crt"));
        assert!(!exclusions.matches("etc/corp-agent.conf"));
    }
}
