// src/inspect/packages.rs

//! Package inspector: installed set, verify pass, repo files, removal history.
//!
//! The installed list comes from one bulk query against the host rpm
//! database through the read-only mount (`--dbpath`, with a `--root`
//! fallback). The added/removed classification is pure set arithmetic
//! against the resolved baseline — per-package queries are deliberately
//! never issued.

use super::{safe_iterdir, Context, Inspector};
use crate::snapshot::{
    BaselineMode, PackageRecord, PackageSection, RepoFile, Snapshot, VerifyEntry,
};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const QUERYFORMAT: &str = "%{EPOCH}:%{NAME}-%{VERSION}-%{RELEASE}.%{ARCH}\\n";

/// Packages that are database artifacts, not real payloads.
const VIRTUAL_PACKAGES: &[&str] = &["gpg-pubkey"];

pub struct PackageInspector;

impl Inspector for PackageInspector {
    fn name(&self) -> &'static str {
        "packages"
    }

    fn depends_on_baseline(&self) -> bool {
        true
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = PackageSection::default();

        let installed = query_installed(ctx, &mut section);
        classify(ctx, installed, &mut section);

        section.verify = query_verify(ctx);
        section.repo_files = collect_repo_files(ctx);
        section.history_removed = history_removed(ctx);

        snapshot.packages = Some(section);
    }
}

/// Parse one `epoch:name-version-release.arch` line. Epoch is numeric or
/// `(none)` when the package carries no explicit epoch tag.
pub fn parse_nevra(line: &str) -> Option<PackageRecord> {
    let line = line.trim();
    let (epoch_part, rest) = line.split_once(':')?;
    let epoch = if epoch_part.chars().all(|c| c.is_ascii_digit()) && !epoch_part.is_empty() {
        epoch_part.to_string()
    } else if epoch_part == "(none)" {
        "0".to_string()
    } else {
        return None;
    };
    let (base, arch) = rest.rsplit_once('.')?;
    let mut parts: Vec<&str> = base.split('-').collect();
    if parts.len() < 3 {
        return None;
    }
    let release = parts.pop()?.to_string();
    let version = parts.pop()?.to_string();
    let name = parts.join("-");
    if name.is_empty() {
        return None;
    }
    Some(PackageRecord {
        name,
        epoch,
        version,
        release,
        arch: arch.to_string(),
    })
}

fn query_installed(ctx: &Context, section: &mut PackageSection) -> Vec<PackageRecord> {
    let dbpath = ctx.host_path("var/lib/rpm");
    let dbpath_str = dbpath.to_string_lossy().into_owned();
    let root_str = ctx.host_root.to_string_lossy().into_owned();

    let mut out = ctx
        .runner
        .run(&["rpm", "--dbpath", &dbpath_str, "-qa", "--queryformat", QUERYFORMAT])
        .ok()
        .filter(|o| o.success());

    if out.is_none() {
        // Older database formats only open through --root
        out = ctx
            .runner
            .run(&["rpm", "--root", &root_str, "-qa", "--queryformat", QUERYFORMAT])
            .ok()
            .filter(|o| o.success());
        if out.is_some() {
            ctx.warnings.info(
                "packages",
                "rpm -qa used the --root fallback (--dbpath query failed); results are \
                 correct but slower",
            );
        }
    }

    let Some(out) = out else {
        ctx.warnings.warn(
            "packages",
            "rpm database query failed; package inspection is incomplete",
        );
        section.partial = true;
        return Vec::new();
    };

    let mut parsed = Vec::new();
    let mut failed = 0usize;
    for line in out.stdout.lines().filter(|l| !l.trim().is_empty()) {
        match parse_nevra(line) {
            Some(record) if !VIRTUAL_PACKAGES.contains(&record.name.as_str()) => {
                parsed.push(record)
            }
            Some(_) => {}
            None => failed += 1,
        }
    }
    if failed > 0 {
        let total = parsed.len() + failed;
        let pct = failed * 100 / total.max(1);
        let message = format!(
            "rpm -qa: {failed} package line(s) could not be parsed ({pct}% of output); \
             the package list may be incomplete"
        );
        if pct >= 5 {
            ctx.warnings.warn("packages", message);
        } else {
            ctx.warnings.info("packages", message);
        }
    }
    debug!(count = parsed.len(), "parsed installed packages");
    parsed
}

/// added = installed \ baseline, removed = baseline \ installed.
fn classify(ctx: &Context, installed: Vec<PackageRecord>, section: &mut PackageSection) {
    let installed_names: BTreeSet<String> =
        installed.iter().map(|p| p.name.clone()).collect();

    if ctx.baseline.mode == BaselineMode::AllPackages {
        let mut added = installed;
        added.sort_by(|a, b| a.name.cmp(&b.name));
        section.added = added;
        return;
    }

    let baseline = &ctx.baseline.package_names;
    let added_names: BTreeSet<&String> = installed_names.difference(baseline).collect();
    let removed_names: BTreeSet<&String> = baseline.difference(&installed_names).collect();
    debug!(
        added = added_names.len(),
        removed = removed_names.len(),
        "baseline diff"
    );

    let mut added: Vec<PackageRecord> = installed
        .into_iter()
        .filter(|p| added_names.contains(&p.name))
        .collect();
    added.sort_by(|a, b| a.name.cmp(&b.name));
    section.added = added;
    section.removed = removed_names.into_iter().cloned().collect();
}

/// Parse `rpm -Va` output: `S.5....T.  c /etc/foo`.
pub fn parse_verify(stdout: &str) -> Vec<VerifyEntry> {
    let mut entries = Vec::new();
    for line in stdout.lines() {
        let line = line.trim_end();
        if line.len() < 11 {
            continue;
        }
        let flags = line[..9].trim().to_string();
        if flags.is_empty() || flags == "missing" {
            continue;
        }
        let rest = line[9..].trim_start();
        let (config, path) = match rest.split_once(' ') {
            Some((marker, path)) if marker.len() == 1 => {
                (marker == "c", path.trim().to_string())
            }
            _ => (false, rest.trim().to_string()),
        };
        if path.starts_with('/') {
            entries.push(VerifyEntry { path, flags, config });
        }
    }
    entries
}

fn query_verify(ctx: &Context) -> Vec<VerifyEntry> {
    let root_str = ctx.host_root.to_string_lossy().into_owned();
    let argv: Vec<&str> = if ctx.host_root == Path::new("/") {
        vec!["rpm", "-Va", "--nodeps", "--noscripts"]
    } else {
        vec!["rpm", "--root", &root_str, "-Va", "--nodeps", "--noscripts"]
    };
    match ctx.runner.run(&argv) {
        // rpm -Va exits non-zero when anything differs; the output is
        // still the answer.
        Ok(out) => parse_verify(&out.stdout),
        Err(_) => {
            ctx.warnings.info(
                "packages",
                "rpm -Va unavailable; modified-file detection skipped",
            );
            Vec::new()
        }
    }
}

fn collect_repo_files(ctx: &Context) -> Vec<RepoFile> {
    let mut repo_files = Vec::new();
    for subdir in ["etc/yum.repos.d", "etc/dnf"] {
        for path in safe_iterdir(&ctx.host_path(subdir)) {
            if !path.is_file() {
                continue;
            }
            let is_repo = path
                .extension()
                .map(|e| e == "repo" || e == "conf")
                .unwrap_or(false)
                || subdir == "etc/dnf";
            if !is_repo {
                continue;
            }
            repo_files.push(RepoFile {
                path: super::rel_path(ctx.host_root, &path),
                content: super::safe_read(&path),
            });
        }
    }
    repo_files
}

/// Names of packages that appear in Remove transactions of the dnf history.
fn history_removed(ctx: &Context) -> Vec<String> {
    let Ok(out) = ctx.runner.run(&["dnf", "history", "list", "-q"]) else {
        ctx.warnings.warn(
            "packages",
            "dnf history unavailable; orphaned-config detection is incomplete",
        );
        return Vec::new();
    };
    if !out.success() {
        ctx.warnings.warn(
            "packages",
            "dnf history unavailable; orphaned-config detection is incomplete",
        );
        return Vec::new();
    }

    let mut removed = Vec::new();
    for line in out.stdout.lines() {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 4 || !fields[3].contains("Removed") {
            continue;
        }
        let Ok(tid) = fields[0].parse::<u64>() else {
            continue;
        };
        let tid_str = tid.to_string();
        let Ok(info) = ctx.runner.run(&["dnf", "history", "info", &tid_str, "-q"]) else {
            continue;
        };
        if !info.success() {
            continue;
        }
        for iline in info.stdout.lines() {
            let trimmed = iline.trim();
            if let Some(rest) = trimmed.strip_prefix("Removed") {
                if let Some(nevra) = rest.split_whitespace().next() {
                    removed.push(nevra_name(nevra));
                }
            }
        }
    }
    removed.sort();
    removed.dedup();
    removed
}

/// Best-effort name extraction from a name-version-release.arch string.
fn nevra_name(nevra: &str) -> String {
    // The name is everything before the first dash that precedes a digit.
    let parts: Vec<&str> = nevra.split('-').collect();
    for i in 1..parts.len() {
        if parts[i].starts_with(|c: char| c.is_ascii_digit()) {
            return parts[..i].join("-");
        }
    }
    nevra.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::Baseline;
    use crate::snapshot::WarningSink;
    use std::collections::BTreeSet;

    #[test]
    fn nevra_parsing_handles_epochs_and_dashes() {
        let p = parse_nevra("(none):kernel-tools-5.14.0-427.el9.x86_64").unwrap();
        assert_eq!(p.name, "kernel-tools");
        assert_eq!(p.epoch, "0");
        assert_eq!(p.version, "5.14.0");
        assert_eq!(p.release, "427.el9");
        assert_eq!(p.arch, "x86_64");

        let p = parse_nevra("1:openssl-3.0.7-27.el9.x86_64").unwrap();
        assert_eq!(p.epoch, "1");
        assert_eq!(p.name, "openssl");

        assert!(parse_nevra("garbage").is_none());
        assert!(parse_nevra("x:y-z").is_none());
    }

    #[test]
    fn verify_parsing_detects_config_marker() {
        let out = "S.5....T.  c /etc/ssh/sshd_config\n\
                   .M.......    /usr/bin/sudo\n\
                   missing     /etc/gone.conf\n";
        let entries = parse_verify(out);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].config);
        assert_eq!(entries[0].path, "/etc/ssh/sshd_config");
        assert_eq!(entries[0].flags, "S.5....T.");
        assert!(!entries[1].config);
    }

    #[test]
    fn nevra_name_stops_at_version() {
        assert_eq!(nevra_name("httpd-tools-2.4.57-8.el9.x86_64"), "httpd-tools");
        assert_eq!(nevra_name("bash-5.1.8-9.el9.x86_64"), "bash");
    }

    #[test]
    fn set_arithmetic_against_baseline() {
        // Host {a, b, c}, baseline {b, c, d} => added {a}, removed {d}
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on(
            &["rpm", "--dbpath"],
            "0:a-1-1.x86_64\n0:b-1-1.x86_64\n0:c-1-1.x86_64\n",
        );
        let baseline = Baseline {
            mode: BaselineMode::Supplied,
            package_names: BTreeSet::from(["b".into(), "c".into(), "d".into()]),
            preset_enabled: BTreeSet::new(),
            preset_disabled: BTreeSet::new(),
            preset_disable_all: false,
        };
        let warnings = WarningSink::new();
        let config = crate::inspect::InspectConfig::default();
        let ctx = Context {
            host_root: dir.path(),
            config: &config,
            runner: &runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        PackageInspector.run(&ctx, &mut snapshot);

        let section = snapshot.packages.unwrap();
        let added: Vec<&str> = section.added.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(added, vec!["a"]);
        assert_eq!(section.removed, vec!["d".to_string()]);
    }

    #[test]
    fn all_packages_mode_includes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on(
            &["rpm", "--dbpath"],
            "0:zlib-1.2.11-40.el9.x86_64\n0:bash-5.1.8-9.el9.x86_64\n",
        );
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let config = crate::inspect::InspectConfig::default();
        let ctx = Context {
            host_root: dir.path(),
            config: &config,
            runner: &runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        PackageInspector.run(&ctx, &mut snapshot);

        let section = snapshot.packages.unwrap();
        assert_eq!(section.added.len(), 2);
        // Name-sorted regardless of query order
        assert_eq!(section.added[0].name, "bash");
        assert!(section.removed.is_empty());
    }
}
