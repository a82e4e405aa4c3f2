// src/inspect/software.rs

//! Non-package software inspector.
//!
//! Scans /opt, /srv, and /usr/local for software the package manager does
//! not know about. The FHS subdirectories of /usr/local are enumerated
//! file by file; user home directories are deliberately never scanned —
//! what lives there is overwhelmingly development checkouts, not deployed
//! services.
//!
//! Detection order per candidate: ecosystem metadata (pip dist-info,
//! venv configs, npm/yarn/gem lockfiles, a .git directory at the root),
//! then object-file classification through readelf (Go buildid note,
//! .rustc section, NEEDED list), then version strings from the leading
//! 4 KiB of the file. --deep-binary-scan extends the last step to the
//! whole binary with a wider pattern set.

use super::{filtered_find, rel_path, safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{
    Confidence, PipPackage, Provenance, Snapshot, SoftwareItem, SoftwareSection,
};
use regex::bytes::Regex as BytesRegex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// FHS directories under /usr/local that exist on every install.
const FHS_DIRS: &[&str] = &[
    "bin", "etc", "games", "include", "lib", "lib64", "libexec", "sbin", "share", "src", "man",
];
const FHS_BIN_DIRS: &[&str] = &["bin", "sbin", "libexec"];
const FHS_LIB_DIRS: &[&str] = &["lib", "lib64"];

fn quick_version_patterns() -> &'static Vec<BytesRegex> {
    static PATTERNS: OnceLock<Vec<BytesRegex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)version\s*[=:]\s*["']?([0-9]+\.[0-9]+(?:\.[0-9]+)?)"#,
            r"v([0-9]+\.[0-9]+(?:\.[0-9]+)?)[\s\-]",
            r"([0-9]+\.[0-9]+\.[0-9]+)(?:\s|$|\))",
        ]
        .iter()
        .filter_map(|p| BytesRegex::new(p).ok())
        .collect()
    })
}

fn deep_version_patterns() -> &'static Vec<BytesRegex> {
    static PATTERNS: OnceLock<Vec<BytesRegex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)version\s*[=:]\s*["']?([0-9]+\.[0-9]+(?:\.[0-9]+)?)"#,
            r"v([0-9]+\.[0-9]+(?:\.[0-9]+)?)[\s\-]",
            r"([0-9]+\.[0-9]+\.[0-9]+)(?:\s|$|\))",
            // Linker-embedded toolchain stamps
            r"go([0-9]+\.[0-9]+(?:\.[0-9]+)?)\b",
            r"rustc\s+([0-9]+\.[0-9]+\.[0-9]+)",
            r"(?i)(?:built|compiled|linked)\s+(?:with|against)\s+\S+\s+([0-9]+\.[0-9]+\.[0-9]+)",
            r"(?:release|tag)[/\-]v?([0-9]+\.[0-9]+\.[0-9]+)",
            r"v([0-9]+\.[0-9]+\.[0-9]+)-[0-9]+-g[0-9a-f]+",
            r"(?i)(?:OpenSSL|LibreSSL|BoringSSL)\s+([0-9]+\.[0-9]+\.[0-9]+[a-z]?)",
            r#"(?i)java\s+version\s+["']([0-9]+\.[0-9]+\.[0-9]+)"#,
            r"(?i)node\s+v([0-9]+\.[0-9]+\.[0-9]+)",
            r"Python\s+([0-9]+\.[0-9]+\.[0-9]+)",
        ]
        .iter()
        .filter_map(|p| BytesRegex::new(p).ok())
        .collect()
    })
}

pub struct SoftwareInspector;

impl Inspector for SoftwareInspector {
    fn name(&self) -> &'static str {
        "software"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = SoftwareSection::default();

        scan_roots(ctx, &mut section);
        scan_venvs(ctx, &mut section);
        scan_system_dist_info(ctx, &mut section);
        scan_requirements(ctx, &mut section);
        scan_lockfiles(ctx, &mut section);

        dedup_by_confidence(&mut section);
        snapshot.software = Some(section);
    }
}

// =============================================================================
// Binary classification
// =============================================================================

struct BinaryInfo {
    provenance: Provenance,
    static_link: bool,
    shared_libs: Vec<String>,
}

/// Classify via the object-file section table. Ecosystem-identifying
/// sections beat any string heuristics.
fn classify_binary(ctx: &Context, path: &Path) -> Option<BinaryInfo> {
    let path_str = path.to_string_lossy().into_owned();
    let sections = ctx
        .runner
        .run(&["readelf", "-S", &path_str])
        .ok()
        .filter(|o| o.success())?
        .stdout;

    let provenance = if sections.contains(".note.go.buildid") || sections.contains(".gopclntab") {
        Provenance::GoBinary
    } else if sections.contains(".rustc") {
        Provenance::RustBinary
    } else {
        Provenance::CBinary
    };

    let dynamic = ctx
        .runner
        .run(&["readelf", "-d", &path_str])
        .ok()
        .filter(|o| o.success())
        .map(|o| o.stdout)
        .unwrap_or_default();
    let static_link =
        dynamic.to_lowercase().contains("no dynamic section") || dynamic.trim().is_empty();

    let needed_re = regex::Regex::new(r"\(NEEDED\).*\[(.+?)\]").unwrap();
    let shared_libs = needed_re
        .captures_iter(&dynamic)
        .map(|c| c[1].to_string())
        .collect();

    Some(BinaryInfo {
        provenance,
        static_link,
        shared_libs,
    })
}

fn is_executable_file(ctx: &Context, path: &Path) -> bool {
    let path_str = path.to_string_lossy().into_owned();
    let Ok(out) = ctx.runner.run(&["file", "-b", &path_str]) else {
        return false;
    };
    if !out.success() {
        return false;
    }
    let lower = out.stdout.to_lowercase();
    lower.contains("elf") || lower.contains("executable") || lower.contains("script")
}

/// Version string from the file head (quick) or a full strings pass (deep).
fn strings_version(ctx: &Context, path: &Path, deep: bool) -> Option<String> {
    let path_str = path.to_string_lossy().into_owned();
    let out = if deep {
        ctx.runner.run(&["strings", &path_str]).ok()?
    } else {
        let script = format!("head -c 4096 '{path_str}' | strings");
        ctx.runner.run(&["sh", "-c", &script]).ok()?
    };
    if !out.success() {
        return None;
    }
    let data = out.stdout.as_bytes();
    let patterns = if deep {
        deep_version_patterns()
    } else {
        quick_version_patterns()
    };
    for pattern in patterns {
        if let Some(caps) = pattern.captures(data) {
            if let Some(m) = caps.get(1) {
                return Some(String::from_utf8_lossy(m.as_bytes()).trim().to_string());
            }
        }
    }
    None
}

fn classify_file(ctx: &Context, path: &Path) -> SoftwareItem {
    let rel = rel_path(ctx.host_root, path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut item = SoftwareItem::new(&rel, &name);
    item.method = "file scan".into();

    if let Some(info) = classify_binary(ctx, path) {
        item.provenance = info.provenance;
        item.static_link = info.static_link;
        item.shared_libs = info.shared_libs;
        item.confidence = Confidence::High;
        item.method = format!(
            "readelf ({})",
            match info.provenance {
                Provenance::GoBinary => "go",
                Provenance::RustBinary => "rust",
                _ => "c/c++",
            }
        );
        return item;
    }

    if is_executable_file(ctx, path) {
        if let Some(version) = strings_version(ctx, path, ctx.config.deep_binary_scan) {
            item.version = Some(version);
            item.confidence = Confidence::Medium;
            item.method = if ctx.config.deep_binary_scan {
                "strings".into()
            } else {
                "strings (first 4KB)".into()
            };
            return item;
        }
    }

    // Nothing identified it; new() already defaults to unknown/unknown
    item
}

// =============================================================================
// Git checkouts
// =============================================================================

fn scan_git_checkout(ctx: &Context, dir: &Path) -> Option<SoftwareItem> {
    let git_dir = dir.join(".git");
    if !git_dir.is_dir() {
        return None;
    }

    let mut remote = String::new();
    for line in safe_read(&git_dir.join("config")).lines() {
        if let Some(value) = line.trim().strip_prefix("url =") {
            remote = value.trim().to_string();
            break;
        }
    }

    let head = safe_read(&git_dir.join("HEAD")).trim().to_string();
    let (commit, branch) = if let Some(reference) = head.strip_prefix("ref:") {
        let reference = reference.trim();
        let commit = safe_read(&git_dir.join(reference)).trim().to_string();
        let branch = reference
            .strip_prefix("refs/heads/")
            .unwrap_or("")
            .to_string();
        (commit, branch)
    } else {
        (head, String::new())
    };

    let rel = rel_path(ctx.host_root, dir);
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut item = SoftwareItem::new(&rel, &name);
    item.provenance = Provenance::Git;
    item.confidence = Confidence::High;
    item.method = "git checkout".into();
    item.git_remote = Some(remote);
    item.git_commit = Some(commit);
    item.git_branch = Some(branch);
    Some(item)
}

// =============================================================================
// Directory roots
// =============================================================================

fn scan_roots(ctx: &Context, section: &mut SoftwareSection) {
    for base in ["opt", "srv", "usr/local"] {
        let root = ctx.host_path(base);
        if !root.is_dir() {
            continue;
        }
        for entry in safe_iterdir(&root) {
            let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !entry.is_dir() || name.starts_with('.') || super::is_dev_artifact(&entry) {
                continue;
            }
            if base == "usr/local" && FHS_DIRS.contains(&name.as_str()) {
                // bin/sbin/libexec and the lib dirs are enumerated per file
                if FHS_BIN_DIRS.contains(&name.as_str()) || FHS_LIB_DIRS.contains(&name.as_str())
                {
                    scan_fhs_dir(ctx, &entry, section);
                }
                continue;
            }

            if let Some(item) = scan_git_checkout(ctx, &entry) {
                section.items.push(item);
                continue;
            }
            if entry.join("pyvenv.cfg").is_file() {
                // handled by the venv pass
                continue;
            }

            section.items.push(scan_directory(ctx, &entry));
        }
    }
}

/// Enumerate individual files in an FHS directory (one level of recursion
/// for lib subtrees like lib/python3.x).
fn scan_fhs_dir(ctx: &Context, dir: &Path, section: &mut SoftwareSection) {
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for entry in safe_iterdir(dir) {
        let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if entry.is_file() || (entry.is_symlink() && entry.exists()) {
            section.items.push(classify_file(ctx, &entry));
        } else if entry.is_dir() && FHS_LIB_DIRS.contains(&dir_name.as_str()) {
            scan_fhs_dir(ctx, &entry, section);
        }
    }
}

/// Classify an application directory by the first classifiable binary in it.
fn scan_directory(ctx: &Context, dir: &Path) -> SoftwareItem {
    let rel = rel_path(ctx.host_root, dir);
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut item = SoftwareItem::new(&rel, &name);
    item.method = "directory scan".into();

    for file in filtered_find(dir, &|_| true) {
        if let Some(info) = classify_binary(ctx, &file) {
            item.provenance = info.provenance;
            item.static_link = info.static_link;
            item.shared_libs = info.shared_libs;
            item.confidence = Confidence::High;
            item.method = format!(
                "readelf ({})",
                match info.provenance {
                    Provenance::GoBinary => "go",
                    Provenance::RustBinary => "rust",
                    _ => "c/c++",
                }
            );
            return item;
        }
        if is_executable_file(ctx, &file) {
            if let Some(version) = strings_version(ctx, &file, ctx.config.deep_binary_scan) {
                item.version = Some(version);
                item.confidence = Confidence::Medium;
                item.method = "strings".into();
                return item;
            }
        }
    }
    item
}

// =============================================================================
// Python: venvs and dist-info
// =============================================================================

fn parse_dist_info_name(stem: &str) -> (String, String) {
    let parts: Vec<&str> = stem.split('-').collect();
    for (i, part) in parts.iter().enumerate() {
        if part.starts_with(|c: char| c.is_ascii_digit()) {
            return (parts[..i].join("-"), parts[i..].join("-"));
        }
    }
    (stem.to_string(), String::new())
}

fn collect_dist_info(dir: &Path) -> Vec<(PipPackage, bool)> {
    let mut packages = Vec::new();
    for entry in safe_iterdir(dir) {
        let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".dist-info") else {
            continue;
        };
        if !entry.is_dir() {
            continue;
        }
        let (pkg_name, version) = parse_dist_info_name(stem);
        let record = safe_read(&entry.join("RECORD"));
        let has_native = record
            .lines()
            .any(|l| l.trim().ends_with(".so") || l.contains(".so,"));
        packages.push((
            PipPackage {
                name: pkg_name,
                version,
            },
            has_native,
        ));
    }
    packages
}

fn scan_venvs(ctx: &Context, section: &mut SoftwareSection) {
    for base in ["opt", "srv"] {
        let root = ctx.host_path(base);
        if !root.is_dir() {
            continue;
        }
        for cfg in filtered_find(&root, &|n| n == "pyvenv.cfg") {
            let venv_dir = match cfg.parent() {
                Some(parent) => parent.to_path_buf(),
                None => continue,
            };
            let system_sp = safe_read(&cfg).lines().any(|l| {
                let l = l.trim().to_lowercase();
                l.starts_with("include-system-site-packages") && l.contains("true")
            });

            let mut packages = Vec::new();
            let mut has_native = false;
            // site-packages sits at lib/pythonX.Y/site-packages or lib64/...
            for lib in ["lib", "lib64"] {
                for pydir in safe_iterdir(&venv_dir.join(lib)) {
                    let sp = pydir.join("site-packages");
                    if sp.is_dir() {
                        for (pkg, native) in collect_dist_info(&sp) {
                            has_native |= native;
                            packages.push(pkg);
                        }
                    }
                }
            }
            packages.sort();

            let rel = rel_path(ctx.host_root, &venv_dir);
            let name = venv_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(venv = %rel, packages = packages.len(), "python venv");
            let mut item = SoftwareItem::new(&rel, &name);
            item.provenance = Provenance::Pip;
            item.confidence = Confidence::High;
            item.method = "python venv".into();
            item.system_site_packages = system_sp;
            item.packages = packages;
            item.has_native_extensions = has_native;
            section.items.push(item);
        }
    }
}

/// pip installs into the system interpreter (outside any venv).
fn scan_system_dist_info(ctx: &Context, section: &mut SoftwareSection) {
    for base in ["usr/lib/python3", "usr/lib64/python3", "usr/local/lib/python3"] {
        // Versioned siblings: usr/lib/python3.9, python3.12, ...
        let parent = ctx.host_path(base).parent().map(|p| p.to_path_buf());
        let Some(parent) = parent else { continue };
        for pydir in safe_iterdir(&parent) {
            let Some(name) = pydir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !name.starts_with("python3") || !pydir.is_dir() {
                continue;
            }
            let sp = pydir.join("site-packages");
            let scan_dir = if sp.is_dir() { sp } else { pydir };
            for (pkg, has_native) in collect_dist_info(&scan_dir) {
                let rel = rel_path(
                    ctx.host_root,
                    &scan_dir.join(format!("{}-{}.dist-info", pkg.name, pkg.version)),
                );
                let mut item = SoftwareItem::new(&rel, &pkg.name);
                item.provenance = Provenance::Pip;
                item.confidence = Confidence::High;
                item.method = "pip dist-info".into();
                item.version = Some(pkg.version.clone()).filter(|v| !v.is_empty());
                item.has_native_extensions = has_native;
                section.items.push(item);
            }
        }
    }
}

fn scan_requirements(ctx: &Context, section: &mut SoftwareSection) {
    for base in ["opt", "srv"] {
        let root = ctx.host_path(base);
        if !root.is_dir() {
            continue;
        }
        for req in filtered_find(&root, &|n| n == "requirements.txt") {
            let rel = rel_path(ctx.host_root, &req);
            let mut item = SoftwareItem::new(&rel, "requirements.txt");
            item.provenance = Provenance::Pip;
            item.confidence = Confidence::High;
            item.method = "pip requirements.txt".into();
            item.content = Some(safe_read(&req));
            section.items.push(item);
        }
    }
}

// =============================================================================
// npm / yarn / gem lockfiles
// =============================================================================

const LOCKFILE_COMPANIONS: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "Gemfile",
    "Gemfile.lock",
];

fn read_lockfile_dir(dir: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    for name in LOCKFILE_COMPANIONS {
        let path = dir.join(name);
        if path.is_file() {
            files.insert(name.to_string(), safe_read(&path));
        }
    }
    files
}

fn scan_lockfiles(ctx: &Context, section: &mut SoftwareSection) {
    let kinds: [(&str, Provenance, &str); 3] = [
        ("package-lock.json", Provenance::Npm, "npm package-lock.json"),
        ("yarn.lock", Provenance::Npm, "yarn.lock"),
        ("Gemfile.lock", Provenance::Gem, "gem Gemfile.lock"),
    ];
    for base in ["opt", "srv", "usr/local"] {
        let root = ctx.host_path(base);
        if !root.is_dir() {
            continue;
        }
        for (lockfile, provenance, method) in kinds {
            for lock in filtered_find(&root, &|n| n == lockfile) {
                let Some(dir) = lock.parent() else { continue };
                let rel = rel_path(ctx.host_root, dir);
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let mut item = SoftwareItem::new(&rel, &name);
                item.provenance = provenance;
                item.confidence = Confidence::High;
                item.method = method.into();
                item.lockfiles = read_lockfile_dir(dir);
                section.items.push(item);
            }
        }
    }
}

// =============================================================================
// Dedup
// =============================================================================

/// Several passes can hit the same path; keep the highest-confidence record.
fn dedup_by_confidence(section: &mut SoftwareSection) {
    let mut best: BTreeMap<String, SoftwareItem> = BTreeMap::new();
    for item in section.items.drain(..) {
        match best.get(&item.path) {
            Some(existing) if existing.confidence >= item.confidence => {}
            _ => {
                best.insert(item.path.clone(), item);
            }
        }
    }
    section.items = best.into_values().collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, WarningSink};
    use std::fs;

    fn run_with(host: &Path, runner: &FakeRunner) -> SoftwareSection {
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = Context {
            host_root: host,
            config: &config,
            runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        SoftwareInspector.run(&ctx, &mut snapshot);
        snapshot.software.unwrap()
    }

    #[test]
    fn unknown_binary_gets_unknown_provenance_and_confidence() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("usr/local/bin")).unwrap();
        fs::write(dir.path().join("usr/local/bin/mytool"), b"\x7fELFdata").unwrap();

        // readelf and file both unavailable: no classification possible
        let runner = FakeRunner::new().without("readelf").without("file");
        let section = run_with(dir.path(), &runner);

        let item = section
            .items
            .iter()
            .find(|i| i.path == "usr/local/bin/mytool")
            .unwrap();
        assert_eq!(item.provenance, Provenance::Unknown);
        assert_eq!(item.confidence, Confidence::Unknown);
    }

    #[test]
    fn go_binary_is_classified_from_section_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("usr/local/bin")).unwrap();
        fs::write(dir.path().join("usr/local/bin/exporter"), b"\x7fELF").unwrap();

        let runner = FakeRunner::new()
            .on(
                &["readelf", "-S"],
                "  [12] .note.go.buildid NOTE\n  [13] .gopclntab PROGBITS\n",
            )
            .on(&["readelf", "-d"], "Dynamic section at offset 0x0:\n (NEEDED) Shared library: [libc.so.6]\n");
        let section = run_with(dir.path(), &runner);

        let item = section
            .items
            .iter()
            .find(|i| i.path == "usr/local/bin/exporter")
            .unwrap();
        assert_eq!(item.provenance, Provenance::GoBinary);
        assert_eq!(item.confidence, Confidence::High);
        assert_eq!(item.shared_libs, vec!["libc.so.6"]);
        assert!(!item.static_link);
    }

    #[test]
    fn venv_with_dist_info_is_collected() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path().join("opt/api");
        let sp = venv.join("lib/python3.9/site-packages");
        fs::create_dir_all(sp.join("flask-3.0.2.dist-info")).unwrap();
        fs::write(
            sp.join("flask-3.0.2.dist-info/RECORD"),
            "flask/__init__.py,,\n",
        )
        .unwrap();
        fs::write(
            venv.join("pyvenv.cfg"),
            "home = /usr/bin\ninclude-system-site-packages = false\n",
        )
        .unwrap();

        let runner = FakeRunner::new();
        let section = run_with(dir.path(), &runner);

        let item = section.items.iter().find(|i| i.path == "opt/api").unwrap();
        assert_eq!(item.provenance, Provenance::Pip);
        assert_eq!(item.method, "python venv");
        assert!(!item.system_site_packages);
        assert_eq!(item.packages.len(), 1);
        assert_eq!(item.packages[0].name, "flask");
        assert_eq!(item.packages[0].version, "3.0.2");
    }

    #[test]
    fn git_checkout_captures_remote_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("opt/deploy-scripts");
        fs::create_dir_all(repo.join(".git/refs/heads")).unwrap();
        fs::write(
            repo.join(".git/config"),
            "[remote \"origin\"]\n\turl = https://git.example.com/ops/deploy.git\n",
        )
        .unwrap();
        fs::write(repo.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(
            repo.join(".git/refs/heads/main"),
            "0a1b2c3d4e5f60718293a4b5c6d7e8f901234567\n",
        )
        .unwrap();

        let runner = FakeRunner::new();
        let section = run_with(dir.path(), &runner);

        let item = section
            .items
            .iter()
            .find(|i| i.path == "opt/deploy-scripts")
            .unwrap();
        assert_eq!(item.provenance, Provenance::Git);
        assert_eq!(
            item.git_remote.as_deref(),
            Some("https://git.example.com/ops/deploy.git")
        );
        assert_eq!(item.git_branch.as_deref(), Some("main"));
        assert!(item.git_commit.as_deref().unwrap().starts_with("0a1b2c3d"));
    }

    #[test]
    fn lockfile_directories_are_captured_with_companions() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("srv/webapp");
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join("package.json"), "{\"name\":\"webapp\"}").unwrap();
        fs::write(app.join("package-lock.json"), "{\"lockfileVersion\":3}").unwrap();

        let runner = FakeRunner::new();
        let section = run_with(dir.path(), &runner);

        let item = section.items.iter().find(|i| i.path == "srv/webapp").unwrap();
        assert_eq!(item.provenance, Provenance::Npm);
        assert!(item.lockfiles.contains_key("package.json"));
        assert!(item.lockfiles.contains_key("package-lock.json"));
    }

    #[test]
    fn dist_info_name_parsing() {
        assert_eq!(
            parse_dist_info_name("typing_extensions-4.9.0"),
            ("typing_extensions".into(), "4.9.0".into())
        );
        assert_eq!(
            parse_dist_info_name("ruamel.yaml-0.18.5"),
            ("ruamel.yaml".into(), "0.18.5".into())
        );
    }
}
