// src/inspect/kernel.rs

//! Kernel/boot inspector: command line, GRUB defaults, sysctl divergence,
//! module configuration, dracut, and the loaded-module diff.

use super::{safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{ConfigSnippet, KernelModule, KernelSection, Snapshot, SysctlOverride};
use std::collections::{BTreeMap, BTreeSet};

pub struct KernelInspector;

impl Inspector for KernelInspector {
    fn name(&self) -> &'static str {
        "kernel"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = KernelSection::default();

        section.cmdline = safe_read(&ctx.host_path("proc/cmdline")).trim().to_string();
        section.grub_defaults = safe_read(&ctx.host_path("etc/default/grub"))
            .trim()
            .chars()
            .take(500)
            .collect();

        let defaults = collect_sysctl(ctx, "usr/lib/sysctl.d");
        let mut overrides = collect_sysctl(ctx, "etc/sysctl.d");
        let sysctl_conf = ctx.host_path("etc/sysctl.conf");
        if sysctl_conf.is_file() {
            for (key, value) in parse_sysctl_conf(&safe_read(&sysctl_conf)) {
                overrides.insert(key, (value, "etc/sysctl.conf".into()));
            }
        }
        if defaults.is_empty() && ctx.host_path("usr/lib/sysctl.d").is_dir() {
            ctx.warnings.info(
                "kernel",
                "shipped sysctl defaults could not be read; the sysctl diff may be incomplete",
            );
        }
        section.sysctl_overrides = diff_sysctl(ctx, &defaults, &overrides);

        for (dir, target) in [
            ("etc/modules-load.d", &mut section.modules_load),
            ("etc/modprobe.d", &mut section.modprobe),
            ("etc/dracut.conf.d", &mut section.dracut),
        ] {
            for path in safe_iterdir(&ctx.host_path(dir)) {
                if path.is_file() && path.extension().map(|e| e == "conf").unwrap_or(false) {
                    target.push(ConfigSnippet {
                        path: super::rel_path(ctx.host_root, &path),
                        content: safe_read(&path),
                    });
                }
            }
        }

        if let Ok(out) = ctx.runner.run(&["lsmod"]) {
            if out.success() {
                section.loaded_modules = parse_lsmod(&out.stdout);
                let expected = configured_modules(ctx);
                section.non_default_modules =
                    diff_modules(&section.loaded_modules, &expected);
            }
        } else {
            ctx.warnings.info(
                "kernel",
                "lsmod unavailable; loaded-module diff skipped",
            );
        }

        snapshot.kernel = Some(section);
    }
}

// =============================================================================
// Sysctl
// =============================================================================

fn parse_sysctl_conf(text: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

/// Read every .conf in a sysctl directory; later files override earlier
/// ones, matching systemd-sysctl ordering.
fn collect_sysctl(ctx: &Context, dir: &str) -> BTreeMap<String, (String, String)> {
    let mut values = BTreeMap::new();
    for path in safe_iterdir(&ctx.host_path(dir)) {
        if !path.is_file() || path.extension().map(|e| e != "conf").unwrap_or(true) {
            continue;
        }
        let rel = super::rel_path(ctx.host_root, &path);
        for (key, value) in parse_sysctl_conf(&safe_read(&path)) {
            values.insert(key, (value, rel.clone()));
        }
    }
    values
}

fn runtime_sysctl(ctx: &Context, key: &str) -> Option<String> {
    let path = ctx.host_path(&format!("proc/sys/{}", key.replace('.', "/")));
    let text = safe_read(&path);
    if text.is_empty() {
        None
    } else {
        Some(text.trim().to_string())
    }
}

/// Keys whose runtime value diverges from the shipped default, with source
/// attribution for where the override came from.
fn diff_sysctl(
    ctx: &Context,
    defaults: &BTreeMap<String, (String, String)>,
    overrides: &BTreeMap<String, (String, String)>,
) -> Vec<SysctlOverride> {
    let mut keys: BTreeSet<&String> = defaults.keys().collect();
    keys.extend(overrides.keys());

    let mut results = Vec::new();
    for key in keys {
        let default = defaults.get(key);
        let override_entry = overrides.get(key);
        let runtime = runtime_sysctl(ctx, key)
            .or_else(|| override_entry.map(|(v, _)| v.clone()))
            .or_else(|| default.map(|(v, _)| v.clone()))
            .unwrap_or_default();
        if let Some((default_value, _)) = default {
            if runtime == *default_value {
                continue;
            }
        }
        results.push(SysctlOverride {
            key: key.clone(),
            runtime,
            default: default.map(|(v, _)| v.clone()).unwrap_or_default(),
            source: override_entry
                .map(|(_, s)| s.clone())
                .or_else(|| default.map(|(_, s)| s.clone()))
                .unwrap_or_default(),
        });
    }
    results
}

// =============================================================================
// Modules
// =============================================================================

fn parse_lsmod(text: &str) -> Vec<KernelModule> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                return None;
            }
            Some(KernelModule {
                name: fields[0].to_string(),
                size: fields[1].to_string(),
                used_by: fields.get(3).unwrap_or(&"").to_string(),
            })
        })
        .collect()
}

/// Module names explicitly configured to load at boot.
fn configured_modules(ctx: &Context) -> BTreeSet<String> {
    let mut expected = BTreeSet::new();
    for dir in ["usr/lib/modules-load.d", "etc/modules-load.d"] {
        for path in safe_iterdir(&ctx.host_path(dir)) {
            if !path.is_file() || path.extension().map(|e| e != "conf").unwrap_or(true) {
                continue;
            }
            for line in safe_read(&path).lines() {
                let line = line.trim();
                if !line.is_empty() && !line.starts_with('#') {
                    expected.insert(line.to_string());
                }
            }
        }
    }
    expected
}

/// Loaded modules that are neither configured nor pulled in as a
/// dependency of another module (non-empty used-by column).
fn diff_modules(loaded: &[KernelModule], expected: &BTreeSet<String>) -> Vec<KernelModule> {
    loaded
        .iter()
        .filter(|m| !expected.contains(&m.name) && m.used_by.trim().is_empty())
        .cloned()
        .collect()
}
