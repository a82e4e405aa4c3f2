// src/inspect/security.rs

//! Security-policy inspector: SELinux mode, custom modules, boolean
//! overrides, fcontext rules, audit rules, FIPS, PAM customizations.

use super::{safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{BooleanOverride, SecuritySection, Snapshot};
use regex::Regex;
use tracing::debug;

pub struct SecurityInspector;

impl Inspector for SecurityInspector {
    fn name(&self) -> &'static str {
        "security"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = SecuritySection::default();

        let config_text = safe_read(&ctx.host_path("etc/selinux/config"));
        for line in config_text.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix("SELINUX=") {
                section.mode = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("SELINUXTYPE=") {
                section.policy_type = value.trim().to_string();
            }
        }
        if section.policy_type.is_empty() {
            section.policy_type = "targeted".into();
        }

        section.custom_modules = custom_modules(ctx, &section.policy_type);
        section.booleans = boolean_overrides(ctx);
        section.fcontext_rules = fcontext_rules(ctx, &section.policy_type);

        for path in safe_iterdir(&ctx.host_path("etc/audit/rules.d")) {
            if path.is_file() {
                section.audit_rules.push(super::rel_path(ctx.host_root, &path));
            }
        }

        section.fips_mode =
            safe_read(&ctx.host_path("proc/sys/crypto/fips_enabled")).trim() == "1";

        for path in safe_iterdir(&ctx.host_path("etc/pam.d")) {
            if path.is_file() {
                section.pam_files.push(super::rel_path(ctx.host_root, &path));
            }
        }

        snapshot.security = Some(section);
    }
}

/// Modules installed locally via semodule land in the priority-400 store.
/// Purely filesystem-based — no semodule invocation needed.
fn custom_modules(ctx: &Context, policy_type: &str) -> Vec<String> {
    let store = ctx.host_path(&format!("etc/selinux/{policy_type}/active/modules/400"));
    let mut names: Vec<String> = safe_iterdir(&store)
        .into_iter()
        .filter(|p| p.is_dir())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    debug!(count = names.len(), "custom policy modules at priority 400");
    names
}

/// `semanage boolean -l` line: name (current, default) description
fn parse_semanage_booleans(text: &str) -> Vec<BooleanOverride> {
    let re = Regex::new(r"^(\S+)\s+\((\w+)\s*,\s*(\w+)\)\s+(.*)").unwrap();
    let mut results = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("SELinux boolean") {
            continue;
        }
        let Some(caps) = re.captures(line) else { continue };
        if caps[2] != caps[3] {
            results.push(BooleanOverride {
                name: caps[1].to_string(),
                current: caps[2].to_string(),
                default: caps[3].to_string(),
                description: caps[4].trim().to_string(),
            });
        }
    }
    results
}

fn boolean_overrides(ctx: &Context) -> Vec<BooleanOverride> {
    let root_str = ctx.host_root.to_string_lossy().into_owned();
    if let Ok(out) = ctx
        .runner
        .run(&["chroot", &root_str, "semanage", "boolean", "-l"])
    {
        if out.success() && !out.stdout.trim().is_empty() {
            return parse_semanage_booleans(&out.stdout);
        }
    }

    // Fallback: sysfs exposes current and pending values, no descriptions
    let booldir = ctx.host_path("sys/fs/selinux/booleans");
    if !booldir.is_dir() {
        ctx.warnings.info(
            "security",
            "boolean override detection unavailable (semanage failed and the \
             selinuxfs booleans directory is not readable)",
        );
        return Vec::new();
    }
    let mut results = Vec::new();
    for path in safe_iterdir(&booldir) {
        if !path.is_file() {
            continue;
        }
        let text = safe_read(&path);
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() >= 2 && fields[0] != fields[1] {
            let as_word = |v: &str| if v == "1" { "on" } else { "off" };
            results.push(BooleanOverride {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                current: as_word(fields[0]).into(),
                default: as_word(fields[1]).into(),
                description: String::new(),
            });
        }
    }
    results
}

fn fcontext_rules(ctx: &Context, policy_type: &str) -> Vec<String> {
    let root_str = ctx.host_root.to_string_lossy().into_owned();
    if let Ok(out) = ctx
        .runner
        .run(&["chroot", &root_str, "semanage", "fcontext", "-l", "-C"])
    {
        if out.success() && !out.stdout.trim().is_empty() {
            return out
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with("SELinux"))
                .map(str::to_string)
                .collect();
        }
    }
    // Local customizations also live in file_contexts.local
    let local = ctx.host_path(&format!(
        "etc/selinux/{policy_type}/contexts/files/file_contexts.local"
    ));
    safe_read(&local)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
