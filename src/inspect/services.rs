// src/inspect/services.rs

//! Service inspector: unit enablement state against the baseline presets.
//!
//! Primary path is `systemctl --root` so systemd itself interprets the unit
//! links. When that fails (no systemctl in the inspection container, or a
//! host tree it refuses to read) the fallback scans the filesystem: the
//! .wants link farm marks enabled units, a symlink to /dev/null marks a
//! mask, and an [Install] section distinguishes disabled from static.

use super::{safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{
    service_action, PresetState, ServiceRecord, ServiceSection, Snapshot, UnitState,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

pub struct ServiceInspector;

impl Inspector for ServiceInspector {
    fn name(&self) -> &'static str {
        "services"
    }

    fn depends_on_baseline(&self) -> bool {
        true
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut current = query_systemctl(ctx);
        if current.is_empty() {
            debug!("systemctl unavailable, scanning unit files directly");
            current = scan_filesystem(ctx.host_root);
            if current.is_empty() {
                ctx.warnings.info(
                    "services",
                    "no unit files found; service inspection produced nothing",
                );
            }
        }

        let mut section = ServiceSection::default();
        for (unit, state) in current {
            let default = preset_default(ctx, &unit);
            section.units.push(ServiceRecord {
                action: service_action(state, default),
                unit,
                current: state,
                default,
            });
        }
        snapshot.services = Some(section);
    }
}

fn preset_default(ctx: &Context, unit: &str) -> PresetState {
    if ctx.baseline.preset_enabled.contains(unit) {
        PresetState::Enabled
    } else if ctx.baseline.preset_disabled.contains(unit) || ctx.baseline.preset_disable_all {
        PresetState::Disabled
    } else {
        PresetState::Absent
    }
}

fn parse_state(s: &str) -> Option<UnitState> {
    match s {
        "enabled" | "enabled-runtime" => Some(UnitState::Enabled),
        "disabled" => Some(UnitState::Disabled),
        "masked" | "masked-runtime" => Some(UnitState::Masked),
        "static" => Some(UnitState::Static),
        // alias, indirect, generated, transient: no action derivable
        _ => None,
    }
}

fn tracked_unit(name: &str) -> bool {
    name.ends_with(".service") || name.ends_with(".timer")
}

fn query_systemctl(ctx: &Context) -> BTreeMap<String, UnitState> {
    let root_str = ctx.host_root.to_string_lossy().into_owned();
    let argv: Vec<&str> = if ctx.host_root == Path::new("/") {
        vec!["systemctl", "list-unit-files", "--no-pager", "--no-legend"]
    } else {
        vec![
            "systemctl",
            "--root",
            &root_str,
            "list-unit-files",
            "--no-pager",
            "--no-legend",
        ]
    };

    let Ok(out) = ctx.runner.run(&argv) else {
        return BTreeMap::new();
    };
    if !out.success() {
        return BTreeMap::new();
    }

    let mut units = BTreeMap::new();
    for line in out.stdout.lines() {
        let mut fields = line.split_whitespace();
        let (Some(unit), Some(state)) = (fields.next(), fields.next()) else {
            continue;
        };
        if !tracked_unit(unit) {
            continue;
        }
        if let Some(state) = parse_state(state) {
            units.insert(unit.to_string(), state);
        }
    }
    debug!(count = units.len(), "unit states from systemctl");
    units
}

/// Fallback: derive unit states from the link farm.
pub fn scan_filesystem(host_root: &Path) -> BTreeMap<String, UnitState> {
    let vendor_dir = host_root.join("usr/lib/systemd/system");
    let admin_dir = host_root.join("etc/systemd/system");

    let mut enabled: Vec<String> = Vec::new();
    let mut masked: Vec<String> = Vec::new();

    for entry in safe_iterdir(&admin_dir) {
        let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if entry.is_dir() && name.ends_with(".wants") {
            for link in safe_iterdir(&entry) {
                if let Some(unit) = link.file_name().map(|n| n.to_string_lossy().into_owned()) {
                    enabled.push(unit);
                }
            }
        } else if entry.is_symlink() {
            if let Ok(target) = fs::read_link(&entry) {
                if target == Path::new("/dev/null") {
                    masked.push(name);
                }
            }
        }
    }

    let mut units = BTreeMap::new();
    let mut vendor_units: Vec<String> = Vec::new();
    for entry in safe_iterdir(&vendor_dir) {
        if let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) {
            if tracked_unit(&name) && (entry.is_file() || entry.is_symlink()) {
                vendor_units.push(name);
            }
        }
    }

    let all: std::collections::BTreeSet<String> = vendor_units
        .iter()
        .chain(enabled.iter())
        .chain(masked.iter())
        .cloned()
        .collect();

    for unit in all {
        if !tracked_unit(&unit) {
            continue;
        }
        let state = if masked.contains(&unit) {
            UnitState::Masked
        } else if enabled.contains(&unit) {
            UnitState::Enabled
        } else {
            // No enable link: [Install] present means it could be enabled
            // and is not, i.e. disabled; absent means static.
            let text = safe_read(&vendor_dir.join(&unit));
            if text.contains("[Install]") {
                UnitState::Disabled
            } else {
                UnitState::Static
            }
        };
        units.insert(unit, state);
    }
    debug!(count = units.len(), "unit states from filesystem scan");
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, BaselineMode, ServiceAction, WarningSink};
    use std::collections::BTreeSet;
    use std::os::unix::fs::symlink;

    fn baseline_with_presets(enabled: &[&str], disabled: &[&str]) -> Baseline {
        Baseline {
            mode: BaselineMode::Queried,
            package_names: BTreeSet::new(),
            preset_enabled: enabled.iter().map(|s| s.to_string()).collect(),
            preset_disabled: disabled.iter().map(|s| s.to_string()).collect(),
            preset_disable_all: false,
        }
    }

    #[test]
    fn systemctl_output_drives_actions() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on(
            &["systemctl", "--root"],
            "sshd.service enabled enabled\n\
             httpd.service enabled disabled\n\
             cups.service masked enabled\n\
             getty@.service static -\n\
             dbus.socket enabled enabled\n",
        );
        let baseline = baseline_with_presets(&["sshd.service", "cups.service"], &[]);
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
        ServiceInspector.run(&ctx, &mut snapshot);

        let section = snapshot.services.unwrap();
        let action_of = |unit: &str| {
            section
                .units
                .iter()
                .find(|u| u.unit == unit)
                .map(|u| u.action)
        };
        assert_eq!(action_of("sshd.service"), Some(ServiceAction::None));
        // enabled but absent from presets: operator-added
        assert_eq!(action_of("httpd.service"), Some(ServiceAction::Enable));
        // masked overrides the enabled default
        assert_eq!(action_of("cups.service"), Some(ServiceAction::Mask));
        assert_eq!(action_of("getty@.service"), Some(ServiceAction::None));
        // sockets are not tracked
        assert_eq!(action_of("dbus.socket"), None);
    }

    #[test]
    fn filesystem_fallback_classifies_states() {
        let dir = tempfile::tempdir().unwrap();
        let vendor = dir.path().join("usr/lib/systemd/system");
        let admin = dir.path().join("etc/systemd/system");
        fs::create_dir_all(&vendor).unwrap();
        fs::create_dir_all(admin.join("multi-user.target.wants")).unwrap();

        fs::write(
            vendor.join("httpd.service"),
            "[Unit]\nDescription=Apache\n\n[Install]\nWantedBy=multi-user.target\n",
        )
        .unwrap();
        fs::write(
            vendor.join("chronyd.service"),
            "[Unit]\nDescription=NTP\n\n[Install]\nWantedBy=multi-user.target\n",
        )
        .unwrap();
        fs::write(vendor.join("ldconfig.service"), "[Unit]\nDescription=ldconfig\n").unwrap();
        symlink(
            vendor.join("httpd.service"),
            admin.join("multi-user.target.wants/httpd.service"),
        )
        .unwrap();
        symlink("/dev/null", admin.join("cups.service")).unwrap();

        let units = scan_filesystem(dir.path());
        assert_eq!(units.get("httpd.service"), Some(&UnitState::Enabled));
        assert_eq!(units.get("chronyd.service"), Some(&UnitState::Disabled));
        assert_eq!(units.get("ldconfig.service"), Some(&UnitState::Static));
        assert_eq!(units.get("cups.service"), Some(&UnitState::Masked));
    }
}
