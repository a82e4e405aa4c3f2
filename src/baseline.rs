// src/baseline.rs

//! Baseline resolution: what does the target base image contain?
//!
//! The delta between host state and base-image state drives the whole
//! recipe. Resolution order:
//!
//! 1. `--target-image` wins outright; `--target-version` is mapped through
//!    the distribution table; otherwise the host identity maps automatically,
//!    clamped to the minimum image-mode release per distribution.
//! 2. If the host container runtime is reachable through the privilege
//!    bridge, run the image and read its package list and systemd preset
//!    files. This is the authoritative baseline.
//! 3. An externally supplied package list (`--baseline-packages`) covers
//!    air-gapped hosts.
//! 4. Otherwise the baseline is empty — "all-packages" mode — and a
//!    prominent warning is raised.
//!
//! The resolved baseline is stored in the snapshot so re-render mode needs
//! no network and no privileges.

use crate::exec::HostExec;
use crate::snapshot::{
    Baseline, BaselineMode, HostInfo, TargetImage, TargetSource, WarningSink,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Last-resort FROM line when nothing about the host could be determined.
pub const FALLBACK_IMAGE: &str = "registry.redhat.io/rhel9/rhel-bootc:9.6";

/// Minimum bootc-supported release per RHEL major.
const RHEL_MIN: &[(&str, &str)] = &[("9", "9.6"), ("10", "10.0")];

const CENTOS_STREAM_IMAGES: &[(&str, &str)] = &[
    ("9", "quay.io/centos-bootc/centos-bootc:stream9"),
    ("10", "quay.io/centos-bootc/centos-bootc:stream10"),
];

/// Return `version` clamped up to `minimum` (dotted-numeric comparison).
fn clamp_version(version: &str, minimum: &str) -> String {
    let parse = |s: &str| -> Option<Vec<u64>> {
        s.split('.').map(|p| p.parse::<u64>().ok()).collect()
    };
    match (parse(version), parse(minimum)) {
        (Some(v), Some(m)) if v < m => minimum.to_string(),
        (Some(_), Some(_)) => version.to_string(),
        _ => minimum.to_string(),
    }
}

/// Map host identity to a base image reference.
///
/// Returns None for distributions with no image-mode equivalent.
pub fn select_image(os_id: &str, version_id: &str, target_version: Option<&str>) -> Option<String> {
    let os_id = os_id.to_lowercase();
    let effective = target_version.unwrap_or(version_id);
    let major = effective.split('.').next().unwrap_or("");

    if os_id == "rhel" {
        if let Some((_, min)) = RHEL_MIN.iter().find(|(m, _)| *m == major) {
            let version = clamp_version(effective, min);
            return Some(format!("registry.redhat.io/rhel{major}/rhel-bootc:{version}"));
        }
        return None;
    }
    if os_id.contains("centos") {
        if let Some((_, image)) = CENTOS_STREAM_IMAGES.iter().find(|(m, _)| *m == major) {
            return Some((*image).to_string());
        }
        return None;
    }
    if os_id == "fedora" && !major.is_empty() {
        return Some(format!("quay.io/fedora/fedora-bootc:{major}"));
    }
    debug!(os_id, version_id, "no base image mapping");
    None
}

/// Resolve the target image for a host, honoring the override flags.
pub fn resolve_target(
    host: &HostInfo,
    target_version: Option<&str>,
    target_image: Option<&str>,
) -> Option<TargetImage> {
    let (reference, source) = if let Some(image) = target_image {
        (image.to_string(), TargetSource::ImageFlag)
    } else if let Some(version) = target_version {
        (
            select_image(&host.id, &host.version_id, Some(version))?,
            TargetSource::VersionFlag,
        )
    } else {
        (
            select_image(&host.id, &host.version_id, None)?,
            TargetSource::Auto,
        )
    };

    let cross_major = is_cross_major(&host.major, &reference);
    Some(TargetImage {
        reference,
        source,
        cross_major,
    })
}

/// Compare the host major against the major encoded in the image tag.
fn is_cross_major(host_major: &str, reference: &str) -> bool {
    if host_major.is_empty() {
        return false;
    }
    let Some(tag) = reference.rsplit(':').next() else {
        return false;
    };
    let tag_major: String = tag
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    !tag_major.is_empty() && tag_major != host_major
}

/// Read a newline-separated package name list (air-gapped baseline).
pub fn load_packages_file(path: &Path) -> Option<BTreeSet<String>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot read baseline packages file");
            return None;
        }
    };
    let names: BTreeSet<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        None
    } else {
        debug!(count = names.len(), "loaded baseline package names from file");
        Some(names)
    }
}

/// Parse systemd preset content into (enabled, disabled, disable_all).
///
/// First match wins per unit, as systemd does. Glob rules other than the
/// catch-all `disable *` are not expanded; units they would match fall back
/// to the disable-all default.
pub fn parse_presets(text: &str) -> (BTreeSet<String>, BTreeSet<String>, bool) {
    let mut enabled = BTreeSet::new();
    let mut disabled = BTreeSet::new();
    let mut matched: BTreeSet<String> = BTreeSet::new();
    let mut disable_all = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(action), Some(pattern)) = (parts.next(), parts.next()) else {
            continue;
        };
        if pattern.contains('*') || pattern.contains('?') {
            if pattern == "*" && action.eq_ignore_ascii_case("disable") {
                disable_all = true;
            }
            continue;
        }
        if !matched.insert(pattern.to_string()) {
            continue;
        }
        match action.to_lowercase().as_str() {
            "enable" => {
                enabled.insert(pattern.to_string());
            }
            "disable" => {
                disabled.insert(pattern.to_string());
            }
            _ => {}
        }
    }
    (enabled, disabled, disable_all)
}

/// Resolves the baseline for one inspection run.
pub struct BaselineResolver<'a> {
    bridge: Option<&'a dyn HostExec>,
}

impl<'a> BaselineResolver<'a> {
    pub fn new(bridge: Option<&'a dyn HostExec>) -> Self {
        BaselineResolver { bridge }
    }

    /// Run the image and read its package name list.
    fn query_packages(&self, image: &str) -> Option<BTreeSet<String>> {
        let bridge = self.bridge?;
        let out = bridge
            .run_on_host(&[
                "podman",
                "run",
                "--rm",
                "--cgroups=disabled",
                image,
                "rpm",
                "-qa",
                "--queryformat",
                "%{NAME}\\n",
            ])
            .ok()?;
        if !out.success() {
            debug!(status = out.status, "base image package query failed");
            return None;
        }
        let names: BTreeSet<String> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return None;
        }
        info!(count = names.len(), image, "queried base image package list");
        Some(names)
    }

    /// Dump the image's systemd preset files.
    fn query_presets(&self, image: &str) -> Option<String> {
        let bridge = self.bridge?;
        let out = bridge
            .run_on_host(&[
                "podman",
                "run",
                "--rm",
                "--cgroups=disabled",
                image,
                "bash",
                "-c",
                "cat /usr/lib/systemd/system-preset/*.preset 2>/dev/null || true",
            ])
            .ok()?;
        if !out.success() || out.stdout.trim().is_empty() {
            return None;
        }
        Some(out.stdout)
    }

    /// Resolve the full baseline. Never fails; degraded modes warn.
    ///
    /// The runtime query is authoritative: a supplied package list is the
    /// air-gapped fallback, consulted only when the image cannot be queried.
    pub fn resolve(
        &self,
        target: Option<&TargetImage>,
        packages_file: Option<&Path>,
        warnings: &WarningSink,
    ) -> Baseline {
        if let Some(target) = target {
            if target.cross_major {
                warnings.warn(
                    "baseline",
                    format!(
                        "target image {} is a different major version than the host; \
                         package names, service names, and config formats may have changed",
                        target.reference
                    ),
                );
            }
        }

        // 1. Query the base image through the bridge — authoritative
        if let Some(target) = target {
            if let Some(names) = self.query_packages(&target.reference) {
                let (preset_enabled, preset_disabled, preset_disable_all) = self
                    .query_presets(&target.reference)
                    .map(|text| parse_presets(&text))
                    .unwrap_or_default();
                return Baseline {
                    mode: BaselineMode::Queried,
                    package_names: names,
                    preset_enabled,
                    preset_disabled,
                    preset_disable_all,
                };
            }
        }

        // 2. Externally supplied list (air-gapped fallback)
        if let Some(path) = packages_file {
            if let Some(names) = load_packages_file(path) {
                return Baseline {
                    mode: BaselineMode::Supplied,
                    package_names: names,
                    preset_enabled: BTreeSet::new(),
                    preset_disabled: BTreeSet::new(),
                    preset_disable_all: false,
                };
            }
            warnings.warn(
                "baseline",
                format!(
                    "baseline packages file {} is empty or unreadable; falling through",
                    path.display()
                ),
            );
        }

        // 3. All-packages mode
        warnings.warn(
            "baseline",
            "could not obtain a baseline package list; every installed package will \
             be treated as operator-added. Pull the base image first or provide \
             --baseline-packages FILE to reduce image size.",
        );
        Baseline::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(id: &str, version_id: &str) -> HostInfo {
        HostInfo {
            id: id.into(),
            version_id: version_id.into(),
            major: version_id.split('.').next().unwrap_or("").into(),
            ..Default::default()
        }
    }

    #[test]
    fn rhel_version_clamps_to_minimum() {
        assert_eq!(
            select_image("rhel", "9.4", None).unwrap(),
            "registry.redhat.io/rhel9/rhel-bootc:9.6"
        );
        assert_eq!(
            select_image("rhel", "9.7", None).unwrap(),
            "registry.redhat.io/rhel9/rhel-bootc:9.7"
        );
    }

    #[test]
    fn centos_maps_to_stream_tag() {
        assert_eq!(
            select_image("centos", "9", None).unwrap(),
            "quay.io/centos-bootc/centos-bootc:stream9"
        );
    }

    #[test]
    fn fedora_maps_to_major() {
        assert_eq!(
            select_image("fedora", "40", None).unwrap(),
            "quay.io/fedora/fedora-bootc:40"
        );
    }

    #[test]
    fn unmapped_distribution_returns_none() {
        assert!(select_image("debian", "12", None).is_none());
    }

    #[test]
    fn image_flag_overrides_everything() {
        let target = resolve_target(
            &host("rhel", "9.4"),
            Some("9.6"),
            Some("registry.example.com/custom:1"),
        )
        .unwrap();
        assert_eq!(target.reference, "registry.example.com/custom:1");
        assert_eq!(target.source, TargetSource::ImageFlag);
    }

    #[test]
    fn version_flag_crossing_majors_is_flagged() {
        let target = resolve_target(&host("rhel", "9.4"), Some("10.0"), None).unwrap();
        assert_eq!(target.reference, "registry.redhat.io/rhel10/rhel-bootc:10.0");
        assert!(target.cross_major);
    }

    #[test]
    fn same_major_is_not_cross() {
        let target = resolve_target(&host("centos", "9"), None, None).unwrap();
        assert!(!target.cross_major);
    }

    #[test]
    fn presets_first_match_wins() {
        let (enabled, disabled, disable_all) = parse_presets(
            "# comment\n\
             enable sshd.service\n\
             disable sshd.service\n\
             disable cupsd.service\n\
             disable *\n",
        );
        assert!(enabled.contains("sshd.service"));
        assert!(!disabled.contains("sshd.service"));
        assert!(disabled.contains("cupsd.service"));
        assert!(disable_all);
    }

    #[test]
    fn empty_resolution_is_all_packages_with_warning() {
        let warnings = WarningSink::new();
        let resolver = BaselineResolver::new(None);
        let baseline = resolver.resolve(None, None, &warnings);
        assert_eq!(baseline.mode, BaselineMode::AllPackages);
        assert!(baseline.package_names.is_empty());
        let collected = warnings.into_warnings();
        assert!(collected.iter().any(|w| w.source == "baseline"));
    }

    /// Reachable host runtime that answers both baseline queries.
    struct FakeHost {
        fail_package_query: bool,
    }

    impl crate::exec::HostExec for FakeHost {
        fn run_on_host(
            &self,
            argv: &[&str],
        ) -> std::result::Result<crate::exec::RunOutput, crate::exec::RunError> {
            let stdout = if argv.contains(&"rpm") {
                if self.fail_package_query {
                    return Ok(crate::exec::RunOutput {
                        status: 125,
                        stdout: String::new(),
                        stderr: "image pull failed".into(),
                    });
                }
                "bash\nsystemd\nkernel\n".to_string()
            } else {
                "enable sshd.service\ndisable *\n".to_string()
            };
            Ok(crate::exec::RunOutput {
                status: 0,
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn stream9_target() -> TargetImage {
        TargetImage {
            reference: "quay.io/centos-bootc/centos-bootc:stream9".into(),
            source: TargetSource::Auto,
            cross_major: false,
        }
    }

    #[test]
    fn runtime_query_wins_over_supplied_file() {
        // Both sources available at once: the queried image is authoritative
        // and the file is never consulted.
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("packages.txt");
        fs::write(&list, "from-the-file\n").unwrap();

        let host = FakeHost {
            fail_package_query: false,
        };
        let warnings = WarningSink::new();
        let resolver = BaselineResolver::new(Some(&host));
        let baseline = resolver.resolve(Some(&stream9_target()), Some(&list), &warnings);

        assert_eq!(baseline.mode, BaselineMode::Queried);
        assert_eq!(baseline.package_names.len(), 3);
        assert!(baseline.package_names.contains("bash"));
        assert!(!baseline.package_names.contains("from-the-file"));
        assert!(baseline.preset_enabled.contains("sshd.service"));
        assert!(baseline.preset_disable_all);
    }

    #[test]
    fn supplied_file_is_the_fallback_when_query_fails() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("packages.txt");
        fs::write(&list, "bash\nsystemd\n\n# comment\n").unwrap();

        let host = FakeHost {
            fail_package_query: true,
        };
        let warnings = WarningSink::new();
        let resolver = BaselineResolver::new(Some(&host));
        let baseline = resolver.resolve(Some(&stream9_target()), Some(&list), &warnings);

        assert_eq!(baseline.mode, BaselineMode::Supplied);
        assert_eq!(baseline.package_names.len(), 2);
        assert!(baseline.package_names.contains("bash"));
    }

    #[test]
    fn supplied_file_is_used_when_no_runtime_is_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("packages.txt");
        fs::write(&list, "bash\nsystemd\n").unwrap();
        let warnings = WarningSink::new();
        let resolver = BaselineResolver::new(None);
        let baseline = resolver.resolve(None, Some(&list), &warnings);
        assert_eq!(baseline.mode, BaselineMode::Supplied);
        assert_eq!(baseline.package_names.len(), 2);
    }
}
