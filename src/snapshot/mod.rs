// src/snapshot/mod.rs

//! Inspection snapshot: the canonical contract between inspectors and renderers.
//!
//! Every inspector produces one section; every renderer consumes the sealed
//! document. Sections are optional so a subset of inspectors can run. The
//! JSON shape on disk is stable across releases — bump [`SCHEMA_VERSION`]
//! when a field changes meaning.

pub mod warnings;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::warn;

pub use warnings::{Severity, Warning, WarningSink};

/// Version of the on-disk snapshot format.
pub const SCHEMA_VERSION: u32 = 2;

// =============================================================================
// Host identity and target image
// =============================================================================

/// Identity of the inspected host, read from its os-release file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(default)]
    pub hostname: String,
    /// os-release NAME
    pub name: String,
    /// os-release ID (rhel, centos, fedora)
    pub id: String,
    /// os-release VERSION_ID (e.g. "9.4")
    pub version_id: String,
    #[serde(default)]
    pub pretty_name: String,
    /// Major version component of version_id
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub arch: String,
    /// RFC 3339 inspection timestamp, captured once and carried through
    /// re-renders so output stays byte-identical.
    #[serde(default)]
    pub inspected_at: String,
}

/// How the target base image reference was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSource {
    /// Mapped automatically from host identity
    Auto,
    /// --target-version override mapped through the distribution table
    VersionFlag,
    /// --target-image override, used verbatim
    ImageFlag,
}

/// The resolved base image the host delta is computed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetImage {
    pub reference: String,
    pub source: TargetSource,
    /// Host major version differs from the target major version
    #[serde(default)]
    pub cross_major: bool,
}

// =============================================================================
// Baseline
// =============================================================================

/// How the baseline package set was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineMode {
    /// Queried from the target base image through the host runtime
    Queried,
    /// Loaded from a --baseline-packages file
    Supplied,
    /// No baseline available; every installed package counts as added
    AllPackages,
}

/// Package names and service preset defaults contained in the base image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub mode: BaselineMode,
    /// Sorted by construction: BTreeSet gives a stable codepoint order.
    #[serde(default)]
    pub package_names: BTreeSet<String>,
    #[serde(default)]
    pub preset_enabled: BTreeSet<String>,
    #[serde(default)]
    pub preset_disabled: BTreeSet<String>,
    /// A `disable *` preset rule was present
    #[serde(default)]
    pub preset_disable_all: bool,
}

impl Baseline {
    pub fn empty() -> Self {
        Baseline {
            mode: BaselineMode::AllPackages,
            package_names: BTreeSet::new(),
            preset_enabled: BTreeSet::new(),
            preset_disabled: BTreeSet::new(),
            preset_disable_all: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mode == BaselineMode::AllPackages
    }
}

// =============================================================================
// Packages
// =============================================================================

/// Installed package record parsed from the rpm database query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default)]
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

/// One line of the package manager's verify pass (rpm -Va).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEntry {
    pub path: String,
    /// Verify flag string, e.g. "S.5....T."
    pub flags: String,
    /// Marked as a config file in the verify output
    #[serde(default)]
    pub config: bool,
}

/// Snapshot of a repository definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageSection {
    /// Present on host, absent in baseline. Sorted by name.
    #[serde(default)]
    pub added: Vec<PackageRecord>,
    /// Present in baseline, absent on host. Names only, sorted.
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub verify: Vec<VerifyEntry>,
    #[serde(default)]
    pub repo_files: Vec<RepoFile>,
    /// Packages that were installed and later removed (from dnf history)
    #[serde(default)]
    pub history_removed: Vec<String>,
    #[serde(default)]
    pub partial: bool,
}

// =============================================================================
// Services
// =============================================================================

/// Current enablement state of a unit file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitState {
    Enabled,
    Disabled,
    Masked,
    Static,
}

/// Baseline preset default for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetState {
    Enabled,
    Disabled,
    /// Unit does not appear in any preset — operator-added
    Absent,
}

/// Action the recipe must emit for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceAction {
    None,
    Enable,
    Disable,
    Mask,
}

/// Pure function from (current state, baseline default) to the emitted action.
///
/// Masked always overrides enable/disable. An enabled unit absent from the
/// baseline was operator-added and must be enabled in the image. Static
/// units have no [Install] section and cannot be acted on.
pub fn service_action(current: UnitState, default: PresetState) -> ServiceAction {
    match (current, default) {
        (UnitState::Masked, _) => ServiceAction::Mask,
        (UnitState::Static, _) => ServiceAction::None,
        (UnitState::Enabled, PresetState::Enabled) => ServiceAction::None,
        (UnitState::Enabled, _) => ServiceAction::Enable,
        (UnitState::Disabled, PresetState::Enabled) => ServiceAction::Disable,
        (UnitState::Disabled, _) => ServiceAction::None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub unit: String,
    pub current: UnitState,
    pub default: PresetState,
    pub action: ServiceAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default)]
    pub units: Vec<ServiceRecord>,
    #[serde(default)]
    pub partial: bool,
}

impl ServiceSection {
    pub fn units_with(&self, action: ServiceAction) -> Vec<&ServiceRecord> {
        self.units.iter().filter(|u| u.action == action).collect()
    }
}

// =============================================================================
// Configs
// =============================================================================

/// Provenance class of a captured configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigKind {
    /// Owned by an installed package and modified per the verify pass
    OwnedModified,
    /// Not owned by any installed package
    Unowned,
    /// Left behind by a package that was installed then removed
    Orphaned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Path relative to the host root, e.g. "etc/chrony.conf"
    pub path: String,
    pub kind: ConfigKind,
    /// Captured content; redacted before the snapshot is sealed
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_flags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Unified diff against the package-shipped original (--config-diffs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Why a diff could not be produced, or other capture caveats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub files: Vec<ConfigFile>,
}

impl ConfigSection {
    pub fn of_kind(&self, kind: ConfigKind) -> Vec<&ConfigFile> {
        self.files.iter().filter(|f| f.kind == kind).collect()
    }
}

// =============================================================================
// Network
// =============================================================================

/// Addressing method of a NetworkManager connection profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileMethod {
    /// Method explicitly fixed — baked into the image
    Static,
    /// DHCP or unspecified — configured at deploy time
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub path: String,
    pub name: String,
    pub method: ProfileMethod,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallZone {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub rich_rules: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectRule {
    #[serde(default)]
    pub ipv: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub args: String,
}

/// Who manages the resolver configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvProvenance {
    NetworkManager,
    SystemdResolved,
    HandEdited,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub source: String,
    pub line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteFile {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSection {
    #[serde(default)]
    pub connections: Vec<ConnectionProfile>,
    #[serde(default)]
    pub firewall_zones: Vec<FirewallZone>,
    #[serde(default)]
    pub direct_rules: Vec<DirectRule>,
    #[serde(default)]
    pub route_files: Vec<RouteFile>,
    /// Route table lines with default routes filtered out
    #[serde(default)]
    pub ip_routes: Vec<String>,
    #[serde(default)]
    pub ip_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolv: Option<ResolvProvenance>,
    #[serde(default)]
    pub hosts_additions: Vec<String>,
    #[serde(default)]
    pub proxy: Vec<ProxyEntry>,
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FstabEntry {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
    #[serde(default)]
    pub options: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountEntry {
    pub target: String,
    pub source: String,
    pub fstype: String,
    #[serde(default)]
    pub options: String,
    /// Recommended migration strategy for this mount
    #[serde(default)]
    pub strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalVolume {
    pub lv_name: String,
    pub vg_name: String,
    #[serde(default)]
    pub size: String,
}

/// A non-empty directory under the mutable state root (/var).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDir {
    pub path: String,
    #[serde(default)]
    pub size_estimate: String,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub fstab: Vec<FstabEntry>,
    #[serde(default)]
    pub mounts: Vec<MountEntry>,
    #[serde(default)]
    pub volumes: Vec<LogicalVolume>,
    #[serde(default)]
    pub state_dirs: Vec<StateDir>,
    #[serde(default)]
    pub partial: bool,
}

// =============================================================================
// Scheduled tasks
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronEntry {
    /// Source file relative to the host root
    pub path: String,
    /// cron.d, crontab, cron.daily, spool, ...
    pub source: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub user: String,
}

/// Whether an existing timer unit is operator-local or shipped by a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerSource {
    Local,
    Vendor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerUnit {
    pub name: String,
    pub source: TimerSource,
    #[serde(default)]
    pub on_calendar: String,
    #[serde(default)]
    pub exec_start: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub timer_content: String,
    #[serde(default)]
    pub service_content: String,
}

/// A timer/service unit pair generated from a cron entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTimer {
    pub name: String,
    #[serde(default)]
    pub cron_expr: String,
    #[serde(default)]
    pub on_calendar: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub timer_content: String,
    #[serde(default)]
    pub service_content: String,
    /// The cron expression mapped cleanly onto OnCalendar
    #[serde(default)]
    pub converted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtJob {
    pub file: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub working_dir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledSection {
    #[serde(default)]
    pub cron_entries: Vec<CronEntry>,
    #[serde(default)]
    pub timers: Vec<TimerUnit>,
    #[serde(default)]
    pub generated: Vec<GeneratedTimer>,
    #[serde(default)]
    pub at_jobs: Vec<AtJob>,
}

// =============================================================================
// Containers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadletUnit {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeService {
    pub service: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeFile {
    pub path: String,
    #[serde(default)]
    pub services: Vec<ComposeService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMount {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub rw: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveContainer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mounts: Vec<LiveMount>,
    #[serde(default)]
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSection {
    #[serde(default)]
    pub quadlets: Vec<QuadletUnit>,
    #[serde(default)]
    pub compose_files: Vec<ComposeFile>,
    #[serde(default)]
    pub live: Vec<LiveContainer>,
    #[serde(default)]
    pub partial: bool,
}

// =============================================================================
// Non-package software
// =============================================================================

/// How a non-package item got onto the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Pip,
    Npm,
    Gem,
    Git,
    GoBinary,
    RustBinary,
    CBinary,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    Unknown,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PipPackage {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareItem {
    pub path: String,
    pub name: String,
    pub provenance: Provenance,
    pub confidence: Confidence,
    /// Human-readable detection method, e.g. "readelf (go)"
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub static_link: bool,
    #[serde(default)]
    pub shared_libs: Vec<String>,
    // Python specifics
    #[serde(default)]
    pub system_site_packages: bool,
    #[serde(default)]
    pub packages: Vec<PipPackage>,
    #[serde(default)]
    pub has_native_extensions: bool,
    // Git checkout specifics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    /// Lockfiles captured alongside (package-lock.json, Gemfile.lock, ...)
    #[serde(default)]
    pub lockfiles: BTreeMap<String, String>,
    /// Raw content for single-file captures (requirements.txt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SoftwareItem {
    pub fn new(path: &str, name: &str) -> Self {
        SoftwareItem {
            path: path.to_string(),
            name: name.to_string(),
            provenance: Provenance::Unknown,
            confidence: Confidence::Unknown,
            method: String::new(),
            version: None,
            static_link: false,
            shared_libs: Vec::new(),
            system_site_packages: false,
            packages: Vec::new(),
            has_native_extensions: false,
            git_remote: None,
            git_commit: None,
            git_branch: None,
            lockfiles: BTreeMap::new(),
            content: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoftwareSection {
    #[serde(default)]
    pub items: Vec<SoftwareItem>,
}

// =============================================================================
// Kernel / boot
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysctlOverride {
    pub key: String,
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelModule {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub used_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnippet {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelSection {
    #[serde(default)]
    pub cmdline: String,
    #[serde(default)]
    pub grub_defaults: String,
    #[serde(default)]
    pub sysctl_overrides: Vec<SysctlOverride>,
    #[serde(default)]
    pub modules_load: Vec<ConfigSnippet>,
    #[serde(default)]
    pub modprobe: Vec<ConfigSnippet>,
    #[serde(default)]
    pub dracut: Vec<ConfigSnippet>,
    #[serde(default)]
    pub loaded_modules: Vec<KernelModule>,
    /// Loaded modules that are neither configured to load nor dependencies
    #[serde(default)]
    pub non_default_modules: Vec<KernelModule>,
}

// =============================================================================
// Security policy
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooleanOverride {
    pub name: String,
    pub current: String,
    pub default: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub policy_type: String,
    /// Module names at the operator priority (semodule -i installs)
    #[serde(default)]
    pub custom_modules: Vec<String>,
    /// Booleans whose current value differs from the policy default
    #[serde(default)]
    pub booleans: Vec<BooleanOverride>,
    #[serde(default)]
    pub fcontext_rules: Vec<String>,
    /// Audit rule file paths
    #[serde(default)]
    pub audit_rules: Vec<String>,
    #[serde(default)]
    pub fips_mode: bool,
    /// PAM files modified or added by the operator
    #[serde(default)]
    pub pam_files: Vec<String>,
}

// =============================================================================
// Users / groups
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub shell: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub gid: u32,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyRef {
    pub user: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSection {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    #[serde(default)]
    pub sudoers_rules: Vec<String>,
    /// References to authorized_keys files; contents are never captured
    #[serde(default)]
    pub ssh_key_refs: Vec<SshKeyRef>,
    #[serde(default)]
    pub passwd_lines: Vec<String>,
    #[serde(default)]
    pub shadow_lines: Vec<String>,
    #[serde(default)]
    pub group_lines: Vec<String>,
    #[serde(default)]
    pub gshadow_lines: Vec<String>,
    #[serde(default)]
    pub subuid_lines: Vec<String>,
    #[serde(default)]
    pub subgid_lines: Vec<String>,
}

// =============================================================================
// Redaction review
// =============================================================================

/// One redaction event, keyed by path and pattern class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionEvent {
    pub path: String,
    /// Pattern class, e.g. "PRIVATE_KEY", "PASSWORD", "EXCLUDED_PATH"
    pub class: String,
    /// Line number as a string, or "entire file" for path exclusions
    pub line: String,
    /// Truncated stable hash of the original value, when applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub remediation: String,
}

// =============================================================================
// Root document
// =============================================================================

/// Full inspection snapshot. Serialized as inspection-snapshot.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub host: Option<HostInfo>,
    pub target: Option<TargetImage>,
    pub baseline: Option<Baseline>,
    pub packages: Option<PackageSection>,
    pub services: Option<ServiceSection>,
    pub configs: Option<ConfigSection>,
    pub network: Option<NetworkSection>,
    pub storage: Option<StorageSection>,
    pub scheduled: Option<ScheduledSection>,
    pub containers: Option<ContainerSection>,
    pub software: Option<SoftwareSection>,
    pub kernel: Option<KernelSection>,
    pub security: Option<SecuritySection>,
    pub users: Option<UserSection>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub secrets_review: Vec<RedactionEvent>,
}

fn default_schema_version() -> u32 {
    1
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot {
            schema_version: SCHEMA_VERSION,
            ..Default::default()
        }
    }

    /// Load a previously sealed snapshot. Unparseable files are fatal —
    /// re-render mode has nothing to fall back on.
    pub fn load(path: &Path) -> Result<Snapshot> {
        let text = fs::read_to_string(path).map_err(|e| Error::SnapshotLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&text).map_err(|e| Error::SnapshotLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if snapshot.schema_version > SCHEMA_VERSION {
            warn!(
                "snapshot was written by a newer retrofit (schema v{}, this build reads v{}); \
                 unknown fields were dropped",
                snapshot.schema_version, SCHEMA_VERSION
            );
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text + "\n")?;
        Ok(())
    }

    /// Base image reference for the FROM line, with a safe fallback so
    /// renderers always have something usable.
    pub fn base_image(&self) -> String {
        if let Some(target) = &self.target {
            return target.reference.clone();
        }
        crate::baseline::FALLBACK_IMAGE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_action_table_is_exhaustive() {
        use ServiceAction as A;

        let table = [
            (
                (UnitState::Enabled, PresetState::Enabled),
                A::None,
            ),
            (
                (UnitState::Enabled, PresetState::Disabled),
                A::Enable,
            ),
            (
                (UnitState::Enabled, PresetState::Absent),
                A::Enable,
            ),
            (
                (UnitState::Disabled, PresetState::Enabled),
                A::Disable,
            ),
            (
                (UnitState::Disabled, PresetState::Disabled),
                A::None,
            ),
            (
                (UnitState::Disabled, PresetState::Absent),
                A::None,
            ),
            (
                (UnitState::Masked, PresetState::Enabled),
                A::Mask,
            ),
            (
                (UnitState::Masked, PresetState::Disabled),
                A::Mask,
            ),
            (
                (UnitState::Masked, PresetState::Absent),
                A::Mask,
            ),
            (
                (UnitState::Static, PresetState::Enabled),
                A::None,
            ),
            (
                (UnitState::Static, PresetState::Disabled),
                A::None,
            ),
            (
                (UnitState::Static, PresetState::Absent),
                A::None,
            ),
        ];
        for ((current, default), expected) in table {
            assert_eq!(
                service_action(current, default),
                expected,
                "({current:?}, {default:?})"
            );
        }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut snapshot = Snapshot::new();
        snapshot.host = Some(HostInfo {
            hostname: "web01".into(),
            name: "CentOS Stream".into(),
            id: "centos".into(),
            version_id: "9".into(),
            major: "9".into(),
            ..Default::default()
        });
        snapshot.packages = Some(PackageSection {
            added: vec![PackageRecord {
                name: "nginx".into(),
                epoch: "1".into(),
                version: "1.24.0".into(),
                release: "4.el9".into(),
                arch: "x86_64".into(),
            }],
            removed: vec!["cockpit".into()],
            ..Default::default()
        });

        let text = serde_json::to_string_pretty(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.host.unwrap().hostname, "web01");
        let pkgs = back.packages.unwrap();
        assert_eq!(pkgs.added[0].name, "nginx");
        assert_eq!(pkgs.removed, vec!["cockpit".to_string()]);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(Error::SnapshotLoad { .. })
        ));
    }
}
