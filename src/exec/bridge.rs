// src/exec/bridge.rs

//! Privilege bridge: execute commands in the host's namespaces.
//!
//! The inspection container mounts the host root read-only, which covers
//! every inspector except the ones that must talk to the host's container
//! runtime (baseline queries, live container enumeration, build validation).
//! Those go through this bridge: a single nsenter-based primitive targeting
//! PID 1's mount, UTS, IPC, and network namespaces.
//!
//! The bridge requires the outer container to run rootful with --pid=host
//! and --privileged. The probe detects each missing prerequisite and reports
//! a structured reason; the result is memoized for the life of the bridge.
//! The bridge is never used to mutate the host.

use super::{RunError, RunOutput, ToolRunner};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const NSENTER_PREFIX: [&str; 7] = ["nsenter", "-t", "1", "-m", "-u", "-i", "-n"];

const CAP_SYS_ADMIN: u32 = 21;

/// Outcome of the privilege probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    /// uid 0 maps to an unprivileged host uid (rootless container)
    Rootless,
    /// PID 1 is the container entrypoint, not the host init (--pid=host missing)
    MissingPidNamespace,
    /// CAP_SYS_ADMIN absent from the effective set (--privileged missing)
    MissingCapability,
    /// nsenter works but no container runtime answered on the host
    NoRuntime,
}

impl ProbeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeStatus::Ok)
    }

    /// Operator-facing explanation with the flag that fixes it.
    pub fn explain(&self) -> &'static str {
        match self {
            ProbeStatus::Ok => "host namespaces reachable",
            ProbeStatus::Rootless => {
                "container is rootless (uid 0 maps to an unprivileged host uid); \
                 run with: sudo podman run ..."
            }
            ProbeStatus::MissingPidNamespace => {
                "PID namespace is not shared with the host; add --pid=host"
            }
            ProbeStatus::MissingCapability => {
                "CAP_SYS_ADMIN is missing (needed for nsenter); add --privileged"
            }
            ProbeStatus::NoRuntime => {
                "no container runtime found on the host; baseline queries degrade \
                 to all-packages mode (or provide --baseline-packages FILE)"
            }
        }
    }
}

/// Host-namespace execution seam. [`HostBridge`] is the one real
/// implementation; tests substitute fakes the same way they do for
/// [`ToolRunner`].
pub trait HostExec: Sync {
    fn run_on_host(&self, argv: &[&str]) -> Result<RunOutput, RunError>;
}

impl HostExec for HostBridge<'_> {
    fn run_on_host(&self, argv: &[&str]) -> Result<RunOutput, RunError> {
        HostBridge::run_on_host(self, argv)
    }
}

/// Executes commands in PID 1's namespaces through a [`ToolRunner`].
pub struct HostBridge<'a> {
    runner: &'a dyn ToolRunner,
    /// Proc root of the inspection container itself, overridable for tests
    proc_root: std::path::PathBuf,
    probe_cache: Mutex<Option<ProbeStatus>>,
}

impl<'a> HostBridge<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        HostBridge {
            runner,
            proc_root: std::path::PathBuf::from("/proc"),
            probe_cache: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_proc_root(runner: &'a dyn ToolRunner, proc_root: &Path) -> Self {
        HostBridge {
            runner,
            proc_root: proc_root.to_path_buf(),
            probe_cache: Mutex::new(None),
        }
    }

    /// Probe whether host-namespace execution is possible. Memoized.
    pub fn probe(&self) -> ProbeStatus {
        if let Ok(cache) = self.probe_cache.lock() {
            if let Some(status) = *cache {
                return status;
            }
        }
        let status = self.probe_uncached();
        debug!(?status, "privilege probe");
        if let Ok(mut cache) = self.probe_cache.lock() {
            *cache = Some(status);
        }
        status
    }

    fn probe_uncached(&self) -> ProbeStatus {
        if self.in_user_namespace() {
            return ProbeStatus::Rootless;
        }
        if !self.pid1_is_host_init() {
            return ProbeStatus::MissingPidNamespace;
        }
        if !self.has_sys_admin() {
            return ProbeStatus::MissingCapability;
        }

        // Minimal namespace-enter round trip
        let mut argv: Vec<&str> = NSENTER_PREFIX.to_vec();
        argv.extend_from_slice(&["--", "true"]);
        match self.runner.run(&argv) {
            Ok(out) if out.success() => {}
            Ok(out) => {
                debug!(status = out.status, stderr = %out.stderr.trim(), "nsenter probe failed");
                if out.stderr.contains("Operation not permitted") {
                    return ProbeStatus::MissingCapability;
                }
                return ProbeStatus::MissingPidNamespace;
            }
            Err(_) => return ProbeStatus::MissingPidNamespace,
        }

        // The runtime itself
        let mut argv: Vec<&str> = NSENTER_PREFIX.to_vec();
        argv.extend_from_slice(&["--", "podman", "--version"]);
        match self.runner.run(&argv) {
            Ok(out) if out.success() => ProbeStatus::Ok,
            _ => ProbeStatus::NoRuntime,
        }
    }

    /// Execute argv in the host's namespaces. The probe must be Ok.
    pub fn run_on_host(&self, argv: &[&str]) -> Result<RunOutput, RunError> {
        let status = self.probe();
        if !status.is_ok() {
            return Err(RunError::Spawn(std::io::Error::other(format!(
                "privilege bridge unavailable: {}",
                status.explain()
            ))));
        }
        let mut full: Vec<&str> = NSENTER_PREFIX.to_vec();
        full.push("--");
        full.extend_from_slice(argv);
        self.runner.run(&full)
    }

    // ------------------------------------------------------------------
    // Individual prerequisite checks (read the container's own /proc)
    // ------------------------------------------------------------------

    /// Rootless containers run in a user namespace where inner uid 0 maps
    /// to an unprivileged host uid; nsenter into PID 1 cannot work there.
    fn in_user_namespace(&self) -> bool {
        if !nix::unistd::geteuid().is_root() {
            return true;
        }
        let Ok(text) = fs::read_to_string(self.proc_root.join("self/uid_map")) else {
            return false;
        };
        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() >= 3 && fields[0] == "0" && fields[1] != "0" {
                return true;
            }
        }
        false
    }

    fn pid1_is_host_init(&self) -> bool {
        let Ok(raw) = fs::read(self.proc_root.join("1/cmdline")) else {
            // Cannot tell; let the nsenter round trip decide
            return true;
        };
        let argv0: String = raw
            .split(|b| *b == 0)
            .next()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default();
        let base = Path::new(&argv0)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        matches!(base.as_str(), "systemd" | "init")
            || argv0 == "/sbin/init"
            || argv0 == "/usr/lib/systemd/systemd"
    }

    fn has_sys_admin(&self) -> bool {
        let Ok(text) = fs::read_to_string(self.proc_root.join("self/status")) else {
            return true;
        };
        for line in text.lines() {
            if let Some(hex) = line.strip_prefix("CapEff:") {
                if let Ok(bits) = u64::from_str_radix(hex.trim(), 16) {
                    return bits & (1 << CAP_SYS_ADMIN) != 0;
                }
            }
        }
        true
    }
}
