// src/validate.rs

//! Build validation (--validate): run the generated Containerfile through
//! the host's container runtime and capture what breaks.
//!
//! Failure is never fatal — the artifacts are still useful, so the log is
//! written next to them and surfaced in the reports.

use crate::exec::{HostBridge, RunOutput, ToolRunner};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const LOG_FILE: &str = "build-errors.log";

/// Wall-clock deadline for the image build. A cold `podman build
/// --no-cache` pulls the base image and runs every layer, so it gets a
/// far longer leash than the 120 s the inspection queries use. Callers
/// must pass a runner (and bridge) built with this timeout.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Returns true when the build succeeded (or could not be attempted).
pub fn run(output_dir: &Path, runner: &dyn ToolRunner, bridge: Option<&HostBridge>) -> bool {
    let containerfile = output_dir.join("Containerfile");
    if !containerfile.is_file() {
        return true;
    }

    let containerfile_str = containerfile.to_string_lossy().into_owned();
    let dir_str = output_dir.to_string_lossy().into_owned();
    let argv: [&str; 6] = [
        "podman",
        "build",
        "--no-cache",
        "-f",
        &containerfile_str,
        &dir_str,
    ];

    // In the inspection container the runtime lives on the host; fall back
    // to direct invocation when running on the host itself.
    let result: Option<RunOutput> = match bridge {
        Some(bridge) if bridge.probe().is_ok() => bridge.run_on_host(&argv).ok(),
        _ => runner.run(&argv).ok(),
    };

    let Some(out) = result else {
        warn!("podman unavailable; build validation skipped");
        return true;
    };

    if out.success() {
        info!("build validation succeeded");
        return true;
    }

    warn!(status = out.status, "build validation failed");
    let log = format!(
        "Containerfile build failed.\n\nstdout:\n{}\n\nstderr:\n{}\n",
        out.stdout, out.stderr
    );
    let _ = fs::write(output_dir.join(LOG_FILE), &log);
    append_to_reports(output_dir, &out.stderr);
    false
}

/// Surface the failure in the already-rendered reports.
fn append_to_reports(output_dir: &Path, summary: &str) {
    let truncated: String = summary.chars().take(1500).collect();

    let audit = output_dir.join("audit-report.md");
    if audit.is_file() {
        if let Ok(mut text) = fs::read_to_string(&audit) {
            text.push_str("\n## Build validation failed\n\n");
            text.push_str(&format!("See `{LOG_FILE}` for full output.\n\n```\n"));
            text.push_str(&truncated.replace("```", "` ` `"));
            text.push_str("\n```\n");
            let _ = fs::write(&audit, text);
        }
    }

    let report = output_dir.join("report.html");
    if report.is_file() {
        if let Ok(html) = fs::read_to_string(&report) {
            let escaped: String = truncated
                .chars()
                .take(500)
                .collect::<String>()
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            let panel = format!(
                "<div class=\"warning-panel severity-error\"><strong>Build validation failed</strong>\
                 <p>See {LOG_FILE}</p><pre>{escaped}</pre></div>"
            );
            if html.contains("</main>") {
                let _ = fs::write(&report, html.replace("</main>", &format!("{panel}\n</main>")));
            }
        }
    }
}
