// src/render/mod.rs

//! Renderers: pure functions of the sealed snapshot.
//!
//! Every renderer reads the same redacted snapshot and writes one artifact
//! under the output directory. None of them run inspectors or mutate the
//! snapshot; running them twice produces byte-identical output.

pub mod audit;
pub mod config_tree;
pub mod containerfile;
pub mod html;
pub mod kickstart;
pub mod readme;
pub mod secrets;
pub mod triage;

use crate::error::Result;
use crate::snapshot::Snapshot;
use std::fs;
use std::path::Path;
use tracing::info;

/// Run all renderers. The config tree goes first — the Containerfile
/// enumerates what it wrote — and the README last, because it summarizes
/// FIXME markers from the finished Containerfile.
pub fn run_all(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    config_tree::render(snapshot, output_dir)?;
    containerfile::render(snapshot, output_dir)?;
    audit::render(snapshot, output_dir)?;
    html::render(snapshot, output_dir)?;
    kickstart::render(snapshot, output_dir)?;
    secrets::render(snapshot, output_dir)?;
    readme::render(snapshot, output_dir)?;
    info!(output = %output_dir.display(), "rendering complete");
    Ok(())
}

/// Reject values that would change shell semantics if embedded in a RUN
/// line. The data comes from an operator-controlled host, so this is a
/// guard against corrupted snapshots rather than a security boundary.
pub fn shell_safe(value: &str) -> bool {
    !value.contains('\n')
        && !value.contains('\r')
        && !value.contains(';')
        && !value.contains('`')
        && !value.contains('|')
        && !value.contains("$(")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_safety_rejects_metacharacters() {
        assert!(shell_safe("nginx"));
        assert!(shell_safe("httpd-2.4"));
        assert!(!shell_safe("pkg;rm -rf /"));
        assert!(!shell_safe("pkg`id`"));
        assert!(!shell_safe("pkg$(id)"));
        assert!(!shell_safe("pkg|tee"));
        assert!(!shell_safe("pkg\nRUN evil"));
    }
}
