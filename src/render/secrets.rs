// src/render/secrets.rs

//! Secrets-review document: everything the redaction gate touched, with
//! remediation guidance, in discovery order.

use crate::error::Result;
use crate::snapshot::Snapshot;
use std::fs;
use std::path::Path;

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let mut lines: Vec<String> = vec![
        "# Secrets Review".into(),
        String::new(),
        "Every redaction the inspection performed is listed here. Replace each".into(),
        "with a deploy-time mechanism (systemd credentials, a secret store, or".into(),
        "injected environment) before using the generated image.".into(),
        String::new(),
    ];

    if snapshot.secrets_review.is_empty() {
        lines.push("No secrets were detected in captured content.".into());
    } else {
        lines.push("| File | Class | Location | Token |".into());
        lines.push("|---|---|---|---|".into());
        for event in &snapshot.secrets_review {
            lines.push(format!(
                "| `{}` | {} | {} | {} |",
                event.path,
                event.class,
                event.line,
                event.token.as_deref().unwrap_or("—")
            ));
        }
        lines.push(String::new());
        lines.push("## Remediation".into());
        lines.push(String::new());
        lines.push("- Excluded files (shadow, keys, keytabs) were never captured; recreate".into());
        lines.push("  them at deploy time.".into());
        lines.push("- `REDACTED_*` tokens mark in-file substitutions; the token hash is".into());
        lines.push("  stable, so identical secrets share a token.".into());
    }
    lines.push(String::new());

    fs::write(output_dir.join("secrets-review.md"), lines.join("\n"))?;
    Ok(())
}
