// src/github.rs

//! Optional push of the output directory to a remote GitHub repository.
//!
//! The push path is the one place generated artifacts leave the machine,
//! so it re-scans every emitted byte for residual secrets first and aborts
//! on any hit — the redaction gate already ran, this is the second lock.
//! Repositories are created private unless --public is given.

use crate::error::{Error, Result};
use crate::exec::ToolRunner;
use crate::redact;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

pub struct PushOptions {
    /// owner/repo
    pub repository: String,
    pub public: bool,
    pub skip_confirmation: bool,
    pub token: Option<String>,
}

/// Counts shown to the operator before confirmation.
struct OutputStats {
    total_bytes: u64,
    file_count: usize,
    fixme_count: usize,
}

fn collect_stats(output_dir: &Path) -> OutputStats {
    let mut stats = OutputStats {
        total_bytes: 0,
        file_count: 0,
        fixme_count: 0,
    };
    for entry in WalkDir::new(output_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(output_dir).unwrap_or(entry.path());
        if rel.starts_with(".git") {
            continue;
        }
        stats.file_count += 1;
        stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }
    if let Ok(text) = std::fs::read_to_string(output_dir.join("Containerfile")) {
        stats.fixme_count = text.lines().filter(|l| l.contains("FIXME")).count();
    }
    stats
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn run_in(
    runner: &dyn ToolRunner,
    dir: &Path,
    argv: &[&str],
    what: &str,
) -> Result<String> {
    let dir_str = dir.to_string_lossy().into_owned();
    let mut full: Vec<&str> = vec!["git", "-C", &dir_str];
    full.extend_from_slice(argv);
    let out = runner
        .run(&full)
        .map_err(|e| Error::Push(format!("{what}: {e}")))?;
    if !out.success() {
        return Err(Error::Push(format!("{what}: {}", out.stderr.trim())));
    }
    Ok(out.stdout)
}

/// Initialize a repository in the output directory, commit everything,
/// re-scan for secrets, create the remote, and push.
pub fn push(
    output_dir: &Path,
    options: &PushOptions,
    redaction_count: usize,
    runner: &dyn ToolRunner,
) -> Result<()> {
    // Second redaction gate: nothing leaves with a matchable secret
    if let Some(hit) = redact::scan_output_tree(output_dir) {
        return Err(Error::ResidualSecret(hit));
    }

    let stats = collect_stats(output_dir);
    if !options.skip_confirmation {
        let visibility = if options.public { "PUBLIC" } else { "private" };
        let prompt = format!(
            "Push {} file(s) ({} KiB, {} FIXME item(s), {} redaction(s)) to {visibility} \
             repository {}?",
            stats.file_count,
            stats.total_bytes / 1024,
            stats.fixme_count,
            redaction_count,
            options.repository
        );
        if !confirm(&prompt) {
            return Err(Error::Push("aborted by operator".into()));
        }
    }

    if !output_dir.join(".git").is_dir() {
        run_in(runner, output_dir, &["init", "-q"], "git init")?;
    }
    run_in(runner, output_dir, &["add", "-A"], "git add")?;
    // Empty-diff commits fail; tolerate an already-committed tree
    let dir_str = output_dir.to_string_lossy().into_owned();
    let commit = runner
        .run(&[
            "git",
            "-C",
            &dir_str,
            "commit",
            "-q",
            "-m",
            "Generated image recipe",
        ])
        .map_err(|e| Error::Push(format!("git commit: {e}")))?;
    if !commit.success() && !commit.stdout.contains("nothing to commit") {
        let noise = commit.stderr.trim();
        if !noise.contains("nothing to commit") {
            return Err(Error::Push(format!("git commit: {noise}")));
        }
    }

    // gh handles both repo creation and the initial push
    let visibility = if options.public {
        "--public"
    } else {
        "--private"
    };
    let source = format!("--source={}", output_dir.display());
    let token_pair = options
        .token
        .as_ref()
        .map(|token| format!("GITHUB_TOKEN={token}"));
    let mut argv: Vec<&str> = Vec::new();
    if let Some(pair) = &token_pair {
        argv.push("env");
        argv.push(pair.as_str());
    }
    argv.extend_from_slice(&[
        "gh",
        "repo",
        "create",
        &options.repository,
        visibility,
        &source,
        "--push",
    ]);
    let out = runner
        .run(&argv)
        .map_err(|e| Error::Push(format!("gh repo create: {e}")))?;
    if !out.success() {
        // Repository may already exist; fall back to a plain push
        let remote = format!("https://github.com/{}.git", options.repository);
        let _ = run_in(runner, output_dir, &["remote", "add", "origin", &remote], "git remote");
        run_in(
            runner,
            output_dir,
            &["push", "-u", "origin", "HEAD"],
            "git push",
        )?;
    }

    info!(repository = %options.repository, "push complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use std::fs;

    #[test]
    fn planted_secret_aborts_before_any_git_call() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config/etc")).unwrap();
        fs::write(
            dir.path().join("config/etc/app.conf"),
            "password=plaintextleak1\n",
        )
        .unwrap();

        // No git scripted: any git invocation would error differently
        let runner = FakeRunner::new();
        let options = PushOptions {
            repository: "acme/host-recipe".into(),
            public: false,
            skip_confirmation: true,
            token: None,
        };
        let err = push(dir.path(), &options, 0, &runner).unwrap_err();
        assert!(matches!(err, Error::ResidualSecret(_)));
    }

    #[test]
    fn clean_tree_runs_git_and_gh() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Containerfile"), "FROM quay.io/x\n").unwrap();

        let runner = FakeRunner::new().on(&["git"], "").on(&["gh"], "");
        let options = PushOptions {
            repository: "acme/host-recipe".into(),
            public: false,
            skip_confirmation: true,
            token: None,
        };
        push(dir.path(), &options, 0, &runner).unwrap();
    }
}
