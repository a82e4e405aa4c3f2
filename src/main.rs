// src/main.rs
//! Retrofit - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use retrofit::inspect::InspectConfig;
use retrofit::{github, pipeline, validate, HostBridge, SystemRunner};
use std::path::PathBuf;
use std::process::ExitCode;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "retrofit")]
#[command(author = "Retrofit Project")]
#[command(version)]
#[command(
    about = "Inspect a package-managed Linux host and generate a bootc image recipe",
    long_about = None
)]
struct Cli {
    /// Root path of the read-only host mount
    #[arg(long, default_value = "/host")]
    host_root: PathBuf,

    /// Directory for all generated artifacts (created if missing)
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Skip inspection; load a sealed snapshot and run renderers only
    #[arg(long, value_name = "PATH")]
    from_snapshot: Option<PathBuf>,

    /// Run inspectors and save the snapshot; skip renderers
    #[arg(long)]
    inspect_only: bool,

    /// Target base image version (e.g. 9.6); default maps from the host,
    /// clamped to the minimum image-mode release
    #[arg(long, value_name = "VERSION")]
    target_version: Option<String>,

    /// Full target base image reference; overrides --target-version and
    /// all automatic mapping
    #[arg(long, value_name = "IMAGE")]
    target_image: Option<String>,

    /// Newline-separated package list for air-gapped hosts where the base
    /// image cannot be queried
    #[arg(long, value_name = "FILE")]
    baseline_packages: Option<PathBuf>,

    /// Diff modified package-owned configs against the shipped originals
    #[arg(long)]
    config_diffs: bool,

    /// Full-binary string scan for version detection (slow)
    #[arg(long)]
    deep_binary_scan: bool,

    /// Enumerate live containers through the host container runtime
    #[arg(long)]
    query_podman: bool,

    /// After rendering, build the Containerfile through the host runtime
    #[arg(long)]
    validate: bool,

    /// Push the output directory to a GitHub repository (owner/repo)
    #[arg(long, value_name = "REPO")]
    push_to_github: Option<String>,

    /// Token for repository creation (falls back to GITHUB_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    github_token: Option<String>,

    /// Create the remote repository public (default: private)
    #[arg(long)]
    public: bool,

    /// Skip interactive confirmation prompts
    #[arg(long)]
    yes: bool,

    /// Bypass the container privilege checks
    #[arg(long)]
    skip_preflight: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let runner = SystemRunner::new();
    let bridge = HostBridge::new(&runner);

    // Preflight applies only when inspecting through a mounted host root
    let inspecting = cli.from_snapshot.is_none();
    if inspecting && cli.host_root != PathBuf::from("/") && !cli.skip_preflight {
        let status = bridge.probe();
        // A missing runtime only degrades the baseline; everything else
        // means the container was started without the required flags.
        if !status.is_ok() && status != retrofit::ProbeStatus::NoRuntime {
            return Err(anyhow::Error::from(retrofit::Error::Privilege(
                status.explain().to_string(),
            ))
            .context(
                "container privilege checks failed. Run with the required flags, e.g.:\n  \
                 sudo podman run --rm --pid=host --privileged \
                 --security-opt label=disable \\\n    \
                 -v /:/host:ro -v ./output:/output:z retrofit --output-dir /output\n\
                 or pass --skip-preflight to bypass these checks",
            ));
        }
    }

    let options = pipeline::PipelineOptions {
        host_root: cli.host_root,
        output_dir: cli.output_dir.clone(),
        from_snapshot: cli.from_snapshot,
        inspect_only: cli.inspect_only,
        target_version: cli.target_version,
        target_image: cli.target_image,
        baseline_packages: cli.baseline_packages,
        config: InspectConfig {
            config_diffs: cli.config_diffs,
            deep_binary_scan: cli.deep_binary_scan,
            query_podman: cli.query_podman,
        },
    };

    let snapshot = pipeline::run(&options, &runner, Some(&bridge))?;

    if !cli.inspect_only {
        if cli.validate {
            // The build needs its own runner: the shared one enforces the
            // 120 s inspection deadline, far too short for podman build.
            let build_runner = SystemRunner::with_timeout(validate::BUILD_TIMEOUT);
            let build_bridge = HostBridge::new(&build_runner);
            validate::run(&cli.output_dir, &build_runner, Some(&build_bridge));
        }
        if let Some(repository) = cli.push_to_github {
            let push_options = github::PushOptions {
                repository,
                public: cli.public,
                skip_confirmation: cli.yes,
                token: cli.github_token.or_else(|| std::env::var("GITHUB_TOKEN").ok()),
            };
            github::push(
                &cli.output_dir,
                &push_options,
                snapshot.secrets_review.len(),
                &runner,
            )?;
        }
    }

    Ok(())
}
