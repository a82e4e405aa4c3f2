// tests/pipeline_roundtrip.rs

//! End-to-end pipeline tests against a synthetic host root: artifact
//! layout, all-packages fallback, snapshot round-trip, idempotent
//! re-rendering.

mod common;

use retrofit::inspect::InspectConfig;
use retrofit::snapshot::BaselineMode;
use retrofit::{pipeline, PipelineOptions, SNAPSHOT_FILENAME};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn options(host: &Path, output: &Path) -> PipelineOptions {
    PipelineOptions {
        host_root: host.to_path_buf(),
        output_dir: output.to_path_buf(),
        from_snapshot: None,
        inspect_only: false,
        target_version: None,
        target_image: None,
        baseline_packages: None,
        config: InspectConfig::default(),
    }
}

#[test]
fn full_run_produces_the_artifact_layout() {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    let snapshot = pipeline::run(&options(host.path(), output.path()), &runner, None).unwrap();

    for path in pipeline::artifact_paths(output.path()) {
        assert!(path.exists(), "missing artifact: {}", path.display());
    }
    assert!(output.path().join("config/etc").is_dir());
    assert!(output.path().join("config/tmp/passwd.append").exists());

    // Host identity made it into the snapshot
    let host_info = snapshot.host.unwrap();
    assert_eq!(host_info.id, "centos");
    assert_eq!(host_info.hostname, "web01.example.com");
    assert_eq!(
        snapshot.target.unwrap().reference,
        "quay.io/centos-bootc/centos-bootc:stream9"
    );
}

#[test]
fn no_baseline_falls_back_to_all_packages_with_warning() {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    let snapshot = pipeline::run(&options(host.path(), output.path()), &runner, None).unwrap();

    assert_eq!(
        snapshot.baseline.as_ref().unwrap().mode,
        BaselineMode::AllPackages
    );
    assert!(snapshot
        .warnings
        .iter()
        .any(|w| w.source == "baseline"
            && w.severity == retrofit::snapshot::Severity::Warn));

    // Every installed package appears in the install directive
    let containerfile = fs::read_to_string(output.path().join("Containerfile")).unwrap();
    for package in ["bash", "nginx", "openssh-server"] {
        assert!(
            containerfile.contains(&format!("    {package} \\")),
            "package {package} missing from install directive"
        );
    }
}

#[test]
fn supplied_baseline_drives_the_package_diff() {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    let list = host.path().join("baseline.txt");
    fs::write(&list, "bash\nopenssh-server\nsystemd\n").unwrap();
    let mut opts = options(host.path(), output.path());
    opts.baseline_packages = Some(list);

    let snapshot = pipeline::run(&opts, &runner, None).unwrap();
    let packages = snapshot.packages.unwrap();

    // installed {bash,nginx,openssh-server} vs baseline {bash,openssh-server,systemd}
    let added: Vec<&str> = packages.added.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(added, vec!["nginx"]);
    assert_eq!(packages.removed, vec!["systemd".to_string()]);

    let containerfile = fs::read_to_string(output.path().join("Containerfile")).unwrap();
    assert!(containerfile.contains("    nginx \\"));
    assert!(containerfile.contains("RUN dnf remove -y systemd"));
}

#[test]
fn rerender_from_snapshot_is_byte_identical() {
    let host = common::fake_host();
    let first_output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    pipeline::run(&options(host.path(), first_output.path()), &runner, None).unwrap();

    // Re-render into a second directory from the sealed snapshot
    let second_output = TempDir::new().unwrap();
    let mut rerender = options(host.path(), second_output.path());
    rerender.from_snapshot = Some(first_output.path().join(SNAPSHOT_FILENAME));
    pipeline::run(&rerender, &runner, None).unwrap();

    for name in [
        "Containerfile",
        "audit-report.md",
        "report.html",
        "README.md",
        "kickstart-suggestion.ks",
        "secrets-review.md",
    ] {
        let first = fs::read(first_output.path().join(name)).unwrap();
        let second = fs::read(second_output.path().join(name)).unwrap();
        assert_eq!(first, second, "artifact {name} differs after re-render");
    }
}

#[test]
fn rendering_twice_is_idempotent() {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    let snapshot = pipeline::run(&options(host.path(), output.path()), &runner, None).unwrap();

    let first = fs::read(output.path().join("Containerfile")).unwrap();
    retrofit::render::run_all(&snapshot, output.path()).unwrap();
    let second = fs::read(output.path().join("Containerfile")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn inspect_only_skips_renderers() {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    let mut opts = options(host.path(), output.path());
    opts.inspect_only = true;
    pipeline::run(&opts, &runner, None).unwrap();

    assert!(output.path().join(SNAPSHOT_FILENAME).exists());
    assert!(!output.path().join("Containerfile").exists());
}

#[test]
fn unreadable_snapshot_is_fatal() {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();

    let bogus = output.path().join("bogus.json");
    fs::write(&bogus, "{ not json }").unwrap();
    let mut opts = options(host.path(), output.path());
    opts.from_snapshot = Some(bogus);

    let err = pipeline::run(&opts, &runner, None).unwrap_err();
    assert!(matches!(err, retrofit::Error::SnapshotLoad { .. }));
}

#[test]
fn missing_host_root_is_fatal() {
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();
    let opts = options(Path::new("/nonexistent/host/root"), output.path());
    let err = pipeline::run(&opts, &runner, None).unwrap_err();
    assert!(matches!(err, retrofit::Error::HostRootUnreadable(_)));
}
