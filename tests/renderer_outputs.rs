// tests/renderer_outputs.rs

//! Scenario checks over the rendered artifacts: cron-to-timer conversion,
//! unknown-provenance software, hand-edited DNS, config capture.

mod common;

use retrofit::inspect::InspectConfig;
use retrofit::snapshot::{ConfigKind, Provenance, Confidence, ResolvProvenance};
use retrofit::{pipeline, PipelineOptions};
use std::fs;
use tempfile::TempDir;

fn run_fixture() -> (TempDir, TempDir, retrofit::Snapshot) {
    let host = common::fake_host();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();
    let opts = PipelineOptions {
        host_root: host.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        from_snapshot: None,
        inspect_only: false,
        target_version: None,
        target_image: None,
        baseline_packages: None,
        config: InspectConfig::default(),
    };
    let snapshot = pipeline::run(&opts, &runner, None).unwrap();
    (host, output, snapshot)
}

#[test]
fn crontab_entry_becomes_an_enabled_timer_unit() {
    let (_host, output, snapshot) = run_fixture();

    // The generated pair landed in the config tree
    let scheduled = snapshot.scheduled.as_ref().unwrap();
    assert_eq!(scheduled.generated.len(), 1);
    let unit = &scheduled.generated[0];
    assert_eq!(unit.on_calendar, "*-*-* 03:00:00");

    let timer_path = output
        .path()
        .join(format!("config/etc/systemd/system/{}.timer", unit.name));
    let service_path = output
        .path()
        .join(format!("config/etc/systemd/system/{}.service", unit.name));
    let timer = fs::read_to_string(timer_path).unwrap();
    let service = fs::read_to_string(service_path).unwrap();
    assert!(timer.contains("OnCalendar=*-*-* 03:00:00"));
    assert!(service.contains("ExecStart=/usr/local/bin/backup.sh"));

    // And the recipe enables it
    let containerfile = fs::read_to_string(output.path().join("Containerfile")).unwrap();
    assert!(containerfile.contains(&format!("RUN systemctl enable {}.timer", unit.name)));
}

#[test]
fn unknown_binary_is_fixme_marked_in_the_recipe() {
    let (_host, output, snapshot) = run_fixture();

    let software = snapshot.software.as_ref().unwrap();
    let item = software
        .items
        .iter()
        .find(|i| i.path == "usr/local/bin/mytool")
        .expect("mytool should be discovered");
    assert_eq!(item.provenance, Provenance::Unknown);
    assert_eq!(item.confidence, Confidence::Unknown);

    let containerfile = fs::read_to_string(output.path().join("Containerfile")).unwrap();
    let lines: Vec<&str> = containerfile.lines().collect();
    let fixme_index = lines
        .iter()
        .position(|l| l.contains("FIXME: unknown provenance") && l.contains("mytool"))
        .expect("FIXME line for mytool");
    assert!(
        lines[fixme_index + 1].contains("COPY config/usr/local/bin/mytool /usr/local/bin/mytool"),
        "copy directive must sit adjacent to its FIXME marker"
    );
}

#[test]
fn hand_edited_resolv_conf_is_flagged() {
    let host = common::fake_host();
    fs::write(
        host.path().join("etc/resolv.conf"),
        "nameserver 10.0.0.53\n",
    )
    .unwrap();
    let output = TempDir::new().unwrap();
    let runner = common::fake_runner();
    let opts = PipelineOptions {
        host_root: host.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        from_snapshot: None,
        inspect_only: false,
        target_version: None,
        target_image: None,
        baseline_packages: None,
        config: InspectConfig::default(),
    };
    let snapshot = pipeline::run(&opts, &runner, None).unwrap();

    assert_eq!(
        snapshot.network.as_ref().unwrap().resolv,
        Some(ResolvProvenance::HandEdited)
    );
    assert!(snapshot.warnings.iter().any(|w| w.source == "network"));
    let containerfile = fs::read_to_string(output.path().join("Containerfile")).unwrap();
    assert!(containerfile.contains("resolv.conf is hand-edited"));
}

#[test]
fn unowned_config_is_captured_and_mirrored() {
    let (_host, output, snapshot) = run_fixture();

    let configs = snapshot.configs.as_ref().unwrap();
    assert!(configs
        .of_kind(ConfigKind::Unowned)
        .iter()
        .any(|f| f.path == "etc/corp-agent.conf"));
    let mirrored = output.path().join("config/etc/corp-agent.conf");
    assert!(mirrored.exists());
    assert_eq!(
        fs::read_to_string(mirrored).unwrap(),
        "endpoint=https://inv.example.com\n"
    );
}

#[test]
fn captured_database_uri_is_redacted_everywhere() {
    let (_host, output, snapshot) = run_fixture();

    // The secret never survives into the snapshot...
    let serialized = serde_json::to_string(&snapshot).unwrap();
    assert!(!serialized.contains("hunter2sekrit"));
    assert!(snapshot
        .secrets_review
        .iter()
        .any(|e| e.path == "etc/app/db.conf"));

    // ...nor into any rendered artifact
    for entry in walkdir::WalkDir::new(output.path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let bytes = fs::read(entry.path()).unwrap();
        assert!(
            !String::from_utf8_lossy(&bytes).contains("hunter2sekrit"),
            "secret leaked into {}",
            entry.path().display()
        );
    }

    // The second gate agrees the tree is clean
    assert!(retrofit::redact::scan_output_tree(output.path()).is_none());
}

#[test]
fn reports_reference_each_other_consistently() {
    let (_host, output, _snapshot) = run_fixture();

    let readme = fs::read_to_string(output.path().join("README.md")).unwrap();
    assert!(readme.contains("audit-report.md"));
    assert!(readme.contains("report.html"));
    assert!(readme.contains("podman build"));

    let audit = fs::read_to_string(output.path().join("audit-report.md")).unwrap();
    assert!(audit.contains("## Executive Summary"));

    let html = fs::read_to_string(output.path().join("report.html")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
}
