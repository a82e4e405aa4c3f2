// tests/push_safety.rs

//! The push path must never ship a secret that slipped past (or was added
//! after) the first redaction pass.

mod common;

use retrofit::github::{push, PushOptions};
use retrofit::inspect::InspectConfig;
use retrofit::{pipeline, Error, PipelineOptions};
use std::fs;
use tempfile::TempDir;

#[test]
fn planted_secret_after_redaction_aborts_the_push() {
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

    // A clean tree passes the gate (no git/gh scripted beyond no-ops)
    let push_runner = retrofit::FakeRunner::new().on(&["git"], "").on(&["gh"], "");
    let options = PushOptions {
        repository: "acme/web01-recipe".into(),
        public: false,
        skip_confirmation: true,
        token: None,
    };
    push(output.path(), &options, snapshot.secrets_review.len(), &push_runner).unwrap();

    // Simulate an operator hand-editing a secret back in after the gate
    fs::write(
        output.path().join("config/etc/planted.conf"),
        "api_key = \"sk11223344556677889900aabbccdd\"\n",
    )
    .unwrap();

    let err = push(
        output.path(),
        &options,
        snapshot.secrets_review.len(),
        &push_runner,
    )
    .unwrap_err();
    match err {
        Error::ResidualSecret(path) => assert!(path.ends_with("planted.conf")),
        other => panic!("expected ResidualSecret, got {other:?}"),
    }
}
