mod common;

use assert_cmd::Command;
use transferpack::service::Session;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("transferpack 0.1.0\n");
}

#[test]
fn pack_unpack_and_inspect() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let (mut source, seeded) = common::seed_source(temp.path(), None);
    source.close().expect("close source");
    drop(source);

    let archive = temp.path().join("out/packet.zip");
    let object = format!("Project:{}", seeded.project);

    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("--instance")
        .arg(temp.path().join("source"))
        .args(["pack", object.as_str()])
        .arg(temp.path().join("out/packet"));
    cmd.assert()
        .success()
        .stdout(predicates::str::contains(format!("Packed {}", object)))
        .stdout(predicates::str::contains("2 file(s)"));
    assert!(archive.is_file());

    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("inspect").arg(&archive).args(["--output", "json"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"projects\": 1"))
        .stdout(predicates::str::contains("\"images\": 2"));

    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.env("TRANSFERPACK_INSTANCE", temp.path().join("dest"))
        .arg("unpack")
        .arg(&archive);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("2 file(s) imported, 2 image(s) matched"))
        .stdout(predicates::str::contains("1 project(s), 1 dataset(s)"));
    assert!(temp.path().join("dest/instance.json").is_file());
    assert!(!temp.path().join("dest/instance.lock").exists());
}

#[test]
fn inspect_text_lists_files() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let (mut source, seeded) = common::seed_source(temp.path(), None);
    transferpack::transfer::pack(
        &source,
        transferpack::graph::ObjectRef::Dataset(seeded.dataset.as_u64()),
        &temp.path().join("packet.zip"),
    )
    .expect("pack");
    source.close().expect("close source");

    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("inspect").arg(temp.path().join("packet.zip"));
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("a.bmp"))
        .stdout(predicates::str::contains("Validation passed"));
}

#[test]
fn pack_rejects_unsupported_kind() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let (mut source, _) = common::seed_source(temp.path(), None);
    source.close().expect("close source");
    drop(source);

    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("--instance")
        .arg(temp.path().join("source"))
        .args(["pack", "Screen:1"])
        .arg(temp.path().join("out"));
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Unsupported root kind 'Screen'"));
}

#[test]
fn pack_requires_an_existing_instance() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("--instance")
        .arg(temp.path().join("nowhere"))
        .args(["pack", "Project:1"])
        .arg(temp.path().join("out"));
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("no instance at"));
}

#[test]
fn unpack_of_missing_archive_names_the_stage() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let mut cmd = Command::cargo_bin("transferpack").unwrap();
    cmd.arg("--instance")
        .arg(temp.path().join("dest"))
        .arg("unpack")
        .arg(temp.path().join("missing.zip"));
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Unpack stopped after stage started"));
}
