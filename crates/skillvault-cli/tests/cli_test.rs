//! End-to-end CLI tests.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn skillvault() -> Command {
    Command::cargo_bin("skillvault").unwrap()
}

fn write_benign(dir: &Path) {
    fs::write(dir.join("SKILL.md"), "# Demo Skill\n").unwrap();
    fs::write(dir.join("tool.js"), "console.log(\"ok\")\n").unwrap();
}

fn write_risky(dir: &Path) {
    fs::write(dir.join("SKILL.md"), "# Demo Skill\n").unwrap();
    fs::write(
        dir.join("tool.js"),
        "execSync('whoami')\nfetch('https://x')\n",
    )
    .unwrap();
}

#[test]
fn scan_emits_canonical_json_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());

    let output = skillvault()
        .arg("scan")
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["contract_version"], "0.1");
    assert_eq!(report["capabilities"].as_array().unwrap().len(), 0);
    assert_eq!(report["risk_score"]["total"], 0);
}

#[test]
fn scan_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());

    let run = || {
        skillvault()
            .arg("scan")
            .arg(dir.path())
            .arg("--deterministic")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };
    assert_eq!(run(), run());
}

#[test]
fn scan_table_format_renders_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());

    skillvault()
        .arg("scan")
        .arg(dir.path())
        .args(["--format", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SHA-256"))
        .stdout(predicate::str::contains("Capabilities"));
}

#[test]
fn missing_bundle_is_a_hard_error() {
    skillvault()
        .arg("scan")
        .arg("/nonexistent/bundle")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("BUNDLE_NOT_FOUND"));
}

#[test]
fn receipt_exits_by_verdict() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());

    // PASS -> 0.
    skillvault()
        .arg("receipt")
        .arg(dir.path())
        .arg("--deterministic")
        .assert()
        .success();

    // Blocked capability -> FAIL -> 1.
    let risky = tempfile::tempdir().unwrap();
    write_risky(risky.path());
    let policy = risky.path().join("policy.yaml");
    fs::write(&policy, "capabilities:\n  exec:\n    mode: block\n").unwrap();

    skillvault()
        .arg("receipt")
        .arg(risky.path())
        .arg("--policy")
        .arg(&policy)
        .arg("--deterministic")
        .assert()
        .code(1);
}

#[test]
fn bad_policy_is_a_hard_error_with_field_path() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());
    let policy = dir.path().join("policy.yaml");
    fs::write(&policy, "gates:\n  max_risk_score: 250\n").unwrap();

    skillvault()
        .arg("gate")
        .arg(dir.path())
        .arg("--policy")
        .arg(&policy)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("POLICY_SCHEMA_INVALID"))
        .stderr(predicate::str::contains("gates.max_risk_score"));
}

#[test]
fn sign_and_verify_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    fs::create_dir(&bundle).unwrap();
    write_benign(&bundle);
    let keys = dir.path().join("keys");

    skillvault()
        .arg("keygen")
        .args(["--out-dir"])
        .arg(&keys)
        .assert()
        .success()
        .stdout(predicate::str::contains("key_id: sha256:"));

    let receipt = dir.path().join("receipt.json");
    skillvault()
        .arg("receipt")
        .arg(&bundle)
        .arg("--deterministic")
        .args(["--signing-key"])
        .arg(keys.join("private_key.pem"))
        .args(["--out"])
        .arg(&receipt)
        .assert()
        .success();

    skillvault()
        .arg("verify")
        .arg(&bundle)
        .args(["--receipt"])
        .arg(&receipt)
        .args(["--pubkey"])
        .arg(keys.join("public_key.pem"))
        .arg("--offline")
        .assert()
        .success();

    // Tamper with the bundle: verification must fail with findings.
    fs::write(bundle.join("tool.js"), "console.log(\"changed\")\n").unwrap();
    skillvault()
        .arg("verify")
        .arg(&bundle)
        .args(["--receipt"])
        .arg(&receipt)
        .args(["--pubkey"])
        .arg(keys.join("public_key.pem"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("BUNDLE_HASH_MISMATCH"));
}

#[test]
fn verify_resolves_keyring_by_key_id() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    fs::create_dir(&bundle).unwrap();
    write_benign(&bundle);
    let keys = dir.path().join("keys");

    skillvault()
        .arg("keygen")
        .args(["--out-dir"])
        .arg(&keys)
        .assert()
        .success();

    let receipt = dir.path().join("receipt.json");
    skillvault()
        .arg("receipt")
        .arg(&bundle)
        .arg("--deterministic")
        .args(["--signing-key"])
        .arg(keys.join("private_key.pem"))
        .args(["--out"])
        .arg(&receipt)
        .assert()
        .success();

    // The receipt's key_id defaults to the SPKI digest; name the public key
    // accordingly inside the keyring.
    let receipt_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&receipt).unwrap()).unwrap();
    let key_id = receipt_json["signature"]["key_id"].as_str().unwrap();

    let keyring = dir.path().join("keyring");
    fs::create_dir(&keyring).unwrap();
    fs::copy(
        keys.join("public_key.pem"),
        keyring.join(format!("{key_id}.pem")),
    )
    .unwrap();

    skillvault()
        .arg("verify")
        .arg(&bundle)
        .args(["--receipt"])
        .arg(&receipt)
        .args(["--keyring"])
        .arg(&keyring)
        .assert()
        .success();
}

#[test]
fn gate_from_receipt_matches_gate_from_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    fs::create_dir(&bundle).unwrap();
    write_risky(&bundle);

    let receipt = dir.path().join("receipt.json");
    skillvault()
        .arg("receipt")
        .arg(&bundle)
        .arg("--deterministic")
        .args(["--out"])
        .arg(&receipt)
        .assert()
        .success();

    let from_bundle = skillvault()
        .arg("gate")
        .arg(&bundle)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let from_receipt = skillvault()
        .arg("gate")
        .args(["--receipt"])
        .arg(&receipt)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(from_bundle, from_receipt);

    let decision: serde_json::Value = serde_json::from_slice(&from_receipt).unwrap();
    assert_eq!(decision["verdict"], "WARN");
    assert_eq!(decision["risk_score"]["total"], 45);
}

#[test]
fn diff_bundle_against_itself_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());

    let output = skillvault()
        .arg("diff")
        .arg(dir.path())
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["summary"]["added"], 0);
    assert_eq!(report["summary"]["removed"], 0);
    assert_eq!(report["summary"]["modified"], 0);
    assert_eq!(report["summary"]["unchanged"], 2);
}

#[test]
fn diff_with_policy_regates_receipt_and_bundle_alike() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    fs::create_dir(&bundle).unwrap();
    fs::write(bundle.join("SKILL.md"), "# Demo Skill\n").unwrap();
    fs::write(bundle.join("tool.js"), "fetch('https://x')\n").unwrap();

    // Receipt under the default policy; the diff policy is stricter.
    let receipt = dir.path().join("receipt.json");
    skillvault()
        .arg("receipt")
        .arg(&bundle)
        .arg("--deterministic")
        .args(["--out"])
        .arg(&receipt)
        .assert()
        .success();

    let policy = dir.path().join("policy.yaml");
    fs::write(&policy, "capabilities:\n  network:\n    mode: block\n").unwrap();

    let output = skillvault()
        .arg("diff")
        .arg(&receipt)
        .arg(&bundle)
        .args(["--policy"])
        .arg(&policy)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    // Identical content under one policy epoch: no finding deltas, even
    // though the receipt's recorded decision predates the policy.
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["finding_deltas"]["added"].as_array().unwrap().len(), 0);
    assert_eq!(report["finding_deltas"]["removed"].as_array().unwrap().len(), 0);
    assert_eq!(report["summary"]["modified"], 0);
}

#[test]
fn export_writes_bit_stable_zip() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    fs::create_dir(&bundle).unwrap();
    write_benign(&bundle);

    let zip1 = dir.path().join("one.zip");
    let zip2 = dir.path().join("two.zip");
    for out in [&zip1, &zip2] {
        skillvault()
            .arg("export")
            .arg(&bundle)
            .args(["--out"])
            .arg(out)
            .args(["--profile", "strict_v0"])
            .assert()
            .success();
    }
    assert_eq!(fs::read(&zip1).unwrap(), fs::read(&zip2).unwrap());

    // The exported archive scans identically to the directory.
    let dir_scan = skillvault()
        .arg("scan")
        .arg(&bundle)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let zip_scan = skillvault()
        .arg("scan")
        .arg(&zip1)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let dir_json: serde_json::Value = serde_json::from_slice(&dir_scan).unwrap();
    let zip_json: serde_json::Value = serde_json::from_slice(&zip_scan).unwrap();
    assert_eq!(dir_json["bundle_sha256"], zip_json["bundle_sha256"]);
    assert_eq!(dir_json["files"], zip_json["files"]);
}

#[test]
fn export_rejects_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    fs::create_dir(&bundle).unwrap();
    fs::write(bundle.join("tool.js"), "console.log(1)\n").unwrap();

    let out = dir.path().join("skill.zip");
    skillvault()
        .arg("export")
        .arg(&bundle)
        .args(["--out"])
        .arg(&out)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CONSTRAINT_MANIFEST_COUNT"));
    assert!(!out.exists());
}

#[test]
fn export_unknown_profile_is_a_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    write_benign(dir.path());

    skillvault()
        .arg("export")
        .arg(dir.path())
        .args(["--out", "x.zip", "--profile", "loose_v1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("UNSUPPORTED_EXPORT_PROFILE"));
}

#[test]
fn approval_flag_flips_gate_verdict() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("SKILL.md"), "# Demo Skill\n").unwrap();
    fs::write(dir.path().join("tool.js"), "fetch('https://x')\n").unwrap();
    let policy = dir.path().join("policy.yaml");
    fs::write(&policy, "capabilities:\n  network:\n    mode: require_approval\n").unwrap();

    skillvault()
        .arg("gate")
        .arg(dir.path())
        .args(["--policy"])
        .arg(&policy)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("REQUIRED_APPROVAL_MISSING"));

    skillvault()
        .arg("gate")
        .arg(dir.path())
        .args(["--policy"])
        .arg(&policy)
        .args(["--approve", "network"])
        .assert()
        .success();
}
