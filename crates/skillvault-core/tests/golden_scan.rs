//! Golden scan fixtures.
//!
//! Run with `REGEN_GOLDENS=1` to rewrite the expected files after an
//! intentional contract change.

use std::path::PathBuf;

use skillvault_core::{canonical, scan_path};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn golden(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/golden")
        .join(name)
}

#[test]
fn benign_scan_matches_golden() {
    let report = scan_path(&fixture("benign")).unwrap();
    let actual = canonical::to_vec(&report).unwrap();

    let golden_path = golden("benign_scan.json");
    if std::env::var("REGEN_GOLDENS").is_ok() {
        let pretty = serde_json::to_string_pretty(
            &serde_json::from_slice::<serde_json::Value>(&actual).unwrap(),
        )
        .unwrap();
        std::fs::write(&golden_path, pretty + "\n").unwrap();
        return;
    }

    // The golden file is pretty-printed for reviewability; canonicalize both
    // sides so the comparison is over canonical bytes.
    let expected: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&golden_path).unwrap()).unwrap();
    let expected = canonical::to_vec(&expected).unwrap();

    assert_eq!(
        String::from_utf8(actual).unwrap(),
        String::from_utf8(expected).unwrap(),
        "scan output diverged from golden; run with REGEN_GOLDENS=1 if intentional"
    );
}

#[test]
fn golden_bundle_hash_is_pinned() {
    let report = scan_path(&fixture("benign")).unwrap();
    assert_eq!(
        report.bundle_sha256,
        "05dc3d84075e68ba3cf518525b917bb618560cd8bc608a0d652f83a54f87882f"
    );
}
