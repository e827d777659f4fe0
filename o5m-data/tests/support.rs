// Shared helpers for the integration and unit tests. The fixtures under
// `tests/fixtures` are small hand-assembled o5m streams (string table
// references, delta-coded ids and coordinates) stored as `<stem>.o5m.b64`
// so the repository holds no binary files.

use base64::{Engine as _, engine::general_purpose};
use std::{fs, path::PathBuf};
use tempfile::{Builder, TempPath};

/// The R*-tree stores 32-bit floats, so bounds read back from it are only
/// accurate to about this many degrees.
const COORDINATE_EPSILON: f64 = 1.0e-5;

fn encoded_fixture(stem: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(format!("{stem}.o5m.b64"))
}

/// Raw o5m bytes of the `stem` fixture. Line breaks in the encoded text are
/// ignored.
pub fn o5m_bytes(stem: &str) -> Vec<u8> {
    let path = encoded_fixture(stem);
    let encoded: String = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read o5m fixture {path:?}: {err}"))
        .split_ascii_whitespace()
        .collect();
    general_purpose::STANDARD
        .decode(encoded)
        .unwrap_or_else(|err| panic!("fixture {path:?} is not valid base64: {err}"))
}

/// Stage the `stem` fixture as an `.o5m` file that is removed on drop.
pub fn stage_o5m(stem: &str) -> TempPath {
    let staged = Builder::new()
        .prefix(stem)
        .suffix(".o5m")
        .tempfile()
        .unwrap_or_else(|err| panic!("failed to create staging file for {stem}: {err}"))
        .into_temp_path();
    fs::write(&staged, o5m_bytes(stem))
        .unwrap_or_else(|err| panic!("failed to stage o5m fixture {stem}: {err}"));
    staged
}

/// Compare coordinates read back from the spatial index.
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}
