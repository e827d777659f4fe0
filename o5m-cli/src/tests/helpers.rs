//! Test helpers for staging extracts and layered configuration overrides.

use super::convert::{ConvertArgs, ConvertConfig};
use super::*;
use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../o5m-data/tests/fixtures");

/// Raw bytes of the shared `{stem}.o5m.b64` fixture.
fn fixture_bytes(stem: &str) -> Vec<u8> {
    let encoded: String = fs::read_to_string(format!("{FIXTURES_DIR}/{stem}.o5m.b64"))
        .unwrap_or_else(|err| panic!("read fixture {stem}: {err}"))
        .split_ascii_whitespace()
        .collect();
    general_purpose::STANDARD
        .decode(encoded)
        .unwrap_or_else(|err| panic!("decode fixture {stem}: {err}"))
}

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) o5m: Option<Utf8PathBuf>,
    pub(super) database: Option<Utf8PathBuf>,
}

/// A temporary directory holding one small extract (a residential way over
/// three nodes) under two names.
#[derive(Debug)]
pub(super) struct Dataset {
    _dir: TempDir,
    root: Utf8PathBuf,
    extract: Utf8PathBuf,
    config_extract: Utf8PathBuf,
}

impl Dataset {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let bytes = fixture_bytes("highway_way");
        let extract = root.join("cli.o5m");
        let config_extract = root.join("config.o5m");
        for path in [&extract, &config_extract] {
            fs::write(path, &bytes).expect("write extract");
        }
        Self {
            _dir: dir,
            root,
            extract,
            config_extract,
        }
    }

    /// Write another shared fixture next to the extract.
    pub(super) fn write_fixture(&self, stem: &str) -> Utf8PathBuf {
        let path = self.root.join(format!("{stem}.o5m"));
        fs::write(&path, fixture_bytes(stem)).expect("write fixture");
        path
    }

    pub(super) fn extract(&self) -> &Utf8Path {
        &self.extract
    }

    pub(super) fn config_extract(&self) -> &Utf8Path {
        &self.config_extract
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("cli/out.sqlite")
    }

    pub(super) fn env_database(&self) -> Utf8PathBuf {
        self.root.join("env/out.sqlite")
    }

    pub(super) fn missing_extract(&self) -> Utf8PathBuf {
        self.root.join("missing.o5m")
    }
}

/// Resolve `cli_args` the way layered configuration does, without reading
/// the process environment: CLI values win, then environment, then file.
pub(super) fn merge_layers(
    mut cli_args: ConvertArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<ConvertConfig, CliError> {
    merge_field(
        &mut cli_args.o5m,
        extract_field(env_layer.as_ref(), |layer| &layer.o5m),
        extract_field(file_layer.as_ref(), |layer| &layer.o5m),
    );
    merge_field(
        &mut cli_args.database,
        extract_field(env_layer.as_ref(), |layer| &layer.database),
        extract_field(file_layer.as_ref(), |layer| &layer.database),
    );
    ConvertConfig::try_from(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: Option<&LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.and_then(|entry| accessor(entry).clone())
}
