//! Convert command implementation for the `o5m2sqlite` CLI.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::debug;
use o5m_data::{ConvertOptions, ConvertReport, DEFAULT_INDEX_KEY, convert_o5m_file, fs};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{ARG_DATABASE, ARG_O5M, CliError, ENV_DATABASE, ENV_O5M};

/// CLI arguments for the `convert` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load every node, way and relation of an o5m file into a new \
                 SQLite database, then build secondary indexes and an R*-tree \
                 over the bounding boxes of ways carrying the index key. \
                 Paths can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Convert an o5m file into a SQLite database"
)]
#[ortho_config(prefix = "O5M2SQLITE")]
pub(crate) struct ConvertArgs {
    /// Path to the o5m input file.
    #[arg(long = ARG_O5M, value_name = "path")]
    #[serde(default)]
    pub(crate) o5m: Option<Utf8PathBuf>,
    /// Path of the SQLite database to create.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Tag key whose ways are added to the spatial index.
    #[arg(long = "index-key", value_name = "key")]
    #[serde(default)]
    pub(crate) index_key: Option<String>,
    /// Replace the database if it already exists.
    #[arg(long)]
    #[serde(default)]
    pub(crate) overwrite: bool,
}

impl ConvertArgs {
    pub(crate) fn into_config(self) -> Result<ConvertConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ConvertConfig::try_from(merged)
    }
}

/// Resolved `convert` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConvertConfig {
    pub(crate) o5m: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) options: ConvertOptions,
}

impl ConvertConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        match fs::is_regular_file(&self.o5m) {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.missing_input()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(self.missing_input()),
            Err(source) => Err(CliError::InspectInput {
                field: ARG_O5M,
                path: self.o5m.clone(),
                source,
            }),
        }
    }

    fn missing_input(&self) -> CliError {
        CliError::MissingInputFile {
            field: ARG_O5M,
            path: self.o5m.clone(),
        }
    }
}

impl TryFrom<ConvertArgs> for ConvertConfig {
    type Error = CliError;

    fn try_from(args: ConvertArgs) -> Result<Self, Self::Error> {
        let o5m = args.o5m.ok_or(CliError::MissingArgument {
            field: ARG_O5M,
            env: ENV_O5M,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DATABASE,
        })?;
        let options = ConvertOptions {
            index_key: args
                .index_key
                .unwrap_or_else(|| DEFAULT_INDEX_KEY.to_owned()),
            overwrite: args.overwrite,
            ..ConvertOptions::default()
        };
        Ok(Self {
            o5m,
            database,
            options,
        })
    }
}

pub(crate) fn run_convert(args: ConvertArgs, out: &mut impl Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    execute(&config, out)
}

pub(crate) fn execute(config: &ConvertConfig, out: &mut impl Write) -> Result<(), CliError> {
    config.validate_sources()?;
    debug!("resolved convert configuration: {config:?}");
    let report = convert_o5m_file(&config.o5m, &config.database, &config.options)?;
    write_report(out, &config.database, &report).map_err(CliError::WriteOutput)
}

fn write_report(
    out: &mut impl Write,
    database: &Utf8Path,
    report: &ConvertReport,
) -> io::Result<()> {
    let summary = &report.summary;
    writeln!(out, "database: {database}")?;
    writeln!(
        out,
        "elements: {} nodes, {} ways, {} relations ({} skipped)",
        summary.nodes, summary.ways, summary.relations, summary.skipped
    )?;
    writeln!(
        out,
        "rows: {} node tags, {} way tags, {} way nodes, {} relation tags, {} relation members",
        summary.node_tags,
        summary.way_tags,
        summary.way_nodes,
        summary.relation_tags,
        summary.relation_members
    )?;
    writeln!(out, "spatial index: {} ways", report.spatial_entries)
}
