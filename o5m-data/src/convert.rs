//! Transaction discipline and the file-level conversion entry point.

use std::io::BufReader;

use camino::Utf8Path;
use log::info;
use o5m_core::ElementSource;
use rusqlite::Connection;

use crate::error::ConvertError;
use crate::fs;
use crate::o5m::O5mReader;
use crate::pipeline::{ConvertSummary, run};
use crate::store::{
    SchemaWriter, StoreError, build_spatial_index, create_secondary_indexes, create_tables,
    spatial_table_name,
};

/// Tag key indexed when none is configured.
pub const DEFAULT_INDEX_KEY: &str = "highway";

/// Settings for [`convert_o5m_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Ways carrying this tag key are added to the spatial index.
    pub index_key: String,
    /// Trade durability for speed while loading: no fsync and an in-memory
    /// rollback journal.
    pub fast_load: bool,
    /// Replace an existing output instead of failing.
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            index_key: DEFAULT_INDEX_KEY.to_owned(),
            fast_load: true,
            overwrite: false,
        }
    }
}

/// Outcome of a complete conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertReport {
    /// Element and row counts of the load.
    pub summary: ConvertSummary,
    /// Ways added to the spatial index.
    pub spatial_entries: usize,
}

/// Load every element of `source` inside a single transaction.
///
/// The six tables are created in the same transaction, so any failure leaves
/// the database exactly as it was before the call.
pub fn load_elements<S: ElementSource>(
    connection: &mut Connection,
    source: S,
) -> Result<ConvertSummary, ConvertError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Transaction {
            operation: "begin",
            source,
        })?;
    create_tables(&transaction)?;
    let summary = {
        let mut writer = SchemaWriter::new(&transaction)?;
        run(source, &mut writer)?
    };
    transaction
        .commit()
        .map_err(|source| StoreError::Transaction {
            operation: "commit",
            source,
        })?;
    Ok(summary)
}

/// Load `source`, then build the secondary indexes and the spatial index for
/// ways tagged `index_key`.
pub fn convert<S: ElementSource>(
    connection: &mut Connection,
    source: S,
    index_key: &str,
) -> Result<ConvertReport, ConvertError> {
    spatial_table_name(index_key)?;
    let summary = load_elements(connection, source)?;
    create_secondary_indexes(connection)?;
    let spatial_entries = build_spatial_index(connection, index_key)?;
    Ok(ConvertReport {
        summary,
        spatial_entries,
    })
}

fn prepare_output(output: &Utf8Path, overwrite: bool) -> Result<(), ConvertError> {
    fs::ensure_parent_dir(output).map_err(|source| ConvertError::CreateDirectory {
        path: output.to_path_buf(),
        source,
    })?;
    let exists = fs::path_exists(output).map_err(|source| ConvertError::InspectOutput {
        path: output.to_path_buf(),
        source,
    })?;
    if !exists {
        return Ok(());
    }
    if !overwrite {
        return Err(ConvertError::OutputExists {
            path: output.to_path_buf(),
        });
    }
    fs::remove_file(output).map_err(|source| ConvertError::RemoveOutput {
        path: output.to_path_buf(),
        source,
    })
}

fn open_database(output: &Utf8Path, fast_load: bool) -> Result<Connection, ConvertError> {
    let connection =
        Connection::open(output.as_std_path()).map_err(|source| ConvertError::OpenDatabase {
            path: output.to_path_buf(),
            source,
        })?;
    if fast_load {
        connection
            .pragma_update(None, "synchronous", 0)
            .map_err(|source| ConvertError::Pragma {
                pragma: "synchronous",
                source,
            })?;
        connection
            .pragma_update_and_check(None, "journal_mode", "MEMORY", |row| row.get::<_, String>(0))
            .map_err(|source| ConvertError::Pragma {
                pragma: "journal_mode",
                source,
            })?;
    }
    Ok(connection)
}

/// Convert the `.o5m` file at `input` into a new SQLite database at `output`.
///
/// Missing parent directories of `output` are created. An existing output is
/// refused unless [`ConvertOptions::overwrite`] is set, in which case it is
/// deleted first. If decoding or loading fails the database is left without
/// any tables.
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use o5m_data::{ConvertOptions, convert_o5m_file};
///
/// let report = convert_o5m_file(
///     Utf8Path::new("bavaria.o5m"),
///     Utf8Path::new("out/bavaria.sqlite"),
///     &ConvertOptions::default(),
/// )?;
/// println!("indexed {} highways", report.spatial_entries);
/// # Ok::<(), o5m_data::ConvertError>(())
/// ```
pub fn convert_o5m_file(
    input: &Utf8Path,
    output: &Utf8Path,
    options: &ConvertOptions,
) -> Result<ConvertReport, ConvertError> {
    spatial_table_name(&options.index_key)?;
    let file = fs::open_input(input).map_err(|source| ConvertError::OpenInput {
        path: input.to_path_buf(),
        source,
    })?;
    prepare_output(output, options.overwrite)?;
    let mut connection = open_database(output, options.fast_load)?;

    info!("converting {input} into {output}");
    let reader = O5mReader::new(BufReader::new(file));
    let report = convert(&mut connection, reader, &options.index_key)?;
    info!(
        "wrote {output}: {} elements, {} ways indexed by {:?}",
        report.summary.elements(),
        report.spatial_entries,
        options.index_key
    );
    Ok(report)
}
