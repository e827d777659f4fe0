//! Relational schema of the converted database.

use rusqlite::{Connection, Error as SqliteError, Transaction};
use thiserror::Error;

use super::spatial::{SpatialIndexError, spatial_table_name};

/// Tables created inside the load transaction, in creation order.
const TABLES: [(&str, &str); 6] = [
    (
        "create nodes",
        "CREATE TABLE nodes (node_id INTEGER PRIMARY KEY, lat REAL, lon REAL)",
    ),
    (
        "create node_tags",
        "CREATE TABLE node_tags (node_id INTEGER, key TEXT, value TEXT)",
    ),
    (
        "create way_tags",
        "CREATE TABLE way_tags (way_id INTEGER, key TEXT, value TEXT)",
    ),
    (
        "create way_nodes",
        "CREATE TABLE way_nodes (way_id INTEGER, local_order INTEGER, node_id INTEGER)",
    ),
    (
        "create relation_tags",
        "CREATE TABLE relation_tags (relation_id INTEGER, key TEXT, value TEXT)",
    ),
    (
        "create relation_members",
        "CREATE TABLE relation_members (relation_id INTEGER, type TEXT, ref INTEGER, role TEXT, local_order INTEGER)",
    ),
];

const SECONDARY_INDEXES: [(&str, &str); 10] = [
    (
        "index node_tags by node",
        "CREATE INDEX IF NOT EXISTS node_tags_node_id ON node_tags (node_id)",
    ),
    (
        "index node_tags by key",
        "CREATE INDEX IF NOT EXISTS node_tags_key ON node_tags (key)",
    ),
    (
        "index way_tags by way",
        "CREATE INDEX IF NOT EXISTS way_tags_way_id ON way_tags (way_id)",
    ),
    (
        "index way_tags by key",
        "CREATE INDEX IF NOT EXISTS way_tags_key ON way_tags (key)",
    ),
    (
        "index way_nodes by way",
        "CREATE INDEX IF NOT EXISTS way_nodes_way_id ON way_nodes (way_id)",
    ),
    (
        "index way_nodes by node",
        "CREATE INDEX IF NOT EXISTS way_nodes_node_id ON way_nodes (node_id)",
    ),
    (
        "index relation_tags by relation",
        "CREATE INDEX IF NOT EXISTS relation_tags_relation_id ON relation_tags (relation_id)",
    ),
    (
        "index relation_tags by key",
        "CREATE INDEX IF NOT EXISTS relation_tags_key ON relation_tags (key)",
    ),
    (
        "index relation_members by relation",
        "CREATE INDEX IF NOT EXISTS relation_members_relation_id ON relation_members (relation_id)",
    ),
    (
        "index relation_members by member",
        "CREATE INDEX IF NOT EXISTS relation_members_type ON relation_members (type, ref)",
    ),
];

/// A schema statement failed.
#[derive(Debug, Error)]
#[error("failed to execute schema step '{step}'")]
pub struct SchemaError {
    /// Name of the failing step.
    pub step: &'static str,
    /// Error reported by SQLite.
    #[source]
    pub source: SqliteError,
}

fn run_schema_step(
    connection: &Connection,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    connection
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError { step, source })
}

/// Create the six element tables inside the load transaction.
///
/// The tables must not exist yet; loading never appends to a previous
/// conversion.
pub fn create_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    TABLES
        .iter()
        .try_for_each(|&(step, sql)| run_schema_step(transaction, step, sql))
}

/// Build the lookup indexes over a committed load.
///
/// Creating them after the bulk insert is considerably faster than
/// maintaining them row by row. Re-running is harmless.
///
/// # Examples
/// ```
/// use o5m_data::{create_secondary_indexes, create_tables};
/// use rusqlite::Connection;
///
/// let mut connection = Connection::open_in_memory()?;
/// let transaction = connection.transaction()?;
/// create_tables(&transaction)?;
/// transaction.commit()?;
/// create_secondary_indexes(&mut connection)?;
///
/// let indexes: i64 = connection.query_row(
///     "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index'",
///     [],
///     |row| row.get(0),
/// )?;
/// assert_eq!(indexes, 10);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_secondary_indexes(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection.transaction().map_err(|source| SchemaError {
        step: "begin index transaction",
        source,
    })?;
    SECONDARY_INDEXES
        .iter()
        .try_for_each(|&(step, sql)| run_schema_step(&transaction, step, sql))?;
    transaction.commit().map_err(|source| SchemaError {
        step: "commit index transaction",
        source,
    })
}

/// The complete DDL of a converted database whose spatial index covers ways
/// tagged with `key`.
pub fn schema_sql(key: &str) -> Result<String, SpatialIndexError> {
    let table = spatial_table_name(key)?;
    let mut sql = String::new();
    for (_, statement) in TABLES.iter().chain(SECONDARY_INDEXES.iter()) {
        sql.push_str(statement);
        sql.push_str(";\n");
    }
    sql.push_str(&format!(
        "CREATE VIRTUAL TABLE {table} USING rtree(way_id, min_lat, max_lat, min_lon, max_lon);\n"
    ));
    Ok(sql)
}
