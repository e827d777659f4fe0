//! R*-tree index over the bounding boxes of tagged ways.

use geo::{Coord, Rect};
use log::{info, warn};
use rusqlite::{Connection, Error as SqliteError, Row};
use thiserror::Error;

/// Errors raised while building or querying the spatial index.
#[derive(Debug, Error)]
pub enum SpatialIndexError {
    /// The tag key cannot name an index table.
    #[error("invalid spatial index key {key:?}: the key must not be empty")]
    InvalidKey {
        /// Rejected key.
        key: String,
    },
    /// An SQLite operation failed.
    #[error("spatial index operation '{operation}' failed")]
    Sqlite {
        /// Operation that failed.
        operation: &'static str,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
}

fn sqlite(operation: &'static str) -> impl FnOnce(SqliteError) -> SpatialIndexError {
    move |source| SpatialIndexError::Sqlite { operation, source }
}

/// One way's bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialIndexEntry {
    /// Identifier of the way.
    pub way_id: i64,
    /// Extent with longitude on the x axis and latitude on the y axis.
    pub bounds: Rect<f64>,
}

/// Name of the R*-tree table indexing ways tagged with `key`.
///
/// Lowercase ASCII letters and digits are kept. Every other byte of the key,
/// `_` and uppercase letters included, becomes `_` followed by two lowercase
/// hex digits. Distinct keys therefore name distinct tables even though SQL
/// identifiers ignore case, and the name is always a valid bare identifier.
///
/// ```
/// use o5m_data::spatial_table_name;
///
/// assert_eq!(spatial_table_name("highway").unwrap(), "rtree_way_highway");
/// assert_eq!(spatial_table_name("addr:street").unwrap(), "rtree_way_addr_3astreet");
/// assert_eq!(spatial_table_name("addr_street").unwrap(), "rtree_way_addr_5fstreet");
/// assert!(spatial_table_name("").is_err());
/// ```
pub fn spatial_table_name(key: &str) -> Result<String, SpatialIndexError> {
    if key.is_empty() {
        return Err(SpatialIndexError::InvalidKey {
            key: key.to_owned(),
        });
    }
    let encoded: String = key
        .bytes()
        .map(|byte| {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
                char::from(byte).to_string()
            } else {
                format!("_{byte:02x}")
            }
        })
        .collect();
    Ok(format!("rtree_way_{encoded}"))
}

/// Rebuild the spatial index for ways tagged with `key` and return the number
/// of indexed ways.
///
/// The table is created when missing and emptied before it is filled, all
/// within one transaction, so repeated runs leave identical contents. Ways
/// whose nodes are all missing or unpositioned are left out.
pub fn build_spatial_index(
    connection: &mut Connection,
    key: &str,
) -> Result<usize, SpatialIndexError> {
    let table = spatial_table_name(key)?;
    let transaction = connection
        .transaction()
        .map_err(sqlite("begin spatial index transaction"))?;
    transaction
        .execute(
            &format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS {table} USING rtree(way_id, min_lat, max_lat, min_lon, max_lon)"
            ),
            [],
        )
        .map_err(sqlite("create spatial index table"))?;
    transaction
        .execute(&format!("DELETE FROM {table}"), [])
        .map_err(sqlite("clear spatial index"))?;
    let indexed = transaction
        .execute(
            &format!(
                "INSERT INTO {table} (way_id, min_lat, max_lat, min_lon, max_lon)
                SELECT way_tags.way_id, min(nodes.lat), max(nodes.lat), min(nodes.lon), max(nodes.lon)
                FROM way_tags
                JOIN way_nodes ON way_nodes.way_id = way_tags.way_id
                JOIN nodes ON nodes.node_id = way_nodes.node_id
                WHERE way_tags.key = ?1 AND nodes.lat IS NOT NULL AND nodes.lon IS NOT NULL
                GROUP BY way_tags.way_id"
            ),
            [key],
        )
        .map_err(sqlite("populate spatial index"))?;
    transaction
        .commit()
        .map_err(sqlite("commit spatial index transaction"))?;

    if indexed == 0 {
        warn!("spatial index {table} is empty: no way tagged {key:?} has positioned nodes");
    } else {
        info!("indexed {indexed} ways tagged {key:?} in {table}");
    }
    Ok(indexed)
}

fn entry(row: &Row<'_>) -> rusqlite::Result<SpatialIndexEntry> {
    let way_id = row.get(0)?;
    let min = Coord {
        x: row.get(3)?,
        y: row.get(1)?,
    };
    let max = Coord {
        x: row.get(4)?,
        y: row.get(2)?,
    };
    Ok(SpatialIndexEntry {
        way_id,
        bounds: Rect::new(min, max),
    })
}

/// All entries of the index for `key`, ordered by way id.
///
/// The R*-tree stores 32-bit floats, so bounds are rounded outwards to the
/// nearest representable value.
pub fn read_spatial_index(
    connection: &Connection,
    key: &str,
) -> Result<Vec<SpatialIndexEntry>, SpatialIndexError> {
    let table = spatial_table_name(key)?;
    let mut statement = connection
        .prepare(&format!(
            "SELECT way_id, min_lat, max_lat, min_lon, max_lon FROM {table} ORDER BY way_id"
        ))
        .map_err(sqlite("prepare spatial index scan"))?;
    let entries = statement
        .query_map([], entry)
        .map_err(sqlite("scan spatial index"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite("read spatial index row"))?;
    Ok(entries)
}

/// Ids of the ways tagged `key` whose boxes intersect `area`.
pub fn ways_intersecting(
    connection: &Connection,
    key: &str,
    area: &Rect<f64>,
) -> Result<Vec<i64>, SpatialIndexError> {
    let table = spatial_table_name(key)?;
    let mut statement = connection
        .prepare(&format!(
            "SELECT way_id FROM {table}
            WHERE max_lat >= ?1 AND min_lat <= ?2 AND max_lon >= ?3 AND min_lon <= ?4
            ORDER BY way_id"
        ))
        .map_err(sqlite("prepare spatial index query"))?;
    let (min, max) = (area.min(), area.max());
    let ways = statement
        .query_map((min.y, max.y, min.x, max.x), |row| row.get(0))
        .map_err(sqlite("query spatial index"))?
        .collect::<Result<Vec<i64>, _>>()
        .map_err(sqlite("read spatial index row"))?;
    Ok(ways)
}
