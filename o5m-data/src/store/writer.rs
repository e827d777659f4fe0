//! Prepared row writers for the six element tables.

use std::fmt;

use rusqlite::{Error as SqliteError, Statement, Transaction};
use thiserror::Error;

use o5m_core::MemberKind;

/// Destination table of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// `nodes`
    Nodes,
    /// `node_tags`
    NodeTags,
    /// `way_tags`
    WayTags,
    /// `way_nodes`
    WayNodes,
    /// `relation_tags`
    RelationTags,
    /// `relation_members`
    RelationMembers,
}

impl Table {
    /// SQL name of the table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::NodeTags => "node_tags",
            Self::WayTags => "way_tags",
            Self::WayNodes => "way_nodes",
            Self::RelationTags => "relation_tags",
            Self::RelationMembers => "relation_members",
        }
    }

    const fn insert_sql(self) -> &'static str {
        match self {
            Self::Nodes => "INSERT INTO nodes (node_id, lat, lon) VALUES (?1, ?2, ?3)",
            Self::NodeTags => "INSERT INTO node_tags (node_id, key, value) VALUES (?1, ?2, ?3)",
            Self::WayTags => "INSERT INTO way_tags (way_id, key, value) VALUES (?1, ?2, ?3)",
            Self::WayNodes => {
                "INSERT INTO way_nodes (way_id, local_order, node_id) VALUES (?1, ?2, ?3)"
            }
            Self::RelationTags => {
                "INSERT INTO relation_tags (relation_id, key, value) VALUES (?1, ?2, ?3)"
            }
            Self::RelationMembers => {
                "INSERT INTO relation_members (relation_id, type, ref, role, local_order) VALUES (?1, ?2, ?3, ?4, ?5)"
            }
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while writing element rows.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Preparing an insert statement failed.
    #[error("failed to prepare insert into {table}")]
    Prepare {
        /// Table the statement targets.
        table: Table,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
    /// Inserting a row failed.
    #[error("failed to insert into {table} for element {owner_id}")]
    Insert {
        /// Table the row was destined for.
        table: Table,
        /// Identifier of the element owning the row.
        owner_id: i64,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
    /// Beginning or committing the load transaction failed.
    #[error("failed to {operation} the load transaction")]
    Transaction {
        /// `begin` or `commit`.
        operation: &'static str,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
}

/// Row writer bound to one load transaction.
///
/// Every statement is prepared once up front and reused for each row, so the
/// writer cannot outlive the transaction it was prepared on.
///
/// # Examples
/// ```
/// use o5m_data::{SchemaWriter, create_tables};
/// use rusqlite::Connection;
///
/// let mut connection = Connection::open_in_memory()?;
/// let transaction = connection.transaction()?;
/// create_tables(&transaction)?;
/// {
///     let mut writer = SchemaWriter::new(&transaction)?;
///     writer.insert_node(1, Some((48.1, 11.5)))?;
///     writer.insert_node_tag(1, "amenity", "cafe")?;
/// }
/// transaction.commit()?;
///
/// let lat: f64 = connection.query_row("SELECT lat FROM nodes", [], |row| row.get(0))?;
/// assert_eq!(lat, 48.1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SchemaWriter<'tx> {
    nodes: Statement<'tx>,
    node_tags: Statement<'tx>,
    way_tags: Statement<'tx>,
    way_nodes: Statement<'tx>,
    relation_tags: Statement<'tx>,
    relation_members: Statement<'tx>,
}

impl fmt::Debug for SchemaWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaWriter").finish_non_exhaustive()
    }
}

fn prepare<'tx>(
    transaction: &'tx Transaction<'_>,
    table: Table,
) -> Result<Statement<'tx>, StoreError> {
    transaction
        .prepare(table.insert_sql())
        .map_err(|source| StoreError::Prepare { table, source })
}

fn inserted(
    result: Result<usize, SqliteError>,
    table: Table,
    owner_id: i64,
) -> Result<(), StoreError> {
    result.map(|_| ()).map_err(|source| StoreError::Insert {
        table,
        owner_id,
        source,
    })
}

impl<'tx> SchemaWriter<'tx> {
    /// Prepare all six insert statements on `transaction`.
    ///
    /// # Errors
    /// Returns [`StoreError::Prepare`] when a table is missing or a statement
    /// cannot be compiled.
    pub fn new(transaction: &'tx Transaction<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            nodes: prepare(transaction, Table::Nodes)?,
            node_tags: prepare(transaction, Table::NodeTags)?,
            way_tags: prepare(transaction, Table::WayTags)?,
            way_nodes: prepare(transaction, Table::WayNodes)?,
            relation_tags: prepare(transaction, Table::RelationTags)?,
            relation_members: prepare(transaction, Table::RelationMembers)?,
        })
    }

    /// Insert a node; `position` is `(lat, lon)` in degrees, or `None` for
    /// NULL coordinates.
    pub fn insert_node(
        &mut self,
        node_id: i64,
        position: Option<(f64, f64)>,
    ) -> Result<(), StoreError> {
        let (lat, lon) = position.unzip();
        inserted(self.nodes.execute((node_id, lat, lon)), Table::Nodes, node_id)
    }

    /// Insert one `key=value` tag of a node.
    pub fn insert_node_tag(
        &mut self,
        node_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        inserted(self.node_tags.execute((node_id, key, value)), Table::NodeTags, node_id)
    }

    /// Insert one `key=value` tag of a way.
    pub fn insert_way_tag(
        &mut self,
        way_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        inserted(self.way_tags.execute((way_id, key, value)), Table::WayTags, way_id)
    }

    /// Insert the `local_order`-th (1-based) node reference of a way.
    pub fn insert_way_node(
        &mut self,
        way_id: i64,
        local_order: i64,
        node_id: i64,
    ) -> Result<(), StoreError> {
        inserted(
            self.way_nodes.execute((way_id, local_order, node_id)),
            Table::WayNodes,
            way_id,
        )
    }

    /// Insert one `key=value` tag of a relation.
    pub fn insert_relation_tag(
        &mut self,
        relation_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        inserted(
            self.relation_tags.execute((relation_id, key, value)),
            Table::RelationTags,
            relation_id,
        )
    }

    /// Insert the `local_order`-th (1-based) member of a relation. Unknown
    /// member kinds are stored with an empty type.
    pub fn insert_relation_member(
        &mut self,
        relation_id: i64,
        kind: MemberKind,
        member_id: i64,
        role: &str,
        local_order: i64,
    ) -> Result<(), StoreError> {
        inserted(
            self.relation_members
                .execute((relation_id, kind.label(), member_id, role, local_order)),
            Table::RelationMembers,
            relation_id,
        )
    }
}
