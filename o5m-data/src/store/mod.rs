//! SQLite persistence: table layout, row writers and the spatial index.

mod schema;
mod spatial;
mod writer;

pub use schema::{SchemaError, create_secondary_indexes, create_tables, schema_sql};
pub use spatial::{
    SpatialIndexEntry, SpatialIndexError, build_spatial_index, read_spatial_index,
    spatial_table_name, ways_intersecting,
};
pub use writer::{SchemaWriter, StoreError, Table};
