//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database that backs the
//! catalog. Rows are stored as JSON strings keyed by numeric id; relationships
//! that need fan-out (group → variations) live in a multimap index.

use redb::{Database, MultimapTableDefinition, TableDefinition};
use std::sync::Arc;

use crate::access::RoleDirectory;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::model::LookupKind;

/// Groups keyed by id
///
/// Key: group id, issued from the `art_groups` sequence
/// Value: JSON-serialized `ArtGroup`
///
/// Example:
/// - Key: 12
/// - Value: '{"id":12,"title":"Summer sale","designer_id":"dana",...}'
///
/// Ids grow in creation order, so a reverse range scan lists newest first.
pub const TABLE_GROUPS: TableDefinition<u64, &str> = TableDefinition::new("art_groups_v1");

/// Variations keyed by id
///
/// Key: variation id, issued from the `art_variations` sequence
/// Value: JSON-serialized `ArtVariation`
///
/// Example:
/// - Key: 31
/// - Value: '{"id":31,"group_id":12,"format_id":2,"is_primary":true,...}'
pub const TABLE_VARIATIONS: TableDefinition<u64, &str> = TableDefinition::new("art_variations_v1");

/// Index from group id to the ids of its member variations
///
/// Example:
/// - Key: 12
/// - Values: 30, 31, 35
pub const TABLE_GROUP_VARIATIONS: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("group_variations_v1");

/// Designer statistics keyed by designer id
///
/// Key: designer id as string
/// Value: JSON-serialized `DesignerStats`
///
/// Rows are created on the designer's first group.
pub const TABLE_DESIGNER_STATS: TableDefinition<&str, &str> =
    TableDefinition::new("designer_stats_v1");

/// Reference data tables, one per `LookupKind`
///
/// Key: lookup id
/// Value: JSON-serialized `Lookup`
pub const TABLE_CATEGORIES: TableDefinition<u64, &str> = TableDefinition::new("categories_v1");
pub const TABLE_FORMATS: TableDefinition<u64, &str> = TableDefinition::new("formats_v1");
pub const TABLE_FILE_TYPES: TableDefinition<u64, &str> = TableDefinition::new("file_types_v1");

/// Last issued id per sequence name
///
/// Ids are handed out inside write transactions, and redb admits one writer
/// at a time, so sequence values are strictly increasing in commit order.
pub const TABLE_SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences_v1");

pub fn lookup_table(kind: LookupKind) -> TableDefinition<'static, u64, &'static str> {
    match kind {
        LookupKind::Category => TABLE_CATEGORIES,
        LookupKind::Format => TABLE_FORMATS,
        LookupKind::FileType => TABLE_FILE_TYPES,
    }
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Core catalog services
    pub catalog: Catalog,

    /// Resolves caller ids to roles
    pub roles: Arc<dyn RoleDirectory>,

    /// Shared secret expected in the `Authorization` header, if any
    pub auth_secret: Option<String>,
}

/// Initializes the embedded database and creates required tables
///
/// # Example
///
/// ```no_run
/// # use art_catalog::database::init_db;
/// let db = init_db("catalog.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_GROUPS)?;
        write_txn.open_table(TABLE_VARIATIONS)?;
        write_txn.open_multimap_table(TABLE_GROUP_VARIATIONS)?;
        write_txn.open_table(TABLE_DESIGNER_STATS)?;
        write_txn.open_table(TABLE_CATEGORIES)?;
        write_txn.open_table(TABLE_FORMATS)?;
        write_txn.open_table(TABLE_FILE_TYPES)?;
        write_txn.open_table(TABLE_SEQUENCES)?;
    }
    write_txn.commit()?;

    tracing::debug!(path = db_path, "Catalog database ready");
    Ok(db)
}
