//! Repository over the catalog tables.
//!
//! A [`CatalogReader`] wraps one redb read transaction (a consistent snapshot)
//! and a [`CatalogWriter`] wraps one write transaction (an atomic unit). All
//! access to rows goes through these methods; nothing outside this module
//! touches table definitions directly.

use std::sync::Arc;

use redb::{
    Database, Durability, ReadTransaction, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    ReadableTableMetadata, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::{
    lookup_table, TABLE_DESIGNER_STATS, TABLE_GROUPS, TABLE_GROUP_VARIATIONS, TABLE_SEQUENCES,
    TABLE_VARIATIONS,
};
use crate::error::Result;
use crate::model::{ArtGroup, ArtVariation, DesignerStats, Lookup, LookupKind};

pub const SEQ_GROUPS: &str = "art_groups";
pub const SEQ_VARIATIONS: &str = "art_variations";

pub fn lookup_sequence(kind: LookupKind) -> &'static str {
    match kind {
        LookupKind::Category => "categories",
        LookupKind::Format => "formats",
        LookupKind::FileType => "file_types",
    }
}

/// Handle to the embedded store
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
}

impl CatalogStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Opens a consistent snapshot for reading
    pub fn read(&self) -> Result<CatalogReader> {
        Ok(CatalogReader { txn: self.db.begin_read()? })
    }

    /// Opens an atomic unit; nothing is visible to readers until `commit`
    pub fn write(&self) -> Result<CatalogWriter> {
        Ok(CatalogWriter { txn: self.db.begin_write()? })
    }

    /// Opens a unit whose commit skips the fsync.
    ///
    /// Its writes become durable with the next regular commit; a crash before
    /// that loses them. Only for counters that tolerate loss.
    pub fn write_relaxed(&self) -> Result<CatalogWriter> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(Durability::None)?;
        Ok(CatalogWriter { txn })
    }
}

fn encode<T: Serialize>(row: &T) -> Result<String> {
    Ok(serde_json::to_string(row)?)
}

fn get_row<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static str>,
    id: u64,
) -> Result<Option<T>> {
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

fn all_rows<T: DeserializeOwned>(table: &impl ReadableTable<u64, &'static str>) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        rows.push(serde_json::from_str(value.value())?);
    }
    Ok(rows)
}

fn member_ids(table: &impl ReadableMultimapTable<u64, u64>, group_id: u64) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for id in table.get(group_id)? {
        ids.push(id?.value());
    }
    Ok(ids)
}

fn get_stats(
    table: &impl ReadableTable<&'static str, &'static str>,
    designer_id: &str,
) -> Result<Option<DesignerStats>> {
    match table.get(designer_id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Primary first, then oldest to newest
pub fn order_variations(variations: &mut [ArtVariation]) {
    variations.sort_by(|a, b| {
        b.is_primary
            .cmp(&a.is_primary)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

/// Reads shared by snapshots and write units
pub trait CatalogRead {
    fn find_group(&self, group_id: u64) -> Result<Option<ArtGroup>>;

    /// Variations of a group, primary first
    fn variations_of(&self, group_id: u64) -> Result<Vec<ArtVariation>>;

    fn lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>>;

    fn lookup_exists(&self, kind: LookupKind, id: u64) -> Result<bool>;

    fn designer_stats(&self, designer_id: &str) -> Result<Option<DesignerStats>>;
}

/// Read side of the repository
pub struct CatalogReader {
    txn: ReadTransaction,
}

impl CatalogReader {
    /// Visits groups newest first (descending id) until `visit` returns `false`
    pub fn scan_groups_newest_first(
        &self,
        mut visit: impl FnMut(ArtGroup) -> Result<bool>,
    ) -> Result<()> {
        let table = self.txn.open_table(TABLE_GROUPS)?;
        for entry in table.iter()?.rev() {
            let (_, value) = entry?;
            if !visit(serde_json::from_str(value.value())?)? {
                break;
            }
        }
        Ok(())
    }

    pub fn group_count(&self) -> Result<usize> {
        let table = self.txn.open_table(TABLE_GROUPS)?;
        let count = table.len()?;
        Ok(count as usize)
    }
}

impl CatalogRead for CatalogReader {
    fn find_group(&self, group_id: u64) -> Result<Option<ArtGroup>> {
        let table = self.txn.open_table(TABLE_GROUPS)?;
        get_row(&table, group_id)
    }

    fn variations_of(&self, group_id: u64) -> Result<Vec<ArtVariation>> {
        let index = self.txn.open_multimap_table(TABLE_GROUP_VARIATIONS)?;
        let table = self.txn.open_table(TABLE_VARIATIONS)?;
        let mut variations = Vec::new();
        for id in member_ids(&index, group_id)? {
            if let Some(variation) = get_row(&table, id)? {
                variations.push(variation);
            }
        }
        order_variations(&mut variations);
        Ok(variations)
    }

    fn lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>> {
        let table = self.txn.open_table(lookup_table(kind))?;
        all_rows(&table)
    }

    fn lookup_exists(&self, kind: LookupKind, id: u64) -> Result<bool> {
        let table = self.txn.open_table(lookup_table(kind))?;
        let exists = table.get(id)?.is_some();
        Ok(exists)
    }

    fn designer_stats(&self, designer_id: &str) -> Result<Option<DesignerStats>> {
        let table = self.txn.open_table(TABLE_DESIGNER_STATS)?;
        get_stats(&table, designer_id)
    }
}

/// Write side of the repository; dropping it without `commit` rolls back
pub struct CatalogWriter {
    txn: WriteTransaction,
}

impl CatalogWriter {
    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }

    /// Issues the next id of a sequence
    pub fn next_id(&self, sequence: &str) -> Result<u64> {
        let mut table = self.txn.open_table(TABLE_SEQUENCES)?;
        let next = table.get(sequence)?.map(|guard| guard.value()).unwrap_or(0) + 1;
        table.insert(sequence, next)?;
        Ok(next)
    }

    pub fn put_group(&self, group: &ArtGroup) -> Result<()> {
        let json = encode(group)?;
        let mut table = self.txn.open_table(TABLE_GROUPS)?;
        table.insert(group.id, json.as_str())?;
        Ok(())
    }

    pub fn remove_group(&self, group_id: u64) -> Result<bool> {
        let mut table = self.txn.open_table(TABLE_GROUPS)?;
        let removed = table.remove(group_id)?.is_some();
        Ok(removed)
    }

    /// Writes a new variation row and links it to its group
    pub fn insert_variation(&self, variation: &ArtVariation) -> Result<()> {
        self.put_variation(variation)?;
        let mut index = self.txn.open_multimap_table(TABLE_GROUP_VARIATIONS)?;
        index.insert(variation.group_id, variation.id)?;
        Ok(())
    }

    pub fn put_variation(&self, variation: &ArtVariation) -> Result<()> {
        let json = encode(variation)?;
        let mut table = self.txn.open_table(TABLE_VARIATIONS)?;
        table.insert(variation.id, json.as_str())?;
        Ok(())
    }

    pub fn remove_variation(&self, group_id: u64, variation_id: u64) -> Result<()> {
        {
            let mut table = self.txn.open_table(TABLE_VARIATIONS)?;
            table.remove(variation_id)?;
        }
        let mut index = self.txn.open_multimap_table(TABLE_GROUP_VARIATIONS)?;
        index.remove(group_id, variation_id)?;
        Ok(())
    }

    /// Removes every variation of a group, returning how many were deleted
    pub fn remove_group_variations(&self, group_id: u64) -> Result<usize> {
        let ids = {
            let mut index = self.txn.open_multimap_table(TABLE_GROUP_VARIATIONS)?;
            let ids = member_ids(&index, group_id)?;
            index.remove_all(group_id)?;
            ids
        };
        let mut table = self.txn.open_table(TABLE_VARIATIONS)?;
        for id in &ids {
            table.remove(*id)?;
        }
        Ok(ids.len())
    }

    pub fn put_lookup(&self, kind: LookupKind, lookup: &Lookup) -> Result<()> {
        let json = encode(lookup)?;
        let mut table = self.txn.open_table(lookup_table(kind))?;
        table.insert(lookup.id, json.as_str())?;
        Ok(())
    }

    pub fn put_designer_stats(&self, stats: &DesignerStats) -> Result<()> {
        let json = encode(stats)?;
        let mut table = self.txn.open_table(TABLE_DESIGNER_STATS)?;
        table.insert(stats.designer_id.as_str(), json.as_str())?;
        Ok(())
    }
}

impl CatalogRead for CatalogWriter {
    fn find_group(&self, group_id: u64) -> Result<Option<ArtGroup>> {
        let table = self.txn.open_table(TABLE_GROUPS)?;
        get_row(&table, group_id)
    }

    fn variations_of(&self, group_id: u64) -> Result<Vec<ArtVariation>> {
        let ids = {
            let index = self.txn.open_multimap_table(TABLE_GROUP_VARIATIONS)?;
            member_ids(&index, group_id)?
        };
        let table = self.txn.open_table(TABLE_VARIATIONS)?;
        let mut variations = Vec::new();
        for id in ids {
            if let Some(variation) = get_row(&table, id)? {
                variations.push(variation);
            }
        }
        order_variations(&mut variations);
        Ok(variations)
    }

    fn lookup_exists(&self, kind: LookupKind, id: u64) -> Result<bool> {
        let table = self.txn.open_table(lookup_table(kind))?;
        let exists = table.get(id)?.is_some();
        Ok(exists)
    }

    fn lookups(&self, kind: LookupKind) -> Result<Vec<Lookup>> {
        let table = self.txn.open_table(lookup_table(kind))?;
        all_rows(&table)
    }

    fn designer_stats(&self, designer_id: &str) -> Result<Option<DesignerStats>> {
        let table = self.txn.open_table(TABLE_DESIGNER_STATS)?;
        get_stats(&table, designer_id)
    }
}
