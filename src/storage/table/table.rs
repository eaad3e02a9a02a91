use std::collections::HashMap;

use log::debug;

use crate::common::types::{RecordId, SlotId};
use crate::index::btree::BPlusTree;
use crate::storage::page::layout::MAX_RECORD_SIZE;
use crate::storage::page::{SlottedPage, UpdateOutcome};
use crate::storage::table::error::{Result, TableError};
use crate::storage::table::record::Record;
use crate::storage::table::scan::TableScan;

/// Where a record currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    pub page_index: usize,
    pub slot: SlotId,
}

/// A row store over slotted pages with an optional primary-key index.
///
/// Record IDs are 1-based and stable for the lifetime of a row, even when an
/// update or a compaction moves its bytes to another slot.
pub struct Table {
    name: String,
    pages: Vec<SlottedPage>,
    /// Record ID owning each slot, per page
    slot_owners: Vec<Vec<Option<RecordId>>>,
    directory: HashMap<RecordId, RowLocation>,
    primary_index: Option<BPlusTree<i32, RecordId>>,
    next_record_id: RecordId,
}

impl Table {
    pub fn new(name: impl Into<String>, has_primary_key: bool) -> Self {
        Self {
            name: name.into(),
            pages: vec![SlottedPage::new()],
            slot_owners: vec![Vec::new()],
            directory: HashMap::new(),
            primary_index: has_primary_key.then(BPlusTree::new),
            next_record_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_index.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        self.directory.len()
    }

    pub fn pages(&self) -> &[SlottedPage] {
        &self.pages
    }

    pub fn insert_record(&mut self, record: &Record) -> Result<RecordId> {
        let bytes = Self::encode(record)?;

        let key = match &self.primary_index {
            Some(index) => {
                let key = Self::primary_key_of(record)?;
                if index.contains_key(&key) {
                    return Err(TableError::DuplicateKey(key));
                }
                Some(key)
            }
            None => None,
        };

        let location = self.place(&bytes)?;
        let record_id = self.next_record_id;
        self.next_record_id += 1;

        self.set_owner(location, Some(record_id));
        self.directory.insert(record_id, location);
        if let (Some(index), Some(key)) = (self.primary_index.as_mut(), key) {
            index.insert(key, record_id);
        }

        Ok(record_id)
    }

    /// Look a record up by its record ID
    pub fn get_record(&self, record_id: RecordId) -> Result<Option<Record>> {
        match self.directory.get(&record_id) {
            Some(&location) => Ok(Some(self.read_at(record_id, location)?)),
            None => Ok(None),
        }
    }

    pub fn search_by_primary_key(&self, key: i32) -> Result<Option<Record>> {
        let index = self.index()?;
        match index.search(&key) {
            Some(&record_id) => self.get_record(record_id),
            None => Ok(None),
        }
    }

    /// Records whose primary key lies in `[start, end]`, in key order
    pub fn range_scan_by_primary_key(&self, start: i32, end: i32) -> Result<Vec<Record>> {
        let index = self.index()?;
        index
            .range_scan(&start, &end)
            .into_iter()
            .map(|record_id| {
                self.get_record(record_id)?
                    .ok_or(TableError::RecordNotFound(record_id))
            })
            .collect()
    }

    /// Lazy scan over every live record in page then slot order.
    /// Each call starts a fresh pass.
    pub fn full_scan(&self) -> TableScan<'_> {
        TableScan::new(self)
    }

    /// Replace the contents of a record, keeping its record ID
    pub fn update_record(&mut self, record_id: RecordId, record: &Record) -> Result<()> {
        let location = *self
            .directory
            .get(&record_id)
            .ok_or(TableError::RecordNotFound(record_id))?;
        let bytes = Self::encode(record)?;

        let key_change = match &self.primary_index {
            Some(index) => {
                let old_key = Self::primary_key_of(&self.read_at(record_id, location)?)?;
                let new_key = Self::primary_key_of(record)?;
                if old_key != new_key && index.contains_key(&new_key) {
                    return Err(TableError::DuplicateKey(new_key));
                }
                (old_key != new_key).then_some((old_key, new_key))
            }
            None => None,
        };

        let page = &mut self.pages[location.page_index];
        match page.update_record(location.slot, &bytes)? {
            UpdateOutcome::InPlace => {}
            UpdateOutcome::Relocated(slot) => {
                let moved = RowLocation { page_index: location.page_index, slot };
                self.set_owner(location, None);
                self.set_owner(moved, Some(record_id));
                self.directory.insert(record_id, moved);
            }
            UpdateOutcome::NoSpace => {
                page.delete_record(location.slot)?;
                self.set_owner(location, None);
                let moved = self.place(&bytes)?;
                self.set_owner(moved, Some(record_id));
                self.directory.insert(record_id, moved);
            }
        }

        if let (Some(index), Some((old_key, new_key))) = (self.primary_index.as_mut(), key_change) {
            index.remove(&old_key);
            index.insert(new_key, record_id);
        }

        Ok(())
    }

    pub fn delete_record(&mut self, record_id: RecordId) -> Result<()> {
        let location = *self
            .directory
            .get(&record_id)
            .ok_or(TableError::RecordNotFound(record_id))?;

        let key = match self.primary_index {
            Some(_) => Some(Self::primary_key_of(&self.read_at(record_id, location)?)?),
            None => None,
        };

        self.pages[location.page_index].delete_record(location.slot)?;
        self.set_owner(location, None);
        self.directory.remove(&record_id);

        if let (Some(index), Some(key)) = (self.primary_index.as_mut(), key) {
            index.remove(&key);
        }
        Ok(())
    }

    /// Reclaim the space of deleted records on every page
    pub fn compact(&mut self) {
        for (page_index, page) in self.pages.iter_mut().enumerate() {
            let mapping = page.compact();
            let old_owners = std::mem::take(&mut self.slot_owners[page_index]);

            let mut owners = vec![None; page.slot_count() as usize];
            for (old_slot, new_slot) in mapping.into_iter().enumerate() {
                let (Some(new_slot), Some(Some(record_id))) = (new_slot, old_owners.get(old_slot)) else {
                    continue;
                };
                owners[new_slot as usize] = Some(*record_id);
                self.directory.insert(
                    *record_id,
                    RowLocation { page_index, slot: new_slot },
                );
            }
            self.slot_owners[page_index] = owners;
        }
        debug!("Compacted {} pages of table '{}'", self.pages.len(), self.name);
    }

    pub(crate) fn owner_of(&self, page_index: usize, slot: SlotId) -> Option<RecordId> {
        self.slot_owners
            .get(page_index)
            .and_then(|owners| owners.get(slot as usize))
            .copied()
            .flatten()
    }

    fn index(&self) -> Result<&BPlusTree<i32, RecordId>> {
        self.primary_index
            .as_ref()
            .ok_or_else(|| TableError::NoIndex(self.name.clone()))
    }

    fn encode(record: &Record) -> Result<Vec<u8>> {
        let bytes = record.serialize();
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(TableError::RecordTooLarge {
                size: bytes.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        Ok(bytes)
    }

    fn primary_key_of(record: &Record) -> Result<i32> {
        record.field_as_int(0).ok_or(TableError::InvalidPrimaryKey)
    }

    fn read_at(&self, record_id: RecordId, location: RowLocation) -> Result<Record> {
        let bytes = self.pages[location.page_index]
            .get_record(location.slot)
            .ok_or_else(|| {
                TableError::Inconsistent(format!(
                    "record {} points at empty slot {} of page {}",
                    record_id, location.slot, location.page_index
                ))
            })?;
        Ok(Record::deserialize(bytes)?)
    }

    /// Store bytes in the first page with room, appending a page if none has
    fn place(&mut self, bytes: &[u8]) -> Result<RowLocation> {
        for (page_index, page) in self.pages.iter_mut().enumerate() {
            if page.can_fit(bytes.len()) {
                let slot = page.insert_record(bytes)?;
                return Ok(RowLocation { page_index, slot });
            }
        }

        let mut page = SlottedPage::new();
        let slot = page.insert_record(bytes)?;
        self.pages.push(page);
        self.slot_owners.push(Vec::new());
        Ok(RowLocation {
            page_index: self.pages.len() - 1,
            slot,
        })
    }

    fn set_owner(&mut self, location: RowLocation, owner: Option<RecordId>) {
        let owners = &mut self.slot_owners[location.page_index];
        let slot = location.slot as usize;
        if owners.len() <= slot {
            owners.resize(slot + 1, None);
        }
        owners[slot] = owner;
    }
}
