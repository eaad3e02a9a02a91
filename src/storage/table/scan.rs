use crate::common::types::{RecordId, SlotId};
use crate::storage::table::error::{Result, TableError};
use crate::storage::table::record::Record;
use crate::storage::table::table::Table;

/// Lazy cursor over a table's live records, page by page and slot by slot
#[derive(Clone)]
pub struct TableScan<'a> {
    table: &'a Table,
    page_index: usize,
    slot: SlotId,
}

impl<'a> TableScan<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            page_index: 0,
            slot: 0,
        }
    }

    /// Rewind to the first record
    pub fn restart(&mut self) {
        self.page_index = 0;
        self.slot = 0;
    }
}

impl Iterator for TableScan<'_> {
    type Item = Result<(RecordId, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.table.pages().get(self.page_index)?;
            if self.slot >= page.slot_count() {
                self.page_index += 1;
                self.slot = 0;
                continue;
            }

            let slot = self.slot;
            self.slot += 1;

            let Some(bytes) = page.get_record(slot) else {
                continue;
            };
            let item = match self.table.owner_of(self.page_index, slot) {
                Some(record_id) => Record::deserialize(bytes)
                    .map(|record| (record_id, record))
                    .map_err(TableError::from),
                None => Err(TableError::Inconsistent(format!(
                    "live slot {} of page {} has no record ID",
                    slot, self.page_index
                ))),
            };
            return Some(item);
        }
    }
}
