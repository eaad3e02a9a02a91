use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{FileId, Page, PageId, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum PageManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{0} is past the end of its file")]
    PageOutOfBounds(PageId),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// PageManager performs the raw block I/O for every data file.
///
/// Each file id maps to `file_<id>.db` inside the data directory. Files are
/// opened on first use and kept open until `close`.
pub struct PageManager {
    data_dir: PathBuf,
    files: Mutex<HashMap<FileId, File>>,
}

impl PageManager {
    /// Create a PageManager rooted at `data_dir`, creating the directory if needed
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, PageManagerError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        Ok(Self {
            data_dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn file_path(&self, file_id: FileId) -> PathBuf {
        self.data_dir.join(format!("file_{}.db", file_id))
    }

    /// Append a zero-filled page to the file and return its ID
    pub fn allocate_page(&self, file_id: FileId) -> Result<PageId, PageManagerError> {
        let mut files = self.files.lock();
        let file = self.open_file(&mut files, file_id)?;

        let file_size = file.metadata()?.len();
        let page_id = PageId::new(file_id, (file_size / PAGE_SIZE as u64) as u32);

        file.seek(SeekFrom::Start(page_id.file_offset()))?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        file.sync_data()?;

        debug!("Allocated {}", page_id);
        Ok(page_id)
    }

    /// Read a page from disk into a fresh, clean, unpinned Page
    pub fn read_page(&self, page_id: PageId) -> Result<Page, PageManagerError> {
        if page_id == PageId::INVALID {
            return Err(PageManagerError::InvalidPageId(page_id));
        }

        let mut page = Page::new(page_id);
        let mut files = self.files.lock();
        let file = self.open_file(&mut files, page_id.file_id)?;

        let offset = page_id.file_offset();
        if offset + PAGE_SIZE as u64 > file.metadata()?.len() {
            return Err(PageManagerError::PageOutOfBounds(page_id));
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut page.data)?;

        Ok(page)
    }

    /// Write a page to disk, force it, then clear its dirty flag
    pub fn write_page(&self, page: &Page) -> Result<(), PageManagerError> {
        if page.page_id == PageId::INVALID {
            return Err(PageManagerError::InvalidPageId(page.page_id));
        }

        {
            let mut files = self.files.lock();
            let file = self.open_file(&mut files, page.page_id.file_id)?;

            file.seek(SeekFrom::Start(page.page_id.file_offset()))?;
            file.write_all(&page.data)?;
            file.sync_data()?;
        }

        page.mark_clean();
        Ok(())
    }

    /// Number of pages currently stored in a file
    pub fn page_count(&self, file_id: FileId) -> Result<u32, PageManagerError> {
        let mut files = self.files.lock();
        let file = self.open_file(&mut files, file_id)?;
        Ok((file.metadata()?.len() / PAGE_SIZE as u64) as u32)
    }

    /// Sync and release every open file handle
    pub fn close(&self) -> Result<(), PageManagerError> {
        let mut files = self.files.lock();
        for (_, file) in files.drain() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn open_file<'a>(
        &self,
        files: &'a mut HashMap<FileId, File>,
        file_id: FileId,
    ) -> Result<&'a mut File, PageManagerError> {
        let file = match files.entry(file_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(self.file_path(file_id))?;
                entry.insert(file)
            }
        };
        Ok(file)
    }
}
