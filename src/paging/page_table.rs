//! Flat per-batch page table in the layout kernels index.

use tracing::debug;

use super::block_table::BlockTable;
use crate::addressing::PagedCache;
use crate::error::{Error, Result};

/// Padding for table slots past the end of a shorter sequence. Never read
/// by a valid walk, so it is not checked against the cache.
const PAD_PAGE: i32 = 0;

/// `[batch_size, batch_stride]` row-major table of physical page ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    entries: Vec<i32>,
    /// Leading entries of each row that are real pages, not padding.
    row_lens: Vec<usize>,
    batch_size: usize,
    batch_stride: usize,
    num_pages: usize,
    page_stride: i64,
}

impl PageTable {
    /// Wrap an existing flat table.
    ///
    /// `num_pages` is the physical page count of the cache, `page_stride`
    /// the element distance between consecutive physical pages.
    pub fn from_flat(
        entries: Vec<i32>,
        batch_stride: usize,
        num_pages: usize,
        page_stride: i64,
    ) -> Result<Self> {
        if batch_stride == 0 {
            return Err(Error::InvalidArgument {
                arg: "batch_stride",
                reason: "must be > 0".into(),
            });
        }
        if entries.len() % batch_stride != 0 {
            return Err(Error::PageTableError {
                reason: format!(
                    "{} entries is not a whole number of rows of {batch_stride}",
                    entries.len()
                ),
            });
        }
        let batch_size = entries.len() / batch_stride;
        Self::build(entries, vec![batch_stride; batch_size], batch_stride, num_pages, page_stride)
    }

    fn build(
        entries: Vec<i32>,
        row_lens: Vec<usize>,
        batch_stride: usize,
        num_pages: usize,
        page_stride: i64,
    ) -> Result<Self> {
        let table = Self {
            batch_size: row_lens.len(),
            entries,
            row_lens,
            batch_stride,
            num_pages,
            page_stride,
        };
        table.validate()?;
        Ok(table)
    }

    /// Build from per-sequence rows, padding every row to the longest one.
    pub fn from_rows<R: AsRef<[i32]>>(
        rows: &[R],
        num_pages: usize,
        page_stride: i64,
    ) -> Result<Self> {
        let batch_stride = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0).max(1);
        let mut entries = Vec::with_capacity(rows.len() * batch_stride);
        let mut row_lens = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.as_ref();
            entries.extend_from_slice(row);
            entries.resize(entries.len() + batch_stride - row.len(), PAD_PAGE);
            row_lens.push(row.len());
        }
        debug!(
            batch_size = rows.len(),
            batch_stride, num_pages, "built page table from rows"
        );
        Self::build(entries, row_lens, batch_stride, num_pages, page_stride)
    }

    /// Build from per-sequence block tables sharing one page pool.
    ///
    /// `row_stride` is the element distance between rows inside a page, so
    /// one page spans `page_len * row_stride` elements.
    pub fn from_block_tables(
        tables: &[BlockTable],
        num_pages: usize,
        row_stride: i64,
    ) -> Result<Self> {
        let Some(page_len) = tables.first().map(BlockTable::page_len) else {
            return Err(Error::InvalidArgument {
                arg: "tables",
                reason: "at least one block table is required".into(),
            });
        };
        if let Some(t) = tables.iter().find(|t| t.page_len() != page_len) {
            return Err(Error::PageTableError {
                reason: format!("mixed page lengths: {page_len} and {}", t.page_len()),
            });
        }
        // Only the pages a walk visits go to the device.
        let rows = tables
            .iter()
            .map(|t| {
                let mut row = t.to_device_format()?;
                row.truncate(t.pages_needed());
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows.as_slice(), num_pages, page_len as i64 * row_stride)
    }

    /// Check every non-padding entry names a physical page of the cache.
    pub fn validate(&self) -> Result<()> {
        let rows = self.entries.chunks(self.batch_stride).zip(&self.row_lens);
        for (b, (row, &len)) in rows.enumerate() {
            if let Some((p, &page)) = row[..len]
                .iter()
                .enumerate()
                .find(|&(_, &page)| page < 0 || page as usize >= self.num_pages)
            {
                return Err(Error::PageTableError {
                    reason: format!(
                        "entry [{b}, {p}] = {page} outside cache of {} pages",
                        self.num_pages
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[i32] {
        &self.entries
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_stride(&self) -> usize {
        self.batch_stride
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn page_stride(&self) -> i64 {
        self.page_stride
    }

    pub fn row(&self, bidb: usize) -> Option<&[i32]> {
        let start = bidb.checked_mul(self.batch_stride)?;
        self.entries.get(start..start.checked_add(self.batch_stride)?)
    }

    /// Borrowed view for [`AddressingConfig`](crate::addressing::AddressingConfig).
    pub fn as_paged_cache(&self) -> PagedCache<'_> {
        PagedCache::new(&self.entries, self.batch_stride, self.page_stride)
    }
}
