//! Page list of one sequence in a shared KV cache pool.

use super::PageId;
use crate::error::{Error, Result};

/// Physical pages holding one sequence's key rows, in logical order.
///
/// Always covers its rows: `pages.len() >= ceil(num_rows / page_len)`.
/// Trailing pages past that are reserved capacity and never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTable {
    pages: Vec<PageId>,
    num_rows: usize,
    page_len: usize,
}

impl BlockTable {
    pub fn new(page_len: usize, pages: Vec<PageId>, num_rows: usize) -> Result<Self> {
        if page_len == 0 {
            return Err(Error::InvalidArgument {
                arg: "page_len",
                reason: "must be > 0".into(),
            });
        }
        let needed = num_rows.div_ceil(page_len);
        if pages.len() < needed {
            return Err(Error::PageTableError {
                reason: format!(
                    "{num_rows} rows need {needed} pages of {page_len}, got {}",
                    pages.len()
                ),
            });
        }
        Ok(Self {
            pages,
            num_rows,
            page_len,
        })
    }

    pub fn pages(&self) -> &[PageId] {
        &self.pages
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn page_len(&self) -> usize {
        self.page_len
    }

    /// Pages a kernel walk actually visits.
    pub fn pages_needed(&self) -> usize {
        self.num_rows.div_ceil(self.page_len)
    }

    /// Page ids as the `i32` entries of a kernel block table row.
    pub fn to_device_format(&self) -> Result<Vec<i32>> {
        self.pages
            .iter()
            .map(|&p| {
                i32::try_from(p).map_err(|_| Error::PageTableError {
                    reason: format!("page id {p} does not fit a device table entry"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_coverage() {
        let table = BlockTable::new(16, vec![4, 9], 17).unwrap();
        assert_eq!(table.pages_needed(), 2);
        assert_eq!(table.num_rows(), 17);

        let err = BlockTable::new(16, vec![4], 17).unwrap_err();
        assert!(matches!(err, Error::PageTableError { .. }));
        assert!(matches!(
            BlockTable::new(0, vec![4], 1),
            Err(Error::InvalidArgument { arg: "page_len", .. })
        ));
    }

    #[test]
    fn test_reserved_pages_are_not_needed() {
        // A decode step reserves the next page before writing to it.
        let table = BlockTable::new(4, vec![7, 2, 5], 8).unwrap();
        assert_eq!(table.pages_needed(), 2);
        assert_eq!(table.pages(), &[7, 2, 5]);

        let empty = BlockTable::new(4, Vec::new(), 0).unwrap();
        assert_eq!(empty.pages_needed(), 0);
    }

    #[test]
    fn test_device_format() {
        let table = BlockTable::new(8, vec![3, 0, 11], 20).unwrap();
        assert_eq!(table.to_device_format().unwrap(), vec![3, 0, 11]);

        let table = BlockTable::new(8, vec![0, PageId::MAX], 9).unwrap();
        assert!(table.to_device_format().is_err());
    }
}
