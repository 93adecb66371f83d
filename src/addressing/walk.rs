//! Backward scan over the key blocks of one batch element.
//!
//! Attention kernels visit key blocks from the end of the sequence towards
//! the start: the first offset comes from a direct lookup, every later one
//! from the advance delta of the page being left.

use std::iter::FusedIterator;
use std::ops::Range;

use super::block_info::BlockInfo;

/// Iterator yielding `(logical_block, element_offset)` in decreasing block order.
#[derive(Debug, Clone)]
pub struct KeyBlockWalk<'i, 'a> {
    info: &'i BlockInfo<'a>,
    bidb: usize,
    row_stride: i64,
    page_len: i64,
    n_block_min: usize,
    next: Option<(usize, i64)>,
}

impl<'i, 'a> KeyBlockWalk<'i, 'a> {
    /// Walk logical blocks `blocks.end - 1` down to `blocks.start`.
    ///
    /// # Safety
    ///
    /// For a paged cache every logical block in `blocks` must be within the
    /// block table row of `bidb`.
    pub unsafe fn new_unchecked(
        info: &'i BlockInfo<'a>,
        batch_stride: i64,
        row_stride: i64,
        bidb: usize,
        page_len: i64,
        blocks: Range<usize>,
    ) -> Self {
        let next = if blocks.is_empty() {
            None
        } else {
            let last = blocks.end - 1;
            // SAFETY: `last` is in `blocks`.
            let offset = unsafe {
                info.paged_key_offset_unchecked(batch_stride, row_stride, bidb, last, page_len)
            };
            Some((last, offset))
        };
        Self {
            info,
            bidb,
            row_stride,
            page_len,
            n_block_min: blocks.start,
            next,
        }
    }
}

impl Iterator for KeyBlockWalk<'_, '_> {
    type Item = (usize, i64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (block, offset) = self.next?;
        self.next = if block > self.n_block_min {
            // SAFETY: `block` and `block - 1` are both in the range checked at construction.
            let delta = unsafe {
                self.info
                    .paged_key_advance_unchecked(self.bidb, block, self.row_stride, self.page_len)
            };
            Some((block - 1, offset + delta))
        } else {
            None
        };
        Some((block, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.next.map_or(0, |(block, _)| block - self.n_block_min + 1);
        (n, Some(n))
    }
}

impl ExactSizeIterator for KeyBlockWalk<'_, '_> {}

impl FusedIterator for KeyBlockWalk<'_, '_> {}

impl<'a> BlockInfo<'a> {
    /// Walk every key block of `bidb`, last block first.
    ///
    /// # Safety
    ///
    /// `page_len` must be non-zero. For a paged cache the block table row of
    /// `bidb` must hold at least [`num_key_blocks`](Self::num_key_blocks)
    /// entries.
    pub unsafe fn key_blocks_unchecked(
        &self,
        batch_stride: i64,
        row_stride: i64,
        bidb: usize,
        page_len: usize,
    ) -> KeyBlockWalk<'_, 'a> {
        let blocks = 0..self.key_blocks_of(page_len);
        // SAFETY: forwarded to the caller.
        unsafe {
            KeyBlockWalk::new_unchecked(
                self,
                batch_stride,
                row_stride,
                bidb,
                page_len as i64,
                blocks,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{AddressingConfig, PagedCache};

    #[test]
    fn test_contiguous_walk_descends_by_page() {
        let cfg = AddressingConfig::padded(1, 40);
        let bi = unsafe { BlockInfo::new_unchecked(&cfg, 1) };
        let walk: Vec<_> = unsafe { bi.key_blocks_unchecked(10_000, 4, 1, 16) }.collect();
        assert_eq!(
            walk,
            vec![(2, 10_000 + 128), (1, 10_000 + 64), (0, 10_000)]
        );
    }

    #[test]
    fn test_paged_walk_follows_table() {
        let table = [2, 0, 1, 1, 2, 0];
        let cfg = AddressingConfig::padded(1, 48).with_paged_cache(PagedCache::new(&table, 3, 64));
        let bi = unsafe { BlockInfo::new_unchecked(&cfg, 1) };
        let walk: Vec<_> = unsafe { bi.key_blocks_unchecked(0, 4, 1, 16) }.collect();
        assert_eq!(walk, vec![(2, 0), (1, 128), (0, 64)]);
    }

    #[test]
    fn test_partial_range_and_size_hint() {
        let cfg = AddressingConfig::padded(1, 128);
        let bi = unsafe { BlockInfo::new_unchecked(&cfg, 0) };
        let mut walk = unsafe { KeyBlockWalk::new_unchecked(&bi, 0, 1, 0, 16, 2..5) };
        assert_eq!(walk.len(), 3);
        assert_eq!(walk.next(), Some((4, 64)));
        assert_eq!(walk.len(), 2);
        assert_eq!(walk.by_ref().last(), Some((2, 32)));
        assert_eq!(walk.next(), None);
    }

    #[test]
    fn test_empty_walk() {
        let cfg = AddressingConfig::padded(1, 0);
        let bi = unsafe { BlockInfo::new_unchecked(&cfg, 0) };
        let mut walk = unsafe { bi.key_blocks_unchecked(0, 1, 0, 16) };
        assert_eq!(walk.len(), 0);
        assert_eq!(walk.next(), None);
    }
}
