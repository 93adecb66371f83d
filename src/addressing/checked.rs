//! Bounds-checked entry points for tests, debugging and host tooling.
//!
//! These validate every index the unchecked path would read and then call
//! it, so results are identical. Kernel-side code uses the `*_unchecked`
//! functions directly.

use std::ops::Range;

use super::block_info::BlockInfo;
use super::config::AddressingConfig;
use super::layout::{CacheLayout, KeyLayout, PagedCache, QueryLayout};
use super::walk::KeyBlockWalk;
use crate::error::{Error, Result};

impl PagedCache<'_> {
    /// Check that logical page `block` of `bidb` has a block table entry.
    pub fn check(&self, bidb: usize, block: usize) -> Result<()> {
        if block >= self.batch_stride {
            return Err(Error::IndexOutOfRange {
                what: "logical page",
                index: block as i64,
                len: self.batch_stride,
            });
        }
        let rows = self.block_table.len() / self.batch_stride;
        if bidb >= rows {
            return Err(Error::IndexOutOfRange {
                what: "block table row",
                index: i64::try_from(bidb).unwrap_or(i64::MAX),
                len: rows,
            });
        }
        Ok(())
    }
}

fn check_entry(what: &'static str, arr: &[i32], idx: usize) -> Result<i32> {
    arr.get(idx).copied().ok_or(Error::IndexOutOfRange {
        what,
        index: i64::try_from(idx).unwrap_or(i64::MAX),
        len: arr.len(),
    })
}

fn check_cumulative(what: &'static str, cu_seqlens: &[i32], bidb: usize) -> Result<()> {
    let start = check_entry(what, cu_seqlens, bidb)?;
    let end = check_entry(what, cu_seqlens, bidb.saturating_add(1))?;
    if start < 0 || end < start {
        return Err(Error::MalformedSeqlens {
            reason: format!("{what}[{bidb}..={}] = {start}..{end} is not a valid range", bidb + 1),
        });
    }
    Ok(())
}

impl<'a> BlockInfo<'a> {
    /// Checked [`new_unchecked`](Self::new_unchecked).
    pub fn try_new(cfg: &AddressingConfig<'a>, bidb: usize) -> Result<Self> {
        if let QueryLayout::Cumulative { cu_seqlens } = cfg.query {
            check_cumulative("cu_seqlens_q", cu_seqlens, bidb)?;
        }
        match cfg.key {
            KeyLayout::Padded { .. } => {}
            KeyLayout::Cumulative { cu_seqlens } => {
                check_cumulative("cu_seqlens_k", cu_seqlens, bidb)?;
            }
            KeyLayout::Lengths { seqlens } => {
                let len = check_entry("seqlens_k", seqlens, bidb)?;
                if len < 0 {
                    return Err(Error::MalformedSeqlens {
                        reason: format!("seqlens_k[{bidb}] = {len} is negative"),
                    });
                }
            }
        }
        if cfg.new_key_len() < 0 {
            return Err(Error::InvalidArgument {
                arg: "seqlen_knew",
                reason: format!("must be >= 0, got {}", cfg.new_key_len()),
            });
        }
        // SAFETY: every index read by construction was checked above.
        Ok(unsafe { Self::new_unchecked(cfg, bidb) })
    }

    /// Checked [`paged_key_offset_unchecked`](Self::paged_key_offset_unchecked).
    pub fn try_paged_key_offset(
        &self,
        batch_stride: i64,
        row_stride: i64,
        bidb: usize,
        block: usize,
        page_len: i64,
    ) -> Result<i64> {
        if let CacheLayout::Paged(pages) = self.cache() {
            pages.check(bidb, block)?;
        }
        // SAFETY: table entry checked above.
        Ok(unsafe {
            self.paged_key_offset_unchecked(batch_stride, row_stride, bidb, block, page_len)
        })
    }

    /// Checked [`paged_key_advance_unchecked`](Self::paged_key_advance_unchecked).
    pub fn try_paged_key_advance(
        &self,
        bidb: usize,
        current_block: usize,
        row_stride: i64,
        page_len: i64,
    ) -> Result<i64> {
        if let CacheLayout::Paged(pages) = self.cache() {
            if current_block == 0 {
                return Err(Error::InvalidArgument {
                    arg: "current_block",
                    reason: "cannot advance before logical page 0".into(),
                });
            }
            pages.check(bidb, current_block)?;
        }
        // SAFETY: both table entries checked above.
        Ok(unsafe { self.paged_key_advance_unchecked(bidb, current_block, row_stride, page_len) })
    }

    /// Checked [`key_blocks_unchecked`](Self::key_blocks_unchecked).
    pub fn try_key_blocks(
        &self,
        batch_stride: i64,
        row_stride: i64,
        bidb: usize,
        page_len: usize,
    ) -> Result<KeyBlockWalk<'_, 'a>> {
        let blocks = 0..self.num_key_blocks(page_len)?;
        KeyBlockWalk::try_new(self, batch_stride, row_stride, bidb, page_len as i64, blocks)
    }
}

impl<'i, 'a> KeyBlockWalk<'i, 'a> {
    /// Checked [`new_unchecked`](Self::new_unchecked).
    pub fn try_new(
        info: &'i BlockInfo<'a>,
        batch_stride: i64,
        row_stride: i64,
        bidb: usize,
        page_len: i64,
        blocks: Range<usize>,
    ) -> Result<Self> {
        if let (CacheLayout::Paged(pages), false) = (info.cache(), blocks.is_empty()) {
            pages.check(bidb, blocks.start)?;
            pages.check(bidb, blocks.end - 1)?;
        }
        // SAFETY: both ends of the range are in the table row, so is everything between.
        Ok(unsafe {
            Self::new_unchecked(info, batch_stride, row_stride, bidb, page_len, blocks)
        })
    }
}
