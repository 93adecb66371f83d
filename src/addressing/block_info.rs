//! Per-batch-element sequence lengths and KV cache offsets.
//!
//! One [`BlockInfo`] is built per batch index when a worker starts on that
//! element, queried for row offsets and for every cache page it visits, then
//! dropped. Nothing here checks indices: construction and the paged
//! accessors are `unsafe` and rely on the launch configuration being valid.
//! See [`checked`](super::checked) for validating wrappers.

use super::config::AddressingConfig;
use super::layout::{CacheLayout, KeyLayout, PADDED_BASE, QueryLayout, load};
use crate::error::{Error, Result};

/// Resolved addressing for a single batch element.
///
/// All offsets are in elements, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo<'a> {
    sum_s_q: i32,
    sum_s_k: i32,
    actual_seqlen_q: i32,
    seqlen_k_cache: i32,
    actual_seqlen_k: i32,
    cache: CacheLayout<'a>,
}

impl<'a> BlockInfo<'a> {
    /// Resolve lengths and base offsets of batch element `bidb`.
    ///
    /// # Safety
    ///
    /// Every array in `cfg` must cover `bidb`: cumulative arrays need index
    /// `bidb + 1`, length arrays need index `bidb`.
    #[inline]
    pub unsafe fn new_unchecked(cfg: &AddressingConfig<'a>, bidb: usize) -> Self {
        // SAFETY (all loads below): array extent is guaranteed by the caller.
        let sum_s_q = match cfg.query {
            QueryLayout::Padded { .. } => PADDED_BASE,
            QueryLayout::Cumulative { cu_seqlens } => unsafe { load(cu_seqlens, bidb) },
        };
        // A length array is never a base offset.
        let sum_s_k = match cfg.key {
            KeyLayout::Cumulative { cu_seqlens } => unsafe { load(cu_seqlens, bidb) },
            KeyLayout::Padded { .. } | KeyLayout::Lengths { .. } => PADDED_BASE,
        };
        let actual_seqlen_q = match cfg.query {
            QueryLayout::Padded { seqlen } => seqlen,
            QueryLayout::Cumulative { cu_seqlens } => {
                unsafe { load(cu_seqlens, bidb + 1) - sum_s_q }
            }
        };
        // Needs sum_s_k resolved first.
        let seqlen_k_cache = match cfg.key {
            KeyLayout::Padded { seqlen } => seqlen,
            KeyLayout::Cumulative { cu_seqlens } => {
                unsafe { load(cu_seqlens, bidb + 1) - sum_s_k }
            }
            KeyLayout::Lengths { seqlens } => unsafe { load(seqlens, bidb) },
        };
        // Needs seqlen_k_cache resolved first.
        let actual_seqlen_k = seqlen_k_cache + cfg.new_key_len();

        debug_assert!(actual_seqlen_q >= 0, "negative query length {actual_seqlen_q}");
        debug_assert!(
            actual_seqlen_k >= seqlen_k_cache && seqlen_k_cache >= 0,
            "bad key lengths: cached {seqlen_k_cache}, total {actual_seqlen_k}"
        );

        Self {
            sum_s_q,
            sum_s_k,
            actual_seqlen_q,
            seqlen_k_cache,
            actual_seqlen_k,
            cache: cfg.cache,
        }
    }

    /// Fixed-length specialisation: every element is a padded slot of
    /// `seqlen_q` query rows and `seqlen_k` cached key rows.
    ///
    /// The query and key layouts of `cfg` are never read, even when they
    /// carry cumulative or length arrays; only the new-key length and the
    /// cache layout are taken from it. Kernels built for fixed-length batches
    /// use this instead of [`new_unchecked`](Self::new_unchecked) and carry
    /// no per-element layout dispatch.
    #[inline]
    pub fn new_padded(cfg: &AddressingConfig<'a>, seqlen_q: i32, seqlen_k: i32) -> Self {
        let actual_seqlen_k = seqlen_k + cfg.new_key_len();
        debug_assert!(seqlen_q >= 0, "negative query length {seqlen_q}");
        debug_assert!(
            actual_seqlen_k >= seqlen_k && seqlen_k >= 0,
            "bad key lengths: cached {seqlen_k}, total {actual_seqlen_k}"
        );
        Self {
            sum_s_q: PADDED_BASE,
            sum_s_k: PADDED_BASE,
            actual_seqlen_q: seqlen_q,
            seqlen_k_cache: seqlen_k,
            actual_seqlen_k,
            cache: cfg.cache,
        }
    }

    /// Packed start row of the query sequence, [`PADDED_BASE`] when padded.
    pub fn query_base_offset(&self) -> i32 {
        self.sum_s_q
    }

    /// Packed start row of the key sequence, [`PADDED_BASE`] when padded or
    /// when keys are described by per-sequence lengths.
    pub fn key_base_offset(&self) -> i32 {
        self.sum_s_k
    }

    pub fn actual_query_len(&self) -> i32 {
        self.actual_seqlen_q
    }

    /// Key rows already resident in the cache.
    pub fn cached_key_len(&self) -> i32 {
        self.seqlen_k_cache
    }

    /// Cached key rows plus the rows appended by this invocation.
    pub fn total_key_len(&self) -> i32 {
        self.actual_seqlen_k
    }

    pub fn cache(&self) -> &CacheLayout<'a> {
        &self.cache
    }

    /// Number of `page_len`-row key blocks covering [`total_key_len`](Self::total_key_len).
    pub fn num_key_blocks(&self, page_len: usize) -> Result<usize> {
        if page_len == 0 {
            return Err(Error::InvalidArgument {
                arg: "page_len",
                reason: "must be > 0".into(),
            });
        }
        Ok(self.key_blocks_of(page_len))
    }

    /// `page_len` must be non-zero.
    #[inline(always)]
    pub(crate) fn key_blocks_of(&self, page_len: usize) -> usize {
        debug_assert!(page_len > 0, "page_len must be > 0");
        (self.actual_seqlen_k.max(0) as usize).div_ceil(page_len)
    }

    /// Element offset of the first query row of `bidb`.
    #[inline(always)]
    pub fn query_row_offset(&self, batch_stride: i64, row_stride: i64, bidb: usize) -> i64 {
        row_offset(self.sum_s_q, batch_stride, row_stride, bidb)
    }

    /// Element offset of the first key row of `bidb` in a contiguous cache.
    #[inline(always)]
    pub fn key_row_offset(&self, batch_stride: i64, row_stride: i64, bidb: usize) -> i64 {
        row_offset(self.sum_s_k, batch_stride, row_stride, bidb)
    }

    /// Element offset of logical key page `block` of `bidb`.
    ///
    /// Contiguous caches place pages back to back after the key row offset;
    /// paged caches look the physical page up in the block table and ignore
    /// the strides.
    ///
    /// # Safety
    ///
    /// For a paged cache, `bidb * batch_stride + block` must be within the
    /// block table.
    #[inline(always)]
    pub unsafe fn paged_key_offset_unchecked(
        &self,
        batch_stride: i64,
        row_stride: i64,
        bidb: usize,
        block: usize,
        page_len: i64,
    ) -> i64 {
        match self.cache {
            CacheLayout::Contiguous => {
                self.key_row_offset(batch_stride, row_stride, bidb)
                    + block as i64 * page_len * row_stride
            }
            // SAFETY: forwarded to the caller.
            CacheLayout::Paged(pages) => unsafe { pages.physical_offset_unchecked(bidb, block) },
        }
    }

    /// Signed delta moving from logical page `current_block` to `current_block - 1`.
    ///
    /// Adjacent logical pages need not be adjacent physically, so for a paged
    /// cache the delta is looked up again at every step.
    ///
    /// # Safety
    ///
    /// For a paged cache, `current_block >= 1` and both
    /// `bidb * batch_stride + current_block` and the entry before it must be
    /// within the block table.
    #[inline(always)]
    pub unsafe fn paged_key_advance_unchecked(
        &self,
        bidb: usize,
        current_block: usize,
        row_stride: i64,
        page_len: i64,
    ) -> i64 {
        match self.cache {
            CacheLayout::Contiguous => -(page_len * row_stride),
            CacheLayout::Paged(pages) => {
                debug_assert!(current_block > 0, "cannot advance before logical page 0");
                // SAFETY: forwarded to the caller.
                unsafe {
                    pages.physical_offset_unchecked(bidb, current_block - 1)
                        - pages.physical_offset_unchecked(bidb, current_block)
                }
            }
        }
    }
}

#[inline(always)]
fn row_offset(base: i32, batch_stride: i64, row_stride: i64, bidb: usize) -> i64 {
    if base == PADDED_BASE {
        bidb as i64 * batch_stride
    } else {
        base as i64 * row_stride
    }
}
