//! Addressing modes for queries, keys and the KV cache.
//!
//! Kernel launch parameters describe these modes with nullable pointers and a
//! side flag (`cu_seqlens_k` + `is_seqlens_k_cumulative`). Here each mode is a
//! variant, so a per-sequence length array can never be read as running
//! offsets or the other way round.

/// Base offset signalling "padded: address by `batch_index * batch_stride`".
pub const PADDED_BASE: i32 = -1;

/// Where the query rows of each batch element live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLayout<'a> {
    /// Every batch element occupies a fixed slot of `seqlen` rows.
    Padded { seqlen: i32 },
    /// Packed sequences: rows of element `b` are `cu_seqlens[b]..cu_seqlens[b + 1]`.
    Cumulative { cu_seqlens: &'a [i32] },
}

impl<'a> QueryLayout<'a> {
    /// Map the launch-parameter form (nullable `cu_seqlens_q`) onto a layout.
    pub fn from_raw(cu_seqlens: Option<&'a [i32]>, seqlen: i32) -> Self {
        match cu_seqlens {
            Some(cu_seqlens) => Self::Cumulative { cu_seqlens },
            None => Self::Padded { seqlen },
        }
    }
}

/// Where the cached key/value rows of each batch element live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout<'a> {
    /// Every batch element occupies a fixed slot of `seqlen` rows.
    Padded { seqlen: i32 },
    /// Packed sequences: rows of element `b` are `cu_seqlens[b]..cu_seqlens[b + 1]`.
    Cumulative { cu_seqlens: &'a [i32] },
    /// `seqlens[b]` is the cached length of element `b`. Rows stay in fixed
    /// batch slots, so addressing is the same as [`KeyLayout::Padded`].
    Lengths { seqlens: &'a [i32] },
}

impl<'a> KeyLayout<'a> {
    /// Map the launch-parameter form (nullable `cu_seqlens_k` plus the
    /// `is_seqlens_k_cumulative` flag) onto a layout.
    pub fn from_raw(cu_seqlens: Option<&'a [i32]>, is_cumulative: bool, seqlen: i32) -> Self {
        match cu_seqlens {
            Some(cu_seqlens) if is_cumulative => Self::Cumulative { cu_seqlens },
            Some(seqlens) => Self::Lengths { seqlens },
            None => Self::Padded { seqlen },
        }
    }
}

/// Physical storage of the key/value cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheLayout<'a> {
    /// One contiguous buffer; pages are `page_len * row_stride` apart.
    #[default]
    Contiguous,
    /// Fixed-size pages reached through a per-batch block table.
    Paged(PagedCache<'a>),
}

impl CacheLayout<'_> {
    pub fn is_paged(&self) -> bool {
        matches!(self, Self::Paged(_))
    }
}

/// Block table indirection for a paged cache.
///
/// `block_table[b * batch_stride + p]` is the physical page holding logical
/// page `p` of batch element `b`; the page starts `page_stride` elements
/// after the previous physical page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagedCache<'a> {
    pub block_table: &'a [i32],
    pub batch_stride: usize,
    pub page_stride: i64,
}

impl<'a> PagedCache<'a> {
    pub fn new(block_table: &'a [i32], batch_stride: usize, page_stride: i64) -> Self {
        Self {
            block_table,
            batch_stride,
            page_stride,
        }
    }

    /// Element offset of the physical page behind logical page `block` of `bidb`.
    ///
    /// # Safety
    ///
    /// `bidb * batch_stride + block` must be within `block_table`.
    #[inline(always)]
    pub unsafe fn physical_offset_unchecked(&self, bidb: usize, block: usize) -> i64 {
        // SAFETY: forwarded to the caller.
        let page = unsafe { load(self.block_table, bidb * self.batch_stride + block) };
        page as i64 * self.page_stride
    }
}

/// Unchecked read from a shared parameter array.
///
/// # Safety
///
/// `idx < arr.len()`.
#[inline(always)]
pub(crate) unsafe fn load(arr: &[i32], idx: usize) -> i32 {
    debug_assert!(
        idx < arr.len(),
        "index {idx} out of range for array of len {}",
        arr.len()
    );
    // SAFETY: forwarded to the caller.
    unsafe { *arr.get_unchecked(idx) }
}
