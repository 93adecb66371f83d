//! Reference gathers over a KV cache buffer.
//!
//! Copies the key rows of a batch element out of a contiguous or paged cache
//! into a dense `[total_key_len, row_width]` buffer, following exactly the
//! offsets an attention kernel would visit. Used to check addressing end to
//! end against a layout built independently on the host.

use rayon::prelude::*;
use tracing::trace;

use crate::addressing::{AddressingConfig, BlockInfo};
use crate::error::{Error, Result};

/// Strides of the cache buffer being gathered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStrides {
    /// Elements between batch slots of a contiguous cache.
    pub batch_stride: i64,
    /// Elements between consecutive rows.
    pub row_stride: i64,
    /// Rows per page / key block.
    pub page_len: usize,
    /// Elements copied per row.
    pub row_width: usize,
}

/// Gather the `total_key_len` rows of batch element `bidb`.
pub fn gather_key_rows<T: Copy>(
    cache: &[T],
    info: &BlockInfo<'_>,
    bidb: usize,
    strides: CacheStrides,
) -> Result<Vec<T>> {
    let total = info.total_key_len().max(0) as usize;
    let width = strides.row_width;
    let mut out = Vec::with_capacity(total * width);
    // The walk runs last block first.
    let mut blocks: Vec<(usize, i64)> = info
        .try_key_blocks(strides.batch_stride, strides.row_stride, bidb, strides.page_len)?
        .collect();
    blocks.reverse();

    for (block, offset) in blocks {
        let first_row = block * strides.page_len;
        let rows = strides.page_len.min(total - first_row);
        for r in 0..rows {
            let start = offset + r as i64 * strides.row_stride;
            let row = usize::try_from(start)
                .ok()
                .and_then(|s| cache.get(s..s + width))
                .ok_or(Error::IndexOutOfRange {
                    what: "cache row",
                    index: start,
                    len: cache.len(),
                })?;
            out.extend_from_slice(row);
        }
        trace!(bidb, block, offset, rows, "gathered key block");
    }
    Ok(out)
}

/// Gather every batch element in parallel, one [`BlockInfo`] per element.
pub fn gather_batch<T: Copy + Send + Sync>(
    cache: &[T],
    cfg: &AddressingConfig<'_>,
    batch_size: usize,
    strides: CacheStrides,
) -> Result<Vec<Vec<T>>> {
    (0..batch_size)
        .into_par_iter()
        .map(|bidb| {
            let info = BlockInfo::try_new(cfg, bidb)?;
            gather_key_rows(cache, &info, bidb, strides)
        })
        .collect()
}
