//! Host-side helpers for cumulative sequence length arrays.
//!
//! `cu_seqlens[0] = 0`, `cu_seqlens[i] = sum of lengths for sequences 0..i-1`.
//! For batch `[512, 300, 128]`: `cu_seqlens = [0, 512, 812, 940]`.

use crate::error::{Error, Result};

/// Prefix sum of per-sequence lengths with a leading zero.
pub fn cumulative_from_lengths(lengths: &[i32]) -> Result<Vec<i32>> {
    let mut cu = Vec::with_capacity(lengths.len() + 1);
    let mut total = 0i32;
    cu.push(total);
    for (i, &len) in lengths.iter().enumerate() {
        if len < 0 {
            return Err(Error::MalformedSeqlens {
                reason: format!("length {i} is negative ({len})"),
            });
        }
        total = total.checked_add(len).ok_or_else(|| Error::MalformedSeqlens {
            reason: format!("cumulative length overflows i32 at sequence {i}"),
        })?;
        cu.push(total);
    }
    Ok(cu)
}

/// Cumulative offsets of `batch_size` sequences padded to `seqlen` each.
pub fn padded_cumulative(batch_size: usize, seqlen: i32) -> Result<Vec<i32>> {
    if seqlen < 0 {
        return Err(Error::InvalidArgument {
            arg: "seqlen",
            reason: format!("must be >= 0, got {seqlen}"),
        });
    }
    cumulative_from_lengths(&vec![seqlen; batch_size])
}

/// Per-sequence lengths recovered from cumulative offsets.
pub fn lengths_from_cumulative(cu_seqlens: &[i32]) -> Vec<i32> {
    cu_seqlens.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Check that `cu_seqlens` addresses `batch_size` sequences.
pub fn validate_cumulative(cu_seqlens: &[i32], batch_size: usize) -> Result<()> {
    let needed = batch_size.checked_add(1).ok_or_else(|| Error::MalformedSeqlens {
        reason: format!("batch size {batch_size} has no cumulative offset array"),
    })?;
    if cu_seqlens.len() < needed {
        return Err(Error::MalformedSeqlens {
            reason: format!(
                "need {needed} cumulative offsets for batch size {batch_size}, got {}",
                cu_seqlens.len()
            ),
        });
    }
    let used = &cu_seqlens[..needed];
    if used[0] < 0 {
        return Err(Error::MalformedSeqlens {
            reason: format!("first offset is negative ({})", used[0]),
        });
    }
    if let Some(i) = used.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::MalformedSeqlens {
            reason: format!(
                "offsets decrease at {}: {} -> {}",
                i + 1,
                used[i],
                used[i + 1]
            ),
        });
    }
    Ok(())
}

/// Check that `seqlens` holds a non-negative length for each of `batch_size` sequences.
pub fn validate_lengths(seqlens: &[i32], batch_size: usize) -> Result<()> {
    if seqlens.len() < batch_size {
        return Err(Error::MalformedSeqlens {
            reason: format!(
                "need {batch_size} lengths, got {}",
                seqlens.len()
            ),
        });
    }
    if let Some(i) = seqlens[..batch_size].iter().position(|&l| l < 0) {
        return Err(Error::MalformedSeqlens {
            reason: format!("length {i} is negative ({})", seqlens[i]),
        });
    }
    Ok(())
}
