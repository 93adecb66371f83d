//! Host-side launch parameters.
//!
//! Owned, serializable form of everything [`AddressingConfig`] borrows.
//! Field names follow the kernel parameter struct so a host can dump and
//! reload the exact arguments of a launch.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::addressing::{AddressingConfig, BlockInfo, KeyLayout, PagedCache, QueryLayout};
use crate::error::{Error, Result};
use crate::seqlens::{validate_cumulative, validate_lengths};

/// Addressing parameters of one attention launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchParams {
    pub batch_size: usize,

    /// Padded query length, used when `cu_seqlens_q` is absent.
    pub seqlen_q: i32,

    /// Padded key length, used when `cu_seqlens_k` is absent.
    pub seqlen_k: i32,

    #[serde(default)]
    pub cu_seqlens_q: Option<Vec<i32>>,

    #[serde(default)]
    pub cu_seqlens_k: Option<Vec<i32>>,

    /// When false, `cu_seqlens_k` holds per-sequence cached lengths.
    #[serde(default = "default_seqlens_k_cumulative")]
    pub is_seqlens_k_cumulative: bool,

    /// Rows appended to the cache by this launch
    #[serde(default)]
    pub seqlen_knew: Option<i32>,

    /// Flat `[batch_size, block_table_batch_stride]` page table
    #[serde(default)]
    pub block_table: Option<Vec<i32>>,

    #[serde(default)]
    pub block_table_batch_stride: usize,

    /// Elements per physical cache page
    #[serde(default)]
    pub cache_block_stride: i64,

    /// Physical pages in the cache, for page table validation
    #[serde(default)]
    pub num_cache_blocks: Option<usize>,

    /// Rows per cache page, for checking the table covers every key row
    #[serde(default)]
    pub page_len: Option<usize>,
}

fn default_seqlens_k_cumulative() -> bool {
    true
}

impl LaunchParams {
    /// Padded, contiguous launch.
    pub fn padded(batch_size: usize, seqlen_q: i32, seqlen_k: i32) -> Self {
        Self {
            batch_size,
            seqlen_q,
            seqlen_k,
            cu_seqlens_q: None,
            cu_seqlens_k: None,
            is_seqlens_k_cumulative: true,
            seqlen_knew: None,
            block_table: None,
            block_table_batch_stride: 0,
            cache_block_stride: 0,
            num_cache_blocks: None,
            page_len: None,
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(content).map_err(|e| Error::ConfigError {
            reason: format!("JSON parse error: {e}"),
        })?;
        params.validate()?;
        Ok(params)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigError {
            reason: format!("IO error reading {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "loading launch params");
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ConfigError {
            reason: format!("JSON serialize error: {e}"),
        })
    }

    /// Check the caller contract once, so per-element addressing can skip it.
    pub fn validate(&self) -> Result<()> {
        if self.seqlen_q < 0 || self.seqlen_k < 0 {
            return Err(Error::ConfigError {
                reason: format!(
                    "padded lengths must be >= 0, got seqlen_q={} seqlen_k={}",
                    self.seqlen_q, self.seqlen_k
                ),
            });
        }
        if let Some(knew) = self.seqlen_knew {
            if knew < 0 {
                return Err(Error::ConfigError {
                    reason: format!("seqlen_knew must be >= 0, got {knew}"),
                });
            }
        }
        if let Some(cu) = &self.cu_seqlens_q {
            validate_cumulative(cu, self.batch_size)?;
        }
        match (&self.cu_seqlens_k, self.is_seqlens_k_cumulative) {
            (Some(cu), true) => validate_cumulative(cu, self.batch_size)?,
            (Some(seqlens), false) => validate_lengths(seqlens, self.batch_size)?,
            (None, _) => {}
        }
        if let Some(table) = &self.block_table {
            self.validate_block_table(table)?;
        }
        debug!(
            batch_size = self.batch_size,
            varlen_q = self.cu_seqlens_q.is_some(),
            varlen_k = self.cu_seqlens_k.is_some(),
            paged = self.block_table.is_some(),
            "launch params validated"
        );
        Ok(())
    }

    fn validate_block_table(&self, table: &[i32]) -> Result<()> {
        let stride = self.block_table_batch_stride;
        if stride == 0 {
            return Err(Error::ConfigError {
                reason: "block_table_batch_stride must be > 0 with a block table".into(),
            });
        }
        if self.cache_block_stride <= 0 {
            return Err(Error::ConfigError {
                reason: format!(
                    "cache_block_stride must be > 0, got {}",
                    self.cache_block_stride
                ),
            });
        }
        let Some(required) = self.batch_size.checked_mul(stride) else {
            return Err(Error::ConfigError {
                reason: format!(
                    "batch_size {} times block_table_batch_stride {stride} overflows",
                    self.batch_size
                ),
            });
        };
        if table.len() < required {
            return Err(Error::PageTableError {
                reason: format!(
                    "{} entries cannot hold {} rows of {stride}",
                    table.len(),
                    self.batch_size
                ),
            });
        }
        if let Some(num_blocks) = self.num_cache_blocks {
            if let Some(i) = table
                .iter()
                .position(|&p| p < 0 || p as usize >= num_blocks)
            {
                return Err(Error::PageTableError {
                    reason: format!(
                        "entry {i} = {} outside cache of {num_blocks} pages",
                        table[i]
                    ),
                });
            }
        }
        if let Some(page_len) = self.page_len {
            if page_len == 0 {
                return Err(Error::ConfigError {
                    reason: "page_len must be > 0".into(),
                });
            }
            let cfg = self.config();
            for bidb in 0..self.batch_size {
                let needed = BlockInfo::try_new(&cfg, bidb)?.num_key_blocks(page_len)?;
                if needed > stride {
                    return Err(Error::PageTableError {
                        reason: format!(
                            "sequence {bidb} needs {needed} pages, table rows hold {stride}"
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Borrowed addressing view of these parameters.
    pub fn config(&self) -> AddressingConfig<'_> {
        let mut cfg = AddressingConfig {
            query: QueryLayout::from_raw(self.cu_seqlens_q.as_deref(), self.seqlen_q),
            key: KeyLayout::from_raw(
                self.cu_seqlens_k.as_deref(),
                self.is_seqlens_k_cumulative,
                self.seqlen_k,
            ),
            seqlen_knew: self.seqlen_knew,
            cache: Default::default(),
        };
        if let Some(table) = &self.block_table {
            cfg = cfg.with_paged_cache(PagedCache::new(
                table,
                self.block_table_batch_stride,
                self.cache_block_stride,
            ));
        }
        cfg
    }
}
