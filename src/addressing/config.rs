//! Read-only addressing configuration shared by every batch element.

use super::layout::{CacheLayout, KeyLayout, PagedCache, QueryLayout};

/// Borrowed view of the addressing parameters of one kernel invocation.
///
/// Built once by the host and shared read-only by every [`BlockInfo`]; it is
/// `Copy` and `Sync` so workers can hold their own copy of the view.
///
/// [`BlockInfo`]: super::BlockInfo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressingConfig<'a> {
    pub query: QueryLayout<'a>,
    pub key: KeyLayout<'a>,
    /// Rows appended to the cache by this invocation (incremental decoding).
    pub seqlen_knew: Option<i32>,
    pub cache: CacheLayout<'a>,
}

impl<'a> AddressingConfig<'a> {
    /// Fully padded, contiguous configuration.
    pub fn padded(seqlen_q: i32, seqlen_k: i32) -> Self {
        Self {
            query: QueryLayout::Padded { seqlen: seqlen_q },
            key: KeyLayout::Padded { seqlen: seqlen_k },
            seqlen_knew: None,
            cache: CacheLayout::Contiguous,
        }
    }

    pub fn with_query(mut self, query: QueryLayout<'a>) -> Self {
        self.query = query;
        self
    }

    pub fn with_key(mut self, key: KeyLayout<'a>) -> Self {
        self.key = key;
        self
    }

    pub fn with_new_keys(mut self, seqlen_knew: i32) -> Self {
        self.seqlen_knew = Some(seqlen_knew);
        self
    }

    pub fn with_paged_cache(mut self, pages: PagedCache<'a>) -> Self {
        self.cache = CacheLayout::Paged(pages);
        self
    }

    /// Number of newly appended key rows, zero when absent.
    #[inline(always)]
    pub fn new_key_len(&self) -> i32 {
        self.seqlen_knew.unwrap_or(0)
    }
}
