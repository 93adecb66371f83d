//! Host-side page bookkeeping for paged KV caches.
//!
//! Pages are only identified here; allocating and freeing them belongs to
//! whoever owns the cache.

pub mod block_table;
pub mod page_table;

pub use block_table::BlockTable;
pub use page_table::PageTable;

/// Physical page index within the cache pool
pub type PageId = u32;
