//! Per-batch addressing for packed and paged attention inputs.
//!
//! [`AddressingConfig`] describes how queries, keys and the KV cache are laid
//! out for one kernel invocation. [`BlockInfo`] resolves that description for
//! a single batch element: actual sequence lengths, row offsets, and the
//! offset of every KV cache page.

pub mod block_info;
pub mod checked;
pub mod config;
pub mod layout;
pub mod walk;

pub use block_info::BlockInfo;
pub use config::AddressingConfig;
pub use layout::{CacheLayout, KeyLayout, PADDED_BASE, PagedCache, QueryLayout};
pub use walk::KeyBlockWalk;
