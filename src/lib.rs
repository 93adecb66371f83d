//! # kvaddr
//!
//! **Per-batch addressing for variable-length and paged KV cache attention.**
//!
//! Attention kernels that accept packed (ragged) batches and paged KV caches
//! need, for every batch element they process, the actual query and key
//! lengths and the offset of every key block they visit. kvaddr resolves
//! those from the launch parameters without touching tensor data.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   params / paging / seqlens   (host: build + validate)  │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │
//! ┌──────────────────────────┴──────────────────────────────┐
//! │   addressing   (per element: BlockInfo, KeyBlockWalk)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design
//!
//! - **Tagged layouts**: padded, cumulative and per-length sequence arrays are
//!   distinct variants, never a nullable pointer plus a flag
//! - **Unchecked hot path**: `BlockInfo` construction and paged accessors are
//!   `unsafe fn`s; the launch is validated once on the host instead
//! - **Checked mirror**: `try_*` variants for tests and tooling
//! - **Reference gathers**: dense copies of a batch element's key rows, to
//!   check a layout end to end

pub mod addressing;
pub mod error;
pub mod paging;
pub mod params;
pub mod reference;
pub mod seqlens;

pub use addressing::{
    AddressingConfig, BlockInfo, CacheLayout, KeyBlockWalk, KeyLayout, PADDED_BASE, PagedCache,
    QueryLayout,
};
pub use error::{Error, Result};
pub use paging::{BlockTable, PageId, PageTable};
pub use params::LaunchParams;
