//! kvaddr error types
//!
//! Only host-side code returns these: parameter validation, config loading,
//! page-table construction and the checked accessors. The unchecked
//! addressing core has no error path.

/// kvaddr result type
pub type Result<T> = std::result::Result<T, Error>;

/// kvaddr errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid argument to an operation
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: &'static str,
        /// Why it's invalid
        reason: String,
    },

    /// Index outside the array it addresses
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// What was being indexed
        what: &'static str,
        /// The offending index
        index: i64,
        /// Length of the indexed array
        len: usize,
    },

    /// Cumulative offsets or per-sequence lengths are malformed
    #[error("malformed seqlens: {reason}")]
    MalformedSeqlens {
        /// Description of what went wrong
        reason: String,
    },

    /// Page table does not match the cache it describes
    #[error("page table error: {reason}")]
    PageTableError {
        /// Description of what went wrong
        reason: String,
    },

    /// Launch parameter loading error
    #[error("config error: {reason}")]
    ConfigError {
        /// Description of what went wrong
        reason: String,
    },
}
