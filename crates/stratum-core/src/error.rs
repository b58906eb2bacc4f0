//! Error types for stratum-core
//!
//! Every failure an operation can report is expressed as a return value;
//! nothing in this crate raises a process-fatal condition under normal
//! operation.

use thiserror::Error;

/// Result type alias for stratum-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for stratum-core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A null pointer was passed where a live allocation was expected
    #[error("null pointer")]
    NullPointer,

    /// The pointer is not owned by this allocator
    #[error("pointer not registered with this allocator")]
    NotRegistered,

    /// The kernel refused the anonymous mapping
    #[error("anonymous mapping of {bytes} bytes failed")]
    MapFailed {
        /// Rounded size of the rejected request
        bytes: usize,
    },

    /// Configuration value could not be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
