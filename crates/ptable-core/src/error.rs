//! Error types for ptable-core
//!
//! This module provides a no_std compatible error type that is used
//! throughout the crate. All engine failures are returned as typed
//! results; nothing here aborts the host process.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Caller input errors
    /// Empty or malformed caller input (e.g. an empty image list)
    InvalidArgument,

    // Planning errors
    /// Flash capacity exceeded with no tolerant truncation path enabled
    InsufficientSpace {
        /// Bytes the placement needed
        required: u32,
        /// Bytes that were actually left
        available: u32,
    },
    /// Entry count exceeds what the table format can hold
    TooManyPartitions {
        /// Number of region entries requested
        count: usize,
    },

    // Validation errors
    /// A region extends beyond the flash capacity
    RegionOutOfBounds {
        /// Start offset of the offending region
        offset: u32,
        /// Size of the offending region
        size: u32,
    },
    /// Two regions overlap where at least one is an application slot
    OverlapDetected {
        /// Start offset of the first region
        first: u32,
        /// Start offset of the second region
        second: u32,
    },

    // Serialization errors
    /// Destination buffer is too small for the serialized table
    BufferTooSmall,
    /// Checksum record digest does not match the table contents
    ChecksumMismatch,

    // Device errors
    /// I/O error propagated verbatim from the injected block device
    Io,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InsufficientSpace {
                required,
                available,
            } => {
                write!(
                    f,
                    "insufficient space: need {} bytes, {} bytes left",
                    required, available
                )
            }
            Self::TooManyPartitions { count } => {
                write!(f, "too many partitions: {} region entries", count)
            }
            Self::RegionOutOfBounds { offset, size } => {
                write!(
                    f,
                    "region at 0x{:08X} (+{} bytes) extends beyond flash capacity",
                    offset, size
                )
            }
            Self::OverlapDetected { first, second } => {
                write!(
                    f,
                    "regions at 0x{:08X} and 0x{:08X} overlap",
                    first, second
                )
            }
            Self::BufferTooSmall => write!(f, "buffer too small for serialized table"),
            Self::ChecksumMismatch => write!(f, "table checksum mismatch"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
