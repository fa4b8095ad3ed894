//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// a read inside the sub-resource ran past its end
    #[error("sub-resource truncated: need {needed} bytes at offset {offset:#x}, have {available}")]
    Truncated {
        /// byte offset of the failed read
        offset: usize,
        /// bytes the read wanted
        needed: usize,
        /// bytes actually available
        available: usize,
    },

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
