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

    /// Transparent wrapper for [`brres_sub::error::Error`]
    #[error(transparent)]
    SubResourceError(#[from] brres_sub::error::Error),

    /// file is an invalid brres container
    #[error("file is an invalid brres container")]
    InvalidContainer,

    /// two records in one directory share a name
    #[error("duplicate name {name:?} in directory {directory:?}")]
    DuplicateName {
        /// directory path
        directory: String,
        /// offending child name
        name: String,
    },

    /// a record path is empty or holds an empty component
    #[error("path {0:?} is not a valid record path")]
    InvalidPath(String),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
