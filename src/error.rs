use crate::boxes::FourCC;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A box declares a size that does not fit its parent, or a payload
    /// shorter than its mandatory fields.
    #[error("malformed '{typ}' box: {got} bytes, expected at least {need}")]
    MalformedSize { typ: FourCC, need: u64, got: u64 },

    /// Second occurrence of a table that must appear at most once per track.
    #[error("duplicate '{0}' table")]
    DuplicateTable(FourCC),

    /// Cross-table consistency of the sample index is violated.
    #[error("sample table inconsistency: {0}")]
    Protocol(String),

    #[error("not found")]
    NotFound,

    #[error("buffer too small: {provided} bytes, {needed} needed")]
    BufferTooSmall { needed: usize, provided: usize },

    #[error("not supported: {0}")]
    NotSupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
