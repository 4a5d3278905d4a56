//! Error types for EVIO operations

use thiserror::Error;

/// Result type alias for EVIO operations
pub type Result<T> = std::result::Result<T, EvioError>;

/// Errors that can occur while reading, writing, or mutating EVIO data
#[derive(Error, Debug)]
pub enum EvioError {
    /// Header word 7 is neither 0xC0DA0100 nor its byte-swapped form
    #[error("bad magic word: {0:#010x}")]
    BadMagic(u32),

    /// Header version field is below 6
    #[error("unsupported evio version: {0}")]
    UnsupportedVersion(u32),

    /// A claimed length runs past the available bytes
    #[error("truncated input: {0}")]
    Truncated(String),

    /// A bank/segment header length is below the minimum or inconsistent
    /// with its parent
    #[error("bad structure length: {0}")]
    BadLength(String),

    /// Record number differs from the expected sequence (only raised when
    /// the sequence check is enabled)
    #[error("record number out of sequence: expected {expected}, got {actual}")]
    BadSequence { expected: u32, actual: u32 },

    /// Use of a node handle invalidated by a previous buffer mutation
    #[error("node is obsolete: the buffer was mutated since it was issued")]
    ObsoleteNode,

    /// A buffer accessor would read past the limit or write past capacity
    #[error("buffer access out of bounds: offset {offset} + {len} exceeds {bound}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        bound: usize,
    },

    /// Compression or decompression failed
    #[error("codec failure: {0}")]
    Codec(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (e.g. compression thread count vs ring size)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
