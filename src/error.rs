//! Error types for tag decoding
//!
//! Decoding distinguishes two classes of failure. A [`TagError`] means the
//! stream as a whole could not be interpreted and decoding stopped. A
//! [`RecordIssue`] describes a single atom or frame that was skipped; the
//! decode still succeeds and the issue is reported alongside the fields.

use std::fmt;
use thiserror::Error;

/// Stream-fatal decode failure
#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to read audio stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream is too short to contain a tag header ({0} bytes)")]
    Truncated(u64),

    #[error("unrecognized file signature: no MP4 container or ID3v2 header found")]
    UnknownFormat,

    #[error("unsupported ID3v2 major version {0}")]
    UnsupportedVersion(u8),
}

/// What went wrong with a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Declared length runs past the end of the enclosing record or stream
    Overrun { declared: u64, available: u64 },
    /// Record is structurally invalid
    Malformed(String),
    /// Frame uses an encoding this decoder does not handle (compression, encryption)
    Unsupported(String),
    /// Chapter list was dropped after failing consistency checks
    Chapters(String),
}

/// A record-local problem noted while decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{record} at offset {offset}: {kind}")]
pub struct RecordIssue {
    /// Atom type code or frame identifier
    pub record: String,
    /// Byte offset of the record header in the stream
    pub offset: u64,
    pub kind: IssueKind,
}

impl RecordIssue {
    pub fn new(record: impl Into<String>, offset: u64, kind: IssueKind) -> Self {
        Self {
            record: record.into(),
            offset,
            kind,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Overrun {
                declared,
                available,
            } => write!(
                f,
                "declared length {} exceeds the {} bytes available",
                declared, available
            ),
            IssueKind::Malformed(reason) => write!(f, "malformed record ({})", reason),
            IssueKind::Unsupported(reason) => write!(f, "unsupported encoding ({})", reason),
            IssueKind::Chapters(reason) => write!(f, "chapter list discarded ({})", reason),
        }
    }
}
