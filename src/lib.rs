//! Audiobook metadata extraction
//!
//! Reads embedded MP4 and ID3v2 tags, recovers book details from library
//! folder names, and reconciles both into a single [`reconcile::BookRecord`].

pub mod config;
pub mod directory;
pub mod error;
pub mod reconcile;
pub mod scanner;
pub mod tags;

pub use directory::{parse_directory, DirectoryParser, DirectoryRecord};
pub use error::{IssueKind, RecordIssue, TagError};
pub use reconcile::{reconcile, BookRecord};
pub use tags::{decode, Metadata, Tag};
