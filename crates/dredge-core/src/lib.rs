//! Dredge - recursive, concurrent archive extraction
//!
//! This library finds every archive under a directory tree and extracts
//! each one next to itself. Archives discovered inside extracted
//! archives can be fed back into the same run, so the amount of work is
//! only known once the run has finished.

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod security;

pub use error::{Error, Result};

// Re-export commonly used types
pub use archive::{sniff, ArchiveEntry, ArchiveKind, ArchiveReader, TarCompression};
pub use config::Config;
pub use engine::{Engine, EngineOptions, RunEvent, RunReport};
