//! Archive module: in-memory tar.gz batches.

pub mod builder;

pub use builder::{ArchiveBuilder, ArchiveSink, MEMBER_MODE, SealedArchive};
