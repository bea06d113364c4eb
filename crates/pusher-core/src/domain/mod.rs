//! Domain model (files, archive ids, sizes, thresholds).

pub mod byte_count;
pub mod data_file;
pub mod ids;
pub mod thresholds;

pub use byte_count::{ByteCount, ByteCountParseError};
pub use data_file::LocalDataFile;
pub use ids::ArchiveId;
pub use thresholds::Thresholds;
