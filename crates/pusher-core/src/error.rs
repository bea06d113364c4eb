//! Errors - エラー型と分類
//!
//! 失敗の扱いは `ErrorKind` で決まる:
//! - **Skip**: そのファイルだけ諦めて次へ進む
//! - **Fatal**: アーカイブの圧縮ストリームが壊れている。プロセスを止める
//! - **Invalid**: 呼び出し側のバグ（空アーカイブの seal など）

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// ErrorKind は PusherError の運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Skip,
    Fatal,
    Invalid,
}

#[derive(Debug, Error)]
pub enum PusherError {
    #[error("could not read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} cannot be stored as an archive member")]
    InvalidMemberName { path: PathBuf },

    #[error("archive writer failed while {context}: {source}")]
    ArchiveWrite {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("refusing to seal an archive with no members")]
    EmptyArchive,
}

impl PusherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PusherError::ReadFailed { .. } | PusherError::InvalidMemberName { .. } => {
                ErrorKind::Skip
            }
            PusherError::ArchiveWrite { .. } => ErrorKind::Fatal,
            PusherError::EmptyArchive => ErrorKind::Invalid,
        }
    }

    pub(crate) fn archive_write(context: impl Into<String>, source: io::Error) -> Self {
        PusherError::ArchiveWrite {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_failures_are_skipped() {
        let err = PusherError::ReadFailed {
            path: PathBuf::from("/data/a.json"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.kind(), ErrorKind::Skip);
        assert!(err.to_string().contains("/data/a.json"));
    }

    #[test]
    fn writer_failures_are_fatal() {
        let err = PusherError::archive_write(
            "flushing gzip stream",
            io::Error::new(io::ErrorKind::Other, "boom"),
        );
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(err.to_string().contains("flushing gzip stream"));
    }

    #[test]
    fn empty_archive_is_invalid() {
        assert_eq!(PusherError::EmptyArchive.kind(), ErrorKind::Invalid);
    }
}
