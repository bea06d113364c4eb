//! LocalDirUploader - ローカルディレクトリを「リモートストア」として使う
//!
//! payload を `<dir>/<YYYY>/<MM>/<DD>/<YYYYMMDDTHHMMSS.ffffffZ>.tgz` に書く。
//! 一時ファイルに書いてから rename するので、途中で失敗しても
//! 中途半端なアーカイブが最終パスに残ることはない。

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::ports::{Clock, SystemClock, UploadError, Uploader};

pub struct LocalDirUploader<C = SystemClock> {
    dir: PathBuf,
    clock: C,
}

impl LocalDirUploader<SystemClock> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, SystemClock)
    }
}

impl<C: Clock> LocalDirUploader<C> {
    pub fn with_clock(dir: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }
}

/// アップロード先の相対パス
pub fn object_name(at: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!(
        "{}/{}.tgz",
        at.format("%Y/%m/%d"),
        at.format("%Y%m%dT%H%M%S%.6fZ")
    ))
}

#[async_trait]
impl<C: Clock> Uploader for LocalDirUploader<C> {
    async fn upload(&self, payload: &[u8]) -> Result<(), UploadError> {
        let dest = self.dir.join(object_name(self.clock.now()));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = dest.with_extension("tgz.partial");
        tokio::fs::write(&partial, payload).await?;
        tokio::fs::rename(&partial, &dest).await?;

        info!(
            dest = %dest.display(),
            bytes = payload.len(),
            "wrote archive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn object_name_is_date_partitioned() {
        assert_eq!(
            object_name(fixed_time()),
            PathBuf::from("2024/03/09/20240309T070501.000000Z.tgz")
        );
    }

    #[tokio::test]
    async fn writes_payload_under_dated_directory() {
        let dir = TempDir::new().unwrap();
        let uploader = LocalDirUploader::with_clock(dir.path(), FixedClock::new(fixed_time()));

        uploader.upload(b"archive bytes").await.unwrap();

        let dest = dir.path().join("2024/03/09/20240309T070501.000000Z.tgz");
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive bytes");
        assert!(!dest.with_extension("tgz.partial").exists());
    }

    #[tokio::test]
    async fn repeated_upload_of_same_payload_is_harmless() {
        let dir = TempDir::new().unwrap();
        let uploader = LocalDirUploader::with_clock(dir.path(), FixedClock::new(fixed_time()));

        uploader.upload(b"same").await.unwrap();
        uploader.upload(b"same").await.unwrap();

        let dest = dir.path().join("2024/03/09/20240309T070501.000000Z.tgz");
        assert_eq!(std::fs::read(dest).unwrap(), b"same");
    }

    #[tokio::test]
    async fn unwritable_destination_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let uploader = LocalDirUploader::with_clock(&blocker, FixedClock::new(fixed_time()));

        let err = uploader.upload(b"x").await.unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
