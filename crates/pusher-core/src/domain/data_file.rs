//! LocalDataFile - ディスク上で見つかったデータファイルへの参照

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// LocalDataFile は discovery 側から渡されるファイル参照
///
/// 作成後は不変。BatchScheduler に渡された時点で所有権が移り、
/// アップロード後に削除されるか、プロセス終了まで保持される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDataFile {
    path: PathBuf,
    discovered_at: DateTime<Utc>,
}

impl LocalDataFile {
    /// 現在時刻を discovered_at として作成
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::discovered_at(path, Utc::now())
    }

    pub fn discovered_at(path: impl Into<PathBuf>, at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            discovered_at: at,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn discovery_time(&self) -> DateTime<Utc> {
        self.discovered_at
    }
}
