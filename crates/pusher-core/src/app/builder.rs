//! PusherBuilder - BatchScheduler の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;

use tokio::sync::mpsc;

use super::batch_loop::BatchScheduler;
use crate::domain::{LocalDataFile, Thresholds};
use crate::ports::{Metrics, NoopMetrics, Uploader};
use crate::retry::{BackoffPolicy, UploadRetrier};

/// discovery とコアの間のキュー容量
///
/// 大きめに取ることで、ファイル検出の応答時間をアップロード処理から切り離す。
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_000_000;

/// FileSender は discovery 側が持つ送信口
pub type FileSender = mpsc::Sender<LocalDataFile>;

/// PusherBuilder は BatchScheduler と FileSender を作る
///
/// # 使用例
/// ```ignore
/// let (scheduler, files) = PusherBuilder::new("/var/spool/data")
///     .thresholds(Thresholds::new(20_000_000, Duration::from_secs(3600)))
///     .uploader(Arc::new(LocalDirUploader::new("/srv/archives")))
///     .build()?;
/// tokio::spawn(scheduler.run());
/// ```
///
/// # Fail-fast 設計
/// - uploader・閾値が未設定、あるいは 0 なら build() が BuildError を返す
/// - 待ち時間が天井まで伸びないバックオフ設定も拒否する
pub struct PusherBuilder {
    root_directory: String,
    thresholds: Option<Thresholds>,
    uploader: Option<Arc<dyn Uploader>>,
    metrics: Arc<dyn Metrics>,
    backoff: BackoffPolicy,
    channel_capacity: usize,
    flush_on_close: bool,
    jitter_seed: Option<u64>,
}

/// BuildError は構築時のエラー
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("root directory must not be empty")]
    EmptyRootDirectory,

    #[error("no uploader was configured")]
    MissingUploader,

    #[error("no thresholds were configured")]
    MissingThresholds,

    #[error("size threshold must be greater than zero")]
    ZeroSizeThreshold,

    #[error("age threshold must be greater than zero")]
    ZeroAgeThreshold,

    #[error("channel capacity must be greater than zero")]
    ZeroChannelCapacity,

    #[error("invalid backoff policy: {0}")]
    InvalidBackoff(&'static str),
}

/// root を必ず区切り文字で終わる形にそろえる
pub fn normalize_root(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{root}/")
    }
}

impl PusherBuilder {
    pub fn new(root_directory: impl Into<String>) -> Self {
        Self {
            root_directory: root_directory.into(),
            thresholds: None,
            uploader: None,
            metrics: Arc::new(NoopMetrics),
            backoff: BackoffPolicy::default_upload(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            flush_on_close: false,
            jitter_seed: None,
        }
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// チャネルが閉じたとき、途中のアーカイブも送り出す
    pub fn flush_on_close(mut self, enabled: bool) -> Self {
        self.flush_on_close = enabled;
        self
    }

    /// リトライのジッタを決定的にする（テスト用）
    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<(BatchScheduler, FileSender), BuildError> {
        if self.root_directory.is_empty() {
            return Err(BuildError::EmptyRootDirectory);
        }
        let uploader = self.uploader.ok_or(BuildError::MissingUploader)?;
        let thresholds = self.thresholds.ok_or(BuildError::MissingThresholds)?;
        if thresholds.size.bytes() == 0 {
            return Err(BuildError::ZeroSizeThreshold);
        }
        if thresholds.age.is_zero() {
            return Err(BuildError::ZeroAgeThreshold);
        }
        if self.channel_capacity == 0 {
            return Err(BuildError::ZeroChannelCapacity);
        }
        self.backoff.validate().map_err(BuildError::InvalidBackoff)?;

        let mut retrier = UploadRetrier::new(uploader, self.backoff, self.metrics.clone());
        if let Some(seed) = self.jitter_seed {
            retrier = retrier.with_seed(seed);
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let scheduler = BatchScheduler::new(
            rx,
            normalize_root(&self.root_directory).into(),
            thresholds,
            retrier,
            self.metrics,
            self.flush_on_close,
        );
        Ok((scheduler, tx))
    }
}
