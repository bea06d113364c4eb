//! BatchScheduler - アーカイブの蓄積・フラッシュを行う単一ループ
//!
//! 2 つのイベントソースを 1 本のタスクで順番に処理する:
//! - **FileArrived**: チャネルから新しいファイルが届いた
//! - **DeadlineFired**: 現在のアーカイブの age 閾値が来た
//!
//! アーカイブの変更・フラッシュ判断・アップロード・削除はすべてこのループ内で
//! 直列に行うので、アーカイブ自体にロックは要らない。
//! アップロードのリトライ中は新しいファイルを取り込まない（キューに溜まる）。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveBuilder, ArchiveSink};
use crate::domain::{LocalDataFile, Thresholds};
use crate::error::{ErrorKind, PusherError};
use crate::ports::{FlushReason, Metrics};
use crate::retry::UploadRetrier;

/// 現在のアーカイブの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// メンバーなし、deadline なし
    Empty,
    /// メンバーあり、deadline 設定済み
    Accumulating,
}

/// ループが 1 回に処理するイベント
#[derive(Debug)]
enum Event {
    FileArrived(LocalDataFile),
    DeadlineFired,
    ChannelClosed,
}

/// BatchScheduler は常にちょうど 1 つの可変アーカイブを持つ
///
/// # フロー
/// 1. ファイル到着 → `ArchiveBuilder::add`
/// 2. 圧縮後サイズが閾値を超えたら即フラッシュ
/// 3. deadline が来たらフラッシュ
/// 4. フラッシュ = seal → 成功するまで upload → メンバー削除 → 新しい空アーカイブ
pub struct BatchScheduler<S: ArchiveSink = Vec<u8>> {
    files: mpsc::Receiver<LocalDataFile>,
    current: ArchiveBuilder<S>,
    root_directory: PathBuf,
    thresholds: Thresholds,
    retrier: UploadRetrier,
    metrics: Arc<dyn Metrics>,
    flush_on_close: bool,
}

impl<S: ArchiveSink + Default> BatchScheduler<S> {
    pub(crate) fn new(
        files: mpsc::Receiver<LocalDataFile>,
        root_directory: PathBuf,
        thresholds: Thresholds,
        retrier: UploadRetrier,
        metrics: Arc<dyn Metrics>,
        flush_on_close: bool,
    ) -> Self {
        let current =
            ArchiveBuilder::with_sink(root_directory.clone(), thresholds.age, S::default());
        Self {
            files,
            current,
            root_directory,
            thresholds,
            retrier,
            metrics,
            flush_on_close,
        }
    }

    pub fn state(&self) -> BatchState {
        if self.current.is_empty() {
            BatchState::Empty
        } else {
            BatchState::Accumulating
        }
    }

    pub fn current(&self) -> &ArchiveBuilder<S> {
        &self.current
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// チャネルが閉じるまでファイルを処理し続ける
    ///
    /// `Err` が返るのは Fatal なエラー（アーカイブ書き込み失敗）のときだけ。
    /// 呼び出し側はプロセスを終了させること。
    pub async fn run(mut self) -> Result<(), PusherError> {
        info!(
            root = %self.root_directory.display(),
            size_threshold = %self.thresholds.size,
            age_threshold = ?self.thresholds.age,
            "batch loop started"
        );

        loop {
            match self.next_event().await {
                Event::FileArrived(file) => self.handle_file(file).await?,
                Event::DeadlineFired => self.flush(FlushReason::Age).await?,
                Event::ChannelClosed => break,
            }
        }

        if self.flush_on_close {
            self.flush(FlushReason::Shutdown).await?;
        } else if !self.current.is_empty() {
            info!(
                archive = %self.current.id(),
                members = self.current.len(),
                "file channel closed; unsent members stay on disk"
            );
        }
        info!("batch loop stopped");
        Ok(())
    }

    async fn next_event(&mut self) -> Event {
        let deadline = self.current.deadline();
        tokio::select! {
            _ = wait_for_deadline(deadline) => Event::DeadlineFired,
            file = self.files.recv() => match file {
                Some(file) => Event::FileArrived(file),
                None => Event::ChannelClosed,
            },
        }
    }

    /// ファイルを 1 つ追加し、サイズ閾値を超えたらフラッシュする
    ///
    /// 読めないファイルはログを出して飛ばす（ディスク上に残る）。
    pub async fn handle_file(&mut self, file: LocalDataFile) -> Result<(), PusherError> {
        match self.current.add(file).await {
            Ok(()) => self.metrics.file_archived(),
            Err(err) if err.kind() == ErrorKind::Skip => {
                warn!(error = %err, "skipping file");
                self.metrics.file_skipped();
                return Ok(());
            }
            Err(err) => {
                error!(
                    archive = %self.current.id(),
                    error = %err,
                    "archive is in an undefined state; stopping"
                );
                return Err(err);
            }
        }

        if self.thresholds.size_exceeded(self.current.current_size()) {
            self.flush(FlushReason::Size).await?;
        }
        Ok(())
    }

    /// 現在のアーカイブを送り出して空のアーカイブに差し替える
    ///
    /// 空のアーカイブに対しては何もしない。
    pub async fn flush(&mut self, reason: FlushReason) -> Result<(), PusherError> {
        if self.current.is_empty() {
            debug!(%reason, "flush requested on an empty archive");
            return Ok(());
        }

        let fresh = ArchiveBuilder::with_sink(
            self.root_directory.clone(),
            self.thresholds.age,
            S::default(),
        );
        let sealed = std::mem::replace(&mut self.current, fresh)
            .seal()
            .inspect_err(|err| error!(error = %err, "could not seal archive; stopping"))?;

        let oldest = sealed
            .members
            .iter()
            .map(LocalDataFile::discovery_time)
            .min();
        info!(
            archive = %sealed.id,
            %reason,
            members = sealed.members.len(),
            oldest_discovered = ?oldest,
            logical_bytes = sealed.logical_bytes,
            payload_bytes = sealed.payload.len(),
            "uploading archive"
        );
        let retries = self.retrier.upload_until_success(&sealed.payload).await;
        self.metrics
            .archive_flushed(reason, sealed.payload.len() as u64);
        info!(archive = %sealed.id, retries, "archive uploaded");

        remove_members(&sealed.members, self.metrics.as_ref()).await;
        Ok(())
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// アップロード済みのメンバーを削除する（失敗してもログだけ）
async fn remove_members(members: &[LocalDataFile], metrics: &dyn Metrics) {
    for file in members {
        debug!(path = %file.path().display(), "removing uploaded file");
        if let Err(err) = tokio::fs::remove_file(file.path()).await {
            warn!(
                path = %file.path().display(),
                error = %err,
                "failed to remove uploaded file"
            );
            metrics.delete_failed();
        }
    }
}
