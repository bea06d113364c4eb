//! pusher-core
//!
//! ディスク上の小さなファイルを tar.gz のバッチにまとめてリモートストアへ送り、
//! アップロードが確認できてから元ファイルを削除する。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（LocalDataFile, ArchiveId, ByteCount, Thresholds）
//! - **ports**: 抽象化レイヤー（Uploader, Metrics, Clock）
//! - **archive**: メモリ上の tar.gz アーカイブ（ArchiveBuilder）
//! - **retry**: 上限付きジッタの指数バックオフ（UploadRetrier）
//! - **app**: バッチループ（BatchScheduler, PusherBuilder）
//! - **impls**: ports の実装（InMemoryUploader, LocalDirUploader）
//! - **observability**: カウンタ（CounterMetrics）

pub mod domain;
pub mod ports;
pub mod archive;
pub mod retry;
pub mod app;
pub mod impls;
pub mod error;
pub mod observability;

pub use app::{BatchScheduler, BuildError, FileSender, PusherBuilder};
pub use domain::{ByteCount, LocalDataFile, Thresholds};
pub use error::{ErrorKind, PusherError};
