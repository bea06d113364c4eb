//! Ports - 抽象化レイヤー
//!
//! コアの外側にあるもの（アップロード先、メトリクス、壁時計）への
//! インターフェースを定義する。具体的な実装は `impls` と `observability` にある。

pub mod clock;
pub mod metrics;
pub mod uploader;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::metrics::{FlushReason, Metrics, NoopMetrics};
pub use self::uploader::{UploadError, Uploader};
