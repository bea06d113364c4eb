//! Metrics port - カウンタの抽象化
//!
//! グローバルなレジストリは持たず、起動時に 1 つ作って各コンポーネントに渡す。
//!
//! # 実装
//! - **NoopMetrics**: 何もしない
//! - **CounterMetrics** (`observability`): AtomicU64 のカウンタ

use std::fmt;

/// FlushReason はフラッシュのきっかけ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushReason {
    /// サイズ閾値を超えた
    Size,
    /// 最初のメンバーから age 閾値が経過した
    Age,
    /// ファイルチャネルが閉じた（flush_on_close 有効時のみ）
    Shutdown,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlushReason::Size => "size",
            FlushReason::Age => "age",
            FlushReason::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Metrics はパイプラインのカウンタを受け取る
///
/// `label` はリトライ対象の操作名（例: "upload"）。
pub trait Metrics: Send + Sync {
    fn call_retried(&self, label: &str);
    fn max_backoff_reached(&self, label: &str);
    fn file_archived(&self);
    fn file_skipped(&self);
    fn archive_flushed(&self, reason: FlushReason, payload_bytes: u64);
    fn delete_failed(&self);
}

/// NoopMetrics は全てのカウンタを捨てる
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn call_retried(&self, _label: &str) {}
    fn max_backoff_reached(&self, _label: &str) {}
    fn file_archived(&self) {}
    fn file_skipped(&self) {}
    fn archive_flushed(&self, _reason: FlushReason, _payload_bytes: u64) {}
    fn delete_failed(&self) {}
}
