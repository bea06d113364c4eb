//! Uploader port - 封をしたアーカイブをリモートストアへ送る
//!
//! 実際の転送手段（GCS, S3, HTTP など）はこの trait の外側にある。
//!
//! # 設計原則
//! - 同じバイト列で何度呼ばれても安全であること（リトライで再送される）
//! - 失敗は `UploadError` で返す。諦める判断は呼び出し側もしない

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Uploader は完成したアーカイブ payload を 1 回送信する
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, payload: &[u8]) -> Result<(), UploadError>;
}
