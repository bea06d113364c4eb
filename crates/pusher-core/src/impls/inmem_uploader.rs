//! InMemoryUploader - 開発・テスト用のアップロード先
//!
//! 受け取った payload をメモリに貯めるだけ。
//! `failing(n)` で最初の n 回をわざと失敗させ、リトライ経路を確認できる。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::ports::{UploadError, Uploader};

/// InMemoryUploader は成功した upload の payload を記録する
///
/// # 使用例
/// ```ignore
/// let uploader = Arc::new(InMemoryUploader::failing(2));
/// // 3 回目の upload で成功する
/// ```
#[derive(Debug, Default)]
pub struct InMemoryUploader {
    /// 残りの失敗回数
    remaining_failures: AtomicU32,
    /// upload が呼ばれた回数（失敗含む）
    attempts: AtomicU32,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl InMemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最初の `n` 回は `UploadError::Rejected` を返す
    pub fn failing(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// 成功した upload の payload（呼ばれた順）
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Uploader for InMemoryUploader {
    async fn upload(&self, payload: &[u8]) -> Result<(), UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(UploadError::Rejected("intentional failure".to_string()));
        }

        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_vec());
        Ok(())
    }
}
