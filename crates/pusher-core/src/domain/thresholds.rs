//! Thresholds - フラッシュ条件（サイズ・経過時間）

use std::time::Duration;

use super::ByteCount;

/// Thresholds は起動時に一度だけ与えられる不変の設定
///
/// - `size`: 圧縮後のアーカイブがこれを**超えたら**即フラッシュ
/// - `age`: 最初のメンバー追加からこの時間が経ったらフラッシュ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub size: ByteCount,
    pub age: Duration,
}

impl Thresholds {
    pub fn new(size_bytes: u64, age: Duration) -> Self {
        Self {
            size: ByteCount::new(size_bytes),
            age,
        }
    }

    /// サイズ閾値を超えているか（等しい場合は超えていない）
    pub fn size_exceeded(&self, current: u64) -> bool {
        current > self.size.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_threshold_is_strict() {
        let t = Thresholds::new(1000, Duration::from_secs(10));
        assert!(!t.size_exceeded(999));
        assert!(!t.size_exceeded(1000));
        assert!(t.size_exceeded(1001));
    }
}
