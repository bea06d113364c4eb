//! App - アプリケーション層
//!
//! ports を組み合わせてバッチ処理のループを組み立てる。
//!
//! # 主要コンポーネント
//! - **PusherBuilder**: 設定の検証とワイヤリング
//! - **BatchScheduler**: 蓄積 → フラッシュ → アップロード → 削除のループ

pub mod batch_loop;
pub mod builder;

// 主要な型を再エクスポート
pub use self::batch_loop::{BatchScheduler, BatchState};
pub use self::builder::{BuildError, DEFAULT_CHANNEL_CAPACITY, FileSender, PusherBuilder, normalize_root};
