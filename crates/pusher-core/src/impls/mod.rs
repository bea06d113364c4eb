//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryUploader**: 開発・テスト用のアップロード先
//! - **LocalDirUploader**: ローカルディレクトリへの書き出し
//!
//! # 本番用実装
//! GCS / S3 などへの転送は `Uploader` を実装した別クレートに置く想定。

pub mod inmem_uploader;
pub mod local_uploader;

// 主要な型を再エクスポート
pub use self::inmem_uploader::InMemoryUploader;
pub use self::local_uploader::LocalDirUploader;
