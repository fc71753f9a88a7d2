//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **WatchLifecycle**: watch channel ベースの HostLifecycle（ホスト組み込み・テスト用）
//!
//! Transport の本番実装はアプリ側（HTTP クライアントを持つ層）に置きます。

pub mod watch_lifecycle;

pub use self::watch_lifecycle::WatchLifecycle;
