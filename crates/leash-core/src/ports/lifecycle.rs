//! HostLifecycle port - ホストプロセスの前面/背面状態
//!
//! ホスト環境が提供するもの:
//! - 現在の状態（同期的に読める）
//! - 「アクティブになった」イベント（非同期、遷移ごとに最大 1 回）
//!
//! 実装は `impls::WatchLifecycle` を参照。

use tokio::sync::watch;

use crate::domain::AppPhase;

/// HostLifecycle は前面状態とその変化を公開する
///
/// # 設計原則
/// - `is_foreground()` は atomic に読めること（ロックを跨がない）
/// - `subscribe()` は遷移を見逃さない receiver を返すこと
pub trait HostLifecycle: Send + Sync {
    fn is_foreground(&self) -> bool;

    /// Subscribe to phase transitions. A "became active" event is a change
    /// observed on this receiver after which `is_foreground()` holds.
    fn subscribe(&self) -> watch::Receiver<AppPhase>;
}
