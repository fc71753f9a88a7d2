//! WatchLifecycle - `tokio::sync::watch` で前面状態を保持する HostLifecycle
//!
//! # 使い方
//! ホストの lifecycle コールバック（前面に来た/背面に回った）から
//! `set_phase()` を呼んでください。テストでも同じものを使います。

use tokio::sync::watch;
use tracing::debug;

use crate::domain::AppPhase;
use crate::ports::HostLifecycle;

/// WatchLifecycle は現在の AppPhase を watch channel で配る
///
/// # 実装詳細
/// - sender を保持するので、receiver が全部いなくなっても状態は失われない
/// - 同じ phase を二度 set しても通知は飛ばない（send_if_modified）
pub struct WatchLifecycle {
    tx: watch::Sender<AppPhase>,
}

impl WatchLifecycle {
    pub fn new(initial: AppPhase) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn phase(&self) -> AppPhase {
        *self.tx.borrow()
    }

    pub fn set_phase(&self, phase: AppPhase) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
        if changed {
            debug!(?phase, "host phase changed");
        }
    }

    pub fn enter_foreground(&self) {
        self.set_phase(AppPhase::Foreground);
    }

    pub fn enter_background(&self) {
        self.set_phase(AppPhase::Background);
    }
}

impl Default for WatchLifecycle {
    fn default() -> Self {
        Self::new(AppPhase::Foreground)
    }
}

impl HostLifecycle for WatchLifecycle {
    fn is_foreground(&self) -> bool {
        self.tx.borrow().is_foreground()
    }

    fn subscribe(&self) -> watch::Receiver<AppPhase> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn reports_phase_synchronously() {
        let lifecycle = WatchLifecycle::new(AppPhase::Background);
        assert!(!lifecycle.is_foreground());

        lifecycle.set_phase(AppPhase::Inactive);
        assert!(!lifecycle.is_foreground());

        lifecycle.enter_foreground();
        assert!(lifecycle.is_foreground());
        assert_eq!(lifecycle.phase(), AppPhase::Foreground);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let lifecycle = WatchLifecycle::new(AppPhase::Background);
        let mut rx = lifecycle.subscribe();

        lifecycle.enter_foreground();

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*rx.borrow_and_update(), AppPhase::Foreground);
    }

    #[tokio::test]
    async fn setting_the_same_phase_does_not_notify() {
        let lifecycle = WatchLifecycle::new(AppPhase::Foreground);
        let rx = lifecycle.subscribe();

        lifecycle.enter_foreground();

        assert!(!rx.has_changed().unwrap());
    }
}
