//! Clock port - 時刻の抽象化
//!
//! 単調時刻（送信タイムスタンプ、cooldown）と壁時計（ログ・統計表示用）の両方を提供します。
//! 単調時刻は `tokio::time::Instant` なので、テストでは `start_paused` で時間を止められます。

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Clock は現在時刻を提供
///
/// # テスト容易性
/// - trait により時刻を差し替え可能
/// - 純粋な計算のテストでは ManualClock を使用
/// - `now()` は tokio の時刻と同じ速さで進むこと（pump は `tokio::time::sleep` で待つ）
pub trait Clock: Send + Sync {
    /// Monotonic time, used for every rate-limit computation.
    fn now(&self) -> Instant;

    /// Wall-clock time, used only for reporting.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// SystemClock は本番用（tokio の時刻源を使う）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub(crate) use self::manual::ManualClock;

/// pump は tokio の時刻で sleep するので、ManualClock はキューには渡せない（id 生成などのテスト専用）
#[cfg(test)]
mod manual {
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta, Utc};
    use tokio::time::Instant;

    use super::Clock;

    /// ManualClock は `advance()` したときだけ進む時計
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        inner: Mutex<(Instant, DateTime<Utc>)>,
    }

    impl ManualClock {
        pub(crate) fn new(start: DateTime<Utc>) -> Self {
            Self {
                inner: Mutex::new((Instant::now(), start)),
            }
        }

        /// 両方の時刻を `by` だけ進める
        pub(crate) fn advance(&self, by: Duration) {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.0 += by;
            inner.1 += TimeDelta::from_std(by).unwrap_or_default();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner).0
        }

        fn utc_now(&self) -> DateTime<Utc> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner).1
        }
    }
}
