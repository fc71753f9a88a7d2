//! Send window: timestamp log + cooldown marker.
//!
//! 「いま送ったらレート制限を超えるか？」を計算する純粋なロジック。
//! 時刻はすべて引数で受け取るので、テストは Instant を組み立てるだけで書けます。

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use super::DispatchConfig;

/// SendWindow は送信時刻の履歴と cooldown の開始時刻を保持
///
/// # 履歴の上限
/// 境界になるのは常に「直近 N 件のうち最も古いもの」なので、
/// 直近 N 件だけ保持すれば無制限に保持した場合と同じ結果になります。
#[derive(Debug, Clone)]
pub struct SendWindow {
    /// Dispatch instants, oldest first. Never longer than `allowed`.
    sends: VecDeque<Instant>,
    allowed: usize,
    window: Duration,
    cooldown: Duration,
    rate_limited_at: Option<Instant>,
}

impl SendWindow {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            sends: VecDeque::with_capacity(config.allowed_requests_per_window),
            allowed: config.allowed_requests_per_window,
            window: config.evaluation_window(),
            cooldown: config.cooldown(),
            rate_limited_at: None,
        }
    }

    /// Record that a request was handed to the transport at `at`.
    pub fn record_send(&mut self, at: Instant) {
        self.sends.push_back(at);
        while self.sends.len() > self.allowed {
            self.sends.pop_front();
        }
    }

    /// Record that the server rejected a request for exceeding its rate limit.
    pub fn mark_rate_limited(&mut self, at: Instant) {
        self.rate_limited_at = Some(at);
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let marker = self.rate_limited_at?;
        let elapsed = now.saturating_duration_since(marker);
        (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
    }

    /// How long to wait before the next send is safe.
    ///
    /// An active cooldown always wins. Otherwise the next send must wait until
    /// the oldest of the last N sends has aged past the window.
    pub fn required_delay(&self, now: Instant) -> Duration {
        if let Some(remaining) = self.cooldown_remaining(now) {
            return remaining;
        }

        let Some(boundary) = self.sends.len().checked_sub(self.allowed) else {
            return Duration::ZERO;
        };
        let oldest = self.sends[boundary];
        self.window.saturating_sub(now.saturating_duration_since(oldest))
    }

    /// Number of recorded sends inside the trailing window ending at `now`.
    pub fn sends_within_window(&self, now: Instant) -> usize {
        self.sends
            .iter()
            .filter(|at| now.saturating_duration_since(**at) < self.window)
            .count()
    }

    pub fn len(&self) -> usize {
        self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config(allowed: usize, window_secs: u64, cooldown_secs: u64) -> DispatchConfig {
        DispatchConfig {
            allowed_requests_per_window: allowed,
            evaluation_window_ms: window_secs * 1000,
            cooldown_ms: cooldown_secs * 1000,
            ..DispatchConfig::default()
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn no_delay_until_n_sends_are_recorded() {
        let t0 = Instant::now();
        let mut window = SendWindow::new(&config(3, 10, 15));

        window.record_send(t0);
        window.record_send(t0);
        assert_eq!(window.required_delay(t0), Duration::ZERO);
    }

    // N = 3, W = 10s, sends at t = 0, 1, 2
    #[rstest]
    #[case(2.0, 8.0)]
    #[case(5.0, 5.0)]
    #[case(9.5, 0.5)]
    #[case(10.0, 0.0)]
    #[case(30.0, 0.0)]
    fn delay_waits_for_oldest_of_last_n_to_age_out(#[case] now: f64, #[case] expected: f64) {
        let t0 = Instant::now();
        let mut window = SendWindow::new(&config(3, 10, 15));
        for s in [0.0, 1.0, 2.0] {
            window.record_send(t0 + secs(s));
        }

        assert_eq!(window.required_delay(t0 + secs(now)), secs(expected));
    }

    #[test]
    fn log_keeps_only_the_last_n_sends() {
        let t0 = Instant::now();
        let mut window = SendWindow::new(&config(3, 10, 15));
        for s in 0..10 {
            window.record_send(t0 + Duration::from_secs(s));
        }

        assert_eq!(window.len(), 3);
        // boundary is the send at t = 7
        assert_eq!(
            window.required_delay(t0 + Duration::from_secs(9)),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn cooldown_overrides_an_open_window() {
        let t0 = Instant::now();
        let mut window = SendWindow::new(&config(19, 12, 15));
        window.record_send(t0);
        window.mark_rate_limited(t0 + secs(1.0));

        assert_eq!(window.required_delay(t0 + secs(4.0)), secs(12.0));
        assert_eq!(window.cooldown_remaining(t0 + secs(4.0)), Some(secs(12.0)));
    }

    #[test]
    fn window_applies_again_after_cooldown_expires() {
        let t0 = Instant::now();
        let mut window = SendWindow::new(&config(1, 20, 5));
        window.record_send(t0);
        window.mark_rate_limited(t0);

        assert_eq!(window.cooldown_remaining(t0 + secs(5.0)), None);
        assert_eq!(window.required_delay(t0 + secs(5.0)), secs(15.0));
    }

    #[test]
    fn counts_sends_inside_the_window() {
        let t0 = Instant::now();
        let mut window = SendWindow::new(&config(5, 10, 15));
        for s in [0.0, 4.0, 8.0] {
            window.record_send(t0 + secs(s));
        }

        assert_eq!(window.sends_within_window(t0 + secs(9.0)), 3);
        assert_eq!(window.sends_within_window(t0 + secs(12.0)), 2);
        assert_eq!(window.sends_within_window(t0 + secs(30.0)), 0);
    }
}
