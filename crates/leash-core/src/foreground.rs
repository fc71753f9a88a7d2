//! ForegroundGate - ホストが前面にいるときだけ仕事を走らせる
//!
//! # フロー
//! 1. 前面なら、その場で同期的に実行
//! 2. 背面なら、held リストに積み、"became active" の購読を（一つだけ）張る
//! 3. 購読側はイベントのたびに本当に前面か再確認し、held を丸ごと取り出して FIFO で実行
//! 4. flush したら購読を解除する（次に背面で積まれたときに張り直す）

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use crate::domain::AppPhase;
use crate::ports::HostLifecycle;

/// A unit of deferred work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct GateState {
    held: Vec<Work>,
    subscribed: bool,
}

struct GateInner {
    lifecycle: Arc<dyn HostLifecycle>,
    runtime: Handle,
    state: Mutex<GateState>,
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// held を取り出して購読を解除し、ロックの外で順に実行
    fn flush(&self) {
        let held = {
            let mut state = self.lock();
            state.subscribed = false;
            std::mem::take(&mut state.held)
        };
        if !held.is_empty() {
            info!(count = held.len(), "host became active, running deferred work");
        }
        for work in held {
            work();
        }
    }
}

/// ForegroundGate はホストが背面の間、仕事を保留する
///
/// Clone は同じ held リストを共有します。
#[derive(Clone)]
pub struct ForegroundGate {
    inner: Arc<GateInner>,
}

impl ForegroundGate {
    /// `runtime` は購読用の task を spawn する先
    pub fn new(lifecycle: Arc<dyn HostLifecycle>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(GateInner {
                lifecycle,
                runtime,
                state: Mutex::new(GateState::default()),
            }),
        }
    }

    /// Run `work` now if the host is in the foreground, otherwise hold it until
    /// the host becomes active again.
    pub fn run_when_foreground(&self, work: Work) {
        if self.inner.lifecycle.is_foreground() {
            work();
            return;
        }

        let needs_subscription = {
            let mut state = self.inner.lock();
            state.held.push(work);
            !std::mem::replace(&mut state.subscribed, true)
        };

        if needs_subscription {
            debug!("host is not in the foreground, deferring work");
            // subscribe before spawning so a transition in between is still observed
            let rx = self.inner.lifecycle.subscribe();
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(wait_until_active(inner, rx));
        }
    }

    /// Resolve once the host is in the foreground.
    pub async fn wait_foreground(&self) {
        let (tx, rx) = oneshot::channel();
        self.run_when_foreground(Box::new(move || {
            // receiver may be gone if the caller stopped waiting
            let _ = tx.send(());
        }));
        let _ = rx.await;
    }

    /// ホストの現在の状態（待たない）
    pub fn is_foreground(&self) -> bool {
        self.inner.lifecycle.is_foreground()
    }

    /// Number of units currently held.
    pub fn held_len(&self) -> usize {
        self.inner.lock().held.len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().subscribed
    }
}

async fn wait_until_active(inner: Arc<GateInner>, mut rx: watch::Receiver<AppPhase>) {
    loop {
        // spurious or non-foreground transitions keep us waiting
        if inner.lifecycle.is_foreground() {
            inner.flush();
            return;
        }
        if rx.changed().await.is_err() {
            // lifecycle dropped: nothing will ever wake us, let the next caller retry
            inner.lock().subscribed = false;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::WatchLifecycle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn gate_with(phase: AppPhase) -> (ForegroundGate, Arc<WatchLifecycle>) {
        let lifecycle = Arc::new(WatchLifecycle::new(phase));
        let gate = ForegroundGate::new(lifecycle.clone(), Handle::current());
        (gate, lifecycle)
    }

    /// 購読 task に順番を回す
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn recorder(log: &Arc<Mutex<Vec<usize>>>, n: usize) -> Work {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(n))
    }

    #[tokio::test]
    async fn runs_immediately_in_foreground() {
        let (gate, _lifecycle) = gate_with(AppPhase::Foreground);
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.run_when_foreground(recorder(&log, 1));

        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert_eq!(gate.held_len(), 0);
        assert!(!gate.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn holds_work_in_background_and_flushes_fifo() {
        let (gate, lifecycle) = gate_with(AppPhase::Background);
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            gate.run_when_foreground(recorder(&log, n));
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(gate.held_len(), 3);
        assert!(gate.is_subscribed());

        lifecycle.enter_foreground();
        settle().await;

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(gate.held_len(), 0);
        assert!(!gate.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn each_unit_runs_exactly_once() {
        let (gate, lifecycle) = gate_with(AppPhase::Background);
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = Arc::clone(&runs);
            gate.run_when_foreground(Box::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }));
        }

        lifecycle.enter_foreground();
        settle().await;
        // 追加の遷移が来ても二重実行されない
        lifecycle.enter_background();
        lifecycle.enter_foreground();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn non_foreground_transition_keeps_work_held() {
        let (gate, lifecycle) = gate_with(AppPhase::Background);
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.run_when_foreground(recorder(&log, 1));
        lifecycle.set_phase(AppPhase::Inactive);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(gate.held_len(), 1);
        assert!(gate.is_subscribed());

        lifecycle.enter_foreground();
        settle().await;
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribes_after_each_background_period() {
        let (gate, lifecycle) = gate_with(AppPhase::Background);
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.run_when_foreground(recorder(&log, 1));
        lifecycle.enter_foreground();
        settle().await;
        assert!(!gate.is_subscribed());

        lifecycle.enter_background();
        gate.run_when_foreground(recorder(&log, 2));
        assert!(gate.is_subscribed());

        lifecycle.enter_foreground();
        settle().await;
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_foreground_resolves_after_activation() {
        let (gate, lifecycle) = gate_with(AppPhase::Background);
        let done = Arc::new(AtomicUsize::new(0));

        let waiter = tokio::spawn({
            let gate = gate.clone();
            let done = Arc::clone(&done);
            async move {
                gate.wait_foreground().await;
                done.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        lifecycle.enter_foreground();
        waiter.await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
