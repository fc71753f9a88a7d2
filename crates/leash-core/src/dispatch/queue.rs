//! RequestDispatchQueue - レート制限を守りながら transport にリクエストを渡すキュー
//!
//! # Pump の状態機械
//! 単一の tokio task が以下を回します（再帰や再入はしない）。
//! 1. Idle: キューが空なら enqueue の通知（Notify）か shutdown を待つ
//! 2. ForegroundGate を通る（背面の間はここで止まる）
//! 3. lock の中で前面かどうかを見直し、必要な遅延を計算
//!    - 背面に戻っていたら何もせず 2 に戻る
//!    - 遅延 > tolerance なら Delaying に入り、sleep してから 2 に戻る
//!    - そうでなければ先頭を取り出して sender task に渡し、すぐ 2 に戻る（Draining）
//!
//! pump は一つしかないので、予約される遅延リトライは常に高々一つです。
//!
//! # Sender task
//! pump から mpsc で受け取った順に `Transport::send` を一度 poll してから
//! `FuturesUnordered` に積みます。送信の開始は常に enqueue 順で、完了は並行に待ちます。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{DispatchConfig, DispatchStats, SendWindow};
use crate::domain::{PumpState, RequestDescriptor, RequestId, RequestState};
use crate::foreground::ForegroundGate;
use crate::ports::{Clock, Transport, TransportOutcome};

/// Result of `RequestDispatchQueue::enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended to the tail of the queue.
    Accepted,

    /// A request with the same id is already waiting. No-op.
    Duplicate,

    /// A request with the same id was already handed to the transport. No-op.
    AlreadyStarted,
}

/// What the pump should do next.
#[derive(Debug)]
enum Step {
    Send(RequestDescriptor),
    Delay(Duration),
    /// The host left the foreground after the gate opened.
    Backgrounded,
    Empty,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: u64,
    completed: u64,
    failed: u64,
    rate_limited: u64,
    delayed_retries: u64,
    last_dispatch_at: Option<DateTime<Utc>>,
}

/// Everything the critical section protects.
struct DispatchState {
    /// FIFO, index 0 is dispatched next.
    queue: VecDeque<RequestDescriptor>,

    /// Ids currently queued or in flight.
    tracked: HashMap<RequestId, RequestState>,

    window: SendWindow,
    pump: PumpState,
    counters: Counters,
}

impl DispatchState {
    fn new(config: &DispatchConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            tracked: HashMap::new(),
            window: SendWindow::new(config),
            pump: PumpState::Idle,
            counters: Counters::default(),
        }
    }

    fn admit(&mut self, request: RequestDescriptor) -> EnqueueOutcome {
        match self.tracked.get(&request.id()) {
            Some(RequestState::NotStarted) => EnqueueOutcome::Duplicate,
            Some(RequestState::InFlight) => EnqueueOutcome::AlreadyStarted,
            None => {
                self.tracked.insert(request.id(), RequestState::NotStarted);
                self.queue.push_back(request);
                EnqueueOutcome::Accepted
            }
        }
    }

    fn next_step(
        &mut self,
        foreground: bool,
        now: Instant,
        wall: DateTime<Utc>,
        tolerance: Duration,
    ) -> Step {
        if !foreground {
            return Step::Backgrounded;
        }

        let delay = self.window.required_delay(now);
        if delay > tolerance {
            self.pump = PumpState::Delaying;
            self.counters.delayed_retries += 1;
            return Step::Delay(delay);
        }

        let Some(request) = self.queue.pop_front() else {
            self.pump = PumpState::Idle;
            return Step::Empty;
        };

        self.window.record_send(now);
        self.tracked.insert(request.id(), RequestState::InFlight);
        self.pump = PumpState::Draining;
        self.counters.dispatched += 1;
        self.counters.last_dispatch_at = Some(wall);
        Step::Send(request)
    }

    fn end_delay(&mut self) {
        if self.pump.is_delaying() {
            self.pump = PumpState::Draining;
        }
    }

    /// Returns true when the outcome started a cooldown.
    fn finish(&mut self, id: RequestId, outcome: &TransportOutcome, now: Instant) -> bool {
        self.tracked.remove(&id);
        if outcome.is_rate_limited() {
            self.counters.rate_limited += 1;
            self.window.mark_rate_limited(now);
            return true;
        }
        match outcome {
            TransportOutcome::Failed(_) => self.counters.failed += 1,
            _ => self.counters.completed += 1,
        }
        false
    }

    fn in_flight(&self) -> usize {
        self.tracked
            .values()
            .filter(|state| **state == RequestState::InFlight)
            .count()
    }

    fn stats(&self, now: Instant) -> DispatchStats {
        DispatchStats {
            queued: self.queue.len(),
            in_flight: self.in_flight(),
            dispatched: self.counters.dispatched,
            completed: self.counters.completed,
            failed: self.counters.failed,
            rate_limited: self.counters.rate_limited,
            delayed_retries: self.counters.delayed_retries,
            pump_state: self.pump,
            sends_in_window: self.window.sends_within_window(now),
            cooldown_remaining_ms: self
                .window
                .cooldown_remaining(now)
                .map(|d| d.as_millis() as u64),
            last_dispatch_at: self.counters.last_dispatch_at,
        }
    }
}

struct Shared {
    state: Mutex<DispatchState>,
    wake: Notify,
    config: DispatchConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn Transport>,
    gate: ForegroundGate,
}

impl Shared {
    async fn has_pending(&self) -> bool {
        !self.state.lock().await.queue.is_empty()
    }

    async fn attempt_dispatch(&self) -> Step {
        let mut state = self.state.lock().await;
        state.next_step(
            self.gate.is_foreground(),
            self.clock.now(),
            self.clock.utc_now(),
            self.config.delay_tolerance(),
        )
    }

    async fn end_delay(&self) {
        self.state.lock().await.end_delay();
    }

    async fn mark_rate_limited(&self) {
        let now = self.clock.now();
        self.state.lock().await.window.mark_rate_limited(now);
        info!(
            cooldown_ms = self.config.cooldown_ms,
            "rate limit reported, pausing dispatch"
        );
    }

    async fn complete(&self, id: RequestId, outcome: TransportOutcome) {
        let now = self.clock.now();
        let cooling_down = self.state.lock().await.finish(id, &outcome, now);

        if cooling_down {
            info!(
                request_id = %id,
                cooldown_ms = self.config.cooldown_ms,
                "server rejected request for exceeding its rate limit, pausing dispatch"
            );
        } else if let TransportOutcome::Failed(err) = &outcome {
            warn!(request_id = %id, error = %err, "request failed in transport");
        } else {
            debug!(request_id = %id, ?outcome, "request completed");
        }
    }
}

/// Serializes, throttles and schedules outbound requests.
///
/// - リクエストは enqueue 順（FIFO）に送信される
/// - 直近 `evaluation_window` に `allowed_requests_per_window` 件を超えて送らない
/// - レート制限の通知を受けたら `cooldown` の間は送らない
/// - ホストが背面の間は一切送らない
///
/// 構築は `app::DispatcherBuilder` から行います。
pub struct RequestDispatchQueue {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    pump: JoinHandle<()>,
}

impl RequestDispatchQueue {
    pub(crate) fn spawn(
        config: DispatchConfig,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
        gate: ForegroundGate,
        runtime: &Handle,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(DispatchState::new(&config)),
            wake: Notify::new(),
            config,
            clock,
            transport,
            gate,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();
        runtime.spawn(send_loop(Arc::clone(&shared), handoff_rx));
        let pump = runtime.spawn(pump_loop(Arc::clone(&shared), handoff_tx, shutdown_rx));

        Self {
            shared,
            shutdown_tx,
            pump,
        }
    }

    /// Submit a request. Fire-and-forget: the request is dispatched eventually.
    pub async fn enqueue(&self, request: RequestDescriptor) -> EnqueueOutcome {
        let id = request.id();
        let outcome = self.shared.state.lock().await.admit(request);

        match outcome {
            EnqueueOutcome::Accepted => {
                debug!(request_id = %id, "request enqueued");
                self.shared.wake.notify_one();
            }
            _ => debug!(request_id = %id, ?outcome, "enqueue ignored"),
        }
        outcome
    }

    /// Report that the server rejected a request for exceeding its rate limit.
    ///
    /// Rejections seen by the queue's own transport calls are reported automatically.
    pub async fn notify_rate_limited(&self) {
        self.shared.mark_rate_limited().await;
    }

    pub async fn stats(&self) -> DispatchStats {
        let now = self.shared.clock.now();
        self.shared.state.lock().await.stats(now)
    }

    pub async fn queued_len(&self) -> usize {
        self.shared.state.lock().await.queue.len()
    }

    pub async fn pump_state(&self) -> PumpState {
        self.shared.state.lock().await.pump
    }

    /// `None` once the transport has reported an outcome (or for unknown ids).
    pub async fn request_state(&self, id: RequestId) -> Option<RequestState> {
        self.shared.state.lock().await.tracked.get(&id).copied()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.shared.config
    }

    pub fn gate(&self) -> &ForegroundGate {
        &self.shared.gate
    }

    /// Stop the pump and wait for it to exit.
    ///
    /// Queued requests are left unsent; requests already handed to the transport
    /// run to completion in the background.
    pub async fn shutdown_and_join(self) {
        // ignore send error: the pump may already be gone
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.pump.await {
            warn!(error = %e, "dispatch pump ended abnormally");
        }
    }
}

async fn pump_loop(
    shared: Arc<Shared>,
    handoff: mpsc::UnboundedSender<RequestDescriptor>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Idle: 仕事が来るまで待つ
        if !shared.has_pending().await {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shared.wake.notified() => {}
            }
            continue;
        }

        // 背面の間はここで止まる
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = shared.gate.wait_foreground() => {}
        }

        match shared.attempt_dispatch().await {
            Step::Send(request) => {
                debug!(request = %request, "dispatching request");
                if handoff.send(request).is_err() {
                    warn!("request sender stopped, dispatch pump exiting");
                    break;
                }
            }
            Step::Delay(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "rate limit window full, delaying dispatch");
                let closed = tokio::select! {
                    changed = shutdown_rx.changed() => changed.is_err(),
                    _ = tokio::time::sleep(delay) => false,
                };
                shared.end_delay().await;
                if closed {
                    break;
                }
            }
            Step::Backgrounded | Step::Empty => {}
        }
    }
    debug!("dispatch pump stopped");
}

/// 渡された順に送信を開始し、完了を並行に待つ
async fn send_loop(shared: Arc<Shared>, mut handoff: mpsc::UnboundedReceiver<RequestDescriptor>) {
    let transport = Arc::clone(&shared.transport);
    let transport = &transport;
    let mut in_flight = FuturesUnordered::new();
    let mut open = true;

    while open || !in_flight.is_empty() {
        tokio::select! {
            received = handoff.recv(), if open => {
                let Some(request) = received else {
                    open = false;
                    continue;
                };
                let id = request.id();
                let mut send = Box::pin(async move { (id, transport.send(request).await) });
                // 次の request を受け取る前に一度 poll して送信を開始させる
                match (&mut send).now_or_never() {
                    Some((id, outcome)) => shared.complete(id, outcome).await,
                    None => in_flight.push(send),
                }
            }
            Some((id, outcome)) = in_flight.next() => shared.complete(id, outcome).await,
        }
    }
    debug!("request sender stopped");
}
