//! DispatcherBuilder - dispatch キューの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 設定の不備は spawn 時に BuildError になる

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::dispatch::{DispatchConfig, RequestDispatchQueue};
use crate::domain::BuildError;
use crate::foreground::ForegroundGate;
use crate::ports::{Clock, HostLifecycle, SystemClock, Transport};

/// DispatcherBuilder は RequestDispatchQueue を構築
///
/// # 使用例
/// ```ignore
/// let queue = DispatcherBuilder::new()
///     .transport(Arc::new(HttpTransport::new(client)))
///     .lifecycle(lifecycle.clone())
///     .spawn()?;
/// queue.enqueue(request).await;
/// ```
///
/// # Fail-fast 設計
/// - transport と lifecycle は必須
/// - 設定値は spawn() 時に検証
/// - Tokio runtime の外で spawn() すると BuildError::NoRuntime
pub struct DispatcherBuilder {
    config: DispatchConfig,
    clock: Arc<dyn Clock>,
    transport: Option<Arc<dyn Transport>>,
    lifecycle: Option<Arc<dyn HostLifecycle>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::default(),
            clock: Arc::new(SystemClock),
            transport: None,
            lifecycle: None,
        }
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock を差し替える（単調時刻は tokio の時刻源と揃えること）
    /// 差し替える clock は tokio の時刻と一緒に進むこと（遅延は `tokio::time::sleep` で待つ）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn lifecycle(mut self, lifecycle: Arc<dyn HostLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// 検証してから pump task を起動
    pub fn spawn(self) -> Result<RequestDispatchQueue, BuildError> {
        self.config.validate()?;
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        let lifecycle = self.lifecycle.ok_or(BuildError::MissingLifecycle)?;
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let gate = ForegroundGate::new(lifecycle, runtime.clone());
        Ok(RequestDispatchQueue::spawn(
            self.config,
            self.clock,
            transport,
            gate,
            &runtime,
        ))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
