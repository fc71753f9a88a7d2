//! State - リクエスト・pump・ホストの状態

use serde::{Deserialize, Serialize};

/// RequestState はキューから見たリクエストの状態
///
/// # 状態遷移
/// - NotStarted -> InFlight -> (transport が完了を報告)
///
/// 完了した ID はキューから忘れられ、再投入できるようになります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Queued, not yet handed to the transport.
    NotStarted,

    /// Handed to the transport, waiting for its outcome.
    InFlight,
}

/// PumpState は dispatch pump の状態機械
///
/// # 状態遷移
/// - Idle -> Draining: enqueue で起こされる
/// - Draining -> Delaying: レート制限にかかりそう、または cooldown 中
/// - Delaying -> Draining: 遅延が経過
/// - Draining -> Idle: キューが空になった
///
/// `Delaying` の間は遅延リトライがちょうど一つだけ予約されています。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpState {
    #[default]
    Idle,
    Delaying,
    Draining,
}

impl PumpState {
    /// `delayInProgress` 相当
    pub fn is_delaying(self) -> bool {
        matches!(self, PumpState::Delaying)
    }
}

/// AppPhase はホストプロセスの前面/背面状態
///
/// `Foreground` 以外はすべて「送信してはいけない」状態として扱います。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppPhase {
    Foreground,
    /// Visible but not receiving events (e.g. during a system overlay).
    Inactive,
    Background,
}

impl AppPhase {
    pub fn is_foreground(self) -> bool {
        matches!(self, AppPhase::Foreground)
    }
}
