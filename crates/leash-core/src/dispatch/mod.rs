//! Dispatch - 送信のアドミッション制御
//!
//! - **config**: レート制限のパラメータ（N, W, C）
//! - **window**: 送信履歴と cooldown から「あと何秒待つか」を計算
//! - **queue**: RequestDispatchQueue 本体（pump の状態機械）
//! - **stats**: 観測用のスナップショット

mod config;
mod queue;
mod stats;
mod window;

pub use config::DispatchConfig;
pub use queue::{EnqueueOutcome, RequestDispatchQueue};
pub use stats::DispatchStats;
pub use window::SendWindow;
