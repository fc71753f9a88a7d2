use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PumpState;

/// Point-in-time view of the dispatch queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub queued: usize,
    pub in_flight: usize,
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub rate_limited: u64,
    /// Delayed retries the pump has scheduled so far.
    pub delayed_retries: u64,
    pub pump_state: PumpState,
    pub sends_in_window: usize,
    pub cooldown_remaining_ms: Option<u64>,
    pub last_dispatch_at: Option<DateTime<Utc>>,
}
