//! IdGenerator port - RequestId 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::RequestId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は新しい RequestId を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の call site から使える）
pub trait IdGenerator: Send + Sync {
    fn generate_request_id(&self) -> RequestId;
}

/// UlidGenerator は Clock の壁時計を timestamp 部分に使う
///
/// テスト時に ManualClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_request_id(&self) -> RequestId {
        let timestamp_ms = self.clock.utc_now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        RequestId::from(ulid)
    }
}
