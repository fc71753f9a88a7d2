//! Transport port - 実際に HTTP を送る層
//!
//! キューが決めるのは「いつ transport に渡すか」だけです。
//! タイムアウト、HTTP エラー、失敗したリクエストの再送はすべて transport 側の責務。

use async_trait::async_trait;

use crate::domain::{RequestDescriptor, TransportError};

/// HTTP status the server uses for "rate limit exceeded".
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Result of handing one request to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The server answered (any status other than 429).
    Completed { status: u16 },

    /// The server explicitly rejected the request for exceeding its rate limit.
    RateLimited,

    /// The request never produced a usable response.
    Failed(TransportError),
}

impl TransportOutcome {
    /// status code から outcome を作る（429 は RateLimited）
    pub fn from_status(status: u16) -> Self {
        if status == TOO_MANY_REQUESTS {
            TransportOutcome::RateLimited
        } else {
            TransportOutcome::Completed { status }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            TransportOutcome::RateLimited => true,
            TransportOutcome::Completed { status } => *status == TOO_MANY_REQUESTS,
            TransportOutcome::Failed(TransportError::Status(status)) => {
                *status == TOO_MANY_REQUESTS
            }
            TransportOutcome::Failed(_) => false,
        }
    }
}

/// Transport は descriptor を受け取って送信する
///
/// # 送信順序
/// - キューは enqueue 順に `send` を呼び、返った future をその場で一度 poll する
/// - 最初の `.await` より前の処理（と最初の poll で進む分）が enqueue 順に実行される
///
/// # Thread Safety
/// - 完了はキューの sender task 上で並行に待たれるので `Send + Sync` が必要
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> TransportOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransportOutcome::from_status(200), false)]
    #[case(TransportOutcome::from_status(429), true)]
    #[case(TransportOutcome::Completed { status: 429 }, true)]
    #[case(TransportOutcome::Failed(TransportError::Status(429)), true)]
    #[case(TransportOutcome::Failed(TransportError::Status(500)), false)]
    #[case(TransportOutcome::Failed(TransportError::Timeout), false)]
    fn detects_rate_limit_rejections(#[case] outcome: TransportOutcome, #[case] expected: bool) {
        assert_eq!(outcome.is_rate_limited(), expected);
    }
}
