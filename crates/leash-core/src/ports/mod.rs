//! Ports - 抽象化レイヤー
//!
//! dispatch キューが依存する外部のもの（時刻、ホストの前面状態、transport）を
//! trait として定義します。実装はホスト側、または `impls` にあります。

pub mod clock;
pub mod id_generator;
pub mod lifecycle;
pub mod transport;

#[cfg(test)]
pub(crate) use self::clock::ManualClock;
pub use self::clock::{Clock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::lifecycle::HostLifecycle;
pub use self::transport::{TOO_MANY_REQUESTS, Transport, TransportOutcome};
