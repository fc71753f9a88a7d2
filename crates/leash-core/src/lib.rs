//! leash-core
//!
//! Outbound request admission control for the dog-care sync client.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request descriptor, state, errors）
//! - **ports**: 抽象化レイヤー（Clock, HostLifecycle, Transport, IdGenerator）
//! - **foreground**: ForegroundGate（ホストが前面のときだけ仕事を走らせる）
//! - **dispatch**: RequestDispatchQueue（レート制限付きの送信キュー）
//! - **app**: DispatcherBuilder（構築とワイヤリング）
//! - **impls**: ports の実装（WatchLifecycle）

pub mod app;
pub mod dispatch;
pub mod domain;
pub mod foreground;
pub mod impls;
pub mod ports;

pub use app::DispatcherBuilder;
pub use dispatch::{DispatchConfig, DispatchStats, EnqueueOutcome, RequestDispatchQueue};
pub use foreground::ForegroundGate;
