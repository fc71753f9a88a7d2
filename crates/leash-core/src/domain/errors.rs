//! Errors - エラー型
//!
//! dispatch キュー自体はエラーを返しません（enqueue は fire-and-forget）。
//! ここにあるのは周辺（transport, 設定, 構築）のエラーです。

use thiserror::Error;

/// TransportError は transport 層が報告する失敗
///
/// キューは失敗したリクエストを再送しません。ログと統計に残すだけです。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("no internet connection")]
    NoConnection,

    #[error("request timed out")]
    Timeout,

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// ConfigError は DispatchConfig の検証エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("allowed_requests_per_window must be at least 1")]
    ZeroAllowedRequests,

    #[error("evaluation_window_ms must be greater than zero")]
    ZeroEvaluationWindow,

    #[error("invalid dispatch config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// BuildError は dispatcher 構築時のエラー
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no transport was provided")]
    MissingTransport,

    #[error("no host lifecycle was provided")]
    MissingLifecycle,

    #[error("dispatcher must be spawned inside a Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
