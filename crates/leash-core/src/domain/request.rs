//! RequestDescriptor - 送信前のリクエスト
//!
//! キューに渡すのは「まだ始まっていない通信タスク」そのものではなく、
//! 不変のデータ（descriptor）です。in-flight の handle はキュー側が作って所有します。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::RequestId;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Immutable description of one outbound request.
///
/// # 設計
/// - body の中身はキューにとって opaque（JSON スキーマは transport 層の責務）
/// - `id` は重複 enqueue の検出にだけ使う
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    id: RequestId,
    method: HttpMethod,
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(id: RequestId, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id,
            method,
            path: path.into(),
            body: None,
        }
    }

    /// JSON body を付与
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.method, self.path, self.id)
    }
}
