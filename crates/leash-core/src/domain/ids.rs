//! Request identifiers.
//!
//! # ULID ベースの ID
//! RequestId は ULID を包んだ newtype です。
//! - **時刻でソート可能**: 生成順に並ぶので、ログで追いやすい
//! - **調整なしで生成可能**: 複数の call site から同時に作っても衝突しない
//!
//! ID は重複 enqueue の検出にだけ使われます（送信順序には使わない）。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a pending request.
///
/// 同じ RequestId がキューに二つ並ぶことはありません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Ulid);

impl RequestId {
    /// ULID から RequestId を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for RequestId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_request_prefix() {
        let ulid = Ulid::new();
        let id = RequestId::from_ulid(ulid);
        assert_eq!(id.to_string(), format!("req-{ulid}"));
    }

    #[test]
    fn request_ids_are_sortable() {
        let id1 = RequestId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2)); // 時刻が進むのを待つ
        let id2 = RequestId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id: RequestId = ulid.into();

        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, format!("\"{ulid}\""));

        let deserialized: RequestId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, id);
    }
}
