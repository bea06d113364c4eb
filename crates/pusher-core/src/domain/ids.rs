//! Archive identifiers.
//!
//! アーカイブごとに ULID を振り、ログで同じバッチを追えるようにする。
//! ULID は生成時刻でソートできるので、ログ上の順序とも一致する。

use std::fmt;
use ulid::Ulid;

/// ArchiveId は 1 つのバッチ（アーカイブ）を識別する
///
/// Display は `archive-<ULID>` 形式。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(Ulid);

impl ArchiveId {
    /// 現在時刻ベースの新しい ID を生成
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for ArchiveId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_prefix() {
        let ulid = Ulid::new();
        let id = ArchiveId::from_ulid(ulid);
        assert_eq!(id.to_string(), format!("archive-{ulid}"));
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let id1 = ArchiveId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = ArchiveId::generate();
        assert!(id1 < id2);
    }
}
