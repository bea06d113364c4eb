//! ArchiveBuilder - 作成途中の tar.gz アーカイブ
//!
//! メモリ上の `Vec<u8>` に gzip + tar のストリームを書き込んでいく。
//! メンバーを追加するたびに gzip を sync flush するので、
//! `current_size()` は常に「ここまでの圧縮後サイズ」を正確に返す。

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{ArchiveId, LocalDataFile};
use crate::error::PusherError;

/// 全メンバー共通のパーミッション
pub const MEMBER_MODE: u32 = 0o666;

/// SealedArchive は封をされた（これ以上メンバーを追加できない）アーカイブ
///
/// `payload` は単体で展開できる完全な tar.gz。
#[derive(Debug)]
pub struct SealedArchive {
    pub id: ArchiveId,
    pub payload: Vec<u8>,
    pub members: Vec<LocalDataFile>,
    pub logical_bytes: u64,
}

/// ArchiveSink は圧縮後のバイト列の書き込み先
///
/// 通常は `Vec<u8>`。書き込みに失敗する sink を差し込むと
/// Fatal なエラー経路を再現できる。
pub trait ArchiveSink: Write + Send {
    /// ここまでに書き込まれたバイト数
    fn written(&self) -> u64;

    fn into_payload(self) -> Vec<u8>;
}

impl ArchiveSink for Vec<u8> {
    fn written(&self) -> u64 {
        self.len() as u64
    }

    fn into_payload(self) -> Vec<u8> {
        self
    }
}

/// ArchiveBuilder は 1 つのバッチを組み立てる
///
/// # 状態
/// - メンバー 0 件: deadline なし、seal 不可
/// - メンバー 1 件以上: 最初の add 時に deadline が 1 回だけ設定される
pub struct ArchiveBuilder<S: ArchiveSink = Vec<u8>> {
    id: ArchiveId,
    root: PathBuf,
    age_threshold: Duration,
    writer: tar::Builder<GzEncoder<S>>,
    members: Vec<LocalDataFile>,
    logical_bytes: u64,
    deadline: Option<Instant>,
}

impl ArchiveBuilder {
    /// メモリ上に書き込む空のアーカイブを作成
    ///
    /// `root` はメンバー名を作るときに取り除くプレフィックス。
    pub fn new(root: impl Into<PathBuf>, age_threshold: Duration) -> Self {
        Self::with_sink(root, age_threshold, Vec::new())
    }
}

impl<S: ArchiveSink> ArchiveBuilder<S> {
    pub fn with_sink(root: impl Into<PathBuf>, age_threshold: Duration, sink: S) -> Self {
        let encoder = GzEncoder::new(sink, Compression::default());
        Self {
            id: ArchiveId::generate(),
            root: root.into(),
            age_threshold,
            writer: tar::Builder::new(encoder),
            members: Vec::new(),
            logical_bytes: 0,
            deadline: None,
        }
    }

    pub fn id(&self) -> ArchiveId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// 最初のメンバーから age 閾値が経過する時刻（空なら None）
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// ここまでの圧縮後バイト数
    pub fn current_size(&self) -> u64 {
        self.writer.get_ref().get_ref().written()
    }

    /// ファイルを読み込んでメンバーとして追加
    ///
    /// # エラー
    /// - 読み込み失敗・メンバー名が作れない: `ErrorKind::Skip`。アーカイブは変化しない
    /// - tar/gzip への書き込み失敗: `ErrorKind::Fatal`。以降このアーカイブは使えない
    pub async fn add(&mut self, file: LocalDataFile) -> Result<(), PusherError> {
        let name = member_name(&self.root, file.path()).ok_or_else(|| {
            PusherError::InvalidMemberName {
                path: file.path().to_path_buf(),
            }
        })?;

        let contents =
            tokio::fs::read(file.path())
                .await
                .map_err(|source| PusherError::ReadFailed {
                    path: file.path().to_path_buf(),
                    source,
                })?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(MEMBER_MODE);
        header.set_size(contents.len() as u64);
        header.set_mtime(Utc::now().timestamp().max(0) as u64);

        self.writer
            .append_data(&mut header, &name, contents.as_slice())
            .map_err(|e| {
                PusherError::archive_write(format!("appending {}", file.path().display()), e)
            })?;
        // sync flush so that current_size() reflects everything written so far
        self.writer
            .get_mut()
            .flush()
            .map_err(|e| PusherError::archive_write("flushing gzip stream", e))?;

        if self.members.is_empty() {
            self.deadline = Some(Instant::now() + self.age_threshold);
        }
        self.logical_bytes += contents.len() as u64;
        debug!(
            archive = %self.id,
            path = %file.path().display(),
            member = %name.display(),
            bytes = contents.len(),
            compressed_total = self.current_size(),
            "added archive member"
        );
        self.members.push(file);
        Ok(())
    }

    /// tar と gzip を閉じて完成した payload を返す
    pub fn seal(self) -> Result<SealedArchive, PusherError> {
        if self.members.is_empty() {
            return Err(PusherError::EmptyArchive);
        }

        let encoder = self
            .writer
            .into_inner()
            .map_err(|e| PusherError::archive_write("finishing tar stream", e))?;
        let payload = encoder
            .finish()
            .map_err(|e| PusherError::archive_write("finishing gzip stream", e))?
            .into_payload();

        Ok(SealedArchive {
            id: self.id,
            payload,
            members: self.members,
            logical_bytes: self.logical_bytes,
        })
    }
}

/// 絶対パスから root を取り除いたアーカイブ内の名前
///
/// root の外にあるファイルは先頭の区切り文字だけ落として使う。
/// `..` を含む場合や空になる場合は None。
fn member_name(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut name = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => name.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return None,
        }
    }
    if name.as_os_str().is_empty() {
        None
    } else {
        Some(name)
    }
}

/// 書き込みが必ず失敗する sink
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct BrokenSink;

#[cfg(test)]
impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("device full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl ArchiveSink for BrokenSink {
    fn written(&self) -> u64 {
        0
    }

    fn into_payload(self) -> Vec<u8> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, rel: &str, contents: &[u8]) -> LocalDataFile {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        LocalDataFile::new(path)
    }

    fn unpack(payload: &[u8]) -> Vec<(String, u32, Vec<u8>)> {
        let mut archive = tar::Archive::new(GzDecoder::new(payload));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mode = entry.header().mode().unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (name, mode, body)
            })
            .collect()
    }

    #[test]
    fn member_name_strips_root() {
        let root = Path::new("/var/spool/ndt/");
        assert_eq!(
            member_name(root, Path::new("/var/spool/ndt/2024/01/a.json")),
            Some(PathBuf::from("2024/01/a.json"))
        );
        assert_eq!(
            member_name(root, Path::new("/elsewhere/b.json")),
            Some(PathBuf::from("elsewhere/b.json"))
        );
        assert_eq!(member_name(root, Path::new("/var/spool/ndt/")), None);
        assert_eq!(member_name(root, Path::new("/var/spool/ndt/../x")), None);
    }

    #[tokio::test]
    async fn sealed_archive_round_trips_in_insertion_order() {
        let dir = TempDir::new().unwrap();
        let f1 = write_file(&dir, "2024/01/one.json", b"{\"first\":true}");
        let f2 = write_file(&dir, "two.bin", &[0u8, 1, 2, 3, 255]);

        let mut archive = ArchiveBuilder::new(dir.path(), Duration::from_secs(60));
        archive.add(f1.clone()).await.unwrap();
        archive.add(f2.clone()).await.unwrap();
        let sealed = archive.seal().unwrap();

        assert_eq!(sealed.members, vec![f1, f2]);
        assert_eq!(sealed.logical_bytes, 14 + 5);

        let entries = unpack(&sealed.payload);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "2024/01/one.json");
        assert_eq!(entries[0].1, MEMBER_MODE);
        assert_eq!(entries[0].2, b"{\"first\":true}");
        assert_eq!(entries[1].0, "two.bin");
        assert_eq!(entries[1].2, vec![0u8, 1, 2, 3, 255]);
    }

    #[tokio::test]
    async fn current_size_grows_with_each_member() {
        let dir = TempDir::new().unwrap();
        let mut archive = ArchiveBuilder::new(dir.path(), Duration::from_secs(60));
        assert_eq!(archive.current_size(), 0);

        archive
            .add(write_file(&dir, "a", &[7u8; 4096]))
            .await
            .unwrap();
        let after_first = archive.current_size();
        assert!(after_first > 0);

        archive
            .add(write_file(&dir, "b", &[9u8; 4096]))
            .await
            .unwrap();
        assert!(archive.current_size() > after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_armed_once_on_first_member() {
        let dir = TempDir::new().unwrap();
        let age = Duration::from_secs(10);
        let mut archive = ArchiveBuilder::new(dir.path(), age);
        assert!(archive.deadline().is_none());

        let start = Instant::now();
        archive.add(write_file(&dir, "a", b"a")).await.unwrap();
        let deadline = archive.deadline().unwrap();
        assert!(deadline >= start + age);

        tokio::time::advance(Duration::from_secs(3)).await;
        archive.add(write_file(&dir, "b", b"b")).await.unwrap();
        assert_eq!(archive.deadline(), Some(deadline));
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped_and_archive_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut archive = ArchiveBuilder::new(dir.path(), Duration::from_secs(60));

        let missing = LocalDataFile::new(dir.path().join("missing.json"));
        let err = archive.add(missing).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Skip);
        assert!(archive.is_empty());
        assert!(archive.deadline().is_none());
        assert_eq!(archive.current_size(), 0);
    }

    #[tokio::test]
    async fn parent_dir_member_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut archive = ArchiveBuilder::new(dir.path(), Duration::from_secs(60));

        let sneaky = LocalDataFile::new(dir.path().join("..").join("x"));
        let err = archive.add(sneaky).await.unwrap_err();
        assert!(matches!(err, PusherError::InvalidMemberName { .. }));
        assert!(archive.is_empty());
    }

    #[tokio::test]
    async fn sink_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut archive =
            ArchiveBuilder::with_sink(dir.path(), Duration::from_secs(60), BrokenSink);

        let err = archive
            .add(write_file(&dir, "a.json", b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, PusherError::ArchiveWrite { .. }));
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(archive.is_empty());
    }

    #[test]
    fn sealing_empty_archive_is_rejected() {
        let archive = ArchiveBuilder::new("/tmp", Duration::from_secs(1));
        assert!(matches!(archive.seal(), Err(PusherError::EmptyArchive)));
    }
}
