//! Single-member extraction with private scratch storage.
//!
//! Each extraction gets its own scratch subdirectory named after a fresh
//! UUID. The directory is owned by a [`ScratchDir`] guard that travels
//! inside the returned byte stream, so it is removed when the stream is
//! dropped: after the last byte is sent, when the client disconnects, or
//! immediately if extraction fails.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tempfile::TempDir;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use isoshelf_core::error::{Result, ShelfError};
use isoshelf_core::{ImageHandle, ShelfConfig};

use crate::path::PathNormalizer;
use crate::reader::ArchiveReader;

/// Private, uniquely named scratch directory for one extraction.
///
/// Removed recursively on drop.
#[derive(Debug)]
pub struct ScratchDir {
    id: Uuid,
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create a new scratch subdirectory under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}.", id))
            .tempdir_in(root)?;

        tracing::debug!(id = %id, path = %dir.path().display(), "Created scratch directory");
        Ok(Self { id, dir: Some(dir) })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::debug!(id = %self.id, "Removed scratch directory"),
                Err(e) => tracing::warn!(
                    id = %self.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                ),
            }
        }
    }
}

pin_project! {
    /// Byte stream of an extracted member.
    ///
    /// Holds the scratch directory until the stream is dropped. The file
    /// is declared first so it is closed before the directory is removed.
    pub struct ExtractedStream {
        #[pin]
        inner: ReaderStream<File>,
        scratch: ScratchDir,
    }
}

impl ExtractedStream {
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

impl Stream for ExtractedStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// A member extracted and ready for delivery.
pub struct ExtractedFile {
    /// Basename of the member, used as the attachment file name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Content; dropping it removes the scratch directory
    pub stream: ExtractedStream,
}

/// Extraction engine.
pub struct Extractor {
    reader: Arc<dyn ArchiveReader>,
    normalizer: PathNormalizer,
    scratch_root: PathBuf,
}

impl Extractor {
    pub fn new(
        reader: Arc<dyn ArchiveReader>,
        normalizer: PathNormalizer,
        scratch_root: &Path,
    ) -> Self {
        Self {
            reader,
            normalizer,
            scratch_root: scratch_root.to_path_buf(),
        }
    }

    pub fn from_config(config: &ShelfConfig, reader: Arc<dyn ArchiveReader>) -> Self {
        Self::new(
            reader,
            PathNormalizer::new(&config.format),
            &config.scratch_dir,
        )
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Extract the member at `raw_path` from `image`.
    ///
    /// Fails with `InvalidPath` before touching the filesystem if the path
    /// is malformed or names the image root, `NotFound` if the image file
    /// is gone, `IoError` if the image cannot be checked or the scratch
    /// directory cannot be created, and `ExtractionFailed` if the member
    /// cannot be produced.
    pub async fn extract(&self, image: &ImageHandle, raw_path: &str) -> Result<ExtractedFile> {
        let path = self.normalizer.normalize(raw_path)?;
        if path.is_root() {
            return Err(ShelfError::InvalidPath(
                "the image root is not a file".to_string(),
            ));
        }

        if !tokio::fs::try_exists(&image.path).await? {
            return Err(ShelfError::NotFound(format!("image {}", image.name)));
        }

        let internal = if self.normalizer.is_case_insensitive() {
            self.find_member(image, &path.internal()).await?
        } else {
            path.internal()
        };
        let name = internal.rsplit('/').next().unwrap_or_default().to_string();

        let root = self.scratch_root.clone();
        let scratch = tokio::task::spawn_blocking(move || -> Result<ScratchDir> {
            std::fs::create_dir_all(&root)?;
            ScratchDir::create(&root)
        })
        .await
        .map_err(|e| ShelfError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        tracing::debug!(
            image = %image.name,
            path = %internal,
            job = %scratch.id(),
            "Extracting archive member"
        );

        let extracted = self
            .reader
            .extract_file(image, &internal, scratch.path())
            .await?;
        let file = File::open(&extracted).await?;
        let size = file.metadata().await?.len();

        tracing::info!(
            image = %image.name,
            path = %internal,
            job = %scratch.id(),
            size,
            "Extracted archive member"
        );

        Ok(ExtractedFile {
            name,
            size,
            stream: ExtractedStream {
                inner: ReaderStream::new(file),
                scratch,
            },
        })
    }

    /// Listed name of the member whose folded path is `folded`.
    async fn find_member(&self, image: &ImageHandle, folded: &str) -> Result<String> {
        let entries = self.reader.list_entries(image).await?;
        entries
            .into_iter()
            .map(|entry| entry.path)
            .find(|path| self.normalizer.fold(path) == folded)
            .ok_or_else(|| ShelfError::ExtractionFailed {
                image: image.name.clone(),
                path: folded.to_string(),
                message: "member not found in archive".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use isoshelf_core::ArchiveEntry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Reader serving members from an in-memory table.
    #[derive(Default)]
    struct TableReader {
        members: Vec<(&'static str, &'static [u8])>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ArchiveReader for TableReader {
        async fn list_entries(&self, _image: &ImageHandle) -> Result<Vec<ArchiveEntry>> {
            Ok(self
                .members
                .iter()
                .map(|(p, c)| ArchiveEntry::new(*p, c.len() as u64))
                .collect())
        }

        async fn extract_file(
            &self,
            image: &ImageHandle,
            internal_path: &str,
            dest: &Path,
        ) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failed = |message: &str| ShelfError::ExtractionFailed {
                image: image.name.clone(),
                path: internal_path.to_string(),
                message: message.to_string(),
            };
            if self.fail {
                return Err(failed("tool exited with 2"));
            }
            let (_, content) = self
                .members
                .iter()
                .find(|(p, _)| *p == internal_path)
                .ok_or_else(|| failed("member not found"))?;
            let target = dest.join(internal_path);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(&target, content).unwrap();
            Ok(target)
        }
    }

    struct Fixture {
        _tmp: TempDir,
        image: ImageHandle,
        scratch_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ubuntu.iso");
        std::fs::write(&path, b"iso").unwrap();
        let scratch_root = tmp.path().join("scratch");
        Fixture {
            image: ImageHandle {
                name: "ubuntu".to_string(),
                file_name: "ubuntu.iso".to_string(),
                path,
            },
            scratch_root,
            _tmp: tmp,
        }
    }

    fn extractor(reader: Arc<TableReader>, scratch_root: &Path) -> Extractor {
        Extractor::new(reader, PathNormalizer::default(), scratch_root)
    }

    fn grub_reader() -> Arc<TableReader> {
        Arc::new(TableReader {
            members: vec![("boot/grub/grub.cfg", &b"set timeout=5\n"[..])],
            ..Default::default()
        })
    }

    fn scratch_entries(root: &Path) -> usize {
        std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    async fn collect(stream: ExtractedStream) -> Vec<u8> {
        let chunks: Vec<_> = stream.collect().await;
        chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect()
    }

    #[tokio::test]
    async fn test_extract_returns_member_bytes() {
        let fx = fixture();
        let engine = extractor(grub_reader(), &fx.scratch_root);

        let file = engine
            .extract(&fx.image, "/boot/grub/grub.cfg")
            .await
            .unwrap();
        assert_eq!(file.name, "grub.cfg");
        assert_eq!(file.size, 14);
        assert_eq!(collect(file.stream).await, b"set timeout=5\n");
    }

    #[tokio::test]
    async fn test_scratch_removed_after_delivery() {
        let fx = fixture();
        let engine = extractor(grub_reader(), &fx.scratch_root);

        let file = engine.extract(&fx.image, "boot/grub/grub.cfg").await.unwrap();
        let scratch = file.stream.scratch_path().to_path_buf();
        assert!(scratch.starts_with(&fx.scratch_root));
        assert!(scratch.is_dir());

        collect(file.stream).await;
        assert!(!scratch.exists());
        assert_eq!(scratch_entries(&fx.scratch_root), 0);
    }

    #[tokio::test]
    async fn test_scratch_removed_when_stream_abandoned() {
        let fx = fixture();
        let engine = extractor(grub_reader(), &fx.scratch_root);

        let file = engine.extract(&fx.image, "boot/grub/grub.cfg").await.unwrap();
        let scratch = file.stream.scratch_path().to_path_buf();
        drop(file);
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_scratch_removed_after_failure() {
        let fx = fixture();
        let engine = extractor(grub_reader(), &fx.scratch_root);

        let err = engine.extract(&fx.image, "missing.txt").await.err().unwrap();
        assert!(matches!(err, ShelfError::ExtractionFailed { .. }));
        assert_eq!(scratch_entries(&fx.scratch_root), 0);

        let failing = Arc::new(TableReader {
            fail: true,
            ..Default::default()
        });
        let engine = extractor(failing, &fx.scratch_root);
        assert!(engine.extract(&fx.image, "a").await.is_err());
        assert_eq!(scratch_entries(&fx.scratch_root), 0);
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_reader() {
        let fx = fixture();
        let reader = grub_reader();
        let engine = extractor(reader.clone(), &fx.scratch_root);

        let err = engine.extract(&fx.image, "a/../../etc/passwd").await.err().unwrap();
        assert!(matches!(err, ShelfError::InvalidPath(_)));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
        assert!(!fx.scratch_root.exists());
    }

    #[tokio::test]
    async fn test_root_is_not_extractable() {
        let fx = fixture();
        let engine = extractor(grub_reader(), &fx.scratch_root);
        let err = engine.extract(&fx.image, "/").await.err().unwrap();
        assert!(matches!(err, ShelfError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_missing_image_is_not_found() {
        let fx = fixture();
        let reader = grub_reader();
        let engine = extractor(reader.clone(), &fx.scratch_root);
        std::fs::remove_file(&fx.image.path).unwrap();

        let err = engine.extract(&fx.image, "boot/grub/grub.cfg").await.err().unwrap();
        assert!(matches!(err, ShelfError::NotFound(_)));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unwritable_scratch_root_is_io_error() {
        let fx = fixture();
        let blocker = fx.scratch_root.clone();
        std::fs::write(&blocker, b"a file, not a directory").unwrap();
        let engine = extractor(grub_reader(), &blocker);

        let err = engine.extract(&fx.image, "boot/grub/grub.cfg").await.err().unwrap();
        assert!(matches!(err, ShelfError::IoError(_)));
    }

    #[tokio::test]
    async fn test_concurrent_jobs_use_distinct_scratch_dirs() {
        let fx = fixture();
        let engine = extractor(grub_reader(), &fx.scratch_root);

        let (a, b) = tokio::join!(
            engine.extract(&fx.image, "boot/grub/grub.cfg"),
            engine.extract(&fx.image, "boot/grub/grub.cfg"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.stream.scratch_path(), b.stream.scratch_path());
        assert_ne!(a.stream.scratch.id(), b.stream.scratch.id());
        assert_eq!(scratch_entries(&fx.scratch_root), 2);

        drop(a);
        drop(b);
        assert_eq!(scratch_entries(&fx.scratch_root), 0);
    }

    #[tokio::test]
    async fn test_folded_request_extracts_listed_name() {
        let fx = fixture();
        let reader = grub_reader();
        let folding = PathNormalizer::new(&isoshelf_core::ImageFormat::iso9660(true));
        let engine = Extractor::new(reader.clone(), folding, &fx.scratch_root);

        let file = engine.extract(&fx.image, "Boot/GRUB/Grub.Cfg").await.unwrap();
        assert_eq!(file.name, "grub.cfg");
        assert_eq!(collect(file.stream).await, b"set timeout=5\n");

        let err = engine.extract(&fx.image, "BOOT/NOPE.CFG").await.err().unwrap();
        assert!(matches!(err, ShelfError::ExtractionFailed { .. }));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uncheckable_image_is_io_error() {
        let fx = fixture();
        let reader = grub_reader();
        let engine = extractor(reader.clone(), &fx.scratch_root);
        // A regular file standing in for a directory component
        let image = ImageHandle {
            path: fx.image.path.join("ubuntu.iso"),
            ..fx.image.clone()
        };

        let err = engine.extract(&image, "boot/grub/grub.cfg").await.err().unwrap();
        assert!(matches!(err, ShelfError::IoError(_)));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    /// Whether `pid` has exited (gone or a zombie awaiting reaping).
    #[cfg(target_os = "linux")]
    fn process_exited(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .map_or(true, |state| state == 'Z' || state == 'X'),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancelled_extraction_kills_tool_and_removes_scratch() {
        use crate::reader::SevenZipReader;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let fx = fixture();
        let dir = fx.image.path.parent().unwrap().to_path_buf();
        let listing = dir.join("listing.txt");
        std::fs::write(
            &listing,
            "------------------- ----- ------------ ------------  ------------------------\n\
             2024-04-23 12:00:00 .....           14         2048  boot/grub/grub.cfg\n\
             ------------------- ----- ------------ ------------  ------------------------\n",
        )
        .unwrap();
        let pid_file = dir.join("tool.pid");
        let tool = dir.join("fake-7z");
        std::fs::write(
            &tool,
            format!(
                "#!/bin/sh\nif [ \"$1\" = l ]; then cat '{}'; exit 0; fi\n\
                 dest=\"${{4#-o}}\"\nmkdir -p \"$dest/boot/grub\"\necho partial > \"$dest/boot/grub/grub.cfg\"\n\
                 echo $$ > '{}'\nexec sleep 30\n",
                listing.display(),
                pid_file.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let reader = Arc::new(SevenZipReader::new(tool.clone(), Duration::from_secs(60)));
        let engine = Extractor::new(reader, PathNormalizer::default(), &fx.scratch_root);

        let mut job = Box::pin(engine.extract(&fx.image, "boot/grub/grub.cfg"));
        let mut pid = None;
        for _ in 0..100 {
            tokio::select! {
                _ = &mut job => panic!("extraction finished while the tool was sleeping"),
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
            pid = std::fs::read_to_string(&pid_file)
                .ok()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            if pid.is_some() {
                break;
            }
        }
        let pid = pid.expect("tool never started extracting");
        assert_eq!(scratch_entries(&fx.scratch_root), 1);

        // Client went away
        drop(job);
        assert_eq!(scratch_entries(&fx.scratch_root), 0);

        let mut exited = false;
        for _ in 0..40 {
            if process_exited(&pid) {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(exited, "tool process {pid} still running");
    }
}
