//! Local save of downloaded beats
//!
//! Never overwrites: a taken name gets `_1`, `_2`, ... before the extension.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

const MAX_SUFFIX: u32 = 10_000;

/// Write `content` into `directory` under `filename` or the first free variant
///
/// Creates the directory if needed. Returns the path written.
pub async fn save_unique(directory: &Path, filename: &str, content: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(directory).await?;

    for attempt in 0..=MAX_SUFFIX {
        let candidate = directory.join(candidate_name(filename, attempt));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await;

        match file {
            Ok(file) => {
                write_or_discard(file, &candidate, content).await?;
                info!(path = %candidate.display(), bytes = content.len(), "Saved beat");
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("No free file name for {} in {}", filename, directory.display()),
    ))
}

/// Write all of `content`; on failure remove the partly written file at `path`
async fn write_or_discard<W>(mut writer: W, path: &Path, content: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(content).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        drop(writer);
        if let Err(remove_err) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %remove_err, "Could not remove partial file");
        }
        return Err(e);
    }
    Ok(())
}

/// `name.ext` for attempt 0, `name_N.ext` afterwards
fn candidate_name(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{}_{}", stem, attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    /// Accepts nothing, like a full disk
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Loop 140bpm.mp3");
        std::fs::write(&path, b"").unwrap();

        let err = write_or_discard(FullDisk, &path, b"payload").await.unwrap_err();

        assert_eq!(err.to_string(), "no space left");
        assert!(!path.exists());

        // The derived name is free again for the next save
        let saved = save_unique(dir.path(), "Loop 140bpm.mp3", b"payload").await.unwrap();
        assert_eq!(saved, path);
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("beat 140bpm.mp3", 0), "beat 140bpm.mp3");
        assert_eq!(candidate_name("beat 140bpm.mp3", 1), "beat 140bpm_1.mp3");
        assert_eq!(candidate_name("beat", 2), "beat_2");
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested");

        let first = save_unique(&target, "Loop.mp3", b"one").await.unwrap();
        let second = save_unique(&target, "Loop.mp3", b"two").await.unwrap();
        let third = save_unique(&target, "Loop.mp3", b"three").await.unwrap();

        assert_eq!(first, target.join("Loop.mp3"));
        assert_eq!(second, target.join("Loop_1.mp3"));
        assert_eq!(third, target.join("Loop_2.mp3"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&third).unwrap(), b"three");
    }
}
