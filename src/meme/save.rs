use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DOWNLOAD_PREFIX: &str = "meme";
pub const DOWNLOAD_EXTENSION: &str = "png";

/// `meme-<unix_ms>.png`
pub fn download_filename(unix_ms: i64) -> String {
    format!("{DOWNLOAD_PREFIX}-{unix_ms}.{DOWNLOAD_EXTENSION}")
}

/// Destination for the full-resolution download.
pub trait DownloadSink {
    /// Deliver `png` under `filename`, returning where it went.
    fn deliver(&mut self, filename: &str, png: &[u8]) -> Result<PathBuf>;
}

/// Writes downloads into a folder, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, filename: &str, png: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create download folder {}", self.dir.display()))?;
        let path = self.dir.join(filename);
        fs::write(&path, png).with_context(|| format!("write download {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = png.len(), "meme downloaded");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_embeds_millisecond_timestamp() {
        assert_eq!(download_filename(1_767_323_045_123), "meme-1767323045123.png");
    }

    #[test]
    fn directory_sink_creates_folder_and_writes_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut sink = DirectorySink::new(dir.path().join("downloads"));

        let path = sink.deliver("meme-1.png", b"png").expect("deliver");
        assert_eq!(path, dir.path().join("downloads").join("meme-1.png"));
        assert_eq!(std::fs::read(path).expect("read"), b"png");
    }
}
