use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use timelapse_common::frame::{capture_filename, Frame};
use tracing::debug;

use super::{FrameSink, SinkError, JPEG_QUALITY};

/// Writes each frame as a timestamp-named JPEG under a local directory.
#[derive(Debug)]
pub struct ArchiveSink {
    dir: PathBuf,
}

impl ArchiveSink {
    /// The directory must already exist; this sink never creates it.
    pub fn new(dir: PathBuf) -> Result<Self, SinkError> {
        if !dir.is_dir() {
            return Err(SinkError::MissingDirectory(dir.display().to_string()));
        }
        Ok(Self { dir })
    }

    pub async fn save(&self, frame: &Frame) -> Result<PathBuf, SinkError> {
        let path = self.dir.join(capture_filename(Utc::now()));
        let jpeg = frame.to_jpeg(JPEG_QUALITY)?;
        tokio::fs::write(&path, &jpeg)
            .await
            .map_err(|e| SinkError::Write(path.display().to_string(), e))?;
        debug!(path = %path.display(), bytes = jpeg.len(), "saved frame");
        Ok(path)
    }
}

#[async_trait]
impl FrameSink for ArchiveSink {
    async fn consume(&self, frame: &Frame) -> Result<(), SinkError> {
        self.save(frame).await.map(|_| ())
    }

    fn describe(&self) -> String {
        format!("archive:{}", self.dir.display())
    }
}
