pub mod archive;
pub mod upload;
pub mod weather;

pub use archive::ArchiveSink;
pub use upload::UploadSink;
pub use weather::WeatherClient;

use async_trait::async_trait;
use timelapse_common::config::OutputTarget;
use timelapse_common::frame::{Frame, FrameError};

pub(crate) const JPEG_QUALITY: u8 = 80;

/// Capability consuming one frame per call, either persisting or forwarding
/// it. A failed consume is logged by the scheduler and never ends the
/// capture session.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn consume(&self, frame: &Frame) -> Result<(), SinkError>;

    /// Human-readable destination for logging.
    fn describe(&self) -> String;
}

/// Select a sink from the parsed output target. A missing archive directory
/// is a configuration error and fails here, before any capture runs.
pub fn build_sink(
    target: &OutputTarget,
    weather: Option<WeatherClient>,
) -> Result<Box<dyn FrameSink>, SinkError> {
    match target {
        OutputTarget::Directory(dir) => Ok(Box::new(ArchiveSink::new(dir.clone())?)),
        OutputTarget::Remote(addr) => Ok(Box::new(UploadSink::new(addr, weather))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("output directory does not exist: {0}")]
    MissingDirectory(String),
    #[error("failed to write {0}: {1}")]
    Write(String, std::io::Error),
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("collector rejected upload with status {0}")]
    Rejected(u16),
    #[error(transparent)]
    Frame(#[from] FrameError),
}
