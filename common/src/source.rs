use crate::frame::{Frame, FrameError};
use tracing::info;

/// Capability implemented by every imaging device.
///
/// `capture` produces one fresh owned frame per call. `close` releases the
/// device; after `close` the source must never be asked for another frame,
/// which [`SourceGuard`] enforces by only closing on drop.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame, SourceError>;
    fn close(&mut self);

    /// Human-readable device kind for logging.
    fn kind(&self) -> &'static str;
}

impl std::fmt::Debug for dyn FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Simulated device producing an animated gradient. Stands in for real
/// hardware in tests and on machines without a camera.
pub struct TestPattern {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl FrameSource for TestPattern {
    fn capture(&mut self) -> Result<Frame, SourceError> {
        let shift = self.tick.wrapping_mul(7);
        self.tick = self.tick.wrapping_add(1);
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + shift) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(((x + y + shift) % 256) as u8);
            }
        }
        Frame::from_bgr(self.width, self.height, data).map_err(SourceError::Frame)
    }

    fn close(&mut self) {}

    fn kind(&self) -> &'static str {
        "test-pattern"
    }
}

/// Select a frame source by its configured name.
///
/// Real device backends (webcam, industrial, DSLR, Pi camera) plug in here;
/// this crate only ships the simulated one.
pub fn open_source(kind: &str) -> Result<Box<dyn FrameSource>, SourceError> {
    match kind {
        "test" | "test-pattern" => Ok(Box::new(TestPattern::default())),
        other => Err(SourceError::UnknownKind(other.to_string())),
    }
}

/// Scoped acquisition of a frame source.
///
/// Owns the boxed source and closes it exactly once when dropped, on every
/// exit path. Capture-after-close cannot happen: the only way to close is to
/// give the guard up.
pub struct SourceGuard {
    inner: Option<Box<dyn FrameSource>>,
}

impl SourceGuard {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            inner: Some(source),
        }
    }

    pub fn capture(&mut self) -> Result<Frame, SourceError> {
        match self.inner.as_mut() {
            Some(source) => source.capture(),
            None => Err(SourceError::Closed),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.inner.as_ref().map(|s| s.kind()).unwrap_or("closed")
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if let Some(mut source) = self.inner.take() {
            info!(kind = source.kind(), "closing frame source");
            source.close();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown frame source kind: {0}")]
    UnknownKind(String),
    #[error("device failed to produce a frame: {0}")]
    Device(String),
    #[error("frame source already closed")]
    Closed,
    #[error(transparent)]
    Frame(#[from] FrameError),
}
