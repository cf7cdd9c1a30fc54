use async_trait::async_trait;
use std::sync::Arc;
use timelapse_common::frame::Frame;
use timelapse_common::source::{SourceError, SourceGuard};
use tokio::sync::Mutex;

/// Frame-producing callback bound to a stream route.
///
/// Invoked concurrently by every connection on the route, so implementations
/// must be safe under concurrent reentry; ones backed by a single device
/// serialize internally.
#[async_trait]
pub trait FrameProducer: Send + Sync {
    /// The next frame, or `Ok(None)` at end of stream.
    async fn next_frame(&self) -> Result<Option<Frame>, SourceError>;
}

/// Named route table, append-only during setup and read-only once the
/// server is running.
#[derive(Default)]
pub struct StreamRegistry {
    routes: Vec<(String, Arc<dyn FrameProducer>)>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicate names are a configuration error, caught here rather than at
    /// request time; a route is never silently overwritten.
    pub fn register(
        &mut self,
        name: &str,
        producer: Arc<dyn FrameProducer>,
    ) -> Result<(), RegistryError> {
        if name.is_empty() || name.contains('/') {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.routes.iter().any(|(n, _)| n == name) {
            return Err(RegistryError::DuplicateRoute(name.to_string()));
        }
        self.routes.push((name.to_string(), producer));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn FrameProducer>> {
        self.routes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| Arc::clone(p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn FrameProducer>)> {
        self.routes.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Serves one frame source to any number of connections. The mutex
/// serializes device access, which is what makes the producer safe to call
/// from every connection at once.
pub struct SharedSourceProducer {
    source: Mutex<SourceGuard>,
}

impl SharedSourceProducer {
    pub fn new(guard: SourceGuard) -> Self {
        Self {
            source: Mutex::new(guard),
        }
    }
}

#[async_trait]
impl FrameProducer for SharedSourceProducer {
    async fn next_frame(&self) -> Result<Option<Frame>, SourceError> {
        let mut source = self.source.lock().await;
        source.capture().map(Some)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("stream route {0:?} registered twice")]
    DuplicateRoute(String),
    #[error("invalid stream route name {0:?}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use timelapse_common::source::TestPattern;

    fn producer() -> Arc<dyn FrameProducer> {
        Arc::new(SharedSourceProducer::new(SourceGuard::new(Box::new(
            TestPattern::new(4, 4),
        ))))
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = StreamRegistry::new();
        registry.register("cam", producer()).unwrap();
        let err = registry.register("cam", producer()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRoute(n) if n == "cam"));
        // The original producer is still the one registered.
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("cam").is_some());
    }

    #[test]
    fn invalid_names_rejected() {
        let mut registry = StreamRegistry::new();
        assert!(matches!(
            registry.register("", producer()),
            Err(RegistryError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register("a/b", producer()),
            Err(RegistryError::InvalidName(_))
        ));
    }

    #[test]
    fn resolve_unknown_is_none() {
        let registry = StreamRegistry::new();
        assert!(registry.resolve("nope").is_none());
    }

    #[tokio::test]
    async fn shared_source_produces_frames() {
        let shared = SharedSourceProducer::new(SourceGuard::new(Box::new(TestPattern::new(4, 4))));
        let frame = shared.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.width(), 4);
    }
}
