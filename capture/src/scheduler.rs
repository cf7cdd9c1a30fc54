use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timelapse_common::source::SourceGuard;
use tracing::{info, warn};

use crate::sink::FrameSink;

/// Periodic capture-and-sink loop.
///
/// The shutdown flag is checked cooperatively once per iteration, before the
/// next capture starts; an in-progress capture or sink call always completes.
/// A capture or sink failure is logged and the loop moves on — a single bad
/// frame never ends the session. Interval positivity is enforced by config
/// validation before this is ever called.
///
/// The source is closed exactly once when this returns, on every exit path,
/// by the guard's drop.
pub async fn run(
    mut source: SourceGuard,
    sink: &dyn FrameSink,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    info!(
        source = source.kind(),
        sink = sink.describe(),
        interval_secs = interval.as_secs(),
        "starting capture loop"
    );

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown flag observed, ending capture loop");
            break;
        }

        match source.capture() {
            Ok(frame) => {
                if let Err(e) = sink.consume(&frame).await {
                    warn!(error = %e, "failed to persist frame, continuing");
                }
            }
            Err(e) => {
                warn!(error = %e, "capture failed, skipping iteration");
            }
        }

        tokio::time::sleep(interval).await;
    }
}
