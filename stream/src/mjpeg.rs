use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::FrameProducer;

/// Boundary token, fixed for the life of every connection.
pub const BOUNDARY: &str = "frame";

pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={BOUNDARY}")
}

/// One self-contained multipart body part followed by the connection-level
/// separator.
fn encode_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Long-lived multipart response for one client connection.
///
/// The body is an unbounded part stream: each step pulls the next frame from
/// the shared producer, encodes it, and emits one part. The loop ends when
/// the producer errors or signals end-of-stream, when the server's stop
/// token fires, or when the client disconnects (axum drops the body, which
/// drops the loop). Nothing here escalates to other connections.
pub fn response(
    producer: Arc<dyn FrameProducer>,
    quality: u8,
    cancel: CancellationToken,
) -> Response {
    let stream = futures_util::stream::unfold(
        (producer, cancel),
        move |(producer, cancel)| async move {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("server stopping, closing stream connection");
                    return None;
                }
                result = producer.next_frame() => match result {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        debug!("producer ended stream");
                        return None;
                    }
                    Err(e) => {
                        warn!(error = %e, "frame producer failed, closing connection");
                        return None;
                    }
                },
            };
            let part = match frame.to_jpeg(quality) {
                Ok(jpeg) => encode_part(&jpeg),
                Err(e) => {
                    warn!(error = %e, "jpeg encode failed, closing connection");
                    return None;
                }
            };
            Some((Ok::<Bytes, Infallible>(part), (producer, cancel)))
        },
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type())
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build stream response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_framing() {
        let jpeg = [0xFFu8, 0xD8, 0xFF, 0xD9];
        let part = encode_part(&jpeg);
        let text = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n";
        assert_eq!(&part[..text.len()], text.as_slice());
        assert_eq!(&part[text.len()..text.len() + 4], &jpeg);
        assert_eq!(&part[part.len() - 2..], b"\r\n");
    }

    #[test]
    fn content_type_names_the_boundary() {
        assert_eq!(content_type(), "multipart/x-mixed-replace; boundary=frame");
    }
}
