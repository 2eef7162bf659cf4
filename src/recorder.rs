use crate::body::MinifyBody;
use crate::matcher::Match;
use crate::pool::PooledBuffer;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderValue};
use http::response::Parts;
use http::Response;
use http_body::Frame;
use std::io;

/// Captures a complete response before anything reaches the client.
///
/// Status and headers are held as [`Parts`]; data frames accumulate in a
/// pooled buffer. The buffer goes back to the pool when the recorder is
/// consumed or dropped.
pub(crate) struct Recorder {
    parts: Parts,
    found: Match,
    buffer: PooledBuffer,
    trailers: Option<HeaderMap>,
}

impl Recorder {
    pub(crate) fn new(parts: Parts, found: Match, buffer: PooledBuffer) -> Self {
        Self {
            parts,
            found,
            buffer,
            trailers: None,
        }
    }

    /// Appends one frame of the downstream body.
    pub(crate) fn record<D: Buf>(&mut self, frame: Frame<D>) {
        match frame.into_data() {
            Ok(data) => self.buffer.put(data),
            Err(frame) => {
                if let Ok(trailers) = frame.into_trailers() {
                    match &mut self.trailers {
                        Some(existing) => existing.extend(trailers),
                        None => self.trailers = Some(trailers),
                    }
                }
            }
        }
    }

    /// Builds the response sent to the client from what was recorded.
    ///
    /// An empty body is replayed as is. Otherwise the body is minified and
    /// `Content-Length` is set to the minified size; if minification fails the
    /// original body and headers are replayed unchanged.
    pub(crate) fn replay<B>(self) -> Response<MinifyBody<B>> {
        let Recorder {
            mut parts,
            found,
            buffer,
            trailers,
        } = self;

        if buffer.is_empty() {
            return Response::from_parts(parts, MinifyBody::buffered(Bytes::new(), trailers));
        }

        let mut output = BytesMut::with_capacity(buffer.len());
        let body = match found
            .transform
            .transform(&found.media_type, &buffer, &mut output)
        {
            Ok(()) => {
                tracing::debug!(
                    media_type = %found.media_type,
                    original = buffer.len(),
                    minified = output.len(),
                    "minified buffered response"
                );
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(output.len()));
                parts.headers.remove(header::ACCEPT_RANGES);
                output.freeze()
            }
            Err(error) => {
                tracing::warn!(
                    media_type = %found.media_type,
                    error = %error,
                    "minification failed, sending original body"
                );
                Bytes::copy_from_slice(&buffer)
            }
        };

        Response::from_parts(parts, MinifyBody::buffered(body, trailers))
    }

    /// Builds a response whose body reports a downstream failure.
    pub(crate) fn fail<B>(self, error: io::Error) -> Response<MinifyBody<B>> {
        Response::from_parts(self.parts, MinifyBody::failed(error))
    }
}
