use crate::error::TransformError;
use crate::matcher::{Match, MediaType};
use crate::transform::{Minifier, Transform};
use bytes::{Buf, Bytes, BytesMut};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

pin_project! {
    /// A response body that may have been minified.
    ///
    /// Which variant a response carries is decided once, when the inner
    /// service's response headers become available.
    #[project = MinifyBodyProj]
    #[allow(missing_docs)]
    pub enum MinifyBody<B> {
        /// Body rewritten chunk by chunk as it streams.
        Streaming {
            #[pin]
            inner: B,
            state: StreamingBody,
        },
        /// Body recorded in full and replayed from memory.
        Buffered {
            data: Option<Bytes>,
            trailers: Option<HeaderMap>,
        },
        /// Body passed through unchanged.
        Passthrough {
            #[pin]
            inner: B,
        },
        /// The inner body failed while it was being recorded.
        Failed {
            error: Option<io::Error>,
        },
    }
}

/// State of a body that is being minified as it streams.
pub struct StreamingBody {
    transform: Arc<dyn Transform>,
    media_type: MediaType,
    minifier: Option<Box<dyn Minifier>>,
    output: BytesMut,
    state: StreamState,
    pending_trailers: Option<HeaderMap>,
}

/// State machine for streaming minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamState {
    /// Reading data from the inner body and minifying it.
    Reading,
    /// Inner body is done; the minifier still has to be finished.
    Finishing,
    /// Emitting held-back trailers.
    Trailers,
    /// Nothing left to emit.
    Done,
}

impl StreamingBody {
    fn new(found: Match) -> Self {
        Self {
            transform: found.transform,
            media_type: found.media_type,
            minifier: None,
            output: BytesMut::new(),
            state: StreamState::Reading,
            pending_trailers: None,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    fn poll_minified<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                StreamState::Done => return Poll::Ready(None),

                StreamState::Trailers => {
                    self.state = StreamState::Done;
                    return match self.pending_trailers.take() {
                        Some(trailers) => Poll::Ready(Some(Ok(Frame::trailers(trailers)))),
                        None => Poll::Ready(None),
                    };
                }

                StreamState::Finishing => {
                    self.state = if self.pending_trailers.is_some() {
                        StreamState::Trailers
                    } else {
                        StreamState::Done
                    };

                    // The minifier only exists if at least one chunk was written.
                    if let Some(mut minifier) = self.minifier.take() {
                        if let Err(e) = minifier.finish(&mut self.output) {
                            return self.fail(e);
                        }
                        if let Some(frame) = self.take_output() {
                            return Poll::Ready(Some(Ok(frame)));
                        }
                    }
                }

                StreamState::Reading => match ready!(inner.as_mut().poll_frame(cx)) {
                    None => self.state = StreamState::Finishing,
                    Some(Err(e)) => {
                        self.minifier = None;
                        self.state = StreamState::Done;
                        return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                    }
                    Some(Ok(frame)) => match frame.into_data() {
                        Ok(mut data) => {
                            let chunk = data.copy_to_bytes(data.remaining());
                            if chunk.is_empty() {
                                continue;
                            }
                            if let Err(e) = self.write(&chunk) {
                                return self.fail(e);
                            }
                            if let Some(frame) = self.take_output() {
                                return Poll::Ready(Some(Ok(frame)));
                            }
                            // The minifier held the whole chunk back; read more.
                        }
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Trailers go out after the minifier's last bytes.
                                self.pending_trailers = Some(trailers);
                                self.state = StreamState::Finishing;
                            }
                        }
                    },
                },
            }
        }
    }

    /// Writes a chunk, opening the minifier on first use.
    fn write(&mut self, chunk: &[u8]) -> Result<(), TransformError> {
        if self.minifier.is_none() {
            self.minifier = Some(self.transform.minifier(&self.media_type)?);
        }
        if let Some(minifier) = self.minifier.as_mut() {
            minifier.write(chunk, &mut self.output)?;
        }
        Ok(())
    }

    fn take_output(&mut self) -> Option<Frame<Bytes>> {
        if self.output.is_empty() {
            None
        } else {
            Some(Frame::data(self.output.split().freeze()))
        }
    }

    // Bytes already sent cannot be recalled, so the response ends in an error.
    fn fail(&mut self, error: TransformError) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        tracing::warn!(
            media_type = %self.media_type,
            error = %error,
            "minification failed mid-stream, aborting response"
        );
        self.minifier = None;
        self.pending_trailers = None;
        self.state = StreamState::Done;
        Poll::Ready(Some(Err(io::Error::other(error))))
    }
}

impl<B> MinifyBody<B> {
    /// Creates a body that is minified as it streams with the matched transform.
    pub fn streaming(inner: B, found: Match) -> Self {
        Self::Streaming {
            inner,
            state: StreamingBody::new(found),
        }
    }

    /// Creates a body replayed from memory.
    pub fn buffered(data: Bytes, trailers: Option<HeaderMap>) -> Self {
        Self::Buffered {
            data: Some(data).filter(|d| !d.is_empty()),
            trailers,
        }
    }

    /// Creates a passthrough body without minification.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }

    /// Creates a body that yields `error` once and then ends.
    pub fn failed(error: io::Error) -> Self {
        Self::Failed { error: Some(error) }
    }
}

impl<B> Body for MinifyBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            MinifyBodyProj::Passthrough { inner } => match ready!(inner.poll_frame(cx)) {
                None => Poll::Ready(None),
                Some(Ok(frame)) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Some(Err(e)) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            MinifyBodyProj::Streaming { inner, state } => state.poll_minified(cx, inner),
            MinifyBodyProj::Buffered { data, trailers } => {
                if let Some(data) = data.take() {
                    return Poll::Ready(Some(Ok(Frame::data(data))));
                }
                Poll::Ready(trailers.take().map(|t| Ok(Frame::trailers(t))))
            }
            MinifyBodyProj::Failed { error } => Poll::Ready(error.take().map(Err)),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            MinifyBody::Passthrough { inner } => inner.is_end_stream(),
            MinifyBody::Streaming { state, .. } => state.state() == StreamState::Done,
            MinifyBody::Buffered { data, trailers } => data.is_none() && trailers.is_none(),
            MinifyBody::Failed { error } => error.is_none(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            MinifyBody::Passthrough { inner } => inner.size_hint(),
            MinifyBody::Buffered { data, .. } => {
                SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64))
            }
            // Minified size is unknown until the minifier is finished
            MinifyBody::Streaming { .. } | MinifyBody::Failed { .. } => SizeHint::default(),
        }
    }
}
