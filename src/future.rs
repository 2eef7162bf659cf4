use crate::body::MinifyBody;
use crate::config::Strategy;
use crate::matcher::{Match, Registry};
use crate::pool::BufferPool;
use crate::recorder::Recorder;
use bytes::Buf;
use http::{Response, header, response::Parts};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future for minification service responses.
    ///
    /// Like other futures it must not be polled again once it has returned
    /// `Poll::Ready`.
    pub struct ResponseFuture<F, B> {
        #[pin]
        state: State<F, B>,
        registry: Arc<Registry>,
        pool: Arc<BufferPool>,
        strategy: Strategy,
        head_request: bool,
    }
}

pin_project! {
    #[project = StateProj]
    enum State<F, B> {
        /// Waiting for the inner service to produce response headers.
        Waiting {
            #[pin]
            inner: F,
        },
        /// Recording the body for the buffered strategy.
        Recording {
            #[pin]
            body: B,
            recorder: Option<Recorder>,
        },
    }
}

impl<F, B> ResponseFuture<F, B> {
    pub(crate) fn new(
        inner: F,
        registry: Arc<Registry>,
        pool: Arc<BufferPool>,
        strategy: Strategy,
        head_request: bool,
    ) -> Self {
        Self {
            state: State::Waiting { inner },
            registry,
            pool,
            strategy,
            head_request,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Output = Result<Response<MinifyBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            match this.state.as_mut().project() {
                StateProj::Waiting { inner } => {
                    let (mut parts, body) = match ready!(inner.poll(cx)) {
                        Ok(response) => response.into_parts(),
                        Err(e) => return Poll::Ready(Err(e)),
                    };

                    let Some(found) =
                        select(&parts, &body, this.registry.as_ref(), *this.head_request)
                    else {
                        return Poll::Ready(Ok(Response::from_parts(
                            parts,
                            MinifyBody::passthrough(body),
                        )));
                    };

                    tracing::debug!(
                        media_type = %found.media_type,
                        strategy = ?this.strategy,
                        "minifying response"
                    );

                    match this.strategy {
                        Strategy::Streaming => {
                            remove_framing_headers(&mut parts.headers);
                            return Poll::Ready(Ok(Response::from_parts(
                                parts,
                                MinifyBody::streaming(body, found),
                            )));
                        }
                        Strategy::Buffered => {
                            let recorder = Recorder::new(parts, found, this.pool.acquire());
                            this.state.set(State::Recording {
                                body,
                                recorder: Some(recorder),
                            });
                        }
                    }
                }

                StateProj::Recording { body, recorder } => {
                    assert!(
                        recorder.is_some(),
                        "`ResponseFuture` polled after completion"
                    );

                    match ready!(body.poll_frame(cx)) {
                        Some(Ok(frame)) => {
                            if let Some(current) = recorder.as_mut() {
                                current.record(frame);
                            }
                        }
                        Some(Err(e)) => {
                            if let Some(done) = recorder.take() {
                                let error = io::Error::other(e.into());
                                return Poll::Ready(Ok(done.fail(error)));
                            }
                        }
                        None => {
                            if let Some(done) = recorder.take() {
                                return Poll::Ready(Ok(done.replay()));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Picks the transform for a response, or `None` to pass it through untouched.
fn select<B: Body>(
    parts: &Parts,
    body: &B,
    registry: &Registry,
    head_request: bool,
) -> Option<Match> {
    // The length of a HEAD response describes a body that is never sent.
    if head_request || body.is_end_stream() {
        return None;
    }

    if has_content_encoding(&parts.headers) || has_content_range(&parts.headers) {
        tracing::debug!("response is encoded or partial, passing through");
        return None;
    }

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())?;

    registry.find(content_type)
}

/// Checks if Content-Encoding header is already present.
fn has_content_encoding(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_ENCODING)
}

/// Checks if Content-Range header is present (range response).
fn has_content_range(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_RANGE)
}

/// Removes headers that describe the body bytes before they are rewritten.
fn remove_framing_headers(headers: &mut header::HeaderMap) {
    // Minified size is unknown until the body has streamed through
    headers.remove(header::CONTENT_LENGTH);

    // Byte ranges of the original body do not apply to the minified one
    headers.remove(header::ACCEPT_RANGES);
}
