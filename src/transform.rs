use crate::error::TransformError;
use crate::matcher::MediaType;
use bytes::BytesMut;
use std::fmt;
use std::sync::Arc;

/// An incremental rewriter for one response body.
///
/// `write` is called once per body chunk and `finish` exactly once after the
/// last chunk. Both append their output to `output`. A minifier may hold back
/// bytes between calls (for instance an unterminated whitespace run) but must
/// emit everything it holds in `finish`.
pub trait Minifier: Send {
    /// Feeds the next chunk of input.
    fn write(&mut self, input: &[u8], output: &mut BytesMut) -> Result<(), TransformError>;

    /// Signals the end of input and flushes any held-back bytes.
    fn finish(&mut self, output: &mut BytesMut) -> Result<(), TransformError>;
}

/// A body rewriter registered for a set of media types.
pub trait Transform: Send + Sync + 'static {
    /// Opens an incremental minifier for a body of the given media type.
    fn minifier(&self, media_type: &MediaType) -> Result<Box<dyn Minifier>, TransformError>;

    /// Rewrites a complete body in one call.
    fn transform(
        &self,
        media_type: &MediaType,
        input: &[u8],
        output: &mut BytesMut,
    ) -> Result<(), TransformError> {
        let mut minifier = self.minifier(media_type)?;
        minifier.write(input, output)?;
        minifier.finish(output)
    }
}

/// Wraps a whole-body function as a [`Transform`].
///
/// The incremental form accumulates the body and applies the function in
/// `finish`, so it buffers the full body even in the streaming strategy.
pub fn transform_fn<F>(f: F) -> FnTransform<F>
where
    F: Fn(&MediaType, &[u8], &mut BytesMut) -> Result<(), TransformError> + Send + Sync + 'static,
{
    FnTransform { f: Arc::new(f) }
}

/// A [`Transform`] built from a function, see [`transform_fn`].
pub struct FnTransform<F> {
    f: Arc<F>,
}

impl<F> Clone for FnTransform<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").finish_non_exhaustive()
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&MediaType, &[u8], &mut BytesMut) -> Result<(), TransformError> + Send + Sync + 'static,
{
    fn minifier(&self, media_type: &MediaType) -> Result<Box<dyn Minifier>, TransformError> {
        Ok(Box::new(FnMinifier {
            f: Arc::clone(&self.f),
            media_type: media_type.clone(),
            input: BytesMut::new(),
        }))
    }

    fn transform(
        &self,
        media_type: &MediaType,
        input: &[u8],
        output: &mut BytesMut,
    ) -> Result<(), TransformError> {
        (self.f)(media_type, input, output)
    }
}

struct FnMinifier<F> {
    f: Arc<F>,
    media_type: MediaType,
    input: BytesMut,
}

impl<F> Minifier for FnMinifier<F>
where
    F: Fn(&MediaType, &[u8], &mut BytesMut) -> Result<(), TransformError> + Send + Sync + 'static,
{
    fn write(&mut self, input: &[u8], _output: &mut BytesMut) -> Result<(), TransformError> {
        self.input.extend_from_slice(input);
        Ok(())
    }

    fn finish(&mut self, output: &mut BytesMut) -> Result<(), TransformError> {
        let input = self.input.split();
        (self.f)(&self.media_type, &input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper() -> impl Transform {
        transform_fn(|_: &MediaType, input: &[u8], out: &mut BytesMut| {
            out.extend(input.iter().map(u8::to_ascii_uppercase));
            Ok(())
        })
    }

    #[test]
    fn test_fn_transform_whole_body() {
        let media = MediaType::parse("text/plain").unwrap();
        let mut out = BytesMut::new();
        upper().transform(&media, b"abc", &mut out).unwrap();
        assert_eq!(&out[..], b"ABC");
    }

    #[test]
    fn test_fn_transform_incremental_applies_on_finish() {
        let media = MediaType::parse("text/plain").unwrap();
        let mut minifier = upper().minifier(&media).unwrap();
        let mut out = BytesMut::new();

        minifier.write(b"ab", &mut out).unwrap();
        minifier.write(b"c", &mut out).unwrap();
        assert!(out.is_empty());

        minifier.finish(&mut out).unwrap();
        assert_eq!(&out[..], b"ABC");
    }

    #[test]
    fn test_fn_transform_receives_params() {
        let media = MediaType::parse("text/plain; charset=latin1").unwrap();
        let transform = transform_fn(|media: &MediaType, _: &[u8], out: &mut BytesMut| {
            out.extend_from_slice(media.param("charset").unwrap_or("none").as_bytes());
            Ok(())
        });

        let mut out = BytesMut::new();
        transform.transform(&media, b"", &mut out).unwrap();
        assert_eq!(&out[..], b"latin1");
    }
}
