//! Built-in transforms for the default media types.
//!
//! These compactors only remove what is safe to remove without parsing the
//! document: insignificant whitespace and comments. They work on arbitrary
//! chunk boundaries and keep a bounded amount of state per body.

#[cfg(feature = "json")]
mod json;
#[cfg(any(feature = "html", feature = "svg"))]
mod markup;

#[cfg(any(feature = "html", feature = "json", feature = "svg"))]
use crate::{
    error::TransformError,
    matcher::MediaType,
    transform::{Minifier, Transform},
};

/// Compacts `text/html` bodies.
#[cfg(feature = "html")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

#[cfg(feature = "html")]
impl Transform for Html {
    fn minifier(&self, _media_type: &MediaType) -> Result<Box<dyn Minifier>, TransformError> {
        Ok(Box::new(markup::MarkupMinifier::new(markup::Dialect::Html)))
    }
}

/// Compacts `application/json` bodies.
///
/// Bodies with unbalanced brackets or unterminated strings are rejected.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

#[cfg(feature = "json")]
impl Transform for Json {
    fn minifier(&self, _media_type: &MediaType) -> Result<Box<dyn Minifier>, TransformError> {
        Ok(Box::new(json::JsonMinifier::new()))
    }
}

/// Compacts `image/svg+xml` bodies.
#[cfg(feature = "svg")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Svg;

#[cfg(feature = "svg")]
impl Transform for Svg {
    fn minifier(&self, _media_type: &MediaType) -> Result<Box<dyn Minifier>, TransformError> {
        Ok(Box::new(markup::MarkupMinifier::new(markup::Dialect::Xml)))
    }
}
