//! HTTP response minification middleware for Tower.
//!
//! This crate provides a Tower layer that rewrites response bodies through a
//! transform chosen by the response's `Content-Type`, typically a minifier
//! that strips insignificant whitespace and comments from markup, SVG or JSON.
//!
//! # Example
//!
//! ```ignore
//! use http_response_minify::MinifyLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(MinifyLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Strategies
//!
//! - [`Strategy::Streaming`] (default) feeds each body chunk to the transform
//!   as it arrives. `Content-Length` and `Accept-Ranges` are removed.
//! - [`Strategy::Buffered`] records the whole body into a pooled buffer,
//!   minifies it in one go and sets `Content-Length` to the minified size.
//!   If the transform fails the original body and headers are sent instead.
//!
//! # Bypass Rules
//!
//! The body is passed through untouched when:
//! - The request method is `HEAD`
//! - `Content-Encoding` header is already set
//! - `Content-Range` header is present (range responses)
//! - The body is known to be empty
//! - `Content-Type` is missing or matches no registered transform
//!
//! # Built-in Transforms
//!
//! With the default features, `text/html`, `image/svg+xml` and
//! `application/json` are registered, each behind a cargo feature of the
//! same short name. Further transforms can be added with
//! [`MinifyLayer::register`].

#![deny(missing_docs)]

mod body;
mod config;
mod error;
mod future;
mod layer;
mod matcher;
pub mod minify;
mod pool;
mod recorder;
mod service;
mod transform;

pub use body::{MinifyBody, StreamingBody};
pub use config::{MinifyConfig, Strategy};
pub use error::{BoxError, ConfigError, TransformError};
pub use future::ResponseFuture;
pub use layer::MinifyLayer;
pub use matcher::{Match, MediaType, Pattern, Registry};
pub use pool::{BufferPool, PooledBuffer, DEFAULT_MAX_CAPACITY, DEFAULT_MAX_IDLE};
pub use service::MinifyService;
pub use transform::{transform_fn, FnTransform, Minifier, Transform};
