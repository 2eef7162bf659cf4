use crate::config::{MinifyConfig, Strategy};
use crate::matcher::{Pattern, Registry};
use crate::pool::BufferPool;
use crate::service::MinifyService;
use crate::transform::Transform;
use std::sync::Arc;
use tower::Layer;

/// A Tower layer that minifies HTTP response bodies.
///
/// The registry of transforms and the buffer pool are built once here and
/// shared by every service the layer produces.
#[derive(Debug, Clone)]
pub struct MinifyLayer {
    registry: Arc<Registry>,
    pool: Arc<BufferPool>,
    strategy: Strategy,
}

impl MinifyLayer {
    /// Creates a minification layer with the built-in transforms and the
    /// streaming strategy.
    pub fn new() -> Self {
        Self::with_registry(Registry::with_defaults())
    }

    /// Creates a layer with no transforms registered.
    pub fn empty() -> Self {
        Self::with_registry(Registry::empty())
    }

    /// Creates a layer from deserialized settings.
    pub fn from_config(config: &MinifyConfig) -> Self {
        Self::new()
            .strategy(config.strategy)
            .buffer_pool(Arc::new(BufferPool::with_limits(
                config.max_idle_buffers,
                config.max_buffer_capacity,
            )))
    }

    fn with_registry(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            pool: Arc::new(BufferPool::new()),
            strategy: Strategy::default(),
        }
    }

    /// Sets the rewrite strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Registers a transform after all existing ones.
    ///
    /// Earlier registrations win when several patterns match.
    pub fn register<T>(mut self, pattern: Pattern, transform: T) -> Self
    where
        T: Transform,
    {
        Arc::make_mut(&mut self.registry).register(pattern, transform);
        self
    }

    /// Uses the given pool for the buffered strategy, e.g. to share one pool
    /// between several layers.
    pub fn buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }
}

impl Default for MinifyLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for MinifyLayer {
    type Service = MinifyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MinifyService::new(
            inner,
            Arc::clone(&self.registry),
            Arc::clone(&self.pool),
            self.strategy,
        )
    }
}
