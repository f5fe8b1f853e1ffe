//! Middleware layer.
//!
//! Middleware runs before a route's endpoint and is the place for work that
//! several endpoints share: loading the record a route is about, checking
//! that it exists, attaching it to the request for the handler.
//!
//! Each middleware receives the [`Context`] and a [`Next`]. Calling
//! [`Next::run`] continues the chain; returning a response without calling it
//! short-circuits the request.
//!
//! Built-in middleware:
//! - [`Getter`] — fetches one record through a [`Model`](crate::Model) and
//!   stores it in a hook slot.

mod getter;
mod includes;

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::response::Response;

pub use getter::{DEFAULT_PATH, Getter, GetterBuilder, getter, pk_getter};
pub use includes::resolve_includes;

/// One link in a route's middleware chain.
///
/// `handle` takes `self: Arc<Self>` so the returned future can own its
/// middleware without borrowing from the route table.
pub trait Middleware: Send + Sync + 'static {
    fn handle(self: Arc<Self>, ctx: Context, next: Next) -> BoxFuture;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The rest of the chain after the current middleware.
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Middleware>]>, endpoint: BoxedHandler) -> Self {
        Self { chain, position: 0, endpoint }
    }

    /// A continuation that goes straight to `handler`, with no middleware
    /// in between. Useful for driving a single middleware in isolation.
    pub fn endpoint(handler: impl Handler) -> Self {
        Self::new(Arc::from(Vec::new()), handler.into_boxed_handler())
    }

    /// Runs the next middleware, or the endpoint once the chain is exhausted.
    pub async fn run(self, ctx: Context) -> Response {
        match self.chain.get(self.position) {
            Some(middleware) => {
                let middleware = Arc::clone(middleware);
                let next = Self {
                    chain: self.chain,
                    position: self.position + 1,
                    endpoint: self.endpoint,
                };
                middleware.handle(ctx, next).await
            }
            None => self.endpoint.call(ctx).await,
        }
    }
}
