//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Each leaf is a [`Route`]:
//! an endpoint plus the middleware that runs in front of it.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::context::Context;
use crate::formatter::{ErrorFormatter, JsonErrorFormatter};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// An endpoint and its middleware, in the order they run.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use tsu_getter::{Context, Model, Route, StatusCode};
/// # use tsu_getter::middleware::pk_getter;
/// # fn books() -> Arc<dyn Model> { unimplemented!() }
/// # async fn show(_: Context) -> StatusCode { StatusCode::OK }
/// # fn main() -> Result<(), tsu_getter::ConfigError> {
/// let route = Route::new(show).with(pk_getter(books(), "book")?);
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Route {
    middleware: Vec<Arc<dyn Middleware>>,
    endpoint: BoxedHandler,
}

impl Route {
    pub fn new(endpoint: impl Handler) -> Self {
        Self { middleware: Vec::new(), endpoint: endpoint.into_boxed_handler() }
    }

    /// Appends a middleware. The first one added runs first.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends a middleware that is already shared with other routes.
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// A route after registration: the chain is frozen into a shared slice.
struct Compiled {
    chain: Arc<[Arc<dyn Middleware>]>,
    endpoint: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<Compiled>>>,
    errors: Arc<dyn ErrorFormatter>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), errors: Arc::new(JsonErrorFormatter) }
    }

    /// Register a bare handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax and land in `ctx.params()`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(method, path, Route::new(handler))
    }

    /// Register a handler with middleware in front of it.
    ///
    /// # Panics
    ///
    /// Panics on a malformed or conflicting path. Routes are registered at
    /// startup, so this surfaces as a failed boot, not a failed request.
    pub fn route(mut self, method: Method, path: &str, route: Route) -> Self {
        debug!(
            %method,
            path,
            middleware = ?route.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "registering route"
        );
        let compiled = Compiled { chain: Arc::from(route.middleware), endpoint: route.endpoint };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Arc::new(compiled))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, route: Route) -> Self {
        self.route(Method::GET, path, route)
    }

    pub fn put(self, path: &str, route: Route) -> Self {
        self.route(Method::PUT, path, route)
    }

    pub fn patch(self, path: &str, route: Route) -> Self {
        self.route(Method::PATCH, path, route)
    }

    pub fn delete(self, path: &str, route: Route) -> Self {
        self.route(Method::DELETE, path, route)
    }

    /// Formatter that turns lookup failures into responses for every route.
    /// Defaults to [`JsonErrorFormatter`].
    pub fn error_formatter(mut self, formatter: impl ErrorFormatter) -> Self {
        self.errors = Arc::new(formatter);
        self
    }

    /// Routes and runs one request in-process. Unknown routes get `404`.
    pub async fn call(&self, request: Request) -> Response {
        let Some((route, params)) = self.lookup(&request) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        let ctx = Context::from_route(request, params, Arc::clone(&self.errors));
        Next::new(Arc::clone(&route.chain), Arc::clone(&route.endpoint)).run(ctx).await
    }

    /// Whether some route answers `method` on `path`. Lets the server turn
    /// away unknown routes before reading a request body.
    pub(crate) fn matches(&self, method: &Method, path: &str) -> bool {
        self.routes.get(method).is_some_and(|tree| tree.at(path).is_ok())
    }

    fn lookup(&self, request: &Request) -> Option<(Arc<Compiled>, Vec<(String, String)>)> {
        let tree = self.routes.get(request.method())?;
        let matched = tree.at(request.path()).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(matched.value), params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
