//! Per-request context threaded through the middleware chain.
//!
//! A [`Context`] owns the [`Request`] plus two JSON maps:
//!
//! - `params` — query-string and route parameters, query first, route
//!   parameters overriding on name clashes. A query key given more than once
//!   becomes an array (`?includes=a&includes=b` → `["a", "b"]`).
//! - `hooks` — values resolved by middleware for the handlers after them,
//!   e.g. the record a [`Getter`](crate::middleware::Getter) fetched.
//!
//! Both maps are addressable by dotted path (`params.id`, `hooks.user.bookId`).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::map::Entry;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::LookupError;
use crate::formatter::{ErrorFormatter, JsonErrorFormatter};
use crate::path::{self, ValuePath};
use crate::request::Request;
use crate::response::Response;

pub struct Context {
    request: Request,
    params: Map<String, Value>,
    hooks: Map<String, Value>,
    errors: Arc<dyn ErrorFormatter>,
}

impl Context {
    /// Context for `request` with no parameters and the default
    /// [`JsonErrorFormatter`].
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: Map::new(),
            hooks: Map::new(),
            errors: Arc::new(JsonErrorFormatter),
        }
    }

    /// Builds the params map from the query string and matched route params.
    pub(crate) fn from_route(
        request: Request,
        route_params: impl IntoIterator<Item = (String, String)>,
        errors: Arc<dyn ErrorFormatter>,
    ) -> Self {
        let mut params = request.query().map(parse_query).unwrap_or_default();
        for (name, value) in route_params {
            params.insert(name, Value::String(value));
        }
        Self { request, params, hooks: Map::new(), errors }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_error_formatter(mut self, errors: Arc<dyn ErrorFormatter>) -> Self {
        self.errors = errors;
        self
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn params(&self) -> &Map<String, Value> { &self.params }
    pub fn params_mut(&mut self) -> &mut Map<String, Value> { &mut self.params }
    pub fn hooks(&self) -> &Map<String, Value> { &self.hooks }
    pub fn hooks_mut(&mut self) -> &mut Map<String, Value> { &mut self.hooks }

    /// Shortcut for `params[name]` when it is a string.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// The value stored under hook `name`. A not-found lookup stores `null`,
    /// which this reports as `None`.
    pub fn hook(&self, name: &str) -> Option<&Value> {
        self.hooks.get(name).filter(|v| !v.is_null())
    }

    /// Deserialises hook `name` into `T`; `Ok(None)` when the slot is empty.
    pub fn hook_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, serde_json::Error> {
        self.hook(name).cloned().map(serde_json::from_value).transpose()
    }

    /// Fills hook slot `name`.
    pub fn set_hook(&mut self, name: &str, value: Value) {
        if self.hooks.insert(name.to_owned(), value).is_some() {
            warn!(hook = name, "hook slot overwritten; two middleware share one name");
        }
    }

    /// Resolves a dotted path against the context.
    ///
    /// The first segment picks the root map (`params` or `hooks`); the rest is
    /// walked through nested objects and arrays. Any missing step gives `None`.
    pub fn value_at(&self, path: &ValuePath) -> Option<Value> {
        let (root, rest) = path.split_root();
        let map = match root {
            "params" => &self.params,
            "hooks" => &self.hooks,
            _ => return None,
        };
        let Some((first, rest)) = rest.split_first() else {
            return Some(Value::Object(map.clone()));
        };
        path::walk(map.get(first)?, rest).cloned()
    }

    /// Hands a lookup failure to the error formatter and returns its response.
    pub fn report_lookup_error(&self, error: LookupError) -> Response {
        self.errors.format(error)
    }
}

impl From<Request> for Context {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}

/// Parses a query string into a params map. Repeated keys collect into an
/// array in order of appearance; an undecodable query yields no params.
fn parse_query(query: &str) -> Map<String, Value> {
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(query, "ignoring malformed query string: {e}");
            return Map::new();
        }
    };

    let mut params = Map::new();
    for (key, value) in pairs {
        let value = Value::String(value);
        match params.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    params
}
