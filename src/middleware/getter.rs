//! Record-fetching middleware.
//!
//! A [`Getter`] reads a lookup value from the request (by default the `id`
//! route parameter), finds the matching record through a [`Model`], and
//! stores it under a named hook for the handlers after it:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use tsu_getter::{Context, Model, Route, Router, StatusCode};
//! # use tsu_getter::middleware::getter;
//! # fn books() -> Arc<dyn Model> { unimplemented!() }
//! async fn show(ctx: Context) -> tsu_getter::Response {
//!     match ctx.hook("book") {
//!         Some(book) => tsu_getter::Response::json_value(book),
//!         None => tsu_getter::Response::status(StatusCode::NOT_FOUND),
//!     }
//! }
//!
//! # fn main() -> Result<(), tsu_getter::ConfigError> {
//! let app = Router::new()
//!     .get("/books/{id}", Route::new(show).with(getter(books(), "book")?));
//! # Ok(()) }
//! ```
//!
//! Two flavours:
//!
//! - **by field** ([`getter`]) — `find_one` with `where { field: value }`;
//!   the field defaults to the model's primary key.
//! - **by primary key** ([`pk_getter`]) — `find_by_pk(value)`.
//!
//! Either one honours `?includes=a,b`, eager-loading the relations the model
//! allow-lists in [`Model::includes`].
//!
//! A record that does not exist is not an error: the hook is set to `null`
//! and the chain continues. A failing lookup stops the chain and goes to the
//! router's [`ErrorFormatter`](crate::ErrorFormatter).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::includes::resolve_includes;
use super::{Middleware, Next};
use crate::context::Context;
use crate::error::ConfigError;
use crate::handler::BoxFuture;
use crate::model::{FindOptions, Model};
use crate::path::ValuePath;
use crate::response::Response;

/// Where the lookup value is read from when no path is given.
pub const DEFAULT_PATH: &str = "params.id";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Lookup {
    /// `find_one` on this field, or on the model's primary key when `None`.
    Field(Option<String>),
    PrimaryKey,
}

/// Middleware that fetches one record into a hook slot.
///
/// Build with [`getter`], [`pk_getter`], or [`Getter::builder`] for the
/// non-default options.
pub struct Getter {
    model: Arc<dyn Model>,
    hook: String,
    path: ValuePath,
    lookup: Lookup,
}

impl Getter {
    pub fn builder() -> GetterBuilder {
        GetterBuilder::default()
    }

    pub fn hook(&self) -> &str {
        &self.hook
    }

    pub fn path(&self) -> &ValuePath {
        &self.path
    }

    async fn fetch(self: Arc<Self>, mut ctx: Context, next: Next) -> Response {
        // An unresolvable path is passed on as `null`; the model decides
        // what a null key matches.
        let value = ctx.value_at(&self.path).unwrap_or(Value::Null);
        let include = resolve_includes(ctx.params(), self.model.includes());

        debug!(
            model = self.model.name(),
            hook = %self.hook,
            path = %self.path,
            includes = include.as_ref().map_or(0, Vec::len),
            "fetching record"
        );

        let found = match &self.lookup {
            Lookup::Field(field) => {
                let field = field.as_deref().unwrap_or_else(|| self.model.primary_key());
                let options = FindOptions::by(field, value).with_include(include);
                self.model.find_one(options).await
            }
            Lookup::PrimaryKey => {
                let options = FindOptions::default().with_include(include);
                self.model.find_by_pk(value, options).await
            }
        };

        match found {
            Ok(record) => {
                ctx.set_hook(&self.hook, record.unwrap_or(Value::Null));
                next.run(ctx).await
            }
            Err(e) => {
                warn!(model = self.model.name(), hook = %self.hook, "lookup failed: {e}");
                ctx.report_lookup_error(e)
            }
        }
    }
}

impl Middleware for Getter {
    fn handle(self: Arc<Self>, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(self.fetch(ctx, next))
    }

    fn name(&self) -> &str {
        "getter"
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter")
            .field("model", &self.model.name())
            .field("hook", &self.hook)
            .field("path", &self.path)
            .field("lookup", &self.lookup)
            .finish()
    }
}

/// Fetch by field: `find_one` where the model's primary key equals
/// `params.id`. Use [`Getter::builder`] to change the field or path.
pub fn getter(model: Arc<dyn Model>, hook: impl Into<String>) -> Result<Getter, ConfigError> {
    Getter::builder().model(model).hook(hook).build()
}

/// Fetch by primary key: `find_by_pk(params.id)`.
pub fn pk_getter(model: Arc<dyn Model>, hook: impl Into<String>) -> Result<Getter, ConfigError> {
    Getter::builder().model(model).hook(hook).primary_key().build()
}

/// Validating builder for [`Getter`].
///
/// Nothing is checked until [`build`](GetterBuilder::build), which reports
/// the first problem it finds.
#[derive(Default)]
pub struct GetterBuilder {
    model: Option<Arc<dyn Model>>,
    hook: Option<String>,
    path: Option<String>,
    field: Option<String>,
    primary_key: bool,
}

impl GetterBuilder {
    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Hook slot the record is stored under.
    pub fn hook(mut self, hook: impl Into<String>) -> Self {
        self.hook = Some(hook.into());
        self
    }

    /// Dotted path of the lookup value. Defaults to [`DEFAULT_PATH`].
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Field to match instead of the primary key. Not allowed together with
    /// [`primary_key`](GetterBuilder::primary_key).
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Look up with `find_by_pk` instead of `find_one`.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn build(self) -> Result<Getter, ConfigError> {
        let model = self.model.ok_or(ConfigError::Model)?;

        let hook = self.hook.filter(|h| !h.trim().is_empty()).ok_or(ConfigError::Hook)?;

        let path: ValuePath = self.path.as_deref().unwrap_or(DEFAULT_PATH).parse()?;

        let lookup = match (self.primary_key, self.field) {
            (true, Some(field)) => {
                return Err(ConfigError::Field {
                    field,
                    reason: "a primary-key getter always matches the primary key",
                });
            }
            (true, None) => Lookup::PrimaryKey,
            (false, Some(field)) if field.trim().is_empty() => {
                return Err(ConfigError::Field { field, reason: "field must be a non-empty string" });
            }
            (false, field) => Lookup::Field(field),
        };

        Ok(Getter { model, hook, path, lookup })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use http::StatusCode;
    use serde_json::{Map, json};

    use super::*;
    use crate::error::LookupError;
    use crate::formatter::ErrorFormatter;
    use crate::model::{IncludeDescriptor, IncludeTable};
    use crate::request::Request;

    #[derive(Debug, PartialEq)]
    enum Call {
        FindOne(Value),
        FindByPk(Value, Value),
    }

    /// In-memory model that records every call and answers with a fixed result.
    struct Books {
        includes: Option<IncludeTable>,
        fail: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl Books {
        fn new() -> Arc<Self> {
            Arc::new(Self { includes: None, fail: false, calls: Mutex::default() })
        }

        fn with_includes() -> Arc<Self> {
            let includes = IncludeTable::from([(
                "user".to_owned(),
                IncludeDescriptor::new("user", "creator").required(true),
            )]);
            Arc::new(Self { includes: Some(includes), fail: false, calls: Mutex::default() })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { includes: None, fail: true, calls: Mutex::default() })
        }

        fn calls(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
            self.calls.lock().unwrap()
        }

        fn answer(&self) -> Result<Option<Value>, LookupError> {
            if self.fail {
                Err(LookupError::other("Find book error"))
            } else {
                Ok(Some(json!({ "id": 20, "name": "JavaScript 高级程序设计" })))
            }
        }
    }

    #[async_trait]
    impl Model for Books {
        fn name(&self) -> &str {
            "book"
        }

        fn includes(&self) -> Option<&IncludeTable> {
            self.includes.as_ref()
        }

        async fn find_one(&self, options: FindOptions) -> Result<Option<Value>, LookupError> {
            self.calls().push(Call::FindOne(serde_json::to_value(&options).unwrap()));
            self.answer()
        }

        async fn find_by_pk(&self, key: Value, options: FindOptions) -> Result<Option<Value>, LookupError> {
            self.calls().push(Call::FindByPk(key, serde_json::to_value(&options).unwrap()));
            self.answer()
        }
    }

    /// Records the messages of every error it is asked to format.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ErrorFormatter for Recorder {
        fn format(&self, error: LookupError) -> Response {
            self.0.lock().unwrap().push(error.to_string());
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }

    fn ctx(params: Value) -> Context {
        let Value::Object(params) = params else { panic!("params must be an object") };
        Context::new(Request::default()).with_params(params)
    }

    /// A continuation that counts its calls and echoes the `book` hook.
    fn counting_next(count: &Arc<AtomicUsize>) -> Next {
        let count = Arc::clone(count);
        Next::endpoint(move |ctx: Context| {
            count.fetch_add(1, Ordering::SeqCst);
            async move { Response::json_value(ctx.hooks()) }
        })
    }

    fn hooks_of(res: &Response) -> Map<String, Value> {
        serde_json::from_slice(res.body()).unwrap()
    }

    // ── construction ─────────────────────────────────────────────────────────

    #[test]
    fn missing_model_is_rejected() {
        let err = Getter::builder().hook("book").build().unwrap_err();
        assert_eq!(err, ConfigError::Model);
        assert_eq!(err.to_string(), "Model must be a class of the ORM defined");
    }

    #[test]
    fn missing_or_blank_hook_is_rejected() {
        let err = Getter::builder().model(Books::new()).build().unwrap_err();
        assert_eq!(err, ConfigError::Hook);
        assert_eq!(getter(Books::new(), "").unwrap_err(), ConfigError::Hook);
        assert_eq!(pk_getter(Books::new(), "  ").unwrap_err(), ConfigError::Hook);
    }

    #[test]
    fn malformed_path_is_rejected() {
        for bad in ["", "hooks..bookId", "params["] {
            let err = Getter::builder().model(Books::new()).hook("book").path(bad).build().unwrap_err();
            assert!(matches!(err, ConfigError::Path { .. }), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn field_rules() {
        let err = Getter::builder().model(Books::new()).hook("book").field("").build().unwrap_err();
        assert!(matches!(err, ConfigError::Field { .. }));

        let err = Getter::builder()
            .model(Books::new())
            .hook("book")
            .primary_key()
            .field("bookId")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Field { .. }));
    }

    #[test]
    fn defaults_to_params_id() {
        let g = getter(Books::new(), "book").unwrap();
        assert_eq!(g.hook(), "book");
        assert_eq!(g.path().as_str(), DEFAULT_PATH);
    }

    // ── lookups ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn finds_by_primary_key_field_and_continues() {
        let model = Books::new();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(getter(model.clone(), "book").unwrap());

        let res = g.handle(ctx(json!({ "id": 20 })), counting_next(&count)).await;

        assert_eq!(*model.calls(), [Call::FindOne(json!({ "where": { "id": 20 } }))]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hooks_of(&res)["book"], json!({ "id": 20, "name": "JavaScript 高级程序设计" }));
    }

    #[tokio::test]
    async fn reads_value_from_a_hook_path() {
        let model = Books::new();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(Getter::builder().model(model.clone()).hook("book").path("hooks.user.bookId").build().unwrap());

        let mut ctx = ctx(json!({ "id": 20 }));
        ctx.set_hook("user", json!({ "bookId": 30 }));
        g.handle(ctx, counting_next(&count)).await;

        assert_eq!(*model.calls(), [Call::FindOne(json!({ "where": { "id": 30 } }))]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn matches_a_custom_field() {
        let model = Books::new();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(
            Getter::builder()
                .model(model.clone())
                .hook("book")
                .path("hooks.user.bookId")
                .field("bookId")
                .build()
                .unwrap(),
        );

        let mut ctx = ctx(json!({ "id": 20 }));
        ctx.set_hook("user", json!({ "bookId": 30 }));
        g.handle(ctx, counting_next(&count)).await;

        assert_eq!(*model.calls(), [Call::FindOne(json!({ "where": { "bookId": 30 } }))]);
    }

    #[tokio::test]
    async fn unresolved_path_passes_null_through() {
        let model = Books::new();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(getter(model.clone(), "book").unwrap());

        g.handle(ctx(json!({})), counting_next(&count)).await;

        assert_eq!(*model.calls(), [Call::FindOne(json!({ "where": { "id": null } }))]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pk_getter_uses_find_by_pk() {
        let model = Books::with_includes();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(pk_getter(model.clone(), "book").unwrap());

        g.handle(ctx(json!({ "id": 20, "includes": "user" })), counting_next(&count)).await;

        assert_eq!(
            *model.calls(),
            [Call::FindByPk(
                json!(20),
                json!({ "include": [{ "model": "user", "as": "creator", "required": true }] }),
            )]
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pk_getter_reads_an_overridden_path() {
        let model = Books::new();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(
            Getter::builder()
                .model(model.clone())
                .hook("book")
                .primary_key()
                .path("hooks.user.bookId")
                .build()
                .unwrap(),
        );

        let mut ctx = ctx(json!({ "id": 20 }));
        ctx.set_hook("user", json!({ "bookId": 30 }));
        let res = g.handle(ctx, counting_next(&count)).await;

        assert_eq!(*model.calls(), [Call::FindByPk(json!(30), json!({}))]);
        assert_eq!(hooks_of(&res)["book"]["id"], 20);
    }

    #[tokio::test]
    async fn leaves_params_and_include_table_untouched() {
        let model = Books::with_includes();
        let table = model.includes.clone();
        let g = Arc::new(getter(model.clone(), "book").unwrap());
        let params = json!({ "id": 20, "includes": "user,author" });

        let echo_params = Next::endpoint(|ctx: Context| async move { Response::json_value(ctx.params()) });
        let res = g.handle(ctx(params.clone()), echo_params).await;

        let seen: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(seen, params);
        assert_eq!(model.includes, table);
        assert!(matches!(&model.calls()[..], [Call::FindOne(options)] if options["include"].is_array()));
    }

    #[tokio::test]
    async fn attaches_allow_listed_includes() {
        let model = Books::with_includes();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(getter(model.clone(), "book").unwrap());

        g.handle(ctx(json!({ "id": 20, "includes": "user,author" })), counting_next(&count)).await;

        assert_eq!(
            *model.calls(),
            [Call::FindOne(json!({
                "where": { "id": 20 },
                "include": [{ "model": "user", "as": "creator", "required": true }],
            }))]
        );
    }

    #[tokio::test]
    async fn omits_include_when_nothing_matches() {
        let model = Books::with_includes();
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(getter(model.clone(), "book").unwrap());

        Arc::clone(&g).handle(ctx(json!({ "id": 20, "includes": "author" })), counting_next(&count)).await;
        g.handle(ctx(json!({ "id": 20, "includes": ["user"] })), counting_next(&count)).await;

        let bare = || Call::FindOne(json!({ "where": { "id": 20 } }));
        assert_eq!(*model.calls(), [bare(), bare()]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_stores_null_and_continues() {
        struct Empty;

        #[async_trait]
        impl Model for Empty {
            fn name(&self) -> &str {
                "book"
            }

            async fn find_one(&self, _: FindOptions) -> Result<Option<Value>, LookupError> {
                Ok(None)
            }

            async fn find_by_pk(&self, _: Value, _: FindOptions) -> Result<Option<Value>, LookupError> {
                Ok(None)
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(getter(Arc::new(Empty), "book").unwrap());

        let res = g.handle(ctx(json!({ "id": 404 })), counting_next(&count)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hooks_of(&res)["book"], Value::Null);
    }

    #[tokio::test]
    async fn lookup_failure_goes_to_the_formatter_and_stops() {
        let model = Books::failing();
        let recorder = Arc::new(Recorder::default());
        let count = Arc::new(AtomicUsize::new(0));
        let g = Arc::new(getter(model.clone(), "book").unwrap());

        let ctx = ctx(json!({ "id": 20 })).with_error_formatter(recorder.clone());
        let res = g.handle(ctx, counting_next(&count)).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(*recorder.0.lock().unwrap(), ["Find book error"]);
        assert_eq!(model.calls().len(), 1);
    }
}
