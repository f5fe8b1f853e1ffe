//! # tsu-getter
//!
//! Record-fetching middleware for the tsu HTTP framework.
//!
//! Most REST endpoints that act on one resource start the same way: read an
//! id from the URL, load the row, 404 if it is missing. A
//! [`Getter`](middleware::Getter) does the loading once, in front of the
//! handler, and leaves the record in a named hook slot:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tsu_getter::middleware::getter;
//! use tsu_getter::{Context, Model, Response, Route, Router, Server, StatusCode};
//!
//! # fn books() -> Arc<dyn Model> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Router::new()
//!         .get("/books/{id}", Route::new(show_book).with(getter(books(), "book")?));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn show_book(ctx: Context) -> Response {
//!     match ctx.hook("book") {
//!         Some(book) => Response::json_value(book),
//!         None => Response::status(StatusCode::NOT_FOUND),
//!     }
//! }
//! ```
//!
//! `GET /books/20?includes=author` asks the model for
//! `{ where: { id: "20" }, include: [<author>] }`, provided the model
//! allow-lists `author` in [`Model::includes`].
//!
//! The crate owns the plumbing around that middleware:
//!
//! - Radix-tree routing via [`matchit`], one tree per method
//! - Async I/O on tokio + hyper, HTTP/1.1 and HTTP/2
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! Database access stays behind the [`Model`] trait.

mod context;
mod error;
mod formatter;
mod handler;
mod model;
mod path;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use context::Context;
pub use error::{ConfigError, Error, FieldError, LookupError};
pub use formatter::{ErrorFormatter, JsonErrorFormatter};
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use model::{FindOptions, IncludeDescriptor, IncludeTable, Model};
pub use path::ValuePath;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Route, Router};
pub use server::Server;
