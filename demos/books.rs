//! Book API backed by an in-memory table.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example books
//!
//! Try:
//!   curl http://localhost:3000/books/1
//!   curl 'http://localhost:3000/books/1?includes=author'
//!   curl http://localhost:3000/books/by-isbn/978-0321751041
//!   curl http://localhost:3000/books/99          → 404

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tsu_getter::middleware::{Getter, getter, pk_getter};
use tsu_getter::{
    Context, FindOptions, IncludeDescriptor, IncludeTable, LookupError, Model, Response, Route,
    Router, Server, StatusCode,
};

struct Books {
    rows: Vec<Value>,
    authors: HashMap<u64, Value>,
    includes: IncludeTable,
}

impl Books {
    fn seeded() -> Self {
        Self {
            rows: vec![
                json!({ "id": 1, "isbn": "978-0321751041", "name": "The Art of Computer Programming", "authorId": 7 }),
                json!({ "id": 2, "isbn": "978-1593278281", "name": "The Rust Programming Language", "authorId": 8 }),
            ],
            authors: HashMap::from([
                (7, json!({ "id": 7, "name": "Donald Knuth" })),
                (8, json!({ "id": 8, "name": "Steve Klabnik" })),
            ]),
            includes: IncludeTable::from([(
                "author".to_owned(),
                IncludeDescriptor::new("author", "author").required(true),
            )]),
        }
    }

    /// Route params arrive as strings; the table keys ids as numbers.
    fn matches(row: &Value, field: &str, wanted: &Value) -> bool {
        match (&row[field], wanted) {
            (Value::Number(n), Value::String(s)) => n.to_string() == *s,
            (have, wanted) => have == wanted,
        }
    }

    fn hydrate(&self, row: &Value, include: Option<&[IncludeDescriptor]>) -> Value {
        let mut row = row.clone();
        for relation in include.unwrap_or_default() {
            let author = row["authorId"].as_u64().and_then(|id| self.authors.get(&id));
            row[relation.alias.as_str()] = author.cloned().unwrap_or(Value::Null);
        }
        row
    }
}

#[async_trait]
impl Model for Books {
    fn name(&self) -> &str {
        "book"
    }

    fn includes(&self) -> Option<&IncludeTable> {
        Some(&self.includes)
    }

    async fn find_one(&self, options: FindOptions) -> Result<Option<Value>, LookupError> {
        let found = self
            .rows
            .iter()
            .find(|row| options.filter.iter().all(|(field, wanted)| Self::matches(row, field, wanted)));
        Ok(found.map(|row| self.hydrate(row, options.include.as_deref())))
    }

    async fn find_by_pk(&self, key: Value, options: FindOptions) -> Result<Option<Value>, LookupError> {
        self.find_one(FindOptions::by("id", key).with_include(options.include)).await
    }
}

async fn show_book(ctx: Context) -> Response {
    match ctx.hook("book") {
        Some(book) => Response::json_value(book),
        None => Response::status(StatusCode::NOT_FOUND),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let books: Arc<dyn Model> = Arc::new(Books::seeded());

    let by_isbn = Getter::builder()
        .model(Arc::clone(&books))
        .hook("book")
        .path("params.isbn")
        .field("isbn")
        .build()?;

    let app = Router::new()
        .get("/books/{id}", Route::new(show_book).with(getter(Arc::clone(&books), "book")?))
        .get("/books/by-isbn/{isbn}", Route::new(show_book).with(by_isbn))
        .delete("/books/{id}", Route::new(delete_book).with(pk_getter(books, "book")?));

    Server::bind("0.0.0.0:3000").serve(app).await?;
    Ok(())
}

// DELETE /books/{id} → 204, or 404 when the getter found nothing
async fn delete_book(ctx: Context) -> StatusCode {
    if ctx.hook("book").is_some() { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND }
}
