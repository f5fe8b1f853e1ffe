//! Turning lookup failures into responses.

use http::StatusCode;
use serde_json::json;

use crate::error::LookupError;
use crate::response::Response;

/// Formats a [`LookupError`] into the response sent to the client.
///
/// Install one per router with [`Router::error_formatter`](crate::Router::error_formatter).
/// Middleware never decides status codes for backend failures itself; it
/// hands the error over unchanged and stops the chain.
pub trait ErrorFormatter: Send + Sync + 'static {
    fn format(&self, error: LookupError) -> Response;
}

/// Default formatter: JSON bodies, status by error kind.
///
/// | Error | Status |
/// |---|---|
/// | `Validation` | `409 Conflict`, with per-field `errors` |
/// | `Unavailable` | `503 Service Unavailable` |
/// | anything else | `500 Internal Server Error` |
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonErrorFormatter;

impl ErrorFormatter for JsonErrorFormatter {
    fn format(&self, error: LookupError) -> Response {
        let (status, body) = match &error {
            LookupError::Validation { message, errors } => (
                StatusCode::CONFLICT,
                json!({ "message": message, "errors": errors }),
            ),
            LookupError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "message": error.to_string() }),
            ),
            LookupError::Other(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": error.to_string() }),
            ),
        };
        Response::builder().status(status).json_value(&body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::error::FieldError;

    fn body(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn validation_errors_are_conflicts_with_field_details() {
        let res = JsonErrorFormatter.format(LookupError::Validation {
            message: "Validation error".into(),
            errors: vec![FieldError { field: "id".into(), message: "must be an integer".into() }],
        });
        assert_eq!(res.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            body(&res),
            json!({
                "message": "Validation error",
                "errors": [{ "field": "id", "message": "must be an integer" }],
            })
        );
    }

    #[test]
    fn unavailable_backend_is_503() {
        let res = JsonErrorFormatter.format(LookupError::Unavailable("connection refused".into()));
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(&res)["message"], "data source unavailable: connection refused");
    }

    #[test]
    fn other_errors_are_500_with_message() {
        let res = JsonErrorFormatter.format(LookupError::other("Find book error"));
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&res), json!({ "message": "Find book error" }));
    }
}
