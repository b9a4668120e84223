//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (reuse or generate, echo in the response)
//!
//! Authentication is not a layer: handlers that need a caller take the
//! [`RequireUser`] extractor.

pub mod auth;
pub mod request_id;

pub use auth::RequireUser;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
