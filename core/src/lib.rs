//! Fluent, hookable HTTP request builder on top of `ureq`.
//!
//! # Overview
//! `RequestBuilder` collects a payload (JSON, form, raw bytes, text or
//! multipart), a query string, headers, basic auth, lifecycle hooks and a
//! cancellation `Context`, then a verb call (`get`, `post`, ...) sends exactly
//! one request and returns a `Response`.
//!
//! ```no_run
//! use httpreq_core::RequestBuilder;
//!
//! let response = RequestBuilder::new()
//!     .query([("page", "2")])
//!     .headers([("Accept", "application/json")])
//!     .on_after_response(|r| {
//!         tracing::info!(status = r.status(), "fetched");
//!         Ok(())
//!     })
//!     .get("https://example.com/items")?;
//! # Ok::<(), httpreq_core::Error>(())
//! ```
//!
//! # Design
//! - The payload is a single tagged value; the last body method called wins.
//! - Configuration failures are deferred and returned by the verb call.
//! - `build_request` yields the outgoing request as plain data without any
//!   I/O, so composition rules can be checked or executed elsewhere.
//! - Connection pooling, TLS, redirects and DNS belong to `ureq`.

pub mod builder;
pub mod context;
pub mod error;
pub mod hooks;
pub mod http;
pub mod multipart;
pub mod options;
mod payload;
mod transport;

pub use builder::RequestBuilder;
pub use context::{CancelToken, Context};
pub use error::{Error, HookError};
pub use hooks::{AfterResponseHook, BeforeRequestHook, ErrorHook};
pub use http::{HttpMethod, PreparedRequest, Response};
pub use multipart::{MultipartParam, MultipartWriter};
pub use options::{ClientOption, TransportConfig};
pub use payload::{CONTENT_TYPE_BYTES, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
