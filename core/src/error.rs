//! Error types for the request builder.
//!
//! # Design
//! Configuration mistakes (a JSON value that will not serialize, an upload
//! file that cannot be read) do not stop the fluent chain. The builder keeps
//! the first one and returns it from the terminal verb call, so every failure
//! a caller can see comes out of the same `Result`.
//!
//! HTTP error statuses are not errors here: a 404 is a `Response` like any
//! other. Only failures to produce a response land in `Error`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by user-supplied hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `RequestBuilder` dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// The value passed to `json` could not be serialized.
    #[error("failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// A file passed to `upload`/`uploads` could not be opened or read.
    #[error("failed to upload {}: {source}", path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stream passed to `upload_from_reader` failed while being copied.
    #[error("failed to read multipart stream for field {field:?}: {source}")]
    UploadStream {
        field: String,
        #[source]
        source: io::Error,
    },

    /// The verb is not one of the supported HTTP methods.
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    /// The target URL (query string included) could not be parsed.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A before-request hook rejected the request.
    #[error("before-request hook failed: {0}")]
    Hook(#[source] HookError),

    /// The underlying client failed to complete the exchange.
    #[error("transport error: {0}")]
    Transport(#[source] Box<ureq::Transport>),

    /// The attached context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The attached context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// True for failures raised by the context rather than the network.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// The `ureq` error kind, for transport failures.
    pub fn transport_kind(&self) -> Option<ureq::ErrorKind> {
        match self {
            Error::Transport(t) => Some(t.kind()),
            _ => None,
        }
    }
}
