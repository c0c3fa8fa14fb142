//! Lifecycle hook signatures.
//!
//! Hooks run in registration order, with no deduplication.
//!
//! - Before-request hooks get the builder mutably and may still change it.
//!   Returning `Err` aborts the dispatch with `Error::Hook`.
//! - After-response hooks get a shared borrow of the response. Their errors
//!   are logged and otherwise ignored: the exchange already happened.
//! - Error hooks observe every error a dispatch returns, exactly once each.

use crate::builder::RequestBuilder;
use crate::error::{Error, HookError};
use crate::http::Response;

pub type BeforeRequestHook =
    Box<dyn FnMut(&mut RequestBuilder) -> Result<(), HookError> + Send + 'static>;

pub type AfterResponseHook = Box<dyn FnMut(&Response) -> Result<(), HookError> + Send + 'static>;

pub type ErrorHook = Box<dyn FnMut(&RequestBuilder, &Error) + Send + 'static>;
