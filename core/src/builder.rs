//! Fluent request builder and dispatch.
//!
//! # Design
//! Configuration methods take and return the builder by value so they chain.
//! None of them touch the network. A verb call (`get`, `post`, ...) consumes
//! the builder, so a builder dispatches at most once.
//!
//! Dispatch order:
//! 1. a deferred configuration error, if any, fails the call;
//! 2. before-request hooks run in order and may abort;
//! 3. the payload is encoded (multipart gets its closing boundary), the query
//!    string is appended and the URL parsed;
//! 4. `Content-Type` is always set, empty when there is no payload, then basic
//!    auth, then the configured headers, which override both;
//! 5. the request is executed; after-response hooks see `&Response`.
//!
//! Every error returned from dispatch is first passed to the error hooks.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{instrument, Span};
use url::Url;

use crate::context::Context;
use crate::error::{Error, HookError};
use crate::hooks::{AfterResponseHook, BeforeRequestHook, ErrorHook};
use crate::http::{HttpMethod, PreparedRequest, Response};
use crate::multipart::MultipartParam;
use crate::options::{ClientOption, ClientSettings};
use crate::payload::{encode_form, Payload};
use crate::transport;

#[derive(Default)]
pub struct RequestBuilder {
    settings: ClientSettings,
    payload: Payload,
    query: String,
    headers: BTreeMap<String, String>,
    basic_auth: Option<(String, String)>,
    before_request: Vec<BeforeRequestHook>,
    after_response: Vec<AfterResponseHook>,
    on_error: Vec<ErrorHook>,
    ctx: Option<Context>,
    deferred: Option<Error>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("payload", &self.payload)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("basic_auth_user", &self.basic_auth.as_ref().map(|(u, _)| u))
            .field("before_request_hooks", &self.before_request.len())
            .field("after_response_hooks", &self.after_response.len())
            .field("error_hooks", &self.on_error.len())
            .field("ctx", &self.ctx)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: impl IntoIterator<Item = ClientOption>) -> Self {
        let mut builder = Self::default();
        for option in options {
            builder.settings.apply(option);
        }
        builder
    }

    // ---------------------------------------------------------------------
    // Payload
    // ---------------------------------------------------------------------

    /// Sends `value` as `application/json`. A serialization failure is
    /// returned by the verb call.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.payload = Payload::Json(bytes),
            Err(e) => self.defer(e.into()),
        }
        self
    }

    pub fn form_data<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.payload = Payload::Form(encode_form(pairs));
        self
    }

    pub fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.payload = Payload::Bytes(bytes.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.payload = Payload::Text(text.into());
        self
    }

    // ---------------------------------------------------------------------
    // Query, headers, auth
    // ---------------------------------------------------------------------

    /// Replaces the query string. Pairs are sorted by key. The content type is
    /// left alone.
    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = encode_form(pairs);
        self
    }

    /// Replaces all configured headers. These win over `Content-Type` and
    /// basic auth at dispatch; a `Host` entry readdresses the request.
    pub fn headers<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Only applied when both `user` and `password` are non-empty.
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }

    // ---------------------------------------------------------------------
    // Multipart
    // ---------------------------------------------------------------------

    pub fn multipart_form_data<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let writer = self.payload.multipart_mut();
        for (name, value) in fields {
            writer.write_field(name.as_ref(), value.as_ref());
        }
        self
    }

    /// Reads the file at `path` into a new part named `field`. The part's file
    /// name is the last component of `path`.
    pub fn upload(mut self, field: &str, path: impl AsRef<Path>) -> Self {
        if let Err(e) = self.write_upload(field, path.as_ref()) {
            self.defer(e);
        }
        self
    }

    pub fn upload_from_reader(mut self, param: MultipartParam<'_>) -> Self {
        if let Err(e) = self.write_upload_stream(param) {
            self.defer(e);
        }
        self
    }

    pub fn uploads<I, K, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: AsRef<str>,
        P: AsRef<Path>,
    {
        for (field, path) in files {
            if let Err(e) = self.write_upload(field.as_ref(), path.as_ref()) {
                self.defer(e);
            }
        }
        self
    }

    pub fn uploads_from_reader<'a>(
        mut self,
        params: impl IntoIterator<Item = MultipartParam<'a>>,
    ) -> Self {
        for param in params {
            if let Err(e) = self.write_upload_stream(param) {
                self.defer(e);
            }
        }
        self
    }

    fn write_upload(&mut self, field: &str, path: &Path) -> Result<(), Error> {
        let upload_err = |source| Error::Upload {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(upload_err)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let copied = self
            .payload
            .multipart_mut()
            .write_file(field, &file_name, &mut file)
            .map_err(upload_err)?;
        tracing::debug!(field, file = %path.display(), bytes = copied, "buffered upload");
        Ok(())
    }

    fn write_upload_stream(&mut self, param: MultipartParam<'_>) -> Result<(), Error> {
        let MultipartParam {
            field_name,
            file_name,
            body,
        } = param;
        self.payload
            .multipart_mut()
            .write_file(&field_name, &file_name, body)
            .map_err(|source| Error::UploadStream {
                field: field_name.clone(),
                source,
            })?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Hooks and context
    // ---------------------------------------------------------------------

    pub fn on_before_request<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut RequestBuilder) -> Result<(), HookError> + Send + 'static,
    {
        self.before_request.push(Box::new(hook));
        self
    }

    pub fn on_after_response<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Response) -> Result<(), HookError> + Send + 'static,
    {
        self.after_response.push(Box::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&RequestBuilder, &Error) + Send + 'static,
    {
        self.on_error.push(Box::new(hook));
        self
    }

    pub fn set_context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// The attached context, or the background context if none was set.
    pub fn context(&self) -> Context {
        self.ctx.clone().unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // In-place access for before-request hooks
    // ---------------------------------------------------------------------

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.headers
    }

    pub fn query_string(&self) -> &str {
        &self.query
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    pub fn get(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Get, url)
    }

    pub fn post(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Post, url)
    }

    pub fn put(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Put, url)
    }

    pub fn patch(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Patch, url)
    }

    pub fn delete(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Delete, url)
    }

    pub fn head(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Head, url)
    }

    pub fn options(self, url: &str) -> Result<Response, Error> {
        self.send(HttpMethod::Options, url)
    }

    pub fn send(self, method: HttpMethod, url: &str) -> Result<Response, Error> {
        self.dispatch(Ok(method), url)
    }

    /// Dispatches with a method given by name, matched case-insensitively.
    /// An unknown method is reported like any other construction failure.
    pub fn request(self, method: &str, url: &str) -> Result<Response, Error> {
        let method = method.parse();
        self.dispatch(method, url)
    }

    /// Builds the outgoing request without running hooks or touching the
    /// network, for callers that execute it themselves.
    pub fn build_request(mut self, method: HttpMethod, url: &str) -> Result<PreparedRequest, Error> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        self.prepare(method, url)
    }

    #[instrument(
        name = "http_request",
        skip_all,
        fields(
            http.url = %url,
            http.method = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
        )
    )]
    fn dispatch(mut self, method: Result<HttpMethod, Error>, url: &str) -> Result<Response, Error> {
        if let Some(err) = self.deferred.take() {
            return Err(self.fail(err));
        }
        if let Err(e) = self.run_before_request_hooks() {
            return Err(self.fail(Error::Hook(e)));
        }

        let method = match method {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e)),
        };
        Span::current().record("http.method", method.as_str());

        let agent = self.settings.agent();
        let prepared = match self.prepare(method, url) {
            Ok(p) => p,
            Err(e) => return Err(self.fail(e)),
        };

        tracing::debug!(url = %prepared.url, "dispatching request");
        let ctx = self.context();
        let cap = self.settings.cancellable_timeout();
        let response = match transport::execute(&agent, prepared, &ctx, cap) {
            Ok(r) => Response::new(r),
            Err(e) => return Err(self.fail(e)),
        };

        Span::current().record("http.status_code", response.status());
        tracing::debug!(status = response.status(), "received response");
        self.run_after_response_hooks(&response);
        Ok(response)
    }

    fn prepare(&mut self, method: HttpMethod, url: &str) -> Result<PreparedRequest, Error> {
        let payload = std::mem::take(&mut self.payload);
        let content_type = payload.content_type();
        let body = payload.into_bytes();

        let target = if self.query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{}", self.query)
        };
        let url = Url::parse(&target).map_err(|source| Error::InvalidUrl {
            url: target.clone(),
            source,
        })?;

        let mut request = PreparedRequest {
            method,
            url,
            headers: Vec::new(),
            body: method.sends_body().then_some(body),
        };
        request.set_header("Content-Type", &content_type);
        if let Some((user, password)) = &self.basic_auth {
            if !user.is_empty() && !password.is_empty() {
                request.set_header("Authorization", &basic_auth_value(user, password));
            }
        }
        for (name, value) in &self.headers {
            request.set_header(name, value);
        }
        Ok(request)
    }

    fn defer(&mut self, err: Error) {
        tracing::debug!(error = %err, "deferring configuration error to dispatch");
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    fn run_before_request_hooks(&mut self) -> Result<(), HookError> {
        let mut hooks = std::mem::take(&mut self.before_request);
        let result = hooks.iter_mut().try_for_each(|hook| hook(&mut *self));
        // Keep anything a hook registered while running.
        hooks.append(&mut self.before_request);
        self.before_request = hooks;
        result
    }

    fn run_after_response_hooks(&mut self, response: &Response) {
        for hook in self.after_response.iter_mut() {
            if let Err(e) = hook(response) {
                tracing::warn!(error = %e, "after-response hook failed");
            }
        }
    }

    /// Runs the error hooks for `err` and hands it back.
    fn fail(&mut self, err: Error) -> Error {
        tracing::warn!(error = %err, "request failed");
        let mut hooks = std::mem::take(&mut self.on_error);
        for hook in hooks.iter_mut() {
            hook(&*self, &err);
        }
        self.on_error = hooks;
        err
    }
}

fn basic_auth_value(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}
