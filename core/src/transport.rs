//! Runs a `PreparedRequest` through a `ureq::Agent`.
//!
//! # Design
//! `ureq` blocks the calling thread and has no cancel hook, so a context with
//! a cancel token moves the exchange onto a helper thread and the caller waits
//! on a channel, polling the token in between. When the token fires the caller
//! returns `Error::Cancelled` at once. The helper cannot be interrupted, so a
//! cancellable exchange always carries a finite `ureq` timeout (the earlier of
//! the deadline and `TransportConfig::cancellable_timeout_ms`); once it
//! expires the helper drops the connection and exits. Deadlines alone need no
//! thread: the remaining time becomes the request's `ureq` timeout.
//!
//! HTTP error statuses come back from `ureq` as `Error::Status`. They are
//! turned back into plain responses here.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::context::{CancelToken, Context};
use crate::error::Error;
use crate::http::PreparedRequest;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

type Exchange = Result<ureq::Response, ureq::Error>;

pub(crate) fn execute(
    agent: &ureq::Agent,
    request: PreparedRequest,
    ctx: &Context,
    cancellable_timeout: Duration,
) -> Result<ureq::Response, Error> {
    ctx.check()?;

    let mut call = agent.request_url(request.method.as_str(), &request.url);
    for (name, value) in &request.headers {
        call = call.set(name, value);
    }
    let limit = match (ctx.remaining(), ctx.cancel_token()) {
        (Some(remaining), Some(_)) => Some(remaining.min(cancellable_timeout)),
        (None, Some(_)) => Some(cancellable_timeout),
        (remaining, None) => remaining,
    };
    if let Some(limit) = limit {
        call = call.timeout(limit);
    }

    let body = request.body;
    let send = move || match body {
        Some(bytes) => call.send_bytes(&bytes),
        None => call.call(),
    };

    let exchange = match ctx.cancel_token() {
        Some(token) => run_cancellable(send, token)?,
        None => send(),
    };

    match exchange {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(_, response)) => Ok(response),
        Err(ureq::Error::Transport(transport)) => {
            ctx.check()?;
            Err(Error::Transport(Box::new(transport)))
        }
    }
}

fn run_cancellable<F>(send: F, token: &CancelToken) -> Result<Exchange, Error>
where
    F: FnOnce() -> Exchange + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        // The receiver is gone if the caller already gave up.
        let _ = tx.send(send());
    });

    loop {
        match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(exchange) => return Ok(exchange),
            Err(RecvTimeoutError::Timeout) => {
                if token.is_cancelled() {
                    tracing::debug!("request cancelled while in flight");
                    return Err(Error::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // The helper always sends before returning, so a dropped
                // sender means it panicked.
                if let Err(panic) = handle.join() {
                    std::panic::resume_unwind(panic);
                }
                unreachable!("exchange helper exited without a result");
            }
        }
    }
}
