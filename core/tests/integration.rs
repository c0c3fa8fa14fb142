//! Dispatch tests against the live echo server.
//!
//! # Design
//! Starts the mock server on a random port on its own thread, then sends real
//! requests through `RequestBuilder`. The echo endpoint reflects method, path,
//! query, headers and body back as JSON, so each test can check exactly what
//! went over the wire.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use httpreq_core::{
    ClientOption, Context, Error, HttpMethod, MultipartParam, RequestBuilder, TransportConfig,
};
use mock_server::Echo;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// An address nothing is listening on.
fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn echo(builder: RequestBuilder, method: HttpMethod, url: &str) -> Echo {
    let response = builder.send(method, url).unwrap();
    assert_eq!(response.status(), 200);
    response.into_json().unwrap()
}

// ---------------------------------------------------------------------------
// Verbs and payloads
// ---------------------------------------------------------------------------

#[test]
fn every_verb_reaches_the_server() {
    let addr = start_server();
    let url = format!("http://{addr}/echo/verbs");

    for method in [
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
    ] {
        let seen = echo(RequestBuilder::new().text("payload"), method, &url);
        assert_eq!(seen.method, method.as_str());
        assert_eq!(seen.path, "/echo/verbs");
        assert_eq!(seen.body, "payload", "{method}");
        assert_eq!(seen.header("content-type"), Some("text/plain"), "{method}");
    }
}

#[test]
fn get_sends_no_body_even_when_one_is_configured() {
    let addr = start_server();
    let seen = echo(
        RequestBuilder::new().json(&serde_json::json!({"dropped": true})),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.method, "GET");
    assert!(seen.body.is_empty());
    assert_eq!(seen.header("content-type"), Some("application/json"));
}

#[test]
fn content_type_is_sent_even_without_payload() {
    let addr = start_server();
    let seen = echo(RequestBuilder::new(), HttpMethod::Get, &format!("http://{addr}/echo"));
    assert_eq!(seen.header("content-type"), Some(""));
}

#[test]
fn head_returns_headers_only() {
    let addr = start_server();
    let response = RequestBuilder::new()
        .head(&format!("http://{addr}/echo"))
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.into_bytes().unwrap().is_empty());
}

#[test]
fn json_body_is_canonical() {
    let addr = start_server();
    let seen = echo(
        RequestBuilder::new().json(&serde_json::json!({"x": 1})),
        HttpMethod::Post,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.header("content-type"), Some("application/json"));
    assert_eq!(seen.body, r#"{"x":1}"#);
}

#[test]
fn form_and_bytes_payloads() {
    let addr = start_server();
    let url = format!("http://{addr}/echo");

    let seen = echo(
        RequestBuilder::new().form_data([("city", "São Paulo"), ("code", "SP")]),
        HttpMethod::Post,
        &url,
    );
    assert_eq!(seen.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(seen.body, "city=S%C3%A3o+Paulo&code=SP");

    let seen = echo(RequestBuilder::new().body(b"raw".to_vec()), HttpMethod::Put, &url);
    assert_eq!(seen.header("content-type"), Some("application/octet-stream"));
    assert_eq!(seen.body, "raw");
}

#[test]
fn query_is_appended_in_key_order() {
    let addr = start_server();
    let seen = echo(
        RequestBuilder::new().query([("b", "2"), ("a", "1")]),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.query.as_deref(), Some("a=1&b=2"));
}

#[test]
fn method_names_are_case_insensitive() {
    let addr = start_server();
    let response = RequestBuilder::new()
        .request("patch", &format!("http://{addr}/echo"))
        .unwrap();
    let seen: Echo = response.into_json().unwrap();
    assert_eq!(seen.method, "PATCH");
}

// ---------------------------------------------------------------------------
// Headers and auth
// ---------------------------------------------------------------------------

#[test]
fn configured_headers_win_over_computed_ones() {
    let addr = start_server();
    let seen = echo(
        RequestBuilder::new()
            .json(&serde_json::json!({}))
            .basic_auth("user", "pass")
            .headers([
                ("Content-Type", "application/merge-patch+json"),
                ("X-Request-Id", "req-1"),
            ]),
        HttpMethod::Patch,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.header("content-type"), Some("application/merge-patch+json"));
    assert_eq!(seen.header("x-request-id"), Some("req-1"));
    assert_eq!(seen.header("authorization"), Some("Basic dXNlcjpwYXNz"));
}

#[test]
fn host_header_overrides_request_host() {
    let addr = start_server();
    let seen = echo(
        RequestBuilder::new().headers([("Host", "api.internal")]),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.header("host"), Some("api.internal"));
}

#[test]
fn basic_auth_skipped_without_user() {
    let addr = start_server();
    let seen = echo(
        RequestBuilder::new().basic_auth("", "pass"),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );
    assert!(seen.header("authorization").is_none());
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

#[test]
fn upload_sends_a_single_file_part() {
    let addr = start_server();
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"id,name\n1,ada\n").unwrap();
    let file_name = file.path().file_name().unwrap().to_string_lossy().into_owned();

    let seen = echo(
        RequestBuilder::new().upload("report", file.path()),
        HttpMethod::Post,
        &format!("http://{addr}/echo"),
    );

    let content_type = seen.header("content-type").unwrap();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .unwrap();
    assert_eq!(seen.body.matches("Content-Disposition").count(), 1);
    assert!(seen.body.starts_with(&format!("--{boundary}\r\n")));
    assert!(seen.body.ends_with(&format!("\r\n--{boundary}--\r\n")));
    assert!(seen.body.contains(&format!(
        "name=\"report\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\nid,name\n1,ada\n\r\n"
    )));
}

#[test]
fn reader_uploads_and_fields_share_one_body() {
    let addr = start_server();
    let mut notes: &[u8] = b"remember the milk";
    let seen = echo(
        RequestBuilder::new()
            .multipart_form_data([("owner", "ada")])
            .upload_from_reader(MultipartParam::new("notes", "notes.txt", &mut notes)),
        HttpMethod::Put,
        &format!("http://{addr}/echo"),
    );
    assert!(seen.body.contains("name=\"owner\"\r\n\r\nada\r\n"));
    assert!(seen.body.contains("filename=\"notes.txt\""));
    assert!(seen.body.contains("remember the milk"));
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[test]
fn before_hooks_run_in_order_and_can_edit_the_request() {
    let addr = start_server();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (first, second) = (Arc::clone(&order), Arc::clone(&order));

    let seen = echo(
        RequestBuilder::new()
            .on_before_request(move |req| {
                first.lock().unwrap().push("first");
                req.headers_mut()
                    .insert("X-Signed".to_string(), "yes".to_string());
                Ok(())
            })
            .on_before_request(move |req| {
                let signed = req.header("x-signed").unwrap_or("no").to_string();
                second.lock().unwrap().push(if signed == "yes" { "second saw signature" } else { "second" });
                Ok(())
            }),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );

    assert_eq!(*order.lock().unwrap(), vec!["first", "second saw signature"]);
    assert_eq!(seen.header("x-signed"), Some("yes"));
}

#[test]
fn after_hook_receives_the_response() {
    let addr = start_server();
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);

    let response = RequestBuilder::new()
        .on_after_response(move |r| {
            sink.lock().unwrap().push(r.status());
            Ok(())
        })
        .on_after_response(|_| Err("metrics backend unavailable".into()))
        .get(&format!("http://{addr}/echo"))
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(*statuses.lock().unwrap(), vec![200]);
}

#[test]
fn error_statuses_are_responses() {
    let addr = start_server();
    let errors = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&errors);

    let response = RequestBuilder::new()
        .on_error(move |_, _| *counter.lock().unwrap() += 1)
        .get(&format!("http://{addr}/status/404"))
        .unwrap();

    assert_eq!(response.status(), 404);
    assert!(!response.is_success());
    assert_eq!(*errors.lock().unwrap(), 0);
}

#[test]
fn connection_failure_runs_each_error_hook_once_in_order() {
    let addr = closed_port();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (Arc::clone(&calls), Arc::clone(&calls));

    let err = RequestBuilder::new()
        .on_error(move |_, e| a.lock().unwrap().push(format!("a: {e}")))
        .on_error(move |_, e| b.lock().unwrap().push(format!("b: {e}")))
        .get(&format!("http://{addr}/echo"))
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(err.transport_kind(), Some(ureq::ErrorKind::ConnectionFailed));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("a: transport error"));
    assert!(calls[1].starts_with("b: transport error"));
}

// ---------------------------------------------------------------------------
// Context, timeouts, client options
// ---------------------------------------------------------------------------

#[test]
fn deadline_aborts_a_slow_exchange() {
    let addr = start_server();
    let started = Instant::now();
    let err = RequestBuilder::new()
        .set_context(Context::background().with_timeout(Duration::from_millis(200)))
        .get(&format!("http://{addr}/slow/3000"))
        .unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn cancel_token_aborts_a_slow_exchange() {
    let addr = start_server();
    let (ctx, token) = Context::background().with_cancel();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let started = Instant::now();
    let err = RequestBuilder::new()
        .set_context(ctx)
        .get(&format!("http://{addr}/slow/3000"))
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn client_timeout_option_bounds_the_exchange() {
    let addr = start_server();
    let err = RequestBuilder::with_options([ClientOption::Timeout(Duration::from_millis(200))])
        .get(&format!("http://{addr}/slow/3000"))
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "{err}");
    assert!(!err.is_cancellation());
}

#[test]
fn transport_config_user_agent_is_sent() {
    let addr = start_server();
    let transport = TransportConfig {
        user_agent: Some("httpreq-tests/1.0".to_string()),
        ..TransportConfig::default()
    };
    let seen = echo(
        RequestBuilder::with_options([ClientOption::Transport(transport)]),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.header("user-agent"), Some("httpreq-tests/1.0"));
}

#[test]
fn shared_client_keeps_cookies_between_builders() {
    let addr = start_server();
    let agent = ureq::Agent::new();

    let response = RequestBuilder::with_options([ClientOption::Client(agent.clone())])
        .get(&format!("http://{addr}/cookies/set"))
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen = echo(
        RequestBuilder::with_options([ClientOption::Client(agent)]),
        HttpMethod::Get,
        &format!("http://{addr}/echo"),
    );
    assert_eq!(seen.header("cookie"), Some("session=abc123"));
}
