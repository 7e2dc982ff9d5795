//! Integration tests using wiremock to simulate HTTP servers.
//!
//! Failure modes wiremock cannot produce (dropped connections, stalls) are
//! served from a bare `TcpListener`.

use bytes::Bytes;
use fetchwell::{CallOption, Client, Error, RetryPolicy, DEFAULT_USER_AGENT};
use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Login {
    user: String,
}

fn fast_retries(max_attempts: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_secs(1),
        jitter: false,
    }
}

fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .retry_policy(fast_retries(3))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let client = test_client();
    let response = client
        .get(&format!("{}/test", mock_server.uri()), [])
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "hello");
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = test_client();
    client.get(&mock_server.uri(), []).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert_eq!(headers["user-agent"], DEFAULT_USER_AGENT);
    assert_eq!(headers["accept-language"], "en");
}

#[tokio::test]
async fn test_call_headers_override_base_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("x-shared", "call"))
        .and(header("x-base", "base"))
        .and(header("user-agent", "agent/2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    client
        .set_headers([("X-Shared", "base"), ("X-Base", "base")])
        .unwrap();
    client.set_user_agent("agent/2");

    let response = client
        .get(
            &mock_server.uri(),
            [CallOption::headers([("X-Shared", "call")])],
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_query_options_are_appended() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let response = client
        .get(
            &format!("{}/search?page=1", mock_server.uri()),
            [CallOption::query([("q", "rust"), ("page", "2")])],
        )
        .await
        .unwrap();

    assert_eq!(response.text(), "found");
}

#[tokio::test]
async fn test_form_post() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user=admin&password=admin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let response = client
        .post(
            &format!("{}/login", mock_server.uri()),
            [("user", "admin"), ("password", "admin")],
            [],
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_json_post() {
    let mock_server = MockServer::start().await;

    let login = Login {
        user: "admin".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/api"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(body_json(&login))
        .respond_with(ResponseTemplate::new(201).set_body_json(&login))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let response = client
        .json(&format!("{}/api", mock_server.uri()), &login, [])
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.json::<Login>().unwrap(), login);
}

#[tokio::test]
async fn test_json_raw_is_sent_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string(r#"{"b":1,"a":2}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    client
        .json_raw(&mock_server.uri(), r#"{"b":1,"a":2}"#, [])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let mock_server = MockServer::start().await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"hello").unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_raw(compressed, "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let client = test_client();
    let response = client.get(&mock_server.uri(), []).await.unwrap();

    assert_eq!(response.body, "hello");
}

#[tokio::test]
async fn test_corrupt_gzip_is_a_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_raw(b"plainly not gzip".to_vec(), "text/plain"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let result = client.get(&mock_server.uri(), []).await;

    match result {
        Err(Error::Decode { status, .. }) => assert_eq!(status, 200),
        other => panic!("Expected Decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let response = client.get(&mock_server.uri(), []).await.unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.text(), "busy");
    assert_eq!(response.attempts, 1);
}

#[tokio::test]
async fn test_cookies_persist_across_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("admin"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    client
        .post(&format!("{}/login", mock_server.uri()), [("user", "admin")], [])
        .await
        .unwrap();
    let me = client
        .get(&format!("{}/me", mock_server.uri()), [])
        .await
        .unwrap();
    assert_eq!(me.text(), "admin");

    let exported = client.cookies().export_all();
    assert_eq!(exported.len(), 1);
    let (url, cookies) = exported.into_iter().next().unwrap();
    assert_eq!(url.path(), "/login");
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name(), "session");
    assert_eq!(cookies[0].value(), "abc");
}

#[tokio::test]
async fn test_no_cookie_call_leaves_store_untouched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "tracker=1; Path=/"))
        .mount(&mock_server)
        .await;

    let client = test_client();
    client
        .get(
            &mock_server.uri(),
            [CallOption::headers([("__nocookie__", "true")])],
        )
        .await
        .unwrap();
    client
        .get(&mock_server.uri(), [CallOption::NoCookie])
        .await
        .unwrap();

    assert!(client.cookies().is_empty());

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| !r.headers.contains_key("__nocookie__") && !r.headers.contains_key("cookie")));
}

#[tokio::test]
async fn test_disabled_cookies_are_not_stored() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(&mock_server)
        .await;

    let client = test_client();
    client.set_cookies_disabled(true);
    client.get(&mock_server.uri(), []).await.unwrap();

    assert!(client.cookies().is_empty());
}

#[tokio::test]
async fn test_basic_auth_option() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    client
        .get(&mock_server.uri(), [CallOption::basic_auth("user", "pass")])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_last_headers_are_recorded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-trace", "abc123"))
        .mount(&mock_server)
        .await;

    let client = test_client();
    assert!(client.last_headers().is_empty());

    let response = client.get(&mock_server.uri(), []).await.unwrap();

    assert_eq!(client.last_headers()["x-trace"], "abc123");
    assert_eq!(response.header("x-trace"), Some("abc123"));
}

#[tokio::test]
async fn test_request_hook_signs_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-signature", "len=16"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    client
        .json(
            &mock_server.uri(),
            &Login {
                user: "admin".to_string(),
            },
            [CallOption::request_hook(|req| {
                let signature = format!("len={}", req.body.len());
                req.headers.insert("x-signature", signature.parse().unwrap());
            })],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_response_hooks_chain_before_global_hook() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("base"))
        .mount(&mock_server)
        .await;

    let client = test_client();
    client.set_response_hook(Some(fetchwell::hook::response_hook(|_, outcome| {
        let body = outcome?;
        Ok(Bytes::from([body.as_ref(), b"-global"].concat()))
    })));

    let seen_status = Arc::new(AtomicUsize::new(0));
    let seen = seen_status.clone();

    let response = client
        .get(
            &mock_server.uri(),
            [
                CallOption::response_hook(move |status, outcome| {
                    seen.store(status as usize, Ordering::SeqCst);
                    let body = outcome?;
                    Ok(Bytes::from([body.as_ref(), b"-first"].concat()))
                }),
                CallOption::response_hook(|_, outcome| {
                    let body = outcome?;
                    Ok(Bytes::from([body.as_ref(), b"-second"].concat()))
                }),
            ],
        )
        .await
        .unwrap();

    assert_eq!(response.text(), "base-first-second-global");
    assert_eq!(seen_status.load(Ordering::SeqCst), 200);
}

#[tokio::test]
async fn test_response_hook_can_reject_a_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&mock_server)
        .await;

    let client = test_client();
    let result = client
        .get(
            &mock_server.uri(),
            [CallOption::response_hook(|status, outcome| {
                let body = outcome?;
                if status >= 400 {
                    return Err(Error::hook(format!("status {status}")));
                }
                Ok(body)
            })],
        )
        .await;

    match result {
        Err(Error::Hook(message)) => assert_eq!(message, "status 404"),
        other => panic!("Expected Hook error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_url_goes_through_response_hook() {
    let client = test_client();

    let result = client.get("not a url", []).await;
    assert!(matches!(result, Err(Error::InvalidUrl(_))));

    let recovered = client
        .get(
            "not a url",
            [CallOption::response_hook(|status, outcome| {
                assert_eq!(status, 0);
                assert!(matches!(outcome, Err(Error::InvalidUrl(_))));
                Ok(Bytes::from_static(b"fallback"))
            })],
        )
        .await
        .unwrap();

    assert_eq!(recovered.status, 0);
    assert_eq!(recovered.text(), "fallback");
    assert_eq!(recovered.attempts, 0);
}

#[tokio::test]
async fn test_clones_share_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("user-agent", "shared/1"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "k=v; Path=/"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client();
    let other = client.clone();
    other.set_user_agent("shared/1");

    client.get(&mock_server.uri(), []).await.unwrap();
    assert_eq!(other.cookies().len(), 1);
}

/// A request read off a raw connection.
struct RawRequest {
    body: Vec<u8>,
}

/// Reads one HTTP/1.1 request: headers, then `Content-Length` bytes of body.
async fn read_request(stream: &mut TcpStream) -> RawRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return RawRequest { body: Vec::new() };
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    RawRequest {
        body: buf[header_end..].to_vec(),
    }
}

async fn respond_ok(stream: &mut TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

/// Serves connections forever: the first `drops` are closed after reading the
/// request, the rest are answered with `ok`. Returns the address, the bodies
/// received and the accept times.
async fn flaky_server(
    drops: usize,
) -> (String, Arc<Mutex<Vec<Vec<u8>>>>, Arc<Mutex<Vec<Instant>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(Mutex::new(Vec::new()));

    let (bodies_task, accepted_task) = (bodies.clone(), accepted.clone());
    tokio::spawn(async move {
        let mut served = 0;
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            accepted_task.lock().unwrap().push(Instant::now());
            let request = read_request(&mut stream).await;
            bodies_task.lock().unwrap().push(request.body);

            if served < drops {
                drop(stream);
            } else {
                respond_ok(&mut stream, "ok").await;
            }
            served += 1;
        }
    });

    (addr, bodies, accepted)
}

#[tokio::test]
async fn test_dropped_connections_are_retried() {
    let (addr, _, accepted) = flaky_server(2).await;

    let client = test_client();
    let response = client.get(&addr, []).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "ok");
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(accepted.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_max_retries_exceeded_with_growing_backoff() {
    let (addr, _, accepted) = flaky_server(usize::MAX).await;

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = statuses.clone();

    let client = test_client();
    let result = client
        .get(
            &addr,
            [CallOption::response_hook(move |status, outcome| {
                seen.lock().unwrap().push(status);
                outcome
            })],
        )
        .await;

    match result {
        Err(Error::MaxRetriesExceeded {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, Error::Network(_)));
        }
        other => panic!("Expected MaxRetriesExceeded, got {:?}", other),
    }

    assert_eq!(*statuses.lock().unwrap(), vec![0]);

    let times = accepted.lock().unwrap().clone();
    assert_eq!(times.len(), 3);
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    assert!(first_gap >= Duration::from_millis(40));
    assert!(second_gap >= Duration::from_millis(80));
    assert!(second_gap > first_gap);
}

#[tokio::test]
async fn test_body_is_replayed_and_hook_runs_once() {
    let (addr, bodies, _) = flaky_server(2).await;

    let hook_calls = Arc::new(AtomicUsize::new(0));
    let calls = hook_calls.clone();

    let client = test_client();
    let response = client
        .json(
            &addr,
            &Login {
                user: "admin".to_string(),
            },
            [CallOption::request_hook(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })],
        )
        .await
        .unwrap();

    assert_eq!(response.attempts, 3);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

    let bodies = bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 3);
    for body in bodies {
        assert_eq!(body, br#"{"user":"admin"}"#);
    }
}

#[tokio::test]
async fn test_single_attempt_policy_returns_raw_error() {
    let (addr, _, accepted) = flaky_server(usize::MAX).await;

    let client = Client::builder()
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap();
    let result = client.get(&addr, []).await;

    assert!(matches!(result, Err(Error::Network(_))));
    assert_eq!(accepted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stalled_attempt_times_out_and_is_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (mut stalled, _) = listener.accept().await.unwrap();
        read_request(&mut stalled).await;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stalled);
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        respond_ok(&mut stream, "late").await;
    });

    let client = Client::builder()
        .timeout(Duration::from_millis(200))
        .retry_policy(fast_retries(3))
        .build()
        .unwrap();
    let response = client.get(&addr, []).await.unwrap();

    assert_eq!(response.text(), "late");
    assert_eq!(response.attempts, 2);
}

#[tokio::test]
async fn test_serialization_failure_is_reported() {
    use serde::ser::Error as _;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    let client = test_client();
    let result = client
        .json("http://127.0.0.1:9/never", &Unserializable, [])
        .await;

    assert!(matches!(result, Err(Error::SerializationFailed(_))));
}

/// An address nothing listens on.
async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_http_proxy_routes_requests() {
    let proxy = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy)
        .await;

    let client = test_client();
    client.set_proxy(&proxy.uri());

    let response = client
        .get("http://fetchwell.invalid/proxied", [])
        .await
        .unwrap();

    assert_eq!(response.text(), "via proxy");
    assert_eq!(proxy.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_refused_socks5_proxy_is_retried() {
    let proxy = closed_port().await;

    let client = test_client();
    client.set_proxy(&format!("socks5://{proxy}"));

    let result = client.get("http://fetchwell.invalid/", []).await;

    match result {
        Err(Error::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("Expected MaxRetriesExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refused_connection_is_retried_on_every_transport() {
    let target = closed_port().await;

    for proxy in ["".to_string(), format!("http://{}", closed_port().await)] {
        let client = test_client();
        client.set_proxy(&proxy);

        match client.get(&format!("http://{target}/"), []).await {
            Err(Error::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected MaxRetriesExceeded via {proxy:?}, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_concurrent_calls_share_client_state() {
    const CALLS: usize = 8;
    let mock_server = MockServer::start().await;

    for i in 0..CALLS {
        Mock::given(method("GET"))
            .and(path(format!("/item/{i}")))
            .and(header("x-shared", "yes"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", format!("c{i}=v{i}; Path=/").as_str())
                    .insert_header("x-index", i.to_string().as_str())
                    .set_body_string(i.to_string()),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = test_client();
    client.set_headers([("X-Shared", "yes")]).unwrap();

    let handles: Vec<_> = (0..CALLS)
        .map(|i| {
            let client = client.clone();
            let url = format!("{}/item/{i}", mock_server.uri());
            tokio::spawn(async move { client.get(&url, []).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), i.to_string());
    }

    let exported = client.cookies().export_all();
    assert_eq!(exported.len(), CALLS);
    for (url, cookies) in &exported {
        let index = url.path().trim_start_matches("/item/");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), format!("c{index}"));
        assert_eq!(cookies[0].value(), format!("v{index}"));
    }

    let last = client.last_headers();
    let index: usize = last["x-index"].to_str().unwrap().parse().unwrap();
    assert!(index < CALLS);
}
