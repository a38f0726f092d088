#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::mock_server::{MockResponse, MockServer};
use serde_json::json;
use specdeck::proxy::{ProxyHandle, ProxyServer};

/// Proxy on an ephemeral port, stopped on drop.
struct TestProxy {
    handle: Option<ProxyHandle>,
    http: reqwest::blocking::Client,
}

impl TestProxy {
    fn start() -> Self {
        let handle = ProxyServer::new("/api/proxy", 2).start("127.0.0.1:0").unwrap();
        handle.wait_ready().unwrap();
        let http = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        TestProxy {
            handle: Some(handle),
            http,
        }
    }

    fn endpoint(&self) -> String {
        let addr = self.handle.as_ref().unwrap().addr();
        format!("http://{addr}/api/proxy")
    }

    fn proxied(&self, target: &str) -> String {
        format!("{}?url={}", self.endpoint(), urlencoding::encode(target))
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[test]
fn test_rejects_non_http_targets() {
    let proxy = TestProxy::start();
    let response = proxy.http.get(proxy.proxied("ftp://example.com/file")).send().unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.text().unwrap(), "Only http and https targets are supported.");
}

#[test]
fn test_missing_and_invalid_url() {
    let proxy = TestProxy::start();

    let missing = proxy.http.get(proxy.endpoint()).send().unwrap();
    assert_eq!(missing.status().as_u16(), 400);
    assert_eq!(missing.text().unwrap(), "Missing url query parameter.");

    let invalid = proxy.http.get(proxy.proxied("not a url")).send().unwrap();
    assert_eq!(invalid.status().as_u16(), 400);
    assert_eq!(invalid.text().unwrap(), "Invalid url query parameter.");
}

#[test]
fn test_other_paths_are_not_found() {
    let proxy = TestProxy::start();
    let addr = proxy.handle.as_ref().unwrap().addr();
    let response = proxy
        .http
        .get(format!("http://{addr}/elsewhere?url=http%3A%2F%2Fexample.com"))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[test]
fn test_post_body_and_headers_forwarded() {
    let upstream = MockServer::start(|req| {
        MockResponse::json(201, json!({"received": req.body}))
            .with_header("X-Upstream", "yes")
    });
    let proxy = TestProxy::start();

    let body = r#"{"name":"Rex","tags":["a","b"]}"#;
    let response = proxy
        .http
        .post(proxy.proxied(&upstream.url("/pets?dry=1")))
        .header("Content-Type", "application/json")
        .header("Authorization", "Bearer token")
        .body(body)
        .send()
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(
        response.headers().get("x-upstream").and_then(|v| v.to_str().ok()),
        Some("yes")
    );
    let echoed: serde_json::Value = response.json().unwrap();
    assert_eq!(echoed["received"], body);

    let recorded = &upstream.requests()[0];
    assert_eq!(recorded.method, "POST");
    assert_eq!(recorded.url, "/pets?dry=1");
    assert_eq!(recorded.body, body);
    assert_eq!(recorded.header("authorization"), Some("Bearer token"));
    assert_eq!(recorded.header("content-type"), Some("application/json"));
    assert_eq!(
        recorded.header("host"),
        Some(upstream.addr().to_string().as_str())
    );
}

#[test]
fn test_get_follows_redirects_and_sends_no_body() {
    let upstream = MockServer::start(|req| match req.url.as_str() {
        "/start" => MockResponse::text(302, "").with_header("Location", "/final"),
        _ => MockResponse::text(200, "landed"),
    });
    let proxy = TestProxy::start();

    let response = proxy.http.get(proxy.proxied(&upstream.url("/start"))).send().unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().unwrap(), "landed");

    let urls: Vec<String> = upstream.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["/start".to_string(), "/final".to_string()]);
    assert!(upstream.requests().iter().all(|r| r.body.is_empty()));
}

#[test]
fn test_upstream_errors_pass_through_unchanged() {
    let upstream = MockServer::start(|_| MockResponse::json(404, json!({"message": "nope"})));
    let proxy = TestProxy::start();

    let response = proxy.http.delete(proxy.proxied(&upstream.url("/pets/1"))).send().unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(
        response.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
    assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"message": "nope"}));
}

#[test]
fn test_unreachable_upstream_is_bad_gateway() {
    let upstream = MockServer::start(|_| MockResponse::text(200, "ok"));
    let target = upstream.url("/gone");
    drop(upstream);

    let proxy = TestProxy::start();
    let response = proxy.http.get(proxy.proxied(&target)).send().unwrap();
    assert_eq!(response.status().as_u16(), 502);
}
