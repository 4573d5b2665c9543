//! Failure injection tests for the fetch pipeline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdap_client::error::{ErrorKind, NetworkErrorKind, RdapError};
use rdap_client::http::ResponseBody;
use rdap_client::resilience::CircuitState;
use rdap_client::security::RateLimiter;
use rdap_client::{AllowAllGuard, SecureFetcher};
use serde_json::json;

mod common;
use common::MockReply;

fn fetcher(config: &rdap_client::ClientConfig) -> SecureFetcher {
    SecureFetcher::new(config, Arc::new(AllowAllGuard)).unwrap()
}

fn limited_fetcher(config: &rdap_client::ClientConfig) -> SecureFetcher {
    fetcher(config).with_rate_limiter(Arc::new(RateLimiter::new(config.rate_limit.clone())))
}

#[tokio::test]
async fn test_retry_on_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        if cc.fetch_add(1, Ordering::SeqCst) < 2 {
            MockReply::text(503, "Service Unavailable")
        } else {
            MockReply::json(200, json!({"objectClassName": "domain", "ldhName": "example.com"}))
        }
    })
    .await;

    let config = common::test_config("http://unused/");
    let response = fetcher(&config)
        .fetch(&format!("http://{addr}/domain/example.com"))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(response.status, 200);
    assert_eq!(response.data["ldhName"], "example.com");
}

#[tokio::test]
async fn test_accept_header_sent() {
    let addr = common::start_mock(|req| {
        MockReply::json(200, json!({ "accept": req.accept.clone().unwrap_or_default() }))
    })
    .await;

    let config = common::test_config("http://unused/");
    let response = fetcher(&config).fetch(&format!("http://{addr}/help")).await.unwrap();
    assert_eq!(
        response.data["accept"],
        "application/rdap+json, application/json"
    );
}

#[tokio::test]
async fn test_retries_exhausted_surfaces_last_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        cc.fetch_add(1, Ordering::SeqCst);
        MockReply::text(502, "Bad Gateway").with_header("Retry-After", "30")
    })
    .await;

    let config = common::test_config("http://unused/");
    let err = fetcher(&config)
        .fetch(&format!("http://{addr}/ip/192.0.2.1"))
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match err {
        RdapError::Upstream {
            status,
            body,
            retry_after,
            ..
        } => {
            assert_eq!(status, 502);
            assert_eq!(body, Some(ResponseBody::Text("Bad Gateway".into())));
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        cc.fetch_add(1, Ordering::SeqCst);
        MockReply::json(
            404,
            json!({"errorCode": 404, "title": "Not Found", "description": ["no such object"]}),
        )
    })
    .await;

    let config = common::test_config("http://unused/");
    let err = fetcher(&config)
        .fetch(&format!("http://{addr}/domain/nope.example"))
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match err {
        RdapError::Upstream { status: 404, body: Some(body), .. } => {
            assert_eq!(body.title(), Some("Not Found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_non_object_success_is_network_error() {
    let addr = common::start_mock(|req| match req.path.as_str() {
        "/array" => MockReply::json(200, json!([1, 2, 3])),
        _ => MockReply::text(200, "<html>hello</html>"),
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.retries.enabled = false;
    let fetcher = fetcher(&config);

    for path in ["/array", "/html"] {
        let err = fetcher.fetch(&format!("http://{addr}{path}")).await.unwrap_err();
        assert!(
            matches!(err, RdapError::Network { kind: NetworkErrorKind::InvalidResponse, .. }),
            "{path}: {err}"
        );
    }
}

#[tokio::test]
async fn test_timeout() {
    let addr = common::start_mock(|_| {
        MockReply::json(200, json!({})).with_delay(Duration::from_secs(2))
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.timeouts.request_ms = 100;
    config.retries.max_attempts = 2;

    let started = std::time::Instant::now();
    let err = fetcher(&config)
        .fetch(&format!("http://{addr}/slow"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = common::test_config("http://unused/");
    config.retries.max_attempts = 1;
    let err = fetcher(&config)
        .fetch(&format!("http://{addr}/"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_circuit_opens_and_fails_fast() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        cc.fetch_add(1, Ordering::SeqCst);
        MockReply::text(503, "down")
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.retries.max_attempts = 1;
    config.circuit_breaker.threshold = 3;
    config.circuit_breaker.timeout_ms = 60_000;
    let fetcher = fetcher(&config);
    let url = format!("http://{addr}/domain/example.com");

    for _ in 0..3 {
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(!err.is_circuit_open());
    }
    assert_eq!(fetcher.circuit_stats().unwrap().state, CircuitState::Open);

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_half_open_trial_closes_circuit() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        if cc.fetch_add(1, Ordering::SeqCst) < 2 {
            MockReply::text(500, "boom")
        } else {
            MockReply::json(200, json!({"objectClassName": "autnum"}))
        }
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.retries.max_attempts = 1;
    config.circuit_breaker.threshold = 2;
    config.circuit_breaker.timeout_ms = 100;
    let fetcher = fetcher(&config);
    let url = format!("http://{addr}/autnum/701");

    assert!(fetcher.fetch(&url).await.is_err());
    assert!(fetcher.fetch(&url).await.is_err());
    assert!(fetcher.fetch(&url).await.unwrap_err().is_circuit_open());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fetcher.circuit_stats().unwrap().state, CircuitState::HalfOpen);

    fetcher.fetch(&url).await.unwrap();
    let stats = fetcher.circuit_stats().unwrap();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 0);
}

#[tokio::test]
async fn test_rate_limited_retry_is_surfaced() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        cc.fetch_add(1, Ordering::SeqCst);
        MockReply::text(503, "busy")
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.rate_limit.max_requests = 1;
    config.rate_limit.window_ms = 60_000;
    let fetcher = limited_fetcher(&config);

    let err = fetcher
        .fetch(&format!("http://{addr}/domain/example.com"))
        .await
        .unwrap_err();

    // The 503 earned a retry, but the limiter refused it before any I/O.
    assert!(matches!(err, RdapError::RateLimited { ref key, .. } if *key == addr.to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = fetcher.circuit_stats().unwrap();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 1);
}

#[tokio::test]
async fn test_rate_limited_trial_does_not_wedge_circuit() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        if cc.fetch_add(1, Ordering::SeqCst) == 0 {
            MockReply::text(500, "boom")
        } else {
            MockReply::json(200, json!({"objectClassName": "domain"}))
        }
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.retries.enabled = false;
    config.circuit_breaker.threshold = 1;
    config.circuit_breaker.timeout_ms = 100;
    config.rate_limit.max_requests = 1;
    config.rate_limit.window_ms = 300;
    let fetcher = limited_fetcher(&config);
    let url = format!("http://{addr}/domain/example.com");

    assert!(fetcher.fetch(&url).await.is_err());
    assert_eq!(fetcher.circuit_stats().unwrap().state, CircuitState::Open);

    // Half-open, but the host's only slot in this window is spent.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    let stats = fetcher.circuit_stats().unwrap();
    assert_eq!(stats.state, CircuitState::HalfOpen);
    assert_eq!(stats.half_open_attempts, 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    fetcher.fetch(&url).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.circuit_stats().unwrap().state, CircuitState::Closed);
}

#[tokio::test]
async fn test_cancelled_trial_releases_slot() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = common::start_mock(move |_| {
        match cc.fetch_add(1, Ordering::SeqCst) {
            0 => MockReply::text(500, "boom"),
            1 => MockReply::json(200, json!({})).with_delay(Duration::from_secs(5)),
            _ => MockReply::json(200, json!({"objectClassName": "ip network"})),
        }
    })
    .await;

    let mut config = common::test_config("http://unused/");
    config.retries.enabled = false;
    config.circuit_breaker.threshold = 1;
    config.circuit_breaker.timeout_ms = 100;
    let fetcher = fetcher(&config);
    let url = format!("http://{addr}/ip/192.0.2.0");

    assert!(fetcher.fetch(&url).await.is_err());
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Abandon the trial while it waits on the slow upstream.
    let abandoned = tokio::time::timeout(Duration::from_millis(100), fetcher.fetch(&url)).await;
    assert!(abandoned.is_err());
    assert_eq!(fetcher.circuit_stats().unwrap().half_open_attempts, 0);

    fetcher.fetch(&url).await.unwrap();
    assert_eq!(fetcher.circuit_stats().unwrap().state, CircuitState::Closed);
}
