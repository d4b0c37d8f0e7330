use super::*;
use crate::request_factory::RequestFactory;
use assert_matches::assert_matches;
use http::Method;
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use url::Url;

fn factory() -> RequestFactory {
    RequestFactory::builder("http://example.com").build().unwrap()
}

fn request(url: &str) -> HttpRequest {
    HttpRequest::new(Method::GET, Url::parse(url).unwrap())
}

fn counting_refresh(counter: Arc<AtomicUsize>, validity: Duration) -> RefreshToken {
    Arc::new(move |_factory| {
        let counter = counter.clone();
        Box::pin(async move {
            let invocation = counter.fetch_add(1, Ordering::SeqCst) + 1;
            // Suspend so concurrent adapt calls pile up on this refresh.
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(TokenAuthorization {
                token: invocation.to_string(),
                expires_at: Instant::now() + validity,
            })
        })
    })
}

#[tokio::test]
async fn test_static_token_overwrites_authorization() {
    let adapter = HeaderTokenAuthorizingAdapter::new("Bearer", "abc123");
    let request = request("http://example.com/items")
        .with_header(AUTHORIZATION, HeaderValue::from_static("Basic old"));

    let adapted = adapter.adapt(&factory(), request).await.unwrap();
    assert_eq!(adapted.headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
}

#[tokio::test]
async fn test_host_matching_delegates_only_for_listed_hosts() {
    let adapter = HostMatchingAdapter::new(
        Arc::new(HeaderTokenAuthorizingAdapter::new("Bearer", "abc")),
        ["api.example.com".to_string()],
    );
    let factory = factory();

    // Hostname comparison is case-insensitive and exact.
    let adapted = adapter
        .adapt(&factory, request("http://API.example.com/items"))
        .await
        .unwrap();
    assert_eq!(adapted.headers.get(AUTHORIZATION).unwrap(), "Bearer abc");

    let adapted = adapter
        .adapt(&factory, request("http://other.example.com/items"))
        .await
        .unwrap();
    assert!(adapted.headers.get(AUTHORIZATION).is_none());

    let adapted = adapter
        .adapt(&factory, request("http://sub.api.example.com/items"))
        .await
        .unwrap();
    assert!(adapted.headers.get(AUTHORIZATION).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_caches_token_until_expiry() {
    let counter = Arc::new(AtomicUsize::new(0));
    let adapter = RefreshingHeaderTokenAuthorizingAdapter::new(
        "Bearer",
        counting_refresh(counter.clone(), Duration::from_millis(200)),
    );
    let factory = factory();

    let adapted = adapter
        .adapt(&factory, request("http://example.com/a"))
        .await
        .unwrap();
    assert_eq!(adapted.headers.get(AUTHORIZATION).unwrap(), "Bearer 1");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let adapted = adapter
        .adapt(&factory, request("http://example.com/b"))
        .await
        .unwrap();
    assert_eq!(adapted.headers.get(AUTHORIZATION).unwrap(), "Bearer 1");
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let adapted = adapter
        .adapt(&factory, request("http://example.com/c"))
        .await
        .unwrap();
    assert_eq!(adapted.headers.get(AUTHORIZATION).unwrap(), "Bearer 2");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_first_adapts_refresh_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let adapter = Arc::new(RefreshingHeaderTokenAuthorizingAdapter::new(
        "Bearer",
        counting_refresh(counter.clone(), Duration::from_secs(60)),
    ));
    let factory = factory();

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let adapter = adapter.clone();
        let factory = factory.clone();
        tasks.push(tokio::spawn(async move {
            adapter
                .adapt(&factory, request("http://example.com/items"))
                .await
                .unwrap()
        }));
    }

    for task in tasks {
        let adapted = task.await.unwrap();
        assert_eq!(adapted.headers.get(AUTHORIZATION).unwrap(), "Bearer 1");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_shared_by_waiters() {
    let counter = Arc::new(AtomicUsize::new(0));
    let refresh: RefreshToken = {
        let counter = counter.clone();
        Arc::new(move |_factory| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(SundayError::TokenRefreshFailed("token endpoint down".into()))
            })
        })
    };
    let adapter = Arc::new(RefreshingHeaderTokenAuthorizingAdapter::new("Bearer", refresh));
    let factory = factory();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let adapter = adapter.clone();
        let factory = factory.clone();
        tasks.push(tokio::spawn(async move {
            adapter
                .adapt(&factory, request("http://example.com/items"))
                .await
        }));
    }

    for task in tasks {
        let result = task.await.unwrap();
        assert_matches!(
            result,
            Err(SundayError::TokenRefreshFailed(message))
                if message.contains("token endpoint down")
        );
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
