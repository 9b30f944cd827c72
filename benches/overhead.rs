use criterion::{black_box, criterion_group, criterion_main, Criterion};
use axum::{Router, routing::post};
use axum::http::Request;
use floodgate::keys::{ClientAddress, SubmittedAccount};
use floodgate::ratelimit::{BucketRule, RateLimitLayer};
use floodgate::StoreHandle;
use tower::ServiceExt;

// Raw Axum handler
fn raw_axum() -> Router {
    Router::new().route("/api/login", post(|| async { "ok" }))
}

// Same handler behind an address-keyed limit large enough to never deny
fn limited_by_address() -> Router {
    let rule = BucketRule::new(u32::MAX, 1_000_000.0, 60).unwrap();
    Router::new()
        .route("/api/login", post(|| async { "ok" }))
        .route_layer(RateLimitLayer::new(rule, ClientAddress::new(), StoreHandle::in_memory()))
}

// Same handler behind an account-keyed limit, which buffers the form body
fn limited_by_account() -> Router {
    let rule = BucketRule::new(u32::MAX, 1_000_000.0, 60).unwrap();
    Router::new()
        .route("/api/login", post(|| async { "ok" }))
        .route_layer(RateLimitLayer::new(rule, SubmittedAccount::new(), StoreHandle::in_memory()))
}

async fn make_request(router: &Router) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header("x-forwarded-for", "203.0.113.7")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(axum::body::Body::from("email=user%40example.com&password=hunter2"))
        .unwrap();

    let _response = router.clone().oneshot(req).await.unwrap();
}

fn benchmark_rate_limit_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit_overhead");

    let raw_router = raw_axum();
    let address_router = limited_by_address();
    let account_router = limited_by_account();

    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("raw_axum", |b| {
        b.iter(|| {
            rt.block_on(make_request(black_box(&raw_router)));
        });
    });

    group.bench_function("by_address", |b| {
        b.iter(|| {
            rt.block_on(make_request(black_box(&address_router)));
        });
    });

    group.bench_function("by_account", |b| {
        b.iter(|| {
            rt.block_on(make_request(black_box(&account_router)));
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_rate_limit_overhead);
criterion_main!(benches);
