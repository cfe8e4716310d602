//! End-to-end haberdasher calls over a real socket

use std::sync::Arc;
use tailor::haberdasher::{self, HaberdasherClient, HaberdasherService, Size};
use tailor::server::{logging_hooks, Router};
use tailor::{Error, ErrorCode, RetryingInvoker, RpcClient, TailorServer};

async fn start(service: HaberdasherService) -> RpcClient {
    let mut router = Router::new();
    haberdasher::register(&mut router, Arc::new(service));

    let server = TailorServer::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .router(router)
        .hooks(logging_hooks())
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    RpcClient::connect(&format!("ws://{}", addr)).await.unwrap()
}

#[tokio::test]
async fn test_make_hat() {
    let client = HaberdasherClient::new(start(HaberdasherService::new()).await, RetryingInvoker::new());

    let hat = client.make_hat(Size { inches: 12 }).await.unwrap();
    assert_eq!(hat.inches, 12);
    assert!(!hat.color.is_empty());
    assert!(!hat.name.is_empty());
}

#[tokio::test]
async fn test_too_small_is_not_retried() {
    let client = HaberdasherClient::new(start(HaberdasherService::new()).await, RetryingInvoker::new());

    let err = client.make_hat(Size { inches: -3 }).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(ref rpc) if rpc.code() == ErrorCode::InvalidArgument));
}

#[tokio::test]
async fn test_always_busy_gives_up_with_unavailable() {
    let rpc = start(HaberdasherService::new().with_failure_rate(1.0)).await;
    let client = HaberdasherClient::new(rpc, RetryingInvoker::new().with_max_attempts(3));

    let err = client.make_hat(Size { inches: 12 }).await.unwrap_err();
    let Error::Rpc(rpc) = err else {
        panic!("expected an rpc error, got {:?}", err);
    };
    assert_eq!(rpc.code(), ErrorCode::Unavailable);
    assert!(rpc.is_retryable());
}
