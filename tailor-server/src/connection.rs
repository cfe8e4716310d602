//! WebSocket connection handling
//!
//! # Connection Lifecycle
//!
//! 1. **Accept**: TCP connection accepted by the server loop
//! 2. **Upgrade**: Upgrade to WebSocket
//! 3. **Process**: Decode each text frame and dispatch it in its own task
//! 4. **Cleanup**: Stop the writer once the client goes away
//!
//! # Task Model
//!
//! Each connection runs a receive loop and a single writer task fed by an
//! unbounded channel. Every request is dispatched in a task of its own, so a
//! slow handler never holds up other requests on the same connection, and
//! responses may be written in a different order than requests arrived.

use crate::pipeline::DispatchPipeline;
use futures::{SinkExt, StreamExt};
use tailor_core::{codec, Error, Request, RequestContext, Response, Result, RpcError};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Serve a single WebSocket connection until it closes
#[tracing::instrument(skip(stream, pipeline), fields(conn_id = conn_id))]
pub(crate) async fn handle_connection(
    stream: TcpStream,
    conn_id: u64,
    pipeline: DispatchPipeline,
) -> Result<()> {
    tracing::debug!("Upgrading connection to WebSocket");
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                tracing::error!(error = %e, "Error sending message");
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => handle_message(text, conn_id, &pipeline, &tx),
                Ok(Message::Close(_)) => {
                    tracing::info!("Connection closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            // Let in-flight requests finish writing; the writer stops once
            // every sender clone held by a request task is dropped.
            let _ = send_task.await;
        }
    }

    tracing::info!("Connection cleaned up");
    Ok(())
}

/// Decode one text frame and spawn its dispatch
fn handle_message(
    text: String,
    conn_id: u64,
    pipeline: &DispatchPipeline,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let request = match codec::decode_request(&text) {
        Ok(request) => request,
        Err(err) => {
            let id = codec::request_id_hint(&text).unwrap_or(0);
            tracing::warn!(id, error = %err, "Malformed request");
            send_response(tx, Response::failure(id, err));
            return;
        }
    };

    let pipeline = pipeline.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let response = process_request(request, conn_id, &pipeline).await;
        send_response(&tx, response);
    });
}

/// Run a decoded request through the pipeline
pub(crate) async fn process_request(
    request: Request,
    conn_id: u64,
    pipeline: &DispatchPipeline,
) -> Response {
    let mut ctx = RequestContext::new(&request.method, request.id, conn_id);
    if let Some(timeout) = request.timeout() {
        ctx = ctx.with_timeout(timeout);
    }

    let outcome = pipeline.dispatch(ctx, request.params).await;
    Response::from_result(request.id, outcome)
}

fn send_response(tx: &mpsc::UnboundedSender<Message>, response: Response) {
    let text = match codec::encode_response(&response) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(id = response.id, error = %e, "Failed to encode response");
            let fallback = Response::failure(
                response.id,
                RpcError::internal(format!("failed to encode response: {}", e)),
            );
            match codec::encode_response(&fallback) {
                Ok(text) => text,
                Err(_) => return,
            }
        }
    };

    if tx.send(Message::Text(text)).is_err() {
        tracing::debug!(id = response.id, "Connection closed before response was sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{from_fn, Router, ServerHooks};
    use std::sync::Arc;
    use tailor_core::ErrorCode;

    fn pipeline() -> DispatchPipeline {
        let mut router = Router::new();
        router.register(
            "Echo/Say",
            from_fn(|ctx, params| async move {
                Ok(serde_json::json!({
                    "params": params,
                    "has_deadline": ctx.deadline.is_some(),
                }))
            }),
        );
        DispatchPipeline::new(router, Arc::new(ServerHooks::new()))
    }

    #[tokio::test]
    async fn test_process_request_success() {
        let request = Request::new(7, "Echo/Say", Some(serde_json::json!("hi")));
        let response = process_request(request, 1, &pipeline()).await;

        assert_eq!(response.id, 7);
        let result = response.into_result().unwrap();
        assert_eq!(result["params"], "hi");
        assert_eq!(result["has_deadline"], false);
    }

    #[tokio::test]
    async fn test_process_request_propagates_timeout() {
        let request = Request::new(8, "Echo/Say", None)
            .with_timeout(std::time::Duration::from_secs(5));
        let response = process_request(request, 1, &pipeline()).await;
        assert_eq!(response.into_result().unwrap()["has_deadline"], true);
    }

    #[tokio::test]
    async fn test_process_request_unknown_method() {
        let request = Request::new(9, "Echo/Nope", None);
        let response = process_request(request, 1, &pipeline()).await;

        assert_eq!(response.id, 9);
        assert_eq!(response.into_result().unwrap_err().code(), ErrorCode::BadRoute);
    }

    #[tokio::test]
    async fn test_malformed_message_answers_with_recovered_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_message(r#"{"id": 12, "method": 5}"#.to_string(), 1, &pipeline(), &tx);

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text response");
        };
        let response = codec::decode_response(&text).unwrap();
        assert_eq!(response.id, 12);
        assert_eq!(response.into_result().unwrap_err().code(), ErrorCode::Malformed);
    }

    #[tokio::test]
    async fn test_malformed_message_without_id_uses_zero() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_message("not json".to_string(), 1, &pipeline(), &tx);

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text response");
        };
        assert_eq!(codec::decode_response(&text).unwrap().id, 0);
    }
}
