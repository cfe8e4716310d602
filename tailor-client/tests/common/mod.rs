//! Common test utilities for tailor-client integration tests
//!
//! A small WebSocket server whose replies are scripted per request, so
//! client behaviour can be tested without a full tailor-server.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tailor_core::{codec, Request, Response};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// What the mock server does with a request
pub enum MockReply {
    /// Send this response
    Respond(Response),
    /// Say nothing
    Silent,
    /// Close the connection
    Close,
}

/// Mock WebSocket server for client testing
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    request_rx: mpsc::UnboundedReceiver<Request>,
}

impl MockWsServer {
    /// Start a server that answers every request with its own params
    pub async fn echo() -> Self {
        Self::with_handler(|req| {
            MockReply::Respond(Response::success(
                req.id,
                req.params.clone().unwrap_or_default(),
            ))
        })
        .await
    }

    /// Start a server that replies according to `handler`
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> MockReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (request_tx, request_rx) = mpsc::unbounded_channel::<Request>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let handler = Arc::clone(&handler);
                        let request_tx = request_tx.clone();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            while let Some(Ok(msg)) = read.next().await {
                                let Message::Text(text) = msg else { continue };
                                let Ok(request) = codec::decode_request(&text) else { continue };
                                let _ = request_tx.send(request.clone());

                                match handler(&request) {
                                    MockReply::Respond(response) => {
                                        let text = codec::encode_response(&response).unwrap();
                                        let _ = write.send(Message::Text(text)).await;
                                    }
                                    MockReply::Silent => {}
                                    MockReply::Close => {
                                        let _ = write.close().await;
                                        break;
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            request_rx,
        }
    }

    /// The `ws://` URL of this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait up to five seconds for the next request the server received
    pub async fn next_request(&mut self) -> Option<Request> {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.request_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting connections
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
