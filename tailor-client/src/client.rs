//! RPC client over WebSocket
//!
//! # Client Lifecycle
//!
//! 1. **Connect**: Establish the WebSocket connection and start the receive loop
//! 2. **Use**: Send requests; responses are matched by id
//! 3. **Close**: [`RpcClient::disconnect`], or drop every clone
//!
//! When the connection is lost every pending request fails with
//! [`Error::ConnectionClosed`] and later requests fail the same way. The
//! client does not reconnect; callers that want another try open a new
//! connection.
//!
//! # Cloning
//!
//! `RpcClient` is cheaply cloneable; all clones share the connection.

use crate::request::RequestManager;
use crate::ClientMetrics;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tailor_core::{codec, Error, Request, Result};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// RPC client over WebSocket
#[derive(Clone)]
pub struct RpcClient {
    sender: Arc<Mutex<SplitSink<WsStream, Message>>>,
    request_manager: RequestManager,
    closed: Arc<AtomicBool>,
    default_timeout: Option<Duration>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl RpcClient {
    /// Connect to a server
    pub async fn connect(url: &str) -> Result<Self> {
        Self::builder(url).connect().await
    }

    /// Create a builder for a client with metrics or a default timeout
    pub fn builder(url: impl Into<String>) -> crate::ClientBuilder {
        crate::ClientBuilder::new(url)
    }

    #[tracing::instrument(skip(url, default_timeout, metrics), fields(url = url))]
    pub(crate) async fn connect_with(
        url: &str,
        default_timeout: Option<Duration>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Result<Self> {
        tracing::info!("Connecting to server");
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (sender, receiver) = ws_stream.split();
        let client = Self {
            sender: Arc::new(Mutex::new(sender)),
            request_manager: RequestManager::new(),
            closed: Arc::new(AtomicBool::new(false)),
            default_timeout,
            metrics,
        };

        tracing::info!("Connected successfully");

        tokio::spawn(Self::receive_loop(
            receiver,
            client.request_manager.clone(),
            Arc::clone(&client.closed),
        ));

        Ok(client)
    }

    /// Whether the connection is still open
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for the response
    ///
    /// Uses the client's default timeout, if one was configured. An error
    /// response surfaces as [`Error::Rpc`] with its code and metadata intact.
    pub async fn request<P, R>(&self, method: impl Into<String>, params: P) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        self.send_request(method.into(), params, self.default_timeout)
            .await
    }

    /// Send a request and wait at most `timeout` for the response
    ///
    /// The timeout is also sent to the server, which exposes it to the
    /// handler as the request deadline. Fails with [`Error::Timeout`] when
    /// no response arrives in time.
    pub async fn request_with_timeout<P, R>(
        &self,
        method: impl Into<String>,
        params: P,
        timeout: Duration,
    ) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        self.send_request(method.into(), params, Some(timeout)).await
    }

    #[tracing::instrument(skip_all, fields(method = %method))]
    async fn send_request<P, R>(
        &self,
        method: String,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let start = Instant::now();
        let outcome = self.round_trip(&method, params, timeout).await;

        if let Some(ref m) = self.metrics {
            let status = match &outcome {
                Ok(_) => "ok".to_string(),
                Err(Error::Rpc(rpc)) => rpc.code().to_string(),
                Err(Error::Timeout) => "timeout".to_string(),
                Err(_) => "transport".to_string(),
            };
            m.record_request(&method, &status, start.elapsed().as_secs_f64());
        }

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Request failed");
                return Err(e);
            }
        };

        tracing::debug!(
            duration_secs = start.elapsed().as_secs_f64(),
            "Request completed successfully"
        );
        serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    async fn round_trip<P: serde::Serialize>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value> {
        let params =
            serde_json::to_value(params).map_err(|e| Error::Serialization(e.to_string()))?;

        let id = self.request_manager.next_id();
        let mut request = Request::new(id, method, Some(params));
        if let Some(timeout) = timeout {
            request = request.with_timeout(timeout);
        }
        let text = codec::encode_request(&request)?;

        // Register before sending so a fast response is never missed
        let rx = self.request_manager.register(id).await;
        if self.closed.load(Ordering::SeqCst) {
            self.request_manager.forget(id).await;
            return Err(Error::ConnectionClosed);
        }

        if let Err(e) = self.sender.lock().await.send(Message::Text(text)).await {
            self.request_manager.forget(id).await;
            return Err(Error::WebSocket(e.to_string()));
        }

        tracing::debug!(id, "Request sent, waiting for response");

        let received = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.request_manager.forget(id).await;
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        let response = received.map_err(|_| Error::ConnectionClosed)??;
        Ok(response.into_result()?)
    }

    /// Close the connection
    ///
    /// Pending requests fail with [`Error::ConnectionClosed`] once the
    /// server acknowledges the close.
    pub async fn disconnect(&self) -> Result<()> {
        tracing::info!("Disconnecting");
        self.sender
            .lock()
            .await
            .close()
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn receive_loop(
        mut receiver: SplitStream<WsStream>,
        request_manager: RequestManager,
        closed: Arc<AtomicBool>,
    ) {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match codec::decode_response(&text) {
                    Ok(response) => {
                        let id = response.id;
                        if !request_manager.complete(response).await {
                            tracing::warn!(id, "Response for unknown request");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Error decoding message"),
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Connection closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        request_manager.fail_all(Error::ConnectionClosed).await;
        tracing::info!("Receive loop finished");
    }
}
