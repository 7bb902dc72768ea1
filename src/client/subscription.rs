//! GraphQL subscriptions over a dedicated WebSocket.
//!
//! Each [`SubscriptionHandle`] owns one connection, opened outside the request pool and
//! upgraded to WebSocket with the `graphql-ws` subprotocol. A background task reads
//! frames and forwards results, in the order the server sent them, through a bounded
//! channel.
//!
//! # Lifecycle
//!
//! 1. `connection_init` (carrying `Authorization`) → `connection_ack` → `start`
//! 2. `data` frames are delivered by [`next`](SubscriptionHandle::next); `ka` frames are ignored
//! 3. The handle closes when the caller calls [`close`](SubscriptionHandle::close) (or
//!    drops it), when the server completes the operation, or when the connection fails
//!
//! # Examples
//!
//! ```ignore
//! let mut subscription = client.subscribe(&document).await?;
//! while let Some(update) = subscription.next().await? {
//!     println!("{update}");
//! }
//! ```

use crate::error::{Result, TransportError, WebstackError};
use crate::protocol::constants::{GRAPHQL_PATH, GRAPHQL_WS_PROTOCOL};
use crate::protocol::{GraphEnvelope, StartPayload, WsMessage};
use crate::query::QueryDocument;
use crate::session::Credential;
use crate::transport::{EndpointConnector, Io};
use futures::{SinkExt, Stream, StreamExt};
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use serde_json::{json, Value};
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type Socket = WebSocketStream<Box<dyn Io>>;

/// What the reader task reports to the handle.
#[derive(Debug)]
enum Event {
    Data(Value),
    Error(WebstackError),
    Complete,
    Failed(String),
}

fn channel_error(context: &str, err: impl Display) -> WebstackError {
    WebstackError::Channel(format!("{}: {}", context, err))
}

/// Closes a subscription, possibly from another task.
#[derive(Debug, Clone)]
pub struct SubscriptionCloser {
    shutdown: Arc<watch::Sender<bool>>,
}

impl SubscriptionCloser {
    /// Send `stop`, close the socket and fail pending and future `next()` calls with
    /// [`WebstackError::ChannelClosed`].
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether the subscription is closed.
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// One open subscription.
pub struct SubscriptionHandle {
    id: String,
    receiver: mpsc::Receiver<Event>,
    closer: SubscriptionCloser,
    completed: bool,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("closed", &self.closer.is_closed())
            .field("completed", &self.completed)
            .finish()
    }
}

impl SubscriptionHandle {
    /// Open the connection, run the `graphql-ws` handshake and start `document`.
    pub(crate) async fn open(
        connector: &EndpointConnector,
        headers: &HeaderMap,
        credential: Option<&Credential>,
        document: &QueryDocument,
        buffer: usize,
        timeout: Duration,
        enable_logging: bool,
    ) -> Result<Self> {
        let url = connector.endpoint().websocket_url(GRAPHQL_PATH);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|err| channel_error("invalid WebSocket request", err))?;
        {
            let request_headers = request.headers_mut();
            for (name, value) in headers {
                request_headers.insert(name.clone(), value.clone());
            }
            request_headers.insert(
                SEC_WEBSOCKET_PROTOCOL,
                HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
            );
            if let Some(credential) = credential {
                let value = HeaderValue::from_str(&credential.header_value())
                    .map_err(|err| WebstackError::Auth(format!("invalid credential: {}", err)))?;
                request_headers.insert(AUTHORIZATION, value);
            }
        }

        let authorization = credential.map(Credential::header_value);
        let handshake = async {
            let stream = connector.open_stream().await?;
            let (mut socket, _response) = tokio_tungstenite::client_async(request, stream)
                .await
                .map_err(|err| channel_error("WebSocket upgrade failed", err))?;

            let init = WsMessage::ConnectionInit {
                payload: Some(match &authorization {
                    Some(value) => json!({ "Authorization": value }),
                    None => json!({}),
                }),
            };
            send(&mut socket, &init).await?;
            wait_for_ack(&mut socket).await?;

            let id = uuid::Uuid::new_v4().to_string();
            let start = WsMessage::Start {
                id: id.clone(),
                payload: StartPayload {
                    query: document.render(),
                    variables: document.variables(),
                },
            };
            send(&mut socket, &start).await?;
            Ok::<_, WebstackError>((socket, id))
        };

        let (socket, id) = match tokio::time::timeout(timeout, handshake).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(timeout).into()),
        };

        if enable_logging {
            tracing::debug!(operation = document.name(), %id, "subscription started");
        }

        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(read_loop(
            socket,
            id.clone(),
            document.name().to_string(),
            sender,
            shutdown_rx,
            enable_logging,
        ));

        Ok(Self {
            id,
            receiver,
            closer: SubscriptionCloser {
                shutdown: Arc::new(shutdown),
            },
            completed: false,
        })
    }

    /// Operation id sent in `start`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next pushed result.
    ///
    /// - `Ok(Some(data))`: the operation's value from the next `data` frame
    /// - `Ok(None)`: the server completed the operation
    /// - `Err(ChannelClosed)`: the handle was closed, including while this call waited
    /// - `Err(Channel(..))`: the connection failed; reported once, then the handle is closed
    /// - `Err(Graph { .. })`: the server reported errors for this result
    pub async fn next(&mut self) -> Result<Option<Value>> {
        if self.closer.is_closed() {
            return Err(WebstackError::ChannelClosed);
        }
        if self.completed {
            return Ok(None);
        }

        let mut closed = self.closer.shutdown.subscribe();
        let event = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => return Err(WebstackError::ChannelClosed),
            event = self.receiver.recv() => event,
        };
        self.on_event(event)
    }

    fn on_event(&mut self, event: Option<Event>) -> Result<Option<Value>> {
        match event {
            Some(Event::Data(value)) => Ok(Some(value)),
            Some(Event::Error(err)) => Err(err),
            Some(Event::Complete) => {
                self.completed = true;
                Ok(None)
            }
            Some(Event::Failed(reason)) => {
                self.closer.close();
                Err(WebstackError::Channel(reason))
            }
            None => {
                self.closer.close();
                Err(WebstackError::Channel("subscription reader stopped".into()))
            }
        }
    }

    /// Close the subscription. Idempotent.
    pub fn close(&self) {
        self.closer.close();
    }

    /// Handle for closing from another task.
    pub fn closer(&self) -> SubscriptionCloser {
        self.closer.clone()
    }

    /// Whether the handle is closed.
    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.closer.close();
    }
}

impl Stream for SubscriptionHandle {
    type Item = Result<Value>;

    /// Ends when the handle is closed or the operation completes.
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closer.is_closed() || self.completed {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(event) => Poll::Ready(self.on_event(event).transpose()),
        }
    }
}

async fn wait_closed(shutdown: &mut watch::Receiver<bool>) {
    // also returns once the sender is gone
    let _ = shutdown.wait_for(|closed| *closed).await;
}

async fn send(socket: &mut Socket, message: &WsMessage) -> Result<()> {
    socket
        .send(Message::text(message.to_text()?))
        .await
        .map_err(|err| channel_error("sending frame", err))
}

async fn wait_for_ack(socket: &mut Socket) -> Result<()> {
    loop {
        let frame = socket
            .next()
            .await
            .ok_or_else(|| WebstackError::Channel("connection closed before ack".into()))?
            .map_err(|err| channel_error("waiting for ack", err))?;
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => {
                return Err(WebstackError::Channel("connection closed before ack".into()))
            }
            _ => continue,
        };
        match WsMessage::from_text(text.as_str())? {
            WsMessage::ConnectionAck { .. } => return Ok(()),
            WsMessage::ConnectionError { payload } => {
                return Err(WebstackError::Auth(format!(
                    "subscription connection rejected: {}",
                    payload.unwrap_or(Value::Null)
                )))
            }
            _ => continue,
        }
    }
}

/// Turn one frame into an event, if it concerns the operation.
fn classify(frame: Message, id: &str, operation: &str) -> Option<Event> {
    let text = match frame {
        Message::Text(text) => text,
        Message::Close(frame) => {
            let reason = frame
                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                .unwrap_or_else(|| "no reason".into());
            return Some(Event::Failed(format!("server closed the connection ({})", reason)));
        }
        _ => return None,
    };

    let message = match WsMessage::from_text(text.as_str()) {
        Ok(message) => message,
        Err(err) => return Some(Event::Failed(format!("malformed frame: {}", err))),
    };
    match message {
        WsMessage::Data { id: frame_id, payload } if frame_id == id => {
            let envelope: GraphEnvelope = match serde_json::from_value(payload) {
                Ok(envelope) => envelope,
                Err(err) => return Some(Event::Error(err.into())),
            };
            Some(match envelope.into_data() {
                Ok(mut data) => Event::Data(
                    data.get_mut(operation).map(Value::take).unwrap_or(data),
                ),
                Err(err) => Event::Error(err),
            })
        }
        WsMessage::Error { id: frame_id, payload } if frame_id == id => {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            Some(Event::Error(WebstackError::Graph {
                message,
                error_code: None,
            }))
        }
        WsMessage::Complete { id: frame_id } if frame_id == id => Some(Event::Complete),
        WsMessage::ConnectionError { payload } => Some(Event::Failed(format!(
            "connection error: {}",
            payload.unwrap_or(Value::Null)
        ))),
        _ => None,
    }
}

async fn read_loop(
    mut socket: Socket,
    id: String,
    operation: String,
    sender: mpsc::Sender<Event>,
    mut shutdown: watch::Receiver<bool>,
    enable_logging: bool,
) {
    loop {
        let frame = tokio::select! {
            _ = wait_closed(&mut shutdown) => break,
            frame = socket.next() => frame,
        };

        let event = match frame {
            Some(Ok(frame)) => match classify(frame, &id, &operation) {
                Some(event) => event,
                None => continue,
            },
            Some(Err(err)) => Event::Failed(format!("connection error: {}", err)),
            None => Event::Failed("connection closed unexpectedly".into()),
        };

        let last = matches!(event, Event::Complete | Event::Failed(_));
        if let Event::Failed(reason) = &event {
            tracing::warn!(%id, %operation, %reason, "subscription failed");
        } else if enable_logging {
            tracing::trace!(%id, %operation, "subscription event");
        }

        let delivered = tokio::select! {
            result = sender.send(event) => result.is_ok(),
            _ = wait_closed(&mut shutdown) => false,
        };
        if !delivered {
            break;
        }
        if last {
            let _ = socket.close(None).await;
            return;
        }
    }

    let _ = send(&mut socket, &WsMessage::Stop { id: id.clone() }).await;
    let _ = socket.close(None).await;
    if enable_logging {
        tracing::debug!(%id, %operation, "subscription closed");
    }
}
