//! EventChannel - reconnecting WebSocket push channel
//!
//! 1. Connect to the role's channel address
//! 2. Send the subscription message (if any) on every open
//! 3. Parse incoming frames into [`ChannelEvent`]s and forward them
//! 4. Keepalive `ping` at a fixed interval
//! 5. Reconnect per [`ReconnectPolicy`] on close, give up after the limit
//!
//! Transport errors never leave this module: they only move the state.

use super::backoff::{ChannelState, ReconnectPolicy};
use crate::ChannelConfig;
use futures::{SinkExt, StreamExt};
use shared::{ChannelEvent, ClientMessage};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a connected session ended
enum SessionEnd {
    /// Owner closed the channel (or stopped listening)
    Shutdown,
    /// Transport dropped, reconnect
    Disconnected,
}

/// Push channel for one (role, identifier)
///
/// Owned by a single view. Dropping it closes the connection and cancels any
/// pending reconnect.
pub struct EventChannel {
    url: String,
    config: ChannelConfig,
    subscription: Option<ClientMessage>,
    state_tx: watch::Sender<ChannelState>,
    outbound: Option<mpsc::UnboundedSender<ClientMessage>>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EventChannel {
    pub fn new(url: impl Into<String>, config: ChannelConfig) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Closed);
        Self {
            url: url.into(),
            config,
            subscription: None,
            state_tx,
            outbound: None,
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    /// Message sent right after every successful (re)open
    pub fn with_subscription(mut self, message: ClientMessage) -> Self {
        self.subscription = Some(message);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection task, delivering events to `events`.
    ///
    /// No-op while a previous open is still running. After [`close`](Self::close)
    /// or after the channel gave up, opens afresh with a reset policy.
    pub fn open(&mut self, events: mpsc::UnboundedSender<ChannelEvent>) {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) && !self.shutdown.is_cancelled() {
            tracing::debug!(url = %self.url, "Channel already open");
            return;
        }

        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);

        let worker = ChannelWorker {
            url: self.url.clone(),
            config: self.config.clone(),
            subscription: self.subscription.clone(),
            events,
            outbound: outbound_rx,
            state_tx: self.state_tx.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.task = Some(tokio::spawn(worker.run()));
    }

    /// Best-effort send: silently dropped unless the channel is open.
    pub fn send(&self, message: ClientMessage) {
        if !self.state_tx.borrow().is_open() {
            tracing::debug!(?message, "Channel not open, dropping message");
            return;
        }
        if let Some(tx) = &self.outbound {
            let _ = tx.send(message);
        }
    }

    /// Close the transport and cancel any pending reconnect. Idempotent.
    pub fn close(&mut self) {
        self.shutdown.cancel();
        self.outbound = None;
        self.state_tx.send_replace(ChannelState::Closed);
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Watch transport state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct ChannelWorker {
    url: String,
    config: ChannelConfig,
    subscription: Option<ClientMessage>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    state_tx: watch::Sender<ChannelState>,
    shutdown: CancellationToken,
}

impl ChannelWorker {
    /// Main run loop: connect, pump messages, reconnect on failure
    async fn run(mut self) {
        let mut policy = ReconnectPolicy::from_config(&self.config);
        tracing::info!(url = %self.url, "Event channel started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.set_state(ChannelState::Connecting {
                attempt: policy.attempt(),
            });

            let connect = tokio::time::timeout(
                self.config.connect_timeout,
                tokio_tungstenite::connect_async(self.url.as_str()),
            );
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = connect => result,
            };

            match result {
                Ok(Ok((ws, _response))) => {
                    policy.on_open();
                    self.set_state(ChannelState::Open);
                    tracing::info!(url = %self.url, "Event channel connected");

                    if let SessionEnd::Shutdown = self.run_session(ws).await {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %self.url, attempt = policy.attempt(), "Channel connect failed: {e}");
                }
                Err(_) => {
                    tracing::warn!(url = %self.url, attempt = policy.attempt(), "Channel connect timed out");
                }
            }

            let Some(delay) = policy.on_failure() else {
                tracing::warn!(
                    url = %self.url,
                    failures = policy.attempt(),
                    "Event channel giving up, falling back to polling"
                );
                self.set_state(ChannelState::GaveUp);
                return;
            };

            self.set_state(ChannelState::Backoff {
                attempt: policy.attempt(),
                delay,
            });
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {},
            }
        }

        self.set_state(ChannelState::Closed);
        tracing::info!(url = %self.url, "Event channel stopped");
    }

    /// Run a single connected session until disconnect or shutdown
    async fn run_session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut ws_sink, mut ws_stream) = ws.split();

        // Sends queued while the previous connection was dying are stale
        while self.outbound.try_recv().is_ok() {}

        if let Some(subscription) = &self.subscription
            && let Err(e) = send_message(&mut ws_sink, subscription).await
        {
            tracing::warn!("Subscription send failed, disconnecting: {e}");
            return SessionEnd::Disconnected;
        }

        let keepalive_enabled = !self.config.keepalive_interval.is_zero();
        let mut ping_interval = tokio::time::interval(if keepalive_enabled {
            self.config.keepalive_interval
        } else {
            std::time::Duration::from_secs(3600)
        });
        ping_interval.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = ws_sink.close().await;
                    return SessionEnd::Shutdown;
                }

                // Keepalive ping
                _ = ping_interval.tick(), if keepalive_enabled => {
                    if let Err(e) = send_message(&mut ws_sink, &ClientMessage::Ping).await {
                        tracing::warn!("Keepalive ping failed, disconnecting: {e}");
                        return SessionEnd::Disconnected;
                    }
                }

                // Owner → server
                Some(message) = self.outbound.recv() => {
                    if let Err(e) = send_message(&mut ws_sink, &message).await {
                        tracing::warn!("Channel send failed, disconnecting: {e}");
                        return SessionEnd::Disconnected;
                    }
                }

                // Incoming WS message
                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.dispatch(text.as_str()) {
                                let _ = ws_sink.close().await;
                                return SessionEnd::Shutdown;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Event channel closed by server");
                            return SessionEnd::Disconnected;
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Event channel error: {e}");
                            return SessionEnd::Disconnected;
                        }
                        None => {
                            tracing::info!("Event channel stream ended");
                            return SessionEnd::Disconnected;
                        }
                        _ => {} // Binary, Pong: ignore
                    }
                }
            }
        }
    }

    /// Parse and forward one frame. Returns `false` once nobody listens.
    fn dispatch(&self, text: &str) -> bool {
        let event = match ChannelEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {e}");
                return true;
            }
        };

        match event {
            ChannelEvent::Unknown => {
                tracing::debug!(frame = %text, "Ignoring unknown event type");
                true
            }
            ChannelEvent::Pong => true,
            event => {
                tracing::debug!(kind = event.kind(), order_id = ?event.order_id(), "Event received");
                self.events.send(event).is_ok()
            }
        }
    }

    /// Publish a state change. Once the owner has closed the channel the
    /// state stays `Closed`.
    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_if_modified(|current| {
            if self.shutdown.is_cancelled() || *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

async fn send_message<S>(sink: &mut S, message: &ClientMessage) -> Result<(), String>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = message.to_json().map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}
