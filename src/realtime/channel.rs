//! Realtime Channel Subscription
//!
//! Connects to the realtime websocket, joins the broadcast topic, and feeds
//! matching broadcasts to a [`BroadcastHandler`] until the [`Subscription`]
//! is released.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::handler::BroadcastHandler;
use super::messages::{Frame, Inbound};
use crate::config::RealtimeConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JOIN_REF: &str = "1";
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors from establishing or running a subscription
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Realtime URL is not configured")]
    MissingUrl,

    #[error("Unsupported realtime URL scheme: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Timed out joining channel")]
    Timeout,

    #[error("Channel join rejected: {0}")]
    JoinRejected(String),

    #[error("Connection closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::WebSocket(err.to_string())
    }
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Connection state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Joined,
    Reconnecting { attempt: u32 },
    Closed,
}

/// Delay before reconnect attempt `attempt` (0-based): 1s, 2s, 4s ... capped at 30s
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(5)).min(MAX_BACKOFF)
}

/// Realtime service endpoint and channel settings
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    config: RealtimeConfig,
    /// Base delay multiplier for reconnects; shortened in tests
    backoff_unit: Duration,
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Scale reconnect delays (the default unit is one second)
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Websocket URL for the configured service
    ///
    /// `https://host` becomes `wss://host/realtime/v1/websocket?apikey=..&vsn=1.0.0`;
    /// a `ws(s)://` URL is used as the socket path directly.
    pub fn socket_url(&self) -> RealtimeResult<String> {
        let base = self.config.url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(RealtimeError::MissingUrl);
        }

        let socket = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}/realtime/v1/websocket", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}/realtime/v1/websocket", rest)
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(RealtimeError::InvalidUrl(base.to_string()));
        };

        Ok(format!(
            "{}?apikey={}&vsn=1.0.0",
            socket,
            urlencoding::encode(&self.config.api_key)
        ))
    }

    /// Connect, join the topic, and start delivering broadcasts to `handler`
    ///
    /// Returns once the join is acknowledged. The subscription lives until
    /// [`Subscription::unsubscribe`] or drop.
    pub async fn subscribe(&self, handler: Arc<dyn BroadcastHandler>) -> RealtimeResult<Subscription> {
        let url = self.socket_url()?;
        let id = uuid::Uuid::new_v4().to_string();

        let ws = connect_and_join(&url, &self.config, handler.as_ref()).await?;
        tracing::info!(
            subscription_id = %id,
            topic = %self.config.topic,
            event = %self.config.event,
            "Realtime channel joined"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Joined);

        let worker = Worker {
            id: id.clone(),
            url,
            config: self.config.clone(),
            backoff_unit: self.backoff_unit,
            handler,
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(ws, shutdown_rx));

        Ok(Subscription {
            id,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            state: state_rx,
        })
    }
}

/// A live channel subscription
///
/// Release with [`Subscription::unsubscribe`] to leave the channel cleanly;
/// dropping it aborts the connection task.
pub struct Subscription {
    id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<ChannelState>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver for connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Leave the channel, close the socket and wait for the task to finish
    pub async fn unsubscribe(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(subscription_id = %self.id, error = %e, "Realtime task ended abnormally");
            }
        }
        tracing::info!(subscription_id = %self.id, "Realtime channel released");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(subscription_id = %self.id, "Realtime subscription dropped");
        }
    }
}

/// How a single connection ended
enum ConnectionEnd {
    Shutdown,
    Lost(String),
}

struct Worker {
    id: String,
    url: String,
    config: RealtimeConfig,
    backoff_unit: Duration,
    handler: Arc<dyn BroadcastHandler>,
    state: watch::Sender<ChannelState>,
}

impl Worker {
    async fn run(self, ws: WsStream, mut shutdown: oneshot::Receiver<()>) {
        let mut ws = ws;

        loop {
            match self.serve(ws, &mut shutdown).await {
                ConnectionEnd::Shutdown => break,
                ConnectionEnd::Lost(reason) => {
                    tracing::warn!(subscription_id = %self.id, reason = %reason, "Realtime connection lost");
                }
            }

            match self.reconnect(&mut shutdown).await {
                Some(next) => ws = next,
                None => break,
            }
        }

        let _ = self.state.send(ChannelState::Closed);
    }

    /// Pump one connection until shutdown or loss
    async fn serve(&self, mut ws: WsStream, shutdown: &mut oneshot::Receiver<()>) -> ConnectionEnd {
        let period = Duration::from_secs(self.config.heartbeat_secs.max(1));
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut next_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    self.leave(&mut ws, next_ref).await;
                    return ConnectionEnd::Shutdown;
                }
                _ = heartbeat.tick() => {
                    let frame = Frame::heartbeat(&next_ref.to_string());
                    next_ref += 1;
                    if let Err(e) = send_frame(&mut ws, &frame).await {
                        return ConnectionEnd::Lost(e.to_string());
                    }
                }
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = dispatch(&text, &self.config, self.handler.as_ref()) {
                            return ConnectionEnd::Lost(reason);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return ConnectionEnd::Lost("socket closed".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return ConnectionEnd::Lost(e.to_string()),
                }
            }
        }
    }

    async fn leave(&self, ws: &mut WsStream, reference: u64) {
        let frame = Frame::leave(&self.config.topic, &reference.to_string());
        if let Err(e) = send_frame(ws, &frame).await {
            tracing::debug!(subscription_id = %self.id, error = %e, "Failed to send leave");
        }
        let _ = ws.close(None).await;
    }

    /// Reconnect with exponential backoff; `None` on shutdown or when attempts run out
    async fn reconnect(&self, shutdown: &mut oneshot::Receiver<()>) -> Option<WsStream> {
        for attempt in 0..self.config.max_reconnect_attempts {
            let _ = self.state.send(ChannelState::Reconnecting { attempt: attempt + 1 });
            let delay = self.backoff_unit * backoff_delay(attempt).as_secs() as u32;

            tokio::select! {
                _ = &mut *shutdown => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match connect_and_join(&self.url, &self.config, self.handler.as_ref()).await {
                Ok(ws) => {
                    tracing::info!(subscription_id = %self.id, attempt = attempt + 1, "Realtime channel rejoined");
                    let _ = self.state.send(ChannelState::Joined);
                    return Some(ws);
                }
                Err(e) => {
                    tracing::warn!(
                        subscription_id = %self.id,
                        attempt = attempt + 1,
                        error = %e,
                        "Realtime reconnect failed"
                    );
                }
            }
        }

        tracing::error!(subscription_id = %self.id, "Max reconnect attempts reached");
        None
    }
}

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> RealtimeResult<()> {
    ws.send(Message::Text(frame.to_text()?)).await?;
    Ok(())
}

/// Route one text frame; returns a reason when the channel is gone
fn dispatch(text: &str, config: &RealtimeConfig, handler: &dyn BroadcastHandler) -> Option<String> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed realtime frame");
            return None;
        }
    };

    match frame.inbound(&config.topic) {
        Inbound::Broadcast(message) if message.event == config.event => {
            handler.on_broadcast(&message.payload);
            None
        }
        Inbound::Broadcast(message) => {
            tracing::trace!(event = %message.event, "Ignoring broadcast event");
            None
        }
        Inbound::ChannelError => Some("channel error".to_string()),
        Inbound::ChannelClosed => Some("channel closed by server".to_string()),
        Inbound::Reply { .. } | Inbound::Other => None,
    }
}

async fn connect_and_join(
    url: &str,
    config: &RealtimeConfig,
    handler: &dyn BroadcastHandler,
) -> RealtimeResult<WsStream> {
    let (mut ws, _) = tokio::time::timeout(JOIN_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| RealtimeError::Timeout)??;

    send_frame(&mut ws, &Frame::join(&config.topic, JOIN_REF)).await?;

    tokio::time::timeout(JOIN_TIMEOUT, await_join_reply(&mut ws, config, handler))
        .await
        .map_err(|_| RealtimeError::Timeout)??;

    Ok(ws)
}

/// Wait for the reply to our join; broadcasts that race ahead of it are still delivered
async fn await_join_reply(
    ws: &mut WsStream,
    config: &RealtimeConfig,
    handler: &dyn BroadcastHandler,
) -> RealtimeResult<()> {
    while let Some(message) = ws.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(RealtimeError::Closed),
            _ => continue,
        };

        let frame: Frame = serde_json::from_str(&text)?;
        match frame.inbound(&config.topic) {
            Inbound::Reply {
                reference,
                ok,
                response,
            } if reference.as_deref() == Some(JOIN_REF) => {
                return if ok {
                    Ok(())
                } else {
                    Err(RealtimeError::JoinRejected(response.to_string()))
                };
            }
            Inbound::Broadcast(_) => {
                dispatch(&text, config, handler);
            }
            _ => {}
        }
    }

    Err(RealtimeError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn channel(url: &str) -> RealtimeChannel {
        RealtimeChannel::new(RealtimeConfig {
            url: url.to_string(),
            api_key: "anon key".to_string(),
            ..RealtimeConfig::default()
        })
    }

    #[test]
    fn test_socket_url_from_https() {
        assert_eq!(
            channel("https://abc.supabase.co/").socket_url().unwrap(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon%20key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_socket_url_from_ws() {
        assert_eq!(
            channel("ws://127.0.0.1:4000/socket").socket_url().unwrap(),
            "ws://127.0.0.1:4000/socket?apikey=anon%20key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_socket_url_errors() {
        assert!(matches!(channel("").socket_url(), Err(RealtimeError::MissingUrl)));
        assert!(matches!(
            channel("ftp://x").socket_url(),
            Err(RealtimeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(30));
        assert_eq!(backoff_delay(12), Duration::from_secs(30));
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<serde_json::Value>>);

    impl BroadcastHandler for Collect {
        fn on_broadcast(&self, payload: &serde_json::Value) {
            self.0.lock().unwrap().push(payload.clone());
        }
    }

    #[test]
    fn test_dispatch_filters_event_name() {
        let config = RealtimeConfig::default();
        let handler = Collect::default();

        let shout = r#"{"topic":"realtime:event-changes","event":"broadcast","payload":{"event":"shout","payload":{"n":1}},"ref":null}"#;
        let other = r#"{"topic":"realtime:event-changes","event":"broadcast","payload":{"event":"whisper","payload":{"n":2}},"ref":null}"#;

        assert!(dispatch(shout, &config, &handler).is_none());
        assert!(dispatch(other, &config, &handler).is_none());
        assert!(dispatch("not json", &config, &handler).is_none());

        let seen = handler.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["n"], 1);
    }

    #[test]
    fn test_dispatch_channel_error_ends_connection() {
        let config = RealtimeConfig::default();
        let frame = r#"{"topic":"realtime:event-changes","event":"phx_error","payload":{},"ref":null}"#;
        assert!(dispatch(frame, &config, &Collect::default()).is_some());
    }
}
