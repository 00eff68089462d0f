//! Realtime websocket client
//!
//! One connection per connector. Joined tables survive reconnects: after a
//! reconnect every table is joined again and gets a `Resync` event, since
//! changes made while disconnected were never delivered.

use crate::core::BackendError;
use crate::dtos::change_event::{EVENT_POSTGRES_CHANGES, EVENT_REPLY};
use crate::dtos::{ChangeEvent, PhoenixMessage};
use crate::entities::Table;
use crate::realtime::ChangeFeed;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval, sleep};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    /// Full websocket endpoint, see [`RealtimeChannel::endpoint`]
    pub url: String,
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
}

#[derive(Debug)]
enum ChannelCommand {
    Join(Table),
    Leave(Table),
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

pub struct RealtimeChannel {
    commands: UnboundedSender<ChannelCommand>,
    task: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Websocket endpoint for a backend base URL: `https` becomes `wss`,
    /// `http` becomes `ws`
    pub fn endpoint(backend_url: &str, key: &str) -> Result<String, BackendError> {
        let mut url = url::Url::parse(backend_url)
            .map_err(|e| BackendError::new(format!("Invalid backend URL: {e}")))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(BackendError::new(format!(
                    "Unsupported backend URL scheme {other:?}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| BackendError::new("Cannot derive realtime URL"))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", key)
            .append_pair("vsn", "1.0.0");
        Ok(url.to_string())
    }

    /// Starts the connection task. Must be called inside a tokio runtime.
    pub fn spawn(settings: RealtimeSettings, feed: Arc<ChangeFeed>) -> Self {
        let (commands, rx) = unbounded_channel();
        let task = tokio::spawn(run(settings, feed, rx));
        Self { commands, task }
    }

    pub fn join(&self, table: Table) {
        if self.commands.send(ChannelCommand::Join(table)).is_err() {
            warn!(%table, "Realtime task is gone, join dropped");
        }
    }

    pub fn leave(&self, table: Table) {
        let _ = self.commands.send(ChannelCommand::Leave(table));
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(ChannelCommand::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[instrument(skip_all)]
async fn run(
    settings: RealtimeSettings,
    feed: Arc<ChangeFeed>,
    mut commands: UnboundedReceiver<ChannelCommand>,
) {
    let mut joined: HashSet<Table> = HashSet::new();
    let mut refs: u64 = 0;
    let mut connected_before = false;

    loop {
        match connect_async(settings.url.as_str()).await {
            Ok((ws, _)) => {
                info!("Realtime connection established");
                let (mut ws_tx, mut ws_rx) = ws.split();

                let mut rejoined = true;
                for table in &joined {
                    refs += 1;
                    if !send_frame(&mut ws_tx, &PhoenixMessage::join(*table, refs.to_string())).await {
                        rejoined = false;
                        break;
                    }
                }

                if rejoined {
                    if connected_before {
                        for table in &joined {
                            feed.publish(ChangeEvent::resync(*table));
                        }
                    }
                    connected_before = true;

                    let end = session(
                        &settings,
                        &feed,
                        &mut ws_tx,
                        &mut ws_rx,
                        &mut commands,
                        &mut joined,
                        &mut refs,
                    )
                    .await;
                    if let SessionEnd::Shutdown = end {
                        let _ = ws_tx.close().await;
                        info!("Realtime connection closed");
                        return;
                    }
                }
                warn!("Realtime connection lost");
            }
            Err(e) => {
                warn!(error = %e, "Realtime connection failed");
            }
        }

        // keep bookkeeping joins and leaves while waiting to reconnect
        let delay = sleep(settings.reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                command = commands.recv() => match command {
                    Some(ChannelCommand::Join(table)) => { joined.insert(table); }
                    Some(ChannelCommand::Leave(table)) => { joined.remove(&table); }
                    Some(ChannelCommand::Shutdown) | None => {
                        info!("Realtime task stopped while disconnected");
                        return;
                    }
                }
            }
        }
        debug!(delay_ms = settings.reconnect_delay.as_millis() as u64, "Reconnecting");
    }
}

async fn session<S, R>(
    settings: &RealtimeSettings,
    feed: &ChangeFeed,
    ws_tx: &mut S,
    ws_rx: &mut R,
    commands: &mut UnboundedReceiver<ChannelCommand>,
    joined: &mut HashSet<Table>,
    refs: &mut u64,
) -> SessionEnd
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let mut heartbeat = interval(settings.heartbeat_interval);
    heartbeat.tick().await; // first tick is immediate

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChannelCommand::Join(table)) => {
                    if joined.insert(table) {
                        *refs += 1;
                        info!(%table, "Joining realtime topic");
                        if !send_frame(ws_tx, &PhoenixMessage::join(table, refs.to_string())).await {
                            return SessionEnd::Disconnected;
                        }
                    }
                }
                Some(ChannelCommand::Leave(table)) => {
                    if joined.remove(&table) {
                        *refs += 1;
                        info!(%table, "Leaving realtime topic");
                        if !send_frame(ws_tx, &PhoenixMessage::leave(table, refs.to_string())).await {
                            return SessionEnd::Disconnected;
                        }
                    }
                }
                Some(ChannelCommand::Shutdown) | None => return SessionEnd::Shutdown,
            },

            _ = heartbeat.tick() => {
                *refs += 1;
                if !send_frame(ws_tx, &PhoenixMessage::heartbeat(refs.to_string())).await {
                    return SessionEnd::Disconnected;
                }
                trace!("Heartbeat sent");
            }

            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => handle_frame(text.as_str(), feed),
                Some(Ok(Message::Close(_))) | None => {
                    info!("Realtime server closed the connection");
                    return SessionEnd::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Realtime receive error");
                    return SessionEnd::Disconnected;
                }
            }
        }
    }
}

fn handle_frame(text: &str, feed: &ChangeFeed) {
    let frame = match serde_json::from_str::<PhoenixMessage>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Unreadable realtime frame");
            return;
        }
    };

    match frame.event.as_str() {
        EVENT_POSTGRES_CHANGES => match frame.change_event() {
            Some(event) => {
                debug!(table = %event.table, kind = ?event.kind, "Real-time update received");
                feed.publish(event);
            }
            None => warn!(topic = %frame.topic, "Malformed postgres_changes payload"),
        },
        EVENT_REPLY => {
            let status = frame
                .payload
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("unknown");
            if status == "ok" {
                trace!(topic = %frame.topic, "Realtime reply ok");
            } else {
                error!(topic = %frame.topic, status, payload = %frame.payload, "Realtime request rejected");
            }
        }
        other => debug!(topic = %frame.topic, event = other, "Realtime frame ignored"),
    }
}

/// Sends one frame, false when the connection is unusable
async fn send_frame<S>(ws_tx: &mut S, frame: &PhoenixMessage) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to serialize realtime frame");
            return true;
        }
    };
    match ws_tx.send(Message::Text(json.into())).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, event = %frame.event, "Failed to send realtime frame");
            false
        }
    }
}
