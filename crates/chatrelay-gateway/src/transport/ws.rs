//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS (refused while draining)
//! - Bridge the socket into a `ClientSession`: inbound half as `WsStream`,
//!   outbound half as a `ChannelSink` drained by a writer task
//! - Lifecycle: ping interval, idle timeout, error frame on protocol errors

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use chatrelay_core::error::{RelayError, Result};
use chatrelay_core::ChatMessage;

use crate::app_state::AppState;
use crate::realtime::{ClientSession, CloseReason, MessageStream};
use crate::transport::codec::{self, Inbound};
use crate::transport::sink::ChannelSink;

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if app.metrics().is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }
    app.metrics().ws_upgrades.inc(&[]);

    // hard cap above the codec limit so oversize frames still get an error frame
    let max_message_size = app.cfg().gateway.max_frame_bytes.saturating_mul(4);
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| run_connection(app, socket))
}

// --------------------
// Inbound half
// --------------------

/// Reads chat messages off the socket, answering pings on the way.
pub struct WsStream {
    rx: SplitStream<WebSocket>,
    control: mpsc::Sender<Message>,
    max_frame_bytes: usize,
    idle_timeout: Duration,
}

impl WsStream {
    pub fn new(
        rx: SplitStream<WebSocket>,
        control: mpsc::Sender<Message>,
        max_frame_bytes: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            control,
            max_frame_bytes,
            idle_timeout,
        }
    }
}

#[async_trait]
impl MessageStream for WsStream {
    async fn recv(&mut self) -> Result<Option<ChatMessage>> {
        loop {
            let next = tokio::time::timeout(self.idle_timeout, self.rx.next())
                .await
                .map_err(|_| RelayError::Transport("idle timeout".into()))?;

            let Some(frame) = next else { return Ok(None) };
            let frame = frame.map_err(|e| RelayError::Transport(e.to_string()))?;

            match codec::decode(frame, self.max_frame_bytes)? {
                Inbound::Chat(msg) => return Ok(Some(msg)),
                Inbound::Ping(payload) => {
                    if let Err(e) = self.control.try_send(Message::Pong(payload)) {
                        tracing::debug!(error = %e, "pong dropped");
                    }
                }
                Inbound::Pong => {}
                Inbound::Close => return Ok(None),
            }
        }
    }
}

// --------------------
// Outbound half
// --------------------

/// Writes one frame unless the connection is torn down first.
///
/// A peer that stops reading leaves the socket send pending forever, so
/// every write races the connection token.
async fn write_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    m: Message,
    closed: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        res = ws_tx.send(m) => match res {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "socket write failed");
                false
            }
        },
        _ = closed.cancelled() => false,
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<Message>,
    closed: CancellationToken,
    ping_every: Duration,
    close_grace: Duration,
) {
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => break,
            maybe_out = out_rx.recv() => match maybe_out {
                Some(m) => m,
                None => break,
            },
            _ = ping_tick.tick() => Message::Ping(Vec::new()),
        };
        if !write_frame(&mut ws_tx, next, &closed).await {
            if closed.is_cancelled() {
                break;
            }
            closed.cancel();
            return;
        }
    }

    // flush whatever was queued before the close, bounded for peers that stopped reading
    let flush = async {
        while let Ok(m) = out_rx.try_recv() {
            if ws_tx.send(m).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    };
    if tokio::time::timeout(close_grace, flush).await.is_err() {
        tracing::debug!("close flush timed out");
    }
}

// --------------------
// Connection
// --------------------
async fn run_connection(app: AppState, socket: WebSocket) {
    let gw = &app.cfg().gateway;
    let relay_cfg = &app.cfg().relay;
    let send_timeout = relay_cfg.send_timeout();

    let closed = app.shutdown_token().child_token();
    let (out_tx, out_rx) = mpsc::channel::<Message>(relay_cfg.outbound_buffer);
    let sink = Arc::new(ChannelSink::new(out_tx.clone(), send_timeout, closed.clone()));

    let session = match ClientSession::connect(app.relay(), sink) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "session registration failed");
            return;
        }
    };

    let span = tracing::info_span!("session", id = %session.id());
    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(
        write_loop(ws_tx, out_rx, closed.clone(), gw.ping_interval(), send_timeout)
            .instrument(span.clone()),
    );

    let stream = WsStream::new(ws_rx, out_tx.clone(), gw.max_frame_bytes, gw.idle_timeout());
    let report = session.run(stream, closed.clone()).instrument(span).await;

    if let CloseReason::Failed(e) = &report.reason {
        if let Ok(frame) = codec::error_frame(e) {
            match tokio::time::timeout(send_timeout, out_tx.send(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::debug!(session = %report.id, "error frame dropped, writer gone"),
                Err(_) => {
                    tracing::debug!(session = %report.id, "error frame dropped, outbound buffer full")
                }
            }
        }
    }
    drop(out_tx);

    closed.cancel();
    // the writer bounds its own flush; abort drops the socket if it still hangs
    if tokio::time::timeout(send_timeout * 2, &mut writer).await.is_err() {
        tracing::debug!(session = %report.id, "writer did not finish, aborting");
        writer.abort();
    }
}
