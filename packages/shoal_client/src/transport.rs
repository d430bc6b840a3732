//! Relay Transport
//!
//! Owns the single WebSocket connection to the relay and its lifecycle:
//! CLOSED → CONNECTING → OPEN → CLOSED, with capped-exponential reconnect
//! backoff after unexpected closure and a terminal kill switch.
//!
//! Delivery is strictly best-effort. [`Transport::send`] drops frames
//! silently unless the connection is open and nothing is queued across
//! reconnects; callers that need at-least-once semantics must layer their
//! own outbox on top.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Outbound frames waiting on the writer; sends beyond this are dropped.
const OUTBOUND_BUFFER: usize = 64;

/// Inbound frames waiting on the dispatcher.
const INBOUND_BUFFER: usize = 256;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Closed,
    Connecting,
    Open,
}

/// Handle to the connection task. Cheap to clone; every clone drives the same
/// underlying socket.
#[derive(Clone)]
pub struct Transport {
    out_tx: mpsc::Sender<String>,
    state_rx: watch::Receiver<ConnState>,
    cancel: CancellationToken,
}

impl Transport {
    /// Spawn the connection task against `url`. Inbound text frames arrive on
    /// the returned receiver in arrival order.
    pub fn spawn(url: String, cancel: CancellationToken) -> (Self, mpsc::Receiver<String>) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnState::Closed);
        tokio::spawn(run(url, out_rx, in_tx, state_tx, cancel.clone()));
        (
            Self {
                out_tx,
                state_rx,
                cancel,
            },
            in_rx,
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    /// Serialize `frame` and write it if the connection is open, otherwise
    /// drop it silently. At-most-once: no queueing, no retry, no error
    /// surfaced to the caller.
    pub fn send<T: Serialize>(&self, frame: &T) {
        if self.state() != ConnState::Open {
            debug!("outbound frame dropped, connection not open");
            return;
        }
        match serde_json::to_string(frame) {
            Ok(text) => {
                if self.out_tx.try_send(text).is_err() {
                    debug!("outbound frame dropped, writer backlogged");
                }
            }
            Err(err) => warn!(%err, "outbound frame failed to serialize"),
        }
    }

    /// Terminal shutdown. The socket is closed and never re-established.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn run(
    url: String,
    mut out_rx: mpsc::Receiver<String>,
    in_tx: mpsc::Sender<String>,
    state_tx: watch::Sender<ConnState>,
    cancel: CancellationToken,
) {
    let mut retry: u32 = 0;
    'reconnect: loop {
        if cancel.is_cancelled() {
            break;
        }
        let _ = state_tx.send(ConnState::Connecting);
        let connected = tokio::select! {
            _ = cancel.cancelled() => break 'reconnect,
            c = connect_async(url.as_str()) => c,
        };
        let ws = match connected {
            Ok((ws, _)) => ws,
            Err(err) => {
                debug!(%err, "relay connect failed");
                let _ = state_tx.send(ConnState::Closed);
                if !backoff(&mut retry, &cancel).await {
                    break 'reconnect;
                }
                continue;
            }
        };
        info!(%url, "relay connected");
        retry = 0;
        // Anything submitted while we were down is stale; shed it before
        // going open.
        while out_rx.try_recv().is_ok() {}
        let _ = state_tx.send(ConnState::Open);

        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break 'reconnect;
                }
                frame = out_rx.recv() => match frame {
                    Some(text) => {
                        if let Err(err) = sink.send(Message::Text(text.into())).await {
                            debug!(%err, "relay write failed");
                            break;
                        }
                    }
                    // Every handle is gone; nothing left to drive.
                    None => break 'reconnect,
                },
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(text.as_str().to_owned()).await.is_err() {
                            break 'reconnect;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(%err, "relay read failed");
                        break;
                    }
                    None => {
                        info!("relay closed the connection");
                        break;
                    }
                },
            }
        }
        let _ = state_tx.send(ConnState::Closed);
        if !backoff(&mut retry, &cancel).await {
            break;
        }
    }
    let _ = state_tx.send(ConnState::Closed);
}

/// Sleep out the next capped-exponential backoff interval with full jitter.
/// Returns `false` when shutdown was requested during the wait.
async fn backoff(retry: &mut u32, cancel: &CancellationToken) -> bool {
    let cap = BACKOFF_CAP_MS.min(BACKOFF_BASE_MS << (*retry).min(6));
    let delay = {
        use rand::Rng;
        rand::rng().random_range(BACKOFF_BASE_MS..=cap.max(BACKOFF_BASE_MS))
    };
    *retry = retry.saturating_add(1);
    debug!(attempt = *retry, delay_ms = delay, "reconnect backoff");
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_millis(delay)) => true,
    }
}
