//! Client Handle and Event Loop
//!
//! One task owns all mutable state (skin registry, local name) and processes
//! transport frames and sync ticks strictly in arrival order, one at a time.
//! Each frame runs to completion before the next event, so registry updates
//! are atomic with respect to readers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, RenderSink};
use crate::identity::{IdentityResolver, clip_name, guest_name, name_hash};
use crate::protocol::{Outbound, SkinAnnounce};
use crate::registry::{AssetPrefetch, SkinRecord, SkinRegistry};
use crate::sync::rename_for_tick;
use crate::transport::{ConnState, Transport};

/// Connected client handle.
///
/// Sends are fire-and-forget throughout: while the relay is unreachable,
/// frames are dropped and the client keeps running. Chat degrades to
/// "temporarily unavailable", it never takes the host down.
pub struct ShoalClient {
    transport: Transport,
    registry: Arc<RwLock<SkinRegistry>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ShoalClient {
    /// Connect to the configured relay and spawn the event loop.
    ///
    /// The local name starts from the resolver, falling back to a random
    /// guest name when it yields nothing.
    pub fn connect(
        config: &ClientConfig,
        resolver: Arc<dyn IdentityResolver>,
        sink: Arc<dyn RenderSink>,
        prefetch: Arc<dyn AssetPrefetch>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (transport, in_rx) = Transport::spawn(config.endpoint(), cancel.clone());
        let registry = Arc::new(RwLock::new(SkinRegistry::new(prefetch)));

        let initial = {
            let resolved = clip_name(&resolver.resolve());
            if resolved.is_empty() {
                guest_name()
            } else {
                resolved
            }
        };
        info!(name = %initial, endpoint = %config.endpoint(), "joining");

        let task = tokio::spawn(event_loop(
            transport.clone(),
            in_rx,
            Dispatcher::new(registry.clone(), sink),
            resolver,
            initial,
            config.sync_interval(),
            cancel.clone(),
        ));

        Self {
            transport,
            registry,
            cancel,
            task,
        }
    }

    /// Post a chat line. Whitespace-only input is not sent.
    pub fn say(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.transport.send(&Outbound::Say {
            text: text.to_string(),
        });
    }

    /// Announce this client's own skin references, keyed by the hash of the
    /// normalized tag/nickname pair. Skipped silently when the connection is
    /// not open.
    pub fn announce_skin(&self, tag: &str, nick: &str, s1: &str, s2: &str) {
        if self.transport.state() != ConnState::Open {
            debug!("skin announce skipped, connection not open");
            return;
        }
        self.transport
            .send(&SkinAnnounce::update(name_hash(tag, nick), s1, s2));
    }

    /// Current connection lifecycle state.
    pub fn state(&self) -> ConnState {
        self.transport.state()
    }

    /// Shared skin registry, for render-side readers.
    pub fn registry(&self) -> Arc<RwLock<SkinRegistry>> {
        self.registry.clone()
    }

    /// Current record for `hash`, if any.
    pub async fn skin(&self, hash: &str) -> Option<SkinRecord> {
        self.registry.read().await.get(hash).cloned()
    }

    /// Terminal shutdown: closes the socket and stops the sync loop. The
    /// client never reconnects afterwards.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn event_loop(
    transport: Transport,
    mut in_rx: mpsc::Receiver<String>,
    dispatcher: Dispatcher,
    resolver: Arc<dyn IdentityResolver>,
    mut name: String,
    sync_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // An interval's first tick fires immediately; the name was resolved just
    // now, so swallow it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(next) = rename_for_tick(&resolver.resolve(), &name) {
                    debug!(from = %name, to = %next, "local identity changed");
                    name = next.clone();
                    transport.send(&Outbound::Rename { name: next });
                }
            }
            frame = in_rx.recv() => match frame {
                Some(raw) => dispatcher.handle_frame(&raw, &name).await,
                None => break,
            },
        }
    }
}
