//! Inbound Frame Dispatcher
//!
//! Routes each frame to exactly one handler, chosen by discriminant: skin
//! frames mutate the registry, chat broadcasts go to the render sink, and
//! everything else is dropped without side effects.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::protocol::{Inbound, classify};
use crate::registry::SkinRegistry;

/// External log renderer. `is_self` marks lines from the local identity so
/// the frontend can highlight them.
pub trait RenderSink: Send + Sync {
    fn append(&self, sender: &str, text: &str, is_self: bool);
}

pub(crate) struct Dispatcher {
    registry: Arc<RwLock<SkinRegistry>>,
    sink: Arc<dyn RenderSink>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<RwLock<SkinRegistry>>, sink: Arc<dyn RenderSink>) -> Self {
        Self { registry, sink }
    }

    /// Handle one raw text frame. Malformed or unrecognized input is
    /// discarded here; the connection itself is unaffected.
    pub(crate) async fn handle_frame(&self, raw: &str, local_name: &str) {
        let Some(frame) = classify(raw) else {
            debug!("ignoring unrecognized frame");
            return;
        };
        match frame {
            Inbound::Chat { from, text } => {
                let is_self = from == local_name;
                self.sink.append(&from, &text, is_self);
            }
            Inbound::SkinUpdate { h, s1, s2 } => {
                self.registry
                    .write()
                    .await
                    .upsert(&h, s1.as_deref(), s2.as_deref());
            }
            Inbound::SkinBulk { rows } => {
                // One write guard for the whole batch; rows are independent
                // and a bad row never aborts the rest.
                let mut registry = self.registry.write().await;
                for row in rows {
                    registry.upsert(
                        row.h.as_deref().unwrap_or(""),
                        row.s1.as_deref(),
                        row.s2.as_deref(),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AssetPrefetch;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestSink(Mutex<Vec<(String, String, bool)>>);

    impl RenderSink for TestSink {
        fn append(&self, sender: &str, text: &str, is_self: bool) {
            self.0
                .lock()
                .unwrap()
                .push((sender.to_string(), text.to_string(), is_self));
        }
    }

    struct TestPrefetch;

    impl AssetPrefetch for TestPrefetch {
        fn prefetch(&self, _reference: &str) {}
    }

    fn dispatcher() -> (Dispatcher, Arc<TestSink>, Arc<RwLock<SkinRegistry>>) {
        let registry = Arc::new(RwLock::new(SkinRegistry::new(Arc::new(TestPrefetch))));
        let sink = Arc::new(TestSink::default());
        (
            Dispatcher::new(registry.clone(), sink.clone()),
            sink,
            registry,
        )
    }

    #[tokio::test]
    async fn chat_reaches_the_sink_with_self_flag() {
        let (dispatcher, sink, _) = dispatcher();
        dispatcher
            .handle_frame(r#"{"type":"msg","from":"alice","text":"hi"}"#, "alice")
            .await;
        dispatcher
            .handle_frame(r#"{"type":"msg","from":"bob","text":"yo"}"#, "alice")
            .await;
        let lines = sink.0.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                ("alice".to_string(), "hi".to_string(), true),
                ("bob".to_string(), "yo".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn missing_text_renders_as_empty_line() {
        let (dispatcher, sink, _) = dispatcher();
        dispatcher
            .handle_frame(r#"{"type":"msg","from":"bob"}"#, "alice")
            .await;
        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![("bob".to_string(), String::new(), false)]
        );
    }

    #[tokio::test]
    async fn update_merges_into_the_registry() {
        let (dispatcher, _, registry) = dispatcher();
        dispatcher
            .handle_frame(r#"{"t":"skin","op":"update","h":"h1","s1":"a","s2":"b"}"#, "me")
            .await;
        dispatcher
            .handle_frame(r#"{"t":"skin","op":"update","h":"h1","s1":"","s2":"c"}"#, "me")
            .await;
        let registry = registry.read().await;
        let record = registry.get("h1").unwrap();
        assert_eq!(record.s1.as_deref(), Some("a"));
        assert_eq!(record.s2.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn bulk_rows_apply_independently() {
        let (dispatcher, _, registry) = dispatcher();
        dispatcher
            .handle_frame(
                r#"{"t":"skin","op":"bulk","data":[["h1","a",""],["","x","y"],["h2","","z"]]}"#,
                "me",
            )
            .await;
        let registry = registry.read().await;
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("h1").unwrap().s1.as_deref(), Some("a"));
        assert_eq!(registry.get("h2").unwrap().s2.as_deref(), Some("z"));
    }

    #[tokio::test]
    async fn unknown_skin_op_is_a_noop() {
        let (dispatcher, sink, registry) = dispatcher();
        dispatcher
            .handle_frame(r#"{"t":"skin","op":"purge","h":"h1"}"#, "me")
            .await;
        assert!(registry.read().await.is_empty());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_shaped_body_under_unknown_discriminant_is_ignored() {
        let (dispatcher, sink, registry) = dispatcher();
        dispatcher
            .handle_frame(r#"{"type":"announce","from":"x","text":"y"}"#, "x")
            .await;
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(registry.read().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_frame_has_no_side_effects() {
        let (dispatcher, sink, registry) = dispatcher();
        dispatcher.handle_frame("not json at all", "me").await;
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(registry.read().await.is_empty());
    }
}
