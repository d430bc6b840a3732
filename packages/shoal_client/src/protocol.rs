//! Wire Protocol Types
//!
//! JSON text frames over the relay socket. Two protocol families share the
//! connection, told apart by their discriminant field: chat and presence
//! frames carry `type`, the skin-sync protocol carries `t: "skin"`.
//! Unrecognized fields and unknown skin ops are ignored, never rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision stamped on outbound skin frames.
pub const SKIN_VERSION: u8 = 1;

/// Chat-family frames sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// Chat post, broadcast by the relay as a `msg` frame.
    Say { text: String },
    /// Identity update, applied silently by the relay (no echo expected).
    Rename { name: String },
}

/// Outbound skin-record announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkinAnnounce {
    pub t: &'static str,
    pub op: &'static str,
    pub h: String,
    pub s1: String,
    pub s2: String,
    pub ver: u8,
}

impl SkinAnnounce {
    /// Single-record upsert request for the identity keyed by `h`.
    pub fn update(h: String, s1: &str, s2: &str) -> Self {
        Self {
            t: "skin",
            op: "update",
            h,
            s1: s1.to_string(),
            s2: s2.to_string(),
            ver: SKIN_VERSION,
        }
    }
}

/// One `[h, s1, s2]` row of a bulk frame. Rows are positional on the wire;
/// missing or non-string positions deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinRow {
    pub h: Option<String>,
    pub s1: Option<String>,
    pub s2: Option<String>,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Broadcast chat line.
    Chat { from: String, text: String },
    /// Single skin-record upsert.
    SkinUpdate {
        h: String,
        s1: Option<String>,
        s2: Option<String>,
    },
    /// Batch skin upsert.
    SkinBulk { rows: Vec<SkinRow> },
}

/// Classify one raw text frame.
///
/// Returns `None` for malformed JSON and for frames matching neither
/// discriminant; both are dropped silently by the dispatcher. Classification
/// is by discriminant only: a chat-shaped body under an unknown discriminant
/// does not dispatch as chat.
pub fn classify(raw: &str) -> Option<Inbound> {
    let value: Value = serde_json::from_str(raw).ok()?;
    if value.get("t").and_then(Value::as_str) == Some("skin") {
        return classify_skin(&value);
    }
    if value.get("type").and_then(Value::as_str) == Some("msg") {
        return Some(Inbound::Chat {
            from: str_or_empty(&value, "from"),
            // A missing text field is an empty chat line, not an error.
            text: str_or_empty(&value, "text"),
        });
    }
    None
}

fn classify_skin(value: &Value) -> Option<Inbound> {
    match value.get("op").and_then(Value::as_str) {
        Some("update") => Some(Inbound::SkinUpdate {
            h: str_or_empty(value, "h"),
            s1: opt_str(value, "s1"),
            s2: opt_str(value, "s2"),
        }),
        Some("bulk") => {
            let rows = value
                .get("data")
                .and_then(Value::as_array)
                .map(|data| data.iter().map(skin_row).collect())
                .unwrap_or_default();
            Some(Inbound::SkinBulk { rows })
        }
        // Unknown ops belong to future protocol revisions.
        _ => None,
    }
}

fn skin_row(row: &Value) -> SkinRow {
    SkinRow {
        h: row.get(0).and_then(Value::as_str).map(str::to_string),
        s1: row.get(1).and_then(Value::as_str).map(str::to_string),
        s2: row.get(2).and_then(Value::as_str).map(str::to_string),
    }
}

fn str_or_empty(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn say_wire_shape() {
        let frame = Outbound::Say {
            text: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "say", "text": "hello"})
        );
    }

    #[test]
    fn rename_wire_shape() {
        let frame = Outbound::Rename {
            name: "bob".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "rename", "name": "bob"})
        );
    }

    #[test]
    fn skin_announce_wire_shape() {
        let frame = SkinAnnounce::update("abc123".to_string(), "ref-1", "ref-2");
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "t": "skin",
                "op": "update",
                "h": "abc123",
                "s1": "ref-1",
                "s2": "ref-2",
                "ver": 1
            })
        );
    }

    #[test]
    fn classify_chat_broadcast() {
        let frame = classify(r#"{"type":"msg","from":"alice","text":"hi"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Chat {
                from: "alice".to_string(),
                text: "hi".to_string()
            }
        );
    }

    #[test]
    fn classify_chat_without_text() {
        let frame = classify(r#"{"type":"msg","from":"alice"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Chat {
                from: "alice".to_string(),
                text: String::new()
            }
        );
    }

    #[test]
    fn classify_skin_update() {
        let frame = classify(r#"{"t":"skin","op":"update","h":"h1","s1":"a"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::SkinUpdate {
                h: "h1".to_string(),
                s1: Some("a".to_string()),
                s2: None
            }
        );
    }

    #[test]
    fn classify_skin_bulk_with_ragged_rows() {
        let frame =
            classify(r#"{"t":"skin","op":"bulk","data":[["h1","a","b"],["h2"],42]}"#).unwrap();
        let Inbound::SkinBulk { rows } = frame else {
            panic!("expected bulk");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].h.as_deref(), Some("h1"));
        assert_eq!(rows[0].s2.as_deref(), Some("b"));
        assert_eq!(rows[1].h.as_deref(), Some("h2"));
        assert_eq!(rows[1].s1, None);
        assert_eq!(rows[2].h, None);
    }

    #[test]
    fn unknown_skin_op_classifies_as_nothing() {
        assert_eq!(classify(r#"{"t":"skin","op":"purge","h":"h1"}"#), None);
    }

    #[test]
    fn skin_discriminant_wins_over_chat_shape() {
        // Carries both discriminants; the skin family claims the frame.
        let frame =
            classify(r#"{"t":"skin","op":"update","h":"h1","type":"msg","from":"x"}"#).unwrap();
        assert!(matches!(frame, Inbound::SkinUpdate { .. }));
    }

    #[test]
    fn chat_shape_under_unknown_discriminant_is_nothing() {
        assert_eq!(classify(r#"{"type":"announce","from":"x","text":"y"}"#), None);
        assert_eq!(classify(r#"{"kind":"msg","from":"x","text":"y"}"#), None);
    }

    #[test]
    fn malformed_json_classifies_as_nothing() {
        assert_eq!(classify("{oops"), None);
        assert_eq!(classify(""), None);
    }
}
