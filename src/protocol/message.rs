use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::config::{Configuration, ResizeRate};

/// Per-invocation identifier stamped on every message a frame sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(String);

impl ProtocolId {
    pub fn generate() -> Self {
        Self(format!("_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProtocolId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Messages the embedded content posts to its host.
///
/// A payload carrying a numeric `height` is a resize report even when it
/// also names an action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FrameMessage {
    Resize {
        height: f64,
        id: String,
    },
    Action {
        action: String,
        #[serde(default)]
        code: String,
        id: String,
    },
}

impl FrameMessage {
    pub fn parse(data: &JsonValue) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    pub fn id(&self) -> &str {
        match self {
            FrameMessage::Resize { id, .. } | FrameMessage::Action { id, .. } => id,
        }
    }

    pub fn to_value(&self) -> JsonValue {
        match self {
            FrameMessage::Resize { height, id } => json!({ "height": height, "id": id }),
            FrameMessage::Action { action, code, id } => {
                json!({ "code": code, "action": action, "id": id })
            }
        }
    }
}

/// The host's answer to an action message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReply {
    pub action: String,
    pub success: bool,
}

impl ActionReply {
    pub fn parse(data: &JsonValue) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    pub fn to_value(&self) -> JsonValue {
        json!({ "action": self.action, "success": self.success })
    }
}

/// Element id of the JSON manifest inside a frame document.
pub const MANIFEST_ELEMENT_ID: &str = "prismize-frame";

/// What the embedded runtime needs to know about its own frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameManifest {
    pub id: ProtocolId,
    pub resize_rate: Option<u64>,
    pub max_height: Option<f64>,
}

impl FrameManifest {
    pub fn from_config(id: &ProtocolId, config: &Configuration) -> Self {
        Self {
            id: id.clone(),
            resize_rate: config.resize_rate.as_millis(),
            max_height: config.max_height,
        }
    }

    pub fn resize_rate(&self) -> ResizeRate {
        match self.resize_rate {
            Some(ms) => ResizeRate::from_millis(Some(ms as f64)),
            None => ResizeRate::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = ProtocolId::generate();
        let b = ProtocolId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with('_'));
        assert_eq!(a.as_str().len(), 33);
    }

    #[test]
    fn parses_resize_reports() {
        let message = FrameMessage::parse(&json!({"height": 120.5, "id": "_a"})).unwrap();
        assert_eq!(
            message,
            FrameMessage::Resize {
                height: 120.5,
                id: "_a".into()
            }
        );
    }

    #[test]
    fn action_code_defaults_to_empty() {
        let message = FrameMessage::parse(&json!({"action": "copy", "id": "_a"})).unwrap();
        assert_eq!(
            message,
            FrameMessage::Action {
                action: "copy".into(),
                code: String::new(),
                id: "_a".into()
            }
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(FrameMessage::parse(&json!({"height": "12", "id": "_a"})).is_none());
        assert!(FrameMessage::parse(&json!({"action": "copy"})).is_none());
        assert!(FrameMessage::parse(&json!("resize")).is_none());
        assert!(ActionReply::parse(&json!({"action": "copy", "success": "yes"})).is_none());
    }

    #[test]
    fn height_wins_over_action() {
        let message =
            FrameMessage::parse(&json!({"height": 5, "action": "copy", "id": "_a"})).unwrap();
        assert!(matches!(message, FrameMessage::Resize { .. }));
    }

    #[test]
    fn messages_serialize_to_wire_shape() {
        let message = FrameMessage::Action {
            action: "download".into(),
            code: "x".into(),
            id: "_a".into(),
        };
        assert_eq!(
            message.to_value(),
            json!({"code": "x", "action": "download", "id": "_a"})
        );
        let reply = ActionReply {
            action: "copy".into(),
            success: false,
        };
        assert_eq!(ActionReply::parse(&reply.to_value()), Some(reply));
    }

    #[test]
    fn manifest_uses_camel_case_and_null_rate() {
        let manifest = FrameManifest {
            id: ProtocolId::from("_a"),
            resize_rate: None,
            max_height: Some(200.0),
        };
        assert_eq!(
            serde_json::to_value(&manifest).unwrap(),
            json!({"id": "_a", "resizeRate": null, "maxHeight": 200.0})
        );
        assert_eq!(manifest.resize_rate(), ResizeRate::Disabled);
    }
}
