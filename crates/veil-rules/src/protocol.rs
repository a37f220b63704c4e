//! Control messages exchanged between the popup, the content script and the
//! background coordinator.
//!
//! Every request is `{type, payload?}` and every reply is
//! `{success, data?, error?}`. The tags are shared with independently deployed
//! scripts and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    StartPicker,
    StopPicker,
    ElementSelected,
    SaveBlockElement,
    DeleteBlockElement,
    GetBlockElements,
    SavePreset,
    DeletePreset,
    TogglePreset,
    GetPresets,
    ApplyRules,
    GetCurrentState,
    /// Broadcast: the rule collections changed
    StateUpdated,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartPicker => "START_PICKER",
            Self::StopPicker => "STOP_PICKER",
            Self::ElementSelected => "ELEMENT_SELECTED",
            Self::SaveBlockElement => "SAVE_BLOCK_ELEMENT",
            Self::DeleteBlockElement => "DELETE_BLOCK_ELEMENT",
            Self::GetBlockElements => "GET_BLOCK_ELEMENTS",
            Self::SavePreset => "SAVE_PRESET",
            Self::DeletePreset => "DELETE_PRESET",
            Self::TogglePreset => "TOGGLE_PRESET",
            Self::GetPresets => "GET_PRESETS",
            Self::ApplyRules => "APPLY_RULES",
            Self::GetCurrentState => "GET_CURRENT_STATE",
            Self::StateUpdated => "STATE_UPDATED",
        }
    }
}

/// A request or broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Self { kind, payload: None }
    }

    pub fn with_payload(kind: MessageType, payload: Value) -> Self {
        Self {
            kind,
            payload: Some(payload),
        }
    }

    /// Decode a raw message. Unknown tags are `None` so the caller can answer
    /// with "Unknown message type".
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn payload(&self) -> &Value {
        self.payload.as_ref().unwrap_or(&Value::Null)
    }

    /// The `id` field of the payload, if any.
    pub fn payload_id(&self) -> Option<&str> {
        self.payload().get("id").and_then(Value::as_str)
    }
}

/// Reply to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self::error(e.to_string()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn unknown_type() -> Self {
        Self::error("Unknown message type")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
