//! Discovered device model.
//!
//! A [`Device`] is rebuilt from every discovery snapshot. Decoding is
//! lenient: a field of the wrong JSON type reads as absent instead of
//! rejecting the record, and the connection flags accept three spellings
//! each (`isConnected` | `connected` | `is_connected`, `isPaired` | `paired`
//! | `is_paired`). The first alias holding a boolean wins.
//!
//! Only `id` is mandatory; a record without a string `id` fails to decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One device as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DeviceRecord")]
pub struct Device {
    /// Transport identifier, primary key.
    pub id: String,
    /// Advertised name.
    pub name: Option<String>,
    /// Position tag, e.g. `GloveL` / `GloveR`.
    pub position: Option<String>,
    /// Link is up.
    #[serde(rename = "isConnected")]
    pub connected: Option<bool>,
    /// Device is bonded.
    #[serde(rename = "isPaired")]
    pub paired: Option<bool>,
    /// Transport address, if reported.
    pub address: Option<String>,
}

impl Device {
    /// Create a device with only an identifier set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            position: None,
            connected: None,
            paired: None,
            address: None,
        }
    }

    /// Builder-style position setter.
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Builder-style name setter.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Position tag, empty when unknown.
    pub fn position_tag(&self) -> &str {
        self.position.as_deref().unwrap_or("")
    }

    /// True for haptic gloves.
    pub fn is_glove(&self) -> bool {
        let name = self.name.as_deref().unwrap_or("").to_lowercase();
        let position = self.position_tag().to_lowercase();
        position.contains("glove") || name.contains("tactglove")
    }

    /// Human label derived from the position tag.
    pub fn pretty_name(&self) -> &str {
        let position = self.position_tag().to_lowercase();
        if position.contains("glovel") {
            "Glove Left"
        } else if position.contains("glover") {
            "Glove Right"
        } else {
            self.display_name()
        }
    }

    /// Connected as far as anyone knows.
    pub fn is_connected(&self) -> bool {
        self.connected == Some(true)
    }

    /// Paired as far as anyone knows.
    pub fn is_paired(&self) -> bool {
        self.paired == Some(true)
    }
}

/// Raw wire shape; every optional field is taken as an untyped value so a
/// type mismatch degrades to `None` for that field only.
#[derive(Deserialize)]
struct DeviceRecord {
    id: String,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    position: Option<Value>,
    #[serde(default)]
    address: Option<Value>,
    #[serde(default, rename = "isConnected")]
    is_connected_camel: Option<Value>,
    #[serde(default)]
    connected: Option<Value>,
    #[serde(default)]
    is_connected: Option<Value>,
    #[serde(default, rename = "isPaired")]
    is_paired_camel: Option<Value>,
    #[serde(default)]
    paired: Option<Value>,
    #[serde(default)]
    is_paired: Option<Value>,
}

fn as_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn first_bool(candidates: [&Option<Value>; 3]) -> Option<bool> {
    candidates
        .into_iter()
        .find_map(|v| v.as_ref().and_then(Value::as_bool))
}

impl From<DeviceRecord> for Device {
    fn from(raw: DeviceRecord) -> Self {
        let connected = first_bool([&raw.is_connected_camel, &raw.connected, &raw.is_connected]);
        let paired = first_bool([&raw.is_paired_camel, &raw.paired, &raw.is_paired]);
        Self {
            id: raw.id,
            name: as_string(raw.name),
            position: as_string(raw.position),
            connected,
            paired,
            address: as_string(raw.address),
        }
    }
}
