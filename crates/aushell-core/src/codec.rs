use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentDescription;
use crate::error::CodecError;
use crate::unit::AudioUnit;

/// Format tag written into every encoded state blob.
pub const PRESET_FORMAT: &str = "aushell.preset";
/// Current revision of the encoded layout.
pub const PRESET_FORMAT_VERSION: u32 = 1;

/// Encoded plugin state as persisted inside a preset.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StateBlob(Vec<u8>);

impl StateBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        StateBlob(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StateBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateBlob")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

impl From<Vec<u8>> for StateBlob {
    fn from(bytes: Vec<u8>) -> Self {
        StateBlob(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterScope {
    Global,
    Input,
    Output,
    Group,
}

/// Value of one automatable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub id: u32,
    pub scope: ParameterScope,
    pub element: u32,
    pub value: f32,
}

impl ParameterValue {
    pub fn global(id: u32, value: f32) -> Self {
        Self {
            id,
            scope: ParameterScope::Global,
            element: 0,
            value,
        }
    }
}

/// Decoded class-info: the plugin's complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Plugin-defined state revision.
    pub version: u32,
    pub component: ComponentDescription,
    /// Human-readable preset name.
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterValue>,
    /// Opaque vendor-specific data.
    #[serde(default, with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'a str,
    version: u32,
    class_info: &'a ClassInfo,
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    class_info: ClassInfo,
}

/// Converts plugin state to and from portable [`StateBlob`]s.
///
/// Encoding is deterministic, so a snapshot restored into an unchanged plugin
/// snapshots back to identical bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginStateCodec;

impl PluginStateCodec {
    pub fn new() -> Self {
        PluginStateCodec
    }

    /// Capture the plugin's full state.
    pub fn snapshot(&self, unit: &dyn AudioUnit) -> Result<StateBlob, CodecError> {
        let info = unit
            .class_info()
            .map_err(|err| CodecError::StateUnavailable(err.to_string()))?;
        let expected = unit.component();
        if info.component != expected {
            return Err(CodecError::StateUnavailable(format!(
                "plugin {expected} reported state for {}",
                info.component
            )));
        }
        if let Some(param) = info.parameters.iter().find(|p| !p.value.is_finite()) {
            return Err(CodecError::StateUnavailable(format!(
                "parameter {} has non-finite value {}",
                param.id, param.value
            )));
        }
        self.encode(&info)
    }

    /// Push a previously captured blob back into the plugin.
    ///
    /// The blob's identity is checked before anything reaches the plugin.
    pub fn restore(&self, unit: &dyn AudioUnit, blob: &StateBlob) -> Result<(), CodecError> {
        let info = self.decode(blob)?;
        let expected = unit.component();
        if info.component != expected {
            return Err(CodecError::IncompatibleState {
                expected,
                found: info.component,
            });
        }
        unit.set_class_info(&info).map_err(CodecError::PluginRejected)
    }

    pub fn encode(&self, info: &ClassInfo) -> Result<StateBlob, CodecError> {
        let envelope = EnvelopeRef {
            format: PRESET_FORMAT,
            version: PRESET_FORMAT_VERSION,
            class_info: info,
        };
        serde_json::to_vec_pretty(&envelope)
            .map(StateBlob)
            .map_err(|err| CodecError::MalformedBlob(err.to_string()))
    }

    pub fn decode(&self, blob: &StateBlob) -> Result<ClassInfo, CodecError> {
        let envelope: Envelope = serde_json::from_slice(blob.as_bytes())
            .map_err(|err| CodecError::MalformedBlob(err.to_string()))?;
        if envelope.format != PRESET_FORMAT {
            return Err(CodecError::MalformedBlob(format!(
                "unrecognised format tag '{}'",
                envelope.format
            )));
        }
        if envelope.version > PRESET_FORMAT_VERSION {
            return Err(CodecError::MalformedBlob(format!(
                "format version {} is newer than supported version {PRESET_FORMAT_VERSION}",
                envelope.version
            )));
        }
        Ok(envelope.class_info)
    }

    /// Re-stamp the human-readable name carried inside a blob.
    pub fn rename(&self, blob: &StateBlob, name: &str) -> Result<StateBlob, CodecError> {
        let mut info = self.decode(blob)?;
        if info.name == name {
            return Ok(blob.clone());
        }
        info.name = name.to_string();
        self.encode(&info)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}
