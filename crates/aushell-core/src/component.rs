use std::fmt;
use std::str::FromStr;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Four-character code used by audio units to identify component types,
/// subtypes and manufacturers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCc(*code)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Whether every byte renders as itself in [`fmt::Display`].
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|&byte| byte.is_ascii_graphic() || byte == b' ')
    }

    /// Filesystem-safe rendering: anything other than ASCII alphanumerics
    /// becomes `_`.
    pub fn path_segment(&self) -> String {
        self.0
            .iter()
            .map(|&byte| {
                if byte.is_ascii_alphanumeric() {
                    byte as char
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{self}'")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFourCc(pub String);

impl fmt::Display for InvalidFourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a four-character code", self.0)
    }
}

impl std::error::Error for InvalidFourCc {}

impl FromStr for FourCc {
    type Err = InvalidFourCc;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| InvalidFourCc(s.to_string()))?;
        if !bytes.iter().all(|byte| byte.is_ascii() && !byte.is_ascii_control()) {
            return Err(InvalidFourCc(s.to_string()));
        }
        Ok(FourCc(bytes))
    }
}

/// Printable codes serialize as text, anything else as the big-endian `u32`
/// value so every code survives a round trip.
impl Serialize for FourCc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_printable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u32(u32::from_be_bytes(self.0))
        }
    }
}

impl<'de> Deserialize<'de> for FourCc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FourCcVisitor)
    }
}

struct FourCcVisitor;

impl<'de> Visitor<'de> for FourCcVisitor {
    type Value = FourCc;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a four-character string or a 32-bit code")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<FourCc, E> {
        value.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<FourCc, E> {
        u32::try_from(value)
            .map(FourCc::from)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<FourCc, E> {
        u32::try_from(value)
            .map(FourCc::from)
            .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))
    }
}

impl From<u32> for FourCc {
    fn from(code: u32) -> Self {
        FourCc(code.to_be_bytes())
    }
}

/// Identity of a plugin family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentDescription {
    #[serde(rename = "type")]
    pub kind: FourCc,
    pub subtype: FourCc,
    pub manufacturer: FourCc,
}

impl ComponentDescription {
    pub fn new(kind: FourCc, subtype: FourCc, manufacturer: FourCc) -> Self {
        Self {
            kind,
            subtype,
            manufacturer,
        }
    }

    /// Directory name used for presets belonging to this component.
    pub fn directory_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.kind.path_segment(),
            self.subtype.path_segment(),
            self.manufacturer.path_segment()
        )
    }
}

impl fmt::Display for ComponentDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.subtype, self.manufacturer)
    }
}

/// Audio stream format reported by a plugin's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channels: u32,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            channels: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fourcc_parses_and_displays() {
        let code: FourCc = "aufx".parse().unwrap();
        assert_eq!(code, FourCc::new(b"aufx"));
        assert_eq!(code.to_string(), "aufx");
        assert!("toolong".parse::<FourCc>().is_err());
        assert!("abc".parse::<FourCc>().is_err());
    }

    #[test]
    fn directory_name_replaces_unsafe_bytes() {
        let desc = ComponentDescription::new(
            FourCc::new(b"aufx"),
            FourCc::new(b"dl/y"),
            FourCc::new(b"Ac e"),
        );
        assert_eq!(desc.directory_name(), "aufx-dl_y-Ac_e");
    }

    #[test]
    fn component_serializes_codes_as_strings() {
        let desc = ComponentDescription::new(
            FourCc::new(b"aufx"),
            FourCc::new(b"dely"),
            FourCc::new(b"appl"),
        );
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(
            json,
            r#"{"type":"aufx","subtype":"dely","manufacturer":"appl"}"#
        );
        let back: ComponentDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn non_printable_codes_serialize_as_numbers() {
        let desc = ComponentDescription::new(
            FourCc::new(b"aufx"),
            FourCc::new(b"dely"),
            FourCc::new(&[0xa9, b'A', b'c', b'm']),
        );
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(
            json,
            r#"{"type":"aufx","subtype":"dely","manufacturer":2839634797}"#
        );
        let back: ComponentDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
        assert_eq!(desc.directory_name(), "aufx-dely-_Acm");
    }

    #[test]
    fn out_of_range_numeric_code_is_rejected() {
        assert!(serde_json::from_str::<FourCc>("4294967296").is_err());
        assert!(serde_json::from_str::<FourCc>("-1").is_err());
        assert_eq!(
            serde_json::from_str::<FourCc>("1635083896").unwrap(),
            FourCc::new(b"aufx")
        );
    }
}
