//! Pluggable serialization for RPC messages.
//!
//! A [`Codec`] turns typed values into frame payloads and back. Codecs are
//! selected by content-type tag during the session handshake; both peers of a
//! session must resolve the same tag. JSON is the self-describing default,
//! bincode the compact binary variant.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::protocol::error::Result;

/// Serialization strategy for the messages of one session.
///
/// The enum doubles as the codec constructor registry: every supported
/// content-type tag maps to one variant via [`Codec::from_content_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// JSON codec (the default).
    #[default]
    Json,
    /// Bincode codec for binary serialization.
    Bincode,
}

impl Codec {
    /// Resolves a content-type tag to a codec, `None` for unknown tags.
    pub fn from_content_type(tag: &str) -> Option<Codec> {
        match tag {
            "application/json" => Some(Codec::Json),
            "application/bincode" => Some(Codec::Bincode),
            _ => None,
        }
    }

    /// The content-type tag of this codec.
    pub fn content_type(&self) -> &'static str {
        match self {
            Codec::Json => "application/json",
            Codec::Bincode => "application/bincode",
        }
    }

    /// Encode a value into bytes.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(value)?),
            Codec::Bincode => Ok(bincode::serialize(value)?),
        }
    }

    /// Decode bytes into a value.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::Bincode => Ok(bincode::deserialize(bytes)?),
        }
    }

    /// Encoded placeholder used as the body of error responses.
    pub fn placeholder(&self) -> Vec<u8> {
        self.encode(&()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Header;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Args {
        a: i32,
        b: i32,
    }

    #[test]
    fn test_content_type_round_trip() {
        for codec in [Codec::Json, Codec::Bincode] {
            assert_eq!(Codec::from_content_type(codec.content_type()), Some(codec));
        }
    }

    #[test]
    fn test_unknown_content_type() {
        assert_eq!(Codec::from_content_type("application/gob"), None);
        assert_eq!(Codec::from_content_type(""), None);
    }

    #[test]
    fn test_json_round_trip() {
        let codec = Codec::Json;
        let args = Args { a: 3, b: 4 };
        let decoded: Args = codec.decode(&codec.encode(&args).unwrap()).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_bincode_round_trip() {
        let codec = Codec::Bincode;
        let header = Header::request("Arith.Sum", 99);
        let decoded: Header = codec.decode(&codec.encode(&header).unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_mismatch_fails() {
        let codec = Codec::Json;
        let bytes = codec.encode(&"not a struct").unwrap();
        assert!(codec.decode::<Args>(&bytes).is_err());
    }
}
