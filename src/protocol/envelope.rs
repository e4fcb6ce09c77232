//! Protocol envelope
//!
//! The outer message carried by every frame. `payload` is opaque at this
//! layer; the dispatcher resolves it through the catalog.

use bytes::Buf;

/// Outer wire structure of every frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    /// Catalog tag selecting the payload shape
    #[prost(uint32, required, tag = "1")]
    pub payload_type: u32,
    /// Serialized payload message
    #[prost(bytes = "vec", required, tag = "2")]
    pub payload: Vec<u8>,
    /// Correlation id, present only on requests and their direct replies
    #[prost(string, optional, tag = "3")]
    pub request_id: Option<String>,
}

impl Envelope {
    pub fn new(payload_type: u32, payload: Vec<u8>, request_id: Option<String>) -> Self {
        Self {
            payload_type,
            payload,
            request_id,
        }
    }

    /// Build an envelope around a protobuf payload
    pub fn wrap<M: prost::Message>(payload_type: u32, payload: &M, request_id: Option<String>) -> Self {
        Self::new(payload_type, payload.encode_to_vec(), request_id)
    }

    /// Parse an envelope from raw frame bytes
    pub fn parse(buf: impl Buf) -> Result<Self, prost::DecodeError> {
        <Self as prost::Message>::decode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_envelope_wire_layout() {
        let envelope = Envelope::new(51, vec![], None);
        // field 1 varint 51, field 2 empty bytes
        assert_eq!(envelope.encode_to_vec(), vec![0x08, 51, 0x12, 0x00]);
    }

    #[test]
    fn test_envelope_roundtrip_with_request_id() {
        let original = Envelope::new(2100, vec![1, 2, 3], Some("U1".to_string()));
        let decoded = Envelope::parse(original.encode_to_vec().as_slice()).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.request_id.as_deref(), Some("U1"));
    }

    #[test]
    fn test_envelope_without_request_id_is_unsolicited() {
        let bytes = Envelope::new(2131, vec![9], None).encode_to_vec();
        let decoded = Envelope::parse(bytes.as_slice()).unwrap();

        assert_eq!(decoded.request_id, None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Envelope::parse(&[0xFF, 0xFF, 0xFF][..]).is_err());
    }
}
