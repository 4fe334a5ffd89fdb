use bytes::Bytes;
use thiserror::Error;

use crate::item::WorkItem;

/// Decodes a raw delivery payload into a [`WorkItem`].
///
/// The core only needs `decode`; the transport brings its own payload
/// representation as [`Bytes`]. Decoding fails closed: a malformed payload
/// yields a [`DecodeError`] that the consumer turns into a rejection, never
/// a panic that would lose the acknowledgment obligation.
pub trait PayloadCodec: Send + Sync {
    /// Decode a raw payload into a work item.
    fn decode(&self, payload: &Bytes) -> Result<WorkItem, DecodeError>;
}

/// Failure to decode a raw payload into a [`WorkItem`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("payload is not a numeric booking id: {0:?}")]
    NotNumeric(String),
}

/// Codec for payloads that carry a decimal booking id as UTF-8 text, the
/// format the upstream queue is populated with.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextIdCodec;

impl TextIdCodec {
    /// Encode a work item back into its wire payload. Used by the in-memory
    /// delivery subsystem and by tests.
    #[must_use]
    pub fn encode(item: WorkItem) -> Bytes {
        Bytes::from(item.id().to_string())
    }
}

impl PayloadCodec for TextIdCodec {
    fn decode(&self, payload: &Bytes) -> Result<WorkItem, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
        let id = text
            .trim()
            .parse::<u64>()
            .map_err(|_| DecodeError::NotNumeric(text.to_owned()))?;
        Ok(WorkItem::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_decimal_text() {
        let item = TextIdCodec.decode(&Bytes::from_static(b"42")).unwrap();
        assert_eq!(item.id(), 42);
    }

    #[test]
    fn decodes_with_surrounding_whitespace() {
        let item = TextIdCodec.decode(&Bytes::from_static(b" 7\n")).unwrap();
        assert_eq!(item.id(), 7);
    }

    #[test]
    fn rejects_empty_payload() {
        let err = TextIdCodec.decode(&Bytes::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = TextIdCodec
            .decode(&Bytes::from_static(&[0xff, 0xfe]))
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotUtf8));
    }

    #[test]
    fn rejects_non_numeric_text() {
        let err = TextIdCodec
            .decode(&Bytes::from_static(b"not-a-number"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::NotNumeric(_)));
    }

    #[test]
    fn encode_decode_agree() {
        let item = WorkItem::new(123);
        let decoded = TextIdCodec.decode(&TextIdCodec::encode(item)).unwrap();
        assert_eq!(decoded, item);
    }
}
