use prost::Message;
use uuid::Uuid;

use super::error::{DeserializationError, StoreError};
use super::event::Payload;

// ============================================================================
// Envelope Codec
// ============================================================================
//
// One envelope per event batch (N items) or per snapshot (exactly 1 item).
//
// Wire layout (protobuf):
//
//   Envelope {
//     1: schema_id       bytes   fixed 16-byte id, identifies this format
//     2: format_version  uint32
//     3: items           repeated Item
//   }
//   Item {
//     1: type_tag        string  discriminant, checked against TYPE_TAGS
//     2: body            bytes   serde_json of the payload
//   }
//
// Item order is the order the caller handed in.
//
// ============================================================================

/// Schema identifier written into every envelope.
pub const ENVELOPE_SCHEMA_ID: Uuid = Uuid::from_u128(0x987a7bed_7689_4c08_b610_9a802d306215);

/// Current envelope format version.
pub const ENVELOPE_FORMAT_VERSION: u32 = 1;

#[derive(Clone, PartialEq, Message)]
struct EnvelopeFrame {
    #[prost(bytes = "vec", tag = "1")]
    schema_id: Vec<u8>,
    #[prost(uint32, tag = "2")]
    format_version: u32,
    #[prost(message, repeated, tag = "3")]
    items: Vec<ItemFrame>,
}

#[derive(Clone, PartialEq, Message)]
struct ItemFrame {
    #[prost(string, tag = "1")]
    type_tag: String,
    #[prost(bytes = "vec", tag = "2")]
    body: Vec<u8>,
}

/// Serialize an ordered list of payloads into one envelope.
pub fn serialize<P: Payload>(items: &[P]) -> Result<Vec<u8>, StoreError> {
    let items = items
        .iter()
        .map(|item| {
            Ok(ItemFrame {
                type_tag: item.type_tag().to_string(),
                body: serde_json::to_vec(item)?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    let frame = EnvelopeFrame {
        schema_id: ENVELOPE_SCHEMA_ID.as_bytes().to_vec(),
        format_version: ENVELOPE_FORMAT_VERSION,
        items,
    };

    Ok(frame.encode_to_vec())
}

/// Deserialize an envelope back into its payloads, in write order.
pub fn deserialize<P: Payload>(bytes: &[u8]) -> Result<Vec<P>, DeserializationError> {
    let frame = EnvelopeFrame::decode(bytes)?;

    if frame.schema_id.as_slice() != ENVELOPE_SCHEMA_ID.as_bytes() {
        let found = Uuid::from_slice(&frame.schema_id)
            .map(|id| id.to_string())
            .unwrap_or_else(|_| format!("<{} bytes>", frame.schema_id.len()));
        return Err(DeserializationError::SchemaMismatch { found });
    }

    if frame.format_version != ENVELOPE_FORMAT_VERSION {
        return Err(DeserializationError::UnsupportedVersion(frame.format_version));
    }

    frame.items.into_iter().map(decode_item::<P>).collect()
}

/// Serialize a single payload (snapshot state).
pub fn serialize_one<P: Payload>(item: &P) -> Result<Vec<u8>, StoreError> {
    serialize(std::slice::from_ref(item))
}

/// Deserialize an envelope that must carry exactly one payload.
pub fn deserialize_one<P: Payload>(bytes: &[u8]) -> Result<P, DeserializationError> {
    let mut items = deserialize::<P>(bytes)?;
    if items.len() != 1 {
        return Err(DeserializationError::ItemCount {
            expected: 1,
            found: items.len(),
        });
    }
    Ok(items.remove(0))
}

fn decode_item<P: Payload>(item: ItemFrame) -> Result<P, DeserializationError> {
    if !P::TYPE_TAGS.contains(&item.type_tag.as_str()) {
        return Err(DeserializationError::UnknownVariant(item.type_tag));
    }

    let payload: P = serde_json::from_slice(&item.body).map_err(|source| {
        DeserializationError::Payload {
            type_tag: item.type_tag.clone(),
            source,
        }
    })?;

    if payload.type_tag() != item.type_tag {
        return Err(DeserializationError::TagMismatch {
            declared: item.type_tag,
            decoded: payload.type_tag(),
        });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    #[serde(tag = "type", content = "data")]
    enum InventoryEvent {
        StockAdded { sku: String, quantity: u32 },
        StockRemoved { sku: String, quantity: u32 },
        Audited,
    }

    impl Payload for InventoryEvent {
        const TYPE_TAGS: &'static [&'static str] = &["StockAdded", "StockRemoved", "Audited"];

        fn type_tag(&self) -> &'static str {
            match self {
                Self::StockAdded { .. } => "StockAdded",
                Self::StockRemoved { .. } => "StockRemoved",
                Self::Audited => "Audited",
            }
        }

        fn bounded_context(&self) -> &'static str {
            "Inventory"
        }
    }

    // Same wire shape, one extra variant the inventory side doesn't know.
    #[derive(Serialize, Deserialize, Clone, Debug)]
    #[serde(tag = "type", content = "data")]
    enum FutureInventoryEvent {
        Recalled { sku: String },
    }

    impl Payload for FutureInventoryEvent {
        const TYPE_TAGS: &'static [&'static str] = &["Recalled"];

        fn type_tag(&self) -> &'static str {
            "Recalled"
        }

        fn bounded_context(&self) -> &'static str {
            "Inventory"
        }
    }

    fn mixed_events(n: usize) -> Vec<InventoryEvent> {
        (0..n)
            .map(|i| match i % 3 {
                0 => InventoryEvent::StockAdded { sku: format!("sku-{i}"), quantity: i as u32 },
                1 => InventoryEvent::StockRemoved { sku: format!("sku-{i}"), quantity: 1 },
                _ => InventoryEvent::Audited,
            })
            .collect()
    }

    #[test]
    fn test_round_trip_preserves_order() {
        for len in [0, 1, 100] {
            let events = mixed_events(len);
            let bytes = serialize(&events).unwrap();
            let decoded: Vec<InventoryEvent> = deserialize(&bytes).unwrap();
            assert_eq!(decoded, events, "length {len}");
        }
    }

    #[test]
    fn test_single_item_envelope() {
        let event = InventoryEvent::StockAdded { sku: "a".into(), quantity: 7 };
        let bytes = serialize_one(&event).unwrap();
        let decoded: InventoryEvent = deserialize_one(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_single_item_rejects_multi_item_envelope() {
        let bytes = serialize(&mixed_events(2)).unwrap();
        let err = deserialize_one::<InventoryEvent>(&bytes).unwrap_err();
        assert!(matches!(err, DeserializationError::ItemCount { expected: 1, found: 2 }));
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let bytes = serialize(&[FutureInventoryEvent::Recalled { sku: "x".into() }]).unwrap();
        let err = deserialize::<InventoryEvent>(&bytes).unwrap_err();
        assert!(matches!(err, DeserializationError::UnknownVariant(tag) if tag == "Recalled"));
    }

    #[test]
    fn test_corrupt_bytes_are_rejected() {
        let mut bytes = serialize(&mixed_events(3)).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(deserialize::<InventoryEvent>(&bytes).is_err());

        let garbage = [0xff_u8, 0xff, 0xff, 0xff];
        assert!(matches!(
            deserialize::<InventoryEvent>(&garbage),
            Err(DeserializationError::Malformed(_))
        ));
    }

    #[test]
    fn test_foreign_schema_is_rejected() {
        let frame = EnvelopeFrame {
            schema_id: Uuid::new_v4().as_bytes().to_vec(),
            format_version: ENVELOPE_FORMAT_VERSION,
            items: vec![],
        };
        let err = deserialize::<InventoryEvent>(&frame.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DeserializationError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_future_format_version_is_rejected() {
        let frame = EnvelopeFrame {
            schema_id: ENVELOPE_SCHEMA_ID.as_bytes().to_vec(),
            format_version: 2,
            items: vec![],
        };
        let err = deserialize::<InventoryEvent>(&frame.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DeserializationError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_declared_tag_must_match_body() {
        let body = serde_json::to_vec(&InventoryEvent::Audited).unwrap();
        let frame = EnvelopeFrame {
            schema_id: ENVELOPE_SCHEMA_ID.as_bytes().to_vec(),
            format_version: ENVELOPE_FORMAT_VERSION,
            items: vec![ItemFrame { type_tag: "StockAdded".into(), body }],
        };
        let err = deserialize::<InventoryEvent>(&frame.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DeserializationError::TagMismatch { decoded: "Audited", .. }));
    }
}
