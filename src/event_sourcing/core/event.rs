use serde::{de::DeserializeOwned, Serialize};

// ============================================================================
// Payload Contracts - What the Aggregate Component Supplies
// ============================================================================
//
// The store never inspects payload fields. It only needs:
// - a discriminant to write next to the serialized body
// - the closed set of discriminants it is allowed to decode
// - the bounded context the payload belongs to (routing)
//
// Payload types are usually serde-tagged enums, one variant per fact:
//
//     #[serde(tag = "type", content = "data")]
//     enum OrdersEvent { Placed(OrderPlaced), Shipped(OrderShipped) }
//
// ============================================================================

/// A typed payload that can travel inside an envelope.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Every discriminant this type can produce. Anything else found in an
    /// envelope is rejected as an unknown variant.
    const TYPE_TAGS: &'static [&'static str];

    /// Discriminant of this value; must be one of [`Payload::TYPE_TAGS`].
    fn type_tag(&self) -> &'static str;

    /// Name of the bounded context that owns this payload, e.g. `"Orders"`.
    ///
    /// Used to derive the physical table (`<Context>Events` /
    /// `<Context>Snapshots`), so it has to be a plain identifier.
    fn bounded_context(&self) -> &'static str;
}

/// Domain event - an immutable fact appended to a bounded context's log.
pub trait DomainEvent: Payload + Clone {}
