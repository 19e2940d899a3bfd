#![allow(dead_code)]

use event_store_engine::{
    AggregateRootState, DomainEvent, EventStore, MemoryStore, Payload, StoreConfig,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Shared Fixtures - "Orders" and "Billing" bounded contexts
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventA {
    pub x: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventB {
    pub y: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum OrdersEvent {
    EventA(EventA),
    EventB(EventB),
}

impl Payload for OrdersEvent {
    const TYPE_TAGS: &'static [&'static str] = &["EventA", "EventB"];

    fn type_tag(&self) -> &'static str {
        match self {
            Self::EventA(_) => "EventA",
            Self::EventB(_) => "EventB",
        }
    }

    fn bounded_context(&self) -> &'static str {
        "Orders"
    }
}

impl DomainEvent for OrdersEvent {}

pub fn a(x: i32) -> OrdersEvent {
    OrdersEvent::EventA(EventA { x })
}

pub fn b(y: i32) -> OrdersEvent {
    OrdersEvent::EventB(EventB { y })
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum BillingEvent {
    InvoiceIssued { amount: i64 },
}

impl Payload for BillingEvent {
    const TYPE_TAGS: &'static [&'static str] = &["InvoiceIssued"];

    fn type_tag(&self) -> &'static str {
        "InvoiceIssued"
    }

    fn bounded_context(&self) -> &'static str {
        "Billing"
    }
}

impl DomainEvent for BillingEvent {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderState {
    pub id: Uuid,
    pub version: i32,
    pub total: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum OrdersState {
    Order(OrderState),
}

impl Payload for OrdersState {
    const TYPE_TAGS: &'static [&'static str] = &["Order"];

    fn type_tag(&self) -> &'static str {
        "Order"
    }

    fn bounded_context(&self) -> &'static str {
        "Orders"
    }
}

impl AggregateRootState for OrdersState {
    fn aggregate_id(&self) -> Uuid {
        let Self::Order(state) = self;
        state.id
    }

    fn version(&self) -> i32 {
        let Self::Order(state) = self;
        state.version
    }
}

pub fn order_state(id: Uuid, version: i32) -> OrdersState {
    OrdersState::Order(OrderState {
        id,
        version,
        total: i64::from(version) * 100,
    })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("event_store_engine=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn memory_store() -> (MemoryStore, EventStore<MemoryStore>) {
    init_tracing();
    let backend = MemoryStore::new();
    let store = EventStore::new(backend.clone(), StoreConfig::default())
        .expect("default config is valid");
    (backend, store)
}
