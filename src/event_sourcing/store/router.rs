use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::event_sourcing::core::{Payload, StoreError};

// ============================================================================
// Type Router - Payload Type -> (Bounded Context, Table)
// ============================================================================
//
// A bounded context owns two tables:
//   <schema>.<Context>Events
//   <schema>.<Context>Snapshots
//
// Routes are resolved lazily, cached for the life of the router and never
// evicted. Concurrent first resolution of the same key is fine: every
// caller computes the same route and `entry().or_insert` keeps the first.
//
// ============================================================================

/// Which of a bounded context's two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Events,
    Snapshots,
}

impl TableKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Events => "Events",
            Self::Snapshots => "Snapshots",
        }
    }
}

/// Fully qualified, validated table name. Displays as a quoted identifier,
/// e.g. `"dbo"."OrdersEvents"`, ready to be embedded in SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Arc<str>,
    name: String,
}

impl TableName {
    pub fn new(schema: &str, bounded_context: &str, kind: TableKind) -> Result<Self, StoreError> {
        validate_identifier("schema", schema)?;
        validate_identifier("bounded context", bounded_context)?;
        Ok(Self {
            schema: Arc::from(schema),
            name: format!("{bounded_context}{}", kind.suffix()),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Unqualified table name, e.g. `OrdersEvents`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\".\"{}\"", self.schema, self.name)
    }
}

/// Resolved destination of a payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub bounded_context: Arc<str>,
    pub table: TableName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RouteKey {
    type_id: TypeId,
    type_tag: &'static str,
    kind: TableKind,
}

/// Process-lifetime cache of payload routes.
pub struct TypeRouter {
    schema: Arc<str>,
    routes: DashMap<RouteKey, Route>,
}

impl TypeRouter {
    pub fn new(schema: &str) -> Result<Self, StoreError> {
        validate_identifier("schema", schema)?;
        Ok(Self {
            schema: Arc::from(schema),
            routes: DashMap::new(),
        })
    }

    /// Resolve where `payload` lives. The first call per (type, variant,
    /// kind) derives the route; later calls hit the cache.
    pub fn resolve<P: Payload>(&self, payload: &P, kind: TableKind) -> Result<Route, StoreError> {
        let key = RouteKey {
            type_id: TypeId::of::<P>(),
            type_tag: payload.type_tag(),
            kind,
        };

        if let Some(route) = self.routes.get(&key) {
            return Ok(route.value().clone());
        }

        let bounded_context = payload.bounded_context();
        let route = Route {
            bounded_context: Arc::from(bounded_context),
            table: self.table_for(bounded_context, kind)?,
        };

        tracing::debug!(
            type_tag = key.type_tag,
            bounded_context = bounded_context,
            table = %route.table,
            "Resolved payload route"
        );

        Ok(self.routes.entry(key).or_insert(route).value().clone())
    }

    /// Resolve every payload of a call and require a single bounded context.
    pub fn resolve_batch<P: Payload>(&self, payloads: &[P], kind: TableKind) -> Result<Route, StoreError> {
        let first = payloads
            .first()
            .ok_or_else(|| StoreError::InvalidArgument("cannot route an empty batch".to_string()))?;
        let route = self.resolve(first, kind)?;

        for (index, payload) in payloads.iter().enumerate().skip(1) {
            let other = self.resolve(payload, kind)?;
            if other.bounded_context != route.bounded_context {
                return Err(StoreError::InvalidArgument(format!(
                    "batch mixes bounded contexts: item 0 belongs to '{}', item {} ('{}') to '{}'",
                    route.bounded_context,
                    index,
                    payload.type_tag(),
                    other.bounded_context
                )));
            }
        }

        Ok(route)
    }

    /// Table of a bounded context given by name (read paths).
    pub fn table_for(&self, bounded_context: &str, kind: TableKind) -> Result<TableName, StoreError> {
        validate_identifier("bounded context", bounded_context)?;
        Ok(TableName {
            schema: self.schema.clone(),
            name: format!("{bounded_context}{}", kind.suffix()),
        })
    }

    pub fn cached_routes(&self) -> usize {
        self.routes.len()
    }
}

/// Identifiers end up inside SQL text, so only plain names are accepted:
/// an ASCII letter followed by ASCII letters, digits or underscores.
pub(crate) fn validate_identifier(what: &str, value: &str) -> Result<(), StoreError> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!("invalid {what} name '{value}'")))
    }
}
