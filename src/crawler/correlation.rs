//! Ephemeral correlation identifiers
//!
//! Detail fetch and detail parse run concurrently and lose item order. Every
//! surviving list item receives a fresh identifier at list-parse time so its
//! fetched payload and parsed detail can be paired with it again. Identifiers
//! live only for one pipeline attempt and are never persisted.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque, per-attempt token linking a list item to its detail artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Mints a new identifier, unique across runs and targets
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value tagged with the correlation id of its originating list item
#[derive(Debug, Clone, PartialEq)]
pub struct Correlated<T> {
    pub id: CorrelationId,
    pub value: T,
}

impl<T> Correlated<T> {
    /// Tags a new list-side value with a freshly minted id
    pub fn tag(value: T) -> Self {
        Self {
            id: CorrelationId::mint(),
            value,
        }
    }

    /// Attaches an existing id to a detail-side value
    pub fn with_id(id: CorrelationId, value: T) -> Self {
        Self { id, value }
    }
}

/// Builds an id lookup over correlated items, keeping each item's position
pub fn index_by_id<T>(items: &[Correlated<T>]) -> HashMap<CorrelationId, (usize, &T)> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| (item.id, (position, &item.value)))
        .collect()
}
