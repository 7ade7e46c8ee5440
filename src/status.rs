//! `CacheStatus`: the engine's read-outcome type.
//!
//! A sum type rather than a nullable return, so the tombstone distinction
//! ("known absent") is checked by the compiler instead of convention.

/// The outcome of a read against the cache, as distinct from an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus<T> {
    /// A domain value was found.
    Found(T),
    /// A tombstone was found: the data source was previously asked and
    /// returned nothing for this key.
    KnownAbsent,
    /// Neither tier held anything for this key.
    NotFound,
}

impl<T> CacheStatus<T> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, CacheStatus::Found(_))
    }

    #[must_use]
    pub fn is_known_absent(&self) -> bool {
        matches!(self, CacheStatus::KnownAbsent)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheStatus::NotFound)
    }

    /// Returns the domain value, if found.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            CacheStatus::Found(v) => Some(v),
            CacheStatus::KnownAbsent | CacheStatus::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheStatus<U> {
        match self {
            CacheStatus::Found(v) => CacheStatus::Found(f(v)),
            CacheStatus::KnownAbsent => CacheStatus::KnownAbsent,
            CacheStatus::NotFound => CacheStatus::NotFound,
        }
    }
}

/// The value a slot in the local or remote tier holds: either a domain
/// value (encoded bytes) or the tombstone marker. Distinct from "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Value(Vec<u8>),
    Tombstone,
}
