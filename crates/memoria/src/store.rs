// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Concurrent map of single-flight entries backed by moka.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::flight::Flight;

/// A cache whose values are [`Flight`]s.
///
/// Insertion is atomic per key: concurrent callers for an absent key agree on one flight,
/// and only the caller whose flight was stored is told it inserted. Entries optionally
/// expire after a period without access.
#[derive(Debug, Clone)]
pub(crate) struct FlightCache<K, T>
where
    K: Hash + Eq + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    entries: Cache<K, Arc<Flight<T>>>,
}

/// The outcome of [`FlightCache::get_or_compute`].
#[derive(Debug)]
pub(crate) struct Lookup<T> {
    pub(crate) value: T,
    pub(crate) inserted: bool,
}

impl<K, T> FlightCache<K, T>
where
    K: Hash + Eq + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cache whose entries expire after `time_to_idle` without access, or never.
    pub(crate) fn new(name: Option<&str>, time_to_idle: Option<Duration>) -> Self {
        let mut builder = Cache::builder();

        if let Some(name) = name {
            builder = builder.name(name);
        }

        if let Some(tti) = time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self { entries: builder.build() }
    }

    /// Returns the value for `key`, running `compute` if no caller has produced it yet.
    pub(crate) fn get_or_compute(&self, key: K, compute: impl FnOnce() -> T) -> Lookup<T> {
        let entry = self.entries.entry(key).or_insert_with(|| Arc::new(Flight::new()));
        let inserted = entry.is_fresh();
        let flight = entry.into_value();

        Lookup {
            value: flight.resolve(compute),
            inserted,
        }
    }

    /// Removes one entry, returning `true` if it was present.
    pub(crate) fn remove(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry, returning how many were removed.
    pub(crate) fn drain(&self) -> u64 {
        let keys: Vec<Arc<K>> = self.entries.iter().map(|(key, _)| key).collect();

        keys.iter().map(|key| u64::from(self.remove(key))).sum()
    }

    /// Removes every entry whose key matches `predicate` and returns their values.
    ///
    /// Blocks until computations still running for matching entries complete. Entries
    /// whose computation panicked are removed without producing a value.
    pub(crate) fn extract_if(&self, mut predicate: impl FnMut(&K) -> bool) -> Vec<T> {
        let matching: Vec<Arc<K>> = self.entries.iter().map(|(key, _)| key).filter(|key| predicate(key)).collect();

        matching
            .iter()
            .filter_map(|key| self.entries.remove(key.as_ref()))
            .filter_map(|flight| flight.completed())
            .collect()
    }

    /// Returns the completed values of every entry whose key matches `predicate`.
    pub(crate) fn values_where(&self, mut predicate: impl FnMut(&K) -> bool) -> Vec<T> {
        self.entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .filter_map(|(_, flight)| flight.completed())
            .collect()
    }

    /// Returns the number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.iter().count()
    }
}
