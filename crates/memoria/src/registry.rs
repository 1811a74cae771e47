// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide sharing of memoizers.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::builder::MemoizerBuilder;
use crate::config::{FunctionKey, MemoizerConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::fingerprint::{Arguments, Fingerprint};
use crate::memoizer::Memoizer;
use crate::store::FlightCache;
use crate::telemetry::{self, Activity};

/// The operations the registry needs from a memoizer whose types it does not know.
trait SharedMemoizer: Send + Sync {
    fn remove_fingerprint(&self, fingerprint: Fingerprint) -> bool;

    fn dispose(&self);

    fn as_any(&self) -> &dyn Any;
}

impl<A, V> SharedMemoizer for Memoizer<A, V>
where
    A: 'static,
    V: Clone + Send + Sync + 'static,
{
    fn remove_fingerprint(&self, fingerprint: Fingerprint) -> bool {
        Self::remove_fingerprint(self, fingerprint)
    }

    fn dispose(&self) {
        Self::dispose(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Memoizers are shared when both their configuration and their argument and value types
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistryKey {
    signature: TypeId,
    config: MemoizerConfig,
}

impl RegistryKey {
    fn is_for(&self, function: &FunctionKey) -> bool {
        self.config.function() == function
    }
}

/// A set of shared memoizers.
///
/// Building a memoizer with [`MemoizerBuilder::shared`] returns the memoizer already
/// registered for an equal configuration, so every part of an application that memoizes
/// the same function with the same expiration uses one cache. Concurrent first use creates
/// exactly one memoizer.
///
/// `Registry` is a cheap handle; clones refer to the same set of memoizers.
///
/// # Examples
///
/// ```
/// use memoria::{Memoizer, Registry};
///
/// let registry = Registry::new();
/// let square = Memoizer::builder("square", |(x,): (u64,)| x * x).shared(&registry)?;
///
/// assert_eq!(square.invoke((12,))?, 144);
/// assert_eq!(registry.remove_from_cache("square", &(12_u64,)), 1);
/// assert_eq!(registry.unmemoize("square"), 1);
/// assert!(square.is_disposed());
/// # Ok::<(), memoria::Error>(())
/// ```
#[derive(Clone)]
pub struct Registry {
    memoizers: FlightCache<RegistryKey, Arc<dyn SharedMemoizer>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memoizers: FlightCache::new(Some("memoria.registry"), None),
        }
    }

    /// Returns the memoizer registered for the configuration of `builder`, building it if
    /// there is none.
    ///
    /// This is what [`MemoizerBuilder::shared`] calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the expiration cannot be represented as a duration, or if the
    /// registered memoizer has a different signature.
    pub fn get_or_create<A, V>(&self, builder: MemoizerBuilder<A, V>) -> Result<Memoizer<A, V>>
    where
        A: Arguments + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let config = builder.config();
        let time_to_idle = config.time_to_idle()?;
        let function = config.function().clone();
        let logger = config.logger().cloned();

        let key = RegistryKey {
            signature: TypeId::of::<Memoizer<A, V>>(),
            config,
        };

        let lookup = self
            .memoizers
            .get_or_compute(key, || Arc::new(builder.into_memoizer(time_to_idle)) as Arc<dyn SharedMemoizer>);

        if lookup.inserted {
            telemetry::record(&function, logger.as_ref(), Activity::Registered, None);
        }

        lookup
            .value
            .as_any()
            .downcast_ref::<Memoizer<A, V>>()
            .cloned()
            .ok_or_else(|| Error::from_kind(ErrorKind::SignatureMismatch(function)))
    }

    /// Removes and disposes every shared memoizer of `function`, whatever its expiration.
    ///
    /// Standalone memoizers are not affected. Returns the number of memoizers removed.
    pub fn unmemoize(&self, function: impl Into<FunctionKey>) -> usize {
        let function = function.into();
        let removed = self.memoizers.extract_if(|key| key.is_for(&function));

        for memoizer in &removed {
            memoizer.dispose();
        }

        if !removed.is_empty() {
            telemetry::record(&function, None, Activity::Unregistered, None);
        }

        removed.len()
    }

    /// Removes the entry for `args` from every shared memoizer of `function`.
    ///
    /// Returns the number of memoizers that held such an entry.
    pub fn remove_from_cache<A: Arguments>(&self, function: impl Into<FunctionKey>, args: &A) -> usize {
        let function = function.into();
        let fingerprint = args.fingerprint();

        self.memoizers
            .values_where(|key| key.is_for(&function))
            .iter()
            .filter(|memoizer| memoizer.remove_fingerprint(fingerprint))
            .count()
    }

    /// Returns the number of registered memoizers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memoizers.len()
    }

    /// Returns `true` if no memoizer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and disposes every registered memoizer, returning how many were removed.
    pub fn shutdown(&self) -> usize {
        let removed = self.memoizers.extract_if(|_| true);

        for memoizer in &removed {
            memoizer.dispose();
        }

        removed.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Barrier, Mutex};
    use std::thread;

    use super::*;
    use crate::expiration::TimeUnit;

    fn square(registry: &Registry, unit: TimeUnit) -> Memoizer<(u64,), u64> {
        Memoizer::builder("square", |(x,): (u64,)| x * x)
            .expires_after(1, unit)
            .shared(registry)
            .unwrap()
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Registry: Send, Sync, Clone, Default);
    }

    #[test]
    fn equal_configurations_share_one_memoizer() {
        let registry = Registry::new();

        let first = square(&registry, TimeUnit::Hours);
        let second = square(&registry.clone(), TimeUnit::Hours);

        assert!(Memoizer::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_expiration_is_a_different_memoizer() {
        let registry = Registry::new();

        let hourly = square(&registry, TimeUnit::Hours);
        let daily = square(&registry, TimeUnit::Days);

        assert!(!Memoizer::ptr_eq(&hourly, &daily));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn different_signature_is_a_different_memoizer() {
        let registry = Registry::new();

        let numeric = square(&registry, TimeUnit::Hours);
        let textual = Memoizer::builder("square", |(x,): (u64,)| (x * x).to_string())
            .expires_after(1, TimeUnit::Hours)
            .shared(&registry)
            .unwrap();

        assert_eq!(numeric.invoke((3,)).unwrap(), 9);
        assert_eq!(textual.invoke((3,)).unwrap(), "9");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn first_logger_wins() {
        let registry = Registry::new();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);

        let logged = Memoizer::builder("square", |(x,): (u64,)| x * x)
            .logger(move |line| sink.lock().unwrap().push(line.to_owned()))
            .shared(&registry)
            .unwrap();
        let unlogged = Memoizer::builder("square", |(x,): (u64,)| x * x).shared(&registry).unwrap();

        assert!(Memoizer::ptr_eq(&logged, &unlogged));
        unlogged.invoke((2,)).unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.first().map(String::as_str), Some("memoizer 'square' registered"));
        assert!(lines.iter().any(|line| line.starts_with("memoizer 'square' miss")));
    }

    #[test]
    fn unmemoize_disposes_only_shared_memoizers_of_the_function() {
        let registry = Registry::new();

        let hourly = square(&registry, TimeUnit::Hours);
        let daily = square(&registry, TimeUnit::Days);
        let standalone = Memoizer::builder("square", |(x,): (u64,)| x * x).build().unwrap();
        let other = Memoizer::builder("cube", |(x,): (u64,)| x * x * x).shared(&registry).unwrap();

        assert_eq!(registry.unmemoize("square"), 2);
        assert_eq!(registry.unmemoize("square"), 0);

        assert!(hourly.is_disposed());
        assert!(daily.is_disposed());
        assert!(!standalone.is_disposed());
        assert!(!other.is_disposed());
        assert_eq!(registry.len(), 1);

        let fresh = square(&registry, TimeUnit::Hours);
        assert!(!Memoizer::ptr_eq(&fresh, &hourly));
        assert_eq!(fresh.invoke((4,)).unwrap(), 16);
    }

    #[test]
    fn remove_from_cache_targets_one_fingerprint() {
        let registry = Registry::new();

        let hourly = square(&registry, TimeUnit::Hours);
        let daily = square(&registry, TimeUnit::Days);
        hourly.invoke((2,)).unwrap();
        hourly.invoke((3,)).unwrap();
        daily.invoke((2,)).unwrap();

        assert_eq!(registry.remove_from_cache("square", &(2_u64,)), 2);
        assert_eq!(registry.remove_from_cache("square", &(2_u64,)), 0);
        assert_eq!(registry.remove_from_cache("cube", &(3_u64,)), 0);

        assert_eq!(hourly.len(), 1);
        assert!(daily.is_empty());
    }

    #[test]
    fn concurrent_first_use_builds_one_memoizer() {
        const THREADS: usize = 8;

        let registry = Registry::new();
        let barrier = Barrier::new(THREADS);

        let memoizers: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        Memoizer::builder("slow", |()| 1_u8).shared(&registry).unwrap()
                    })
                })
                .collect();

            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert!(memoizers.windows(2).all(|pair| Memoizer::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn shutdown_disposes_everything() {
        let registry = Registry::new();
        let handle = registry.clone();

        let hourly = square(&registry, TimeUnit::Hours);
        let cube = Memoizer::builder("cube", |(x,): (u64,)| x * x * x).shared(&registry).unwrap();

        assert_eq!(handle.shutdown(), 2);
        assert!(registry.is_empty());
        assert!(hourly.is_disposed());
        assert!(cube.is_disposed());
    }

    #[test]
    fn rejected_expiration_registers_nothing() {
        let registry = Registry::new();

        for _ in 0..2 {
            let error = Memoizer::builder("forever", |(x,): (u64,)| x)
                .expires_after(1_000_000, TimeUnit::Days)
                .shared(&registry)
                .unwrap_err();
            assert!(error.is_configuration());
        }

        assert!(registry.is_empty());
    }

    #[test]
    fn debug_output() {
        let registry = Registry::new();
        let _square = square(&registry, TimeUnit::Hours);

        assert_eq!(format!("{registry:?}"), "Registry { len: 1 }");
    }
}
