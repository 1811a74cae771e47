// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoizer: a single-flight result cache for one function and one configuration.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::builder::MemoizerBuilder;
use crate::config::{FunctionKey, MemoizerConfig};
use crate::error::{Error, Fault, Result};
use crate::fingerprint::{Arguments, Fingerprint};
use crate::store::FlightCache;
use crate::telemetry::{self, Activity};

/// The cached state of one argument tuple: the value, or the fault the function returned.
pub(crate) type Outcome<V> = std::result::Result<V, Fault>;

pub(crate) type BoxedFunction<A, V> = Box<dyn Fn(A) -> Outcome<V> + Send + Sync>;

type Entries<V> = FlightCache<Fingerprint, Outcome<V>>;

/// Caches the results of one function, keyed by the fingerprint of its arguments.
///
/// The function runs at most once per distinct argument tuple while its entry lives.
/// Concurrent callers asking for the same arguments block until that single execution
/// completes and all receive its result. Failures are cached too: until the entry is
/// removed, cleared, or expires, every call with the same arguments returns the same
/// [`Fault`] without running the function again.
///
/// `Memoizer` is a cheap handle; clones share the same cache. Use [`Memoizer::ptr_eq`]
/// to tell whether two handles refer to the same cache.
///
/// # Examples
///
/// ```
/// use memoria::{Memoizer, TimeUnit};
///
/// let greet = Memoizer::builder("greet", |(name, times): (String, usize)| "hi ".repeat(times) + &name)
///     .expires_after(30, TimeUnit::Minutes)
///     .build()?;
///
/// assert_eq!(greet.invoke(("ada".to_string(), 2))?, "hi hi ada");
/// assert_eq!(greet.invoke(("ada".to_string(), 2))?, "hi hi ada");
/// assert_eq!(greet.stats().misses(), 1);
/// assert_eq!(greet.stats().hits(), 1);
/// # Ok::<(), memoria::Error>(())
/// ```
pub struct Memoizer<A, V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<A, V>>,
}

struct Inner<A, V>
where
    V: Clone + Send + Sync + 'static,
{
    config: MemoizerConfig,
    function: BoxedFunction<A, V>,
    // `None` once disposed.
    entries: RwLock<Option<Entries<V>>>,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    invocations: AtomicU64,
    misses: AtomicU64,
    clears: AtomicU64,
    elements_cleared: AtomicU64,
}

impl Counters {
    fn record_invocation(&self, missed: bool) {
        if missed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_clear(&self, elements: u64) {
        self.clears.fetch_add(1, Ordering::Relaxed);
        self.elements_cleared.fetch_add(elements, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MemoizerStats {
        MemoizerStats {
            invocations: self.invocations.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            elements_cleared: self.elements_cleared.load(Ordering::Relaxed),
        }
    }
}

/// A snapshot of the counters of a [`Memoizer`].
///
/// Counters are updated independently of the cache itself, so a snapshot taken while other
/// threads are invoking the memoizer may be slightly out of step with its contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoizerStats {
    invocations: u64,
    misses: u64,
    clears: u64,
    elements_cleared: u64,
}

impl MemoizerStats {
    /// Returns how many times the memoizer was invoked.
    #[must_use]
    pub const fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Returns how many invocations inserted a new entry.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Returns how many invocations were served by an existing entry.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.invocations.saturating_sub(self.misses)
    }

    /// Returns how many times the memoizer was cleared.
    #[must_use]
    pub const fn clears(&self) -> u64 {
        self.clears
    }

    /// Returns the total number of entries removed by clearing.
    #[must_use]
    pub const fn elements_cleared(&self) -> u64 {
        self.elements_cleared
    }
}

impl<A, V> Memoizer<A, V>
where
    A: Arguments + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts building a memoizer for an infallible function.
    ///
    /// The function receives its arguments as a tuple.
    pub fn builder(key: impl Into<FunctionKey>, function: impl Fn(A) -> V + Send + Sync + 'static) -> MemoizerBuilder<A, V> {
        MemoizerBuilder::new(key, function)
    }

    /// Starts building a memoizer for a fallible function.
    ///
    /// Errors returned by the function are cached like values; see [`Memoizer`].
    pub fn try_builder<E>(
        key: impl Into<FunctionKey>,
        function: impl Fn(A) -> std::result::Result<V, E> + Send + Sync + 'static,
    ) -> MemoizerBuilder<A, V>
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        MemoizerBuilder::try_new(key, function)
    }

    pub(crate) fn new(config: MemoizerConfig, function: BoxedFunction<A, V>, name: Option<&str>, time_to_idle: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(Some(FlightCache::new(name, time_to_idle))),
                config,
                function,
                counters: Counters::default(),
            }),
        }
    }

    /// Returns the cached result for `args`, running the function if there is none.
    ///
    /// If another thread is already computing the result for the same arguments, this call
    /// blocks until that computation completes and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Computation`](crate::ErrorKind::Computation) if the function
    /// failed for these arguments, now or in an earlier call whose entry is still cached,
    /// and [`ErrorKind::Disposed`](crate::ErrorKind::Disposed) if the memoizer was disposed.
    pub fn invoke(&self, args: A) -> Result<V> {
        let entries = self.entries().ok_or_else(|| Error::disposed(self.function().clone()))?;
        let fingerprint = args.fingerprint();

        let lookup = entries.get_or_compute(fingerprint, || (self.inner.function)(args));
        self.inner.counters.record_invocation(lookup.inserted);

        let activity = if lookup.inserted { Activity::Miss } else { Activity::Hit };
        self.record(activity, Some(fingerprint));

        lookup.value.map_err(|fault| {
            if lookup.inserted {
                self.record(Activity::Fault, Some(fingerprint));
            }
            Error::computation(self.function().clone(), fault)
        })
    }

    /// Removes the entry for `args`, so that the next call with them runs the function.
    ///
    /// Returns `true` if an entry was removed. Callers already waiting on that entry still
    /// receive its result.
    pub fn remove(&self, args: &A) -> bool {
        self.remove_fingerprint(args.fingerprint())
    }
}

impl<A, V> Memoizer<A, V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn remove_fingerprint(&self, fingerprint: Fingerprint) -> bool {
        let removed = self.entries().is_some_and(|entries| entries.remove(&fingerprint));

        if removed {
            self.record(Activity::Removed, Some(fingerprint));
        }

        removed
    }

    /// Removes every entry and returns how many were removed.
    ///
    /// Computations in progress are not interrupted; their callers still receive the
    /// result, but later callers compute again.
    pub fn clear(&self) -> u64 {
        let Some(entries) = self.entries() else {
            return 0;
        };

        let removed = entries.drain();
        self.inner.counters.record_clear(removed);
        self.record(Activity::Cleared, None);
        removed
    }

    /// Releases the cache of this memoizer.
    ///
    /// Every handle to this memoizer is affected: later invocations fail with
    /// [`ErrorKind::Disposed`](crate::ErrorKind::Disposed), and removing or clearing does
    /// nothing. Disposing twice has no further effect.
    pub fn dispose(&self) {
        let Some(entries) = self.inner.entries.write().take() else {
            return;
        };

        entries.drain();
        self.record(Activity::Disposed, None);
    }

    /// Returns `true` if [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.entries.read().is_none()
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries().map_or(0, |entries| u64::try_from(entries.len()).unwrap_or(u64::MAX))
    }

    /// Returns `true` if the memoizer holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the invocation counters.
    #[must_use]
    pub fn stats(&self) -> MemoizerStats {
        self.inner.counters.snapshot()
    }

    /// Returns the configuration this memoizer was built with.
    #[must_use]
    pub fn config(&self) -> &MemoizerConfig {
        &self.inner.config
    }

    /// Returns the key of the memoized function.
    #[must_use]
    pub fn function(&self) -> &FunctionKey {
        self.inner.config.function()
    }

    /// Returns `true` if both handles refer to the same memoizer.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    fn entries(&self) -> Option<Entries<V>> {
        self.inner.entries.read().clone()
    }

    fn record(&self, activity: Activity, fingerprint: Option<Fingerprint>) {
        telemetry::record(self.function(), self.inner.config.logger(), activity, fingerprint);
    }
}

impl<A, V> Clone for Memoizer<A, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, V> fmt::Debug for Memoizer<A, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoizer")
            .field("config", &self.inner.config)
            .field("disposed", &self.is_disposed())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
