// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use crate::config::{FunctionKey, Logger, MemoizerConfig};
use crate::error::{Fault, Result};
use crate::expiration::{Expiration, TimeUnit};
use crate::fingerprint::Arguments;
use crate::memoizer::{BoxedFunction, Memoizer};
use crate::registry::Registry;

/// Builder for [`Memoizer`].
///
/// Obtained from [`Memoizer::builder`] or [`Memoizer::try_builder`]. By default entries
/// never expire and activity is only reported through `tracing`.
///
/// # Examples
///
/// ```
/// use memoria::{Memoizer, Registry, TimeUnit};
///
/// let registry = Registry::new();
///
/// let first = Memoizer::builder("double", |(x,): (i64,)| x * 2)
///     .expires_after(5, TimeUnit::Minutes)
///     .shared(&registry)?;
/// let second = Memoizer::builder("double", |(x,): (i64,)| x * 2)
///     .expires_after(5, TimeUnit::Minutes)
///     .shared(&registry)?;
///
/// assert!(Memoizer::ptr_eq(&first, &second));
/// # Ok::<(), memoria::Error>(())
/// ```
pub struct MemoizerBuilder<A, V> {
    function_key: FunctionKey,
    function: BoxedFunction<A, V>,
    expiration: Option<Expiration>,
    logger: Option<Logger>,
    name: Option<String>,
}

impl<A, V> MemoizerBuilder<A, V>
where
    A: Arguments + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder for an infallible function.
    pub fn new(key: impl Into<FunctionKey>, function: impl Fn(A) -> V + Send + Sync + 'static) -> Self {
        Self::from_boxed(key.into(), Box::new(move |args| Ok(function(args))))
    }

    /// Creates a builder for a fallible function whose errors are cached as faults.
    pub fn try_new<E>(key: impl Into<FunctionKey>, function: impl Fn(A) -> std::result::Result<V, E> + Send + Sync + 'static) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::from_boxed(
            key.into(),
            Box::new(move |args| function(args).map_err(|error| Fault::from(error.into()))),
        )
    }

    fn from_boxed(function_key: FunctionKey, function: BoxedFunction<A, V>) -> Self {
        Self {
            function_key,
            function,
            expiration: None,
            logger: None,
            name: None,
        }
    }

    /// Expires entries after `value` units of time without access.
    #[must_use]
    pub fn expires_after(mut self, value: u64, unit: TimeUnit) -> Self {
        self.expiration = Some(Expiration::sliding(value, unit));
        self
    }

    /// Sets the expiration policy of entries.
    #[must_use]
    pub fn expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Forwards a human-readable line for every activity of the memoizer to `sink`.
    #[must_use]
    pub fn logger(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Logger::new(sink));
        self
    }

    /// Names the underlying store, which helps telling stores apart in diagnostics.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the configuration the memoizer will be built with.
    #[must_use]
    pub fn config(&self) -> MemoizerConfig {
        MemoizerConfig::new(self.function_key.clone(), self.expiration, self.logger.clone())
    }

    /// Builds a standalone memoizer that is not shared through any registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the expiration cannot be represented as a duration.
    pub fn build(self) -> Result<Memoizer<A, V>> {
        let time_to_idle = self.config().time_to_idle()?;
        Ok(self.into_memoizer(time_to_idle))
    }

    /// Returns the memoizer registered in `registry` for this configuration, creating it
    /// from this builder if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the expiration cannot be represented as a duration, or if the
    /// registered memoizer has a different signature.
    pub fn shared(self, registry: &Registry) -> Result<Memoizer<A, V>> {
        registry.get_or_create(self)
    }

    pub(crate) fn into_memoizer(self, time_to_idle: Option<Duration>) -> Memoizer<A, V> {
        let config = self.config();
        Memoizer::new(config, self.function, self.name.as_deref(), time_to_idle)
    }
}

impl<A, V> fmt::Debug for MemoizerBuilder<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizerBuilder")
            .field("function_key", &self.function_key)
            .field("expiration", &self.expiration)
            .field("logger", &self.logger)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::ExpirationKind;

    #[test]
    fn defaults() {
        let builder = MemoizerBuilder::new("f", |()| 1);
        let config = builder.config();

        assert_eq!(config.function().as_str(), "f");
        assert!(config.expiration().is_none());
        assert!(config.logger().is_none());
    }

    #[test]
    fn expires_after_sets_sliding_expiration() {
        let config = MemoizerBuilder::new("f", |()| 1).expires_after(3, TimeUnit::Seconds).config();

        assert_eq!(config.expiration(), Some(&Expiration::sliding(3, TimeUnit::Seconds)));
    }

    #[test]
    fn expiration_accepts_validated_values() {
        let expiration = Expiration::build(ExpirationKind::Relative, 10, TimeUnit::Minutes).unwrap();
        let config = MemoizerBuilder::new("f", |()| 1).expiration(expiration).config();

        assert_eq!(config.expiration(), Some(&expiration));
    }

    #[test]
    fn build_rejects_unrepresentable_expiration() {
        let error = MemoizerBuilder::new("f", |()| 1)
            .expires_after(u64::MAX, TimeUnit::Days)
            .build()
            .unwrap_err();

        assert!(error.is_configuration());
    }

    #[test]
    fn build_rejects_expiration_beyond_a_thousand_years() {
        let error = MemoizerBuilder::new("f", |()| 1)
            .expires_after(1_000_000, TimeUnit::Days)
            .build()
            .unwrap_err();
        assert!(error.is_configuration());

        let longest = MemoizerBuilder::new("f", |()| 1).expires_after(365_000, TimeUnit::Days).build().unwrap();
        assert_eq!(longest.invoke(()).unwrap(), 1);
    }

    #[test]
    fn shared_registers_owned_argument_types() {
        let registry = Registry::new();
        let memoizer = MemoizerBuilder::new("len", |(s, v): (String, Vec<u8>)| s.len() + v.len())
            .shared(&registry)
            .unwrap();

        assert_eq!(memoizer.invoke(("abc".to_string(), vec![1, 2])).unwrap(), 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn named_store_builds() {
        let memoizer = MemoizerBuilder::new("f", |(x,): (u8,)| x).name("f-store").build().unwrap();

        assert_eq!(memoizer.invoke((3,)).unwrap(), 3);
    }

    #[test]
    fn try_new_converts_errors_into_faults() {
        let memoizer = MemoizerBuilder::try_new("fails", |()| Err::<u8, _>("boom")).build().unwrap();
        let error = memoizer.invoke(()).unwrap_err();

        assert_eq!(error.fault().unwrap().to_string(), "boom");
    }

    #[test]
    fn debug_output() {
        let builder = MemoizerBuilder::new("f", |()| 1).logger(|_line| {});

        let debug = format!("{builder:?}");
        assert!(debug.contains("MemoizerBuilder"));
        assert!(debug.contains("Logger"));
    }
}
