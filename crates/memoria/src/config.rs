// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoizer identity and configuration.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::expiration::Expiration;

/// The identity of a memoized function.
///
/// Functions are identified by an explicit, application-chosen name rather than by the
/// address of the closure. Every memoizer built with the same key is assumed to wrap the
/// same logic, so the registry shares one cache between them.
///
/// # Examples
///
/// ```
/// use memoria::FunctionKey;
///
/// let key = FunctionKey::new("users::lookup");
/// assert_eq!(key.as_str(), "users::lookup");
/// assert_eq!(key, FunctionKey::from(String::from("users::lookup")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey(Cow<'static, str>);

impl FunctionKey {
    /// Creates a key from a name.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the name of the function.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for FunctionKey {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FunctionKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A sink that receives one human-readable line per memoizer activity.
#[derive(Clone)]
pub struct Logger(Arc<dyn Fn(&str) + Send + Sync>);

impl Logger {
    /// Wraps a callback.
    pub fn new(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(sink))
    }

    pub(crate) fn log(&self, line: &str) {
        (self.0)(line);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Logger")
    }
}

/// The configuration of a memoizer.
///
/// Two configurations are equal when they name the same function and the same expiration.
/// The logger does not take part in equality or hashing, so memoizers that differ only in
/// their logger are shared through the registry and keep the logger of whichever was
/// created first.
#[derive(Debug, Clone)]
pub struct MemoizerConfig {
    function: FunctionKey,
    expiration: Option<Expiration>,
    logger: Option<Logger>,
}

impl MemoizerConfig {
    pub(crate) const fn new(function: FunctionKey, expiration: Option<Expiration>, logger: Option<Logger>) -> Self {
        Self {
            function,
            expiration,
            logger,
        }
    }

    /// Returns the key of the memoized function.
    #[must_use]
    pub const fn function(&self) -> &FunctionKey {
        &self.function
    }

    /// Returns the expiration settings, if entries expire.
    #[must_use]
    pub const fn expiration(&self) -> Option<&Expiration> {
        self.expiration.as_ref()
    }

    /// Returns the logger sink, if one is configured.
    #[must_use]
    pub const fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    /// Returns the sliding time-to-idle of cache entries, `None` meaning "never expire".
    pub(crate) fn time_to_idle(&self) -> Result<Option<Duration>> {
        self.expiration.as_ref().map(Expiration::time_to_idle).transpose()
    }
}

impl PartialEq for MemoizerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function && self.expiration == other.expiration
    }
}

impl Eq for MemoizerConfig {}

impl Hash for MemoizerConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.function.hash(state);
        self.expiration.hash(state);
    }
}
