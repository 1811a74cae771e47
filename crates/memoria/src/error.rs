// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use crate::config::FunctionKey;

/// A failure produced by a memoized function.
///
/// Faults are shared: once a computation fails, every caller waiting on it and every
/// later caller with the same arguments receives a clone of the same `Arc`.
pub type Fault = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The result for fallible operations that use the [`Error`] type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error returned by a memoizer, its configuration, or the registry.
///
/// Configuration problems are reported when the configuration is built. Failures of the
/// memoized function itself are reported as [`ErrorKind::Computation`] and carry the
/// original [`Fault`], which is also exposed through [`std::error::Error::source`].
///
/// # Examples
///
/// ```
/// use memoria::{Expiration, ExpirationKind, TimeUnit};
///
/// let error = Expiration::build(ExpirationKind::Relative, -5, TimeUnit::Seconds).unwrap_err();
/// assert!(error.is_configuration());
/// ```
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(#[from] ErrorKind);

/// The specific reason behind an [`Error`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The expiration kind is not supported.
    #[error("unsupported expiration kind '{0}', only relative (sliding) expiration is supported")]
    UnsupportedKind(Cow<'static, str>),

    /// The expiration time unit is not recognized.
    #[error("unsupported expiration time unit '{0}'")]
    UnsupportedUnit(Cow<'static, str>),

    /// The expiration value is negative.
    #[error("expiration value must be non-negative, got {0}")]
    NegativeValue(i64),

    /// The expiration value cannot be represented as a duration, or could not be parsed.
    #[error("{0}")]
    OutOfRange(Cow<'static, str>),

    /// The memoized function failed.
    #[error("memoized function '{function}' failed")]
    Computation {
        /// The key of the function that failed.
        function: FunctionKey,
        /// The failure returned by the function.
        #[source]
        fault: Fault,
    },

    /// The memoizer was disposed and no longer holds a cache.
    #[error("memoizer for '{0}' has been disposed")]
    Disposed(FunctionKey),

    /// A registry entry did not have the type expected by the caller.
    #[error("shared memoizer for '{0}' has an unexpected type signature")]
    SignatureMismatch(FunctionKey),
}

impl Error {
    pub(crate) const fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) fn out_of_range(message: impl Into<Cow<'static, str>>) -> Self {
        Self::from_kind(ErrorKind::OutOfRange(message.into()))
    }

    pub(crate) fn computation(function: FunctionKey, fault: Fault) -> Self {
        Self::from_kind(ErrorKind::Computation { function, fault })
    }

    pub(crate) fn disposed(function: FunctionKey) -> Self {
        Self::from_kind(ErrorKind::Disposed(function))
    }

    /// Returns the reason for this error.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Returns the fault of the memoized function, if this is a computation failure.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match &self.0 {
            ErrorKind::Computation { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Returns `true` if this error was caused by an invalid expiration configuration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::UnsupportedKind(_) | ErrorKind::UnsupportedUnit(_) | ErrorKind::NegativeValue(_) | ErrorKind::OutOfRange(_)
        )
    }

    /// Returns `true` if the memoizer had already been disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self.0, ErrorKind::Disposed(_))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Error: Send, Sync);
    }

    #[test]
    fn negative_value_message() {
        let error = Error::from_kind(ErrorKind::NegativeValue(-3));

        assert!(error.is_configuration());
        assert_eq!(error.to_string(), "expiration value must be non-negative, got -3");
    }

    #[test]
    fn computation_exposes_fault_as_source() {
        let fault: Fault = Arc::new(std::io::Error::other("disk on fire"));
        let error = Error::computation(FunctionKey::new("read"), Arc::clone(&fault));

        assert!(!error.is_configuration());
        assert!(Arc::ptr_eq(error.fault().expect("computation error has a fault"), &fault));
        assert_eq!(error.to_string(), "memoized function 'read' failed");
        assert_eq!(error.source().expect("fault is the source").to_string(), "disk on fire");
    }

    #[test]
    fn disposed_error() {
        let error = Error::disposed(FunctionKey::new("lookup"));

        assert!(error.is_disposed());
        assert!(error.fault().is_none());
        assert!(matches!(error.kind(), ErrorKind::Disposed(key) if key.as_str() == "lookup"));
    }
}
