// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Declarative expiration settings.
//!
//! An [`Expiration`] is the (kind, value, unit) triple a caller configures. It is part of a
//! memoizer's identity in the registry, so `60 s` and `1 min` are different configurations
//! even though they expire after the same time.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// The longest idle time an entry may be given: 1000 years of 365 days.
pub const MAX_TIME_TO_IDLE: Duration = Duration::from_secs(1000 * 365 * 24 * 60 * 60);

/// How an expiration is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ExpirationKind {
    /// Sliding expiration: the time-to-live restarts on every access to the entry.
    #[default]
    Relative,
}

impl ExpirationKind {
    /// Returns the canonical name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relative => "relative",
        }
    }
}

impl fmt::Display for ExpirationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpirationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" | "sliding" => Ok(Self::Relative),
            other => Err(Error::from_kind(ErrorKind::UnsupportedKind(other.to_owned().into()))),
        }
    }
}

/// The unit of an expiration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Returns the short name of this unit, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "min",
            Self::Hours => "hr",
            Self::Days => "day",
        }
    }

    const fn millis(self) -> u64 {
        match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "millisecond" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "sec" | "second" | "seconds" => Ok(Self::Seconds),
            "min" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hr" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            other => Err(Error::from_kind(ErrorKind::UnsupportedUnit(other.to_owned().into()))),
        }
    }
}

/// Expiration settings of a memoizer.
///
/// A memoizer without an `Expiration` keeps its entries until they are removed, cleared,
/// or the memoizer is disposed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memoria::{Expiration, TimeUnit};
///
/// let expiration = Expiration::sliding(30, TimeUnit::Minutes);
/// assert_eq!(expiration.time_to_idle()?, Duration::from_secs(1800));
///
/// let parsed: Expiration = "30 min".parse()?;
/// assert_eq!(parsed, expiration);
/// # Ok::<(), memoria::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Expiration {
    kind: ExpirationKind,
    value: u64,
    unit: TimeUnit,
}

impl Expiration {
    /// Creates a sliding expiration of `value` units.
    #[must_use]
    pub const fn sliding(value: u64, unit: TimeUnit) -> Self {
        Self {
            kind: ExpirationKind::Relative,
            value,
            unit,
        }
    }

    /// Creates an expiration from a declarative triple, validating the value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is negative or the resulting duration cannot be
    /// represented.
    pub fn build(kind: ExpirationKind, value: i64, unit: TimeUnit) -> Result<Self> {
        let value = u64::try_from(value).map_err(|_conversion| Error::from_kind(ErrorKind::NegativeValue(value)))?;
        let expiration = Self { kind, value, unit };
        expiration.time_to_idle()?;
        Ok(expiration)
    }

    /// Returns the kind of this expiration.
    #[must_use]
    pub const fn kind(&self) -> ExpirationKind {
        self.kind
    }

    /// Returns the configured number of units.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Returns the configured unit.
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Returns how long an entry may stay idle before it expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration overflows or exceeds [`MAX_TIME_TO_IDLE`].
    pub fn time_to_idle(&self) -> Result<Duration> {
        let time_to_idle = match self.kind {
            ExpirationKind::Relative => self
                .value
                .checked_mul(self.unit.millis())
                .map(Duration::from_millis)
                .ok_or_else(|| Error::out_of_range(format!("expiration of {self} does not fit in a duration")))?,
        };

        if time_to_idle > MAX_TIME_TO_IDLE {
            return Err(Error::out_of_range(format!("expiration of {self} is longer than 1000 years")));
        }

        Ok(time_to_idle)
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.value, self.unit, self.kind)
    }
}

impl FromStr for Expiration {
    type Err = Error;

    /// Parses `"<value> <unit>"` or `"<value><unit>"`, for example `"30 min"` or `"500ms"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit() && c != '-').unwrap_or(s.len());
        let (value, unit) = s.split_at(split);

        let value = value
            .parse::<i64>()
            .map_err(|_parse| Error::out_of_range(format!("invalid expiration value in '{s}'")))?;

        Self::build(ExpirationKind::Relative, value, unit.parse()?)
    }
}
