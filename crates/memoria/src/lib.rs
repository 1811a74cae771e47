// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memoizes function results with single-flight execution and sliding expiration.
//!
//! A [`Memoizer`] wraps a function of zero to four arguments, passed as a tuple, and
//! caches its results keyed by a [`Fingerprint`] of the arguments. The function runs at
//! most once per distinct argument tuple while the entry lives, even when many threads ask
//! for the same arguments at the same time: the first caller computes and the others block
//! until the result is available.
//!
//! # Example
//!
//! ```
//! use memoria::{Memoizer, TimeUnit};
//!
//! let lookup = Memoizer::builder("lookup", |(id,): (u32,)| format!("user-{id}"))
//!     .expires_after(10, TimeUnit::Minutes)
//!     .build()?;
//!
//! assert_eq!(lookup.invoke((7,))?, "user-7");
//! assert_eq!(lookup.invoke((7,))?, "user-7"); // served from the cache
//! # Ok::<(), memoria::Error>(())
//! ```
//!
//! # Expiration
//!
//! Entries expire after a period without access; every access restarts the period. Without
//! an [`Expiration`] entries live until they are removed, the memoizer is cleared, or it is
//! disposed.
//!
//! # Failures
//!
//! Functions built with [`Memoizer::try_builder`] may fail. A failure is cached like a value:
//! callers with the same arguments receive the same [`Fault`] until the entry is removed or
//! expires. A function that panics does not produce an entry; the panic propagates to the
//! caller that ran it and the next waiting caller runs the function again.
//!
//! # Sharing
//!
//! A [`Registry`] shares memoizers between independent parts of an application. Memoizers
//! built with [`MemoizerBuilder::shared`] for the same [`FunctionKey`], expiration, and
//! argument and value types are one and the same. The registry can also drop all memoizers
//! of a function with [`Registry::unmemoize`], or a single cached result with
//! [`Registry::remove_from_cache`].
//!
//! # Logging
//!
//! All activity is reported as `tracing` events. Hits and misses are logged at `DEBUG`,
//! removals and lifecycle changes at `INFO`, and failures at `WARN`. A memoizer can also be
//! given a logger callback that receives one readable line per activity.

mod builder;
mod config;
mod error;
mod expiration;
mod fingerprint;
mod flight;
mod memoizer;
mod registry;
mod store;
mod telemetry;

#[doc(inline)]
pub use builder::MemoizerBuilder;
#[doc(inline)]
pub use config::{FunctionKey, Logger, MemoizerConfig};
#[doc(inline)]
pub use error::{Error, ErrorKind, Fault, Result};
#[doc(inline)]
pub use expiration::{Expiration, ExpirationKind, MAX_TIME_TO_IDLE, TimeUnit};
#[doc(inline)]
pub use fingerprint::{Argument, Arguments, Fingerprint};
#[doc(inline)]
pub use memoizer::{Memoizer, MemoizerStats};
#[doc(inline)]
pub use registry::Registry;
