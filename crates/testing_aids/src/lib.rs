// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

use std::sync::mpsc;
use std::time::Duration;
use std::{env, thread};

mod concurrency;
mod log;

pub use concurrency::*;
pub use log::*;

/// If something (whatever) does not happen in a test within this time, the test will fail.
///
/// We are conservative here and allow much time - this is only to break out of deadlocks, not for any
/// situations that are actually expected.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[must_use]
pub fn is_mutation_testing() -> bool {
    env::var("MUTATION_TESTING").as_deref() == Ok("1")
}

/// Executes a thread-safe function on a background thread and abandons it if
/// it does not complete before the test timeout.
///
/// Returns `None` if the function panicked or timed out.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if is_mutation_testing() {
        // Mutations that hang must show up as "timeout" results rather than be hidden by us.
        return Some(f());
    }

    let (sender, receiver) = mpsc::channel();

    // If the function panics or never finishes, the channel is closed or stays empty
    // and recv_timeout reports an error either way.
    thread::spawn(move || {
        let result = f();
        _ = sender.send(result);
    });

    receiver.recv_timeout(TEST_TIMEOUT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_or_abandon_returns_result() {
        assert_eq!(execute_or_abandon(|| 40 + 2), Some(42));
    }

    #[test]
    fn execute_or_abandon_reports_panic_as_none() {
        assert_eq!(execute_or_abandon(|| -> u8 { panic!("intentional") }), None);
    }
}
