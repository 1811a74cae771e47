// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging of memoizer activity.
//!
//! Every activity is emitted as a `tracing` event named `memoizer.event`. When the memoizer
//! was configured with a [`Logger`], the same activity is also forwarded to it as a single
//! human-readable line.

use crate::config::{FunctionKey, Logger};
use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activity {
    /// The value was served from an existing entry.
    Hit,
    /// A new entry was inserted and its computation started.
    Miss,
    /// The function failed; the fault is now cached.
    Fault,
    /// One entry was removed on request.
    Removed,
    /// All entries were removed.
    Cleared,
    /// The memoizer released its store.
    Disposed,
    /// A shared memoizer was created by a registry.
    Registered,
    /// A shared memoizer was dropped from a registry.
    Unregistered,
}

impl Activity {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Fault => "fault",
            Self::Removed => "removed",
            Self::Cleared => "cleared",
            Self::Disposed => "disposed",
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
        }
    }
}

/// Records one activity of the memoizer for `function`.
pub(crate) fn record(function: &FunctionKey, logger: Option<&Logger>, activity: Activity, fingerprint: Option<Fingerprint>) {
    emit(function, activity, fingerprint);

    if let Some(logger) = logger {
        logger.log(&describe(function, activity, fingerprint));
    }
}

fn describe(function: &FunctionKey, activity: Activity, fingerprint: Option<Fingerprint>) -> String {
    match fingerprint {
        Some(fingerprint) => format!("memoizer '{function}' {} (fingerprint {fingerprint})", activity.as_str()),
        None => format!("memoizer '{function}' {}", activity.as_str()),
    }
}

fn emit(function: &FunctionKey, activity: Activity, fingerprint: Option<Fingerprint>) {
    let function = function.as_str();
    let activity_name = activity.as_str();
    let fingerprint = fingerprint.map(tracing::field::display);

    // Field names must match the constants in the tests below.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                memoizer.function = function,
                memoizer.activity = activity_name,
                memoizer.fingerprint = fingerprint,
                "memoizer.event"
            )
        };
    }

    match activity {
        Activity::Hit | Activity::Miss => emit_event!(debug),
        Activity::Fault => emit_event!(warn),
        Activity::Removed | Activity::Cleared | Activity::Disposed | Activity::Registered | Activity::Unregistered => {
            emit_event!(info);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use testing_aids::LogCapture;

    use super::*;

    const FUNCTION_NAME: &str = "memoizer.function";
    const ACTIVITY_NAME: &str = "memoizer.activity";
    const FINGERPRINT_NAME: &str = "memoizer.fingerprint";
    const EVENT_NAME: &str = "memoizer.event";

    #[test]
    fn describe_includes_fingerprint_when_present() {
        let key = FunctionKey::new("square");

        assert_eq!(
            describe(&key, Activity::Miss, Some(Fingerprint::Hash(42))),
            "memoizer 'square' miss (fingerprint 42)"
        );
        assert_eq!(describe(&key, Activity::Cleared, None), "memoizer 'square' cleared");
    }

    #[test]
    fn record_forwards_lines_to_logger() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let logger = Logger::new(move |line| sink.lock().push(line.to_owned()));

        record(&FunctionKey::new("f"), Some(&logger), Activity::Hit, Some(Fingerprint::NoArgs));
        record(&FunctionKey::new("f"), Some(&logger), Activity::Disposed, None);

        assert_eq!(
            *lines.lock(),
            vec!["memoizer 'f' hit (fingerprint NOARGS)".to_owned(), "memoizer 'f' disposed".to_owned()]
        );
    }

    #[test]
    fn events_carry_all_fields() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        record(&FunctionKey::new("lookup"), None, Activity::Fault, Some(Fingerprint::NullArg));

        capture.assert_contains(FUNCTION_NAME);
        capture.assert_contains(ACTIVITY_NAME);
        capture.assert_contains(FINGERPRINT_NAME);
        capture.assert_contains(EVENT_NAME);
        capture.assert_contains("lookup");
        capture.assert_contains("fault");
        capture.assert_contains("NULLARG");
    }

    #[test]
    fn info_events_are_emitted_for_lifecycle_activities() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        record(&FunctionKey::new("lifecycle"), None, Activity::Cleared, None);

        capture.assert_contains("INFO");
        capture.assert_contains("cleared");
    }
}
