// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Barrier;
use std::thread;

/// Runs one operation on a fixed set of threads that are released at the same instant.
///
/// Every iteration has two phases separated by a barrier: all threads first wait until
/// every thread is ready, then run the operation together and wait until every thread is
/// done before the next iteration starts. This maximizes contention on whatever the
/// operation touches.
///
/// The operation receives the thread index and the iteration index. A panic in the
/// operation leaves the other threads blocked at the barrier, so wrap the harness in
/// [`execute_or_abandon`](crate::execute_or_abandon) when that can happen.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use testing_aids::ConcurrentHarness;
///
/// let counter = AtomicUsize::new(0);
/// let results = ConcurrentHarness::new(4)
///     .iterations(3)
///     .run(|_thread, _iteration| counter.fetch_add(1, Ordering::Relaxed));
///
/// assert_eq!(results.len(), 12);
/// assert_eq!(counter.load(Ordering::Relaxed), 12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentHarness {
    threads: usize,
    iterations: usize,
}

impl ConcurrentHarness {
    /// Creates a harness that runs one iteration on `threads` threads.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "thread count must be greater than zero, got {threads}");

        Self { threads, iterations: 1 }
    }

    /// Sets how many times every thread runs the operation.
    ///
    /// # Panics
    ///
    /// Panics if `iterations` is zero.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        assert!(iterations > 0, "iteration count must be greater than zero, got {iterations}");

        self.iterations = iterations;
        self
    }

    /// Returns the number of threads.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `operation` on every thread for every iteration and collects the results.
    pub fn run<F, R>(&self, operation: F) -> HarnessResults<R>
    where
        F: Fn(usize, usize) -> R + Sync,
        R: Send,
    {
        let barrier = Barrier::new(self.threads);
        let iterations = self.iterations;

        let results = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.threads)
                .map(|thread_index| {
                    let barrier = &barrier;
                    let operation = &operation;
                    scope.spawn(move || {
                        (0..iterations)
                            .map(|iteration| {
                                barrier.wait();
                                let result = operation(thread_index, iteration);
                                barrier.wait();
                                result
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
                .collect()
        });

        HarnessResults {
            threads: self.threads,
            iterations,
            results,
        }
    }
}

/// The results of [`ConcurrentHarness::run`], indexed by thread and iteration.
#[derive(Debug)]
pub struct HarnessResults<R> {
    threads: usize,
    iterations: usize,
    results: Vec<Vec<R>>,
}

impl<R> HarnessResults<R> {
    /// Returns the result of one thread in one iteration.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn get(&self, thread: usize, iteration: usize) -> &R {
        assert!(
            thread < self.threads,
            "thread index out of range: {thread} (the harness ran {} threads)",
            self.threads
        );
        assert!(
            iteration < self.iterations,
            "iteration index out of range: {iteration} (the harness ran {} iterations)",
            self.iterations
        );

        &self.results[thread][iteration]
    }

    /// Returns the results of every thread for one iteration, ordered by thread index.
    ///
    /// # Panics
    ///
    /// Panics if `iteration` is out of range.
    pub fn iteration(&self, iteration: usize) -> impl Iterator<Item = &R> {
        assert!(
            iteration < self.iterations,
            "iteration index out of range: {iteration} (the harness ran {} iterations)",
            self.iterations
        );

        self.results.iter().map(move |per_thread| &per_thread[iteration])
    }

    /// Returns every result, grouped by thread.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.results.iter().flatten()
    }

    /// Returns the total number of results.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.threads * self.iterations
    }

    /// Always `false`; a harness runs at least one thread for at least one iteration.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: PartialEq> HarnessResults<R> {
    /// Returns `true` if every thread observed the same result in every iteration.
    #[must_use]
    pub fn all_equal(&self) -> bool {
        let mut results = self.iter();
        results.next().is_none_or(|first| results.all(|result| result == first))
    }
}
