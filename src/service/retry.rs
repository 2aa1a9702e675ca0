//! Bounded retry combinator.

use std::future::Future;

/// Why [`attempt`] gave up.
#[derive(Debug, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },
    /// An attempt failed with an error that must not be retried.
    Aborted(E),
}

/// Run `f` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` attempts have been made.
///
/// `f` receives the 1-based attempt number. There is no delay between
/// attempts. A `max_attempts` of zero still makes one attempt.
///
/// # Errors
///
/// Returns [`AttemptError::Aborted`] for the first error `is_retryable`
/// rejects, or [`AttemptError::Exhausted`] once the budget is spent.
pub async fn attempt<T, E, F, Fut, P>(
    mut f: F,
    max_attempts: u32,
    is_retryable: P,
) -> Result<T, AttemptError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut n = 1;
    loop {
        match f(n).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(AttemptError::Aborted(e)),
            Err(e) if n >= max_attempts => {
                return Err(AttemptError::Exhausted {
                    attempts: n,
                    last: e,
                });
            }
            Err(_) => n += 1,
        }
    }
}
