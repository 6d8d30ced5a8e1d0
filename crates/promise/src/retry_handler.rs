//! Validated retries with a growing delay.
//!
//! This is a separate policy from [`crate::retry`] with its own option
//! surface: every action result goes through a required validation check,
//! and the wait between attempts grows by a fixed factor before each retry.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::delay::sleep;
use crate::error::{PanicError, RetryConfigError};
use crate::wrap::{Outcome, catch_panics, promise_wrapper};

/// Accepts or rejects an action result, synchronously or not.
pub type ValidationCheck<T, U, E> = Box<dyn FnMut(T) -> Outcome<U, E> + Send>;

/// Options for [`retry_handler`].
pub struct RetryHandlerOptions<A, T, U, E> {
	/// Passed to every action invocation, cloned per attempt.
	pub args: A,
	pub validation_check: Option<ValidationCheck<T, U, E>>,
	/// Base wait between attempts, grown before each retry.
	pub retry_timeout: Duration,
	/// Growth factor: each retry waits `previous * factor + previous`.
	pub timeout_adjustment: f64,
	pub max_retry_attempts: u32,
	/// Action name used in diagnostics.
	pub name: String,
}

impl<A, T, U, E> RetryHandlerOptions<A, T, U, E> {
	/// Creates options with the default timings and no validation check.
	pub fn new(args: A) -> Self {
		Self {
			args,
			validation_check: None,
			retry_timeout: Duration::from_secs(10),
			timeout_adjustment: 0.0,
			max_retry_attempts: 5,
			name: "action".to_owned(),
		}
	}

	/// Sets the check every action result must pass.
	#[must_use]
	pub fn validation_check<F, R>(mut self, mut check: F) -> Self
	where
		F: FnMut(T) -> R + Send + 'static,
		R: Into<Outcome<U, E>>,
	{
		self.validation_check = Some(Box::new(move |value| check(value).into()));
		self
	}

	/// Sets the base wait between attempts.
	#[must_use]
	pub fn retry_timeout(mut self, retry_timeout: Duration) -> Self {
		self.retry_timeout = retry_timeout;
		self
	}

	/// Sets the growth factor applied before each retry.
	#[must_use]
	pub fn timeout_adjustment(mut self, timeout_adjustment: f64) -> Self {
		self.timeout_adjustment = timeout_adjustment;
		self
	}

	/// Sets the total number of attempts.
	#[must_use]
	pub fn max_retry_attempts(mut self, max_retry_attempts: u32) -> Self {
		self.max_retry_attempts = max_retry_attempts;
		self
	}

	/// Sets the action name used in diagnostics.
	#[must_use]
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}
}

impl<A: Default, T, U, E> Default for RetryHandlerOptions<A, T, U, E> {
	fn default() -> Self {
		Self::new(A::default())
	}
}

impl<A: fmt::Debug, T, U, E> fmt::Debug for RetryHandlerOptions<A, T, U, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RetryHandlerOptions")
			.field("args", &self.args)
			.field("validation_check", &self.validation_check.is_some())
			.field("retry_timeout", &self.retry_timeout)
			.field("timeout_adjustment", &self.timeout_adjustment)
			.field("max_retry_attempts", &self.max_retry_attempts)
			.field("name", &self.name)
			.finish()
	}
}

/// Runs `action` until its result passes validation or attempts run out.
///
/// Fails synchronously with [`RetryConfigError::MissingValidation`] when no
/// validation check is configured. Otherwise returns a future that resolves
/// with the first validated result, or the last error once
/// `max_retry_attempts` attempts have failed. A `max_retry_attempts` of 0
/// behaves like 1. Panics in the action or the validation check count as
/// failed attempts with a [`PanicError`].
pub fn retry_handler<A, T, U, E, F, Fut>(mut action: F, options: RetryHandlerOptions<A, T, U, E>) -> Result<impl Future<Output = Result<U, E>>, RetryConfigError>
where
	A: Clone,
	F: FnMut(A) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: From<PanicError> + fmt::Display,
{
	let RetryHandlerOptions {
		args,
		validation_check,
		retry_timeout,
		timeout_adjustment,
		max_retry_attempts,
		name,
	} = options;
	let Some(mut validation_check) = validation_check else {
		return Err(RetryConfigError::MissingValidation);
	};
	let max_attempts = max_retry_attempts.max(1);

	Ok(async move {
		let mut delay = retry_timeout;
		let mut attempt = 1;
		loop {
			tracing::info!(action = %name, attempt, max_attempts, "promise.retry_handler.attempt");
			let outcome = match catch_panics(|| action(args.clone())).await {
				Ok(value) => promise_wrapper(|| validation_check(value)).await,
				Err(err) => Err(err),
			};
			match outcome {
				Ok(result) => {
					tracing::info!(action = %name, attempt, max_attempts, "promise.retry_handler.succeeded");
					return Ok(result);
				}
				Err(err) if attempt < max_attempts => {
					tracing::warn!(action = %name, attempt, max_attempts, error = %err, "promise.retry_handler.failed");
					delay = grow(delay, timeout_adjustment);
					attempt += 1;
					tracing::info!(action = %name, delay_ms = delay.as_millis() as u64, "promise.retry_handler.scheduled");
					sleep(delay).await;
				}
				Err(err) => {
					tracing::error!(action = %name, attempt, max_attempts, error = %err, "promise.retry_handler.failed");
					tracing::error!(action = %name, reason = "maximum allowed retries exceeded", "promise.retry_handler.exhausted");
					return Err(err);
				}
			}
		}
	})
}

/// `delay * factor + delay`, saturating at zero and `u64::MAX` nanoseconds.
fn grow(delay: Duration, factor: f64) -> Duration {
	let nanos = delay.as_nanos() as f64;
	Duration::from_nanos((nanos * factor + nanos) as u64)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicU32, Ordering};

	use parking_lot::Mutex;
	use tokio::time::Instant;

	use super::*;

	#[test]
	fn missing_validation_fails_synchronously() {
		let options = RetryHandlerOptions::<(), u32, u32, String>::default();
		let result = retry_handler(|()| async { Ok::<u32, String>(1) }, options);
		assert!(matches!(result, Err(RetryConfigError::MissingValidation)));
	}

	#[test]
	fn defaults() {
		let options = RetryHandlerOptions::<u8, u32, u32, String>::default();
		assert_eq!(options.args, 0);
		assert!(options.validation_check.is_none());
		assert_eq!(options.retry_timeout, Duration::from_secs(10));
		assert_eq!(options.timeout_adjustment, 0.0);
		assert_eq!(options.max_retry_attempts, 5);
	}

	#[test]
	fn delay_grows_by_factor() {
		assert_eq!(grow(Duration::from_millis(100), 0.0), Duration::from_millis(100));
		assert_eq!(grow(Duration::from_millis(100), 1.0), Duration::from_millis(200));
		assert_eq!(grow(Duration::from_millis(100), 0.5), Duration::from_millis(150));
		assert_eq!(grow(Duration::from_millis(100), -3.0), Duration::ZERO);
		assert_eq!(grow(Duration::MAX, 1.0), Duration::from_nanos(u64::MAX));
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn resolves_with_validated_result() {
		let options = RetryHandlerOptions::new(20u32).validation_check(|n: u32| Ok::<_, String>(n + 1));
		let handler = retry_handler(|n| async move { Ok(n * 2) }, options).unwrap();
		assert_eq!(handler.await, Ok(41));
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn validation_rejection_triggers_retry_with_growing_delay() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);
		let start = Instant::now();
		let options = RetryHandlerOptions::new(())
			.validation_check(|n: u32| if n < 3 { Outcome::error(format!("only {n}")) } else { Outcome::future(async move { Ok(n) }) })
			.retry_timeout(Duration::from_millis(100))
			.timeout_adjustment(1.0)
			.max_retry_attempts(5)
			.name("count");
		let handler = retry_handler(
			move |()| {
				let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
				async move { Ok(n) }
			},
			options,
		)
		.unwrap();

		assert_eq!(handler.await, Ok(3));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert_eq!(start.elapsed(), Duration::from_millis(200 + 400));
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn exhausted_attempts_return_last_error() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let log = Arc::clone(&seen);
		let start = Instant::now();
		let options = RetryHandlerOptions::new("payload".to_owned())
			.validation_check(|v: u32| Ok::<_, String>(v))
			.retry_timeout(Duration::from_millis(50))
			.max_retry_attempts(3);
		let handler = retry_handler(
			move |args: String| {
				log.lock().push(args);
				let attempt = log.lock().len();
				async move { Err::<u32, _>(format!("attempt {attempt} failed")) }
			},
			options,
		)
		.unwrap();

		assert_eq!(handler.await, Err("attempt 3 failed".to_owned()));
		assert_eq!(*seen.lock(), vec!["payload".to_owned(); 3]);
		assert_eq!(start.elapsed(), Duration::from_millis(100));
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn zero_attempts_behaves_like_one() {
		let calls = AtomicU32::new(0);
		let options = RetryHandlerOptions::new(()).validation_check(|v: u32| Ok::<_, String>(v)).max_retry_attempts(0);
		let handler = retry_handler(
			|()| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Err::<u32, _>("no".to_owned()) }
			},
			options,
		)
		.unwrap();
		assert_eq!(handler.await, Err("no".to_owned()));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn panics_count_as_failed_attempts() {
		let calls = AtomicU32::new(0);
		let options = RetryHandlerOptions::new(())
			.validation_check(|v: u32| -> Result<u32, String> {
				if v == 2 {
					panic!("validation blew up");
				}
				Ok(v)
			})
			.retry_timeout(Duration::from_millis(10))
			.max_retry_attempts(3);
		let handler = retry_handler(
			|()| {
				let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
				if n == 1 {
					panic!("action blew up");
				}
				async move { Ok::<u32, String>(n) }
			},
			options,
		)
		.unwrap();

		assert_eq!(handler.await, Ok(3));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}
}
