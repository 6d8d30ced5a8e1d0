use std::time::Duration;

use crate::delay::sleep;
use crate::error::PanicError;
use crate::wrap::{Outcome, promise_wrapper};

/// Fixed-delay retry settings for [`retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			attempts: 3,
			delay: Duration::from_secs(1),
		}
	}
}

impl RetryPolicy {
	/// Sets the total number of calls, including the first.
	#[must_use]
	pub fn attempts(mut self, attempts: u32) -> Self {
		self.attempts = attempts;
		self
	}

	/// Sets the fixed wait after each failed call.
	#[must_use]
	pub fn delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Runs [`retry`] with this policy.
	pub async fn run<T, E, F, R>(&self, callable: F) -> Result<T, E>
	where
		E: From<PanicError>,
		F: FnMut() -> R,
		R: Into<Outcome<T, E>>,
	{
		retry(callable, self.attempts, self.delay).await
	}
}

/// Calls `callable` until it succeeds or `attempts` calls have failed.
///
/// Failed calls are followed by a fixed `delay` before the next one. The last
/// error is returned as is. An `attempts` of 0 behaves like 1. A panicking
/// call counts as a failed attempt with a [`PanicError`].
pub async fn retry<T, E, F, R>(mut callable: F, attempts: u32, delay: Duration) -> Result<T, E>
where
	E: From<PanicError>,
	F: FnMut() -> R,
	R: Into<Outcome<T, E>>,
{
	let mut remaining = attempts;
	loop {
		match promise_wrapper(&mut callable).await {
			Ok(value) => return Ok(value),
			Err(err) if remaining <= 1 => return Err(err),
			Err(_) => {
				remaining -= 1;
				tracing::trace!(remaining, delay_ms = delay.as_millis() as u64, "promise.retry.again");
				sleep(delay).await;
			}
		}
	}
}
