//! Deadline races.
//!
//! The raced future is started right away and keeps running when the deadline
//! wins; only its result is discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

use crate::deferred::{Deferred, Promise, create_deferred};
use crate::delay::deadline_after;
use crate::error::TimeoutError;
use crate::spawn::spawn_detached;

/// Re-arms the deadline of a [`with_extendable_timeout`] race.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
	deadline: Arc<watch::Sender<Instant>>,
	timeout: Duration,
}

impl TimeoutHandle {
	/// Restarts the full timeout window from now.
	///
	/// Has no effect once the race has been decided.
	pub fn reset_timeout(&self) {
		let deadline = deadline_after(self.timeout);
		tracing::trace!(timeout_ms = self.timeout.as_millis() as u64, "promise.timeout.reset");
		self.deadline.send_replace(deadline);
	}

	/// Returns the window each reset re-arms.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

/// Result of [`with_extendable_timeout`].
#[derive(Debug)]
pub struct ExtendableTimeout<T, E> {
	pub promise: Promise<T, E>,
	pub handle: TimeoutHandle,
}

/// Races `fut` against a deadline `timeout` from now.
///
/// The deadline rejects with a [`TimeoutError`] carrying `message`, or
/// `Operation timed out after {timeout}ms` when none is given.
pub fn with_timeout<T, E, F>(fut: F, timeout: Duration, message: Option<&str>) -> Promise<T, E>
where
	T: Send + 'static,
	E: From<TimeoutError> + Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	with_extendable_timeout(fut, timeout, message).promise
}

/// Like [`with_timeout`], but the deadline can be pushed back through the
/// returned [`TimeoutHandle`].
pub fn with_extendable_timeout<T, E, F>(fut: F, timeout: Duration, message: Option<&str>) -> ExtendableTimeout<T, E>
where
	T: Send + 'static,
	E: From<TimeoutError> + Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	let (tx, mut rx) = watch::channel(deadline_after(timeout));
	let tx = Arc::new(tx);
	let handle = TimeoutHandle {
		deadline: Arc::clone(&tx),
		timeout,
	};
	let error = TimeoutError::new(timeout, message);
	let inner = Promise::spawn(fut);
	let Deferred { promise, resolver } = create_deferred();

	spawn_detached("promise.timeout", async move {
		// Holding a sender keeps `changed` from ever failing.
		let _keep = tx;
		tokio::pin!(inner);
		loop {
			let deadline = *rx.borrow_and_update();
			tokio::select! {
				biased;
				outcome = &mut inner => {
					resolver.settle(outcome);
					return;
				}
				changed = rx.changed() => {
					if changed.is_err() {
						return;
					}
				}
				_ = sleep_until(deadline) => {
					tracing::debug!(timeout_ms = error.after().as_millis() as u64, "promise.timeout.expired");
					resolver.reject(E::from(error));
					return;
				}
			}
		}
	});

	ExtendableTimeout { promise, handle }
}
