use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::deferred::{Deferred, Promise, create_deferred};
use crate::error::CancelledError;
use crate::spawn::spawn_detached;

/// Marks a [`make_cancellable`] promise as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
	token: CancellationToken,
}

impl CancelHandle {
	/// Cancels the promise. Idempotent.
	pub fn cancel(&self) {
		if !self.token.is_cancelled() {
			tracing::trace!("promise.cancel");
		}
		self.token.cancel();
	}

	/// Returns `true` once any clone of this handle has cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

/// Result of [`make_cancellable`].
#[derive(Debug)]
pub struct Cancellable<T, E> {
	pub promise: Promise<T, E>,
	pub handle: CancelHandle,
}

/// Wraps `fut` so its outcome can be replaced with a [`CancelledError`].
///
/// Cancellation is checked when `fut` settles, not when `cancel` is called:
/// the wrapped future always runs to completion, and if the handle was
/// cancelled by then its value or error is discarded in favour of the
/// cancellation. Cancelling after the outcome was delivered does nothing.
pub fn make_cancellable<T, E, F>(fut: F) -> Cancellable<T, E>
where
	T: Send + 'static,
	E: From<CancelledError> + Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	let handle = CancelHandle::default();
	let token = handle.token.clone();
	let Deferred { promise, resolver } = create_deferred();

	spawn_detached("promise.cancellable", async move {
		let outcome = fut.await;
		if token.is_cancelled() {
			tracing::debug!("promise.cancel.discarded");
			resolver.reject(E::from(CancelledError));
		} else {
			resolver.settle(outcome);
		}
	});

	Cancellable { promise, handle }
}
