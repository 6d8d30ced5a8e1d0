use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::spawn::spawn_detached;

/// Single-resolution future settled through a [`Resolver`].
///
/// A promise whose resolvers are all dropped without settling it stays
/// pending forever; it never turns that into an error.
#[must_use = "a promise does nothing useful unless awaited"]
pub struct Promise<T, E> {
	rx: oneshot::Receiver<Result<T, E>>,
	abandoned: bool,
}

impl<T, E> Promise<T, E>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Starts `fut` immediately and returns a promise for its outcome.
	///
	/// The work keeps running even if the returned promise is dropped.
	pub fn spawn<F>(fut: F) -> Self
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		let Deferred { promise, resolver } = create_deferred();
		spawn_detached("promise.spawn", async move {
			resolver.settle(fut.await);
		});
		promise
	}
}

impl<T, E> Promise<T, E> {
	/// Returns a promise already resolved with `value`.
	pub fn resolved(value: T) -> Self {
		let Deferred { promise, resolver } = create_deferred();
		resolver.resolve(value);
		promise
	}

	/// Returns a promise already rejected with `error`.
	pub fn rejected(error: E) -> Self {
		let Deferred { promise, resolver } = create_deferred();
		resolver.reject(error);
		promise
	}
}

impl<T, E> Future for Promise<T, E> {
	type Output = Result<T, E>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		if self.abandoned {
			return Poll::Pending;
		}
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
			Poll::Ready(Err(_)) => {
				self.abandoned = true;
				Poll::Pending
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<T, E> fmt::Debug for Promise<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Promise").field("abandoned", &self.abandoned).finish_non_exhaustive()
	}
}

/// Settle-once handle for a [`Promise`].
///
/// Clones share the same slot: whichever clone settles first wins and every
/// later call is a no-op returning `false`.
pub struct Resolver<T, E> {
	slot: Arc<Mutex<Option<oneshot::Sender<Result<T, E>>>>>,
}

impl<T, E> Clone for Resolver<T, E> {
	fn clone(&self) -> Self {
		Self {
			slot: Arc::clone(&self.slot),
		}
	}
}

impl<T, E> Resolver<T, E> {
	/// Settles the promise with `outcome`. Returns `false` if already settled.
	pub fn settle(&self, outcome: Result<T, E>) -> bool {
		let Some(tx) = self.slot.lock().take() else {
			return false;
		};
		// The promise may already be dropped; settling still counts.
		let _ = tx.send(outcome);
		true
	}

	/// Resolves the promise with `value`. Returns `false` if already settled.
	pub fn resolve(&self, value: T) -> bool {
		self.settle(Ok(value))
	}

	/// Rejects the promise with `error`. Returns `false` if already settled.
	pub fn reject(&self, error: E) -> bool {
		self.settle(Err(error))
	}

	/// Returns `true` once any clone of this resolver has settled the promise.
	pub fn is_settled(&self) -> bool {
		self.slot.lock().is_none()
	}
}

impl<T, E> fmt::Debug for Resolver<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resolver").field("settled", &self.is_settled()).finish()
	}
}

/// A promise bundled with the resolver that controls it.
#[derive(Debug)]
pub struct Deferred<T, E> {
	pub promise: Promise<T, E>,
	pub resolver: Resolver<T, E>,
}

/// Creates a pending promise together with its resolver.
pub fn create_deferred<T, E>() -> Deferred<T, E> {
	let (tx, rx) = oneshot::channel();
	Deferred {
		promise: Promise { rx, abandoned: false },
		resolver: Resolver {
			slot: Arc::new(Mutex::new(Some(tx))),
		},
	}
}
