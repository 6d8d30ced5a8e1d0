//! Coalescing scheduler: the latest submission wins.
//!
//! Every [`StackBuilder::submit`] call is tagged with the next sequence id of
//! its builder. When a submitted future resolves, it is only acted upon if no
//! newer submission has arrived in the meantime. With `resolve_all_previous`
//! enabled the winner resolves every promise handed out since the previous
//! winner; otherwise only its own.
//!
//! Rejections are never broadcast: a rejected submission rejects its own
//! promise and leaves the waiter list alone.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::deferred::{Deferred, Promise, Resolver, create_deferred};
use crate::spawn::spawn_detached;
use crate::token::SequenceClock;

struct StackState<T, E> {
	clock: SequenceClock,
	waiters: Vec<Resolver<T, E>>,
}

/// Builder instance for one coalescing stream.
///
/// Clones share the same stream.
pub struct StackBuilder<T, E> {
	state: Arc<Mutex<StackState<T, E>>>,
	resolve_all_previous: bool,
}

impl<T, E> Clone for StackBuilder<T, E> {
	fn clone(&self) -> Self {
		Self {
			state: Arc::clone(&self.state),
			resolve_all_previous: self.resolve_all_previous,
		}
	}
}

impl<T, E> Default for StackBuilder<T, E> {
	fn default() -> Self {
		Self::new(true)
	}
}

impl<T, E> std::fmt::Debug for StackBuilder<T, E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("StackBuilder")
			.field("resolve_all_previous", &self.resolve_all_previous)
			.field("last_id", &state.clock.current())
			.field("waiters", &state.waiters.len())
			.finish()
	}
}

impl<T, E> StackBuilder<T, E> {
	/// Creates an empty coalescing stream.
	pub fn new(resolve_all_previous: bool) -> Self {
		Self {
			state: Arc::new(Mutex::new(StackState {
				clock: SequenceClock::new(),
				waiters: Vec::new(),
			})),
			resolve_all_previous,
		}
	}

	/// Returns whether a winner also resolves every earlier waiter.
	pub fn resolve_all_previous(&self) -> bool {
		self.resolve_all_previous
	}

	/// Number of promises waiting for the next winner.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.len()
	}
}

impl<T, E> StackBuilder<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// Submits `fut` and returns a promise for the value this stream settles on.
	///
	/// The future starts running immediately.
	pub fn submit<F>(&self, fut: F) -> Promise<T, E>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		let Deferred { promise, resolver } = create_deferred();
		let id = {
			let mut state = self.state.lock();
			let id = state.clock.next();
			if self.resolve_all_previous {
				state.waiters.push(resolver.clone());
			}
			id
		};
		tracing::trace!(id, resolve_all_previous = self.resolve_all_previous, "promise.stack.submit");

		let state = Arc::clone(&self.state);
		let resolve_all_previous = self.resolve_all_previous;
		spawn_detached("promise.stack", async move {
			let value = match fut.await {
				Ok(value) => value,
				Err(err) => {
					resolver.reject(err);
					return;
				}
			};

			let waiters = {
				let mut state = state.lock();
				if !state.clock.is_current(id) {
					tracing::debug!(id, latest = state.clock.current(), "promise.stack.stale");
					return;
				}
				std::mem::take(&mut state.waiters)
			};

			if resolve_all_previous {
				tracing::trace!(id, waiters = waiters.len(), "promise.stack.won");
				for waiter in waiters {
					waiter.resolve(value.clone());
				}
			} else {
				tracing::trace!(id, "promise.stack.won");
				resolver.resolve(value);
			}
		});

		promise
	}
}
