//! Racing scheduler: the first settlement wins.
//!
//! Submissions join the current round. The first of them to resolve wins the
//! round: the round counter advances inside the same critical section that
//! detected the win, so any other settlement from that round is dropped. A
//! submission made after the win (including one made while the winner is
//! still broadcasting) starts the next round.
//!
//! As with [`crate::StackBuilder`], rejections only reach the rejecting
//! submission's own promise and do not end the round.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::deferred::{Deferred, Promise, Resolver, create_deferred};
use crate::spawn::spawn_detached;
use crate::token::SequenceClock;

struct RaceState<T, E> {
	/// Win guard: the round a settlement must belong to in order to win.
	round: SequenceClock,
	waiters: Vec<Resolver<T, E>>,
}

/// Builder instance for one racing stream.
///
/// Clones share the same stream.
pub struct RaceBuilder<T, E> {
	state: Arc<Mutex<RaceState<T, E>>>,
	resolve_all_others: bool,
}

impl<T, E> Clone for RaceBuilder<T, E> {
	fn clone(&self) -> Self {
		Self {
			state: Arc::clone(&self.state),
			resolve_all_others: self.resolve_all_others,
		}
	}
}

impl<T, E> Default for RaceBuilder<T, E> {
	fn default() -> Self {
		Self::new(true)
	}
}

impl<T, E> std::fmt::Debug for RaceBuilder<T, E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("RaceBuilder")
			.field("resolve_all_others", &self.resolve_all_others)
			.field("round", &state.round.current())
			.field("waiters", &state.waiters.len())
			.finish()
	}
}

impl<T, E> RaceBuilder<T, E> {
	/// Creates an empty racing stream.
	pub fn new(resolve_all_others: bool) -> Self {
		let mut round = SequenceClock::new();
		round.next();
		Self {
			state: Arc::new(Mutex::new(RaceState { round, waiters: Vec::new() })),
			resolve_all_others,
		}
	}

	/// Returns whether a winner also resolves every other waiter.
	pub fn resolve_all_others(&self) -> bool {
		self.resolve_all_others
	}

	/// Number of promises waiting on the current round.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.len()
	}
}

impl<T, E> RaceBuilder<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// Submits `fut` into the current round.
	///
	/// The future starts running immediately.
	pub fn submit<F>(&self, fut: F) -> Promise<T, E>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		let Deferred { promise, resolver } = create_deferred();
		let round = {
			let mut state = self.state.lock();
			if self.resolve_all_others {
				state.waiters.push(resolver.clone());
			}
			state.round.current()
		};
		tracing::trace!(round, resolve_all_others = self.resolve_all_others, "promise.race.submit");

		let state = Arc::clone(&self.state);
		let resolve_all_others = self.resolve_all_others;
		spawn_detached("promise.race", async move {
			let value = match fut.await {
				Ok(value) => value,
				Err(err) => {
					resolver.reject(err);
					return;
				}
			};

			let waiters = {
				let mut state = state.lock();
				if !state.round.is_current(round) {
					tracing::debug!(round, current = state.round.current(), "promise.race.lost");
					return;
				}
				state.round.next();
				std::mem::take(&mut state.waiters)
			};

			if resolve_all_others {
				tracing::trace!(round, waiters = waiters.len(), "promise.race.won");
				for waiter in waiters {
					waiter.resolve(value.clone());
				}
			} else {
				tracing::trace!(round, "promise.race.won");
				resolver.resolve(value);
			}
		});

		promise
	}
}
