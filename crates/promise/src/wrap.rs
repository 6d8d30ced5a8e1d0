use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::PanicError;

/// What a wrapped callable produced: a value or error right away, or a future
/// that will settle later.
pub enum Outcome<T, E> {
	Ready(Result<T, E>),
	Pending(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> Outcome<T, E> {
	/// Ready success.
	pub fn value(value: T) -> Self {
		Self::Ready(Ok(value))
	}

	/// Ready failure.
	pub fn error(error: E) -> Self {
		Self::Ready(Err(error))
	}

	/// Boxes `fut` as a pending outcome.
	pub fn future<F>(fut: F) -> Self
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		Self::Pending(Box::pin(fut))
	}
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
	fn from(result: Result<T, E>) -> Self {
		Self::Ready(result)
	}
}

impl<T, E> From<BoxFuture<'static, Result<T, E>>> for Outcome<T, E> {
	fn from(fut: BoxFuture<'static, Result<T, E>>) -> Self {
		Self::Pending(fut)
	}
}

impl<T, E> fmt::Debug for Outcome<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Ready(result) => f.debug_tuple("Ready").field(&if result.is_ok() { "Ok" } else { "Err" }).finish(),
			Self::Pending(_) => f.write_str("Pending"),
		}
	}
}

/// Future returned by [`promise_wrapper`].
#[must_use = "futures do nothing unless awaited"]
pub struct Wrapped<T, E> {
	state: WrappedState<T, E>,
}

enum WrappedState<T, E> {
	Ready(Option<Result<T, E>>),
	Pending(BoxFuture<'static, Result<T, E>>),
}

// The ready value is never pinned and the pending future is already boxed.
impl<T, E> Unpin for Wrapped<T, E> {}

impl<T, E> Future for Wrapped<T, E>
where
	E: From<PanicError>,
{
	type Output = Result<T, E>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let payload = match &mut self.state {
			WrappedState::Ready(result) => match result.take() {
				Some(result) => return Poll::Ready(result),
				None => panic!("Wrapped polled after completion"),
			},
			WrappedState::Pending(fut) => match catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(cx))) {
				Ok(poll) => return poll,
				Err(payload) => payload,
			},
		};
		let err = PanicError::from_payload(payload);
		tracing::debug!(error = %err, "promise.wrap.panicked");
		self.state = WrappedState::Ready(None);
		Poll::Ready(Err(E::from(err)))
	}
}

/// Normalizes a synchronous or asynchronous callable into a future.
///
/// `callable` runs immediately, inside this call. An `Err` it returns
/// becomes the future's error instead of surfacing here; a future it returns
/// is forwarded as is. A panic, either in `callable` or while the returned
/// future is polled, becomes a [`PanicError`] rejection.
pub fn promise_wrapper<T, E, F, R>(callable: F) -> Wrapped<T, E>
where
	E: From<PanicError>,
	F: FnOnce() -> R,
	R: Into<Outcome<T, E>>,
{
	let state = match catch_unwind(AssertUnwindSafe(|| callable().into())) {
		Ok(Outcome::Ready(result)) => WrappedState::Ready(Some(result)),
		Ok(Outcome::Pending(fut)) => WrappedState::Pending(fut),
		Err(payload) => {
			let err = PanicError::from_payload(payload);
			tracing::debug!(error = %err, "promise.wrap.panicked");
			WrappedState::Ready(Some(Err(E::from(err))))
		}
	};
	Wrapped { state }
}

/// Calls `call` and awaits its future, turning a panic in either into a
/// [`PanicError`] rejection.
pub(crate) async fn catch_panics<T, E, F, Fut>(call: F) -> Result<T, E>
where
	E: From<PanicError>,
	F: FnOnce() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let fut = match catch_unwind(AssertUnwindSafe(call)) {
		Ok(fut) => fut,
		Err(payload) => return Err(E::from(PanicError::from_payload(payload))),
	};
	match AssertUnwindSafe(fut).catch_unwind().await {
		Ok(result) => result,
		Err(payload) => Err(E::from(PanicError::from_payload(payload))),
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;

	fn explode(message: &str) -> Result<u32, String> {
		panic!("{message}")
	}

	#[tokio::test]
	async fn wraps_plain_value() {
		let wrapped = promise_wrapper(|| Ok::<_, String>(5));
		assert_eq!(wrapped.await, Ok(5));
	}

	#[tokio::test]
	async fn sync_error_becomes_rejection() {
		let wrapped = promise_wrapper(|| Err::<u32, _>("thrown".to_owned()));
		assert_eq!(wrapped.await, Err("thrown".to_owned()));
	}

	#[tokio::test]
	async fn forwards_async_result() {
		let ok = promise_wrapper(|| Outcome::future(async { Ok::<_, String>("later") }));
		assert_eq!(ok.await, Ok("later"));

		let err = promise_wrapper(|| async { Err::<u32, _>("async failure".to_owned()) }.boxed());
		assert_eq!(err.await, Err("async failure".to_owned()));
	}

	#[test]
	fn callable_runs_inside_the_call() {
		let calls = Cell::new(0);
		let wrapped = promise_wrapper(|| {
			calls.set(calls.get() + 1);
			Outcome::<u32, String>::value(1)
		});
		assert_eq!(calls.get(), 1);
		assert_eq!(wrapped.now_or_never(), Some(Ok(1)));
	}

	#[tokio::test]
	async fn panic_in_callable_becomes_rejection() {
		let wrapped = promise_wrapper(|| -> Result<u32, String> { panic!("Test error") });
		assert_eq!(wrapped.await, Err("Test error".to_owned()));
	}

	#[tokio::test]
	async fn panic_in_returned_future_becomes_rejection() {
		let wrapped = promise_wrapper(|| Outcome::future(async { explode("late failure") }));
		assert_eq!(wrapped.await, Err("late failure".to_owned()));
	}

	#[tokio::test]
	async fn catch_panics_covers_call_and_future() {
		let sync: Result<u32, String> = catch_panics(|| -> std::future::Ready<Result<u32, String>> { panic!("in call") }).await;
		assert_eq!(sync, Err("in call".to_owned()));

		let in_future: Result<u32, String> = catch_panics(|| async { explode("in future") }).await;
		assert_eq!(in_future, Err("in future".to_owned()));

		let fine: Result<u32, String> = catch_panics(|| async { Ok(4) }).await;
		assert_eq!(fine, Ok(4));
	}
}
