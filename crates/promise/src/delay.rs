use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::time::{Instant, Sleep, sleep_until};

pin_project! {
	/// Future that yields an optional pass-through value once a delay elapses.
	///
	/// The deadline is fixed when the future is created, not when it is first
	/// polled. There is no cancellation: awaiting it always waits the delay out.
	#[must_use = "futures do nothing unless awaited"]
	pub struct DelayFuture<T> {
		deadline: Instant,
		#[pin]
		timer: Option<Sleep>,
		value: Option<T>,
	}
}

/// The same pass-through delay under its older name.
pub type TimedFuture<T> = DelayFuture<T>;

impl<T> DelayFuture<T> {
	/// Delay that yields `None`.
	pub fn new(delay: Duration) -> Self {
		Self::from_parts(delay, None)
	}

	/// Delay that yields `Some(value)`.
	pub fn with_value(delay: Duration, value: T) -> Self {
		Self::from_parts(delay, Some(value))
	}

	fn from_parts(delay: Duration, value: Option<T>) -> Self {
		Self {
			deadline: deadline_after(delay),
			timer: None,
			value,
		}
	}

	/// Returns the instant this delay elapses at.
	pub fn deadline(&self) -> Instant {
		self.deadline
	}

	/// Runs `on_fulfilled` with the pass-through value once the delay elapses.
	pub fn then<U, F>(self, on_fulfilled: F) -> impl Future<Output = U>
	where
		F: FnOnce(Option<T>) -> U,
	{
		async move { on_fulfilled(self.await) }
	}
}

impl<T> Default for DelayFuture<T> {
	fn default() -> Self {
		Self::new(Duration::ZERO)
	}
}

impl<T> Future for DelayFuture<T> {
	type Output = Option<T>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let mut this = self.project();
		if this.timer.is_none() {
			this.timer.set(Some(sleep_until(*this.deadline)));
		}
		if let Some(timer) = this.timer.as_pin_mut() {
			ready!(timer.poll(cx));
		}
		Poll::Ready(this.value.take())
	}
}

/// Roughly 30 years; stands in for deadlines that do not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + delay`, saturating at a far-future instant instead of overflowing.
pub(crate) fn deadline_after(delay: Duration) -> Instant {
	let now = Instant::now();
	now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Waits for `duration`, measured from the call.
pub fn sleep(duration: Duration) -> impl Future<Output = ()> {
	let delay = DelayFuture::<()>::new(duration);
	async move {
		delay.await;
	}
}
