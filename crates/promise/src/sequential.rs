use std::future::Future;

use crate::error::PanicError;
use crate::wrap::catch_panics;

/// Runs future-producing callables one at a time, in order.
///
/// Each callable is only invoked once the previous future has resolved. The
/// first error aborts the run and is returned as is; later callables are never
/// invoked. A panic in a callable or its future aborts the run the same way,
/// as a [`PanicError`].
pub async fn sequential<T, E, I, F, Fut>(callables: I) -> Result<Vec<T>, E>
where
	E: From<PanicError>,
	I: IntoIterator<Item = F>,
	F: FnOnce() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let callables = callables.into_iter();
	let mut results = Vec::with_capacity(callables.size_hint().0);
	for (index, callable) in callables.enumerate() {
		match catch_panics(callable).await {
			Ok(value) => results.push(value),
			Err(err) => {
				tracing::trace!(index, "promise.sequential.aborted");
				return Err(err);
			}
		}
	}
	Ok(results)
}
