//! Scenario tests for the public combinator API.

#![allow(unused_crate_dependencies)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use pretty_assertions::assert_eq;
use settle_promise::{
	CancelledError, Cancellable, DelayFuture, Outcome, PanicError, RaceBuilder, RetryHandlerOptions, StackBuilder, TimeoutError, create_deferred, get_last_promise, make_cancellable,
	promise_wrapper, reset_last_promises, retry, retry_handler, sequential, with_extendable_timeout, with_timeout,
};
use tokio::time::Instant;

fn init() {
	let _ = tracing_subscriber::fmt::try_init();
}

async fn value_after<T: Send + 'static>(ms: u64, value: T) -> Result<T> {
	DelayFuture::with_value(Duration::from_millis(ms), value).await.ok_or_else(|| anyhow!("delay lost its value"))
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn coalescing_resolves_every_earlier_waiter_with_the_latest_value() {
	init();
	let stack = StackBuilder::<&str, anyhow::Error>::default();
	let first = stack.submit(value_after(300, "first"));
	let second = stack.submit(value_after(100, "second"));
	let third = stack.submit(value_after(200, "third"));

	let start = Instant::now();
	let (first, second, third) = tokio::join!(first, second, third);
	assert_eq!(first.unwrap(), "third");
	assert_eq!(second.unwrap(), "third");
	assert_eq!(third.unwrap(), "third");
	assert_eq!(start.elapsed(), Duration::from_millis(200));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn racing_resolves_everyone_with_the_first_settlement() {
	init();
	let race = RaceBuilder::<u32, anyhow::Error>::default();
	let slow = create_deferred::<u32, anyhow::Error>();
	let fast = create_deferred::<u32, anyhow::Error>();
	let waiting_slow = race.submit(slow.promise);
	let waiting_fast = race.submit(fast.promise);

	fast.resolver.resolve(2);
	assert_eq!(waiting_fast.await.unwrap(), 2);
	assert_eq!(waiting_slow.await.unwrap(), 2);

	slow.resolver.resolve(1);
	assert_eq!(race.waiting(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn retry_resolves_after_two_failures() {
	init();
	let calls = Arc::new(AtomicU32::new(0));
	let start = Instant::now();
	let counter = Arc::clone(&calls);
	let value = retry(
		move || -> Result<&'static str> {
			match counter.fetch_add(1, Ordering::SeqCst) {
				0 | 1 => Err(anyhow!("Not yet")),
				_ => Ok("success"),
			}
		},
		3,
		Duration::from_millis(100),
	)
	.await
	.unwrap();

	assert_eq!(value, "success");
	assert_eq!(calls.load(Ordering::SeqCst), 3);
	assert_eq!(start.elapsed(), Duration::from_millis(200));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn sequential_collects_in_order_and_stops_on_failure() {
	init();
	let doubled = sequential((0..3u32).map(|i| move || value_after(50, i * 2))).await.unwrap();
	assert_eq!(doubled, vec![0, 2, 4]);

	let ran = Arc::new(AtomicU32::new(0));
	let steps = (1..=3u32).map(|n| {
		let ran = Arc::clone(&ran);
		move || async move {
			ran.fetch_add(1, Ordering::SeqCst);
			if n == 2 { Err(anyhow!("Task 2 failed")) } else { Ok(n) }
		}
	});
	let err = sequential(steps).await.unwrap_err();
	assert_eq!(err.to_string(), "Task 2 failed");
	assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn timeout_rejects_with_a_downcastable_error() {
	init();
	let err = with_timeout(value_after(200, ()), Duration::from_millis(100), None).await.unwrap_err();
	let timeout = err.downcast_ref::<TimeoutError>().expect("timeout error");
	assert_eq!(timeout.to_string(), "Operation timed out after 100ms");

	let value = with_timeout(value_after(100, 7), Duration::from_millis(200), None).await.unwrap();
	assert_eq!(value, 7);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn extendable_timeout_survives_a_reset() {
	init();
	let race = with_extendable_timeout(value_after(300, "kept"), Duration::from_millis(200), Some("too slow"));
	tokio::time::sleep(Duration::from_millis(150)).await;
	race.handle.reset_timeout();
	race.handle.reset_timeout();
	assert_eq!(race.promise.await.unwrap(), "kept");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cancelled_promise_always_rejects() {
	init();
	let Cancellable { promise, handle } = make_cancellable(value_after(100, 1u8));
	handle.cancel();
	handle.cancel();
	let err = promise.await.unwrap_err();
	assert!(err.downcast_ref::<CancelledError>().is_some());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn retry_handler_validates_and_backs_off() {
	init();
	let start = Instant::now();
	let options = RetryHandlerOptions::new(3u32)
		.validation_check(|n: u32| if n >= 3 { Outcome::value(n) } else { Outcome::error(anyhow!("too small: {n}")) })
		.retry_timeout(Duration::from_millis(100))
		.timeout_adjustment(0.5)
		.name("grow");
	let seen = Arc::new(AtomicU32::new(0));
	let counter = Arc::clone(&seen);
	let handler = retry_handler(
		move |floor: u32| {
			let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
			async move { Ok(attempt.min(floor)) }
		},
		options,
	)
	.unwrap();

	assert_eq!(handler.await.unwrap(), 3);
	assert_eq!(seen.load(Ordering::SeqCst), 3);
	assert_eq!(start.elapsed(), Duration::from_millis(150 + 225));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn keyed_streams_can_be_flushed() {
	init();
	let mut abandoned = get_last_promise::<u32, anyhow::Error, _>("combinators.flush", std::future::pending());
	reset_last_promises();

	let fresh = get_last_promise::<u32, anyhow::Error, _>("combinators.flush", async { Ok(9) });
	assert_eq!(fresh.await.unwrap(), 9);
	assert!(tokio::time::timeout(Duration::from_millis(50), &mut abandoned).await.is_err());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn panics_surface_as_rejections() {
	init();
	let err = promise_wrapper(|| -> Result<u32> { panic!("Test error") }).await.unwrap_err();
	assert_eq!(err.downcast_ref::<PanicError>().map(PanicError::message), Some("Test error"));

	let mut calls = 0;
	let value = retry(
		|| -> Result<u32> {
			calls += 1;
			if calls == 1 {
				panic!("first call explodes");
			}
			Ok(calls)
		},
		2,
		Duration::from_millis(10),
	)
	.await
	.unwrap();
	assert_eq!(value, 2);

	let exploding = || -> std::future::Ready<Result<u32>> { panic!("step exploded") };
	let err = sequential([exploding]).await.unwrap_err();
	assert!(err.downcast_ref::<PanicError>().is_some());
}
