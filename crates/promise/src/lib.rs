#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Keyed coalescing and racing combinators over eagerly driven futures.
//!
//! Rust futures are lazy; everything in this crate is built on [`Promise`],
//! which starts its work immediately on the ambient Tokio runtime and settles
//! exactly once. On top of it sit:
//!
//! - [`StackBuilder`]: "latest submission wins" coalescing, with the keyed
//!   [`get_last_promise`] registry.
//! - [`RaceBuilder`]: "first settlement wins" racing, with the keyed
//!   [`get_race_won_promise`] registry.
//! - Supporting decoration: [`DelayFuture`], [`promise_wrapper`], [`sleep`],
//!   [`retry`], [`retry_handler`], [`sequential`], [`with_timeout`],
//!   [`with_extendable_timeout`], [`make_cancellable`] and [`create_deferred`].
//!
//! Errors raised by submitted futures are never wrapped. Combinators that need
//! to inject their own failure ask for `E: From<TimeoutError>`,
//! `E: From<CancelledError>` or `E: From<PanicError>` instead.

mod cancel;
mod deferred;
mod delay;
mod error;
mod race;
mod registry;
mod retry;
mod retry_handler;
mod sequential;
mod spawn;
mod stack;
mod timeout;
mod token;
mod wrap;

pub use cancel::{CancelHandle, Cancellable, make_cancellable};
pub use deferred::{Deferred, Promise, Resolver, create_deferred};
pub use delay::{DelayFuture, TimedFuture, sleep};
pub use error::{CancelledError, PanicError, RetryConfigError, TimeoutError};
pub use race::RaceBuilder;
pub use registry::{
	KeyedRegistry, RaceRegistry, StackRegistry, forget_last_promise, forget_race_won_promise, get_last_promise, get_last_promise_with,
	get_race_won_promise, get_race_won_promise_with, reset_last_promises, reset_race_won_promises,
};
pub use retry::{RetryPolicy, retry};
pub use retry_handler::{RetryHandlerOptions, ValidationCheck, retry_handler};
pub use sequential::sequential;
pub use stack::StackBuilder;
pub use timeout::{ExtendableTimeout, TimeoutHandle, with_extendable_timeout, with_timeout};
pub use wrap::{Outcome, Wrapped, promise_wrapper};
