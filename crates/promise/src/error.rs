//! Errors produced by the combinators themselves.
//!
//! Failures coming out of submitted futures or wrapped callables are the
//! caller's own error type and pass through untouched.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// Rejection produced when a timeout combinator's deadline fires first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TimeoutError {
	message: String,
	after: Duration,
}

impl TimeoutError {
	/// Creates a timeout error, falling back to the default message.
	pub fn new(after: Duration, message: Option<&str>) -> Self {
		let message = match message {
			Some(message) => message.to_owned(),
			None => format!("Operation timed out after {}ms", after.as_millis()),
		};
		Self { message, after }
	}

	/// Returns the rejection message.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Returns the timeout window that elapsed.
	pub fn after(&self) -> Duration {
		self.after
	}
}

/// Rejection produced by [`crate::make_cancellable`] once cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("Promise was cancelled")]
pub struct CancelledError;

/// Rejection produced when a wrapped callable or its future panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PanicError {
	message: String,
}

impl PanicError {
	/// Builds the error from a caught panic payload.
	pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
		let message = match payload.downcast::<String>() {
			Ok(message) => *message,
			Err(payload) => match payload.downcast_ref::<&'static str>() {
				Some(message) => (*message).to_owned(),
				None => "<unknown panic>".to_owned(),
			},
		};
		Self { message }
	}

	/// Returns the panic message.
	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<PanicError> for String {
	fn from(err: PanicError) -> Self {
		err.message
	}
}

/// Configuration errors raised synchronously by [`crate::retry_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RetryConfigError {
	/// No validation callback was supplied.
	#[error("Please supply a validation callback function for this action")]
	MissingValidation,
}
