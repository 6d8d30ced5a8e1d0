/// Monotonic sequence clock owned by one builder instance.
///
/// Issued identifiers start at 1 and are never reused, so a settlement from an
/// earlier batch can never be mistaken for the latest one.
#[derive(Debug, Default)]
pub(crate) struct SequenceClock {
	last: u64,
}

impl SequenceClock {
	/// Creates a clock that has issued nothing yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Issues the next identifier.
	pub fn next(&mut self) -> u64 {
		self.last = self.last.wrapping_add(1);
		self.last
	}

	/// Returns the most recently issued identifier, or 0 before the first.
	pub const fn current(&self) -> u64 {
		self.last
	}

	/// Returns `true` if `id` is the most recently issued identifier.
	pub const fn is_current(&self, id: u64) -> bool {
		self.last == id
	}
}
