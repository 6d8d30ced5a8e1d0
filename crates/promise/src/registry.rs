//! Keyed builder registries.
//!
//! A registry lazily creates one builder per key on first use and never
//! evicts it on its own. The builder mode passed with the first submission
//! for a key sticks; later modes for that key are ignored.
//!
//! The process-wide registries behind [`get_last_promise`] and
//! [`get_race_won_promise`] are keyed by the string key together with the
//! builder's value and error types, so the same key used with two different
//! types addresses two independent streams.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::deferred::Promise;
use crate::race::RaceBuilder;
use crate::stack::StackBuilder;

/// Lazily populated map from key to builder.
#[derive(Debug)]
pub struct KeyedRegistry<K, B> {
	inner: Arc<RwLock<HashMap<K, B>>>,
}

impl<K, B> Clone for KeyedRegistry<K, B> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<K, B> Default for KeyedRegistry<K, B> {
	fn default() -> Self {
		Self {
			inner: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl<K, B> KeyedRegistry<K, B>
where
	K: Eq + Hash,
	B: Clone,
{
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the builder for `key`, creating it with `make` on first use.
	pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> B) -> B {
		if let Some(builder) = self.inner.read().get(&key) {
			return builder.clone();
		}
		self.inner.write().entry(key).or_insert_with(make).clone()
	}

	/// Returns the builder for `key` without creating one.
	pub fn get(&self, key: &K) -> Option<B> {
		self.inner.read().get(key).cloned()
	}

	/// Drops the builder for `key`.
	///
	/// Promises still waiting on it stay pending forever.
	pub fn remove(&self, key: &K) -> Option<B> {
		self.inner.write().remove(key)
	}

	/// Drops every builder. Their pending promises stay pending.
	pub fn clear(&self) {
		self.inner.write().clear();
	}

	/// Returns the number of live builders.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns `true` when no builder has been created yet or all were dropped.
	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	/// Returns `true` if `key` has a live builder.
	pub fn contains(&self, key: &K) -> bool {
		self.inner.read().contains_key(key)
	}

	/// Snapshot of the keys with a live builder, in no particular order.
	pub fn keys(&self) -> Vec<K>
	where
		K: Clone,
	{
		self.inner.read().keys().cloned().collect()
	}
}

/// Keyed coalescing streams.
pub type StackRegistry<K, T, E> = KeyedRegistry<K, StackBuilder<T, E>>;

/// Keyed racing streams.
pub type RaceRegistry<K, T, E> = KeyedRegistry<K, RaceBuilder<T, E>>;

impl<K, T, E> KeyedRegistry<K, StackBuilder<T, E>>
where
	K: Eq + Hash,
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// Submits `fut` to the coalescing stream for `key`.
	pub fn submit<F>(&self, key: K, fut: F, resolve_all_previous: bool) -> Promise<T, E>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		self.get_or_insert_with(key, || StackBuilder::new(resolve_all_previous)).submit(fut)
	}
}

impl<K, T, E> KeyedRegistry<K, RaceBuilder<T, E>>
where
	K: Eq + Hash,
	T: Clone + Send + 'static,
	E: Send + 'static,
{
	/// Submits `fut` to the racing stream for `key`.
	pub fn submit<F>(&self, key: K, fut: F, resolve_all_others: bool) -> Promise<T, E>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		self.get_or_insert_with(key, || RaceBuilder::new(resolve_all_others)).submit(fut)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GlobalKey {
	key: String,
	builder: TypeId,
}

impl GlobalKey {
	fn of<B: 'static>(key: &str) -> Self {
		Self {
			key: key.to_owned(),
			builder: TypeId::of::<B>(),
		}
	}
}

type GlobalRegistry = KeyedRegistry<GlobalKey, Arc<dyn Any + Send + Sync>>;

fn last_promises() -> &'static GlobalRegistry {
	static STACKS: OnceLock<GlobalRegistry> = OnceLock::new();
	STACKS.get_or_init(GlobalRegistry::new)
}

fn race_won_promises() -> &'static GlobalRegistry {
	static RACES: OnceLock<GlobalRegistry> = OnceLock::new();
	RACES.get_or_init(GlobalRegistry::new)
}

fn global_builder<B>(registry: &GlobalRegistry, key: &str, make: impl FnOnce() -> B) -> B
where
	B: Clone + Send + Sync + 'static,
{
	let key = GlobalKey::of::<B>(key);
	if let Some(builder) = registry.get(&key).and_then(|entry| entry.downcast_ref::<B>().cloned()) {
		return builder;
	}

	let mut map = registry.inner.write();
	if let Some(builder) = map.get(&key).and_then(|entry| entry.downcast_ref::<B>()) {
		return builder.clone();
	}
	tracing::debug!(key = %key.key, "promise.registry.create");
	let builder = make();
	map.insert(key, Arc::new(builder.clone()));
	builder
}

/// Submits `fut` to the process-wide coalescing stream for `key`.
///
/// Equivalent to [`get_last_promise_with`] with `resolve_all_previous` set.
pub fn get_last_promise<T, E, F>(key: &str, fut: F) -> Promise<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	get_last_promise_with(key, fut, true)
}

/// Submits `fut` to the process-wide coalescing stream for `key`, creating it
/// with `resolve_all_previous` if this is the key's first use.
pub fn get_last_promise_with<T, E, F>(key: &str, fut: F, resolve_all_previous: bool) -> Promise<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	global_builder(last_promises(), key, || StackBuilder::<T, E>::new(resolve_all_previous)).submit(fut)
}

/// Submits `fut` to the process-wide racing stream for `key`.
///
/// Equivalent to [`get_race_won_promise_with`] with `resolve_all_others` set.
pub fn get_race_won_promise<T, E, F>(key: &str, fut: F) -> Promise<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	get_race_won_promise_with(key, fut, true)
}

/// Submits `fut` to the process-wide racing stream for `key`, creating it with
/// `resolve_all_others` if this is the key's first use.
pub fn get_race_won_promise_with<T, E, F>(key: &str, fut: F, resolve_all_others: bool) -> Promise<T, E>
where
	T: Clone + Send + 'static,
	E: Send + 'static,
	F: Future<Output = Result<T, E>> + Send + 'static,
{
	global_builder(race_won_promises(), key, || RaceBuilder::<T, E>::new(resolve_all_others)).submit(fut)
}

/// Drops the process-wide coalescing stream for `key` and value types `T`/`E`.
///
/// Returns `true` if a stream existed. Its pending promises stay pending.
pub fn forget_last_promise<T, E>(key: &str) -> bool
where
	T: 'static,
	E: 'static,
{
	last_promises().remove(&GlobalKey::of::<StackBuilder<T, E>>(key)).is_some()
}

/// Drops the process-wide racing stream for `key` and value types `T`/`E`.
pub fn forget_race_won_promise<T, E>(key: &str) -> bool
where
	T: 'static,
	E: 'static,
{
	race_won_promises().remove(&GlobalKey::of::<RaceBuilder<T, E>>(key)).is_some()
}

/// Drops every process-wide coalescing stream.
pub fn reset_last_promises() {
	let registry = last_promises();
	tracing::debug!(streams = registry.len(), "promise.registry.reset_last");
	registry.clear();
}

/// Drops every process-wide racing stream.
pub fn reset_race_won_promises() {
	let registry = race_won_promises();
	tracing::debug!(streams = registry.len(), "promise.registry.reset_race");
	registry.clear();
}
