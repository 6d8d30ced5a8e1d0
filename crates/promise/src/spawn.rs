use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};

/// Runtime used by promises created outside any Tokio context.
fn detached_runtime() -> &'static Runtime {
	static DETACHED: OnceLock<Runtime> = OnceLock::new();
	DETACHED.get_or_init(|| {
		Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("settle-promise-detached")
			.build()
			.expect("settle-promise: cannot build the detached runtime")
	})
}

/// Starts `fut` immediately and detaches it.
///
/// Uses the current Tokio runtime when there is one, otherwise a lazily built
/// process-wide runtime. The task is never aborted; its outcome is only
/// observable through whatever the future itself settles.
pub(crate) fn spawn_detached<F>(label: &'static str, fut: F)
where
	F: Future<Output = ()> + Send + 'static,
{
	let ambient = Handle::try_current().ok();
	tracing::trace!(task = label, ambient = ambient.is_some(), "promise.spawn");
	let task = match ambient {
		Some(handle) => handle.spawn(fut),
		None => detached_runtime().spawn(fut),
	};
	drop(task);
}
