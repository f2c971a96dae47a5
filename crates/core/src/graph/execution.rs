use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// Completion signal of a submitted batch, set once by the GPU layer when the batch retired.
pub struct BatchExecution {
	/// To ensure no racing may happen, `wakers` must be held while this is checked for consistent results.
	completed: AtomicBool,
	wakers: Mutex<SmallVec<[Waker; 1]>>,
	condvar: Condvar,
}

impl BatchExecution {
	pub fn new() -> Self {
		Self {
			completed: AtomicBool::new(false),
			wakers: Mutex::new(SmallVec::new()),
			condvar: Condvar::new(),
		}
	}

	pub fn completed(&self) -> bool {
		self.completed.load(Acquire)
	}

	/// Marks the execution as completed and wakes all waiters. Returns false if it already was completed.
	pub fn complete(&self) -> bool {
		let wakers = {
			let mut guard = self.wakers.lock();
			// must be set while holding `wakers` to prevent races
			if self.completed.swap(true, Release) {
				return false;
			}
			mem::take(&mut *guard)
		};
		self.condvar.notify_all();
		for waker in wakers {
			waker.wake();
		}
		true
	}

	/// Blocks until completion or until `timeout` expired. Returns whether the execution completed.
	pub fn wait(&self, timeout: Option<Duration>) -> bool {
		if self.completed() {
			return true;
		}
		let deadline = timeout.map(|timeout| Instant::now() + timeout);
		let mut guard = self.wakers.lock();
		while !self.completed.load(Relaxed) {
			match deadline {
				None => self.condvar.wait(&mut guard),
				Some(deadline) => {
					if self.condvar.wait_until(&mut guard, deadline).timed_out() {
						return self.completed.load(Relaxed);
					}
				}
			}
		}
		true
	}

	fn poll(&self, cx: &mut Context<'_>) -> Poll<()> {
		// fast fail
		if self.completed() {
			Poll::Ready(())
		} else {
			let mut guard = self.wakers.lock();
			// consistent check
			if self.completed.load(Relaxed) {
				Poll::Ready(())
			} else {
				guard.push(cx.waker().clone());
				Poll::Pending
			}
		}
	}
}

impl Default for BatchExecution {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for BatchExecution {
	fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
		f.debug_tuple("BatchExecution")
			.field(if self.completed() { &"completed" } else { &"pending" })
			.finish()
	}
}

/// A future resolving once a batch completed. Does not keep the batch alive, a dropped batch counts as completed.
#[derive(Clone, Debug)]
pub struct PendingBatch {
	execution: Option<Weak<BatchExecution>>,
}

impl PendingBatch {
	pub fn new(execution: &Arc<BatchExecution>) -> Self {
		Self {
			execution: Some(Arc::downgrade(execution)),
		}
	}

	#[inline]
	pub fn new_completed() -> Self {
		Self { execution: None }
	}

	fn upgrade(&self) -> Option<Arc<BatchExecution>> {
		self.execution.as_ref().and_then(|weak| weak.upgrade())
	}

	pub fn completed(&self) -> bool {
		match self.upgrade() {
			None => true,
			Some(e) => e.completed(),
		}
	}
}

impl Future for PendingBatch {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		if let Some(execution) = self.upgrade() {
			execution.poll(cx)
		} else {
			Poll::Ready(())
		}
	}
}
