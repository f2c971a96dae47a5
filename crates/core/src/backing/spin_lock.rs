use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicU32};

/// A minimal mutual exclusion lock that busy-waits instead of parking the thread.
///
/// Only meant for rare and very short critical sections, like allocating a pool chunk or merging summary bits. Use
/// [`parking_lot::Mutex`] for anything else.
pub struct SpinLock<T: ?Sized> {
	locked: AtomicBool,
	value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
	pub const fn new(value: T) -> Self {
		Self {
			locked: AtomicBool::new(false),
			value: UnsafeCell::new(value),
		}
	}

	pub fn into_inner(self) -> T {
		self.value.into_inner()
	}
}

impl<T: ?Sized> SpinLock<T> {
	pub fn lock(&self) -> SpinLockGuard<'_, T> {
		let backoff = Backoff::new();
		loop {
			if let Some(guard) = self.try_lock() {
				return guard;
			}
			// wait on a plain load so the cache line is not bounced around by failing swaps
			while self.locked.load(Relaxed) {
				backoff.snooze();
			}
		}
	}

	pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
		match self.locked.compare_exchange(false, true, Acquire, Relaxed) {
			Ok(_) => Some(SpinLockGuard { lock: self }),
			Err(_) => None,
		}
	}

	pub fn is_locked(&self) -> bool {
		self.locked.load(Relaxed)
	}

	pub fn get_mut(&mut self) -> &mut T {
		self.value.get_mut()
	}
}

impl<T: Default> Default for SpinLock<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T: ?Sized + Debug> Debug for SpinLock<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self.try_lock() {
			Some(guard) => f.debug_tuple("SpinLock").field(&&*guard).finish(),
			None => f.debug_tuple("SpinLock").field(&"<locked>").finish(),
		}
	}
}

pub struct SpinLockGuard<'a, T: ?Sized> {
	lock: &'a SpinLock<T>,
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		// Safety: the guard holds the lock
		unsafe { &*self.lock.value.get() }
	}
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		// Safety: the guard holds the lock exclusively
		unsafe { &mut *self.lock.value.get() }
	}
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
	fn drop(&mut self) {
		self.lock.locked.store(false, Release);
	}
}

const WRITER: u32 = 1 << 31;

/// Reader / writer variant of [`SpinLock`]. Writers are not prioritized, a constant stream of readers may starve a
/// writer, which is fine for the short per-entry sections it guards.
pub struct RwSpinLock<T: ?Sized> {
	state: AtomicU32,
	value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for RwSpinLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
	pub const fn new(value: T) -> Self {
		Self {
			state: AtomicU32::new(0),
			value: UnsafeCell::new(value),
		}
	}

	pub fn into_inner(self) -> T {
		self.value.into_inner()
	}
}

impl<T: ?Sized> RwSpinLock<T> {
	pub fn read(&self) -> RwSpinLockReadGuard<'_, T> {
		let backoff = Backoff::new();
		let mut old = self.state.load(Relaxed);
		loop {
			if old & WRITER != 0 {
				backoff.snooze();
				old = self.state.load(Relaxed);
				continue;
			}
			debug_assert!(old + 1 < WRITER, "too many readers");
			match self.state.compare_exchange_weak(old, old + 1, Acquire, Relaxed) {
				Ok(_) => return RwSpinLockReadGuard { lock: self },
				Err(e) => {
					backoff.spin();
					old = e;
				}
			}
		}
	}

	pub fn write(&self) -> RwSpinLockWriteGuard<'_, T> {
		let backoff = Backoff::new();
		loop {
			if let Some(guard) = self.try_write() {
				return guard;
			}
			while self.state.load(Relaxed) != 0 {
				backoff.snooze();
			}
		}
	}

	pub fn try_write(&self) -> Option<RwSpinLockWriteGuard<'_, T>> {
		match self.state.compare_exchange(0, WRITER, Acquire, Relaxed) {
			Ok(_) => Some(RwSpinLockWriteGuard { lock: self }),
			Err(_) => None,
		}
	}

	pub fn get_mut(&mut self) -> &mut T {
		self.value.get_mut()
	}
}

impl<T: Default> Default for RwSpinLock<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T: ?Sized + Debug> Debug for RwSpinLock<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("RwSpinLock").field(&&*self.read()).finish()
	}
}

pub struct RwSpinLockReadGuard<'a, T: ?Sized> {
	lock: &'a RwSpinLock<T>,
}

impl<T: ?Sized> Deref for RwSpinLockReadGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		// Safety: shared access while the reader count is held
		unsafe { &*self.lock.value.get() }
	}
}

impl<T: ?Sized> Drop for RwSpinLockReadGuard<'_, T> {
	fn drop(&mut self) {
		self.lock.state.fetch_sub(1, Release);
	}
}

pub struct RwSpinLockWriteGuard<'a, T: ?Sized> {
	lock: &'a RwSpinLock<T>,
}

impl<T: ?Sized> Deref for RwSpinLockWriteGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		// Safety: the writer bit grants exclusive access
		unsafe { &*self.lock.value.get() }
	}
}

impl<T: ?Sized> DerefMut for RwSpinLockWriteGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		// Safety: the writer bit grants exclusive access
		unsafe { &mut *self.lock.value.get() }
	}
}

impl<T: ?Sized> Drop for RwSpinLockWriteGuard<'_, T> {
	fn drop(&mut self) {
		self.lock.state.store(0, Release);
	}
}
