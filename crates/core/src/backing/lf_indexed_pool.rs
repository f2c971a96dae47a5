use crate::backing::spin_lock::SpinLock;
use crossbeam_utils::CachePadded;
use rustc_hash::FxHasher;
use std::cell::UnsafeCell;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::mem::{size_of, MaybeUninit};
use std::ops::Index;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicPtr, AtomicU64};
use thiserror::Error;

const WORD_BITS: usize = u64::BITS as usize;

type Slot<T> = UnsafeCell<MaybeUninit<T>>;

/// A fixed capacity slot allocator handing out dense `u32` indices, safe to [`Self::assign`] from any number of
/// threads concurrently without a global lock.
///
/// # Layout
/// The pool consists of up to `MAX_CHUNKS` chunks of `CHUNK_SIZE` slots each. Every chunk splits its slots into groups
/// of 64, each group having one `assigned` word (1 = assigned) and one `created` word (1 = a value was constructed at
/// least once and must be dropped on release). Two summary levels bound the search:
/// * `high`: one word per chunk, one bit per group, set when the group is full
/// * `top`: one word per pool, one bit per chunk, set when all groups of the chunk are full
///
/// Summary bits are only hints to skip full words, the `assigned` words are the single source of truth. Whenever an
/// `assigned` word crosses the full boundary the parent bit is re-derived from the child under a small spin lock.
///
/// The backing storage of a chunk is allocated lazily the first time one of its slots is assigned.
///
/// # Synchronization
/// Only the allocation event is linearizable. Writing the value of an assigned index and unassigning it must be
/// synchronized externally, see [`Self::unassign`].
pub struct LfIndexedPool<T, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> {
	top: CachePadded<AtomicU64>,
	top_guard: SpinLock<()>,
	chunks: Box<[Chunk<T>]>,
}

struct Chunk<T> {
	high: CachePadded<AtomicU64>,
	summary_guard: SpinLock<()>,
	alloc_guard: SpinLock<()>,
	assigned: Box<[AtomicU64]>,
	created: Box<[AtomicU64]>,
	storage: AtomicPtr<Slot<T>>,
}

impl<T> Chunk<T> {
	fn new(groups: usize) -> Self {
		Self {
			high: CachePadded::new(AtomicU64::new(0)),
			summary_guard: SpinLock::new(()),
			alloc_guard: SpinLock::new(()),
			assigned: (0..groups).map(|_| AtomicU64::new(0)).collect(),
			created: (0..groups).map(|_| AtomicU64::new(0)).collect(),
			storage: AtomicPtr::new(ptr::null_mut()),
		}
	}
}

unsafe impl<T: Send, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Send for LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS> {}
unsafe impl<T: Send + Sync, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Sync
	for LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS>
{
}

const fn low_bits(n: usize) -> u64 {
	if n >= WORD_BITS {
		!0
	} else {
		(1 << n) - 1
	}
}

impl<T, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS> {
	pub const CAPACITY: usize = CHUNK_SIZE * MAX_CHUNKS;
	const GROUPS: usize = CHUNK_SIZE / WORD_BITS;
	const GROUP_MASK: u64 = low_bits(Self::GROUPS);
	const CHUNK_MASK: u64 = low_bits(MAX_CHUNKS);

	const VALID: () = {
		assert!(CHUNK_SIZE.is_power_of_two(), "CHUNK_SIZE must be a power of two");
		assert!(CHUNK_SIZE % WORD_BITS == 0, "CHUNK_SIZE must be a multiple of 64");
		assert!(CHUNK_SIZE <= WORD_BITS * WORD_BITS, "CHUNK_SIZE must fit its groups into one word");
		assert!(MAX_CHUNKS >= 1 && MAX_CHUNKS <= WORD_BITS, "MAX_CHUNKS must be in 1..=64");
		assert!(CHUNK_SIZE * MAX_CHUNKS <= u32::MAX as usize, "capacity must fit into an u32 index");
	};

	pub fn new() -> Self {
		#[allow(clippy::let_unit_value)]
		let () = Self::VALID;
		Self {
			top: CachePadded::new(AtomicU64::new(0)),
			top_guard: SpinLock::new(()),
			chunks: (0..MAX_CHUNKS).map(|_| Chunk::new(Self::GROUPS)).collect(),
		}
	}

	#[inline]
	pub const fn capacity(&self) -> usize {
		Self::CAPACITY
	}

	/// Claims a free index and constructs its value with `ctor`. If the slot held a value from a previous assignment,
	/// that value is dropped first, so `ctor` always runs exactly once per assignment.
	///
	/// Never blocks: a failed CAS always means some other thread claimed or released a slot. Fails with
	/// [`PoolError::Full`] if all slots are assigned.
	pub fn assign(&self, ctor: impl FnOnce(u32) -> T) -> Result<u32, PoolError> {
		let index = self.claim().ok_or(PoolError::Full {
			capacity: Self::CAPACITY,
		})?;
		unsafe { self.construct(index, ctor) };
		Ok(index)
	}

	/// Like [`Self::assign`], but if the claimed slot still holds a value from a previous assignment it is handed to
	/// `reuse` instead of being dropped and reconstructed.
	pub fn assign_with(
		&self,
		ctor: impl FnOnce(u32) -> T,
		reuse: impl FnOnce(&mut T, u32),
	) -> Result<u32, PoolError> {
		let index = self.claim().ok_or(PoolError::Full {
			capacity: Self::CAPACITY,
		})?;
		unsafe {
			let (chunk_id, group, bit) = Self::split(index);
			let chunk = &self.chunks[chunk_id];
			let slot = &*self.chunk_storage(chunk_id).add(group * WORD_BITS + bit);
			if chunk.created[group].load(Acquire) & (1 << bit) != 0 {
				reuse((*slot.get()).assume_init_mut(), index);
			} else {
				(*slot.get()).write(ctor(index));
				chunk.created[group].fetch_or(1 << bit, Release);
			}
		}
		Ok(index)
	}

	/// Assigns the caller chosen `index`, see [`Self::assign`].
	pub fn assign_at(&self, index: u32, ctor: impl FnOnce(u32) -> T) -> Result<&T, PoolError> {
		if index as usize >= Self::CAPACITY {
			return Err(PoolError::OutOfRange {
				index,
				capacity: Self::CAPACITY,
			});
		}
		let (chunk_id, group, bit) = Self::split(index);
		let mask = 1 << bit;
		let old = self.chunks[chunk_id].assigned[group].fetch_or(mask, AcqRel);
		if old & mask != 0 {
			return Err(PoolError::AlreadyAssigned { index });
		}
		if old | mask == !0 {
			self.refresh_group_summary(chunk_id, group);
		}
		Ok(unsafe { self.construct(index, ctor) })
	}

	/// Returns `index` to the pool without dropping its value. The value is dropped when the slot is assigned again
	/// with [`Self::assign`], or on [`Self::release`].
	///
	/// Returns false if the index was not assigned.
	///
	/// # Safety
	/// No reference into the slot may be alive, and no other thread may access `index` until it was handed out again
	/// by a later assignment.
	pub unsafe fn unassign(&self, index: u32) -> bool {
		if index as usize >= Self::CAPACITY {
			return false;
		}
		let (chunk_id, group, bit) = Self::split(index);
		let mask = 1 << bit;
		let old = self.chunks[chunk_id].assigned[group].fetch_and(!mask, AcqRel);
		if old & mask == 0 {
			return false;
		}
		if old == !0 {
			self.refresh_group_summary(chunk_id, group);
		}
		true
	}

	/// Snapshot of whether `index` is assigned, may be stale by the time it returns.
	pub fn is_assigned(&self, index: u32) -> bool {
		if index as usize >= Self::CAPACITY {
			return false;
		}
		let (chunk_id, group, bit) = Self::split(index);
		self.chunks[chunk_id].assigned[group].load(Acquire) & (1 << bit) != 0
	}

	/// Returns the value of an assigned and constructed `index`.
	pub fn get(&self, index: u32) -> Option<&T> {
		if index as usize >= Self::CAPACITY {
			return None;
		}
		let (chunk_id, group, bit) = Self::split(index);
		let chunk = &self.chunks[chunk_id];
		let mask = 1 << bit;
		if chunk.assigned[group].load(Acquire) & mask == 0 || chunk.created[group].load(Acquire) & mask == 0 {
			return None;
		}
		unsafe {
			let storage = chunk.storage.load(Acquire);
			debug_assert!(!storage.is_null());
			Some((*(*storage.add(group * WORD_BITS + bit)).get()).assume_init_ref())
		}
	}

	/// # Safety
	/// `index` must be assigned and constructed, and the caller must guarantee exclusive access to it.
	#[allow(clippy::mut_from_ref)]
	pub unsafe fn get_unchecked_mut(&self, index: u32) -> &mut T {
		unsafe {
			debug_assert!(self.is_assigned(index));
			let (chunk_id, group, bit) = Self::split(index);
			let storage = self.chunks[chunk_id].storage.load(Acquire);
			(*(*storage.add(group * WORD_BITS + bit)).get()).assume_init_mut()
		}
	}

	/// Visits every assigned slot, then marks all slots as free. Values stay constructed for later reuse.
	pub fn unassign_all(&mut self, mut visitor: impl FnMut(u32, &mut T)) {
		for (chunk_id, chunk) in self.chunks.iter_mut().enumerate() {
			let storage = *chunk.storage.get_mut();
			for group in 0..Self::GROUPS {
				let bits = *chunk.assigned[group].get_mut() & *chunk.created[group].get_mut();
				for bit in BitIter(bits) {
					let index = (chunk_id * CHUNK_SIZE + group * WORD_BITS + bit) as u32;
					unsafe { visitor(index, (*(*storage.add(group * WORD_BITS + bit)).get()).assume_init_mut()) };
				}
				*chunk.assigned[group].get_mut() = 0;
			}
			*chunk.high.get_mut() = 0;
		}
		*self.top.get_mut() = 0;
	}

	/// Drops all values that were ever constructed and frees the chunk storage. With `check_for_assigned` it is
	/// reported if slots are still assigned.
	pub fn release(&mut self, check_for_assigned: bool) {
		profiling::scope!("LfIndexedPool::release");
		if check_for_assigned {
			let assigned = self.assigned_count();
			if assigned != 0 {
				log::warn!("releasing LfIndexedPool with {} slots still assigned", assigned);
			}
			debug_assert_eq!(assigned, 0, "releasing LfIndexedPool with slots still assigned");
		}

		for chunk in self.chunks.iter_mut() {
			let storage = *chunk.storage.get_mut();
			for group in 0..Self::GROUPS {
				if !storage.is_null() {
					for bit in BitIter(*chunk.created[group].get_mut()) {
						unsafe { (*(*storage.add(group * WORD_BITS + bit)).get()).assume_init_drop() };
					}
				}
				*chunk.assigned[group].get_mut() = 0;
				*chunk.created[group].get_mut() = 0;
			}
			if !storage.is_null() {
				unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(storage, CHUNK_SIZE))) };
				*chunk.storage.get_mut() = ptr::null_mut();
			}
			*chunk.high.get_mut() = 0;
		}
		*self.top.get_mut() = 0;
	}

	/// Snapshot of how many slots are assigned.
	pub fn assigned_count(&self) -> usize {
		self.chunks
			.iter()
			.flat_map(|chunk| chunk.assigned.iter())
			.map(|word| word.load(Relaxed).count_ones() as usize)
			.sum()
	}

	pub fn allocated_chunks(&self) -> usize {
		self.chunks
			.iter()
			.filter(|chunk| !chunk.storage.load(Relaxed).is_null())
			.count()
	}

	/// Bytes of chunk storage currently allocated.
	pub fn dynamic_size(&self) -> usize {
		self.allocated_chunks() * CHUNK_SIZE * size_of::<Slot<T>>()
	}

	#[inline]
	fn split(index: u32) -> (usize, usize, usize) {
		let index = index as usize;
		let local = index % CHUNK_SIZE;
		(index / CHUNK_SIZE, local / WORD_BITS, local % WORD_BITS)
	}

	fn claim(&self) -> Option<u32> {
		let seed = search_seed() as usize;
		let mut top = self.top.load(Acquire);
		loop {
			// first fit over chunks keeps the amount of allocated chunks low
			for chunk_id in BitIter(!top & Self::CHUNK_MASK) {
				if let Some(index) = self.claim_in_chunk(chunk_id, seed) {
					return Some(index);
				}
			}

			// only give up if no chunk changed its fullness while we were searching
			let new_top = self.top.load(Acquire);
			if new_top == top {
				return None;
			}
			top = new_top;
		}
	}

	fn claim_in_chunk(&self, chunk_id: usize, seed: usize) -> Option<u32> {
		let chunk = &self.chunks[chunk_id];
		let free_groups = !chunk.high.load(Acquire) & Self::GROUP_MASK;
		let start = seed % Self::GROUPS;
		let upper = free_groups & (!0 << start);
		let lower = free_groups & !(!0 << start);
		for group in BitIter(upper).chain(BitIter(lower)) {
			let word = &chunk.assigned[group];
			let mut old = word.load(Relaxed);
			while old != !0 {
				let bit = (!old).trailing_zeros() as usize;
				let new = old | (1 << bit);
				match word.compare_exchange_weak(old, new, AcqRel, Relaxed) {
					Ok(_) => {
						if new == !0 {
							self.refresh_group_summary(chunk_id, group);
						}
						return Some((chunk_id * CHUNK_SIZE + group * WORD_BITS + bit) as u32);
					}
					Err(e) => old = e,
				}
			}
		}
		None
	}

	/// Re-derives the `high` bit of `group` and the `top` bit of the chunk from their children. Only called when an
	/// `assigned` word crossed the full boundary, the guards order concurrent refreshes so the last one wins.
	fn refresh_group_summary(&self, chunk_id: usize, group: usize) {
		let chunk = &self.chunks[chunk_id];
		let _guard = chunk.summary_guard.lock();
		let bit = 1 << group;
		if chunk.assigned[group].load(Acquire) == !0 {
			chunk.high.fetch_or(bit, AcqRel);
		} else {
			chunk.high.fetch_and(!bit, AcqRel);
		}

		let _top_guard = self.top_guard.lock();
		let bit = 1 << chunk_id;
		if chunk.high.load(Acquire) == Self::GROUP_MASK {
			self.top.fetch_or(bit, AcqRel);
		} else {
			self.top.fetch_and(!bit, AcqRel);
		}
	}

	/// Returns the storage of a chunk, allocating it if this is the first assignment into the chunk.
	fn chunk_storage(&self, chunk_id: usize) -> *mut Slot<T> {
		let chunk = &self.chunks[chunk_id];
		let storage = chunk.storage.load(Acquire);
		if !storage.is_null() {
			return storage;
		}

		let _guard = chunk.alloc_guard.lock();
		let storage = chunk.storage.load(Acquire);
		if !storage.is_null() {
			return storage;
		}
		let slots = (0..CHUNK_SIZE)
			.map(|_| UnsafeCell::new(MaybeUninit::uninit()))
			.collect::<Box<[Slot<T>]>>();
		let storage = Box::into_raw(slots) as *mut Slot<T>;
		chunk.storage.store(storage, Release);
		storage
	}

	/// # Safety
	/// `index` must have just been claimed by the caller.
	unsafe fn construct(&self, index: u32, ctor: impl FnOnce(u32) -> T) -> &T {
		unsafe {
			let (chunk_id, group, bit) = Self::split(index);
			let chunk = &self.chunks[chunk_id];
			let slot = &mut *(*self.chunk_storage(chunk_id).add(group * WORD_BITS + bit)).get();
			let value = ctor(index);
			if chunk.created[group].load(Acquire) & (1 << bit) != 0 {
				slot.assume_init_drop();
				slot.write(value);
			} else {
				slot.write(value);
				chunk.created[group].fetch_or(1 << bit, Release);
			}
			slot.assume_init_ref()
		}
	}
}

impl<T, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Default for LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Drop for LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS> {
	fn drop(&mut self) {
		self.release(false);
	}
}

impl<T, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Index<u32> for LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS> {
	type Output = T;

	fn index(&self, index: u32) -> &Self::Output {
		match self.get(index) {
			Some(value) => value,
			None => panic!("index {} is not assigned", index),
		}
	}
}

impl<T, const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Debug for LfIndexedPool<T, CHUNK_SIZE, MAX_CHUNKS> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LfIndexedPool")
			.field("capacity", &Self::CAPACITY)
			.field("assigned", &self.assigned_count())
			.field("allocated_chunks", &self.allocated_chunks())
			.finish()
	}
}

/// Iterates the indices of all set bits, lowest first.
struct BitIter(u64);

impl Iterator for BitIter {
	type Item = usize;

	#[inline]
	fn next(&mut self) -> Option<Self::Item> {
		if self.0 == 0 {
			None
		} else {
			let index = self.0.trailing_zeros() as usize;
			self.0 &= self.0 - 1;
			Some(index)
		}
	}
}

/// Per-thread start offset for the group search, so concurrent claimers start on different words.
fn search_seed() -> u32 {
	thread_local! {
		static SEED: u32 = {
			let mut hasher = FxHasher::default();
			std::thread::current().id().hash(&mut hasher);
			(hasher.finish() >> 32) as u32
		};
	}
	SEED.with(|seed| *seed)
}

#[derive(Error)]
pub enum PoolError {
	#[error("All {capacity} slots of the pool are assigned")]
	Full { capacity: usize },
	#[error("Index {index} is out of range for a pool of capacity {capacity}")]
	OutOfRange { index: u32, capacity: usize },
	#[error("Index {index} is already assigned")]
	AlreadyAssigned { index: u32 },
}

impl Debug for PoolError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
