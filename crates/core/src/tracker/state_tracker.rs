use crate::backing::lf_indexed_pool::{LfIndexedPool, PoolError};
use crate::backing::spin_lock::RwSpinLock;
use crate::tracker::resource_key::{ResourceKey, ResourceKind};
use crate::tracker::resource_state::{QueueType, ResourceState};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt::{Debug, Display, Formatter};

pub const TRACKER_CHUNK_SIZE: usize = 1024;
pub const TRACKER_MAX_CHUNKS: usize = 64;

/// Identifies one use of a recycled batch slot. The generation is bumped every time the slot is reused, so an id held
/// by the tracker never refers to a later batch that happens to live in the same slot.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BatchId {
	pub index: u32,
	pub generation: u32,
}

impl Debug for BatchId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "BatchId({}v{})", self.index, self.generation)
	}
}

impl Display for BatchId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}v{}", self.index, self.generation)
	}
}

/// A batch together with the queue it executes on.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct BatchUse {
	pub batch: BatchId,
	pub queue: QueueType,
}

/// Globally known state of one tracked resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResGlobalState {
	/// the state the resource rests in while no batch uses it
	pub default_state: ResourceState,
	/// the state the last committed batch left the resource in
	pub current_state: ResourceState,
	pub last_batch: Option<BatchId>,
	pub last_queue: Option<QueueType>,
	pub exclusive_sharing: bool,
}

impl ResGlobalState {
	/// The contents were never produced by any queue, so they may be discarded on first use.
	pub fn is_undefined(&self) -> bool {
		self.last_queue.is_none()
	}

	pub fn last_use(&self) -> Option<BatchUse> {
		Some(BatchUse {
			batch: self.last_batch?,
			queue: self.last_queue?,
		})
	}
}

/// The single source of truth of which state a resource is guaranteed to be in, and which batch last left it there.
///
/// Every [`ResourceKind`] has its own map from key to an entry index. An entry may only be accessed while holding the
/// map lock of its kind: queries and updates take the map lock shared and lock the entry itself, registration and
/// removal take the map lock exclusively. Thus commits touching different resources proceed in parallel.
pub struct ResStateTracker {
	maps: [RwLock<FxHashMap<ResourceKey, u32>>; ResourceKind::COUNT],
	entries: LfIndexedPool<RwSpinLock<ResGlobalState>, TRACKER_CHUNK_SIZE, TRACKER_MAX_CHUNKS>,
}

impl ResStateTracker {
	pub fn new() -> Self {
		Self {
			maps: std::array::from_fn(|_| RwLock::new(FxHashMap::default())),
			entries: LfIndexedPool::new(),
		}
	}

	#[inline]
	fn map(&self, key: &ResourceKey) -> &RwLock<FxHashMap<ResourceKey, u32>> {
		&self.maps[key.kind().to_usize()]
	}

	fn with_entry<R>(&self, key: ResourceKey, f: impl FnOnce(&RwSpinLock<ResGlobalState>) -> R) -> Option<R> {
		let map = self.map(&key).read();
		let index = *map.get(&key)?;
		self.entries.get(index).map(f)
	}

	/// Starts tracking `key`. If `key` is already tracked its state is overwritten and `false` is returned.
	pub fn add_resource(
		&self,
		key: ResourceKey,
		current: ResourceState,
		default_state: ResourceState,
		owner: Option<BatchUse>,
	) -> Result<bool, PoolError> {
		let state = ResGlobalState {
			default_state,
			current_state: current,
			last_batch: owner.map(|u| u.batch),
			last_queue: owner.map(|u| u.queue),
			exclusive_sharing: true,
		};

		let mut map = self.map(&key).write();
		if let Some(&index) = map.get(&key) {
			log::warn!("resource {} is already tracked, overwriting its state", key);
			*self.entries[index].write() = state;
			return Ok(false);
		}
		let index = self.entries.assign(|_| RwSpinLock::new(state))?;
		map.insert(key, index);
		Ok(true)
	}

	/// Starts tracking `key` with its default state, does nothing if it is already tracked.
	pub fn add_resource_if_not_tracked(
		&self,
		key: ResourceKey,
		default_state: ResourceState,
	) -> Result<bool, PoolError> {
		let mut map = self.map(&key).write();
		if map.contains_key(&key) {
			return Ok(false);
		}
		let index = self.entries.assign(|_| {
			RwSpinLock::new(ResGlobalState {
				default_state,
				current_state: default_state,
				last_batch: None,
				last_queue: None,
				exclusive_sharing: true,
			})
		})?;
		map.insert(key, index);
		Ok(true)
	}

	/// Stops tracking `key` and returns its last state. Later queries of `key` report it as untracked.
	pub fn remove_resource(&self, key: ResourceKey) -> Option<ResGlobalState> {
		let mut map = self.map(&key).write();
		let index = map.remove(&key)?;
		let state = *self.entries[index].read();
		// Safety: entries are only accessed under their kind's map lock, which is held exclusively
		unsafe { self.entries.unassign(index) };
		Some(state)
	}

	pub fn is_tracked(&self, key: ResourceKey) -> bool {
		self.map(&key).read().contains_key(&key)
	}

	/// The state `key` was left in by the last committed batch, or None if it is not tracked.
	pub fn get_resource_state(&self, key: ResourceKey) -> Option<ResourceState> {
		self.with_entry(key, |entry| entry.read().current_state)
	}

	pub fn global_state(&self, key: ResourceKey) -> Option<ResGlobalState> {
		self.with_entry(key, |entry| *entry.read())
	}

	/// Returns the default state of `key` and whether its contents are undefined. Untracked resources are treated as
	/// [`ResourceState::General`] with undefined contents.
	pub fn get_default_state(&self, key: ResourceKey) -> (ResourceState, bool) {
		self.with_entry(key, |entry| {
			let state = entry.read();
			(state.default_state, state.is_undefined())
		})
		.unwrap_or((ResourceState::General, true))
	}

	pub fn set_default_state(&self, key: ResourceKey, state: ResourceState) -> bool {
		self.with_entry(key, |entry| entry.write().default_state = state)
			.is_some()
	}

	pub fn set_exclusive_sharing(&self, key: ResourceKey, exclusive: bool) -> bool {
		self.with_entry(key, |entry| entry.write().exclusive_sharing = exclusive)
			.is_some()
	}

	/// Swaps in the state `user` left `key` in and returns the previous snapshot. A `state` of None returns the
	/// resource to its default state.
	pub fn update_resource(
		&self,
		key: ResourceKey,
		state: Option<ResourceState>,
		user: BatchUse,
	) -> Option<ResGlobalState> {
		self.with_entry(key, |entry| {
			let mut guard = entry.write();
			let old = *guard;
			guard.current_state = state.unwrap_or(guard.default_state);
			guard.last_batch = Some(user.batch);
			guard.last_queue = Some(user.queue);
			old
		})
	}

	/// Snapshot of how many resources are tracked.
	pub fn len(&self) -> usize {
		self.maps.iter().map(|map| map.read().len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for ResStateTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for ResStateTracker {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResStateTracker").field("len", &self.len()).finish()
	}
}
