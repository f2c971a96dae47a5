use crate::batch::barrier::{Barrier, CommandContext};
use crate::batch::error::BatchError;
use crate::tracker::resource_key::{ImageId, ResourceKey};
use crate::tracker::resource_state::{QueueType, ResourceState};
use crate::tracker::state_tracker::{BatchId, BatchUse, ResStateTracker};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::Arc;

/// One bit per task in the task masks
pub const MAX_TASKS_PER_BATCH: usize = 32;
pub const MAX_RESOURCES_PER_BATCH: usize = 1024;

const NO_TASK: u32 = u32::MAX;

/// The states a resource passes through within one batch. `initial` and `final_state` are fixed by the declaration,
/// `current` is the state the most recently created task leaves the resource in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InBatchState {
	pub initial: ResourceState,
	pub final_state: ResourceState,
	pub current: ResourceState,
}

/// The state of a resource within one task. A task starts with the states the task before it left the resources in and
/// must leave them in `final_state` when it ends: the state the task declared, the batch's declared final state for the
/// last task, or unchanged otherwise.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InTaskState {
	pub current: ResourceState,
	pub final_state: ResourceState,
	/// the current contents are not needed anymore, the next barrier may discard them
	pub discard: bool,
}

#[derive(Default)]
struct TaskScope {
	states: FxHashMap<ResourceKey, InTaskState>,
	/// resources the task declared itself
	declared: SmallVec<[ResourceKey; 8]>,
	initial_barriers: SmallVec<[Barrier; 4]>,
}

impl TaskScope {
	fn clear(&mut self) {
		self.states.clear();
		self.declared.clear();
		self.initial_barriers.clear();
	}
}

/// Bookkeeping of all resources used by one command batch.
///
/// # Phases
/// 1. Declaration: [`Self::use_resource`] fixes the initial and final state of every resource the batch uses.
/// 2. Tasks: [`Self::create_task`] assigns the next execution index and seeds the task with the states the previous
/// task leaves the resources in. Until the next task is created, [`Self::use_task_resource`] may declare the states the
/// task expects and leaves resources in, which the next task then starts with. [`Self::begin_task`] emits the barriers
/// between the tasks, [`Self::resource_state`] reports transitions within a task and [`Self::final_barriers`] moves
/// the resources into the states the task must end in. Tasks may be recorded concurrently and in any order, as each
/// only touches its own state map.
/// 3. [`Self::commit`] publishes the declared final states to the [`ResStateTracker`].
pub struct RgBatchData {
	tracker: Arc<ResStateTracker>,
	id: BatchId,
	queue: QueueType,
	relaxed: AtomicBool,
	batch_states: RwLock<FxHashMap<ResourceKey, InBatchState>>,
	initial_barriers: Mutex<SmallVec<[Barrier; 8]>>,
	per_task: Box<[Mutex<TaskScope>]>,
	created_tasks: AtomicU32,
	begun_tasks: AtomicU32,
	last_task: AtomicU32,
	readback_tasks: AtomicU32,
	upload_tasks: AtomicU32,
	upload_memory: AtomicBool,
	readback_memory: AtomicBool,
	committed: AtomicBool,
}

impl RgBatchData {
	pub fn new(tracker: Arc<ResStateTracker>, id: BatchId, queue: QueueType) -> Self {
		Self {
			tracker,
			id,
			queue,
			relaxed: AtomicBool::new(true),
			batch_states: RwLock::new(FxHashMap::default()),
			initial_barriers: Mutex::new(SmallVec::new()),
			per_task: (0..MAX_TASKS_PER_BATCH)
				.map(|_| Mutex::new(TaskScope::default()))
				.collect(),
			created_tasks: AtomicU32::new(0),
			begun_tasks: AtomicU32::new(0),
			last_task: AtomicU32::new(NO_TASK),
			readback_tasks: AtomicU32::new(0),
			upload_tasks: AtomicU32::new(0),
			upload_memory: AtomicBool::new(false),
			readback_memory: AtomicBool::new(false),
			committed: AtomicBool::new(false),
		}
	}

	/// Clears all state for reuse by another batch, keeping allocations.
	pub fn reset(&mut self, id: BatchId, queue: QueueType) {
		self.id = id;
		self.queue = queue;
		*self.relaxed.get_mut() = true;
		self.batch_states.get_mut().clear();
		self.initial_barriers.get_mut().clear();
		for task in self.per_task.iter_mut() {
			task.get_mut().clear();
		}
		*self.created_tasks.get_mut() = 0;
		*self.begun_tasks.get_mut() = 0;
		*self.last_task.get_mut() = NO_TASK;
		*self.readback_tasks.get_mut() = 0;
		*self.upload_tasks.get_mut() = 0;
		*self.upload_memory.get_mut() = false;
		*self.readback_memory.get_mut() = false;
		*self.committed.get_mut() = false;
	}

	pub fn id(&self) -> BatchId {
		self.id
	}

	pub fn queue(&self) -> QueueType {
		self.queue
	}

	pub fn batch_use(&self) -> BatchUse {
		BatchUse {
			batch: self.id,
			queue: self.queue,
		}
	}

	pub fn tracker(&self) -> &Arc<ResStateTracker> {
		&self.tracker
	}

	/// With relaxed barriers, which is the default, reporting a resource in the state it is already in never emits a
	/// barrier. Strict barriers order consecutive writes in the same state.
	pub fn set_relaxed_barriers(&self, relaxed: bool) {
		self.relaxed.store(relaxed, Relaxed);
	}

	/// Whether the first task was created, after which no more batch wide resources may be declared.
	pub fn is_started(&self) -> bool {
		self.created_tasks.load(Acquire) != 0
	}

	pub fn created_tasks(&self) -> usize {
		self.created_tasks.load(Acquire) as usize
	}

	pub fn is_task_begun(&self, task: usize) -> bool {
		self.check_task(task)
			.map_or(false, |bit| self.begun_tasks.load(Acquire) & bit != 0)
	}

	/// The task that was begun as the last one, if any
	pub fn last_task(&self) -> Option<usize> {
		match self.last_task.load(Acquire) {
			NO_TASK => None,
			task => Some(task as usize),
		}
	}

	pub fn is_committed(&self) -> bool {
		self.committed.load(Acquire)
	}

	// declaration

	/// Declares that this batch expects `key` in `initial` when it starts and leaves it in `final_state`.
	///
	/// Redeclaring a resource with the same initial state replaces its final state, a different initial state is an
	/// error.
	pub fn use_resource(
		&self,
		key: ResourceKey,
		initial: ResourceState,
		final_state: ResourceState,
	) -> Result<InBatchState, BatchError> {
		let mut states = self.batch_states.write();
		if self.is_started() {
			return Err(BatchError::BatchAlreadyStarted { batch: self.id });
		}
		if let Some(state) = states.get_mut(&key) {
			if state.initial != initial {
				return Err(BatchError::ConflictingInitialState {
					batch: self.id,
					key,
					declared: state.initial,
					requested: initial,
				});
			}
			state.final_state = final_state;
			return Ok(*state);
		}
		if states.len() >= MAX_RESOURCES_PER_BATCH {
			log::warn!("batch {} exceeds its resource table while declaring {}", self.id, key);
			return Err(BatchError::TooManyResources {
				batch: self.id,
				limit: MAX_RESOURCES_PER_BATCH,
			});
		}

		if let Some(barrier) = self.first_use_barrier(key, initial) {
			self.initial_barriers.lock().push(barrier);
		}

		let state = InBatchState {
			initial,
			final_state,
			current: initial,
		};
		states.insert(key, state);
		Ok(state)
	}

	/// The barrier preparing `key` for its first use within this batch in `initial`: undefined images are discarded and
	/// exclusive resources last used on another queue change their owner.
	fn first_use_barrier(&self, key: ResourceKey, initial: ResourceState) -> Option<Barrier> {
		let global = self.tracker.global_state(key);
		let undefined = global.map_or(true, |global| global.is_undefined());
		if key.is_image() && undefined {
			return Some(Barrier::resource(key, initial, initial).discard(true));
		}
		let global = global?;
		let last_queue = global.last_queue?;
		(global.exclusive_sharing && last_queue != self.queue)
			.then(|| Barrier::resource(key, initial, initial).queue_transfer(last_queue, self.queue))
	}

	/// Declares `key` to be used in its default state for the entire batch.
	pub fn use_resource_default(&self, key: ResourceKey) -> Result<InBatchState, BatchError> {
		let (state, _) = self.tracker.get_default_state(key);
		self.use_resource(key, state, state)
	}

	/// Declares the render targets of an output surface, which are rendered to and left ready for presenting.
	pub fn add_surface_targets(&self, targets: impl IntoIterator<Item = ImageId>) -> Result<(), BatchError> {
		for target in targets {
			self.use_resource(target.into(), ResourceState::ColorAttachment, ResourceState::Present)?;
		}
		Ok(())
	}

	/// Host writes before this batch are made visible when the first task begins.
	pub fn upload_memory(&self) {
		self.upload_memory.store(true, Release);
	}

	/// Device writes of this batch are made visible to the host after the last task.
	pub fn readback_memory(&self) {
		self.readback_memory.store(true, Release);
	}

	pub fn batch_state(&self, key: ResourceKey) -> Option<InBatchState> {
		self.batch_states.read().get(&key).copied()
	}

	pub fn resource_count(&self) -> usize {
		self.batch_states.read().len()
	}

	// tasks

	/// Creates the next task and seeds it with the states the previous task leaves the resources in. Returns the
	/// execution index of the new task.
	pub fn create_task(&self) -> Result<usize, BatchError> {
		if self.is_committed() {
			return Err(BatchError::AlreadyCommitted { batch: self.id });
		}
		// the write lock orders creation against task declarations
		let states = self.batch_states.write();
		let task = self.created_tasks.load(Acquire) as usize;
		if task >= MAX_TASKS_PER_BATCH {
			return Err(BatchError::TaskOutOfRange {
				batch: self.id,
				task,
				limit: MAX_TASKS_PER_BATCH,
			});
		}
		let mut scope = self.per_task[task].lock();
		scope.clear();
		scope.states.extend(states.iter().map(|(key, state)| {
			let task_state = InTaskState {
				current: state.current,
				final_state: state.current,
				discard: false,
			};
			(*key, task_state)
		}));
		self.created_tasks.store(task as u32 + 1, Release);
		Ok(task)
	}

	/// Declares that task `task` expects `key` in `initial` and leaves it in `final_state`, which the next task starts
	/// with. Only the most recently created task may declare resources, and only before it begins. Resources new to the
	/// batch are tracked from here on and are left in their default state by the batch.
	pub fn use_task_resource(
		&self,
		task: usize,
		key: ResourceKey,
		initial: ResourceState,
		final_state: ResourceState,
	) -> Result<InTaskState, BatchError> {
		let bit = self.check_task(task)?;
		let mut states = self.batch_states.write();
		if self.created_tasks.load(Acquire) as usize != task + 1 {
			return Err(BatchError::TaskNotNewest { batch: self.id, task });
		}
		let mut scope = self.per_task[task].lock();
		// checked under the scope lock, so a concurrent begin sees every barrier declared here
		if self.begun_tasks.load(Acquire) & bit != 0 {
			return Err(BatchError::TaskAlreadyBegun { batch: self.id, task });
		}
		if scope.declared.contains(&key) {
			return Err(BatchError::ResourceAlreadyDeclared { batch: self.id, task, key });
		}

		let previous = match states.get_mut(&key) {
			Some(state) => Some(mem::replace(&mut state.current, final_state)),
			None => {
				if states.len() >= MAX_RESOURCES_PER_BATCH {
					log::warn!("batch {} task {} exceeds its resource table while declaring {}", self.id, task, key);
					return Err(BatchError::TooManyResources {
						batch: self.id,
						limit: MAX_RESOURCES_PER_BATCH,
					});
				}
				let (default_state, _) = self.tracker.get_default_state(key);
				if let Some(barrier) = self.first_use_barrier(key, initial) {
					scope.initial_barriers.push(barrier);
				}
				states.insert(
					key,
					InBatchState {
						initial,
						final_state: default_state,
						current: final_state,
					},
				);
				None
			}
		};
		if let Some(previous) = previous {
			if self.require_barrier(key, previous, initial) {
				scope.initial_barriers.push(Barrier::resource(key, previous, initial));
			}
		}

		let task_state = InTaskState {
			current: initial,
			final_state,
			discard: false,
		};
		scope.states.insert(key, task_state);
		scope.declared.push(key);
		Ok(task_state)
	}

	/// Declares `key` for task `task` in the state the previous task leaves it in. A resource new to the batch is
	/// expected in its tracked state and returned to its default state.
	pub fn use_task_resource_default(&self, task: usize, key: ResourceKey) -> Result<InTaskState, BatchError> {
		let (initial, final_state) = match self.batch_state(key) {
			Some(state) => (state.current, state.current),
			None => {
				let (default_state, _) = self.tracker.get_default_state(key);
				let current = self.tracker.get_resource_state(key).unwrap_or(default_state);
				(current, default_state)
			}
		};
		self.use_task_resource(task, key, initial, final_state)
	}

	/// Marks `task` as the last task of the batch, which leaves all resources in their declared final states. Returns
	/// false if another task already is the last one.
	pub fn mark_last_task(&self, task: usize) -> bool {
		match self.last_task.compare_exchange(NO_TASK, task as u32, AcqRel, Acquire) {
			Ok(_) => true,
			Err(other) => {
				if other != task as u32 {
					log::warn!("batch {} task {} is marked last, but task {} already is", self.id, task, other);
				}
				other == task as u32
			}
		}
	}

	fn check_task(&self, task: usize) -> Result<u32, BatchError> {
		if task >= MAX_TASKS_PER_BATCH {
			return Err(BatchError::TaskOutOfRange {
				batch: self.id,
				task,
				limit: MAX_TASKS_PER_BATCH,
			});
		}
		Ok(1 << task)
	}

	fn task_map(&self, task: usize) -> Result<MappedMutexGuard<'_, FxHashMap<ResourceKey, InTaskState>>, BatchError> {
		let bit = self.check_task(task)?;
		if self.begun_tasks.load(Acquire) & bit == 0 {
			return Err(BatchError::TaskNotBegun { batch: self.id, task });
		}
		Ok(MutexGuard::map(self.per_task[task].lock(), |scope| &mut scope.states))
	}

	fn emit(&self, task: usize, ctx: &mut (impl CommandContext + ?Sized), barrier: Barrier) {
		log::trace!("batch {} task {}: {:?}", self.id, task, barrier);
		ctx.insert_barrier(barrier);
	}

	fn require_barrier(&self, key: ResourceKey, src: ResourceState, dst: ResourceState) -> bool {
		if src.is_unnecessary_barrier(dst) {
			return false;
		}
		let relaxed = self.relaxed.load(Relaxed);
		if key.is_image() {
			src.require_image_barrier(dst, relaxed)
		} else {
			src.require_memory_barrier(dst, relaxed)
		}
	}

	/// Begins the task at execution index `task`, emitting the barriers between the previous task and this one. The
	/// `last` task ends in the declared final states. The first task also emits the barriers preparing the declared
	/// resources.
	pub fn begin_task(&self, task: usize, last: bool, ctx: &mut (impl CommandContext + ?Sized)) -> Result<(), BatchError> {
		profiling::scope!("RgBatchData::begin_task");
		let bit = self.check_task(task)?;
		if task >= self.created_tasks.load(Acquire) as usize {
			return Err(BatchError::TaskNotCreated { batch: self.id, task });
		}
		if self.begun_tasks.fetch_or(bit, AcqRel) & bit != 0 {
			return Err(BatchError::TaskAlreadyBegun { batch: self.id, task });
		}
		if last {
			self.mark_last_task(task);
		}

		if task == 0 {
			let barriers = mem::take(&mut *self.initial_barriers.lock());
			for barrier in barriers {
				self.emit(task, ctx, barrier);
			}
			if self.upload_memory.load(Acquire) {
				self.emit(task, ctx, Barrier::memory(ResourceState::HostWrite, ResourceState::General));
			}
		}

		let barriers = {
			// batch states are always locked before task scopes
			let states = last.then(|| self.batch_states.read());
			let mut scope = self.per_task[task].lock();
			if let Some(states) = &states {
				for (key, task_state) in scope.states.iter_mut() {
					if let Some(state) = states.get(key) {
						task_state.final_state = state.final_state;
					}
				}
			}
			mem::take(&mut scope.initial_barriers)
		};
		for barrier in barriers {
			self.emit(task, ctx, barrier);
		}
		ctx.commit_barriers();
		Ok(())
	}

	/// Reports that task `task` needs `key` in `state`, emitting a barrier if required. Resources not declared for the
	/// batch start in their default state and return to it at the end of the task, except read only use of non-image
	/// resources, which is not tracked at all.
	pub fn resource_state(
		&self,
		task: usize,
		ctx: &mut (impl CommandContext + ?Sized),
		key: ResourceKey,
		state: ResourceState,
	) -> Result<(), BatchError> {
		let mut map = self.task_map(task)?;
		if let Some(task_state) = map.get_mut(&key) {
			let discard = mem::take(&mut task_state.discard) && key.is_image();
			let src = mem::replace(&mut task_state.current, state);
			if discard || self.require_barrier(key, src, state) {
				self.emit(task, ctx, Barrier::resource(key, src, state).discard(discard));
			}
			return Ok(());
		}

		if !key.is_image() && state.is_read_only() {
			return Ok(());
		}
		if map.len() >= MAX_RESOURCES_PER_BATCH {
			log::warn!("batch {} task {} exceeds its resource table with {}", self.id, task, key);
			return Err(BatchError::TooManyResources {
				batch: self.id,
				limit: MAX_RESOURCES_PER_BATCH,
			});
		}
		let (default_state, undefined) = self.tracker.get_default_state(key);
		let discard = undefined && key.is_image();
		map.insert(
			key,
			InTaskState {
				current: state,
				final_state: default_state,
				discard: false,
			},
		);
		if discard || self.require_barrier(key, default_state, state) {
			self.emit(task, ctx, Barrier::resource(key, default_state, state).discard(discard));
		}
		Ok(())
	}

	/// Marks the contents of `key` as not needed anymore, so the next barrier may discard them. Returns false if
	/// `key` is not used by the task.
	pub fn discard_resource(&self, task: usize, key: ResourceKey) -> Result<bool, BatchError> {
		let mut map = self.task_map(task)?;
		Ok(map.get_mut(&key).map(|state| state.discard = true).is_some())
	}

	/// Sets the state of `key` without emitting a barrier, for transitions recorded by other means. Returns the
	/// previous state if the resource was already used by the task.
	pub fn reset_resource_state(
		&self,
		task: usize,
		key: ResourceKey,
		state: ResourceState,
	) -> Result<Option<ResourceState>, BatchError> {
		let mut map = self.task_map(task)?;
		if let Some(task_state) = map.get_mut(&key) {
			return Ok(Some(mem::replace(&mut task_state.current, state)));
		}
		if map.len() >= MAX_RESOURCES_PER_BATCH {
			return Err(BatchError::TooManyResources {
				batch: self.id,
				limit: MAX_RESOURCES_PER_BATCH,
			});
		}
		let (default_state, _) = self.tracker.get_default_state(key);
		map.insert(
			key,
			InTaskState {
				current: state,
				final_state: default_state,
				discard: false,
			},
		);
		Ok(None)
	}

	pub fn current_resource_state(&self, task: usize, key: ResourceKey) -> Result<Option<ResourceState>, BatchError> {
		Ok(self.task_map(task)?.get(&key).map(|state| state.current))
	}

	/// Whether `key` is in `expected` within task `task`. Resources the task did not touch are in their default state.
	pub fn check_resource_state(
		&self,
		task: usize,
		key: ResourceKey,
		expected: ResourceState,
	) -> Result<bool, BatchError> {
		let current = match self.current_resource_state(task, key)? {
			Some(current) => current,
			None => self.tracker.get_default_state(key).0,
		};
		Ok(current == expected)
	}

	/// Makes device writes of task `task` visible to the host. Only emits a barrier if no later task already did,
	/// returns whether one was emitted.
	pub fn readback_memory_barrier(
		&self,
		task: usize,
		ctx: &mut (impl CommandContext + ?Sized),
	) -> Result<bool, BatchError> {
		let bit = self.check_task(task)?;
		let later = (!0u32).checked_shl(task as u32 + 1).unwrap_or(0);
		if self.readback_tasks.fetch_or(bit, AcqRel) & later != 0 {
			return Ok(false);
		}
		self.emit(task, ctx, Barrier::memory(ResourceState::CopyDst, ResourceState::HostRead));
		Ok(true)
	}

	/// Whether task `task` or a later one made device writes visible to the host.
	pub fn has_readback_memory_barrier(&self, task: usize) -> bool {
		let at_or_later = (!0u32).checked_shl(task as u32).unwrap_or(0);
		self.readback_tasks.load(Acquire) & at_or_later != 0
	}

	/// Makes host writes visible to task `task` in state `dst`. Only emits a barrier if no earlier task already did,
	/// returns whether one was emitted.
	pub fn upload_memory_barrier(
		&self,
		task: usize,
		ctx: &mut (impl CommandContext + ?Sized),
		dst: ResourceState,
	) -> Result<bool, BatchError> {
		let bit = self.check_task(task)?;
		let earlier = bit - 1;
		if self.upload_tasks.fetch_or(bit, AcqRel) & earlier != 0 {
			return Ok(false);
		}
		self.emit(task, ctx, Barrier::memory(ResourceState::HostWrite, dst));
		Ok(true)
	}

	/// Whether task `task` or an earlier one made host writes visible.
	pub fn has_upload_memory_barrier(&self, task: usize) -> bool {
		let at_or_earlier = (!0u32).checked_shr(31 - task.min(31) as u32).unwrap_or(0);
		self.upload_tasks.load(Acquire) & at_or_earlier != 0
	}

	/// Emits the barriers to move every resource used by task `task` into the state the task must end in, then commits
	/// the barriers of the task.
	pub fn final_barriers(&self, task: usize, ctx: &mut (impl CommandContext + ?Sized)) -> Result<(), BatchError> {
		profiling::scope!("RgBatchData::final_barriers");
		let last = self.last_task.load(Acquire) == task as u32;
		{
			let mut map = self.task_map(task)?;
			for (key, state) in map.iter_mut() {
				let discard = mem::take(&mut state.discard) && key.is_image();
				if discard || self.require_barrier(*key, state.current, state.final_state) {
					self.emit(
						task,
						ctx,
						Barrier::resource(*key, state.current, state.final_state).discard(discard),
					);
				}
				state.current = state.final_state;
			}
		}

		if last {
			if self.readback_memory.load(Acquire) {
				self.emit(task, ctx, Barrier::memory(ResourceState::General, ResourceState::HostRead));
			}
			for state in self.batch_states.write().values_mut() {
				state.current = state.final_state;
			}
		}
		ctx.commit_barriers();
		Ok(())
	}

	/// Publishes the declared final state of every resource to the tracker. Returns the number of resources updated.
	pub fn commit(&self) -> Result<usize, BatchError> {
		profiling::scope!("RgBatchData::commit");
		if self.committed.swap(true, AcqRel) {
			return Err(BatchError::AlreadyCommitted { batch: self.id });
		}

		let user = self.batch_use();
		let states = self.batch_states.read();
		let mut updated = 0;
		for (key, state) in states.iter() {
			match self.tracker.update_resource(*key, Some(state.final_state), user) {
				None => log::debug!("batch {} used {}, which is not tracked", self.id, key),
				Some(old) => {
					updated += 1;
					if !old.is_undefined() && old.current_state != state.initial {
						log::warn!(
							"batch {} on {:?} expected {} in {:?}, but it was left in {:?} by {:?} on {:?}",
							self.id,
							self.queue,
							key,
							state.initial,
							old.current_state,
							old.last_batch,
							old.last_queue
						);
						debug_assert!(
							old.last_queue != Some(self.queue),
							"batch {} expected {} in {:?}, but the previous batch on the same queue left it in {:?}",
							self.id,
							key,
							state.initial,
							old.current_state
						);
					}
				}
			}
		}
		log::debug!("committed batch {} on {:?} with {} resources", self.id, self.queue, states.len());
		Ok(updated)
	}
}

impl Debug for RgBatchData {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RgBatchData")
			.field("id", &self.id)
			.field("queue", &self.queue)
			.field("resources", &self.resource_count())
			.field("committed", &self.is_committed())
			.finish()
	}
}
