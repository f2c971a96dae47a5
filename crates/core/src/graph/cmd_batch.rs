use crate::batch::barrier::CommandContext;
use crate::batch::batch_data::RgBatchData;
use crate::batch::error::BatchError;
use crate::graph::execution::{BatchExecution, PendingBatch};
use crate::graph::frame::FrameUid;
use crate::graph::render_graph::RenderGraph;
use crate::tracker::resource_key::ResourceKey;
use crate::tracker::resource_state::{QueueType, ResourceState};
use crate::tracker::state_tracker::BatchId;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::AcqRel;
use std::sync::Arc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BatchStatus {
	/// tasks are being recorded
	Recording,
	/// all tasks were recorded and the final states are published
	Committed,
	/// the GPU finished executing the batch
	Complete,
}

/// A group of render tasks submitted together to one queue.
pub struct CommandBatch {
	data: Arc<RgBatchData>,
	label: String,
	submit_index: u32,
	frame: FrameUid,
	execution: Arc<BatchExecution>,
	finished_tasks: AtomicU32,
}

impl CommandBatch {
	fn new(data: Arc<RgBatchData>, label: String, submit_index: u32, frame: FrameUid) -> Self {
		Self {
			data,
			label,
			submit_index,
			frame,
			execution: Arc::new(BatchExecution::new()),
			finished_tasks: AtomicU32::new(0),
		}
	}

	pub fn id(&self) -> BatchId {
		self.data.id()
	}

	pub fn queue(&self) -> QueueType {
		self.data.queue()
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	/// The position of this batch among all batches submitted to the same queue within its frame
	pub fn submit_index(&self) -> u32 {
		self.submit_index
	}

	pub fn frame(&self) -> FrameUid {
		self.frame
	}

	pub fn data(&self) -> &Arc<RgBatchData> {
		&self.data
	}

	pub fn status(&self) -> BatchStatus {
		if self.execution.completed() {
			BatchStatus::Complete
		} else if self.data.is_committed() {
			BatchStatus::Committed
		} else {
			BatchStatus::Recording
		}
	}

	/// Creates the next task of this batch. Tasks execute in the order they were created in, but may be recorded in
	/// any order and on any thread. A task starts with the resource states the task created before it declared.
	pub fn task(&self, label: impl Into<String>) -> Result<RenderTaskBuilder<'_>, BatchError> {
		let index = self.data.create_task()?;
		Ok(RenderTaskBuilder {
			batch: self,
			index,
			label: label.into(),
			last: false,
		})
	}

	/// Publishes the final states of all declared resources. Happens automatically once the last task and all tasks
	/// before it finished, only batches without tasks must be committed explicitly.
	pub fn commit(&self) -> Result<usize, BatchError> {
		self.data.commit()
	}

	fn task_finished(&self) {
		let finished = self.finished_tasks.fetch_add(1, AcqRel) + 1;
		let data = &self.data;
		if finished as usize == data.created_tasks() && data.last_task().is_some() && !data.is_committed() {
			if let Err(err) = data.commit() {
				log::warn!("batch {} '{}': {}", self.id(), self.label, err);
			}
		}
	}

	/// Called by the GPU layer once the batch retired.
	pub fn complete(&self) {
		if self.execution.complete() {
			log::trace!("batch {} '{}' completed", self.id(), self.label);
		}
	}

	pub fn is_complete(&self) -> bool {
		self.execution.completed()
	}

	/// Blocks until the batch completed or `timeout` expired. Returns whether the batch completed.
	pub fn wait(&self, timeout: Option<Duration>) -> bool {
		self.execution.wait(timeout)
	}

	pub fn pending(&self) -> PendingBatch {
		PendingBatch::new(&self.execution)
	}
}

impl Debug for CommandBatch {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandBatch")
			.field("id", &self.id())
			.field("label", &self.label)
			.field("queue", &self.queue())
			.field("frame", &self.frame)
			.field("status", &self.status())
			.finish()
	}
}

/// Declares the resources of a new batch, see [`RenderGraph::cmd_batch`].
pub struct CmdBatchBuilder<'a> {
	graph: &'a mut RenderGraph,
	data: Arc<RgBatchData>,
	label: String,
	submit_index: u32,
}

impl<'a> CmdBatchBuilder<'a> {
	pub(crate) fn new(graph: &'a mut RenderGraph, data: Arc<RgBatchData>, label: String, submit_index: u32) -> Self {
		Self {
			graph,
			data,
			label,
			submit_index,
		}
	}

	pub fn id(&self) -> BatchId {
		self.data.id()
	}

	/// The batch expects `key` in `initial` when it starts and leaves it in `final_state`.
	pub fn use_resource(
		self,
		key: impl Into<ResourceKey>,
		initial: ResourceState,
		final_state: ResourceState,
	) -> Result<Self, BatchError> {
		self.data.use_resource(key.into(), initial, final_state)?;
		Ok(self)
	}

	/// The batch expects `key` in `state` when it starts and leaves it in the same state.
	pub fn use_resource_in(self, key: impl Into<ResourceKey>, state: ResourceState) -> Result<Self, BatchError> {
		self.use_resource(key, state, state)
	}

	/// The batch uses `key` in its default state.
	pub fn use_resource_default(self, key: impl Into<ResourceKey>) -> Result<Self, BatchError> {
		self.data.use_resource_default(key.into())?;
		Ok(self)
	}

	pub fn use_resources(
		self,
		uses: impl IntoIterator<Item = (ResourceKey, ResourceState, ResourceState)>,
	) -> Result<Self, BatchError> {
		for (key, initial, final_state) in uses {
			self.data.use_resource(key, initial, final_state)?;
		}
		Ok(self)
	}

	/// Host writes before this batch are made visible to it.
	pub fn upload_memory(self) -> Self {
		self.data.upload_memory();
		self
	}

	/// Writes of this batch are made visible to the host.
	pub fn readback_memory(self) -> Self {
		self.data.readback_memory();
		self
	}

	/// Order consecutive writes in the same state with barriers, see [`RgBatchData::set_relaxed_barriers`].
	pub fn strict_barriers(self) -> Self {
		self.data.set_relaxed_barriers(false);
		self
	}

	/// Finishes the declaration. Resources may still be declared on the returned batch until its first task begins.
	pub fn begin(self) -> Arc<CommandBatch> {
		let frame = self.graph.frame_id();
		let batch = Arc::new(CommandBatch::new(self.data, self.label, self.submit_index, frame));
		log::trace!(
			"begin batch {} '{}' on {:?} #{} in frame {}",
			batch.id(),
			batch.label,
			batch.queue(),
			batch.submit_index,
			frame
		);
		self.graph.register_batch(batch.clone());
		batch
	}
}

/// A task of a [`CommandBatch`]. Every builder counts as finished once it is dropped, whether it ran or not, so a
/// failed or abandoned task never keeps its batch from committing.
pub struct RenderTaskBuilder<'a> {
	batch: &'a CommandBatch,
	index: usize,
	label: String,
	last: bool,
}

impl<'a> RenderTaskBuilder<'a> {
	pub fn index(&self) -> usize {
		self.index
	}

	/// The task expects `key` in `initial` and leaves it in `final_state`, which the next task starts with. Must be
	/// declared before the next task of the batch is created.
	pub fn use_resource(
		self,
		key: impl Into<ResourceKey>,
		initial: ResourceState,
		final_state: ResourceState,
	) -> Result<Self, BatchError> {
		self.batch
			.data
			.use_task_resource(self.index, key.into(), initial, final_state)?;
		Ok(self)
	}

	pub fn use_resource_in(self, key: impl Into<ResourceKey>, state: ResourceState) -> Result<Self, BatchError> {
		self.use_resource(key, state, state)
	}

	/// The task uses `key` in the state the previous task leaves it in.
	pub fn use_resource_default(self, key: impl Into<ResourceKey>) -> Result<Self, BatchError> {
		self.batch.data.use_task_resource_default(self.index, key.into())?;
		Ok(self)
	}

	/// The last task of the batch leaves all resources in their declared final state.
	pub fn last(mut self) -> Self {
		self.last = true;
		self
	}

	/// Records the task into `ctx`: begins it, runs `f` and emits the final barriers. Once the last task and all tasks
	/// before it finished the batch is committed.
	///
	/// If `f` fails the final barriers are still emitted, so later tasks find the resources in the states they expect.
	pub fn run<C: CommandContext + ?Sized, R>(
		self,
		ctx: &mut C,
		f: impl FnOnce(&mut TaskRecorder<'_, C>) -> Result<R, BatchError>,
	) -> Result<R, BatchError> {
		let data = &self.batch.data;
		ctx.debug_marker(&self.label);
		data.begin_task(self.index, self.last, ctx)?;
		let r = {
			let mut recorder = TaskRecorder {
				data,
				task: self.index,
				ctx: &mut *ctx,
			};
			f(&mut recorder)
		};
		if let Err(err) = &r {
			log::warn!("task {} '{}' of batch {} failed: {}", self.index, self.label, self.batch.id(), err);
		}
		data.final_barriers(self.index, ctx)?;
		r
	}
}

impl Drop for RenderTaskBuilder<'_> {
	fn drop(&mut self) {
		let data = &self.batch.data;
		if !data.is_task_begun(self.index) {
			log::warn!(
				"task {} '{}' of batch {} was dropped without running",
				self.index,
				self.label,
				self.batch.id()
			);
			if self.last {
				data.mark_last_task(self.index);
			}
		}
		self.batch.task_finished();
	}
}

/// Reports the resource states of one running task.
pub struct TaskRecorder<'a, C: ?Sized> {
	data: &'a RgBatchData,
	task: usize,
	ctx: &'a mut C,
}

impl<C: CommandContext + ?Sized> TaskRecorder<'_, C> {
	pub fn task_index(&self) -> usize {
		self.task
	}

	pub fn ctx(&mut self) -> &mut C {
		self.ctx
	}

	/// Transitions `key` into `state`, emitting a barrier if required.
	pub fn resource_state(&mut self, key: impl Into<ResourceKey>, state: ResourceState) -> Result<(), BatchError> {
		self.data.resource_state(self.task, self.ctx, key.into(), state)
	}

	pub fn resource_states(
		&mut self,
		states: impl IntoIterator<Item = (ResourceKey, ResourceState)>,
	) -> Result<(), BatchError> {
		for (key, state) in states {
			self.data.resource_state(self.task, self.ctx, key, state)?;
		}
		Ok(())
	}

	pub fn discard_resource(&mut self, key: impl Into<ResourceKey>) -> Result<bool, BatchError> {
		self.data.discard_resource(self.task, key.into())
	}

	pub fn reset_resource_state(
		&mut self,
		key: impl Into<ResourceKey>,
		state: ResourceState,
	) -> Result<Option<ResourceState>, BatchError> {
		self.data.reset_resource_state(self.task, key.into(), state)
	}

	pub fn check_resource_state(
		&self,
		key: impl Into<ResourceKey>,
		expected: ResourceState,
	) -> Result<bool, BatchError> {
		self.data.check_resource_state(self.task, key.into(), expected)
	}

	pub fn readback_memory_barrier(&mut self) -> Result<bool, BatchError> {
		self.data.readback_memory_barrier(self.task, self.ctx)
	}

	pub fn upload_memory_barrier(&mut self, dst: ResourceState) -> Result<bool, BatchError> {
		self.data.upload_memory_barrier(self.task, self.ctx, dst)
	}

	/// Records all barriers emitted so far, must be called before recording commands depending on them.
	pub fn commit_barriers(&mut self) {
		self.ctx.commit_barriers();
	}
}
