use crate::backing::lf_indexed_pool::LfIndexedPool;
use crate::batch::batch_data::RgBatchData;
use crate::batch::error::BatchError;
use crate::graph::cmd_batch::{CmdBatchBuilder, CommandBatch};
use crate::graph::config::{RenderGraphConfig, BATCH_POOL_CAPACITY, MAX_OUT_SURFACES};
use crate::graph::error::{RenderGraphError, SurfaceError};
use crate::graph::frame::FrameUid;
use crate::graph::surface::OutputSurface;
use crate::tracker::resource_state::QueueType;
use crate::tracker::state_tracker::{BatchId, ResStateTracker};
use futures::future::BoxFuture;
use num_traits::FromPrimitive;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

type BatchPool = LfIndexedPool<Arc<RgBatchData>, BATCH_POOL_CAPACITY, 1>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameState {
	Idle,
	Begun,
	Ended,
}

struct OutSurface {
	surface: Arc<dyn OutputSurface>,
	batch: Arc<CommandBatch>,
}

struct FrameData {
	uid: FrameUid,
	batches: FxHashMap<BatchId, Arc<CommandBatch>>,
	slots: SmallVec<[u32; 16]>,
	submit_idx: [u32; QueueType::COUNT],
	out_surfaces: SmallVec<[OutSurface; MAX_OUT_SURFACES]>,
}

impl FrameData {
	fn pending(&self) -> usize {
		self.batches.values().filter(|batch| !batch.is_complete()).count()
	}
}

/// Sequences frames and the command batches within them.
///
/// The graph itself is driven from a single thread and not internally synchronized. Recording the tasks of its batches
/// as well as updating the [`ResStateTracker`] may happen on any thread.
///
/// # Frames
/// `Idle -> begin_frame -> Begun -> end_frame -> Ended -> begin_frame -> ...`. Frames occupy one of `max_frames`
/// slots. A slot is only reused once all batches of the frame that last used it completed, see
/// [`Self::wait_next_frame`].
pub struct RenderGraph {
	tracker: Arc<ResStateTracker>,
	config: RenderGraphConfig,
	batch_pool: BatchPool,
	frames: Box<[FrameData]>,
	frame_id: FrameUid,
	state: FrameState,
}

impl RenderGraph {
	pub fn new(tracker: Arc<ResStateTracker>, config: RenderGraphConfig) -> Result<Self, RenderGraphError> {
		config.validate()?;
		let frame_id = FrameUid::new(config.max_frames);
		Ok(Self {
			tracker,
			config,
			batch_pool: LfIndexedPool::new(),
			frames: (0..config.max_frames)
				.map(|index| FrameData {
					uid: FrameUid {
						unique: 0,
						index,
						max_frames: config.max_frames,
					},
					batches: FxHashMap::default(),
					slots: SmallVec::new(),
					submit_idx: [0; QueueType::COUNT],
					out_surfaces: SmallVec::new(),
				})
				.collect(),
			frame_id,
			state: FrameState::Idle,
		})
	}

	pub fn tracker(&self) -> &Arc<ResStateTracker> {
		&self.tracker
	}

	pub fn config(&self) -> &RenderGraphConfig {
		&self.config
	}

	pub fn state(&self) -> FrameState {
		self.state
	}

	pub fn frame_id(&self) -> FrameUid {
		self.frame_id
	}

	pub fn prev_frame_id(&self) -> FrameUid {
		self.frame_id.prev()
	}

	pub fn next_frame_id(&self) -> FrameUid {
		self.frame_id.next()
	}

	fn current_frame(&self) -> &FrameData {
		&self.frames[self.frame_id.index()]
	}

	fn expect_state(&self, expected: FrameState) -> Result<(), RenderGraphError> {
		if self.state != expected {
			return Err(RenderGraphError::InvalidFrameState {
				expected,
				actual: self.state,
			});
		}
		Ok(())
	}

	/// Begins the next frame, see [`Self::on_begin_frame`].
	pub fn begin_frame(&mut self) -> Result<FrameUid, RenderGraphError> {
		let id = self.next_frame_id();
		self.on_begin_frame(id)?;
		Ok(id)
	}

	/// Begins frame `id`. Fails if the batches of the frame previously in the same slot did not complete yet.
	pub fn on_begin_frame(&mut self, id: FrameUid) -> Result<(), RenderGraphError> {
		profiling::scope!("RenderGraph::on_begin_frame");
		if self.state == FrameState::Begun {
			return Err(RenderGraphError::InvalidFrameState {
				expected: FrameState::Ended,
				actual: self.state,
			});
		}
		debug_assert_eq!(id.max_frames, self.config.max_frames);

		let frame = &mut self.frames[id.index()];
		let pending = frame.pending();
		if pending != 0 {
			log::warn!("frame {} still has {} batches executing", frame.uid, pending);
			return Err(RenderGraphError::FrameInFlight {
				frame: frame.uid,
				pending,
			});
		}

		for slot in frame.slots.drain(..) {
			// Safety: the graph is the only one accessing the pool and holds no references into it
			unsafe { self.batch_pool.unassign(slot) };
		}
		frame.batches.clear();
		frame.out_surfaces.clear();
		frame.submit_idx = [0; QueueType::COUNT];
		frame.uid = id;

		self.frame_id = id;
		self.state = FrameState::Begun;
		log::debug!("begin frame {}", id);
		Ok(())
	}

	/// Ends the current frame and presents every output surface used within it.
	pub fn end_frame(&mut self) -> Result<(), RenderGraphError> {
		profiling::scope!("RenderGraph::end_frame");
		self.expect_state(FrameState::Begun)?;
		let mut result = Ok(());
		for out in self.current_frame().out_surfaces.iter() {
			if let Err(e) = out.surface.present(&out.batch) {
				log::warn!("presenting after batch {} failed: {}", out.batch.id(), e);
				if result.is_ok() {
					result = Err(e);
				}
			}
		}
		self.on_end_frame()?;
		Ok(result?)
	}

	/// Ends the current frame without presenting.
	pub fn on_end_frame(&mut self) -> Result<(), RenderGraphError> {
		self.expect_state(FrameState::Begun)?;
		self.state = FrameState::Ended;
		if log::log_enabled!(log::Level::Debug) {
			let frame = self.current_frame();
			let submitted = frame
				.submit_idx
				.iter()
				.enumerate()
				.filter(|(_, count)| **count != 0)
				.filter_map(|(queue, count)| Some((QueueType::from_usize(queue)?, *count)))
				.collect::<SmallVec<[_; QueueType::COUNT]>>();
			log::debug!("end frame {}, submitted {:?}", self.frame_id, submitted);
		}
		Ok(())
	}

	/// Starts a new batch on `queue`. Its resources are declared on the returned builder.
	pub fn cmd_batch(
		&mut self,
		queue: QueueType,
		label: impl Into<String>,
	) -> Result<CmdBatchBuilder<'_>, RenderGraphError> {
		self.expect_state(FrameState::Begun)?;
		let frame_index = self.frame_id.index();
		let submit_index = self.frames[frame_index].submit_idx[queue.to_usize()];
		if submit_index >= self.config.max_batches_per_queue {
			return Err(RenderGraphError::TooManyBatches {
				queue,
				limit: self.config.max_batches_per_queue,
			});
		}
		let capacity = self.config.max_pending_batches as usize;
		if self.batch_pool.assigned_count() >= capacity {
			log::warn!("all {} batches are pending", capacity);
			return Err(RenderGraphError::BatchPoolExhausted { capacity });
		}

		let tracker = &self.tracker;
		let slot = self
			.batch_pool
			.assign_with(
				|slot| {
					let id = BatchId {
						index: slot,
						generation: 0,
					};
					Arc::new(RgBatchData::new(tracker.clone(), id, queue))
				},
				|data, slot| {
					let id = BatchId {
						index: slot,
						generation: data.id().generation.wrapping_add(1),
					};
					match Arc::get_mut(data) {
						Some(data) => data.reset(id, queue),
						// a batch of an earlier frame is still referenced
						None => *data = Arc::new(RgBatchData::new(tracker.clone(), id, queue)),
					}
				},
			)
			.map_err(|_| RenderGraphError::BatchPoolExhausted { capacity })?;
		let data = self.batch_pool[slot].clone();

		let frame = &mut self.frames[frame_index];
		frame.slots.push(slot);
		frame.submit_idx[queue.to_usize()] += 1;
		Ok(CmdBatchBuilder::new(self, data, label.into(), submit_index))
	}

	pub(crate) fn register_batch(&mut self, batch: Arc<CommandBatch>) {
		let frame_index = self.frame_id.index();
		self.frames[frame_index].batches.insert(batch.id(), batch);
	}

	/// Gates `batch` on acquiring the next image of `surface`. The surface's render targets are declared on `batch`,
	/// and the surface is presented with [`Self::end_frame`]. Returns the acquire future the batch must wait for
	/// before its submission.
	///
	/// Nothing is acquired if `batch` already created tasks. Once an image was acquired the surface is presented, even
	/// if declaring its render targets failed.
	pub fn begin_on_surface(
		&mut self,
		surface: Arc<dyn OutputSurface>,
		batch: &Arc<CommandBatch>,
	) -> Result<BoxFuture<'static, Result<(), SurfaceError>>, RenderGraphError> {
		self.expect_state(FrameState::Begun)?;
		let frame_index = self.frame_id.index();
		if self.frames[frame_index].out_surfaces.len() >= MAX_OUT_SURFACES {
			return Err(RenderGraphError::TooManyOutputSurfaces {
				limit: MAX_OUT_SURFACES,
			});
		}
		if batch.data().is_started() {
			return Err(BatchError::BatchAlreadyStarted { batch: batch.id() }.into());
		}

		let acquire = surface.acquire_image();
		let declared = batch.data().add_surface_targets(surface.render_targets());
		if let Err(e) = &declared {
			log::warn!("declaring the render targets on batch {} failed: {}", batch.id(), e);
		}
		self.frames[frame_index].out_surfaces.push(OutSurface {
			surface,
			batch: batch.clone(),
		});
		declared?;
		Ok(acquire)
	}

	/// Number of batches submitted to `queue` in the current frame
	pub fn queue_submit_index(&self, queue: QueueType) -> u32 {
		self.current_frame().submit_idx[queue.to_usize()]
	}

	/// Finds a batch of any frame in flight. Batches of frames whose slot was reused are gone.
	pub fn find_batch(&self, id: BatchId) -> Option<Arc<CommandBatch>> {
		self.frames
			.iter()
			.find_map(|frame| frame.batches.get(&id))
			.cloned()
	}

	fn wait_frames<'a>(frames: impl Iterator<Item = &'a FrameData>, timeout: Option<Duration>) -> bool {
		let deadline = timeout.map(|timeout| Instant::now() + timeout);
		frames.flat_map(|frame| frame.batches.values()).all(|batch| {
			let remaining = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
			batch.wait(remaining)
		})
	}

	/// Blocks until all batches of all frames in flight completed or `timeout` expired. Returns whether they all
	/// completed. On timeout the batches are left as they are.
	pub fn wait_all(&self, timeout: Option<Duration>) -> bool {
		profiling::scope!("RenderGraph::wait_all");
		Self::wait_frames(self.frames.iter(), timeout)
	}

	/// Blocks until the batches of the frame last occupying the slot of the next frame completed, so that
	/// [`Self::begin_frame`] will succeed. Returns false if `timeout` expired.
	pub fn wait_next_frame(&self, timeout: Option<Duration>) -> bool {
		profiling::scope!("RenderGraph::wait_next_frame");
		let next = self.next_frame_id();
		Self::wait_frames(std::iter::once(&self.frames[next.index()]), timeout)
	}
}

impl Debug for RenderGraph {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderGraph")
			.field("frame_id", &self.frame_id)
			.field("state", &self.state)
			.field("pending_batches", &self.batch_pool.assigned_count())
			.finish()
	}
}
