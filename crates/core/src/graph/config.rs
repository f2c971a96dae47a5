use crate::graph::error::RenderGraphError;

/// Upper bound of frames in flight
pub const FRAMES_LIMIT: u32 = 4;
/// Number of batch state objects recycled frame to frame
pub const BATCH_POOL_CAPACITY: usize = 64;
/// Output surfaces that may be registered per frame
pub const MAX_OUT_SURFACES: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RenderGraphConfig {
	/// frames that may be in flight at the same time
	pub max_frames: u32,
	/// batches that may exist across all frames in flight
	pub max_pending_batches: u32,
	/// batches that may be submitted to one queue within one frame
	pub max_batches_per_queue: u32,
}

impl RenderGraphConfig {
	pub const REASONABLE_DEFAULTS: Self = RenderGraphConfig {
		max_frames: 2,
		max_pending_batches: 32,
		max_batches_per_queue: 16,
	};

	pub fn validate(&self) -> Result<(), RenderGraphError> {
		let RenderGraphConfig {
			max_frames,
			max_pending_batches,
			max_batches_per_queue,
		} = *self;
		if !(2..=FRAMES_LIMIT).contains(&max_frames) {
			return Err(RenderGraphError::InvalidConfig {
				config: *self,
				reason: "max_frames must be within 2..=FRAMES_LIMIT",
			});
		}
		if !(1..=BATCH_POOL_CAPACITY as u32).contains(&max_pending_batches) {
			return Err(RenderGraphError::InvalidConfig {
				config: *self,
				reason: "max_pending_batches must be within 1..=BATCH_POOL_CAPACITY",
			});
		}
		if max_batches_per_queue == 0 {
			return Err(RenderGraphError::InvalidConfig {
				config: *self,
				reason: "max_batches_per_queue must not be 0",
			});
		}
		Ok(())
	}
}

impl Default for RenderGraphConfig {
	fn default() -> Self {
		Self::REASONABLE_DEFAULTS
	}
}
