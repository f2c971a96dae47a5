use crate::batch::error::BatchError;
use crate::graph::config::RenderGraphConfig;
use crate::graph::frame::FrameUid;
use crate::graph::render_graph::FrameState;
use crate::tracker::resource_state::QueueType;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

#[derive(Error)]
pub enum RenderGraphError {
	#[error("Invalid config {config:?}: {reason}")]
	InvalidConfig {
		config: RenderGraphConfig,
		reason: &'static str,
	},
	#[error("Expected the frame to be {expected:?}, but it is {actual:?}")]
	InvalidFrameState { expected: FrameState, actual: FrameState },
	#[error("Frame {frame} still has {pending} batches executing, wait for them before reusing its slot")]
	FrameInFlight { frame: FrameUid, pending: usize },
	#[error("All {capacity} batches are in use")]
	BatchPoolExhausted { capacity: usize },
	#[error("Queue {queue:?} already has the maximum of {limit} batches this frame")]
	TooManyBatches { queue: QueueType, limit: u32 },
	#[error("At most {limit} output surfaces may be used per frame")]
	TooManyOutputSurfaces { limit: usize },
	#[error("Batch error: {0}")]
	Batch(#[from] BatchError),
	#[error("Surface error: {0}")]
	Surface(#[from] SurfaceError),
}

impl Debug for RenderGraphError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self)
	}
}

#[derive(Error)]
pub enum SurfaceError {
	#[error("Surface is out of date and must be recreated")]
	OutOfDate,
	#[error("Surface was lost")]
	SurfaceLost,
	#[error("Platform error: {message}")]
	Platform { message: String },
}

impl Debug for SurfaceError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self)
	}
}
