pub mod backing;
pub mod batch;
pub mod graph;
pub mod platform;
pub mod tracker;

pub mod prelude {
	pub use crate::batch::barrier::{Barrier, CommandContext};
	pub use crate::batch::error::BatchError;
	pub use crate::graph::cmd_batch::{BatchStatus, CmdBatchBuilder, CommandBatch, RenderTaskBuilder, TaskRecorder};
	pub use crate::graph::config::RenderGraphConfig;
	pub use crate::graph::error::{RenderGraphError, SurfaceError};
	pub use crate::graph::frame::FrameUid;
	pub use crate::graph::render_graph::{FrameState, RenderGraph};
	pub use crate::graph::surface::OutputSurface;
	pub use crate::tracker::resource_key::{BufferId, ImageId, ResourceKey, ResourceKind, RtGeometryId, RtSceneId};
	pub use crate::tracker::resource_state::{ImageLayout, QueueMask, QueueType, ResourceState};
	pub use crate::tracker::state_tracker::{BatchId, ResStateTracker};
}
