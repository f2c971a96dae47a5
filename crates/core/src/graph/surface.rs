use crate::graph::cmd_batch::CommandBatch;
use crate::graph::error::SurfaceError;
use crate::tracker::resource_key::ImageId;
use futures::future::BoxFuture;
use smallvec::SmallVec;
use std::sync::Arc;

/// Something that can be rendered to and presented, like a swapchain.
pub trait OutputSurface: Send + Sync {
	/// Acquires the next image to render into. The returned future resolves once the image may be written to.
	fn acquire_image(&self) -> BoxFuture<'static, Result<(), SurfaceError>>;

	/// The images backing the image last acquired with [`Self::acquire_image`].
	fn render_targets(&self) -> SmallVec<[ImageId; 2]>;

	/// Presents the acquired image once `batch`, which renders into it, completed.
	fn present(&self, batch: &Arc<CommandBatch>) -> Result<(), SurfaceError>;
}
