use crate::backing::lf_indexed_pool::PoolError;
use crate::tracker::resource_key::{BufferId, ImageId, ResourceKey, RtGeometryId, RtSceneId};
use crate::tracker::resource_state::{QueueMask, ResourceState};
use crate::tracker::state_tracker::ResStateTracker;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// The tracking relevant part of a resource description.
pub trait ResourceDescription {
	/// The state the resource rests in while no batch uses it
	fn default_state(&self) -> ResourceState;

	/// The queues the resource may be used on. A single queue means exclusive sharing.
	fn queues(&self) -> QueueMask {
		QueueMask::GRAPHICS
	}
}

/// The graphics API layer creating and releasing the actual resources.
pub trait ResourceManager {
	type ImageDesc: ResourceDescription;
	type BufferDesc: ResourceDescription;
	type RtGeometryDesc: ResourceDescription;
	type RtSceneDesc: ResourceDescription;
	type Error: std::error::Error + Send + Sync + 'static;

	fn create_image(&self, desc: &Self::ImageDesc) -> Result<ImageId, Self::Error>;
	fn create_buffer(&self, desc: &Self::BufferDesc) -> Result<BufferId, Self::Error>;
	fn create_rt_geometry(&self, desc: &Self::RtGeometryDesc) -> Result<RtGeometryId, Self::Error>;
	fn create_rt_scene(&self, desc: &Self::RtSceneDesc) -> Result<RtSceneId, Self::Error>;

	/// Returns false if `key` was not alive.
	fn release_resource(&self, key: ResourceKey) -> bool;
}

#[derive(Error)]
pub enum ResourceError<E> {
	#[error("Resource creation failed: {0}")]
	Manager(#[source] E),
	#[error("Resource could not be tracked: {0}")]
	Tracker(#[from] PoolError),
}

impl<E: Display> Debug for ResourceError<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self)
	}
}

/// Wraps a [`ResourceManager`] to register every created resource with the [`ResStateTracker`] and unregister it on
/// release.
pub struct TrackedResources<M: ResourceManager> {
	manager: M,
	tracker: Arc<ResStateTracker>,
}

impl<M: ResourceManager> TrackedResources<M> {
	pub fn new(manager: M, tracker: Arc<ResStateTracker>) -> Self {
		Self { manager, tracker }
	}

	pub fn manager(&self) -> &M {
		&self.manager
	}

	pub fn tracker(&self) -> &Arc<ResStateTracker> {
		&self.tracker
	}

	pub fn create_image(&self, desc: &M::ImageDesc) -> Result<ImageId, ResourceError<M::Error>> {
		let id = self.manager.create_image(desc).map_err(ResourceError::Manager)?;
		self.register(id.into(), desc)?;
		Ok(id)
	}

	pub fn create_buffer(&self, desc: &M::BufferDesc) -> Result<BufferId, ResourceError<M::Error>> {
		let id = self.manager.create_buffer(desc).map_err(ResourceError::Manager)?;
		self.register(id.into(), desc)?;
		Ok(id)
	}

	pub fn create_rt_geometry(&self, desc: &M::RtGeometryDesc) -> Result<RtGeometryId, ResourceError<M::Error>> {
		let id = self.manager.create_rt_geometry(desc).map_err(ResourceError::Manager)?;
		self.register(id.into(), desc)?;
		Ok(id)
	}

	pub fn create_rt_scene(&self, desc: &M::RtSceneDesc) -> Result<RtSceneId, ResourceError<M::Error>> {
		let id = self.manager.create_rt_scene(desc).map_err(ResourceError::Manager)?;
		self.register(id.into(), desc)?;
		Ok(id)
	}

	fn register(&self, key: ResourceKey, desc: &impl ResourceDescription) -> Result<(), PoolError> {
		let state = desc.default_state();
		match self.tracker.add_resource(key, state, state, None) {
			Ok(_) => {
				self.tracker.set_exclusive_sharing(key, desc.queues().is_exclusive());
				Ok(())
			}
			Err(e) => {
				log::warn!("failed to track {}, releasing it again: {}", key, e);
				self.manager.release_resource(key);
				Err(e)
			}
		}
	}

	/// Stops tracking `key` and releases it. Returns false if the manager did not know `key`.
	pub fn release_resource(&self, key: impl Into<ResourceKey>) -> bool {
		let key = key.into();
		self.tracker.remove_resource(key);
		self.manager.release_resource(key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backing::handle_pool::HandlePool;
	use crate::tracker::resource_key::ResourceKind;
	use crate::tracker::resource_state::QueueType;
	use crate::tracker::state_tracker::{BatchId, BatchUse};

	struct Desc {
		state: ResourceState,
		queues: QueueMask,
	}

	impl ResourceDescription for Desc {
		fn default_state(&self) -> ResourceState {
			self.state
		}

		fn queues(&self) -> QueueMask {
			self.queues
		}
	}

	#[derive(Default)]
	struct Handles {
		pools: [HandlePool<64, 1>; ResourceKind::COUNT],
	}

	impl ResourceManager for Handles {
		type ImageDesc = Desc;
		type BufferDesc = Desc;
		type RtGeometryDesc = Desc;
		type RtSceneDesc = Desc;
		type Error = PoolError;

		fn create_image(&self, _: &Desc) -> Result<ImageId, PoolError> {
			Ok(ImageId(self.pools[ResourceKind::Image.to_usize()].alloc()?))
		}

		fn create_buffer(&self, _: &Desc) -> Result<BufferId, PoolError> {
			Ok(BufferId(self.pools[ResourceKind::Buffer.to_usize()].alloc()?))
		}

		fn create_rt_geometry(&self, _: &Desc) -> Result<RtGeometryId, PoolError> {
			Ok(RtGeometryId(self.pools[ResourceKind::RtGeometry.to_usize()].alloc()?))
		}

		fn create_rt_scene(&self, _: &Desc) -> Result<RtSceneId, PoolError> {
			Ok(RtSceneId(self.pools[ResourceKind::RtScene.to_usize()].alloc()?))
		}

		fn release_resource(&self, key: ResourceKey) -> bool {
			self.pools[key.kind().to_usize()].free(key.raw())
		}
	}

	#[test]
	fn test_created_resources_are_tracked() -> anyhow::Result<()> {
		let resources = TrackedResources::new(Handles::default(), Arc::new(ResStateTracker::new()));
		let image = resources.create_image(&Desc {
			state: ResourceState::ShaderSample,
			queues: QueueMask::GRAPHICS,
		})?;
		let buffer = resources.create_buffer(&Desc {
			state: ResourceState::ShaderRead,
			queues: QueueMask::GRAPHICS | QueueMask::ASYNC_COMPUTE,
		})?;

		let tracker = resources.tracker();
		let state = tracker.global_state(image.into()).unwrap();
		assert_eq!(state.current_state, ResourceState::ShaderSample);
		assert!(state.exclusive_sharing);
		assert!(state.is_undefined());
		assert!(!tracker.global_state(buffer.into()).unwrap().exclusive_sharing);
		assert_eq!(tracker.len(), 2);
		Ok(())
	}

	#[test]
	fn test_released_handles_are_stale() -> anyhow::Result<()> {
		let resources = TrackedResources::new(Handles::default(), Arc::new(ResStateTracker::new()));
		let desc = Desc {
			state: ResourceState::General,
			queues: QueueMask::GRAPHICS,
		};
		let old = resources.create_rt_scene(&desc)?;
		resources.tracker().update_resource(
			old.into(),
			Some(ResourceState::AsRead),
			BatchUse {
				batch: BatchId { index: 0, generation: 0 },
				queue: QueueType::Graphics,
			},
		);
		assert!(resources.release_resource(old));
		assert!(!resources.release_resource(old));

		// the index is reused, but with a new generation and fresh tracking state
		let new = resources.create_rt_scene(&desc)?;
		assert_eq!(old.raw().index(), new.raw().index());
		assert_ne!(old, new);
		assert_eq!(resources.tracker().get_resource_state(old.into()), None);
		assert_eq!(resources.tracker().get_default_state(new.into()), (ResourceState::General, true));
		Ok(())
	}
}
