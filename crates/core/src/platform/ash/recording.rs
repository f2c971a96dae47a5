use crate::batch::barrier::{Barrier, CommandContext};
use crate::tracker::resource_key::{BufferId, ImageId, ResourceKey};
use crate::tracker::resource_state::QueueType;
use ash::vk::{
	AccessFlags2, BufferMemoryBarrier2, CommandBuffer, DebugUtilsLabelEXT, DependencyInfo, ImageAspectFlags,
	ImageMemoryBarrier2, ImageSubresourceRange, MemoryBarrier2, PipelineStageFlags2, QUEUE_FAMILY_IGNORED,
	REMAINING_ARRAY_LAYERS, REMAINING_MIP_LEVELS, WHOLE_SIZE,
};
use ash::{vk, Device};
use smallvec::SmallVec;
use std::ffi::CString;

/// Resolves resource keys to the vulkan objects backing them.
pub trait AshResourceLookup {
	fn image(&self, id: ImageId) -> Option<(vk::Image, ImageAspectFlags)>;

	fn buffer(&self, id: BufferId) -> Option<vk::Buffer>;

	fn queue_family(&self, queue: QueueType) -> u32;
}

#[derive(Debug, Clone, Default)]
pub struct AshBarrierCollector {
	memory: SmallVec<[MemoryBarrier2<'static>; 1]>,
	buffers: SmallVec<[BufferMemoryBarrier2<'static>; 10]>,
	images: SmallVec<[ImageMemoryBarrier2<'static>; 10]>,
}

impl AshBarrierCollector {
	pub fn is_empty(&self) -> bool {
		self.memory.is_empty() && self.buffers.is_empty() && self.images.is_empty()
	}

	pub fn memory(&self) -> &[MemoryBarrier2<'static>] {
		&self.memory
	}

	pub fn buffers(&self) -> &[BufferMemoryBarrier2<'static>] {
		&self.buffers
	}

	pub fn images(&self) -> &[ImageMemoryBarrier2<'static>] {
		&self.images
	}

	pub fn clear(&mut self) {
		self.memory.clear();
		self.buffers.clear();
		self.images.clear();
	}

	/// Translates `barrier` into its vulkan representation. Returns false if the resource is unknown to `lookup` and no
	/// barrier could be generated.
	///
	/// A queue family ownership transfer becomes its acquire half, recorded on the destination queue. The release half
	/// must be recorded on the source queue and submitted before, see [`Self::push_release`].
	pub fn push(&mut self, barrier: &Barrier, lookup: &(impl AshResourceLookup + ?Sized)) -> bool {
		self.translate(barrier, lookup, false)
	}

	/// Translates the release half of the queue family ownership transfer of `barrier`, to be recorded on the source
	/// queue. Returns false if `barrier` transfers no image or buffer between queue families.
	pub fn push_release(&mut self, barrier: &Barrier, lookup: &(impl AshResourceLookup + ?Sized)) -> bool {
		let (src_family, _) = queue_families(barrier, lookup);
		if src_family == QUEUE_FAMILY_IGNORED
			|| !matches!(barrier.key, Some(ResourceKey::Image(_)) | Some(ResourceKey::Buffer(_)))
		{
			return false;
		}
		self.translate(barrier, lookup, true)
	}

	fn translate(&mut self, barrier: &Barrier, lookup: &(impl AshResourceLookup + ?Sized), release: bool) -> bool {
		let src = barrier.src.to_ash_access();
		let mut dst = barrier.dst.to_ash_access();
		if release {
			// the destination access is made visible by the acquire half
			dst.stage_mask = PipelineStageFlags2::NONE;
			dst.access_mask = AccessFlags2::NONE;
		}
		let (src_family, dst_family) = queue_families(barrier, lookup);

		match barrier.key {
			Some(ResourceKey::Image(id)) => {
				let Some((image, aspect)) = lookup.image(id) else {
					log::warn!("barrier {:?} on unknown image, skipping", barrier);
					return false;
				};
				let old_layout = if barrier.discard {
					vk::ImageLayout::UNDEFINED
				} else {
					src.image_layout
				};
				self.images.push(
					ImageMemoryBarrier2::default()
						.image(image)
						.subresource_range(
							ImageSubresourceRange::default()
								.aspect_mask(aspect)
								.base_array_layer(0)
								.layer_count(REMAINING_ARRAY_LAYERS)
								.base_mip_level(0)
								.level_count(REMAINING_MIP_LEVELS),
						)
						.src_access_mask(src.access_mask)
						.src_stage_mask(src.stage_mask)
						.old_layout(old_layout)
						.dst_access_mask(dst.access_mask)
						.dst_stage_mask(dst.stage_mask)
						.new_layout(dst.image_layout)
						.src_queue_family_index(src_family)
						.dst_queue_family_index(dst_family),
				);
			}
			Some(ResourceKey::Buffer(id)) => {
				let Some(buffer) = lookup.buffer(id) else {
					log::warn!("barrier {:?} on unknown buffer, skipping", barrier);
					return false;
				};
				self.buffers.push(
					BufferMemoryBarrier2::default()
						.buffer(buffer)
						.offset(0)
						.size(WHOLE_SIZE)
						.src_access_mask(src.access_mask)
						.src_stage_mask(src.stage_mask)
						.dst_access_mask(dst.access_mask)
						.dst_stage_mask(dst.stage_mask)
						.src_queue_family_index(src_family)
						.dst_queue_family_index(dst_family),
				);
			}
			// acceleration structures are synchronized with global memory barriers
			Some(ResourceKey::RtGeometry(_)) | Some(ResourceKey::RtScene(_)) | None => {
				self.memory.push(
					MemoryBarrier2::default()
						.src_access_mask(src.access_mask)
						.src_stage_mask(src.stage_mask)
						.dst_access_mask(dst.access_mask)
						.dst_stage_mask(dst.stage_mask),
				);
			}
		}
		true
	}
}

fn queue_families(barrier: &Barrier, lookup: &(impl AshResourceLookup + ?Sized)) -> (u32, u32) {
	match barrier.queue_transfer {
		Some(transfer) => {
			let src_family = lookup.queue_family(transfer.src);
			let dst_family = lookup.queue_family(transfer.dst);
			if src_family == dst_family {
				(QUEUE_FAMILY_IGNORED, QUEUE_FAMILY_IGNORED)
			} else {
				(src_family, dst_family)
			}
		}
		None => (QUEUE_FAMILY_IGNORED, QUEUE_FAMILY_IGNORED),
	}
}

/// Records barriers into a vulkan command buffer with `vkCmdPipelineBarrier2`.
pub struct AshCommandContext<'a, L: AshResourceLookup + ?Sized> {
	device: &'a Device,
	cmd: CommandBuffer,
	lookup: &'a L,
	debug_utils: Option<&'a ash::ext::debug_utils::Device>,
	barriers: AshBarrierCollector,
}

impl<'a, L: AshResourceLookup + ?Sized> AshCommandContext<'a, L> {
	/// # Safety
	/// `cmd` must be in the recording state and allocated from `device`, and stay so until this context is dropped.
	pub unsafe fn new(device: &'a Device, cmd: CommandBuffer, lookup: &'a L) -> Self {
		Self {
			device,
			cmd,
			lookup,
			debug_utils: None,
			barriers: AshBarrierCollector::default(),
		}
	}

	/// Inserts task labels into the command buffer.
	pub fn with_debug_utils(mut self, debug_utils: &'a ash::ext::debug_utils::Device) -> Self {
		self.debug_utils = Some(debug_utils);
		self
	}

	pub fn cmd(&self) -> CommandBuffer {
		self.cmd
	}

	pub fn device(&self) -> &'a Device {
		self.device
	}

	pub fn pending_barriers(&self) -> &AshBarrierCollector {
		&self.barriers
	}
}

impl<L: AshResourceLookup + ?Sized> CommandContext for AshCommandContext<'_, L> {
	fn insert_barrier(&mut self, barrier: Barrier) {
		self.barriers.push(&barrier, self.lookup);
	}

	fn commit_barriers(&mut self) {
		if self.barriers.is_empty() {
			return;
		}
		profiling::scope!("AshCommandContext::commit_barriers");
		unsafe {
			self.device.cmd_pipeline_barrier2(
				self.cmd,
				&DependencyInfo::default()
					.memory_barriers(&self.barriers.memory)
					.buffer_memory_barriers(&self.barriers.buffers)
					.image_memory_barriers(&self.barriers.images),
			);
		}
		self.barriers.clear();
	}

	fn debug_marker(&mut self, label: &str) {
		if let Some(debug_utils) = self.debug_utils {
			if let Ok(name) = CString::new(label) {
				unsafe {
					debug_utils.cmd_insert_debug_utils_label(self.cmd, &DebugUtilsLabelEXT::default().label_name(&name));
				}
			}
		}
	}
}

impl<L: AshResourceLookup + ?Sized> Drop for AshCommandContext<'_, L> {
	fn drop(&mut self) {
		if !self.barriers.is_empty() {
			log::warn!("AshCommandContext dropped with uncommitted barriers, recording them now");
			self.commit_barriers();
		}
	}
}
