use crate::tracker::resource_state::{ImageLayout, ResourceState};
use ash::vk;
use ash::vk::{AccessFlags2, PipelineStageFlags2};

/// Stages and access a [`ResourceState`] translates to, with the image layout if the resource is an image.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AshResourceAccess {
	pub stage_mask: PipelineStageFlags2,
	pub access_mask: AccessFlags2,
	pub image_layout: vk::ImageLayout,
}

impl AshResourceAccess {
	pub const fn new(stage_mask: PipelineStageFlags2, access_mask: AccessFlags2, image_layout: vk::ImageLayout) -> Self {
		Self {
			stage_mask,
			access_mask,
			image_layout,
		}
	}
}

const SHADER_STAGES: PipelineStageFlags2 = PipelineStageFlags2::from_raw(
	PipelineStageFlags2::ALL_GRAPHICS.as_raw() | PipelineStageFlags2::COMPUTE_SHADER.as_raw(),
);

impl ResourceState {
	pub fn to_ash_access(&self) -> AshResourceAccess {
		let layout = self.image_layout().to_ash_image_layout();
		let (stage, access) = match self {
			ResourceState::General => (
				PipelineStageFlags2::ALL_COMMANDS,
				AccessFlags2::MEMORY_READ | AccessFlags2::MEMORY_WRITE,
			),
			ResourceState::CopySrc => (PipelineStageFlags2::COPY, AccessFlags2::TRANSFER_READ),
			ResourceState::CopyDst => (PipelineStageFlags2::COPY, AccessFlags2::TRANSFER_WRITE),
			ResourceState::BlitSrc => (PipelineStageFlags2::BLIT, AccessFlags2::TRANSFER_READ),
			ResourceState::BlitDst => (PipelineStageFlags2::BLIT, AccessFlags2::TRANSFER_WRITE),
			ResourceState::ClearDst => (PipelineStageFlags2::CLEAR, AccessFlags2::TRANSFER_WRITE),
			ResourceState::HostRead => (PipelineStageFlags2::HOST, AccessFlags2::HOST_READ),
			ResourceState::HostWrite => (PipelineStageFlags2::HOST, AccessFlags2::HOST_WRITE),
			ResourceState::VertexBuffer => (
				PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
				AccessFlags2::VERTEX_ATTRIBUTE_READ,
			),
			ResourceState::IndexBuffer => (PipelineStageFlags2::INDEX_INPUT, AccessFlags2::INDEX_READ),
			ResourceState::IndirectBuffer => (PipelineStageFlags2::DRAW_INDIRECT, AccessFlags2::INDIRECT_COMMAND_READ),
			ResourceState::UniformRead => (SHADER_STAGES, AccessFlags2::UNIFORM_READ),
			ResourceState::ShaderRead => (SHADER_STAGES, AccessFlags2::SHADER_STORAGE_READ),
			ResourceState::ShaderWrite => (SHADER_STAGES, AccessFlags2::SHADER_STORAGE_WRITE),
			ResourceState::ShaderReadWrite => (
				SHADER_STAGES,
				AccessFlags2::SHADER_STORAGE_READ | AccessFlags2::SHADER_STORAGE_WRITE,
			),
			ResourceState::ShaderSample => (SHADER_STAGES, AccessFlags2::SHADER_SAMPLED_READ),
			ResourceState::InputAttachment => (PipelineStageFlags2::FRAGMENT_SHADER, AccessFlags2::INPUT_ATTACHMENT_READ),
			ResourceState::ColorAttachment => (
				PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
				AccessFlags2::COLOR_ATTACHMENT_READ | AccessFlags2::COLOR_ATTACHMENT_WRITE,
			),
			ResourceState::DepthStencilAttachment => (
				PipelineStageFlags2::EARLY_FRAGMENT_TESTS | PipelineStageFlags2::LATE_FRAGMENT_TESTS,
				AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
			),
			ResourceState::DepthStencilRead => (
				PipelineStageFlags2::EARLY_FRAGMENT_TESTS
					| PipelineStageFlags2::LATE_FRAGMENT_TESTS
					| PipelineStageFlags2::FRAGMENT_SHADER,
				AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags2::SHADER_SAMPLED_READ,
			),
			// presentation engine waits on a semaphore, no access to make visible
			ResourceState::Present => (PipelineStageFlags2::ALL_COMMANDS, AccessFlags2::NONE),
			ResourceState::AsBuild => (
				PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR,
				AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR | AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR,
			),
			ResourceState::AsRead => (
				SHADER_STAGES | PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
				AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR,
			),
		};
		AshResourceAccess::new(stage, access, layout)
	}
}

impl ImageLayout {
	pub fn to_ash_image_layout(&self) -> vk::ImageLayout {
		match self {
			ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
			ImageLayout::General => vk::ImageLayout::GENERAL,
			ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
			ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
			ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
			ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
			ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
			ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
			ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
		}
	}
}
