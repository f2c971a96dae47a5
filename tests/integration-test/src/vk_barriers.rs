#![cfg(test)]

use ash::vk;
use ash::vk::Handle;
use render_graph_core::backing::handle_pool::RawId;
use render_graph_core::batch::barrier::BarrierCollector;
use render_graph_core::platform::ash::{AshBarrierCollector, AshResourceLookup};
use render_graph_core::prelude::*;
use std::sync::Arc;

struct Resources {
	depth: ImageId,
}

impl AshResourceLookup for Resources {
	fn image(&self, id: ImageId) -> Option<(vk::Image, vk::ImageAspectFlags)> {
		let aspect = if id == self.depth {
			vk::ImageAspectFlags::DEPTH
		} else {
			vk::ImageAspectFlags::COLOR
		};
		Some((vk::Image::from_raw(0x1000 | id.raw().index() as u64), aspect))
	}

	fn buffer(&self, id: BufferId) -> Option<vk::Buffer> {
		Some(vk::Buffer::from_raw(0x2000 | id.raw().index() as u64))
	}

	fn queue_family(&self, queue: QueueType) -> u32 {
		match queue {
			QueueType::Graphics => 0,
			QueueType::AsyncCompute => 1,
			_ => 2,
		}
	}
}

#[test]
fn test_readback_translates_to_vulkan() -> anyhow::Result<()> {
	crate::init_logger();
	let tracker = Arc::new(ResStateTracker::new());
	let depth = ImageId(RawId::new(1, 0).unwrap());
	let result = BufferId(RawId::new(2, 0).unwrap());
	tracker.add_resource(
		depth.into(),
		ResourceState::DepthStencilAttachment,
		ResourceState::DepthStencilAttachment,
		None,
	)?;
	tracker.add_resource(result.into(), ResourceState::ShaderRead, ResourceState::ShaderRead, None)?;
	let mut graph = RenderGraph::new(tracker, RenderGraphConfig::REASONABLE_DEFAULTS)?;
	graph.begin_frame()?;

	let batch = graph
		.cmd_batch(QueueType::AsyncCompute, "depth reduce")?
		.use_resource(depth, ResourceState::DepthStencilAttachment, ResourceState::DepthStencilAttachment)?
		.use_resource(result, ResourceState::ShaderWrite, ResourceState::HostRead)?
		.readback_memory()
		.begin();
	let mut ctx = BarrierCollector::new();
	batch.task("reduce")?.last().run(&mut ctx, |task| {
		task.resource_state(depth, ResourceState::DepthStencilRead)?;
		task.resource_state(result, ResourceState::ShaderWrite)?;
		Ok(())
	})?;
	graph.end_frame()?;

	let lookup = Resources { depth };
	let mut vk_barriers = AshBarrierCollector::default();
	for barrier in ctx.barriers() {
		assert!(vk_barriers.push(barrier, &lookup));
	}

	// discard, transition to read only, transition back
	let images = vk_barriers.images();
	assert_eq!(images.len(), 3);
	assert!(images.iter().all(|b| b.subresource_range.aspect_mask == vk::ImageAspectFlags::DEPTH));
	assert_eq!(images[0].old_layout, vk::ImageLayout::UNDEFINED);
	assert_eq!(images[0].new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
	assert!(images.iter().any(|b| b.new_layout == vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL));

	let buffers = vk_barriers.buffers();
	assert_eq!(buffers.len(), 1);
	assert_eq!(buffers[0].buffer, vk::Buffer::from_raw(0x2002));
	assert_eq!(buffers[0].dst_access_mask, vk::AccessFlags2::HOST_READ);

	let memory = vk_barriers.memory();
	assert_eq!(memory.len(), 1);
	assert_eq!(memory[0].dst_stage_mask, vk::PipelineStageFlags2::HOST);
	Ok(())
}
