#![cfg(test)]

use render_graph_core::backing::handle_pool::RawId;
use render_graph_core::batch::barrier::{Barrier, BarrierCollector};
use render_graph_core::prelude::*;
use std::sync::Arc;

fn image(index: u32) -> ImageId {
	ImageId(RawId::new(index, 0).unwrap())
}

fn buffer(index: u32) -> BufferId {
	BufferId(RawId::new(index, 0).unwrap())
}

#[test]
fn test_upload_then_sample_on_other_queue() -> anyhow::Result<()> {
	crate::init_logger();
	let tracker = Arc::new(ResStateTracker::new());
	let texture = image(1);
	let staging = buffer(2);
	assert!(tracker.add_resource(texture.into(), ResourceState::ShaderSample, ResourceState::ShaderSample, None)?);
	assert!(tracker.add_resource(staging.into(), ResourceState::HostWrite, ResourceState::HostWrite, None)?);
	let mut graph = RenderGraph::new(tracker.clone(), RenderGraphConfig::REASONABLE_DEFAULTS)?;
	graph.begin_frame()?;

	// upload on the transfer queue
	let upload = graph
		.cmd_batch(QueueType::AsyncTransfer, "upload")?
		.use_resource(texture, ResourceState::CopyDst, ResourceState::ShaderSample)?
		.use_resource_in(staging, ResourceState::CopySrc)?
		.upload_memory()
		.begin();
	let mut transfer_ctx = BarrierCollector::new();
	upload.task("copy")?.last().run(&mut transfer_ctx, |task| {
		task.resource_state(texture, ResourceState::CopyDst)?;
		task.resource_state(staging, ResourceState::CopySrc)?;
		task.commit_barriers();
		Ok(())
	})?;
	assert_eq!(upload.status(), BatchStatus::Committed);
	assert_eq!(transfer_ctx.markers(), ["copy"]);

	let committed = transfer_ctx.committed();
	assert_eq!(committed.len(), 2);
	assert!(committed[0].contains(
		&Barrier::resource(texture.into(), ResourceState::CopyDst, ResourceState::CopyDst).discard(true)
	));
	assert!(committed[0].contains(&Barrier::memory(ResourceState::HostWrite, ResourceState::General)));
	// the staging buffer was registered without an owner, there is no queue to take it from
	assert_eq!(committed[0].len(), 2);
	assert_eq!(
		committed[1].as_slice(),
		[Barrier::resource(
			texture.into(),
			ResourceState::CopyDst,
			ResourceState::ShaderSample
		)]
	);

	let state = tracker.global_state(texture.into()).unwrap();
	assert_eq!(state.current_state, ResourceState::ShaderSample);
	assert_eq!(state.last_queue, Some(QueueType::AsyncTransfer));
	assert_eq!(state.last_batch, Some(upload.id()));

	// sample on the graphics queue, the texture changes owner
	let draw = graph
		.cmd_batch(QueueType::Graphics, "draw")?
		.use_resource_in(texture, ResourceState::ShaderSample)?
		.begin();
	let mut graphics_ctx = BarrierCollector::new();
	draw.task("sample")?.last().run(&mut graphics_ctx, |task| {
		task.resource_state(texture, ResourceState::ShaderSample)?;
		assert!(task.check_resource_state(texture, ResourceState::ShaderSample)?);
		Ok(())
	})?;
	assert_eq!(
		graphics_ctx.barriers().copied().collect::<Vec<_>>(),
		[
			Barrier::resource(texture.into(), ResourceState::ShaderSample, ResourceState::ShaderSample)
				.queue_transfer(QueueType::AsyncTransfer, QueueType::Graphics)
		]
	);
	let state = tracker.global_state(texture.into()).unwrap();
	assert_eq!(state.current_state, ResourceState::ShaderSample);
	assert_eq!(state.last_queue, Some(QueueType::Graphics));
	assert_eq!(state.last_batch, Some(draw.id()));

	graph.end_frame()?;
	upload.complete();
	draw.complete();
	assert!(graph.wait_all(None));
	Ok(())
}

#[test]
fn test_shared_resources_skip_ownership_transfer() -> anyhow::Result<()> {
	let tracker = Arc::new(ResStateTracker::new());
	let vertices = buffer(3);
	tracker.add_resource(vertices.into(), ResourceState::VertexBuffer, ResourceState::VertexBuffer, None)?;
	assert!(tracker.set_exclusive_sharing(vertices.into(), false));
	let mut graph = RenderGraph::new(tracker.clone(), RenderGraphConfig::REASONABLE_DEFAULTS)?;
	graph.begin_frame()?;

	let compute = graph
		.cmd_batch(QueueType::AsyncCompute, "generate")?
		.use_resource(vertices, ResourceState::ShaderWrite, ResourceState::VertexBuffer)?
		.begin();
	let mut ctx = BarrierCollector::new();
	compute.task("write")?.last().run(&mut ctx, |task| {
		task.resource_state(vertices, ResourceState::ShaderWrite)?;
		Ok(())
	})?;

	let draw = graph
		.cmd_batch(QueueType::Graphics, "draw")?
		.use_resource_default(vertices)?
		.begin();
	ctx.clear();
	draw.task("draw")?.last().run(&mut ctx, |task| {
		task.resource_state(vertices, ResourceState::VertexBuffer)?;
		Ok(())
	})?;
	assert!(ctx.barriers().all(|barrier| barrier.queue_transfer.is_none()));
	assert_eq!(
		tracker.global_state(vertices.into()).unwrap().last_queue,
		Some(QueueType::Graphics)
	);
	graph.end_frame()?;
	Ok(())
}
