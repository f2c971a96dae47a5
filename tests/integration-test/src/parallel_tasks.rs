#![cfg(test)]

use render_graph_core::backing::handle_pool::RawId;
use render_graph_core::batch::barrier::{Barrier, BarrierCollector};
use render_graph_core::batch::batch_data::MAX_TASKS_PER_BATCH;
use render_graph_core::prelude::*;
use std::sync::Arc;
use std::thread;

fn image(index: u32) -> ImageId {
	ImageId(RawId::new(index, 0).unwrap())
}

fn buffer(index: u32) -> BufferId {
	BufferId(RawId::new(index, 0).unwrap())
}

#[test]
fn test_tasks_recorded_on_many_threads() -> anyhow::Result<()> {
	crate::init_logger();
	let tracker = Arc::new(ResStateTracker::new());
	let gbuffer = image(1);
	let shadow = image(2);
	let out = image(3);
	for key in [gbuffer, shadow, out] {
		tracker.add_resource(key.into(), ResourceState::ShaderSample, ResourceState::ShaderSample, None)?;
	}
	let mut graph = RenderGraph::new(tracker.clone(), RenderGraphConfig::REASONABLE_DEFAULTS)?;
	graph.begin_frame()?;
	let batch = graph
		.cmd_batch(QueueType::Graphics, "deferred")?
		.use_resource_in(gbuffer, ResourceState::ColorAttachment)?
		.use_resource_in(shadow, ResourceState::DepthStencilAttachment)?
		.use_resource(out, ResourceState::ShaderWrite, ResourceState::ShaderSample)?
		.begin();

	let mut builders = (0..4)
		.map(|i| batch.task(format!("pass {}", i)))
		.collect::<Result<Vec<_>, _>>()?;

	// the last task finishing first must not commit while earlier tasks still record
	let last = builders.pop().unwrap().last();
	assert_eq!(last.index(), 3);
	let mut last_ctx = BarrierCollector::new();
	last.run(&mut last_ctx, |task| {
		task.resource_state(out, ResourceState::ShaderWrite)?;
		Ok(())
	})?;
	assert_eq!(batch.status(), BatchStatus::Recording);
	assert_eq!(
		last_ctx.barriers().copied().collect::<Vec<_>>(),
		[Barrier::resource(
			out.into(),
			ResourceState::ShaderWrite,
			ResourceState::ShaderSample
		)]
	);

	let contexts = thread::scope(|s| {
		let handles = builders
			.into_iter()
			.map(|builder| {
				s.spawn(move || -> Result<BarrierCollector, BatchError> {
					let mut ctx = BarrierCollector::new();
					let index = builder.index();
					builder.run(&mut ctx, |task| {
						if index == 1 {
							task.resource_state(gbuffer, ResourceState::ShaderSample)?;
						}
						task.resource_state(shadow, ResourceState::DepthStencilAttachment)?;
						Ok(())
					})?;
					Ok(ctx)
				})
			})
			.collect::<Vec<_>>();
		handles
			.into_iter()
			.map(|h| h.join().unwrap())
			.collect::<Result<Vec<_>, _>>()
	})?;
	assert_eq!(batch.status(), BatchStatus::Committed);

	// the first task discards the never written images
	assert_eq!(contexts[0].barriers().filter(|barrier| barrier.discard).count(), 3);
	// tasks declaring nothing leave the resources as they found them
	let gbuffer_barriers = contexts[1]
		.barriers()
		.filter(|barrier| barrier.key == Some(gbuffer.into()))
		.copied()
		.collect::<Vec<_>>();
	assert_eq!(
		gbuffer_barriers,
		[
			Barrier::resource(
				gbuffer.into(),
				ResourceState::ColorAttachment,
				ResourceState::ShaderSample
			),
			Barrier::resource(
				gbuffer.into(),
				ResourceState::ShaderSample,
				ResourceState::ColorAttachment
			),
		]
	);
	assert!(contexts[2].barriers().next().is_none());

	assert_eq!(tracker.get_resource_state(out.into()), Some(ResourceState::ShaderSample));
	assert_eq!(tracker.get_resource_state(gbuffer.into()), Some(ResourceState::ColorAttachment));
	assert_eq!(
		tracker.get_resource_state(shadow.into()),
		Some(ResourceState::DepthStencilAttachment)
	);

	graph.end_frame()?;
	batch.complete();
	assert!(batch.wait(None));
	assert_eq!(batch.status(), BatchStatus::Complete);
	Ok(())
}

#[test]
fn test_declared_states_chain_across_threads() -> anyhow::Result<()> {
	let tracker = Arc::new(ResStateTracker::new());
	let particles = buffer(6);
	tracker.add_resource(particles.into(), ResourceState::General, ResourceState::General, None)?;
	let mut graph = RenderGraph::new(tracker.clone(), RenderGraphConfig::REASONABLE_DEFAULTS)?;
	graph.begin_frame()?;
	let batch = graph
		.cmd_batch(QueueType::AsyncCompute, "particles")?
		.use_resource(particles, ResourceState::General, ResourceState::ShaderRead)?
		.begin();

	let upload = batch
		.task("upload")?
		.use_resource(particles, ResourceState::General, ResourceState::CopyDst)?;
	let simulate = batch
		.task("simulate")?
		.use_resource(particles, ResourceState::CopyDst, ResourceState::ShaderWrite)?;
	let read = batch.task("read")?.last();

	let (upload_ctx, simulate_ctx, read_ctx) = thread::scope(|s| {
		let read = s.spawn(move || -> Result<BarrierCollector, BatchError> {
			let mut ctx = BarrierCollector::new();
			read.run(&mut ctx, |task| task.resource_state(particles, ResourceState::ShaderRead))?;
			Ok(ctx)
		});
		let simulate = s.spawn(move || -> Result<BarrierCollector, BatchError> {
			let mut ctx = BarrierCollector::new();
			simulate.run(&mut ctx, |task| {
				assert!(task.check_resource_state(particles, ResourceState::CopyDst)?);
				task.resource_state(particles, ResourceState::ShaderWrite)
			})?;
			Ok(ctx)
		});
		let mut ctx = BarrierCollector::new();
		upload.run(&mut ctx, |task| task.resource_state(particles, ResourceState::CopyDst))?;
		Ok::<_, BatchError>((ctx, simulate.join().unwrap()?, read.join().unwrap()?))
	})?;
	assert_eq!(batch.status(), BatchStatus::Committed);

	let key = ResourceKey::from(particles);
	assert_eq!(
		upload_ctx.barriers().copied().collect::<Vec<_>>(),
		[Barrier::resource(key, ResourceState::General, ResourceState::CopyDst)]
	);
	assert_eq!(
		simulate_ctx.barriers().copied().collect::<Vec<_>>(),
		[Barrier::resource(key, ResourceState::CopyDst, ResourceState::ShaderWrite)]
	);
	assert_eq!(
		read_ctx.barriers().copied().collect::<Vec<_>>(),
		[Barrier::resource(key, ResourceState::ShaderWrite, ResourceState::ShaderRead)]
	);
	assert_eq!(tracker.get_resource_state(key), Some(ResourceState::ShaderRead));
	graph.end_frame()?;
	Ok(())
}

#[test]
fn test_batch_without_tasks() -> anyhow::Result<()> {
	let tracker = Arc::new(ResStateTracker::new());
	let target = image(4);
	tracker.add_resource(target.into(), ResourceState::General, ResourceState::General, None)?;
	let mut graph = RenderGraph::new(tracker.clone(), RenderGraphConfig::REASONABLE_DEFAULTS)?;
	graph.begin_frame()?;

	let batch = graph
		.cmd_batch(QueueType::AsyncCompute, "external")?
		.use_resource(target, ResourceState::General, ResourceState::ShaderSample)?
		.begin();
	assert_eq!(batch.commit()?, 1);
	assert!(matches!(batch.commit(), Err(BatchError::AlreadyCommitted { .. })));
	assert_eq!(tracker.get_resource_state(target.into()), Some(ResourceState::ShaderSample));
	assert!(matches!(batch.task("late"), Err(BatchError::AlreadyCommitted { .. })));

	let crowded = graph.cmd_batch(QueueType::AsyncCompute, "crowded")?.begin();
	let tasks = (0..MAX_TASKS_PER_BATCH)
		.map(|i| crowded.task(format!("filler {}", i)))
		.collect::<Result<Vec<_>, _>>()?;
	assert!(matches!(
		crowded.task("one too many"),
		Err(BatchError::TaskOutOfRange { .. })
	));
	// none of them is the last task, so the batch is left for an explicit commit
	drop(tasks);
	assert_eq!(crowded.status(), BatchStatus::Recording);
	assert_eq!(crowded.commit()?, 0);
	graph.end_frame()?;
	Ok(())
}
