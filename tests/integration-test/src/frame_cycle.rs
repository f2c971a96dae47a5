#![cfg(test)]

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use render_graph_core::backing::handle_pool::RawId;
use render_graph_core::batch::barrier::{Barrier, BarrierCollector};
use render_graph_core::prelude::*;
use smallvec::SmallVec;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn image(index: u32) -> ImageId {
	ImageId(RawId::new(index, 0).unwrap())
}

/// A swapchain cycling through its images on every acquire.
struct Swapchain {
	images: Vec<ImageId>,
	acquired: AtomicUsize,
	presented: Mutex<Vec<(ImageId, BatchId)>>,
	present_calls: AtomicUsize,
	out_of_date_on: Option<usize>,
}

impl Swapchain {
	fn new(images: Vec<ImageId>, out_of_date_on: Option<usize>) -> Self {
		Self {
			images,
			acquired: AtomicUsize::new(0),
			presented: Mutex::new(Vec::new()),
			present_calls: AtomicUsize::new(0),
			out_of_date_on,
		}
	}

	fn current(&self) -> ImageId {
		let acquired = self.acquired.load(Relaxed);
		self.images[(acquired + self.images.len() - 1) % self.images.len()]
	}
}

impl OutputSurface for Swapchain {
	fn acquire_image(&self) -> BoxFuture<'static, Result<(), SurfaceError>> {
		self.acquired.fetch_add(1, Relaxed);
		async { Ok(()) }.boxed()
	}

	fn render_targets(&self) -> SmallVec<[ImageId; 2]> {
		SmallVec::from_slice(&[self.current()])
	}

	fn present(&self, batch: &Arc<CommandBatch>) -> Result<(), SurfaceError> {
		if Some(self.present_calls.fetch_add(1, Relaxed)) == self.out_of_date_on {
			return Err(SurfaceError::OutOfDate);
		}
		self.presented.lock().push((self.current(), batch.id()));
		Ok(())
	}
}

/// Completes every batch sent to it after a short delay, standing in for the GPU.
fn spawn_gpu() -> (mpsc::Sender<Arc<CommandBatch>>, thread::JoinHandle<usize>) {
	let (send, recv) = mpsc::channel::<Arc<CommandBatch>>();
	let gpu = thread::spawn(move || {
		let mut completed = 0;
		for batch in recv {
			thread::sleep(Duration::from_millis(2));
			batch.complete();
			completed += 1;
		}
		completed
	});
	(send, gpu)
}

#[test]
fn test_frames_with_surface() -> anyhow::Result<()> {
	crate::init_logger();
	let tracker = Arc::new(ResStateTracker::new());
	let swapchain = Arc::new(Swapchain::new(vec![image(10), image(11), image(12)], None));
	let mut graph = RenderGraph::new(tracker.clone(), RenderGraphConfig::REASONABLE_DEFAULTS)?;
	let (gpu, gpu_thread) = spawn_gpu();

	let mut frames = Vec::new();
	let mut batches = Vec::new();
	for _ in 0..6 {
		assert!(graph.wait_next_frame(Some(Duration::from_secs(5))));
		frames.push(graph.begin_frame()?);

		let batch = graph.cmd_batch(QueueType::Graphics, "main pass")?.begin();
		let acquire = graph.begin_on_surface(swapchain.clone(), &batch)?;
		pollster::block_on(acquire)?;
		let target = swapchain.current();
		assert_eq!(
			batch.data().batch_state(target.into()).map(|s| (s.initial, s.final_state)),
			Some((ResourceState::ColorAttachment, ResourceState::Present))
		);

		let mut ctx = BarrierCollector::new();
		batch.task("draw")?.last().run(&mut ctx, |task| {
			task.resource_state(target, ResourceState::ColorAttachment)?;
			Ok(())
		})?;
		assert!(ctx.barriers().any(|barrier| {
			*barrier == Barrier::resource(target.into(), ResourceState::ColorAttachment, ResourceState::Present)
		}));

		graph.end_frame()?;
		gpu.send(batch.clone())?;
		batches.push(batch);
	}

	assert_eq!(frames.iter().map(|f| f.unique).collect::<Vec<_>>(), [1, 2, 3, 4, 5, 6]);
	assert_eq!(frames.iter().map(|f| f.index).collect::<Vec<_>>(), [1, 0, 1, 0, 1, 0]);
	let presented = swapchain.presented.lock().clone();
	assert_eq!(presented.len(), 6);
	assert_eq!(presented.iter().map(|(image, _)| image.raw().index()).collect::<Vec<_>>(), [10, 11, 12, 10, 11, 12]);

	// swapchain images untracked, the tracker only learns about registered resources
	assert!(!tracker.is_tracked(image(10).into()));

	pollster::block_on(batches.last().unwrap().pending());
	assert!(graph.wait_all(Some(Duration::from_secs(5))));
	assert!(batches.iter().all(|batch| batch.status() == BatchStatus::Complete));
	drop(gpu);
	assert_eq!(gpu_thread.join().unwrap(), 6);
	Ok(())
}

#[test]
fn test_slot_reuse_waits_for_gpu() -> anyhow::Result<()> {
	let tracker = Arc::new(ResStateTracker::new());
	let mut graph = RenderGraph::new(tracker, RenderGraphConfig::REASONABLE_DEFAULTS)?;

	graph.begin_frame()?;
	let first = graph.cmd_batch(QueueType::Graphics, "first")?.begin();
	first.commit()?;
	graph.end_frame()?;
	graph.begin_frame()?;
	graph.end_frame()?;

	assert!(matches!(
		graph.begin_frame(),
		Err(RenderGraphError::FrameInFlight { pending: 1, .. })
	));
	assert!(!graph.wait_next_frame(Some(Duration::from_millis(5))));

	let (gpu, gpu_thread) = spawn_gpu();
	gpu.send(first.clone())?;
	assert!(graph.wait_next_frame(None));
	let third = graph.begin_frame()?;
	assert_eq!(third.index, first.frame().index);
	// the slot was recycled with a new generation
	let reused = graph.cmd_batch(QueueType::Graphics, "reused")?.begin();
	assert_eq!(reused.id().index, first.id().index);
	assert_ne!(reused.id(), first.id());
	assert!(graph.find_batch(first.id()).is_none());
	graph.end_frame()?;

	drop(gpu);
	assert_eq!(gpu_thread.join().unwrap(), 1);
	Ok(())
}

#[test]
fn test_present_failure_still_ends_frame() -> anyhow::Result<()> {
	let tracker = Arc::new(ResStateTracker::new());
	let swapchain = Arc::new(Swapchain::new(vec![image(20), image(21)], Some(1)));
	let mut graph = RenderGraph::new(tracker, RenderGraphConfig::REASONABLE_DEFAULTS)?;

	for frame in 0..3 {
		graph.wait_next_frame(None);
		graph.begin_frame()?;
		let batch = graph.cmd_batch(QueueType::Graphics, "main")?.begin();
		pollster::block_on(graph.begin_on_surface(swapchain.clone(), &batch)?)?;
		batch.commit()?;
		batch.complete();
		let result = graph.end_frame();
		assert_eq!(graph.state(), FrameState::Ended);
		if frame == 1 {
			assert!(matches!(result, Err(RenderGraphError::Surface(SurfaceError::OutOfDate))));
		} else {
			result?;
		}
	}
	assert_eq!(swapchain.presented.lock().len(), 2);
	Ok(())
}
