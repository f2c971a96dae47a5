#![cfg(test)]

use render_graph_core::backing::handle_pool::HandlePool;
use render_graph_core::backing::lf_indexed_pool::{LfIndexedPool, PoolError};
use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct Instances {
	created: AtomicUsize,
	dropped: AtomicUsize,
}

struct Instance {
	index: u32,
	instances: Arc<Instances>,
}

impl Instance {
	fn new(index: u32, instances: &Arc<Instances>) -> Self {
		instances.created.fetch_add(1, Relaxed);
		Self {
			index,
			instances: instances.clone(),
		}
	}
}

impl Drop for Instance {
	fn drop(&mut self) {
		self.instances.dropped.fetch_add(1, Relaxed);
	}
}

type Pool = LfIndexedPool<Instance, 64, 2>;

/// Assigns 16 slots on each of 8 threads.
fn fill_from_threads(
	pool: &Pool,
	ctor: impl Fn(u32) -> Instance + Sync,
) -> Result<Vec<Vec<u32>>, PoolError> {
	thread::scope(|s| {
		let handles = (0..8)
			.map(|_| s.spawn(|| (0..16).map(|_| pool.assign(&ctor)).collect::<Result<Vec<_>, _>>()))
			.collect::<Vec<_>>();
		handles
			.into_iter()
			.map(|h| h.join().unwrap())
			.collect::<Result<Vec<_>, _>>()
	})
}

#[test]
fn test_concurrent_fill_and_reuse() -> anyhow::Result<()> {
	crate::init_logger();
	let instances = Arc::new(Instances::default());
	let mut pool = Pool::new();

	let indices = fill_from_threads(&pool, |index| Instance::new(index, &instances))?;

	let unique = indices.iter().flatten().copied().collect::<HashSet<_>>();
	assert_eq!(unique.len(), 128);
	assert!(unique.iter().all(|index| (*index as usize) < Pool::CAPACITY));
	for index in &unique {
		assert_eq!(pool[*index].index, *index);
	}
	assert_eq!(pool.assigned_count(), 128);
	assert_eq!(pool.allocated_chunks(), 2);
	assert!(matches!(
		pool.assign(|index| Instance::new(index, &instances)),
		Err(PoolError::Full { capacity: 128 })
	));
	assert_eq!(instances.created.load(Relaxed), 128);

	for index in &unique {
		// Safety: no references into the pool are held
		assert!(unsafe { pool.unassign(*index) });
	}
	assert_eq!(pool.assigned_count(), 0);
	assert!(!unsafe { pool.unassign(0) });

	// reassigning drops the stale value and constructs exactly one new one per slot
	let reassigned = fill_from_threads(&pool, |index| Instance::new(index, &instances))?;
	assert_eq!(reassigned.iter().flatten().copied().collect::<HashSet<_>>(), unique);
	assert_eq!(instances.created.load(Relaxed), 256);
	assert_eq!(instances.dropped.load(Relaxed), 128);

	// reuse keeps the constructed values alive
	pool.unassign_all(|_, _| ());
	let reused = AtomicUsize::new(0);
	let reassigned = thread::scope(|s| {
		let handles = (0..8)
			.map(|_| {
				s.spawn(|| {
					(0..16)
						.map(|_| {
							pool.assign_with(
								|index| Instance::new(index, &instances),
								|instance, index| {
									assert_eq!(instance.index, index);
									reused.fetch_add(1, Relaxed);
								},
							)
						})
						.collect::<Result<Vec<_>, _>>()
				})
			})
			.collect::<Vec<_>>();
		handles
			.into_iter()
			.map(|h| h.join().unwrap())
			.collect::<Result<Vec<_>, _>>()
	})?;
	assert_eq!(reassigned.iter().flatten().copied().collect::<HashSet<_>>(), unique);
	assert_eq!(reused.load(Relaxed), 128);
	assert_eq!(instances.created.load(Relaxed), 256);
	assert_eq!(pool.assigned_count(), 128);

	pool.release(false);
	assert_eq!(instances.dropped.load(Relaxed), 256);
	assert_eq!(pool.allocated_chunks(), 0);
	Ok(())
}

#[test]
fn test_handles_across_threads() -> anyhow::Result<()> {
	let pool = HandlePool::<64, 2>::new();
	let ids = thread::scope(|s| {
		let handles = (0..4)
			.map(|_| s.spawn(|| (0..32).map(|_| pool.alloc()).collect::<Result<Vec<_>, _>>()))
			.collect::<Vec<_>>();
		handles
			.into_iter()
			.map(|h| h.join().unwrap())
			.collect::<Result<Vec<_>, _>>()
	})?
	.into_iter()
	.flatten()
	.collect::<Vec<_>>();
	assert_eq!(pool.len(), 128);
	assert!(pool.alloc().is_err());

	let stale = ids[0];
	assert!(pool.free(stale));
	assert!(!pool.is_alive(stale));
	let fresh = pool.alloc()?;
	assert_eq!(fresh.index(), stale.index());
	assert_ne!(fresh.generation(), stale.generation());
	assert!(!pool.free(stale));
	Ok(())
}
