pub mod frame_cycle;
pub mod lf_pool;
pub mod parallel_tasks;
pub mod queue_handoff;
pub mod vk_barriers;

/// Routes `log` output of the graph to the test harness, controlled by `RUST_LOG`.
pub fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}
