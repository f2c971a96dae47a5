//! Frame and command batch orchestration around the [`ResStateTracker`](crate::tracker::state_tracker::ResStateTracker).

pub mod cmd_batch;
pub mod config;
pub mod error;
pub mod execution;
pub mod frame;
pub mod render_graph;
pub mod surface;
