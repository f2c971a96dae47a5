//! Tracking of the state each resource was left in by the last committed batch.

pub mod resource_key;
pub mod resource_state;
pub mod resources;
pub mod state_tracker;
