use crate::tracker::resource_key::ResourceKey;
use crate::tracker::resource_state::ResourceState;
use crate::tracker::state_tracker::BatchId;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

#[derive(Error)]
pub enum BatchError {
	#[error("Batch {batch} uses more than the maximum of {limit} resources")]
	TooManyResources { batch: BatchId, limit: usize },
	#[error("Task {task} of batch {batch} is out of range, a batch may have at most {limit} tasks")]
	TaskOutOfRange { batch: BatchId, task: usize, limit: usize },
	#[error("Task {task} of batch {batch} was already begun")]
	TaskAlreadyBegun { batch: BatchId, task: usize },
	#[error("Task {task} of batch {batch} was not begun")]
	TaskNotBegun { batch: BatchId, task: usize },
	#[error("Task {task} of batch {batch} was not created")]
	TaskNotCreated { batch: BatchId, task: usize },
	#[error("Task {task} of batch {batch} can not declare resources, a later task was already created")]
	TaskNotNewest { batch: BatchId, task: usize },
	#[error("Resource {key} was already declared by task {task} of batch {batch}")]
	ResourceAlreadyDeclared {
		batch: BatchId,
		task: usize,
		key: ResourceKey,
	},
	#[error(
		"Resource {key} is already used by batch {batch} with initial state {declared:?}, can not redeclare it with initial state {requested:?}"
	)]
	ConflictingInitialState {
		batch: BatchId,
		key: ResourceKey,
		declared: ResourceState,
		requested: ResourceState,
	},
	#[error("Batch {batch} already created tasks, batch wide resources must be declared before")]
	BatchAlreadyStarted { batch: BatchId },
	#[error("Batch {batch} was already committed")]
	AlreadyCommitted { batch: BatchId },
}

impl Debug for BatchError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self)
	}
}
