use crate::tracker::resource_key::ResourceKey;
use crate::tracker::resource_state::{QueueType, ResourceState};
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};

/// Ownership transfer of a resource with exclusive sharing from one queue to another.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct QueueTransfer {
	pub src: QueueType,
	pub dst: QueueType,
}

/// A transition of a resource, or of all memory if `key` is None, from `src` to `dst`.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct Barrier {
	pub key: Option<ResourceKey>,
	pub src: ResourceState,
	pub dst: ResourceState,
	/// the previous contents are not needed and may be discarded, for images the old layout becomes undefined
	pub discard: bool,
	pub queue_transfer: Option<QueueTransfer>,
}

impl Barrier {
	pub fn resource(key: ResourceKey, src: ResourceState, dst: ResourceState) -> Self {
		Self {
			key: Some(key),
			src,
			dst,
			discard: false,
			queue_transfer: None,
		}
	}

	pub fn memory(src: ResourceState, dst: ResourceState) -> Self {
		Self {
			key: None,
			src,
			dst,
			discard: false,
			queue_transfer: None,
		}
	}

	pub fn discard(mut self, discard: bool) -> Self {
		self.discard = discard;
		self
	}

	pub fn queue_transfer(mut self, src: QueueType, dst: QueueType) -> Self {
		self.queue_transfer = Some(QueueTransfer { src, dst });
		self
	}
}

impl Debug for Barrier {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match &self.key {
			None => write!(f, "Memory: {:?} -> {:?}", self.src, self.dst)?,
			Some(key) => write!(f, "{}: {:?} -> {:?}", key, self.src, self.dst)?,
		}
		if self.discard {
			write!(f, " (discard)")?;
		}
		if let Some(transfer) = &self.queue_transfer {
			write!(f, " [{:?} -> {:?}]", transfer.src, transfer.dst)?;
		}
		Ok(())
	}
}

/// The command recording side barriers are emitted into.
pub trait CommandContext {
	/// Queues `barrier` to be recorded before the next command.
	fn insert_barrier(&mut self, barrier: Barrier);

	/// Records all barriers queued by [`Self::insert_barrier`] as one batch.
	fn commit_barriers(&mut self);

	fn debug_marker(&mut self, _label: &str) {}
}

/// A [`CommandContext`] that only collects barriers, both for testing and for platforms converting them later.
#[derive(Debug, Clone, Default)]
pub struct BarrierCollector {
	pending: SmallVec<[Barrier; 8]>,
	committed: Vec<SmallVec<[Barrier; 8]>>,
	markers: Vec<String>,
}

impl BarrierCollector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty() && self.committed.is_empty()
	}

	/// Barriers inserted but not yet committed
	pub fn pending(&self) -> &[Barrier] {
		&self.pending
	}

	/// Every committed group of barriers, in order
	pub fn committed(&self) -> &[SmallVec<[Barrier; 8]>] {
		&self.committed
	}

	/// All committed barriers flattened
	pub fn barriers(&self) -> impl Iterator<Item = &Barrier> + '_ {
		self.committed.iter().flatten()
	}

	pub fn markers(&self) -> &[String] {
		&self.markers
	}

	pub fn clear(&mut self) {
		self.pending.clear();
		self.committed.clear();
		self.markers.clear();
	}
}

impl CommandContext for BarrierCollector {
	fn insert_barrier(&mut self, barrier: Barrier) {
		self.pending.push(barrier);
	}

	fn commit_barriers(&mut self) {
		if !self.pending.is_empty() {
			self.committed.push(std::mem::take(&mut self.pending));
		}
	}

	fn debug_marker(&mut self, label: &str) {
		self.markers.push(label.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backing::handle_pool::RawId;
	use crate::tracker::resource_key::ImageId;

	#[test]
	fn test_collector_groups_commits() {
		let key = ResourceKey::from(ImageId(RawId::new(3, 1).unwrap()));
		let mut ctx = BarrierCollector::new();
		ctx.commit_barriers();
		assert!(ctx.is_empty());

		ctx.insert_barrier(Barrier::resource(key, ResourceState::General, ResourceState::CopyDst));
		ctx.insert_barrier(Barrier::memory(ResourceState::CopyDst, ResourceState::HostRead));
		assert_eq!(ctx.pending().len(), 2);
		ctx.commit_barriers();
		ctx.insert_barrier(
			Barrier::resource(key, ResourceState::CopyDst, ResourceState::ShaderSample)
				.discard(true)
				.queue_transfer(QueueType::AsyncTransfer, QueueType::Graphics),
		);
		ctx.commit_barriers();

		assert!(ctx.pending().is_empty());
		assert_eq!(ctx.committed().len(), 2);
		assert_eq!(ctx.barriers().count(), 3);
		assert_eq!(
			format!("{:?}", ctx.committed()[1][0]),
			"Image(3v1): CopyDst -> ShaderSample (discard) [AsyncTransfer -> Graphics]"
		);
	}
}
