use std::fmt::{Debug, Display, Formatter};

/// Identifies a frame. `unique` increases with every frame, `index` is the frame-in-flight slot it occupies, cycling
/// through `0..max_frames`.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct FrameUid {
	pub unique: u64,
	pub index: u32,
	pub max_frames: u32,
}

impl FrameUid {
	pub const fn new(max_frames: u32) -> Self {
		Self {
			unique: 0,
			index: 0,
			max_frames,
		}
	}

	pub const fn next(&self) -> Self {
		Self {
			unique: self.unique.wrapping_add(1),
			index: (self.index + 1) % self.max_frames,
			max_frames: self.max_frames,
		}
	}

	pub const fn prev(&self) -> Self {
		Self {
			unique: self.unique.wrapping_sub(1),
			index: (self.index + self.max_frames - 1) % self.max_frames,
			max_frames: self.max_frames,
		}
	}

	#[inline]
	pub const fn index(&self) -> usize {
		self.index as usize
	}
}

impl Debug for FrameUid {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "FrameUid({} [{}/{}])", self.unique, self.index, self.max_frames)
	}
}

impl Display for FrameUid {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} [{}]", self.unique, self.index)
	}
}
