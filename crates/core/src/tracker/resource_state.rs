use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};

/// The abstract usage a resource is in. A barrier is required to move a resource from one state to another, see
/// [`ResourceState::require_memory_barrier`] and [`ResourceState::require_image_barrier`].
#[repr(u8)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum ResourceState {
	/// Any access, the resting state of most resources
	General,
	CopySrc,
	CopyDst,
	BlitSrc,
	BlitDst,
	ClearDst,
	HostRead,
	HostWrite,
	VertexBuffer,
	IndexBuffer,
	IndirectBuffer,
	UniformRead,
	/// storage buffer or storage image read
	ShaderRead,
	/// storage buffer or storage image write
	ShaderWrite,
	ShaderReadWrite,
	/// sampled image read
	ShaderSample,
	InputAttachment,
	ColorAttachment,
	DepthStencilAttachment,
	DepthStencilRead,
	Present,
	/// acceleration structure build, read and write of its scratch and geometry memory
	AsBuild,
	/// acceleration structure traced against
	AsRead,
}

/// The layout an image has in a certain [`ResourceState`].
#[repr(u8)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum ImageLayout {
	/// Contents are undefined and may be discarded
	Undefined,
	General,
	TransferSrc,
	TransferDst,
	ShaderReadOnly,
	ColorAttachment,
	DepthStencilAttachment,
	DepthStencilReadOnly,
	PresentSrc,
}

impl ResourceState {
	pub const fn has_read_access(&self) -> bool {
		match self {
			ResourceState::General
			| ResourceState::CopySrc
			| ResourceState::BlitSrc
			| ResourceState::HostRead
			| ResourceState::VertexBuffer
			| ResourceState::IndexBuffer
			| ResourceState::IndirectBuffer
			| ResourceState::UniformRead
			| ResourceState::ShaderRead
			| ResourceState::ShaderReadWrite
			| ResourceState::ShaderSample
			| ResourceState::InputAttachment
			| ResourceState::ColorAttachment
			| ResourceState::DepthStencilAttachment
			| ResourceState::DepthStencilRead
			| ResourceState::Present
			| ResourceState::AsBuild
			| ResourceState::AsRead => true,
			ResourceState::CopyDst
			| ResourceState::BlitDst
			| ResourceState::ClearDst
			| ResourceState::HostWrite
			| ResourceState::ShaderWrite => false,
		}
	}

	pub const fn has_write_access(&self) -> bool {
		matches!(
			self,
			ResourceState::General
				| ResourceState::CopyDst
				| ResourceState::BlitDst
				| ResourceState::ClearDst
				| ResourceState::HostWrite
				| ResourceState::ShaderWrite
				| ResourceState::ShaderReadWrite
				| ResourceState::ColorAttachment
				| ResourceState::DepthStencilAttachment
				| ResourceState::AsBuild
		)
	}

	pub const fn is_read_only(&self) -> bool {
		!self.has_write_access()
	}

	pub const fn image_layout(&self) -> ImageLayout {
		match self {
			ResourceState::CopySrc | ResourceState::BlitSrc => ImageLayout::TransferSrc,
			ResourceState::CopyDst | ResourceState::BlitDst | ResourceState::ClearDst => ImageLayout::TransferDst,
			ResourceState::ShaderSample | ResourceState::InputAttachment => ImageLayout::ShaderReadOnly,
			ResourceState::ColorAttachment => ImageLayout::ColorAttachment,
			ResourceState::DepthStencilAttachment => ImageLayout::DepthStencilAttachment,
			ResourceState::DepthStencilRead => ImageLayout::DepthStencilReadOnly,
			ResourceState::Present => ImageLayout::PresentSrc,
			ResourceState::General
			| ResourceState::HostRead
			| ResourceState::HostWrite
			| ResourceState::VertexBuffer
			| ResourceState::IndexBuffer
			| ResourceState::IndirectBuffer
			| ResourceState::UniformRead
			| ResourceState::ShaderRead
			| ResourceState::ShaderWrite
			| ResourceState::ShaderReadWrite
			| ResourceState::AsBuild
			| ResourceState::AsRead => ImageLayout::General,
		}
	}

	pub fn is_same_state(&self, other: ResourceState) -> bool {
		*self == other
	}

	/// Copies and blits into the same state are expected to target disjoint regions, so no barrier is issued between
	/// them. Users must add such a barrier explicitly if the regions overlap.
	pub fn is_unnecessary_barrier(&self, dst: ResourceState) -> bool {
		*self == dst && matches!(self, ResourceState::CopyDst | ResourceState::BlitDst)
	}

	/// Whether a memory or execution dependency is needed between an access in `self` followed by an access in `dst`.
	/// `relaxed` skips the barrier between identical states.
	pub fn require_memory_barrier(&self, dst: ResourceState, relaxed: bool) -> bool {
		if self.is_read_only() && dst.is_read_only() {
			return false;
		}
		!(relaxed && *self == dst)
	}

	/// Like [`Self::require_memory_barrier`] but also requires a barrier on any layout change.
	pub fn require_image_barrier(&self, dst: ResourceState, relaxed: bool) -> bool {
		self.image_layout() != dst.image_layout() || self.require_memory_barrier(dst, relaxed)
	}
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, FromPrimitive, ToPrimitive)]
pub enum QueueType {
	Graphics,
	AsyncCompute,
	AsyncTransfer,
	VideoEncode,
	VideoDecode,
}

impl QueueType {
	pub const COUNT: usize = 5;
	pub const ALL: [QueueType; Self::COUNT] = [
		QueueType::Graphics,
		QueueType::AsyncCompute,
		QueueType::AsyncTransfer,
		QueueType::VideoEncode,
		QueueType::VideoDecode,
	];

	pub const fn to_usize(&self) -> usize {
		*self as usize
	}
}

bitflags! {
	/// The set of queues a resource may be used on.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
	pub struct QueueMask: u32 {
		const GRAPHICS = 1 << QueueType::Graphics as u32;
		const ASYNC_COMPUTE = 1 << QueueType::AsyncCompute as u32;
		const ASYNC_TRANSFER = 1 << QueueType::AsyncTransfer as u32;
		const VIDEO_ENCODE = 1 << QueueType::VideoEncode as u32;
		const VIDEO_DECODE = 1 << QueueType::VideoDecode as u32;
	}
}

impl QueueMask {
	/// Resources usable on at most one queue use exclusive sharing and need an ownership transfer when another queue
	/// wants to access them.
	pub fn is_exclusive(&self) -> bool {
		self.bits().count_ones() <= 1
	}

	pub fn contains_queue(&self, queue: QueueType) -> bool {
		self.contains(QueueMask::from(queue))
	}
}

impl From<QueueType> for QueueMask {
	fn from(queue: QueueType) -> Self {
		QueueMask::from_bits_retain(1 << queue as u32)
	}
}
