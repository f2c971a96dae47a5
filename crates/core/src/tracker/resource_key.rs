use crate::backing::handle_pool::RawId;
use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display, Formatter};

macro_rules! resource_id {
	($(#[$meta:meta])* $name:ident, $variant:ident) => {
		$(#[$meta])*
		#[repr(transparent)]
		#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
		pub struct $name(pub RawId);

		impl $name {
			pub const KIND: ResourceKind = ResourceKind::$variant;

			pub const fn raw(&self) -> RawId {
				self.0
			}
		}

		impl From<$name> for ResourceKey {
			fn from(id: $name) -> Self {
				ResourceKey::$variant(id)
			}
		}

		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}({})", stringify!($name), self.0)
			}
		}
	};
}

resource_id!(
	/// Handle of an image
	ImageId,
	Image
);
resource_id!(
	/// Handle of a buffer
	BufferId,
	Buffer
);
resource_id!(
	/// Handle of a ray tracing bottom level acceleration structure
	RtGeometryId,
	RtGeometry
);
resource_id!(
	/// Handle of a ray tracing top level acceleration structure
	RtSceneId,
	RtScene
);

#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum ResourceKind {
	Image,
	Buffer,
	RtGeometry,
	RtScene,
}

impl ResourceKind {
	pub const COUNT: usize = 4;

	pub const fn to_usize(&self) -> usize {
		*self as usize
	}
}

/// One comparable and hashable key for every kind of trackable resource. Keys do not own their resource, two keys
/// are equal if both their kind and their [`RawId`] match.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ResourceKey {
	Image(ImageId),
	Buffer(BufferId),
	RtGeometry(RtGeometryId),
	RtScene(RtSceneId),
}

impl ResourceKey {
	pub const fn kind(&self) -> ResourceKind {
		match self {
			ResourceKey::Image(_) => ResourceKind::Image,
			ResourceKey::Buffer(_) => ResourceKind::Buffer,
			ResourceKey::RtGeometry(_) => ResourceKind::RtGeometry,
			ResourceKey::RtScene(_) => ResourceKind::RtScene,
		}
	}

	pub const fn raw(&self) -> RawId {
		match self {
			ResourceKey::Image(id) => id.0,
			ResourceKey::Buffer(id) => id.0,
			ResourceKey::RtGeometry(id) => id.0,
			ResourceKey::RtScene(id) => id.0,
		}
	}

	/// Images are the only resources with a layout, all other resources only ever need memory barriers.
	pub const fn is_image(&self) -> bool {
		matches!(self, ResourceKey::Image(_))
	}

	pub const fn as_image(&self) -> Option<ImageId> {
		match self {
			ResourceKey::Image(id) => Some(*id),
			_ => None,
		}
	}

	pub const fn as_buffer(&self) -> Option<BufferId> {
		match self {
			ResourceKey::Buffer(id) => Some(*id),
			_ => None,
		}
	}
}

impl Display for ResourceKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}({})", self.kind(), self.raw())
	}
}
