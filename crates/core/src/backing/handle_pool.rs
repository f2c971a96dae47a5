use crate::backing::lf_indexed_pool::{LfIndexedPool, PoolError};
use static_assertions::const_assert_eq;
use std::fmt::{Debug, Display, Formatter};
use std::mem;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

pub const ID_INDEX_BITS: u32 = 20;
pub const ID_GENERATION_BITS: u32 = 12;

const ID_INDEX_MASK: u32 = (1 << ID_INDEX_BITS) - 1;
const ID_GENERATION_MASK: u32 = (1 << ID_GENERATION_BITS) - 1;

const ID_INDEX_SHIFT: u32 = 0;
const ID_GENERATION_SHIFT: u32 = ID_INDEX_BITS;

// uses all 32 bits
const_assert_eq!(ID_INDEX_BITS + ID_GENERATION_BITS, 32);
// masks do not overlap
const_assert_eq!(ID_INDEX_MASK << ID_INDEX_SHIFT & ID_GENERATION_MASK << ID_GENERATION_SHIFT, 0);

/// An index plus generation handle, bit packed into an u32. The generation distinguishes different resources that
/// reused the same index, so a stale handle can be detected instead of silently aliasing a newer resource.
#[repr(transparent)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RawId(u32);
const_assert_eq!(mem::size_of::<RawId>(), 4);

impl RawId {
	/// Creates a new `RawId` or None if `index` does not fit into [`ID_INDEX_BITS`] bits. The generation wraps around
	/// after [`ID_GENERATION_BITS`] bits.
	pub const fn new(index: u32, generation: u32) -> Option<Self> {
		if index == index & ID_INDEX_MASK {
			Some(Self::new_unchecked(index, generation))
		} else {
			None
		}
	}

	const fn new_unchecked(index: u32, generation: u32) -> Self {
		let mut value = 0;
		value |= (index & ID_INDEX_MASK) << ID_INDEX_SHIFT;
		value |= (generation & ID_GENERATION_MASK) << ID_GENERATION_SHIFT;
		Self(value)
	}

	pub const fn index(&self) -> u32 {
		(self.0 >> ID_INDEX_SHIFT) & ID_INDEX_MASK
	}

	pub const fn generation(&self) -> u32 {
		(self.0 >> ID_GENERATION_SHIFT) & ID_GENERATION_MASK
	}

	pub const fn to_u32(&self) -> u32 {
		self.0
	}
}

impl Debug for RawId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RawId")
			.field("index", &self.index())
			.field("generation", &self.generation())
			.finish()
	}
}

impl Display for RawId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}v{}", self.index(), self.generation())
	}
}

/// Allocates [`RawId`] handles. Indices come from a [`LfIndexedPool`], so [`Self::alloc`] may be called from any thread
/// concurrently. Every slot carries a generation that is bumped on [`Self::free`].
pub struct HandlePool<const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> {
	indices: LfIndexedPool<(), CHUNK_SIZE, MAX_CHUNKS>,
	generations: Box<[AtomicU32]>,
}

impl<const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> HandlePool<CHUNK_SIZE, MAX_CHUNKS> {
	const VALID: () = assert!(
		CHUNK_SIZE * MAX_CHUNKS <= 1 << ID_INDEX_BITS,
		"HandlePool capacity exceeds ID_INDEX_BITS"
	);

	pub fn new() -> Self {
		#[allow(clippy::let_unit_value)]
		let () = Self::VALID;
		Self {
			indices: LfIndexedPool::new(),
			generations: (0..CHUNK_SIZE * MAX_CHUNKS).map(|_| AtomicU32::new(0)).collect(),
		}
	}

	pub fn alloc(&self) -> Result<RawId, PoolError> {
		let index = self.indices.assign(|_| ())?;
		let generation = self.generations[index as usize].load(Acquire);
		Ok(RawId::new_unchecked(index, generation))
	}

	/// Frees `id`. Returns false if `id` is stale or was already freed.
	pub fn free(&self, id: RawId) -> bool {
		let index = id.index();
		if !self.is_alive(id) {
			return false;
		}
		let generation = &self.generations[index as usize];
		let next = (id.generation() + 1) & ID_GENERATION_MASK;
		// only one of multiple concurrent frees of the same id may win
		if generation
			.compare_exchange(id.generation(), next, AcqRel, Relaxed)
			.is_err()
		{
			return false;
		}
		// Safety: the generation CAS made us the exclusive owner of the index, and the unit slot holds no data
		unsafe { self.indices.unassign(index) }
	}

	pub fn is_alive(&self, id: RawId) -> bool {
		let index = id.index();
		(index as usize) < self.generations.len()
			&& self.indices.is_assigned(index)
			&& self.generations[index as usize].load(Acquire) == id.generation()
	}

	pub fn len(&self) -> usize {
		self.indices.assigned_count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Default for HandlePool<CHUNK_SIZE, MAX_CHUNKS> {
	fn default() -> Self {
		Self::new()
	}
}

impl<const CHUNK_SIZE: usize, const MAX_CHUNKS: usize> Debug for HandlePool<CHUNK_SIZE, MAX_CHUNKS> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HandlePool").field("len", &self.len()).finish()
	}
}
