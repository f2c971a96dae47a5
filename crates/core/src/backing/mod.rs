//! Backing data structures for handing out slots concurrently: the lock-free indexed pool, the index+generation
//! handles built on top of it and the spin locks guarding their rare slow paths.

pub mod handle_pool;
pub mod lf_indexed_pool;
pub mod spin_lock;
