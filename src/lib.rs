//! A segregated free-list allocator over one growable heap.
//!
//! Every block carries a boundary tag (size and allocated bit) at both ends,
//! so neighbours can be found and merged from either side. Free blocks are
//! kept in ten size-class lists, each sorted by size, whose links are 32-bit
//! offsets from a fixed heap origin.
//!
//! ```text
//!   heap_lo
//!   ┌──────────────┬─────┬──────────┬─────────┬─────────┬─────┬──────────┐
//!   │ 10 list heads│ pad │ prologue │ block … │ block … │ ... │ epilogue │
//!   └──────────────┴─────┴──────────┴─────────┴─────────┴─────┴──────────┘
//!                        ▲ origin                                heap_hi
//!
//!   block:  [ header | payload / (prev, next) links ... | footer ]
//! ```
//!
//! ```rust
//! use segalloc::{check_heap, Heap};
//!
//! let mut heap = Heap::with_capacity(1 << 20).unwrap();
//!
//! let ptr = heap.calloc(10, 4);
//! assert!(!ptr.is_null());
//!
//! unsafe { heap.free(ptr) };
//! assert!(check_heap!(heap).is_ok());
//! ```
//!
//! The allocator is single-threaded: `Heap` is neither `Send` nor `Sync`.

mod allocator;
mod block;
mod checker;
mod coalesce;
mod constants;
mod error;
mod free_block;
mod heap;
mod seg_lists;
mod size_class;
mod store;

pub use checker::{CheckReport, Violation};
pub use error::AllocError;
pub use heap::Heap;
pub use size_class::SizeClass;
pub use store::{ArenaStore, HeapStore};
