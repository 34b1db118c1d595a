//! A toy stack machine whose values are heap nodes reclaimed by a
//! mark-and-sweep collector.
//!
//! Values are scalars or pairs of two other values. Everything on the
//! operand stack is a root; anything not reachable from it is freed at the
//! next collection. Collections trigger when the live object count hits a
//! threshold that doubles the surviving count after every cycle.

mod allocator;
mod error;
mod heap;
mod object;
mod observer;
mod stack;
mod visitor;
mod vm;

pub use allocator::Allocator;
pub use error::VMError;
pub use heap::{GarbageCollectionStats, Heap, HeapSettings, RegistryIter};
pub use object::{Header, HeaderFlags, Node, NodeKind, NodeRef};
pub use observer::{GcObserver, LogObserver};
pub use stack::{OperandStack, OperandStackInfo};
pub use visitor::{NoRoots, RootProvider, Visitable, Visitor};
pub use vm::*;
