use crate::{NodeKind, NodeRef};

pub trait Allocator: Sized {
    /// Registers a new node, possibly collecting first.
    ///
    /// The returned node is not rooted. It survives this call but not the
    /// next allocation unless the caller roots it or links it from a root.
    fn allocate(&mut self, kind: NodeKind) -> NodeRef;

    fn allocate_scalar(&mut self, value: i64) -> NodeRef {
        self.allocate(NodeKind::Scalar { value })
    }

    /// Both children must still be reachable from the roots, a collection
    /// may run before the pair exists.
    fn allocate_pair(&mut self, left: NodeRef, right: NodeRef) -> NodeRef {
        self.allocate(NodeKind::Pair { left, right })
    }
}
