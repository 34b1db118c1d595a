use crate::NodeRef;

/// Anything with outgoing edges into the heap.
///
/// Visiting an object only reports its direct edges; following them is the
/// caller's business.
pub trait Visitable {
    fn visit_edges(&self, visitor: &mut impl Visitor);
}

pub trait Visitor: Sized {
    fn visit(&mut self, node: NodeRef);
}

/// Consumers implement this to provide GC roots.
///
/// Called at the start of every collection. Every reported handle must refer
/// to a node that is still registered in the heap.
pub trait RootProvider {
    fn visit_roots(&self, visitor: &mut dyn FnMut(NodeRef));
}

/// A root provider with no roots, used when tearing down.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoRoots;

impl RootProvider for NoRoots {
    fn visit_roots(&self, _visitor: &mut dyn FnMut(NodeRef)) {}
}

impl RootProvider for [NodeRef] {
    fn visit_roots(&self, visitor: &mut dyn FnMut(NodeRef)) {
        self.iter().for_each(|&root| visitor(root));
    }
}

impl RootProvider for Vec<NodeRef> {
    fn visit_roots(&self, visitor: &mut dyn FnMut(NodeRef)) {
        self.as_slice().visit_roots(visitor);
    }
}
