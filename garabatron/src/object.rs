use std::fmt;

use crate::{Visitable, Visitor};

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct HeaderFlags: u8 {
        const MARK = 1 << 0;
    }
}

/// Handle to a node living in the [`Heap`](crate::Heap) arena.
///
/// The generation is bumped whenever a slot is reclaimed, so a handle that
/// outlived its node never resolves to whatever reuses the slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    index: u32,
    generation: u32,
}

impl NodeRef {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({}@{})", self.index, self.generation)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Scalar { value: i64 },
    Pair { left: NodeRef, right: NodeRef },
}

#[derive(Debug, Copy, Clone)]
pub struct Header(HeaderFlags);

impl Header {
    #[inline]
    pub fn new() -> Self {
        Self(HeaderFlags::empty())
    }

    #[inline]
    pub fn flags(self) -> HeaderFlags {
        self.0
    }

    #[inline]
    pub fn is_marked(self) -> bool {
        self.0.contains(HeaderFlags::MARK)
    }

    #[inline]
    pub fn mark(&mut self) -> &mut Self {
        self.0.insert(HeaderFlags::MARK);
        self
    }

    #[inline]
    pub fn unmark(&mut self) -> &mut Self {
        self.0.remove(HeaderFlags::MARK);
        self
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered heap node.
///
/// `next` threads the node into the allocation registry, newest first. It
/// says nothing about the object graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub header: Header,
    pub kind: NodeKind,
    pub(crate) next: Option<NodeRef>,
}

impl Node {
    #[inline]
    pub(crate) fn new(kind: NodeKind, next: Option<NodeRef>) -> Self {
        Self {
            header: Header::new(),
            kind,
            next,
        }
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.header.is_marked()
    }

    pub fn as_scalar(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Scalar { value } => Some(value),
            NodeKind::Pair { .. } => None,
        }
    }

    pub fn as_pair(&self) -> Option<(NodeRef, NodeRef)> {
        match self.kind {
            NodeKind::Pair { left, right } => Some((left, right)),
            NodeKind::Scalar { .. } => None,
        }
    }
}

// scalars are leaves, pairs hand out left before right
impl Visitable for Node {
    #[inline]
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let NodeKind::Pair { left, right } = self.kind {
            visitor.visit(left);
            visitor.visit(right);
        }
    }
}
