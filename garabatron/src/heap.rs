//! Mark-and-sweep heap.
//!
//! Nodes live in an arena of slots addressed by [`NodeRef`] handles. Every
//! registered node is also threaded into an intrusive singly linked
//! registry, newest first, which the sweeper walks.
//!
//! The heap does not know about the VM. Consumers provide:
//! - A [`RootProvider`] to supply live roots at collection time.
//! - Optionally a [`GcObserver`] to hear about collection events.

use std::fmt;

use crate::{GcObserver, Node, NodeKind, NodeRef, RootProvider, Visitable, Visitor};

// ── Settings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// Live object count at which the first collection triggers.
    pub initial_threshold: usize,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            initial_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageCollectionStats {
    pub collections: usize,
    pub total_allocated: usize,
    pub total_reclaimed: usize,
    pub last_reclaimed: usize,
}

// ── Heap ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<NodeRef>,
    live: usize,
    threshold: usize,
    stats: GarbageCollectionStats,
    // reused by every mark phase, empty at rest
    worklist: Vec<NodeRef>,
    observer: Option<Box<dyn GcObserver>>,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("live", &self.live)
            .field("threshold", &self.threshold)
            .field("head", &self.head)
            .field("slots", &self.slots.len())
            .field("stats", &self.stats)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl Heap {
    pub fn new(settings: HeapSettings) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            live: 0,
            threshold: settings.initial_threshold,
            stats: GarbageCollectionStats::default(),
            worklist: Vec::new(),
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn GcObserver>) {
        self.observer = Some(observer);
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn GcObserver>> {
        self.observer.take()
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[inline]
    pub fn stats(&self) -> GarbageCollectionStats {
        self.stats
    }

    /// Resolves a handle, `None` once its node has been reclaimed.
    pub fn get(&self, node: NodeRef) -> Option<&Node> {
        let slot = self.slots.get(node.index())?;
        if slot.generation != node.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    #[inline]
    pub fn contains(&self, node: NodeRef) -> bool {
        self.get(node).is_some()
    }

    fn get_mut(&mut self, node: NodeRef) -> Option<&mut Node> {
        let slot = self.slots.get_mut(node.index())?;
        if slot.generation != node.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    fn registered_mut(&mut self, node: NodeRef) -> &mut Node {
        match self.get_mut(node) {
            Some(node) => node,
            None => panic!("registry links to unregistered node {node:?}"),
        }
    }

    /// Walks the registry, newest allocation first.
    pub fn iter(&self) -> RegistryIter<'_> {
        RegistryIter {
            heap: self,
            cursor: self.head,
        }
    }

    // ── Allocation ────────────────────────────────────────────────────

    /// Registers a new node.
    ///
    /// Collects first if the live count sits exactly at the threshold. The
    /// new node is not rooted: the caller has to make it reachable before
    /// the next allocation.
    pub fn allocate(&mut self, kind: NodeKind, roots: &dyn RootProvider) -> NodeRef {
        if self.live == self.threshold {
            self.collect(roots);
        }

        if let NodeKind::Pair { left, right } = kind {
            debug_assert!(self.contains(left), "pair child {left:?} is not registered");
            debug_assert!(
                self.contains(right),
                "pair child {right:?} is not registered"
            );
        }

        let node = Node::new(kind, self.head);
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeRef::new(index, slot.generation)
            }
            None => {
                let Ok(index) = u32::try_from(self.slots.len()) else {
                    panic!("heap out of handles");
                };
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeRef::new(index, 0)
            }
        };

        self.head = Some(handle);
        self.live += 1;
        self.stats.total_allocated += 1;
        log::trace!("allocated {handle:?} ({kind:?}), {} live", self.live);
        handle
    }

    // ── Collection ────────────────────────────────────────────────────

    /// Runs a full mark and sweep, then sets the next threshold to twice
    /// the surviving live count. Returns how many nodes were reclaimed.
    pub fn collect(&mut self, roots: &dyn RootProvider) -> usize {
        let live_before = self.live;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_collection_start(live_before);
        }

        self.mark_all(roots);
        let reclaimed = self.sweep();

        // zero live objects yields a zero threshold, which retriggers on the
        // next allocation
        self.threshold = self.live * 2;

        self.stats.collections += 1;
        self.stats.total_reclaimed += reclaimed;
        self.stats.last_reclaimed = reclaimed;

        log::trace!(
            "gc #{}: {live_before} -> {} live, next threshold {}",
            self.stats.collections,
            self.live,
            self.threshold
        );

        if let Some(observer) = self.observer.as_mut() {
            observer.on_collection_end(reclaimed, self.live);
        }
        reclaimed
    }

    // ── Marking ───────────────────────────────────────────────────────

    /// Marks everything reachable from `roots`, returns the number of nodes
    /// newly marked.
    ///
    /// Uses an explicit worklist so deep chains cannot blow the call stack.
    /// The mark bit doubles as the visited set.
    pub fn mark_all(&mut self, roots: &dyn RootProvider) -> usize {
        let mut worklist = std::mem::take(&mut self.worklist);
        debug_assert!(worklist.is_empty());

        roots.visit_roots(&mut |root| worklist.push(root));
        // roots are popped off the end, keep them in stack order
        worklist.reverse();

        let mut marked = 0;
        while let Some(handle) = worklist.pop() {
            let Some(node) = self.get_mut(handle) else {
                panic!("dangling handle {handle:?} reached while marking");
            };
            if node.is_marked() {
                continue;
            }
            node.header.mark();
            marked += 1;

            let start = worklist.len();
            node.visit_edges(&mut Pending(&mut worklist));
            // left child is popped first
            worklist[start..].reverse();
        }

        self.worklist = worklist;
        marked
    }

    // ── Sweeping ──────────────────────────────────────────────────────

    /// Reclaims every unmarked node and clears the mark on survivors.
    pub fn sweep(&mut self) -> usize {
        let mut prev: Option<NodeRef> = None;
        let mut cursor = self.head;
        let mut reclaimed = 0;

        while let Some(current) = cursor {
            let node = self.registered_mut(current);
            let next = node.next;

            if node.is_marked() {
                node.header.unmark();
                prev = Some(current);
            } else {
                match prev {
                    Some(prev) => self.registered_mut(prev).next = next,
                    None => self.head = next,
                }
                self.release(current);
                self.live -= 1;
                reclaimed += 1;

                log::trace!("reclaimed {current:?}");
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_node_reclaimed(reclaimed);
                }
            }

            cursor = next;
        }

        reclaimed
    }

    fn release(&mut self, node: NodeRef) {
        let slot = &mut self.slots[node.index()];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node.index() as u32);
    }
}

struct Pending<'a>(&'a mut Vec<NodeRef>);

impl Visitor for Pending<'_> {
    #[inline]
    fn visit(&mut self, node: NodeRef) {
        self.0.push(node);
    }
}

pub struct RegistryIter<'a> {
    heap: &'a Heap,
    cursor: Option<NodeRef>,
}

impl<'a> Iterator for RegistryIter<'a> {
    type Item = (NodeRef, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.heap.get(handle)?;
        self.cursor = node.next;
        Some((handle, node))
    }
}
