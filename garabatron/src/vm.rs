use crate::{
    Allocator, GarbageCollectionStats, GcObserver, Heap, HeapSettings, NoRoots, Node, NodeKind,
    NodeRef, OperandStack, OperandStackInfo, VMError,
};

#[derive(Debug, Clone, Default)]
pub struct VMCreateInfo {
    pub heap: HeapSettings,
    pub stack: OperandStackInfo,
}

impl VMCreateInfo {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.stack.stack_size == 0 {
            return Err("stack_size must be > 0");
        }
        Ok(())
    }
}

/// A stack machine whose values are garbage collected graph nodes.
///
/// The operand stack is the whole root set. Dropping the VM clears it and
/// collects once, so every node is reclaimed before the heap goes away.
///
/// Stack contract violations are fatal: `push`, `pop`, `push_scalar` and
/// `make_pair` abort the process. The `try_` variants report the same
/// conditions as [`VMError`] and leave the VM untouched.
#[derive(Debug)]
pub struct VM {
    heap: Heap,
    stack: OperandStack,
}

impl VM {
    pub fn new(info: VMCreateInfo) -> Self {
        if let Err(reason) = info.validate() {
            panic!("invalid VM configuration: {reason}");
        }

        Self {
            heap: Heap::new(info.heap),
            stack: OperandStack::new(&info.stack),
        }
    }

    pub fn with_observer(mut self, observer: impl GcObserver + 'static) -> Self {
        self.heap.set_observer(Box::new(observer));
        self
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    #[inline]
    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    #[inline]
    pub fn threshold(&self) -> usize {
        self.heap.threshold()
    }

    #[inline]
    pub fn stats(&self) -> GarbageCollectionStats {
        self.heap.stats()
    }

    #[inline]
    pub fn get(&self, node: NodeRef) -> Option<&Node> {
        self.heap.get(node)
    }

    /// Pushes an already registered node.
    pub fn try_push(&mut self, node: NodeRef) -> Result<(), VMError> {
        assert!(
            self.heap.contains(node),
            "pushing unregistered node {node:?}"
        );
        self.stack.try_push(node)
    }

    /// Pops the top root. The node stays allocated until the next collection
    /// finds it unreachable.
    pub fn try_pop(&mut self) -> Result<NodeRef, VMError> {
        self.stack.try_pop()
    }

    /// `( -- n )`
    pub fn try_push_scalar(&mut self, value: i64) -> Result<NodeRef, VMError> {
        self.stack.ensure_space(1)?;
        let node = self.allocate_scalar(value);
        self.try_push(node)?;
        Ok(node)
    }

    /// `( left right -- pair )`
    ///
    /// The pair is allocated while both children are still on the stack, so
    /// a collection triggered by this allocation keeps them.
    pub fn try_make_pair(&mut self) -> Result<NodeRef, VMError> {
        self.stack.ensure_depth(2)?;
        let (Some(right), Some(left)) = (self.stack.peek_nth(0), self.stack.peek_nth(1)) else {
            unreachable!("depth checked above");
        };

        let pair = self.allocate_pair(left, right);
        self.stack.try_pop()?;
        self.stack.try_pop()?;
        self.try_push(pair)?;
        Ok(pair)
    }

    pub fn push(&mut self, node: NodeRef) {
        if let Err(err) = self.try_push(node) {
            fatal(err);
        }
    }

    pub fn pop(&mut self) -> NodeRef {
        match self.try_pop() {
            Ok(node) => node,
            Err(err) => fatal(err),
        }
    }

    pub fn push_scalar(&mut self, value: i64) -> NodeRef {
        match self.try_push_scalar(value) {
            Ok(node) => node,
            Err(err) => fatal(err),
        }
    }

    pub fn make_pair(&mut self) -> NodeRef {
        match self.try_make_pair() {
            Ok(pair) => pair,
            Err(err) => fatal(err),
        }
    }

    /// Forces a full collection, returns the number of reclaimed nodes.
    pub fn collect(&mut self) -> usize {
        self.heap.collect(&self.stack)
    }
}

impl Allocator for VM {
    fn allocate(&mut self, kind: NodeKind) -> NodeRef {
        self.heap.allocate(kind, &self.stack)
    }
}

impl Drop for VM {
    fn drop(&mut self) {
        self.stack.clear();
        let reclaimed = self.heap.collect(&NoRoots);
        debug_assert_eq!(self.heap.live_objects(), 0);
        log::debug!(
            "vm torn down, {reclaimed} objects reclaimed, {} collections total",
            self.heap.stats().collections
        );
    }
}

/// Ends the process without unwinding, so no destructor or collection runs
/// after a contract violation.
#[cold]
fn fatal(err: VMError) -> ! {
    log::error!("fatal: {err}");
    eprintln!("fatal: {err}");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::HashSet,
        rc::Rc,
    };

    use super::*;

    fn create_test_vm(threshold: usize) -> VM {
        VM::new(VMCreateInfo {
            heap: HeapSettings {
                initial_threshold: threshold,
            },
            stack: OperandStackInfo { stack_size: 256 },
        })
    }

    fn render(vm: &VM, node: NodeRef) -> String {
        match vm.get(node).map(|node| node.kind) {
            Some(NodeKind::Scalar { value }) => value.to_string(),
            Some(NodeKind::Pair { left, right }) => {
                format!("({} {})", render(vm, left), render(vm, right))
            }
            None => panic!("{node:?} was reclaimed"),
        }
    }

    fn reachable(vm: &VM) -> HashSet<NodeRef> {
        let mut seen = HashSet::new();
        let mut pending: Vec<_> = vm.stack().as_slice().to_vec();
        while let Some(node) = pending.pop() {
            if !seen.insert(node) {
                continue;
            }
            if let Some((left, right)) = vm.get(node).and_then(Node::as_pair) {
                pending.push(left);
                pending.push(right);
            }
        }
        seen
    }

    #[derive(Default, Clone)]
    struct Counts(Rc<RefCell<(usize, usize, usize)>>);

    impl GcObserver for Counts {
        fn on_collection_start(&mut self, _live_before: usize) {
            self.0.borrow_mut().0 += 1;
        }
        fn on_node_reclaimed(&mut self, _sequence: usize) {
            self.0.borrow_mut().1 += 1;
        }
        fn on_collection_end(&mut self, _reclaimed: usize, _live_after: usize) {
            self.0.borrow_mut().2 += 1;
        }
    }

    #[test]
    fn pair_of_two_scalars() {
        let mut vm = create_test_vm(100);
        vm.push_scalar(1);
        vm.push_scalar(2);
        let pair = vm.make_pair();

        assert_eq!(vm.live_objects(), 3);
        assert_eq!(vm.stack().depth(), 1);
        assert_eq!(vm.stack().peek_nth(0), Some(pair));
        assert_eq!(render(&vm, pair), "(1 2)");
    }

    #[test]
    fn nested_pairs_all_survive_collect() {
        let mut vm = create_test_vm(100);
        vm.push_scalar(1);
        vm.push_scalar(2);
        vm.make_pair();
        vm.push_scalar(3);
        vm.push_scalar(4);
        vm.make_pair();
        let outer = vm.make_pair();

        assert_eq!(vm.live_objects(), 7);
        assert_eq!(vm.stack().depth(), 1);

        assert_eq!(vm.collect(), 0);
        assert_eq!(vm.live_objects(), 7);
        assert_eq!(vm.threshold(), 14);
        assert_eq!(render(&vm, outer), "((1 2) (3 4))");
    }

    #[test]
    fn threshold_one_collects_between_pushes() {
        let mut vm = create_test_vm(1);
        vm.push_scalar(1);
        assert_eq!(vm.stats().collections, 0);
        vm.push_scalar(2);

        assert_eq!(vm.stats().collections, 1);
        assert_eq!(vm.stats().total_reclaimed, 0);
        assert_eq!(vm.live_objects(), 2);
        assert_eq!(vm.threshold(), 2);
    }

    #[test]
    fn popped_scalar_reclaimed_on_collect() {
        let mut vm = create_test_vm(100);
        let node = vm.push_scalar(1);
        assert_eq!(vm.pop(), node);
        assert_eq!(vm.live_objects(), 1);

        assert_eq!(vm.collect(), 1);
        assert_eq!(vm.live_objects(), 0);
        assert!(vm.get(node).is_none());
    }

    #[test]
    fn make_pair_trigger_keeps_children() {
        // live == threshold exactly when the pair is allocated
        let mut vm = create_test_vm(2);
        vm.push_scalar(1);
        vm.push_scalar(2);
        let pair = vm.make_pair();

        assert_eq!(vm.stats().collections, 1);
        assert_eq!(vm.live_objects(), 3);
        assert_eq!(render(&vm, pair), "(1 2)");
    }

    #[test]
    fn shared_child_pushed_twice() {
        let mut vm = create_test_vm(100);
        let shared = vm.push_scalar(9);
        vm.push(shared);
        vm.make_pair();
        vm.push(shared);
        let top = vm.make_pair();

        assert_eq!(vm.live_objects(), 3);
        assert_eq!(vm.collect(), 0);
        assert_eq!(vm.live_objects(), 3);
        assert_eq!(render(&vm, top), "((9 9) 9)");
    }

    #[test]
    fn drop_reclaims_everything() {
        let counts = Counts::default();
        let seen = counts.0.clone();
        {
            let mut vm = create_test_vm(100).with_observer(counts);
            vm.push_scalar(1);
            vm.push_scalar(2);
            vm.make_pair();
            vm.push_scalar(3);
        }
        assert_eq!(*seen.borrow(), (1, 4, 1));
    }

    #[test]
    fn overflow_reported_before_allocating() {
        let mut vm = VM::new(VMCreateInfo {
            heap: HeapSettings::default(),
            stack: OperandStackInfo { stack_size: 2 },
        });
        let first = vm.push_scalar(1);
        let second = vm.push_scalar(2);

        assert_eq!(
            vm.try_push_scalar(3),
            Err(VMError::StackOverflow { capacity: 2 })
        );
        assert_eq!(
            vm.try_push(first),
            Err(VMError::StackOverflow { capacity: 2 })
        );
        assert_eq!(vm.live_objects(), 2);
        assert_eq!(vm.stats().total_allocated, 2);
        assert_eq!(vm.stack().as_slice(), &[first, second]);
    }

    #[test]
    fn pop_empty_reports_underflow() {
        let mut vm = create_test_vm(100);
        assert_eq!(
            vm.try_pop(),
            Err(VMError::StackUnderflow {
                required: 1,
                depth: 0
            })
        );

        let only = vm.push_scalar(1);
        assert_eq!(vm.try_pop(), Ok(only));
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn failed_make_pair_leaves_state_alone() {
        // threshold 1 would collect on the next allocation
        let mut vm = create_test_vm(1);
        let only = vm.push_scalar(1);

        assert_eq!(
            vm.try_make_pair(),
            Err(VMError::StackUnderflow {
                required: 2,
                depth: 1
            })
        );
        assert_eq!(vm.stats().collections, 0);
        assert_eq!(vm.stats().total_allocated, 1);
        assert_eq!(vm.live_objects(), 1);
        assert_eq!(vm.stack().as_slice(), &[only]);
    }

    #[test]
    fn try_make_pair_matches_make_pair() {
        let mut vm = create_test_vm(100);
        vm.try_push_scalar(5).unwrap();
        vm.try_push_scalar(6).unwrap();
        let pair = vm.try_make_pair().unwrap();

        assert_eq!(vm.stack().as_slice(), &[pair]);
        assert_eq!(render(&vm, pair), "(5 6)");
    }

    #[test]
    #[should_panic(expected = "stack_size must be > 0")]
    fn zero_stack_rejected() {
        VM::new(VMCreateInfo {
            heap: HeapSettings::default(),
            stack: OperandStackInfo { stack_size: 0 },
        });
    }

    #[test]
    fn random_programs_keep_heap_consistent() {
        let mut rng = fastrand::Rng::with_seed(0x6761_7262);

        for _ in 0..50 {
            let mut vm = create_test_vm(rng.usize(0..8));

            for _ in 0..400 {
                match rng.u8(0..10) {
                    0..=3 if !vm.stack().is_full() => {
                        vm.push_scalar(rng.i64(-100..100));
                    }
                    4..=6 if vm.stack().depth() >= 2 => {
                        vm.make_pair();
                    }
                    7 | 8 if !vm.stack().is_empty() => {
                        vm.pop();
                    }
                    _ => {
                        let before: Vec<_> = vm
                            .stack()
                            .as_slice()
                            .iter()
                            .map(|&root| render(&vm, root))
                            .collect();
                        let live = reachable(&vm);
                        let garbage = vm.live_objects() - live.len();

                        assert_eq!(vm.collect(), garbage);
                        assert_eq!(vm.live_objects(), live.len());
                        assert_eq!(vm.threshold(), 2 * vm.live_objects());
                        assert_eq!(vm.collect(), 0);

                        let after: Vec<_> = vm
                            .stack()
                            .as_slice()
                            .iter()
                            .map(|&root| render(&vm, root))
                            .collect();
                        assert_eq!(before, after);
                    }
                }

                assert_eq!(vm.heap().iter().count(), vm.live_objects());
                assert!(vm.heap().iter().all(|(_, node)| !node.is_marked()));
                assert!(
                    vm.stack()
                        .as_slice()
                        .iter()
                        .all(|&root| vm.heap().contains(root))
                );
            }
        }
    }
}
