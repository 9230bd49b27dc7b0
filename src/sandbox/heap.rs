//! Allocation registry for one sandbox context.
//!
//! Objects and scopes are reference counted, so closures that capture their
//! own scope form cycles `Rc` never frees. The heap keeps a weak handle to
//! everything the context allocates. When the live count passes the ceiling
//! [`Heap::collect`] looks for cycles nothing outside the registry can reach
//! and empties them; [`Heap::teardown`] empties everything at the end.

use super::scope::{Scope, ScopeRef};
use super::value::{Callable, Object, ObjectKind, ObjectRef, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

const MIN_SWEEP_THRESHOLD: usize = 4096;

enum Entry {
    Object(Weak<RefCell<Object>>),
    Scope(Weak<RefCell<Scope>>),
}

impl Entry {
    fn is_live(&self) -> bool {
        match self {
            Entry::Object(weak) => weak.strong_count() > 0,
            Entry::Scope(weak) => weak.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Node> {
        match self {
            Entry::Object(weak) => weak.upgrade().map(Node::Object),
            Entry::Scope(weak) => weak.upgrade().map(Node::Scope),
        }
    }
}

/// Strong handle to a registered allocation, held while collecting.
enum Node {
    Object(ObjectRef),
    Scope(ScopeRef),
}

impl Node {
    fn address(&self) -> usize {
        match self {
            Node::Object(object) => object_address(object),
            Node::Scope(scope) => scope_address(scope),
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Node::Object(object) => Rc::strong_count(object),
            Node::Scope(scope) => Rc::strong_count(scope),
        }
    }

    fn downgrade(&self) -> Entry {
        match self {
            Node::Object(object) => Entry::Object(Rc::downgrade(object)),
            Node::Scope(scope) => Entry::Scope(Rc::downgrade(scope)),
        }
    }

    /// Push the address of every object or scope this node holds a strong
    /// reference to; `false` when the node is borrowed and cannot be read.
    fn references(&self, out: &mut Vec<usize>) -> bool {
        match self {
            Node::Object(object) => match object.try_borrow() {
                Ok(object) => object_references(&object, out),
                Err(_) => return false,
            },
            Node::Scope(scope) => match scope.try_borrow() {
                Ok(scope) => scope_references(&scope, out),
                Err(_) => return false,
            },
        }
        true
    }

    fn clear(&self, released: &mut Vec<Value>) {
        match self {
            Node::Object(object) => {
                if let Ok(mut object) = object.try_borrow_mut() {
                    released.extend(object.clear());
                }
            }
            Node::Scope(scope) => {
                if let Ok(mut scope) = scope.try_borrow_mut() {
                    released.extend(scope.clear());
                    scope.parent = None;
                }
            }
        }
    }
}

fn object_address(object: &ObjectRef) -> usize {
    Rc::as_ptr(object) as *const () as usize
}

fn scope_address(scope: &ScopeRef) -> usize {
    Rc::as_ptr(scope) as *const () as usize
}

fn value_reference(value: &Value, out: &mut Vec<usize>) {
    if let Value::Object(object) = value {
        out.push(object_address(object));
    }
}

fn object_references(object: &Object, out: &mut Vec<usize>) {
    if let Some(prototype) = &object.prototype {
        out.push(object_address(prototype));
    }
    for value in object.properties.values() {
        value_reference(value, out);
    }
    match &object.kind {
        ObjectKind::Array(elements) => {
            for value in elements {
                value_reference(value, out);
            }
        }
        ObjectKind::Function(Callable::Bound { target, this, args }) => {
            out.push(object_address(target));
            value_reference(this, out);
            for value in args {
                value_reference(value, out);
            }
        }
        // A closure shared with native code in progress keeps what it captured.
        ObjectKind::Function(Callable::Closure(closure)) if Rc::strong_count(closure) == 1 => {
            out.push(scope_address(&closure.scope));
            if let Some(home) = &closure.home {
                out.push(object_address(home));
            }
        }
        ObjectKind::Function(Callable::Class(class)) if Rc::strong_count(class) == 1 => {
            out.push(scope_address(&class.scope));
            out.push(object_address(&class.prototype));
        }
        ObjectKind::Function(_) | ObjectKind::Ordinary | ObjectKind::Error => {}
    }
}

fn scope_references(scope: &Scope, out: &mut Vec<usize>) {
    for value in scope.values() {
        value_reference(value, out);
    }
    if let Some(parent) = &scope.parent {
        out.push(scope_address(parent));
    }
    if let Some(frame) = &scope.frame {
        if let Some(this) = &frame.this {
            value_reference(this, out);
        }
        for object in [&frame.home, &frame.callee, &frame.new_target].into_iter().flatten() {
            out.push(object_address(object));
        }
    }
}

/// Raised when the live allocation count passes the configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapExhausted;

pub(crate) struct Heap {
    entries: Vec<Entry>,
    sweep_at: usize,
    baseline: usize,
    limit: Option<usize>,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            sweep_at: MIN_SWEEP_THRESHOLD,
            baseline: 0,
            limit: None,
        }
    }

    /// Start enforcing `limit` live allocations on top of what exists now.
    pub(crate) fn set_limit(&mut self, limit: usize) {
        self.sweep();
        self.baseline = self.entries.len();
        self.limit = Some(limit);
    }

    pub(crate) fn alloc(&mut self, object: Object) -> Result<ObjectRef, HeapExhausted> {
        self.reserve()?;
        let object = Rc::new(RefCell::new(object));
        self.entries.push(Entry::Object(Rc::downgrade(&object)));
        Ok(object)
    }

    pub(crate) fn alloc_scope(&mut self, scope: Scope) -> Result<ScopeRef, HeapExhausted> {
        self.reserve()?;
        let scope = Rc::new(RefCell::new(scope));
        self.entries.push(Entry::Scope(Rc::downgrade(&scope)));
        Ok(scope)
    }

    fn reserve(&mut self) -> Result<(), HeapExhausted> {
        if self.entries.len() < self.sweep_at {
            return Ok(());
        }
        self.sweep();
        if self.over_limit() {
            self.collect();
        }
        self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP_THRESHOLD);
        if self.over_limit() {
            Err(HeapExhausted)
        } else {
            Ok(())
        }
    }

    fn over_limit(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.entries.len().saturating_sub(self.baseline) > limit)
    }

    fn sweep(&mut self) {
        self.entries.retain(Entry::is_live);
    }

    /// Empty every allocation only reachable from other allocations.
    ///
    /// Each strong reference held inside the registry is subtracted from its
    /// target's count. What remains comes from outside: the interpreter's
    /// own handles and native code in progress. Those allocations root a
    /// mark phase, and everything left unmarked is an unreachable cycle.
    fn collect(&mut self) {
        let nodes: Vec<Node> = self.entries.iter().filter_map(Entry::upgrade).collect();
        let slots: HashMap<usize, usize> = nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.address(), slot))
            .collect();
        // Our own handle accounts for one strong count.
        let mut outside: Vec<usize> = nodes.iter().map(|node| node.strong_count() - 1).collect();

        let mut targets = Vec::new();
        let mut spans = Vec::with_capacity(nodes.len());
        let mut pending = Vec::new();
        let mut scratch = Vec::new();
        for (slot, node) in nodes.iter().enumerate() {
            let first = targets.len();
            scratch.clear();
            if node.references(&mut scratch) {
                for address in &scratch {
                    if let Some(&target) = slots.get(address) {
                        outside[target] = outside[target].saturating_sub(1);
                        targets.push(target);
                    }
                }
            } else {
                pending.push(slot);
            }
            spans.push(first..targets.len());
        }

        pending.extend((0..nodes.len()).filter(|&slot| outside[slot] > 0));
        let mut reachable = vec![false; nodes.len()];
        while let Some(slot) = pending.pop() {
            if !reachable[slot] {
                reachable[slot] = true;
                pending.extend_from_slice(&targets[spans[slot].clone()]);
            }
        }

        let mut released = Vec::new();
        for (node, reachable) in nodes.iter().zip(&reachable) {
            if !reachable {
                node.clear(&mut released);
            }
        }
        drop(released);
        self.entries = nodes
            .iter()
            .zip(&reachable)
            .filter(|(_, reachable)| **reachable)
            .map(|(node, _)| node.downgrade())
            .collect();
    }

    /// Empty every live object and scope.
    ///
    /// Strong handles to everything are taken first so clearing one object
    /// never frees another mid-walk; dropping the emptied shells afterwards
    /// is shallow, whatever the shape of the object graph.
    pub(crate) fn teardown(&mut self) {
        let mut objects = Vec::new();
        let mut scopes = Vec::new();
        for entry in self.entries.drain(..) {
            match entry {
                Entry::Object(weak) => objects.extend(weak.upgrade()),
                Entry::Scope(weak) => scopes.extend(weak.upgrade()),
            }
        }
        let mut released: Vec<Value> = Vec::new();
        for object in &objects {
            if let Ok(mut object) = object.try_borrow_mut() {
                released.extend(object.clear());
            }
        }
        for scope in &scopes {
            if let Ok(mut scope) = scope.try_borrow_mut() {
                released.extend(scope.clear());
                scope.parent = None;
            }
        }
        drop(released);
        drop(scopes);
        drop(objects);
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_breaks_cycles() {
        let mut heap = Heap::new();
        let a = heap.alloc(Object::new(ObjectKind::Ordinary, None)).unwrap();
        let b = heap.alloc(Object::new(ObjectKind::Ordinary, Some(a.clone()))).unwrap();
        a.borrow_mut().prototype = Some(b.clone());
        let weak = Rc::downgrade(&a);
        drop((a, b));
        assert!(weak.upgrade().is_some(), "cycle keeps both alive");

        heap.teardown();
        assert!(weak.upgrade().is_none());
    }

    fn linked_pair(heap: &mut Heap) -> (ObjectRef, ObjectRef) {
        let a = heap.alloc(Object::new(ObjectKind::Ordinary, None)).unwrap();
        let b = heap.alloc(Object::new(ObjectKind::Ordinary, Some(a.clone()))).unwrap();
        a.borrow_mut().set_own("next", Value::Object(b.clone())).unwrap();
        (a, b)
    }

    #[test]
    fn collect_empties_only_unreachable_cycles() {
        let mut heap = Heap::new();
        let garbage = {
            let (a, _) = linked_pair(&mut heap);
            Rc::downgrade(&a)
        };
        let (held, _) = linked_pair(&mut heap);

        let scope = heap.alloc_scope(Scope::new(None, None)).unwrap();
        let (bound, _) = linked_pair(&mut heap);
        scope.borrow_mut().declare("pair", Value::Object(bound), true);
        let bound = match scope.borrow().values().next() {
            Some(Value::Object(object)) => Rc::downgrade(object),
            _ => unreachable!(),
        };

        heap.collect();
        assert!(garbage.upgrade().is_none());
        assert!(held.borrow().get_own("next").is_some());
        let bound = bound.upgrade().expect("reachable through a held scope");
        assert!(bound.borrow().get_own("next").is_some());
        assert_eq!(heap.entries.len(), 5);
    }

    #[test]
    fn ceiling_triggers_collection_before_failing() {
        let mut heap = Heap::new();
        heap.set_limit(MIN_SWEEP_THRESHOLD);
        for _ in 0..MIN_SWEEP_THRESHOLD * 8 {
            linked_pair(&mut heap);
        }
        assert!(heap.entries.len() <= MIN_SWEEP_THRESHOLD * 4);
    }

    #[test]
    fn limit_counts_only_new_live_allocations() {
        let mut heap = Heap::new();
        let _builtin = heap.alloc(Object::new(ObjectKind::Ordinary, None)).unwrap();
        heap.set_limit(MIN_SWEEP_THRESHOLD);

        // Garbage is swept and never counts.
        for _ in 0..MIN_SWEEP_THRESHOLD * 4 {
            heap.alloc(Object::new(ObjectKind::Ordinary, None)).unwrap();
        }

        let mut kept = Vec::new();
        let exhausted = (0..MIN_SWEEP_THRESHOLD * 4).any(|_| {
            match heap.alloc(Object::new(ObjectKind::Ordinary, None)) {
                Ok(object) => {
                    kept.push(object);
                    false
                }
                Err(HeapExhausted) => true,
            }
        });
        assert!(exhausted);
        assert!(kept.len() >= MIN_SWEEP_THRESHOLD);
    }
}
