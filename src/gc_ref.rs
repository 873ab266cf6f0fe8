//! Pinned GC reference slots.
//!
//! A `GcRef` is a collector-visible record holding a current value and an
//! intrusive link. While a record is linked, the compactor rewrites its
//! value in place whenever the referenced cell moves, so reading the record
//! after any number of intervening allocations yields a live reference.
//!
//! Two registration disciplines exist, with separate lists:
//!
//! - stack discipline (`push`/`pop`): strict LIFO release, the cheap path;
//! - list discipline (`add`/`delete`): release in any order, at the cost of
//!   scanning the whole list every collection cycle.
//!
//! `intrusive-collections` models the links; records are heap-boxed so
//! their addresses are stable while linked.

use crate::value::{JsValue, JS_UNDEFINED};
use core::cell::Cell;
use intrusive_collections::{intrusive_adapter, LinkedList, LinkedListLink, UnsafeRef};

pub struct GcRef {
    stack_link: LinkedListLink,
    list_link: LinkedListLink,
    val: Cell<JsValue>,
}

impl GcRef {
    fn new(val: JsValue) -> Self {
        Self {
            stack_link: LinkedListLink::new(),
            list_link: LinkedListLink::new(),
            val: Cell::new(val),
        }
    }

    pub fn val(&self) -> JsValue {
        self.val.get()
    }

    pub fn set_val(&self, val: JsValue) {
        self.val.set(val);
    }
}

intrusive_adapter!(GcRefStackAdapter = UnsafeRef<GcRef>: GcRef { stack_link: LinkedListLink });
intrusive_adapter!(GcRefListAdapter = UnsafeRef<GcRef>: GcRef { list_link: LinkedListLink });

/// Handle to a stack-discipline pinned slot (`Context::push_ref`). Not
/// clonable: releasing it consumes the handle, so double release is
/// unrepresentable. Must not outlive its context.
pub struct StackRef(pub(crate) UnsafeRef<GcRef>);

impl StackRef {
    /// Current (collector-maintained) value of the slot.
    pub fn get(&self) -> JsValue {
        self.0.val()
    }

    pub fn set(&self, val: JsValue) {
        self.0.set_val(val);
    }
}

/// Handle to a list-discipline pinned slot (`Context::add_ref`); release
/// order is unconstrained. Must not outlive its context.
pub struct ListRef(pub(crate) UnsafeRef<GcRef>);

impl ListRef {
    /// Current (collector-maintained) value of the slot.
    pub fn get(&self) -> JsValue {
        self.0.val()
    }

    pub fn set(&self, val: JsValue) {
        self.0.set_val(val);
    }
}

/// The two pinned-slot lists scanned and rewritten by the collector.
pub struct GcRefState {
    stack: LinkedList<GcRefStackAdapter>,
    list: LinkedList<GcRefListAdapter>,
}

impl GcRefState {
    pub fn new() -> Self {
        Self {
            stack: LinkedList::new(GcRefStackAdapter::new()),
            list: LinkedList::new(GcRefListAdapter::new()),
        }
    }

    /// Register a stack-discipline slot holding `val`. The returned handle
    /// must be released with `pop` while it is the most recent live
    /// stack registration; releasing out of order is undefined (checked in
    /// debug builds).
    pub fn push(&mut self, val: JsValue) -> UnsafeRef<GcRef> {
        let node = UnsafeRef::from_box(Box::new(GcRef::new(val)));
        self.stack.push_front(node.clone());
        node
    }

    /// Release the most recent stack slot, returning its (relocated) value.
    pub fn pop(&mut self, reference: UnsafeRef<GcRef>) -> JsValue {
        let top = self.stack.front().get().map(|node| node as *const GcRef);
        debug_assert_eq!(top, Some(&*reference as *const GcRef));
        let popped = match self.stack.pop_front() {
            Some(node) => node,
            None => return JS_UNDEFINED,
        };
        let val = popped.val();
        drop(reference);
        // SAFETY: the node was created by `push` from a Box and is no
        // longer linked in any list.
        unsafe {
            drop(UnsafeRef::into_box(popped));
        }
        val
    }

    /// Register a list-discipline slot holding `val`; release order is
    /// unconstrained.
    pub fn add(&mut self, val: JsValue) -> UnsafeRef<GcRef> {
        let node = UnsafeRef::from_box(Box::new(GcRef::new(val)));
        self.list.push_front(node.clone());
        node
    }

    /// Release a list slot, returning its (relocated) value. Panics if the
    /// slot is not currently registered.
    pub fn delete(&mut self, reference: UnsafeRef<GcRef>) -> JsValue {
        let target = &*reference as *const GcRef;
        let mut cursor = self.list.front_mut();
        while let Some(node) = cursor.get() {
            if core::ptr::eq(node, target) {
                let removed = cursor.remove().expect("cursor points at a node");
                let val = removed.val();
                drop(reference);
                // SAFETY: the node was created by `add` from a Box and has
                // just been unlinked.
                unsafe {
                    drop(UnsafeRef::into_box(removed));
                }
                return val;
            }
            cursor.move_next();
        }
        panic!("GC ref not found in list");
    }

    /// Visit every registered slot, both disciplines.
    pub fn for_each(&self, mut f: impl FnMut(&GcRef)) {
        for node in self.stack.iter() {
            f(node);
        }
        for node in self.list.iter() {
            f(node);
        }
    }

    pub fn is_stack_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn is_list_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop every remaining registration. Called on context teardown;
    /// outstanding handles are invalidated with their context.
    pub fn clear(&mut self) {
        while let Some(node) = self.stack.pop_front() {
            // SAFETY: nodes in the stack list were created from Boxes by
            // `push` and are unlinked here.
            unsafe {
                drop(UnsafeRef::into_box(node));
            }
        }
        while let Some(node) = self.list.pop_front() {
            // SAFETY: nodes in the list were created from Boxes by `add`
            // and are unlinked here.
            unsafe {
                drop(UnsafeRef::into_box(node));
            }
        }
    }
}

impl Default for GcRefState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GcRefState {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JS_FALSE, JS_TRUE};

    #[test]
    fn push_pop_roundtrips_value() {
        let mut state = GcRefState::new();
        let slot = state.push(JS_FALSE);
        assert_eq!(slot.val(), JS_FALSE);
        slot.set_val(JS_TRUE);
        let val = state.pop(slot);
        assert_eq!(val, JS_TRUE);
        assert!(state.is_stack_empty());
    }

    #[test]
    fn stack_pops_nest() {
        let mut state = GcRefState::new();
        let a = state.push(JS_FALSE);
        let b = state.push(JS_TRUE);
        assert_eq!(state.pop(b), JS_TRUE);
        assert_eq!(state.pop(a), JS_FALSE);
        assert!(state.is_stack_empty());
    }

    #[test]
    fn list_deletes_in_any_order() {
        let mut state = GcRefState::new();
        let a = state.add(JS_FALSE);
        let b = state.add(JS_TRUE);
        let c = state.add(JS_FALSE);
        assert_eq!(state.delete(b), JS_TRUE);
        assert_eq!(state.delete(a), JS_FALSE);
        assert_eq!(state.delete(c), JS_FALSE);
        assert!(state.is_list_empty());
    }

    #[test]
    fn for_each_sees_both_lists() {
        let mut state = GcRefState::new();
        let a = state.push(JS_TRUE);
        let b = state.add(JS_FALSE);
        let mut count = 0;
        state.for_each(|_| count += 1);
        assert_eq!(count, 2);
        state.pop(a);
        state.delete(b);
    }
}
