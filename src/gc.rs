//! Mark-compact collector.
//!
//! Collection happens inside an allocation that found no room; nothing else
//! triggers it. The cycle has four phases over the arena:
//!
//! 1. mark every cell reachable from the roots (context root slots, the
//!    value stack window, and every registered GC reference);
//! 2. compute forwarding offsets with a linear scan, sliding live cells
//!    toward the arena base;
//! 3. rewrite every root, stack slot, pinned slot and live payload word to
//!    the forwarded offsets;
//! 4. move the cells and clear their marks.
//!
//! After a cycle, any heap reference that was not reachable from a root is
//! stale: it designates either freed space or a different cell. That is the
//! contract the pinning protocol in `gc_ref` exists to manage.

use crate::gc_ref::GcRefState;
use crate::heap::Heap;
use crate::value::{from_heap_offset, heap_offset, JsValue};

pub(crate) struct GcRoots<'a> {
    pub root_slots: &'a mut [JsValue],
    pub gc_refs: &'a GcRefState,
}

fn mark_value(heap: &mut Heap, worklist: &mut Vec<usize>, v: JsValue) {
    if let Some(off) = heap_offset(v) {
        if !heap.is_marked(off) {
            heap.set_mark(off);
            worklist.push(off);
        }
    }
}

fn relocated(fwd: &[(usize, usize)], v: JsValue) -> JsValue {
    match heap_offset(v) {
        Some(old) => match fwd.binary_search_by_key(&old, |entry| entry.0) {
            Ok(idx) => from_heap_offset(fwd[idx].1),
            // A root can only reference a marked cell; keep the value
            // untouched rather than corrupt it if the invariant breaks.
            Err(_) => {
                debug_assert!(false, "live reference to unmarked cell");
                v
            }
        },
        None => v,
    }
}

pub(crate) fn collect(heap: &mut Heap, roots: GcRoots<'_>) {
    let mut worklist: Vec<usize> = Vec::new();

    for &v in roots.root_slots.iter() {
        mark_value(heap, &mut worklist, v);
    }
    for i in 0..heap.stack_len() {
        let v = heap.sget(i);
        mark_value(heap, &mut worklist, v);
    }
    roots.gc_refs.for_each(|r| {
        mark_value(heap, &mut worklist, r.val());
    });

    while let Some(off) = worklist.pop() {
        if heap.tag_at(off).has_refs() {
            let size = heap.block_size(off);
            for i in 1..size {
                let v = heap.value(off + i);
                mark_value(heap, &mut worklist, v);
            }
        }
    }

    // Forwarding table: live cells slide toward the base in address order.
    let mut fwd: Vec<(usize, usize)> = Vec::new();
    let mut new_free = 0usize;
    let mut off = 0usize;
    while off < heap.heap_free() {
        let size = heap.block_size(off);
        if heap.is_marked(off) {
            fwd.push((off, new_free));
            new_free += size;
        }
        off += size;
    }

    for slot in roots.root_slots.iter_mut() {
        *slot = relocated(&fwd, *slot);
    }
    for i in 0..heap.stack_len() {
        let v = relocated(&fwd, heap.sget(i));
        heap.sset(i, v);
    }
    roots.gc_refs.for_each(|r| {
        r.set_val(relocated(&fwd, r.val()));
    });
    for &(old, _) in &fwd {
        if heap.tag_at(old).has_refs() {
            let size = heap.block_size(old);
            for i in 1..size {
                let v = relocated(&fwd, heap.value(old + i));
                heap.set_value(old + i, v);
            }
        }
    }

    for &(old, new) in &fwd {
        let size = heap.block_size(old);
        heap.move_block(old, new, size);
        heap.clear_mark(new);
    }
    heap.set_heap_free(new_free);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{BlockTag, ARR_COUNT, ARR_DATA, WORD_BYTES};
    use crate::value::{from_heap_offset, new_short_int, JS_NULL};

    fn alloc_string(heap: &mut Heap, text: &[u8]) -> JsValue {
        let size = 1 + text.len().div_ceil(WORD_BYTES);
        let off = heap
            .alloc_raw(BlockTag::String, text.len(), size, false)
            .expect("string alloc");
        heap.str_bytes_write(off, 0, text);
        from_heap_offset(off)
    }

    #[test]
    fn unreachable_cells_are_reclaimed() {
        let mut heap = Heap::new(4096);
        let _garbage = alloc_string(&mut heap, b"garbage");
        let keep = alloc_string(&mut heap, b"keep me");
        let mut roots = [keep];
        let refs = GcRefState::new();
        collect(
            &mut heap,
            GcRoots {
                root_slots: &mut roots,
                gc_refs: &refs,
            },
        );
        // The survivor slid to the arena base and kept its content.
        let off = heap_offset(roots[0]).expect("heap ref");
        assert_eq!(off, 0);
        assert_eq!(heap.str_bytes(off), b"keep me");
        assert_eq!(heap.heap_free(), heap.block_size(off));
    }

    #[test]
    fn payload_references_are_rewritten() {
        let mut heap = Heap::new(4096);
        let _hole = alloc_string(&mut heap, b"to be freed");
        let s = alloc_string(&mut heap, b"element");
        let data_off = heap
            .alloc_raw(BlockTag::ValueArray, 2, 3, false)
            .expect("value array");
        heap.set_value(data_off + 1, s);
        heap.set_value(data_off + 2, new_short_int(3));
        let arr_off = heap.alloc_raw(BlockTag::Array, 0, 3, false).expect("array");
        heap.set_value(arr_off + ARR_COUNT, new_short_int(2));
        heap.set_value(arr_off + ARR_DATA, from_heap_offset(data_off));

        let mut roots = [from_heap_offset(arr_off)];
        let refs = GcRefState::new();
        collect(
            &mut heap,
            GcRoots {
                root_slots: &mut roots,
                gc_refs: &refs,
            },
        );

        let arr = heap_offset(roots[0]).expect("array ref");
        assert_eq!(heap.tag_at(arr), BlockTag::Array);
        assert_eq!(heap.value(arr + ARR_COUNT), new_short_int(2));
        let data = heap_offset(heap.value(arr + ARR_DATA)).expect("data ref");
        assert_eq!(heap.tag_at(data), BlockTag::ValueArray);
        let elem = heap_offset(heap.value(data + 1)).expect("element ref");
        assert_eq!(heap.str_bytes(elem), b"element");
        assert_eq!(heap.value(data + 2), new_short_int(3));
    }

    #[test]
    fn pinned_slots_are_rewritten_in_place() {
        let mut heap = Heap::new(4096);
        let _hole = alloc_string(&mut heap, b"xxxxxxxxxxxxxxxx");
        let pinned = alloc_string(&mut heap, b"pinned");
        let mut refs = GcRefState::new();
        let slot = refs.push(pinned);
        let before = heap_offset(slot.val()).expect("ref");

        let mut roots: [JsValue; 0] = [];
        collect(
            &mut heap,
            GcRoots {
                root_slots: &mut roots,
                gc_refs: &refs,
            },
        );

        let after = heap_offset(slot.val()).expect("ref");
        assert_ne!(before, after, "compaction should move the pinned cell");
        assert_eq!(heap.str_bytes(after), b"pinned");
        refs.pop(slot);
    }

    #[test]
    fn stack_window_is_scanned_and_rewritten() {
        let mut heap = Heap::new(4096);
        let _hole = alloc_string(&mut heap, b"hole");
        let s = alloc_string(&mut heap, b"on the stack");
        let slot = heap.spush(s).expect("push");
        heap.spush(JS_NULL).expect("push");

        let mut roots: [JsValue; 0] = [];
        let refs = GcRefState::new();
        collect(
            &mut heap,
            GcRoots {
                root_slots: &mut roots,
                gc_refs: &refs,
            },
        );

        let off = heap_offset(heap.sget(slot)).expect("ref");
        assert_eq!(off, 0);
        assert_eq!(heap.str_bytes(off), b"on the stack");
        assert_eq!(heap.sget(slot + 1), JS_NULL);
    }
}
