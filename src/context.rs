//! Arena context lifecycle and cell-level operations.
//!
//! One `Context` owns one fixed memory block for the whole of a script run.
//! Everything script-visible lives in that block; dropping the context
//! invalidates every `JsValue` and pinned reference derived from it.
//!
//! Capacity precondition: `ContextConfig::memory_size` must exceed the
//! static footprint of the standard-library bootstrap. Below the hard
//! minimum, creation returns `ContextError::MemoryTooSmall`; above it but
//! still too small for the bootstrap, creation panics. There is no way to
//! probe the required size ahead of time; treat the panic as a programming
//! error in the embedding, not a runtime condition to catch.

use crate::exception::{ClassId, Raised};
use crate::gc::{collect, GcRoots};
use crate::gc_ref::{GcRefState, ListRef, StackRef};
use crate::heap::{
    BlockTag, Heap, ARR_COUNT, ARR_DATA, OBJ_COUNT, OBJ_PROPS, WORD_BYTES,
};
use crate::parser::FuncDef;
use crate::stdlib::{self, StdlibDef};
use crate::value::{
    from_heap_offset, get_int, heap_offset, is_bool, is_int, is_native_func, is_null,
    is_undefined, new_short_int, JsValue, JS_NULL, JS_UNDEFINED,
};
use core::any::Any;

pub const MIN_CONTEXT_BYTES: usize = 1024;

const ROOT_CURRENT_EXCEPTION: usize = 0;
const ROOT_GLOBAL_OBJ: usize = 1;

const INTERRUPT_INTERVAL: i32 = 4096;

/// Context creation parameters.
pub struct ContextConfig {
    /// Size of the arena in bytes; rounded down to whole words.
    pub memory_size: usize,
    /// Standard-library descriptor bootstrapped into the fresh context.
    pub stdlib: &'static StdlibDef,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContextError {
    MemoryTooSmall { min: usize, actual: usize },
    OutOfMemory,
}

impl core::fmt::Display for ContextError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ContextError::MemoryTooSmall { min, actual } => {
                write!(f, "context memory too small: {actual} bytes, minimum {min}")
            }
            ContextError::OutOfMemory => write!(f, "out of context memory"),
        }
    }
}

/// One interpreter backtrace entry; `line` is updated as statements run.
#[derive(Clone, Debug)]
pub(crate) struct BtFrame {
    pub func_name: String,
    pub line: u32,
}

pub struct Context {
    pub(crate) heap: Heap,
    roots: Vec<JsValue>,
    exception_pending: bool,
    gc_refs: GcRefState,
    pub(crate) stdlib: &'static StdlibDef,
    pub(crate) functions: Vec<std::rc::Rc<FuncDef>>,
    pub(crate) filename: String,
    pub(crate) backtrace: Vec<BtFrame>,
    pub(crate) repl_mode: bool,
    pub(crate) building_error: bool,
    interrupt_handler: Option<Box<dyn FnMut() -> bool>>,
    pub(crate) interrupt_counter: i32,
    log_func: Option<Box<dyn FnMut(&[u8])>>,
    user_data: Option<Box<dyn Any>>,
    random_state: u64,
    pub(crate) call_depth: u32,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("filename", &self.filename)
            .field("repl_mode", &self.repl_mode)
            .field("call_depth", &self.call_depth)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context over a fresh arena and bootstrap the standard
    /// library into it.
    ///
    /// # Panics
    /// Panics when `memory_size` is above the hard minimum but too small
    /// for the standard-library bootstrap (the documented capacity
    /// precondition).
    pub fn new(config: ContextConfig) -> Result<Self, ContextError> {
        let mem_size = config.memory_size & !(WORD_BYTES - 1);
        if mem_size < MIN_CONTEXT_BYTES {
            return Err(ContextError::MemoryTooSmall {
                min: MIN_CONTEXT_BYTES,
                actual: mem_size,
            });
        }
        let mut ctx = Self {
            heap: Heap::new(mem_size),
            roots: vec![JS_UNDEFINED, JS_NULL],
            exception_pending: false,
            gc_refs: GcRefState::new(),
            stdlib: config.stdlib,
            functions: Vec::new(),
            filename: String::from("<input>"),
            backtrace: Vec::new(),
            repl_mode: false,
            building_error: false,
            interrupt_handler: None,
            interrupt_counter: INTERRUPT_INTERVAL,
            log_func: None,
            user_data: None,
            random_state: 1,
            call_depth: 0,
        };
        stdlib::bootstrap(&mut ctx);
        Ok(ctx)
    }

    // ---- roots and collection ----

    pub fn global_obj(&self) -> JsValue {
        self.roots[ROOT_GLOBAL_OBJ]
    }

    pub(crate) fn set_global_obj(&mut self, v: JsValue) {
        self.roots[ROOT_GLOBAL_OBJ] = v;
    }

    /// Run a full collection cycle. Every unpinned heap reference held by
    /// the caller is stale afterwards.
    pub fn gc(&mut self) {
        collect(
            &mut self.heap,
            GcRoots {
                root_slots: &mut self.roots,
                gc_refs: &self.gc_refs,
            },
        );
    }

    // ---- allocation ----

    pub(crate) fn alloc(&mut self, tag: BlockTag, aux: usize, size: usize) -> Option<usize> {
        if let Some(off) = self.heap.alloc_raw(tag, aux, size, false) {
            return Some(off);
        }
        self.gc();
        self.heap.alloc_raw(tag, aux, size, false)
    }

    /// Allocation that may dip into the reserve; used for error objects so
    /// an out-of-memory condition can still be described.
    pub(crate) fn alloc_critical(&mut self, tag: BlockTag, aux: usize, size: usize) -> Option<usize> {
        if let Some(off) = self.heap.alloc_raw(tag, aux, size, true) {
            return Some(off);
        }
        self.gc();
        self.heap.alloc_raw(tag, aux, size, true)
    }

    pub(crate) fn new_string_value(&mut self, bytes: &[u8]) -> Option<JsValue> {
        let size = 1 + bytes.len().div_ceil(WORD_BYTES);
        let off = self.alloc(BlockTag::String, bytes.len(), size)?;
        self.heap.str_bytes_write(off, 0, bytes);
        Some(from_heap_offset(off))
    }

    pub(crate) fn new_float_value(&mut self, value: f64) -> Option<JsValue> {
        let off = self.alloc(BlockTag::Float64, 0, 2)?;
        self.heap.set_word(off + 1, value.to_bits());
        Some(from_heap_offset(off))
    }

    pub(crate) fn new_int64_value(&mut self, value: i64) -> Option<JsValue> {
        let off = self.alloc(BlockTag::Int64, 0, 2)?;
        self.heap.set_word(off + 1, value as u64);
        Some(from_heap_offset(off))
    }

    pub(crate) fn new_object_value(&mut self, class: ClassId) -> Option<JsValue> {
        self.new_object_value_with(class, false)
    }

    pub(crate) fn new_object_value_with(&mut self, class: ClassId, critical: bool) -> Option<JsValue> {
        let off = if critical {
            self.alloc_critical(BlockTag::Object, class as usize, 3)?
        } else {
            self.alloc(BlockTag::Object, class as usize, 3)?
        };
        self.heap.set_value(off + OBJ_COUNT, new_short_int(0));
        self.heap.set_value(off + OBJ_PROPS, JS_NULL);
        Some(from_heap_offset(off))
    }

    pub(crate) fn new_array_value(&mut self) -> Option<JsValue> {
        let off = self.alloc(BlockTag::Array, 0, 3)?;
        self.heap.set_value(off + ARR_COUNT, new_short_int(0));
        self.heap.set_value(off + ARR_DATA, JS_NULL);
        Some(from_heap_offset(off))
    }

    pub(crate) fn new_function_value(&mut self, func_idx: usize) -> Option<JsValue> {
        let off = self.alloc(BlockTag::Function, func_idx, 2)?;
        self.heap.set_value(off + 1, JS_UNDEFINED);
        Some(from_heap_offset(off))
    }

    // ---- cell reads ----

    pub(crate) fn ref_tag(&self, v: JsValue) -> Option<BlockTag> {
        heap_offset(v).map(|off| self.heap.tag_at(off))
    }

    pub(crate) fn float_value(&self, off: usize) -> f64 {
        f64::from_bits(self.heap.word(off + 1))
    }

    pub(crate) fn int64_value(&self, off: usize) -> i64 {
        self.heap.word(off + 1) as i64
    }

    pub(crate) fn class_of(&self, v: JsValue) -> Option<ClassId> {
        let off = heap_offset(v)?;
        if self.heap.tag_at(off) != BlockTag::Object {
            return None;
        }
        Some(ClassId::from_aux(self.heap.aux_at(off)))
    }

    pub(crate) fn function_index(&self, v: JsValue) -> Option<usize> {
        let off = heap_offset(v)?;
        if self.heap.tag_at(off) != BlockTag::Function {
            return None;
        }
        Some(self.heap.aux_at(off))
    }

    // ---- semantic predicates ----

    pub fn is_string(&self, v: JsValue) -> bool {
        self.ref_tag(v) == Some(BlockTag::String)
    }

    pub fn is_number(&self, v: JsValue) -> bool {
        is_int(v)
            || matches!(
                self.ref_tag(v),
                Some(BlockTag::Float64) | Some(BlockTag::Int64)
            )
    }

    pub fn is_object(&self, v: JsValue) -> bool {
        matches!(
            self.ref_tag(v),
            Some(BlockTag::Object) | Some(BlockTag::Array) | Some(BlockTag::Function)
        )
    }

    pub fn is_array(&self, v: JsValue) -> bool {
        self.ref_tag(v) == Some(BlockTag::Array)
    }

    pub fn is_function(&self, v: JsValue) -> bool {
        is_native_func(v) || self.ref_tag(v) == Some(BlockTag::Function)
    }

    pub fn is_error(&self, v: JsValue) -> bool {
        self.class_of(v).is_some_and(|class| class.is_error())
    }

    pub fn typeof_str(&self, v: JsValue) -> &'static str {
        if is_undefined(v) {
            "undefined"
        } else if is_null(v) {
            "object"
        } else if is_bool(v) {
            "boolean"
        } else if self.is_number(v) {
            "number"
        } else if self.is_string(v) {
            "string"
        } else if self.is_function(v) {
            "function"
        } else {
            "object"
        }
    }

    /// Borrow the bytes of an engine string. The borrow ends before any
    /// operation that may allocate, which is exactly the value's validity
    /// window; copy out (`conversion::to_rust_string`) for anything
    /// longer-lived.
    pub fn str_bytes(&self, v: JsValue) -> Option<&str> {
        let off = heap_offset(v)?;
        if self.heap.tag_at(off) != BlockTag::String {
            return None;
        }
        core::str::from_utf8(self.heap.str_bytes(off)).ok()
    }

    // ---- object properties ----

    /// Property lookup on a plain object. Never allocates.
    pub fn get_prop(&self, obj: JsValue, key: &str) -> Option<JsValue> {
        let slot = self.find_prop_slot(obj, key)?;
        Some(self.heap.value(slot))
    }

    fn find_prop_slot(&self, obj: JsValue, key: &str) -> Option<usize> {
        let off = heap_offset(obj)?;
        if self.heap.tag_at(off) != BlockTag::Object {
            return None;
        }
        let count = get_int(self.heap.value(off + OBJ_COUNT)) as usize;
        let props_off = heap_offset(self.heap.value(off + OBJ_PROPS))?;
        for i in 0..count {
            let key_val = self.heap.value(props_off + 1 + 2 * i);
            if let Some(key_off) = heap_offset(key_val) {
                if self.heap.str_bytes(key_off) == key.as_bytes() {
                    return Some(props_off + 2 + 2 * i);
                }
            }
        }
        None
    }

    fn obj_count_cap(&self, obj: JsValue) -> (usize, usize) {
        let Some(off) = heap_offset(obj) else {
            return (0, 0);
        };
        let count = get_int(self.heap.value(off + OBJ_COUNT)) as usize;
        let cap = match heap_offset(self.heap.value(off + OBJ_PROPS)) {
            Some(props_off) => self.heap.aux_at(props_off) / 2,
            None => 0,
        };
        (count, cap)
    }

    /// Define or overwrite a property. Both the object and the value are
    /// read through stack slots because the key string and table growth
    /// can move them.
    pub(crate) fn set_prop(
        &mut self,
        obj_slot: usize,
        key: &str,
        val_slot: usize,
    ) -> Result<(), Raised> {
        if let Some(slot) = self.find_prop_slot(self.sget(obj_slot), key) {
            let val = self.sget(val_slot);
            self.heap.set_value(slot, val);
            return Ok(());
        }
        let (count, cap) = self.obj_count_cap(self.sget(obj_slot));
        if count == cap {
            let new_cap = if cap == 0 { 4 } else { cap * 2 };
            let new_props = match self.alloc(BlockTag::ValueArray, new_cap * 2, 1 + new_cap * 2) {
                Some(off) => off,
                None => return Err(self.throw_out_of_memory()),
            };
            let Some(obj_off) = heap_offset(self.sget(obj_slot)) else {
                return Err(self.throw_type_error("not an object"));
            };
            if let Some(old_off) = heap_offset(self.heap.value(obj_off + OBJ_PROPS)) {
                for i in 0..count * 2 {
                    let w = self.heap.value(old_off + 1 + i);
                    self.heap.set_value(new_props + 1 + i, w);
                }
            }
            self.heap
                .set_value(obj_off + OBJ_PROPS, from_heap_offset(new_props));
        }
        let key_val = match self.new_string_value(key.as_bytes()) {
            Some(v) => v,
            None => return Err(self.throw_out_of_memory()),
        };
        let Some(obj_off) = heap_offset(self.sget(obj_slot)) else {
            return Err(self.throw_type_error("not an object"));
        };
        let count = get_int(self.heap.value(obj_off + OBJ_COUNT)) as usize;
        let Some(props_off) = heap_offset(self.heap.value(obj_off + OBJ_PROPS)) else {
            return Err(self.throw_internal_error("object property table missing"));
        };
        self.heap.set_value(props_off + 1 + 2 * count, key_val);
        let val = self.sget(val_slot);
        self.heap.set_value(props_off + 2 + 2 * count, val);
        self.heap
            .set_value(obj_off + OBJ_COUNT, new_short_int((count + 1) as i32));
        Ok(())
    }

    pub(crate) fn get_global(&self, key: &str) -> Option<JsValue> {
        self.get_prop(self.global_obj(), key)
    }

    pub(crate) fn set_global(&mut self, key: &str, val_slot: usize) -> Result<(), Raised> {
        let mark = self.smark();
        let gslot = self.spush(self.global_obj())?;
        let out = self.set_prop(gslot, key, val_slot);
        self.struncate(mark);
        out
    }

    // ---- arrays ----

    /// Element count of an array value; `None` for anything else.
    pub fn array_len(&self, arr: JsValue) -> Option<usize> {
        let off = heap_offset(arr)?;
        if self.heap.tag_at(off) != BlockTag::Array {
            return None;
        }
        Some(get_int(self.heap.value(off + ARR_COUNT)) as usize)
    }

    /// Element read; `None` when out of range or not an array.
    pub fn array_get(&self, arr: JsValue, idx: usize) -> Option<JsValue> {
        let off = heap_offset(arr)?;
        if self.heap.tag_at(off) != BlockTag::Array {
            return None;
        }
        let count = get_int(self.heap.value(off + ARR_COUNT)) as usize;
        if idx >= count {
            return None;
        }
        let data_off = heap_offset(self.heap.value(off + ARR_DATA))?;
        Some(self.heap.value(data_off + 1 + idx))
    }

    fn array_count_cap(&self, arr: JsValue) -> (usize, usize) {
        let Some(off) = heap_offset(arr) else {
            return (0, 0);
        };
        let count = get_int(self.heap.value(off + ARR_COUNT)) as usize;
        let cap = match heap_offset(self.heap.value(off + ARR_DATA)) {
            Some(data_off) => self.heap.aux_at(data_off),
            None => 0,
        };
        (count, cap)
    }

    fn array_reserve(&mut self, arr_slot: usize, need: usize) -> Result<(), Raised> {
        let (count, cap) = self.array_count_cap(self.sget(arr_slot));
        if need <= cap {
            return Ok(());
        }
        let new_cap = need.next_power_of_two().max(4);
        let new_data = match self.alloc(BlockTag::ValueArray, new_cap, 1 + new_cap) {
            Some(off) => off,
            None => return Err(self.throw_out_of_memory()),
        };
        let Some(arr_off) = heap_offset(self.sget(arr_slot)) else {
            return Err(self.throw_type_error("not an array"));
        };
        if let Some(old_off) = heap_offset(self.heap.value(arr_off + ARR_DATA)) {
            for i in 0..count {
                let w = self.heap.value(old_off + 1 + i);
                self.heap.set_value(new_data + 1 + i, w);
            }
        }
        for i in count..new_cap {
            self.heap.set_value(new_data + 1 + i, JS_UNDEFINED);
        }
        self.heap
            .set_value(arr_off + ARR_DATA, from_heap_offset(new_data));
        Ok(())
    }

    pub(crate) fn array_push(&mut self, arr_slot: usize, val_slot: usize) -> Result<usize, Raised> {
        let (count, _) = self.array_count_cap(self.sget(arr_slot));
        self.array_reserve(arr_slot, count + 1)?;
        let Some(arr_off) = heap_offset(self.sget(arr_slot)) else {
            return Err(self.throw_type_error("not an array"));
        };
        let Some(data_off) = heap_offset(self.heap.value(arr_off + ARR_DATA)) else {
            return Err(self.throw_internal_error("array storage missing"));
        };
        let val = self.sget(val_slot);
        self.heap.set_value(data_off + 1 + count, val);
        self.heap
            .set_value(arr_off + ARR_COUNT, new_short_int((count + 1) as i32));
        Ok(count + 1)
    }

    /// `length` assignment semantics: shrinking truncates (and clears the
    /// dropped slots so the collector can reclaim them), growing fills with
    /// undefined.
    pub(crate) fn array_set_length(&mut self, arr_slot: usize, new_len: usize) -> Result<(), Raised> {
        let (count, _) = self.array_count_cap(self.sget(arr_slot));
        if new_len > count {
            self.array_reserve(arr_slot, new_len)?;
        }
        let Some(arr_off) = heap_offset(self.sget(arr_slot)) else {
            return Err(self.throw_type_error("not an array"));
        };
        if new_len < count {
            if let Some(data_off) = heap_offset(self.heap.value(arr_off + ARR_DATA)) {
                for i in new_len..count {
                    self.heap.set_value(data_off + 1 + i, JS_UNDEFINED);
                }
            }
        }
        self.heap
            .set_value(arr_off + ARR_COUNT, new_short_int(new_len as i32));
        Ok(())
    }

    pub(crate) fn array_set(
        &mut self,
        arr_slot: usize,
        idx: usize,
        val_slot: usize,
    ) -> Result<(), Raised> {
        let (count, _) = self.array_count_cap(self.sget(arr_slot));
        if idx >= count {
            self.array_reserve(arr_slot, idx + 1)?;
        }
        let Some(arr_off) = heap_offset(self.sget(arr_slot)) else {
            return Err(self.throw_type_error("not an array"));
        };
        let Some(data_off) = heap_offset(self.heap.value(arr_off + ARR_DATA)) else {
            return Err(self.throw_internal_error("array storage missing"));
        };
        let val = self.sget(val_slot);
        self.heap.set_value(data_off + 1 + idx, val);
        if idx >= count {
            self.heap
                .set_value(arr_off + ARR_COUNT, new_short_int((idx + 1) as i32));
        }
        Ok(())
    }

    // ---- interpreter value stack ----

    pub(crate) fn smark(&self) -> usize {
        self.heap.stack_len()
    }

    pub(crate) fn spush(&mut self, v: JsValue) -> Result<usize, Raised> {
        match self.heap.spush(v) {
            Some(idx) => Ok(idx),
            None => Err(self.throw_range_error("stack overflow")),
        }
    }

    pub(crate) fn sget(&self, slot: usize) -> JsValue {
        self.heap.sget(slot)
    }

    pub(crate) fn sset(&mut self, slot: usize, v: JsValue) {
        self.heap.sset(slot, v);
    }

    pub(crate) fn struncate(&mut self, mark: usize) {
        self.heap.struncate(mark);
    }

    // ---- pending exception ----

    pub fn exception_pending(&self) -> bool {
        self.exception_pending
    }

    pub(crate) fn current_exception(&self) -> JsValue {
        self.roots[ROOT_CURRENT_EXCEPTION]
    }

    pub(crate) fn set_pending_exception(&mut self, v: JsValue) {
        self.roots[ROOT_CURRENT_EXCEPTION] = v;
        self.exception_pending = true;
    }

    /// Retrieve and clear the pending exception. The returned value follows
    /// the usual staleness rules; pin it before allocating.
    pub fn take_exception(&mut self) -> JsValue {
        self.exception_pending = false;
        core::mem::replace(&mut self.roots[ROOT_CURRENT_EXCEPTION], JS_UNDEFINED)
    }

    // ---- pinned references ----

    /// Register a stack-discipline pinned slot holding `val`. Release with
    /// `pop_ref`, strictly last-in-first-out; out-of-order release is
    /// undefined (checked only in debug builds).
    pub fn push_ref(&mut self, val: JsValue) -> StackRef {
        StackRef(self.gc_refs.push(val))
    }

    /// Release the most recent stack-discipline slot, returning its
    /// relocated value.
    pub fn pop_ref(&mut self, r: StackRef) -> JsValue {
        self.gc_refs.pop(r.0)
    }

    /// Register a list-discipline pinned slot; release order is free, at
    /// extra per-collection scan cost.
    pub fn add_ref(&mut self, val: JsValue) -> ListRef {
        ListRef(self.gc_refs.add(val))
    }

    /// Release a list-discipline slot, returning its relocated value.
    pub fn delete_ref(&mut self, r: ListRef) -> JsValue {
        self.gc_refs.delete(r.0)
    }

    // ---- host hooks ----

    pub fn set_user_data(&mut self, data: Box<dyn Any>) {
        self.user_data = Some(data);
    }

    pub fn user_data(&self) -> Option<&dyn Any> {
        self.user_data.as_deref()
    }

    pub fn user_data_mut(&mut self) -> Option<&mut (dyn Any + 'static)> {
        match self.user_data.as_mut() {
            Some(data) => Some(data.as_mut()),
            None => None,
        }
    }

    /// Install the periodic interrupt handler. The engine calls it at
    /// interpreter-defined intervals during evaluation; returning `true`
    /// aborts the current evaluation with a pending InternalError. Handlers
    /// must not evaluate more script (the boundary is not reentrant).
    pub fn set_interrupt_handler(&mut self, handler: impl FnMut() -> bool + 'static) {
        self.interrupt_handler = Some(Box::new(handler));
    }

    pub fn clear_interrupt_handler(&mut self) {
        self.interrupt_handler = None;
    }

    pub(crate) fn poll_interrupt(&mut self) -> Result<(), Raised> {
        self.interrupt_counter -= 1;
        if self.interrupt_counter > 0 {
            return Ok(());
        }
        self.interrupt_counter = INTERRUPT_INTERVAL;
        let interrupted = match self.interrupt_handler.as_mut() {
            Some(handler) => handler(),
            None => false,
        };
        if interrupted {
            Err(self.throw_internal_error("interrupted"))
        } else {
            Ok(())
        }
    }

    /// Install the log sink used by diagnostics such as `dump_memory`.
    pub fn set_log_func(&mut self, func: impl FnMut(&[u8]) + 'static) {
        self.log_func = Some(Box::new(func));
    }

    pub fn write_log(&mut self, bytes: &[u8]) {
        if let Some(func) = self.log_func.as_mut() {
            func(bytes);
        }
    }

    /// Seed `Math.random` for reproducible runs.
    pub fn set_random_seed(&mut self, seed: u64) {
        self.random_state = seed | 1;
    }

    pub(crate) fn next_random_f64(&mut self) -> f64 {
        // xorshift64*, upper 53 bits to a float in [0, 1).
        let mut x = self.random_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.random_state = x;
        let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        (bits as f64) / ((1u64 << 53) as f64)
    }

    /// Write basic arena statistics to the log sink.
    pub fn dump_memory(&mut self) {
        let heap_used = self.heap.heap_free() * WORD_BYTES;
        let total = self.heap.words() * WORD_BYTES;
        let stack_used = self.heap.stack_len() * WORD_BYTES;
        let msg = format!("heap size={heap_used}/{total} stack_size={stack_used}\n");
        self.write_log(msg.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::STDLIB;
    use crate::value::JS_TRUE;

    fn new_context() -> Context {
        Context::new(ContextConfig {
            memory_size: 64 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init")
    }

    #[test]
    fn rejects_tiny_capacity() {
        let err = Context::new(ContextConfig {
            memory_size: 64,
            stdlib: &STDLIB,
        })
        .expect_err("must fail");
        assert!(matches!(err, ContextError::MemoryTooSmall { .. }));
    }

    #[test]
    fn bootstrap_installs_globals() {
        let ctx = new_context();
        assert!(ctx.is_object(ctx.global_obj()));
        assert!(ctx.get_global("Error").is_some());
        assert!(ctx.get_global("String").is_some());
        assert!(ctx.get_global("Math").is_some());
        assert_eq!(ctx.get_global("globalThis"), Some(ctx.global_obj()));
    }

    #[test]
    fn properties_roundtrip() {
        let mut ctx = new_context();
        let obj = ctx.new_object_value(ClassId::Object).expect("object");
        let mark = ctx.smark();
        let obj_slot = ctx.spush(obj).expect("slot");
        let val_slot = ctx.spush(new_short_int(42)).expect("slot");
        ctx.set_prop(obj_slot, "x", val_slot).expect("set");
        let obj = ctx.sget(obj_slot);
        assert_eq!(ctx.get_prop(obj, "x"), Some(new_short_int(42)));
        assert_eq!(ctx.get_prop(obj, "y"), None);
        // Overwrite keeps a single entry.
        ctx.sset(val_slot, JS_TRUE);
        ctx.set_prop(obj_slot, "x", val_slot).expect("set");
        let obj = ctx.sget(obj_slot);
        assert_eq!(ctx.get_prop(obj, "x"), Some(JS_TRUE));
        ctx.struncate(mark);
    }

    #[test]
    fn property_table_grows_past_initial_capacity() {
        let mut ctx = new_context();
        let obj = ctx.new_object_value(ClassId::Object).expect("object");
        let mark = ctx.smark();
        let obj_slot = ctx.spush(obj).expect("slot");
        for i in 0..20 {
            let val_slot = ctx.spush(new_short_int(i)).expect("slot");
            ctx.set_prop(obj_slot, &format!("k{i}"), val_slot).expect("set");
            ctx.struncate(obj_slot + 1);
        }
        let obj = ctx.sget(obj_slot);
        for i in 0..20 {
            assert_eq!(ctx.get_prop(obj, &format!("k{i}")), Some(new_short_int(i)));
        }
        ctx.struncate(mark);
    }

    #[test]
    fn arrays_push_and_index() {
        let mut ctx = new_context();
        let arr = ctx.new_array_value().expect("array");
        let mark = ctx.smark();
        let arr_slot = ctx.spush(arr).expect("slot");
        for i in 0..10 {
            let val_slot = ctx.spush(new_short_int(i * i)).expect("slot");
            ctx.array_push(arr_slot, val_slot).expect("push");
            ctx.struncate(arr_slot + 1);
        }
        let arr = ctx.sget(arr_slot);
        assert_eq!(ctx.array_len(arr), Some(10));
        assert_eq!(ctx.array_get(arr, 3), Some(new_short_int(9)));
        assert_eq!(ctx.array_get(arr, 10), None);
        // Sparse-ish set fills the gap with undefined.
        let val_slot = ctx.spush(JS_TRUE).expect("slot");
        ctx.array_set(arr_slot, 12, val_slot).expect("set");
        let arr = ctx.sget(arr_slot);
        assert_eq!(ctx.array_len(arr), Some(13));
        assert_eq!(ctx.array_get(arr, 11), Some(JS_UNDEFINED));
        assert_eq!(ctx.array_get(arr, 12), Some(JS_TRUE));
        ctx.struncate(mark);
    }

    #[test]
    fn strings_are_borrowable() {
        let mut ctx = new_context();
        let s = ctx.new_string_value("hello".as_bytes()).expect("string");
        assert!(ctx.is_string(s));
        assert_eq!(ctx.str_bytes(s), Some("hello"));
        assert_eq!(ctx.str_bytes(JS_TRUE), None);
    }

    #[test]
    fn exception_take_clears_state() {
        let mut ctx = new_context();
        assert!(!ctx.exception_pending());
        let _ = ctx.throw_type_error("boom");
        assert!(ctx.exception_pending());
        let err = ctx.take_exception();
        assert!(ctx.is_error(err));
        assert!(!ctx.exception_pending());
        assert_eq!(ctx.current_exception(), JS_UNDEFINED);
    }

    #[test]
    fn deterministic_random_sequence() {
        let mut a = new_context();
        let mut b = new_context();
        a.set_random_seed(42);
        b.set_random_seed(42);
        for _ in 0..16 {
            let x = a.next_random_f64();
            let y = b.next_random_f64();
            assert_eq!(x.to_bits(), y.to_bits());
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn user_data_roundtrip() {
        let mut ctx = new_context();
        assert!(ctx.user_data().is_none());
        ctx.set_user_data(Box::new(7u32));
        let got = ctx.user_data().and_then(|d| d.downcast_ref::<u32>());
        assert_eq!(got, Some(&7));
        if let Some(data) = ctx.user_data_mut().and_then(|d| d.downcast_mut::<u32>()) {
            *data = 9;
        }
        let got = ctx.user_data().and_then(|d| d.downcast_ref::<u32>());
        assert_eq!(got, Some(&9));
    }

    #[test]
    fn log_sink_receives_dump() {
        use std::cell::RefCell;
        use std::rc::Rc;
        let mut ctx = new_context();
        let captured: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = captured.clone();
        ctx.set_log_func(move |bytes| sink.borrow_mut().extend_from_slice(bytes));
        ctx.dump_memory();
        let text = String::from_utf8(captured.borrow().clone()).expect("utf8");
        assert!(text.starts_with("heap size="));
    }
}
