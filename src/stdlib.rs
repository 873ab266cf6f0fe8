//! Native function table and standard-library bootstrap.
//!
//! A `StdlibDef` lists the native functions a context exposes; the
//! descriptor is consumed once at context creation, which installs the
//! global bindings (`String`, `Number`, `Math`, the error constructors,
//! `globalThis`). Native functions are dispatched by table index carried in
//! the value word itself, so they cost no heap cells.
//!
//! Array methods (`push`, `join`) live in the same table; the interpreter
//! resolves them during member lookup on array receivers.

use crate::context::Context;
use crate::exception::{ClassId, Raised};
use crate::value::{is_undefined, new_native_func, new_short_int, JsValue, JS_NULL, JS_UNDEFINED};

/// Argument window of a native call: `count` consecutive, collector-scanned
/// stack slots starting at `base`. Reading through the slots (rather than
/// copied values) keeps arguments valid across allocations the native
/// itself performs.
pub struct NativeArgs {
    pub(crate) base: usize,
    pub(crate) count: usize,
}

impl NativeArgs {
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Current value of argument `i`; `undefined` past the end.
    pub(crate) fn arg(&self, ctx: &Context, i: usize) -> JsValue {
        if i < self.count {
            ctx.sget(self.base + i)
        } else {
            JS_UNDEFINED
        }
    }

    pub(crate) fn arg_slot(&self, i: usize) -> Option<usize> {
        if i < self.count {
            Some(self.base + i)
        } else {
            None
        }
    }
}

pub(crate) type NativeFn =
    fn(&mut Context, Option<usize>, &NativeArgs, i16) -> Result<JsValue, Raised>;

pub struct NativeFuncDef {
    pub name: &'static str,
    pub(crate) func: NativeFn,
    pub(crate) magic: i16,
}

/// Standard-library descriptor handed to `Context::new`. The arena must be
/// large enough for the bootstrap this descriptor implies; see the capacity
/// precondition on `Context::new`.
pub struct StdlibDef {
    pub funcs: &'static [NativeFuncDef],
}

pub(crate) const NF_STRING: u32 = 0;
pub(crate) const NF_NUMBER: u32 = 1;
pub(crate) const NF_ERROR: u32 = 2;
pub(crate) const NF_TYPE_ERROR: u32 = 3;
pub(crate) const NF_RANGE_ERROR: u32 = 4;
pub(crate) const NF_REFERENCE_ERROR: u32 = 5;
pub(crate) const NF_SYNTAX_ERROR: u32 = 6;
pub(crate) const NF_INTERNAL_ERROR: u32 = 7;
pub(crate) const NF_MATH_FLOOR: u32 = 8;
pub(crate) const NF_MATH_ABS: u32 = 9;
pub(crate) const NF_MATH_RANDOM: u32 = 10;
pub(crate) const NF_ARRAY_PUSH: u32 = 11;
pub(crate) const NF_ARRAY_JOIN: u32 = 12;

static FUNCS: &[NativeFuncDef] = &[
    NativeFuncDef { name: "String", func: js_string, magic: 0 },
    NativeFuncDef { name: "Number", func: js_number, magic: 0 },
    NativeFuncDef { name: "Error", func: js_error, magic: ClassId::Error as i16 },
    NativeFuncDef { name: "TypeError", func: js_error, magic: ClassId::TypeError as i16 },
    NativeFuncDef { name: "RangeError", func: js_error, magic: ClassId::RangeError as i16 },
    NativeFuncDef { name: "ReferenceError", func: js_error, magic: ClassId::ReferenceError as i16 },
    NativeFuncDef { name: "SyntaxError", func: js_error, magic: ClassId::SyntaxError as i16 },
    NativeFuncDef { name: "InternalError", func: js_error, magic: ClassId::InternalError as i16 },
    NativeFuncDef { name: "floor", func: math_floor, magic: 0 },
    NativeFuncDef { name: "abs", func: math_abs, magic: 0 },
    NativeFuncDef { name: "random", func: math_random, magic: 0 },
    NativeFuncDef { name: "push", func: array_push, magic: 0 },
    NativeFuncDef { name: "join", func: array_join, magic: 0 },
];

/// The default standard library.
pub static STDLIB: StdlibDef = StdlibDef { funcs: FUNCS };

const CAPACITY_MSG: &str = "arena capacity is below the standard library's static \
footprint; this is the documented context-creation precondition \
(grow ContextConfig::memory_size)";

/// Install the descriptor's globals into a fresh context.
///
/// # Panics
/// Panics when the arena cannot hold the bootstrap allocations; see the
/// capacity precondition on `Context::new`.
pub(crate) fn bootstrap(ctx: &mut Context) {
    let Some(global) = ctx.new_object_value(ClassId::Object) else {
        panic!("{CAPACITY_MSG}");
    };
    ctx.set_global_obj(global);

    define_global(ctx, "String", new_native_func(NF_STRING));
    define_global(ctx, "Number", new_native_func(NF_NUMBER));
    define_global(ctx, "Error", new_native_func(NF_ERROR));
    define_global(ctx, "TypeError", new_native_func(NF_TYPE_ERROR));
    define_global(ctx, "RangeError", new_native_func(NF_RANGE_ERROR));
    define_global(ctx, "ReferenceError", new_native_func(NF_REFERENCE_ERROR));
    define_global(ctx, "SyntaxError", new_native_func(NF_SYNTAX_ERROR));
    define_global(ctx, "InternalError", new_native_func(NF_INTERNAL_ERROR));

    let Some(math) = ctx.new_object_value(ClassId::Object) else {
        panic!("{CAPACITY_MSG}");
    };
    let mark = ctx.smark();
    let math_slot = must_slot(ctx, math);
    define_prop(ctx, math_slot, "floor", new_native_func(NF_MATH_FLOOR));
    define_prop(ctx, math_slot, "abs", new_native_func(NF_MATH_ABS));
    define_prop(ctx, math_slot, "random", new_native_func(NF_MATH_RANDOM));
    must(ctx.set_global("Math", math_slot));
    ctx.struncate(mark);

    let mark = ctx.smark();
    let global = ctx.global_obj();
    let global_slot = must_slot(ctx, global);
    must(ctx.set_global("globalThis", global_slot));
    ctx.struncate(mark);
}

fn define_global(ctx: &mut Context, name: &str, v: JsValue) {
    let mark = ctx.smark();
    let slot = must_slot(ctx, v);
    must(ctx.set_global(name, slot));
    ctx.struncate(mark);
}

fn define_prop(ctx: &mut Context, obj_slot: usize, name: &str, v: JsValue) {
    let mark = ctx.smark();
    let slot = must_slot(ctx, v);
    must(ctx.set_prop(obj_slot, name, slot));
    ctx.struncate(mark);
}

fn must_slot(ctx: &mut Context, v: JsValue) -> usize {
    match ctx.spush(v) {
        Ok(slot) => slot,
        Err(Raised) => panic!("{CAPACITY_MSG}"),
    }
}

fn must(r: Result<(), Raised>) {
    if r.is_err() {
        panic!("{CAPACITY_MSG}");
    }
}

// ---- native implementations ----

use crate::conversion::number_result;

fn js_string(
    ctx: &mut Context,
    _this: Option<usize>,
    args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    if args.len() == 0 {
        return match ctx.new_string_value(b"") {
            Some(v) => Ok(v),
            None => Err(ctx.throw_out_of_memory()),
        };
    }
    let v = args.arg(ctx, 0);
    ctx.to_string_value(v)
}

fn js_number(
    ctx: &mut Context,
    _this: Option<usize>,
    args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    if args.len() == 0 {
        return Ok(new_short_int(0));
    }
    let x = ctx.to_number(args.arg(ctx, 0));
    number_result(ctx, x)
}

/// Shared constructor for the error classes; `magic` selects the class.
/// Works the same whether invoked via `new` or as a plain call.
fn js_error(
    ctx: &mut Context,
    _this: Option<usize>,
    args: &NativeArgs,
    magic: i16,
) -> Result<JsValue, Raised> {
    let class = ClassId::from_aux(magic as usize);
    let message = {
        let v = args.arg(ctx, 0);
        if is_undefined(v) {
            String::new()
        } else {
            ctx.to_rust_string(v)
        }
    };
    match ctx.build_error(class, &message) {
        Some(err) => Ok(err),
        None => Err(ctx.throw(JS_NULL)),
    }
}

fn math_floor(
    ctx: &mut Context,
    _this: Option<usize>,
    args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    let x = ctx.to_number(args.arg(ctx, 0));
    number_result(ctx, x.floor())
}

fn math_abs(
    ctx: &mut Context,
    _this: Option<usize>,
    args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    let x = ctx.to_number(args.arg(ctx, 0));
    number_result(ctx, x.abs())
}

fn math_random(
    ctx: &mut Context,
    _this: Option<usize>,
    _args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    let x = ctx.next_random_f64();
    number_result(ctx, x)
}

fn array_push(
    ctx: &mut Context,
    this: Option<usize>,
    args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    let Some(this_slot) = this else {
        return Err(ctx.throw_type_error("push called on a non-array"));
    };
    if !ctx.is_array(ctx.sget(this_slot)) {
        return Err(ctx.throw_type_error("push called on a non-array"));
    }
    let mut len = ctx.array_len(ctx.sget(this_slot)).unwrap_or(0);
    for i in 0..args.len() {
        let Some(arg_slot) = args.arg_slot(i) else {
            break;
        };
        len = ctx.array_push(this_slot, arg_slot)?;
    }
    Ok(new_short_int(len as i32))
}

fn array_join(
    ctx: &mut Context,
    this: Option<usize>,
    args: &NativeArgs,
    _magic: i16,
) -> Result<JsValue, Raised> {
    let Some(this_slot) = this else {
        return Err(ctx.throw_type_error("join called on a non-array"));
    };
    if !ctx.is_array(ctx.sget(this_slot)) {
        return Err(ctx.throw_type_error("join called on a non-array"));
    }
    let sep = {
        let v = args.arg(ctx, 0);
        if is_undefined(v) {
            String::from(",")
        } else {
            ctx.to_rust_string(v)
        }
    };
    // No arena allocation happens until the final string is built, so the
    // element loop can read the receiver fresh each round without pinning.
    let len = ctx.array_len(ctx.sget(this_slot)).unwrap_or(0);
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(&sep);
        }
        let elem = ctx
            .array_get(ctx.sget(this_slot), i)
            .unwrap_or(JS_UNDEFINED);
        if !is_undefined(elem) && !crate::value::is_null(elem) {
            out.push_str(&ctx.to_rust_string(elem));
        }
    }
    match ctx.new_string_value(out.as_bytes()) {
        Some(v) => Ok(v),
        None => Err(ctx.throw_out_of_memory()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextConfig};
    use crate::value::{get_int, is_int};

    fn new_context() -> Context {
        Context::new(ContextConfig {
            memory_size: 64 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init")
    }

    #[test]
    fn table_indices_match_constants() {
        assert_eq!(FUNCS[NF_STRING as usize].name, "String");
        assert_eq!(FUNCS[NF_ERROR as usize].name, "Error");
        assert_eq!(FUNCS[NF_INTERNAL_ERROR as usize].name, "InternalError");
        assert_eq!(FUNCS[NF_MATH_RANDOM as usize].name, "random");
        assert_eq!(FUNCS[NF_ARRAY_JOIN as usize].name, "join");
    }

    #[test]
    fn error_classes_carry_magic() {
        assert_eq!(
            FUNCS[NF_TYPE_ERROR as usize].magic,
            ClassId::TypeError as i16
        );
        assert_eq!(
            FUNCS[NF_SYNTAX_ERROR as usize].magic,
            ClassId::SyntaxError as i16
        );
    }

    #[test]
    fn push_and_join_natives() {
        let mut ctx = new_context();
        let arr = ctx.new_array_value().expect("array");
        let mark = ctx.smark();
        let this_slot = ctx.spush(arr).expect("slot");
        let base = ctx.spush(new_short_int(1)).expect("slot");
        ctx.spush(new_short_int(2)).expect("slot");
        let args = NativeArgs { base, count: 2 };
        let len = array_push(&mut ctx, Some(this_slot), &args, 0).expect("push");
        assert!(is_int(len));
        assert_eq!(get_int(len), 2);

        let sep = ctx.new_string("-");
        let sep_slot = ctx.spush(sep).expect("slot");
        let args = NativeArgs { base: sep_slot, count: 1 };
        let joined = array_join(&mut ctx, Some(this_slot), &args, 0).expect("join");
        assert_eq!(ctx.str_bytes(joined), Some("1-2"));
        ctx.struncate(mark);
    }

    #[test]
    fn error_native_builds_classed_object() {
        let mut ctx = new_context();
        let msg = ctx.new_string("boom");
        let mark = ctx.smark();
        let base = ctx.spush(msg).expect("slot");
        let args = NativeArgs { base, count: 1 };
        let err = js_error(&mut ctx, None, &args, ClassId::TypeError as i16).expect("error");
        assert_eq!(ctx.class_of(err), Some(ClassId::TypeError));
        assert_eq!(ctx.error_message(err), "TypeError: boom");
        ctx.struncate(mark);
    }
}
