//! Tree-walking evaluator.
//!
//! The one rule that matters here: any engine value held across an
//! operation that may allocate lives in the arena-resident value stack, not
//! in a Rust local. Stack slots are scanned and rewritten by the collector,
//! so re-reading a slot after an allocation always yields the relocated
//! value. A `JsValue` returned by `eval_expr` is fresh: callers root it
//! before the next allocating step or use it immediately.
//!
//! Call frames are stack windows: `[params..., arguments, vars..., ret]`
//! starting at `Frame::base`. Locals resolve positionally through
//! `FuncDef::local_slot`; everything else is a global-object property.

use crate::context::{BtFrame, Context};
use crate::conversion::number_result;
use crate::exception::Raised;
use crate::parser::{BinOp, Expr, FuncDef, Stmt, UnOp};
use crate::stdlib::{NativeArgs, NF_ARRAY_JOIN, NF_ARRAY_PUSH};
use crate::value::{
    is_null, is_undefined, native_func_idx, new_bool, new_native_func, new_short_int, JsValue,
    JS_NULL, JS_UNDEFINED,
};
use std::rc::Rc;

const MAX_CALL_DEPTH: u32 = 128;

struct Frame {
    func: Rc<FuncDef>,
    base: usize,
    ret_slot: usize,
    completion_slot: Option<usize>,
}

enum Flow {
    Normal,
    Return,
}

/// Run a parsed program (`main_idx` into the context's function table).
/// With `retval` the completion value is the value of the last top-level
/// expression statement; without it the result is undefined.
pub(crate) fn run_program(
    ctx: &mut Context,
    main_idx: usize,
    retval: bool,
) -> Result<JsValue, Raised> {
    let func = match ctx.functions.get(main_idx) {
        Some(f) => f.clone(),
        None => return Err(ctx.throw_internal_error("missing program entry")),
    };
    let mark = ctx.smark();
    let completion = ctx.spush(JS_UNDEFINED)?;
    ctx.backtrace.push(BtFrame {
        func_name: func.name.clone(),
        line: 0,
    });
    let frame = Frame {
        func,
        base: completion + 1,
        ret_slot: completion,
        completion_slot: retval.then_some(completion),
    };
    let result = exec_body(ctx, &frame);
    ctx.backtrace.pop();
    let out = match result {
        Ok(_) => {
            let v = if retval { ctx.sget(completion) } else { JS_UNDEFINED };
            Ok(v)
        }
        Err(Raised) => Err(Raised),
    };
    ctx.struncate(mark);
    out
}

fn exec_body(ctx: &mut Context, frame: &Frame) -> Result<Flow, Raised> {
    let func = frame.func.clone();
    for stmt in &func.body {
        if let Stmt::FuncDecl(idx, _) = stmt {
            define_function(ctx, frame, *idx)?;
        }
    }
    for stmt in &func.body {
        if let Flow::Return = exec_stmt(ctx, frame, stmt)? {
            return Ok(Flow::Return);
        }
    }
    Ok(Flow::Normal)
}

fn set_line(ctx: &mut Context, line: u32) {
    if let Some(top) = ctx.backtrace.last_mut() {
        top.line = line;
    }
}

fn exec_stmt(ctx: &mut Context, frame: &Frame, stmt: &Stmt) -> Result<Flow, Raised> {
    ctx.poll_interrupt()?;
    match stmt {
        Stmt::Expr(e, line) => {
            set_line(ctx, *line);
            let v = eval_expr(ctx, frame, e)?;
            if let Some(slot) = frame.completion_slot {
                ctx.sset(slot, v);
            }
            Ok(Flow::Normal)
        }
        Stmt::VarDecl(decls, line) => {
            set_line(ctx, *line);
            for (name, init) in decls {
                match init {
                    Some(e) => {
                        let v = eval_expr(ctx, frame, e)?;
                        define_var(ctx, frame, name, v)?;
                    }
                    None => {
                        // Redeclaration without initializer keeps the value.
                        if frame.func.local_slot(name).is_none()
                            && ctx.get_global(name).is_none()
                        {
                            define_var(ctx, frame, name, JS_UNDEFINED)?;
                        }
                    }
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::FuncDecl(idx, line) => {
            set_line(ctx, *line);
            define_function(ctx, frame, *idx)?;
            Ok(Flow::Normal)
        }
        Stmt::If(cond, then, otherwise, line) => {
            set_line(ctx, *line);
            let c = eval_expr(ctx, frame, cond)?;
            if ctx.to_bool(c) {
                exec_stmt(ctx, frame, then)
            } else if let Some(alt) = otherwise {
                exec_stmt(ctx, frame, alt)
            } else {
                Ok(Flow::Normal)
            }
        }
        Stmt::While(cond, body, line) => {
            loop {
                set_line(ctx, *line);
                ctx.poll_interrupt()?;
                let c = eval_expr(ctx, frame, cond)?;
                if !ctx.to_bool(c) {
                    break;
                }
                if let Flow::Return = exec_stmt(ctx, frame, body)? {
                    return Ok(Flow::Return);
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::For(init, cond, update, body, line) => {
            set_line(ctx, *line);
            if let Some(init) = init {
                if let Flow::Return = exec_stmt(ctx, frame, init)? {
                    return Ok(Flow::Return);
                }
            }
            loop {
                ctx.poll_interrupt()?;
                if let Some(cond) = cond {
                    let c = eval_expr(ctx, frame, cond)?;
                    if !ctx.to_bool(c) {
                        break;
                    }
                }
                if let Flow::Return = exec_stmt(ctx, frame, body)? {
                    return Ok(Flow::Return);
                }
                if let Some(update) = update {
                    eval_expr(ctx, frame, update)?;
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Return(value, line) => {
            set_line(ctx, *line);
            let v = match value {
                Some(e) => eval_expr(ctx, frame, e)?,
                None => JS_UNDEFINED,
            };
            ctx.sset(frame.ret_slot, v);
            Ok(Flow::Return)
        }
        Stmt::Throw(e, line) => {
            set_line(ctx, *line);
            let v = eval_expr(ctx, frame, e)?;
            Err(ctx.throw(v))
        }
        Stmt::Block(body) => {
            for stmt in body {
                if let Flow::Return = exec_stmt(ctx, frame, stmt)? {
                    return Ok(Flow::Return);
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Empty => Ok(Flow::Normal),
    }
}

fn define_function(ctx: &mut Context, frame: &Frame, idx: usize) -> Result<(), Raised> {
    let name = match ctx.functions.get(idx) {
        Some(f) => f.name.clone(),
        None => return Err(ctx.throw_internal_error("missing function")),
    };
    let fval = new_function_checked(ctx, idx)?;
    define_var(ctx, frame, &name, fval)
}

/// `var`-style binding: local slot inside a function, global property at
/// the top level.
fn define_var(ctx: &mut Context, frame: &Frame, name: &str, v: JsValue) -> Result<(), Raised> {
    if let Some(slot) = frame.func.local_slot(name) {
        ctx.sset(frame.base + slot, v);
        return Ok(());
    }
    let mark = ctx.smark();
    let vslot = ctx.spush(v)?;
    let out = ctx.set_global(name, vslot);
    ctx.struncate(mark);
    out
}

fn read_ident(ctx: &mut Context, frame: &Frame, name: &str) -> Result<JsValue, Raised> {
    if let Some(slot) = frame.func.local_slot(name) {
        return Ok(ctx.sget(frame.base + slot));
    }
    match ctx.get_global(name) {
        Some(v) => Ok(v),
        None => Err(ctx.throw_reference_error(&format!("'{name}' is not defined"))),
    }
}

fn new_string_checked(ctx: &mut Context, bytes: &[u8]) -> Result<JsValue, Raised> {
    match ctx.new_string_value(bytes) {
        Some(v) => Ok(v),
        None => Err(ctx.throw_out_of_memory()),
    }
}

fn new_function_checked(ctx: &mut Context, idx: usize) -> Result<JsValue, Raised> {
    match ctx.new_function_value(idx) {
        Some(v) => Ok(v),
        None => Err(ctx.throw_out_of_memory()),
    }
}

fn eval_expr(ctx: &mut Context, frame: &Frame, expr: &Expr) -> Result<JsValue, Raised> {
    match expr {
        Expr::Number(n) => number_result(ctx, *n),
        Expr::Str(s) => new_string_checked(ctx, s.as_bytes()),
        Expr::Bool(b) => Ok(new_bool(*b)),
        Expr::Null => Ok(JS_NULL),
        Expr::Undefined => Ok(JS_UNDEFINED),
        Expr::Ident(name) => read_ident(ctx, frame, name),
        Expr::ArrayLit(items) => {
            let arr = match ctx.new_array_value() {
                Some(a) => a,
                None => return Err(ctx.throw_out_of_memory()),
            };
            let mark = ctx.smark();
            let arr_slot = ctx.spush(arr)?;
            for item in items {
                let v = eval_expr(ctx, frame, item)?;
                let vslot = ctx.spush(v)?;
                ctx.array_push(arr_slot, vslot)?;
                ctx.struncate(arr_slot + 1);
            }
            let out = ctx.sget(arr_slot);
            ctx.struncate(mark);
            Ok(out)
        }
        Expr::ObjectLit(props) => {
            let obj = match ctx.new_object_value(crate::exception::ClassId::Object) {
                Some(o) => o,
                None => return Err(ctx.throw_out_of_memory()),
            };
            let mark = ctx.smark();
            let obj_slot = ctx.spush(obj)?;
            for (key, value) in props {
                let v = eval_expr(ctx, frame, value)?;
                let vslot = ctx.spush(v)?;
                ctx.set_prop(obj_slot, key, vslot)?;
                ctx.struncate(obj_slot + 1);
            }
            let out = ctx.sget(obj_slot);
            ctx.struncate(mark);
            Ok(out)
        }
        Expr::Func(idx) => new_function_checked(ctx, *idx),
        Expr::Member(obj_e, name) => {
            let obj = eval_expr(ctx, frame, obj_e)?;
            get_member(ctx, obj, name)
        }
        Expr::Index(obj_e, idx_e) => {
            let obj = eval_expr(ctx, frame, obj_e)?;
            let mark = ctx.smark();
            let oslot = ctx.spush(obj)?;
            let idx = eval_expr(ctx, frame, idx_e)?;
            let obj = ctx.sget(oslot);
            let out = get_index(ctx, obj, idx);
            ctx.struncate(mark);
            out
        }
        Expr::Call(callee, args, line) => eval_call(ctx, frame, callee, args, *line, false),
        Expr::New(callee, args, line) => eval_call(ctx, frame, callee, args, *line, true),
        Expr::Unary(op, operand) => match op {
            UnOp::TypeOf => {
                if let Expr::Ident(name) = &**operand {
                    if frame.func.local_slot(name).is_none() && ctx.get_global(name).is_none() {
                        return new_string_checked(ctx, b"undefined");
                    }
                }
                let v = eval_expr(ctx, frame, operand)?;
                let text = ctx.typeof_str(v);
                new_string_checked(ctx, text.as_bytes())
            }
            UnOp::Neg => {
                let v = eval_expr(ctx, frame, operand)?;
                let x = ctx.to_number(v);
                number_result(ctx, -x)
            }
            UnOp::Pos => {
                let v = eval_expr(ctx, frame, operand)?;
                let x = ctx.to_number(v);
                number_result(ctx, x)
            }
            UnOp::Not => {
                let v = eval_expr(ctx, frame, operand)?;
                Ok(new_bool(!ctx.to_bool(v)))
            }
        },
        Expr::Binary(op, lhs, rhs) => {
            let lv = eval_expr(ctx, frame, lhs)?;
            let mark = ctx.smark();
            let lslot = ctx.spush(lv)?;
            let rv = eval_expr(ctx, frame, rhs)?;
            let rslot = ctx.spush(rv)?;
            let out = binary_op(ctx, *op, lslot, rslot);
            ctx.struncate(mark);
            out
        }
        Expr::Logic(is_and, lhs, rhs) => {
            let lv = eval_expr(ctx, frame, lhs)?;
            let truthy = ctx.to_bool(lv);
            if *is_and == truthy {
                eval_expr(ctx, frame, rhs)
            } else {
                Ok(lv)
            }
        }
        Expr::Cond(cond, then, otherwise) => {
            let c = eval_expr(ctx, frame, cond)?;
            if ctx.to_bool(c) {
                eval_expr(ctx, frame, then)
            } else {
                eval_expr(ctx, frame, otherwise)
            }
        }
        Expr::Assign(target, op, value, line) => {
            set_line(ctx, *line);
            match op {
                None => {
                    let v = eval_expr(ctx, frame, value)?;
                    assign_returning(ctx, frame, target, v)
                }
                Some(op) => {
                    let old = eval_expr(ctx, frame, target)?;
                    let mark = ctx.smark();
                    let lslot = ctx.spush(old)?;
                    let v = eval_expr(ctx, frame, value)?;
                    let rslot = ctx.spush(v)?;
                    let result = binary_op(ctx, *op, lslot, rslot);
                    ctx.struncate(mark);
                    assign_returning(ctx, frame, target, result?)
                }
            }
        }
        Expr::PostIncDec(target, inc, line) => {
            set_line(ctx, *line);
            let old = eval_expr(ctx, frame, target)?;
            let x = ctx.to_number(old);
            let next = if *inc { x + 1.0 } else { x - 1.0 };
            let v = number_result(ctx, next)?;
            assign_returning(ctx, frame, target, v)?;
            number_result(ctx, x)
        }
    }
}

/// Write `v` through an lvalue expression and return the (possibly
/// relocated) assigned value.
fn assign_returning(
    ctx: &mut Context,
    frame: &Frame,
    target: &Expr,
    v: JsValue,
) -> Result<JsValue, Raised> {
    let mark = ctx.smark();
    let vslot = ctx.spush(v)?;
    let result = assign_to_slot(ctx, frame, target, vslot);
    let out = ctx.sget(vslot);
    ctx.struncate(mark);
    result.map(|_| out)
}

fn assign_to_slot(
    ctx: &mut Context,
    frame: &Frame,
    target: &Expr,
    vslot: usize,
) -> Result<(), Raised> {
    match target {
        Expr::Ident(name) => {
            if let Some(slot) = frame.func.local_slot(name) {
                let v = ctx.sget(vslot);
                ctx.sset(frame.base + slot, v);
                Ok(())
            } else if ctx.get_global(name).is_some() || ctx.repl_mode {
                ctx.set_global(name, vslot)
            } else {
                Err(ctx.throw_reference_error(&format!("'{name}' is not defined")))
            }
        }
        Expr::Member(obj_e, name) => {
            let obj = eval_expr(ctx, frame, obj_e)?;
            let mark = ctx.smark();
            let oslot = ctx.spush(obj)?;
            let out = set_member(ctx, oslot, name, vslot);
            ctx.struncate(mark);
            out
        }
        Expr::Index(obj_e, idx_e) => {
            let obj = eval_expr(ctx, frame, obj_e)?;
            let mark = ctx.smark();
            let oslot = ctx.spush(obj)?;
            let idx = eval_expr(ctx, frame, idx_e)?;
            let out = set_index(ctx, oslot, idx, vslot);
            ctx.struncate(mark);
            out
        }
        _ => Err(ctx.throw_type_error("invalid assignment target")),
    }
}

fn get_member(ctx: &mut Context, obj: JsValue, name: &str) -> Result<JsValue, Raised> {
    if is_undefined(obj) || is_null(obj) {
        let kind = if is_undefined(obj) { "undefined" } else { "null" };
        return Err(ctx.throw_type_error(&format!("cannot read property '{name}' of {kind}")));
    }
    if ctx.is_array(obj) {
        return Ok(match name {
            "length" => new_short_int(ctx.array_len(obj).unwrap_or(0) as i32),
            "push" => new_native_func(NF_ARRAY_PUSH),
            "join" => new_native_func(NF_ARRAY_JOIN),
            _ => JS_UNDEFINED,
        });
    }
    if let Some(text) = ctx.str_bytes(obj) {
        return Ok(match name {
            "length" => new_short_int(text.chars().count() as i32),
            _ => JS_UNDEFINED,
        });
    }
    if let Some(v) = ctx.get_prop(obj, name) {
        return Ok(v);
    }
    Ok(JS_UNDEFINED)
}

fn array_index(ctx: &Context, idx: JsValue) -> Option<usize> {
    if !ctx.is_number(idx) {
        return None;
    }
    let x = ctx.to_number(idx);
    if x.trunc() != x || x < 0.0 || x > i32::MAX as f64 {
        return None;
    }
    Some(x as usize)
}

fn get_index(ctx: &mut Context, obj: JsValue, idx: JsValue) -> Result<JsValue, Raised> {
    if ctx.is_array(obj) {
        if let Some(i) = array_index(ctx, idx) {
            return Ok(ctx.array_get(obj, i).unwrap_or(JS_UNDEFINED));
        }
    }
    let key = ctx.to_rust_string(idx);
    get_member(ctx, obj, &key)
}

fn set_member(ctx: &mut Context, oslot: usize, name: &str, vslot: usize) -> Result<(), Raised> {
    let obj = ctx.sget(oslot);
    if ctx.is_array(obj) {
        if name == "length" {
            let x = ctx.to_number(ctx.sget(vslot));
            if x.trunc() != x || x < 0.0 || x > i32::MAX as f64 {
                return Err(ctx.throw_range_error("invalid array length"));
            }
            return ctx.array_set_length(oslot, x as usize);
        }
        return Err(ctx.throw_type_error("cannot set property on an array"));
    }
    if ctx.class_of(obj).is_some() {
        return ctx.set_prop(oslot, name, vslot);
    }
    Err(ctx.throw_type_error(&format!("cannot set property '{name}'")))
}

fn set_index(ctx: &mut Context, oslot: usize, idx: JsValue, vslot: usize) -> Result<(), Raised> {
    let obj = ctx.sget(oslot);
    if ctx.is_array(obj) {
        let Some(i) = array_index(ctx, idx) else {
            return Err(ctx.throw_range_error("invalid array index"));
        };
        return ctx.array_set(oslot, i, vslot);
    }
    if ctx.class_of(obj).is_some() {
        let key = ctx.to_rust_string(idx);
        return ctx.set_prop(oslot, &key, vslot);
    }
    Err(ctx.throw_type_error("cannot set indexed property"))
}

fn binary_op(ctx: &mut Context, op: BinOp, lslot: usize, rslot: usize) -> Result<JsValue, Raised> {
    match op {
        BinOp::Add => {
            let l = ctx.sget(lslot);
            let r = ctx.sget(rslot);
            if ctx.is_string(l) || ctx.is_string(r) {
                let mut text = ctx.to_rust_string(l);
                text.push_str(&ctx.to_rust_string(r));
                return new_string_checked(ctx, text.as_bytes());
            }
            let x = ctx.to_number(l);
            let y = ctx.to_number(r);
            number_result(ctx, x + y)
        }
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let x = ctx.to_number(ctx.sget(lslot));
            let y = ctx.to_number(ctx.sget(rslot));
            let out = match op {
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div => x / y,
                _ => x % y,
            };
            number_result(ctx, out)
        }
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let l = ctx.sget(lslot);
            let r = ctx.sget(rslot);
            let ord = ctx.compare_values(l, r);
            let out = match (op, ord) {
                (_, None) => false,
                (BinOp::Lt, Some(o)) => o == core::cmp::Ordering::Less,
                (BinOp::LtEq, Some(o)) => o != core::cmp::Ordering::Greater,
                (BinOp::Gt, Some(o)) => o == core::cmp::Ordering::Greater,
                (BinOp::GtEq, Some(o)) => o != core::cmp::Ordering::Less,
                _ => false,
            };
            Ok(new_bool(out))
        }
        BinOp::EqEq => {
            let out = ctx.loose_equals(ctx.sget(lslot), ctx.sget(rslot));
            Ok(new_bool(out))
        }
        BinOp::NotEq => {
            let out = !ctx.loose_equals(ctx.sget(lslot), ctx.sget(rslot));
            Ok(new_bool(out))
        }
        BinOp::StrictEq => {
            let out = ctx.strict_equals(ctx.sget(lslot), ctx.sget(rslot));
            Ok(new_bool(out))
        }
        BinOp::StrictNotEq => {
            let out = !ctx.strict_equals(ctx.sget(lslot), ctx.sget(rslot));
            Ok(new_bool(out))
        }
    }
}

fn eval_call(
    ctx: &mut Context,
    frame: &Frame,
    callee: &Expr,
    args: &[Expr],
    line: u32,
    is_new: bool,
) -> Result<JsValue, Raised> {
    set_line(ctx, line);
    let mark = ctx.smark();
    let out = eval_call_inner(ctx, frame, callee, args, line, is_new);
    ctx.struncate(mark);
    out
}

fn eval_call_inner(
    ctx: &mut Context,
    frame: &Frame,
    callee: &Expr,
    args: &[Expr],
    line: u32,
    is_new: bool,
) -> Result<JsValue, Raised> {
    let (fslot, this_slot) = match callee {
        Expr::Member(obj_e, name) => {
            let obj = eval_expr(ctx, frame, obj_e)?;
            let oslot = ctx.spush(obj)?;
            let obj = ctx.sget(oslot);
            let f = get_member(ctx, obj, name)?;
            let fslot = ctx.spush(f)?;
            (fslot, Some(oslot))
        }
        Expr::Index(obj_e, idx_e) => {
            let obj = eval_expr(ctx, frame, obj_e)?;
            let oslot = ctx.spush(obj)?;
            let idx = eval_expr(ctx, frame, idx_e)?;
            let f = {
                let obj = ctx.sget(oslot);
                get_index(ctx, obj, idx)?
            };
            let fslot = ctx.spush(f)?;
            (fslot, Some(oslot))
        }
        _ => {
            let f = eval_expr(ctx, frame, callee)?;
            let fslot = ctx.spush(f)?;
            (fslot, None)
        }
    };
    let args_base = ctx.smark();
    for arg in args {
        let v = eval_expr(ctx, frame, arg)?;
        ctx.spush(v)?;
    }
    call_value(ctx, fslot, this_slot, args_base, args.len(), line, is_new)
}

fn call_value(
    ctx: &mut Context,
    fslot: usize,
    this_slot: Option<usize>,
    args_base: usize,
    argc: usize,
    line: u32,
    is_new: bool,
) -> Result<JsValue, Raised> {
    if ctx.call_depth >= MAX_CALL_DEPTH {
        return Err(ctx.throw_range_error("stack overflow"));
    }
    let fval = ctx.sget(fslot);
    if let Some(idx) = native_func_idx(fval) {
        let Some(def) = ctx.stdlib.funcs.get(idx as usize) else {
            return Err(ctx.throw_type_error("not a function"));
        };
        let func = def.func;
        let magic = def.magic;
        ctx.call_depth += 1;
        ctx.backtrace.push(BtFrame {
            func_name: def.name.to_string(),
            line,
        });
        let args = NativeArgs {
            base: args_base,
            count: argc,
        };
        let out = func(ctx, this_slot, &args, magic);
        ctx.backtrace.pop();
        ctx.call_depth -= 1;
        return out;
    }
    if let Some(func_idx) = ctx.function_index(fval) {
        let Some(func) = ctx.functions.get(func_idx).cloned() else {
            return Err(ctx.throw_internal_error("missing function"));
        };
        ctx.call_depth += 1;
        let mark = ctx.smark();
        let out = call_function(ctx, func, mark, args_base, argc, line);
        ctx.struncate(mark);
        ctx.call_depth -= 1;
        return out;
    }
    if is_new {
        Err(ctx.throw_type_error("not a constructor"))
    } else {
        Err(ctx.throw_type_error("not a function"))
    }
}

fn call_function(
    ctx: &mut Context,
    func: Rc<FuncDef>,
    base: usize,
    args_base: usize,
    argc: usize,
    line: u32,
) -> Result<JsValue, Raised> {
    for i in 0..func.params.len() {
        let v = if i < argc {
            ctx.sget(args_base + i)
        } else {
            JS_UNDEFINED
        };
        ctx.spush(v)?;
    }
    let arguments_slot = ctx.spush(JS_UNDEFINED)?;
    let arr = match ctx.new_array_value() {
        Some(a) => a,
        None => return Err(ctx.throw_out_of_memory()),
    };
    ctx.sset(arguments_slot, arr);
    for i in 0..argc {
        ctx.array_push(arguments_slot, args_base + i)?;
    }
    for _ in 0..func.vars.len() {
        ctx.spush(JS_UNDEFINED)?;
    }
    let ret_slot = ctx.spush(JS_UNDEFINED)?;
    let func_name = if func.name.is_empty() {
        String::from("<anonymous>")
    } else {
        func.name.clone()
    };
    ctx.backtrace.push(BtFrame {
        func_name,
        line,
    });
    let frame = Frame {
        func,
        base,
        ret_slot,
        completion_slot: None,
    };
    let result = exec_body(ctx, &frame);
    ctx.backtrace.pop();
    result.map(|_| ctx.sget(ret_slot))
}
