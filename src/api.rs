//! The evaluation boundary.
//!
//! `eval_with_filename` turns a byte buffer plus a logical filename into
//! either a result value or the `JS_EXCEPTION` marker with the error object
//! pending on the context. Callers check the marker, and on exception must
//! `Context::take_exception` before issuing another evaluation.
//!
//! One evaluation is a single blocking call: Ready → Parsing → Running →
//! Completed or Raised. The only suspension point is the context's
//! periodic interrupt handler, which may request an abort but must not
//! evaluate more script (the boundary is not reentrant).

use crate::context::Context;
use crate::conversion::number_result;
use crate::exception::{ClassId, Raised};
use crate::interpreter;
use crate::parser::json::{parse_json, JsonValue};
use crate::parser::{parse_program, ParseError};
use crate::value::{is_exception, JsValue, JS_EXCEPTION, JS_NULL};
use bitflags::bitflags;
use std::rc::Rc;

bitflags! {
    /// Evaluation options.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct EvalFlags: u32 {
        /// Return the completion value (the last top-level expression
        /// statement) instead of discarding it.
        const RETVAL = 1 << 0;
        /// REPL-style laxity: assignment to an undeclared name declares a
        /// global instead of raising a ReferenceError.
        const REPL = 1 << 1;
        /// Drop column information from syntax-error locations.
        const STRIP_COL = 1 << 2;
        /// Parse the source as a single JSON value; nothing executes.
        const JSON = 1 << 3;
    }
}

/// Evaluate with the default logical filename.
pub fn eval(ctx: &mut Context, source: &[u8], flags: EvalFlags) -> JsValue {
    eval_with_filename(ctx, source, "<input>", flags)
}

/// Evaluate `source` under `filename`. Returns the completion value or
/// `JS_EXCEPTION` with the error pending. Tolerates arbitrary byte
/// content: parse failures travel the same exception pathway as runtime
/// failures.
pub fn eval_with_filename(
    ctx: &mut Context,
    source: &[u8],
    filename: &str,
    flags: EvalFlags,
) -> JsValue {
    debug_assert!(
        !ctx.exception_pending(),
        "evaluation with a pending exception is undefined; take_exception first"
    );
    ctx.filename = filename.to_string();
    if flags.contains(EvalFlags::JSON) {
        return match parse_json(source) {
            Ok(tree) => match build_json_value(ctx, &tree) {
                Ok(v) => v,
                Err(Raised) => JS_EXCEPTION,
            },
            Err(err) => {
                throw_parse_error(ctx, &err, filename, flags);
                JS_EXCEPTION
            }
        };
    }
    let text = match core::str::from_utf8(source) {
        Ok(text) => text,
        Err(_) => {
            let _ = ctx.throw_syntax_error("source is not valid UTF-8");
            return JS_EXCEPTION;
        }
    };
    let output = match parse_program(text, ctx.functions.len()) {
        Ok(output) => output,
        Err(err) => {
            throw_parse_error(ctx, &err, filename, flags);
            return JS_EXCEPTION;
        }
    };
    let main = output.main;
    ctx.functions.extend(output.funcs.into_iter().map(Rc::new));
    ctx.repl_mode = flags.contains(EvalFlags::REPL);
    match interpreter::run_program(ctx, main, flags.contains(EvalFlags::RETVAL)) {
        Ok(v) => v,
        Err(Raised) => JS_EXCEPTION,
    }
}

/// Pending SyntaxError with the parse location attached as its stack.
fn throw_parse_error(ctx: &mut Context, err: &ParseError, filename: &str, flags: EvalFlags) {
    let _ = ctx.throw_error(ClassId::SyntaxError, err.message());
    let location = if flags.contains(EvalFlags::STRIP_COL) {
        format!("    at {}:{}\n", filename, err.line() + 1)
    } else {
        format!("    at {}:{}:{}\n", filename, err.line() + 1, err.column() + 1)
    };
    let exc = ctx.current_exception();
    if !ctx.is_error(exc) {
        return;
    }
    let mark = ctx.smark();
    if let Ok(exc_slot) = ctx.spush(exc) {
        if let Some(loc_val) = ctx.new_string_value(location.as_bytes()) {
            if let Ok(loc_slot) = ctx.spush(loc_val) {
                let _ = ctx.set_prop(exc_slot, "stack", loc_slot);
            }
        }
        let exc = ctx.sget(exc_slot);
        ctx.set_pending_exception(exc);
    }
    ctx.struncate(mark);
}

fn build_json_value(ctx: &mut Context, tree: &JsonValue) -> Result<JsValue, Raised> {
    match tree {
        JsonValue::Null => Ok(JS_NULL),
        JsonValue::Bool(b) => Ok(crate::value::new_bool(*b)),
        JsonValue::Number(n) => number_result(ctx, *n),
        JsonValue::String(s) => match ctx.new_string_value(s.as_bytes()) {
            Some(v) => Ok(v),
            None => Err(ctx.throw_out_of_memory()),
        },
        JsonValue::Array(items) => {
            let arr = match ctx.new_array_value() {
                Some(a) => a,
                None => return Err(ctx.throw_out_of_memory()),
            };
            let mark = ctx.smark();
            let arr_slot = ctx.spush(arr)?;
            for item in items {
                let v = build_json_value(ctx, item)?;
                let vslot = ctx.spush(v)?;
                ctx.array_push(arr_slot, vslot)?;
                ctx.struncate(arr_slot + 1);
            }
            let out = ctx.sget(arr_slot);
            ctx.struncate(mark);
            Ok(out)
        }
        JsonValue::Object(props) => {
            let obj = match ctx.new_object_value(ClassId::Object) {
                Some(o) => o,
                None => return Err(ctx.throw_out_of_memory()),
            };
            let mark = ctx.smark();
            let obj_slot = ctx.spush(obj)?;
            for (key, value) in props {
                let v = build_json_value(ctx, value)?;
                let vslot = ctx.spush(v)?;
                ctx.set_prop(obj_slot, key, vslot)?;
                ctx.struncate(obj_slot + 1);
            }
            let out = ctx.sget(obj_slot);
            ctx.struncate(mark);
            Ok(out)
        }
    }
}

/// Convenience check mirroring the marker value.
pub fn value_is_exception(v: JsValue) -> bool {
    is_exception(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use crate::stdlib::STDLIB;
    use crate::value::{get_int, is_int, is_undefined};

    fn new_context() -> Context {
        Context::new(ContextConfig {
            memory_size: 256 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init")
    }

    #[test]
    fn addition_completion_value() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"2 + 3", EvalFlags::RETVAL);
        assert!(is_int(v));
        assert_eq!(get_int(v), 5);
    }

    #[test]
    fn completion_discarded_without_retval() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"2 + 3", EvalFlags::empty());
        assert!(is_undefined(v));
    }

    #[test]
    fn runtime_throw_surfaces_as_exception() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"throw new Error(\"boom\")", EvalFlags::empty());
        assert!(is_exception(v));
        assert!(ctx.exception_pending());
        let err = ctx.take_exception();
        assert_eq!(ctx.class_of(err), Some(ClassId::Error));
        assert_eq!(
            ctx.get_prop(err, "message").and_then(|m| ctx.str_bytes(m)),
            Some("boom")
        );
        assert!(ctx.error_stack(err).is_some());
    }

    #[test]
    fn parse_error_becomes_syntax_error() {
        let mut ctx = new_context();
        let v = eval_with_filename(&mut ctx, b"var = ;", "bad.js", EvalFlags::empty());
        assert!(is_exception(v));
        let err = ctx.take_exception();
        assert_eq!(ctx.class_of(err), Some(ClassId::SyntaxError));
        let stack = ctx.error_stack(err).expect("stack");
        assert!(stack.contains("bad.js:1:"), "stack was {stack:?}");
    }

    #[test]
    fn strip_col_drops_column_from_location() {
        let mut ctx = new_context();
        let v = eval_with_filename(&mut ctx, b"var = ;", "bad.js", EvalFlags::STRIP_COL);
        assert!(is_exception(v));
        let err = ctx.take_exception();
        let stack = ctx.error_stack(err).expect("stack");
        assert!(stack.trim_end().ends_with("bad.js:1"), "stack was {stack:?}");
    }

    #[test]
    fn arbitrary_bytes_do_not_abort() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, &[0xff, 0xfe, 0x00, 0x41], EvalFlags::empty());
        assert!(is_exception(v));
        let err = ctx.take_exception();
        assert_eq!(ctx.class_of(err), Some(ClassId::SyntaxError));
    }

    #[test]
    fn repl_flag_allows_implicit_globals() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"x = 41; x + 1", EvalFlags::RETVAL | EvalFlags::REPL);
        assert!(is_int(v));
        assert_eq!(get_int(v), 42);

        let v = eval(&mut ctx, b"y = 1;", EvalFlags::empty());
        assert!(is_exception(v));
        let err = ctx.take_exception();
        assert_eq!(ctx.class_of(err), Some(ClassId::ReferenceError));
    }

    #[test]
    fn json_mode_builds_values_without_executing() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"{\"a\": [1, 2.5, \"x\"], \"b\": null}", EvalFlags::JSON);
        assert!(ctx.is_object(v));
        let a = ctx.get_prop(v, "a").expect("a");
        assert_eq!(ctx.array_len(a), Some(3));
        assert_eq!(ctx.array_get(a, 0), Some(crate::value::new_short_int(1)));
        let b = ctx.get_prop(v, "b").expect("b");
        assert!(crate::value::is_null(b));

        let v = eval(&mut ctx, b"2 +", EvalFlags::JSON);
        assert!(is_exception(v));
        let _ = ctx.take_exception();
    }

    #[test]
    fn globals_persist_across_evaluations() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"var counter = 1;", EvalFlags::empty());
        assert!(!is_exception(v));
        let v = eval(&mut ctx, b"counter += 41; counter", EvalFlags::RETVAL);
        assert!(is_int(v));
        assert_eq!(get_int(v), 42);
    }

    #[test]
    fn functions_and_control_flow_run() {
        let mut ctx = new_context();
        let src = br#"
            function fib(n) {
                if (n < 2) { return n; }
                return fib(n - 1) + fib(n - 2);
            }
            fib(10)
        "#;
        let v = eval(&mut ctx, src, EvalFlags::RETVAL);
        assert!(is_int(v), "got {v:?}");
        assert_eq!(get_int(v), 55);
    }

    #[test]
    fn arguments_object_and_varargs() {
        let mut ctx = new_context();
        let src = br#"
            function total() {
                var sum = 0;
                var i = 0;
                while (i < arguments.length) {
                    sum += arguments[i];
                    i++;
                }
                return sum;
            }
            total(1, 2, 3, 4)
        "#;
        let v = eval(&mut ctx, src, EvalFlags::RETVAL);
        assert!(is_int(v), "got {v:?}");
        assert_eq!(get_int(v), 10);
    }

    #[test]
    fn interrupt_handler_aborts_loops() {
        let mut ctx = new_context();
        ctx.set_interrupt_handler(|| true);
        let v = eval(&mut ctx, b"while (true) { 1; }", EvalFlags::empty());
        assert!(is_exception(v));
        let err = ctx.take_exception();
        assert_eq!(ctx.class_of(err), Some(ClassId::InternalError));
        assert_eq!(ctx.error_message(err), "InternalError: interrupted");
    }

    #[test]
    fn deep_recursion_raises_instead_of_crashing() {
        let mut ctx = new_context();
        let v = eval(
            &mut ctx,
            b"function down(n) { return down(n + 1); } down(0)",
            EvalFlags::RETVAL,
        );
        assert!(is_exception(v));
        let err = ctx.take_exception();
        assert_eq!(ctx.class_of(err), Some(ClassId::RangeError));
    }

    #[test]
    fn backtrace_names_functions_and_lines() {
        let mut ctx = new_context();
        let src = b"function inner() { throw new Error(\"deep\"); }\nfunction outer() { inner(); }\nouter();";
        let v = eval_with_filename(&mut ctx, src, "trace.js", EvalFlags::empty());
        assert!(is_exception(v));
        let err = ctx.take_exception();
        let stack = ctx.error_stack(err).expect("stack");
        assert!(stack.contains("inner (trace.js:1)"), "stack was {stack:?}");
        assert!(stack.contains("outer (trace.js:2)"), "stack was {stack:?}");
        assert!(stack.contains("trace.js:3"), "stack was {stack:?}");
    }
}
