//! Host bridge: console buffers and script argument exposure.
//!
//! `install` evaluates a fixed init snippet inside the context. The snippet
//! creates two ordered line buffers in the engine's own object graph (so
//! they survive across evaluations), a `console` whose informational calls
//! (`log`, `info`) append to one and whose diagnostic calls (`warn`,
//! `error`, `debug`) append to the other, and a read-only-by-convention
//! `scriptArgs` array. Logging joins the string forms of its arguments with
//! single spaces.
//!
//! `flush` drains one buffer: all lines are removed atomically, joined with
//! newlines, and returned (`None` when the buffer was empty). The host
//! writes the block verbatim plus one trailing newline.
//!
//! Arguments are marshaled by splicing a JSON array literal into the init
//! snippet, escaping only quotes and backslashes (the minimal subset JSON
//! itself needs), so the bridge carries no general-purpose encoder.

use crate::api::{eval_with_filename, EvalFlags};
use crate::context::Context;
use crate::value::{is_exception, is_undefined};

/// Logical filename the bridge snippets evaluate under.
const BRIDGE_FILENAME: &str = "<bridge>";

const INIT_TEMPLATE: &str = r#"
var __console_out = [];
var __console_err = [];
function __console_write(buf, args) {
    var parts = [];
    var i = 0;
    while (i < args.length) {
        parts.push(String(args[i]));
        i = i + 1;
    }
    buf.push(parts.join(" "));
}
function __console_log() { __console_write(__console_out, arguments); }
function __console_error() { __console_write(__console_err, arguments); }
function __console_drain_out() {
    if (__console_out.length === 0) return;
    var text = __console_out.join("\n");
    __console_out = [];
    return text;
}
function __console_drain_err() {
    if (__console_err.length === 0) return;
    var text = __console_err.join("\n");
    __console_err = [];
    return text;
}
var console = {
    log: __console_log,
    info: __console_log,
    warn: __console_error,
    error: __console_error,
    debug: __console_error
};
var scriptArgs = @ARGS@;
"#;

/// Host output channel a buffer drains to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Channel {
    /// Informational output (`console.log`, `console.info`).
    Out,
    /// Diagnostic output (`console.warn`, `console.error`, `console.debug`).
    Err,
}

/// Bridge installation failed: the init snippet raised. This indicates a
/// corrupted context (for example, out of memory during initialization).
#[derive(Clone, Debug)]
pub struct BridgeError(pub String);

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "bridge init failed: {}", self.0)
    }
}

/// Evaluate the init snippet with `args` spliced in as `scriptArgs`.
pub fn install(ctx: &mut Context, args: &[String]) -> Result<(), BridgeError> {
    let mut literal = String::from("[");
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            literal.push_str(", ");
        }
        json_escape_into(arg, &mut literal);
    }
    literal.push(']');
    let source = INIT_TEMPLATE.replace("@ARGS@", &literal);
    let v = eval_with_filename(ctx, source.as_bytes(), BRIDGE_FILENAME, EvalFlags::empty());
    if is_exception(v) {
        let err = ctx.take_exception();
        return Err(BridgeError(ctx.error_message(err)));
    }
    Ok(())
}

/// Drain one channel's buffered lines: removed atomically, joined with
/// newlines. `None` when nothing was buffered; flushing an empty buffer is
/// idempotent and never raises.
pub fn flush(ctx: &mut Context, channel: Channel) -> Option<String> {
    let source: &[u8] = match channel {
        Channel::Out => b"__console_drain_out()",
        Channel::Err => b"__console_drain_err()",
    };
    let v = eval_with_filename(ctx, source, BRIDGE_FILENAME, EvalFlags::RETVAL);
    if is_exception(v) {
        // Flushing an uninstalled bridge has nothing to report.
        let _ = ctx.take_exception();
        return None;
    }
    if is_undefined(v) {
        return None;
    }
    Some(ctx.to_rust_string(v))
}

/// Append `text` as a JSON string literal, escaping only quotes and
/// backslashes.
fn json_escape_into(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::eval;
    use crate::context::{Context, ContextConfig};
    use crate::stdlib::STDLIB;
    use crate::value::is_exception;

    fn new_context() -> Context {
        let mut ctx = Context::new(ContextConfig {
            memory_size: 256 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init");
        install(&mut ctx, &[]).expect("bridge install");
        ctx
    }

    #[test]
    fn console_log_joins_with_spaces() {
        let mut ctx = new_context();
        let v = eval(&mut ctx, b"console.log(\"Hello\", \"World\")", EvalFlags::empty());
        assert!(!is_exception(v));
        assert_eq!(flush(&mut ctx, Channel::Out).as_deref(), Some("Hello World"));
        assert_eq!(flush(&mut ctx, Channel::Err), None);
    }

    #[test]
    fn channels_are_separate_and_ordered() {
        let mut ctx = new_context();
        let v = eval(
            &mut ctx,
            b"console.log(1); console.warn(\"w\"); console.info(2); console.error(\"e\");",
            EvalFlags::empty(),
        );
        assert!(!is_exception(v));
        assert_eq!(flush(&mut ctx, Channel::Out).as_deref(), Some("1\n2"));
        assert_eq!(flush(&mut ctx, Channel::Err).as_deref(), Some("w\ne"));
    }

    #[test]
    fn log_formats_values_like_string_conversion() {
        let mut ctx = new_context();
        let v = eval(
            &mut ctx,
            b"console.log(\"x\", 1.5, true, null, undefined, [1, 2])",
            EvalFlags::empty(),
        );
        assert!(!is_exception(v));
        assert_eq!(
            flush(&mut ctx, Channel::Out).as_deref(),
            Some("x 1.5 true null undefined 1,2")
        );
    }

    #[test]
    fn flush_is_idempotent_on_empty_buffers() {
        let mut ctx = new_context();
        assert_eq!(flush(&mut ctx, Channel::Out), None);
        assert_eq!(flush(&mut ctx, Channel::Out), None);
        assert!(!ctx.exception_pending());
        // Buffers drain fully: a flush after a flush is empty again.
        let _ = eval(&mut ctx, b"console.log(\"once\")", EvalFlags::empty());
        assert_eq!(flush(&mut ctx, Channel::Out).as_deref(), Some("once"));
        assert_eq!(flush(&mut ctx, Channel::Out), None);
    }

    #[test]
    fn script_args_are_exposed_in_order() {
        let mut ctx = Context::new(ContextConfig {
            memory_size: 256 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init");
        let args = vec![
            String::from("-i"),
            String::from("--verbose"),
            String::from("hello"),
        ];
        install(&mut ctx, &args).expect("bridge install");
        let v = eval(&mut ctx, b"scriptArgs.length", EvalFlags::RETVAL);
        assert_eq!(crate::value::get_int(v), 3);
        let v = eval(&mut ctx, b"scriptArgs.join(\" \")", EvalFlags::RETVAL);
        assert_eq!(ctx.str_bytes(v), Some("-i --verbose hello"));
    }

    #[test]
    fn args_with_quotes_and_backslashes_survive_splicing() {
        let mut ctx = Context::new(ContextConfig {
            memory_size: 256 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init");
        let args = vec![String::from("say \"hi\""), String::from("back\\slash")];
        install(&mut ctx, &args).expect("bridge install");
        let v = eval(&mut ctx, b"scriptArgs[0]", EvalFlags::RETVAL);
        assert_eq!(ctx.str_bytes(v), Some("say \"hi\""));
        let v = eval(&mut ctx, b"scriptArgs[1]", EvalFlags::RETVAL);
        assert_eq!(ctx.str_bytes(v), Some("back\\slash"));
    }

    #[test]
    fn buffers_survive_between_evaluations_until_flushed() {
        let mut ctx = new_context();
        let _ = eval(&mut ctx, b"console.log(\"first\")", EvalFlags::empty());
        let _ = eval(&mut ctx, b"console.log(\"second\")", EvalFlags::empty());
        assert_eq!(
            flush(&mut ctx, Channel::Out).as_deref(),
            Some("first\nsecond")
        );
    }
}
