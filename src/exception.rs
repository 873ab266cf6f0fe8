//! Error classes, throw helpers and the pending-exception protocol.
//!
//! Script-level failures never abort the host: they set the context's
//! pending exception and unwind with `Raised`. The public boundary maps
//! `Raised` to the `JS_EXCEPTION` marker value; hosts retrieve the error
//! object with `Context::take_exception`, which clears the pending state.
//!
//! At most one exception is pending per context. Evaluating more code while
//! one is pending is a contract violation (debug-asserted at the boundary).

use crate::context::Context;
use crate::value::{JsValue, JS_NULL};

/// Marker for "an exception is now pending in the context". Functions
/// returning `Result<_, Raised>` have already recorded the error object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Raised;

/// Object class ids, stored in the object cell header.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClassId {
    Object = 0,
    Error = 1,
    TypeError = 2,
    RangeError = 3,
    ReferenceError = 4,
    SyntaxError = 5,
    InternalError = 6,
}

impl ClassId {
    pub(crate) fn from_aux(aux: usize) -> Self {
        match aux {
            1 => ClassId::Error,
            2 => ClassId::TypeError,
            3 => ClassId::RangeError,
            4 => ClassId::ReferenceError,
            5 => ClassId::SyntaxError,
            6 => ClassId::InternalError,
            _ => ClassId::Object,
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, ClassId::Object)
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassId::Object => "Object",
            ClassId::Error => "Error",
            ClassId::TypeError => "TypeError",
            ClassId::RangeError => "RangeError",
            ClassId::ReferenceError => "ReferenceError",
            ClassId::SyntaxError => "SyntaxError",
            ClassId::InternalError => "InternalError",
        }
    }
}

impl Context {
    /// Record `value` as the pending exception.
    pub(crate) fn throw(&mut self, value: JsValue) -> Raised {
        self.set_pending_exception(value);
        Raised
    }

    /// Build an error object of `class` with `message` and a captured
    /// backtrace. Returns `None` only when the arena cannot hold it.
    pub(crate) fn build_error(&mut self, class: ClassId, message: &str) -> Option<JsValue> {
        let stack = self.backtrace_string();
        let err = self.new_object_value_with(class, true)?;
        let mark = self.smark();
        let err_slot = match self.spush(err) {
            Ok(slot) => slot,
            Err(Raised) => return None,
        };
        // Under memory pressure a property may fail to attach; the bare
        // error object still describes the failure class. A secondary
        // exception raised while attaching must not leak past this builder.
        let attached = self.set_error_prop(err_slot, "message", message)
            && self.set_error_prop(err_slot, "stack", &stack);
        if !attached && self.exception_pending() {
            let _ = self.take_exception();
        }
        let err = self.sget(err_slot);
        self.struncate(mark);
        Some(err)
    }

    fn set_error_prop(&mut self, err_slot: usize, key: &str, text: &str) -> bool {
        let Some(text_val) = self.new_string_value(text.as_bytes()) else {
            return false;
        };
        let mark = self.smark();
        let Ok(text_slot) = self.spush(text_val) else {
            return false;
        };
        let ok = self.set_prop(err_slot, key, text_slot).is_ok();
        self.struncate(mark);
        ok
    }

    /// Throw a fresh error of `class`. Clears nothing: the caller must be
    /// exception-free (the evaluation boundary enforces this).
    pub(crate) fn throw_error(&mut self, class: ClassId, message: &str) -> Raised {
        // A failure while describing an earlier failure must not recurse
        // into another description attempt; the null exception stands in
        // for "out of memory".
        if self.building_error {
            return self.throw(JS_NULL);
        }
        self.building_error = true;
        let out = match self.build_error(class, message) {
            Some(err) => self.throw(err),
            None => self.throw(JS_NULL),
        };
        self.building_error = false;
        out
    }

    pub(crate) fn throw_type_error(&mut self, message: &str) -> Raised {
        self.throw_error(ClassId::TypeError, message)
    }

    pub(crate) fn throw_range_error(&mut self, message: &str) -> Raised {
        self.throw_error(ClassId::RangeError, message)
    }

    pub(crate) fn throw_reference_error(&mut self, message: &str) -> Raised {
        self.throw_error(ClassId::ReferenceError, message)
    }

    pub(crate) fn throw_syntax_error(&mut self, message: &str) -> Raised {
        self.throw_error(ClassId::SyntaxError, message)
    }

    pub(crate) fn throw_internal_error(&mut self, message: &str) -> Raised {
        self.throw_error(ClassId::InternalError, message)
    }

    pub(crate) fn throw_out_of_memory(&mut self) -> Raised {
        self.throw_error(ClassId::InternalError, "out of memory")
    }

    /// `    at name (file:line)` lines for the current interpreter frames,
    /// innermost first. The program frame has no name and prints bare.
    pub(crate) fn backtrace_string(&self) -> String {
        let mut out = String::new();
        for frame in self.backtrace.iter().rev() {
            if frame.func_name.is_empty() {
                out.push_str(&format!(
                    "    at {}:{}\n",
                    self.filename,
                    frame.line + 1
                ));
            } else {
                out.push_str(&format!(
                    "    at {} ({}:{})\n",
                    frame.func_name,
                    self.filename,
                    frame.line + 1
                ));
            }
        }
        out
    }

    /// Single-line description of an error value: `Error: message`. Works
    /// on any value so hosts can report `throw "text"` too.
    pub fn error_message(&self, err: JsValue) -> String {
        if err == JS_NULL && !self.is_error(err) {
            return String::from("InternalError: out of memory");
        }
        if let Some(class) = self.class_of(err) {
            if class.is_error() {
                let message = self
                    .get_prop(err, "message")
                    .and_then(|m| self.str_bytes(m).map(str::to_owned))
                    .unwrap_or_default();
                if message.is_empty() {
                    return class.name().to_string();
                }
                return format!("{}: {}", class.name(), message);
            }
        }
        match self.str_bytes(err) {
            Some(text) => text.to_owned(),
            None => String::from("Error"),
        }
    }

    /// The captured `stack` property of an error object, if present and
    /// non-empty.
    pub fn error_stack(&self, err: JsValue) -> Option<String> {
        let stack = self.get_prop(err, "stack")?;
        let text = self.str_bytes(stack)?;
        if text.is_empty() {
            None
        } else {
            Some(text.to_owned())
        }
    }
}
