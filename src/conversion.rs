//! Host and script value conversions.
//!
//! Numeric ladder for host integers, mirroring script numeric coercion:
//! values in the i32 range stay inline, anything further out that still
//! fits the 63-bit signed range becomes a boxed wide integer, and the rest
//! falls back to a boxed float64. Conversion failures (the arena is full)
//! surface as a pending engine exception and `JS_EXCEPTION`, never as a
//! host abort.
//!
//! String extraction is a borrow (`Context::str_bytes`); `to_rust_string`
//! is the copying form for anything that must survive an allocation.

use crate::context::Context;
use crate::exception::Raised;
use crate::heap::BlockTag;
use crate::value::{
    get_bool, get_int, heap_offset, is_bool, is_int, is_null, is_undefined, native_func_idx,
    new_bool, new_short_int, JsValue, JS_EXCEPTION,
};

const INT64_BOX_MIN: i64 = -(1 << 62);
const INT64_BOX_MAX: i64 = (1 << 62) - 1;

/// Depth cap for stringifying nested arrays; cyclic structures print as
/// empty past it.
const MAX_TO_STRING_DEPTH: u32 = 8;

impl Context {
    // ---- host-to-engine constructors ----

    pub fn new_int32(&mut self, v: i32) -> JsValue {
        new_short_int(v)
    }

    pub fn new_uint32(&mut self, v: u32) -> JsValue {
        if v <= i32::MAX as u32 {
            new_short_int(v as i32)
        } else {
            self.new_int64(v as i64)
        }
    }

    pub fn new_int64(&mut self, v: i64) -> JsValue {
        if (i32::MIN as i64..=i32::MAX as i64).contains(&v) {
            return new_short_int(v as i32);
        }
        if (INT64_BOX_MIN..=INT64_BOX_MAX).contains(&v) {
            return match self.new_int64_value(v) {
                Some(val) => val,
                None => {
                    let _ = self.throw_out_of_memory();
                    JS_EXCEPTION
                }
            };
        }
        self.new_float64(v as f64)
    }

    pub fn new_float64(&mut self, v: f64) -> JsValue {
        let as_int = v as i32;
        if as_int as f64 == v && !(v == 0.0 && v.is_sign_negative()) {
            return new_short_int(as_int);
        }
        match self.new_float_value(v) {
            Some(val) => val,
            None => {
                let _ = self.throw_out_of_memory();
                JS_EXCEPTION
            }
        }
    }

    pub fn new_bool(&mut self, v: bool) -> JsValue {
        new_bool(v)
    }

    pub fn new_string(&mut self, s: &str) -> JsValue {
        match self.new_string_value(s.as_bytes()) {
            Some(val) => val,
            None => {
                let _ = self.throw_out_of_memory();
                JS_EXCEPTION
            }
        }
    }

    // ---- engine-to-host reads ----

    /// Script numeric coercion. Total: non-numbers coerce through the
    /// usual table (strings parse, objects are NaN).
    pub fn to_number(&self, v: JsValue) -> f64 {
        if is_int(v) {
            return get_int(v) as f64;
        }
        if is_bool(v) {
            return if get_bool(v) { 1.0 } else { 0.0 };
        }
        if is_null(v) {
            return 0.0;
        }
        if is_undefined(v) {
            return f64::NAN;
        }
        match self.ref_tag(v) {
            Some(BlockTag::Float64) => self.float_value(heap_offset(v).unwrap_or_default()),
            Some(BlockTag::Int64) => self.int64_value(heap_offset(v).unwrap_or_default()) as f64,
            Some(BlockTag::String) => match self.str_bytes(v) {
                Some(text) => parse_number(text),
                None => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// Exact integer read-back: inline ints, boxed wide integers, and
    /// floats with an exact integral value. `None` for everything else.
    pub fn to_int64(&self, v: JsValue) -> Option<i64> {
        if is_int(v) {
            return Some(get_int(v) as i64);
        }
        match self.ref_tag(v) {
            Some(BlockTag::Int64) => Some(self.int64_value(heap_offset(v)?)),
            Some(BlockTag::Float64) => {
                let x = self.float_value(heap_offset(v)?);
                if x.trunc() == x && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
                    Some(x as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn to_int32(&self, v: JsValue) -> i32 {
        let x = self.to_number(v);
        if x.is_nan() || x.is_infinite() {
            return 0;
        }
        (x as i64 & 0xffff_ffff) as u32 as i32
    }

    pub fn to_bool(&self, v: JsValue) -> bool {
        if is_bool(v) {
            return get_bool(v);
        }
        if is_undefined(v) || is_null(v) {
            return false;
        }
        if is_int(v) {
            return get_int(v) != 0;
        }
        match self.ref_tag(v) {
            Some(BlockTag::Float64) => {
                let x = self.float_value(heap_offset(v).unwrap_or_default());
                x != 0.0 && !x.is_nan()
            }
            Some(BlockTag::Int64) => self.int64_value(heap_offset(v).unwrap_or_default()) != 0,
            Some(BlockTag::String) => self.str_bytes(v).is_some_and(|s| !s.is_empty()),
            _ => true,
        }
    }

    /// Copying string conversion; never allocates in the arena.
    pub fn to_rust_string(&self, v: JsValue) -> String {
        self.to_rust_string_depth(v, 0)
    }

    fn to_rust_string_depth(&self, v: JsValue, depth: u32) -> String {
        if is_undefined(v) {
            return "undefined".into();
        }
        if is_null(v) {
            return "null".into();
        }
        if is_bool(v) {
            return if get_bool(v) { "true" } else { "false" }.into();
        }
        if is_int(v) {
            return get_int(v).to_string();
        }
        if let Some(idx) = native_func_idx(v) {
            let name = self
                .stdlib
                .funcs
                .get(idx as usize)
                .map(|def| def.name)
                .unwrap_or("");
            return format!("function {name}() {{ [native code] }}");
        }
        match self.ref_tag(v) {
            Some(BlockTag::String) => self.str_bytes(v).unwrap_or_default().to_owned(),
            Some(BlockTag::Float64) => {
                js_number_to_string(self.float_value(heap_offset(v).unwrap_or_default()))
            }
            Some(BlockTag::Int64) => self
                .int64_value(heap_offset(v).unwrap_or_default())
                .to_string(),
            Some(BlockTag::Function) => {
                let name = self
                    .function_index(v)
                    .and_then(|idx| self.functions.get(idx))
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                format!("function {name}() {{ [native code] }}")
            }
            Some(BlockTag::Array) => {
                if depth >= MAX_TO_STRING_DEPTH {
                    return String::new();
                }
                let len = self.array_len(v).unwrap_or(0);
                let mut out = String::new();
                for i in 0..len {
                    if i > 0 {
                        out.push(',');
                    }
                    let elem = self.array_get(v, i).unwrap_or(crate::value::JS_UNDEFINED);
                    if !is_undefined(elem) && !is_null(elem) {
                        out.push_str(&self.to_rust_string_depth(elem, depth + 1));
                    }
                }
                out
            }
            Some(BlockTag::Object) => {
                if let Some(class) = self.class_of(v) {
                    if class.is_error() {
                        return self.error_message(v);
                    }
                }
                "[object Object]".into()
            }
            _ => "undefined".into(),
        }
    }

    /// Engine-string conversion; allocates unless `v` is already a string.
    pub fn to_string_value(&mut self, v: JsValue) -> Result<JsValue, Raised> {
        if self.is_string(v) {
            return Ok(v);
        }
        let text = self.to_rust_string(v);
        match self.new_string_value(text.as_bytes()) {
            Some(val) => Ok(val),
            None => Err(self.throw_out_of_memory()),
        }
    }

    // ---- comparisons ----

    pub(crate) fn strict_equals(&self, a: JsValue, b: JsValue) -> bool {
        if self.is_number(a) && self.is_number(b) {
            let x = self.to_number(a);
            let y = self.to_number(b);
            return x == y;
        }
        if self.is_string(a) && self.is_string(b) {
            return self.str_bytes(a) == self.str_bytes(b);
        }
        a == b
    }

    pub(crate) fn loose_equals(&self, a: JsValue, b: JsValue) -> bool {
        let a_nullish = is_null(a) || is_undefined(a);
        let b_nullish = is_null(b) || is_undefined(b);
        if a_nullish || b_nullish {
            return a_nullish && b_nullish;
        }
        if self.is_string(a) && self.is_string(b) {
            return self.str_bytes(a) == self.str_bytes(b);
        }
        if (self.is_number(a) || is_bool(a) || self.is_string(a))
            && (self.is_number(b) || is_bool(b) || self.is_string(b))
        {
            return self.to_number(a) == self.to_number(b);
        }
        a == b
    }

    /// Relational comparison; strings compare lexicographically, anything
    /// else numerically. `None` when a NaN is involved.
    pub(crate) fn compare_values(&self, a: JsValue, b: JsValue) -> Option<core::cmp::Ordering> {
        if self.is_string(a) && self.is_string(b) {
            return Some(self.str_bytes(a)?.cmp(self.str_bytes(b)?));
        }
        let x = self.to_number(a);
        let y = self.to_number(b);
        x.partial_cmp(&y)
    }
}

/// Numeric result helper: box (or inline) `x`, mapping allocation failure
/// to the pending-exception pathway.
pub(crate) fn number_result(ctx: &mut Context, x: f64) -> Result<JsValue, Raised> {
    let v = ctx.new_float64(x);
    if crate::value::is_exception(v) {
        Err(Raised)
    } else {
        Ok(v)
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        let mut value = 0u64;
        if hex.is_empty() {
            return f64::NAN;
        }
        for c in hex.chars() {
            match c.to_digit(16) {
                Some(d) => value = value.wrapping_mul(16).wrapping_add(d as u64),
                None => return f64::NAN,
            }
        }
        return value as f64;
    }
    lexical_core::parse::<f64>(trimmed.as_bytes()).unwrap_or(f64::NAN)
}

/// Script-style number printing: integral values without a fraction,
/// exponent form past the usual thresholds.
pub(crate) fn js_number_to_string(x: f64) -> String {
    if x.is_nan() {
        return "NaN".into();
    }
    if x == f64::INFINITY {
        return "Infinity".into();
    }
    if x == f64::NEG_INFINITY {
        return "-Infinity".into();
    }
    if x == 0.0 {
        return "0".into();
    }
    let abs = x.abs();
    if x.trunc() == x && abs < 1e21 {
        if abs <= i64::MAX as f64 {
            return (x as i64).to_string();
        }
        return format!("{x:.0}");
    }
    if abs >= 1e21 || abs < 1e-6 {
        let printed = format!("{x:e}");
        return match printed.find('e') {
            Some(i) if !printed[i + 1..].starts_with('-') => {
                format!("{}e+{}", &printed[..i], &printed[i + 1..])
            }
            _ => printed,
        };
    }
    let mut buf = [0u8; <f64 as lexical_core::FormattedSize>::FORMATTED_SIZE_DECIMAL];
    let bytes = lexical_core::write(x, &mut buf);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextConfig};
    use crate::stdlib::STDLIB;
    use crate::value::{is_exception, is_int};

    fn new_context() -> Context {
        Context::new(ContextConfig {
            memory_size: 256 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init")
    }

    #[test]
    fn integer_ladder() {
        let mut ctx = new_context();
        let small = ctx.new_int64(42);
        assert!(is_int(small));
        assert_eq!(ctx.to_int64(small), Some(42));

        let wide = ctx.new_int64(1 << 40);
        assert!(!is_int(wide));
        assert!(ctx.is_number(wide));
        assert_eq!(ctx.to_int64(wide), Some(1 << 40));

        // Past the 63-bit box range the value falls back to float64.
        let huge = ctx.new_int64(i64::MAX);
        assert!(ctx.is_number(huge));
        assert_eq!(ctx.to_number(huge), i64::MAX as f64);

        let unsigned = ctx.new_uint32(u32::MAX);
        assert_eq!(ctx.to_int64(unsigned), Some(u32::MAX as i64));
    }

    #[test]
    fn float_roundtrip_and_int_normalization() {
        let mut ctx = new_context();
        let f = ctx.new_float64(1.5);
        assert_eq!(ctx.to_number(f), 1.5);
        let i = ctx.new_float64(7.0);
        assert!(is_int(i));
        let neg_zero = ctx.new_float64(-0.0);
        assert!(!is_int(neg_zero));
        assert!(ctx.to_number(neg_zero) == 0.0);
        assert!(ctx.to_number(neg_zero).is_sign_negative());
    }

    #[test]
    fn string_parsing() {
        let mut ctx = new_context();
        let cases: &[(&str, f64)] = &[
            ("42", 42.0),
            ("  1.5 ", 1.5),
            ("", 0.0),
            ("0x10", 16.0),
            ("1e3", 1000.0),
        ];
        for &(text, expected) in cases {
            let s = ctx.new_string(text);
            assert_eq!(ctx.to_number(s), expected, "case {text:?}");
        }
        let s = ctx.new_string("not a number");
        assert!(ctx.to_number(s).is_nan());
    }

    #[test]
    fn number_printing_matches_script_rules() {
        assert_eq!(js_number_to_string(5.0), "5");
        assert_eq!(js_number_to_string(-0.0), "0");
        assert_eq!(js_number_to_string(0.5), "0.5");
        assert_eq!(js_number_to_string(f64::NAN), "NaN");
        assert_eq!(js_number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(js_number_to_string(1e21), "1e+21");
        assert_eq!(js_number_to_string(1.0e22), "1e+22");
    }

    #[test]
    fn to_rust_string_covers_the_value_space() {
        let mut ctx = new_context();
        assert_eq!(ctx.to_rust_string(crate::value::JS_UNDEFINED), "undefined");
        assert_eq!(ctx.to_rust_string(crate::value::JS_NULL), "null");
        assert_eq!(ctx.to_rust_string(crate::value::JS_TRUE), "true");
        assert_eq!(ctx.to_rust_string(new_short_int(-3)), "-3");
        let s = ctx.new_string("text");
        assert_eq!(ctx.to_rust_string(s), "text");
        let obj = ctx
            .new_object_value(crate::exception::ClassId::Object)
            .expect("object");
        assert_eq!(ctx.to_rust_string(obj), "[object Object]");
    }

    #[test]
    fn equality_and_ordering() {
        let mut ctx = new_context();
        let a = ctx.new_string("abc");
        let b = ctx.new_string("abc");
        assert!(ctx.strict_equals(a, b));
        let wide = ctx.new_int64(5);
        let float = ctx.new_float64(5.5);
        assert!(ctx.strict_equals(wide, new_short_int(5)));
        assert!(!ctx.strict_equals(wide, float));
        assert!(ctx.loose_equals(crate::value::JS_NULL, crate::value::JS_UNDEFINED));
        let five = ctx.new_string("5");
        assert!(ctx.loose_equals(five, new_short_int(5)));
        assert!(!ctx.loose_equals(five, new_short_int(6)));
        assert_eq!(
            ctx.compare_values(new_short_int(2), new_short_int(10)),
            Some(core::cmp::Ordering::Less)
        );
        assert_eq!(
            ctx.compare_values(a, b),
            Some(core::cmp::Ordering::Equal)
        );
    }

    #[test]
    fn big_string_roundtrip() {
        let mut ctx = Context::new(ContextConfig {
            memory_size: 48 * 1024 * 1024,
            stdlib: &STDLIB,
        })
        .expect("context init");
        let text = "pocket".repeat(2 * 1024 * 1024); // 12 MB
        let s = ctx.new_string(&text);
        assert!(!is_exception(s));
        assert_eq!(ctx.str_bytes(s).map(|t| t.len()), Some(text.len()));
        assert_eq!(ctx.str_bytes(s), Some(text.as_str()));
    }
}
