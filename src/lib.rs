//! pocketjs: a compact embedded JavaScript-subset engine.
//!
//! One `Context` owns one fixed, 8-byte-aligned memory block and carves
//! everything out of it: heap cells, the interpreter value stack, the
//! standard library's globals. The collector is moving and compacting, so
//! a host-held heap reference is only valid until the next operation that
//! may allocate; hold values across such operations by pinning them
//! (`Context::push_ref` / `Context::add_ref`), which registers a slot the
//! collector rewrites in place.
//!
//! ```no_run
//! use pocketjs::{api, bridge, Context, ContextConfig, EvalFlags, STDLIB};
//!
//! let mut ctx = Context::new(ContextConfig {
//!     memory_size: 1 << 20,
//!     stdlib: &STDLIB,
//! })
//! .expect("context");
//! bridge::install(&mut ctx, &[]).expect("bridge");
//! let v = api::eval(&mut ctx, b"2 + 3", EvalFlags::RETVAL);
//! assert_eq!(ctx.to_number(v), 5.0);
//! if let Some(block) = bridge::flush(&mut ctx, bridge::Channel::Out) {
//!     println!("{block}");
//! }
//! ```
//!
//! Capacity is a precondition, not a runtime check: a context whose block
//! cannot hold the standard-library bootstrap panics at creation. There is
//! no way to probe the required size beforehand; size generously (the CLI
//! defaults to 16 MiB).

pub mod api;
pub mod bridge;
pub mod context;
mod conversion;
pub mod exception;
mod gc;
pub mod gc_ref;
pub mod heap;
mod interpreter;
pub mod parser;
pub mod stdlib;
pub mod value;

pub use api::{eval, eval_with_filename, EvalFlags};
pub use bridge::Channel;
pub use context::{Context, ContextConfig, ContextError, MIN_CONTEXT_BYTES};
pub use exception::ClassId;
pub use gc_ref::{ListRef, StackRef};
pub use stdlib::{StdlibDef, STDLIB};
pub use value::JsValue;
