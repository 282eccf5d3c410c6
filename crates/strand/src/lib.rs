//
// lib.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

//! Manually instrumented shadow-stack tracing.
//!
//! Instrumented code marks function entry and exit, and the engine keeps
//! its own stack of logical frames, independent of the hardware call
//! stack. On SIGINT, SIGBUS, or SIGSEGV — or on request via [`dump()`] —
//! the current stack is rendered and written to a configured sink
//! (stdout, an append-only log file, or the system logger), giving a
//! readable trace even when the real stack is corrupted or unavailable.
//!
//! The stack is shared by every thread in the process. Frames pushed
//! from different threads interleave in lock-acquisition order; a dump
//! answers "what was the program doing", not "what was this thread
//! doing".
//!
//! ```no_run
//! fn work() {
//!     strand::trace_frame!("work");
//!     // ...
//! }
//!
//! fn main() {
//!     strand::initialize();
//!     work();
//!     strand::destroy();
//! }
//! ```

pub mod sink;
pub mod stack;
pub mod tracer;
pub mod traps;

mod format;

pub use crate::format::DUMP_BUFFER_MAX;
pub use crate::sink::Sink;
pub use crate::stack::Frame;
pub use crate::tracer::FrameGuard;
pub use crate::tracer::Tracer;
pub use crate::tracer::destroy;
pub use crate::tracer::dump;
pub use crate::tracer::global;
pub use crate::tracer::initialize;
pub use crate::tracer::pop_frame;
pub use crate::tracer::push_frame;

/// Marks the enclosing function as an instrumented call site.
///
/// Expands to a scope guard that pushes a frame populated with
/// `file!()`, the given function name, and `line!()`, and pops it again
/// when the enclosing scope exits — on every path, early returns
/// included. With one argument the guard targets the process-wide
/// engine; pass a [`Tracer`] first to target a specific instance.
///
/// # Examples
///
/// ```no_run
/// fn transfer() {
///     strand::trace_frame!("transfer");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! trace_frame {
    ($tracer:expr, $function:expr) => {
        let _frame = $tracer.frame(file!(), $function, line!());
    };

    ($function:expr) => {
        let _frame = $crate::global().frame(file!(), $function, line!());
    };
}
