//
// tracer.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::Once;

use log::error;
use log::info;
use log::warn;

use crate::format;
use crate::sink::Sink;
use crate::stack::Frame;
use crate::stack::TraceStack;
use crate::stack::truncate;
use crate::traps::register_trap_handlers;

/// Maximum length in bytes of the resolved program name.
pub const PROGRAM_NAME_MAX: usize = 128;

/// The shadow-stack engine.
///
/// One instance owns the stack, the program label, and the sink behind a
/// single mutex. Push, pop, destroy, and the snapshot-render-write
/// sequence used by [`dump()`](Tracer::dump) all serialize on that lock,
/// and a dump holds it across the sink write, so a slow sink blocks
/// concurrent push/pop for its duration.
///
/// The stack is shared by every thread in the process: frames pushed
/// from different threads interleave in lock-acquisition order, not in
/// any per-thread call order.
///
/// Instrumented programs normally use the process-wide instance behind
/// [`global()`]; tests can create independent instances with
/// [`Tracer::with_sink()`].
pub struct Tracer {
    inner: Mutex<TracerInner>,
}

struct TracerInner {
    stack: TraceStack,
    program: String,
    sink: Sink,
}

impl Tracer {
    /// An empty engine: no frames, blank program name, console sink.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(TracerInner {
                stack: TraceStack::new(),
                program: String::new(),
                sink: Sink::Console,
            }),
        }
    }

    /// A standalone engine writing to `sink`, labelling dumps with
    /// `program`. Does not install signal handlers.
    pub fn with_sink(sink: Sink, program: &str) -> Self {
        let tracer = Self::new();
        tracer.configure(sink, program);
        tracer
    }

    /// Install the sink and program label. Called once; the
    /// configuration is fixed for the rest of the instance's lifetime.
    pub(crate) fn configure(&self, sink: Sink, program: &str) {
        let mut inner = self.lock();
        inner.sink = sink;
        inner.program = truncate(program, PROGRAM_NAME_MAX).to_string();
    }

    // A poisoned lock means a holder panicked mid-update and the stack
    // can't be trusted; failing loudly here is the contract
    fn lock(&self) -> MutexGuard<'_, TracerInner> {
        self.inner.lock().unwrap()
    }

    /// Record entry into a call site.
    ///
    /// Never fails under normal memory availability; allocation failure
    /// aborts the process, as the stack can't be trusted past it.
    pub fn push(&self, source_file: &str, function: &str, line: u32) {
        let frame = Frame::new(source_file, function, line);
        self.lock().stack.push(frame);
    }

    /// Record exit from the most recent call site. A no-op when the
    /// stack is empty.
    pub fn pop(&self) {
        self.lock().stack.pop();
    }

    /// Number of live frames.
    pub fn depth(&self) -> usize {
        self.lock().stack.len()
    }

    /// The program label dumps are tagged with.
    pub fn program(&self) -> String {
        self.lock().program.clone()
    }

    /// Release every frame. Idempotent.
    pub fn destroy(&self) {
        self.lock().stack.clear();
    }

    /// Snapshot the stack, render it, and write it to the sink, all
    /// under one continuous hold of the engine lock.
    pub fn dump(&self) {
        let inner = self.lock();

        let rendered = format::render(inner.stack.frames(), &inner.program);
        if rendered.truncated {
            warn!("Stack dump exceeds the dump buffer; writing what fit.");
        }

        write_sink(&inner, &rendered.text);
    }

    /// Write a preformatted block straight to the sink.
    pub(crate) fn emit(&self, text: &str) {
        let inner = self.lock();
        write_sink(&inner, text);
    }

    /// Push a frame and return a guard that pops it again when dropped.
    pub fn frame(&self, source_file: &str, function: &str, line: u32) -> FrameGuard<'_> {
        self.push(source_file, function, line);
        FrameGuard { tracer: self }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

// Sink failures are an operator problem (bad log path, full disk); they
// are reported here and never propagated into the instrumented program
fn write_sink(inner: &TracerInner, text: &str) {
    if let Err(error) = inner.sink.write(text) {
        error!("Can't write stack dump to sink: {}", error);
    }
}

/// Scope marker for one instrumented call site.
///
/// Created by [`Tracer::frame()`] or the [`trace_frame!`](crate::trace_frame)
/// macro. The frame is pushed on creation and popped on drop, covering
/// every exit path: normal return, early return, `?` propagation, and
/// unwinding.
#[must_use]
pub struct FrameGuard<'a> {
    tracer: &'a Tracer,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.tracer.pop();
    }
}

static TRACER: Tracer = Tracer::new();
static INIT: Once = Once::new();

/// The process-wide engine used by the free functions and by the
/// fatal-signal handlers.
pub fn global() -> &'static Tracer {
    &TRACER
}

/// One-time engine setup: resolve the program name from process
/// metadata, read the sink configuration from the environment, and
/// install the fatal-signal handlers. Subsequent calls are no-ops;
/// there is no re-initialization within one process lifetime.
///
/// Call after initialising the `log` backend. push/pop work before
/// `initialize()`, but dumps are then tagged with a blank program name.
pub fn initialize() {
    INIT.call_once(|| {
        let program = program_name();
        let sink = Sink::from_env();
        info!("Initializing stack tracer for '{}', sink {:?}", program, sink);

        TRACER.configure(sink, &program);
        register_trap_handlers();
    });
}

/// Drain the process-wide stack. Idempotent; safe to call with the
/// stack already empty.
pub fn destroy() {
    TRACER.destroy();
}

/// Push a frame onto the process-wide stack.
pub fn push_frame(source_file: &str, function: &str, line: u32) {
    TRACER.push(source_file, function, line);
}

/// Pop the top frame of the process-wide stack, if any.
pub fn pop_frame() {
    TRACER.pop();
}

/// Render the process-wide stack and write it to the configured sink.
pub fn dump() {
    TRACER.dump();
}

/// Short name of the running program, for labelling dumps.
fn program_name() -> String {
    let name = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_default();

    truncate(&name, PROGRAM_NAME_MAX).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_pops_on_scope_exit() {
        let tracer = Tracer::new();

        {
            let _frame = tracer.frame("a.rs", "outer", 1);
            assert_eq!(tracer.depth(), 1);

            {
                let _frame = tracer.frame("a.rs", "inner", 2);
                assert_eq!(tracer.depth(), 2);
            }

            assert_eq!(tracer.depth(), 1);
        }

        assert_eq!(tracer.depth(), 0);
    }

    #[test]
    fn test_guard_pops_on_early_return() {
        fn instrumented(tracer: &Tracer, bail: bool) -> u32 {
            let _frame = tracer.frame("a.rs", "instrumented", 1);
            if bail {
                return 0;
            }
            42
        }

        let tracer = Tracer::new();
        instrumented(&tracer, true);
        assert_eq!(tracer.depth(), 0);

        instrumented(&tracer, false);
        assert_eq!(tracer.depth(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let tracer = Tracer::new();
        tracer.push("a.rs", "f", 1);
        tracer.push("a.rs", "g", 2);

        tracer.destroy();
        assert_eq!(tracer.depth(), 0);

        tracer.destroy();
        assert_eq!(tracer.depth(), 0);
    }

    #[test]
    fn test_program_label_is_truncated() {
        let long = "p".repeat(PROGRAM_NAME_MAX + 1);
        let tracer = Tracer::with_sink(Sink::Console, &long);
        assert_eq!(tracer.program().len(), PROGRAM_NAME_MAX);
    }
}
