//
// main.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

//! Walks a five-deep instrumented call chain and dumps the shadow stack
//! from the innermost function.
//!
//! Route the dump with the environment: `STRAND_USE_LOG_FILE=1` (and
//! optionally `STRAND_LOG_FILE=/some/path`) for a file,
//! `STRAND_USE_SYSLOG=1` for the system logger, neither for stdout.

use strand::trace_frame;

fn f1() {
    trace_frame!("f1");
    f2();
}

fn f2() {
    trace_frame!("f2");
    f3();
}

fn f3() {
    trace_frame!("f3");
    f4();
}

fn f4() {
    trace_frame!("f4");
    f5();
}

fn f5() {
    trace_frame!("f5");
    strand::dump();
}

fn main() {
    env_logger::init();

    strand::initialize();
    trace_frame!("main");

    f1();

    strand::destroy();
}
