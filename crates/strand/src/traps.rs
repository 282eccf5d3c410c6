//
// traps.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use nix::sys::signal::*;

use crate::tracer::global;

/// Install the fatal-signal handlers. Called by `initialize()`, after
/// the `log` backend is up.
///
/// Instruments SIGINT, SIGBUS, and SIGSEGV to write a one-line
/// diagnostic and a full stack dump through the configured sink, then
/// exit with a failure status. All three signals are added to the
/// handler's mask, so a second fault can't re-enter the handler
/// mid-dump.
pub fn register_trap_handlers() {
    let mut mask = SigSet::empty();
    mask.add(SIGINT);
    mask.add(SIGBUS);
    mask.add(SIGSEGV);

    let action = SigAction::new(
        SigHandler::SigAction(dump_handler),
        SaFlags::SA_SIGINFO,
        mask,
    );

    unsafe {
        sigaction(SIGINT, &action).unwrap();
        sigaction(SIGBUS, &action).unwrap();
        sigaction(SIGSEGV, &action).unwrap();
    }
}

// Note the diagnostic and the dump both take the engine lock and
// allocate, neither of which is async-signal-safe. The process is
// exiting immediately afterwards either way, so output coming out
// wrong or internal buffers being corrupted is of little significance;
// exiting with no trace at all would be worse.
extern "C" fn dump_handler(
    signum: libc::c_int,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    let (signo, code) = match unsafe { info.as_ref() } {
        Some(info) => (info.si_signo, info.si_code),
        None => (signum, 0),
    };

    let name = match Signal::try_from(signo) {
        Ok(signal) => signal.as_str(),
        Err(_) => "unknown",
    };

    let tracer = global();
    tracer.emit(&format!(
        "^^^^^ '{}' terminated with signal {} ({}), caused by error code {} ({})\n",
        tracer.program(),
        signo,
        name,
        code,
        std::io::Error::from_raw_os_error(code),
    ));
    tracer.dump();

    unsafe {
        libc::_exit(libc::EXIT_FAILURE);
    }
}
