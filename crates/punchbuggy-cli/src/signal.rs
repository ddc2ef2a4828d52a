use std::sync::atomic::{AtomicBool, Ordering};

/// Set once the user asks `watch` to stop.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub(crate) fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Route SIGINT/SIGTERM (Ctrl-C/Ctrl-Break/close on Windows) into the
/// shutdown flag. Only the first signal is caught; a second one terminates.
pub(crate) fn install_signal_handlers() {
    #[cfg(unix)]
    for sig in [libc::SIGINT, libc::SIGTERM] {
        // Safety: the handler touches an atomic and re-installs SIG_DFL only.
        unsafe {
            libc::signal(sig, on_unix_signal as *const () as libc::sighandler_t);
        }
    }

    #[cfg(windows)]
    unsafe {
        windows_sys::Win32::System::Console::SetConsoleCtrlHandler(Some(on_console_event), 1);
    }
}

#[cfg(unix)]
extern "C" fn on_unix_signal(sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
    }
}

#[cfg(windows)]
unsafe extern "system" fn on_console_event(ctrl_type: u32) -> i32 {
    const CTRL_CLOSE_EVENT: u32 = 2;
    if ctrl_type > CTRL_CLOSE_EVENT {
        return 0;
    }
    SHUTDOWN.store(true, Ordering::SeqCst);
    unsafe {
        windows_sys::Win32::System::Console::SetConsoleCtrlHandler(Some(on_console_event), 0);
    }
    1
}
