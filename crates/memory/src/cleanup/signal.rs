//! SIGINT handling
//!
//! The handler only writes one byte to a pipe. A watcher thread blocked on
//! the other end runs the global cleanup registry and exits the process, so
//! no cleanup code runs in signal context.

use crate::error::MemoryResult;

#[cfg(unix)]
mod imp {
    use std::sync::OnceLock;
    use std::sync::atomic::{AtomicI32, Ordering};

    use strata_log::{sub_debug, sub_info};

    use crate::error::{MemoryError, MemoryResult};
    use crate::logging::CLEANUP;

    static WAKE_FD: AtomicI32 = AtomicI32::new(-1);
    static INSTALLED: OnceLock<MemoryResult<()>> = OnceLock::new();

    extern "C" fn on_interrupt(_signal: libc::c_int) {
        let fd = WAKE_FD.load(Ordering::Relaxed);
        if fd >= 0 {
            let byte = 1u8;
            // SAFETY: write(2) is async-signal-safe and `byte` outlives the call.
            unsafe {
                libc::write(fd, (&raw const byte).cast(), 1);
            }
        }
    }

    fn wait_for_interrupt(fd: libc::c_int) {
        let mut byte = 0u8;
        loop {
            // SAFETY: `fd` is the read end of a pipe this module owns; the
            // buffer is one valid byte.
            let read = unsafe { libc::read(fd, (&raw mut byte).cast(), 1) };
            if read > 0 {
                break;
            }
            if read < 0 && std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            // Pipe closed or broken: nothing will ever wake us.
            return;
        }

        sub_info!(CLEANUP, "interrupt received, running cleanup");
        let ran = super::super::run();
        sub_debug!(CLEANUP, actions = ran, "exiting after interrupt");
        std::process::exit(0);
    }

    fn install() -> MemoryResult<()> {
        let mut fds: [libc::c_int; 2] = [0; 2];
        // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(MemoryError::invalid_operation(
                &CLEANUP,
                &format!(
                    "cannot create interrupt pipe: {}",
                    std::io::Error::last_os_error()
                ),
            ));
        }
        let [read_fd, write_fd] = fds;

        std::thread::Builder::new()
            .name("strata-cleanup".into())
            .spawn(move || wait_for_interrupt(read_fd))
            .map_err(|e| {
                MemoryError::invalid_operation(
                    &CLEANUP,
                    &format!("cannot spawn cleanup watcher: {e}"),
                )
            })?;

        WAKE_FD.store(write_fd, Ordering::Relaxed);
        let handler = on_interrupt as extern "C" fn(libc::c_int);
        // SAFETY: the handler only performs an async-signal-safe write.
        let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(MemoryError::invalid_operation(
                &CLEANUP,
                "cannot install SIGINT handler",
            ));
        }
        sub_debug!(CLEANUP, "interrupt handler installed");
        Ok(())
    }

    pub(super) fn install_once() -> MemoryResult<()> {
        INSTALLED.get_or_init(install).clone()
    }
}

/// Run the global cleanup registry and exit when the process gets SIGINT
///
/// Calling it again returns the first outcome. Unsupported off unix.
pub fn install_interrupt_handler() -> MemoryResult<()> {
    #[cfg(unix)]
    {
        imp::install_once()
    }
    #[cfg(not(unix))]
    {
        Err(crate::error::MemoryError::not_supported("interrupt handler"))
    }
}
