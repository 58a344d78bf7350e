//! Convenience macros for structured logging

/// Log an error and return it
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        $crate::error!(error = ?e);
        e
    }};
    ($err:expr, $($arg:tt)*) => {{
        let e = $err;
        $crate::error!(error = ?e, $($arg)*);
        e
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __subsystem_event {
    ($level:expr, $sub:expr, $($arg:tt)+) => {{
        let sub: &$crate::Subsystem = &$sub;
        if sub.enabled($level) {
            $crate::tracing::event!($level, subsystem = sub.name(), $($arg)+);
        }
    }};
}

/// Emit a trace event gated by a [`Subsystem`](crate::Subsystem)
#[macro_export]
macro_rules! sub_trace {
    ($sub:expr, $($arg:tt)+) => {
        $crate::__subsystem_event!($crate::Level::TRACE, $sub, $($arg)+)
    };
}

/// Emit a debug event gated by a [`Subsystem`](crate::Subsystem)
#[macro_export]
macro_rules! sub_debug {
    ($sub:expr, $($arg:tt)+) => {
        $crate::__subsystem_event!($crate::Level::DEBUG, $sub, $($arg)+)
    };
}

/// Emit an info event gated by a [`Subsystem`](crate::Subsystem)
#[macro_export]
macro_rules! sub_info {
    ($sub:expr, $($arg:tt)+) => {
        $crate::__subsystem_event!($crate::Level::INFO, $sub, $($arg)+)
    };
}

/// Emit a warning gated by a [`Subsystem`](crate::Subsystem)
#[macro_export]
macro_rules! sub_warn {
    ($sub:expr, $($arg:tt)+) => {
        $crate::__subsystem_event!($crate::Level::WARN, $sub, $($arg)+)
    };
}

/// Emit an error event gated by a [`Subsystem`](crate::Subsystem)
#[macro_export]
macro_rules! sub_error {
    ($sub:expr, $($arg:tt)+) => {
        $crate::__subsystem_event!($crate::Level::ERROR, $sub, $($arg)+)
    };
}
