#[macro_export]
#[cfg(feature = "log_tracing")]
macro_rules! log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[macro_export]
#[cfg(not(feature = "log_tracing"))]
macro_rules! log {
    ($($arg:tt)*) => {
        println!($($arg)*)
    };
}

/// Logs how long a named proving stage took, relative to `now`.
#[macro_export]
macro_rules! log_elapsed {
    ($stage:expr, $now:expr) => {
        $crate::log!("{} taken {:?}", $stage, $now.elapsed())
    };
}
