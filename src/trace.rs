//! Optional structured logging.
//!
//! With the `tracing` feature enabled, `log_event!(level, ...)` forwards to
//! the `tracing` macro of the same level. Without it the call expands to
//! nothing and its arguments are not evaluated.

macro_rules! log_event {
    ($level:ident, $($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            tracing::$level!(target: "tiered_hashmap", $($arg)*);
        }
    };
}

pub(crate) use log_event;
