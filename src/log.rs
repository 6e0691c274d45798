//! Crate-internal logging macros.
//!
//! With the `tracing` feature enabled, `debug!` and `warn!` forward to
//! the `tracing` crate; the engine and index use them for splay-overflow,
//! history-truncation, and grid-repack events. Without the feature they
//! expand to nothing.

#[cfg(feature = "tracing")]
pub use tracing::{debug, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, warn};
