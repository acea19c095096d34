//! Timers driven by the runtime reactor.

mod sleep;

#[doc(inline)]
pub use sleep::{Sleep, sleep};
